//! Arc generator (§4.5): a cooperative, non-blocking state machine that
//! synthesizes short linear chords approximating a G2/G3 move and feeds them
//! into the planner under the same backpressure `buffer_line` already
//! exposes, rather than performing any host I/O itself. `tick()` can be
//! called repeatedly and retries its own backpressure internally.
//!
//! Only the primary plane (the two lowest-indexed axes, conventionally X/Y)
//! is supported — selecting a different work plane is explicitly out of
//! scope.

use crate::mathutil::{acosf, atan2f, cosf, fabsf, sinf, sqrtf};
use crate::planner::Planner;
use crate::settings::Settings;
use crate::{AxisId, CoreError, AXIS_COUNT};

/// Recompute the chord endpoint from exact trigonometry every this many
/// segments, bounding the small-angle approximation's drift. Disabled (0)
/// by default: at tolerance-driven chord sizes the small-angle error is
/// already well under one step over any arc this generator can produce
/// (bounded by `MAX_ARC_SEGMENTS`), so periodic correction is not worth the
/// extra trig on a cooperative tick (§9 open question).
pub const DEFAULT_CORRECTION_INTERVAL: u32 = 0;

/// Upper bound on how many chords a single arc can be split into, keeping
/// worst-case per-arc memory and time well-defined.
pub const MAX_ARC_SEGMENTS: u32 = 4096;

struct ArcPlan {
    center_plane: [f32; 2],
    other_axes_start: [f32; AXIS_COUNT],
    other_axes_target: [f32; AXIS_COUNT],
    theta_per_segment: f32,
    total_segments: u32,
    feedrate_mm_per_min: f32,
    correction_interval: u32,
}

impl ArcPlan {
    fn interpolated_target(&self, segment_index: u32, plane_endpoint: [f32; 2]) -> [f32; AXIS_COUNT] {
        let frac = (segment_index + 1) as f32 / self.total_segments as f32;
        let mut target = [0.0f32; AXIS_COUNT];
        for i in 0..AXIS_COUNT {
            target[i] = self.other_axes_start[i]
                + (self.other_axes_target[i] - self.other_axes_start[i]) * frac;
        }
        target[0] = plane_endpoint[0];
        target[1] = plane_endpoint[1];
        target
    }
}

/// The arc generator's running state (§4.5.1-6).
pub struct ArcGenerator {
    plan: Option<ArcPlan>,
    radius_vec: [f32; 2],
    segments_emitted: u32,
    complete: bool,
}

impl Default for ArcGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ArcGenerator {
    pub const fn new() -> Self {
        Self { plan: None, radius_vec: [0.0, 0.0], segments_emitted: 0, complete: false }
    }

    pub fn is_active(&self) -> bool {
        self.plan.is_some()
    }

    /// Reads and clears the completion flag. The main flow, not the
    /// generator itself, is responsible for sending the host acknowledgement
    /// once this is observed true (§5.4).
    pub fn take_complete(&mut self) -> bool {
        let was = self.complete;
        self.complete = false;
        was
    }

    /// Arms the generator for a new arc move (§4.5.1-2). `current_mm` is the
    /// machine-frame position the arc starts from; `center_offset` locates
    /// the arc's center relative to it, in the primary plane.
    pub fn arm(
        &mut self,
        settings: &Settings,
        current_mm: [f32; AXIS_COUNT],
        target_mm: [f32; AXIS_COUNT],
        center_offset: [f32; 2],
        clockwise: bool,
        feedrate_mm_per_min: f32,
    ) -> Result<(), CoreError> {
        let start_plane = [current_mm[0], current_mm[1]];
        let target_plane = [target_mm[0], target_mm[1]];
        let center = [start_plane[0] + center_offset[0], start_plane[1] + center_offset[1]];

        let r_start = [start_plane[0] - center[0], start_plane[1] - center[1]];
        let r_end = [target_plane[0] - center[0], target_plane[1] - center[1]];
        let radius_start = sqrtf(r_start[0] * r_start[0] + r_start[1] * r_start[1]);
        let radius_end = sqrtf(r_end[0] * r_end[0] + r_end[1] * r_end[1]);

        if radius_start < 1e-4 || fabsf(radius_start - radius_end) > 0.005 * radius_start.max(1.0) {
            return Err(CoreError::ArcGeometry);
        }

        let is_full_circle = fabsf(start_plane[0] - target_plane[0]) < 1e-5
            && fabsf(start_plane[1] - target_plane[1]) < 1e-5;

        let mut angular_travel = {
            let cross = r_start[0] * r_end[1] - r_start[1] * r_end[0];
            let dot = r_start[0] * r_end[0] + r_start[1] * r_end[1];
            atan2f(cross, dot)
        };

        if is_full_circle {
            angular_travel = if clockwise {
                -2.0 * core::f32::consts::PI
            } else {
                2.0 * core::f32::consts::PI
            };
        } else if clockwise && angular_travel >= 0.0 {
            angular_travel -= 2.0 * core::f32::consts::PI;
        } else if !clockwise && angular_travel <= 0.0 {
            angular_travel += 2.0 * core::f32::consts::PI;
        }

        if fabsf(angular_travel) < 1e-6 {
            return Err(CoreError::ArcGeometry);
        }

        let tolerance = settings.get_arc_tolerance().max(1e-6).min(radius_start * 0.9);
        let max_chord_angle = 2.0 * acosf((1.0 - tolerance / radius_start).clamp(-1.0, 1.0));
        let max_chord_angle = if max_chord_angle > 1e-4 { max_chord_angle } else { 1e-4 };
        let segments = (fabsf(angular_travel) / max_chord_angle).ceil().max(1.0);
        let segments = (segments as u32).min(MAX_ARC_SEGMENTS);

        self.plan = Some(ArcPlan {
            center_plane: center,
            other_axes_start: current_mm,
            other_axes_target: target_mm,
            theta_per_segment: angular_travel / segments as f32,
            total_segments: segments,
            feedrate_mm_per_min,
            correction_interval: DEFAULT_CORRECTION_INTERVAL,
        });
        self.radius_vec = r_start;
        self.segments_emitted = 0;
        self.complete = false;

        Ok(())
    }

    /// Advances the arc by at most one chord. Never blocks: if the planner
    /// ring is full, the same chord is retried on the next call (§4.5 step
    /// 3, §5.2).
    pub fn tick<const K: usize>(&mut self, planner: &mut Planner<K>, settings: &Settings) {
        let Some(plan) = &self.plan else { return };

        if self.segments_emitted >= plan.total_segments {
            self.plan = None;
            self.complete = true;
            return;
        }

        if plan.correction_interval > 0
            && self.segments_emitted > 0
            && self.segments_emitted % plan.correction_interval == 0
        {
            let exact_angle = plan.theta_per_segment * self.segments_emitted as f32;
            let (sin_a, cos_a) = (sinf(exact_angle), cosf(exact_angle));
            // Rotate the *original* start radius vector by the exact
            // cumulative angle, rather than compounding small-angle error.
            let r0 = [
                plan.center_plane[0] - plan.other_axes_start[0],
                plan.center_plane[1] - plan.other_axes_start[1],
            ];
            self.radius_vec = [-r0[0] * cos_a + r0[1] * sin_a, -r0[0] * sin_a - r0[1] * cos_a];
        }

        let theta = plan.theta_per_segment;
        // Small-angle rotation, valid because the chord count above was
        // chosen so that per-segment angle keeps the mid-chord error under
        // `arc_tolerance_mm`.
        let cos_t = 1.0 - theta * theta * 0.5;
        let sin_t = theta;
        let new_radius = [
            self.radius_vec[0] * cos_t - self.radius_vec[1] * sin_t,
            self.radius_vec[0] * sin_t + self.radius_vec[1] * cos_t,
        ];
        let endpoint_plane = [plan.center_plane[0] + new_radius[0], plan.center_plane[1] + new_radius[1]];

        let target_mm = plan.interpolated_target(self.segments_emitted, endpoint_plane);

        match planner.buffer_line(settings, target_mm, plan.feedrate_mm_per_min, 0) {
            Ok(true) => {
                self.radius_vec = new_radius;
                self.segments_emitted += 1;
            }
            Ok(false) | Err(_) => {
                // Ring full, or (should not happen for a well-formed chord)
                // a rejected feedrate: leave state untouched, retry the same
                // chord next tick.
            }
        }
    }
}
