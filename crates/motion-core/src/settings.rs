//! Kinematics & Settings: the single source of truth for per-axis
//! steps/mm, rate and acceleration limits, plus the junction-deviation and
//! arc-tolerance constants every other module consults. Every mm<->step
//! conversion in the core routes through here so a settings change can never
//! leave a stale `steps_per_mm` cached somewhere else.
//!
//! Grounded on `motion::kinematics`, but narrowed: that module coupled axes
//! together (CoreXY-style transforms) for a 3D-printer kinematic chain; this
//! core's settings model has no axis coupling, so the transform trait is not
//! carried over (see DESIGN.md).

use crate::error::SettingsError;
use crate::{AxisId, AXIS_COUNT};

/// Per-axis kinematic limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSettings {
    pub steps_per_mm: f32,
    pub max_rate_mm_per_min: f32,
    pub max_accel_mm_per_sec2: f32,
}

impl Default for AxisSettings {
    fn default() -> Self {
        Self {
            steps_per_mm: 80.0,
            max_rate_mm_per_min: 5000.0,
            max_accel_mm_per_sec2: 500.0,
        }
    }
}

/// The process-wide, read-mostly settings store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    axes: [AxisSettings; AXIS_COUNT],
    junction_deviation_mm: f32,
    arc_tolerance_mm: f32,
    pulse_width_counts: u16,
    timer_clock_hz: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            axes: [AxisSettings::default(); AXIS_COUNT],
            junction_deviation_mm: 0.01,
            arc_tolerance_mm: 0.002,
            pulse_width_counts: 40,
            timer_clock_hz: 1_562_500,
        }
    }
}

impl Settings {
    pub fn new(
        axes: [AxisSettings; AXIS_COUNT],
        junction_deviation_mm: f32,
        arc_tolerance_mm: f32,
        pulse_width_counts: u16,
        timer_clock_hz: u32,
    ) -> Self {
        Self {
            axes,
            junction_deviation_mm,
            arc_tolerance_mm,
            pulse_width_counts,
            timer_clock_hz,
        }
    }

    /// Truncating mm -> steps conversion.
    #[inline]
    pub fn mm_to_steps(&self, axis: AxisId, mm: f32) -> i32 {
        (mm * self.axes[axis.index()].steps_per_mm) as i32
    }

    /// Inverse of `mm_to_steps`, exact only up to the truncation above.
    #[inline]
    pub fn steps_to_mm(&self, axis: AxisId, steps: i32) -> f32 {
        steps as f32 / self.axes[axis.index()].steps_per_mm
    }

    #[inline]
    pub fn steps_per_mm(&self, axis: AxisId) -> f32 {
        self.axes[axis.index()].steps_per_mm
    }

    #[inline]
    pub fn max_rate(&self, axis: AxisId) -> f32 {
        self.axes[axis.index()].max_rate_mm_per_min
    }

    /// Per-axis max acceleration in (mm/min)/min, the unit the planner's
    /// `v^2 = v0^2 + 2 a d` arithmetic needs since velocities are carried in
    /// mm/min: 1 mm/sec^2 == 3600 (mm/min)/min.
    #[inline]
    pub fn max_accel_mm_per_min2(&self, axis: AxisId) -> f32 {
        self.axes[axis.index()].max_accel_mm_per_sec2 * 3600.0
    }

    #[inline]
    pub fn get_junction_deviation(&self) -> f32 {
        self.junction_deviation_mm
    }

    #[inline]
    pub fn get_arc_tolerance(&self) -> f32 {
        self.arc_tolerance_mm
    }

    #[inline]
    pub fn pulse_width_counts(&self) -> u16 {
        self.pulse_width_counts
    }

    #[inline]
    pub fn timer_clock_hz(&self) -> u32 {
        self.timer_clock_hz
    }

    /// Runtime mutation entry point for the external settings-protocol
    /// collaborator. The caller supplies whether the planner ring is
    /// currently empty; mutation is refused otherwise.
    pub fn apply(&mut self, new: Settings, planner_is_empty: bool) -> Result<(), SettingsError> {
        if !planner_is_empty {
            return Err(SettingsError::PlannerNotEmpty);
        }
        *self = new;
        Ok(())
    }
}
