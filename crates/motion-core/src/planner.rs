//! Look-ahead planner: a junction-deviation block queue over a fixed-size
//! ring with `head`/`tail`/`planned` pointers (§4.2). Unlike the segment
//! ring below it, this needs random access plus a movable middle pointer —
//! not a FIFO — so it is a plain array ring rather than
//! `heapless::Deque`/`spsc::Queue`.
//!
//! Junction-deviation trapezoidal planning: entry speed at each junction is
//! bounded by the centripetal acceleration the direction change implies,
//! then replanned backward and forward across the buffered blocks. This
//! core has no pressure-advance or input-shaping concept.

use crate::condition_flags;
use crate::mathutil::{fabsf, sqrtf};
use crate::settings::Settings;
use crate::{AxisId, CoreError, AXIS_COUNT};

/// Floor under any junction/entry speed: below this the machine is assumed
/// capable of an instantaneous direction change without skipping steps.
const MIN_ENTRY_SPEED_MM_PER_MIN: f32 = 60.0;

/// One block of motion in the planner ring (§3.1 `PlannerBlock`).
#[derive(Debug, Clone, Copy, Default)]
pub struct PlannerBlock {
    pub steps: [u32; AXIS_COUNT],
    /// One bit per axis: 1 = negative travel.
    pub direction_bits: u8,
    pub step_event_count: u32,
    pub millimeters: f32,
    pub nominal_speed_sqr: f32,
    /// (mm/min)/min.
    pub acceleration: f32,
    pub entry_speed_sqr: f32,
    pub max_entry_speed_sqr: f32,
    pub condition_flags: u8,
}

/// Planner-private state carried between `buffer_line` calls (§3.1
/// `PlannerState`).
#[derive(Debug, Clone, Copy)]
struct PlannerState {
    sys_position: [i32; AXIS_COUNT],
    previous_unit_vec: [f32; AXIS_COUNT],
    /// 0.0 is the "no previous move" sentinel: the very first move after
    /// reset is never junction-limited.
    previous_nominal_speed: f32,
}

impl Default for PlannerState {
    fn default() -> Self {
        Self {
            sys_position: [0; AXIS_COUNT],
            previous_unit_vec: [0.0; AXIS_COUNT],
            previous_nominal_speed: 0.0,
        }
    }
}

/// The look-ahead planner (§4.2): a ring of `K` blocks with a forward/reverse
/// junction-deviation replan pass run after every `buffer_line`.
pub struct Planner<const K: usize> {
    ring: [PlannerBlock; K],
    head: usize,
    tail: usize,
    planned: usize,
    len: usize,
    state: PlannerState,
}

impl<const K: usize> Default for Planner<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> Planner<K> {
    pub fn new() -> Self {
        Self {
            ring: [PlannerBlock::default(); K],
            head: 0,
            tail: 0,
            planned: 0,
            len: 0,
            state: PlannerState::default(),
        }
    }

    #[inline]
    fn next_index(i: usize) -> usize {
        (i + 1) % K
    }

    #[inline]
    fn idx(&self, offset_from_tail: usize) -> usize {
        (self.tail + offset_from_tail) % K
    }

    #[inline]
    fn planned_offset(&self) -> usize {
        (self.planned + K - self.tail) % K
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == K
    }

    pub fn capacity(&self) -> usize {
        K
    }

    /// `(occupied, capacity)`, the host status-protocol's planner fill pair.
    pub fn fill(&self) -> (usize, usize) {
        (self.len, K)
    }

    pub fn sys_position_steps(&self, axis: AxisId) -> i32 {
        self.state.sys_position[axis.index()]
    }

    pub fn sys_position_mm(&self, settings: &Settings, axis: AxisId) -> f32 {
        settings.steps_to_mm(axis, self.state.sys_position[axis.index()])
    }

    /// The block the executor/preparer should currently be consuming.
    pub fn get_current_block(&self) -> Option<&PlannerBlock> {
        if self.len == 0 {
            None
        } else {
            Some(&self.ring[self.tail])
        }
    }

    /// Entry speed of the block immediately following the current one, if
    /// any — used by the segment preparer to know the exit speed it must
    /// decelerate the current block toward.
    pub fn next_entry_speed_sqr(&self) -> Option<f32> {
        if self.len >= 2 {
            Some(self.ring[self.idx(1)].entry_speed_sqr)
        } else {
            None
        }
    }

    /// Iterates the ring from `tail` to `head`, oldest first. Exposed for
    /// diagnostics and for tests that need to check a property (e.g. the
    /// replan constraints of §4.2.2) across every adjacent pair currently
    /// buffered, not just the pair at the tail.
    pub fn blocks(&self) -> impl Iterator<Item = &PlannerBlock> {
        (0..self.len).map(move |offset| &self.ring[self.idx(offset)])
    }

    /// Retires the block at `tail` once the segment preparer has fully
    /// consumed it (§4.2.3).
    pub fn discard_current_block(&mut self) {
        if self.len == 0 {
            return;
        }
        self.ring[self.tail] = PlannerBlock::default();
        if self.planned == self.tail {
            self.planned = Self::next_index(self.planned);
        }
        self.tail = Self::next_index(self.tail);
        self.len -= 1;
    }

    /// Accepts a new target position into the planner ring (§4.2.1).
    ///
    /// Returns `Ok(true)` once the line is accepted — including the
    /// degenerate case of a zero-length move, which is silently dropped
    /// without consuming a ring slot, but is still considered "accepted" so
    /// the host's line-acknowledgement accounting stays in step. Returns
    /// `Ok(false)` if the ring has no free slot; no state is touched in that
    /// case. Returns `Err` only for a caller-supplied malformed feedrate.
    pub fn buffer_line(
        &mut self,
        settings: &Settings,
        target_mm: [f32; AXIS_COUNT],
        feedrate_mm_per_min: f32,
        flags: u8,
    ) -> Result<bool, CoreError> {
        let rapid = flags & condition_flags::RAPID_MOTION != 0;
        if !rapid && feedrate_mm_per_min <= 0.0 {
            return Err(CoreError::UndefinedFeedRate);
        }

        let mut target_steps = [0i32; AXIS_COUNT];
        let mut delta_steps = [0i32; AXIS_COUNT];
        let mut steps = [0u32; AXIS_COUNT];
        let mut direction_bits = 0u8;
        for axis in AxisId::ALL {
            let i = axis.index();
            target_steps[i] = settings.mm_to_steps(axis, target_mm[i]);
            let delta = target_steps[i] - self.state.sys_position[i];
            delta_steps[i] = delta;
            steps[i] = delta.unsigned_abs();
            if delta < 0 {
                direction_bits |= 1 << i;
            }
        }

        if steps.iter().all(|&s| s == 0) {
            return Ok(true);
        }

        if self.is_full() {
            crate::diagnostics::log_planner_buffer_full(&target_mm);
            return Ok(false);
        }

        let mut dist_sq = 0.0f32;
        let mut delta_mm = [0.0f32; AXIS_COUNT];
        for axis in AxisId::ALL {
            let i = axis.index();
            delta_mm[i] = delta_steps[i] as f32 / settings.steps_per_mm(axis);
            dist_sq += delta_mm[i] * delta_mm[i];
        }
        let millimeters = sqrtf(dist_sq);
        let mut unit_vec = [0.0f32; AXIS_COUNT];
        for i in 0..AXIS_COUNT {
            unit_vec[i] = delta_mm[i] / millimeters;
        }

        let mut nominal_speed = if rapid { f32::MAX } else { feedrate_mm_per_min };
        let mut acceleration = f32::MAX;
        for axis in AxisId::ALL {
            let i = axis.index();
            let comp = fabsf(unit_vec[i]);
            if comp > 1e-6 {
                nominal_speed = nominal_speed.min(settings.max_rate(axis) / comp);
                acceleration = acceleration.min(settings.max_accel_mm_per_min2(axis) / comp);
            }
        }
        let nominal_speed_sqr = nominal_speed * nominal_speed;

        let max_entry_speed_sqr =
            self.junction_max_entry_speed_sqr(settings, &unit_vec, acceleration);
        let entry_speed_sqr = max_entry_speed_sqr.min(nominal_speed_sqr);

        let block = PlannerBlock {
            steps,
            direction_bits,
            step_event_count: *steps.iter().max().unwrap_or(&0),
            millimeters,
            nominal_speed_sqr,
            acceleration,
            entry_speed_sqr,
            max_entry_speed_sqr,
            condition_flags: flags,
        };

        self.state.sys_position = target_steps;
        self.state.previous_unit_vec = unit_vec;
        self.state.previous_nominal_speed = nominal_speed;

        let head = self.head;
        self.ring[head] = block;
        self.head = Self::next_index(self.head);
        self.len += 1;

        self.replan();

        Ok(true)
    }

    /// The cosine-of-junction-angle computation of §4.2.1 step 6.
    fn junction_max_entry_speed_sqr(
        &self,
        settings: &Settings,
        unit_vec: &[f32; AXIS_COUNT],
        acceleration: f32,
    ) -> f32 {
        if self.state.previous_nominal_speed <= 0.0 {
            return f32::MAX;
        }

        let mut cos_theta = 0.0f32;
        for i in 0..AXIS_COUNT {
            cos_theta += self.state.previous_unit_vec[i] * unit_vec[i];
        }

        if cos_theta > 0.999 {
            // Colinear, continuing in the same direction: no new limit.
            f32::MAX
        } else if cos_theta < -0.999 {
            // Full reversal: floor value.
            MIN_ENTRY_SPEED_MM_PER_MIN * MIN_ENTRY_SPEED_MM_PER_MIN
        } else {
            // sin^2(theta'/2) = (1 + cos_theta) / 2, where theta' is the
            // angle between the outgoing unit vector and the *negated*
            // incoming one (0 when continuing straight, pi on reversal).
            let sin_half = sqrtf(0.5 * (1.0 + cos_theta));
            let speed_sqr =
                acceleration * settings.get_junction_deviation() * sin_half / (1.0 - sin_half);
            speed_sqr.max(MIN_ENTRY_SPEED_MM_PER_MIN * MIN_ENTRY_SPEED_MM_PER_MIN)
        }
    }

    /// Forward/reverse junction-deviation replan (§4.2.2), run once after
    /// every accepted block.
    fn replan(&mut self) {
        if self.len < 2 {
            return;
        }
        let planned_offset = self.planned_offset();

        // Reverse pass: head-1 down to planned. Each block's entry speed is
        // capped by how fast it can decelerate, over its own length, down to
        // the entry speed already settled on for the block after it.
        for offset in (planned_offset..self.len - 1).rev() {
            let cur = self.idx(offset);
            let next = self.idx(offset + 1);
            if self.ring[cur].entry_speed_sqr != self.ring[cur].max_entry_speed_sqr {
                let allowed = (self.ring[next].entry_speed_sqr
                    + 2.0 * self.ring[cur].acceleration * self.ring[cur].millimeters)
                    .min(self.ring[cur].max_entry_speed_sqr);
                self.ring[cur].entry_speed_sqr = allowed;
            }
        }

        // Forward pass: planned up to head-1. Symmetric constraint — reduce
        // the next block's entry speed if this block can't accelerate up to
        // it within its own length.
        for offset in planned_offset..self.len - 1 {
            let cur = self.idx(offset);
            let next = self.idx(offset + 1);
            let allowed_next = (self.ring[cur].entry_speed_sqr
                + 2.0 * self.ring[cur].acceleration * self.ring[cur].millimeters)
                .min(self.ring[next].max_entry_speed_sqr);
            if allowed_next < self.ring[next].entry_speed_sqr {
                self.ring[next].entry_speed_sqr = allowed_next;
            }
        }

        // Advance `planned`: a block (other than the newest, which can still
        // be constrained by a move that hasn't arrived yet) sitting at its
        // own junction ceiling cannot be reduced further by a future reverse
        // pass, so it is safe to freeze.
        while self.planned_offset() < self.len - 1 {
            let idx = self.idx(self.planned_offset());
            if self.ring[idx].entry_speed_sqr < self.ring[idx].max_entry_speed_sqr {
                break;
            }
            self.planned = Self::next_index(self.planned);
        }
    }
}
