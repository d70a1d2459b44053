//! Dominant/subordinate pulse executor (§4.4): drains the segment ring,
//! picks the axis with the most steps in a segment to own the hardware
//! timer ("dominant"), and bit-bangs the remaining ("subordinate") axes from
//! that axis's pulse interrupt via a Bresenham error accumulator. The
//! pulse-generating role moves between axes from one segment to the next,
//! so the `PulseGenerator` trait below is implemented once per axis rather
//! than fixed to a single hardware timer.

use crate::segment::Segment;
use crate::AXIS_COUNT;
use core::sync::atomic::{AtomicU8, Ordering};
use heapless::spsc::Consumer;

/// A per-axis hardware pulse generator: a 16-bit timer paired with a compare
/// unit that emits one fixed-width step pulse per period, plus the step's
/// direction GPIO (§6.3, §9's design note calling for this trait explicitly).
pub trait PulseGenerator {
    fn set_direction(&mut self, negative: bool);
    fn set_period(&mut self, period_counts: u16);
    fn start(&mut self);
    fn stop(&mut self);
    /// Emits one pulse immediately, outside the generator's own periodic
    /// schedule — how a subordinate axis is driven from the dominant axis's
    /// Bresenham trigger (§4.4.2).
    fn arm_single_pulse(&mut self);
}

/// Per-axis execution bookkeeping, touched by both the main flow and the
/// per-pulse interrupt handlers (§3.1 `AxisExecState`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AxisExecState {
    steps_emitted_this_segment: u32,
    bresenham_counter: u32,
    active: bool,
    machine_position: i32,
    /// Running total of steps commanded for this axis across the planner
    /// block currently in flight, reset at each `block_boundary_start`
    /// segment. Lets a diagnostics/verification pass cross-check I2 (step
    /// conservation) against the executor's own view, not just the
    /// preparer's.
    block_steps_commanded: u32,
    /// Running total of steps this axis has actually emitted within the
    /// same block, reset alongside `block_steps_commanded`.
    block_steps_executed: u32,
}

impl AxisExecState {
    pub fn machine_position(&self) -> i32 {
        self.machine_position
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn block_steps_commanded(&self) -> u32 {
        self.block_steps_commanded
    }

    pub fn block_steps_executed(&self) -> u32 {
        self.block_steps_executed
    }
}

/// The pulse executor (§4.4, §3.1 `ExecutorState`): owns the `AXIS_COUNT`
/// hardware pulse generators and the segment-ring consumer for the lifetime
/// of the program.
pub struct PulseExecutor<G: PulseGenerator, const C: usize> {
    generators: [G; AXIS_COUNT],
    axes: [AxisExecState; AXIS_COUNT],
    /// One bit per axis: 1 = currently dominant. Written with `Release`
    /// ordering only after the new segment's hardware is fully armed, and
    /// read with `Acquire` by every ISR entry point (I5).
    dominant_mask: AtomicU8,
    current_segment: Option<Segment>,
    segment_consumer: Consumer<'static, Segment, C>,
}

impl<G: PulseGenerator, const C: usize> PulseExecutor<G, C> {
    /// Builds an executor from the consumer half of a `SegmentRing`; the
    /// caller keeps the producer half for the segment preparer. Splitting
    /// the ring here instead would strand the producer with no owner.
    pub fn from_consumer(generators: [G; AXIS_COUNT], segment_consumer: Consumer<'static, Segment, C>) -> Self {
        Self {
            generators,
            axes: [AxisExecState::default(); AXIS_COUNT],
            dominant_mask: AtomicU8::new(0),
            current_segment: None,
            segment_consumer,
        }
    }

    /// True while any axis still has pulses left to emit (§4.4.6).
    pub fn is_busy(&self) -> bool {
        self.axes.iter().any(|a| a.active)
    }

    pub fn axis_state(&self, axis: usize) -> &AxisExecState {
        &self.axes[axis]
    }

    pub fn dominant_mask(&self) -> u8 {
        self.dominant_mask.load(Ordering::Acquire)
    }

    fn dominant_axis_of(segment: &Segment) -> usize {
        let mut best = 0usize;
        for i in 1..AXIS_COUNT {
            if segment.steps[i] > segment.steps[best] {
                best = i;
            }
        }
        best
    }

    /// Starts execution of the next queued segment if the executor is
    /// currently idle (§4.4.1). Returns `false` if already busy or if the
    /// segment ring has nothing queued.
    pub fn start_segment_execution(&mut self) -> bool {
        if self.is_busy() {
            return false;
        }
        let Some(segment) = self.segment_consumer.dequeue() else {
            return false;
        };
        self.arm_segment(segment);
        true
    }

    fn arm_segment(&mut self, segment: Segment) {
        let dominant = Self::dominant_axis_of(&segment);

        for i in 0..AXIS_COUNT {
            let moving = segment.steps[i] > 0 || i == dominant;
            if moving {
                let negative = segment.direction_bits & (1 << i) != 0;
                self.generators[i].set_direction(negative);
            }
            self.axes[i].steps_emitted_this_segment = 0;
            self.axes[i].bresenham_counter = segment.bresenham_counter_init[i];
            self.axes[i].active = moving;
            if segment.block_boundary_start {
                self.axes[i].block_steps_commanded = segment.steps[i];
                self.axes[i].block_steps_executed = 0;
            } else {
                self.axes[i].block_steps_commanded += segment.steps[i];
            }
        }

        for i in 0..AXIS_COUNT {
            if i == dominant {
                self.generators[i].set_period(segment.period_counts);
            } else {
                self.generators[i].stop();
            }
        }

        self.current_segment = Some(segment);
        self.generators[dominant].start();
        self.dominant_mask.store(1 << dominant, Ordering::Release);
    }

    fn apply_pulse(&mut self, axis: usize) {
        let Some(segment) = self.current_segment.as_ref() else { return };
        let negative = segment.direction_bits & (1 << axis) != 0;
        self.axes[axis].machine_position += if negative { -1 } else { 1 };
        self.axes[axis].steps_emitted_this_segment += 1;
        self.axes[axis].block_steps_executed += 1;
    }

    /// Called from the dominant axis's pulse-generator interrupt (§4.4.2).
    /// Updates the dominant axis's own bookkeeping, advances every
    /// subordinate axis's Bresenham accumulator and fires a single pulse on
    /// any that have crossed their threshold this cycle, then transitions to
    /// the next segment if this one is exhausted.
    pub fn on_dominant_pulse(&mut self, axis: usize) {
        self.apply_pulse(axis);

        let Some(segment) = self.current_segment else { return };

        for i in 0..AXIS_COUNT {
            if i == axis || segment.steps[i] == 0 {
                continue;
            }
            self.axes[i].bresenham_counter += segment.steps[i];
            if self.axes[i].bresenham_counter >= segment.n_step {
                self.axes[i].bresenham_counter -= segment.n_step;
                self.generators[i].arm_single_pulse();
                self.apply_pulse(i);
            }
        }

        if self.axes[axis].steps_emitted_this_segment >= segment.n_step {
            self.complete_segment();
        }
    }

    /// Called from a subordinate axis's own pulse-generator interrupt
    /// (§4.4.3), e.g. after `arm_single_pulse` physically completes. Does
    /// not repeat any bookkeeping the dominant ISR already performed; it
    /// only settles the axis's hardware and detects a dominant/subordinate
    /// role swap for the next segment.
    pub fn on_subordinate_pulse(&mut self, axis: usize) {
        let mask = self.dominant_mask.load(Ordering::Acquire);
        if mask & (1 << axis) != 0 {
            self.on_dominant_pulse(axis);
        } else {
            self.generators[axis].stop();
        }
    }

    fn complete_segment(&mut self) {
        let Some(segment) = self.current_segment else { return };
        let dominant = Self::dominant_axis_of(&segment);
        self.generators[dominant].stop();

        match self.segment_consumer.dequeue() {
            None => {
                self.dominant_mask.store(0, Ordering::Release);
                self.current_segment = None;
                for axis in &mut self.axes {
                    axis.active = false;
                }
            }
            Some(next) => {
                critical_section::with(|_cs| {
                    let new_dominant = Self::dominant_axis_of(&next);
                    for i in 0..AXIS_COUNT {
                        self.axes[i].steps_emitted_this_segment = 0;
                        self.axes[i].bresenham_counter = next.bresenham_counter_init[i];
                        let moving = next.steps[i] > 0 || i == new_dominant;
                        if moving {
                            let negative = next.direction_bits & (1 << i) != 0;
                            self.generators[i].set_direction(negative);
                        } else {
                            self.generators[i].stop();
                        }
                        self.axes[i].active = moving;
                        if next.block_boundary_start {
                            self.axes[i].block_steps_commanded = next.steps[i];
                            self.axes[i].block_steps_executed = 0;
                        } else {
                            self.axes[i].block_steps_commanded += next.steps[i];
                        }
                    }
                    self.generators[new_dominant].set_period(next.period_counts);
                    self.current_segment = Some(next);
                    self.generators[new_dominant].start();
                    self.dominant_mask.store(1 << new_dominant, Ordering::Release);
                });
            }
        }
    }

    /// Unconditional hardware halt (§4.4.5): every generator stops and the
    /// executor goes idle. `machine_position` values are left untouched.
    pub fn stop_all(&mut self) {
        if self.is_busy() {
            crate::diagnostics::log_emergency_stop("stop_all");
        }
        for generator in &mut self.generators {
            generator.stop();
        }
        for axis in &mut self.axes {
            axis.active = false;
        }
        self.dominant_mask.store(0, Ordering::Release);
        self.current_segment = None;
    }
}
