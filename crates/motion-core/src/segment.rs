//! Segment preparer (§4.3): slices the block at the planner's tail into
//! short, fixed-length segments with integer step conservation, publishing
//! them into a single-producer/single-consumer ring the pulse executor
//! drains from.

use crate::mathutil::roundf;
use crate::planner::{Planner, PlannerBlock};
use crate::settings::Settings;
use crate::AXIS_COUNT;
use heapless::spsc::{Consumer, Producer, Queue};

/// Target segment length along the block's own travel distance (§4.3.2).
pub const SEGMENT_LENGTH_MM: f32 = 2.0;
/// The preparer emits at most this many segments per `prep()` call.
pub const MAX_SEGMENTS_PER_TICK: usize = 3;
/// Hard ceiling on `period_counts`: a 16-bit timer period minus headroom.
pub const MAX_PERIOD_COUNTS: u32 = 65_485;
/// Safety margin kept above the configured pulse width (I6).
pub const PERIOD_MARGIN_COUNTS: u32 = 8;

/// One fixed-length (or block-residual) sub-block produced by the preparer
/// (§3.1 `Segment`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Segment {
    pub n_step: u32,
    pub steps: [u32; AXIS_COUNT],
    pub bresenham_counter_init: [u32; AXIS_COUNT],
    pub direction_bits: u8,
    pub period_counts: u16,
    /// True for the first segment sliced from a given planner block. Lets
    /// the executor reset its per-block commanded/executed step counters
    /// (§3.1 `AxisExecState`) instead of carrying them over from the
    /// previous block.
    pub block_boundary_start: bool,
}

/// Bounded single-producer/single-consumer ring of prepared segments (§5.5).
pub struct SegmentRing<const C: usize> {
    queue: Queue<Segment, C>,
}

impl<const C: usize> SegmentRing<C> {
    pub const fn new() -> Self {
        Self { queue: Queue::new() }
    }

    /// Splits the ring into its producer/consumer halves. Requires a
    /// `'static` binding (typically a `static mut`) since the executor
    /// keeps its consumer for the lifetime of the program.
    pub fn split(&'static mut self) -> (Producer<'static, Segment, C>, Consumer<'static, Segment, C>) {
        self.queue.split()
    }
}

impl<const C: usize> Default for SegmentRing<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Precomputed trapezoid shape plus the fractional-step accumulator for the
/// block currently being sliced into segments.
struct ActiveBlock {
    block: PlannerBlock,
    remaining_mm: f32,
    distance_done_mm: f32,
    current_speed_sqr: f32,
    /// Distance (from the block's start) at which cruise ends and
    /// deceleration toward `exit_speed_sqr` begins.
    accelerate_until_mm: f32,
    decelerate_after_mm: f32,
    cruise_speed_sqr: f32,
    exit_speed_sqr: f32,
    fractional_steps: [f32; AXIS_COUNT],
}

impl ActiveBlock {
    fn new(block: PlannerBlock, exit_speed_sqr: f32) -> Self {
        let accel = block.acceleration;
        let mut accelerate_until_mm = if accel > 0.0 {
            ((block.nominal_speed_sqr - block.entry_speed_sqr) / (2.0 * accel)).max(0.0)
        } else {
            0.0
        };
        let mut decelerate_after_mm = if accel > 0.0 {
            block.millimeters - ((block.nominal_speed_sqr - exit_speed_sqr) / (2.0 * accel)).max(0.0)
        } else {
            block.millimeters
        };
        let mut cruise_speed_sqr = block.nominal_speed_sqr;

        if accelerate_until_mm > decelerate_after_mm {
            // Triangle profile: never reaches the nominal cruise speed.
            cruise_speed_sqr = if accel > 0.0 {
                accel * block.millimeters + (block.entry_speed_sqr + exit_speed_sqr) * 0.5
            } else {
                block.entry_speed_sqr.min(exit_speed_sqr)
            };
            accelerate_until_mm = if accel > 0.0 {
                ((cruise_speed_sqr - block.entry_speed_sqr) / (2.0 * accel)).clamp(0.0, block.millimeters)
            } else {
                0.0
            };
            decelerate_after_mm = accelerate_until_mm;
        }

        Self {
            block,
            remaining_mm: block.millimeters,
            distance_done_mm: 0.0,
            current_speed_sqr: block.entry_speed_sqr,
            accelerate_until_mm,
            decelerate_after_mm,
            cruise_speed_sqr,
            exit_speed_sqr,
            fractional_steps: [0.0; AXIS_COUNT],
        }
    }

    /// Velocity^2 at a given distance from the block's start, following the
    /// precomputed accelerate/cruise/decelerate shape.
    fn velocity_sqr_at(&self, distance_mm: f32) -> f32 {
        let accel = self.block.acceleration;
        if distance_mm <= self.accelerate_until_mm {
            self.block.entry_speed_sqr + 2.0 * accel * distance_mm
        } else if distance_mm <= self.decelerate_after_mm {
            self.cruise_speed_sqr
        } else {
            (self.cruise_speed_sqr - 2.0 * accel * (distance_mm - self.decelerate_after_mm))
                .max(self.exit_speed_sqr)
        }
    }
}

/// The segment-preparer state machine (§3.1 `SegmentPrepState`, §4.3).
pub struct SegmentPreparer {
    active: Option<ActiveBlock>,
    underrun_count: u32,
}

impl Default for SegmentPreparer {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentPreparer {
    pub const fn new() -> Self {
        Self { active: None, underrun_count: 0 }
    }

    /// Count of `prep()` calls that found no block available (§4.3.4).
    pub fn underrun_count(&self) -> u32 {
        self.underrun_count
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Produces up to `MAX_SEGMENTS_PER_TICK` segments, stopping early if the
    /// segment ring fills or no planner block is available (§4.3). Returns
    /// `Err(CoreError::BufferFull)` if the segment ring had no room for a
    /// segment that was otherwise ready to enqueue — the push-side
    /// backpressure case of the `BUFFER_FULL` condition (§7); the caller is
    /// expected to retry on its next tick exactly as with `buffer_line`.
    pub fn prep<const K: usize, const C: usize>(
        &mut self,
        planner: &mut Planner<K>,
        settings: &Settings,
        producer: &mut Producer<'_, Segment, C>,
    ) -> Result<(), crate::CoreError> {
        for _ in 0..MAX_SEGMENTS_PER_TICK {
            if !producer.ready() {
                crate::diagnostics::log_segment_buffer_full();
                return Err(crate::CoreError::BufferFull);
            }

            let mut is_new_block = false;
            if self.active.is_none() {
                match planner.get_current_block().copied() {
                    Some(block) => {
                        let exit_speed_sqr = planner.next_entry_speed_sqr().unwrap_or(0.0);
                        self.active = Some(ActiveBlock::new(block, exit_speed_sqr));
                        is_new_block = true;
                    }
                    None => {
                        self.underrun_count = self.underrun_count.saturating_add(1);
                        crate::diagnostics::log_segment_underrun(self.underrun_count);
                        return Ok(());
                    }
                }
            }

            let Some(mut segment) = self.build_segment(settings) else {
                return Ok(());
            };
            segment.block_boundary_start = is_new_block;
            let block_finished = self.active.as_ref().map(|a| a.remaining_mm <= 1e-6).unwrap_or(true);

            if producer.enqueue(segment).is_err() {
                crate::diagnostics::log_segment_buffer_full();
                return Err(crate::CoreError::BufferFull);
            }

            if block_finished {
                self.active = None;
                planner.discard_current_block();
            }
        }
        Ok(())
    }

    fn build_segment(&mut self, settings: &Settings) -> Option<Segment> {
        let active = self.active.as_mut()?;
        let block = active.block;

        let length = if active.remaining_mm < SEGMENT_LENGTH_MM {
            active.remaining_mm
        } else {
            SEGMENT_LENGTH_MM
        };
        if length <= 0.0 {
            return None;
        }

        let end_distance = active.distance_done_mm + length;
        let end_speed_sqr = active.velocity_sqr_at(end_distance).max(0.0);
        let mean_speed =
            (crate::mathutil::sqrtf(active.current_speed_sqr) + crate::mathutil::sqrtf(end_speed_sqr)) * 0.5;

        let mut steps = [0u32; AXIS_COUNT];
        let mut n_step = 0u32;
        let frac = length / block.millimeters;
        for i in 0..AXIS_COUNT {
            active.fractional_steps[i] += block.steps[i] as f32 * frac;
            let whole = active.fractional_steps[i].trunc();
            steps[i] = whole as u32;
            active.fractional_steps[i] -= whole;
            if steps[i] > n_step {
                n_step = steps[i];
            }
        }

        let mut dominant = 0usize;
        for i in 1..AXIS_COUNT {
            if steps[i] > steps[dominant] {
                dominant = i;
            }
        }

        let period_counts = if n_step == 0 || mean_speed <= 0.0 {
            MAX_PERIOD_COUNTS
        } else {
            let mean_speed_mm_per_sec = mean_speed / 60.0;
            let step_rate_hz = mean_speed_mm_per_sec * settings.steps_per_mm(crate::AxisId::ALL[dominant]);
            if step_rate_hz <= 0.0 {
                MAX_PERIOD_COUNTS
            } else {
                roundf(settings.timer_clock_hz() as f32 / step_rate_hz) as u32
            }
        };
        let min_period = settings.pulse_width_counts() as u32 + PERIOD_MARGIN_COUNTS;
        let period_counts = period_counts.clamp(min_period, MAX_PERIOD_COUNTS) as u16;

        let mut bresenham_counter_init = [0u32; AXIS_COUNT];
        for i in 0..AXIS_COUNT {
            bresenham_counter_init[i] = n_step / 2;
        }

        active.remaining_mm -= length;
        active.distance_done_mm = end_distance;
        active.current_speed_sqr = end_speed_sqr;

        Some(Segment {
            n_step,
            steps,
            bresenham_counter_init,
            direction_bits: block.direction_bits,
            period_counts,
            block_boundary_start: false,
        })
    }
}
