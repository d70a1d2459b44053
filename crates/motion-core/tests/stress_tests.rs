//! Backpressure, boundary and end-to-end scenario tests (§8 B1-B4, S1, S2,
//! S5, S6). B5 lives in `determinism_test.rs` alongside the other
//! replan-determinism checks.

use motion_core::{
    condition_flags, AxisId, AxisSettings, Planner, PulseExecutor, PulseGenerator, SegmentPreparer,
    SegmentRing, Settings,
};

fn settings() -> Settings {
    Settings::new(
        [AxisSettings { steps_per_mm: 80.0, max_rate_mm_per_min: 5000.0, max_accel_mm_per_sec2: 500.0 }; 4],
        0.01,
        0.002,
        40,
        1_562_500,
    )
}

/// B1: a move to the current position is accepted but consumes no slot.
#[test]
fn zero_length_move_does_not_change_ring_fill() {
    let s = settings();
    let mut planner: Planner<4> = Planner::new();
    planner.buffer_line(&s, [10.0, 0.0, 0.0, 0.0], 1000.0, 0).unwrap();
    let fill_before = planner.fill();
    let result = planner.buffer_line(&s, [10.0, 0.0, 0.0, 0.0], 1000.0, 0);
    assert_eq!(result, Ok(true));
    assert_eq!(planner.fill(), fill_before);
}

/// B2: a full ring refuses new lines and leaves state untouched.
#[test]
fn full_ring_refuses_and_does_not_mutate_state() {
    let s = settings();
    let mut planner: Planner<4> = Planner::new();
    for i in 1..=4 {
        planner.buffer_line(&s, [i as f32 * 10.0, 0.0, 0.0, 0.0], 1000.0, 0).unwrap();
    }
    assert!(planner.is_full());
    let pos_before = planner.sys_position_steps(AxisId::X);
    let result = planner.buffer_line(&s, [1000.0, 0.0, 0.0, 0.0], 1000.0, 0);
    assert_eq!(result, Ok(false));
    assert_eq!(planner.sys_position_steps(AxisId::X), pos_before);
}

/// B3: a move shorter than one step of the coarsest axis quantization is
/// dropped rather than producing a spurious pulse. At 80 steps/mm, one step
/// is 0.0125 mm; 0.005 mm truncates to zero steps on every axis, so this
/// collapses into the same zero-length path as B1 — no ring slot consumed,
/// no block ever reaches the segment preparer.
#[test]
fn sub_step_move_is_dropped_without_a_spurious_pulse() {
    let s = settings();
    let mut planner: Planner<4> = Planner::new();
    let result = planner.buffer_line(&s, [0.005, 0.0, 0.0, 0.0], 1000.0, 0);
    assert_eq!(result, Ok(true));
    assert_eq!(planner.len(), 0);
    assert!(planner.get_current_block().is_none());
}

/// B4: a full reversal (second move's unit vector ≈ the negation of the
/// first's) drives the second block's `max_entry_speed_sqr`, and therefore
/// its `entry_speed_sqr`, down to the configured floor rather than the
/// shared nominal speed.
#[test]
fn full_reversal_junction_clamps_entry_speed_to_the_floor() {
    let s = settings();
    let mut planner: Planner<4> = Planner::new();
    planner.buffer_line(&s, [10.0, 0.0, 0.0, 0.0], 3000.0, 0).unwrap();
    planner.buffer_line(&s, [0.0, 0.0, 0.0, 0.0], 3000.0, 0).unwrap();

    let floor_sqr = 60.0f32 * 60.0;
    let nominal_sqr = 3000.0f32 * 3000.0;
    let second_entry_sqr = planner.next_entry_speed_sqr().unwrap();
    assert!(second_entry_sqr < nominal_sqr * 0.01, "reversal must not run near nominal speed");
    assert!((second_entry_sqr - floor_sqr).abs() < 1.0, "reversal must clamp to the floor");
}

/// S5: filling a K=16-capacity ring with K+3 moves accepts exactly K, then
/// refuses three; once a block is discarded, the host's retried pending
/// moves are accepted in order.
#[test]
fn planner_backpressure_accepts_exactly_capacity_then_refuses() {
    let s = settings();
    let mut planner: Planner<16> = Planner::new();
    let mut accepted = 0;
    let mut pending = vec![];
    for i in 1..=19 {
        let target = [i as f32 * 5.0, 0.0, 0.0, 0.0];
        match planner.buffer_line(&s, target, 1000.0, 0) {
            Ok(true) => accepted += 1,
            Ok(false) => pending.push(target),
            Err(_) => unreachable!(),
        }
    }
    assert_eq!(accepted, 16);
    assert_eq!(pending.len(), 3);
    assert!(planner.is_full());

    // Drain one block; the first pending move should now be acceptable.
    planner.discard_current_block();
    assert_eq!(planner.buffer_line(&s, pending[0], 1000.0, 0), Ok(true));
}

/// S1: a single-axis move progresses the machine position by exactly one
/// step per dominant pulse, ending at the expected step count, with every
/// other axis held at zero throughout.
#[test]
fn unit_x_move_progresses_monotonically_and_ends_at_expected_step_count() {
    let s = settings();
    let mut planner: Planner<4> = Planner::new();
    planner.buffer_line(&s, [10.0, 0.0, 0.0, 0.0], 1000.0, 0).unwrap();

    static mut RING: SegmentRing<64> = SegmentRing::new();
    let (mut producer, consumer) = unsafe { RING.split() };
    let mut preparer = SegmentPreparer::new();
    let mut iterations = 0;
    while (planner.len() > 0 || preparer.is_active()) && iterations < 10_000 {
        let _ = preparer.prep(&mut planner, &s, &mut producer);
        iterations += 1;
    }

    #[derive(Default)]
    struct NullGenerator;
    impl PulseGenerator for NullGenerator {
        fn set_direction(&mut self, _negative: bool) {}
        fn set_period(&mut self, _period_counts: u16) {}
        fn start(&mut self) {}
        fn stop(&mut self) {}
        fn arm_single_pulse(&mut self) {}
    }

    let generators: [NullGenerator; 4] = Default::default();
    let mut executor = PulseExecutor::from_consumer(generators, consumer);

    let mut last_x = 0;
    let mut iterations = 0;
    while (executor.is_busy() || executor.start_segment_execution()) && iterations < 100_000 {
        iterations += 1;
        if !executor.is_busy() {
            continue;
        }
        executor.on_dominant_pulse(0);
        let x = executor.axis_state(0).machine_position();
        assert!(x == last_x + 1 || x == last_x, "X must progress monotonically by +1");
        last_x = x;
        assert_eq!(executor.axis_state(1).machine_position(), 0);
        assert_eq!(executor.axis_state(2).machine_position(), 0);
        assert_eq!(executor.axis_state(3).machine_position(), 0);
    }
    assert_eq!(last_x, 800);
}

/// S2: a diagonal move keeps X and Y within one step of each other
/// throughout execution and ends with both at the same step count.
#[test]
fn diagonal_move_keeps_axes_within_one_step_of_each_other() {
    let s = settings();
    let mut planner: Planner<4> = Planner::new();
    planner.buffer_line(&s, [10.0, 10.0, 0.0, 0.0], 1000.0, 0).unwrap();

    static mut RING: SegmentRing<64> = SegmentRing::new();
    let (mut producer, consumer) = unsafe { RING.split() };
    let mut preparer = SegmentPreparer::new();
    let mut iterations = 0;
    while (planner.len() > 0 || preparer.is_active()) && iterations < 10_000 {
        let _ = preparer.prep(&mut planner, &s, &mut producer);
        iterations += 1;
    }

    #[derive(Default)]
    struct NullGenerator;
    impl PulseGenerator for NullGenerator {
        fn set_direction(&mut self, _negative: bool) {}
        fn set_period(&mut self, _period_counts: u16) {}
        fn start(&mut self) {}
        fn stop(&mut self) {}
        fn arm_single_pulse(&mut self) {}
    }

    let generators: [NullGenerator; 4] = Default::default();
    let mut executor = PulseExecutor::from_consumer(generators, consumer);

    let mut iterations = 0;
    while (executor.is_busy() || executor.start_segment_execution()) && iterations < 100_000 {
        iterations += 1;
        if !executor.is_busy() {
            continue;
        }
        let dominant = if executor.dominant_mask() & 1 != 0 { 0 } else { 1 };
        executor.on_dominant_pulse(dominant);
        let x = executor.axis_state(0).machine_position();
        let y = executor.axis_state(1).machine_position();
        assert!((x - y).abs() <= 1, "X/Y diverged: x={x} y={y}");
    }
    assert_eq!(executor.axis_state(0).machine_position(), 800);
    assert_eq!(executor.axis_state(1).machine_position(), 800);
}

/// S6: `stop_all` during motion halts every axis immediately and freezes
/// `machine_position`; no further motion changes it.
#[test]
fn soft_reset_freezes_machine_position_mid_move() {
    let s = settings();
    let mut planner: Planner<4> = Planner::new();
    planner.buffer_line(&s, [1000.0, 0.0, 0.0, 0.0], 500.0, 0).unwrap();

    static mut RING: SegmentRing<256> = SegmentRing::new();
    let (mut producer, consumer) = unsafe { RING.split() };
    let mut preparer = SegmentPreparer::new();
    preparer.prep(&mut planner, &s, &mut producer).unwrap();

    #[derive(Default)]
    struct NullGenerator;
    impl PulseGenerator for NullGenerator {
        fn set_direction(&mut self, _negative: bool) {}
        fn set_period(&mut self, _period_counts: u16) {}
        fn start(&mut self) {}
        fn stop(&mut self) {}
        fn arm_single_pulse(&mut self) {}
    }
    let generators: [NullGenerator; 4] = Default::default();
    let mut executor = PulseExecutor::from_consumer(generators, consumer);
    executor.start_segment_execution();
    for _ in 0..5 {
        executor.on_dominant_pulse(0);
    }

    let frozen = executor.axis_state(0).machine_position();
    executor.stop_all();
    assert!(!executor.is_busy());
    assert_eq!(executor.axis_state(0).machine_position(), frozen);

    // No further pulse can move it: the executor is idle and busy with no
    // segment to execute.
    assert!(!executor.start_segment_execution());
    assert_eq!(executor.axis_state(0).machine_position(), frozen);
}

/// Stress: filling and draining the planner/segment pipeline repeatedly
/// with many small moves never violates the step-conservation invariant,
/// and the segment preparer's underrun counter only increments when the
/// planner genuinely has nothing queued.
#[test]
fn many_small_moves_preserve_step_conservation_under_sustained_load() {
    let s = settings();
    let mut planner: Planner<16> = Planner::new();
    static mut RING: SegmentRing<64> = SegmentRing::new();
    let (mut producer, mut consumer) = unsafe { RING.split() };
    let mut preparer = SegmentPreparer::new();

    let mut total_emitted = 0u64;
    let mut total_expected = 0u64;
    let mut x = 0.0f32;

    for i in 0..200 {
        x += 1.3;
        let target = [x, 0.0, 0.0, 0.0];
        loop {
            match planner.buffer_line(&s, target, 2000.0, condition_flags::RAPID_MOTION) {
                Ok(true) => break,
                Ok(false) => {
                    let _ = preparer.prep(&mut planner, &s, &mut producer);
                    while let Some(seg) = consumer.dequeue() {
                        total_emitted += seg.n_step as u64;
                    }
                }
                Err(e) => panic!("unexpected error at move {i}: {e:?}"),
            }
        }
        total_expected = (x * s.steps_per_mm(AxisId::X)) as u64;
    }

    for _ in 0..10_000 {
        let _ = preparer.prep(&mut planner, &s, &mut producer);
        while let Some(seg) = consumer.dequeue() {
            total_emitted += seg.n_step as u64;
        }
        if planner.is_empty() && !preparer.is_active() {
            break;
        }
    }

    assert_eq!(total_emitted, total_expected);
}
