//! # Motion Control Core
//!
//! The look-ahead planner, segment preparer, dominant/subordinate pulse
//! executor and arc generator for a 4-axis CNC motion-control core: the
//! subsystem that turns a stream of machine-frame moves into synchronized
//! stepper pulse trains with bounded velocity, acceleration and chord-error
//! guarantees.
//!
//! The G-code tokenizer, serial line buffer, status/settings protocol,
//! homing/probing and the host CLI are external collaborators;
//! this crate only specifies the data it exchanges with them (`ParsedMove`,
//! `MotionMode`, the `Settings` store) and never touches bytes or blocks on
//! I/O itself.
//!
//! `no_std`-capable by default; the `std` feature (the default for host
//! tests, benches and simulation) swaps the f32 math backend and enables
//! plain-text diagnostics in place of `defmt`.

#![cfg_attr(not(feature = "std"), no_std)]

mod mathutil;

pub mod arc;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod planner;
pub mod segment;
pub mod settings;

pub use arc::ArcGenerator;
pub use error::{CoreError, SettingsError};
pub use executor::{AxisExecState, PulseExecutor, PulseGenerator};
pub use planner::{Planner, PlannerBlock};
pub use segment::{Segment, SegmentPreparer, SegmentRing};
pub use settings::{AxisSettings, Settings};

/// Number of physical stepper axes. Nothing else in the crate hard-wires
/// this value: every array is sized `AXIS_COUNT`, so adding a fifth axis is
/// a one-line change here (plus widening `dominant_mask`'s backing integer
/// past 8 axes, noted in `executor`).
pub const AXIS_COUNT: usize = 4;

/// Default planner ring capacity ("commonly 16 blocks").
pub const DEFAULT_PLANNER_CAPACITY: usize = 16;
/// Default segment ring capacity: comfortably ahead of a preparer tick that
/// emits up to 3 segments at a time.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 32;

/// Identifies one of the four physical stepper axes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-support", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisId {
    X,
    Y,
    Z,
    A,
}

impl AxisId {
    /// All axes, in the fixed priority order used to break a dominant-axis
    /// tie: X > Y > Z > A.
    pub const ALL: [AxisId; AXIS_COUNT] = [AxisId::X, AxisId::Y, AxisId::Z, AxisId::A];

    /// This axis's index into an `AXIS_COUNT`-sized array.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            AxisId::X => 0,
            AxisId::Y => 1,
            AxisId::Z => 2,
            AxisId::A => 3,
        }
    }
}

/// Condition flags carried on a `PlannerBlock`.
pub mod condition_flags {
    /// G0 rapid positioning: never subject to a programmed feedrate.
    pub const RAPID_MOTION: u8 = 1 << 0;
    /// Homing / predefined moves: exempt from replanning.
    pub const SYSTEM_MOTION: u8 = 1 << 1;
}

/// The motion mode carried by a `ParsedMove`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MotionMode {
    Rapid,
    Linear,
    ArcCw,
    ArcCcw,
}

/// Center-offset form of an arc move. Only the primary plane (the two
/// lowest-indexed axes, conventionally X/Y) is supported — selecting a
/// different work plane is out of scope.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ArcSpec {
    /// Offset from the arc's start point to its center, in the primary plane.
    pub center_offset: [f32; 2],
    /// `true` for clockwise travel (G2), `false` for counter-clockwise (G3).
    pub clockwise: bool,
}

/// A single accepted motion as delivered by the (external) G-code parser.
///
/// Targets are machine-frame millimeters: any work-coordinate or G92 offset
/// has already been resolved upstream.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ParsedMove {
    pub target_mm: [f32; AXIS_COUNT],
    pub word_present: [bool; AXIS_COUNT],
    pub mode: MotionMode,
    pub feedrate_mm_per_min: f32,
    pub arc: Option<ArcSpec>,
}

/// Delivered to the host protocol layer once a line has fully left the
/// core's pipeline (left the planner ring via `discard_current_block`, for
/// a non-arc move, or once the arc generator's `take_complete` fires).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CompletionNotice {
    pub line_number: u32,
}

pub type DefaultPlanner = planner::Planner<DEFAULT_PLANNER_CAPACITY>;
pub type DefaultSegmentRing = segment::SegmentRing<DEFAULT_SEGMENT_CAPACITY>;
