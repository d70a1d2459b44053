//! Error types that cross the core's boundary (§7 of the design notes).
//!
//! The core never unwinds and never blocks: every fallible entry point
//! returns one of these values. Interrupt-context code never raises an
//! error — it either does its work this cycle or skips it silently.

/// Errors raised by the core's public, fallible operations.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CoreError {
    /// A ring (planner or segment) had no free slot. Backpressure, not a
    /// caller bug — retry once capacity frees up.
    BufferFull,
    /// A non-rapid move was requested with a feedrate <= 0.
    UndefinedFeedRate,
    /// The arc generator was handed a geometrically inconsistent move (the
    /// start and end radii disagree, or the travel angle is degenerate).
    ArcGeometry,
    /// Debug-only watchdog trip: the executor was busy-but-idle or
    /// idle-but-busy for longer than a sanity bound allows.
    #[cfg(feature = "watchdog")]
    TimeoutGuard,
}

/// Errors raised when mutating `Settings` at runtime.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SettingsError {
    /// Settings may only be replaced while the planner ring is empty.
    PlannerNotEmpty,
}
