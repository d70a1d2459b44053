//! Diagnostic logging hooks (§4.3.4, §7): surfaced only from main-flow or
//! low-priority-tick contexts, never from the pulse-interrupt path. Mirrors
//! the existing firmware's `defmt::info!`/`defmt::error!` split on the
//! embedded target, falling back to plain `std` output for host tests and
//! simulation.

#[allow(unused_variables)]
pub fn log_segment_underrun(count: u32) {
    #[cfg(feature = "defmt-log")]
    defmt::warn!("segment ring underrun (count={})", count);
}

#[allow(unused_variables)]
pub fn log_planner_buffer_full(target_mm: &[f32]) {
    #[cfg(feature = "defmt-log")]
    defmt::warn!("planner ring full, move refused");
    #[cfg(all(feature = "std", not(feature = "defmt-log")))]
    std::eprintln!("planner ring full, move refused: target={:?}", target_mm);
}

pub fn log_segment_buffer_full() {
    #[cfg(feature = "defmt-log")]
    defmt::warn!("segment ring full, preparer stalled");
    #[cfg(all(feature = "std", not(feature = "defmt-log")))]
    std::eprintln!("segment ring full, preparer stalled");
}

#[allow(unused_variables)]
pub fn log_emergency_stop(reason: &str) {
    #[cfg(feature = "defmt-log")]
    defmt::error!("emergency stop triggered: {}", reason);
    #[cfg(all(feature = "std", not(feature = "defmt-log")))]
    {
        std::eprintln!("emergency stop triggered: {reason}");
    }
}
