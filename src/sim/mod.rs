/// Bounded cycle counter.
pub mod clock;
pub mod kpi;
/// The per-cycle simulation pipeline.
pub mod pipeline;
pub mod types;
