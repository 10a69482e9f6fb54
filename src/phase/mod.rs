//! Phase executor (spec §4.5): one phase is spawn-worker, wait-for-contract,
//! bounded stuck-retry, recovery-or-block.

pub mod contracts;
mod executor;

pub use contracts::ContractOutcome;
pub use executor::{run_phase, PhaseRequest, PhaseResult};
