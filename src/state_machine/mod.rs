// State machine module for the host-pool lifecycle
//
// Explicit enumerated states with a transition table, replacing the
// string-constant switch the pipelines would otherwise carry. A worker
// always re-reads the persisted state before acting, so these types never
// hold authority of their own.

pub mod states;
pub mod transitions;

pub use states::{HostPhase, RecycleState};
pub use transitions::{step_for_failed, RecycleStep};
