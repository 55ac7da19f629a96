//! # Hostpool Core
//!
//! Lifecycle orchestrator for a lending pool of machines. Hosts are
//! onboarded in batches (Launcher), lent out and handed back through the
//! façade, withdrawn by selector-driven recall tasks (Recaller), and
//! decommissioned one by one through a persisted per-host state machine
//! (Recycler) that drives external automation: clear-check jobs, cloud
//! resets, bare-metal reimage orders, template runs, and inventory module
//! transfers.
//!
//! ## Architecture
//!
//! - [`orchestration`]: the pool façade, the three worker pipelines, and
//!   the system wiring that constructs limiters, queues, and pools once
//!   at service start.
//! - [`state_machine`]: host lifecycle phases and the linear decommission
//!   state chain with its paired failure states.
//! - [`store`]: the persistent task-store boundary plus the in-memory
//!   reference implementation.
//! - [`adapters`]: narrow call/poll contracts to the external automation
//!   services.
//! - [`queue`] and [`resilience`]: deduplicating work queues, per-API
//!   token-bucket limits, and the bounded retry driver.
//!
//! Every worker re-reads persisted state before acting, so pipelines are
//! crash-safe: re-enqueueing a detail id resumes exactly where its
//! persisted status left off.

pub mod adapters;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod queue;
pub mod resilience;
pub mod state_machine;
pub mod store;

pub use config::PoolConfig;
pub use error::{PoolError, Result};
pub use orchestration::{Adapters, DetailPage, PoolFacade, PoolSystem, Shutdown};
pub use state_machine::{HostPhase, RecycleState, RecycleStep};
pub use store::{MemoryStore, PoolStore};
