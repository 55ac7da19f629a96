use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of a pool host.
///
/// Transitions only flow in these directions: Launching→Idle (Launcher),
/// Idle→InUse (draw), InUse→ForRecall (return/Recaller), ForRecall→Recalled
/// (Recycler transit). Re-admission to Idle happens through a fresh launch
/// cycle, never in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostPhase {
    /// Host is being onboarded into the pool inventory.
    Launching,
    /// Host sits in the pool, available for drawing.
    Idle,
    /// Host is lent out to a consumer business.
    InUse,
    /// Host was handed back and is queued for decommissioning.
    ForRecall,
    /// Decommission pipeline finished; host awaits a new launch cycle.
    Recalled,
}

impl HostPhase {
    /// Check whether a phase change follows the documented lifecycle
    /// directions.
    pub fn may_advance_to(self, next: HostPhase) -> bool {
        matches!(
            (self, next),
            (Self::Launching, Self::Idle)
                | (Self::Idle, Self::InUse)
                | (Self::InUse, Self::ForRecall)
                | (Self::ForRecall, Self::Recalled)
                | (Self::Recalled, Self::Launching)
        )
    }
}

impl fmt::Display for HostPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Launching => write!(f, "launching"),
            Self::Idle => write!(f, "idle"),
            Self::InUse => write!(f, "in_use"),
            Self::ForRecall => write!(f, "for_recall"),
            Self::Recalled => write!(f, "recalled"),
        }
    }
}

impl std::str::FromStr for HostPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "launching" => Ok(Self::Launching),
            "idle" => Ok(Self::Idle),
            "in_use" => Ok(Self::InUse),
            "for_recall" => Ok(Self::ForRecall),
            "recalled" => Ok(Self::Recalled),
            _ => Err(format!("Invalid host phase: {s}")),
        }
    }
}

/// Decommission pipeline state of one recall detail.
///
/// Follows the linear chain
/// `Returned → PreChecking → ClearChecking → Reinstalling → Initializing →
/// DataDeleting → ConfChecking → Transiting → Done`, with a paired
/// `*Failed` state reachable from each in-flight step. Failed states are
/// terminal for the automated pipeline; forward progress requires the
/// resume path or administrative `Terminate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecycleState {
    /// Host confirmed handed back; pre-check has not started.
    Returned,
    PreChecking,
    PreCheckFailed,
    ClearChecking,
    ClearCheckFailed,
    Reinstalling,
    ReinstallFailed,
    Initializing,
    InitializeFailed,
    DataDeleting,
    DataDeleteFailed,
    ConfChecking,
    ConfCheckFailed,
    Transiting,
    TransitFailed,
    /// Pipeline finished; host is back in the pool module.
    Done,
    /// Administrative exit, set out-of-band.
    Terminate,
}

impl RecycleState {
    /// Terminal for every code path, including resume.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Terminate)
    }

    /// Paired failure state of some step. Terminal for the automated
    /// pipeline, recoverable through the resume path.
    pub fn is_failed(&self) -> bool {
        matches!(
            self,
            Self::PreCheckFailed
                | Self::ClearCheckFailed
                | Self::ReinstallFailed
                | Self::InitializeFailed
                | Self::DataDeleteFailed
                | Self::ConfCheckFailed
                | Self::TransitFailed
        )
    }

    /// A state the worker pipeline actively drives forward.
    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal() && !self.is_failed()
    }
}

impl Default for RecycleState {
    fn default() -> Self {
        Self::Returned
    }
}

impl fmt::Display for RecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Returned => "returned",
            Self::PreChecking => "pre_checking",
            Self::PreCheckFailed => "pre_check_failed",
            Self::ClearChecking => "clear_checking",
            Self::ClearCheckFailed => "clear_check_failed",
            Self::Reinstalling => "reinstalling",
            Self::ReinstallFailed => "reinstall_failed",
            Self::Initializing => "initializing",
            Self::InitializeFailed => "initialize_failed",
            Self::DataDeleting => "data_deleting",
            Self::DataDeleteFailed => "data_delete_failed",
            Self::ConfChecking => "conf_checking",
            Self::ConfCheckFailed => "conf_check_failed",
            Self::Transiting => "transiting",
            Self::TransitFailed => "transit_failed",
            Self::Done => "done",
            Self::Terminate => "terminate",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "returned" => Ok(Self::Returned),
            "pre_checking" => Ok(Self::PreChecking),
            "pre_check_failed" => Ok(Self::PreCheckFailed),
            "clear_checking" => Ok(Self::ClearChecking),
            "clear_check_failed" => Ok(Self::ClearCheckFailed),
            "reinstalling" => Ok(Self::Reinstalling),
            "reinstall_failed" => Ok(Self::ReinstallFailed),
            "initializing" => Ok(Self::Initializing),
            "initialize_failed" => Ok(Self::InitializeFailed),
            "data_deleting" => Ok(Self::DataDeleting),
            "data_delete_failed" => Ok(Self::DataDeleteFailed),
            "conf_checking" => Ok(Self::ConfChecking),
            "conf_check_failed" => Ok(Self::ConfCheckFailed),
            "transiting" => Ok(Self::Transiting),
            "transit_failed" => Ok(Self::TransitFailed),
            "done" => Ok(Self::Done),
            "terminate" => Ok(Self::Terminate),
            _ => Err(format!("Invalid recycle state: {s}")),
        }
    }
}
