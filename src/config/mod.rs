//! # Configuration
//!
//! Explicit, validated configuration for the pool orchestrator. Values come
//! from an optional TOML file plus `HOSTPOOL_`-prefixed environment
//! overrides; every section has working defaults so tests can construct a
//! config inline.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{PoolError, Result};
use crate::models::{GradeCfg, GradeEntry, OsType};
use crate::resilience::{ApiBudget, RateBudget};

/// Worker-pool sizing and scheduling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelinesConfig {
    pub launcher_workers: usize,
    pub recaller_workers: usize,
    /// Recycler runs a larger pool given its higher fan-out.
    pub recycler_workers: usize,
    /// Delay before re-checking an in-flight external job.
    pub poll_delay_secs: u64,
    /// Dequeue throttle applied to every pipeline queue.
    pub queue_budget: RateBudget,
}

impl Default for PipelinesConfig {
    fn default() -> Self {
        Self {
            launcher_workers: 2,
            recaller_workers: 2,
            recycler_workers: 8,
            poll_delay_secs: 300,
            queue_budget: RateBudget {
                rate: 50.0,
                burst: 100,
            },
        }
    }
}

/// Business/module layout of the pool inside the inventory system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryTopology {
    /// Business newly-acquired hosts arrive from.
    pub resource_biz: i64,
    /// Business that owns the pool.
    pub pool_biz: i64,
    /// Module holding idle pool hosts.
    pub idle_module: i64,
    /// Holding area for hosts mid-decommission.
    pub transit_module: i64,
}

impl Default for InventoryTopology {
    fn default() -> Self {
        Self {
            resource_biz: 1,
            pool_biz: 100,
            idle_module: 1001,
            transit_module: 1002,
        }
    }
}

/// Automation template and job names, per step and OS.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Business id the ops-job runner executes under.
    pub ops_biz: i64,
    pub clear_check_job_linux: String,
    pub clear_check_job_windows: String,
    pub initialize_linux: i64,
    pub initialize_windows: i64,
    pub data_delete_linux: i64,
    pub conf_check_linux: i64,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            ops_biz: 100,
            clear_check_job_linux: "host-clear-check-linux".to_string(),
            clear_check_job_windows: "host-clear-check-windows".to_string(),
            initialize_linux: 2001,
            initialize_windows: 2002,
            data_delete_linux: 2003,
            conf_check_linux: 2004,
        }
    }
}

/// Reinstallation defaults and retry budget of the recycle pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecycleConfig {
    /// Fallback image when the recall order carries no policy.
    pub default_image_id: String,
    pub default_os: OsType,
    pub retry_timeout_secs: u64,
    pub retry_interval_ms: u64,
}

impl Default for RecycleConfig {
    fn default() -> Self {
        Self {
            default_image_id: "img-base-linux".to_string(),
            default_os: OsType::Linux,
            retry_timeout_secs: 60,
            retry_interval_ms: 500,
        }
    }
}

/// Per-API rate budgets for the shared limiter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub fallback: ApiBudget,
    pub apis: HashMap<String, ApiBudget>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub pipelines: PipelinesConfig,
    pub inventory: InventoryTopology,
    pub templates: TemplatesConfig,
    pub recycle: RecycleConfig,
    pub limits: LimitsConfig,
    pub grades: Vec<GradeEntry>,
}

impl PoolConfig {
    /// Load from the given file (optional) plus `HOSTPOOL_` env overrides.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        let config: PoolConfig = builder
            .add_source(Environment::with_prefix("HOSTPOOL").separator("__"))
            .build()
            .map_err(|e| PoolError::Configuration(e.to_string()))?
            .try_deserialize()
            .map_err(|e| PoolError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipelines.launcher_workers == 0
            || self.pipelines.recaller_workers == 0
            || self.pipelines.recycler_workers == 0
        {
            return Err(PoolError::Configuration(
                "every pipeline needs at least one worker".to_string(),
            ));
        }
        if self.pipelines.poll_delay_secs == 0 {
            return Err(PoolError::Configuration(
                "poll_delay_secs must be non-zero".to_string(),
            ));
        }
        if self.recycle.default_image_id.is_empty() {
            return Err(PoolError::Configuration(
                "default_image_id must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.pipelines.poll_delay_secs)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_secs(self.recycle.retry_timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.recycle.retry_interval_ms)
    }

    pub fn grade_cfg(&self) -> GradeCfg {
        GradeCfg::from_entries(self.grades.clone())
    }
}
