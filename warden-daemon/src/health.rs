//! Aggregated health check reporting.
//!
//! The overall daemon status is the worst status among its components:
//!
//! - All Healthy -> Healthy
//! - Any Degraded, none Unhealthy -> Degraded(reason)
//! - Any Unhealthy -> Unhealthy(reason)

use serde::Serialize;

use warden_core::pipeline::{HealthStatus, SystemRegistry};

/// Aggregated health report for the daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Worst of all component statuses.
    pub status: HealthStatus,
    pub uptime_secs: u64,
    pub modules: Vec<ModuleHealth>,
}

/// Health status for a single component.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleHealth {
    /// Component name (e.g., "feed-pipeline", "registry").
    pub name: String,
    pub enabled: bool,
    pub status: HealthStatus,
}

/// Aggregate component statuses into a single status.
///
/// Only enabled components are considered.
pub fn aggregate_status(modules: &[ModuleHealth]) -> HealthStatus {
    let mut degraded = Vec::new();
    let mut unhealthy = Vec::new();

    for module in modules.iter().filter(|m| m.enabled) {
        match &module.status {
            HealthStatus::Healthy => {}
            HealthStatus::Degraded(reason) => degraded.push(format!("{}: {}", module.name, reason)),
            HealthStatus::Unhealthy(reason) => {
                unhealthy.push(format!("{}: {}", module.name, reason))
            }
        }
    }

    if !unhealthy.is_empty() {
        HealthStatus::Unhealthy(unhealthy.join("; "))
    } else if !degraded.is_empty() {
        HealthStatus::Degraded(degraded.join("; "))
    } else {
        HealthStatus::Healthy
    }
}

/// Probe the registry with a cheap read.
///
/// An unreachable store is Unhealthy, never "empty".
pub async fn registry_health(registry: &dyn SystemRegistry) -> ModuleHealth {
    let status = match registry.count().await {
        Ok(_) => HealthStatus::Healthy,
        Err(e) => HealthStatus::Unhealthy(e.to_string()),
    };
    ModuleHealth {
        name: format!("registry ({})", registry.backend()),
        enabled: true,
        status,
    }
}
