//! Configuration for the admission-control gate.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{QuotagateError, Result};
use crate::ratelimit::DimensionPolicy;

/// Top-level gate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateConfig {
    /// Counter storage configuration, shared by all dimensions
    #[serde(default)]
    pub store: StoreConfig,

    /// Per-dimension limits
    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Counter storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Maximum tracked keys per dimension
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Staleness bound on counter entries in milliseconds, independent of
    /// and typically looser than any window duration
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_ms: default_ttl_ms(),
        }
    }
}

fn default_capacity() -> usize {
    10_000
}

fn default_ttl_ms() -> u64 {
    600_000
}

impl StoreConfig {
    /// Entry TTL as a duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Reject a zero capacity or TTL at startup.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(QuotagateError::Config(
                "store capacity must be a positive integer".to_string(),
            ));
        }
        if self.ttl_ms == 0 {
            return Err(QuotagateError::Config(
                "store ttl_ms must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-dimension limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    #[serde(default = "default_ip_limit")]
    pub ip: PolicyConfig,

    #[serde(default = "default_user_limit")]
    pub user: PolicyConfig,

    #[serde(default = "default_endpoint_limit")]
    pub endpoint: PolicyConfig,

    #[serde(default = "default_tenant_limit")]
    pub tenant: PolicyConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            ip: default_ip_limit(),
            user: default_user_limit(),
            endpoint: default_endpoint_limit(),
            tenant: default_tenant_limit(),
        }
    }
}

fn default_ip_limit() -> PolicyConfig {
    PolicyConfig {
        limit: 300,
        window_ms: 60_000,
    }
}

fn default_user_limit() -> PolicyConfig {
    PolicyConfig {
        limit: 120,
        window_ms: 60_000,
    }
}

fn default_endpoint_limit() -> PolicyConfig {
    PolicyConfig {
        limit: 600,
        window_ms: 60_000,
    }
}

fn default_tenant_limit() -> PolicyConfig {
    PolicyConfig {
        limit: 1_000,
        window_ms: 60_000,
    }
}

/// Limit and window for one dimension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Maximum requests admitted per window
    pub limit: u32,
    /// Fixed window duration in milliseconds
    pub window_ms: u64,
}

impl PolicyConfig {
    /// Convert into a validated runtime policy.
    pub fn policy(&self) -> Result<DimensionPolicy> {
        DimensionPolicy::new(self.limit, Duration::from_millis(self.window_ms))
    }
}

impl GateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading gate configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GateConfig = serde_yaml::from_str(yaml)
            .map_err(|e| QuotagateError::Config(format!("Failed to parse gate config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every field, failing fast on non-positive limits, windows,
    /// capacity, or TTL.
    pub fn validate(&self) -> Result<()> {
        self.store.validate()?;
        self.limits.ip.policy()?;
        self.limits.user.policy()?;
        self.limits.endpoint.policy()?;
        self.limits.tenant.policy()?;
        Ok(())
    }
}
