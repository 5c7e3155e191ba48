//! Configuration for the query gateway module.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use query_gateway_sdk::Tenant;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::admission::API_QUERIES_CONCURRENCY_FEATURE;

/// Environment variable prefix for overrides, e.g. `QUERY_GATEWAY__MAX_QUERY_TIMEOUT=5m`.
pub const ENV_PREFIX: &str = "QUERY_GATEWAY__";

/// Query gateway configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryGatewayConfig {
    /// Feature whose entitlement turns on per-tenant concurrency limits.
    #[serde(default = "default_feature_name")]
    pub feature_name: String,

    /// Simultaneous admitted queries allowed per limited tenant.
    #[serde(default = "default_max_concurrent_queries_per_tenant")]
    pub max_concurrent_queries_per_tenant: usize,

    /// Advertised upper bound on query run time. Informational only: the
    /// gateway never cancels a running query, timeouts belong to the engine.
    #[serde(default = "default_max_query_timeout", with = "humantime_serde")]
    pub max_query_timeout: Duration,

    /// Tenants served by the bundled static directory.
    pub tenants: Vec<Tenant>,

    /// Feature entitlements served by the bundled static subscription client.
    pub entitlements: Vec<OrganizationEntitlements>,

    /// Per-tenant request rate limits applied before admission.
    pub throttle: RequestThrottleConfig,
}

/// Burst and sustained request quotas, both keyed by tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequestThrottleConfig {
    pub enabled: bool,
    /// Short window quota, e.g. 120 per minute.
    pub burst: RateQuota,
    /// Long window quota, e.g. 2400 per hour.
    pub sustained: RateQuota,
}

impl Default for RequestThrottleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            burst: RateQuota {
                requests: 120,
                per: Duration::from_secs(60),
            },
            sustained: RateQuota {
                requests: 2400,
                per: Duration::from_secs(3600),
            },
        }
    }
}

/// `requests` allowed per `per` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateQuota {
    pub requests: u32,
    #[serde(with = "humantime_serde")]
    pub per: Duration,
}

impl RateQuota {
    fn validate(&self, name: &str) -> anyhow::Result<()> {
        if self.requests == 0 {
            bail!("throttle.{name}.requests must be at least 1");
        }
        if self.per.is_zero() {
            bail!("throttle.{name}.per must be non-zero");
        }
        Ok(())
    }
}

/// Features an organization's plan includes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganizationEntitlements {
    pub organization_id: Uuid,
    #[serde(default)]
    pub features: Vec<String>,
}

fn default_feature_name() -> String {
    API_QUERIES_CONCURRENCY_FEATURE.to_owned()
}

fn default_max_concurrent_queries_per_tenant() -> usize {
    3
}

fn default_max_query_timeout() -> Duration {
    Duration::from_secs(600)
}

impl Default for QueryGatewayConfig {
    fn default() -> Self {
        Self {
            feature_name: default_feature_name(),
            max_concurrent_queries_per_tenant: default_max_concurrent_queries_per_tenant(),
            max_query_timeout: default_max_query_timeout(),
            tenants: Vec::new(),
            entitlements: Vec::new(),
            throttle: RequestThrottleConfig::default(),
        }
    }
}

impl QueryGatewayConfig {
    /// Layered sources: defaults, then the YAML file (if any), then `QUERY_GATEWAY__*` env.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Loads and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if a source cannot be parsed or the result is invalid.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config: Self = Self::figment(path)
            .extract()
            .context("failed to load query gateway configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns error if a limit or name is unusable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.feature_name.trim().is_empty() {
            bail!("feature_name must not be empty");
        }
        if self.max_concurrent_queries_per_tenant == 0 {
            bail!("max_concurrent_queries_per_tenant must be at least 1");
        }
        if self.throttle.enabled {
            self.throttle.burst.validate("burst")?;
            self.throttle.sustained.validate("sustained")?;
        }
        Ok(())
    }
}

/// Serde adapter for human readable durations (`"30s"`, `"10m"`).
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S>(duration: &Duration, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.collect_str(&humantime::format_duration(*duration))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}
