//! Multi-dimensional admission gate.
//!
//! Composes the four dimension limiters in fixed precedence: IP (always),
//! User (if authenticated), Endpoint (always), Tenant (if resolved). The
//! first denial short-circuits; dimensions evaluated before the denying one
//! stay charged, dimensions after it are never invoked.

use std::sync::Arc;

use tracing::trace;

use crate::clock::{Clock, SystemClock};
use crate::config::{GateConfig, LimitsConfig, StoreConfig};
use crate::error::Result;

use super::context::RequestContext;
use super::limiter::{Decision, Dimension, DimensionLimiter, DimensionPolicy};

/// The four dimension stores, owned as one explicit value.
///
/// Created once by the server's composition root and handed to the gate
/// behind an `Arc`; tests construct isolated registries and run in parallel
/// without cross-test interference.
pub struct RateLimiterRegistry {
    ip: DimensionLimiter,
    user: DimensionLimiter,
    endpoint: DimensionLimiter,
    tenant: DimensionLimiter,
}

impl RateLimiterRegistry {
    /// Create a registry with one bounded store per dimension.
    pub fn new(store: &StoreConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        store.validate()?;
        let make = |dimension| {
            DimensionLimiter::new(dimension, store.capacity, store.ttl(), clock.clone())
        };
        Ok(Self {
            ip: make(Dimension::Ip),
            user: make(Dimension::User),
            endpoint: make(Dimension::Endpoint),
            tenant: make(Dimension::Tenant),
        })
    }

    /// Create a registry on the system clock.
    pub fn with_system_clock(store: &StoreConfig) -> Result<Self> {
        Self::new(store, Arc::new(SystemClock))
    }

    /// The limiter for one dimension.
    pub fn limiter(&self, dimension: Dimension) -> &DimensionLimiter {
        match dimension {
            Dimension::Ip => &self.ip,
            Dimension::User => &self.user,
            Dimension::Endpoint => &self.endpoint,
            Dimension::Tenant => &self.tenant,
        }
    }

    /// All limiters in precedence order.
    pub fn limiters(&self) -> [&DimensionLimiter; 4] {
        [&self.ip, &self.user, &self.endpoint, &self.tenant]
    }
}

/// Validated per-dimension policies for the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicies {
    pub ip: DimensionPolicy,
    pub user: DimensionPolicy,
    pub endpoint: DimensionPolicy,
    pub tenant: DimensionPolicy,
}

impl GatePolicies {
    /// Build validated policies from configuration.
    pub fn from_config(limits: &LimitsConfig) -> Result<Self> {
        Ok(Self {
            ip: limits.ip.policy()?,
            user: limits.user.policy()?,
            endpoint: limits.endpoint.policy()?,
            tenant: limits.tenant.policy()?,
        })
    }
}

/// The admission gate evaluated on every inbound request.
pub struct CompositeGate {
    registry: Arc<RateLimiterRegistry>,
    policies: GatePolicies,
}

impl CompositeGate {
    /// Create a gate over an existing registry.
    pub fn new(registry: Arc<RateLimiterRegistry>, policies: GatePolicies) -> Result<Self> {
        policies.ip.validate()?;
        policies.user.validate()?;
        policies.endpoint.validate()?;
        policies.tenant.validate()?;
        Ok(Self { registry, policies })
    }

    /// Create a gate and its registry from configuration, on the system
    /// clock. Convenience for the common composition-root case.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let registry = Arc::new(RateLimiterRegistry::with_system_clock(&config.store)?);
        Self::new(registry, GatePolicies::from_config(&config.limits)?)
    }

    /// The registry backing this gate.
    pub fn registry(&self) -> &Arc<RateLimiterRegistry> {
        &self.registry
    }

    /// The configured policies.
    pub fn policies(&self) -> &GatePolicies {
        &self.policies
    }

    /// Decide admission for one request.
    ///
    /// Evaluates IP, then User (if authenticated), then Endpoint, then
    /// Tenant (if resolved). The first denial is returned verbatim, tagged
    /// with the violated dimension; dimensions already evaluated remain
    /// charged, later ones are never invoked. When every applicable
    /// dimension admits the request, the aggregate reports the tightest
    /// remaining quota among the dimensions actually checked rather than a
    /// sentinel.
    pub fn check(&self, ctx: &RequestContext) -> Decision {
        let ip_key = ctx.ip_key();
        let mut tightest = self.registry.ip.check(&ip_key, &self.policies.ip);
        if !tightest.allowed {
            return tightest;
        }

        if let Some(user_key) = ctx.user_key() {
            let decision = self.registry.user.check(user_key, &self.policies.user);
            if !decision.allowed {
                return decision;
            }
            tighten(&mut tightest, decision);
        }

        let endpoint_key = ctx.endpoint_key();
        let decision = self
            .registry
            .endpoint
            .check(&endpoint_key, &self.policies.endpoint);
        if !decision.allowed {
            return decision;
        }
        tighten(&mut tightest, decision);

        if let Some(tenant_key) = ctx.tenant_key() {
            let decision = self.registry.tenant.check(tenant_key, &self.policies.tenant);
            if !decision.allowed {
                return decision;
            }
            tighten(&mut tightest, decision);
        }

        trace!(
            ip = %ip_key,
            endpoint = %endpoint_key,
            remaining = tightest.remaining,
            "Request admitted on all dimensions"
        );
        tightest
    }
}

/// Keep the decision with the least remaining quota; earlier dimensions win
/// ties.
fn tighten(tightest: &mut Decision, candidate: Decision) {
    if candidate.remaining < tightest.remaining {
        *tightest = candidate;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::config::PolicyConfig;

    fn policies(ip: u32, user: u32, endpoint: u32, tenant: u32) -> GatePolicies {
        let policy = |limit| DimensionPolicy::new(limit, Duration::from_millis(1000)).unwrap();
        GatePolicies {
            ip: policy(ip),
            user: policy(user),
            endpoint: policy(endpoint),
            tenant: policy(tenant),
        }
    }

    fn gate(policies: GatePolicies) -> (CompositeGate, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let registry =
            Arc::new(RateLimiterRegistry::new(&StoreConfig::default(), clock.clone()).unwrap());
        (CompositeGate::new(registry, policies).unwrap(), clock)
    }

    fn full_context() -> RequestContext {
        RequestContext::new("GET", "/api/v1/plugins")
            .with_forwarded_for("1.2.3.4")
            .with_principal("user-1")
            .with_tenant("tenant-1")
    }

    #[test]
    fn test_all_dimensions_pass_reports_tightest_remaining() {
        let (gate, _clock) = gate(policies(100, 10, 3, 100));

        let decision = gate.check(&full_context());

        assert!(decision.allowed);
        // Endpoint is the tightest dimension: 3 - 1 = 2 remaining.
        assert_eq!(decision.limit, 3);
        assert_eq!(decision.remaining, 2);
        assert_eq!(decision.violated_dimension, None);
        assert!(decision.message.is_none());
    }

    #[test]
    fn test_endpoint_violation_is_reported_precisely() {
        let (gate, _clock) = gate(policies(100, 100, 2, 100));
        let ctx = full_context();

        gate.check(&ctx);
        gate.check(&ctx);
        let denied = gate.check(&ctx);

        assert!(!denied.allowed);
        assert_eq!(denied.violated_dimension, Some(Dimension::Endpoint));
        assert_eq!(denied.limit, 2);
        assert_eq!(denied.remaining, 0);
        assert_eq!(
            denied.message.as_deref(),
            Some("endpoint limit exceeded (3/2)")
        );
    }

    #[test]
    fn test_denial_charges_earlier_dimensions_but_not_later() {
        let (gate, _clock) = gate(policies(100, 100, 1, 100));
        let ctx = full_context();

        gate.check(&ctx);
        // Second request: IP and User charged, Endpoint denies, Tenant
        // never invoked.
        let denied = gate.check(&ctx);
        assert!(!denied.allowed);

        let registry = gate.registry();
        assert_eq!(
            registry.limiter(Dimension::Ip).current_count("1.2.3.4"),
            Some(2)
        );
        assert_eq!(
            registry.limiter(Dimension::User).current_count("user-1"),
            Some(2)
        );
        assert_eq!(
            registry
                .limiter(Dimension::Endpoint)
                .current_count("GET:/api/v1/plugins"),
            Some(2)
        );
        assert_eq!(
            registry.limiter(Dimension::Tenant).current_count("tenant-1"),
            Some(1)
        );
    }

    #[test]
    fn test_ip_denial_short_circuits_everything_else() {
        let (gate, _clock) = gate(policies(1, 100, 100, 100));
        let ctx = full_context();

        gate.check(&ctx);
        let denied = gate.check(&ctx);

        assert_eq!(denied.violated_dimension, Some(Dimension::Ip));
        let registry = gate.registry();
        assert_eq!(
            registry.limiter(Dimension::User).current_count("user-1"),
            Some(1)
        );
        assert_eq!(
            registry
                .limiter(Dimension::Endpoint)
                .current_count("GET:/api/v1/plugins"),
            Some(1)
        );
    }

    #[test]
    fn test_anonymous_request_skips_user_dimension() {
        let (gate, _clock) = gate(policies(100, 1, 100, 100));
        let ctx = RequestContext::new("GET", "/").with_forwarded_for("1.2.3.4");

        // A user limit of 1 would deny the second request if anonymous
        // traffic were funneled into a sentinel key.
        assert!(gate.check(&ctx).allowed);
        assert!(gate.check(&ctx).allowed);
        assert_eq!(gate.registry().limiter(Dimension::User).entry_count(), 0);
    }

    #[test]
    fn test_tenantless_request_skips_tenant_dimension() {
        let (gate, _clock) = gate(policies(100, 100, 100, 1));
        let ctx = RequestContext::new("GET", "/").with_principal("user-1");

        assert!(gate.check(&ctx).allowed);
        assert!(gate.check(&ctx).allowed);
        assert_eq!(gate.registry().limiter(Dimension::Tenant).entry_count(), 0);
    }

    #[test]
    fn test_distinct_ips_do_not_interfere() {
        let (gate, _clock) = gate(policies(2, 100, 100, 100));

        let a = RequestContext::new("GET", "/a").with_forwarded_for("1.1.1.1");
        let b = RequestContext::new("GET", "/b").with_forwarded_for("2.2.2.2");

        gate.check(&a);
        gate.check(&a);
        assert!(!gate.check(&a).allowed);
        assert!(gate.check(&b).allowed);
    }

    #[test]
    fn test_quota_recovers_after_window() {
        let (gate, clock) = gate(policies(100, 100, 1, 100));
        let ctx = full_context();

        gate.check(&ctx);
        assert!(!gate.check(&ctx).allowed);

        clock.advance(Duration::from_millis(1001));
        assert!(gate.check(&ctx).allowed);
    }

    #[test]
    fn test_gate_rejects_invalid_policies() {
        let clock = Arc::new(ManualClock::new());
        let registry =
            Arc::new(RateLimiterRegistry::new(&StoreConfig::default(), clock).unwrap());
        let mut policies = policies(1, 1, 1, 1);
        policies.endpoint.limit = 0;

        assert!(CompositeGate::new(registry, policies).is_err());
    }

    #[test]
    fn test_from_config_builds_a_working_gate() {
        let mut config = GateConfig::default();
        config.limits.ip = PolicyConfig {
            limit: 1,
            window_ms: 60_000,
        };
        let gate = CompositeGate::from_config(&config).unwrap();
        let ctx = RequestContext::new("GET", "/").with_forwarded_for("1.2.3.4");

        assert!(gate.check(&ctx).allowed);
        assert_eq!(
            gate.check(&ctx).violated_dimension,
            Some(Dimension::Ip)
        );
    }
}
