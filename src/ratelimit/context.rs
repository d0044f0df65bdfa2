//! Typed request context and per-dimension key derivation.
//!
//! Upstream middleware resolves identity, tenant, and forwarding headers
//! once and populates a [`RequestContext`]; the gate derives its keys from
//! that instead of probing a loosely-typed request object.

use std::net::SocketAddr;

/// Fallback IP key when no address information is available at all.
const UNKNOWN_IP: &str = "unknown";

/// Everything the gate needs to know about one inbound request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// HTTP method, e.g. `GET`.
    pub method: String,
    /// Request path as received, unnormalized.
    pub path: String,
    /// Transport-level peer address, if known.
    pub peer_addr: Option<SocketAddr>,
    /// Raw `X-Forwarded-For` header value, if present.
    pub forwarded_for: Option<String>,
    /// Raw `X-Real-IP` header value, if present.
    pub real_ip: Option<String>,
    /// Authenticated principal id; `None` for anonymous requests.
    pub principal: Option<String>,
    /// Resolved tenant id; `None` when no tenant context applies.
    pub tenant: Option<String>,
}

impl RequestContext {
    /// Create a context for a method and path.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the transport-level peer address.
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Set the raw `X-Forwarded-For` header value.
    pub fn with_forwarded_for(mut self, value: impl Into<String>) -> Self {
        self.forwarded_for = Some(value.into());
        self
    }

    /// Set the raw `X-Real-IP` header value.
    pub fn with_real_ip(mut self, value: impl Into<String>) -> Self {
        self.real_ip = Some(value.into());
        self
    }

    /// Set the authenticated principal id.
    pub fn with_principal(mut self, id: impl Into<String>) -> Self {
        self.principal = Some(id.into());
        self
    }

    /// Set the resolved tenant id.
    pub fn with_tenant(mut self, id: impl Into<String>) -> Self {
        self.tenant = Some(id.into());
        self
    }

    /// Client IP key.
    ///
    /// Precedence: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
    /// transport peer address, then the literal `"unknown"`. Trusting the
    /// forwarding headers first is deliberate for deployments behind a
    /// reverse proxy; a direct client can spoof them unless the edge strips
    /// or overwrites forwarding headers.
    pub fn ip_key(&self) -> String {
        if let Some(forwarded) = &self.forwarded_for {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }

        if let Some(real_ip) = &self.real_ip {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return real_ip.to_string();
            }
        }

        match self.peer_addr {
            Some(addr) => addr.ip().to_string(),
            None => UNKNOWN_IP.to_string(),
        }
    }

    /// Principal key; `None` skips the user dimension for this request.
    ///
    /// Anonymous requests are not funneled into a shared sentinel key.
    pub fn user_key(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    /// Endpoint key, `<method>:<path>`, unnormalized: distinct path
    /// parameter values yield distinct keys unless the caller normalizes
    /// routes first.
    pub fn endpoint_key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }

    /// Tenant key; `None` skips the tenant dimension for this request.
    pub fn tenant_key(&self) -> Option<&str> {
        self.tenant.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(addr: &str) -> SocketAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn test_ip_key_prefers_first_forwarded_for_entry() {
        let ctx = RequestContext::new("GET", "/")
            .with_forwarded_for("1.2.3.4, 5.6.7.8")
            .with_real_ip("9.9.9.9")
            .with_peer_addr(peer("10.0.0.1:443"));

        assert_eq!(ctx.ip_key(), "1.2.3.4");
    }

    #[test]
    fn test_ip_key_trims_forwarded_for() {
        let ctx = RequestContext::new("GET", "/").with_forwarded_for("  1.2.3.4 ,5.6.7.8");
        assert_eq!(ctx.ip_key(), "1.2.3.4");
    }

    #[test]
    fn test_ip_key_falls_back_to_real_ip() {
        let ctx = RequestContext::new("GET", "/")
            .with_real_ip("9.9.9.9")
            .with_peer_addr(peer("10.0.0.1:443"));

        assert_eq!(ctx.ip_key(), "9.9.9.9");
    }

    #[test]
    fn test_ip_key_falls_back_to_peer_addr() {
        let ctx = RequestContext::new("GET", "/").with_peer_addr(peer("10.0.0.1:443"));
        assert_eq!(ctx.ip_key(), "10.0.0.1");
    }

    #[test]
    fn test_ip_key_unknown_when_nothing_available() {
        let ctx = RequestContext::new("GET", "/");
        assert_eq!(ctx.ip_key(), "unknown");
    }

    #[test]
    fn test_empty_forwarded_for_falls_through() {
        let ctx = RequestContext::new("GET", "/")
            .with_forwarded_for("   ")
            .with_real_ip("9.9.9.9");

        assert_eq!(ctx.ip_key(), "9.9.9.9");
    }

    #[test]
    fn test_endpoint_key_is_method_and_unnormalized_path() {
        let ctx = RequestContext::new("POST", "/api/v1/plugins/42");
        assert_eq!(ctx.endpoint_key(), "POST:/api/v1/plugins/42");

        let other = RequestContext::new("POST", "/api/v1/plugins/43");
        assert_ne!(ctx.endpoint_key(), other.endpoint_key());
    }

    #[test]
    fn test_user_and_tenant_keys_absent_by_default() {
        let ctx = RequestContext::new("GET", "/");
        assert_eq!(ctx.user_key(), None);
        assert_eq!(ctx.tenant_key(), None);
    }

    #[test]
    fn test_user_and_tenant_keys_present_when_resolved() {
        let ctx = RequestContext::new("GET", "/")
            .with_principal("user-7")
            .with_tenant("tenant-3");

        assert_eq!(ctx.user_key(), Some("user-7"));
        assert_eq!(ctx.tenant_key(), Some("tenant-3"));
    }
}
