use std::path::PathBuf;

use crate::RetryPolicy;

/// Configures timeouts, concurrency, TLS and retry behavior for one client.
///
/// Options are shared by every request of a drain; they survive
/// [`clear_queue`](crate::MultiCallClient::clear_queue) and successive
/// drains, so a tuned client can be reused across batches.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClientOptions {
    /// Connection-establishment timeout in seconds, clamped to ≥ 1.
    pub connect_timeout_secs: u64,
    /// Whole-request timeout in seconds, clamped to ≥ 1.
    pub total_timeout_secs: u64,
    /// Maximum number of in-flight requests. `0` means unbounded.
    pub max_concurrency: usize,
    /// TLS material and verification mode.
    pub tls: TlsOptions,
    /// Retry policy applied per request.
    pub retry: RetryPolicy,
    /// User-Agent override. Empty string means no override.
    pub user_agent: String,
    /// Headers applied to every request; request-specific values win.
    pub default_headers: Vec<(String, String)>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            total_timeout_secs: 30,
            max_concurrency: 10,
            tls: TlsOptions::default(),
            retry: RetryPolicy::default(),
            user_agent: String::new(),
            default_headers: Vec::new(),
        }
    }
}

/// TLS configuration for outbound requests.
///
/// The crate uses rustls, which performs hostname verification as part of
/// peer verification: `verify_host = 1` behaves like `2`, and `verify_host
/// = 0` disables certificate verification the same way `verify_peer =
/// false` does.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TlsOptions {
    /// PEM client certificate path.
    pub cert_path: Option<PathBuf>,
    /// PEM client key path, combined with `cert_path` into one identity.
    pub key_path: Option<PathBuf>,
    /// PEM CA bundle path added to the root store.
    pub ca_path: Option<PathBuf>,
    /// Whether to verify the peer certificate chain.
    pub verify_peer: bool,
    /// Hostname verification mode, `0`, `1` or `2` (curl lineage).
    pub verify_host: u8,
}

impl Default for TlsOptions {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            ca_path: None,
            verify_peer: true,
            verify_host: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ClientOptions, TlsOptions};

    #[test]
    fn defaults_verify_tls_and_bound_concurrency() {
        let options = ClientOptions::default();
        assert_eq!(options.max_concurrency, 10);
        assert!(options.tls.verify_peer);
        assert_eq!(options.tls.verify_host, 2);
        assert!(options.user_agent.is_empty());
    }

    #[test]
    fn tls_defaults_carry_no_material() {
        let tls = TlsOptions::default();
        assert!(tls.cert_path.is_none());
        assert!(tls.key_path.is_none());
        assert!(tls.ca_path.is_none());
    }
}
