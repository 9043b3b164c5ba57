//! TLS trust policy for probe clients.

use reqwest::ClientBuilder;

/// How probe clients validate the certificates of probed endpoints.
///
/// [`TlsTrustPolicy::AcceptAll`] is the default: self-signed and expired
/// certificates, and certificates for another hostname, are accepted so that
/// such endpoints can still be checked. It only applies to probed targets,
/// never to the mail transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsTrustPolicy {
    #[default]
    AcceptAll,
    /// Validate the chain and hostname against the system roots
    Verify,
}

impl TlsTrustPolicy {
    pub fn apply(self, builder: ClientBuilder) -> ClientBuilder {
        match self {
            Self::AcceptAll => builder
                .danger_accept_invalid_certs(true)
                .danger_accept_invalid_hostnames(true),
            Self::Verify => builder,
        }
    }
}
