//! The resolution capability the pinning logic depends on. Kept as a small
//! trait so tests can inject fixed answer sets instead of hitting a real
//! resolver — the pinning/mixed-family decision itself is pure and
//! synchronous once the answers are in hand.

use std::net::{Ipv4Addr, Ipv6Addr};

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;

use peac_net_guard::NetErrorCode;

/// Exactly what one DNS lookup for a host returned, split by family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answers {
    pub ipv4: Vec<Ipv4Addr>,
    pub ipv6: Vec<Ipv6Addr>,
}

impl Answers {
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    pub fn count(&self) -> (usize, usize) {
        (self.ipv4.len(), self.ipv6.len())
    }
}

#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve_all(&self, host: &str) -> Result<Answers, NetErrorCode>;
}

/// Production resolver backed by `hickory-resolver`. A fresh lookup is
/// always performed — no resolver-internal caching shortcut bypasses the
/// "exactly one DNS resolution per hop" guarantee the caller relies on;
/// this type supplies that one resolution, the caller is responsible for
/// not calling it twice for the same hop.
pub struct HickoryResolver {
    inner: TokioAsyncResolver,
}

impl HickoryResolver {
    pub fn from_system_config() -> Self {
        let (config, opts) = hickory_resolver::system_conf::read_system_conf()
            .unwrap_or_else(|_| (ResolverConfig::default(), ResolverOpts::default()));
        Self { inner: TokioAsyncResolver::tokio(config, opts) }
    }
}

#[async_trait]
impl Resolve for HickoryResolver {
    async fn resolve_all(&self, host: &str) -> Result<Answers, NetErrorCode> {
        let lookup = self
            .inner
            .lookup_ip(host)
            .await
            .map_err(|_| NetErrorCode::DnsResolutionFailed)?;

        let mut answers = Answers::default();
        for ip in lookup.iter() {
            match ip {
                std::net::IpAddr::V4(v4) => answers.ipv4.push(v4),
                std::net::IpAddr::V6(v6) => answers.ipv6.push(v6),
            }
        }

        if answers.is_empty() {
            return Err(NetErrorCode::DnsResolutionFailed);
        }
        Ok(answers)
    }
}

/// A fixed, pre-resolved answer set — for tests and for redirect hops where
/// the caller already has a cached literal.
pub struct StaticResolver {
    pub answers: Answers,
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn resolve_all(&self, _host: &str) -> Result<Answers, NetErrorCode> {
        if self.answers.is_empty() {
            return Err(NetErrorCode::DnsResolutionFailed);
        }
        Ok(self.answers.clone())
    }
}
