//! DNS pinning: exactly one resolution per hop, IPv6-preferred family
//! selection, and a mixed-public/private policy gated by an explicit
//! acknowledgment string.

pub mod pin;
pub mod resolver;

pub use pin::{pin as pin_answers, PinPolicy, PinnedIp, I_UNDERSTAND_MIXED_DNS_RISKS};
pub use resolver::{Answers, HickoryResolver, Resolve, StaticResolver};

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    /// Scenario: resolver returns one IP on first call and a different IP on
    /// any subsequent call. Exercising `resolve_all` once and pinning from
    /// that single `Answers` must never trigger a second call — there is no
    /// API in this crate that would let a caller re-resolve the same hop, so
    /// this test demonstrates the single-call path produces a stable pin.
    #[tokio::test]
    async fn single_resolution_pins_the_first_answer() {
        let resolver = StaticResolver {
            answers: Answers { ipv4: vec![Ipv4Addr::new(8, 8, 8, 8)], ipv6: vec![] },
        };
        let answers = resolver.resolve_all("example.com").await.unwrap();
        let pinned = pin_answers(&answers, &PinPolicy::default()).unwrap();
        assert_eq!(pinned.ip, std::net::IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[tokio::test]
    async fn mixed_dns_scenario_requires_ack_then_uses_public_only() {
        let resolver = StaticResolver {
            answers: Answers {
                ipv4: vec![Ipv4Addr::new(8, 8, 8, 8), Ipv4Addr::new(10, 0, 0, 1)],
                ipv6: vec![],
            },
        };
        let answers = resolver.resolve_all("example.com").await.unwrap();

        let blocked = pin_answers(&answers, &PinPolicy::default());
        assert_eq!(blocked, Err(peac_net_guard::NetErrorCode::SsrfMixedDnsBlocked));

        let policy = PinPolicy {
            allow_mixed_public_and_private_dns: true,
            mixed_dns_ack: Some(I_UNDERSTAND_MIXED_DNS_RISKS.to_owned()),
            ..PinPolicy::default()
        };
        let pinned = pin_answers(&answers, &policy).unwrap();
        assert_eq!(pinned.ip, std::net::IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[tokio::test]
    async fn resolver_failure_surfaces_dns_resolution_failed() {
        let resolver = StaticResolver { answers: Answers::default() };
        let err = resolver.resolve_all("example.com").await.unwrap_err();
        assert_eq!(err, peac_net_guard::NetErrorCode::DnsResolutionFailed);
    }
}
