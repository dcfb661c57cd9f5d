//! Pure, synchronous decision logic over an already-resolved [`Answers`]
//! set: family preference, mixed-public/private policy, and the single
//! chosen IP to pin the connection to.

use std::net::IpAddr;

use peac_net_guard::{classify, ClassifyPolicy, NetErrorCode};

use crate::resolver::Answers;

#[derive(Debug, Clone)]
pub struct PinPolicy {
    pub allow_mixed_public_and_private_dns: bool,
    pub mixed_dns_ack: Option<String>,
    pub classify_policy: ClassifyPolicy,
}

impl Default for PinPolicy {
    fn default() -> Self {
        Self {
            allow_mixed_public_and_private_dns: false,
            mixed_dns_ack: None,
            classify_policy: ClassifyPolicy::default(),
        }
    }
}

pub const I_UNDERSTAND_MIXED_DNS_RISKS: &str = peac_net_guard::ack::I_UNDERSTAND_MIXED_DNS_RISKS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinnedIp {
    pub ip: IpAddr,
}

/// Chooses the single IP this hop will connect to, applying family
/// preference (IPv6 first, RFC 8305) and the mixed-family policy. Returns
/// the specific `E_NET_SSRF_*` code on any fail-closed path.
pub fn pin(answers: &Answers, policy: &PinPolicy) -> Result<PinnedIp, NetErrorCode> {
    if answers.is_empty() {
        return Err(NetErrorCode::DnsResolutionFailed);
    }

    let all: Vec<IpAddr> = answers
        .ipv6
        .iter()
        .copied()
        .map(IpAddr::V6)
        .chain(answers.ipv4.iter().copied().map(IpAddr::V4))
        .collect();

    let (public, private): (Vec<IpAddr>, Vec<IpAddr>) =
        all.iter().partition(|ip| !classify(**ip, policy.classify_policy).is_private());

    if public.is_empty() {
        return Err(NetErrorCode::SsrfDnsResolvedPrivate);
    }

    if !private.is_empty() {
        if !policy.allow_mixed_public_and_private_dns {
            return Err(NetErrorCode::SsrfMixedDnsBlocked);
        }
        let acked = policy.mixed_dns_ack.as_deref() == Some(I_UNDERSTAND_MIXED_DNS_RISKS);
        if !acked {
            return Err(NetErrorCode::SsrfMixedDnsAckMissing);
        }
    }

    // `all` is ordered IPv6-first; `public` preserves that order, so the
    // first entry is the most-preferred admissible address.
    Ok(PinnedIp { ip: public[0] })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v4(s: &str) -> std::net::Ipv4Addr {
        s.parse().unwrap()
    }

    #[test]
    fn all_private_is_rejected() {
        let answers = Answers { ipv4: vec![v4("10.0.0.1")], ipv6: vec![] };
        assert_eq!(pin(&answers, &PinPolicy::default()), Err(NetErrorCode::SsrfDnsResolvedPrivate));
    }

    #[test]
    fn mixed_without_ack_is_blocked() {
        let answers = Answers { ipv4: vec![v4("8.8.8.8"), v4("10.0.0.1")], ipv6: vec![] };
        assert_eq!(pin(&answers, &PinPolicy::default()), Err(NetErrorCode::SsrfMixedDnsBlocked));
    }

    #[test]
    fn mixed_with_wrong_ack_string_is_rejected() {
        let answers = Answers { ipv4: vec![v4("8.8.8.8"), v4("10.0.0.1")], ipv6: vec![] };
        let policy = PinPolicy {
            allow_mixed_public_and_private_dns: true,
            mixed_dns_ack: Some("nope".to_owned()),
            ..PinPolicy::default()
        };
        assert_eq!(pin(&answers, &policy), Err(NetErrorCode::SsrfMixedDnsAckMissing));
    }

    #[test]
    fn mixed_with_correct_ack_keeps_only_public() {
        let answers = Answers { ipv4: vec![v4("8.8.8.8"), v4("10.0.0.1")], ipv6: vec![] };
        let policy = PinPolicy {
            allow_mixed_public_and_private_dns: true,
            mixed_dns_ack: Some(I_UNDERSTAND_MIXED_DNS_RISKS.to_owned()),
            ..PinPolicy::default()
        };
        let pinned = pin(&answers, &policy).unwrap();
        assert_eq!(pinned.ip, IpAddr::V4(v4("8.8.8.8")));
    }

    #[test]
    fn prefers_ipv6_when_both_public_families_present() {
        let answers = Answers {
            ipv4: vec![v4("8.8.8.8")],
            ipv6: vec!["2606:4700:4700::1111".parse().unwrap()],
        };
        let pinned = pin(&answers, &PinPolicy::default()).unwrap();
        assert!(matches!(pinned.ip, IpAddr::V6(_)));
    }

    #[test]
    fn all_public_succeeds_without_any_ack() {
        let answers = Answers { ipv4: vec![v4("8.8.8.8")], ipv6: vec![] };
        assert!(pin(&answers, &PinPolicy::default()).is_ok());
    }
}
