//! RFC 6890 (and friends) membership tests. IPv4-mapped IPv6 addresses are
//! unwrapped to their IPv4 form before classification, so loopback/private
//! hiding via `::ffff:a.b.c.d` is impossible.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{Ipv4Network, Ipv6Network};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Public,
    Private,
}

impl Classification {
    pub fn is_private(self) -> bool {
        matches!(self, Self::Private)
    }
}

/// Policy knobs that can flip an otherwise-private address to public.
/// Ack-string verification happens at the caller (URL guard / DNS resolver)
/// — this struct only records the resulting boolean decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyPolicy {
    pub allow_cgnat: bool,
}

/// Unwraps `::ffff:a.b.c.d` to `a.b.c.d`; any other address passes through.
pub fn unwrap_mapped(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// Classifies `ip` as public or private. Unwraps IPv4-mapped IPv6 first.
/// Fail-closed: this function cannot itself receive "invalid" input since
/// it takes a parsed [`IpAddr`], but callers that classify a string should
/// treat a parse failure as private, per the spec's fail-closed invariant.
pub fn classify(ip: IpAddr, policy: ClassifyPolicy) -> Classification {
    match unwrap_mapped(ip) {
        IpAddr::V4(v4) => classify_v4(v4, policy),
        IpAddr::V6(v6) => classify_v6(v6, policy),
    }
}

fn cgnat_network() -> Ipv4Network {
    Ipv4Network::new(Ipv4Addr::new(100, 64, 0, 0), 10).expect("valid CGNAT CIDR")
}

fn classify_v4(ip: Ipv4Addr, policy: ClassifyPolicy) -> Classification {
    if ip.is_loopback()
        || ip.is_link_local()
        || ip.is_private() // RFC 1918
        || ip.is_broadcast()
        || ip.is_documentation() // TEST-NET-1/2/3: 192.0.2.0/24, 198.51.100.0/24, 203.0.113.0/24
        || is_in(ip, Ipv4Addr::new(198, 18, 0, 0), 15) // benchmarking
        || is_in(ip, Ipv4Addr::new(192, 88, 99, 0), 24) // 6to4 relay anycast
        || ip.is_multicast()
        || is_reserved_v4(ip)
    {
        return Classification::Private;
    }

    if cgnat_network().contains(ip) {
        return if policy.allow_cgnat {
            Classification::Public
        } else {
            Classification::Private
        };
    }

    Classification::Public
}

fn is_in(ip: Ipv4Addr, network: Ipv4Addr, prefix: u8) -> bool {
    Ipv4Network::new(network, prefix)
        .map(|net| net.contains(ip))
        .unwrap_or(false)
}

fn is_reserved_v4(ip: Ipv4Addr) -> bool {
    // 240.0.0.0/4 "reserved for future use", plus the literal unspecified address.
    ip.octets()[0] >= 240 || ip.is_unspecified()
}

fn classify_v6(ip: Ipv6Addr, _policy: ClassifyPolicy) -> Classification {
    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return Classification::Private;
    }
    // Unique Local Address, fc00::/7.
    if (ip.segments()[0] & 0xfe00) == 0xfc00 {
        return Classification::Private;
    }
    // Link-local, fe80::/10.
    if (ip.segments()[0] & 0xffc0) == 0xfe80 {
        return Classification::Private;
    }
    // Documentation, 2001:db8::/32.
    let doc = Ipv6Network::new(Ipv6Addr::new(0x2001, 0x0db8, 0, 0, 0, 0, 0, 0), 32)
        .expect("valid documentation CIDR");
    if doc.contains(ip) {
        return Classification::Private;
    }

    Classification::Public
}
