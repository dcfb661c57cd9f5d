//! Stable `E_NET_*` error codes. User-visible messages are generic by
//! design — no IPs, no DNS answers, no internal detail. Anything sensitive
//! belongs in `private`/`tenant` evidence, never in an error string.

use std::fmt;

macro_rules! net_error_codes {
    ($($variant:ident => $code:literal),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NetErrorCode {
            $($variant,)+
        }

        impl NetErrorCode {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $code,)+
                }
            }
        }

        impl fmt::Display for NetErrorCode {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

net_error_codes! {
    SsrfUrlRejected => "E_NET_SSRF_URL_REJECTED",
    SsrfDnsResolvedPrivate => "E_NET_SSRF_DNS_RESOLVED_PRIVATE",
    SsrfMixedDnsBlocked => "E_NET_SSRF_MIXED_DNS_BLOCKED",
    SsrfMixedDnsAckMissing => "E_NET_SSRF_MIXED_DNS_ACK_MISSING",
    SsrfAllIpsBlocked => "E_NET_SSRF_ALL_IPS_BLOCKED",
    SsrfRedirectBlocked => "E_NET_SSRF_REDIRECT_BLOCKED",
    SsrfTooManyRedirects => "E_NET_SSRF_TOO_MANY_REDIRECTS",
    SsrfIpv6ZoneId => "E_NET_SSRF_IPV6_ZONE_ID",
    SsrfDangerousPort => "E_NET_SSRF_DANGEROUS_PORT",
    SsrfDangerousPortAckMissing => "E_NET_SSRF_DANGEROUS_PORT_ACK_MISSING",
    SsrfAllowCidrsAckRequired => "E_NET_SSRF_ALLOWCIDRS_ACK_REQUIRED",
    DnsResolutionFailed => "E_NET_DNS_RESOLUTION_FAILED",
    DnsTimeout => "E_NET_DNS_TIMEOUT",
    RequestTimeout => "E_NET_REQUEST_TIMEOUT",
    NetworkError => "E_NET_NETWORK_ERROR",
    MethodNotAllowed => "E_NET_METHOD_NOT_ALLOWED",
    ResponseTooLarge => "E_NET_RESPONSE_TOO_LARGE",
    ParseError => "E_NET_PARSE_ERROR",
    TenantKeyMissing => "E_TENANT_KEY_MISSING",
    Cancelled => "E_NET_CANCELLED",
    Allowed => "E_NET_ALLOWED",
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}")]
pub struct NetError {
    pub code: NetErrorCode,
}

impl NetError {
    pub const fn new(code: NetErrorCode) -> Self {
        Self { code }
    }
}

impl From<NetErrorCode> for NetError {
    fn from(code: NetErrorCode) -> Self {
        Self::new(code)
    }
}
