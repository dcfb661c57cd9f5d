//! Redirect target admissibility, independent of the URL guard / DNS pin
//! checks every redirect hop also re-runs.

use addr::parser::DomainName;
use addr::psl::List;
use url::Url;

use peac_net_guard::NetErrorCode;

#[derive(Debug, Clone)]
pub enum RedirectPolicy {
    None,
    SameOrigin,
    SameRegistrableDomain,
    Allowlist(Vec<String>),
}

fn registrable_domain(host: &str) -> Option<String> {
    let name = List.parse_domain_name(host).ok()?;
    name.root().map(str::to_owned)
}

/// `from` and `to` are the fully-parsed current and redirect-target URLs.
/// Protocol downgrade (https→http) is never allowed regardless of policy.
pub fn check(from: &Url, to: &Url, policy: &RedirectPolicy) -> Result<(), NetErrorCode> {
    if from.scheme() == "https" && to.scheme() == "http" {
        return Err(NetErrorCode::SsrfRedirectBlocked);
    }

    match policy {
        RedirectPolicy::None => Err(NetErrorCode::SsrfRedirectBlocked),
        RedirectPolicy::SameOrigin => {
            let same = from.scheme() == to.scheme()
                && from.host_str() == to.host_str()
                && from.port_or_known_default() == to.port_or_known_default();
            if same {
                Ok(())
            } else {
                Err(NetErrorCode::SsrfRedirectBlocked)
            }
        }
        RedirectPolicy::SameRegistrableDomain => {
            let from_host = from.host_str().ok_or(NetErrorCode::SsrfRedirectBlocked)?;
            let to_host = to.host_str().ok_or(NetErrorCode::SsrfRedirectBlocked)?;
            let from_root = registrable_domain(from_host).ok_or(NetErrorCode::SsrfRedirectBlocked)?;
            let to_root = registrable_domain(to_host).ok_or(NetErrorCode::SsrfRedirectBlocked)?;
            if from_root == to_root {
                Ok(())
            } else {
                Err(NetErrorCode::SsrfRedirectBlocked)
            }
        }
        RedirectPolicy::Allowlist(allowed) => {
            let to_host = to.host_str().ok_or(NetErrorCode::SsrfRedirectBlocked)?;
            let to_root = registrable_domain(to_host).unwrap_or_else(|| to_host.to_owned());
            if allowed.iter().any(|candidate| candidate == &to_root) {
                Ok(())
            } else {
                Err(NetErrorCode::SsrfRedirectBlocked)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn none_policy_always_blocks() {
        let err = check(&url("https://a.example.com/"), &url("https://a.example.com/x"), &RedirectPolicy::None)
            .unwrap_err();
        assert_eq!(err, NetErrorCode::SsrfRedirectBlocked);
    }

    #[test]
    fn same_origin_requires_exact_match() {
        let policy = RedirectPolicy::SameOrigin;
        assert!(check(&url("https://a.example.com/"), &url("https://a.example.com/x"), &policy).is_ok());
        assert!(check(&url("https://a.example.com/"), &url("https://b.example.com/"), &policy).is_err());
    }

    #[test]
    fn protocol_upgrade_allowed_downgrade_blocked() {
        let policy = RedirectPolicy::SameRegistrableDomain;
        assert!(check(&url("http://example.com/"), &url("https://example.com/"), &policy).is_ok());
        let err = check(&url("https://example.com/"), &url("http://example.com/"), &policy).unwrap_err();
        assert_eq!(err, NetErrorCode::SsrfRedirectBlocked);
    }

    #[test]
    fn same_registrable_domain_allows_subdomain_hops() {
        let policy = RedirectPolicy::SameRegistrableDomain;
        assert!(check(&url("https://a.example.com/"), &url("https://b.example.com/"), &policy).is_ok());
        assert!(check(&url("https://example.com/"), &url("https://evil.com/"), &policy).is_err());
    }

    #[test]
    fn allowlist_matches_exact_registrable_domain() {
        let policy = RedirectPolicy::Allowlist(vec!["example.com".to_owned()]);
        assert!(check(&url("https://start.example.org/"), &url("https://example.com/"), &policy).is_ok());
        assert!(check(&url("https://start.example.org/"), &url("https://other.org/"), &policy).is_err());
    }
}
