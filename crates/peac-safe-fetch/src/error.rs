//! Terminal error type for a fetch attempt. Wraps the stable `E_NET_*` codes
//! from `peac-net-guard`/`peac-dns-pin` and adds the handful of conditions
//! that only make sense once a socket is actually involved.

use peac_net_guard::NetErrorCode;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code}")]
pub struct FetchError {
    pub code: NetErrorCode,
}

impl FetchError {
    pub const fn new(code: NetErrorCode) -> Self {
        Self { code }
    }
}

impl From<NetErrorCode> for FetchError {
    fn from(code: NetErrorCode) -> Self {
        Self::new(code)
    }
}

impl From<peac_net_guard::NetError> for FetchError {
    fn from(err: peac_net_guard::NetError) -> Self {
        Self::new(err.code)
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::new(NetErrorCode::RequestTimeout)
        } else {
            Self::new(NetErrorCode::NetworkError)
        }
    }
}
