use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;

use crate::http::HttpError;

/// A receipt JWS pulled off the wire, accepting either transport the
/// Transport Profile can produce on the header path: a bearer
/// `Authorization` header, or the dedicated `PEAC-Receipt` header.
#[derive(Debug, Clone)]
pub struct ReceiptToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ReceiptToken
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Ok(TypedHeader(Authorization(bearer))) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state).await
        {
            return Ok(Self(bearer.token().to_owned()));
        }

        if let Some(value) = parts.headers.get("PEAC-Receipt") {
            let jws = value
                .to_str()
                .map_err(|_| HttpError::bad_request().msg("PEAC-Receipt header is not valid UTF-8"))?;
            return Ok(Self(jws.to_owned()));
        }

        Err(HttpError::unauthorized().msg("missing bearer Authorization or PEAC-Receipt header"))
    }
}
