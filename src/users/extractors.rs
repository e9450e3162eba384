use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{
    error::ApiError,
    state::AppState,
    users::{repo_types::User, services::user_for_token},
};

const SCHEMES: [&str; 2] = ["token", "bearer"];

/// Pulls the token key out of an `Authorization` header value.
///
/// `Ok(None)` means the header carries no token credentials at all.
pub(crate) fn parse_authorization(header: &str) -> Result<Option<&str>, ApiError> {
    let mut parts = header.split_whitespace();
    let Some(scheme) = parts.next() else {
        return Ok(None);
    };
    if !SCHEMES.contains(&scheme.to_ascii_lowercase().as_str()) {
        return Ok(None);
    }
    let key = parts.next().ok_or(ApiError::InvalidToken(
        "Invalid token header. No credentials provided.",
    ))?;
    if parts.next().is_some() {
        return Err(ApiError::InvalidToken(
            "Invalid token header. Token string should not contain spaces.",
        ));
    }
    Ok(Some(key))
}

/// The user that owns the presented token.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = match parts.headers.get(axum::http::header::AUTHORIZATION) {
            Some(value) => value.to_str().map_err(|_| {
                ApiError::InvalidToken(
                    "Invalid token header. Token string should not contain invalid characters.",
                )
            })?,
            None => return Err(ApiError::NotAuthenticated),
        };

        let key = parse_authorization(header)?.ok_or(ApiError::NotAuthenticated)?;

        let user = user_for_token(state.users.as_ref(), state.tokens.as_ref(), key)
            .await
            .map_err(|e| {
                warn!(error = %e, "token rejected");
                e
            })?;
        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(header: &str) -> String {
        parse_authorization(header).unwrap_err().to_string()
    }

    #[test]
    fn accepts_token_and_bearer_schemes() {
        assert_eq!(parse_authorization("Token abc").unwrap(), Some("abc"));
        assert_eq!(parse_authorization("Bearer abc").unwrap(), Some("abc"));
        assert_eq!(parse_authorization("bearer   abc").unwrap(), Some("abc"));
    }

    #[test]
    fn other_schemes_mean_no_credentials() {
        assert_eq!(parse_authorization("Basic dXNlcjpwdw==").unwrap(), None);
        assert_eq!(parse_authorization("").unwrap(), None);
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert_eq!(reason("Token"), "Invalid token header. No credentials provided.");
        assert_eq!(
            reason("Token abc def"),
            "Invalid token header. Token string should not contain spaces."
        );
    }
}
