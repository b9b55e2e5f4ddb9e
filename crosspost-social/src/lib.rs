//! Social network clients used by crosspost.
//!
//! [`linkedin`] publishes UGC posts (text, article, image) for a member or an
//! organisation; [`twitter`] posts tweets with chunked media upload and exposes
//! a generic OAuth 1.0a signed request helper. The two adapters share nothing
//! but the HTTP client and the error type.
pub mod linkedin;
pub mod twitter;

use crosspost_common::{CrosspostError, Provider};
use crosspost_http::HttpError;

/// Map transport-level failures onto the shared error type.
pub(crate) fn http_to_crosspost(provider: Provider, e: HttpError) -> CrosspostError {
    match e {
        HttpError::Url(m) | HttpError::Build(m) => CrosspostError::InvalidRequest(m),
        HttpError::Network(m) => CrosspostError::Transport(m),
        HttpError::Decode(err, snippet) => {
            CrosspostError::Parse(format!("{err} (body: {snippet})"))
        }
        HttpError::Api {
            status,
            message,
            body,
            ..
        } => CrosspostError::Provider {
            provider,
            status: status.as_u16(),
            message: message.unwrap_or(body),
        },
    }
}

/// Statuses a token or credential endpoint uses to refuse what it was given.
/// Throttling and server failures stay provider errors.
pub(crate) fn is_rejection(status: u16) -> bool {
    matches!(status, 400 | 401 | 403)
}

/// Like [`http_to_crosspost`], but a rejection means the credentials were refused.
pub(crate) fn http_to_auth(provider: Provider, e: HttpError) -> CrosspostError {
    match e {
        HttpError::Api {
            status,
            message,
            body,
            ..
        } if is_rejection(status.as_u16()) => CrosspostError::Auth {
            status: Some(status.as_u16()),
            message: message.unwrap_or(body),
        },
        other => http_to_crosspost(provider, other),
    }
}

pub(crate) fn require(field: &str, value: &str) -> crosspost_common::Result<()> {
    if value.trim().is_empty() {
        return Err(CrosspostError::Config(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn api_errors_keep_status_and_message() {
        let err = http_to_crosspost(
            Provider::LinkedIn,
            HttpError::Api {
                status: StatusCode::UNPROCESSABLE_ENTITY,
                message: Some("duplicate".into()),
                body: "{}".into(),
                request_id: "-".into(),
            },
        );
        assert_eq!(err.status(), Some(422));
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn auth_mapping_only_applies_to_api_errors() {
        let err = http_to_auth(Provider::Twitter, HttpError::Network("reset".into()));
        assert!(matches!(err, CrosspostError::Transport(_)));

        let err = http_to_auth(
            Provider::Twitter,
            HttpError::Api {
                status: StatusCode::UNAUTHORIZED,
                message: None,
                body: "nope".into(),
                request_id: "-".into(),
            },
        );
        assert!(matches!(
            err,
            CrosspostError::Auth {
                status: Some(401),
                ..
            }
        ));
    }

    #[test]
    fn throttling_on_credential_endpoints_is_not_auth() {
        for status in [StatusCode::TOO_MANY_REQUESTS, StatusCode::SERVICE_UNAVAILABLE] {
            let err = http_to_auth(
                Provider::LinkedIn,
                HttpError::Api {
                    status,
                    message: Some("later".into()),
                    body: "{}".into(),
                    request_id: "-".into(),
                },
            );
            assert!(matches!(err, CrosspostError::Provider { .. }));
            assert_eq!(err.status(), Some(status.as_u16()));
        }
    }

    #[test]
    fn blank_values_are_config_errors() {
        assert!(require("client_id", "  ").is_err());
        assert!(require("client_id", "abc").is_ok());
    }
}
