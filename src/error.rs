use thiserror::Error;

/// Errors raised by the bridge pipeline and the storage gateway.
#[derive(Debug, Error)]
pub enum Error {
    /// The HTTP request to the Bot API could not be completed.
    #[error("telegram transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The Bot API answered with something other than 200 OK.
    #[error("[{status}] telegram {method} failed")]
    Status {
        method: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("malformed telegram response: {0}")]
    Decode(#[from] serde_json::Error),

    /// A subscriber with this user id is already registered.
    #[error("subscriber already exists")]
    Conflict,

    #[error("storage error: {0}")]
    Persistence(#[from] rusqlite::Error),

    #[error("stored update marker is not an integer: {0:?}")]
    CorruptMarker(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_embeds_code() {
        let err = Error::Status {
            method: "sendMessage",
            status: reqwest::StatusCode::FORBIDDEN,
        };
        let text = err.to_string();
        assert!(text.contains("403"));
        assert!(text.contains("sendMessage"));
    }

    #[test]
    fn test_decode_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = serde_err.into();
        assert!(matches!(err, Error::Decode(_)));
    }
}
