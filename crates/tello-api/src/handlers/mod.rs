//! HTTP request handlers for the drone API

pub mod command;
pub mod logs;
pub mod session;
pub mod video;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;

/// Body of every successful action endpoint
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub ok: bool,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }
}

/// Decode a JSON request body. An empty body decodes as `{}`, and the
/// content type is not checked so plain `fetch()` clients work too.
pub(crate) fn json_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let raw: &[u8] = if body.is_empty() { b"{}" } else { body };
    serde_json::from_slice(raw).map_err(|_| ApiError::BadRequest("Invalid JSON".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Default, Debug)]
    struct Body {
        #[serde(default)]
        command: Option<String>,
    }

    #[test]
    fn empty_body_is_empty_object() {
        let body: Body = json_body(&Bytes::new()).unwrap();
        assert!(body.command.is_none());
    }

    #[test]
    fn malformed_body_is_rejected() {
        let err = json_body::<Body>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(ref m) if m == "Invalid JSON"));
    }
}
