use base64::Engine;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use mlib_core::blob::Upload;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProcessError;

pub type ResponseBody = Full<Bytes>;

/// Largest accepted request body: a 50MB audio file grows by a third as
/// base64, plus the surrounding JSON.
pub const MAX_BODY_SIZE: usize = 72 * 1024 * 1024;

pub(crate) fn empty() -> ResponseBody {
    Full::new(Bytes::new())
}

pub(crate) fn full(body: impl Into<Bytes>) -> ResponseBody {
    Full::new(body.into())
}

/// Collect a JSON body; an empty body reads as `{}`.
pub async fn read_json<T, B>(body: B) -> Result<T, ProcessError>
where
    T: DeserializeOwned,
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let data = Limited::new(body, MAX_BODY_SIZE)
        .collect()
        .await
        .map_err(|e| ProcessError::BadBody(e.to_string()))?
        .to_bytes();
    if data.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(serde_json::from_slice(b"{}")?);
    }
    Ok(serde_json::from_slice(&data)?)
}

pub fn json<T: Serialize>(
    status: StatusCode,
    value: &T,
) -> Result<Response<ResponseBody>, ProcessError> {
    let data = serde_json::to_vec(value)?;
    Ok(Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full(data))?)
}

pub fn no_content() -> Result<Response<ResponseBody>, ProcessError> {
    Ok(Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(empty())?)
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

pub fn error_response(err: &ProcessError) -> Response<ResponseBody> {
    let body = ErrorBody {
        error: err.public_message(),
        field: err.field(),
    };
    let data = serde_json::to_vec(&body).unwrap_or_default();
    let mut rsp = Response::new(full(data));
    *rsp.status_mut() = err.status();
    rsp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    rsp
}

/// A file carried inside a JSON body.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadPayload {
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    /// standard base64
    pub data: String,
}

impl UploadPayload {
    pub fn decode(self) -> Result<Upload, ProcessError> {
        let data = base64::engine::general_purpose::STANDARD.decode(self.data.as_bytes())?;
        Ok(Upload {
            file_name: self.file_name,
            content_type: self.content_type,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_json_empty_body() {
        #[derive(Deserialize, Default)]
        struct Form {
            #[serde(default)]
            completed: bool,
        }
        let form: Form = read_json(Full::new(Bytes::new())).await.unwrap();
        assert!(!form.completed);
        let form: Form = read_json(full(r#"{"completed": true}"#)).await.unwrap();
        assert!(form.completed);
        assert!(read_json::<Form, _>(full("{nope")).await.is_err());
    }

    #[test]
    fn test_upload_payload_decode() {
        let upload = UploadPayload {
            file_name: "a.mp3".to_string(),
            content_type: None,
            data: "SUQz".to_string(),
        }
        .decode()
        .unwrap();
        assert_eq!(upload.data, b"ID3");
        assert!(UploadPayload {
            file_name: "a.mp3".to_string(),
            content_type: None,
            data: "!!".to_string(),
        }
        .decode()
        .is_err());
    }
}
