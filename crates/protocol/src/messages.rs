use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Opens an upload for `file_path`.
///
/// `file_hash` may be empty when the caller did not compute one.
/// `chunk_size` is the caller's preference; the service answers with the
/// size it will actually account chunks by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadRequest {
    pub file_path: String,
    #[serde(default)]
    pub file_hash: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
}

/// Stores one chunk of an open upload.
///
/// `chunk_data` travels base64-encoded inside the JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreChunkRequest {
    pub file_path: String,
    pub chunk_id: u64,
    #[serde(with = "base64_bytes")]
    pub chunk_data: Vec<u8>,
}

/// Seals an upload once every chunk has been stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeUploadRequest {
    pub file_path: String,
}

// ---------------------------------------------------------------------------
// Success payloads
// ---------------------------------------------------------------------------

/// Init acknowledgement. A `chunk_size` of 0 means "use what you asked for".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    #[serde(default)]
    pub chunk_size: u64,
}

/// Chunk acknowledgement; carries nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreChunkResponse {}

/// Finalize acknowledgement with the content locator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeUploadResponse {
    pub url: String,
}

// ---------------------------------------------------------------------------
// Tagged replies
// ---------------------------------------------------------------------------

/// Result shape every storage operation answers with.
///
/// Serialized externally tagged: `{"Ok": <payload>}` or
/// `{"Err": {"<Variant>": <detail>}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Reply<T> {
    Ok(T),
    Err(RemoteError),
}

impl<T> Reply<T> {
    /// Converts into a standard `Result`.
    pub fn into_result(self) -> Result<T, RemoteError> {
        match self {
            Reply::Ok(v) => Ok(v),
            Reply::Err(e) => Err(e),
        }
    }

    /// Returns `true` for an `Err` reply.
    pub fn is_err(&self) -> bool {
        matches!(self, Reply::Err(_))
    }
}

/// Error variant reported by the storage service.
///
/// The variant name is opaque to the client and kept verbatim in `tag`.
/// `detail` holds whatever the variant carried (`None` for unit variants).
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub tag: String,
    pub detail: Option<serde_json::Value>,
}

impl RemoteError {
    /// Creates a unit-variant error.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            detail: None,
        }
    }

    /// Creates an error carrying a detail value.
    pub fn with_detail(tag: impl Into<String>, detail: serde_json::Value) -> Self {
        Self {
            tag: tag.into(),
            detail: Some(detail),
        }
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            None | Some(serde_json::Value::Null) => f.write_str(&self.tag),
            Some(serde_json::Value::String(s)) => write!(f, "{}: {s}", self.tag),
            Some(other) => write!(f, "{}: {other}", self.tag),
        }
    }
}

impl Serialize for RemoteError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.tag, &self.detail)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for RemoteError {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RemoteErrorVisitor)
    }
}

struct RemoteErrorVisitor;

impl<'de> Visitor<'de> for RemoteErrorVisitor {
    type Value = RemoteError;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a single-entry map naming the error variant, or a variant name")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<RemoteError, E> {
        Ok(RemoteError::new(v))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RemoteError, A::Error> {
        let Some((tag, detail)) = map.next_entry::<String, Option<serde_json::Value>>()? else {
            return Err(de::Error::invalid_length(0, &self));
        };
        if map.next_key::<de::IgnoredAny>()?.is_some() {
            return Err(de::Error::custom("error variant must have exactly one tag"));
        }
        let detail = detail.filter(|d| !d.is_null());
        Ok(RemoteError { tag, detail })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_chunk_payload_is_base64() {
        let req = StoreChunkRequest {
            file_path: "k".into(),
            chunk_id: 3,
            chunk_data: b"Hello".to_vec(),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"chunk_data\":\"SGVsbG8=\""));
        assert!(json.contains("\"chunk_id\":3"));
        let parsed: StoreChunkRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chunk_data, b"Hello");
    }

    #[test]
    fn init_request_omits_absent_chunk_size() {
        let req = InitUploadRequest {
            file_path: "k".into(),
            file_hash: String::new(),
            file_size: 10,
            chunk_size: None,
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(!json.contains("chunk_size"));
        assert!(json.contains("\"file_hash\":\"\""));
    }

    #[test]
    fn init_response_defaults_chunk_size_to_zero() {
        let parsed: InitUploadResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.chunk_size, 0);
    }

    #[test]
    fn ok_reply_shape() {
        let json = r#"{"Ok":{"url":"https://cdn.example/a.png"}}"#;
        let reply: Reply<FinalizeUploadResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(
            reply.into_result().unwrap().url,
            "https://cdn.example/a.png"
        );
    }

    #[test]
    fn err_reply_with_unit_variant() {
        let json = r#"{"Err":{"UploadNotFound":null}}"#;
        let reply: Reply<StoreChunkResponse> = serde_json::from_str(json).unwrap();
        assert!(reply.is_err());
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.tag, "UploadNotFound");
        assert!(err.detail.is_none());
        assert_eq!(err.to_string(), "UploadNotFound");
    }

    #[test]
    fn err_reply_with_detail() {
        let json = r#"{"Err":{"InvalidChunk":"index out of range"}}"#;
        let reply: Reply<StoreChunkResponse> = serde_json::from_str(json).unwrap();
        let err = reply.into_result().unwrap_err();
        assert_eq!(err.tag, "InvalidChunk");
        assert_eq!(err.to_string(), "InvalidChunk: index out of range");
    }

    #[test]
    fn err_reply_bare_variant_name() {
        let json = r#"{"Err":"Unauthorized"}"#;
        let reply: Reply<InitUploadResponse> = serde_json::from_str(json).unwrap();
        assert_eq!(reply.into_result().unwrap_err().tag, "Unauthorized");
    }

    #[test]
    fn err_reply_rejects_multiple_tags() {
        let json = r#"{"Err":{"A":null,"B":null}}"#;
        assert!(serde_json::from_str::<Reply<InitUploadResponse>>(json).is_err());
    }

    #[test]
    fn err_reply_rejects_empty_map() {
        let json = r#"{"Err":{}}"#;
        assert!(serde_json::from_str::<Reply<InitUploadResponse>>(json).is_err());
    }

    #[test]
    fn remote_error_serializes_as_single_entry_map() {
        let err = RemoteError::new("QuotaExceeded");
        let json = serde_json::to_string(&Reply::<StoreChunkResponse>::Err(err)).unwrap();
        assert_eq!(json, r#"{"Err":{"QuotaExceeded":null}}"#);
    }

    #[test]
    fn reply_of_unknown_shape_is_rejected() {
        let json = r#"{"status":"ok"}"#;
        assert!(serde_json::from_str::<Reply<FinalizeUploadResponse>>(json).is_err());
    }
}
