//! JSON bodies exchanged between [`RemoteStore`](super::RemoteStore) and the
//! `glor-store` server.

use serde::{Deserialize, Serialize};

use crate::record::Document;
use crate::schema::Fields;

/// Body of create and overwrite requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteRequest {
    pub fields: Fields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub documents: Vec<Document>,
}

/// Identity of the key holder, from `GET /me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// Frames pushed over a collection watch socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WatchMessage {
    Snapshot { documents: Vec<Document> },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_message_tagging() {
        let msg = WatchMessage::Snapshot {
            documents: vec![Document::new("a", Fields::new())],
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["documents"][0]["id"], "a");

        let parsed: WatchMessage =
            serde_json::from_str(r#"{"type":"error","message":"boom"}"#).unwrap();
        assert!(matches!(parsed, WatchMessage::Error { message } if message == "boom"));
    }
}
