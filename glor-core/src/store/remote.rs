//! HTTP/WebSocket client for a `glor-store` server.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::wire::{
    CreateResponse, ErrorBody, ListResponse, MeResponse, WatchMessage, WriteRequest,
};
use super::{is_valid_collection, RecordStore, StoreError, WatchCallback};
use crate::identity::User;
use crate::record::Document;
use crate::schema::{Fields, OrderBy};
use crate::subscription::Unsubscribe;

/// Timeout for the health check.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Record store backed by a remote `glor-store` server.
///
/// Reads are anonymous. Writes and [`RemoteStore::whoami`] send the API key
/// as a bearer token.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    server_url: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl RemoteStore {
    pub fn new(server_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            server_url: server_url.into(),
            api_key,
            http: reqwest::Client::new(),
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Resolves the API key to the staff member it was issued to.
    pub async fn whoami(&self) -> Result<User, StoreError> {
        if self.api_key.is_none() {
            return Err(StoreError::Unauthorized("no API key configured".to_string()));
        }
        let request = self.authorize(self.http.get(self.build_http_url("/me")));
        let me: MeResponse = Self::json(Self::send(request).await?).await?;
        Ok(User {
            uid: me.uid,
            email: me.email,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn collection_path(collection: &str) -> Result<String, StoreError> {
        if !is_valid_collection(collection) {
            return Err(StoreError::InvalidRequest(format!(
                "invalid collection name: {:?}",
                collection
            )));
        }
        Ok(format!("/collections/{}", collection))
    }

    /// URL of a single document. The id is appended as one percent-encoded
    /// path segment, so reserved characters never leak into the path or
    /// query.
    fn document_url(&self, collection: &str, id: &str) -> Result<Url, StoreError> {
        if id.is_empty() {
            return Err(StoreError::InvalidRequest("empty document id".to_string()));
        }
        let base = format!("{}/documents", Self::collection_path(collection)?);
        let mut url = Url::parse(&self.build_http_url(&base))
            .map_err(|e| StoreError::InvalidRequest(format!("invalid server url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::InvalidRequest("invalid server url".to_string()))?
            .push(id);
        Ok(url)
    }

    fn order_query(order: Option<OrderBy>) -> String {
        match order {
            Some(order) => format!(
                "?order_by={}&direction={}",
                order.field,
                if order.descending { "desc" } else { "asc" }
            ),
            None => String::new(),
        }
    }

    async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Unauthorized(message),
            StatusCode::BAD_REQUEST => StoreError::InvalidRequest(message),
            _ => StoreError::Server {
                status: status.as_u16(),
                message,
            },
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    /// Builds a WebSocket URL for a given path.
    fn build_ws_url(&self, path: &str) -> String {
        let base_url = if self.server_url.starts_with("http://") {
            self.server_url.replacen("http://", "ws://", 1)
        } else if self.server_url.starts_with("https://") {
            self.server_url.replacen("https://", "wss://", 1)
        } else if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            format!("ws://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        let base_url = if self.server_url.starts_with("ws://") {
            self.server_url.replacen("ws://", "http://", 1)
        } else if self.server_url.starts_with("wss://") {
            self.server_url.replacen("wss://", "https://", 1)
        } else if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl RecordStore for RemoteStore {
    async fn list(
        &self,
        collection: &str,
        order: Option<OrderBy>,
    ) -> Result<Vec<Document>, StoreError> {
        let path = format!(
            "{}/documents{}",
            Self::collection_path(collection)?,
            Self::order_query(order)
        );
        let response = Self::send(self.http.get(self.build_http_url(&path))).await?;
        let body: ListResponse = Self::json(response).await?;
        Ok(body.documents)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Document, StoreError> {
        let url = self.document_url(collection, id)?;
        match Self::send(self.http.get(url)).await {
            Ok(response) => Self::json(response).await,
            Err(StoreError::Server { status: 404, .. }) => {
                Err(StoreError::not_found(collection, id))
            }
            Err(e) => Err(e),
        }
    }

    async fn create(&self, collection: &str, fields: Fields) -> Result<String, StoreError> {
        let path = format!("{}/documents", Self::collection_path(collection)?);
        let request = self
            .authorize(self.http.post(self.build_http_url(&path)))
            .json(&WriteRequest { fields });
        let body: CreateResponse = Self::json(Self::send(request).await?).await?;
        tracing::debug!("Created {}/{}", collection, body.id);
        Ok(body.id)
    }

    async fn overwrite(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let url = self.document_url(collection, id)?;
        let request = self
            .authorize(self.http.put(url))
            .json(&WriteRequest { fields });
        match Self::send(request).await {
            Ok(_) => Ok(()),
            Err(StoreError::Server { status: 404, .. }) => {
                Err(StoreError::not_found(collection, id))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let url = self.document_url(collection, id)?;
        let request = self.authorize(self.http.delete(url));
        Self::send(request).await.map(|_| ())
    }

    async fn watch(
        &self,
        collection: &str,
        order: Option<OrderBy>,
        on_change: WatchCallback,
    ) -> Result<Unsubscribe, StoreError> {
        let path = format!(
            "{}/watch{}",
            Self::collection_path(collection)?,
            Self::order_query(order)
        );
        let ws_url = self.build_ws_url(&path);
        let (mut stream, _) = connect_async(&ws_url)
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let collection = collection.to_string();
        let handle = tokio::spawn(async move {
            // Every way out of the loop ends the watch for good.
            let reason = loop {
                match stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WatchMessage>(text.as_str()) {
                            Ok(WatchMessage::Snapshot { documents }) => on_change(Ok(documents)),
                            Ok(WatchMessage::Error { message }) => {
                                on_change(Err(StoreError::Server {
                                    status: 500,
                                    message,
                                }))
                            }
                            Err(e) => on_change(Err(StoreError::Decode(e.to_string()))),
                        }
                    }
                    Some(Ok(Message::Close(_))) => break "watch closed by server".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "watch connection dropped".to_string(),
                }
            };
            tracing::debug!("Watch on {} closed: {}", collection, reason);
            on_change(Err(StoreError::Transport(reason)));
        });

        Ok(Unsubscribe::from_task(handle))
    }
}

/// Returns true if a `glor-store` server answers its health check.
pub async fn check_server(server_url: &str) -> bool {
    let store = RemoteStore::new(server_url, None);
    let request = store
        .http
        .get(store.build_http_url("/health"))
        .timeout(HEALTH_TIMEOUT);
    matches!(request.send().await, Ok(response) if response.status().is_success())
}
