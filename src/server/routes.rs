//! HTTP and WebSocket routes.
//!
//! Reads and watches are public. Writes and `/me` go through
//! [`auth_middleware`].

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use glor_core::store::is_valid_collection;
use glor_core::store::wire::{
    CreateResponse, HealthResponse, ListResponse, MeResponse, WatchMessage, WriteRequest,
};
use glor_core::Document;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;

use super::auth::{auth_middleware, ApiKeyStore, AuthUser};
use super::error::ApiError;
use super::hub::{Change, ChangeHub};
use super::storage::{DocumentStorage, ListOrder};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: DocumentStorage,
    pub hub: Arc<ChangeHub>,
    pub api_keys: Arc<ApiKeyStore>,
}

impl AppState {
    pub fn new(storage: DocumentStorage, api_keys: ApiKeyStore) -> Self {
        Self {
            storage,
            hub: Arc::new(ChangeHub::new()),
            api_keys: Arc::new(api_keys),
        }
    }
}

/// Builds the full router.
pub fn router(state: AppState) -> Router {
    let auth = middleware::from_fn_with_state(Arc::clone(&state.api_keys), auth_middleware);

    Router::new()
        .route("/health", get(health))
        .route("/me", get(me).route_layer(auth.clone()))
        .route(
            "/collections/{collection}/documents",
            get(list_documents).merge(post(create_document).route_layer(auth.clone())),
        )
        .route(
            "/collections/{collection}/documents/{id}",
            get(get_document).merge(
                put(overwrite_document)
                    .delete(delete_document)
                    .route_layer(auth),
            ),
        )
        .route("/collections/{collection}/watch", get(watch_collection))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    order_by: Option<String>,
    direction: Option<String>,
}

impl OrderQuery {
    fn parse(&self) -> Result<Option<ListOrder>, ApiError> {
        ListOrder::parse(self.order_by.as_deref(), self.direction.as_deref())
            .map_err(|message| ApiError::bad_request("invalid_order", message))
    }
}

fn check_collection(collection: &str) -> Result<(), ApiError> {
    if is_valid_collection(collection) {
        Ok(())
    } else {
        Err(ApiError::bad_request(
            "invalid_collection",
            format!("Invalid collection name: {:?}", collection),
        ))
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn me(Extension(user): Extension<AuthUser>) -> Json<MeResponse> {
    Json(MeResponse {
        uid: user.uid,
        email: user.email,
    })
}

async fn list_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    check_collection(&collection)?;
    let order = query.parse()?;
    let documents = state.storage.list(&collection, order.as_ref()).await?;
    Ok(Json(ListResponse { documents }))
}

async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Document>, ApiError> {
    check_collection(&collection)?;
    state
        .storage
        .get(&collection, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(&collection, &id))
}

async fn create_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(collection): Path<String>,
    Json(body): Json<WriteRequest>,
) -> Result<(StatusCode, Json<CreateResponse>), ApiError> {
    check_collection(&collection)?;
    let id = state.storage.create(&collection, &body.fields).await?;
    tracing::info!("{} created {}/{}", user.email, collection, id);

    state.hub.publish(&collection, Change::Created(id.clone())).await;
    Ok((StatusCode::CREATED, Json(CreateResponse { id })))
}

async fn overwrite_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<WriteRequest>,
) -> Result<StatusCode, ApiError> {
    check_collection(&collection)?;
    if !state.storage.overwrite(&collection, &id, &body.fields).await? {
        return Err(ApiError::not_found(&collection, &id));
    }
    tracing::info!("{} updated {}/{}", user.email, collection, id);

    state.hub.publish(&collection, Change::Updated(id)).await;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_document(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    check_collection(&collection)?;
    if state.storage.delete(&collection, &id).await? {
        tracing::info!("{} deleted {}/{}", user.email, collection, id);
        state.hub.publish(&collection, Change::Deleted(id)).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn watch_collection(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(query): Query<OrderQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    check_collection(&collection)?;
    let order = query.parse()?;
    Ok(ws
        .on_upgrade(move |socket| handle_watch(socket, state, collection, order))
        .into_response())
}

/// Sends the collection on connect and again after every change until the
/// client goes away.
async fn handle_watch(
    mut socket: WebSocket,
    state: AppState,
    collection: String,
    order: Option<ListOrder>,
) {
    // Subscribe before the first read so no change slips in between.
    let mut changes = state.hub.subscribe(&collection).await;
    tracing::debug!("Watcher connected to {}", collection);

    'watch: loop {
        let message = match state.storage.list(&collection, order.as_ref()).await {
            Ok(documents) => WatchMessage::Snapshot { documents },
            Err(e) => WatchMessage::Error {
                message: e.to_string(),
            },
        };
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode {} snapshot: {}", collection, e);
                break;
            }
        };
        if socket.send(Message::Text(text.into())).await.is_err() {
            break;
        }

        loop {
            tokio::select! {
                change = changes.recv() => match change {
                    Ok(_) | Err(RecvError::Lagged(_)) => break,
                    Err(RecvError::Closed) => break 'watch,
                },
                incoming = socket.recv() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break 'watch,
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    drop(changes);
    state.hub.release(&collection).await;
    tracing::debug!("Watcher disconnected from {}", collection);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::auth::ApiKeyEntry;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use glor_core::store::wire::ErrorBody;
    use glor_core::{
        AboutBlock, Crud, HeroContent, RecordStore, RemoteStore, Snapshot, StoreError,
    };
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    const KEY: &str = "test-key";

    struct TestContext {
        app: Router,
        hub: Arc<ChangeHub>,
        _temp_dir: TempDir,
    }

    async fn setup() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let storage = DocumentStorage::open(temp_dir.path()).await.unwrap();
        let keys = ApiKeyStore::from_entries(vec![ApiKeyEntry {
            key: KEY.to_string(),
            uid: "staff-1".to_string(),
            email: "editor@glorgames.com".to_string(),
        }]);
        let state = AppState::new(storage, keys);
        TestContext {
            hub: Arc::clone(&state.hub),
            app: router(state),
            _temp_dir: temp_dir,
        }
    }

    fn request(method: &str, uri: &str, key: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(key) = key {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let ctx = setup().await;
        let (status, body) = send(&ctx.app, request("GET", "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_me_requires_key() {
        let ctx = setup().await;

        let (status, body) = send(&ctx.app, request("GET", "/me", None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let error: ErrorBody = serde_json::from_value(body).unwrap();
        assert_eq!(error.error, "missing_auth");

        let (status, body) = send(&ctx.app, request("GET", "/me", Some("wrong"), None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_key");

        let (status, body) = send(&ctx.app, request("GET", "/me", Some(KEY), None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"uid": "staff-1", "email": "editor@glorgames.com"}));
    }

    #[tokio::test]
    async fn test_writes_require_key_reads_do_not() {
        let ctx = setup().await;
        let doc = json!({"fields": {"docs": "History", "description": "d"}});

        let (status, _) = send(
            &ctx.app,
            request("POST", "/collections/about/documents", None, Some(doc.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &ctx.app,
            request("POST", "/collections/about/documents", Some(KEY), Some(doc)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) =
            send(&ctx.app, request("GET", "/collections/about/documents", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["documents"][0]["id"], id.as_str());
        assert_eq!(body["documents"][0]["fields"]["docs"], "History");

        let uri = format!("/collections/about/documents/{}", id);
        let (status, _) = send(&ctx.app, request("DELETE", &uri, None, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_overwrite_and_delete() {
        let ctx = setup().await;
        let (_, body) = send(
            &ctx.app,
            request(
                "POST",
                "/collections/heroSection/documents",
                Some(KEY),
                Some(json!({"fields": {"title": "A"}})),
            ),
        )
        .await;
        let uri = format!(
            "/collections/heroSection/documents/{}",
            body["id"].as_str().unwrap()
        );

        let (status, _) = send(
            &ctx.app,
            request("PUT", &uri, Some(KEY), Some(json!({"fields": {"title": "B"}}))),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&ctx.app, request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["fields"], json!({"title": "B"}));

        let (status, _) = send(&ctx.app, request("DELETE", &uri, Some(KEY), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        // Deleting again still succeeds.
        let (status, _) = send(&ctx.app, request("DELETE", &uri, Some(KEY), None)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&ctx.app, request("GET", &uri, None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_overwrite_missing_is_404() {
        let ctx = setup().await;
        let (status, body) = send(
            &ctx.app,
            request(
                "PUT",
                "/collections/news/documents/missing",
                Some(KEY),
                Some(json!({"fields": {}})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_bad_collection_and_order() {
        let ctx = setup().await;
        let (status, body) = send(
            &ctx.app,
            request("GET", "/collections/bad%20name/documents", None, None),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_collection");

        let (status, body) = send(
            &ctx.app,
            request(
                "GET",
                "/collections/news/documents?order_by=updatedAt&direction=up",
                None,
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_order");
    }

    #[tokio::test]
    async fn test_list_order_query() {
        let ctx = setup().await;
        for (title, rating) in [("a", 2.0), ("b", 4.5), ("c", 3.0)] {
            send(
                &ctx.app,
                request(
                    "POST",
                    "/collections/featuredGames/documents",
                    Some(KEY),
                    Some(json!({"fields": {"title": title, "rating": rating}})),
                ),
            )
            .await;
        }

        let (_, body) = send(
            &ctx.app,
            request(
                "GET",
                "/collections/featuredGames/documents?order_by=rating&direction=desc",
                None,
                None,
            ),
        )
        .await;
        let titles: Vec<_> = body["documents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["fields"]["title"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(titles, vec!["b", "c", "a"]);
    }

    /// Serves the router on an ephemeral port and returns its base URL.
    async fn serve(ctx: &TestContext) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = ctx.app.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_remote_store_end_to_end() {
        let ctx = setup().await;
        let url = serve(&ctx).await;

        let anonymous = RemoteStore::new(url.clone(), None);
        assert!(matches!(
            anonymous.whoami().await,
            Err(StoreError::Unauthorized(_))
        ));
        assert!(glor_core::store::check_server(&url).await);

        let staff = RemoteStore::new(url.clone(), Some(KEY.to_string()));
        let user = staff.whoami().await.unwrap();
        assert_eq!(user.email, "editor@glorgames.com");

        let crud: Crud<HeroContent> = Crud::new(Arc::new(staff.clone()));
        crud.set_field("title", "Welcome").unwrap();
        crud.set_field("description", "Play now").unwrap();
        crud.set_field("videoUrl", "http://v/intro.mp4").unwrap();
        let id = crud.add().await.unwrap();
        assert_eq!(crud.current().ids(), vec![id.as_str()]);

        crud.edit_by_id(&id).await.unwrap();
        crud.set_field("title", "Welcome back").unwrap();
        crud.save().await.unwrap();
        assert_eq!(crud.current()[0].data.title, "Welcome back");

        // Anonymous clients can read but not write.
        let reader: Crud<HeroContent> = Crud::new(Arc::new(anonymous.clone()));
        assert_eq!(reader.get(&id).await.unwrap().data.title, "Welcome back");
        assert!(matches!(
            anonymous.delete("heroSection", &id).await,
            Err(StoreError::Unauthorized(_))
        ));

        assert!(matches!(
            staff.get("heroSection", "missing").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            staff.overwrite("heroSection", "missing", Default::default()).await,
            Err(StoreError::NotFound { .. })
        ));

        // Reserved characters stay part of the id.
        staff
            .delete("heroSection", &format!("{}?junk", id))
            .await
            .unwrap();
        assert!(staff.get("heroSection", &id).await.is_ok());
        assert!(matches!(
            staff.get("heroSection", &format!("{}#x", id)).await,
            Err(StoreError::NotFound { .. })
        ));

        crud.remove(&id).await.unwrap();
        assert!(crud.current().is_empty());
        crud.remove(&id).await.unwrap();
    }

    #[tokio::test]
    async fn test_remote_watch_pushes_changes() {
        let ctx = setup().await;
        let url = serve(&ctx).await;

        let watcher: Crud<AboutBlock> = Crud::new(Arc::new(RemoteStore::new(url.clone(), None)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = watcher
            .subscribe(move |snapshot: Snapshot<AboutBlock>| {
                let _ = tx.send(snapshot.len());
            })
            .await
            .unwrap();

        let initial = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(initial, Some(0));

        let writer: Crud<AboutBlock> =
            Crud::new(Arc::new(RemoteStore::new(url, Some(KEY.to_string()))));
        writer.set_field("docs", "History").unwrap();
        writer.set_field("description", "Since 2020").unwrap();
        writer.add().await.unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(len) = rx.recv().await {
                if len == 1 {
                    break;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(watcher.current().len(), 1);
        assert_eq!(watcher.current()[0].data.docs, "History");

        handle.unsubscribe();
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn test_watch_channel_released_on_disconnect() {
        let ctx = setup().await;
        let url = serve(&ctx).await;

        let watcher: Crud<AboutBlock> = Crud::new(Arc::new(RemoteStore::new(url, None)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = watcher
            .subscribe(move |snapshot: Snapshot<AboutBlock>| {
                let _ = tx.send(snapshot.len());
            })
            .await
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(ctx.hub.watched_collections().await, 1);

        handle.unsubscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while ctx.hub.watched_collections().await > 0 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();
    }
}
