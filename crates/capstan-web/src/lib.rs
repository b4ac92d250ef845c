//! Capstan Web API Server
//!
//! REST API over the app definition handler. Every response, errors included,
//! uses the `{status, description, data}` envelope.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, Request as AxumRequest, State},
    http::{header::HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response as AxumResponse},
    routing::{delete, get, post},
    Router,
};
use capstan_core::{AppDefinitionPatch, AppDefinitionUpdate, Error, StatusCode as ApiStatus};
use capstan_engine::{Ack, AppDefinitionHandler, ImageSource};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/// API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: u32,
    pub description: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(description: impl Into<String>, data: T) -> Self {
        Self {
            status: ApiStatus::Ok.code(),
            description: description.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn ack(ack: Ack) -> Self {
        Self {
            status: ack.status.code(),
            description: ack.description,
            data: None,
        }
    }

    pub fn err(error: &Error) -> Self {
        Self {
            status: error.status().code(),
            description: error.to_string(),
            data: None,
        }
    }
}

/// Error returned by route handlers
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::validation(rejection.body_text()))
    }
}

/// HTTP status for an API status code
pub fn http_status(status: ApiStatus) -> StatusCode {
    match status {
        ApiStatus::Ok | ApiStatus::OkDeployStarted => StatusCode::OK,
        ApiStatus::NotFound | ApiStatus::ProjectNotFound => StatusCode::NOT_FOUND,
        ApiStatus::AlreadyExists | ApiStatus::BuildInProgress => StatusCode::CONFLICT,
        ApiStatus::BadName | ApiStatus::IllegalParameter => StatusCode::BAD_REQUEST,
        ApiStatus::DeploymentFailed | ApiStatus::Generic => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> AxumResponse {
        let code = http_status(self.0.status());
        if code.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (code, Json(ApiResponse::err(&self.0))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    handler: Arc<AppDefinitionHandler>,
    api_key: Option<String>,
}

impl AppState {
    pub fn new(handler: Arc<AppDefinitionHandler>, api_key: Option<String>) -> Self {
        Self { handler, api_key }
    }
}

/// API key authentication middleware
async fn api_key_auth(
    State(state): State<AppState>,
    request: AxumRequest,
    next: Next,
) -> Result<AxumResponse, StatusCode> {
    // If no API key is configured, allow all requests
    let Some(expected_key) = &state.api_key else {
        return Ok(next.run(request).await);
    };

    let provided_key = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());

    match provided_key {
        Some(key) if key == expected_key => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// `?detached=1` style flag
#[derive(Debug, Default, Deserialize)]
pub struct DetachedQuery {
    pub detached: Option<String>,
}

impl DetachedQuery {
    pub fn is_detached(&self) -> bool {
        matches!(
            self.detached.as_deref().map(str::trim),
            Some("1") | Some("true") | Some("yes") | Some("")
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SinceQuery {
    pub since: Option<i64>,
}

/// Register request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub has_persistent_data: bool,
}

/// Deploy request body
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    pub image_name: Option<String>,
    pub dockerfile_content: Option<String>,
    pub git_hash: Option<String>,
}

impl DeployRequest {
    pub fn into_source(self) -> capstan_core::Result<ImageSource> {
        match (self.image_name, self.dockerfile_content) {
            (Some(image_name), None) => Ok(ImageSource::Image {
                image_name,
                git_hash: self.git_hash,
            }),
            (None, Some(content)) => Ok(ImageSource::Dockerfile {
                content,
                git_hash: self.git_hash,
            }),
            (Some(_), Some(_)) => Err(Error::validation(
                "send either imageName or dockerfileContent, not both",
            )),
            (None, None) => Err(Error::validation("imageName or dockerfileContent is required")),
        }
    }
}

/// Project request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_project_id: Option<String>,
}

fn cors_layer(cors_origin: Option<&str>) -> CorsLayer {
    let origin = cors_origin
        .and_then(|o| o.parse::<HeaderValue>().ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CORS_ORIGIN));

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(tower_http::cors::Any)
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    create_router_with_cors(state, None)
}

/// Create the API router with custom CORS origin
pub fn create_router_with_cors(state: AppState, cors_origin: Option<&str>) -> Router {
    // Routes that require authentication
    let protected_routes = Router::new()
        .route(
            "/api/v2/user/apps/appDefinitions",
            get(list_app_definitions)
                .patch(patch_app_definition)
                .put(update_app_definition),
        )
        .route(
            "/api/v2/user/apps/appDefinitions/register",
            post(register_app_definition),
        )
        .route(
            "/api/v2/user/apps/appDefinitions/:app_name",
            delete(delete_app_definition),
        )
        .route(
            "/api/v2/user/apps/appData/:app_name",
            get(get_app_data).post(deploy_app),
        )
        .route(
            "/api/v2/user/projects",
            get(list_projects).post(register_project),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), api_key_auth));

    // Public routes (no auth required)
    let public_routes = Router::new().route("/api/health", get(health_check));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the API until `shutdown` resolves
pub async fn start_server<F>(
    bind_addr: &str,
    state: AppState,
    cors_origin: Option<&str>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router_with_cors(state, cors_origin);

    info!("Starting Capstan API on {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

// === API Handlers ===

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok(
        "OK",
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION")
        }),
    ))
}

async fn list_app_definitions(
    State(state): State<AppState>,
) -> ApiResult<capstan_engine::AppDefinitionsView> {
    let view = state.handler.get_all_app_definitions().await?;
    Ok(Json(ApiResponse::ok("App definitions are retrieved.", view)))
}

async fn register_app_definition(
    State(state): State<AppState>,
    Query(query): Query<DetachedQuery>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(req) = body?;
    let ack = state
        .handler
        .register_app_definition(
            &req.app_name,
            req.project_id,
            req.has_persistent_data,
            query.is_detached(),
        )
        .await?;
    Ok(Json(ApiResponse::ack(ack)))
}

/// `appName` from a JSON body, empty when missing
fn app_name_of(body: &Value) -> String {
    body.get("appName")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

async fn patch_app_definition(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<()> {
    let Json(body) = body?;
    let app_name = app_name_of(&body);
    let patch = AppDefinitionPatch::from_json(body)?;
    let ack = state.handler.patch_app_definition(&app_name, patch).await?;
    Ok(Json(ApiResponse::ack(ack)))
}

async fn update_app_definition(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<()> {
    let Json(body) = body?;
    let app_name = app_name_of(&body);
    let update = AppDefinitionUpdate::from_json(body)?;
    let ack = state.handler.update_app_definition(&app_name, update).await?;
    Ok(Json(ApiResponse::ack(ack)))
}

async fn delete_app_definition(
    State(state): State<AppState>,
    Path(app_name): Path<String>,
) -> ApiResult<()> {
    let ack = state.handler.delete_app_definition(&app_name).await?;
    Ok(Json(ApiResponse::ack(ack)))
}

async fn get_app_data(
    State(state): State<AppState>,
    Path(app_name): Path<String>,
    Query(query): Query<SinceQuery>,
) -> ApiResult<capstan_engine::AppData> {
    let data = state.handler.get_app_data(&app_name, query.since).await?;
    Ok(Json(ApiResponse::ok("App build status retrieved", data)))
}

async fn deploy_app(
    State(state): State<AppState>,
    Path(app_name): Path<String>,
    Query(query): Query<DetachedQuery>,
    body: Result<Json<DeployRequest>, JsonRejection>,
) -> ApiResult<()> {
    let Json(req) = body?;
    let source = req.into_source()?;
    let ack = state
        .handler
        .deploy(&app_name, source, query.is_detached())
        .await?;
    Ok(Json(ApiResponse::ack(ack)))
}

async fn list_projects(State(state): State<AppState>) -> ApiResult<Value> {
    let projects = state.handler.get_all_projects().await?;
    Ok(Json(ApiResponse::ok(
        "Projects are retrieved.",
        serde_json::json!({ "projects": projects }),
    )))
}

async fn register_project(
    State(state): State<AppState>,
    body: Result<Json<ProjectRequest>, JsonRejection>,
) -> ApiResult<capstan_core::Project> {
    let Json(req) = body?;
    let project = state
        .handler
        .register_project(&req.name, req.description, req.parent_project_id)
        .await?;
    Ok(Json(ApiResponse::ok("Project created", project)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use capstan_core::AppDefinition;
    use capstan_db::MemoryStore;
    use capstan_engine::{Deployer, HandlerConfig};
    use capstan_logs::{BuildLogRegistry, BuildLogWriter};
    use tower::ServiceExt;

    /// Deployer that succeeds without doing anything
    struct NoopDeployer;

    #[async_trait]
    impl Deployer for NoopDeployer {
        async fn prepare(&self, _: &AppDefinition, _: &ImageSource) -> capstan_core::Result<()> {
            Ok(())
        }

        async fn build(
            &self,
            app: &AppDefinition,
            source: &ImageSource,
            _: &BuildLogWriter,
        ) -> capstan_core::Result<String> {
            Ok(source
                .fixed_image(app)
                .unwrap_or_else(|| capstan_core::image_name(&app.app_name, 0)))
        }

        async fn apply(&self, _: &AppDefinition, _: &str, _: &BuildLogWriter) -> capstan_core::Result<()> {
            Ok(())
        }

        async fn remove(&self, _: &str) -> capstan_core::Result<()> {
            Ok(())
        }

        async fn reload_proxy(&self, _: &[AppDefinition]) -> capstan_core::Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "noop"
        }
    }

    fn router(api_key: Option<&str>) -> Router {
        let store = Arc::new(MemoryStore::new());
        let handler = AppDefinitionHandler::new(
            store.clone(),
            store,
            Arc::new(NoopDeployer),
            Arc::new(BuildLogRegistry::new(50)),
            HandlerConfig {
                root_domain: "example.com".to_string(),
                default_nginx_config: String::new(),
            },
        );
        create_router(AppState::new(Arc::new(handler), api_key.map(str::to_string)))
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn register(app: &Router, name: &str) {
        let (status, body) = send(
            app,
            json_request(
                "POST",
                "/api/v2/user/apps/appDefinitions/register",
                serde_json::json!({"appName": name, "hasPersistentData": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["status"], 100);
        assert_eq!(body["description"], "App Definition Saved");
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let app = router(Some("secret"));
        let (status, body) = send(
            &app,
            Request::get("/api/health").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_api_key_required() {
        let app = router(Some("secret"));
        let (status, _) = send(
            &app,
            Request::get("/api/v2/user/apps/appDefinitions")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            &app,
            Request::get("/api/v2/user/apps/appDefinitions")
                .header("X-API-Key", "secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_patch_and_list() {
        let app = router(None);
        register(&app, "web").await;

        let (status, body) = send(
            &app,
            json_request(
                "PATCH",
                "/api/v2/user/apps/appDefinitions",
                serde_json::json!({"appName": "web", "description": "blog", "forceSsl": true}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "Updated App Definition Saved");

        let (_, body) = send(
            &app,
            Request::get("/api/v2/user/apps/appDefinitions")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        let defs = body["data"]["appDefinitions"].as_array().unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0]["appName"], "web");
        assert_eq!(defs[0]["description"], "blog");
        assert_eq!(defs[0]["forceSsl"], true);
        assert!(defs[0]["isAppBuilding"].is_boolean());
        assert_eq!(body["data"]["rootDomain"], "example.com");
    }

    #[tokio::test]
    async fn test_error_envelope_and_status() {
        let app = router(None);
        register(&app, "web").await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v2/user/apps/appDefinitions/register",
                serde_json::json!({"appName": "web"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["status"], 1103);

        let (status, body) = send(
            &app,
            json_request(
                "PATCH",
                "/api/v2/user/apps/appDefinitions",
                serde_json::json!({"description": "no name"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 1104);

        let (status, body) = send(
            &app,
            json_request(
                "PATCH",
                "/api/v2/user/apps/appDefinitions",
                serde_json::json!({"appName": "web", "instanceCount": -2}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 1110);

        let (status, body) = send(
            &app,
            Request::delete("/api/v2/user/apps/appDefinitions/ghost")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 1111);
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let app = router(None);
        let request = Request::builder()
            .method("PATCH")
            .uri("/api/v2/user/apps/appDefinitions")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 1110);
    }

    #[tokio::test]
    async fn test_deploy_and_app_data() {
        let app = router(None);
        register(&app, "web").await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v2/user/apps/appData/web",
                serde_json::json!({"imageName": "nginx:1.25", "gitHash": "abc"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["description"], "Deploy is done");

        let (status, body) = send(
            &app,
            Request::get("/api/v2/user/apps/appData/web?since=-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["isAppBuilding"], false);
        assert_eq!(body["data"]["isBuildFailed"], false);
        assert_eq!(body["data"]["logs"]["firstLineNumber"], 0);
        assert!(!body["data"]["logs"]["lines"].as_array().unwrap().is_empty());

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v2/user/apps/appData/web?detached=1",
                serde_json::json!({}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 1110);
    }

    #[tokio::test]
    async fn test_detached_deploy_reports_started() {
        let app = router(None);
        register(&app, "web").await;

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v2/user/apps/appData/web?detached=1",
                serde_json::json!({"imageName": "nginx"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], 101);
    }

    #[tokio::test]
    async fn test_projects_routes() {
        let app = router(None);
        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v2/user/projects",
                serde_json::json!({"name": "team"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (_, body) = send(
            &app,
            Request::get("/api/v2/user/projects").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(body["data"]["projects"][0]["id"], id.as_str());

        let (status, body) = send(
            &app,
            json_request(
                "POST",
                "/api/v2/user/apps/appDefinitions/register",
                serde_json::json!({"appName": "api", "projectId": "missing"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 1112);
    }

    #[test]
    fn test_detached_query() {
        let q = |v: Option<&str>| DetachedQuery {
            detached: v.map(str::to_string),
        };
        assert!(q(Some("1")).is_detached());
        assert!(q(Some("true")).is_detached());
        assert!(!q(Some("0")).is_detached());
        assert!(!q(None).is_detached());
    }

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(http_status(ApiStatus::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(http_status(ApiStatus::BuildInProgress), StatusCode::CONFLICT);
        assert_eq!(http_status(ApiStatus::DeploymentFailed), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(http_status(ApiStatus::BadName), StatusCode::BAD_REQUEST);
    }
}
