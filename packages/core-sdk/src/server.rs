use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::signal;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{error, info, warn};

use crate::{
    config::Settings,
    models::{ChatRequest, ChatResponse, ModelInfo},
    service::ChatService,
};

/**
 * \brief 路由共享状态；配置与聊天服务持有同一个 `Settings` 实例。
 */
#[derive(Clone)]
pub struct AppState {
    service: Arc<ChatService>,
}

impl AppState {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            service: Arc::new(ChatService::new(settings)),
        }
    }

    pub fn settings(&self) -> Arc<Settings> {
        Arc::clone(self.service.settings())
    }

    pub fn service(&self) -> &ChatService {
        &self.service
    }
}

#[derive(Serialize, Debug)]
struct HealthResponse {
    status: &'static str,
    anthropic_configured: bool,
}

/**
 * \brief 启动 HTTP 服务，收到 Ctrl-C / SIGTERM 后优雅退出。
 * \param addr 监听地址，如 "127.0.0.1:8000"
 */
pub async fn run(settings: Arc<Settings>, addr: &str) -> Result<()> {
    let app = build_router(AppState::new(settings));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr, "server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

/**
 * \brief 组装路由、请求日志与跨域策略。
 */
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings().allowed_origins());

    Router::new()
        .route("/", get(root))
        .route("/api/chat/message", post(send_message))
        .route("/api/models", get(list_models))
        .route("/api/health", get(health_check))
        .layer(middleware::from_fn(logging_middleware))
        .layer(cors)
        .with_state(state)
}

/**
 * \brief 允许列表中的来源可带凭据访问，方法与请求头按预检请求回显。
 */
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        }))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

async fn logging_middleware(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if path == "/api/health" {
        return next.run(req).await;
    }

    let method = req.method().to_string();
    let start = Instant::now();
    let response = next.run(req).await;
    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    match status {
        500.. => error!(method, path, status, duration_ms, "request"),
        400..=499 => warn!(method, path, status, duration_ms, "request"),
        _ => info!(method, path, status, duration_ms, "request"),
    }
    response
}

async fn root() -> Json<Value> {
    Json(json!({"message": "Claude Chat API", "docs": "/docs"}))
}

/**
 * \brief 发送消息：POST /api/chat/message
 */
async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, Json<Value>)> {
    state
        .service()
        .send_message(request)
        .await
        .map(Json)
        .map_err(internal_err)
}

async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelInfo>> {
    Json(state.service().models())
}

/**
 * \brief 健康检查：只报告是否配置了默认 Key，不访问上游。
 */
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        anthropic_configured: state.settings().anthropic_configured(),
    })
}

fn internal_err<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"detail": e.to_string()})),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
