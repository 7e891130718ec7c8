use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::download::{DownloadError, DownloadMode, DownloadRequest, JobResult, Metadata};
use crate::rate_limiter::QuotaReservation;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use axum::{
    body::Body,
    extract::{
        rejection::JsonRejection, ConnectInfo, Form, FromRequest, Multipart, Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::metrics::{self, metrics_handler};
use super::{log_requests, state::*, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub hash: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct GetInfoBody {
    pub url: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum InfoResponse {
    Success { data: Metadata },
    Error { message: String },
}

/// Fields of the download form, accepted urlencoded or multipart.
#[derive(Deserialize, Debug, Default)]
struct DownloadForm {
    #[serde(default)]
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

impl DownloadForm {
    fn set(&mut self, name: &str, value: String) {
        match name {
            "url" => self.url = value,
            "type" => self.kind = Some(value),
            "quality" => self.quality = Some(value),
            _ => {}
        }
    }
}

impl<S> FromRequest<S> for DownloadForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        if !is_multipart {
            let Form(form) = Form::<DownloadForm>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(form);
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        let mut form = DownloadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(IntoResponse::into_response)?
        {
            let name = field.name().unwrap_or_default().to_string();
            let value = field.text().await.map_err(IntoResponse::into_response)?;
            form.set(&name, value);
        }
        Ok(form)
    }
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(file_name)
    )
}

fn retry_after_secs(after: Duration) -> u64 {
    after.as_secs_f64().ceil() as u64
}

fn download_error_response(err: &DownloadError) -> Response {
    let body = match err {
        DownloadError::RateLimitExceeded { .. } => err.to_string(),
        _ => format!("Error: {}", err),
    };
    let mut response = (err.status_code(), body).into_response();
    if let DownloadError::RateLimitExceeded {
        retry_after: Some(after),
        ..
    } = err
    {
        response.headers_mut().insert(
            header::RETRY_AFTER,
            HeaderValue::from(retry_after_secs(*after)),
        );
    }
    response
}

async fn file_response(result: &JobResult) -> Result<Response, DownloadError> {
    let file = tokio::fs::File::open(&result.path).await?;
    let body = Body::from_stream(ReaderStream::new(file));
    let headers = [
        (header::CONTENT_TYPE, result.mime_type.to_string()),
        (header::CONTENT_LENGTH, result.size_bytes.to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&result.download_name()),
        ),
    ];
    Ok((StatusCode::OK, headers, body).into_response())
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        hash: state.hash.clone(),
    };
    Json(stats)
}

async fn get_info(
    State(orchestrator): State<GuardedOrchestrator>,
    body: Result<Json<GetInfoBody>, JsonRejection>,
) -> Response {
    let url = match body {
        Ok(Json(body)) => body.url,
        Err(rejection) => {
            let message = rejection.body_text();
            warn!("Rejected get-info body: {}", message);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(InfoResponse::Error { message }),
            )
                .into_response();
        }
    };

    // Dropped with the request if the client goes away
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    match orchestrator.fetch(&url, &cancel).await {
        Ok(data) => Json(InfoResponse::Success { data }).into_response(),
        Err(e) => {
            error!(url = %url, "Metadata lookup failed: {}", e);
            let message = e.to_string();
            (e.status_code(), Json(InfoResponse::Error { message })).into_response()
        }
    }
}

async fn download(
    State(state): State<ServerState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    form: DownloadForm,
) -> Response {
    let client = peer.ip().to_string();

    let Some(reservation) = state.rate_limiter.reserve(&client) else {
        warn!(client = %client, "Rate limit blocked");
        metrics::record_rate_limit_hit("/download");
        let config = state.rate_limiter.config();
        return download_error_response(&DownloadError::RateLimitExceeded {
            max_requests: config.max_requests,
            window: config.window,
            retry_after: state.rate_limiter.retry_after(&client),
        });
    };

    if form.url.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "Error: missing url").into_response();
    }

    let request = DownloadRequest {
        url: form.url,
        mode: DownloadMode::from(form.kind.as_deref().unwrap_or_default()),
        quality: form.quality.filter(|q| !q.trim().is_empty()),
        client_id: client,
    };

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    match state.orchestrator.download(&request, &cancel).await {
        Ok(result) => deliver(&result, reservation).await,
        Err(e) => download_error_response(&e),
    }
}

/// Streams a finished download, billing the reservation only once the file is
/// open.
async fn deliver(result: &JobResult, reservation: QuotaReservation) -> Response {
    match file_response(result).await {
        Ok(response) => {
            reservation.commit();
            response
        }
        Err(e) => {
            error!(file = ?result.path, "Failed to open finished download: {}", e);
            download_error_response(&e)
        }
    }
}

pub fn make_app(state: ServerState) -> Router {
    let home_router: Router = match state.config.frontend_dir_path.clone() {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let api_routes: Router = Router::new()
        .route("/api/get-info", post(get_info))
        .route("/download", post(download))
        .with_state(state.clone());

    home_router
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    config: ServerConfig,
    orchestrator: GuardedOrchestrator,
    rate_limiter: GuardedRateLimiter,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(ServerState::new(config, orchestrator, rate_limiter));

    let metrics_app = Router::new().route("/metrics", get(metrics_handler));
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            error!("Metrics server stopped: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
