//! HTTP endpoints: `/metrics`, `/snapshot` and `/health`.

use std::future::Future;
use std::io;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::error;

use crate::collector::traits::{CommandRunner, FileSystem};
use crate::exporter::{JetsonExporter, ScrapePhase};

type AppState<F, R> = State<Arc<JetsonExporter<F, R>>>;

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    phase: ScrapePhase,
    generation: u64,
    tegrastats_running: bool,
}

pub fn router<F, R>(exporter: Arc<JetsonExporter<F, R>>) -> Router
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + 'static,
{
    Router::new()
        .route("/metrics", get(handle_metrics::<F, R>))
        .route("/snapshot", get(handle_snapshot::<F, R>))
        .route("/health", get(handle_health::<F, R>))
        .with_state(exporter)
}

/// Serves the router on `listener` until `shutdown` resolves.
pub async fn serve<F, R>(
    listener: TcpListener,
    exporter: Arc<JetsonExporter<F, R>>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()>
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + 'static,
{
    axum::serve(listener, router(exporter))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn handle_metrics<F, R>(State(exporter): AppState<F, R>) -> Response
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + 'static,
{
    // Refresh reads the log and /proc; keep it off the async workers
    let result = tokio::task::spawn_blocking(move || exporter.render()).await;

    match result {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!(error = %e, "scrape panicked in spawn_blocking");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Latest cached snapshot as JSON. Does not trigger a refresh.
async fn handle_snapshot<F, R>(State(exporter): AppState<F, R>) -> Response
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + 'static,
{
    match exporter.collector().entry() {
        Some(entry) => Json(entry).into_response(),
        None => (StatusCode::NOT_FOUND, "no snapshot decoded yet").into_response(),
    }
}

async fn handle_health<F, R>(State(exporter): AppState<F, R>) -> Json<HealthStatus>
where
    F: FileSystem + Clone + 'static,
    R: CommandRunner + 'static,
{
    let collector = exporter.collector();
    Json(HealthStatus {
        status: "ok",
        phase: exporter.phase(),
        generation: collector.entry().map_or(0, |e| e.generation),
        tegrastats_running: collector.source().is_running(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{MockFs, MockRunner, SCENARIO_LOG};
    use crate::config::ExporterConfig;
    use crate::exporter::tests::sample_value;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn app(fs: MockFs) -> (Router, Arc<JetsonExporter<MockFs, MockRunner>>) {
        let config = ExporterConfig {
            logfile: PathBuf::from(SCENARIO_LOG),
            ..Default::default()
        };
        let exporter =
            Arc::new(JetsonExporter::launch(fs, MockRunner::new(), &config).unwrap());
        (router(exporter.clone()), exporter)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (app, _) = app(MockFs::jetson_nano());
        let (status, content_type, body) = get(app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some(prometheus::TEXT_FORMAT));
        assert_eq!(sample_value(&body, r#"ram{statistic="total"}"#), Some(3964.0));
        assert_eq!(sample_value(&body, "uptime"), Some(350735.47));
    }

    #[tokio::test]
    async fn test_snapshot_endpoint() {
        let (app, exporter) = app(MockFs::jetson_nano());

        let (status, _, _) = get(app.clone(), "/snapshot").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        exporter.collector().refresh();
        let (status, _, body) = get(app, "/snapshot").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["generation"], 1);
        assert_eq!(json["snapshot"]["memory"]["used"], 2015);
        assert_eq!(json["snapshot"]["cpu_cores"][0]["governor"], "schedutil");
        assert!(json["updated_at"].is_string());
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _) = app(MockFs::jetson_nano());
        let (status, _, body) = get(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["phase"], "idle");
        assert_eq!(json["generation"], 0);
        assert_eq!(json["tegrastats_running"], true);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (app, _) = app(MockFs::jetson_nano());
        let (status, _, _) = get(app, "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
