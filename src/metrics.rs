//! Prometheus metrics for the bot.
//!
//! Exposes:
//! - `adsterra_bot_handler_duration_seconds` (histogram)
//! - `adsterra_bot_handler_total` (counter with status)
//! - `adsterra_bot_handler_inflight` (gauge)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::header::HeaderValue;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_histogram_vec, register_int_counter_vec, register_int_gauge_vec,
    Encoder, HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::Result;

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static HANDLER_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 10ms up to ~40 seconds.
    let buckets =
        prometheus::exponential_buckets(0.01, 2.0, 12).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "adsterra_bot_handler_duration_seconds",
        "Update handler duration in seconds",
        &["handler"],
        buckets
    )
    .expect("failed to register handler duration histogram")
});

static HANDLER_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "adsterra_bot_handler_total",
        "Total handled updates by status",
        &["handler", "status"]
    )
    .expect("failed to register handler counter")
});

static HANDLER_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "adsterra_bot_handler_inflight",
        "Number of updates being handled",
        &["handler"]
    )
    .expect("failed to register inflight gauge")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&HANDLER_DURATION);
    Lazy::force(&HANDLER_TOTAL);
    Lazy::force(&HANDLER_INFLIGHT);
}

/// Increment inflight gauge for a handler.
pub fn record_handler_start(handler: &'static str) {
    init_collectors();
    HANDLER_INFLIGHT.with_label_values(&[handler]).inc();
}

/// Record handler completion with duration and status.
pub fn record_handler_result(handler: &'static str, duration: Duration, success: bool) {
    init_collectors();
    HANDLER_INFLIGHT.with_label_values(&[handler]).dec();
    HANDLER_DURATION
        .with_label_values(&[handler])
        .observe(duration.as_secs_f64());
    HANDLER_TOTAL
        .with_label_values(&[handler, if success { "ok" } else { "error" }])
        .inc();
}

fn text_response(status: StatusCode, body: Full<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

fn not_found() -> Response<Full<Bytes>> {
    text_response(StatusCode::NOT_FOUND, Full::new(Bytes::new()))
}

async fn metrics_response() -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Full::from("encode error"),
        ));
    }

    let mut response = text_response(StatusCode::OK, Full::from(buffer));
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        response
            .headers_mut()
            .insert(hyper::header::CONTENT_TYPE, content_type);
    }
    Ok(response)
}

async fn handle_request(
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(not_found()),
    }
}

async fn serve(addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn records_successful_handler_metrics() {
        let handler = "test_handler_metrics_success";

        record_handler_start(handler);
        assert_eq!(HANDLER_INFLIGHT.with_label_values(&[handler]).get(), 1);

        record_handler_result(handler, Duration::from_millis(120), true);

        assert_eq!(HANDLER_INFLIGHT.with_label_values(&[handler]).get(), 0);
        assert_eq!(HANDLER_TOTAL.with_label_values(&[handler, "ok"]).get(), 1);
        assert_eq!(
            HANDLER_DURATION
                .with_label_values(&[handler])
                .get_sample_count(),
            1
        );
    }

    #[test]
    fn records_failed_handler_metrics() {
        let handler = "test_handler_metrics_error";

        record_handler_start(handler);
        record_handler_result(handler, Duration::from_secs(2), false);

        assert_eq!(HANDLER_TOTAL.with_label_values(&[handler, "error"]).get(), 1);
        assert_eq!(
            HANDLER_DURATION
                .with_label_values(&[handler])
                .get_sample_count(),
            1
        );
    }

    #[test]
    fn handlers_tracked_separately() {
        let first = "test_handler_separate_1";
        let second = "test_handler_separate_2";

        record_handler_start(first);
        record_handler_start(second);
        record_handler_result(first, Duration::from_millis(50), true);

        assert_eq!(HANDLER_INFLIGHT.with_label_values(&[first]).get(), 0);
        assert_eq!(HANDLER_INFLIGHT.with_label_values(&[second]).get(), 1);

        record_handler_result(second, Duration::from_millis(100), false);
        assert_eq!(HANDLER_INFLIGHT.with_label_values(&[second]).get(), 0);
    }

    #[tokio::test]
    async fn metrics_response_contains_registered_metrics() {
        let handler = "test_metrics_response";
        record_handler_start(handler);
        record_handler_result(handler, Duration::from_millis(10), true);

        let response = metrics_response().await.expect("metrics response");
        assert_eq!(response.status(), StatusCode::OK);

        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("collect metrics body")
            .to_bytes();
        let text = String::from_utf8(body_bytes.to_vec()).expect("utf-8 metrics body");
        assert!(text.contains("adsterra_bot_handler_total"));
        assert!(text.contains("adsterra_bot_handler_duration_seconds"));
        assert!(text.contains(handler));
    }

    #[test]
    fn unknown_path_is_not_found() {
        let response = not_found();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
