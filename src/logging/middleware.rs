use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tower_http::request_id::{
    MakeRequestUuid, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};

/// Analytics beacons fire on every page load; their request/response pair
/// logs at debug so the info-level request log stays readable.
fn is_tracking_path(path: &str) -> bool {
    matches!(
        path,
        "/api/analytics/page-view" | "/api/analytics/content-view"
    )
}

pub async fn log_request(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();
    let quiet = is_tracking_path(uri.path());

    let req_id: String = request
        .extensions()
        .get::<RequestId>()
        .and_then(|id| id.header_value().to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    if quiet {
        tracing::debug!(
            request_id = %req_id,
            method = %method,
            uri = %uri,
            version = ?version,
            "incoming request"
        );
    } else {
        tracing::info!(
            request_id = %req_id,
            method = %method,
            uri = %uri,
            version = ?version,
            "incoming request"
        );
    }

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    if status.is_server_error() {
        tracing::error!(
            request_id = %req_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "request completed with error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            request_id = %req_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "request completed with client error"
        );
    } else if quiet {
        tracing::debug!(
            request_id = %req_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "request completed successfully"
        );
    } else {
        tracing::info!(
            request_id = %req_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = %duration.as_millis(),
            "request completed successfully"
        );
    }

    response
}

pub fn request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::x_request_id(MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::x_request_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracking_paths_are_quiet() {
        assert!(is_tracking_path("/api/analytics/page-view"));
        assert!(is_tracking_path("/api/analytics/content-view"));
        assert!(!is_tracking_path("/api/analytics/dashboard"));
        assert!(!is_tracking_path("/api/projects"));
        assert!(!is_tracking_path("/health"));
    }
}
