//! Liveness probe.

pub const MISC_TAG: &str = "Miscellaneous";

/// Liveness probe for load balancers and orchestrators.
#[utoipa::path(
    method(get, head),
    path = "/healthz",
    tag = MISC_TAG,
    operation_id = "Health Check",
    summary = "Service health check",
    description = "Answers `ok` while the service is accepting requests. \
                   HEAD is supported for probes that discard the body.",
    responses(
        (status = 200, description = "Service is healthy", body = str, content_type = "text/plain", example = "ok")
    )
)]
pub async fn health() -> &'static str {
    "ok"
}
