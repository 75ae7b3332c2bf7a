use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_COUNT: AtomicU64 = AtomicU64::new(0);
static ERROR_COUNT: AtomicU64 = AtomicU64::new(0);
static ORDERS_ACCEPTED: AtomicU64 = AtomicU64::new(0);
static PARTIAL_FULFILLMENTS: AtomicU64 = AtomicU64::new(0);
static LISTINGS_EXHAUSTED: AtomicU64 = AtomicU64::new(0);

pub fn increment_request_count() {
    REQUEST_COUNT.fetch_add(1, Ordering::Relaxed);
}

pub fn increment_error_count() {
    ERROR_COUNT.fetch_add(1, Ordering::Relaxed);
}

/// Chamado a cada aceite confirmado
pub fn record_order_accepted(partial: bool, exhausted: bool) {
    ORDERS_ACCEPTED.fetch_add(1, Ordering::Relaxed);
    if partial {
        PARTIAL_FULFILLMENTS.fetch_add(1, Ordering::Relaxed);
    }
    if exhausted {
        LISTINGS_EXHAUSTED.fetch_add(1, Ordering::Relaxed);
    }
}

#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct MetricsResponse {
    pub http_requests_total: u64,
    pub http_errors_total: u64,
    pub orders_accepted_total: u64,
    pub partial_fulfillments_total: u64,
    pub listings_exhausted_total: u64,
}

impl MetricsResponse {
    fn snapshot() -> Self {
        MetricsResponse {
            http_requests_total: REQUEST_COUNT.load(Ordering::Relaxed),
            http_errors_total: ERROR_COUNT.load(Ordering::Relaxed),
            orders_accepted_total: ORDERS_ACCEPTED.load(Ordering::Relaxed),
            partial_fulfillments_total: PARTIAL_FULFILLMENTS.load(Ordering::Relaxed),
            listings_exhausted_total: LISTINGS_EXHAUSTED.load(Ordering::Relaxed),
        }
    }

    fn to_prometheus(&self) -> String {
        let counters = [
            ("http_requests_total", "Total number of HTTP requests", self.http_requests_total),
            ("http_errors_total", "Total number of HTTP 5xx responses", self.http_errors_total),
            ("orders_accepted_total", "Orders accepted by sellers", self.orders_accepted_total),
            (
                "partial_fulfillments_total",
                "Accepted orders fulfilled only partially",
                self.partial_fulfillments_total,
            ),
            (
                "listings_exhausted_total",
                "Listings removed after their stock ran out",
                self.listings_exhausted_total,
            ),
        ];

        counters
            .iter()
            .map(|(name, help, value)| {
                format!(
                    "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n",
                    name = name,
                    help = help,
                    value = value
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Health",
    responses(
        (status = 200, description = "Prometheus counters", body = String, content_type = "text/plain")
    )
)]
pub async fn get_metrics() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(MetricsResponse::snapshot().to_prometheus())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_order_accepted_bumps_counters() {
        let before = MetricsResponse::snapshot();
        record_order_accepted(true, true);
        record_order_accepted(false, false);
        let after = MetricsResponse::snapshot();

        assert!(after.orders_accepted_total >= before.orders_accepted_total + 2);
        assert!(after.partial_fulfillments_total >= before.partial_fulfillments_total + 1);
        assert!(after.listings_exhausted_total >= before.listings_exhausted_total + 1);
    }

    #[test]
    fn test_prometheus_text_format() {
        let text = MetricsResponse {
            http_requests_total: 7,
            http_errors_total: 1,
            orders_accepted_total: 3,
            partial_fulfillments_total: 2,
            listings_exhausted_total: 1,
        }
        .to_prometheus();

        assert!(text.contains("# TYPE orders_accepted_total counter\norders_accepted_total 3\n"));
        assert!(text.contains("http_requests_total 7\n"));
        assert!(text.contains("partial_fulfillments_total 2\n"));
    }
}
