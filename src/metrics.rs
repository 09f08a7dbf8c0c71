lazy_static! {

    pub static ref HANDLER_SECS: prometheus::HistogramVec = register_histogram_vec!(
        "blogstore_handler_secs",
        "Seconds taken for each response, partitioned by endpoint name",
        &["endpoint_name"],
        vec![0.001, 0.01, 0.1, 1.0, 4.0] // Prometheus buckets
    )
    .expect("couldn't make HANDLER_SECS");

    pub static ref RESPONSES: prometheus::IntCounterVec = register_int_counter_vec!(
        "blogstore_responses",
        "How many responses of Ok/Err per endpoint",
        &["endpoint_name", "result"]
    )
    .expect("couldn't make RESPONSES");

    pub static ref HTTP_RESPONSES: prometheus::IntCounterVec = register_int_counter_vec!(
        "blogstore_http_responses",
        "Count of each HTTP status code served by blogstore responses",
        &["status"]
    )
    .expect("couldn't make HTTP_RESPONSES");

    pub static ref PERSIST_SECS: prometheus::Histogram = register_histogram!(
        "blogstore_persist_secs",
        "Seconds taken to rewrite the snapshot file",
        vec![0.0005, 0.001, 0.005, 0.025, 0.1, 0.5]
    )
    .expect("couldn't make PERSIST_SECS");

    pub static ref PERSIST_FAILURES: prometheus::IntCounter = register_int_counter!(
        "blogstore_persist_failures",
        "How many snapshot writes failed"
    )
    .expect("couldn't make PERSIST_FAILURES");

    pub static ref STORED_USERS: prometheus::IntGauge = register_int_gauge!(
        "blogstore_users",
        "How many users the datastore holds"
    )
    .expect("couldn't make STORED_USERS");

    pub static ref STORED_POSTS: prometheus::IntGauge = register_int_gauge!(
        "blogstore_posts",
        "How many posts the datastore holds"
    )
    .expect("couldn't make STORED_POSTS");
}

pub mod endpoint {
    use actix_web::{http, HttpResponse};
    use prometheus::Encoder;

    pub async fn gather() -> HttpResponse {
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = vec![];
        let metric_families = prometheus::gather();
        match encoder.encode(&metric_families, &mut buffer) {
            Ok(()) => HttpResponse::build(http::StatusCode::OK)
                .content_type(encoder.format_type())
                .body(buffer),
            Err(e) => {
                let message = format!("{:?}", e);
                HttpResponse::build(http::StatusCode::INTERNAL_SERVER_ERROR).body(message)
            }
        }
    }
}
