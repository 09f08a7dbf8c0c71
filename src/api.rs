use crate::datastore::structs::{PostId, UserId};
use crate::datastore::SharedStore;
use crate::metrics;
use crate::twoface::{ExternalError, Fallible, TfError};
use actix_web::{web, HttpResponse};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Instant;

pub mod posts;
pub mod users;

#[derive(Clone)]
pub struct State {
    pub ds: SharedStore,
}

/// Mount every API route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(root))
        .service(web::scope("/api/users").configure(users::configure))
        .service(web::scope("/api/posts").configure(posts::configure));
}

const BAD_JSON: ExternalError = ExternalError::invalid_field("Invalid JSON body");
const BAD_QUERY: ExternalError = ExternalError::invalid_field("Invalid query string");

/// Body limit, plus malformed bodies reported the same way as every other API error.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            TfError {
                internal: anyhow!("rejected JSON body: {}", err),
                external: BAD_JSON,
            }
            .into()
        })
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| {
        TfError {
            internal: anyhow!("rejected query string: {}", err),
            external: BAD_QUERY,
        }
        .into()
    })
}

async fn root() -> web::Json<Message> {
    web::Json(Message::new("Blog API is running"))
}

/// Just a named pair that can be extracted from the path of the like/unlike endpoints.
#[derive(Serialize, Deserialize, PartialOrd, Ord, PartialEq, Eq, Clone, Copy, Debug)]
pub struct PostUser {
    pub post_id: PostId,
    pub user_id: UserId,
}

/// Body of responses that only confirm something happened.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_owned(),
        }
    }
}

pub trait CoerceColl<T>
where
    Self: IntoIterator<Item = T>,
{
    fn coerce_into<U: From<T>>(self) -> Vec<U>;
}

impl<T> CoerceColl<T> for Vec<T> {
    fn coerce_into<U: From<T>>(self) -> Vec<U> {
        self.into_iter().map(|v| v.into()).collect()
    }
}

/// 201 with the created record as JSON.
fn created<T: Serialize>(body: T) -> HttpResponse {
    HttpResponse::Created().json(body)
}

/// Execute the closure, then log its operational metrics, e.g. time taken, whether it returned Ok/Err, etc.
async fn observe<F, Fut, R>(name: &'static str, f: F) -> Fallible<R>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Fallible<R>>,
{
    let start = Instant::now();
    let return_val = f().await;
    let duration = start.elapsed();
    metrics::HANDLER_SECS
        .with_label_values(&[name])
        .observe(duration.as_secs_f64());
    metrics::RESPONSES
        .with_label_values(&[name, variant_name(&return_val)])
        .inc();
    return_val
}

fn variant_name<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() {
        "ok"
    } else {
        "err"
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::datastore::Database;
    use std::path::PathBuf;
    use uuid::Uuid;

    /// A store on a fresh snapshot file under the temp dir.
    pub fn state() -> (State, PathBuf) {
        let path = std::env::temp_dir().join(format!("blogstore_api_{}.json", Uuid::new_v4()));
        let state = State {
            ds: SharedStore::new(Database::open(&path)),
        };
        (state, path)
    }

    /// Build the whole API as a test service.
    macro_rules! test_app {
        ($state:expr) => {
            actix_web::test::init_service(
                actix_web::App::new()
                    .app_data(actix_web::web::Data::new($state))
                    .app_data(crate::api::json_config(65536))
                    .app_data(crate::api::query_config())
                    .configure(crate::api::configure),
            )
            .await
        };
    }
    pub(crate) use test_app;
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};

    #[actix_rt::test]
    async fn test_root() {
        let (state, path) = testing::state();
        let app = testing::test_app!(state);
        let req = test::TestRequest::get().uri("/").to_request();
        let body: Message = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, Message::new("Blog API is running"));
        assert!(!path.exists());
    }

    #[actix_rt::test]
    async fn test_bad_input_gets_the_usual_error_body() {
        let (state, path) = testing::state();
        let app = testing::test_app!(state);

        let missing_field = test::TestRequest::post()
            .uri("/api/users")
            .set_json(serde_json::json!({"email": "a@x.com"}))
            .to_request();
        let not_json = test::TestRequest::post()
            .uri("/api/users")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"email\":")
            .to_request();
        for req in [missing_field, not_json] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "UserInvalidField: Invalid JSON body");
        }

        let req = test::TestRequest::post()
            .uri("/api/posts?authorId=abc")
            .set_json(serde_json::json!({"title": "T", "content": "1234567890"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "UserInvalidField: Invalid query string");
        assert!(!path.exists());
    }
}
