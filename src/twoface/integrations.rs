//! Integrate twoface with Actix-web.

use crate::twoface::TfError;
use actix_web::{
    http::{header, StatusCode},
    HttpResponse,
};
use serde::Serialize;
use tracing::{error, warn};

// Twoface errors can be used as Actix-web errors.
// If a handler returns a Twoface error, the external portion will be shown to the user.
// The internal portion will only be logged.
impl actix_web::ResponseError for TfError {
    fn status_code(&self) -> StatusCode {
        self.external.cause.into()
    }

    fn error_response(&self) -> HttpResponse {
        if self.status_code().is_server_error() {
            error!("{:#}", self.internal);
        } else {
            warn!("{:#}", self.internal);
        }
        let resp = serde_json::to_string(&ErrBody {
            error: self.to_string(),
        })
        .unwrap_or_else(|e| {
            error!("Serde error: {}", e);
            "{\"error\": \"ServerError: internal server error\"}".to_owned()
        });
        HttpResponse::build(self.status_code())
            .insert_header((header::CONTENT_TYPE, "application/json"))
            .body(resp)
    }
}

#[derive(Serialize)]
struct ErrBody {
    error: String,
}

#[cfg(test)]
mod tests {
    use crate::twoface::externalerror::Cause;
    use crate::twoface::*;
    use actix_web::{http::StatusCode, test, web, App};

    #[actix_rt::test]
    async fn test_only_external_part_reaches_the_client() {
        async fn index() -> Fallible<web::Json<String>> {
            let file = std::fs::read_to_string("secret-snapshot-do-not-leak-to-user.json");
            file.describe_err(ExternalError {
                cause: Cause::ServerError,
                text: "Could not save data",
            })
            .map(web::Json)
        }

        let app = test::init_service(App::new().route("/", web::get().to(index))).await;

        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = test::read_body(resp).await;
        assert_eq!(
            std::str::from_utf8(&body).unwrap(),
            "{\"error\":\"ServerError: Could not save data\"}"
        );
    }

    #[actix_rt::test]
    async fn test_not_found_status() {
        async fn index() -> Fallible<web::Json<String>> {
            Err(anyhow::anyhow!("post 3 missing").describe(ExternalError::not_found("Post not found")))
        }

        let app = test::init_service(App::new().route("/", web::get().to(index))).await;
        let req = test::TestRequest::get().uri("/").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
