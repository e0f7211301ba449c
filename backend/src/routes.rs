use actix_web::{web, HttpResponse};
use log::{info, warn};
use serde_json::json;
use uuid::Uuid;

use shared::{AnalysisBackend, BatchResponse, ClassifyRequestItem};

use crate::auth::middleware::AuthenticatedCaller;
use crate::classify::{validate_batch, ClassifyService};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/classify").route(web::post().to(classify)))
        .service(web::resource("/api/classify/{backend}").route(web::post().to(classify_with_backend)))
        .service(web::resource("/health").route(web::get().to(health)));
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({"status": "ok"}))
}

async fn classify(
    service: web::Data<ClassifyService>,
    caller: AuthenticatedCaller,
    body: web::Json<Vec<ClassifyRequestItem>>,
) -> HttpResponse {
    run_classify(service, caller, body.into_inner(), None).await
}

async fn classify_with_backend(
    service: web::Data<ClassifyService>,
    caller: AuthenticatedCaller,
    path: web::Path<String>,
    body: web::Json<Vec<ClassifyRequestItem>>,
) -> HttpResponse {
    let segment = path.into_inner();
    run_classify(service, caller, body.into_inner(), Some(segment)).await
}

async fn run_classify(
    service: web::Data<ClassifyService>,
    caller: AuthenticatedCaller,
    items: Vec<ClassifyRequestItem>,
    segment: Option<String>,
) -> HttpResponse {
    let request_id = Uuid::new_v4();

    let (backend, unrecognized) = AnalysisBackend::from_path_segment(segment.as_deref());
    let warning = unrecognized.map(|value| {
        warn!(
            "[{}] unrecognized analysis backend '{}', skipping analysis stage",
            request_id, value
        );
        format!("Unrecognized analysis backend '{value}'; no analysis was performed")
    });

    let batch = match validate_batch(&items) {
        Ok(batch) => batch,
        Err(e) => {
            warn!("[{}] batch validation failed: {}", request_id, e);
            return HttpResponse::BadRequest().json(json!({
                "error": "Validation failed",
                "details": e.items,
            }));
        }
    };

    info!(
        "[{}] caller {} submitted batch of {} image(s), analysis backend: {}",
        request_id,
        caller.0,
        batch.len(),
        backend
    );

    let responses = service.process_batch(batch, backend).await;

    let failed = responses.iter().filter(|o| o.is_failure()).count();
    info!(
        "[{}] batch complete: {} succeeded, {} failed",
        request_id,
        responses.len() - failed,
        failed
    );

    HttpResponse::Ok().json(BatchResponse { responses, warning })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiError, AiInput, InferenceBackend};
    use crate::auth::jwt::JwtService;
    use crate::auth::middleware::AuthMiddleware;
    use crate::auth::origin::OriginGuard;
    use actix_web::{test, App};
    use async_trait::async_trait;
    use serde_json::Value;
    use shared::ItemOutcome;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingBackend {
        calls: Mutex<Vec<String>>,
    }

    impl CountingBackend {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl InferenceBackend for CountingBackend {
        async fn run(&self, model: &str, input: AiInput) -> Result<Value, AiError> {
            self.calls.lock().unwrap().push(model.to_string());
            match input {
                AiInput::Image { .. } => Ok(json!([{"label": "tabby", "score": 0.92}])),
                _ => Ok(json!({"response": "a tabby cat"})),
            }
        }
    }

    const TEST_SECRET: &str = "test-secret";

    fn bearer(jwt: &JwtService) -> (&'static str, String) {
        let token = jwt.generate_token(Uuid::new_v4()).unwrap();
        ("Authorization", format!("Bearer {token}"))
    }

    fn inline_item() -> Value {
        // "hello" base64-encoded.
        json!({"inline_data": "aGVsbG8=", "filename": "cat.png"})
    }

    macro_rules! test_app {
        ($mock:expr) => {{
            let classify_service =
                ClassifyService::new($mock.clone(), reqwest::Client::new(), 4);
            let jwt_service = JwtService::new(TEST_SECRET);
            test::init_service(
                App::new()
                    .wrap(AuthMiddleware::new(jwt_service.clone()))
                    .app_data(web::Data::new(classify_service))
                    .configure(configure_routes),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn cors_preflight_is_answered_without_a_token() {
        let mock = Arc::new(CountingBackend::default());
        let classify_service = ClassifyService::new(mock.clone(), reqwest::Client::new(), 4);
        let jwt_service = JwtService::new(TEST_SECRET);
        let origin = "https://app.example.com";

        // Same wrap order as the composition root: the origin guard and
        // auth middleware run before Cors gets to answer the preflight.
        let cors = actix_cors::Cors::default()
            .allowed_origin(origin)
            .allowed_methods(vec!["GET", "POST", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
            ]);
        let app = test::init_service(
            App::new()
                .wrap(cors)
                .wrap(AuthMiddleware::new(jwt_service))
                .wrap(OriginGuard::new(vec![origin.to_string()]))
                .app_data(web::Data::new(classify_service))
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::default()
            .method(actix_web::http::Method::OPTIONS)
            .uri("/api/classify")
            .insert_header(("Origin", origin))
            .insert_header(("Access-Control-Request-Method", "POST"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert!(resp.status().is_success());
        assert!(resp
            .headers()
            .contains_key("access-control-allow-origin"));
        assert_eq!(mock.call_count(), 0);
    }

    #[actix_web::test]
    async fn health_is_open_and_unauthenticated() {
        let mock = Arc::new(CountingBackend::default());
        let app = test_app!(mock);
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request())
            .await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn missing_bearer_rejects_before_validation_or_inference() {
        let mock = Arc::new(CountingBackend::default());
        let app = test_app!(mock);

        let req = test::TestRequest::post()
            .uri("/api/classify")
            .set_json(json!([inline_item()]))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
        assert_eq!(mock.call_count(), 0);
    }

    #[actix_web::test]
    async fn garbage_bearer_is_unauthorized() {
        let mock = Arc::new(CountingBackend::default());
        let app = test_app!(mock);

        let req = test::TestRequest::post()
            .uri("/api/classify")
            .insert_header(("Authorization", "Bearer not-a-token"))
            .set_json(json!([inline_item()]))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::UNAUTHORIZED);
        assert_eq!(mock.call_count(), 0);
    }

    #[actix_web::test]
    async fn invalid_batch_is_rejected_with_details_and_no_inference() {
        let mock = Arc::new(CountingBackend::default());
        let app = test_app!(mock);
        let jwt_service = JwtService::new(TEST_SECRET);

        // Item 0 has neither form, item 1 has both.
        let body = json!([
            {},
            {"url": "https://example.com/cat.jpg", "inline_data": "aGVsbG8=", "filename": "cat.jpg"},
        ]);
        let req = test::TestRequest::post()
            .uri("/api/classify")
            .insert_header(bearer(&jwt_service))
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Validation failed");
        assert_eq!(body["details"].as_array().unwrap().len(), 2);
        assert_eq!(mock.call_count(), 0);
    }

    #[actix_web::test]
    async fn classifies_a_batch_end_to_end() {
        let mock = Arc::new(CountingBackend::default());
        let app = test_app!(mock);
        let jwt_service = JwtService::new(TEST_SECRET);

        let req = test::TestRequest::post()
            .uri("/api/classify")
            .insert_header(bearer(&jwt_service))
            .set_json(json!([inline_item(), inline_item()]))
            .to_request();
        let body: BatchResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.responses.len(), 2);
        assert!(body.responses.iter().all(|o| !o.is_failure()));
        assert!(body.warning.is_none());
        // Classification only, one call per image.
        assert_eq!(mock.call_count(), 2);
    }

    #[actix_web::test]
    async fn llama_path_segment_adds_an_analysis_call() {
        let mock = Arc::new(CountingBackend::default());
        let app = test_app!(mock);
        let jwt_service = JwtService::new(TEST_SECRET);

        let req = test::TestRequest::post()
            .uri("/api/classify/llama")
            .insert_header(bearer(&jwt_service))
            .set_json(json!([inline_item()]))
            .to_request();
        let body: BatchResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.responses.len(), 1);
        match &body.responses[0] {
            ItemOutcome::Success { analysis, .. } => assert!(analysis.is_some()),
            other => panic!("expected success with analysis, got {other:?}"),
        }
        assert_eq!(mock.call_count(), 2);
    }

    #[actix_web::test]
    async fn unrecognized_backend_warns_and_skips_analysis() {
        let mock = Arc::new(CountingBackend::default());
        let app = test_app!(mock);
        let jwt_service = JwtService::new(TEST_SECRET);

        let req = test::TestRequest::post()
            .uri("/api/classify/mistral")
            .insert_header(bearer(&jwt_service))
            .set_json(json!([inline_item()]))
            .to_request();
        let body: BatchResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.responses.len(), 1);
        assert!(body.warning.as_deref().unwrap().contains("mistral"));
        assert_eq!(mock.call_count(), 1);
    }
}
