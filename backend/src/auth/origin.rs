use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::{header, Method},
    Error, HttpResponse,
};
use futures::future::{ok, Ready};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Request-forgery guard for the `/api/*` surface: state-changing
/// requests carrying an Origin header must match the configured origin
/// allow-list. An empty list disables the check (mirrors the permissive
/// CORS default); requests without an Origin header (curl, server-side
/// callers) pass through.
#[derive(Clone)]
pub struct OriginGuard {
    allowed_origins: Arc<Vec<String>>,
}

impl OriginGuard {
    pub fn new(allowed_origins: Vec<String>) -> Self {
        Self {
            allowed_origins: Arc::new(allowed_origins),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for OriginGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Transform = OriginGuardService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(OriginGuardService {
            service: Arc::new(service),
            allowed_origins: self.allowed_origins.clone(),
        })
    }
}

pub struct OriginGuardService<S> {
    service: Arc<S>,
    allowed_origins: Arc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for OriginGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<actix_web::body::EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let allowed_origins = self.allowed_origins.clone();

        Box::pin(async move {
            let method = req.method();
            let state_changing =
                method != Method::GET && method != Method::HEAD && method != Method::OPTIONS;

            let mut rejected_origin: Option<String> = None;
            if req.path().starts_with("/api/") && state_changing && !allowed_origins.is_empty() {
                if let Some(origin) = req.headers().get(header::ORIGIN) {
                    let origin_allowed = origin
                        .to_str()
                        .map(|value| allowed_origins.iter().any(|allowed| allowed == value))
                        .unwrap_or(false);

                    if !origin_allowed {
                        rejected_origin = Some(format!("{:?}", origin));
                    }
                }
            }

            if let Some(origin) = rejected_origin {
                log::warn!(
                    "Rejected cross-site request to {} from origin {}",
                    req.path(),
                    origin
                );
                let (http_req, _payload) = req.into_parts();
                let response = HttpResponse::Forbidden()
                    .json(serde_json::json!({"error": "Cross-site request rejected"}))
                    .map_into_right_body();
                return Ok(ServiceResponse::new(http_req, response));
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};
    use serde_json::Value;

    async fn accepted() -> HttpResponse {
        HttpResponse::Ok().json(serde_json::json!({"ok": true}))
    }

    macro_rules! guarded_app {
        ($($origin:expr),*) => {{
            test::init_service(
                App::new()
                    .wrap(OriginGuard::new(vec![$($origin.to_string()),*]))
                    .route("/api/echo", web::post().to(accepted))
                    .route("/api/echo", web::get().to(accepted)),
            )
            .await
        }};
    }

    #[actix_web::test]
    async fn disallowed_origin_on_post_is_forbidden() {
        let app = guarded_app!("https://app.example.com");
        let req = test::TestRequest::post()
            .uri("/api/echo")
            .insert_header(("Origin", "https://evil.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::FORBIDDEN);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "Cross-site request rejected");
    }

    #[actix_web::test]
    async fn allowed_origin_on_post_passes() {
        let app = guarded_app!("https://app.example.com");
        let req = test::TestRequest::post()
            .uri("/api/echo")
            .insert_header(("Origin", "https://app.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn empty_allow_list_disables_the_check() {
        let app = guarded_app!();
        let req = test::TestRequest::post()
            .uri("/api/echo")
            .insert_header(("Origin", "https://anywhere.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn request_without_origin_header_passes() {
        let app = guarded_app!("https://app.example.com");
        let req = test::TestRequest::post().uri("/api/echo").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }

    #[actix_web::test]
    async fn read_only_method_is_not_guarded() {
        let app = guarded_app!("https://app.example.com");
        let req = test::TestRequest::get()
            .uri("/api/echo")
            .insert_header(("Origin", "https://evil.example.com"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
