mod ai;
mod auth;
mod classify;
mod routes;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::env;
use std::sync::Arc;
use std::time::Duration;

use ai::{InferenceBackend, WorkersAiClient};
use auth::jwt::JwtService;
use auth::middleware::AuthMiddleware;
use auth::origin::OriginGuard;
use classify::ClassifyService;
use routes::configure_routes;

const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    let jwt_secret = env::var("JWT_SECRET").expect("JWT_SECRET must be set");
    let account_id = env::var("CF_ACCOUNT_ID").expect("CF_ACCOUNT_ID must be set");
    let api_token = env::var("CF_API_TOKEN").expect("CF_API_TOKEN must be set");
    let api_base_url =
        env::var("CF_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string());

    let fetch_timeout_secs: u64 = env::var("FETCH_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);
    let max_concurrent_images: usize = env::var("MAX_CONCURRENT_IMAGES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8);
    let allowed_origins: Vec<String> = env::var("ALLOWED_ORIGINS")
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    // One HTTP client for both image fetches and inference calls;
    // reqwest::Client is an Arc internally and safe to share.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(fetch_timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to build HTTP client: {e}"),
            )
        })?;

    let ai_client: Arc<dyn InferenceBackend> = Arc::new(WorkersAiClient::new(
        http.clone(),
        api_base_url,
        account_id,
        api_token,
    ));
    let classify_service = ClassifyService::new(ai_client, http, max_concurrent_images);

    let jwt_service = JwtService::new(&jwt_secret);
    let auth_middleware = AuthMiddleware::new(jwt_service.clone());
    let origin_guard = OriginGuard::new(allowed_origins.clone());

    if allowed_origins.is_empty() {
        log::warn!("ALLOWED_ORIGINS is not set; cross-origin requests are not restricted");
    } else {
        log::info!("Allowed origins: {}", allowed_origins.join(", "));
    }
    log::info!(
        "Concurrency limit: {} images, fetch timeout: {}s",
        max_concurrent_images,
        fetch_timeout_secs
    );

    let port = env::var("PORT").unwrap_or_else(|_| "8081".to_string());
    let bind_address = format!("0.0.0.0:{}", port);

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        let cors = if allowed_origins.is_empty() {
            Cors::default().allow_any_origin()
        } else {
            allowed_origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        };

        App::new()
            .wrap(
                cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(auth_middleware.clone())
            .wrap(origin_guard.clone())
            .app_data(web::Data::new(classify_service.clone()))
            .app_data(web::Data::new(jwt_service.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
