use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware, web, App, HttpResponse, HttpServer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glimpse::services::{
    AudioStore, ConversationConfig, ConversationService, ImagePreprocessor, MaintenanceJob,
    MaintenanceJobConfig, PromptEngine, RateLimitConfig, RateLimiterService, TtsEngine,
};
use glimpse::{handlers, AppState, Config};

/// Health check endpoint
async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "glimpse",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glimpse=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");

    info!("Starting Glimpse server on {}:{}", config.host, config.port);

    let rate_limiter = Arc::new(
        RateLimiterService::new(RateLimitConfig {
            ip_limit: config.rate_limit_per_ip,
            api_key_limit: config.rate_limit_per_api_key,
            window_secs: config.rate_limit_window_secs,
            cleanup_interval_secs: config.rate_limit_cleanup_secs,
        })
        .expect("Invalid rate limiter configuration"),
    );

    let conversations = Arc::new(
        ConversationService::new(ConversationConfig {
            ttl_secs: config.conversation_ttl_secs,
            max_turns: config.max_conversation_turns,
        })
        .expect("Invalid conversation store configuration"),
    );

    let tts = TtsEngine::from_config(&config)
        .expect("Invalid TTS configuration")
        .map(Arc::new);
    let audio_store: Option<AudioStore> = tts.as_ref().map(|tts| tts.store().clone());

    // Start the periodic cleanup job
    let maintenance_job = MaintenanceJob::new(
        Arc::clone(&rate_limiter),
        Arc::clone(&conversations),
        audio_store,
        MaintenanceJobConfig {
            interval: Duration::from_secs(config.maintenance_interval_secs),
            enabled: true,
        },
    );
    let _maintenance_shutdown = maintenance_job.start();
    info!("Maintenance job started");

    let app_state = web::Data::new(AppState {
        images: ImagePreprocessor::new(config.max_image_bytes, config.image_quality),
        prompts: PromptEngine::new(),
        rate_limiter,
        conversations,
        tts,
        config: config.clone(),
    });

    let server_addr = format!("{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .route("/health", web::get().to(health_check))
            .configure(handlers::configure_audio_routes)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::configure_chat_routes)
                    .configure(handlers::configure_model_routes)
                    .configure(handlers::configure_admin_routes),
            )
    })
    .bind(&server_addr)?
    .run()
    .await
}
