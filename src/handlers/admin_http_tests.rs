//! HTTP tests for the admin endpoints

#[cfg(test)]
mod http_tests {
    use std::sync::Arc;

    use actix_web::{test, web, App};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};

    use crate::handlers::configure_admin_routes;
    use crate::services::{
        ConversationConfig, ConversationService, ImagePreprocessor, PromptEngine,
        RateLimitConfig, RateLimiterService,
    };
    use crate::{AppState, Config};

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            rate_limit_per_ip: 60,
            rate_limit_per_api_key: 100,
            rate_limit_window_secs: 60,
            rate_limit_cleanup_secs: 300,
            conversation_ttl_secs: 1800,
            max_conversation_turns: 10,
            max_image_bytes: 1024 * 1024,
            image_quality: 85,
            model_timeout_secs: 30,
            tts_timeout_secs: 10,
            tts_provider: None,
            tts_endpoint: None,
            tts_audio_dir: "audio_files".to_string(),
            tts_audio_ttl_secs: 3600,
            maintenance_interval_secs: 300,
            openai_api_key: None,
            anthropic_api_key: None,
            gemini_api_key: None,
            doubao_api_key: None,
            qwen_api_key: None,
            glm_api_key: None,
        }
    }

    fn test_app_state(conversation_ttl_secs: u64) -> web::Data<AppState> {
        let config = test_config();
        web::Data::new(AppState {
            rate_limiter: Arc::new(
                RateLimiterService::new(RateLimitConfig::default()).unwrap(),
            ),
            conversations: Arc::new(
                ConversationService::new(ConversationConfig {
                    ttl_secs: conversation_ttl_secs,
                    max_turns: 10,
                })
                .unwrap(),
            ),
            images: ImagePreprocessor::new(config.max_image_bytes, config.image_quality),
            prompts: PromptEngine::new(),
            tts: None,
            config,
        })
    }

    #[actix_web::test]
    async fn rate_limit_stats_reflect_recorded_requests() {
        let state = test_app_state(1800);
        state
            .rate_limiter
            .check("10.0.0.1", Some("key-1"))
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(web::scope("/api/v1").configure(configure_admin_routes)),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/v1/admin/rate-limits?ip_address=10.0.0.1&api_key=key-1")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["stats"]["tracked_ips"], 1);
        assert_eq!(body["data"]["stats"]["tracked_keys"], 1);
        assert_eq!(body["data"]["remaining"]["ip"], 59);
        assert_eq!(body["data"]["remaining"]["api_key"], 99);
    }

    #[actix_web::test]
    async fn rate_limit_reset_clears_bucket() {
        let state = test_app_state(1800);
        state.rate_limiter.check("10.0.0.2", None).await.unwrap();

        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .service(web::scope("/api/v1").configure(configure_admin_routes)),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/v1/admin/rate-limits/reset")
            .set_json(json!({ "ip_address": "10.0.0.2" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let remaining = state.rate_limiter.remaining("10.0.0.2", None).await;
        assert_eq!(remaining.ip, 60);
    }

    #[actix_web::test]
    async fn conversation_count_excludes_expired() {
        let state = test_app_state(60);
        state.conversations.create().await;
        state
            .conversations
            .create_at(Utc::now() - Duration::seconds(300))
            .await;

        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(web::scope("/api/v1").configure(configure_admin_routes)),
        )
        .await;
        let req = test::TestRequest::get()
            .uri("/api/v1/admin/conversations")
            .to_request();
        let resp = test::call_service(&app, req).await;

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["active"], 1);
    }

    #[actix_web::test]
    async fn cleanup_reports_removed_conversations() {
        let state = test_app_state(60);
        state
            .conversations
            .create_at(Utc::now() - Duration::seconds(300))
            .await;

        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(web::scope("/api/v1").configure(configure_admin_routes)),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/api/v1/admin/conversations/cleanup")
            .to_request();
        let resp = test::call_service(&app, req).await;

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["removed"], 1);
    }
}
