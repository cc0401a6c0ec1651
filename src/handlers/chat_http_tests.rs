//! HTTP tests for the chat and model endpoints
//!
//! These exercise the request pipeline up to the provider boundary: rate
//! limiting, image validation, conversation resolution, and adapter
//! configuration errors. No upstream provider is contacted.

#[cfg(test)]
mod http_tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use actix_web::{test, web, App};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde_json::{json, Value};

    use crate::handlers::{configure_chat_routes, configure_model_routes};
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

    fn test_app_state(config: Config, rate_config: RateLimitConfig) -> web::Data<AppState> {
        web::Data::new(AppState {
            rate_limiter: Arc::new(RateLimiterService::new(rate_config).unwrap()),
            conversations: Arc::new(
                ConversationService::new(ConversationConfig {
                    ttl_secs: config.conversation_ttl_secs,
                    max_turns: config.max_conversation_turns,
                })
                .unwrap(),
            ),
            images: ImagePreprocessor::new(config.max_image_bytes, config.image_quality),
            prompts: PromptEngine::new(),
            tts: None,
            config,
        })
    }

    /// A tiny but real PNG, base64-encoded.
    fn test_image_base64() -> String {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            8,
            8,
            image::Rgb([120, 80, 40]),
        ));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        STANDARD.encode(buf.into_inner())
    }

    fn chat_body(image_base64: &str) -> Value {
        json!({
            "image_base64": image_base64,
            "system_prompt": "describe what you see",
            "provider": "openai",
        })
    }

    async fn call_chat(
        state: web::Data<AppState>,
        body: Value,
    ) -> actix_web::dev::ServiceResponse {
        let app = test::init_service(
            App::new().app_data(state).service(
                web::scope("/api/v1")
                    .configure(configure_chat_routes)
                    .configure(configure_model_routes),
            ),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/chat")
            .set_json(body)
            .to_request();
        test::call_service(&app, req).await
    }

    #[actix_web::test]
    async fn chat_rejects_invalid_base64() {
        let state = test_app_state(test_config(), RateLimitConfig::default());
        let resp = call_chat(state, chat_body("!!!not-base64!!!")).await;

        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert!(body["meta"]["request_id"].is_string());
    }

    #[actix_web::test]
    async fn chat_rejects_non_image_payload() {
        let state = test_app_state(test_config(), RateLimitConfig::default());
        let resp = call_chat(state, chat_body(&STANDARD.encode(b"plain text"))).await;

        assert_eq!(resp.status().as_u16(), 400);
    }

    #[actix_web::test]
    async fn chat_rejects_unknown_conversation_id() {
        let state = test_app_state(test_config(), RateLimitConfig::default());
        let mut body = chat_body(&test_image_base64());
        body["conversation_id"] = json!("no-such-conversation");

        let resp = call_chat(state, body).await;
        assert_eq!(resp.status().as_u16(), 404);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[actix_web::test]
    async fn chat_rejects_unconfigured_provider() {
        // No API keys in the test config, so adapter creation fails before
        // any network traffic.
        let state = test_app_state(test_config(), RateLimitConfig::default());
        let resp = call_chat(state, chat_body(&test_image_base64())).await;

        assert_eq!(resp.status().as_u16(), 400);
        let body: Value = test::read_body_json(resp).await;
        let message = body["error"]["message"].as_str().unwrap();
        assert!(message.contains("openai"), "unexpected message: {message}");
    }

    #[actix_web::test]
    async fn chat_rate_limits_by_ip_with_retry_after() {
        let state = test_app_state(
            test_config(),
            RateLimitConfig {
                ip_limit: 2,
                api_key_limit: 100,
                window_secs: 60,
                cleanup_interval_secs: 300,
            },
        );

        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(web::scope("/api/v1").configure(configure_chat_routes)),
        )
        .await;

        // Invalid payloads still count: admission happens before validation.
        for _ in 0..2 {
            let req = test::TestRequest::post()
                .uri("/api/v1/chat")
                .set_json(chat_body("x"))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status().as_u16(), 400);
        }

        let req = test::TestRequest::post()
            .uri("/api/v1/chat")
            .set_json(chat_body("x"))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status().as_u16(), 429);
        let retry_after = resp
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap();
        assert!(retry_after >= 1);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
    }

    #[actix_web::test]
    async fn model_catalogue_lists_builtin_providers() {
        let state = test_app_state(test_config(), RateLimitConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(web::scope("/api/v1").configure(configure_model_routes)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/models").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        let models = body["data"].as_array().unwrap();
        assert_eq!(models.len(), 6);
        let providers: Vec<&str> = models
            .iter()
            .map(|m| m["provider"].as_str().unwrap())
            .collect();
        assert!(providers.contains(&"openai"));
        assert!(providers.contains(&"claude"));
        assert!(providers.contains(&"gemini"));
    }

    #[actix_web::test]
    async fn test_connection_reports_failure_without_credentials() {
        let state = test_app_state(test_config(), RateLimitConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(state)
                .service(web::scope("/api/v1").configure(configure_model_routes)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/v1/test-connection")
            .set_json(json!({ "provider": "claude" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["success"], false);
        assert!(body["data"]["error_message"].is_string());
    }
}
