//! Chat handler
//!
//! The single vision-chat endpoint: rate limiting, image preprocessing,
//! conversation tracking, model dispatch, optional SSE streaming and
//! optional speech synthesis.

use std::sync::Arc;
use std::time::Instant;

use actix_web::{web, HttpRequest, HttpResponse};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use serde_json::json;
use tracing::{debug, warn};

use crate::adapters::{create_adapter, TextStream};
use crate::error::AppError;
use crate::models::{ChatData, ChatRequest, Role};
use crate::services::ConversationService;
use crate::AppState;

/// Marker recorded as the user turn; the image itself is not retained in
/// conversation history.
const USER_TURN_CONTENT: &str = "Image uploaded";

/// POST /v1/chat
///
/// Describe an image through the selected vision model. Streams the reply
/// as SSE when `stream` is set, otherwise returns the full text (and an
/// audio URL when TTS is enabled).
pub async fn chat(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ChatRequest>,
) -> Result<HttpResponse, AppError> {
    let started = Instant::now();
    let body = body.into_inner();

    let connection_info = req.connection_info().clone();
    let ip_address = connection_info.realip_remote_addr().unwrap_or("unknown");
    let api_key = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok());

    state.rate_limiter.check(ip_address, api_key).await?;

    let raw = crate::services::ImagePreprocessor::decode_base64(&body.image_base64)?;
    if !state.images.validate(&raw) {
        return Err(AppError::Validation(
            "image data is not a supported image format".to_string(),
        ));
    }
    let image_base64 = state.images.process(&raw)?;

    let conversation_id = match &body.conversation_id {
        Some(id) => {
            if !state.conversations.exists(id).await {
                return Err(AppError::NotFound(format!("Conversation not found: {id}")));
            }
            id.clone()
        }
        None => state.conversations.create().await,
    };

    let history = state.conversations.get_history(&conversation_id).await;
    let messages = state.prompts.build_messages(
        &body.system_prompt,
        &history,
        &image_base64,
        body.provider,
    );

    let adapter = create_adapter(body.provider, &state.config, body.custom_config.as_ref())?;
    debug!(
        provider = adapter.name(),
        conversation_id = %conversation_id,
        stream = body.stream,
        "Dispatching chat request"
    );

    if body.stream {
        let text_stream = adapter.generate_stream(&messages).await?;
        return Ok(stream_response(
            text_stream,
            Arc::clone(&state.conversations),
            conversation_id,
            started,
        ));
    }

    let text = adapter.generate(&messages).await?;
    record_turns(&state.conversations, &conversation_id, &text).await;

    let audio_url = match (&state.tts, body.tts_enabled) {
        (Some(tts), true) => tts.try_generate(&text, &body.tts_voice, body.tts_speed).await,
        (None, true) => {
            debug!("TTS requested but not configured");
            None
        }
        _ => None,
    };

    let data = ChatData {
        text,
        audio_url,
        conversation_id,
        latency_ms: started.elapsed().as_millis() as u64,
    };
    Ok(HttpResponse::Ok().json(super::ApiResponse::new(data)))
}

async fn record_turns(conversations: &ConversationService, conversation_id: &str, reply: &str) {
    // The conversation can expire between resolution and completion; that
    // just means this exchange is not retained.
    if let Err(e) = conversations
        .add_message(conversation_id, Role::User, USER_TURN_CONTENT)
        .await
    {
        warn!(conversation_id, error = %e, "Failed to record user turn");
        return;
    }
    if let Err(e) = conversations
        .add_message(conversation_id, Role::Assistant, reply)
        .await
    {
        warn!(conversation_id, error = %e, "Failed to record assistant turn");
    }
}

/// Wrap a model text stream as an SSE response.
///
/// Each fragment goes out as a `data: {"text": ...}` frame. After the model
/// finishes, the full reply is recorded in the conversation, a final frame
/// carries the conversation id and latency, and `[DONE]` terminates the
/// stream.
fn stream_response(
    text_stream: TextStream,
    conversations: Arc<ConversationService>,
    conversation_id: String,
    started: Instant,
) -> HttpResponse {
    struct StreamState {
        inner: TextStream,
        conversations: Arc<ConversationService>,
        conversation_id: String,
        started: Instant,
        accumulated: String,
        finishing: bool,
        done: bool,
    }

    let state = StreamState {
        inner: text_stream,
        conversations,
        conversation_id,
        started,
        accumulated: String::new(),
        finishing: false,
        done: false,
    };

    let body = stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        if state.finishing {
            state.done = true;
            return Some((Ok::<_, actix_web::Error>(sse_done()), state));
        }

        match state.inner.next().await {
            Some(Ok(fragment)) => {
                state.accumulated.push_str(&fragment);
                let frame = sse_frame(&json!({ "text": fragment }));
                Some((Ok(frame), state))
            }
            Some(Err(e)) => {
                warn!(error = %e, "Model stream failed mid-response");
                state.done = true;
                let frame = sse_frame(&json!({ "error": e.to_string() }));
                Some((Ok(frame), state))
            }
            None => {
                record_turns(
                    &state.conversations,
                    &state.conversation_id,
                    &state.accumulated,
                )
                .await;
                state.finishing = true;
                let frame = sse_frame(&json!({
                    "conversation_id": state.conversation_id,
                    "latency_ms": state.started.elapsed().as_millis() as u64,
                }));
                Some((Ok(frame), state))
            }
        }
    });

    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(body)
}

fn sse_frame(payload: &serde_json::Value) -> Bytes {
    Bytes::from(format!("data: {payload}\n\n"))
}

fn sse_done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}

/// Configure chat routes
pub fn configure_chat_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/chat").route(web::post().to(chat)));
}
