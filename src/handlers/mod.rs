pub mod admin;
pub mod audio;
pub mod chat;
pub mod models;

#[cfg(test)]
mod chat_http_tests;

#[cfg(test)]
mod admin_http_tests;

pub use admin::configure_admin_routes;
pub use audio::configure_audio_routes;
pub use chat::configure_chat_routes;
pub use models::configure_model_routes;

use serde::Serialize;

/// Standard API response wrapper
#[derive(Serialize)]
pub(crate) struct ApiResponse<T: Serialize> {
    data: T,
    meta: ResponseMeta,
}

#[derive(Serialize)]
struct ResponseMeta {
    request_id: String,
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn new(data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta {
                request_id: uuid::Uuid::new_v4().to_string(),
            },
        }
    }
}
