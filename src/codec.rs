//! Decoding of chat requests and encoding of gateway responses.
use crate::models::{
    AssistantMessage, ChatCompletionResponse, ChatRequest, Choice, ListModelResponse,
    ResponseFormat,
};
use serde_json::error::Category;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

static COMPLETION_SEQ: AtomicU64 = AtomicU64::new(0);

/// Why a request body could not be turned into a [`ChatRequest`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("request body is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    #[error("invalid chat request: {0}")]
    Invalid(#[source] serde_json::Error),

    #[error("invalid chat request: `model` must not be empty")]
    EmptyModel,
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        match e.classify() {
            Category::Syntax | Category::Eof | Category::Io => DecodeError::Syntax(e),
            Category::Data => DecodeError::Invalid(e),
        }
    }
}

/// Parse a UTF-8 JSON body into a [`ChatRequest`]. Unknown fields are ignored.
pub fn decode(bytes: &[u8]) -> Result<ChatRequest, DecodeError> {
    let request: ChatRequest = serde_json::from_slice(bytes)?;
    if request.model.is_empty() {
        return Err(DecodeError::EmptyModel);
    }
    Ok(request)
}

/// Encode a model listing. Order is preserved.
pub fn encode_model_listing(names: &[String], format: ResponseFormat) -> Vec<u8> {
    let encoded = match format {
        ResponseFormat::Raw => serde_json::to_vec(names),
        ResponseFormat::OpenAi => serde_json::to_vec(&ListModelResponse::from_names(names)),
    };
    // Serializing strings and plain structs into a Vec can't fail.
    encoded.unwrap_or_default()
}

/// Encode the engine output for a completion. Returns the content type alongside the body.
pub fn encode_completion(
    model: &str,
    text: String,
    format: ResponseFormat,
) -> (&'static str, Vec<u8>) {
    match format {
        ResponseFormat::Raw => (TEXT_CONTENT_TYPE, text.into_bytes()),
        ResponseFormat::OpenAi => {
            let response = completion_envelope(model, text);
            (
                JSON_CONTENT_TYPE,
                serde_json::to_vec(&response).unwrap_or_default(),
            )
        }
    }
}

fn completion_envelope(model: &str, text: String) -> ChatCompletionResponse {
    let created = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let seq = COMPLETION_SEQ.fetch_add(1, Ordering::Relaxed);

    ChatCompletionResponse {
        id: format!("chatcmpl-{:x}{:06x}", created, seq),
        object: "chat.completion".into(),
        created,
        model: model.to_string(),
        choices: vec![Choice {
            index: 0,
            message: AssistantMessage {
                role: "assistant".into(),
                content: text,
            },
            finish_reason: Some("stop".into()),
        }],
    }
}
