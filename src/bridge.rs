//! The bridge between decoded chat requests and the inference engine.
//!
//! # Prompt extraction
//! All content blocks of all messages are flattened in order. The first text block is the prompt
//! and the first image block (if any) is passed along as the only image reference. Roles are not
//! considered, and earlier messages win over later ones.
//!
//! # Scheduling
//! Engines are synchronous and slow, so every call runs on tokio's blocking pool. Most on-device
//! runtimes hold a single model context, so by default calls are queued behind a mutex and the
//! engine only ever sees one generation at a time.
use crate::engine::InferenceEngine;
use crate::errors::GatewayError;
use crate::models::{Content, Message};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

/// The parts of a conversation handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub text: String,
    pub image_url: Option<String>,
}

impl Prompt {
    pub fn image_refs(&self) -> Vec<String> {
        self.image_url.iter().cloned().collect()
    }
}

/// Pick the first text block and first image block across the flattened content of `messages`.
pub fn extract_prompt(messages: &[Message]) -> Result<Prompt, GatewayError> {
    let mut text = None;
    let mut image_url = None;

    for content in messages.iter().flat_map(|m| m.content.iter()) {
        match content {
            Content::Text { text: t } if text.is_none() => text = Some(t.clone()),
            Content::ImageUrl { image_url: i } if image_url.is_none() => {
                image_url = Some(i.url.clone())
            }
            _ => {}
        }
        if text.is_some() && image_url.is_some() {
            break;
        }
    }

    let text = text.ok_or(GatewayError::MissingPrompt)?;
    Ok(Prompt { text, image_url })
}

/// An inference engine bound to a gateway session.
#[derive(Clone)]
pub struct InferenceBridge {
    engine: Arc<dyn InferenceEngine>,
    /// Present when calls must be serialized.
    gate: Option<Arc<Mutex<()>>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for InferenceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceBridge")
            .field("engine", &"<engine>")
            .field("serialized", &self.gate.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl InferenceBridge {
    /// A bridge that serializes engine calls and never times out.
    pub fn new(engine: Arc<dyn InferenceEngine>) -> Self {
        Self::with_options(engine, true, None)
    }

    pub fn with_options(
        engine: Arc<dyn InferenceEngine>,
        serialize: bool,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            engine,
            gate: serialize.then(|| Arc::new(Mutex::new(()))),
            timeout,
        }
    }

    pub fn is_serialized(&self) -> bool {
        self.gate.is_some()
    }

    /// Extract the prompt from `messages` and run the engine on it, returning its reply verbatim.
    ///
    /// Engine errors and panics become [`GatewayError`]s; they never propagate to the caller as a
    /// panic.
    pub async fn invoke(&self, model: &str, messages: &[Message]) -> Result<String, GatewayError> {
        let prompt = extract_prompt(messages)?;
        debug!(
            model = %model,
            prompt_len = prompt.text.len(),
            has_image = prompt.image_url.is_some(),
            "Invoking inference engine"
        );

        let engine = Arc::clone(&self.engine);
        let gate = self.gate.clone();
        let model_name = model.to_string();
        // The timeout covers queueing for the gate as well as the generation itself.
        let run = async move {
            // The guard moves into the blocking task, so a call we stopped waiting on still
            // holds the engine until it returns.
            let permit = match gate {
                Some(gate) => Some(gate.lock_owned().await),
                None => None,
            };
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                engine.generate(&model_name, &prompt.text, &prompt.image_refs())
            })
            .await
        };

        let joined = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(model = %model, "Inference timed out after {:?}", limit);
                    return Err(GatewayError::InferenceTimeout(limit));
                }
            },
            None => run.await,
        };

        match joined {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                error!(model = %model, error = %e, "Inference engine returned an error");
                Err(GatewayError::Inference(e))
            }
            Err(e) => {
                error!(model = %model, error = %e, "Inference task failed");
                Err(GatewayError::InferencePanicked)
            }
        }
    }
}
