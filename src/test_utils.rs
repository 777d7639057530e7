//! Test doubles for the inference engine.
use crate::engine::{InferenceEngine, InferenceError};
use std::sync::{Arc, Mutex};

/// One recorded call to [`StubEngine::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCall {
    pub model: String,
    pub prompt: String,
    pub image_refs: Vec<String>,
}

/// An engine that records every call and answers from a closure.
#[derive(Clone)]
pub struct StubEngine {
    calls: Arc<Mutex<Vec<EngineCall>>>,
    reply: Arc<dyn Fn(&str) -> Result<String, InferenceError> + Send + Sync>,
}

impl StubEngine {
    /// Always reply with `reply`, whatever the prompt.
    pub fn replying(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    /// Reply with `f(prompt)`.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<String, InferenceError> + Send + Sync + 'static,
    {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            reply: Arc::new(f),
        }
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl std::fmt::Debug for StubEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubEngine")
            .field("calls", &self.calls)
            .field("reply", &"<closure>")
            .finish()
    }
}

impl InferenceEngine for StubEngine {
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        image_refs: &[String],
    ) -> Result<String, InferenceError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(EngineCall {
                model: model.to_string(),
                prompt: prompt.to_string(),
                image_refs: image_refs.to_vec(),
            });
        (self.reply)(prompt)
    }
}
