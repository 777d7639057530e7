//! The contract with the on-device inference engine.
//!
//! The engine is an opaque, synchronous and potentially slow function. The gateway never calls it
//! on an async worker: see [`crate::bridge::InferenceBridge`] for how calls are scheduled.
use std::fmt;

/// Error reported by an inference engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InferenceError(String);

impl InferenceError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for InferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InferenceError {}

/// A local model runtime.
///
/// Closures with the matching signature implement this trait, so a session can be bound with
/// just a function:
///
/// ```
/// use edgeway::engine::{InferenceEngine, InferenceError};
///
/// let engine = |_model: &str, prompt: &str, _images: &[String]| -> Result<String, InferenceError> {
///     Ok(prompt.to_uppercase())
/// };
/// assert_eq!(engine.generate("gemma", "hi", &[]).unwrap(), "HI");
/// ```
pub trait InferenceEngine: Send + Sync {
    /// Generate a reply for `prompt` with `model`.
    ///
    /// `image_refs` holds at most one URL or data URI today, passed through untouched.
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        image_refs: &[String],
    ) -> Result<String, InferenceError>;
}

impl<F> InferenceEngine for F
where
    F: Fn(&str, &str, &[String]) -> Result<String, InferenceError> + Send + Sync,
{
    fn generate(
        &self,
        model: &str,
        prompt: &str,
        image_refs: &[String],
    ) -> Result<String, InferenceError> {
        self(model, prompt, image_refs)
    }
}

/// Replies with the prompt it was given. Stands in for a real runtime when the gateway binary is
/// run on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoEngine;

impl InferenceEngine for EchoEngine {
    fn generate(
        &self,
        _model: &str,
        prompt: &str,
        _image_refs: &[String],
    ) -> Result<String, InferenceError> {
        Ok(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_engine_returns_prompt() {
        let images = vec!["https://example.com/cat.png".to_string()];
        assert_eq!(EchoEngine.generate("gemma", "hello", &images).unwrap(), "hello");
    }

    #[test]
    fn test_closure_engine_sees_all_arguments() {
        let engine = |model: &str, prompt: &str, images: &[String]| {
            Ok::<_, InferenceError>(format!("{model}:{prompt}:{}", images.join(",")))
        };
        let images = vec!["a".to_string()];
        assert_eq!(engine.generate("m", "p", &images).unwrap(), "m:p:a");
    }
}
