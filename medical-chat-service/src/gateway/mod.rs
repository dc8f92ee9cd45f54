//! Language-model gateway: the only place that talks to the text-generation provider.
//!
//! Every mode returns the provider's answer as raw JSON. Shape checks happen in
//! the normalizer and the session contract, not here.

pub mod chat_bridge;
pub mod gemini;

use async_trait::async_trait;
use serde_json::Value;

use crate::models::ConversationTurn;

pub use gemini::GeminiGateway;

#[async_trait]
pub trait LanguageModelGateway: Send + Sync {
    /// Single-turn free-text answer, expected as `{response, Disclaimer?}`.
    async fn single_turn(&self, prompt: &str) -> anyhow::Result<Value>;

    /// Single-turn classification, expected to contain `is_medical_related_prompt`.
    async fn classify(&self, prompt: &str) -> anyhow::Result<Value>;

    /// One interactive turn given the client-held history.
    async fn interactive(&self, message: &str, history: &[ConversationTurn])
    -> anyhow::Result<Value>;
}

/// Decodes a model completion into JSON.
///
/// Models like to wrap JSON in markdown fences, so those are stripped first.
/// Text that still isn't JSON comes back as `Value::String` and is rejected
/// further up as a malformed answer.
pub fn parse_json_answer(completion: &str) -> Value {
    let trimmed = strip_code_fence(completion.trim());
    serde_json::from_str::<Value>(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // drop the language tag on the opening fence, if any
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway double that returns one canned answer (or failure) for every mode.
    pub struct ScriptedGateway {
        answer: std::result::Result<Value, String>,
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        pub fn answering(answer: Value) -> Self {
            Self {
                answer: Ok(answer),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(reason: &str) -> Self {
            Self {
                answer: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn next(&self) -> anyhow::Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.clone().map_err(|reason| anyhow::anyhow!(reason))
        }
    }

    #[async_trait]
    impl LanguageModelGateway for ScriptedGateway {
        async fn single_turn(&self, _prompt: &str) -> anyhow::Result<Value> {
            self.next()
        }

        async fn classify(&self, _prompt: &str) -> anyhow::Result<Value> {
            self.next()
        }

        async fn interactive(
            &self,
            _message: &str,
            _history: &[ConversationTurn],
        ) -> anyhow::Result<Value> {
            self.next()
        }
    }
}
