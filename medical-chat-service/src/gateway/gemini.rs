use std::future::IntoFuture;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::{Chat, Prompt, PromptError},
    providers::gemini,
};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{LanguageModelGateway, chat_bridge::to_rig_messages, parse_json_answer};
use crate::{config::ServiceConfig, models::ConversationTurn};

const FREE_TEXT_PREAMBLE: &str = r#"You are a helpful health information assistant.

Answer the user's question clearly and concisely.

Respond with ONLY this JSON, no markdown and no extra text:
{
  "response": "<your answer>",
  "Disclaimer": "<a one-sentence reminder that you are not a substitute for a medical professional>"
}
"#;

const CLASSIFY_PREAMBLE: &str = r#"You are a medical triage assistant.

FIRST decide whether the user's prompt is about health, symptoms, illness, injury or medication.

IF IT IS MEDICAL, respond with ONLY this JSON:
{
  "is_medical_related_prompt": "Yes",
  "Symptoms": "<symptoms the user describes or that usually accompany the condition>",
  "Remedies": "<safe home remedies>",
  "Precautions": "<precautions to take>",
  "Guidelines": "<when to see a doctor and general guidance>",
  "medication": ["<common over-the-counter medication>", "..."],
  "Disclaimer": "<a one-sentence reminder that you are not a substitute for a medical professional>"
}

IF IT IS NOT MEDICAL, respond with ONLY:
{
  "is_medical_related_prompt": "No"
}

Do not mix text and JSON in your response.
"#;

const INTERACTIVE_PREAMBLE: &str = r#"You are a careful medical assistant holding a multi-turn conversation.

Use the conversation history to understand the user's situation. Ask ONE focused
follow-up question at a time until you know enough (duration, severity, age,
other symptoms) to give structured guidance. Do not ask more than a few questions.

Respond with ONLY this JSON, no markdown and no extra text:
{
  "response": "<what you say to the user this turn>",
  "needs_follow_up": true | false,
  "follow_up_question": "<the question, or empty string>",
  "is_medical_related": true | false,
  "is_medical_related_prompt": "Yes" | "No",
  "can_provide_structured_response": true | false,
  "conversation_complete": true | false,
  "Disclaimer": "<a one-sentence reminder that you are not a substitute for a medical professional>"
}

When "conversation_complete" is true, "needs_follow_up" must be false, "follow_up_question"
must be empty, and if the topic is medical also include:
  "Symptoms", "Remedies", "Precautions", "Guidelines" (strings) and "medication" (array of strings).
"#;

/// Gateway backed by Google Gemini through rig.
pub struct GeminiGateway {
    client: gemini::Client,
    model: String,
    timeout: Duration,
}

impl GeminiGateway {
    pub fn new(api_key: &str, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: gemini::Client::new(api_key),
            model: model.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(
            &config.gemini_api_key,
            config.gemini_model.clone(),
            config.gateway_timeout,
        )
    }

    fn agent(&self, preamble: &str) -> Agent<gemini::completion::CompletionModel> {
        self.client.agent(&self.model).preamble(preamble).build()
    }

    async fn bounded<F>(&self, mode: &str, call: F) -> anyhow::Result<String>
    where
        F: IntoFuture<Output = Result<String, PromptError>>,
    {
        let completion = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| {
                anyhow::anyhow!("Gemini {mode} call timed out after {:?}", self.timeout)
            })?
            .with_context(|| format!("Gemini {mode} call failed"))?;

        debug!(mode = %mode, completion_length = completion.len(), "Gemini answered");
        Ok(completion)
    }
}

#[async_trait]
impl LanguageModelGateway for GeminiGateway {
    async fn single_turn(&self, prompt: &str) -> anyhow::Result<Value> {
        info!(model = %self.model, prompt_length = prompt.len(), "Sending free-text prompt");

        let agent = self.agent(FREE_TEXT_PREAMBLE);
        let completion = self
            .bounded("free-text", agent.prompt(prompt.to_string()))
            .await?;

        // A plain-text answer is still a usable free-text response.
        Ok(match parse_json_answer(&completion) {
            Value::String(text) => json!({ "response": text }),
            other => other,
        })
    }

    async fn classify(&self, prompt: &str) -> anyhow::Result<Value> {
        info!(model = %self.model, prompt_length = prompt.len(), "Sending classification prompt");

        let agent = self.agent(CLASSIFY_PREAMBLE);
        let completion = self
            .bounded("classification", agent.prompt(prompt.to_string()))
            .await?;
        Ok(parse_json_answer(&completion))
    }

    async fn interactive(
        &self,
        message: &str,
        history: &[ConversationTurn],
    ) -> anyhow::Result<Value> {
        info!(
            model = %self.model,
            history_length = history.len(),
            "Sending interactive turn"
        );

        let agent = self.agent(INTERACTIVE_PREAMBLE);
        let chat_history = to_rig_messages(history);
        let completion = self
            .bounded("interactive", agent.chat(message.to_string(), chat_history))
            .await?;
        Ok(parse_json_answer(&completion))
    }
}
