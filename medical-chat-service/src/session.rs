//! Interactive conversation contract.
//!
//! The server keeps no conversation state. Each call rebuilds everything from
//! the message and the client-held history, asks the gateway for the next turn
//! and repairs the answer so that the response invariants always hold:
//!
//! * a complete conversation never asks a follow-up question,
//! * conversations of `MAX_CONVERSATION_MESSAGES` or more messages are complete,
//! * a disclaimer is always present.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, ServiceError};
use crate::gateway::LanguageModelGateway;
use crate::models::{InteractiveRequest, InteractiveResponse, MedicalAdvice, YesNo};
use crate::normalizer::{disclaimer_or_standard, require_object};

/// Session-length cap, counted as history turns plus the current message.
pub const MAX_CONVERSATION_MESSAGES: usize = 100;

/// Messages that reset the conversation without contacting the gateway.
pub const RESTART_COMMANDS: [&str; 4] = ["restart", "start over", "reset", "new conversation"];

const LOG_PREVIEW_CHARS: usize = 100;

/// One interactive answer as the gateway produced it. Everything except the
/// reply text is optional until the failsafes and defaults have been applied.
#[derive(Debug, Deserialize)]
struct GatewayTurn {
    response: String,
    needs_follow_up: Option<bool>,
    follow_up_question: Option<String>,
    is_medical_related: Option<bool>,
    is_medical_related_prompt: Option<YesNo>,
    can_provide_structured_response: Option<bool>,
    conversation_complete: Option<bool>,
    #[serde(rename = "Disclaimer")]
    disclaimer: Option<String>,
    #[serde(flatten)]
    advice: MedicalAdvice,
}

impl GatewayTurn {
    fn decode(raw: Value) -> Result<Self> {
        require_object(&raw, "interactive")?;
        serde_json::from_value(raw)
            .map_err(|e| ServiceError::malformed(format!("invalid interactive answer: {e}")))
    }

    fn is_complete(&self) -> bool {
        self.conversation_complete.unwrap_or(false)
    }

    /// Forces completion once the conversation reaches the length cap.
    fn apply_length_cap(&mut self, total_messages: usize) {
        if self.is_complete() || total_messages < MAX_CONVERSATION_MESSAGES {
            return;
        }

        warn!(
            total_messages,
            "Forcing conversation completion after reaching the message cap"
        );
        self.conversation_complete = Some(true);
        self.needs_follow_up = Some(false);
        self.follow_up_question = Some(String::new());
        // unspecified counts as medical
        if self.is_medical_related.unwrap_or(true) {
            self.can_provide_structured_response = Some(true);
        }
    }

    /// A complete conversation must not ask anything further.
    fn apply_consistency(&mut self) {
        if !self.is_complete() {
            return;
        }

        let asks_follow_up = self.needs_follow_up.unwrap_or(false);
        let has_question = self
            .follow_up_question
            .as_deref()
            .is_some_and(|q| !q.is_empty());
        if asks_follow_up || has_question {
            warn!(
                needs_follow_up = asks_follow_up,
                "Fixing inconsistency: conversation_complete=true with a pending follow-up"
            );
        }
        self.needs_follow_up = Some(false);
        self.follow_up_question = Some(String::new());
    }

    fn finish(self) -> InteractiveResponse {
        let is_medical_related = self.is_medical_related.unwrap_or(true);
        InteractiveResponse {
            response: self.response,
            needs_follow_up: self.needs_follow_up.unwrap_or(false),
            follow_up_question: self.follow_up_question.unwrap_or_default(),
            is_medical_related,
            is_medical_related_prompt: self
                .is_medical_related_prompt
                .unwrap_or_else(|| is_medical_related.into()),
            can_provide_structured_response: self.can_provide_structured_response.unwrap_or(false),
            conversation_complete: self.conversation_complete.unwrap_or(false),
            disclaimer: disclaimer_or_standard(self.disclaimer),
            advice: self.advice,
            conversation_restarted: None,
            error: None,
        }
    }
}

pub fn is_restart_command(message: &str) -> bool {
    let normalized = message.trim().to_lowercase();
    RESTART_COMMANDS.contains(&normalized.as_str())
}

/// Validates a raw request body and runs one conversation turn.
pub async fn process_turn(
    gateway: &dyn LanguageModelGateway,
    body: Value,
) -> Result<InteractiveResponse> {
    let request = InteractiveRequest::from_json(body)?;
    respond(gateway, &request).await
}

/// Runs one conversation turn for an already validated request.
pub async fn respond(
    gateway: &dyn LanguageModelGateway,
    request: &InteractiveRequest,
) -> Result<InteractiveResponse> {
    info!(
        message = %preview(&request.message),
        history_length = request.history_len(),
        "Interactive request"
    );

    if is_restart_command(&request.message) {
        info!("User requested a conversation restart");
        return Ok(InteractiveResponse::restarted());
    }

    let turns = request.turns()?;
    let raw = gateway.interactive(&request.message, &turns).await?;
    debug!(raw = %raw, "Raw interactive answer");

    let mut turn = GatewayTurn::decode(raw)?;
    turn.apply_length_cap(request.total_messages());
    turn.apply_consistency();
    let response = turn.finish();

    log_key_fields(&response);
    Ok(response)
}

fn preview(text: &str) -> String {
    if text.chars().count() > LOG_PREVIEW_CHARS {
        let head: String = text.chars().take(LOG_PREVIEW_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

fn log_key_fields(response: &InteractiveResponse) {
    let advice = &response.advice;
    info!(
        response = %preview(&response.response),
        needs_follow_up = response.needs_follow_up,
        follow_up_question = %preview(&response.follow_up_question),
        is_medical_related = response.is_medical_related,
        is_medical_related_prompt = ?response.is_medical_related_prompt,
        can_provide_structured_response = response.can_provide_structured_response,
        conversation_complete = response.conversation_complete,
        symptoms = ?advice.symptoms.as_deref().map(preview),
        remedies = ?advice.remedies.as_deref().map(preview),
        precautions = ?advice.precautions.as_deref().map(preview),
        guidelines = ?advice.guidelines.as_deref().map(preview),
        "Interactive response processed"
    );
}
