use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{Result, ServiceError};

pub const STANDARD_DISCLAIMER: &str = "I am an AI chatbot, not a substitute for professional medical advice, diagnosis, or treatment. Always seek the advice of your physician or other qualified health provider with any questions you may have regarding a medical condition.";

/// Who produced a turn. Gemini calls the assistant side "model".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        match raw.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "model" | "assistant" => Ok(Role::Model),
            other => Err(serde::de::Error::custom(format!(
                "unknown role '{other}', expected 'user' or 'model'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    #[serde(alias = "content")]
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Body of `POST /gemini-interactive` after boundary validation.
///
/// History entries are kept as raw JSON until a gateway call actually needs
/// them, so a restart command works whatever the client stored.
#[derive(Debug, Clone, PartialEq)]
pub struct InteractiveRequest {
    /// Trimmed user message. This is also what the gateway receives.
    pub message: String,
    pub conversation_history: Option<Vec<Value>>,
}

impl InteractiveRequest {
    pub fn new(message: impl Into<String>, history: Option<Vec<ConversationTurn>>) -> Self {
        let history = history.map(|turns| {
            turns
                .iter()
                .filter_map(|turn| serde_json::to_value(turn).ok())
                .collect()
        });
        Self {
            message: message.into().trim().to_string(),
            conversation_history: history,
        }
    }

    /// Validates a raw JSON body. Any shape problem is `InvalidRequestShape`.
    pub fn from_json(body: Value) -> Result<Self> {
        let Value::Object(mut body) = body else {
            return Err(ServiceError::invalid(
                "JSON body with 'message' field is required.",
            ));
        };

        let message = match body.remove("message") {
            Some(Value::String(message)) => message.trim().to_string(),
            Some(_) => return Err(ServiceError::invalid("'message' must be a string.")),
            None => {
                return Err(ServiceError::invalid(
                    "JSON body with 'message' field is required.",
                ));
            }
        };
        if message.is_empty() {
            return Err(ServiceError::invalid("'message' must not be empty."));
        }

        let conversation_history = match body.remove("conversation_history") {
            None | Some(Value::Null) => None,
            Some(Value::Array(entries)) => Some(entries),
            Some(_) => {
                return Err(ServiceError::invalid(
                    "'conversation_history' must be a list or null.",
                ));
            }
        };

        Ok(Self {
            message,
            conversation_history,
        })
    }

    pub fn history_len(&self) -> usize {
        self.conversation_history.as_ref().map_or(0, Vec::len)
    }

    /// Decodes the history into turns for the gateway.
    pub fn turns(&self) -> Result<Vec<ConversationTurn>> {
        let Some(entries) = &self.conversation_history else {
            return Ok(Vec::new());
        };
        entries
            .iter()
            .map(|entry| {
                ConversationTurn::deserialize(entry).map_err(|e| {
                    ServiceError::invalid(format!(
                        "'conversation_history' entries must be {{role, text}} turns: {e}"
                    ))
                })
            })
            .collect()
    }

    /// History plus the message being sent now.
    pub fn total_messages(&self) -> usize {
        self.history_len() + 1
    }
}

/// Classification verdict, serialized as the literal strings "Yes" / "No".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YesNo {
    Yes,
    No,
}

impl From<bool> for YesNo {
    fn from(value: bool) -> Self {
        if value { YesNo::Yes } else { YesNo::No }
    }
}

impl Serialize for YesNo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(match self {
            YesNo::Yes => "Yes",
            YesNo::No => "No",
        })
    }
}

impl<'de> Deserialize<'de> for YesNo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(flag) => Ok(flag.into()),
            Raw::Text(text) => match text.trim().to_lowercase().as_str() {
                "yes" => Ok(YesNo::Yes),
                "no" => Ok(YesNo::No),
                other => Err(serde::de::Error::custom(format!(
                    "expected 'Yes' or 'No', got '{other}'"
                ))),
            },
        }
    }
}

/// Structured guidance fields shared by the classification and interactive modes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicalAdvice {
    #[serde(
        rename = "Symptoms",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub symptoms: Option<String>,
    #[serde(
        rename = "Remedies",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub remedies: Option<String>,
    #[serde(
        rename = "Precautions",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub precautions: Option<String>,
    #[serde(
        rename = "Guidelines",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub guidelines: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_list"
    )]
    pub medication: Option<Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrList {
    One(String),
    Many(Vec<String>),
}

// The model sometimes answers a text field with a bullet list.
fn lenient_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    Ok(
        Option::<TextOrList>::deserialize(deserializer)?.map(|value| match value {
            TextOrList::One(text) => text,
            TextOrList::Many(items) => items.join("\n"),
        }),
    )
}

fn lenient_list<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<Vec<String>>, D::Error> {
    Ok(
        Option::<TextOrList>::deserialize(deserializer)?.map(|value| match value {
            TextOrList::One(text) if text.trim().is_empty() => Vec::new(),
            TextOrList::One(text) => vec![text],
            TextOrList::Many(items) => items,
        }),
    )
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeTextResponse {
    pub response: String,
    #[serde(rename = "Disclaimer")]
    pub disclaimer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResponse {
    pub is_medical_related_prompt: YesNo,
    #[serde(flatten)]
    pub advice: MedicalAdvice,
    #[serde(rename = "Disclaimer")]
    pub disclaimer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveResponse {
    pub response: String,
    pub needs_follow_up: bool,
    pub follow_up_question: String,
    pub is_medical_related: bool,
    pub is_medical_related_prompt: YesNo,
    pub can_provide_structured_response: bool,
    pub conversation_complete: bool,
    #[serde(rename = "Disclaimer")]
    pub disclaimer: String,
    #[serde(flatten)]
    pub advice: MedicalAdvice,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_restarted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InteractiveResponse {
    /// Canned reply for a restart command. Signals the client to drop its history.
    pub fn restarted() -> Self {
        Self {
            response: "Okay, let's start a new conversation. How can I help with your health questions today?".to_string(),
            needs_follow_up: false,
            follow_up_question: String::new(),
            is_medical_related: true,
            is_medical_related_prompt: YesNo::Yes,
            can_provide_structured_response: false,
            conversation_complete: false,
            disclaimer: STANDARD_DISCLAIMER.to_string(),
            advice: MedicalAdvice::default(),
            conversation_restarted: Some(true),
            error: None,
        }
    }

    /// Safe payload returned when the turn could not be processed.
    /// Marked complete so the client does not retry in a loop.
    pub fn fallback(err: &ServiceError) -> Self {
        Self {
            response: format!(
                "I apologize, but an internal error occurred ({}). Please try again or restart the conversation.",
                err.kind()
            ),
            needs_follow_up: false,
            follow_up_question: String::new(),
            is_medical_related: true,
            is_medical_related_prompt: YesNo::Yes,
            can_provide_structured_response: false,
            conversation_complete: true,
            disclaimer: STANDARD_DISCLAIMER.to_string(),
            advice: MedicalAdvice::default(),
            conversation_restarted: None,
            error: Some(err.detail()),
        }
    }
}

/// Every text route wraps its payload as `{"data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

impl<T> DataEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_trims_message_and_reads_history() {
        let request = InteractiveRequest::from_json(json!({
            "message": "  I have a headache \n",
            "conversation_history": [
                {"role": "user", "text": "hello"},
                {"role": "model", "text": "Hi, how can I help?"}
            ]
        }))
        .unwrap();

        assert_eq!(request.message, "I have a headache");
        let turns = request.turns().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].role, Role::Model);
        assert_eq!(request.total_messages(), 3);
    }

    #[test]
    fn test_request_accepts_null_history_and_assistant_alias() {
        let request =
            InteractiveRequest::from_json(json!({"message": "hi", "conversation_history": null}))
                .unwrap();
        assert!(request.conversation_history.is_none());
        assert_eq!(request.total_messages(), 1);

        let request = InteractiveRequest::from_json(json!({
            "message": "hi",
            "conversation_history": [{"role": "Assistant", "content": "hello"}]
        }))
        .unwrap();
        assert_eq!(request.turns().unwrap()[0], ConversationTurn::model("hello"));
    }

    #[test]
    fn test_request_shape_errors() {
        let cases = [
            json!({"conversation_history": []}),
            json!({"message": 42}),
            json!({"message": "   "}),
            json!({"message": "hi", "conversation_history": {"role": "user", "text": "x"}}),
            json!({"message": "hi", "conversation_history": "not a list"}),
            json!(["message"]),
        ];

        for body in cases {
            let err = InteractiveRequest::from_json(body.clone()).unwrap_err();
            assert!(
                matches!(err, ServiceError::InvalidRequestShape(_)),
                "expected InvalidRequestShape for {body}"
            );
        }
    }

    #[test]
    fn test_undecodable_turns_fail_only_when_decoded() {
        let request = InteractiveRequest::from_json(json!({
            "message": "hi",
            "conversation_history": [{"role": "system", "text": "x"}, "bare string"]
        }))
        .unwrap();

        assert_eq!(request.total_messages(), 3);
        let err = request.turns().unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequestShape(_)));
    }

    #[test]
    fn test_yes_no_is_lenient_on_input() {
        assert_eq!(serde_json::from_value::<YesNo>(json!("yes")).unwrap(), YesNo::Yes);
        assert_eq!(serde_json::from_value::<YesNo>(json!(" NO ")).unwrap(), YesNo::No);
        assert_eq!(serde_json::from_value::<YesNo>(json!(true)).unwrap(), YesNo::Yes);
        assert!(serde_json::from_value::<YesNo>(json!("maybe")).is_err());
        assert_eq!(serde_json::to_value(YesNo::No).unwrap(), json!("No"));
    }

    #[test]
    fn test_advice_accepts_lists_for_text_fields() {
        let advice: MedicalAdvice = serde_json::from_value(json!({
            "Symptoms": "Fever",
            "Remedies": ["Rest", "Fluids"],
            "medication": "Paracetamol"
        }))
        .unwrap();

        assert_eq!(advice.symptoms.as_deref(), Some("Fever"));
        assert_eq!(advice.remedies.as_deref(), Some("Rest\nFluids"));
        assert_eq!(advice.medication, Some(vec!["Paracetamol".to_string()]));
        assert!(advice.precautions.is_none());
    }

    #[test]
    fn test_restart_payload_shape() {
        let value = serde_json::to_value(InteractiveResponse::restarted()).unwrap();
        assert_eq!(value["conversation_restarted"], json!(true));
        assert_eq!(value["conversation_complete"], json!(false));
        assert_eq!(value["is_medical_related_prompt"], json!("Yes"));
        assert_eq!(value["Disclaimer"], json!(STANDARD_DISCLAIMER));
        assert!(value.get("error").is_none());
        assert!(value.get("Symptoms").is_none());
    }
}
