//! Response normalizer for the single-turn modes.
//!
//! Turns a raw gateway answer into a typed, well-formed payload, and provides
//! the fixed payloads served when that is not possible.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ServiceError};
use crate::models::{
    ClassificationResponse, FreeTextResponse, MedicalAdvice, STANDARD_DISCLAIMER, YesNo,
};

#[derive(Deserialize)]
struct RawFreeText {
    response: String,
    #[serde(rename = "Disclaimer", default)]
    disclaimer: Option<String>,
}

#[derive(Deserialize)]
struct RawClassification {
    is_medical_related_prompt: YesNo,
    #[serde(flatten)]
    advice: MedicalAdvice,
    #[serde(rename = "Disclaimer", default)]
    disclaimer: Option<String>,
}

/// Returns the disclaimer if it carries any text, else the standard one.
pub fn disclaimer_or_standard(disclaimer: Option<String>) -> String {
    disclaimer
        .filter(|text| !text.trim().is_empty())
        .unwrap_or_else(|| STANDARD_DISCLAIMER.to_string())
}

/// Rejects anything that is not a JSON object, naming what arrived instead.
pub fn require_object(raw: &Value, mode: &str) -> Result<()> {
    let found = match raw {
        Value::Object(_) => return Ok(()),
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
    };
    Err(ServiceError::malformed(format!(
        "{mode} answer must be a JSON object, got {found}"
    )))
}

pub fn normalize_free_text(raw: Value) -> Result<FreeTextResponse> {
    require_object(&raw, "free-text")?;
    let parsed: RawFreeText = serde_json::from_value(raw)
        .map_err(|e| ServiceError::malformed(format!("invalid free-text answer: {e}")))?;

    Ok(FreeTextResponse {
        response: parsed.response,
        disclaimer: disclaimer_or_standard(parsed.disclaimer),
    })
}

pub fn normalize_classification(raw: Value) -> Result<ClassificationResponse> {
    require_object(&raw, "classification")?;
    let parsed: RawClassification = serde_json::from_value(raw)
        .map_err(|e| ServiceError::malformed(format!("invalid classification answer: {e}")))?;

    Ok(ClassificationResponse {
        is_medical_related_prompt: parsed.is_medical_related_prompt,
        advice: parsed.advice,
        disclaimer: disclaimer_or_standard(parsed.disclaimer),
        error: None,
    })
}

/// Free-text payload served with a 500.
pub fn free_text_failure(err: &ServiceError) -> FreeTextResponse {
    FreeTextResponse {
        response: format!(
            "Sorry, an error occurred processing your request: {}",
            err.detail()
        ),
        disclaimer: STANDARD_DISCLAIMER.to_string(),
    }
}

/// Default classification served with a 500. Matches the success schema.
pub fn classification_failure(err: &ServiceError) -> ClassificationResponse {
    ClassificationResponse {
        is_medical_related_prompt: YesNo::No,
        advice: MedicalAdvice {
            symptoms: Some(".".to_string()),
            remedies: Some(String::new()),
            precautions: Some(String::new()),
            guidelines: Some(String::new()),
            medication: Some(Vec::new()),
        },
        disclaimer: STANDARD_DISCLAIMER.to_string(),
        error: Some(format!("An error occurred: {}", err.detail())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_free_text_keeps_existing_disclaimer() {
        let normalized = normalize_free_text(json!({
            "response": "Stay hydrated.",
            "Disclaimer": "Consult a doctor."
        }))
        .unwrap();

        assert_eq!(normalized.response, "Stay hydrated.");
        assert_eq!(normalized.disclaimer, "Consult a doctor.");
    }

    #[test]
    fn test_free_text_defaults_missing_or_blank_disclaimer() {
        let normalized = normalize_free_text(json!({"response": "ok"})).unwrap();
        assert_eq!(normalized.disclaimer, STANDARD_DISCLAIMER);

        let normalized = normalize_free_text(json!({"response": "ok", "Disclaimer": "  "})).unwrap();
        assert_eq!(normalized.disclaimer, STANDARD_DISCLAIMER);
    }

    #[test]
    fn test_free_text_rejects_wrong_shapes() {
        for raw in [json!("just text"), json!([1]), json!({"answer": "x"}), Value::Null] {
            let err = normalize_free_text(raw).unwrap_err();
            assert!(matches!(err, ServiceError::MalformedCollaboratorResponse(_)));
        }
    }

    #[test]
    fn test_classification_medical() {
        let normalized = normalize_classification(json!({
            "is_medical_related_prompt": "Yes",
            "Symptoms": "Runny nose",
            "Remedies": "Rest",
            "medication": ["Antihistamine"]
        }))
        .unwrap();

        assert_eq!(normalized.is_medical_related_prompt, YesNo::Yes);
        assert_eq!(normalized.advice.symptoms.as_deref(), Some("Runny nose"));
        assert_eq!(normalized.disclaimer, STANDARD_DISCLAIMER);
        assert!(normalized.error.is_none());
    }

    #[test]
    fn test_classification_requires_verdict() {
        let err = normalize_classification(json!({"Symptoms": "Cough"})).unwrap_err();
        assert_eq!(err.kind(), "MalformedCollaboratorResponse");
    }

    #[test]
    fn test_failure_payloads() {
        let err = ServiceError::from(anyhow::anyhow!("quota exceeded"));

        let free_text = serde_json::to_value(free_text_failure(&err)).unwrap();
        assert_eq!(
            free_text,
            json!({
                "response": "Sorry, an error occurred processing your request: quota exceeded",
                "Disclaimer": STANDARD_DISCLAIMER
            })
        );

        let classification = serde_json::to_value(classification_failure(&err)).unwrap();
        assert_eq!(
            classification,
            json!({
                "Symptoms": ".",
                "Remedies": "",
                "Precautions": "",
                "Guidelines": "",
                "is_medical_related_prompt": "No",
                "medication": [],
                "Disclaimer": STANDARD_DISCLAIMER,
                "error": "An error occurred: quota exceeded"
            })
        );
    }
}
