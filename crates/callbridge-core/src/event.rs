//! Classification of inbound webhook payloads.
//!
//! Transcript payloads vary between providers and API versions, so every
//! field is looked up through a short list of accepted aliases. Finality is
//! opt-in: a payload is only final when one of the finality signals says so.

use serde_json::Value;

const CALL_ID_FIELDS: &[&str] = &["CallSid", "callSid", "Callsid", "call_sid", "CALLSID"];
const TRANSCRIPTION_DATA_FIELDS: &[&str] = &["TranscriptionData", "transcriptionData"];
const TEXT_FIELDS: &[&str] = &[
    "TranscriptionText",
    "SpeechResult",
    "Transcript",
    "transcript",
    "Text",
    "text",
];
const FINAL_FIELDS: &[&str] = &["Final", "final", "IsFinal", "isFinal"];
const EVENT_TYPE_FIELDS: &[&str] = &["TranscriptionEvent", "EventType", "eventType"];
const STATUS_FIELDS: &[&str] = &["TranscriptionStatus", "Status", "status"];

/// Semantic kind of a webhook, decided by the endpoint it arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A new or re-entered call asking for instructions.
    CallStart,
    /// Re-arm listening after a reply has been played.
    Resume,
    /// A speech-recognition result.
    Transcript,
}

/// A classified transcript webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptEvent {
    pub call_id: String,
    /// Provider event tag, empty when absent.
    pub event_type: String,
    pub text: String,
    pub is_final: bool,
}

/// Returns the first non-empty value among `aliases`.
///
/// Aliases are tried in order, so the order of the alias list decides which
/// field wins when several are present.
fn first_field<'a>(form: &'a [(String, String)], aliases: &[&str]) -> Option<&'a str> {
    aliases.iter().find_map(|alias| {
        form.iter()
            .find(|(key, value)| key == alias && !value.is_empty())
            .map(|(_, value)| value.as_str())
    })
}

/// Extracts the call identifier, or an empty string.
pub fn call_id(form: &[(String, String)]) -> String {
    first_field(form, CALL_ID_FIELDS)
        .map(str::to_string)
        .unwrap_or_default()
}

/// Pulls the `transcript` member out of a JSON transcription document.
fn transcript_from_json(raw: &str) -> String {
    let parsed: Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!("unparseable transcription data: {}", e);
            return String::new();
        }
    };

    parsed
        .as_object()
        .and_then(|obj| {
            obj.iter()
                .find(|(key, _)| key.eq_ignore_ascii_case("transcript"))
                .and_then(|(_, value)| value.as_str())
        })
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

fn transcript_text(form: &[(String, String)]) -> String {
    let structured = TRANSCRIPTION_DATA_FIELDS
        .iter()
        .find_map(|alias| form.iter().find(|(key, _)| key == alias));

    match structured {
        Some((_, raw)) => transcript_from_json(raw),
        None => first_field(form, TEXT_FIELDS)
            .map(|text| text.trim().to_string())
            .unwrap_or_default(),
    }
}

fn is_final(form: &[(String, String)]) -> bool {
    if first_field(form, FINAL_FIELDS).is_some_and(|v| v.eq_ignore_ascii_case("true")) {
        return true;
    }

    if first_field(form, EVENT_TYPE_FIELDS)
        .is_some_and(|v| v.to_ascii_lowercase().contains("stopped"))
    {
        return true;
    }

    first_field(form, STATUS_FIELDS).is_some_and(|v| {
        v.eq_ignore_ascii_case("completed") || v.eq_ignore_ascii_case("final")
    })
}

/// Classifies a transcript webhook payload.
pub fn classify(form: &[(String, String)]) -> TranscriptEvent {
    TranscriptEvent {
        call_id: call_id(form),
        event_type: first_field(form, EVENT_TYPE_FIELDS)
            .unwrap_or_default()
            .to_string(),
        text: transcript_text(form),
        is_final: is_final(form),
    }
}
