use serde_json::Value;
use thiserror::Error;

/// Structured events the backend sends over the voice socket.
///
/// Only the text payload drives reconciliation; the confidence scores and
/// missing-field list ride along for logging.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// Greeting or informational message from the backend.
    System { message: String },
    /// Confirmed transcript for the last uploaded utterance.
    SttResult {
        transcript: String,
        confidence: Option<f64>,
    },
    /// The backend could not resolve the utterance and wants a retry.
    AskAgain {
        prompt: String,
        missing: Vec<String>,
        confidence: Option<f64>,
    },
    /// Final answer for one request-response cycle.
    Complete {
        message: String,
        confidence: Option<f64>,
    },
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event has no `type` field")]
    NoType,
    #[error("unrecognized event type `{0}`")]
    UnknownType(String),
    #[error("missing or non-string `{0}` field")]
    MissingField(&'static str),
}

fn required_str(event: &Value, field: &'static str) -> Result<String, ParseError> {
    event
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or(ParseError::MissingField(field))
}

/// Parse one inbound text frame. Anything that fails here is dropped by the
/// transport with a warning and never touches the conversation log.
pub fn parse_event(text: &str) -> Result<ServerEvent, ParseError> {
    let event: Value = serde_json::from_str(text)?;
    let kind = event
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or(ParseError::NoType)?;

    match kind {
        "SYSTEM" => Ok(ServerEvent::System {
            message: required_str(&event, "message")?,
        }),
        "STT_RESULT" => Ok(ServerEvent::SttResult {
            transcript: required_str(&event, "transcript")?,
            confidence: event.get("stt_confidence").and_then(Value::as_f64),
        }),
        "ASK_AGAIN" => Ok(ServerEvent::AskAgain {
            prompt: required_str(&event, "prompt")?,
            missing: event
                .get("missing")
                .and_then(Value::as_array)
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default(),
            confidence: event.get("confidence").and_then(Value::as_f64),
        }),
        "COMPLETE" => Ok(ServerEvent::Complete {
            message: required_str(&event, "message")?,
            confidence: event.get("confidence").and_then(Value::as_f64),
        }),
        other => Err(ParseError::UnknownType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_system_event() {
        let event = parse_event(r#"{"type":"SYSTEM","message":"Welcome"}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::System {
                message: "Welcome".into()
            }
        );
    }

    #[test]
    fn parses_stt_result_with_confidence() {
        let event =
            parse_event(r#"{"type":"STT_RESULT","transcript":"hello","stt_confidence":0.9}"#)
                .unwrap();
        assert_eq!(
            event,
            ServerEvent::SttResult {
                transcript: "hello".into(),
                confidence: Some(0.9),
            }
        );
    }

    #[test]
    fn parses_ask_again_with_missing_fields() {
        let event = parse_event(
            r#"{"type":"ASK_AGAIN","prompt":"Please repeat","missing":["date"],"confidence":0.4}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ServerEvent::AskAgain {
                prompt: "Please repeat".into(),
                missing: vec!["date".into()],
                confidence: Some(0.4),
            }
        );
    }

    #[test]
    fn parses_complete_without_confidence() {
        let event = parse_event(r#"{"type":"COMPLETE","message":"done"}"#).unwrap();
        assert_eq!(
            event,
            ServerEvent::Complete {
                message: "done".into(),
                confidence: None,
            }
        );
    }

    #[test]
    fn rejects_invalid_json() {
        assert!(matches!(parse_event("not json"), Err(ParseError::Json(_))));
    }

    #[test]
    fn rejects_event_without_type() {
        assert!(matches!(
            parse_event(r#"{"message":"hi"}"#),
            Err(ParseError::NoType)
        ));
    }

    #[test]
    fn rejects_unrecognized_type_every_time() {
        // Stateless: the unrecognized path can run any number of times and
        // nothing downstream ever sees it.
        for _ in 0..3 {
            assert!(matches!(
                parse_event(r#"{"type":"TELEMETRY","payload":1}"#),
                Err(ParseError::UnknownType(_))
            ));
        }
    }

    #[test]
    fn rejects_event_missing_its_payload_field() {
        assert!(matches!(
            parse_event(r#"{"type":"STT_RESULT"}"#),
            Err(ParseError::MissingField("transcript"))
        ));
        assert!(matches!(
            parse_event(r#"{"type":"SYSTEM","message":42}"#),
            Err(ParseError::MissingField("message"))
        ));
    }
}
