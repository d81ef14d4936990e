use serde::{Deserialize, Serialize};

/// A system/user prompt pair. Assembly is deterministic so the generation
/// service can cache the system prompt across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub content: String,
    pub usage: TokenUsage,
}

/// Events emitted while a narrative call streams. The serialized form is
/// the delivery protocol the UI consumes: incremental `text` events, one
/// `usage` event near the end, then `done` (the signal to parse the
/// accumulated text as a section list). Failures surface as `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Usage {
        input_tokens: u32,
        output_tokens: u32,
    },
    Error {
        message: String,
    },
    Done,
}

/// Encode a stream event as a server-sent-events frame.
pub fn sse_frame(event: &StreamEvent) -> String {
    // Serializing this enum cannot fail; an empty payload would only mean
    // a serde_json regression.
    format!(
        "data: {}\n\n",
        serde_json::to_string(event).unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shapes() {
        let text = serde_json::to_string(&StreamEvent::Text {
            text: "NOI held".to_string(),
        })
        .unwrap();
        assert_eq!(text, r#"{"type":"text","text":"NOI held"}"#);

        let usage = serde_json::to_string(&StreamEvent::Usage {
            input_tokens: 1200,
            output_tokens: 800,
        })
        .unwrap();
        assert_eq!(
            usage,
            r#"{"type":"usage","inputTokens":1200,"outputTokens":800}"#
        );

        let done = serde_json::to_string(&StreamEvent::Done).unwrap();
        assert_eq!(done, r#"{"type":"done"}"#);
    }

    #[test]
    fn test_sse_frame_format() {
        let frame = sse_frame(&StreamEvent::Done);
        assert_eq!(frame, "data: {\"type\":\"done\"}\n\n");
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn test_error_event_round_trip() {
        let event = StreamEvent::Error {
            message: "stream reset".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
