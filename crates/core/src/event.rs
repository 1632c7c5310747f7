use crate::error::EventError;
use serde::Deserialize;
use tracing::debug;

/// A classified inbound webhook event. Only text messages drive the reply
/// pipeline; follow events get the welcome flow; everything else is
/// acknowledged and skipped.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Text {
        user_id: Option<String>,
        text: String,
        reply_token: Option<String>,
    },
    Follow {
        user_id: Option<String>,
        reply_token: Option<String>,
    },
    Unsupported {
        event_type: String,
        message_type: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    events: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    message: Option<RawMessage>,
    #[serde(rename = "replyToken")]
    reply_token: Option<String>,
    source: Option<RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    #[serde(rename = "type")]
    message_type: Option<String>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(rename = "userId")]
    user_id: Option<String>,
}

/// Parse the raw webhook body into classified events, in array order.
///
/// The envelope must be valid JSON with an `events` array; a single
/// malformed element inside the array downgrades to `Unsupported`
/// instead of failing the whole batch.
pub fn parse_events(body: &[u8]) -> Result<Vec<InboundEvent>, EventError> {
    let payload: RawPayload =
        serde_json::from_slice(body).map_err(|e| EventError::Malformed(e.to_string()))?;
    let raw_events = payload.events.ok_or(EventError::MissingEvents)?;

    let events = raw_events
        .into_iter()
        .map(|value| match serde_json::from_value::<RawEvent>(value) {
            Ok(raw) => classify(raw),
            Err(e) => {
                debug!(error = %e, "unreadable event element, skipping");
                InboundEvent::Unsupported {
                    event_type: "unknown".to_string(),
                    message_type: None,
                }
            }
        })
        .collect();

    Ok(events)
}

fn classify(raw: RawEvent) -> InboundEvent {
    let event_type = raw.event_type.unwrap_or_else(|| "unknown".to_string());
    let user_id = raw.source.and_then(|s| s.user_id).filter(|s| !s.is_empty());
    let reply_token = raw.reply_token.filter(|s| !s.is_empty());

    match event_type.as_str() {
        "message" => {
            let message = raw.message;
            let message_type = message
                .as_ref()
                .and_then(|m| m.message_type.clone())
                .unwrap_or_else(|| "unknown".to_string());
            if message_type == "text" {
                if let Some(text) = message.and_then(|m| m.text) {
                    return InboundEvent::Text {
                        user_id,
                        text,
                        reply_token,
                    };
                }
            }
            InboundEvent::Unsupported {
                event_type,
                message_type: Some(message_type),
            }
        }
        "follow" => InboundEvent::Follow {
            user_id,
            reply_token,
        },
        _ => InboundEvent::Unsupported {
            event_type,
            message_type: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_event_extracts_user_text_and_token() {
        let body = br#"{"events":[{"type":"message","replyToken":"tok-1","source":{"userId":"U123"},"message":{"type":"text","text":"hello"}}]}"#;
        let events = parse_events(body).unwrap();
        assert_eq!(
            events,
            vec![InboundEvent::Text {
                user_id: Some("U123".to_string()),
                text: "hello".to_string(),
                reply_token: Some("tok-1".to_string()),
            }]
        );
    }

    #[test]
    fn non_text_messages_are_unsupported_not_errors() {
        let body = br#"{"events":[{"type":"message","replyToken":"tok","message":{"type":"sticker"}}]}"#;
        let events = parse_events(body).unwrap();
        assert!(matches!(
            &events[0],
            InboundEvent::Unsupported { event_type, message_type: Some(mt) }
                if event_type == "message" && mt == "sticker"
        ));
    }

    #[test]
    fn malformed_element_does_not_poison_the_batch() {
        let body = br#"{"events":[42,{"type":"message","replyToken":"tok","source":{"userId":"U1"},"message":{"type":"text","text":"ok"}}]}"#;
        let events = parse_events(body).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], InboundEvent::Unsupported { .. }));
        assert!(matches!(events[1], InboundEvent::Text { .. }));
    }

    #[test]
    fn missing_user_or_token_downgrade_to_none() {
        let body =
            br#"{"events":[{"type":"message","message":{"type":"text","text":"no ids"}}]}"#;
        let events = parse_events(body).unwrap();
        assert_eq!(
            events,
            vec![InboundEvent::Text {
                user_id: None,
                text: "no ids".to_string(),
                reply_token: None,
            }]
        );
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            parse_events(b"not json"),
            Err(EventError::Malformed(_))
        ));
    }

    #[test]
    fn missing_events_array_is_rejected() {
        assert!(matches!(
            parse_events(br#"{"destination":"xyz"}"#),
            Err(EventError::MissingEvents)
        ));
    }

    #[test]
    fn events_keep_array_order() {
        let body = br#"{"events":[
            {"type":"message","replyToken":"t1","source":{"userId":"U1"},"message":{"type":"text","text":"first"}},
            {"type":"follow","replyToken":"t2","source":{"userId":"U2"}},
            {"type":"message","replyToken":"t3","source":{"userId":"U3"},"message":{"type":"text","text":"second"}}
        ]}"#;
        let events = parse_events(body).unwrap();
        assert!(matches!(&events[0], InboundEvent::Text { text, .. } if text == "first"));
        assert!(matches!(&events[1], InboundEvent::Follow { .. }));
        assert!(matches!(&events[2], InboundEvent::Text { text, .. } if text == "second"));
    }
}
