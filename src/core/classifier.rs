//! Inbound frame classification.
//!
//! Runs in the reader task so control and malformed frames never reach the channel actor.

use bytes::Bytes;
use serde::Deserialize;

use super::frame::WsFrame;
use super::types::now_epoch_ms;

/// Type tags that only keep the connection alive and carry no user-facing data.
pub const CONTROL_TYPES: [&str; 3] = ["connection_confirmed", "ping", "pong"];

/// One decoded data frame, stamped with the local receive time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Value of the `type` field, when present.
    pub kind: Option<String>,
    /// Full JSON object as received; consumers decode the shape they need.
    pub payload: Bytes,
    pub received_at_ms: u64,
}

impl InboundMessage {
    /// Decode the payload into a consumer-specific shape.
    pub fn decode<'a, T>(&'a self) -> Result<T, sonic_rs::Error>
    where
        T: Deserialize<'a>,
    {
        sonic_rs::from_slice(self.payload.as_ref())
    }
}

/// Classification outcome for a single frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Data payload to hand to the channel consumer.
    Payload(InboundMessage),
    /// Keepalive/handshake frame carrying the given type tag.
    Control(&'static str),
    /// Websocket-level ping/pong; the transport answers these.
    Protocol,
    /// Not a JSON object, or not decodable.
    Malformed(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MessageClassifier;

impl MessageClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, frame: &WsFrame) -> Classification {
        self.classify_at(frame, now_epoch_ms())
    }

    pub fn classify_at(&self, frame: &WsFrame, received_at_ms: u64) -> Classification {
        let payload = match frame {
            WsFrame::Text(bytes) | WsFrame::Binary(bytes) => bytes,
            WsFrame::Ping(_) | WsFrame::Pong(_) => return Classification::Protocol,
            WsFrame::Close(_) => return Classification::Malformed("close frame".to_string()),
        };

        let first = payload
            .iter()
            .copied()
            .find(|b| !b.is_ascii_whitespace());
        if first != Some(b'{') {
            return Classification::Malformed("not a json object".to_string());
        }

        let envelope: Envelope = match sonic_rs::from_slice(payload.as_ref()) {
            Ok(envelope) => envelope,
            Err(err) => return Classification::Malformed(err.to_string()),
        };

        if let Some(kind) = envelope.kind.as_deref()
            && let Some(tag) = CONTROL_TYPES.iter().find(|tag| **tag == kind)
        {
            return Classification::Control(*tag);
        }

        Classification::Payload(InboundMessage {
            kind: envelope.kind,
            payload: payload.clone(),
            received_at_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(text: &'static str) -> Classification {
        MessageClassifier::new().classify_at(&WsFrame::text_static(text), 42)
    }

    #[test]
    fn control_frames_are_dropped() {
        assert_eq!(
            classify(r#"{"type":"connection_confirmed"}"#),
            Classification::Control("connection_confirmed")
        );
        assert_eq!(classify(r#"{"type":"ping"}"#), Classification::Control("ping"));
        assert_eq!(
            classify(r#" {"type":"pong","ts":1}"#),
            Classification::Control("pong")
        );
    }

    #[test]
    fn alerts_and_snapshots_pass_through_with_timestamp() {
        let text = r#"{"title":"New lead","message":"<b>ACME</b> assigned"}"#;
        match classify(text) {
            Classification::Payload(msg) => {
                assert_eq!(msg.kind, None);
                assert_eq!(msg.payload.as_ref(), text.as_bytes());
                assert_eq!(msg.received_at_ms, 42);
            }
            other => panic!("expected payload, got {other:?}"),
        }

        match classify(r#"{"type":"notify.snapshot","total_unseen":7}"#) {
            Classification::Payload(msg) => {
                assert_eq!(msg.kind.as_deref(), Some("notify.snapshot"))
            }
            other => panic!("expected payload, got {other:?}"),
        }
    }

    #[test]
    fn malformed_frames_are_reported_not_raised() {
        assert!(matches!(classify("ping"), Classification::Malformed(_)));
        assert!(matches!(classify("{not json"), Classification::Malformed(_)));
        assert!(matches!(classify("[1,2,3]"), Classification::Malformed(_)));
        assert!(matches!(classify(""), Classification::Malformed(_)));
        assert!(matches!(
            classify(r#"{"type":5}"#),
            Classification::Malformed(_)
        ));
    }

    #[test]
    fn protocol_frames_are_ignored() {
        let classifier = MessageClassifier::new();
        assert_eq!(
            classifier.classify(&WsFrame::Ping(Bytes::new())),
            Classification::Protocol
        );
        assert_eq!(
            classifier.classify(&WsFrame::Pong(Bytes::new())),
            Classification::Protocol
        );
    }

    #[test]
    fn binary_json_is_treated_like_text() {
        let frame = WsFrame::Binary(Bytes::from_static(br#"{"title":"x"}"#));
        assert!(matches!(
            MessageClassifier::new().classify(&frame),
            Classification::Payload(_)
        ));
    }
}
