//! JSON-line rendering of link events
//!
//! Each event becomes one JSON object on its own line, tagged with an
//! `event` field that matches the bus topic:
//!
//! ```text
//! {"event":"connected"}
//! {"event":"reconnecting","attempt":2,"delayMs":2000}
//! {"event":"progress_update","payload":{"operationId":"op-1","progress":40.0,"step":"ocr"}}
//! {"event":"error","kind":"pong_timeout","message":"No pong received within 5s"}
//! ```

use livelink::LinkEvent;
use serde_json::{json, Value};
use std::io::{self, Write};

/// Render one event as a JSON object
pub fn event_to_json(event: &LinkEvent) -> Value {
    let topic = event.topic().as_str();

    match event {
        LinkEvent::Connected => json!({ "event": topic }),
        LinkEvent::Disconnected { reason } => json!({ "event": topic, "reason": reason }),
        LinkEvent::Reconnecting { attempt, delay } => json!({
            "event": topic,
            "attempt": attempt,
            "delayMs": delay.as_millis() as u64,
        }),
        LinkEvent::Message(message) => json!({ "event": topic, "message": message }),
        LinkEvent::Error(err) => json!({
            "event": topic,
            "kind": err.kind(),
            "message": err.to_string(),
        }),
        LinkEvent::ProgressUpdate(progress) => json!({ "event": topic, "payload": progress }),
        LinkEvent::TaskAssigned(task) => json!({ "event": topic, "payload": task }),
        LinkEvent::Notification(notification) => json!({ "event": topic, "payload": notification }),
    }
}

/// Write one event as a single line and flush
pub fn write_event<W: Write>(out: &mut W, event: &LinkEvent) -> io::Result<()> {
    serde_json::to_writer(&mut *out, &event_to_json(event))?;
    out.write_all(b"\n")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use livelink::{LinkError, Message, ProgressUpdate};
    use std::time::Duration;

    #[test]
    fn test_lifecycle_events() {
        assert_eq!(
            event_to_json(&LinkEvent::Connected),
            json!({ "event": "connected" })
        );
        assert_eq!(
            event_to_json(&LinkEvent::Reconnecting {
                attempt: 3,
                delay: Duration::from_secs(4)
            }),
            json!({ "event": "reconnecting", "attempt": 3, "delayMs": 4000 })
        );
    }

    #[test]
    fn test_error_carries_kind() {
        let value = event_to_json(&LinkEvent::Error(LinkError::PongTimeout(
            Duration::from_secs(5),
        )));
        assert_eq!(value["event"], "error");
        assert_eq!(value["kind"], "pong_timeout");
    }

    #[test]
    fn test_message_is_relayed_unchanged() {
        let message = Message::decode(
            r#"{"type":"custom_payload","payload":{"a":[1,2]},"messageId":"m-1","timestamp":7,"correlationId":"c"}"#,
        )
        .unwrap();
        let value = event_to_json(&LinkEvent::Message(message));

        assert_eq!(value["message"]["messageId"], "m-1");
        assert_eq!(value["message"]["payload"]["a"][1], 2);
        assert_eq!(value["message"]["correlationId"], "c");
    }

    #[test]
    fn test_write_event_is_one_line() {
        let mut out = Vec::new();
        let progress = ProgressUpdate {
            operation_id: "op-1".into(),
            progress: 40.0,
            step: "ocr".into(),
            estimated_time_remaining: None,
        };
        write_event(&mut out, &LinkEvent::ProgressUpdate(progress)).unwrap();
        write_event(&mut out, &LinkEvent::Connected).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["payload"]["operationId"], "op-1");
    }
}
