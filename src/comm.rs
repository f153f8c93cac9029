/// Communication layer: inbound command parsing and outbound message sinks.
///
/// The control loop only sees two seams. An [`Inbox`] hands it raw inbound
/// messages with a bounded wait; an [`Outbox`] fans rendered messages out to
/// every connected peer. The firmware backs both with its WebSocket server;
/// tests back them with scripted fakes.
use core::fmt::Write as _;

use crate::protocol::{Command, CommandError, DeviceMessage, InboundFrame, MsgBuffer, RawCommand};

/// Bounded-wait source of raw inbound messages
pub trait Inbox {
    /// Wait up to `timeout_ms` for the next message. `None` means the wait
    /// elapsed with nothing queued.
    fn recv_timeout(&mut self, timeout_ms: u32) -> Option<InboundFrame>;
}

/// Broadcast sink for outbound messages
pub trait Outbox {
    /// Send `msg` to every connected peer. Delivery failures are the
    /// transport's business and are not reported back.
    fn broadcast(&mut self, msg: &str);
}

impl<T: Outbox + ?Sized> Outbox for &mut T {
    fn broadcast(&mut self, msg: &str) {
        (**self).broadcast(msg)
    }
}

// ── Serialization helpers ──────────────────────────────────────────────

/// Render a DeviceMessage into a fixed buffer.
/// Returns None if it does not fit.
pub fn render_message(msg: &DeviceMessage) -> Option<MsgBuffer> {
    let mut buf = MsgBuffer::new();
    write!(buf, "{}", msg).ok()?;
    Some(buf)
}

/// Render and broadcast, logging messages that do not fit.
pub fn send<O: Outbox + ?Sized>(outbox: &mut O, msg: &DeviceMessage) {
    match render_message(msg) {
        Some(text) => outbox.broadcast(&text),
        None => log::warn!("outbound message too long, dropped: {:?}", msg),
    }
}

/// Deserialize a Command from a JSON byte slice.
pub fn parse_command(data: &[u8]) -> Result<Command, CommandError> {
    let trimmed = trim_trailing_whitespace(data);
    if trimmed.is_empty() {
        return Err(CommandError::Malformed);
    }
    let (raw, _) =
        serde_json_core::from_slice::<RawCommand>(trimmed).map_err(|_| CommandError::Malformed)?;
    Command::try_from(raw)
}

fn trim_trailing_whitespace(data: &[u8]) -> &[u8] {
    let mut end = data.len();
    while end > 0 && matches!(data[end - 1], b' ' | b'\n' | b'\r' | b'\t' | 0) {
        end -= 1;
    }
    &data[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frequency;
    use crate::protocol::ValueString;
    use crate::testing::RecordingOutbox;

    fn value(text: &str) -> ValueString {
        ValueString::try_from(text).unwrap()
    }

    // ── parse_command ───────────────────────────────────────────────

    #[test]
    fn parse_plain_commands() {
        assert_eq!(parse_command(br#"{"id":"init"}"#), Ok(Command::Init));
        assert_eq!(
            parse_command(br#"{"id":"searchup-request"}"#),
            Ok(Command::SearchUp)
        );
        assert_eq!(
            parse_command(br#"{"id":"searchdown-request"}"#),
            Ok(Command::SearchDown)
        );
        assert_eq!(
            parse_command(br#"{"id":"color-request"}"#),
            Ok(Command::ColorCycle)
        );
    }

    #[test]
    fn parse_value_commands() {
        assert_eq!(
            parse_command(br#"{"id":"preset-request","value":"89.1"}"#),
            Ok(Command::Preset(value("89.1")))
        );
        assert_eq!(
            parse_command(br#"{"id": "jump-request", "value": "101.5"}"#),
            Ok(Command::Jump(value("101.5")))
        );
        assert_eq!(
            parse_command(br#"{"value":"94.7","id":"write-request"}"#),
            Ok(Command::Write(value("94.7")))
        );
    }

    #[test]
    fn parse_tolerates_trailing_newline() {
        assert_eq!(parse_command(b"{\"id\":\"init\"}\r\n"), Ok(Command::Init));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(parse_command(b""), Err(CommandError::Malformed));
        assert_eq!(parse_command(b"not json"), Err(CommandError::Malformed));
        assert_eq!(parse_command(br#"{"value":"1"}"#), Err(CommandError::Malformed));
        assert_eq!(parse_command(br#"{"id":5}"#), Err(CommandError::Malformed));
    }

    #[test]
    fn parse_rejects_unknown_id() {
        assert!(matches!(
            parse_command(br#"{"id":"volume-request","value":"3"}"#),
            Err(CommandError::UnknownId(_))
        ));
    }

    #[test]
    fn parse_rejects_missing_value() {
        assert_eq!(
            parse_command(br#"{"id":"preset-request"}"#),
            Err(CommandError::MissingValue("preset-request"))
        );
    }

    // ── Rendering ───────────────────────────────────────────────────

    #[test]
    fn render_fits_buffer() {
        let msg = DeviceMessage::Status {
            frequency: Frequency::from_khz(107_900),
            stereo: false,
            level: 15,
        };
        let text = render_message(&msg).unwrap();
        assert_eq!(text.as_str(), "STATUS\x04107.9\x040\x0415");
    }

    #[test]
    fn oversized_message_is_not_sent() {
        let long = "9".repeat(80);
        let mut outbox = RecordingOutbox::default();
        send(&mut outbox, &DeviceMessage::Preset(&long));
        assert!(outbox.sent.is_empty());
    }

    #[test]
    fn send_broadcasts_rendered_text() {
        let mut outbox = RecordingOutbox::default();
        send(&mut outbox, &DeviceMessage::Color(4));
        assert_eq!(outbox.sent, ["COLOR\x044"]);
    }
}
