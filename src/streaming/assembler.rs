use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::decoder::StreamFrameDecoder;
use super::event::{AssembledMessage, ChatEvent};
use crate::error::ChatError;

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// Lifecycle of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblyState {
    AwaitingFirstToken,
    Streaming,
    Completed,
    Failed,
}

impl AssemblyState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AssemblyState::Completed | AssemblyState::Failed)
    }
}

/// Bounds on the parse-failure recovery.
///
/// A data line that is not valid JSON is put back and joined with the next
/// line. `max_requeues` caps how many times in a row that may happen without a
/// successful parse. `max_unresolved_bytes` caps the joined text, and also any
/// text buffered while waiting for a line terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryLimits {
    pub max_requeues: usize,
    pub max_unresolved_bytes: usize,
}

impl Default for RecoveryLimits {
    fn default() -> Self {
        Self {
            max_requeues: 16,
            max_unresolved_bytes: 64 * 1024,
        }
    }
}

/// What a graceful close without `[DONE]` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndOfStreamPolicy {
    #[default]
    Complete,
    RequireSentinel,
}

enum LineKind<'a> {
    Ignored,
    Foreign,
    Done,
    Data(&'a str),
}

fn classify(line: &str) -> LineKind<'_> {
    if line.trim().is_empty() || line.starts_with(':') {
        return LineKind::Ignored;
    }

    match line.strip_prefix(DATA_PREFIX) {
        Some(rest) if rest.trim() == DONE_SENTINEL => LineKind::Done,
        Some(rest) => LineKind::Data(rest.trim()),
        None => LineKind::Foreign,
    }
}

/// `choices[0].delta.content`, if present and non-empty.
fn extract_content(payload: &Value) -> Option<&str> {
    payload
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
}

#[derive(Debug, PartialEq, Eq)]
enum LineOutcome {
    Continue,
    Requeued,
}

/// Turns chat-completion SSE bytes into a growing assistant message.
#[derive(Debug)]
pub struct DeltaAssembler {
    exchange_id: Uuid,
    decoder: StreamFrameDecoder,
    message: AssembledMessage,
    state: AssemblyState,
    limits: RecoveryLimits,
    policy: EndOfStreamPolicy,
    requeues: usize,
}

impl DeltaAssembler {
    pub fn new() -> Self {
        Self::with_limits(RecoveryLimits::default())
    }

    pub fn with_limits(limits: RecoveryLimits) -> Self {
        Self {
            exchange_id: Uuid::new_v4(),
            decoder: StreamFrameDecoder::new(),
            message: AssembledMessage::new(),
            state: AssemblyState::AwaitingFirstToken,
            limits,
            policy: EndOfStreamPolicy::default(),
            requeues: 0,
        }
    }

    pub fn end_of_stream(mut self, policy: EndOfStreamPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn exchange_id(&self) -> Uuid {
        self.exchange_id
    }

    pub fn state(&self) -> AssemblyState {
        self.state
    }

    pub fn message(&self) -> &AssembledMessage {
        &self.message
    }

    /// Consume one raw chunk.
    ///
    /// Processing of the lines it completes pauses at the first payload that
    /// fails to parse; that line waits in the decoder for the next chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ChatEvent> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        self.decoder.push(chunk);
        let mut events = self.process_lines(true);

        if !self.state.is_terminal() && !self.decoder.has_complete_line() {
            let unresolved = self.decoder.pending_len();
            if unresolved > self.limits.max_unresolved_bytes {
                warn!(
                    exchange_id = %self.exchange_id,
                    bytes = unresolved,
                    "Line terminator never arrived"
                );
                self.fail_into(
                    ChatError::Protocol(format!(
                        "{} bytes buffered without a line terminator",
                        unresolved
                    )),
                    &mut events,
                );
            }
        }

        events
    }

    /// Graceful end of input: drain the complete lines still buffered, drop the
    /// unterminated tail, then complete (or fail, under
    /// [`EndOfStreamPolicy::RequireSentinel`]).
    pub fn finish(&mut self) -> Vec<ChatEvent> {
        if self.state.is_terminal() {
            return Vec::new();
        }

        let mut events = self.process_lines(false);
        if self.state.is_terminal() {
            return events;
        }

        self.decoder.finish();
        match self.policy {
            EndOfStreamPolicy::Complete => {
                debug!(exchange_id = %self.exchange_id, "Stream closed without [DONE]");
                self.complete(&mut events);
            }
            EndOfStreamPolicy::RequireSentinel => {
                self.fail_into(ChatError::MissingSentinel, &mut events);
            }
        }
        events
    }

    /// Abort the exchange, typically on a transport error. Returns `None` if
    /// the exchange already ended.
    pub fn fail(&mut self, error: ChatError) -> Option<ChatEvent> {
        let mut events = Vec::with_capacity(1);
        self.fail_into(error, &mut events);
        events.pop()
    }

    fn process_lines(&mut self, pause_on_requeue: bool) -> Vec<ChatEvent> {
        let mut events = Vec::new();

        while !self.state.is_terminal() {
            let Some(line) = self.decoder.next_line() else {
                break;
            };

            if self.apply_line(line, &mut events) == LineOutcome::Requeued && pause_on_requeue {
                break;
            }
        }

        events
    }

    fn apply_line(&mut self, line: String, events: &mut Vec<ChatEvent>) -> LineOutcome {
        let payload = match classify(&line) {
            LineKind::Ignored => return LineOutcome::Continue,
            LineKind::Foreign => {
                debug!(exchange_id = %self.exchange_id, line = %line, "Skipping non-data line");
                return LineOutcome::Continue;
            }
            LineKind::Done => {
                self.complete(events);
                return LineOutcome::Continue;
            }
            LineKind::Data(payload) => payload,
        };

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => {
                self.requeues = 0;
                match extract_content(&value) {
                    Some(fragment) => self.append(fragment, events),
                    None if !value.is_object() => {
                        debug!(exchange_id = %self.exchange_id, "Skipping non-object payload");
                    }
                    None => {}
                }
                LineOutcome::Continue
            }
            Err(e) => self.requeue(line, e, events),
        }
    }

    fn requeue(
        &mut self,
        line: String,
        error: serde_json::Error,
        events: &mut Vec<ChatEvent>,
    ) -> LineOutcome {
        self.requeues += 1;

        if self.requeues > self.limits.max_requeues || line.len() > self.limits.max_unresolved_bytes
        {
            warn!(
                exchange_id = %self.exchange_id,
                attempts = self.requeues,
                bytes = line.len(),
                error = %error,
                "Giving up on unparseable payload"
            );
            self.fail_into(
                ChatError::Protocol(format!(
                    "payload still unparseable after {} attempts ({} bytes): {}",
                    self.requeues,
                    line.len(),
                    error
                )),
                events,
            );
            return LineOutcome::Continue;
        }

        debug!(
            exchange_id = %self.exchange_id,
            attempts = self.requeues,
            error = %error,
            "Incomplete payload, waiting for more data"
        );
        self.decoder.requeue(&line);
        LineOutcome::Requeued
    }

    fn append(&mut self, fragment: &str, events: &mut Vec<ChatEvent>) {
        self.message.content.push_str(fragment);
        if self.state == AssemblyState::AwaitingFirstToken {
            debug!(exchange_id = %self.exchange_id, "First token received");
            self.state = AssemblyState::Streaming;
        }
        events.push(ChatEvent::ContentUpdated(self.message.clone()));
    }

    fn complete(&mut self, events: &mut Vec<ChatEvent>) {
        self.state = AssemblyState::Completed;
        info!(
            exchange_id = %self.exchange_id,
            chars = self.message.content.chars().count(),
            "Exchange completed"
        );
        events.push(ChatEvent::Completed(self.message.clone()));
    }

    fn fail_into(&mut self, error: ChatError, events: &mut Vec<ChatEvent>) {
        if self.state.is_terminal() {
            return;
        }
        self.state = AssemblyState::Failed;
        warn!(exchange_id = %self.exchange_id, error = %error, "Exchange failed");
        events.push(ChatEvent::Failed(error));
    }
}

impl Default for DeltaAssembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(content: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    fn contents(events: &[ChatEvent]) -> Vec<&str> {
        events
            .iter()
            .filter(|e| matches!(e, ChatEvent::ContentUpdated(_)))
            .filter_map(|e| e.content())
            .collect()
    }

    #[test]
    fn test_classify() {
        assert!(matches!(classify(""), LineKind::Ignored));
        assert!(matches!(classify("   "), LineKind::Ignored));
        assert!(matches!(classify(": keep-alive"), LineKind::Ignored));
        assert!(matches!(classify("event: ping"), LineKind::Foreign));
        assert!(matches!(classify("data:{}"), LineKind::Foreign));
        assert!(matches!(classify("data: [DONE]"), LineKind::Done));
        assert!(matches!(classify("data:  [DONE]  "), LineKind::Done));
        assert!(matches!(classify("data: {\"a\":1} "), LineKind::Data("{\"a\":1}")));
    }

    #[test]
    fn test_extract_content_paths() {
        let with = serde_json::json!({"choices": [{"delta": {"content": "hi"}}]});
        let role_only = serde_json::json!({"choices": [{"delta": {"role": "assistant"}}]});
        let empty = serde_json::json!({"choices": [{"delta": {"content": ""}}]});
        let no_choices = serde_json::json!({"usage": {"total_tokens": 3}});

        assert_eq!(extract_content(&with), Some("hi"));
        assert_eq!(extract_content(&role_only), None);
        assert_eq!(extract_content(&empty), None);
        assert_eq!(extract_content(&no_choices), None);
    }

    #[test]
    fn test_state_transitions() {
        let mut assembler = DeltaAssembler::new();
        assert_eq!(assembler.state(), AssemblyState::AwaitingFirstToken);

        let events = assembler.feed(b"data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n");
        assert!(events.is_empty());
        assert_eq!(assembler.state(), AssemblyState::AwaitingFirstToken);

        assembler.feed(delta("Hi").as_bytes());
        assert_eq!(assembler.state(), AssemblyState::Streaming);

        let events = assembler.feed(b"data: [DONE]\n");
        assert_eq!(assembler.state(), AssemblyState::Completed);
        assert!(matches!(&events[..], [ChatEvent::Completed(m)] if m.content == "Hi"));
    }

    #[test]
    fn test_lines_after_done_are_ignored() {
        let mut assembler = DeltaAssembler::new();
        let input = format!("{}data: [DONE]\n{}", delta("a"), delta("b"));
        let events = assembler.feed(input.as_bytes());

        assert_eq!(contents(&events), vec!["a"]);
        assert!(events.last().unwrap().is_terminal());
        assert!(assembler.feed(delta("c").as_bytes()).is_empty());
        assert!(assembler.finish().is_empty());
        assert_eq!(assembler.message().content, "a");
    }

    #[test]
    fn test_embedded_line_break_is_repaired() {
        let mut assembler = DeltaAssembler::new();

        let events = assembler.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\n");
        assert!(events.is_empty());

        let events = assembler.feed(b"lo\"}}]}\n");
        assert_eq!(contents(&events), vec!["Hello"]);
        assert_eq!(assembler.requeues, 0);
    }

    #[test]
    fn test_requeue_pauses_until_next_chunk() {
        let mut assembler = DeltaAssembler::new();
        let input = format!("data: {{\"broken\":\n1}}\n{}", delta("x"));

        // The bad line is put back; the rest waits for another chunk
        let events = assembler.feed(input.as_bytes());
        assert!(events.is_empty());
        assert!(assembler.decoder.has_complete_line());

        let events = assembler.feed(b"");
        assert_eq!(contents(&events), vec!["x"]);
    }

    #[test]
    fn test_malformed_payload_hits_requeue_limit() {
        let limits = RecoveryLimits {
            max_requeues: 2,
            max_unresolved_bytes: 1024,
        };
        let mut assembler = DeltaAssembler::with_limits(limits);

        let mut events = assembler.feed(b"data: {not json}\n");
        for _ in 0..4 {
            events.extend(assembler.feed(b"data: still not json\n"));
        }

        assert_eq!(assembler.state(), AssemblyState::Failed);
        assert!(matches!(
            events.last(),
            Some(ChatEvent::Failed(ChatError::Protocol(_)))
        ));
        assert!(assembler.feed(delta("late").as_bytes()).is_empty());
    }

    #[test]
    fn test_malformed_payload_hits_byte_limit() {
        let limits = RecoveryLimits {
            max_requeues: 100,
            max_unresolved_bytes: 32,
        };
        let mut assembler = DeltaAssembler::with_limits(limits);

        let events = assembler.feed(b"data: {\"this payload is far too long to keep\n");
        assert!(matches!(
            &events[..],
            [ChatEvent::Failed(ChatError::Protocol(_))]
        ));
    }

    #[test]
    fn test_unterminated_line_hits_byte_limit() {
        let limits = RecoveryLimits {
            max_requeues: 16,
            max_unresolved_bytes: 1024,
        };
        let mut assembler = DeltaAssembler::with_limits(limits);

        let mut events = assembler.feed(delta("before").as_bytes());
        let filler = [b'x'; 256];
        events.extend(assembler.feed(b"data: "));
        for _ in 0..3 {
            events.extend(assembler.feed(&filler));
        }
        assert_eq!(assembler.state(), AssemblyState::Streaming);

        events.extend(assembler.feed(&filler));
        assert_eq!(assembler.state(), AssemblyState::Failed);
        assert!(matches!(
            events.last(),
            Some(ChatEvent::Failed(ChatError::Protocol(_)))
        ));
        assert_eq!(assembler.message().content, "before");
    }

    #[test]
    fn test_finish_without_sentinel_completes() {
        let mut assembler = DeltaAssembler::new();
        assembler.feed(delta("kept").as_bytes());
        assembler.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"lost");

        let events = assembler.finish();
        assert!(matches!(&events[..], [ChatEvent::Completed(m)] if m.content == "kept"));
    }

    #[test]
    fn test_finish_with_required_sentinel_fails() {
        let mut assembler = DeltaAssembler::new().end_of_stream(EndOfStreamPolicy::RequireSentinel);
        assembler.feed(delta("partial").as_bytes());

        let events = assembler.finish();
        assert!(matches!(
            &events[..],
            [ChatEvent::Failed(ChatError::MissingSentinel)]
        ));
    }

    #[test]
    fn test_finish_drains_lines_held_by_requeue() {
        let mut assembler = DeltaAssembler::new();
        let input = format!("data: {{\"choices\":[{{\"delta\":{{\"content\":\"a\n\"}}}}]}}\n{}data: [DONE]\n", delta("b"));

        let events = assembler.feed(input.as_bytes());
        assert!(events.is_empty());

        let events = assembler.finish();
        assert_eq!(contents(&events), vec!["a", "ab"]);
        assert!(matches!(events.last(), Some(ChatEvent::Completed(m)) if m.content == "ab"));
    }

    #[test]
    fn test_fail_is_idempotent() {
        let mut assembler = DeltaAssembler::new();
        assert!(
            assembler
                .fail(ChatError::Protocol("boom".to_string()))
                .is_some()
        );
        assert!(
            assembler
                .fail(ChatError::Protocol("again".to_string()))
                .is_none()
        );
        assert!(assembler.finish().is_empty());
    }
}
