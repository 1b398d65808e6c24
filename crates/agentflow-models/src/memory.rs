//! Agent memory - ordered conversation history for one (agent, role) pair

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Tool functions whose output is only meaningful while on screen.
/// Their results are masked during compaction instead of being dropped,
/// so message indices and call-id pairing stay intact.
const VOLATILE_VIEWER_TOOLS: &[&str] = &["browser_view", "browser_navigate"];

/// Sentinel written over a masked tool result.
pub const REMOVED_SENTINEL: &str = "(removed)";

/// Ordered conversation history.
///
/// When non-empty, index 0 is the agent's system message; it survives every
/// compression pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    messages: Vec<Message>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append several messages
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Mutable access to a message slot (used by in-place compression)
    pub fn message_mut(&mut self, index: usize) -> Option<&mut Message> {
        self.messages.get_mut(index)
    }

    /// The last message, if any
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Drop the tail message
    pub fn roll_back(&mut self) {
        self.messages.pop();
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Replace the whole content
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// The leading system message, if present
    pub fn system_message(&self) -> Option<&Message> {
        self.messages.first().filter(|m| m.is_system())
    }

    /// Mask volatile viewer outputs with a removal sentinel.
    ///
    /// Only Tool messages whose function name is a viewer output are
    /// touched; call id and name are kept so earlier assistant tool calls
    /// stay paired. Idempotent.
    pub fn compact(&mut self) {
        for message in &mut self.messages {
            if let Message::Tool { name, content, .. } = message
                && VOLATILE_VIEWER_TOOLS.contains(&name.as_str())
                && content.as_str() != REMOVED_SENTINEL
            {
                tracing::debug!(tool = %name, "Masked volatile tool result during compaction");
                *content = REMOVED_SENTINEL.to_string();
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Memory {
        Memory::from_messages(vec![
            Message::system("P"),
            Message::user("hi"),
            Message::assistant("hello"),
        ])
    }

    #[test]
    fn push_and_roll_back() {
        let mut memory = sample();
        memory.push(Message::user("again"));
        assert_eq!(memory.len(), 4);
        memory.roll_back();
        assert_eq!(memory.len(), 3);
        assert_eq!(memory.last().unwrap().content(), "hello");
    }

    #[test]
    fn system_message_only_at_index_zero() {
        let memory = sample();
        assert_eq!(memory.system_message().unwrap().content(), "P");

        let no_system = Memory::from_messages(vec![Message::user("hi"), Message::system("late")]);
        assert!(no_system.system_message().is_none());
    }

    #[test]
    fn compact_masks_only_viewer_tools() {
        let mut memory = Memory::from_messages(vec![
            Message::system("P"),
            Message::tool("c1", "browser_view", "<page dump>"),
            Message::tool("c2", "browser_navigate", "<nav dump>"),
            Message::tool("c3", "file_read", "keep me"),
        ]);
        memory.compact();

        assert_eq!(memory.messages()[1].content(), REMOVED_SENTINEL);
        assert_eq!(memory.messages()[2].content(), REMOVED_SENTINEL);
        assert_eq!(memory.messages()[3].content(), "keep me");

        // call ids and names survive the mask
        let Message::Tool { call_id, name, .. } = &memory.messages()[1] else {
            panic!("not a tool message");
        };
        assert_eq!(call_id, "c1");
        assert_eq!(name, "browser_view");
    }

    #[test]
    fn compact_is_idempotent() {
        let mut memory = Memory::from_messages(vec![
            Message::tool("c1", "browser_view", "<page dump>"),
            Message::user("hi"),
        ]);
        memory.compact();
        let once = memory.clone();
        memory.compact();
        assert_eq!(memory, once);
    }

    #[test]
    fn roll_back_on_empty_is_noop() {
        let mut memory = Memory::new();
        memory.roll_back();
        assert!(memory.is_empty());
    }
}
