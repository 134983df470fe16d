//! Append-only conversation history.

use serde::Serialize;

use quotemark_core::ChatMessage;

/// Ordered chat messages. Entries are only ever appended; there is no API to
/// remove, reorder or edit them.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its index.
    pub fn append(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotemark_core::Role;

    #[test]
    fn test_append_returns_index() {
        let mut history = ConversationHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.append(ChatMessage::user("q1", 1)), 0);
        assert_eq!(history.append(ChatMessage::model("a1", None, Some(1))), 1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().unwrap().role, Role::Model);
    }

    #[test]
    fn test_prior_entries_unchanged_by_append() {
        let mut history = ConversationHistory::new();
        history.append(ChatMessage::user("first", 1));
        let before = history.messages().to_vec();

        history.append(ChatMessage::user("second", 2));
        assert_eq!(&history.messages()[..1], before.as_slice());
    }

    #[test]
    fn test_serializes_as_array() {
        let mut history = ConversationHistory::new();
        history.append(ChatMessage::user("q", 1));
        let json = serde_json::to_value(&history).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["text"], "q");
    }
}
