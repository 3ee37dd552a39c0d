//! Immutable, shareable conversation transcript

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::types::Message;

/// Ordered list of messages for one conversation.
///
/// A transcript is never mutated in place. Every change builds a new list,
/// and an operation that changes nothing hands back a clone sharing the same
/// allocation, so [`Transcript::ptr_eq`] works as change detection.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Arc<Vec<Message>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    /// Whether both transcripts share the same allocation
    pub fn ptr_eq(&self, other: &Transcript) -> bool {
        Arc::ptr_eq(&self.messages, &other.messages)
    }

    /// New transcript with `message` appended
    pub fn with_appended(&self, message: Message) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(message);
        messages.into()
    }

    /// New transcript with the message at `index` replaced.
    ///
    /// Out-of-range indices return `self` unchanged.
    pub fn with_replaced(&self, index: usize, message: Message) -> Self {
        if index >= self.messages.len() {
            return self.clone();
        }
        let mut messages = self.messages.as_ref().clone();
        messages[index] = message;
        messages.into()
    }

    /// Copy of the messages in their persisted form
    pub fn for_storage(&self) -> Vec<Message> {
        self.messages.iter().map(Message::for_storage).collect()
    }
}

impl From<Vec<Message>> for Transcript {
    fn from(messages: Vec<Message>) -> Self {
        Self {
            messages: Arc::new(messages),
        }
    }
}

impl PartialEq for Transcript {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.messages == other.messages
    }
}

impl Eq for Transcript {}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for Transcript {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.messages.iter())
    }
}

impl<'de> Deserialize<'de> for Transcript {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<Message>::deserialize(deserializer).map(Transcript::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_builds_new_list() {
        let empty = Transcript::new();
        let one = empty.with_appended(Message::user("hi"));
        assert!(empty.is_empty());
        assert_eq!(one.len(), 1);
        assert!(!one.ptr_eq(&empty));
    }

    #[test]
    fn test_replace_out_of_range_is_identity() {
        let t = Transcript::from(vec![Message::user("a")]);
        let same = t.with_replaced(5, Message::user("b"));
        assert!(same.ptr_eq(&t));
    }

    #[test]
    fn test_replace_keeps_original() {
        let t = Transcript::from(vec![Message::assistant("a")]);
        let changed = t.with_replaced(0, Message::assistant("ab"));
        assert_eq!(t.messages()[0], Message::assistant("a"));
        assert_eq!(changed.messages()[0], Message::assistant("ab"));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let t = Transcript::from(vec![Message::system("Error: boom")]);
        let json = serde_json::to_string(&t).unwrap();
        assert_eq!(json, r#"[{"role":"system","content":"Error: boom"}]"#);
        let back: Transcript = serde_json::from_str(&json).unwrap();
        assert_eq!(back, t);
    }
}
