//! The inbound BSMP buffer of one worker.
//!
//! Messages are stacked as `[payload][tag][tag length][payload length]`, so the most recently
//! delivered message is always the one inspected or consumed first.

use crate::stack::{usize_len, ByteStack};
use crate::types::ByteSize;

/// A message borrowed from the inbox by [crate::Worker::hpmove].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Message<'a> {
    pub tag: &'a [u8],
    pub payload: &'a [u8],
}

#[derive(Debug, Default)]
pub(crate) struct Inbox {
    stack: ByteStack,
}

impl Inbox {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, tag: &[u8], payload: &[u8]) {
        self.stack.push(payload);
        self.stack.push(tag);
        self.stack.push_usize(tag.len());
        self.stack.push_usize(payload.len());
    }

    /// The tag and payload length of the top message.
    pub(crate) fn peek(&self) -> Option<(&[u8], ByteSize)> {
        let payload_len: ByteSize = self.stack.peek_usize(usize_len())?;
        let tag_len: ByteSize = self.stack.peek_usize(2 * usize_len())?;
        let tag: &[u8] = self.stack.peek(2 * usize_len() + tag_len, tag_len)?;
        Some((tag, payload_len))
    }

    pub(crate) fn pop(&mut self) -> Option<Message<'_>> {
        if self.stack.is_empty() {
            return None;
        }
        let payload_len: ByteSize = self.stack.pop_usize()?;
        let tag_len: ByteSize = self.stack.pop_usize()?;
        let (payload, tag) = self.stack.pop_pair(payload_len, tag_len)?;
        Some(Message { tag, payload })
    }

    /// The number of messages and their accumulated payload size.
    ///
    /// Records vary in length, so this walks the whole buffer.
    pub(crate) fn queue_size(&self) -> (usize, ByteSize) {
        let mut messages: usize = 0;
        let mut bytes: ByteSize = 0;
        let mut depth: usize = 0;
        while depth < self.stack.len() {
            let (Some(payload_len), Some(tag_len)) = (
                self.stack.peek_usize(depth + usize_len()),
                self.stack.peek_usize(depth + 2 * usize_len()),
            ) else {
                break;
            };
            messages += 1;
            bytes += payload_len;
            depth += 2 * usize_len() + tag_len + payload_len;
        }
        (messages, bytes)
    }

    pub(crate) fn clear(&mut self) {
        self.stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::{Inbox, Message};
    use test_log::test;

    #[test]
    fn test_last_delivered_message_is_on_top() {
        let mut inbox: Inbox = Inbox::new();
        inbox.push(b"a", b"first");
        inbox.push(b"b", b"second!");

        assert_eq!(inbox.peek(), Some((&b"b"[..], 7)));
        assert_eq!(
            inbox.pop(),
            Some(Message {
                tag: b"b",
                payload: b"second!"
            })
        );
        assert_eq!(
            inbox.pop(),
            Some(Message {
                tag: b"a",
                payload: b"first"
            })
        );
        assert_eq!(inbox.pop(), None);
        assert_eq!(inbox.peek(), None);
    }

    #[test]
    fn test_queue_size_walks_every_message() {
        let mut inbox: Inbox = Inbox::new();
        assert_eq!(inbox.queue_size(), (0, 0));

        inbox.push(b"", b"xyz");
        inbox.push(b"tag", b"");
        inbox.push(b"t", b"12345");
        assert_eq!(inbox.queue_size(), (3, 8));

        inbox.pop();
        assert_eq!(inbox.queue_size(), (2, 3));

        inbox.clear();
        assert_eq!(inbox.queue_size(), (0, 0));
    }
}
