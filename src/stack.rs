//! Growable variable-length byte stacks.
//!
//! Fixed-size records (registration requests, read requests, unbuffered sends) are kept in plain
//! `Vec`s. Payloads of varying length are packed back to back into a [ByteStack], with whatever
//! fixed-size header describes them pushed on top, so a stack can be unwound from its top without
//! any side index.

use core::mem::size_of;

const WORD: usize = size_of::<usize>();

#[derive(Debug, Default)]
pub(crate) struct ByteStack {
    bytes: Vec<u8>,
    /// Everything below `top` is live. Bytes above it were popped and are kept readable until the
    /// next push, so a popped slice can be handed out without copying.
    top: usize,
}

impl ByteStack {
    pub(crate) fn len(&self) -> usize {
        self.top
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.top == 0
    }

    /// Push `item` and return the offset it was stored at.
    pub(crate) fn push(&mut self, item: &[u8]) -> usize {
        self.bytes.truncate(self.top);
        self.bytes.extend_from_slice(item);
        let offset: usize = self.top;
        self.top = self.bytes.len();
        offset
    }

    pub(crate) fn push_usize(&mut self, value: usize) -> usize {
        self.push(&value.to_ne_bytes())
    }

    /// Pop the top `len` bytes.
    pub(crate) fn pop(&mut self, len: usize) -> Option<&[u8]> {
        if len > self.top {
            return None;
        }
        self.top -= len;
        Some(&self.bytes[self.top..self.top + len])
    }

    /// Pop two adjacent regions at once: `upper_len` bytes from the top, and the `lower_len` bytes
    /// right below them. Returns `(lower, upper)`.
    pub(crate) fn pop_pair(&mut self, lower_len: usize, upper_len: usize) -> Option<(&[u8], &[u8])> {
        let len: usize = lower_len.checked_add(upper_len)?;
        if len > self.top {
            return None;
        }
        self.top -= len;
        let split: usize = self.top + lower_len;
        Some((&self.bytes[self.top..split], &self.bytes[split..split + upper_len]))
    }

    pub(crate) fn pop_usize(&mut self) -> Option<usize> {
        self.pop(WORD).and_then(decode_usize)
    }

    /// Read `len` bytes which start `depth` bytes below the top, without popping.
    pub(crate) fn peek(&self, depth: usize, len: usize) -> Option<&[u8]> {
        let start: usize = self.top.checked_sub(depth)?;
        let end: usize = start.checked_add(len)?;
        if end > self.top {
            return None;
        }
        Some(&self.bytes[start..end])
    }

    pub(crate) fn peek_usize(&self, depth: usize) -> Option<usize> {
        self.peek(depth, WORD).and_then(decode_usize)
    }

    /// Read `len` live bytes stored at `offset`.
    pub(crate) fn slice(&self, offset: usize, len: usize) -> Option<&[u8]> {
        let end: usize = offset.checked_add(len)?;
        if end > self.top {
            return None;
        }
        Some(&self.bytes[offset..end])
    }

    /// Drop every live byte while keeping the allocation for the next superstep.
    pub(crate) fn clear(&mut self) {
        self.top = 0;
        self.bytes.clear();
    }
}

pub(crate) const fn usize_len() -> usize {
    WORD
}

fn decode_usize(bytes: &[u8]) -> Option<usize> {
    let word: [u8; WORD] = bytes.try_into().ok()?;
    Some(usize::from_ne_bytes(word))
}

#[cfg(test)]
mod tests {
    use super::{usize_len, ByteStack};
    use test_log::test;

    #[test]
    fn test_push_then_pop_in_reverse_order() {
        let mut stack: ByteStack = ByteStack::default();
        assert!(stack.is_empty());

        stack.push(b"payload");
        stack.push_usize(7);
        assert_eq!(stack.len(), 7 + usize_len());

        assert_eq!(stack.pop_usize(), Some(7));
        assert_eq!(stack.pop(7), Some(&b"payload"[..]));
        assert!(stack.is_empty());
        assert_eq!(stack.pop(1), None);
    }

    #[test]
    fn test_pop_pair_splits_adjacent_regions() {
        let mut stack: ByteStack = ByteStack::default();
        stack.push(b"payload");
        stack.push(b"tag");

        assert_eq!(stack.pop_pair(7, 3), Some((&b"payload"[..], &b"tag"[..])));
        assert!(stack.is_empty());
        assert_eq!(stack.pop_pair(0, 1), None);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut stack: ByteStack = ByteStack::default();
        stack.push(b"ab");
        stack.push(b"cde");

        assert_eq!(stack.peek(5, 2), Some(&b"ab"[..]));
        assert_eq!(stack.peek(3, 3), Some(&b"cde"[..]));
        assert_eq!(stack.peek(6, 1), None);
        assert_eq!(stack.peek(2, 3), None);
        assert_eq!(stack.len(), 5);
    }

    #[test]
    fn test_offsets_stay_valid_across_growth() {
        let mut stack: ByteStack = ByteStack::default();
        let offsets: Vec<usize> = (0u8..64).map(|i| stack.push(&[i; 9])).collect();
        for (i, offset) in offsets.into_iter().enumerate() {
            assert_eq!(stack.slice(offset, 9), Some(&[i as u8; 9][..]));
        }
    }

    #[test]
    fn test_push_after_pop_overwrites_popped_bytes() {
        let mut stack: ByteStack = ByteStack::default();
        stack.push(b"old");
        assert_eq!(stack.pop(3), Some(&b"old"[..]));
        stack.push(b"new!");
        assert_eq!(stack.len(), 4);
        assert_eq!(stack.slice(0, 4), Some(&b"new!"[..]));

        stack.clear();
        assert!(stack.is_empty());
        assert_eq!(stack.slice(0, 1), None);
    }
}
