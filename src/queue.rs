//! The records a worker queues during a superstep for delivery at the next synchronization.

use crate::stack::ByteStack;
use crate::types::{Address, ByteSize};

/// A pending registration of `size` bytes at `address`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct PushRequest {
    pub(crate) address: Address,
    pub(crate) size: ByteSize,
}

/// A pending remote read, queued by the requester and answered by the worker owning `source`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct GetRequest {
    /// Already resolved into the answering worker's memory, offset included.
    pub(crate) source: Address,
    /// In the requester's memory.
    pub(crate) destination: Address,
    pub(crate) len: ByteSize,
}

/// A message whose tag and payload are read straight out of the sender's memory at delivery.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct HpSendRequest {
    pub(crate) tag: Address,
    pub(crate) tag_len: ByteSize,
    pub(crate) payload: Address,
    pub(crate) payload_len: ByteSize,
}

#[derive(Clone, Copy, Debug)]
enum CommRecord {
    Write {
        destination: Address,
        offset: usize,
        len: ByteSize,
    },
    Message {
        tag_offset: usize,
        tag_len: ByteSize,
        payload_offset: usize,
        payload_len: ByteSize,
    },
}

/// One delivered record, borrowed from the queue it was drained from.
#[derive(Debug, Eq, PartialEq)]
pub(crate) enum Delivery<'a> {
    /// Copy `payload` to `destination` in the receiving worker's memory.
    Write {
        destination: Address,
        payload: &'a [u8],
    },
    /// Append a message to the receiving worker's inbox.
    Message { tag: &'a [u8], payload: &'a [u8] },
}

/// Buffered remote writes and messages bound for one destination worker.
///
/// Payloads are copied in when the record is queued, so the caller's buffers may be reused right
/// away. Records are delivered in the order they were queued.
#[derive(Debug, Default)]
pub(crate) struct CommQueue {
    records: Vec<CommRecord>,
    payloads: ByteStack,
}

impl CommQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn push_write(&mut self, destination: Address, payload: &[u8]) {
        let offset: usize = self.payloads.push(payload);
        self.records.push(CommRecord::Write {
            destination,
            offset,
            len: payload.len(),
        });
    }

    pub(crate) fn push_message(&mut self, tag: &[u8], payload: &[u8]) {
        let tag_offset: usize = self.payloads.push(tag);
        let payload_offset: usize = self.payloads.push(payload);
        self.records.push(CommRecord::Message {
            tag_offset,
            tag_len: tag.len(),
            payload_offset,
            payload_len: payload.len(),
        });
    }

    /// Hand every queued record to `deliver` in queueing order, then empty the queue.
    pub(crate) fn drain<F>(&mut self, mut deliver: F)
    where
        F: FnMut(Delivery<'_>),
    {
        for record in self.records.iter() {
            let delivery: Option<Delivery<'_>> = match *record {
                CommRecord::Write {
                    destination,
                    offset,
                    len,
                } => self
                    .payloads
                    .slice(offset, len)
                    .map(|payload| Delivery::Write {
                        destination,
                        payload,
                    }),
                CommRecord::Message {
                    tag_offset,
                    tag_len,
                    payload_offset,
                    payload_len,
                } => self
                    .payloads
                    .slice(tag_offset, tag_len)
                    .zip(self.payloads.slice(payload_offset, payload_len))
                    .map(|(tag, payload)| Delivery::Message { tag, payload }),
            };
            if let Some(delivery) = delivery {
                deliver(delivery);
            }
        }
        self.clear();
    }

    pub(crate) fn clear(&mut self) {
        self.records.clear();
        self.payloads.clear();
    }
}
