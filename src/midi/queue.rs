//! Bounded input queue between the MIDI backend and the audio thread
//!
//! The backend callback pushes messages stamped with the engine's current
//! frame; the real-time `process` call pops everything up to its own frame.
//! Pops never block on an empty queue.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::trace;

use super::{format_hex, Message};

/// Default number of messages buffered before new ones are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 8192;

/// FIFO of frame-stamped incoming messages
#[derive(Debug)]
pub struct InputQueue {
    messages: Mutex<VecDeque<Message>>,
    capacity: usize,
    /// Last frame published by the engine, used to stamp backend messages
    frame: AtomicI64,
}

impl InputQueue {
    /// Create a queue holding at most `capacity` messages
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            frame: AtomicI64::new(0),
        }
    }

    /// Publish the engine's current frame
    pub fn set_frame(&self, frame: i64) {
        self.frame.store(frame, Ordering::Relaxed);
    }

    /// Last frame published by the engine
    pub fn frame(&self) -> i64 {
        self.frame.load(Ordering::Relaxed)
    }

    /// Parse raw bytes from a backend callback and enqueue them at the current frame.
    ///
    /// Returns false when the bytes are not a channel message or the queue is full.
    pub fn push_raw(&self, data: &[u8]) -> bool {
        match Message::parse(data, self.frame()) {
            Some(message) => self.push(message),
            None => {
                trace!("Ignoring MIDI input: {}", format_hex(data));
                false
            }
        }
    }

    /// Enqueue a message; returns false (dropping it) when the queue is full
    pub fn push(&self, message: Message) -> bool {
        let mut messages = self.messages.lock();
        if messages.len() >= self.capacity {
            return false;
        }
        messages.push_back(message);
        true
    }

    /// Pop the oldest message if it is due at or before `frame`.
    ///
    /// Messages scheduled for a later frame stay queued, and so does
    /// everything behind them.
    pub fn try_pop(&self, frame: i64) -> Option<Message> {
        let mut messages = self.messages.lock();
        match messages.front() {
            Some(message) if message.frame <= frame => messages.pop_front(),
            _ => None,
        }
    }

    /// Drop every queued message; returns how many were discarded
    pub fn drain(&self) -> usize {
        let mut messages = self.messages.lock();
        let count = messages.len();
        messages.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

impl Default for InputQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_arrival_order() {
        let queue = InputQueue::default();
        queue.push(Message::led(1, true, 0));
        queue.push(Message::led(2, true, 0));

        assert_eq!(queue.try_pop(0).map(|m| m.note()), Some(1));
        assert_eq!(queue.try_pop(0).map(|m| m.note()), Some(2));
        assert!(queue.try_pop(0).is_none());
    }

    #[test]
    fn test_future_messages_are_held_back() {
        let queue = InputQueue::default();
        queue.push(Message::led(1, true, 10));

        assert!(queue.try_pop(9).is_none());
        assert_eq!(queue.len(), 1);
        assert!(queue.try_pop(10).is_some());
    }

    #[test]
    fn test_push_raw_stamps_current_frame() {
        let queue = InputQueue::default();
        queue.set_frame(480);

        assert!(queue.push_raw(&[0x90, 4, 127]));
        assert!(!queue.push_raw(&[0xF8]));

        let message = queue.try_pop(480).unwrap();
        assert_eq!(message.frame, 480);
        assert_eq!(message.note(), 4);
    }

    #[test]
    fn test_capacity_drops_overflow() {
        let queue = InputQueue::new(2);
        assert!(queue.push(Message::led(1, true, 0)));
        assert!(queue.push(Message::led(2, true, 0)));
        assert!(!queue.push(Message::led(3, true, 0)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_drain() {
        let queue = InputQueue::default();
        queue.push(Message::led(1, true, 0));
        queue.push(Message::led(2, true, 5));

        assert_eq!(queue.drain(), 2);
        assert!(queue.is_empty());
    }
}
