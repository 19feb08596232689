//! Prefetch window: a bounded, strictly ordered pipeline of pending fetches.
//!
//! The window keeps up to `capacity` fetches in flight. Items are issued in
//! increasing index order and handed out in the same order: it is a queue,
//! not a set, so a fetch that finishes early still waits behind the ones
//! issued before it.

use std::collections::VecDeque;
use std::future::Future;

use ferry_core::StreamError;
use tokio_util::sync::CancellationToken;

use crate::cancel::cancellable;

/// A fetch that is already running and can report completion without
/// being polled.
pub trait Prefetch: Future + Unpin {
    fn is_complete(&self) -> bool;
}

/// State of the head of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peek {
    /// Nothing queued.
    Empty,
    /// Head fetch still running.
    Pending,
    /// Head fetch finished; `read_next` will not suspend.
    Ready,
}

pub struct PrefetchWindow<T> {
    fetch: Box<dyn FnMut(u64) -> T + Send>,
    total: u64,
    capacity: usize,
    next_index: u64,
    queue: VecDeque<T>,
}

impl<T: Prefetch> PrefetchWindow<T> {
    /// Create the window and immediately issue `min(capacity, total)` fetches.
    pub fn new(fetch: impl FnMut(u64) -> T + Send + 'static, total: u64, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut window = Self {
            fetch: Box::new(fetch),
            total,
            capacity,
            next_index: 0,
            queue: VecDeque::with_capacity(capacity),
        };
        window.replenish();
        window
    }

    /// Wait for the head fetch, dequeue it and issue the next one.
    ///
    /// On cancellation the head stays queued, so a later call picks up
    /// exactly where this one stopped.
    pub async fn read_next(
        &mut self,
        cancel: Option<&CancellationToken>,
    ) -> Result<T::Output, StreamError> {
        let head = self.queue.front_mut().ok_or(StreamError::Exhausted)?;
        let output = cancellable(head, cancel).await?;
        self.queue.pop_front();
        self.replenish();
        Ok(output)
    }

    /// Non-suspending look at the head.
    pub fn try_peek_next(&self) -> Peek {
        match self.queue.front() {
            None => Peek::Empty,
            Some(head) if head.is_complete() => Peek::Ready,
            Some(_) => Peek::Pending,
        }
    }

    fn replenish(&mut self) {
        while self.queue.len() < self.capacity && self.next_index < self.total {
            let item = (self.fetch)(self.next_index);
            self.next_index += 1;
            self.queue.push_back(item);
        }
    }

    /// Fetches queued or in flight.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index the next issued fetch will get.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}
