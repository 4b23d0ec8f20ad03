//! Producer/consumer hand-off of command queues.

use std::collections::VecDeque;
use std::fmt;

use parking_lot::{Condvar, Mutex};

use crate::context::DeviceContext;

use super::AsyncCommand;

/// Commands recorded for one flush, executed in insertion order.
pub struct AsyncCommandQueue {
    frame: u64,
    commands: VecDeque<Box<dyn AsyncCommand>>,
}

impl AsyncCommandQueue {
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            commands: VecDeque::new(),
        }
    }

    /// Sequence number assigned when the queue was opened.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn push(&mut self, command: Box<dyn AsyncCommand>) {
        self.commands.push_back(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run every command, oldest first.
    pub fn execute(self, ctx: &mut DeviceContext) {
        log::trace!(
            "Executing command queue {} ({} commands)",
            self.frame,
            self.commands.len()
        );
        for command in self.commands {
            log::trace!("  {}", command.name());
            command.execute(ctx);
        }
    }
}

impl fmt::Debug for AsyncCommandQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCommandQueue")
            .field("frame", &self.frame)
            .field("pending", &self.commands.len())
            .finish()
    }
}

struct QueueState {
    open: AsyncCommandQueue,
    closed: VecDeque<AsyncCommandQueue>,
    next_frame: u64,
    /// Closed queues ever handed to the consumer.
    submitted: u64,
    /// Closed queues the consumer finished.
    completed: u64,
    running: bool,
}

/// The open queue plus the closed queues awaiting the consumer.
pub(crate) struct CommandQueues {
    state: Mutex<QueueState>,
    submitted_signal: Condvar,
    completed_signal: Condvar,
}

impl CommandQueues {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                open: AsyncCommandQueue::new(0),
                closed: VecDeque::new(),
                next_frame: 1,
                submitted: 0,
                completed: 0,
                running: true,
            }),
            submitted_signal: Condvar::new(),
            completed_signal: Condvar::new(),
        }
    }

    pub fn push(&self, command: Box<dyn AsyncCommand>) {
        self.state.lock().open.push(command);
    }

    /// Close the open queue and hand it to the consumer.
    ///
    /// Returns the ticket to wait on; an empty open queue is not submitted.
    pub fn close(&self) -> u64 {
        let mut state = self.state.lock();
        if !state.running {
            let next = AsyncCommandQueue::new(state.next_frame);
            let dropped = std::mem::replace(&mut state.open, next);
            if !dropped.is_empty() {
                log::warn!(
                    "Render thread stopped, dropping {} commands",
                    dropped.len()
                );
            }
            return state.submitted;
        }
        if !state.open.is_empty() {
            let next = AsyncCommandQueue::new(state.next_frame);
            state.next_frame += 1;
            let queue = std::mem::replace(&mut state.open, next);
            state.closed.push_back(queue);
            state.submitted += 1;
            self.submitted_signal.notify_one();
        }
        state.submitted
    }

    /// Ticket of the last submitted queue.
    pub fn submitted(&self) -> u64 {
        self.state.lock().submitted
    }

    /// Block until at most `max` closed queues are waiting.
    pub fn wait_pending_at_most(&self, max: usize) {
        let mut state = self.state.lock();
        while state.running && state.closed.len() > max {
            self.completed_signal.wait(&mut state);
        }
    }

    /// Block until the consumer finished every queue up to `ticket`.
    pub fn wait_completed(&self, ticket: u64) {
        let mut state = self.state.lock();
        while state.running && state.completed < ticket {
            self.completed_signal.wait(&mut state);
        }
    }

    /// Next closed queue, blocking while none is available.
    ///
    /// Queues closed before [`CommandQueues::stop`] are still returned.
    pub fn next_blocking(&self) -> Option<AsyncCommandQueue> {
        let mut state = self.state.lock();
        loop {
            if let Some(queue) = state.closed.pop_front() {
                return Some(queue);
            }
            if !state.running {
                return None;
            }
            self.submitted_signal.wait(&mut state);
        }
    }

    pub fn try_next(&self) -> Option<AsyncCommandQueue> {
        self.state.lock().closed.pop_front()
    }

    /// Mark one queue returned by `next_blocking`/`try_next` as executed.
    pub fn complete(&self) {
        let mut state = self.state.lock();
        state.completed += 1;
        self.completed_signal.notify_all();
    }

    pub fn is_idle(&self) -> bool {
        let state = self.state.lock();
        state.open.is_empty() && state.closed.is_empty() && state.completed == state.submitted
    }

    /// Commands recorded since the last close.
    pub fn open_len(&self) -> usize {
        self.state.lock().open.len()
    }

    /// Stop accepting work and drop queues the consumer will never run.
    pub fn abandon(&self) {
        let dropped: Vec<AsyncCommandQueue> = {
            let mut state = self.state.lock();
            state.running = false;
            self.submitted_signal.notify_all();
            self.completed_signal.notify_all();
            state.closed.drain(..).collect()
        };
        if !dropped.is_empty() {
            log::warn!("Dropping {} unexecuted command queues", dropped.len());
        }
    }

    /// Wake every waiter and let the consumer exit once drained.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        state.running = false;
        self.submitted_signal.notify_all();
        self.completed_signal.notify_all();
    }
}
