//! Work queue with a bounded admission window, a backoff delay line and
//! dispatch pacing.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

use crate::task::Task;

/// Tasks waiting for a worker, in batch order.
///
/// Only `window` tasks are admitted (ready, delayed or in flight) at a time;
/// the rest wait in `waiting`. Requeued tasks sit in the delay line without
/// holding a worker and are dispatched ahead of fresh tasks once due.
pub(super) struct WorkQueue {
    waiting: VecDeque<Task>,
    ready: VecDeque<Task>,
    delayed: Vec<(Instant, Task)>,
    window: usize,
}

impl WorkQueue {
    pub(super) fn new(tasks: Vec<Task>, window: usize) -> Self {
        Self {
            waiting: tasks.into(),
            ready: VecDeque::new(),
            delayed: Vec::new(),
            window: window.max(1),
        }
    }

    /// Move waiting tasks into the ready queue while the window has room.
    pub(super) fn admit(&mut self, in_flight: usize) {
        while self.ready.len() + self.delayed.len() + in_flight < self.window {
            let Some(task) = self.waiting.pop_front() else {
                break;
            };
            self.ready.push_back(task);
        }
    }

    /// Next task to dispatch at `now`: the earliest due delayed task, else the
    /// front of the ready queue.
    pub(super) fn next_ready(&mut self, now: Instant) -> Option<Task> {
        let due = self
            .delayed
            .iter()
            .enumerate()
            .filter(|(_, (at, _))| *at <= now)
            .min_by_key(|(_, (at, _))| *at)
            .map(|(i, _)| i);
        if let Some(i) = due {
            return Some(self.delayed.remove(i).1);
        }
        self.ready.pop_front()
    }

    pub(super) fn requeue(&mut self, task: Task, delay: Duration) {
        self.delayed.push((Instant::now() + delay, task));
    }

    /// Whether a task could be dispatched at `now`.
    pub(super) fn has_ready(&self, now: Instant) -> bool {
        !self.ready.is_empty() || self.delayed.iter().any(|(at, _)| *at <= now)
    }

    pub(super) fn earliest_delayed(&self) -> Option<Instant> {
        self.delayed.iter().map(|(at, _)| *at).min()
    }

    pub(super) fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.ready.is_empty() && self.delayed.is_empty()
    }
}

/// Pauses dispatch for `pause` after every `group` dispatches.
pub(super) struct Pacer {
    group: usize,
    pause: Duration,
    since_pause: usize,
    until: Option<Instant>,
}

impl Pacer {
    pub(super) fn new(group: usize, pause: Duration) -> Self {
        Self {
            group: group.max(1),
            pause,
            since_pause: 0,
            until: None,
        }
    }

    /// True while a pause is in effect.
    pub(super) fn blocked(&mut self, now: Instant) -> bool {
        match self.until {
            Some(t) if now < t => true,
            Some(_) => {
                self.until = None;
                false
            }
            None => false,
        }
    }

    pub(super) fn dispatched(&mut self, now: Instant) {
        self.since_pause += 1;
        if self.since_pause >= self.group {
            self.since_pause = 0;
            if !self.pause.is_zero() {
                self.until = Some(now + self.pause);
            }
        }
    }

    pub(super) fn until(&self) -> Option<Instant> {
        self.until
    }
}
