//! Transient notifications.
//!
//! Every write failure produces exactly one toast. The TUI shows the newest
//! live toast in its status bar; CLI commands report the same messages as
//! errors.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

pub const DEFAULT_AUTO_CLOSE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    shown_at: Instant,
}

#[derive(Debug, Clone)]
pub struct Toasts {
    auto_close: Duration,
    queue: VecDeque<Toast>,
}

impl Default for Toasts {
    fn default() -> Self {
        Toasts::new(DEFAULT_AUTO_CLOSE)
    }
}

impl Toasts {
    pub fn new(auto_close: Duration) -> Self {
        Toasts { auto_close, queue: VecDeque::new() }
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(ToastKind::Success, message.into(), Instant::now());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(%message, "error toast");
        self.push(ToastKind::Error, message, Instant::now());
    }

    fn push(&mut self, kind: ToastKind, message: String, shown_at: Instant) {
        self.queue.push_back(Toast { kind, message, shown_at });
    }

    /// Drop toasts whose time is up.
    pub fn prune(&mut self, now: Instant) {
        let auto_close = self.auto_close;
        self.queue.retain(|t| now.duration_since(t.shown_at) < auto_close);
    }

    /// Newest toast still on screen at `now`.
    pub fn current(&self, now: Instant) -> Option<&Toast> {
        self.queue
            .iter()
            .rev()
            .find(|t| now.duration_since(t.shown_at) < self.auto_close)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Take every queued toast, oldest first.
    pub fn drain(&mut self) -> Vec<Toast> {
        self.queue.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_expire_after_auto_close() {
        let mut toasts = Toasts::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        toasts.push(ToastKind::Error, "Failed to delete task. Please try again.".into(), t0);

        let shown = toasts.current(t0 + Duration::from_millis(999)).unwrap();
        assert_eq!(shown.kind, ToastKind::Error);

        assert!(toasts.current(t0 + Duration::from_millis(1000)).is_none());
        toasts.prune(t0 + Duration::from_millis(1500));
        assert!(toasts.is_empty());
    }

    #[test]
    fn newest_toast_wins() {
        let mut toasts = Toasts::default();
        toasts.success("Task created successfully");
        toasts.error("Failed to update task. Please try again.");
        let now = Instant::now();
        assert_eq!(toasts.current(now).unwrap().kind, ToastKind::Error);
        assert_eq!(toasts.drain().len(), 2);
    }
}
