use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::AppResult;

/// Environment events watched while an exam is active. They carry nothing
/// beyond the fact that they fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvironmentSignal {
    TabHidden,
    TabVisible,
    WindowBlur,
    WindowFocus,
    FullscreenChanged,
    PageHidden,
}

impl EnvironmentSignal {
    pub fn reason(self) -> &'static str {
        match self {
            EnvironmentSignal::TabHidden => "Tab switching detected.",
            EnvironmentSignal::WindowBlur => "Window focus lost.",
            EnvironmentSignal::FullscreenChanged => "Exited Fullscreen mode.",
            EnvironmentSignal::PageHidden => "Page hidden (Mobile/Tab switch).",
            EnvironmentSignal::TabVisible | EnvironmentSignal::WindowFocus => "Returned to exam.",
        }
    }
}

pub type SignalSink = mpsc::UnboundedSender<EnvironmentSignal>;

/// Handle for registered environment listeners. The teardown runs exactly
/// once, either through [`Subscription::cancel`] or on drop.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(teardown: impl FnOnce() + Send + 'static) -> Self {
        Subscription {
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.teardown.is_some()
    }

    pub fn cancel(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Proctoring primitives provided by whatever hosts the exam (browser shell,
/// kiosk, test fake).
#[async_trait]
pub trait ProctorEnvironment: Send + Sync {
    async fn request_fullscreen(&self) -> AppResult<()>;
    async fn exit_fullscreen(&self) -> AppResult<()>;
    fn is_fullscreen_active(&self) -> bool;
    /// Register listeners that forward every signal into `sink` until the
    /// returned subscription is cancelled.
    fn subscribe(&self, sink: SignalSink) -> Subscription;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn teardown_runs_exactly_once() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let mut subscription = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        subscription.cancel();
        subscription.cancel();
        drop(subscription);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_runs_teardown() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        {
            let subscription = Subscription::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            assert!(subscription.is_active());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn away_signals_have_reasons() {
        assert_eq!(EnvironmentSignal::TabHidden.reason(), "Tab switching detected.");
        assert_eq!(EnvironmentSignal::WindowBlur.reason(), "Window focus lost.");
        assert_eq!(
            EnvironmentSignal::PageHidden.reason(),
            "Page hidden (Mobile/Tab switch)."
        );
    }
}
