// console/src/notifier.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{Notification, Severity};
use tokio::sync::broadcast;

const HISTORY_CAPACITY: usize = 64;

/// Single-slot channel for transient operator messages.
///
/// Showing a notification replaces the current one. Every shown
/// notification is also broadcast so views can render it as it arrives.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<NotifierInner>,
}

struct NotifierInner {
    current: Mutex<Notification>,
    // bumped on every show so stale auto-hide tasks can tell they lost
    generation: AtomicU64,
    auto_hide_ms: u64,
    events: broadcast::Sender<Notification>,
}

impl Notifier {
    pub fn new(auto_hide_ms: u64) -> Self {
        let (events, _) = broadcast::channel(HISTORY_CAPACITY);
        Self {
            inner: Arc::new(NotifierInner {
                current: Mutex::new(Notification::default()),
                generation: AtomicU64::new(0),
                auto_hide_ms,
                events,
            }),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.show(message, Severity::Info);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.show(message, Severity::Success);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.show(message, Severity::Error);
    }

    /// Replace the current notification and schedule it to hide
    pub fn show(&self, message: impl Into<String>, severity: Severity) {
        let notification = Notification::new(message, severity, self.inner.auto_hide_ms);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        match severity {
            Severity::Error => tracing::warn!("Notification: {}", notification.message),
            _ => tracing::info!("Notification: {}", notification.message),
        }

        *self.lock_current() = notification.clone();
        // no receivers is fine
        let _ = self.inner.events.send(notification);

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = Arc::downgrade(&self.inner);
            let delay = Duration::from_millis(self.inner.auto_hide_ms);
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                if let Some(inner) = inner.upgrade() {
                    Notifier { inner }.hide_if_current(generation);
                }
            });
        }
    }

    /// Hide the current notification now
    pub fn dismiss(&self) {
        self.lock_current().visible = false;
    }

    pub fn current(&self) -> Notification {
        self.lock_current().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.events.subscribe()
    }

    fn hide_if_current(&self, generation: u64) {
        if self.inner.generation.load(Ordering::SeqCst) == generation {
            self.dismiss();
        }
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Notification> {
        self.inner.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("current", &self.current())
            .field("auto_hide_ms", &self.inner.auto_hide_ms)
            .finish()
    }
}
