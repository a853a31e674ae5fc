//! Debounced token batching
//!
//! Tokens often arrive faster than a terminal or UI can usefully repaint.
//! [`TokenBuffer`] accumulates them and hands the concatenation to a callback
//! once no new token has arrived for the debounce window.
//!
//! The timer is a tokio task, so a buffer must be used inside a runtime.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Default quiet period before pending tokens are emitted
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

type FlushCallback = Arc<dyn Fn(String) + Send + Sync>;

pub struct TokenBuffer {
    pending: Arc<Mutex<String>>,
    on_flush: FlushCallback,
    window: Duration,
    timer: Option<JoinHandle<()>>,
}

impl TokenBuffer {
    /// Create a buffer that calls `on_flush` after `window` of inactivity
    pub fn new(window: Duration, on_flush: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self {
            pending: Arc::new(Mutex::new(String::new())),
            on_flush: Arc::new(on_flush),
            window,
            timer: None,
        }
    }

    pub fn with_default_window(on_flush: impl Fn(String) + Send + Sync + 'static) -> Self {
        Self::new(DEFAULT_DEBOUNCE, on_flush)
    }

    /// Queue a token and restart the debounce timer
    pub fn add(&mut self, token: &str) {
        if token.is_empty() {
            return;
        }
        lock(&self.pending).push_str(token);
        self.cancel_timer();

        let pending = Arc::clone(&self.pending);
        let on_flush = Arc::clone(&self.on_flush);
        let window = self.window;
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            emit(&pending, on_flush.as_ref());
        }));
    }

    /// Emit pending tokens now; a no-op when nothing is pending
    pub fn flush(&mut self) {
        self.cancel_timer();
        emit(&self.pending, self.on_flush.as_ref());
    }

    /// Drop pending tokens without emitting them
    pub fn clear(&mut self) {
        self.cancel_timer();
        lock(&self.pending).clear();
    }

    /// Bytes waiting to be emitted
    pub fn pending_len(&self) -> usize {
        lock(&self.pending).len()
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for TokenBuffer {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

impl std::fmt::Debug for TokenBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBuffer")
            .field("pending_len", &self.pending_len())
            .field("window", &self.window)
            .finish()
    }
}

fn lock(pending: &Mutex<String>) -> MutexGuard<'_, String> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Take the pending text under the lock, then call back outside it
fn emit(pending: &Mutex<String>, on_flush: &(dyn Fn(String) + Send + Sync)) {
    let text = std::mem::take(&mut *lock(pending));
    if !text.is_empty() {
        on_flush(text);
    }
}
