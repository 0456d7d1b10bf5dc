//! Search text handling: tokenizing and debouncing
//!
//! Typing in the search box should not rebuild the tree on every keystroke.
//! `SearchDebouncer` waits until the text has been quiet for a short window
//! and then fires once with the latest text.

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use regex::Regex;
use std::sync::OnceLock;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Default quiescence window before a search fires
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Split free text into lowercase word tokens.
///
/// Runs of non-word characters are separators, so `"cotton, shirt!"` gives
/// `["cotton", "shirt"]`. Blank text gives no tokens.
pub fn tokenize_search(text: &str) -> Vec<String> {
    static WORD_RE: OnceLock<Regex> = OnceLock::new();
    let word_re = WORD_RE.get_or_init(|| Regex::new(r"\w+").unwrap());

    word_re
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Coalesces rapid search edits into one delayed callback
pub struct SearchDebouncer {
    tx: Option<Sender<String>>,
    handle: Option<JoinHandle<()>>,
}

impl SearchDebouncer {
    /// Start the debouncer thread. `on_fire` runs on that thread.
    pub fn new<F>(window: Duration, on_fire: F) -> Self
    where
        F: Fn(String) + Send + 'static,
    {
        let (tx, rx) = unbounded::<String>();

        let handle = std::thread::spawn(move || {
            let mut pending: Option<String> = None;
            loop {
                let received = match pending {
                    Some(_) => rx.recv_timeout(window),
                    None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                };

                match received {
                    Ok(text) => pending = Some(text),
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some(text) = pending.take() {
                            debug!("Search settled: {:?}", text);
                            on_fire(text);
                        }
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });

        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    /// Record a text change, restarting the window
    pub fn push(&self, text: impl Into<String>) {
        if let Some(tx) = &self.tx {
            tx.send(text.into()).ok();
        }
    }
}

impl Drop for SearchDebouncer {
    fn drop(&mut self) {
        // Closing the channel ends the thread; pending text is discarded
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}
