// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Observes watched source paths and delivers debounced change
//! notifications to the Hot-Reload Controller (spec.md §4.8 / C11).
//!
//! Built on `notify`'s `RecommendedWatcher` plus `notify-debouncer-mini` for
//! coalescing raw OS events into a single debounced batch per window — the
//! same crate pairing the retrieval pack reaches for the same job. The
//! debouncer's own timeout window *is* `debounceMs`; there is no separate
//! application-level debounce layer on top of it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use tokio::sync::{mpsc, Mutex};

/// Extensions watched by default when no glob patterns are configured
/// (spec.md §4.8): TypeScript, JavaScript, Python, Go, Rust, Java, Ruby,
/// PHP, C/C++/header, C#.
const DEFAULT_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "py", "go", "rs", "java", "rb", "php", "c", "h", "cc", "cpp", "cxx",
    "hpp", "hh", "cs",
];

/// Path segments that are never watched, regardless of pattern.
const IGNORED_SEGMENTS: &[&str] = &["node_modules", ".git", "dist"];

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("failed to initialize file watcher: {0}")]
    Init(#[from] notify::Error),
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

fn is_ignored(path: &Path) -> bool {
    path.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| IGNORED_SEGMENTS.contains(&s))
    })
}

/// Classifies configured patterns and matches watch events against them.
struct PatternMatcher {
    globs: Vec<glob::Pattern>,
}

impl PatternMatcher {
    fn new(patterns: &[String]) -> Self {
        let globs = patterns
            .iter()
            .filter(|p| is_glob(p))
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();
        Self { globs }
    }

    fn matches(&self, path: &Path) -> bool {
        if is_ignored(path) {
            return false;
        }
        if !self.globs.is_empty() {
            return self.globs.iter().any(|g| g.matches_path(path));
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DEFAULT_EXTENSIONS.contains(&ext))
    }
}

/// The narrowest ancestor directory of a pattern that contains no glob
/// metacharacters, used as the actual `notify` watch root.
fn ancestor_dir(pattern: &str, cwd: &Path) -> PathBuf {
    let mut base = PathBuf::new();
    for component in pattern.split('/') {
        if component.is_empty() || is_glob(component) {
            break;
        }
        base.push(component);
    }
    if base.as_os_str().is_empty() {
        cwd.to_path_buf()
    } else if base.is_absolute() {
        base
    } else {
        cwd.join(base)
    }
}

/// Observes `patterns` (globs or plain paths) under `cwd` and delivers one
/// notification per debounced batch of relevant changes.
pub struct FileWatcher {
    debouncer: Mutex<Option<Debouncer<RecommendedWatcher>>>,
    rx: Mutex<mpsc::UnboundedReceiver<()>>,
    paused: Arc<AtomicBool>,
    changed_during_pause: Arc<AtomicBool>,
}

impl FileWatcher {
    pub fn new(patterns: &[String], cwd: &Path, debounce_ms: u64) -> Result<Self, WatchError> {
        let (raw_tx, raw_rx) = std::sync::mpsc::channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(Duration::from_millis(debounce_ms.max(1)), raw_tx)?;

        let mut roots: Vec<PathBuf> = patterns.iter().map(|p| ancestor_dir(p, cwd)).collect();
        roots.sort();
        roots.dedup();
        for root in &roots {
            debouncer.watcher().watch(root, RecursiveMode::Recursive)?;
        }

        let matcher = PatternMatcher::new(patterns);
        let (tx, rx) = mpsc::unbounded_channel();
        let paused = Arc::new(AtomicBool::new(false));
        let changed_during_pause = Arc::new(AtomicBool::new(false));

        spawn_bridge(raw_rx, matcher, Arc::clone(&paused), Arc::clone(&changed_during_pause), tx);

        Ok(Self {
            debouncer: Mutex::new(Some(debouncer)),
            rx: Mutex::new(rx),
            paused,
            changed_during_pause,
        })
    }

    /// Await the next delivered change. Resolves to `None` once the watcher
    /// has been stopped and no more changes will ever arrive.
    pub async fn next_change(&self) -> Option<()> {
        self.rx.lock().await.recv().await
    }

    /// Stop delivering changes. Returns whatever `changed_during_pause` flag
    /// had accumulated up to this call, then resets it — this is how a
    /// caller that re-pauses without an intervening `resume()` learns
    /// whether anything happened while already paused.
    pub fn pause(&self) -> bool {
        self.paused.store(true, Ordering::SeqCst);
        self.changed_during_pause.swap(false, Ordering::SeqCst)
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Close the underlying OS watch and stop the debounce timer. Safe to
    /// call more than once.
    pub async fn stop(&self) {
        self.debouncer.lock().await.take();
    }
}

fn spawn_bridge(
    raw_rx: std::sync::mpsc::Receiver<DebounceEventResult>,
    matcher: PatternMatcher,
    paused: Arc<AtomicBool>,
    changed_during_pause: Arc<AtomicBool>,
    tx: mpsc::UnboundedSender<()>,
) {
    std::thread::spawn(move || {
        while let Ok(result) = raw_rx.recv() {
            let Ok(events) = result else {
                continue;
            };
            if !events.iter().any(|event| matcher.matches(&event.path)) {
                continue;
            }
            if paused.load(Ordering::SeqCst) {
                changed_during_pause.store(true, Ordering::SeqCst);
                continue;
            }
            if tx.send(()).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
