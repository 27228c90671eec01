//! Defines the [`Store`], which owns the currently served [`Snapshot`].
//!
//! Readers load the snapshot without locking and always see either the old
//! or the new tree, never a mix. Reloads are serialized: each one builds a
//! fresh snapshot from disk and swaps it in only if the whole load
//! succeeded. A failed reload leaves the previous snapshot in service.

use crate::load::{self, Directory, Entry, Snapshot};
use crate::template::Layout;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// The minimum interval between two throttled reloads.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

pub struct Store {
    content_dir: PathBuf,

    /// The minimum interval enforced by [`Store::trigger_reload`].
    cooldown: Duration,

    current: ArcSwap<Snapshot>,

    /// Serializes reloads and records when the last one started.
    last_reload: Mutex<Instant>,
}

impl Store {
    /// Validates `content_dir` and loads it. There is no previous snapshot to
    /// fall back to, so a failed initial load is an error.
    pub fn new<P: Into<PathBuf>>(
        content_dir: P,
        cooldown: Duration,
    ) -> Result<Store> {
        let content_dir = content_dir.into();
        if content_dir.as_os_str().is_empty() {
            let message = String::from("content directory is empty");
            return Err(Error::Config(message));
        }
        if !content_dir.is_dir() {
            return Err(Error::Config(format!(
                "content directory '{}' is not a directory",
                content_dir.display()
            )));
        }

        let started = Instant::now();
        let snapshot = load::load(&content_dir).map_err(|err| {
            error!(
                content_dir = %content_dir.display(),
                error = %err,
                "unable to load content"
            );
            Error::Load(err)
        })?;
        log_snapshot(&snapshot, started);

        Ok(Store {
            content_dir,
            cooldown,
            current: ArcSwap::from_pointee(snapshot),
            last_reload: Mutex::new(started),
        })
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    /// Rebuilds the snapshot from disk and installs it. On failure the
    /// current snapshot keeps serving and the error is returned.
    pub fn reload(&self) -> Result<()> {
        let mut last_reload = self.last_reload.lock();
        self.reload_locked(&mut last_reload)
    }

    /// Like [`Store::reload`], but refuses to run if the previous reload
    /// started less than the cooldown ago.
    pub fn trigger_reload(&self) -> Result<()> {
        let mut last_reload = self.last_reload.lock();
        let elapsed = last_reload.elapsed();
        if elapsed < self.cooldown {
            return Err(Error::TooSoon {
                wait: self.cooldown - elapsed,
            });
        }
        self.reload_locked(&mut last_reload)
    }

    fn reload_locked(&self, last_reload: &mut Instant) -> Result<()> {
        let started = Instant::now();
        *last_reload = started;
        match load::load(&self.content_dir) {
            Ok(snapshot) => {
                log_snapshot(&snapshot, started);
                self.current.store(Arc::new(snapshot));
                Ok(())
            }
            Err(err) => {
                error!(
                    error = %err,
                    "unable to reload content, keeping the current content"
                );
                Err(Error::Load(err))
            }
        }
    }

    /// Returns the current snapshot. Holding on to it keeps a consistent view
    /// across several lookups even if a reload happens in the meantime.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn entry(&self, path: &str) -> Option<Arc<Entry>> {
        self.current.load().entry(path).cloned()
    }

    pub fn directory(&self, path: &str) -> Option<Arc<Directory>> {
        self.current.load().directory(path).cloned()
    }

    pub fn main_layout(&self) -> Arc<Layout> {
        Arc::clone(&self.current.load().main_layout)
    }
}

fn log_snapshot(snapshot: &Snapshot, started: Instant) {
    info!(
        entries = snapshot.entries.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "content installed"
    );
    for key in snapshot.entries.keys() {
        tracing::debug!(key = %key, "indexed");
    }
}

/// The result of a fallible [`Store`] operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error constructing or reloading a [`Store`].
#[derive(Debug)]
pub enum Error {
    /// Returned when the store is configured with an unusable content
    /// directory.
    Config(String),

    /// Returned when loading the content failed.
    Load(load::Error),

    /// Returned by [`Store::trigger_reload`] when the cooldown hasn't
    /// elapsed yet.
    TooSoon { wait: Duration },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Config(message) => {
                write!(f, "Invalid store configuration: {}", message)
            }
            Error::Load(err) => write!(f, "Loading content: {}", err),
            Error::TooSoon { wait } => write!(
                f,
                "Reloaded too recently, try again in {:.1}s",
                wait.as_secs_f64()
            ),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Config(_) => None,
            Error::Load(err) => Some(err),
            Error::TooSoon { .. } => None,
        }
    }
}

impl From<load::Error> for Error {
    /// Converts [`load::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: load::Error) -> Error {
        Error::Load(err)
    }
}
