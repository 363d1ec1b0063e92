//! Stage scheduling and thread affinity
//!
//! The pipeline is a fixed sequence of stages. Each stage declares its
//! affinity once: primary stages touch renderer-owned objects and run on the
//! caller's context, background work is CPU-bound decoding that may move to
//! the blocking pool. In [`LoadMode::Synchronous`] every hand-off collapses
//! into a direct call on the current thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Where a unit of work is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// The caller's context; required for any renderer interaction.
    Primary,
    /// Any worker thread; preferred for decoding and I/O.
    Background,
}

/// Major pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Extract,
    Parse,
    BufferViews,
    Textures,
    Materials,
    Scenes,
}

impl Stage {
    /// The affinity this stage's own bookkeeping requires.
    ///
    /// Primary stages may still hand individual decode jobs to the
    /// background through [`Scheduler::background`].
    #[must_use]
    pub fn affinity(self) -> Affinity {
        match self {
            Self::Extract | Self::Parse | Self::BufferViews => Affinity::Background,
            Self::Textures | Self::Materials | Self::Scenes => Affinity::Primary,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Parse => "parse",
            Self::BufferViews => "bufferViews",
            Self::Textures => "textures",
            Self::Materials => "materials",
            Self::Scenes => "scenes",
        }
    }
}

/// Whether suspension points really suspend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Background work runs on the blocking pool; I/O is asynchronous and
    /// network URIs may be fetched.
    #[default]
    Asynchronous,
    /// Everything runs inline on the calling thread. Resources must be
    /// local.
    Synchronous,
}

/// Cooperative cancellation flag shared between the caller and an import.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. The import stops at its next checkpoint.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs pipeline stages with the affinity and cancellation rules above.
#[derive(Debug, Clone)]
pub struct Scheduler {
    mode: LoadMode,
    cancel: CancelToken,
    current: Option<Stage>,
}

impl Scheduler {
    #[must_use]
    pub fn new(mode: LoadMode, cancel: CancelToken) -> Self {
        Self {
            mode,
            cancel,
            current: None,
        }
    }

    #[must_use]
    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    /// The stage most recently entered.
    #[must_use]
    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Cross a stage boundary.
    ///
    /// Stages only move forward; every artifact of the previous stage is
    /// complete once this returns.
    pub async fn enter(&mut self, stage: Stage) -> Result<()> {
        debug_assert!(self.current.is_none_or(|current| current < stage));
        self.checkpoint()?;
        if self.mode == LoadMode::Asynchronous {
            tokio::task::yield_now().await;
            self.checkpoint()?;
        }
        tracing::debug!("Entering stage {} ({:?})", stage.as_str(), stage.affinity());
        self.current = Some(stage);
        Ok(())
    }

    /// Run a CPU-bound job off the primary context and hand its result back.
    pub async fn background<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.checkpoint()?;
        let result = match self.mode {
            LoadMode::Synchronous => job(),
            LoadMode::Asynchronous => tokio::task::spawn_blocking(job)
                .await
                .map_err(|e| Error::BackgroundTask(e.to_string()))?,
        };
        self.checkpoint()?;
        result
    }
}
