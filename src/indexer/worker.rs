// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background index worker
//!
//! Index runs execute one at a time on a dedicated thread so request
//! threads never embed images themselves; callers block on, or poll, the
//! ticket they get back.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::errors::IndexError;
use crate::indexer::index::{IndexProgress, ProgressSnapshot};
use crate::indexer::{IndexMode, IndexReport, Indexer};

pub type IndexResult = Result<IndexReport, IndexError>;

struct IndexJob {
    mode: IndexMode,
    reply: Sender<IndexResult>,
}

/// Pending reply from the index worker
pub struct IndexTicket {
    rx: Receiver<IndexResult>,
    progress: Arc<IndexProgress>,
}

impl IndexTicket {
    /// Block until the run finishes
    pub fn wait(self) -> IndexResult {
        self.rx.recv().map_err(|_| IndexError::WorkerGone)?
    }

    /// Returns the result if the run has finished
    pub fn poll(&self) -> Option<IndexResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(IndexError::WorkerGone)),
        }
    }

    /// Images processed so far by the worker's current run
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }
}

/// Owns a thread that executes index runs one at a time
pub struct IndexWorker {
    indexer: Arc<Indexer>,
    jobs: Option<Sender<IndexJob>>,
    handle: Option<JoinHandle<()>>,
}

impl IndexWorker {
    pub fn spawn(indexer: Arc<Indexer>) -> Self {
        let (tx, rx) = mpsc::channel::<IndexJob>();
        let runner = indexer.clone();
        let handle = thread::Builder::new()
            .name("artgrep-indexer".to_string())
            .spawn(move || {
                for job in rx {
                    tracing::debug!(mode = %job.mode, "index job started");
                    let result = runner.build(job.mode);
                    // The caller may have dropped its ticket
                    let _ = job.reply.send(result);
                }
            });

        match handle {
            Ok(handle) => Self {
                indexer,
                jobs: Some(tx),
                handle: Some(handle),
            },
            Err(err) => {
                tracing::warn!("Failed to start index worker: {}", err);
                Self {
                    indexer,
                    jobs: None,
                    handle: None,
                }
            }
        }
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Queue an index run
    pub fn submit(&self, mode: IndexMode) -> Result<IndexTicket, IndexError> {
        let jobs = self.jobs.as_ref().ok_or(IndexError::WorkerGone)?;
        let (reply, rx) = mpsc::channel();
        jobs.send(IndexJob { mode, reply })
            .map_err(|_| IndexError::WorkerGone)?;
        Ok(IndexTicket {
            rx,
            progress: self.indexer.progress().clone(),
        })
    }

    /// Queue an index run and wait for it
    pub fn run(&self, mode: IndexMode) -> IndexResult {
        self.submit(mode)?.wait()
    }
}

impl Drop for IndexWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
