//! Debounced remote sync.
//!
//! Every local mutation enqueues a full state snapshot. A background task
//! waits until no new snapshot has arrived for [`DEBOUNCE`], then pushes the
//! latest one with `PUT /attendance` (last write wins). The first failed push
//! disables remote sync for the rest of the session; later snapshots are
//! dropped and the local cache stays authoritative.

use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use frekwencja_core::state::AttendanceState;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, warn};

use crate::client::ApiClient;

pub const DEBOUNCE: Duration = Duration::from_millis(200);

/// Where snapshots are pushed to.
pub trait Remote: Send + Sync + 'static {
  /// Store `state` remotely; returns the state as the remote saved it.
  fn push_state<'a>(
    &'a self,
    state: &'a AttendanceState,
  ) -> impl Future<Output = Result<AttendanceState>> + Send + 'a;
}

impl Remote for ApiClient {
  async fn push_state(&self, state: &AttendanceState) -> Result<AttendanceState> {
    self.put_state(state).await
  }
}

/// What the sync task did before it was shut down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub pushed:   usize,
  /// Version of the last successfully pushed state.
  pub version:  Option<u32>,
  pub disabled: bool,
}

pub struct SyncQueue {
  tx:   mpsc::UnboundedSender<AttendanceState>,
  task: JoinHandle<SyncReport>,
}

impl SyncQueue {
  pub fn spawn<R: Remote>(remote: R, debounce: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(remote, rx, debounce));
    Self { tx, task }
  }

  pub fn enqueue(&self, state: AttendanceState) {
    // A closed channel means the task is gone; the cache already has it.
    let _ = self.tx.send(state);
  }

  /// Flush the pending snapshot and stop the task.
  pub async fn finish(self) -> Result<SyncReport> {
    drop(self.tx);
    self.task.await.context("sync task panicked")
  }
}

async fn run<R: Remote>(
  remote: R,
  mut rx: mpsc::UnboundedReceiver<AttendanceState>,
  debounce: Duration,
) -> SyncReport {
  let mut report = SyncReport::default();

  while let Some(mut latest) = rx.recv().await {
    let mut coalesced = 0usize;
    loop {
      match tokio::time::timeout(debounce, rx.recv()).await {
        Ok(Some(next)) => {
          latest = next;
          coalesced += 1;
        }
        Ok(None) | Err(_) => break,
      }
    }

    if report.disabled {
      continue;
    }

    match remote.push_state(&latest).await {
      Ok(saved) => {
        debug!(version = saved.version, coalesced, "pushed state");
        report.pushed += 1;
        report.version = Some(saved.version);
      }
      Err(e) => {
        warn!(error = %e, "remote sync failed; continuing offline");
        report.disabled = true;
      }
    }
  }

  report
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use super::*;

  #[derive(Clone, Default)]
  struct Recorder {
    pushed: Arc<Mutex<Vec<usize>>>,
    fail:   bool,
  }

  impl Remote for Recorder {
    async fn push_state(&self, state: &AttendanceState) -> Result<AttendanceState> {
      self.pushed.lock().unwrap().push(state.subjects.len());
      if self.fail {
        anyhow::bail!("server unreachable");
      }
      let mut saved = state.clone();
      saved.version += 1;
      Ok(saved)
    }
  }

  fn with_subjects(n: usize) -> AttendanceState {
    let mut state = AttendanceState::default();
    for i in 0..n {
      state.add_subject(&format!("extra {i}"));
    }
    state
  }

  #[tokio::test]
  async fn a_burst_is_pushed_once_with_the_latest_snapshot() {
    let remote = Recorder::default();
    let queue = SyncQueue::spawn(remote.clone(), DEBOUNCE);
    queue.enqueue(with_subjects(1));
    queue.enqueue(with_subjects(2));
    queue.enqueue(with_subjects(3));
    let report = queue.finish().await.unwrap();

    assert_eq!(report.pushed, 1);
    assert_eq!(report.version, Some(2));
    assert!(!report.disabled);
    assert_eq!(*remote.pushed.lock().unwrap(), [6]);
  }

  #[tokio::test]
  async fn a_pause_longer_than_the_debounce_splits_pushes() {
    let remote = Recorder::default();
    let queue = SyncQueue::spawn(remote.clone(), Duration::from_millis(20));
    queue.enqueue(with_subjects(1));
    tokio::time::sleep(Duration::from_millis(200)).await;
    queue.enqueue(with_subjects(2));
    let report = queue.finish().await.unwrap();

    assert_eq!(report.pushed, 2);
    assert_eq!(*remote.pushed.lock().unwrap(), [4, 5]);
  }

  #[tokio::test]
  async fn a_failed_push_disables_sync() {
    let remote = Recorder { fail: true, ..Recorder::default() };
    let queue = SyncQueue::spawn(remote.clone(), Duration::from_millis(20));
    queue.enqueue(with_subjects(1));
    tokio::time::sleep(Duration::from_millis(200)).await;
    queue.enqueue(with_subjects(2));
    let report = queue.finish().await.unwrap();

    assert!(report.disabled);
    assert_eq!(report.pushed, 0);
    assert_eq!(report.version, None);
    assert_eq!(remote.pushed.lock().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn nothing_enqueued_means_nothing_pushed() {
    let remote = Recorder::default();
    let report = SyncQueue::spawn(remote.clone(), DEBOUNCE).finish().await.unwrap();
    assert_eq!(report, SyncReport::default());
    assert!(remote.pushed.lock().unwrap().is_empty());
  }
}
