use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    clear_rebuild_marker, write_database_atomic, write_rebuild_marker, DatabaseSnapshot,
    ProfileLayout,
};

pub const DEFAULT_SAVE_DELAY: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("failed saving database {}: {message}", .path.display())]
pub struct SaveError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone)]
struct WriteTarget {
    database_path: PathBuf,
    tmp_path: PathBuf,
    rebuild_marker_path: PathBuf,
}

#[derive(Debug, Default)]
struct WriterState {
    last_error: Option<SaveError>,
    completed_writes: u64,
}

enum SaveCommand {
    Write(DatabaseSnapshot),
    Flush(oneshot::Sender<()>),
}

/// Debounced background writer for the database file.
///
/// Snapshots passed to [`SaveScheduler::save`] within one delay window are
/// coalesced into a single write of the newest snapshot. Writes land in the
/// order they were requested and [`SaveScheduler::finalize`] returns only
/// after every earlier snapshot is on disk (or has failed).
#[derive(Debug)]
pub struct SaveScheduler {
    sender: mpsc::UnboundedSender<SaveCommand>,
    state: Arc<Mutex<WriterState>>,
    task: JoinHandle<()>,
    database_path: PathBuf,
}

impl std::fmt::Debug for SaveCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Write(snapshot) => write!(f, "Write({} addons)", snapshot.addons.len()),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl SaveScheduler {
    /// Spawns the writer task on the current tokio runtime.
    pub fn spawn(layout: &ProfileLayout, delay: Duration) -> Self {
        let target = WriteTarget {
            database_path: layout.database_path(),
            tmp_path: layout.database_tmp_path(),
            rebuild_marker_path: layout.rebuild_marker_path(),
        };
        let (sender, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(WriterState::default()));
        let task = tokio::spawn(run_writer(receiver, target, delay, Arc::clone(&state)));

        Self {
            sender,
            state,
            task,
            database_path: layout.database_path(),
        }
    }

    pub fn save(&self, snapshot: DatabaseSnapshot) {
        if self.sender.send(SaveCommand::Write(snapshot)).is_err() {
            let error = SaveError {
                path: self.database_path.clone(),
                message: "database writer is no longer running".to_string(),
            };
            warn!(error = %error, "dropping database save");
            lock_state(&self.state).last_error = Some(error);
        }
    }

    /// Writes any pending snapshot now and waits for it.
    pub async fn finalize(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.sender.send(SaveCommand::Flush(done_tx)).is_err() {
            return;
        }
        if done_rx.await.is_err() {
            warn!("database writer stopped before flushing");
        }
    }

    pub fn last_error(&self) -> Option<SaveError> {
        lock_state(&self.state).last_error.clone()
    }

    pub fn completed_writes(&self) -> u64 {
        lock_state(&self.state).completed_writes
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

fn lock_state(state: &Mutex<WriterState>) -> MutexGuard<'_, WriterState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

async fn run_writer(
    mut receiver: mpsc::UnboundedReceiver<SaveCommand>,
    target: WriteTarget,
    delay: Duration,
    state: Arc<Mutex<WriterState>>,
) {
    let mut pending: Option<(DatabaseSnapshot, Instant)> = None;

    loop {
        let command = match pending.as_ref() {
            Some((_, deadline)) => {
                let deadline = *deadline;
                tokio::select! {
                    command = receiver.recv() => command,
                    _ = tokio::time::sleep_until(deadline) => {
                        if let Some((snapshot, _)) = pending.take() {
                            write_snapshot(&target, snapshot, &state).await;
                        }
                        continue;
                    }
                }
            }
            None => receiver.recv().await,
        };

        match command {
            Some(SaveCommand::Write(snapshot)) => {
                let deadline = match pending.take() {
                    Some((_, deadline)) => deadline,
                    None => Instant::now() + delay,
                };
                pending = Some((snapshot, deadline));
            }
            Some(SaveCommand::Flush(done)) => {
                if let Some((snapshot, _)) = pending.take() {
                    write_snapshot(&target, snapshot, &state).await;
                }
                let _ = done.send(());
            }
            None => {
                if let Some((snapshot, _)) = pending.take() {
                    write_snapshot(&target, snapshot, &state).await;
                }
                break;
            }
        }
    }
}

async fn write_snapshot(
    target: &WriteTarget,
    snapshot: DatabaseSnapshot,
    state: &Mutex<WriterState>,
) {
    let blocking_target = target.clone();
    let result = tokio::task::spawn_blocking(move || {
        write_database_atomic(
            &blocking_target.database_path,
            &blocking_target.tmp_path,
            &snapshot,
        )
    })
    .await;

    let message = match result {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(format!("{err:#}")),
        Err(err) => Some(format!("database writer task failed: {err}")),
    };

    match message {
        None => {
            debug!(path = %target.database_path.display(), "saved addon database");
            if let Err(err) = clear_rebuild_marker(&target.rebuild_marker_path) {
                warn!(error = %format!("{err:#}"), "failed clearing rebuild marker");
            }
            let mut state = lock_state(state);
            state.completed_writes += 1;
            state.last_error = None;
        }
        Some(message) => {
            let error = SaveError {
                path: target.database_path.clone(),
                message,
            };
            warn!(error = %error, "failed to save addon database");
            if let Err(err) = write_rebuild_marker(&target.rebuild_marker_path) {
                warn!(error = %format!("{err:#}"), "failed writing rebuild marker");
            }
            lock_state(state).last_error = Some(error);
        }
    }
}
