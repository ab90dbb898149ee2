//! Background task worker for fire-and-forget writes.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, PoisonError},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam::channel::{Receiver, Sender, TrySendError};
use tracing::{debug, warn};

use crate::error::{RepoError, Result};

type Task = Box<dyn FnOnce() -> Result<()> + Send>;

enum WorkerCommand {
    Run(Task),
    Shutdown,
}

#[derive(Default)]
struct Pending {
    count: Mutex<usize>,
    idle: Condvar,
}

impl Pending {
    fn add(&self) {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn done(&self) {
        let mut count = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// A bounded queue drained by one named thread.
///
/// Submission never blocks. When the queue is full the oldest queued task is
/// dropped to make room.
pub struct TaskWorker {
    name: String,
    tx: Mutex<Option<Sender<WorkerCommand>>>,
    rx: Receiver<WorkerCommand>,
    pending: Arc<Pending>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TaskWorker {
    pub fn start(capacity: usize, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (tx, rx) = crossbeam::channel::bounded(capacity.max(1));
        let pending = Arc::new(Pending::default());

        let loop_rx = rx.clone();
        let loop_pending = pending.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker_loop(loop_rx, loop_pending))
            .map_err(RepoError::WorkerSpawn)?;
        debug!(worker = %name, capacity, "worker started");

        Ok(Self {
            name,
            tx: Mutex::new(Some(tx)),
            rx,
            pending,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queues a task. A failing task is logged and dropped.
    pub fn submit<F>(&self, task: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = tx.as_ref() else {
            warn!(worker = %self.name, "worker stopped, task dropped");
            return;
        };

        self.pending.add();
        let mut command = WorkerCommand::Run(Box::new(task));
        loop {
            match tx.try_send(command) {
                Ok(()) => return,
                Err(TrySendError::Full(back)) => {
                    if self.rx.try_recv().is_ok() {
                        self.pending.done();
                        warn!(worker = %self.name, "queue full, dropped oldest task");
                    }
                    command = back;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.pending.done();
                    warn!(worker = %self.name, "worker gone, task dropped");
                    return;
                }
            }
        }
    }

    /// Blocks until every accepted task has run or been dropped. Returns
    /// `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let count = self
            .pending
            .count
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let (count, _) = self
            .pending
            .idle
            .wait_timeout_while(count, timeout, |c| *c > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *count == 0
    }

    /// Runs what is queued, then stops the thread. Later submissions are dropped.
    pub fn shutdown(&self) {
        let tx = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(WorkerCommand::Shutdown);
        }
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(worker = %self.name, "worker thread panicked");
            }
        }
    }
}

impl Drop for TaskWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker_loop(rx: Receiver<WorkerCommand>, pending: Arc<Pending>) {
    while let Ok(command) = rx.recv() {
        match command {
            WorkerCommand::Run(task) => {
                match panic::catch_unwind(AssertUnwindSafe(task)) {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => warn!(error = %err, "background task failed"),
                    Err(_) => warn!("background task panicked"),
                }
                pending.done();
            }
            WorkerCommand::Shutdown => break,
        }
    }
    debug!("worker loop finished");
}
