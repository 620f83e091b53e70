//! [`UiThread`] implementations.

use std::{
    io,
    thread::{self, JoinHandle, ThreadId},
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::host::{UiJob, UiThread};

/// A dedicated thread that drains a job queue in order.
pub struct ChannelUiThread {
    /// Job queue; dropped on shutdown.
    tx: Mutex<Option<Sender<UiJob>>>,
    /// Worker handle, joined on shutdown.
    handle: Mutex<Option<JoinHandle<()>>>,
    /// Worker thread id.
    id: ThreadId,
}

impl ChannelUiThread {
    /// Spawn the worker thread under `name`.
    pub fn spawn(name: &str) -> io::Result<Self> {
        let (tx, rx) = unbounded::<UiJob>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(&rx))?;
        debug!(thread = name, "ui_thread_started");
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            id: handle.thread().id(),
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Stop accepting jobs, drain the queue and join the worker.
    pub fn shutdown(&self) {
        drop(self.tx.lock().take());
        if let Some(handle) = self.handle.lock().take()
            && !self.is_current()
        {
            let _ignored = handle.join();
        }
    }
}

/// Worker loop: run jobs until every sender is gone.
fn run(rx: &Receiver<UiJob>) {
    while let Ok(job) = rx.recv() {
        trace!("ui_job");
        job();
    }
    debug!("ui_thread_stopped");
}

impl UiThread for ChannelUiThread {
    fn post(&self, job: UiJob) -> bool {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.id
    }
}

impl Drop for ChannelUiThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Runs every job immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineUi;

impl UiThread for InlineUi {
    fn post(&self, job: UiJob) -> bool {
        job();
        true
    }
}
