//! Applying results on the UI context
//!
//! Workers never touch view state directly. Finished pages are handed to a
//! `UiDispatcher`, which runs the delivery wherever the front end wants it:
//! inline on the worker (`DirectDispatcher`) or queued for a UI loop to
//! drain (`ChannelDispatcher`).

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;

use tracing::debug;

/// A unit of work to run on the UI context
pub type UiTask = Box<dyn FnOnce() + Send>;

/// Runs tasks on the target context
pub trait UiDispatcher: Send + Sync {
    fn dispatch(&self, task: UiTask);
}

/// Runs every task immediately on the calling thread
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDispatcher;

impl UiDispatcher for DirectDispatcher {
    fn dispatch(&self, task: UiTask) {
        task();
    }
}

/// Queues tasks for a UI loop
///
/// The loop calls `run_pending` once per frame, or `recv` to block until
/// work arrives.
pub struct ChannelDispatcher {
    sender: Sender<UiTask>,
    receiver: Mutex<Receiver<UiTask>>,
}

impl ChannelDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
        }
    }

    /// Run every queued task; returns how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.try_next() {
            task();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one task and run it
    ///
    /// Returns false if nothing arrived in time.
    pub fn recv(&self, timeout: Duration) -> bool {
        let next = {
            let receiver = self.receiver.lock().unwrap_or_else(|e| e.into_inner());
            receiver.recv_timeout(timeout)
        };
        match next {
            Ok(task) => {
                task();
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    // Tasks run outside the receiver lock so they may dispatch more work
    fn try_next(&self) -> Option<UiTask> {
        let receiver = self.receiver.lock().unwrap_or_else(|e| e.into_inner());
        receiver.try_recv().ok()
    }
}

impl Default for ChannelDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl UiDispatcher for ChannelDispatcher {
    fn dispatch(&self, task: UiTask) {
        if self.sender.send(task).is_err() {
            debug!("UI queue closed, dropping task");
        }
    }
}
