//! Session - binds the poll engine to a dedicated worker thread
//!
//! A session is either stopped, holding an idle [`PollEngine`], or running,
//! with exactly one worker thread owning the engine. The idle engine waits in
//! a hand-off slot between runs so that a failed spawn or a stop leaves the
//! transport and sink with the session, ready for the next start.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use super::error::NunchukError;
use super::poll_engine::{Idle, PollEngine};

const WORKER_NAME: &str = "nunchuk-poll";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Running,
}

type EngineSlot = Arc<Mutex<Option<PollEngine<Idle>>>>;

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct Session {
    slot: EngineSlot,
    worker: Option<Worker>,
}

impl Session {
    pub fn new(engine: PollEngine<Idle>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(engine))),
            worker: None,
        }
    }

    pub fn state(&self) -> SessionState {
        if self.worker.is_some() {
            SessionState::Running
        } else {
            SessionState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Cycle counter of the idle engine; `None` while running
    pub fn cycle_counter(&self) -> Option<u16> {
        if self.is_running() {
            return None;
        }
        lock_slot(&self.slot).as_ref().map(|engine| engine.cycle_counter())
    }

    /// Spawn the poll worker
    ///
    /// Fails with [`NunchukError::AlreadyRunning`] instead of starting a
    /// second loop against the same transport.
    pub fn start(&mut self) -> Result<(), NunchukError> {
        if self.worker.is_some() {
            warn!("Start requested while poll session is running");
            return Err(NunchukError::AlreadyRunning);
        }
        if lock_slot(&self.slot).is_none() {
            error!("No idle poll engine available");
            return Err(NunchukError::EngineUnavailable(
                "engine was lost by a previous worker".to_string(),
            ));
        }

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let worker_slot = self.slot.clone();

        info!("Spawning poll worker");
        let handle = std::thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn(move || run_worker(worker_slot, worker_stop))
            .map_err(|e| {
                error!("Unable to create poll thread: {}", e);
                NunchukError::WorkerSpawnFailed(e.to_string())
            })?;

        self.worker = Some(Worker { stop, handle });
        info!("Poll session running");
        Ok(())
    }

    /// Signal the worker and wait for it to exit
    ///
    /// Once this returns the transport and sink are no longer touched. Stopping
    /// a stopped session does nothing.
    pub fn stop(&mut self) -> Result<(), NunchukError> {
        let Some(worker) = self.worker.take() else {
            debug!("Stop requested on stopped session");
            return Ok(());
        };

        debug!("Sending stop signal to poll worker");
        worker.stop.store(true, Ordering::Release);

        match worker.handle.join() {
            Ok(()) => {
                info!("Poll session stopped");
                Ok(())
            }
            Err(_) => {
                error!("Poll worker panicked");
                Err(NunchukError::EngineUnavailable(
                    "poll worker panicked".to_string(),
                ))
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!("Poll session did not stop cleanly: {}", e);
        }
    }
}

fn run_worker(slot: EngineSlot, stop: Arc<AtomicBool>) {
    let Some(engine) = lock_slot(&slot).take() else {
        error!("Poll worker started without an engine");
        return;
    };

    let idle = engine.begin().run_until_stopped(&stop);
    *lock_slot(&slot) = Some(idle);
    debug!("Poll worker returned engine");
}

fn lock_slot(slot: &EngineSlot) -> MutexGuard<'_, Option<PollEngine<Idle>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
