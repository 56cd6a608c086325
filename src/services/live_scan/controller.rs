use crate::error::AppError;
use crate::models::prediction_types::PredictionResult;
use crate::models::scan_types::{ScanPhase, ScanSnapshot, ScanTrigger};
use crate::services::classifier::gateway::PredictionGateway;
use crate::services::history::ResultSink;
use crate::services::live_scan::camera::FrameSource;
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::loop_worker::scan_loop;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CycleStart {
    Started,
    Busy,
    Inactive,
}

/// Mutable scan state. Every transition happens under the controller's lock, so a
/// timer tick and a manual capture can never both move the phase to `Analyzing`.
#[derive(Debug)]
pub(crate) struct ScanSession {
    phase: ScanPhase,
    running: bool,
    disposed: bool,
    interval: Duration,
    last_result: Option<PredictionResult>,
    completed_cycles: u64,
    dropped_ticks: u64,
}

impl ScanSession {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            phase: ScanPhase::Idle,
            running: false,
            disposed: false,
            interval,
            last_result: None,
            completed_cycles: 0,
            dropped_ticks: 0,
        }
    }

    /// Returns false when the session was already armed or can no longer start.
    pub(crate) fn arm(&mut self) -> bool {
        if self.disposed || self.running {
            return false;
        }
        self.running = true;
        if self.phase == ScanPhase::Idle {
            self.phase = ScanPhase::Armed;
        }
        true
    }

    /// An in-flight cycle keeps `Analyzing` until it lands.
    pub(crate) fn disarm(&mut self) {
        self.running = false;
        if self.phase == ScanPhase::Armed {
            self.phase = ScanPhase::Idle;
        }
    }

    pub(crate) fn dispose(&mut self) {
        self.disposed = true;
        self.running = false;
        self.phase = ScanPhase::Idle;
    }

    pub(crate) fn begin_cycle(&mut self, trigger: ScanTrigger) -> CycleStart {
        if self.disposed {
            return CycleStart::Inactive;
        }
        if self.phase == ScanPhase::Analyzing {
            if trigger == ScanTrigger::Tick {
                self.dropped_ticks += 1;
                debug!("Scan tick dropped, cycle still in flight");
            }
            return CycleStart::Busy;
        }
        if trigger == ScanTrigger::Tick && !self.running {
            return CycleStart::Inactive;
        }
        self.phase = ScanPhase::Analyzing;
        CycleStart::Started
    }

    /// Lands a cycle. Returns whether `result` was kept as the last result.
    pub(crate) fn finish_cycle(&mut self, result: Option<&PredictionResult>) -> bool {
        if self.disposed {
            self.phase = ScanPhase::Idle;
            return false;
        }
        self.phase = if self.running {
            ScanPhase::Armed
        } else {
            ScanPhase::Idle
        };
        match result {
            Some(result) => {
                self.last_result = Some(result.clone());
                self.completed_cycles += 1;
                true
            }
            None => false,
        }
    }

    pub(crate) fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            phase: self.phase,
            running: self.running,
            interval_ms: self.interval.as_millis() as u64,
            last_result: self.last_result.clone(),
            completed_cycles: self.completed_cycles,
            dropped_ticks: self.dropped_ticks,
        }
    }
}

/// State shared between the controller handle and its ticker task.
pub(crate) struct ScanShared {
    session: Mutex<ScanSession>,
    gateway: PredictionGateway,
    camera: Arc<dyn FrameSource>,
    sink: Arc<dyn ResultSink>,
    landed: Notify,
}

/// Lands the cycle as failed if the cycle future is dropped before finishing.
struct CycleGuard<'a> {
    shared: &'a ScanShared,
    landed: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.landed {
            self.shared.session().finish_cycle(None);
            self.shared.landed.notify_waiters();
        }
    }
}

impl ScanShared {
    pub(crate) fn session(&self) -> MutexGuard<'_, ScanSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Capture and predict for a cycle already started with `begin_cycle`.
    pub(crate) async fn run_cycle(&self) -> Result<PredictionResult, AppError> {
        let mut guard = CycleGuard {
            shared: self,
            landed: false,
        };

        let outcome = match self.camera.capture_frame().await {
            Ok(frame) => self.gateway.predict(&frame).await,
            Err(e) => Err(e),
        };

        // The sink sees the result before the phase leaves `Analyzing`.
        if let Ok(result) = &outcome {
            if self.session().disposed {
                debug!("Discarding scan result {} after dispose", result.class_name);
            } else {
                self.sink.record(result);
            }
        }

        self.session().finish_cycle(outcome.as_ref().ok());
        guard.landed = true;
        self.landed.notify_waiters();
        outcome
    }
}

struct Ticker {
    cancel_token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic capture-and-predict with at most one cycle in flight.
pub struct LiveScanController {
    shared: Arc<ScanShared>,
    ticker: Mutex<Option<Ticker>>,
}

impl LiveScanController {
    pub fn new(
        gateway: PredictionGateway,
        camera: Arc<dyn FrameSource>,
        sink: Arc<dyn ResultSink>,
        interval: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(ScanShared {
                session: Mutex::new(ScanSession::new(interval)),
                gateway,
                camera,
                sink,
                landed: Notify::new(),
            }),
            ticker: Mutex::new(None),
        }
    }

    fn ticker(&self) -> MutexGuard<'_, Option<Ticker>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn cancel_ticker(&self) {
        if let Some(ticker) = self.ticker().take() {
            ticker.cancel_token.cancel();
            drop(ticker.handle);
        }
    }

    /// Arms the recurring trigger. The first tick fires one interval from now.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut ticker = self.ticker();
        let interval = {
            let mut session = self.shared.session();
            if session.disposed {
                warn!("Ignoring start on a disposed scan controller");
                return;
            }
            if !session.arm() {
                return;
            }
            session.interval
        };

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(scan_loop(
            Arc::clone(&self.shared),
            interval,
            cancel_token.clone(),
        ));
        *ticker = Some(Ticker {
            cancel_token,
            handle,
        });
        info!("Live scan started, interval {}ms", interval.as_millis());
    }

    /// Cancels the trigger. A cycle already in flight still lands and is delivered.
    pub fn stop(&self) {
        self.cancel_ticker();
        let mut session = self.shared.session();
        if session.running {
            session.disarm();
            info!("Live scan stopped");
        }
    }

    /// Single manual cycle, subject to the same single-flight rule as the timer.
    pub async fn capture_and_analyze(&self) -> Result<PredictionResult, AppError> {
        let start = self.shared.session().begin_cycle(ScanTrigger::Manual);
        match start {
            CycleStart::Started => self.shared.run_cycle().await,
            CycleStart::Busy => Err(AppError::ScanBusy),
            CycleStart::Inactive => Err(AppError::Capture(
                "Scan controller has been disposed".to_string(),
            )),
        }
    }

    /// Final teardown: no further cycles, and an in-flight result is dropped.
    pub fn dispose(&self) {
        self.cancel_ticker();
        {
            let mut session = self.shared.session();
            if session.disposed {
                return;
            }
            session.dispose();
        }
        self.shared.landed.notify_waiters();
        debug!("Live scan controller disposed");
    }

    /// Resolves once no cycle is in flight.
    pub async fn wait_until_settled(&self) {
        loop {
            let notified = self.shared.landed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.phase() != ScanPhase::Analyzing {
                return;
            }
            notified.await;
        }
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        self.shared.session().snapshot()
    }

    pub fn phase(&self) -> ScanPhase {
        self.shared.session().phase
    }

    pub fn is_running(&self) -> bool {
        self.shared.session().running
    }

    pub fn last_result(&self) -> Option<PredictionResult> {
        self.shared.session().last_result.clone()
    }
}

impl Drop for LiveScanController {
    fn drop(&mut self) {
        self.dispose();
    }
}
