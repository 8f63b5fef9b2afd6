//! Signal driven cancellation of a run.

use std::sync::{Arc, Mutex};

use fleetrun_core::{CoreError, RunPhase};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the run's cancellation token and lifecycle phase.
///
/// Workers get clones of [`CancellationController::token`]. An interrupt
/// cancels the token; each worker then kills its own child, and dispatch
/// returns once all of them have. Cleanup follows on the same path as a
/// normal completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationController {
    token: CancellationToken,
    phase: Arc<Mutex<RunPhase>>,
}

impl CancellationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to hand to dispatch workers.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True once an interrupt has been received.
    pub fn was_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Handle an interrupt. Only the first one while running has an effect.
    pub fn interrupt(&self) -> bool {
        let moved = self.advance(RunPhase::Interrupted).is_ok();
        if moved {
            self.token.cancel();
        }
        moved
    }

    /// Enter cleanup, from either a normal finish or an interrupt.
    pub fn begin_cleanup(&self) -> Result<(), CoreError> {
        self.advance(RunPhase::Cleaning)
    }

    /// Mark the run as exited.
    pub fn finish(&self) -> Result<(), CoreError> {
        self.advance(RunPhase::Exited)
    }

    fn advance(&self, to: RunPhase) -> Result<(), CoreError> {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        *phase = phase.transition(to)?;
        Ok(())
    }

    /// Spawn a task that interrupts the run on SIGINT or SIGTERM.
    ///
    /// Handlers are installed before this returns, so a signal raised right
    /// after the call is already seen.
    pub fn listen_for_signals(&self) -> JoinHandle<()> {
        let controller = self.clone();
        let signals = ShutdownSignals::install();
        tokio::spawn(async move {
            let received = match signals {
                Ok(mut signals) => signals.recv().await,
                Err(e) => Err(e),
            };
            match received {
                Ok(signal) => {
                    if controller.interrupt() {
                        warn!(signal, "Interrupted, killing in-flight commands");
                    } else {
                        info!(signal, "Signal received after dispatch finished");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to install signal handler"),
            }
        })
    }
}

#[cfg(unix)]
struct ShutdownSignals {
    interrupt: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::select! {
            _ = self.interrupt.recv() => Ok("SIGINT"),
            _ = self.terminate.recv() => Ok("SIGTERM"),
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn recv(&mut self) -> std::io::Result<&'static str> {
        tokio::signal::ctrl_c().await.map(|_| "CTRL_C")
    }
}
