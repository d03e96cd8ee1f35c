//! EngineActor - single-owner task serializing all engine access
//!
//! Modifier application is a multi-step read-modify-write over the button
//! state and the mapping table, so every event and every query goes through
//! one command channel and is processed to completion before the next.

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace};

use super::{ControlEvent, Engine, EngineSnapshot, RouteOutcome};
use crate::host::HostSettings;

// ============================================================================
// EngineCommand
// ============================================================================

/// Commands for the engine actor
///
/// - **Hot path** (no response): `Event`, used by the MIDI input callback
/// - **Request-response**: queries and updates answered on a oneshot channel
pub enum EngineCommand {
    /// Route one surface event
    Event(ControlEvent),

    /// Route one event and report what happened
    EventWithOutcome {
        event: ControlEvent,
        response: oneshot::Sender<RouteOutcome>,
    },

    /// Current table, buttons and active modifiers
    Snapshot {
        response: oneshot::Sender<EngineSnapshot>,
    },

    /// All buttons off, default mapping restored
    Reset { response: oneshot::Sender<()> },

    /// Replace the live host settings
    ApplySettings { settings: HostSettings },

    /// Change a single host setting
    SetSetting { key: String, value: i64 },

    /// Toggle raw forwarding of mapped events
    SetAlsoForwardRaw(bool),

    /// Stop the actor
    Shutdown,
}

impl fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineCommand::Event(event) => write!(f, "Event({})", event),
            EngineCommand::EventWithOutcome { event, .. } => write!(f, "EventWithOutcome({})", event),
            EngineCommand::Snapshot { .. } => write!(f, "Snapshot"),
            EngineCommand::Reset { .. } => write!(f, "Reset"),
            EngineCommand::ApplySettings { .. } => write!(f, "ApplySettings"),
            EngineCommand::SetSetting { key, value } => write!(f, "SetSetting({}={})", key, value),
            EngineCommand::SetAlsoForwardRaw(enabled) => write!(f, "SetAlsoForwardRaw({})", enabled),
            EngineCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

// ============================================================================
// EngineActor
// ============================================================================

/// Owns the engine and processes commands one at a time
pub struct EngineActor {
    engine: Engine,
    command_rx: mpsc::UnboundedReceiver<EngineCommand>,
}

impl EngineActor {
    /// Spawn the actor on the current runtime and return a handle to it
    pub fn spawn(engine: Engine) -> EngineHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let actor = Self {
            engine,
            command_rx: cmd_rx,
        };
        tokio::spawn(actor.run());

        info!("EngineActor spawned");
        EngineHandle::new(cmd_tx)
    }

    async fn run(mut self) {
        debug!("EngineActor run loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            trace!(?cmd, "Processing command");

            match cmd {
                EngineCommand::Event(event) => {
                    self.engine.handle_event(event);
                }
                EngineCommand::EventWithOutcome { event, response } => {
                    let _ = response.send(self.engine.handle_event(event));
                }
                EngineCommand::Snapshot { response } => {
                    let _ = response.send(self.engine.snapshot());
                }
                EngineCommand::Reset { response } => {
                    self.engine.reset();
                    let _ = response.send(());
                }
                EngineCommand::ApplySettings { settings } => {
                    self.engine.apply_settings(settings);
                }
                EngineCommand::SetSetting { key, value } => {
                    self.engine.set_setting(&key, value);
                }
                EngineCommand::SetAlsoForwardRaw(enabled) => {
                    self.engine.set_also_forward_raw(enabled);
                }
                EngineCommand::Shutdown => {
                    info!("EngineActor received shutdown command");
                    break;
                }
            }
        }

        debug!("EngineActor run loop ended");
    }
}

// ============================================================================
// EngineHandle
// ============================================================================

/// Cloneable handle to the engine actor
///
/// `send_event` is safe to call from the MIDI input thread: it never blocks
/// and does not need a runtime context.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    pub fn new(cmd_tx: mpsc::UnboundedSender<EngineCommand>) -> Self {
        Self { cmd_tx }
    }

    /// Fire-and-forget event routing
    pub fn send_event(&self, event: ControlEvent) {
        let _ = self.cmd_tx.send(EngineCommand::Event(event));
    }

    pub fn apply_settings(&self, settings: HostSettings) {
        let _ = self.cmd_tx.send(EngineCommand::ApplySettings { settings });
    }

    pub fn set_setting(&self, key: impl Into<String>, value: i64) {
        let _ = self.cmd_tx.send(EngineCommand::SetSetting {
            key: key.into(),
            value,
        });
    }

    pub fn set_also_forward_raw(&self, enabled: bool) {
        let _ = self.cmd_tx.send(EngineCommand::SetAlsoForwardRaw(enabled));
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Shutdown);
    }

    /// Route an event and wait for the outcome.
    /// Returns None if the actor has stopped.
    pub async fn route(&self, event: ControlEvent) -> Option<RouteOutcome> {
        let (response_tx, response_rx) = oneshot::channel();
        let cmd = EngineCommand::EventWithOutcome {
            event,
            response: response_tx,
        };

        if self.cmd_tx.send(cmd).is_err() {
            return None;
        }

        response_rx.await.ok()
    }

    pub async fn snapshot(&self) -> Option<EngineSnapshot> {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(EngineCommand::Snapshot {
                response: response_tx,
            })
            .is_err()
        {
            return None;
        }

        response_rx.await.ok()
    }

    /// Reset and wait until it is done
    pub async fn reset(&self) -> bool {
        let (response_tx, response_rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(EngineCommand::Reset {
                response: response_tx,
            })
            .is_err()
        {
            return false;
        }

        response_rx.await.is_ok()
    }
}
