//! Operator-facing events published by the control loop.
//!
//! The loop never blocks on observers: the channel is unbounded and a
//! disconnected receiver is ignored.

use crossbeam_channel::{Receiver, Sender, unbounded};
use pump_traits::PumpId;

use crate::error::{FaultCause, PumpError};
use crate::supervisor::SupervisorMode;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlEvent {
    PumpStarted(PumpId),
    PumpStopped(PumpId),
    CurrentReading { pump: PumpId, amps: f32 },
    TemperatureReading { pump: PumpId, celsius: i32 },
    Faulted { pump: PumpId, cause: FaultCause },
    /// The arbiter selected a pump whose fault latch is set.
    StartRefused(PumpId),
    /// A recoverable read failure; the reading was skipped.
    SensorError { pump: Option<PumpId>, error: PumpError },
    /// A rising edge of the float switch.
    CycleStarted { cycle: u64 },
    ModeChanged(SupervisorMode),
    FaultReset(PumpId),
}

#[derive(Debug, Default, Clone)]
pub struct EventSink {
    tx: Option<Sender<ControlEvent>>,
}

impl EventSink {
    /// Attach a fresh channel and return its receiving end. Replaces any
    /// previous subscriber.
    pub fn subscribe(&mut self) -> Receiver<ControlEvent> {
        let (tx, rx) = unbounded();
        self.tx = Some(tx);
        rx
    }

    pub fn emit(&self, event: ControlEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }
}
