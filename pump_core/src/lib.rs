#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Supervisory control of a two-pump lift station (hardware-agnostic).
//!
//! All hardware goes through the `pump_traits` collaborator traits; all
//! delays go through an injected `Clock`.
//!
//! ## Architecture
//!
//! - **SensorReader**: peak current over a sampling window, settled probe
//!   temperature (`sensor`)
//! - **PumpUnit**: relay state, latched fault, last readings (`pump`)
//! - **ModeArbiter**: manual override, float-edge counting, alternation
//!   (`arbiter`)
//! - **FaultSupervisor**: failover to the healthy pump, dual-fault halt
//!   (`supervisor`)
//! - **DisplayPresenter**: centred two-line screens (`display`)
//! - **ControlSystem**: the context that owns all of the above (`control`)
//!
//! ```text
//! tick (Normal):   manual? ──yes──> selected pump
//!                    │no
//!                    └─> float? ──yes──> parity pump ──> measure ──fault──> supervisor
//!                              └─no──> both off, "Waiting..."
//! ```

pub mod arbiter;
pub mod config;
pub mod control;
pub mod conversions;
pub mod display;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod pump;
pub mod sensor;
pub mod station;
pub mod supervisor;

pub use arbiter::ModeArbiter;
pub use config::{CurrentSensing, PumpSpec, TemperatureSensing, Timing};
pub use control::{ControlSystem, ControlSystemBuilder, TickReport};
pub use display::{AlarmPage, DisplayPresenter, OperatingMode, Screen};
pub use error::{BuildError, FaultCause, PumpError, Report, Result};
pub use events::ControlEvent;
pub use pump::{Measurement, PumpState, PumpUnit};
pub use sensor::SensorReader;
pub use supervisor::{FaultSupervisor, SupervisorMode};
