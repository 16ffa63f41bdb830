//! Core monitoring logic.
//!
//! This module contains the activity event model, the idle state machine
//! and the monitor that drives them with timers.

pub mod activity;
pub mod inactivity;
pub mod state;

pub use activity::*;
pub use inactivity::*;
pub use state::{format_countdown, ActivityOutcome, IdleCheck, Phase, SessionState};
