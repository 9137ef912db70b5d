//! Control-channel client: issues `LIST`/`GET` command frames to the
//! capture appliance and interprets its `END`/`OK`/`NG` responses.
//!
//! # Overview
//! [`ControlClient`] owns one TCP connection to the appliance's control
//! port (worker 0's `10000 + worker_id`). `list` streams back every
//! available capture stream; `get` authorizes the orchestrator to open the
//! data connections for one named stream.
//!
//! # Non-goals
//! This crate does not open the data connections themselves (that is the
//! orchestrator's job once `get` returns `Ok`), and it does not retry a
//! dropped control connection.

mod control;

pub use control::{ControlClient, ControlError, GetOutcome};
