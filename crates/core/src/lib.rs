//! Orchestration, configuration, and exit-code surface for the capture
//! client: authorizes a stream over the control channel, opens the data
//! connections, and drives the reassembly pipeline to completion.
//!
//! # Overview
//! [`orchestrator::run_transfer`] is the real entry point: it calls
//! `transport::ControlClient::get`, writes the PCAP global header, spawns
//! one pinned [`engine::run_receiver`] worker per data connection, and runs
//! [`engine::Merger`] until end-of-stream or the idle watchdog fires.
//! [`orchestrator::list_streams`] wraps the `LIST` half of the control
//! channel. [`orchestrator::test_stream`] drives the same merge pipeline
//! from a synthetic local producer, for exercising the client without a
//! live appliance.
//!
//! # Design
//! [`config::OrchestratorConfig`] collects every tunable the design calls
//! out, each defaulted to the appliance's own numbers, so a bare CLI
//! invocation reproduces the appliance's original behavior.

pub mod config;
pub mod exit_code;
pub mod orchestrator;

pub use config::OrchestratorConfig;
pub use exit_code::ExitCode;
pub use orchestrator::{list_streams, run_transfer, test_stream, OrchestratorError, TransferSummary};
