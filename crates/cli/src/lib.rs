//! Command-line front-end for the capture-stream client.
//!
//! # Overview
//! [`run`] parses the surface below with `clap`, builds a
//! `capture_core::OrchestratorConfig`, and dispatches to
//! `transport::control` (via `capture_core::list_streams`/`run_transfer`)
//! or `capture_core::test_stream`.
//!
//! CLI surface: `--list <ip>`, `--get <ip> <stream>`, `--output-stdout`,
//! `--output-file <path>`, `--test <bytes>`, `-q`/`--quiet`, `--help`.
//! Exactly one of `--list`, `--get`, or `--test` must be given.
//!
//! # Non-goals
//! This crate does not expose per-run overrides for connection count, CPU
//! pinning, or the idle timeout; `OrchestratorConfig::default()` is used
//! unconditionally. A future revision may add flags for these.

use std::ffi::OsString;
use std::io::Write;
use std::net::IpAddr;
use std::path::PathBuf;

use capture_core::{list_streams, run_transfer, test_stream, ExitCode, OrchestratorConfig, OrchestratorError};
use clap::error::ErrorKind;
use clap::Parser;
use engine::MergerError;
use fast_io::{DiskSink, Sink, SinkError, StreamSink, WriterConfig};
use logging::Verbosity;

#[derive(Parser, Debug)]
#[command(name = "pcap-fetch", about = "Pull packet captures from an fmadio-style capture appliance")]
struct Args {
    /// List the streams available on the appliance at this address.
    #[arg(long, value_name = "IP")]
    list: Option<IpAddr>,

    /// Authorize and pull STREAM from the appliance at IP.
    #[arg(long, num_args = 2, value_names = ["IP", "STREAM"])]
    get: Option<Vec<String>>,

    /// Run a null disk-write throughput benchmark: write BYTES to the sink
    /// as fast as possible, bypassing the network and the capture pipeline.
    #[arg(long, value_name = "BYTES")]
    test: Option<u64>,

    /// Write the PCAP stream to stdout (the default when `--output-file` is absent).
    #[arg(long)]
    output_stdout: bool,

    /// Write the PCAP stream to this file via direct I/O.
    #[arg(long, value_name = "PATH")]
    output_file: Option<PathBuf>,

    /// Suppress informational output; only warnings and errors are printed.
    #[arg(short = 'q', long)]
    quiet: bool,
}

/// Parses `args` and runs the requested operation, writing informational
/// output to `stdout` and diagnostics to `stderr`.
pub fn run<I, T>(args: I, stdout: &mut impl Write, stderr: &mut impl Write) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let parsed = match Args::try_parse_from(args) {
        Ok(parsed) => parsed,
        Err(err) => {
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let _ = write!(stdout, "{err}");
                    ExitCode::Ok
                }
                _ => {
                    let _ = write!(stderr, "{err}");
                    ExitCode::Usage
                }
            };
        }
    };

    logging::init(if parsed.quiet { Verbosity::Quiet } else { Verbosity::Normal });

    let requested = [parsed.list.is_some(), parsed.get.is_some(), parsed.test.is_some()];
    if requested.iter().filter(|set| **set).count() != 1 {
        let _ = writeln!(stderr, "exactly one of --list, --get, or --test is required");
        return ExitCode::Usage;
    }

    let config = OrchestratorConfig::default();

    if let Some(ip) = parsed.list {
        return match list_streams(ip, &config) {
            Ok(streams) => {
                for stream in streams {
                    let _ = writeln!(stdout, "{stream}");
                }
                ExitCode::Ok
            }
            Err(err) => {
                let _ = writeln!(stderr, "{err}");
                exit_code_for(&err)
            }
        };
    }

    let sink = match build_sink(&parsed, &config) {
        Ok(sink) => sink,
        Err(err) => {
            let _ = writeln!(stderr, "{err}");
            return ExitCode::OutputFailed;
        }
    };

    if let Some(values) = parsed.get {
        let ip: IpAddr = match values[0].parse() {
            Ok(ip) => ip,
            Err(_) => {
                let _ = writeln!(stderr, "invalid IP address: {}", values[0]);
                return ExitCode::Usage;
            }
        };
        return match run_transfer(ip, &values[1], &config, sink) {
            Ok(summary) => {
                let _ = writeln!(
                    stdout,
                    "transferred {} bytes in {:.2}s ({:.1} Mbps)",
                    summary.bytes,
                    summary.duration.as_secs_f64(),
                    summary.throughput_mbps()
                );
                ExitCode::Ok
            }
            Err(err) => {
                let _ = writeln!(stderr, "{err}");
                exit_code_for(&err)
            }
        };
    }

    if let Some(bytes) = parsed.test {
        return match test_stream(bytes, &config, sink) {
            Ok(summary) => {
                let _ = writeln!(
                    stdout,
                    "emitted {} bytes in {:.2}s ({:.1} Mbps)",
                    summary.bytes,
                    summary.duration.as_secs_f64(),
                    summary.throughput_mbps()
                );
                ExitCode::Ok
            }
            Err(err) => {
                let _ = writeln!(stderr, "{err}");
                exit_code_for(&err)
            }
        };
    }

    unreachable!("exactly-one-of check above guarantees one branch ran")
}

/// Maps the process exit status to [`ExitCode`].
#[must_use]
pub fn exit_code_from(code: ExitCode) -> std::process::ExitCode {
    code.to_process_exit_code()
}

fn build_sink(args: &Args, config: &OrchestratorConfig) -> Result<Sink, SinkError> {
    match &args.output_file {
        Some(path) => {
            let writer_config = WriterConfig {
                block_size: engine::CHUNK_PAYLOAD_LEN,
                ring_depth: config.write_ring_depth,
                submit_depth: config.submit_depth,
                histogram_bin_ns: 50_000,
            };
            Ok(Sink::Disk(DiskSink::open(path, writer_config)?))
        }
        None => Ok(Sink::Stream(StreamSink::new())),
    }
}

fn exit_code_for(err: &OrchestratorError) -> ExitCode {
    match err {
        OrchestratorError::Control(_) => ExitCode::ControlFailed,
        OrchestratorError::Io(_) | OrchestratorError::Receiver { .. } | OrchestratorError::WorkerPanicked(_) => {
            ExitCode::ConnectionFailed
        }
        OrchestratorError::Sink(_) => ExitCode::OutputFailed,
        OrchestratorError::Merger(merger_err) => match merger_err {
            MergerError::Idle(_) => ExitCode::Idle,
            MergerError::Sink(_) => ExitCode::OutputFailed,
            MergerError::DuplicateSeqNo(_) => ExitCode::ProtocolViolation,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_runs_the_synthetic_self_test() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(["pcap-fetch", "--test", "4096", "-q"], &mut stdout, &mut stderr);
        assert_eq!(code, ExitCode::Ok);
        assert!(stderr.is_empty());
        let output = String::from_utf8(stdout).unwrap();
        assert!(output.contains("emitted"));
    }

    #[test]
    fn rejects_more_than_one_operation() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(
            ["pcap-fetch", "--test", "10", "--list", "127.0.0.1"],
            &mut stdout,
            &mut stderr,
        );
        assert_eq!(code, ExitCode::Usage);
    }

    #[test]
    fn rejects_no_operation() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let code = run(["pcap-fetch"], &mut stdout, &mut stderr);
        assert_eq!(code, ExitCode::Usage);
    }

    #[test]
    fn duplicate_seq_no_maps_to_protocol_violation_exit_code() {
        let err = OrchestratorError::Merger(MergerError::DuplicateSeqNo(7));
        assert_eq!(exit_code_for(&err), ExitCode::ProtocolViolation);
    }
}
