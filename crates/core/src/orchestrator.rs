use std::io;
use std::net::{IpAddr, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use engine::{run_receiver, Merger, MergerError, ReceiverError, TransferContext};
use fast_io::{Sink, SinkError};
use protocol::PcapGlobalHeader;
use thiserror::Error;
use tracing::{info, warn};
use transport::{ControlClient, ControlError};

use crate::config::OrchestratorConfig;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    Merger(#[from] MergerError),
    #[error("receiver worker {worker_index} failed: {source}")]
    Receiver {
        worker_index: usize,
        #[source]
        source: ReceiverError,
    },
    #[error("receiver worker {0} thread panicked")]
    WorkerPanicked(usize),
}

/// Outcome of a completed transfer or self-test.
#[derive(Debug, Clone, Copy)]
pub struct TransferSummary {
    pub bytes: u64,
    pub duration: Duration,
}

impl TransferSummary {
    #[must_use]
    pub fn throughput_mbps(&self) -> f64 {
        if self.duration.as_secs_f64() == 0.0 {
            return 0.0;
        }
        (self.bytes as f64 * 8.0) / self.duration.as_secs_f64() / 1_000_000.0
    }
}

/// Authorizes and runs a transfer of `stream_name` from the appliance at
/// `server_ip`, emitting the reassembled PCAP stream to `sink`.
///
/// # Errors
/// Returns [`OrchestratorError::Control`] if the control channel rejects the
/// stream, or a connection/protocol/idle-watchdog error once data
/// connections are open.
pub fn run_transfer(
    server_ip: IpAddr,
    stream_name: &str,
    config: &OrchestratorConfig,
    mut sink: Sink,
) -> Result<TransferSummary, OrchestratorError> {
    let control_addr = SocketAddr::new(server_ip, config.control_port_base);
    let mut control = ControlClient::connect(control_addr)?;
    let outcome = control.get(stream_name)?;
    info!(stream_name, stream_size = outcome.stream_size, "stream authorized");

    sink.write(&PcapGlobalHeader.to_bytes())?;

    let ctx = TransferContext::new(config.connection_count, config.chunk_pool_size, config.queue_depth);
    let start = Instant::now();

    let bytes = thread::scope(|scope| -> Result<u64, OrchestratorError> {
        let mut handles = Vec::with_capacity(config.connection_count);
        for worker_index in 0..config.connection_count {
            let data_addr = SocketAddr::new(server_ip, config.data_port_base + worker_index as u16);
            let connection = TcpStream::connect(data_addr)?;
            connection.set_nodelay(true)?;

            let pin_core = config
                .cpu_affinity_list
                .as_ref()
                .and_then(|list| list.get(worker_index))
                .copied();
            let ctx_ref = &ctx;

            handles.push(scope.spawn(move || {
                if let Some(core_id) = pin_core {
                    pin_current_thread(core_id);
                }
                run_receiver(connection, worker_index, ctx_ref)
            }));
        }

        let merger = Merger::new(&ctx, sink, config.idle_timeout);
        let merger_result = merger.run();

        for (worker_index, handle) in handles.into_iter().enumerate() {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(worker_index, %err, "receiver worker exited with an error");
                    ctx.request_stop();
                    if merger_result.is_ok() {
                        return Err(OrchestratorError::Receiver {
                            worker_index,
                            source: err,
                        });
                    }
                }
                Err(_) => return Err(OrchestratorError::WorkerPanicked(worker_index)),
            }
        }

        Ok(merger_result?)
    })?;

    Ok(TransferSummary {
        bytes,
        duration: start.elapsed(),
    })
}

fn pin_current_thread(core_id: usize) {
    let core_ids = core_affinity::get_core_ids().unwrap_or_default();
    if let Some(id) = core_ids.into_iter().find(|id| id.id == core_id) {
        core_affinity::set_for_current(id);
    } else {
        warn!(core_id, "requested core id not present on this host");
    }
}

/// Lists the streams the appliance currently has available.
///
/// # Errors
/// Returns [`OrchestratorError::Control`] if the connection or listing
/// fails.
pub fn list_streams(server_ip: IpAddr, config: &OrchestratorConfig) -> Result<Vec<String>, OrchestratorError> {
    let control_addr = SocketAddr::new(server_ip, config.control_port_base);
    let mut control = ControlClient::connect(control_addr)?;
    Ok(control.list()?)
}

/// Size of the fixed buffer repeatedly written by [`test_stream`]. Matches
/// the appliance's own null disk-write benchmark's 256 KiB write unit.
const TEST_WRITE_LEN: usize = 256 * 1024;

/// Self-test entry point for `--test <bytes>`: a null disk-write-throughput
/// benchmark, bypassing the network, the chunk pool, and the reassembly
/// pipeline entirely. Repeatedly writes a fixed, non-repeating buffer
/// straight to `sink` until `total_bytes` have been written, then reports
/// throughput the same way a real transfer does.
///
/// # Errors
/// Propagates a sink write failure.
pub fn test_stream(
    total_bytes: u64,
    _config: &OrchestratorConfig,
    mut sink: Sink,
) -> Result<TransferSummary, OrchestratorError> {
    let buffer = test_write_buffer();
    let start = Instant::now();
    let mut written = 0u64;

    while written < total_bytes {
        sink.write(&buffer)?;
        written += buffer.len() as u64;
    }
    sink.close()?;

    Ok(TransferSummary {
        bytes: written,
        duration: start.elapsed(),
    })
}

/// Fills a [`TEST_WRITE_LEN`]-byte buffer with a simple LCG stream so
/// repeated writes aren't collapsed by filesystem or link-layer compression.
fn test_write_buffer() -> Vec<u8> {
    let mut buffer = vec![0u8; TEST_WRITE_LEN];
    let mut rnd: u32 = 0x1234_5678;
    for byte in &mut buffer {
        *byte = (rnd >> 16) as u8;
        rnd = rnd.wrapping_mul(214_013).wrapping_add(2_531_011);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use fast_io::StreamSink;

    #[test]
    fn test_stream_writes_at_least_the_requested_bytes() {
        let config = OrchestratorConfig::default();
        let sink = Sink::Stream(StreamSink::new());
        let summary = test_stream(10_000, &config, sink).unwrap();
        assert!(summary.bytes >= 10_000);
    }

    #[test]
    fn test_write_buffer_is_not_a_single_repeated_byte() {
        let buffer = test_write_buffer();
        assert!(buffer.iter().any(|&b| b != buffer[0]));
    }
}
