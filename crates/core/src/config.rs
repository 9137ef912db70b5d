use std::time::Duration;

/// Every knob the orchestrator needs to open connections, size the pool and
/// queues, and drive the async writer, gathered in one place so a bare CLI
/// invocation reproduces the appliance's own defaults.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of data connections to open, one receiver worker each.
    pub connection_count: usize,
    /// Core id to pin each receiver worker to, indexed by worker id. `None`
    /// leaves the worker unpinned.
    pub cpu_affinity_list: Option<Vec<usize>>,
    /// `io_uring` submission queue depth for the async writer.
    pub submit_depth: u32,
    /// Number of chunks in the shared pool.
    pub chunk_pool_size: usize,
    /// Depth of each per-worker SPSC queue, in chunks.
    pub queue_depth: usize,
    /// Number of staging buffers in the async writer's ring.
    pub write_ring_depth: usize,
    /// Size of the disk sink's staging accumulator, in bytes.
    pub staging_buffer_bytes: usize,
    /// Base port for the control channel; worker 0 connects to
    /// `control_port_base + worker_id`.
    pub control_port_base: u16,
    /// Base port for data connections; worker `i` connects to
    /// `data_port_base + i`.
    pub data_port_base: u16,
    /// How long the merger may go without progress before the idle watchdog
    /// aborts the transfer.
    pub idle_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            connection_count: 4,
            cpu_affinity_list: None,
            submit_depth: 4096,
            chunk_pool_size: 1024,
            queue_depth: 256,
            write_ring_depth: 16,
            staging_buffer_bytes: 1024 * 1024,
            control_port_base: 10000,
            data_port_base: 10010,
            idle_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::OrchestratorConfig;

    #[test]
    fn defaults_match_the_appliance() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.connection_count, 4);
        assert_eq!(config.submit_depth, 4096);
        assert_eq!(config.chunk_pool_size, 1024);
        assert_eq!(config.write_ring_depth, 16);
        assert_eq!(config.staging_buffer_bytes, 1024 * 1024);
        assert_eq!(config.control_port_base, 10000);
        assert_eq!(config.data_port_base, 10010);
        assert_eq!(config.idle_timeout.as_secs(), 10);
    }
}
