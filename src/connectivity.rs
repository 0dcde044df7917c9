//! Connectivity probes consulted before every call.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn is_connected(&self) -> bool;
}

/// Probe that always reports a connection. I/O faults are still mapped to
/// `NoConnectivity` when a call actually fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct AssumeConnected;

#[async_trait]
impl ConnectivityProbe for AssumeConnected {
    async fn is_connected(&self) -> bool {
        true
    }
}

/// Connectivity state pushed in by the application (e.g. from a platform
/// network-change callback).
#[derive(Debug)]
pub struct ConnectivityFlag {
    connected: AtomicBool,
}

impl ConnectivityFlag {
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        let was = self.connected.swap(connected, Ordering::Relaxed);
        if was != connected {
            tracing::info!(connected, "connectivity changed");
        }
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConnectivityProbe for ConnectivityFlag {
    async fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}
