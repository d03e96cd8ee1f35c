//! Console host - logs every dispatch and forwards raw events to a sink

use anyhow::Result;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::Host;
use crate::catalog::Catalog;
use crate::config::HostConfig;
use crate::midi::format_hex;

/// Destination for raw MIDI bytes (an output port, a log, a test recorder)
pub trait RawSink: Send + Sync {
    fn send(&self, data: &[u8]) -> Result<()>;
}

/// Sink that only logs raw bytes, used when no output port is open
pub struct LogSink;

impl RawSink for LogSink {
    fn send(&self, data: &[u8]) -> Result<()> {
        info!("↪ raw {}", format_hex(data));
        Ok(())
    }
}

/// ConsoleHost prints all dispatched values to the log
///
/// This is useful for:
/// - Trying out a layout without a plugin host attached
/// - Watching modifiers swap targets live
/// - Forwarding the original CCs to a downstream port
pub struct ConsoleHost {
    /// Target names that accept values
    addressable: HashSet<String>,
    /// Where raw events go
    sink: Box<dyn RawSink>,
    /// Dispatch counter for debugging
    dispatch_count: AtomicU64,
}

impl ConsoleHost {
    pub fn new(addressable: impl IntoIterator<Item = String>, sink: Box<dyn RawSink>) -> Self {
        Self {
            addressable: addressable.into_iter().collect(),
            sink,
            dispatch_count: AtomicU64::new(0),
        }
    }

    /// Build the addressable set from configuration: either the explicit
    /// list, or every target the catalog knows about
    pub fn from_config(config: &HostConfig, catalog: &Catalog, sink: Box<dyn RawSink>) -> Self {
        let mut addressable: HashSet<String> = config.targets.iter().cloned().collect();
        if config.all_catalog_targets {
            addressable.extend(catalog.target_names());
        }
        info!("🔌 Console host ready with {} addressable targets", addressable.len());
        Self {
            addressable,
            sink,
            dispatch_count: AtomicU64::new(0),
        }
    }

    pub fn dispatch_count(&self) -> u64 {
        self.dispatch_count.load(Ordering::Relaxed)
    }

    pub fn addressable_count(&self) -> usize {
        self.addressable.len()
    }
}

impl Host for ConsoleHost {
    fn is_target_addressable(&self, target: &str) -> bool {
        self.addressable.contains(target)
    }

    fn dispatch(&self, target: &str, value: f64) {
        let exec_num = self.dispatch_count.fetch_add(1, Ordering::Relaxed) + 1;

        info!(
            "🎛️  [{}] Target:{} Value:{:.1} [#{}]",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            target,
            value * 100.0,
            exec_num
        );

        debug!(target_name = target, value, exec_count = exec_num, "ConsoleHost dispatch");
    }

    fn forward_raw(&self, raw: &[u8]) {
        if let Err(e) = self.sink.send(raw) {
            warn!("Failed to forward raw event {}: {}", format_hex(raw), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Capture(Arc<Mutex<Vec<Vec<u8>>>>);

    impl RawSink for Capture {
        fn send(&self, data: &[u8]) -> Result<()> {
            self.0.lock().push(data.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_addressable_targets() {
        let host = ConsoleHost::new(vec!["1: Knob1".to_string()], Box::new(LogSink));

        assert!(host.is_target_addressable("1: Knob1"));
        assert!(!host.is_target_addressable("2: Fader1"));
    }

    #[test]
    fn test_dispatch_counts() {
        let host = ConsoleHost::new(vec!["Cutoff".to_string()], Box::new(LogSink));
        host.dispatch("Cutoff", 0.5);
        host.dispatch("Cutoff", 0.25);

        assert_eq!(host.dispatch_count(), 2);
    }

    #[test]
    fn test_forward_raw_reaches_sink() {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let host = ConsoleHost::new(Vec::new(), Box::new(Capture(captured.clone())));

        host.forward_raw(&[0xB0, 31, 64]);
        assert_eq!(captured.lock().as_slice(), [vec![0xB0, 31, 64]]);
    }
}
