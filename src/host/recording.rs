//! Host that records everything it receives, for tests

use parking_lot::Mutex;
use std::collections::HashSet;

use super::Host;

#[derive(Default)]
pub(crate) struct RecordingHost {
    addressable: HashSet<String>,
    pub dispatched: Mutex<Vec<(String, f64)>>,
    pub forwarded: Mutex<Vec<Vec<u8>>>,
}

impl RecordingHost {
    pub fn with_targets<I, S>(targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addressable: targets.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn last_dispatch(&self) -> Option<(String, f64)> {
        self.dispatched.lock().last().cloned()
    }

    pub fn dispatch_count(&self) -> usize {
        self.dispatched.lock().len()
    }

    pub fn forward_count(&self) -> usize {
        self.forwarded.lock().len()
    }
}

impl Host for RecordingHost {
    fn is_target_addressable(&self, target: &str) -> bool {
        self.addressable.contains(target)
    }

    fn dispatch(&self, target: &str, value: f64) {
        self.dispatched.lock().push((target.to_string(), value));
    }

    fn forward_raw(&self, raw: &[u8]) {
        self.forwarded.lock().push(raw.to_vec());
    }
}
