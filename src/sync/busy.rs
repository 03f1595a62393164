//! Process-wide busy flag

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Counts store operations in flight across every collection.
///
/// Clones share the counter. The flag reads busy while any guard is alive.
#[derive(Debug, Clone, Default)]
pub struct BusyFlag {
    in_flight: Arc<AtomicUsize>,
}

impl BusyFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight() > 0
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Mark one operation as started; it ends when the guard drops.
    pub fn enter(&self) -> BusyGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        BusyGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

#[derive(Debug)]
pub struct BusyGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guards_nest_and_release() {
        let flag = BusyFlag::new();
        let shared = flag.clone();
        assert!(!flag.is_busy());

        let a = flag.enter();
        let b = shared.enter();
        assert_eq!(flag.in_flight(), 2);

        drop(a);
        assert!(flag.is_busy());
        drop(b);
        assert!(!shared.is_busy());
    }
}
