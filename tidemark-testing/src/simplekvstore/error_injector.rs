use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use super::error::{KVOp, Result, SimpleKVStoreError};

/// Makes a [super::SimpleKVStore] misbehave on demand, per operation.
///
/// Shared between clones of the store, so a test keeps a handle on it while the collector under
/// test owns the store.
#[derive(Debug, Default)]
pub struct KVErrorInjector {
    keys: OpFaults,
    get: OpFaults,
    put: OpFaults,
    delete: OpFaults,
    /// Fails every operation until cleared.
    unavailable: AtomicBool,
}

#[derive(Debug, Default)]
struct OpFaults {
    /// Remaining calls to fail.
    fail_next: AtomicUsize,
    latency_us: AtomicU64,
    /// Calls seen, failed ones included.
    calls: AtomicUsize,
}

impl KVErrorInjector {
    pub fn new() -> Self {
        Self::default()
    }

    fn faults(&self, op: KVOp) -> &OpFaults {
        match op {
            KVOp::Keys => &self.keys,
            KVOp::Get => &self.get,
            KVOp::Put => &self.put,
            KVOp::Delete => &self.delete,
        }
    }

    /// Fails the next `count` calls of `op`.
    pub fn fail_next(&self, op: KVOp, count: usize) {
        self.faults(op).fail_next.store(count, Ordering::Relaxed);
    }

    pub fn fail_gets(&self, count: usize) {
        self.fail_next(KVOp::Get, count);
    }

    pub fn fail_puts(&self, count: usize) {
        self.fail_next(KVOp::Put, count);
    }

    /// Delays every call of `op` before it runs.
    pub fn set_latency(&self, op: KVOp, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.faults(op).latency_us.store(micros, Ordering::Relaxed);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Relaxed);
    }

    /// Drops every pending failure and latency. Call counts are kept.
    pub fn clear(&self) {
        for op in KVOp::ALL {
            self.fail_next(op, 0);
            self.set_latency(op, Duration::ZERO);
        }
        self.set_unavailable(false);
    }

    pub fn calls(&self, op: KVOp) -> usize {
        self.faults(op).calls.load(Ordering::Relaxed)
    }

    /// Runs the injected behaviour of one `op` call against the store named `store`.
    pub(crate) async fn intercept(&self, op: KVOp, store: &'static str) -> Result<()> {
        let faults = self.faults(op);
        faults.calls.fetch_add(1, Ordering::Relaxed);

        let micros = faults.latency_us.load(Ordering::Relaxed);
        if micros > 0 {
            tokio::time::sleep(Duration::from_micros(micros)).await;
        }

        if self.unavailable.load(Ordering::Relaxed) {
            return Err(SimpleKVStoreError::Unavailable(store));
        }
        let pending = faults
            .fail_next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if pending {
            return Err(SimpleKVStoreError::Injected(op));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    #[tokio::test]
    async fn test_nothing_injected_by_default() {
        let injector = KVErrorInjector::new();
        for op in KVOp::ALL {
            assert!(injector.intercept(op, "test").await.is_ok());
            assert_eq!(injector.calls(op), 1);
        }
    }

    #[tokio::test]
    async fn test_failures_count_down_per_op() {
        let injector = KVErrorInjector::new();
        injector.fail_next(KVOp::Keys, 2);
        injector.fail_puts(1);

        assert_eq!(
            injector.intercept(KVOp::Keys, "test").await,
            Err(SimpleKVStoreError::Injected(KVOp::Keys))
        );
        // other operations are untouched
        assert!(injector.intercept(KVOp::Get, "test").await.is_ok());
        assert!(injector.intercept(KVOp::Keys, "test").await.is_err());
        assert!(injector.intercept(KVOp::Keys, "test").await.is_ok());

        assert!(injector.intercept(KVOp::Put, "test").await.is_err());
        assert!(injector.intercept(KVOp::Put, "test").await.is_ok());
        assert_eq!(injector.calls(KVOp::Keys), 3);
    }

    #[tokio::test]
    async fn test_unavailable_until_cleared() {
        let injector = KVErrorInjector::new();
        injector.set_unavailable(true);
        injector.fail_gets(5);

        for _ in 0..3 {
            assert_eq!(
                injector.intercept(KVOp::Delete, "watermarks").await,
                Err(SimpleKVStoreError::Unavailable("watermarks"))
            );
        }

        injector.clear();
        assert!(injector.intercept(KVOp::Get, "watermarks").await.is_ok());
        assert_eq!(injector.calls(KVOp::Delete), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency() {
        let injector = KVErrorInjector::new();
        injector.set_latency(KVOp::Put, Duration::from_millis(50));

        let start = Instant::now();
        injector.intercept(KVOp::Get, "test").await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);

        injector.intercept(KVOp::Put, "test").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(50));
    }
}
