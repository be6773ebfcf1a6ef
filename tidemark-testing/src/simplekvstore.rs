//! In-memory [tidemark_shared::kv::KVStore] with failure and latency injection, to exercise how
//! collectors react when their watermark storage misbehaves.
//!
//! ```ignore
//! let store = SimpleKVStore::new("watermarks");
//! store.error_injector().fail_gets(1);
//! assert!(store.get("harfanglab.default").await.is_err());
//! assert!(store.get("harfanglab.default").await.unwrap().is_none());
//! ```

mod error;
mod error_injector;
mod store;

pub use error::{KVOp, Result, SimpleKVStoreError};
pub use error_injector::KVErrorInjector;
pub use store::SimpleKVStore;
