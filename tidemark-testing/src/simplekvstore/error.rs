use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SimpleKVStoreError>;

/// The [tidemark_shared::kv::KVStore] operations failures and latency can be injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KVOp {
    Keys,
    Get,
    Put,
    Delete,
}

impl KVOp {
    pub const ALL: [KVOp; 4] = [KVOp::Keys, KVOp::Get, KVOp::Put, KVOp::Delete];
}

impl fmt::Display for KVOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KVOp::Keys => "keys",
            KVOp::Get => "get",
            KVOp::Put => "put",
            KVOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SimpleKVStoreError {
    #[error("Injected {0} failure")]
    Injected(KVOp),

    #[error("Store {0} is unavailable")]
    Unavailable(&'static str),
}
