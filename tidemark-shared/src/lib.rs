/// Error exposed by the shared library.
pub mod error;

/// Key-value storage used to persist collector watermarks.
pub mod kv;
