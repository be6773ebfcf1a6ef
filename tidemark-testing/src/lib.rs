//! Test doubles shared by the tidemark crates.

pub mod simplekvstore;
