//! Filepipe Storage Library
//!
//! Blob storage for uploaded file bytes. A file's storage location is an opaque
//! key handed out by [`Storage::upload`]; the record store keeps it and the worker
//! streams the bytes back through [`Storage::download_stream`].
//!
//! # Storage key format
//!
//! `files/{owner_id}/{uuid}_{sanitized filename}`. Keys must not contain `..` or a
//! leading `/`.

pub(crate) mod keys;
pub mod local;
pub mod traits;

pub use local::LocalStorage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
