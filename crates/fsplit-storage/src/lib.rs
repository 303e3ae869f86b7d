//! S3 object store client.
//!
//! This crate provides:
//! - The `ObjectStore` trait the pipeline works against
//! - An `aws-sdk-s3` implementation with explicit, startup-loaded config
//! - An error taxonomy that separates missing/forbidden objects from
//!   transient transport failures

pub mod client;
pub mod error;

pub use client::{ObjectStore, S3Config, S3ObjectStore};
pub use error::{StorageError, StorageResult};
