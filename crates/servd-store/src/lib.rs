//! servd-store: Spec retrieval and model staging
//!
//! This crate provides storage functionality:
//! - API spec retrieval from a local cache or an S3 bucket
//! - Model tree staging into the serving model directory

pub mod source;
pub mod tree;

pub use source::{SpecSource, StorageSpecSource};
pub use tree::{ModelTree, StageReport};
