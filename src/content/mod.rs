//! Per-file content analysis
//!
//! - Extension categories and size/age buckets
//! - Content hashing for the `FileHash` column
//! - MIME sniffing from bytes already read for hashing

pub mod categorize;
pub mod checksum;
pub mod filetype;

pub use categorize::{age_bucket, size_bucket, split_extension, FileCategory};
pub use checksum::content_digest;
pub use filetype::sniff_content_type;
