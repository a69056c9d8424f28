//! skypost domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `usecases`: Application use cases / business logic
//! - `policy`: Tag normalization and item filtering rules

pub mod model;
pub mod policy;
pub mod ports;
pub mod usecases;

pub use model::*;
pub use ports::*;

use md5::{Digest, Md5};

/// Compute the dedup key for a feed entry (hex MD5 of the trimmed link)
pub fn link_hash(link: &str) -> String {
    format!("{:x}", Md5::digest(link.trim().as_bytes()))
}
