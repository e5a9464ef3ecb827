//! Utility functions for the transaction layer
//!
//! - `request_builders` - ACK, CANCEL and core-generated responses
//! - identifier generation for branches, tags and Call-IDs

pub mod request_builders;

use rand::Rng;
use uuid::Uuid;

use sipflow_sip_core::BRANCH_MAGIC_COOKIE;

pub use request_builders::{add_to_tag, create_ack_for_non_2xx, create_cancel, create_response};

/// New RFC 3261 branch parameter
pub fn generate_branch() -> String {
    format!("{}{}", BRANCH_MAGIC_COOKIE, Uuid::new_v4().simple())
}

/// New From/To tag
pub fn generate_tag() -> String {
    let mut rng = rand::thread_rng();
    format!("{:08x}{:08x}", rng.gen::<u32>(), rng.gen::<u32>())
}

/// New Call-ID scoped to `host`
pub fn generate_call_id(host: &str) -> String {
    format!("{}@{}", Uuid::new_v4().simple(), host)
}
