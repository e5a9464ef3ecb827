//! Header names, the ordered header collection, and typed accessors.

pub mod access;
pub mod collection;
pub mod header_name;

pub use access::HeaderAccess;
pub use collection::Headers;
pub use header_name::HeaderName;
