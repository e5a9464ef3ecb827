//! Builders for requests and responses constructed programmatically.

mod request;
mod response;

pub use request::SimpleRequestBuilder;
pub use response::SimpleResponseBuilder;
