//! Commonly used types in one import.

pub use crate::builder::{SimpleRequestBuilder, SimpleResponseBuilder};
pub use crate::error::{Error, Result};
pub use crate::parser::{parse, parse_message, ParseRule, ParsedValue};
pub use crate::types::{
    Address, CSeq, HeaderAccess, HeaderName, Headers, Host, Message, Method, Param, Params,
    Request, Response, Scheme, StatusCode, Uri, Version, Via, BRANCH_MAGIC_COOKIE,
};
