use std::fmt;

use serde::{Deserialize, Serialize};
use sipflow_sip_core::{HeaderAccess, Request, Response};

/// Dialog identity: Call-ID plus both tags, seen from this endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DialogId {
    pub call_id: String,
    pub local_tag: String,
    pub remote_tag: String,
}

impl DialogId {
    pub fn new(
        call_id: impl Into<String>,
        local_tag: impl Into<String>,
        remote_tag: impl Into<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            local_tag: local_tag.into(),
            remote_tag: remote_tag.into(),
        }
    }

    /// Dialog an inbound request belongs to; `None` without a To tag
    pub fn for_inbound_request(request: &Request) -> Option<Self> {
        Some(Self::new(
            request.call_id()?,
            request.to_tag()?,
            request.from_tag()?,
        ))
    }

    /// Dialog a response to one of our requests belongs to
    pub fn for_response(response: &Response) -> Option<Self> {
        Some(Self::new(
            response.call_id()?,
            response.from_tag()?,
            response.to_tag()?,
        ))
    }
}

impl fmt::Display for DialogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};local={};remote={}", self.call_id, self.local_tag, self.remote_tag)
    }
}
