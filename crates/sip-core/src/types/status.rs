//! # SIP Status Codes
//!
//! Status codes from [RFC 3261 Section 21](https://datatracker.ietf.org/doc/html/rfc3261#section-21)
//! and the extensions a user agent commonly meets.
//!
//! - `1xx`: Provisional
//! - `2xx`: Success
//! - `3xx`: Redirection
//! - `4xx`: Client Error
//! - `5xx`: Server Error
//! - `6xx`: Global Failure
//!
//! Codes without a named variant are carried as [`StatusCode::Other`], so any
//! value in 100-699 is representable.
//!
//! ```rust
//! use sipflow_sip_core::types::StatusCode;
//!
//! let status = StatusCode::from_u16(486).unwrap();
//! assert_eq!(status, StatusCode::BusyHere);
//! assert_eq!(status.reason_phrase(), "Busy Here");
//! assert!(status.is_final());
//!
//! let custom = StatusCode::from_u16(499).unwrap();
//! assert_eq!(custom, StatusCode::Other(499));
//! assert!(StatusCode::from_u16(99).is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

macro_rules! status_codes {
    ($( $(#[$doc:meta])* $name:ident = $code:literal, $reason:literal; )+) => {
        /// SIP response status code
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum StatusCode {
            $( $(#[$doc])* $name, )+
            /// Any other code in 100-699
            Other(u16),
        }

        impl StatusCode {
            /// Creates a status code from its numeric value.
            ///
            /// Fails with [`Error::InvalidStatusCode`] outside 100-699.
            pub fn from_u16(code: u16) -> Result<Self> {
                match code {
                    $( $code => Ok(StatusCode::$name), )+
                    100..=699 => Ok(StatusCode::Other(code)),
                    _ => Err(Error::InvalidStatusCode(code)),
                }
            }

            /// Numeric value of the code
            pub fn as_u16(&self) -> u16 {
                match self {
                    $( StatusCode::$name => $code, )+
                    StatusCode::Other(code) => *code,
                }
            }

            /// Default reason phrase for the code
            pub fn reason_phrase(&self) -> &'static str {
                match self {
                    $( StatusCode::$name => $reason, )+
                    StatusCode::Other(code) => match code / 100 {
                        1 => "Provisional",
                        2 => "Success",
                        3 => "Redirection",
                        4 => "Client Error",
                        5 => "Server Error",
                        _ => "Global Failure",
                    },
                }
            }
        }
    };
}

status_codes! {
    Trying = 100, "Trying";
    Ringing = 180, "Ringing";
    CallIsBeingForwarded = 181, "Call Is Being Forwarded";
    Queued = 182, "Queued";
    SessionProgress = 183, "Session Progress";
    EarlyDialogTerminated = 199, "Early Dialog Terminated";

    Ok = 200, "OK";
    Accepted = 202, "Accepted";
    NoNotification = 204, "No Notification";

    MultipleChoices = 300, "Multiple Choices";
    MovedPermanently = 301, "Moved Permanently";
    MovedTemporarily = 302, "Moved Temporarily";
    UseProxy = 305, "Use Proxy";
    AlternativeService = 380, "Alternative Service";

    BadRequest = 400, "Bad Request";
    Unauthorized = 401, "Unauthorized";
    PaymentRequired = 402, "Payment Required";
    Forbidden = 403, "Forbidden";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    NotAcceptable = 406, "Not Acceptable";
    ProxyAuthenticationRequired = 407, "Proxy Authentication Required";
    RequestTimeout = 408, "Request Timeout";
    Gone = 410, "Gone";
    RequestEntityTooLarge = 413, "Request Entity Too Large";
    RequestUriTooLong = 414, "Request-URI Too Long";
    UnsupportedMediaType = 415, "Unsupported Media Type";
    UnsupportedUriScheme = 416, "Unsupported URI Scheme";
    BadExtension = 420, "Bad Extension";
    ExtensionRequired = 421, "Extension Required";
    IntervalTooBrief = 423, "Interval Too Brief";
    TemporarilyUnavailable = 480, "Temporarily Unavailable";
    CallOrTransactionDoesNotExist = 481, "Call/Transaction Does Not Exist";
    LoopDetected = 482, "Loop Detected";
    TooManyHops = 483, "Too Many Hops";
    AddressIncomplete = 484, "Address Incomplete";
    Ambiguous = 485, "Ambiguous";
    BusyHere = 486, "Busy Here";
    RequestTerminated = 487, "Request Terminated";
    NotAcceptableHere = 488, "Not Acceptable Here";
    BadEvent = 489, "Bad Event";
    RequestPending = 491, "Request Pending";
    Undecipherable = 493, "Undecipherable";

    ServerInternalError = 500, "Server Internal Error";
    NotImplemented = 501, "Not Implemented";
    BadGateway = 502, "Bad Gateway";
    ServiceUnavailable = 503, "Service Unavailable";
    ServerTimeout = 504, "Server Time-out";
    VersionNotSupported = 505, "Version Not Supported";
    MessageTooLarge = 513, "Message Too Large";

    BusyEverywhere = 600, "Busy Everywhere";
    Decline = 603, "Decline";
    DoesNotExistAnywhere = 604, "Does Not Exist Anywhere";
    NotAcceptableGlobal = 606, "Not Acceptable";
}

impl StatusCode {
    /// 1xx
    pub fn is_provisional(&self) -> bool {
        (100..200).contains(&self.as_u16())
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.as_u16())
    }

    /// 3xx
    pub fn is_redirection(&self) -> bool {
        (300..400).contains(&self.as_u16())
    }

    /// 4xx
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// 5xx
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.as_u16())
    }

    /// 6xx
    pub fn is_global_failure(&self) -> bool {
        (600..700).contains(&self.as_u16())
    }

    /// Any 2xx-6xx response ends a transaction
    pub fn is_final(&self) -> bool {
        self.as_u16() >= 200
    }

    /// 3xx-6xx
    pub fn is_error(&self) -> bool {
        self.as_u16() >= 300
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

impl FromStr for StatusCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.len() != 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::ParseError(format!("Invalid status code: {}", s)));
        }
        let code = s
            .parse::<u16>()
            .map_err(|e| Error::ParseError(format!("Invalid status code: {}", e)))?;
        StatusCode::from_u16(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_codes() {
        assert_eq!(StatusCode::from_u16(200).unwrap(), StatusCode::Ok);
        assert_eq!(StatusCode::from_u16(481).unwrap(), StatusCode::CallOrTransactionDoesNotExist);
        assert_eq!(StatusCode::RequestTerminated.as_u16(), 487);
        assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    }

    #[test]
    fn test_classes() {
        assert!(StatusCode::Trying.is_provisional());
        assert!(!StatusCode::Trying.is_final());
        assert!(StatusCode::Accepted.is_success());
        assert!(StatusCode::MovedTemporarily.is_redirection());
        assert!(StatusCode::MovedTemporarily.is_error());
        assert!(StatusCode::NotFound.is_client_error());
        assert!(StatusCode::ServiceUnavailable.is_server_error());
        assert!(StatusCode::Decline.is_global_failure());
        assert!(StatusCode::Other(699).is_final());
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(StatusCode::from_u16(700), Err(Error::InvalidStatusCode(700)));
        assert_eq!(StatusCode::from_u16(0), Err(Error::InvalidStatusCode(0)));
    }

    #[test]
    fn test_from_str() {
        assert_eq!("180".parse::<StatusCode>().unwrap(), StatusCode::Ringing);
        assert_eq!("299".parse::<StatusCode>().unwrap(), StatusCode::Other(299));
        assert!("20".parse::<StatusCode>().is_err());
        assert!("2000".parse::<StatusCode>().is_err());
        assert!("+20".parse::<StatusCode>().is_err());
    }
}
