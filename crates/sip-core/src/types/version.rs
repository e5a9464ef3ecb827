use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// SIP protocol version carried in start lines (`SIP/2.0`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    major: u8,
    minor: u8,
}

impl Version {
    /// Creates a version from its major and minor numbers
    pub const fn new(major: u8, minor: u8) -> Self {
        Version { major, minor }
    }

    /// SIP/2.0, the only version this stack speaks
    pub const fn sip_2_0() -> Self {
        Version::new(2, 0)
    }

    pub fn major(&self) -> u8 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }
}

impl Default for Version {
    fn default() -> Self {
        Version::sip_2_0()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIP/{}.{}", self.major, self.minor)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .get(..4)
            .filter(|prefix| prefix.eq_ignore_ascii_case("SIP/"))
            .and_then(|_| s.get(4..))
            .ok_or_else(|| Error::ParseError(format!("Invalid SIP version: {}", s)))?;
        let (major, minor) = rest
            .split_once('.')
            .ok_or_else(|| Error::ParseError(format!("Invalid SIP version: {}", s)))?;
        let major = major
            .parse::<u8>()
            .map_err(|_| Error::ParseError(format!("Invalid SIP version: {}", s)))?;
        let minor = minor
            .parse::<u8>()
            .map_err(|_| Error::ParseError(format!("Invalid SIP version: {}", s)))?;
        Ok(Version::new(major, minor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display_and_parse() {
        assert_eq!(Version::sip_2_0().to_string(), "SIP/2.0");
        assert_eq!("SIP/2.0".parse::<Version>().unwrap(), Version::sip_2_0());
        assert_eq!("sip/2.0".parse::<Version>().unwrap(), Version::new(2, 0));
    }

    #[test]
    fn test_invalid_versions() {
        assert!("HTTP/1.1".parse::<Version>().is_err());
        assert!("SIP/2".parse::<Version>().is_err());
        assert!("SIP/a.b".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }
}
