//! # SIP Parameters
//!
//! Parameters attach extra information to URIs (`sip:bob@host;transport=tcp`)
//! and header values (`<sip:bob@host>;tag=1928301774`).
//!
//! Parameter names are case-insensitive and are stored lower-cased. Values are
//! stored exactly as they appeared, including surrounding quotes for quoted
//! strings, so that serialization reproduces the original text.
//!
//! ```rust
//! use sipflow_sip_core::types::{Param, Params};
//!
//! let mut params = Params::new();
//! params.push(Param::new("Tag", Some("a6c85cf")));
//! params.push(Param::flag("lr"));
//!
//! assert_eq!(params.get("tag"), Some("a6c85cf"));
//! assert!(params.contains("LR"));
//! assert_eq!(params.to_string(), ";tag=a6c85cf;lr");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single `name[=value]` parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    name: String,
    value: Option<String>,
}

impl Param {
    /// Creates a parameter, lower-casing its name
    pub fn new(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Param {
            name: name.into().to_ascii_lowercase(),
            value: value.map(Into::into),
        }
    }

    /// Creates a valueless parameter such as `lr`
    pub fn flag(name: impl Into<String>) -> Self {
        Param {
            name: name.into().to_ascii_lowercase(),
            value: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value as it appears on the wire
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.name, value),
            None => f.write_str(&self.name),
        }
    }
}

/// Ordered parameter list, rendered with a leading `;` per entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Params(Vec<Param>);

impl Params {
    pub fn new() -> Self {
        Params(Vec::new())
    }

    pub fn push(&mut self, param: Param) {
        self.0.push(param);
    }

    /// Value of the named parameter; `None` when absent or valueless
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).and_then(Param::value)
    }

    pub fn find(&self, name: &str) -> Option<&Param> {
        self.0.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Replaces the named parameter in place, or appends it
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        let param = Param::new(name, value);
        match self.0.iter_mut().find(|p| p.name.eq_ignore_ascii_case(name)) {
            Some(existing) => *existing = param,
            None => self.0.push(param),
        }
    }

    /// Removes every parameter with this name
    pub fn remove(&mut self, name: &str) {
        self.0.retain(|p| !p.name.eq_ignore_ascii_case(name));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Param>> for Params {
    fn from(params: Vec<Param>) -> Self {
        Params(params)
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for param in &self.0 {
            write!(f, ";{}", param)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_lowercased() {
        let param = Param::new("Branch", Some("z9hG4bK776"));
        assert_eq!(param.name(), "branch");
        assert_eq!(param.value(), Some("z9hG4bK776"));
        assert_eq!(param.to_string(), "branch=z9hG4bK776");
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut params: Params = vec![
            Param::new("a", Some("1")),
            Param::flag("lr"),
            Param::new("b", Some("2")),
        ]
        .into();
        params.set("A", Some("9"));
        params.set("c", None);
        assert_eq!(params.to_string(), ";a=9;lr;b=2;c");
    }

    #[test]
    fn test_remove() {
        let mut params: Params = vec![Param::flag("rport"), Param::new("received", Some("1.2.3.4"))].into();
        params.remove("RPORT");
        assert!(!params.contains("rport"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_quoted_values_kept_verbatim() {
        let param = Param::new("reason", Some("\"Server Unavailable\""));
        assert_eq!(param.to_string(), "reason=\"Server Unavailable\"");
    }
}
