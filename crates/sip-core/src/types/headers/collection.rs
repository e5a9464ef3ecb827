use std::fmt;

use serde::{Deserialize, Serialize};

use super::header_name::HeaderName;

/// Ordered header collection
///
/// Each entry is one header value. Repeated headers and comma-separated list
/// elements are stored as separate entries in wire order, which keeps the
/// relative order of Via, Route and Record-Route values intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers {
    entries: Vec<(HeaderName, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Headers { entries: Vec::new() }
    }

    /// Appends a value after all existing entries
    pub fn push(&mut self, name: HeaderName, value: impl Into<String>) {
        self.entries.push((name, value.into()));
    }

    /// First value for the name
    pub fn get(&self, name: &HeaderName) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values for the name, in order
    pub fn get_all<'a>(&'a self, name: &'a HeaderName) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &HeaderName) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Replaces every value for the name with a single one, keeping the
    /// position of the first occurrence; appends when absent.
    pub fn set(&mut self, name: HeaderName, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter().position(|(n, _)| *n == name) {
            Some(pos) => {
                self.entries[pos].1 = value;
                let mut index = 0;
                self.entries.retain(|(n, _)| {
                    let keep = index <= pos || *n != name;
                    index += 1;
                    keep
                });
            }
            None => self.entries.push((name, value)),
        }
    }

    /// Inserts a value ahead of the existing values of the same name, or at
    /// the top of the collection when there are none (used for Via).
    pub fn insert_first(&mut self, name: HeaderName, value: impl Into<String>) {
        let pos = self
            .entries
            .iter()
            .position(|(n, _)| *n == name)
            .unwrap_or(0);
        self.entries.insert(pos, (name, value.into()));
    }

    /// Removes the first value for the name
    pub fn remove_first(&mut self, name: &HeaderName) -> Option<String> {
        let pos = self.entries.iter().position(|(n, _)| n == name)?;
        Some(self.entries.remove(pos).1)
    }

    /// Removes all values for the name, returning how many were dropped
    pub fn remove(&mut self, name: &HeaderName) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| n != name);
        before - self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HeaderName, &str)> {
        self.entries.iter().map(|(n, v)| (n, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{}: {}\r\n", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Headers {
        let mut headers = Headers::new();
        headers.push(HeaderName::Via, "SIP/2.0/UDP a;branch=z9hG4bK1");
        headers.push(HeaderName::Via, "SIP/2.0/UDP b;branch=z9hG4bK2");
        headers.push(HeaderName::CallId, "abc");
        headers.push(HeaderName::Route, "<sip:p1;lr>");
        headers.push(HeaderName::Route, "<sip:p2;lr>");
        headers
    }

    #[test]
    fn test_order_is_preserved() {
        let headers = sample();
        let vias: Vec<_> = headers.get_all(&HeaderName::Via).collect();
        assert_eq!(vias, vec!["SIP/2.0/UDP a;branch=z9hG4bK1", "SIP/2.0/UDP b;branch=z9hG4bK2"]);
        assert_eq!(headers.get(&HeaderName::Route), Some("<sip:p1;lr>"));
    }

    #[test]
    fn test_set_collapses_to_first_position() {
        let mut headers = sample();
        headers.set(HeaderName::Via, "SIP/2.0/TCP c");
        let names: Vec<_> = headers.iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(
            names,
            vec![HeaderName::Via, HeaderName::CallId, HeaderName::Route, HeaderName::Route]
        );
        assert_eq!(headers.get(&HeaderName::Via), Some("SIP/2.0/TCP c"));
    }

    #[test]
    fn test_insert_first() {
        let mut headers = sample();
        headers.insert_first(HeaderName::Via, "SIP/2.0/UDP top");
        assert_eq!(headers.get(&HeaderName::Via), Some("SIP/2.0/UDP top"));

        let mut empty = Headers::new();
        empty.push(HeaderName::CallId, "x");
        empty.insert_first(HeaderName::Via, "SIP/2.0/UDP only");
        assert_eq!(empty.iter().next().map(|(n, _)| n.clone()), Some(HeaderName::Via));
    }

    #[test]
    fn test_remove() {
        let mut headers = sample();
        assert_eq!(headers.remove_first(&HeaderName::Via).as_deref(), Some("SIP/2.0/UDP a;branch=z9hG4bK1"));
        assert_eq!(headers.remove(&HeaderName::Route), 2);
        assert_eq!(headers.len(), 2);
    }
}
