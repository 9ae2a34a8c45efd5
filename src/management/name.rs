//! Structured names: `domain:key1=value1,key2=value2`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ObjectNameError {
    #[error("missing ':' between domain and key properties in `{0}`")]
    MissingSeparator(String),
    #[error("domain `{0}` contains a reserved character")]
    InvalidDomain(String),
    #[error("object name `{0}` has no key properties")]
    NoKeyProperties(String),
    #[error("malformed key property `{0}`")]
    MalformedProperty(String),
    #[error("duplicate key `{0}`")]
    DuplicateKey(String),
}

/// A registry key. Two names are equal when their domains match and they
/// carry the same key properties, in any order.
#[derive(Debug, Clone)]
pub struct ObjectName {
    domain: String,
    properties: Vec<(String, String)>,
}

const RESERVED: &[char] = &[':', ',', '=', '*', '?', '"', '\n'];

impl ObjectName {
    /// Compose `domain` and a `key=value,...` string.
    pub fn new(domain: &str, key_properties: &str) -> Result<Self, ObjectNameError> {
        if domain.contains(RESERVED) {
            return Err(ObjectNameError::InvalidDomain(domain.to_string()));
        }
        if key_properties.trim().is_empty() {
            return Err(ObjectNameError::NoKeyProperties(format!("{domain}:")));
        }

        let mut properties: Vec<(String, String)> = Vec::new();
        for pair in key_properties.split(',') {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| ObjectNameError::MalformedProperty(pair.to_string()))?;
            if key.is_empty() || key.contains(RESERVED) || value.contains(RESERVED) {
                return Err(ObjectNameError::MalformedProperty(pair.to_string()));
            }
            if properties.iter().any(|(k, _)| k == key) {
                return Err(ObjectNameError::DuplicateKey(key.to_string()));
            }
            properties.push((key.to_string(), value.to_string()));
        }

        Ok(Self {
            domain: domain.to_string(),
            properties,
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn key_property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Key properties as written, e.g. `type=Service,name=Main`.
    pub fn key_properties(&self) -> String {
        join(self.properties.iter())
    }

    /// Name with key properties sorted by key; the basis for equality.
    pub fn canonical(&self) -> String {
        let mut sorted: Vec<&(String, String)> = self.properties.iter().collect();
        sorted.sort();
        format!("{}:{}", self.domain, join(sorted.into_iter()))
    }
}

fn join<'a>(pairs: impl Iterator<Item = &'a (String, String)>) -> String {
    pairs
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl FromStr for ObjectName {
    type Err = ObjectNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (domain, keys) = s
            .split_once(':')
            .ok_or_else(|| ObjectNameError::MissingSeparator(s.to_string()))?;
        ObjectName::new(domain, keys)
    }
}

impl fmt::Display for ObjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.domain, self.key_properties())
    }
}

impl PartialEq for ObjectName {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for ObjectName {}

impl Hash for ObjectName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display_keep_order() {
        let name: ObjectName = "Lifecycle:type=Connector,port=8080".parse().unwrap();
        assert_eq!(name.domain(), "Lifecycle");
        assert_eq!(name.key_property("port"), Some("8080"));
        assert_eq!(name.to_string(), "Lifecycle:type=Connector,port=8080");
    }

    #[test]
    fn equality_ignores_property_order() {
        let a = ObjectName::new("D", "type=Service,name=x").unwrap();
        let b = ObjectName::new("D", "name=x,type=Service").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "D:name=x,type=Service");
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(matches!(
            "nodomain".parse::<ObjectName>(),
            Err(ObjectNameError::MissingSeparator(_))
        ));
        assert!(matches!(
            ObjectName::new("D", ""),
            Err(ObjectNameError::NoKeyProperties(_))
        ));
        assert!(matches!(
            ObjectName::new("D", "type"),
            Err(ObjectNameError::MalformedProperty(_))
        ));
        assert!(matches!(
            ObjectName::new("D", "type=a,type=b"),
            Err(ObjectNameError::DuplicateKey(_))
        ));
        assert!(matches!(
            ObjectName::new("a:b", "type=a"),
            Err(ObjectNameError::InvalidDomain(_))
        ));
    }
}
