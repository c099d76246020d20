//! NDN names and name components.

use crate::error::Error;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single name component: a TLV type plus an octet string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Component {
    typ: u64,
    value: Bytes,
}

impl Component {
    /// Creates a generic name component from a byte string.
    pub fn generic(value: impl Into<Bytes>) -> Self {
        Self {
            typ: tlv::TLV_GENERIC_COMPONENT,
            value: value.into(),
        }
    }

    /// Creates an implicit SHA-256 digest component.
    pub fn implicit_digest(digest: impl Into<Bytes>) -> Self {
        Self {
            typ: tlv::TLV_IMPLICIT_DIGEST_COMPONENT,
            value: digest.into(),
        }
    }

    /// Creates a parameters SHA-256 digest component.
    pub fn parameters_digest(digest: impl Into<Bytes>) -> Self {
        Self {
            typ: tlv::TLV_PARAMETERS_DIGEST_COMPONENT,
            value: digest.into(),
        }
    }

    /// Returns the component TLV type.
    pub fn typ(&self) -> u64 {
        self.typ
    }

    /// Returns the component value.
    pub fn value(&self) -> &Bytes {
        &self.value
    }

    /// True for an implicit SHA-256 digest component.
    pub fn is_implicit_digest(&self) -> bool {
        self.typ == tlv::TLV_IMPLICIT_DIGEST_COMPONENT
    }

    /// Encodes this component as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(self.typ, self.value.clone())
    }

    /// Decodes a component from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        match element.tlv_type {
            tlv::TLV_GENERIC_COMPONENT
            | tlv::TLV_IMPLICIT_DIGEST_COMPONENT
            | tlv::TLV_PARAMETERS_DIGEST_COMPONENT => Ok(Self {
                typ: element.tlv_type,
                value: element.value.clone(),
            }),
            other => Err(Error::Packet(format!(
                "unsupported name component TLV type {other}"
            ))),
        }
    }

    /// Parses one URI component, percent-decoding escaped octets.
    fn from_escaped(text: &str) -> Result<Self, Error> {
        let mut out = BytesMut::new();
        let raw = text.as_bytes();
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'%' {
                let hex = text
                    .get(i + 1..i + 3)
                    .ok_or_else(|| Error::Packet(format!("truncated percent escape in '{text}'")))?;
                let byte = u8::from_str_radix(hex, 16)
                    .map_err(|_| Error::Packet(format!("invalid percent escape in '{text}'")))?;
                out.extend_from_slice(&[byte]);
                i += 3;
            } else {
                out.extend_from_slice(&raw[i..=i]);
                i += 1;
            }
        }
        Ok(Self::generic(out.freeze()))
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_implicit_digest() {
            write!(f, "sha256digest=")?;
            for b in self.value.iter() {
                write!(f, "{b:02x}")?;
            }
            return Ok(());
        }
        for &b in self.value.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{b:02X}")?;
            }
        }
        Ok(())
    }
}

/// An NDN name: a hierarchical sequence of components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name {
    components: Vec<Component>,
}

impl Name {
    /// Creates a new empty name.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a name from its URI representation, with '/' as separator.
    pub fn from_uri(uri: &str) -> Result<Self, Error> {
        let trimmed = uri.strip_prefix("ndn:").unwrap_or(uri);
        let mut components = Vec::new();
        for part in trimmed.split('/') {
            if part.is_empty() {
                continue;
            }
            components.push(Component::from_escaped(part)?);
        }
        Ok(Self { components })
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// True if the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Component at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Component> {
        self.components.get(index)
    }

    /// Last component, if any.
    pub fn last(&self) -> Option<&Component> {
        self.components.last()
    }

    /// Iterator over the components.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// Appends a component.
    pub fn push(&mut self, component: Component) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Appends a generic component, builder style.
    pub fn append(mut self, value: impl Into<Bytes>) -> Self {
        self.components.push(Component::generic(value));
        self
    }

    /// Returns the prefix of this name with the given number of components.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Checks whether this name is a prefix of `other`.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.components
            .iter()
            .zip(other.components.iter())
            .all(|(a, b)| a == b)
    }

    /// Encodes this name as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        let mut buf = BytesMut::new();
        for component in &self.components {
            component.to_tlv().encode(&mut buf);
        }
        TlvElement::new(tlv::TLV_NAME, buf.freeze())
    }

    /// Decodes a name from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::Packet(format!(
                "expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();
        while buf.has_remaining() {
            let inner = TlvElement::decode(&mut buf)?;
            components.push(Component::from_tlv(&inner)?);
        }
        Ok(Self { components })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl From<&str> for Name {
    fn from(uri: &str) -> Self {
        Name::from_uri(uri).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_roundtrip() {
        let name = Name::from_uri("/test/data/1").unwrap();
        assert_eq!(name.len(), 3);
        assert_eq!(name.get(0).unwrap().value().as_ref(), b"test");
        assert_eq!(name.to_string(), "/test/data/1");

        assert_eq!(Name::new().to_string(), "/");
    }

    #[test]
    fn percent_escapes() {
        let name = Name::from_uri("/Hello/World/%21").unwrap();
        assert_eq!(name.get(2).unwrap().value().as_ref(), b"!");
        assert_eq!(name.to_string(), "/Hello/World/%21");

        assert!(Name::from_uri("/a/%2").is_err());
        assert!(Name::from_uri("/a/%zz").is_err());
    }

    #[test]
    fn prefix_matching() {
        let name1 = Name::from_uri("/a/b/c").unwrap();
        let name3 = Name::from_uri("/a/b/d").unwrap();
        let name4 = Name::from_uri("/a/b").unwrap();

        assert!(name4.is_prefix_of(&name1));
        assert!(name1.is_prefix_of(&name1));
        assert!(!name1.is_prefix_of(&name4));
        assert!(!name3.is_prefix_of(&name1));
        assert!(Name::new().is_prefix_of(&name1));
    }

    #[test]
    fn tlv_roundtrip() {
        let name = Name::from_uri("/a/b/c").unwrap();
        let element = name.to_tlv();
        assert_eq!(Name::from_tlv(&element).unwrap(), name);
    }
}
