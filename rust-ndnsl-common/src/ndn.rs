//! NDN packet types and structures.
//!
//! This module provides the core data structures that represent NDN packets
//! in the self-learning forwarder.

use crate::error::Error;
use crate::tags::TagSet;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;


/// Maximum length of an NDN name component.
pub const MAX_NAME_COMPONENT_LENGTH: usize = 255;

/// Marker octet that introduces a version number inside a name component.
pub const VERSION_MARKER: u8 = 0xFD;

/// Represents an NDN name component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NameComponent(pub Bytes);

impl NameComponent {
    /// Creates a new name component from a byte slice.
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    /// Creates a version component (`0xFD` marker + big-endian value).
    pub fn version(version: u64) -> Self {
        let mut bytes = vec![VERSION_MARKER];
        let mut started = false;
        for shift in (0..8).rev() {
            let byte = ((version >> (shift * 8)) & 0xFF) as u8;
            if byte != 0 || started || shift == 0 {
                bytes.push(byte);
                started = true;
            }
        }
        Self(Bytes::from(bytes))
    }

    /// Returns the component as bytes.
    pub fn as_bytes(&self) -> &Bytes {
        &self.0
    }

    /// Whether this component carries a version number.
    pub fn is_version(&self) -> bool {
        self.0.len() >= 2 && self.0[0] == VERSION_MARKER
    }

    /// Interprets this component as a version number.
    pub fn to_version(&self) -> Result<u64, Error> {
        if !self.is_version() {
            return Err(Error::Name("Component is not a version".into()));
        }
        if self.0.len() > 9 {
            return Err(Error::Name("Version number too wide".into()));
        }
        let mut version = 0u64;
        for &byte in self.0.iter().skip(1) {
            version = (version << 8) | byte as u64;
        }
        Ok(version)
    }

    /// Encodes this name component as a TLV element.
    pub fn to_tlv(&self) -> TlvElement {
        TlvElement::new(tlv::TLV_COMPONENT, self.0.clone())
    }

    /// Decodes a name component from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_COMPONENT {
            return Err(Error::Packet(format!(
                "Expected name component TLV type {}, got {}",
                tlv::TLV_COMPONENT,
                element.tlv_type
            )));
        }
        Ok(Self(element.value.clone()))
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Printable ASCII characters are shown directly, everything else is
        // percent-escaped so the URI form round-trips through from_string.
        for &b in self.0.iter() {
            if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "%{b:02X}")?;
            }
        }
        Ok(())
    }
}

/// Represents an NDN name, which is a sequence of name components.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    /// Creates a new empty NDN name.
    pub fn new() -> Self {
        Self {
            components: Vec::new(),
        }
    }

    /// Creates a name from a URI with '/' as component separator.
    ///
    /// Percent-escaped octets (`%FD%02`) are decoded, so names printed with
    /// [`fmt::Display`] parse back to the same value.
    pub fn from_string(s: &str) -> Result<Self, Error> {
        let mut components = Vec::new();
        for part in s.split('/').filter(|part| !part.is_empty()) {
            components.push(NameComponent::new(percent_decode(part)?));
        }
        Ok(Self { components })
    }

    /// Adds a component to the name.
    pub fn push(&mut self, component: NameComponent) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Returns a copy of this name with an appended component.
    pub fn append(&self, component: NameComponent) -> Self {
        let mut name = self.clone();
        name.push(component);
        name
    }

    /// Returns a copy of this name with an appended version component.
    pub fn append_version(&self, version: u64) -> Self {
        self.append(NameComponent::version(version))
    }

    /// Returns the number of components in the name.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Returns true if the name has no components.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Returns an iterator over the name components.
    pub fn components(&self) -> impl Iterator<Item = &NameComponent> {
        self.components.iter()
    }

    /// Gets a component at the specified index.
    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// The last component, if any.
    pub fn last(&self) -> Option<&NameComponent> {
        self.components.last()
    }

    /// Returns a prefix of this name with the specified length.
    pub fn prefix(&self, len: usize) -> Self {
        Self {
            components: self.components.iter().take(len).cloned().collect(),
        }
    }

    /// Checks if this name is a prefix of another name.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.len() > other.len() {
            return false;
        }

        for (i, component) in self.components.iter().enumerate() {
            if component != &other.components[i] {
                return false;
            }
        }

        true
    }

    /// Encodes this name as a TLV element.
    pub fn to_tlv(&self) -> Result<TlvElement, Error> {
        let mut buf = BytesMut::new();

        for component in &self.components {
            if component.0.len() > MAX_NAME_COMPONENT_LENGTH {
                return Err(Error::Name("Name component too long".into()));
            }
            component.to_tlv().encode(&mut buf);
        }

        Ok(TlvElement::new(tlv::TLV_NAME, buf.freeze()))
    }

    /// Decodes a name from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_NAME {
            return Err(Error::Packet(format!(
                "Expected name TLV type {}, got {}",
                tlv::TLV_NAME,
                element.tlv_type
            )));
        }

        let mut components = Vec::new();
        let mut buf = element.value.clone();

        while buf.has_remaining() {
            let element = TlvElement::decode(&mut buf)?;
            components.push(NameComponent::from_tlv(&element)?);
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

fn percent_decode(part: &str) -> Result<Vec<u8>, Error> {
    let raw = part.as_bytes();
    let mut bytes = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            if i + 3 > raw.len() {
                return Err(Error::Name(format!("Truncated percent escape in '{part}'")));
            }
            let hex = std::str::from_utf8(&raw[i + 1..i + 3])
                .map_err(|_| Error::Name(format!("Invalid percent escape in '{part}'")))?;
            let byte = u8::from_str_radix(hex, 16)
                .map_err(|_| Error::Name(format!("Invalid percent escape in '{part}'")))?;
            bytes.push(byte);
            i += 3;
        } else {
            bytes.push(raw[i]);
            i += 1;
        }
    }
    Ok(bytes)
}

/// Represents an NDN Interest packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Interest {
    /// The name requested in the Interest.
    pub name: Name,

    /// A nonce value to detect looping.
    pub nonce: u32,

    /// Interest lifetime in milliseconds.
    pub lifetime_ms: u32,

    /// Hop limit (similar to IP TTL).
    pub hop_limit: Option<u8>,

    /// Whether this Interest can be satisfied by a Data whose name it
    /// prefixes.
    pub can_be_prefix: bool,

    /// Whether cached Data must still be fresh to satisfy the Interest.
    pub must_be_fresh: bool,

    /// Link-protocol tags attached to this Interest.
    tags: TagSet,
}

/// Default Interest lifetime.
pub const DEFAULT_INTEREST_LIFETIME_MS: u32 = 4000;

impl Interest {
    /// Creates a new Interest packet.
    pub fn new(name: Name) -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_else(|_| Duration::from_secs(0));

        let nonce = (now.as_nanos() % u32::MAX as u128) as u32;

        Self {
            name,
            nonce,
            lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            hop_limit: Some(32),
            can_be_prefix: false,
            must_be_fresh: false,
            tags: TagSet::new(),
        }
    }

    /// Sets the Interest lifetime.
    pub fn with_lifetime(mut self, lifetime_ms: u32) -> Self {
        self.lifetime_ms = lifetime_ms;
        self
    }

    /// Sets the nonce value.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = nonce;
        self
    }

    /// Sets the can_be_prefix flag.
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Sets the must_be_fresh flag.
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// The requested name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Interest lifetime as a [`Duration`].
    pub fn lifetime(&self) -> Duration {
        Duration::from_millis(self.lifetime_ms as u64)
    }

    /// Link-protocol tags attached to this Interest.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    /// Encodes the Interest (without link-protocol headers).
    pub fn to_wire(&self) -> Result<Bytes, Error> {
        let mut body = BytesMut::new();
        self.name.to_tlv()?.encode(&mut body);
        if self.can_be_prefix {
            TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()).encode(&mut body);
        }
        if self.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut body);
        }
        TlvElement::new(tlv::TLV_NONCE, Bytes::copy_from_slice(&self.nonce.to_be_bytes()))
            .encode(&mut body);
        let mut lifetime = BytesMut::new();
        tlv::encode_nonneg_int(self.lifetime_ms as u64, &mut lifetime);
        TlvElement::new(tlv::TLV_INTEREST_LIFETIME, lifetime.freeze()).encode(&mut body);
        if let Some(hop_limit) = self.hop_limit {
            TlvElement::new(tlv::TLV_HOP_LIMIT, Bytes::copy_from_slice(&[hop_limit]))
                .encode(&mut body);
        }

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_INTEREST, body.freeze()).encode(&mut buf);
        Ok(buf.freeze())
    }

    /// Decodes an Interest from its TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::Packet(format!(
                "Expected Interest TLV type {}, got {}",
                tlv::TLV_INTEREST,
                element.tlv_type
            )));
        }

        let mut buf = element.value.clone();
        let name = Name::from_tlv(&TlvElement::decode_expect(&mut buf, tlv::TLV_NAME)?)?;

        let mut interest = Interest::new(name);
        interest.can_be_prefix = false;
        interest.must_be_fresh = false;
        interest.hop_limit = None;

        while buf.has_remaining() {
            let field = TlvElement::decode(&mut buf)?;
            match field.tlv_type {
                tlv::TLV_CAN_BE_PREFIX => interest.can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => interest.must_be_fresh = true,
                tlv::TLV_NONCE => {
                    if field.value.len() != 4 {
                        return Err(Error::Packet("Nonce must be 4 bytes".into()));
                    }
                    interest.nonce = u32::from_be_bytes([
                        field.value[0],
                        field.value[1],
                        field.value[2],
                        field.value[3],
                    ]);
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    interest.lifetime_ms = field.as_nonneg_int()? as u32;
                }
                tlv::TLV_HOP_LIMIT => {
                    if field.value.len() != 1 {
                        return Err(Error::Packet("HopLimit must be 1 byte".into()));
                    }
                    interest.hop_limit = Some(field.value[0]);
                }
                // Unrecognised non-critical fields are skipped.
                _ => {}
            }
        }

        Ok(interest)
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interest({})", self.name)
    }
}

/// Represents an NDN Data packet.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    /// The name of the Data packet.
    pub name: Name,

    /// The content of the Data packet.
    pub content: Bytes,

    /// Freshness period in milliseconds.
    pub freshness_ms: u32,

    /// Link-protocol tags attached to this Data.
    tags: TagSet,
}

impl Data {
    /// Creates a new Data packet.
    pub fn new(name: Name, content: impl Into<Bytes>) -> Self {
        Self {
            name,
            content: content.into(),
            freshness_ms: 10_000,
            tags: TagSet::new(),
        }
    }

    /// Sets the freshness period.
    pub fn with_freshness(mut self, freshness_ms: u32) -> Self {
        self.freshness_ms = freshness_ms;
        self
    }

    /// The Data name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// The Data content.
    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Link-protocol tags attached to this Data.
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut TagSet {
        &mut self.tags
    }

    /// Encodes the Data (without link-protocol headers).
    pub fn to_wire(&self) -> Result<Bytes, Error> {
        let mut body = BytesMut::new();
        self.name.to_tlv()?.encode(&mut body);
        let mut freshness = BytesMut::new();
        tlv::encode_nonneg_int(self.freshness_ms as u64, &mut freshness);
        TlvElement::new(tlv::TLV_FRESHNESS_PERIOD, freshness.freeze()).encode(&mut body);
        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut body);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_DATA, body.freeze()).encode(&mut buf);
        Ok(buf.freeze())
    }

    /// Decodes a Data packet from its TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_DATA {
            return Err(Error::Packet(format!(
                "Expected Data TLV type {}, got {}",
                tlv::TLV_DATA,
                element.tlv_type
            )));
        }

        let mut buf = element.value.clone();
        let name = Name::from_tlv(&TlvElement::decode_expect(&mut buf, tlv::TLV_NAME)?)?;

        let mut data = Data::new(name, Bytes::new());
        while buf.has_remaining() {
            let field = TlvElement::decode(&mut buf)?;
            match field.tlv_type {
                tlv::TLV_FRESHNESS_PERIOD => data.freshness_ms = field.as_nonneg_int()? as u32,
                tlv::TLV_CONTENT => data.content = field.value,
                _ => {}
            }
        }

        Ok(data)
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Data({})", self.name)
    }
}
