//! Prefix Announcements.
//!
//! A Prefix Announcement is a signed statement that its originator serves a
//! given name prefix for a bounded period. The forwarding strategy treats it
//! as an opaque object attached to Data packets; only the RIB service looks
//! inside when turning it into a route.

use crate::error::Error;
use crate::ndn::Name;
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use std::fmt;
use std::time::Duration;

/// A signed prefix announcement carried in a Data packet's link-protocol
/// header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixAnnouncement {
    prefix: Name,
    expiration: Duration,
    signature: Bytes,
}

impl PrefixAnnouncement {
    /// Creates an announcement for `prefix` valid for `expiration`.
    pub fn new(prefix: Name, expiration: Duration) -> Self {
        Self {
            prefix,
            expiration,
            signature: Bytes::new(),
        }
    }

    /// Attaches an opaque signature blob.
    pub fn with_signature(mut self, signature: impl Into<Bytes>) -> Self {
        self.signature = signature.into();
        self
    }

    /// The announced name prefix.
    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    /// How long the announcement remains valid, counted from its issue.
    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// The opaque signature bytes.
    pub fn signature(&self) -> &Bytes {
        &self.signature
    }

    /// Encodes this announcement as the value of a TLV element.
    pub fn to_tlv(&self) -> Result<TlvElement, Error> {
        let mut buf = BytesMut::new();
        self.prefix.to_tlv()?.encode(&mut buf);

        let mut expiration = BytesMut::new();
        tlv::encode_nonneg_int(self.expiration.as_millis() as u64, &mut expiration);
        TlvElement::new(tlv::TLV_PA_EXPIRATION, expiration.freeze()).encode(&mut buf);

        TlvElement::new(tlv::TLV_PA_SIGNATURE, self.signature.clone()).encode(&mut buf);

        Ok(TlvElement::new(tlv::TLV_LP_PREFIX_ANN, buf.freeze()))
    }

    /// Decodes an announcement from a TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_LP_PREFIX_ANN {
            return Err(Error::Announcement(format!(
                "Expected Prefix Announcement TLV type {}, got {}",
                tlv::TLV_LP_PREFIX_ANN,
                element.tlv_type
            )));
        }

        let mut buf = element.value.clone();
        let prefix = Name::from_tlv(&TlvElement::decode_expect(&mut buf, tlv::TLV_NAME)?)?;
        let expiration_ms = TlvElement::decode_expect(&mut buf, tlv::TLV_PA_EXPIRATION)?
            .as_nonneg_int()?;
        let signature = if buf.has_remaining() {
            TlvElement::decode_expect(&mut buf, tlv::TLV_PA_SIGNATURE)?.value
        } else {
            Bytes::new()
        };

        Ok(Self {
            prefix,
            expiration: Duration::from_millis(expiration_ms),
            signature,
        })
    }
}

impl fmt::Display for PrefixAnnouncement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA({}, {}ms)", self.prefix, self.expiration.as_millis())
    }
}
