//! Link-protocol packets.
//!
//! An [`LpPacket`] wraps an Interest or Data fragment together with the
//! header fields this forwarder understands: the Nack header, the
//! presence-only `NonDiscoveryTag` and the `PrefixAnnouncementTag`. Packets
//! without headers are sent as bare Interest/Data TLVs.

use crate::announcement::PrefixAnnouncement;
use crate::error::Error;
use crate::ndn::{Data, Interest, Name};
use crate::tlv::{self, TlvElement};
use bytes::{Buf, Bytes, BytesMut};
use std::fmt;

/// Reason carried in a Nack header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
}

impl NackReason {
    pub fn to_code(self) -> u64 {
        match self {
            NackReason::None => 0,
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            50 => NackReason::Congestion,
            100 => NackReason::Duplicate,
            150 => NackReason::NoRoute,
            _ => NackReason::None,
        }
    }

    /// Lower codes are considered less severe, `None` the least.
    pub fn is_less_severe(self, other: NackReason) -> bool {
        self.to_code() < other.to_code()
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NackReason::None => "None",
            NackReason::Congestion => "Congestion",
            NackReason::Duplicate => "Duplicate",
            NackReason::NoRoute => "NoRoute",
        };
        write!(f, "{text}")
    }
}

/// A link-layer negative acknowledgement referencing an Interest.
#[derive(Debug, Clone, PartialEq)]
pub struct Nack {
    pub reason: NackReason,
    pub interest: Interest,
}

impl Nack {
    pub fn new(reason: NackReason, interest: Interest) -> Self {
        Self { reason, interest }
    }

    pub fn name(&self) -> &Name {
        self.interest.name()
    }
}

impl fmt::Display for Nack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nack({}, {})", self.reason, self.interest.name())
    }
}

/// A decoded network-layer packet together with its link-protocol headers.
#[derive(Debug, Clone, PartialEq)]
pub enum NdnPacket {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

impl NdnPacket {
    /// The network-layer name of the enclosed packet.
    pub fn name(&self) -> &Name {
        match self {
            NdnPacket::Interest(interest) => interest.name(),
            NdnPacket::Data(data) => data.name(),
            NdnPacket::Nack(nack) => nack.name(),
        }
    }

    /// Serializes the packet, emitting an LpPacket wrapper when link
    /// headers are present.
    pub fn to_bytes(&self) -> Result<Bytes, Error> {
        let mut headers = BytesMut::new();
        let fragment = match self {
            NdnPacket::Interest(interest) => {
                encode_tag_headers(
                    interest.tags().has_non_discovery(),
                    interest.tags().prefix_ann(),
                    &mut headers,
                )?;
                interest.to_wire()?
            }
            NdnPacket::Data(data) => {
                encode_tag_headers(
                    data.tags().has_non_discovery(),
                    data.tags().prefix_ann(),
                    &mut headers,
                )?;
                data.to_wire()?
            }
            NdnPacket::Nack(nack) => {
                let mut reason = BytesMut::new();
                tlv::encode_nonneg_int(nack.reason.to_code(), &mut reason);
                let mut nack_value = BytesMut::new();
                TlvElement::new(tlv::TLV_LP_NACK_REASON, reason.freeze()).encode(&mut nack_value);
                TlvElement::new(tlv::TLV_LP_NACK, nack_value.freeze()).encode(&mut headers);
                nack.interest.to_wire()?
            }
        };

        if headers.is_empty() {
            return Ok(fragment);
        }

        let mut lp_value = BytesMut::from(&headers[..]);
        TlvElement::new(tlv::TLV_LP_FRAGMENT, fragment).encode(&mut lp_value);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_LP_PACKET, lp_value.freeze()).encode(&mut buf);
        Ok(buf.freeze())
    }

    /// Parses a packet, unwrapping an LpPacket and attaching its headers
    /// as tags.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut buf = Bytes::copy_from_slice(bytes);
        let outer = TlvElement::decode(&mut buf)?;

        match outer.tlv_type {
            tlv::TLV_INTEREST => Ok(NdnPacket::Interest(Interest::from_tlv(&outer)?)),
            tlv::TLV_DATA => Ok(NdnPacket::Data(Data::from_tlv(&outer)?)),
            tlv::TLV_LP_PACKET => Self::from_lp(&outer),
            other => Err(Error::Packet(format!("Unrecognised outer TLV type {other}"))),
        }
    }

    fn from_lp(outer: &TlvElement) -> Result<Self, Error> {
        let mut nack_reason = None;
        let mut non_discovery = false;
        let mut prefix_ann = None;
        let mut fragment = None;

        let mut buf = outer.value.clone();
        while buf.has_remaining() {
            let field = TlvElement::decode(&mut buf)?;
            match field.tlv_type {
                tlv::TLV_LP_NACK => {
                    let mut nack_value = field.value.clone();
                    let mut reason = NackReason::None;
                    while nack_value.has_remaining() {
                        let inner = TlvElement::decode(&mut nack_value)?;
                        if inner.tlv_type == tlv::TLV_LP_NACK_REASON {
                            reason = NackReason::from_code(inner.as_nonneg_int()?);
                        }
                    }
                    nack_reason = Some(reason);
                }
                tlv::TLV_LP_NON_DISCOVERY => non_discovery = true,
                tlv::TLV_LP_PREFIX_ANN => {
                    prefix_ann = Some(PrefixAnnouncement::from_tlv(&field)?);
                }
                tlv::TLV_LP_FRAGMENT => fragment = Some(field.value),
                _ => {}
            }
        }

        let mut fragment =
            fragment.ok_or_else(|| Error::Packet("LpPacket without fragment".into()))?;
        let inner = TlvElement::decode(&mut fragment)?;

        match inner.tlv_type {
            tlv::TLV_INTEREST => {
                let mut interest = Interest::from_tlv(&inner)?;
                if let Some(reason) = nack_reason {
                    return Ok(NdnPacket::Nack(Nack::new(reason, interest)));
                }
                interest.tags_mut().set_non_discovery(non_discovery);
                if let Some(pa) = prefix_ann {
                    interest.tags_mut().set_prefix_ann(pa);
                }
                Ok(NdnPacket::Interest(interest))
            }
            tlv::TLV_DATA => {
                if nack_reason.is_some() {
                    return Err(Error::Packet("Nack header on a Data fragment".into()));
                }
                let mut data = Data::from_tlv(&inner)?;
                data.tags_mut().set_non_discovery(non_discovery);
                if let Some(pa) = prefix_ann {
                    data.tags_mut().set_prefix_ann(pa);
                }
                Ok(NdnPacket::Data(data))
            }
            other => Err(Error::Packet(format!("Unrecognised fragment TLV type {other}"))),
        }
    }
}

fn encode_tag_headers(
    non_discovery: bool,
    prefix_ann: Option<&PrefixAnnouncement>,
    headers: &mut BytesMut,
) -> Result<(), Error> {
    if non_discovery {
        TlvElement::new(tlv::TLV_LP_NON_DISCOVERY, Bytes::new()).encode(headers);
    }
    if let Some(pa) = prefix_ann {
        pa.to_tlv()?.encode(headers);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bare_interest_round_trip() {
        let interest = Interest::new(Name::from_string("/a/b").unwrap()).with_nonce(1);
        let bytes = NdnPacket::Interest(interest.clone()).to_bytes().unwrap();
        // No headers, so no LpPacket wrapper
        assert_eq!(bytes[0], tlv::TLV_INTEREST as u8);
        match NdnPacket::from_bytes(&bytes).unwrap() {
            NdnPacket::Interest(parsed) => {
                assert_eq!(parsed.name(), interest.name());
                assert!(!parsed.tags().has_non_discovery());
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn non_discovery_tag_round_trip() {
        let mut interest = Interest::new(Name::from_string("/a/b").unwrap()).with_nonce(1);
        interest.tags_mut().set_non_discovery(true);
        let bytes = NdnPacket::Interest(interest).to_bytes().unwrap();
        assert_eq!(bytes[0], tlv::TLV_LP_PACKET as u8);
        match NdnPacket::from_bytes(&bytes).unwrap() {
            NdnPacket::Interest(parsed) => assert!(parsed.tags().has_non_discovery()),
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn prefix_ann_tag_round_trip() {
        let pa = PrefixAnnouncement::new(
            Name::from_string("/a").unwrap(),
            Duration::from_secs(600),
        );
        let mut data = Data::new(Name::from_string("/a/b").unwrap(), &b"x"[..]);
        data.tags_mut().set_prefix_ann(pa.clone());

        let bytes = NdnPacket::Data(data).to_bytes().unwrap();
        match NdnPacket::from_bytes(&bytes).unwrap() {
            NdnPacket::Data(parsed) => assert_eq!(parsed.tags().prefix_ann(), Some(&pa)),
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn nack_round_trip() {
        let interest = Interest::new(Name::from_string("/a/b").unwrap()).with_nonce(9);
        let nack = Nack::new(NackReason::NoRoute, interest);
        let bytes = NdnPacket::Nack(nack.clone()).to_bytes().unwrap();
        match NdnPacket::from_bytes(&bytes).unwrap() {
            NdnPacket::Nack(parsed) => {
                assert_eq!(parsed.reason, NackReason::NoRoute);
                assert_eq!(parsed.interest.nonce, 9);
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn nack_reason_severity() {
        assert!(NackReason::Congestion.is_less_severe(NackReason::NoRoute));
        assert!(!NackReason::NoRoute.is_less_severe(NackReason::Duplicate));
    }
}
