//! TLV (Type‑Length‑Value) encoding and decoding utilities.
//!
//! This module provides functions for encoding and decoding NDN TLV packets.
//! Both the *type* and the *length* field use the NDN variable‑width number
//! scheme, so link‑protocol header types above 252 are representable.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/* ---------------------------------------------------------------- *
 * TLV type constants (NDN packet format v0.3 subset)
 * ---------------------------------------------------------------- */

pub const TLV_INTEREST: u32          = 0x05;
pub const TLV_DATA: u32              = 0x06;
pub const TLV_NAME: u32              = 0x07;
pub const TLV_COMPONENT: u32         = 0x08;
pub const TLV_NONCE: u32             = 0x0A;
pub const TLV_INTEREST_LIFETIME: u32 = 0x0C;
pub const TLV_MUST_BE_FRESH: u32     = 0x12;
pub const TLV_CONTENT: u32           = 0x15;
pub const TLV_FRESHNESS_PERIOD: u32  = 0x19;
pub const TLV_CAN_BE_PREFIX: u32     = 0x21;
pub const TLV_HOP_LIMIT: u32         = 0x22;

/* Link protocol (NDNLPv2 subset) */

pub const TLV_LP_PACKET: u32         = 100;
pub const TLV_LP_FRAGMENT: u32       = 80;
pub const TLV_LP_NACK: u32           = 800;
pub const TLV_LP_NACK_REASON: u32    = 801;
pub const TLV_LP_NON_DISCOVERY: u32  = 852;
pub const TLV_LP_PREFIX_ANN: u32     = 853;

/* Prefix Announcement internals */

pub const TLV_PA_EXPIRATION: u32     = 109;
pub const TLV_PA_SIGNATURE: u32      = 0x17;

/* ---------------------------------------------------------------- *
 * Variable-width number helpers
 * ---------------------------------------------------------------- */

/// Encode an NDN variable‑width number (used for TLV types and lengths).
///
/// * `< 253`  → 1 byte
/// * `≤ 65 535`  → marker 253 + 2‑byte value
/// * otherwise → marker 254 + 4‑byte value (max ≈ 4 G)
pub fn encode_var_number(number: u64, buf: &mut BytesMut) {
    if number < 253 {
        buf.put_u8(number as u8);
    } else if number <= 65_535 {
        buf.put_u8(253);
        buf.put_u16(number as u16);
    } else {
        buf.put_u8(254);
        buf.put_u32(number as u32);
    }
}

/// Decode an NDN variable‑width number.
pub fn decode_var_number(buf: &mut impl Buf) -> Result<u64, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("Buffer underflow when decoding var-number".into()));
    }

    let first_byte = buf.get_u8();
    match first_byte {
        0..=252 => Ok(first_byte as u64),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("Buffer underflow when decoding 16‑bit var-number".into()));
            }
            Ok(buf.get_u16() as u64)
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("Buffer underflow when decoding 32‑bit var-number".into()));
            }
            Ok(buf.get_u32() as u64)
        }
        255 => Err(Error::Tlv("64‑bit var-numbers not supported".into())),
    }
}

/// Number of bytes required to encode `number` with the variable‑width scheme.
pub fn var_number_size(number: u64) -> usize {
    if number < 253 {
        1
    } else if number <= 65_535 {
        3
    } else {
        5
    }
}

/* ---------------------------------------------------------------- *
 * Non-negative integer helpers (1/2/4/8-byte big-endian values)
 * ---------------------------------------------------------------- */

/// Encode a non‑negative integer value with the shortest NDN representation.
pub fn encode_nonneg_int(value: u64, buf: &mut BytesMut) {
    if value <= 0xFF {
        buf.put_u8(value as u8);
    } else if value <= 0xFFFF {
        buf.put_u16(value as u16);
    } else if value <= 0xFFFF_FFFF {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
}

/// Decode a non‑negative integer from a whole TLV value.
pub fn decode_nonneg_int(value: &[u8]) -> Result<u64, Error> {
    match value.len() {
        1 => Ok(value[0] as u64),
        2 => Ok(u16::from_be_bytes([value[0], value[1]]) as u64),
        4 => Ok(u32::from_be_bytes([value[0], value[1], value[2], value[3]]) as u64),
        8 => Ok(u64::from_be_bytes([
            value[0], value[1], value[2], value[3], value[4], value[5], value[6], value[7],
        ])),
        n => Err(Error::Tlv(format!("Invalid non-negative integer length {n}"))),
    }
}

/* ---------------------------------------------------------------- *
 * TLV element wrapper
 * ---------------------------------------------------------------- */

/// A generic TLV element consisting of *type*, *length* and *value*.
#[derive(Debug, Clone, PartialEq)]
pub struct TlvElement {
    pub tlv_type: u32,
    pub value: Bytes,
}

impl TlvElement {
    /// Create a new wrapper from raw parts.
    pub fn new(tlv_type: u32, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Total number of bytes when this element is encoded.
    pub fn len(&self) -> usize {
        let vlen = self.value.len();
        var_number_size(self.tlv_type as u64) + var_number_size(vlen as u64) + vlen
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encode this element into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_var_number(self.tlv_type as u64, buf);
        encode_var_number(self.value.len() as u64, buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decode a single element from `buf` **in‑place**.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        let tlv_type = decode_var_number(buf)?;
        if tlv_type > u32::MAX as u64 {
            return Err(Error::Tlv(format!("TLV type {tlv_type} out of range")));
        }
        let length = decode_var_number(buf)? as usize;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "Buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        // bytes 1.*: cheap zero‑copy slice
        let value = buf.copy_to_bytes(length);
        Ok(Self {
            tlv_type: tlv_type as u32,
            value,
        })
    }

    /// Decode a single element and verify its type.
    pub fn decode_expect(buf: &mut impl Buf, expected: u32) -> Result<Self, Error> {
        let element = Self::decode(buf)?;
        if element.tlv_type != expected {
            return Err(Error::Tlv(format!(
                "Expected TLV type {expected}, got {}",
                element.tlv_type
            )));
        }
        Ok(element)
    }

    /// Interpret the value as a non‑negative integer.
    pub fn as_nonneg_int(&self) -> Result<u64, Error> {
        decode_nonneg_int(&self.value)
    }
}
