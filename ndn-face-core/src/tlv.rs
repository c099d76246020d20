//! TLV (Type-Length-Value) encoding and decoding utilities.
//!
//! NDN encodes both the TLV *type* and *length* fields as variable-width
//! numbers, so the same codec serves both.

use crate::error::Error;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/* ---------------------------------------------------------------- *
 * TLV type constants: network layer
 * ---------------------------------------------------------------- */

pub const TLV_INTEREST: u64 = 0x05;
pub const TLV_DATA: u64 = 0x06;
pub const TLV_NAME: u64 = 0x07;
pub const TLV_IMPLICIT_DIGEST_COMPONENT: u64 = 0x01;
pub const TLV_PARAMETERS_DIGEST_COMPONENT: u64 = 0x02;
pub const TLV_GENERIC_COMPONENT: u64 = 0x08;
pub const TLV_NONCE: u64 = 0x0A;
pub const TLV_INTEREST_LIFETIME: u64 = 0x0C;
pub const TLV_MUST_BE_FRESH: u64 = 0x12;
pub const TLV_CAN_BE_PREFIX: u64 = 0x21;
pub const TLV_HOP_LIMIT: u64 = 0x22;
pub const TLV_APPLICATION_PARAMETERS: u64 = 0x24;
pub const TLV_INTEREST_SIGNATURE_INFO: u64 = 0x2C;
pub const TLV_INTEREST_SIGNATURE_VALUE: u64 = 0x2E;
pub const TLV_META_INFO: u64 = 0x14;
pub const TLV_CONTENT: u64 = 0x15;
pub const TLV_SIGNATURE_INFO: u64 = 0x16;
pub const TLV_SIGNATURE_VALUE: u64 = 0x17;
pub const TLV_CONTENT_TYPE: u64 = 0x18;
pub const TLV_FRESHNESS_PERIOD: u64 = 0x19;
pub const TLV_SIGNATURE_TYPE: u64 = 0x1B;

/* ---------------------------------------------------------------- *
 * TLV type constants: NDNLP link layer
 * ---------------------------------------------------------------- */

pub const TLV_LP_PACKET: u64 = 0x64;
pub const TLV_LP_FRAGMENT: u64 = 0x50;
pub const TLV_LP_NACK: u64 = 0x0320;
pub const TLV_LP_NACK_REASON: u64 = 0x0321;
pub const TLV_LP_NEXT_HOP_FACE_ID: u64 = 0x0330;
pub const TLV_LP_INCOMING_FACE_ID: u64 = 0x0331;
pub const TLV_LP_CACHE_POLICY: u64 = 0x0334;
pub const TLV_LP_CACHE_POLICY_TYPE: u64 = 0x0335;
pub const TLV_LP_CONGESTION_MARK: u64 = 0x0340;

/* ---------------------------------------------------------------- *
 * TLV type constants: NFD management
 * ---------------------------------------------------------------- */

pub const TLV_CONTROL_RESPONSE: u64 = 0x65;
pub const TLV_STATUS_CODE: u64 = 0x66;
pub const TLV_STATUS_TEXT: u64 = 0x67;
pub const TLV_CONTROL_PARAMETERS: u64 = 0x68;
pub const TLV_FACE_ID: u64 = 0x69;
pub const TLV_COST: u64 = 0x6A;
pub const TLV_FLAGS: u64 = 0x6C;
pub const TLV_EXPIRATION_PERIOD: u64 = 0x6D;
pub const TLV_ORIGIN: u64 = 0x6F;

/* ---------------------------------------------------------------- *
 * Variable-width number codec
 * ---------------------------------------------------------------- */

/// Encode a TLV type or length using NDN variable-width rules.
///
/// * `< 253` -> 1 byte
/// * `<= 65 535` -> marker 253 + 2-byte value
/// * `<= 4 294 967 295` -> marker 254 + 4-byte value
/// * otherwise -> marker 255 + 8-byte value
pub fn encode_var_number(value: u64, buf: &mut BytesMut) {
    if value < 253 {
        buf.put_u8(value as u8);
    } else if value <= 65_535 {
        buf.put_u8(253);
        buf.put_u16(value as u16);
    } else if value <= 4_294_967_295 {
        buf.put_u8(254);
        buf.put_u32(value as u32);
    } else {
        buf.put_u8(255);
        buf.put_u64(value);
    }
}

/// Decode a TLV type or length using NDN variable-width rules.
pub fn decode_var_number(buf: &mut impl Buf) -> Result<u64, Error> {
    if !buf.has_remaining() {
        return Err(Error::Tlv("buffer underflow when decoding number".into()));
    }

    let first_byte = buf.get_u8();
    match first_byte {
        0..=252 => Ok(u64::from(first_byte)),
        253 => {
            if buf.remaining() < 2 {
                return Err(Error::Tlv("buffer underflow when decoding 16-bit number".into()));
            }
            Ok(u64::from(buf.get_u16()))
        }
        254 => {
            if buf.remaining() < 4 {
                return Err(Error::Tlv("buffer underflow when decoding 32-bit number".into()));
            }
            Ok(u64::from(buf.get_u32()))
        }
        255 => {
            if buf.remaining() < 8 {
                return Err(Error::Tlv("buffer underflow when decoding 64-bit number".into()));
            }
            Ok(buf.get_u64())
        }
    }
}

/// Number of bytes `encode_var_number` produces for `value`.
pub fn var_number_size(value: u64) -> usize {
    if value < 253 {
        1
    } else if value <= 65_535 {
        3
    } else if value <= 4_294_967_295 {
        5
    } else {
        9
    }
}

/* ---------------------------------------------------------------- *
 * Non-negative integer values
 * ---------------------------------------------------------------- */

/// Encode a non-negative integer value in the shortest of 1/2/4/8 bytes.
pub fn encode_nni(value: u64) -> Bytes {
    let mut buf = BytesMut::new();
    if value <= 0xFF {
        buf.put_u8(value as u8);
    } else if value <= 0xFFFF {
        buf.put_u16(value as u16);
    } else if value <= 0xFFFF_FFFF {
        buf.put_u32(value as u32);
    } else {
        buf.put_u64(value);
    }
    buf.freeze()
}

/// Decode a non-negative integer value of width 1, 2, 4, or 8 bytes.
pub fn decode_nni(value: &Bytes) -> Result<u64, Error> {
    let mut buf = value.clone();
    match buf.remaining() {
        1 => Ok(u64::from(buf.get_u8())),
        2 => Ok(u64::from(buf.get_u16())),
        4 => Ok(u64::from(buf.get_u32())),
        8 => Ok(buf.get_u64()),
        n => Err(Error::Tlv(format!("invalid non-negative integer width {n}"))),
    }
}

/* ---------------------------------------------------------------- *
 * TLV element wrapper
 * ---------------------------------------------------------------- */

/// A generic TLV element consisting of *type*, *length* and *value*.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvElement {
    pub tlv_type: u64,
    pub value: Bytes,
}

impl TlvElement {
    /// Create a new element from raw parts.
    pub fn new(tlv_type: u64, value: impl Into<Bytes>) -> Self {
        Self {
            tlv_type,
            value: value.into(),
        }
    }

    /// Total number of bytes when this element is encoded.
    pub fn len(&self) -> usize {
        let vlen = self.value.len();
        var_number_size(self.tlv_type) + var_number_size(vlen as u64) + vlen
    }

    /// True if the element carries an empty value.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Encode this element into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        encode_var_number(self.tlv_type, buf);
        encode_var_number(self.value.len() as u64, buf);
        buf.extend_from_slice(&self.value);
    }

    /// Decode a single element from `buf` in-place.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, Error> {
        let tlv_type = decode_var_number(buf)?;
        let length = decode_var_number(buf)? as usize;

        if buf.remaining() < length {
            return Err(Error::Tlv(format!(
                "buffer underflow: TLV value requires {} bytes but only {} available",
                length,
                buf.remaining()
            )));
        }

        let value = buf.copy_to_bytes(length);
        Ok(Self { tlv_type, value })
    }

    /// Interpret the value as a non-negative integer.
    pub fn as_nni(&self) -> Result<u64, Error> {
        decode_nni(&self.value)
    }
}
