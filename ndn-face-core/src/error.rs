//! Error type for the packet model.

use thiserror::Error;

use crate::name::Name;
use crate::MAX_NDN_PACKET_SIZE;

/// Packet kind names used in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Interest,
    Data,
    Nack,
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketKind::Interest => write!(f, "Interest"),
            PacketKind::Data => write!(f, "Data"),
            PacketKind::Nack => write!(f, "Nack"),
        }
    }
}

/// All possible errors produced by the packet model.
#[derive(Error, Debug)]
pub enum Error {
    /// Error related to TLV encoding/decoding.
    #[error("TLV error: {0}")]
    Tlv(String),

    /// Error related to packet structure or semantics.
    #[error("packet error: {0}")]
    Packet(String),

    /// Outgoing packet exceeds the implementation limit.
    #[error("{kind} {name} encodes into {size} octets, exceeding the implementation limit of {MAX_NDN_PACKET_SIZE} octets")]
    OversizedPacket {
        kind: PacketKind,
        name: Name,
        size: usize,
    },

    /// An interest filter pattern could not be evaluated.
    #[error("interest filter error: {0}")]
    InterestFilter(String),
}
