//! Packet model and codecs for an NDN application face.
//!
//! This crate provides the pieces of the NDN data plane that a client
//! endpoint needs to speak to a local forwarder: TLV primitives, names,
//! the three network-layer packet types (Interest, Data, Nack), the
//! NDNLP link-layer packet that frames them on the wire, and the
//! interest filter used to route incoming Interests to application
//! callbacks.

pub mod error;
pub mod filter;
pub mod lp;
pub mod name;
pub mod packet;
pub mod tags;
pub mod tlv;

pub use error::Error;
pub use filter::InterestFilter;
pub use lp::{LpPacket, NetPacket};
pub use name::{Component, Name};
pub use packet::{Data, Interest, Nack, NackReason};
pub use tags::{CachePolicy, TagBag};

pub type Result<T> = std::result::Result<T, Error>;

/// Maximum size of an NDN packet on the wire.
pub const MAX_NDN_PACKET_SIZE: usize = 8800;

/// Default Interest lifetime when none is specified.
pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4000;
