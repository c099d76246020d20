//! Packet tags carrying NDNLP metadata.
//!
//! Tags travel with a packet inside the process and map bijectively to
//! NDNLP header fields on the wire. They are never part of the
//! network-layer encoding.

use serde::{Deserialize, Serialize};

/// Cache policy requested for a Data packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachePolicy {
    NoCache,
}

impl CachePolicy {
    pub fn to_wire(self) -> u64 {
        match self {
            CachePolicy::NoCache => 1,
        }
    }

    pub fn from_wire(value: u64) -> Option<Self> {
        match value {
            1 => Some(CachePolicy::NoCache),
            _ => None,
        }
    }
}

/// Heterogeneous tag bag attached to every packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagBag {
    pub congestion_mark: Option<u64>,
    pub next_hop_face_id: Option<u64>,
    pub incoming_face_id: Option<u64>,
    pub cache_policy: Option<CachePolicy>,
}

impl TagBag {
    pub fn new() -> Self {
        Self::default()
    }
}
