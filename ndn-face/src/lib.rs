//! NDN application face.
//!
//! A `Face` is the application-side endpoint of an NDN stack: it
//! multiplexes Interest/Data/Nack traffic over a single connection to a
//! local forwarder, keeps the three client-side record tables (pending
//! Interests, interest filters, registered prefixes), and drives prefix
//! (de)registration through the forwarder's management protocol.
//!
//! All Face state lives on a single driver task; public methods post
//! work onto it and callbacks fire there. Handles returned by the
//! consumer/producer APIs hold only weak references, so cancelling
//! after the Face is gone is always a safe no-op.

pub mod config;
pub mod controller;
pub mod dummy;
pub mod error;
pub mod face;
pub mod metrics;
pub mod records;
pub mod scheduler;
pub mod tables;
pub mod transport;

pub use config::ClientConfig;
pub use controller::{CommandOptions, ControlParameters, ControlResponse, DigestSigner, PrefixAnnouncement, Signer};
pub use dummy::{BroadcastLink, DummyFace, DummyFaceOptions};
pub use error::Error;
pub use face::{
    Face, InterestFilterHandle, PendingInterestHandle, RegisteredPrefixHandle,
};
pub use face::{
    RegisterPrefixFailureCallback, RegisterPrefixSuccessCallback, UnregisterFailureCallback,
    UnregisterSuccessCallback,
};
pub use metrics::FaceMetrics;
pub use records::{DataCallback, InterestCallback, NackCallback, TimeoutCallback};
pub use tables::RecordId;
pub use transport::{Transport, TransportState, TransportUri};

// Re-export the packet model so applications need a single dependency.
pub use ndn_face_core::{
    CachePolicy, Component, Data, Interest, InterestFilter, Nack, NackReason, Name, TagBag,
    DEFAULT_INTEREST_LIFETIME_MS, MAX_NDN_PACKET_SIZE,
};

pub type Result<T> = std::result::Result<T, Error>;
