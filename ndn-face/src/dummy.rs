//! In-memory face for tests and simulations.
//!
//! A `DummyFace` runs the real face machinery over a transport that
//! records every sent packet and lets the test inject received ones.
//! It can answer RIB registration commands the way a local forwarder
//! would, and several dummy faces can be wired together with a
//! broadcast link. All linked faces must run on the same runtime.

use bytes::Bytes;
use ndn_face_core::lp::{LpPacket, NetPacket};
use ndn_face_core::{Data, Interest, Nack, Name};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use crate::controller::{
    ControlParameters, ControlResponse, DigestSigner, PrefixAnnouncement, Signer, STATUS_OK,
    ROUTE_FLAG_CHILD_INHERIT, ROUTE_ORIGIN_APP, ROUTE_ORIGIN_PREFIXANN,
};
use crate::error::Error;
use crate::face::Face;
use crate::transport::{ReceiveCallback, Transport, TransportState};

/// Face id reported in replies to announce commands. The id of the
/// announcing face is not observable from inside the harness, so a
/// fixed synthetic value stands in for it.
pub const SYNTHETIC_ANNOUNCEMENT_FACE_ID: u64 = 555;

/// Behavior switches of a dummy face.
#[derive(Debug, Clone)]
pub struct DummyFaceOptions {
    /// Reply to RIB commands with a 200 response.
    pub enable_registration_reply: bool,

    /// Face id filled into registration replies that carry none.
    pub registration_reply_face_id: u64,
}

impl Default for DummyFaceOptions {
    fn default() -> Self {
        Self {
            enable_registration_reply: true,
            registration_reply_face_id: 1,
        }
    }
}

/* ---------------------------------------------------------------- *
 * Broadcast link
 * ---------------------------------------------------------------- */

/// Shared medium connecting several dummy faces: every sent packet is
/// delivered to every other linked face.
pub struct BroadcastLink {
    peers: Mutex<Vec<Weak<DummyTransportInner>>>,
}

impl BroadcastLink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            peers: Mutex::new(Vec::new()),
        })
    }

    fn join(&self, peer: &Arc<DummyTransportInner>) {
        if let Ok(mut peers) = self.peers.lock() {
            peers.push(Arc::downgrade(peer));
        }
    }

    fn leave(&self, peer: &Arc<DummyTransportInner>) {
        if let Ok(mut peers) = self.peers.lock() {
            peers.retain(|candidate| {
                candidate
                    .upgrade()
                    .map(|candidate| !Arc::ptr_eq(&candidate, peer))
                    .unwrap_or(false)
            });
        }
    }

    fn broadcast(&self, from: &Arc<DummyTransportInner>, block: &Bytes) {
        let peers = match self.peers.lock() {
            Ok(peers) => peers.clone(),
            Err(_) => return,
        };
        for peer in peers {
            if let Some(peer) = peer.upgrade() {
                if !Arc::ptr_eq(&peer, from) {
                    peer.deliver(block.clone());
                }
            }
        }
    }
}

/* ---------------------------------------------------------------- *
 * Dummy transport
 * ---------------------------------------------------------------- */

struct DummyTransportInner {
    state: Mutex<TransportState>,
    on_receive: Mutex<Option<ReceiveCallback>>,
    sent_interests: Mutex<Vec<Interest>>,
    sent_data: Mutex<Vec<Data>>,
    sent_nacks: Mutex<Vec<Nack>>,
    link: Mutex<Option<Arc<BroadcastLink>>>,
    options: DummyFaceOptions,
}

impl DummyTransportInner {
    fn new(options: DummyFaceOptions) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(TransportState::Closed),
            on_receive: Mutex::new(None),
            sent_interests: Mutex::new(Vec::new()),
            sent_data: Mutex::new(Vec::new()),
            sent_nacks: Mutex::new(Vec::new()),
            link: Mutex::new(None),
            options,
        })
    }

    fn set_state(&self, state: TransportState) {
        if let Ok(mut guard) = self.state.lock() {
            *guard = state;
        }
    }

    fn state(&self) -> TransportState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(TransportState::Failed)
    }

    /// Hands one block to the owning face, as if it arrived from the
    /// forwarder. Delivery is a post onto the face loop, so it takes
    /// effect on a later turn.
    fn deliver(&self, block: Bytes) {
        if let Ok(mut guard) = self.on_receive.lock() {
            if let Some(on_receive) = guard.as_mut() {
                on_receive(block);
            }
        }
    }

    fn record_sent(&self, block: &Bytes) -> Result<(), Error> {
        match NetPacket::decode(block).map_err(Error::Core)? {
            NetPacket::Interest(interest) => {
                if self.options.enable_registration_reply {
                    if let Some(reply) = self.make_registration_reply(&interest) {
                        self.deliver(reply);
                    }
                }
                if let Ok(mut sent) = self.sent_interests.lock() {
                    sent.push(interest);
                }
            }
            NetPacket::Data(data) => {
                if let Ok(mut sent) = self.sent_data.lock() {
                    sent.push(data);
                }
            }
            NetPacket::Nack(nack) => {
                if let Ok(mut sent) = self.sent_nacks.lock() {
                    sent.push(nack);
                }
            }
        }
        Ok(())
    }

    /// Builds the 200 response a forwarder would return for a RIB
    /// command Interest, or `None` when the Interest is no command.
    fn make_registration_reply(&self, interest: &Interest) -> Option<Bytes> {
        let name = interest.name();
        let rib_prefix: Name = "/localhost/nfd/rib".into();
        if name.len() <= 4 || !rib_prefix.is_prefix_of(name) {
            return None;
        }

        let verb = name.get(3)?.value().clone();
        let params = if verb.as_ref() == b"announce" {
            let payload = interest.app_parameters.clone()?;
            let announcement_data = Data::decode(&payload).ok()?;
            let announcement = PrefixAnnouncement::from_data(&announcement_data).ok()?;
            ControlParameters {
                name: Some(announcement.announced_name.clone()),
                face_id: Some(SYNTHETIC_ANNOUNCEMENT_FACE_ID),
                origin: Some(ROUTE_ORIGIN_PREFIXANN),
                cost: Some(2048),
                flags: Some(ROUTE_FLAG_CHILD_INHERIT),
                expiration_period: Some(announcement.expiration),
            }
        } else {
            let mut params = ControlParameters::decode(&name.get(4)?.value().clone()).ok()?;
            if params.face_id.is_none() {
                params.face_id = Some(self.options.registration_reply_face_id);
            }
            if params.origin.is_none() {
                params.origin = Some(ROUTE_ORIGIN_APP);
            }
            if params.cost.is_none() && verb.as_ref() == b"register" {
                params.cost = Some(0);
            }
            params
        };

        let response = ControlResponse::new(STATUS_OK, "OK").with_body(params.encode());
        let mut reply = Data::new(name.clone(), response.encode())
            .with_freshness_period(Duration::from_secs(1));
        DigestSigner.sign_data(&mut reply).ok()?;
        Some(reply.encode())
    }
}

struct DummyTransport {
    inner: Arc<DummyTransportInner>,
}

impl Transport for DummyTransport {
    fn connect(&mut self, on_receive: ReceiveCallback) -> Result<(), Error> {
        if let Ok(mut guard) = self.inner.on_receive.lock() {
            *guard = Some(on_receive);
        }
        self.inner.set_state(TransportState::Running);
        Ok(())
    }

    fn send(&mut self, block: Bytes) -> Result<(), Error> {
        self.inner.record_sent(&block)?;

        let link = match self.inner.link.lock() {
            Ok(link) => link.clone(),
            Err(_) => None,
        };
        if let Some(link) = link {
            link.broadcast(&self.inner, &block);
        }
        Ok(())
    }

    fn pause(&mut self) {
        if self.inner.state() == TransportState::Running {
            self.inner.set_state(TransportState::Paused);
        }
    }

    fn resume(&mut self) {
        if self.inner.state() == TransportState::Paused {
            self.inner.set_state(TransportState::Running);
        }
    }

    fn close(&mut self) {
        if let Ok(mut guard) = self.inner.on_receive.lock() {
            *guard = None;
        }
        self.inner.set_state(TransportState::Closed);
    }

    fn state(&self) -> TransportState {
        self.inner.state()
    }
}

/* ---------------------------------------------------------------- *
 * Dummy face
 * ---------------------------------------------------------------- */

/// A face over an in-memory transport, for tests.
pub struct DummyFace {
    face: Face,
    inner: Arc<DummyTransportInner>,
}

impl DummyFace {
    /// Creates a dummy face that answers registration commands.
    pub fn new() -> Self {
        Self::with_options(DummyFaceOptions::default())
    }

    pub fn with_options(options: DummyFaceOptions) -> Self {
        let inner = DummyTransportInner::new(options);
        let transport = Box::new(DummyTransport {
            inner: Arc::clone(&inner),
        });
        let face = Face::with_transport(transport, Arc::new(DigestSigner));
        Self { face, inner }
    }

    pub fn face(&self) -> &Face {
        &self.face
    }

    /// Injects an Interest as if it arrived from the forwarder.
    pub fn receive_interest(&self, interest: &Interest) {
        let lp = LpPacket {
            next_hop_face_id: interest.tags.next_hop_face_id,
            incoming_face_id: interest.tags.incoming_face_id,
            congestion_mark: interest.tags.congestion_mark,
            ..LpPacket::default()
        };
        self.inner.deliver(lp.encode_with_fragment(interest.encode()));
    }

    /// Injects a Data as if it arrived from the forwarder.
    pub fn receive_data(&self, data: &Data) {
        let lp = LpPacket {
            incoming_face_id: data.tags.incoming_face_id,
            congestion_mark: data.tags.congestion_mark,
            ..LpPacket::default()
        };
        self.inner.deliver(lp.encode_with_fragment(data.encode()));
    }

    /// Injects a Nack as if it arrived from the forwarder.
    pub fn receive_nack(&self, nack: &Nack) {
        let lp = LpPacket {
            nack_reason: Some(nack.reason()),
            incoming_face_id: nack.tags.incoming_face_id,
            congestion_mark: nack.tags.congestion_mark,
            ..LpPacket::default()
        };
        self.inner.deliver(lp.encode_with_fragment(nack.interest().encode()));
    }

    /// Interests sent through the transport so far.
    pub fn sent_interests(&self) -> Vec<Interest> {
        self.inner
            .sent_interests
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Data sent through the transport so far.
    pub fn sent_data(&self) -> Vec<Data> {
        self.inner
            .sent_data
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Nacks sent through the transport so far.
    pub fn sent_nacks(&self) -> Vec<Nack> {
        self.inner
            .sent_nacks
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Connects this face and `other` to the same broadcast medium.
    ///
    /// Fails with `AlreadyLinked` when the two faces already belong to
    /// different link groups.
    pub fn link_to(&self, other: &DummyFace) -> Result<(), Error> {
        let mine = self.current_link();
        let theirs = other.current_link();

        match (mine, theirs) {
            (Some(mine), Some(theirs)) => {
                if Arc::ptr_eq(&mine, &theirs) {
                    Ok(())
                } else {
                    Err(Error::AlreadyLinked)
                }
            }
            (Some(mine), None) => {
                mine.join(&other.inner);
                other.set_link(Some(mine));
                Ok(())
            }
            (None, Some(theirs)) => {
                theirs.join(&self.inner);
                self.set_link(Some(theirs));
                Ok(())
            }
            (None, None) => {
                let link = BroadcastLink::new();
                link.join(&self.inner);
                link.join(&other.inner);
                self.set_link(Some(Arc::clone(&link)));
                other.set_link(Some(link));
                Ok(())
            }
        }
    }

    /// Detaches this face from its broadcast link, if any.
    pub fn unlink(&self) {
        if let Some(link) = self.current_link() {
            link.leave(&self.inner);
        }
        self.set_link(None);
    }

    fn current_link(&self) -> Option<Arc<BroadcastLink>> {
        self.inner.link.lock().ok().and_then(|link| link.clone())
    }

    fn set_link(&self, link: Option<Arc<BroadcastLink>>) {
        if let Ok(mut guard) = self.inner.link.lock() {
            *guard = link;
        }
    }
}

impl Default for DummyFace {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DummyFace {
    fn drop(&mut self) {
        self.unlink();
    }
}

impl std::ops::Deref for DummyFace {
    type Target = Face;

    fn deref(&self) -> &Face {
        &self.face
    }
}

/// Advances the paused test clock in `times` steps of `step`, letting
/// the face loops drain their queues between steps.
pub async fn advance_clocks(step: Duration, times: u32) {
    for _ in 0..times {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        tokio::time::sleep(step).await;
    }
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
