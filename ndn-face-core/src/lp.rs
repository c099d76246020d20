//! NDNLP link-layer packet codec.
//!
//! An `LpPacket` frames one network-layer packet together with the
//! header fields a local face exchanges with its forwarder. A bare
//! Interest or Data block is also a valid link-layer packet, so the
//! encoder emits the naked fragment when no header field is present.

use crate::error::{Error, PacketKind};
use crate::name::Name;
use crate::packet::{Data, Interest, Nack, NackReason};
use crate::tags::{CachePolicy, TagBag};
use crate::tlv::{self, encode_nni, TlvElement};
use crate::MAX_NDN_PACKET_SIZE;
use bytes::{Buf, Bytes, BytesMut};

/// Decoded form of one link-layer block.
#[derive(Debug, Clone, Default)]
pub struct LpPacket {
    pub fragment: Option<Bytes>,
    pub nack_reason: Option<NackReason>,
    pub next_hop_face_id: Option<u64>,
    pub incoming_face_id: Option<u64>,
    pub congestion_mark: Option<u64>,
    pub cache_policy: Option<CachePolicy>,
}

impl LpPacket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Headers to attach to an outgoing Interest, taken from its tags.
    pub fn for_interest(interest: &Interest) -> Self {
        Self {
            next_hop_face_id: interest.tags.next_hop_face_id,
            congestion_mark: interest.tags.congestion_mark,
            ..Self::default()
        }
    }

    /// Headers to attach to an outgoing Data, taken from its tags.
    pub fn for_data(data: &Data) -> Self {
        Self {
            cache_policy: data.tags.cache_policy,
            congestion_mark: data.tags.congestion_mark,
            ..Self::default()
        }
    }

    /// Headers to attach to an outgoing Nack, taken from its tags.
    pub fn for_nack(nack: &Nack) -> Self {
        Self {
            nack_reason: Some(nack.reason),
            congestion_mark: nack.tags.congestion_mark,
            ..Self::default()
        }
    }

    /// True when no header field is set.
    pub fn is_bare(&self) -> bool {
        self.nack_reason.is_none()
            && self.next_hop_face_id.is_none()
            && self.incoming_face_id.is_none()
            && self.congestion_mark.is_none()
            && self.cache_policy.is_none()
    }

    /// Copies the local fields onto a network packet's tag bag.
    pub fn extract_local_fields(&self, tags: &mut TagBag) {
        tags.incoming_face_id = self.incoming_face_id;
        tags.congestion_mark = self.congestion_mark;
        tags.next_hop_face_id = self.next_hop_face_id;
        tags.cache_policy = self.cache_policy;
    }

    /// Encodes this packet around `fragment`.
    pub fn encode_with_fragment(&self, fragment: Bytes) -> Bytes {
        if self.is_bare() {
            return fragment;
        }

        let mut inner = BytesMut::new();
        if let Some(reason) = self.nack_reason {
            let mut nack = BytesMut::new();
            TlvElement::new(tlv::TLV_LP_NACK_REASON, encode_nni(reason.to_wire())).encode(&mut nack);
            TlvElement::new(tlv::TLV_LP_NACK, nack.freeze()).encode(&mut inner);
        }
        if let Some(id) = self.incoming_face_id {
            TlvElement::new(tlv::TLV_LP_INCOMING_FACE_ID, encode_nni(id)).encode(&mut inner);
        }
        if let Some(id) = self.next_hop_face_id {
            TlvElement::new(tlv::TLV_LP_NEXT_HOP_FACE_ID, encode_nni(id)).encode(&mut inner);
        }
        if let Some(policy) = self.cache_policy {
            let mut body = BytesMut::new();
            TlvElement::new(tlv::TLV_LP_CACHE_POLICY_TYPE, encode_nni(policy.to_wire()))
                .encode(&mut body);
            TlvElement::new(tlv::TLV_LP_CACHE_POLICY, body.freeze()).encode(&mut inner);
        }
        if let Some(mark) = self.congestion_mark {
            TlvElement::new(tlv::TLV_LP_CONGESTION_MARK, encode_nni(mark)).encode(&mut inner);
        }
        TlvElement::new(tlv::TLV_LP_FRAGMENT, fragment).encode(&mut inner);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_LP_PACKET, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Decodes a link-layer block.
    ///
    /// A bare Interest/Data block decodes into a fragment-only packet.
    pub fn decode(block: &Bytes) -> Result<Self, Error> {
        let mut probe = block.clone();
        let outer = TlvElement::decode(&mut probe)?;

        if outer.tlv_type != tlv::TLV_LP_PACKET {
            return Ok(Self {
                fragment: Some(block.clone()),
                ..Self::default()
            });
        }

        let mut lp = Self::default();
        let mut buf = outer.value.clone();
        while buf.has_remaining() {
            let field = TlvElement::decode(&mut buf)?;
            match field.tlv_type {
                tlv::TLV_LP_FRAGMENT => lp.fragment = Some(field.value.clone()),
                tlv::TLV_LP_NACK => {
                    // an empty Nack element means reason None
                    let mut reason = NackReason::None;
                    let mut body = field.value.clone();
                    while body.has_remaining() {
                        let inner = TlvElement::decode(&mut body)?;
                        if inner.tlv_type == tlv::TLV_LP_NACK_REASON {
                            reason = NackReason::from_wire(inner.as_nni()?)?;
                        }
                    }
                    lp.nack_reason = Some(reason);
                }
                tlv::TLV_LP_NEXT_HOP_FACE_ID => lp.next_hop_face_id = Some(field.as_nni()?),
                tlv::TLV_LP_INCOMING_FACE_ID => lp.incoming_face_id = Some(field.as_nni()?),
                tlv::TLV_LP_CONGESTION_MARK => lp.congestion_mark = Some(field.as_nni()?),
                tlv::TLV_LP_CACHE_POLICY => {
                    let mut body = field.value.clone();
                    while body.has_remaining() {
                        let inner = TlvElement::decode(&mut body)?;
                        if inner.tlv_type == tlv::TLV_LP_CACHE_POLICY_TYPE {
                            lp.cache_policy = CachePolicy::from_wire(inner.as_nni()?);
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(lp)
    }
}

/// Finish encoding an outgoing packet, enforcing the size limit.
pub fn finish_encoding(
    lp: &LpPacket,
    net_wire: Bytes,
    kind: PacketKind,
    name: &Name,
) -> Result<Bytes, Error> {
    let wire = lp.encode_with_fragment(net_wire);
    if wire.len() > MAX_NDN_PACKET_SIZE {
        return Err(Error::OversizedPacket {
            kind,
            name: name.clone(),
            size: wire.len(),
        });
    }
    Ok(wire)
}

/// One fully decoded incoming packet.
#[derive(Debug, Clone)]
pub enum NetPacket {
    Interest(Interest),
    Data(Data),
    Nack(Nack),
}

impl NetPacket {
    /// Decodes one link-layer block into a network packet with its
    /// NDNLP local fields applied as tags.
    pub fn decode(block: &Bytes) -> Result<Self, Error> {
        let lp = LpPacket::decode(block)?;
        let fragment = lp
            .fragment
            .clone()
            .ok_or_else(|| Error::Packet("link-layer packet has no fragment".into()))?;

        let mut probe = fragment.clone();
        let net = TlvElement::decode(&mut probe)?;
        match net.tlv_type {
            tlv::TLV_INTEREST => {
                let mut interest = Interest::from_tlv(&net)?;
                if let Some(reason) = lp.nack_reason {
                    let mut nack = Nack::new(interest, reason);
                    lp.extract_local_fields(&mut nack.tags);
                    Ok(NetPacket::Nack(nack))
                } else {
                    lp.extract_local_fields(&mut interest.tags);
                    Ok(NetPacket::Interest(interest))
                }
            }
            tlv::TLV_DATA => {
                let mut data = Data::from_tlv(&net)?;
                lp.extract_local_fields(&mut data.tags);
                Ok(NetPacket::Data(data))
            }
            other => Err(Error::Packet(format!("unexpected network TLV type {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_fragment_passthrough() {
        let interest = Interest::new("/A").with_nonce(1);
        let wire = LpPacket::new().encode_with_fragment(interest.encode());
        // no headers -> the block is the bare Interest
        assert_eq!(wire, interest.encode());

        match NetPacket::decode(&wire).unwrap() {
            NetPacket::Interest(i) => assert_eq!(i.name, interest.name),
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn headers_roundtrip() {
        let mut data = Data::new("/A/B", "payload");
        data.tags.cache_policy = Some(CachePolicy::NoCache);
        data.tags.congestion_mark = Some(1);

        let wire = LpPacket::for_data(&data).encode_with_fragment(data.encode());
        match NetPacket::decode(&wire).unwrap() {
            NetPacket::Data(d) => {
                assert_eq!(d.tags.cache_policy, Some(CachePolicy::NoCache));
                assert_eq!(d.tags.congestion_mark, Some(1));
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn nack_roundtrip() {
        let interest = Interest::new("/A").with_nonce(7);
        let nack = Nack::new(interest, NackReason::Congestion);

        let wire = LpPacket::for_nack(&nack).encode_with_fragment(nack.interest.encode());
        match NetPacket::decode(&wire).unwrap() {
            NetPacket::Nack(n) => {
                assert_eq!(n.reason, NackReason::Congestion);
                assert_eq!(n.interest.nonce, Some(7));
            }
            other => panic!("unexpected packet {other:?}"),
        }
    }

    #[test]
    fn oversize_is_rejected() {
        let data = Data::new("/big", Bytes::from(vec![0u8; MAX_NDN_PACKET_SIZE]));
        let name = data.name.clone();
        let err = finish_encoding(&LpPacket::new(), data.encode(), PacketKind::Data, &name);
        assert!(matches!(err, Err(Error::OversizedPacket { .. })));
    }
}
