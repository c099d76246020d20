//! NDN network-layer packet types: Interest, Data, Nack.

use crate::error::Error;
use crate::name::Name;
use crate::tags::TagBag;
use crate::tlv::{self, encode_nni, TlvElement};
use crate::DEFAULT_INTEREST_LIFETIME_MS;
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/* ---------------------------------------------------------------- *
 * Interest
 * ---------------------------------------------------------------- */

/// An NDN Interest packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interest {
    /// The name requested by the Interest.
    pub name: Name,

    /// Whether the Interest may be satisfied by Data with a longer name.
    pub can_be_prefix: bool,

    /// Whether the Interest must be satisfied by fresh Data.
    pub must_be_fresh: bool,

    /// Nonce used to detect looping Interests.
    pub nonce: Option<u32>,

    /// Interest lifetime.
    pub lifetime: Duration,

    /// Hop limit (decremented per hop, like an IP TTL).
    pub hop_limit: Option<u8>,

    /// Application parameters, if any.
    pub app_parameters: Option<Bytes>,

    /// Signature info block of a signed Interest.
    pub signature_info: Option<SignatureInfo>,

    /// Signature value of a signed Interest.
    pub signature_value: Option<Bytes>,

    /// In-process NDNLP tags.
    #[serde(skip)]
    pub tags: TagBag,
}

impl Interest {
    /// Creates a new Interest for `name` with default guiders.
    pub fn new(name: impl Into<Name>) -> Self {
        Self {
            name: name.into(),
            can_be_prefix: false,
            must_be_fresh: false,
            nonce: None,
            lifetime: Duration::from_millis(DEFAULT_INTEREST_LIFETIME_MS),
            hop_limit: None,
            app_parameters: None,
            signature_info: None,
            signature_value: None,
            tags: TagBag::new(),
        }
    }

    /// Sets the CanBePrefix flag.
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Sets the MustBeFresh flag.
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Sets the nonce.
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Sets the Interest lifetime.
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Returns the name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Draws a random nonce if none is set yet.
    pub fn ensure_nonce(&mut self) {
        if self.nonce.is_none() {
            self.nonce = Some(rand::random::<u32>());
        }
    }

    /// Checks whether `data` satisfies this Interest.
    ///
    /// The Interest name must be a prefix of the Data name. Without
    /// CanBePrefix the names must have equal length, or the Data name may
    /// be exactly one component longer when that component is the
    /// implicit digest.
    pub fn matches_data(&self, data: &Data) -> bool {
        if !self.name.is_prefix_of(&data.name) {
            return false;
        }
        if self.can_be_prefix {
            return true;
        }
        if self.name.len() == data.name.len() {
            return true;
        }
        self.name.len() + 1 == data.name.len()
            && data.name.last().is_some_and(|c| c.is_implicit_digest())
    }

    /// Checks whether `other` refers to the same Interest.
    ///
    /// Names must be equal; nonces must be equal when both are present.
    pub fn matches_interest(&self, other: &Interest) -> bool {
        if self.name != other.name {
            return false;
        }
        match (self.nonce, other.nonce) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Encodes this Interest into its wire format.
    pub fn encode(&self) -> Bytes {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);
        if self.can_be_prefix {
            TlvElement::new(tlv::TLV_CAN_BE_PREFIX, Bytes::new()).encode(&mut inner);
        }
        if self.must_be_fresh {
            TlvElement::new(tlv::TLV_MUST_BE_FRESH, Bytes::new()).encode(&mut inner);
        }
        if let Some(nonce) = self.nonce {
            TlvElement::new(tlv::TLV_NONCE, Bytes::copy_from_slice(&nonce.to_be_bytes()))
                .encode(&mut inner);
        }
        if self.lifetime != Duration::from_millis(DEFAULT_INTEREST_LIFETIME_MS) {
            TlvElement::new(
                tlv::TLV_INTEREST_LIFETIME,
                encode_nni(self.lifetime.as_millis() as u64),
            )
            .encode(&mut inner);
        }
        if let Some(hop_limit) = self.hop_limit {
            TlvElement::new(tlv::TLV_HOP_LIMIT, Bytes::copy_from_slice(&[hop_limit]))
                .encode(&mut inner);
        }
        if let Some(params) = &self.app_parameters {
            TlvElement::new(tlv::TLV_APPLICATION_PARAMETERS, params.clone()).encode(&mut inner);
        }
        if let Some(info) = &self.signature_info {
            TlvElement::new(tlv::TLV_INTEREST_SIGNATURE_INFO, info.encode()).encode(&mut inner);
        }
        if let Some(value) = &self.signature_value {
            TlvElement::new(tlv::TLV_INTEREST_SIGNATURE_VALUE, value.clone()).encode(&mut inner);
        }

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_INTEREST, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Decodes an Interest from its outer TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_INTEREST {
            return Err(Error::Packet(format!(
                "expected Interest TLV type, got {}",
                element.tlv_type
            )));
        }

        let mut interest = Interest::new(Name::new());
        let mut buf = element.value.clone();
        let mut saw_name = false;
        while buf.has_remaining() {
            let field = TlvElement::decode(&mut buf)?;
            match field.tlv_type {
                tlv::TLV_NAME => {
                    interest.name = Name::from_tlv(&field)?;
                    saw_name = true;
                }
                tlv::TLV_CAN_BE_PREFIX => interest.can_be_prefix = true,
                tlv::TLV_MUST_BE_FRESH => interest.must_be_fresh = true,
                tlv::TLV_NONCE => {
                    if field.value.len() != 4 {
                        return Err(Error::Packet("nonce must be 4 octets".into()));
                    }
                    let mut nonce = [0u8; 4];
                    nonce.copy_from_slice(&field.value);
                    interest.nonce = Some(u32::from_be_bytes(nonce));
                }
                tlv::TLV_INTEREST_LIFETIME => {
                    interest.lifetime = Duration::from_millis(field.as_nni()?);
                }
                tlv::TLV_HOP_LIMIT => {
                    if field.value.len() != 1 {
                        return Err(Error::Packet("hop limit must be 1 octet".into()));
                    }
                    interest.hop_limit = Some(field.value[0]);
                }
                tlv::TLV_APPLICATION_PARAMETERS => {
                    interest.app_parameters = Some(field.value.clone());
                }
                tlv::TLV_INTEREST_SIGNATURE_INFO => {
                    interest.signature_info = Some(SignatureInfo::decode(&field.value)?);
                }
                tlv::TLV_INTEREST_SIGNATURE_VALUE => {
                    interest.signature_value = Some(field.value.clone());
                }
                _ => {} // unrecognized non-critical fields are skipped
            }
        }

        if !saw_name {
            return Err(Error::Packet("Interest has no name".into()));
        }
        Ok(interest)
    }

    /// Decodes an Interest from a wire block.
    pub fn decode(wire: &Bytes) -> Result<Self, Error> {
        let mut buf = wire.clone();
        let element = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&element)
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.can_be_prefix {
            write!(f, "?CanBePrefix")?;
        }
        if self.must_be_fresh {
            write!(f, "?MustBeFresh")?;
        }
        if let Some(nonce) = self.nonce {
            write!(f, "?Nonce={nonce:08x}")?;
        }
        Ok(())
    }
}

/* ---------------------------------------------------------------- *
 * Data
 * ---------------------------------------------------------------- */

/// Signature metadata of a Data packet or signed Interest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature_type: u64,
}

/// DigestSha256 signature type code.
pub const SIGNATURE_DIGEST_SHA256: u64 = 0;

impl SignatureInfo {
    pub fn digest_sha256() -> Self {
        Self {
            signature_type: SIGNATURE_DIGEST_SHA256,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_SIGNATURE_TYPE, encode_nni(self.signature_type)).encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(value: &Bytes) -> Result<Self, Error> {
        let mut buf = value.clone();
        let field = TlvElement::decode(&mut buf)?;
        if field.tlv_type != tlv::TLV_SIGNATURE_TYPE {
            return Err(Error::Packet("SignatureInfo must start with SignatureType".into()));
        }
        Ok(Self {
            signature_type: field.as_nni()?,
        })
    }
}

/// Optional Data metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaInfo {
    pub content_type: Option<u64>,
    pub freshness_period: Option<Duration>,
}

impl MetaInfo {
    fn is_empty(&self) -> bool {
        self.content_type.is_none() && self.freshness_period.is_none()
    }
}

/// An NDN Data packet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Data {
    /// The name of the Data.
    pub name: Name,

    /// Optional metadata.
    pub meta_info: MetaInfo,

    /// The content carried by the Data.
    pub content: Bytes,

    /// Signature metadata.
    pub signature_info: Option<SignatureInfo>,

    /// Signature bits.
    pub signature_value: Bytes,

    /// In-process NDNLP tags.
    #[serde(skip)]
    pub tags: TagBag,
}

impl Data {
    /// Creates a new unsigned Data packet.
    pub fn new(name: impl Into<Name>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            meta_info: MetaInfo::default(),
            content: content.into(),
            signature_info: None,
            signature_value: Bytes::new(),
            tags: TagBag::new(),
        }
    }

    /// Returns the name.
    pub fn name(&self) -> &Name {
        &self.name
    }

    /// Sets the freshness period.
    pub fn with_freshness_period(mut self, period: Duration) -> Self {
        self.meta_info.freshness_period = Some(period);
        self
    }

    /// The portion of the packet covered by the signature.
    pub fn signed_portion(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.name.to_tlv().encode(&mut buf);
        buf.extend_from_slice(&self.content);
        buf.freeze()
    }

    /// Encodes this Data into its wire format.
    pub fn encode(&self) -> Bytes {
        let mut inner = BytesMut::new();
        self.name.to_tlv().encode(&mut inner);

        if !self.meta_info.is_empty() {
            let mut meta = BytesMut::new();
            if let Some(content_type) = self.meta_info.content_type {
                TlvElement::new(tlv::TLV_CONTENT_TYPE, encode_nni(content_type)).encode(&mut meta);
            }
            if let Some(period) = self.meta_info.freshness_period {
                TlvElement::new(tlv::TLV_FRESHNESS_PERIOD, encode_nni(period.as_millis() as u64))
                    .encode(&mut meta);
            }
            TlvElement::new(tlv::TLV_META_INFO, meta.freeze()).encode(&mut inner);
        }

        TlvElement::new(tlv::TLV_CONTENT, self.content.clone()).encode(&mut inner);

        if let Some(info) = &self.signature_info {
            TlvElement::new(tlv::TLV_SIGNATURE_INFO, info.encode()).encode(&mut inner);
            TlvElement::new(tlv::TLV_SIGNATURE_VALUE, self.signature_value.clone())
                .encode(&mut inner);
        }

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_DATA, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Decodes a Data from its outer TLV element.
    pub fn from_tlv(element: &TlvElement) -> Result<Self, Error> {
        if element.tlv_type != tlv::TLV_DATA {
            return Err(Error::Packet(format!(
                "expected Data TLV type, got {}",
                element.tlv_type
            )));
        }

        let mut data = Data::new(Name::new(), Bytes::new());
        let mut buf = element.value.clone();
        let mut saw_name = false;
        while buf.has_remaining() {
            let field = TlvElement::decode(&mut buf)?;
            match field.tlv_type {
                tlv::TLV_NAME => {
                    data.name = Name::from_tlv(&field)?;
                    saw_name = true;
                }
                tlv::TLV_META_INFO => {
                    let mut meta = field.value.clone();
                    while meta.has_remaining() {
                        let inner = TlvElement::decode(&mut meta)?;
                        match inner.tlv_type {
                            tlv::TLV_CONTENT_TYPE => {
                                data.meta_info.content_type = Some(inner.as_nni()?);
                            }
                            tlv::TLV_FRESHNESS_PERIOD => {
                                data.meta_info.freshness_period =
                                    Some(Duration::from_millis(inner.as_nni()?));
                            }
                            _ => {}
                        }
                    }
                }
                tlv::TLV_CONTENT => data.content = field.value.clone(),
                tlv::TLV_SIGNATURE_INFO => {
                    data.signature_info = Some(SignatureInfo::decode(&field.value)?);
                }
                tlv::TLV_SIGNATURE_VALUE => data.signature_value = field.value.clone(),
                _ => {}
            }
        }

        if !saw_name {
            return Err(Error::Packet("Data has no name".into()));
        }
        Ok(data)
    }

    /// Decodes a Data from a wire block.
    pub fn decode(wire: &Bytes) -> Result<Self, Error> {
        let mut buf = wire.clone();
        let element = TlvElement::decode(&mut buf)?;
        Self::from_tlv(&element)
    }
}

/* ---------------------------------------------------------------- *
 * Nack
 * ---------------------------------------------------------------- */

/// Reason code carried by a Nack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackReason {
    None,
    Congestion,
    Duplicate,
    NoRoute,
}

impl NackReason {
    pub fn to_wire(self) -> u64 {
        match self {
            NackReason::None => 0,
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
        }
    }

    pub fn from_wire(value: u64) -> Result<Self, Error> {
        match value {
            0 => Ok(NackReason::None),
            50 => Ok(NackReason::Congestion),
            100 => Ok(NackReason::Duplicate),
            150 => Ok(NackReason::NoRoute),
            other => Err(Error::Packet(format!("unknown Nack reason {other}"))),
        }
    }

    /// True if `self` is less severe than `other`.
    ///
    /// Severity order: None < Congestion < Duplicate < NoRoute.
    pub fn is_less_severe(self, other: NackReason) -> bool {
        self.to_wire() < other.to_wire()
    }
}

impl fmt::Display for NackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NackReason::None => write!(f, "None"),
            NackReason::Congestion => write!(f, "Congestion"),
            NackReason::Duplicate => write!(f, "Duplicate"),
            NackReason::NoRoute => write!(f, "NoRoute"),
        }
    }
}

/// A negative acknowledgment wrapping the rejected Interest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nack {
    pub interest: Interest,
    pub reason: NackReason,

    /// In-process NDNLP tags.
    #[serde(skip)]
    pub tags: TagBag,
}

impl Nack {
    pub fn new(interest: Interest, reason: NackReason) -> Self {
        Self {
            interest,
            reason,
            tags: TagBag::new(),
        }
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn reason(&self) -> NackReason {
        self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::Component;

    #[test]
    fn interest_codec() {
        let interest = Interest::new("/test/interest")
            .with_can_be_prefix(true)
            .with_must_be_fresh(true)
            .with_nonce(42)
            .with_lifetime(Duration::from_millis(50));

        let wire = interest.encode();
        let parsed = Interest::decode(&wire).unwrap();
        assert_eq!(parsed.name, interest.name);
        assert!(parsed.can_be_prefix);
        assert!(parsed.must_be_fresh);
        assert_eq!(parsed.nonce, Some(42));
        assert_eq!(parsed.lifetime, Duration::from_millis(50));
    }

    #[test]
    fn default_lifetime_is_elided() {
        let wire = Interest::new("/a").encode();
        let parsed = Interest::decode(&wire).unwrap();
        assert_eq!(
            parsed.lifetime,
            Duration::from_millis(DEFAULT_INTEREST_LIFETIME_MS)
        );
    }

    #[test]
    fn data_codec() {
        let data = Data::new("/test/data", Bytes::from_static(b"Hello, NDN!"))
            .with_freshness_period(Duration::from_secs(10));
        let wire = data.encode();
        let parsed = Data::decode(&wire).unwrap();
        assert_eq!(parsed.name, data.name);
        assert_eq!(parsed.content, data.content);
        assert_eq!(parsed.meta_info.freshness_period, Some(Duration::from_secs(10)));
    }

    #[test]
    fn interest_matches_data() {
        let exact = Interest::new("/Hello/World");
        assert!(exact.matches_data(&Data::new("/Hello/World", "")));
        assert!(!exact.matches_data(&Data::new("/Hello/World/a", "")));
        assert!(!exact.matches_data(&Data::new("/Hello", "")));

        let prefix = Interest::new("/Hello/World").with_can_be_prefix(true);
        assert!(prefix.matches_data(&Data::new("/Hello/World/a/b", "")));
        assert!(!prefix.matches_data(&Data::new("/Bye/World", "")));

        // exact match against a name terminated by the implicit digest
        let mut digest_name = Name::from_uri("/Hello/World").unwrap();
        digest_name.push(Component::implicit_digest(Bytes::from(vec![0u8; 32])));
        assert!(exact.matches_data(&Data::new(digest_name, "")));
    }

    #[test]
    fn interest_matches_interest() {
        let a = Interest::new("/A").with_nonce(1);
        let b = Interest::new("/A").with_nonce(2);
        let c = Interest::new("/A");
        let d = Interest::new("/B").with_nonce(1);

        assert!(a.matches_interest(&a));
        assert!(!a.matches_interest(&b));
        assert!(a.matches_interest(&c));
        assert!(c.matches_interest(&b));
        assert!(!a.matches_interest(&d));
    }

    #[test]
    fn nack_severity() {
        assert!(NackReason::None.is_less_severe(NackReason::Congestion));
        assert!(NackReason::Congestion.is_less_severe(NackReason::Duplicate));
        assert!(NackReason::Duplicate.is_less_severe(NackReason::NoRoute));
        assert!(!NackReason::NoRoute.is_less_severe(NackReason::Congestion));
        assert!(!NackReason::Congestion.is_less_severe(NackReason::Congestion));
    }

    #[test]
    fn ensure_nonce_is_sticky() {
        let mut interest = Interest::new("/A");
        interest.ensure_nonce();
        let first = interest.nonce;
        assert!(first.is_some());
        interest.ensure_nonce();
        assert_eq!(interest.nonce, first);
    }
}
