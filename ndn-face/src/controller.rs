//! NFD management: typed RIB commands, their parameter/response
//! codecs, and the signing collaborator.

use bytes::{Buf, Bytes, BytesMut};
use ndn_face_core::name::Component;
use ndn_face_core::packet::SignatureInfo;
use ndn_face_core::tlv::{self, encode_nni, TlvElement};
use ndn_face_core::{Data, Interest, Name};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::error::Error;

/// Default timeout applied to a management command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Route origin codes.
pub const ROUTE_ORIGIN_APP: u64 = 0;
pub const ROUTE_ORIGIN_PREFIXANN: u64 = 129;

/// Route flags.
pub const ROUTE_FLAG_CHILD_INHERIT: u64 = 1;

/// Response codes produced locally by the command machinery.
pub const STATUS_OK: u32 = 200;
pub const ERROR_LBOUND: u32 = 400;
pub const ERROR_SERVER: u32 = 500;
pub const ERROR_TIMEOUT: u32 = 10060;
pub const ERROR_NACK: u32 = 10800;

/* ---------------------------------------------------------------- *
 * Command options
 * ---------------------------------------------------------------- */

/// Per-command options, snapshotted into the registered-prefix record
/// so unregistration reuses them.
#[derive(Debug, Clone)]
pub struct CommandOptions {
    /// Management prefix of the forwarder.
    pub command_prefix: Name,

    /// Overall command timeout.
    pub timeout: Duration,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            command_prefix: Name::from_uri("/localhost/nfd").unwrap_or_default(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }
}

/* ---------------------------------------------------------------- *
 * ControlParameters / ControlResponse
 * ---------------------------------------------------------------- */

/// Parameters of a RIB command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlParameters {
    pub name: Option<Name>,
    pub face_id: Option<u64>,
    pub origin: Option<u64>,
    pub cost: Option<u64>,
    pub flags: Option<u64>,
    pub expiration_period: Option<Duration>,
}

impl ControlParameters {
    pub fn for_name(name: Name) -> Self {
        Self {
            name: Some(name),
            ..Self::default()
        }
    }

    /// Encodes into a ControlParameters TLV block.
    pub fn encode(&self) -> Bytes {
        let mut inner = BytesMut::new();
        if let Some(name) = &self.name {
            name.to_tlv().encode(&mut inner);
        }
        if let Some(face_id) = self.face_id {
            TlvElement::new(tlv::TLV_FACE_ID, encode_nni(face_id)).encode(&mut inner);
        }
        if let Some(origin) = self.origin {
            TlvElement::new(tlv::TLV_ORIGIN, encode_nni(origin)).encode(&mut inner);
        }
        if let Some(cost) = self.cost {
            TlvElement::new(tlv::TLV_COST, encode_nni(cost)).encode(&mut inner);
        }
        if let Some(flags) = self.flags {
            TlvElement::new(tlv::TLV_FLAGS, encode_nni(flags)).encode(&mut inner);
        }
        if let Some(period) = self.expiration_period {
            TlvElement::new(
                tlv::TLV_EXPIRATION_PERIOD,
                encode_nni(period.as_millis() as u64),
            )
            .encode(&mut inner);
        }

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_CONTROL_PARAMETERS, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    /// Decodes from a ControlParameters TLV block.
    pub fn decode(wire: &Bytes) -> Result<Self, Error> {
        let mut buf = wire.clone();
        let outer = TlvElement::decode(&mut buf).map_err(Error::Core)?;
        if outer.tlv_type != tlv::TLV_CONTROL_PARAMETERS {
            return Err(Error::Management(format!(
                "expected ControlParameters, got TLV type {}",
                outer.tlv_type
            )));
        }

        let mut params = Self::default();
        let mut body = outer.value.clone();
        while body.has_remaining() {
            let field = TlvElement::decode(&mut body).map_err(Error::Core)?;
            match field.tlv_type {
                tlv::TLV_NAME => params.name = Some(Name::from_tlv(&field).map_err(Error::Core)?),
                tlv::TLV_FACE_ID => params.face_id = Some(field.as_nni().map_err(Error::Core)?),
                tlv::TLV_ORIGIN => params.origin = Some(field.as_nni().map_err(Error::Core)?),
                tlv::TLV_COST => params.cost = Some(field.as_nni().map_err(Error::Core)?),
                tlv::TLV_FLAGS => params.flags = Some(field.as_nni().map_err(Error::Core)?),
                tlv::TLV_EXPIRATION_PERIOD => {
                    params.expiration_period =
                        Some(Duration::from_millis(field.as_nni().map_err(Error::Core)?));
                }
                _ => {}
            }
        }
        Ok(params)
    }
}

/// Typed response of a management command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlResponse {
    pub code: u32,
    pub text: String,
    pub body: Bytes,
}

impl ControlResponse {
    pub fn new(code: u32, text: impl Into<String>) -> Self {
        Self {
            code,
            text: text.into(),
            body: Bytes::new(),
        }
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    pub fn is_success(&self) -> bool {
        self.code < ERROR_LBOUND
    }

    pub fn encode(&self) -> Bytes {
        let mut inner = BytesMut::new();
        TlvElement::new(tlv::TLV_STATUS_CODE, encode_nni(u64::from(self.code))).encode(&mut inner);
        TlvElement::new(
            tlv::TLV_STATUS_TEXT,
            Bytes::copy_from_slice(self.text.as_bytes()),
        )
        .encode(&mut inner);
        inner.extend_from_slice(&self.body);

        let mut buf = BytesMut::new();
        TlvElement::new(tlv::TLV_CONTROL_RESPONSE, inner.freeze()).encode(&mut buf);
        buf.freeze()
    }

    pub fn decode(wire: &Bytes) -> Result<Self, Error> {
        let mut buf = wire.clone();
        let outer = TlvElement::decode(&mut buf).map_err(Error::Core)?;
        if outer.tlv_type != tlv::TLV_CONTROL_RESPONSE {
            return Err(Error::Management(format!(
                "expected ControlResponse, got TLV type {}",
                outer.tlv_type
            )));
        }

        let mut body = outer.value.clone();
        let code_field = TlvElement::decode(&mut body).map_err(Error::Core)?;
        if code_field.tlv_type != tlv::TLV_STATUS_CODE {
            return Err(Error::Management("ControlResponse has no status code".into()));
        }
        let code = code_field.as_nni().map_err(Error::Core)? as u32;

        let text_field = TlvElement::decode(&mut body).map_err(Error::Core)?;
        if text_field.tlv_type != tlv::TLV_STATUS_TEXT {
            return Err(Error::Management("ControlResponse has no status text".into()));
        }
        let text = String::from_utf8_lossy(&text_field.value).into_owned();

        Ok(Self {
            code,
            text,
            body: body.copy_to_bytes(body.remaining()),
        })
    }
}

/* ---------------------------------------------------------------- *
 * Prefix announcement
 * ---------------------------------------------------------------- */

/// Time window during which an announcement may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityPeriod {
    /// Seconds since the epoch.
    pub not_before: u64,
    /// Seconds since the epoch.
    pub not_after: u64,
}

const TLV_VALIDITY_PERIOD: u64 = 0xFD;
const TLV_NOT_BEFORE: u64 = 0xFE;
const TLV_NOT_AFTER: u64 = 0xFF;

/// A self-contained, signed statement that a prefix is served here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixAnnouncement {
    pub announced_name: Name,
    pub expiration: Duration,
    pub validity: Option<ValidityPeriod>,
}

const ANNOUNCEMENT_KEYWORD: &[u8] = b"PA";

impl PrefixAnnouncement {
    pub fn new(announced_name: Name, expiration: Duration) -> Self {
        Self {
            announced_name,
            expiration,
            validity: None,
        }
    }

    /// Renders the announcement as a signed Data packet.
    pub fn to_data(&self, signer: &dyn Signer) -> Result<Data, Error> {
        let mut content = BytesMut::new();
        TlvElement::new(
            tlv::TLV_EXPIRATION_PERIOD,
            encode_nni(self.expiration.as_millis() as u64),
        )
        .encode(&mut content);
        if let Some(validity) = &self.validity {
            let mut period = BytesMut::new();
            TlvElement::new(TLV_NOT_BEFORE, encode_nni(validity.not_before)).encode(&mut period);
            TlvElement::new(TLV_NOT_AFTER, encode_nni(validity.not_after)).encode(&mut period);
            TlvElement::new(TLV_VALIDITY_PERIOD, period.freeze()).encode(&mut content);
        }

        let mut name = self.announced_name.clone();
        name.push(Component::generic(ANNOUNCEMENT_KEYWORD));
        let mut data = Data::new(name, content.freeze());
        signer.sign_data(&mut data)?;
        Ok(data)
    }

    /// Parses an announcement out of its Data representation.
    pub fn from_data(data: &Data) -> Result<Self, Error> {
        let name_len = data.name().len();
        if name_len == 0
            || data
                .name()
                .last()
                .map(|c| c.value().as_ref() != ANNOUNCEMENT_KEYWORD)
                .unwrap_or(true)
        {
            return Err(Error::Management(
                "Data does not carry a prefix announcement".into(),
            ));
        }

        let mut announcement =
            PrefixAnnouncement::new(data.name().prefix(name_len - 1), Duration::ZERO);
        let mut body = data.content.clone();
        while body.has_remaining() {
            let field = TlvElement::decode(&mut body).map_err(Error::Core)?;
            match field.tlv_type {
                tlv::TLV_EXPIRATION_PERIOD => {
                    announcement.expiration =
                        Duration::from_millis(field.as_nni().map_err(Error::Core)?);
                }
                TLV_VALIDITY_PERIOD => {
                    let mut period = field.value.clone();
                    let mut not_before = None;
                    let mut not_after = None;
                    while period.has_remaining() {
                        let inner = TlvElement::decode(&mut period).map_err(Error::Core)?;
                        match inner.tlv_type {
                            TLV_NOT_BEFORE => not_before = Some(inner.as_nni().map_err(Error::Core)?),
                            TLV_NOT_AFTER => not_after = Some(inner.as_nni().map_err(Error::Core)?),
                            _ => {}
                        }
                    }
                    if let (Some(not_before), Some(not_after)) = (not_before, not_after) {
                        announcement.validity = Some(ValidityPeriod {
                            not_before,
                            not_after,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(announcement)
    }
}

/* ---------------------------------------------------------------- *
 * Signing
 * ---------------------------------------------------------------- */

/// Credential collaborator signing outgoing packets.
pub trait Signer: Send + Sync {
    fn sign_interest(&self, interest: &mut Interest) -> Result<(), Error>;
    fn sign_data(&self, data: &mut Data) -> Result<(), Error>;
}

/// SHA-256 digest "signature", sufficient for localhost management
/// traffic and for tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct DigestSigner;

impl Signer for DigestSigner {
    fn sign_interest(&self, interest: &mut Interest) -> Result<(), Error> {
        if interest.app_parameters.is_none() {
            interest.app_parameters = Some(Bytes::new());
        }

        let mut hasher = Sha256::new();
        let mut name_wire = BytesMut::new();
        interest.name.to_tlv().encode(&mut name_wire);
        hasher.update(&name_wire);
        if let Some(params) = &interest.app_parameters {
            hasher.update(params);
        }
        let digest = Bytes::copy_from_slice(&hasher.finalize());

        interest.signature_info = Some(SignatureInfo::digest_sha256());
        interest.signature_value = Some(digest.clone());
        interest.name.push(Component::parameters_digest(digest));
        Ok(())
    }

    fn sign_data(&self, data: &mut Data) -> Result<(), Error> {
        let mut hasher = Sha256::new();
        hasher.update(data.signed_portion());
        data.signature_info = Some(SignatureInfo::digest_sha256());
        data.signature_value = Bytes::copy_from_slice(&hasher.finalize());
        Ok(())
    }
}

/* ---------------------------------------------------------------- *
 * RIB commands
 * ---------------------------------------------------------------- */

/// The RIB command verbs the face issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RibCommand {
    Register,
    Unregister,
    Announce,
}

impl RibCommand {
    pub fn verb(self) -> &'static str {
        match self {
            RibCommand::Register => "register",
            RibCommand::Unregister => "unregister",
            RibCommand::Announce => "announce",
        }
    }
}

/// Builds and parses signed management command traffic.
pub struct Controller {
    signer: std::sync::Arc<dyn Signer>,
}

impl Controller {
    pub fn new(signer: std::sync::Arc<dyn Signer>) -> Self {
        Self { signer }
    }

    pub fn signer(&self) -> &dyn Signer {
        self.signer.as_ref()
    }

    /// Builds the signed command Interest for one RIB command.
    ///
    /// The command name is
    /// `<command-prefix>/rib/<verb>/<ControlParameters>`; an announce
    /// command additionally carries the announcement Data in its
    /// application parameters.
    pub fn make_command(
        &self,
        command: RibCommand,
        params: &ControlParameters,
        options: &CommandOptions,
        app_parameters: Option<Bytes>,
    ) -> Result<Interest, Error> {
        let mut name = options.command_prefix.clone();
        name.push(Component::generic(&b"rib"[..]));
        name.push(Component::generic(command.verb().as_bytes().to_vec()));
        name.push(Component::generic(params.encode()));

        let mut interest = Interest::new(name)
            .with_must_be_fresh(true)
            .with_lifetime(options.timeout);
        interest.app_parameters = app_parameters;
        self.signer.sign_interest(&mut interest)?;
        Ok(interest)
    }

    /// Extracts the ControlResponse from a command reply.
    pub fn parse_response(data: &Data) -> Result<ControlResponse, Error> {
        ControlResponse::decode(&data.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_parameters_roundtrip() {
        let params = ControlParameters {
            name: Some(Name::from_uri("/Hello/World").unwrap()),
            face_id: Some(555),
            origin: Some(ROUTE_ORIGIN_PREFIXANN),
            cost: Some(2048),
            flags: Some(ROUTE_FLAG_CHILD_INHERIT),
            expiration_period: Some(Duration::from_secs(10)),
        };
        let decoded = ControlParameters::decode(&params.encode()).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn control_response_roundtrip() {
        let response = ControlResponse::new(200, "OK")
            .with_body(ControlParameters::for_name("/A".into()).encode());
        let decoded = ControlResponse::decode(&response.encode()).unwrap();
        assert_eq!(decoded, response);
        assert!(decoded.is_success());
        assert!(!ControlResponse::new(403, "forbidden").is_success());
    }

    #[test]
    fn command_name_layout() {
        let controller = Controller::new(std::sync::Arc::new(DigestSigner));
        let params = ControlParameters::for_name("/Hello/World".into());
        let interest = controller
            .make_command(RibCommand::Register, &params, &CommandOptions::default(), None)
            .unwrap();

        let name = interest.name();
        assert!(Name::from_uri("/localhost/nfd/rib/register")
            .unwrap()
            .is_prefix_of(name));
        // component 4 carries the parameters, the digest component follows
        let carried =
            ControlParameters::decode(&name.get(4).expect("params component").value().clone())
                .unwrap();
        assert_eq!(carried, params);
        assert_eq!(name.len(), 6);
        assert_eq!(interest.lifetime, DEFAULT_COMMAND_TIMEOUT);
        assert!(interest.signature_value.is_some());
    }

    #[test]
    fn announcement_roundtrip() {
        let announcement = PrefixAnnouncement {
            announced_name: "/Hello/World".into(),
            expiration: Duration::from_secs(1),
            validity: Some(ValidityPeriod {
                not_before: 100,
                not_after: 200,
            }),
        };
        let data = announcement.to_data(&DigestSigner).unwrap();
        let parsed = PrefixAnnouncement::from_data(&data).unwrap();
        assert_eq!(parsed, announcement);
    }
}
