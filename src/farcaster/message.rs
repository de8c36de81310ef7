// Farcaster reaction messages — protobuf encoding, hashing, and signing.
//
// A hub accepts a `Message` whose `data_bytes` is an encoded `MessageData`,
// whose `hash` is the first 20 bytes of blake3(data_bytes), and whose
// `signature` is an Ed25519 signature over that hash. Only the fields a
// reaction needs are modeled here; unused tags are simply never written.

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signer, SigningKey};
use prost::Message as _;
use thiserror::Error;

use crate::db::models::ActionKind;

/// Seconds between the Unix epoch and the Farcaster epoch (2021-01-01T00:00:00Z).
pub const FARCASTER_EPOCH: i64 = 1_609_459_200;

/// Length of a message or cast hash in bytes.
pub const HASH_LENGTH: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum MessageType {
    None = 0,
    ReactionAdd = 3,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum FarcasterNetwork {
    None = 0,
    Mainnet = 1,
    Testnet = 2,
    Devnet = 3,
}

impl FarcasterNetwork {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Some(FarcasterNetwork::Mainnet),
            "testnet" => Some(FarcasterNetwork::Testnet),
            "devnet" => Some(FarcasterNetwork::Devnet),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum ReactionType {
    None = 0,
    Like = 1,
    Recast = 2,
}

impl From<ActionKind> for ReactionType {
    fn from(kind: ActionKind) -> Self {
        match kind {
            ActionKind::Like => ReactionType::Like,
            ActionKind::Recast => ReactionType::Recast,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum HashScheme {
    None = 0,
    Blake3 = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SignatureScheme {
    None = 0,
    Ed25519 = 1,
}

/// Identifies a cast by author and hash.
#[derive(Clone, PartialEq, prost::Message)]
pub struct CastId {
    #[prost(uint64, tag = "1")]
    pub fid: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReactionBody {
    #[prost(enumeration = "ReactionType", tag = "1")]
    pub r#type: i32,
    #[prost(message, optional, tag = "2")]
    pub target_cast_id: Option<CastId>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct MessageData {
    #[prost(enumeration = "MessageType", tag = "1")]
    pub r#type: i32,
    #[prost(uint64, tag = "2")]
    pub fid: u64,
    #[prost(uint32, tag = "3")]
    pub timestamp: u32,
    #[prost(enumeration = "FarcasterNetwork", tag = "4")]
    pub network: i32,
    #[prost(message, optional, tag = "7")]
    pub reaction_body: Option<ReactionBody>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Message {
    #[prost(message, optional, tag = "1")]
    pub data: Option<MessageData>,
    #[prost(bytes = "vec", tag = "2")]
    pub hash: Vec<u8>,
    #[prost(enumeration = "HashScheme", tag = "3")]
    pub hash_scheme: i32,
    #[prost(bytes = "vec", tag = "4")]
    pub signature: Vec<u8>,
    #[prost(enumeration = "SignatureScheme", tag = "5")]
    pub signature_scheme: i32,
    #[prost(bytes = "vec", tag = "6")]
    pub signer: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "7")]
    pub data_bytes: Option<Vec<u8>>,
}

/// Why a reaction message could not be built. Fatal for that action only.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("invalid FID {0:?}")]
    InvalidFid(String),
    #[error("invalid cast hash {0:?}")]
    InvalidHash(String),
    #[error("malformed signer key: {0}")]
    MalformedKey(String),
    #[error("timestamp {0} is outside the Farcaster time range")]
    TimestampOutOfRange(DateTime<Utc>),
}

/// A signed, encoded reaction ready for submission. Never persisted.
#[derive(Debug, Clone)]
pub struct SignedAction {
    pub kind: ActionKind,
    pub actor_fid: u64,
    pub target_author_fid: u64,
    pub target_hash: String,
    pub message_hash: Vec<u8>,
    pub signature: Vec<u8>,
    /// The encoded `Message` as sent to a hub.
    pub encoded: Vec<u8>,
}

impl SignedAction {
    /// Hex form of the message hash, for logs.
    pub fn message_hash_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.message_hash))
    }
}

/// Parse a decimal FID.
pub fn parse_fid(fid: &str) -> Result<u64, MessageError> {
    fid.trim()
        .parse::<u64>()
        .map_err(|_| MessageError::InvalidFid(fid.to_string()))
}

/// Decode a `0x`-prefixed cast hash into its 20 bytes.
pub fn decode_cast_hash(hash: &str) -> Result<Vec<u8>, MessageError> {
    let bytes = hex::decode(strip_hex_prefix(hash))
        .map_err(|_| MessageError::InvalidHash(hash.to_string()))?;
    if bytes.len() != HASH_LENGTH {
        return Err(MessageError::InvalidHash(hash.to_string()));
    }
    Ok(bytes)
}

/// Parse a hex Ed25519 private key.
///
/// Accepts a 32-byte seed or a 64-byte seed‖public-key pair (the first half
/// is used). The error never echoes the key.
pub fn parse_signing_key(private_key: &str) -> Result<SigningKey, MessageError> {
    let bytes = hex::decode(strip_hex_prefix(private_key.trim()))
        .map_err(|_| MessageError::MalformedKey("not valid hex".to_string()))?;

    let seed: [u8; 32] = match bytes.len() {
        32 | 64 => bytes[..32]
            .try_into()
            .map_err(|_| MessageError::MalformedKey("bad seed length".to_string()))?,
        n => {
            return Err(MessageError::MalformedKey(format!(
                "expected 32 or 64 bytes, got {n}"
            )))
        }
    };

    Ok(SigningKey::from_bytes(&seed))
}

/// Convert a wall-clock time to a Farcaster timestamp.
pub fn farcaster_timestamp(at: DateTime<Utc>) -> Result<u32, MessageError> {
    let secs = at.timestamp() - FARCASTER_EPOCH;
    u32::try_from(secs).map_err(|_| MessageError::TimestampOutOfRange(at))
}

/// Build and sign a REACTION_ADD message for `kind` against a target cast.
pub fn build_reaction(
    kind: ActionKind,
    actor_fid: &str,
    signing_key: &SigningKey,
    target_author_fid: &str,
    target_hash: &str,
    network: FarcasterNetwork,
    at: DateTime<Utc>,
) -> Result<SignedAction, MessageError> {
    let actor = parse_fid(actor_fid)?;
    let author = parse_fid(target_author_fid)?;
    let target = decode_cast_hash(target_hash)?;

    let data = MessageData {
        r#type: MessageType::ReactionAdd as i32,
        fid: actor,
        timestamp: farcaster_timestamp(at)?,
        network: network as i32,
        reaction_body: Some(ReactionBody {
            r#type: ReactionType::from(kind) as i32,
            target_cast_id: Some(CastId {
                fid: author,
                hash: target,
            }),
        }),
    };

    let data_bytes = data.encode_to_vec();
    let message_hash = blake3::hash(&data_bytes).as_bytes()[..HASH_LENGTH].to_vec();
    let signature = signing_key.sign(&message_hash).to_bytes().to_vec();

    let message = Message {
        data: Some(data),
        hash: message_hash.clone(),
        hash_scheme: HashScheme::Blake3 as i32,
        signature: signature.clone(),
        signature_scheme: SignatureScheme::Ed25519 as i32,
        signer: signing_key.verifying_key().to_bytes().to_vec(),
        data_bytes: Some(data_bytes),
    };

    Ok(SignedAction {
        kind,
        actor_fid: actor,
        target_author_fid: author,
        target_hash: target_hash.to_string(),
        message_hash,
        signature,
        encoded: message.encode_to_vec(),
    })
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x").unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use ed25519_dalek::{Signature, Verifier};

    const TARGET: &str = "0x0102030405060708090a0b0c0d0e0f1011121314";

    fn key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_timestamp_is_relative_to_farcaster_epoch() {
        let epoch = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(farcaster_timestamp(epoch).unwrap(), 0);
        assert_eq!(
            farcaster_timestamp(epoch + chrono::Duration::seconds(90)).unwrap(),
            90
        );
        let before = Utc.with_ymd_and_hms(2020, 12, 31, 0, 0, 0).unwrap();
        assert!(farcaster_timestamp(before).is_err());
    }

    #[test]
    fn test_reaction_decodes_back_to_expected_fields() {
        let signed = build_reaction(
            ActionKind::Recast,
            "1234",
            &key(),
            "5650",
            TARGET,
            FarcasterNetwork::Mainnet,
            at(),
        )
        .unwrap();

        let message = Message::decode(signed.encoded.as_slice()).unwrap();
        let data = message.data.unwrap();
        assert_eq!(data.r#type, MessageType::ReactionAdd as i32);
        assert_eq!(data.fid, 1234);
        assert_eq!(data.network, FarcasterNetwork::Mainnet as i32);

        let body = data.reaction_body.unwrap();
        assert_eq!(body.r#type, ReactionType::Recast as i32);
        let target = body.target_cast_id.unwrap();
        assert_eq!(target.fid, 5650);
        assert_eq!(target.hash, decode_cast_hash(TARGET).unwrap());
    }

    #[test]
    fn test_hash_and_signature_verify() {
        let signed = build_reaction(
            ActionKind::Like,
            "1234",
            &key(),
            "5650",
            TARGET,
            FarcasterNetwork::Mainnet,
            at(),
        )
        .unwrap();

        let message = Message::decode(signed.encoded.as_slice()).unwrap();
        let data_bytes = message.data_bytes.unwrap();
        let full = blake3::hash(&data_bytes);
        let expected = &full.as_bytes()[..HASH_LENGTH];
        assert_eq!(message.hash, expected);
        assert_eq!(message.hash.len(), HASH_LENGTH);

        let signature = Signature::from_slice(&message.signature).unwrap();
        assert!(key()
            .verifying_key()
            .verify(&message.hash, &signature)
            .is_ok());
        assert_eq!(message.signer, key().verifying_key().to_bytes().to_vec());
    }

    #[test]
    fn test_parse_signing_key_formats() {
        let seed = "07".repeat(32);
        let a = parse_signing_key(&seed).unwrap();
        let b = parse_signing_key(&format!("0x{seed}")).unwrap();
        let pair = format!("{seed}{}", hex::encode(a.verifying_key().to_bytes()));
        let c = parse_signing_key(&pair).unwrap();
        assert_eq!(a.to_bytes(), b.to_bytes());
        assert_eq!(a.to_bytes(), c.to_bytes());
    }

    #[test]
    fn test_malformed_key_error_hides_key() {
        let err = parse_signing_key("deadbeef").unwrap_err();
        assert!(matches!(err, MessageError::MalformedKey(_)));
        assert!(!err.to_string().contains("deadbeef"));

        assert!(parse_signing_key("zz").is_err());
    }

    #[test]
    fn test_invalid_target_is_rejected() {
        let err = build_reaction(
            ActionKind::Like,
            "1234",
            &key(),
            "not-a-fid",
            TARGET,
            FarcasterNetwork::Mainnet,
            at(),
        )
        .unwrap_err();
        assert!(matches!(err, MessageError::InvalidFid(_)));

        let err = build_reaction(
            ActionKind::Like,
            "1234",
            &key(),
            "5650",
            "0xabc",
            FarcasterNetwork::Mainnet,
            at(),
        )
        .unwrap_err();
        assert!(matches!(err, MessageError::InvalidHash(_)));
    }
}
