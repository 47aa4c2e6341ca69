//! # Payload Mappers
//!
//! Pure `bytes -> entity` functions, one per channel kind. The websocket
//! router hands each inbound frame (the whole JSON text) to the mapper bound
//! to its channel; routing fields under `meta` are ignored here.

use serde::Deserialize;
use thiserror::Error;

use crate::events::{
    BlockInfo, CosignatureInfo, DriveStateInfo, ReceiptStatement, StatusInfo, TransactionHash,
    TransactionInfo,
};

/// Errors raised while mapping a payload to an entity.
#[derive(Debug, Error)]
pub enum MappingError {
    /// Payload is not valid JSON or does not match the entity shape.
    #[error("Malformed payload: {0}")]
    Json(#[from] serde_json::Error),

    /// A required field is present but empty.
    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

#[derive(Deserialize)]
struct BlockFrameDto {
    block: BlockDto,
    meta: BlockMetaDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockDto {
    signer: String,
    #[serde(with = "uint64")]
    height: u64,
    #[serde(with = "uint64")]
    timestamp: u64,
    #[serde(default, with = "uint64")]
    difficulty: u64,
    previous_block_hash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockMetaDto {
    hash: String,
    generation_hash: String,
    #[serde(default)]
    num_transactions: u32,
}

#[derive(Deserialize)]
struct TransactionFrameDto {
    transaction: serde_json::Value,
    meta: TransactionMetaDto,
}

#[derive(Deserialize)]
struct TransactionMetaDto {
    #[serde(default)]
    hash: String,
    #[serde(default, with = "opt_uint64")]
    height: Option<u64>,
}

#[derive(Deserialize)]
struct TransactionHeaderDto {
    signer: String,
    #[serde(rename = "type")]
    entity_type: u16,
    version: u32,
    #[serde(with = "uint64")]
    deadline: u64,
}

#[derive(Deserialize)]
struct HashFrameDto {
    meta: TransactionMetaDto,
}

#[derive(Deserialize)]
struct StatementFrameDto {
    statement: ReceiptStatement,
}

/// Map a `block` frame: `{"block": {..}, "meta": {"hash", "generationHash", ..}}`.
pub fn decode_block(payload: &[u8]) -> Result<BlockInfo, MappingError> {
    let dto: BlockFrameDto = serde_json::from_slice(payload)?;
    if dto.meta.hash.is_empty() {
        return Err(MappingError::MissingField("meta.hash"));
    }
    Ok(BlockInfo {
        hash: dto.meta.hash,
        generation_hash: dto.meta.generation_hash,
        height: dto.block.height,
        timestamp: dto.block.timestamp,
        difficulty: dto.block.difficulty,
        signer: dto.block.signer,
        previous_block_hash: dto.block.previous_block_hash,
        num_transactions: dto.meta.num_transactions,
    })
}

/// Map a transaction frame: `{"transaction": {..}, "meta": {"hash", "height"?}}`.
pub fn decode_transaction(payload: &[u8]) -> Result<TransactionInfo, MappingError> {
    let dto: TransactionFrameDto = serde_json::from_slice(payload)?;
    if dto.meta.hash.is_empty() {
        return Err(MappingError::MissingField("meta.hash"));
    }
    let header = TransactionHeaderDto::deserialize(&dto.transaction)?;
    Ok(TransactionInfo {
        hash: dto.meta.hash,
        height: dto.meta.height,
        signer: header.signer,
        entity_type: header.entity_type,
        version: header.version,
        deadline: header.deadline,
        body: dto.transaction,
    })
}

/// Map a removal frame: `{"meta": {"hash"}}`.
pub fn decode_transaction_hash(payload: &[u8]) -> Result<TransactionHash, MappingError> {
    let dto: HashFrameDto = serde_json::from_slice(payload)?;
    if dto.meta.hash.is_empty() {
        return Err(MappingError::MissingField("meta.hash"));
    }
    Ok(TransactionHash(dto.meta.hash))
}

/// Map a `status` frame (flat body).
pub fn decode_status(payload: &[u8]) -> Result<StatusInfo, MappingError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Map a `cosignature` frame (flat body).
pub fn decode_cosignature(payload: &[u8]) -> Result<CosignatureInfo, MappingError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Map a `receipt` frame: `{"statement": {"height", "receipts"}}`.
pub fn decode_receipt(payload: &[u8]) -> Result<ReceiptStatement, MappingError> {
    let dto: StatementFrameDto = serde_json::from_slice(payload)?;
    Ok(dto.statement)
}

/// Map a `driveState` frame (flat body).
pub fn decode_drive_state(payload: &[u8]) -> Result<DriveStateInfo, MappingError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Serde adapter for 64-bit integers.
///
/// The node encodes them as plain numbers, decimal strings, or `[lo, hi]`
/// pairs of 32-bit words depending on the endpoint.
pub(crate) mod uint64 {
    use serde::de::{self, Deserializer, SeqAccess, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(*value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(Uint64Visitor)
    }

    struct Uint64Visitor;

    impl<'de> Visitor<'de> for Uint64Visitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a u64 as a number, a decimal string or a [lo, hi] pair")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
            u64::try_from(value).map_err(|_| E::custom("negative value for uint64"))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
            value.parse().map_err(E::custom)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<u64, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let lo: u32 = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(0, &self))?;
            let hi: u32 = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(1, &self))?;
            Ok((u64::from(hi) << 32) | u64::from(lo))
        }
    }
}

/// [`uint64`] for optional fields.
pub(crate) mod opt_uint64 {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    struct Wrapped(#[serde(with = "super::uint64")] u64);

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<Wrapped>::deserialize(deserializer)?.map(|Wrapped(v)| v))
    }
}
