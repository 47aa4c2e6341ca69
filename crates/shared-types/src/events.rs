//! # Notification Entities
//!
//! Domain objects delivered to websocket handlers. One entity per channel
//! kind; several transaction channels share [`TransactionInfo`].
//!
//! ## Channel → Entity
//!
//! | Channel | Entity |
//! |---------|--------|
//! | `block` | [`BlockInfo`] |
//! | `confirmedAdded`, `unconfirmedAdded`, `partialAdded` | [`TransactionInfo`] |
//! | `unconfirmedRemoved`, `partialRemoved` | [`TransactionHash`] |
//! | `status` | [`StatusInfo`] |
//! | `cosignature` | [`CosignatureInfo`] |
//! | `receipt` | [`ReceiptStatement`] |
//! | `driveState` | [`DriveStateInfo`] |

use serde::{Deserialize, Serialize};

use crate::mapping::uint64;

/// Hex-encoded hash as sent by the node.
pub type HashHex = String;

/// Account address in the node's textual encoding.
pub type AddressText = String;

/// A block announced on the `block` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    /// Entity hash of the block.
    pub hash: HashHex,
    /// Generation hash used to derive the next block's proof.
    pub generation_hash: HashHex,
    /// Height in the chain.
    #[serde(with = "uint64")]
    pub height: u64,
    /// Network timestamp (milliseconds since the nemesis block).
    #[serde(with = "uint64")]
    pub timestamp: u64,
    #[serde(with = "uint64")]
    pub difficulty: u64,
    /// Public key of the harvester.
    pub signer: String,
    pub previous_block_hash: HashHex,
    /// Transactions included in the block.
    pub num_transactions: u32,
}

/// A transaction observed on one of the `*Added` channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransactionInfo {
    pub hash: HashHex,
    /// Height the transaction was confirmed at. `None` while unconfirmed or partial.
    pub height: Option<u64>,
    /// Public key of the signer.
    pub signer: String,
    /// Entity type code (transfer, aggregate, ...).
    pub entity_type: u16,
    pub version: u32,
    pub deadline: u64,
    /// Full transaction body. Typed decoding lives with the transaction builders.
    pub body: serde_json::Value,
}

impl TransactionInfo {
    /// True once the node reports a confirmation height.
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }
}

/// Hash of a transaction dropped from the unconfirmed or partial cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TransactionHash(pub HashHex);

/// Transaction validation result pushed on the `status` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusInfo {
    pub hash: HashHex,
    /// Validation result code, e.g. `Failure_Core_Insufficient_Balance`.
    pub status: String,
    #[serde(with = "uint64")]
    pub deadline: u64,
}

impl StatusInfo {
    /// True when the status reports a rejection.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.status.starts_with("Failure")
    }
}

/// A cosignature added to a partial aggregate transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CosignatureInfo {
    /// Hash of the aggregate being cosigned.
    pub parent_hash: HashHex,
    pub signature: String,
    /// Public key of the cosigner.
    pub signer: String,
}

/// A single receipt inside a [`ReceiptStatement`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Receipt {
    pub version: u16,
    #[serde(rename = "type")]
    pub receipt_type: u16,
    /// Type-specific fields.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Receipts emitted while executing a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ReceiptStatement {
    #[serde(with = "uint64")]
    pub height: u64,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
}

/// Lifecycle state of a storage drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum DriveState {
    NotStarted,
    Pending,
    InProgress,
    Finished,
    /// A state code this SDK version does not know yet.
    Unknown(u8),
}

impl From<u8> for DriveState {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::NotStarted,
            1 => Self::Pending,
            2 => Self::InProgress,
            3 => Self::Finished,
            other => Self::Unknown(other),
        }
    }
}

impl From<DriveState> for u8 {
    fn from(state: DriveState) -> Self {
        match state {
            DriveState::NotStarted => 0,
            DriveState::Pending => 1,
            DriveState::InProgress => 2,
            DriveState::Finished => 3,
            DriveState::Unknown(code) => code,
        }
    }
}

/// Drive state transition pushed on the `driveState` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveStateInfo {
    /// Public key of the drive account.
    pub drive_key: String,
    pub state: DriveState,
}
