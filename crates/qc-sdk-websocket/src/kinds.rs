//! Event kinds: one marker type per channel.
//!
//! | Marker | Channel | Event | Key |
//! |--------|---------|-------|-----|
//! | `BlockEvents` | `block` | `BlockInfo` | none |
//! | `ConfirmedAddedEvents` | `confirmedAdded` | `TransactionInfo` | address |
//! | `UnconfirmedAddedEvents` | `unconfirmedAdded` | `TransactionInfo` | address |
//! | `UnconfirmedRemovedEvents` | `unconfirmedRemoved` | `TransactionHash` | address |
//! | `StatusEvents` | `status` | `StatusInfo` | address |
//! | `PartialAddedEvents` | `partialAdded` | `TransactionInfo` | address |
//! | `PartialRemovedEvents` | `partialRemoved` | `TransactionHash` | address |
//! | `CosignatureEvents` | `cosignature` | `CosignatureInfo` | address |
//! | `ReceiptEvents` | `receipt` | `ReceiptStatement` | none |
//! | `DriveStateEvents` | `driveState` | `DriveStateInfo` | drive key |

use shared_types::{
    decode_block, decode_cosignature, decode_drive_state, decode_receipt, decode_status,
    decode_transaction, decode_transaction_hash, BlockInfo, CosignatureInfo, DriveStateInfo,
    MappingError, ReceiptStatement, StatusInfo, TransactionHash, TransactionInfo,
};

use crate::domain::Channel;

/// Ties a marker type to its channel, event type and default mapper.
pub trait EventKind: Send + Sync + 'static {
    const CHANNEL: Channel;

    type Event: Send + Sync + 'static;

    fn decode(payload: &[u8]) -> Result<Self::Event, MappingError>;
}

macro_rules! event_kind {
    ($(#[$doc:meta])* $marker:ident, $channel:ident, $event:ty, $decode:path) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $marker;

        impl EventKind for $marker {
            const CHANNEL: Channel = Channel::$channel;
            type Event = $event;

            fn decode(payload: &[u8]) -> Result<Self::Event, MappingError> {
                $decode(payload)
            }
        }
    };
}

event_kind!(
    /// New blocks.
    BlockEvents, Block, BlockInfo, decode_block
);
event_kind!(
    /// Transactions confirmed for an address.
    ConfirmedAddedEvents, ConfirmedAdded, TransactionInfo, decode_transaction
);
event_kind!(
    UnconfirmedAddedEvents, UnconfirmedAdded, TransactionInfo, decode_transaction
);
event_kind!(
    UnconfirmedRemovedEvents, UnconfirmedRemoved, TransactionHash, decode_transaction_hash
);
event_kind!(
    /// Transaction validation errors.
    StatusEvents, Status, StatusInfo, decode_status
);
event_kind!(
    /// Aggregate transactions waiting for cosignatures.
    PartialAddedEvents, PartialAdded, TransactionInfo, decode_transaction
);
event_kind!(
    PartialRemovedEvents, PartialRemoved, TransactionHash, decode_transaction_hash
);
event_kind!(
    CosignatureEvents, Cosignature, CosignatureInfo, decode_cosignature
);
event_kind!(
    /// Block receipt statements.
    ReceiptEvents, Receipt, ReceiptStatement, decode_receipt
);
event_kind!(
    /// Storage drive state changes, keyed by drive.
    DriveStateEvents, DriveState, DriveStateInfo, decode_drive_state
);
