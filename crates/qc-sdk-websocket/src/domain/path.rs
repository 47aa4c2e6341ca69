//! Channel names and subscription paths.
//!
//! A [`Path`] is the unit of subscription: its canonical string is both the
//! argument of subscribe/unsubscribe control frames and the registry key.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::EnvelopeError;

/// The event kinds pushed by the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    Block,
    ConfirmedAdded,
    UnconfirmedAdded,
    UnconfirmedRemoved,
    Status,
    PartialAdded,
    PartialRemoved,
    Cosignature,
    Receipt,
    DriveState,
}

impl Channel {
    /// Every known channel, in wire-documentation order.
    pub const ALL: [Channel; 10] = [
        Channel::Block,
        Channel::ConfirmedAdded,
        Channel::UnconfirmedAdded,
        Channel::UnconfirmedRemoved,
        Channel::Status,
        Channel::PartialAdded,
        Channel::PartialRemoved,
        Channel::Cosignature,
        Channel::Receipt,
        Channel::DriveState,
    ];

    /// Wire name of the channel.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Channel::Block => "block",
            Channel::ConfirmedAdded => "confirmedAdded",
            Channel::UnconfirmedAdded => "unconfirmedAdded",
            Channel::UnconfirmedRemoved => "unconfirmedRemoved",
            Channel::Status => "status",
            Channel::PartialAdded => "partialAdded",
            Channel::PartialRemoved => "partialRemoved",
            Channel::Cosignature => "cosignature",
            Channel::Receipt => "receipt",
            Channel::DriveState => "driveState",
        }
    }

    /// Addressed channels are subscribed per account or drive key;
    /// `block` and `receipt` are global.
    #[must_use]
    pub const fn is_addressed(self) -> bool {
        !matches!(self, Channel::Block | Channel::Receipt)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = EnvelopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EnvelopeError::UnknownChannel(s.to_string()))
    }
}

/// Channel name plus optional key. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    channel_name: String,
    key: Option<String>,
    canonical: String,
}

impl Path {
    /// Build a path. An empty key is the same as no key.
    pub fn parse(channel_name: impl Into<String>, key: Option<&str>) -> Self {
        let channel_name = channel_name.into();
        let key = key.filter(|k| !k.is_empty()).map(str::to_string);
        let canonical = match &key {
            Some(k) => format!("{channel_name}/{k}"),
            None => channel_name.clone(),
        };
        Self {
            channel_name,
            key,
            canonical,
        }
    }

    /// Path for a known channel.
    pub fn for_channel(channel: Channel, key: Option<&str>) -> Self {
        Self::parse(channel.as_str(), key)
    }

    /// Inverse of [`Path::canonical`]: splits at the first `/`.
    pub fn from_canonical(canonical: &str) -> Self {
        match canonical.split_once('/') {
            Some((channel, key)) => Self::parse(channel, Some(key)),
            None => Self::parse(canonical, None),
        }
    }

    /// `"channelName"` or `"channelName/key"`.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    #[must_use]
    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_forms() {
        assert_eq!(Path::parse("status", Some("ABC")).canonical(), "status/ABC");
        assert_eq!(Path::parse("block", None).canonical(), "block");
    }

    #[test]
    fn test_empty_key_is_global() {
        let path = Path::parse("block", Some(""));
        assert_eq!(path.canonical(), "block");
        assert_eq!(path.key(), None);
        assert_eq!(path, Path::parse("block", None));
    }

    #[test]
    fn test_from_canonical_splits_first_slash() {
        let path = Path::from_canonical("driveState/KEY/WITH/SLASH");
        assert_eq!(path.channel_name(), "driveState");
        assert_eq!(path.key(), Some("KEY/WITH/SLASH"));
        assert_eq!(path.canonical(), "driveState/KEY/WITH/SLASH");
    }

    #[test]
    fn test_channel_names() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert!(matches!(
            "newHeads".parse::<Channel>(),
            Err(EnvelopeError::UnknownChannel(_))
        ));
    }

    #[test]
    fn test_addressed_channels() {
        assert!(!Channel::Block.is_addressed());
        assert!(!Channel::Receipt.is_addressed());
        assert!(Channel::Status.is_addressed());
        assert!(Channel::DriveState.is_addressed());
    }
}
