//! Error types for the protocol layer.
//!
//! Every decode failure is a distinct variant so the receive path can log
//! exactly why a packet was dropped. None of them are fatal: the caller
//! drops the one packet and keeps the connection.

use crate::Kind;

/// Errors that can occur while encoding or decoding packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A field read ran past the end of the buffer.
    ///
    /// `kind` is `None` when the buffer was too short to hold the tag.
    #[error("packet too small: {} needs {needed} more bytes, {remaining} left", kind_name(.kind))]
    PacketTooSmall {
        kind: Option<Kind>,
        needed: usize,
        remaining: usize,
    },

    /// Every field decoded but bytes were left over. Packets are exact-length.
    #[error("packet too large: {kind} has {trailing} trailing bytes")]
    PacketTooLarge { kind: Kind, trailing: usize },

    /// The kind tag is not in the registry.
    #[error("invalid packet type 0x{0:04x}")]
    InvalidPacketType(u16),

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in string field")]
    InvalidUtf8,

    /// A bool field held something other than 0 or 1.
    #[error("invalid bool byte {0}")]
    InvalidBool(u8),

    /// A flag group had bits set that no flag owns.
    #[error("invalid bits 0x{bits:x} for flag group {field}")]
    InvalidFlags { field: &'static str, bits: u32 },

    /// An enum field held an unassigned value.
    #[error("invalid value {value} for {field}")]
    InvalidEnum { field: &'static str, value: u8 },

    /// A string or array is longer than its 2-byte length prefix allows.
    #[error("field too long to encode: {len} exceeds {max}")]
    FieldTooLong { len: usize, max: usize },
}

fn kind_name(kind: &Option<Kind>) -> String {
    match kind {
        Some(kind) => kind.to_string(),
        None => "kind tag".to_string(),
    }
}

impl ProtocolError {
    /// Returns `true` for the framing errors (too small, too large, unknown
    /// kind) as opposed to field-level content errors.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::PacketTooSmall { .. } | Self::PacketTooLarge { .. } | Self::InvalidPacketType(_)
        )
    }
}
