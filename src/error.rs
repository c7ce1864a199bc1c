//! errors raised while decoding or encoding the on-disk structures
use std::io;

use thiserror::Error;

/// Every failure surfaced by the accessors.
///
/// Variants fall into three groups:
/// - malformed structures ([InvalidSignature](Ext2Error::InvalidSignature),
///   [InvalidField](Ext2Error::InvalidField),
///   [DescriptorCountMismatch](Ext2Error::DescriptorCountMismatch)),
///   the image can't be trusted for that structure;
/// - invalid arguments ([OutOfRange](Ext2Error::OutOfRange),
///   [InvalidArgument](Ext2Error::InvalidArgument)), the caller asked for
///   something that can't exist;
/// - failures of the backing store ([Io](Ext2Error::Io)) and of the record codec.
#[derive(Debug, Error)]
pub enum Ext2Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid signature: expected {expected:#06x}, got {actual:#06x}")]
    InvalidSignature { expected: u16, actual: u16 },

    #[error("invalid {field}: {value:#x}")]
    InvalidField { field: &'static str, value: u64 },

    #[error("descriptor table length mismatch: expected {expected} descriptors, got {actual}")]
    DescriptorCountMismatch { expected: usize, actual: usize },

    #[error("{argument} out of range: {value} (limit {limit})")]
    OutOfRange {
        argument: &'static str,
        value: u64,
        limit: u64,
    },

    #[error("invalid {argument}: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },

    #[error("failed to decode record: {0}")]
    Decode(#[from] bincode::error::DecodeError),

    #[error("failed to encode record: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

pub type Result<T> = std::result::Result<T, Ext2Error>;

impl Ext2Error {
    /// the structure on disk does not follow the format
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Ext2Error::InvalidSignature { .. }
                | Ext2Error::InvalidField { .. }
                | Ext2Error::DescriptorCountMismatch { .. }
                | Ext2Error::Decode(_)
        )
    }

    /// the caller passed an index, size or value that can't be served
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Ext2Error::OutOfRange { .. } | Ext2Error::InvalidArgument { .. }
        )
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Ext2Error::Io(_))
    }

    pub(crate) fn invalid_field(field: &'static str, value: impl Into<u64>) -> Self {
        Ext2Error::InvalidField {
            field,
            value: value.into(),
        }
    }

    pub(crate) fn out_of_range(
        argument: &'static str,
        value: impl Into<u64>,
        limit: impl Into<u64>,
    ) -> Self {
        Ext2Error::OutOfRange {
            argument,
            value: value.into(),
            limit: limit.into(),
        }
    }

    pub(crate) fn invalid_argument(argument: &'static str, reason: impl Into<String>) -> Self {
        Ext2Error::InvalidArgument {
            argument,
            reason: reason.into(),
        }
    }
}
