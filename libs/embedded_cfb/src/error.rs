use crate::SectorId;

/// Error type for compound file stream operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfbError {
    /// Raised by collaborators backed by embedded-io storage.
    IoError(embedded_io::ErrorKind),
    /// A fixed-width integer read ran into the end of the stream.
    IntegerRead { expected: usize, read: usize },
    /// Seek target was past the end of the stream. The cursor is left at the end.
    SeekPastEnd,
    /// Seek target resolved to a position before the start of the stream.
    InvalidSeek,
    InvalidSector(SectorId),
    InvalidOffset,
    UnknownStream,
    BufferTooSmall,
}

impl core::fmt::Display for CfbError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CfbError::IoError(kind) => write!(f, "i/o error: {kind:?}"),
            CfbError::IntegerRead { expected, read } => {
                write!(f, "stream ended inside a {expected} byte integer ({read} bytes read)")
            }
            CfbError::SeekPastEnd => f.write_str("seek past end of stream"),
            CfbError::InvalidSeek => f.write_str("seek before start of stream"),
            CfbError::InvalidSector(id) => write!(f, "invalid sector {id:#x}"),
            CfbError::InvalidOffset => f.write_str("write offset beyond end of stream"),
            CfbError::UnknownStream => f.write_str("unknown stream"),
            CfbError::BufferTooSmall => f.write_str("buffer smaller than one sector"),
        }
    }
}

impl embedded_io::Error for CfbError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self {
            CfbError::IoError(kind) => *kind,
            CfbError::IntegerRead { .. } | CfbError::InvalidSector(_) => {
                embedded_io::ErrorKind::InvalidData
            }
            CfbError::SeekPastEnd | CfbError::InvalidSeek | CfbError::InvalidOffset => {
                embedded_io::ErrorKind::InvalidInput
            }
            CfbError::UnknownStream => embedded_io::ErrorKind::NotFound,
            CfbError::BufferTooSmall => embedded_io::ErrorKind::OutOfMemory,
        }
    }
}
