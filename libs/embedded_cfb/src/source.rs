use crate::{CfbError, SectorId};

/// Raw sector storage of one address space.
pub trait SectorSource {
    /// Size of one sector in bytes. Constant between writes; a write may
    /// move a stream into a space with a different sector size.
    fn sector_size(&self) -> usize;

    /// Fills `buf` with exactly `sector_size()` bytes of sector `id`.
    /// `buf` is at least `sector_size()` long.
    fn read_sector(&self, id: SectorId, buf: &mut [u8]) -> Result<(), CfbError>;
}

/// Sector allocation table of one address space.
pub trait ChainWalker {
    /// Returns the sector following `id` in its chain, or
    /// [`END_OF_CHAIN`](crate::consts::END_OF_CHAIN) if `id` is the last one.
    fn next_sector(&self, id: SectorId) -> Result<SectorId, CfbError>;
}

/// Identifies a stream inside the owning container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamId(pub u32);

/// Where a stream lives and how long it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub start: SectorId,
    pub len: u64,
}

impl StreamDescriptor {
    pub const EMPTY: StreamDescriptor = StreamDescriptor {
        start: crate::consts::END_OF_CHAIN,
        len: 0,
    };

    pub fn new(start: SectorId, len: u64) -> Self {
        Self { start, len }
    }
}

/// Write access to the streams of the owning container.
///
/// The container owns allocation: it may extend a chain or move the
/// stream to a different address space entirely, so callers have to
/// fetch a fresh descriptor after every write.
pub trait StreamWriter {
    /// Writes `data` at the absolute stream offset `offset` and returns the
    /// number of bytes committed.
    fn write_stream(&mut self, stream: StreamId, data: &[u8], offset: u64)
    -> Result<usize, CfbError>;

    fn stream_descriptor(&self, stream: StreamId) -> Result<StreamDescriptor, CfbError>;

    /// Largest sector size any write may move a stream into.
    fn max_sector_size(&self) -> usize;
}

impl<T: SectorSource + ?Sized> SectorSource for &T {
    fn sector_size(&self) -> usize {
        T::sector_size(self)
    }

    fn read_sector(&self, id: SectorId, buf: &mut [u8]) -> Result<(), CfbError> {
        T::read_sector(self, id, buf)
    }
}

impl<T: SectorSource + ?Sized> SectorSource for &mut T {
    fn sector_size(&self) -> usize {
        T::sector_size(self)
    }

    fn read_sector(&self, id: SectorId, buf: &mut [u8]) -> Result<(), CfbError> {
        T::read_sector(self, id, buf)
    }
}

impl<T: ChainWalker + ?Sized> ChainWalker for &T {
    fn next_sector(&self, id: SectorId) -> Result<SectorId, CfbError> {
        T::next_sector(self, id)
    }
}

impl<T: ChainWalker + ?Sized> ChainWalker for &mut T {
    fn next_sector(&self, id: SectorId) -> Result<SectorId, CfbError> {
        T::next_sector(self, id)
    }
}

impl<T: StreamWriter + ?Sized> StreamWriter for &mut T {
    fn write_stream(
        &mut self,
        stream: StreamId,
        data: &[u8],
        offset: u64,
    ) -> Result<usize, CfbError> {
        T::write_stream(self, stream, data, offset)
    }

    fn stream_descriptor(&self, stream: StreamId) -> Result<StreamDescriptor, CfbError> {
        T::stream_descriptor(self, stream)
    }

    fn max_sector_size(&self) -> usize {
        T::max_sector_size(self)
    }
}
