//! An in-memory compound container.
//!
//! Holds a regular sector table plus the mini stream and hands out sector
//! spaces for both, so cursors can be exercised without a file on disk.

use alloc::{vec, vec::Vec};
use embedded_io::SeekFrom;

use crate::consts::{
    END_OF_CHAIN, FREE_SECTOR, MAX_REGULAR_SECTOR, MINI_SECTOR_SIZE, MINI_STREAM_CUTOFF,
};
use crate::{
    CfbError, ChainWalker, OwnedStreamCursor, SectorId, SectorSource, StreamCursor,
    StreamDescriptor, StreamId, StreamWriter, StreamWriterCursor,
};

#[derive(Debug, Clone, Copy)]
struct Entry {
    descriptor: StreamDescriptor,
    mini: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Area {
    Regular,
    Mini,
}

pub struct MemoryCompound {
    sector_size: usize,
    sectors: Vec<u8>,
    fat: Vec<SectorId>,
    mini_fat: Vec<SectorId>,
    // chain of regular sectors holding all mini sectors back to back
    mini_stream: StreamDescriptor,
    entries: Vec<Entry>,
}

impl MemoryCompound {
    /// # Panics
    /// If `sector_size` is zero.
    pub fn new(sector_size: usize) -> Self {
        Self::from_parts(sector_size, Vec::new(), Vec::new())
    }

    /// Wraps an existing regular sector area and its FAT.
    ///
    /// `sectors` holds sector `n` at byte offset `n * sector_size`.
    ///
    /// # Panics
    /// If `sector_size` is zero.
    pub fn from_parts(sector_size: usize, sectors: Vec<u8>, fat: Vec<SectorId>) -> Self {
        assert!(sector_size > 0, "sector size must be positive");
        Self {
            sector_size,
            sectors,
            fat,
            mini_fat: Vec::new(),
            mini_stream: StreamDescriptor::EMPTY,
            entries: Vec::new(),
        }
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    /// Number of regular sectors, allocated or free.
    pub fn sector_count(&self) -> usize {
        self.fat.len()
    }

    pub fn mini_sector_count(&self) -> usize {
        self.mini_fat.len()
    }

    /// Adds a stream holding `data`. Streams shorter than
    /// [`MINI_STREAM_CUTOFF`] go to the mini stream.
    pub fn add_stream(&mut self, data: &[u8]) -> Result<StreamId, CfbError> {
        let mini = (data.len() as u64) < MINI_STREAM_CUTOFF;
        let area = if mini { Area::Mini } else { Area::Regular };
        let mut descriptor = StreamDescriptor::EMPTY;
        self.write_chain(area, &mut descriptor, data, 0)?;
        self.entries.push(Entry { descriptor, mini });
        Ok(StreamId(self.entries.len() as u32 - 1))
    }

    pub fn descriptor(&self, stream: StreamId) -> Result<StreamDescriptor, CfbError> {
        Ok(self.entry(stream)?.descriptor)
    }

    pub fn is_mini(&self, stream: StreamId) -> Result<bool, CfbError> {
        Ok(self.entry(stream)?.mini)
    }

    pub fn regular(&self) -> RegularSectors<'_> {
        RegularSectors { compound: self }
    }

    pub fn mini(&self) -> MiniSectors<'_> {
        MiniSectors { compound: self }
    }

    /// Sector space the stream currently lives in.
    pub fn space(&self, stream: StreamId) -> Result<StreamSpace<'_>, CfbError> {
        Ok(if self.entry(stream)?.mini {
            StreamSpace::Mini(self.mini())
        } else {
            StreamSpace::Regular(self.regular())
        })
    }

    /// Opens a read cursor on the right sector space for `stream`.
    pub fn stream(
        &self,
        stream: StreamId,
    ) -> Result<OwnedStreamCursor<StreamSpace<'_>>, CfbError> {
        let descriptor = self.descriptor(stream)?;
        StreamCursor::new(self.space(stream)?, descriptor)
    }

    /// Opens a write-capable cursor on `stream`.
    pub fn stream_mut(
        &mut self,
        stream: StreamId,
    ) -> Result<StreamWriterCursor<StreamHandle<'_>, Vec<u8>>, CfbError> {
        // sized for regular sectors so the stream may leave the mini stream
        let buffer = vec![0; self.max_sector_size()];
        StreamWriterCursor::with_buffer(self.handle(stream)?, stream, buffer)
    }

    /// Mutable access to `stream` for a writer with caller-provided buffer.
    pub fn handle(&mut self, stream: StreamId) -> Result<StreamHandle<'_>, CfbError> {
        self.entry(stream)?;
        Ok(StreamHandle {
            compound: self,
            stream,
        })
    }

    fn entry(&self, stream: StreamId) -> Result<Entry, CfbError> {
        self.entries
            .get(stream.0 as usize)
            .copied()
            .ok_or(CfbError::UnknownStream)
    }

    fn area_sector_size(&self, area: Area) -> usize {
        match area {
            Area::Regular => self.sector_size,
            Area::Mini => MINI_SECTOR_SIZE,
        }
    }

    fn table(&mut self, area: Area) -> &mut Vec<SectorId> {
        match area {
            Area::Regular => &mut self.fat,
            Area::Mini => &mut self.mini_fat,
        }
    }

    fn next(&mut self, area: Area, sector: SectorId) -> Result<SectorId, CfbError> {
        self.table(area)
            .get(sector as usize)
            .copied()
            .ok_or(CfbError::InvalidSector(sector))
    }

    /// Takes the first free sector, or grows the table by one, and links it
    /// behind `prev`.
    fn allocate(&mut self, area: Area, prev: Option<SectorId>) -> Result<SectorId, CfbError> {
        let free = self.table(area).iter().position(|&s| s == FREE_SECTOR);
        let sector = match free {
            Some(index) => index,
            None => self.table(area).len(),
        };
        if sector as u64 > MAX_REGULAR_SECTOR as u64 {
            return Err(CfbError::IoError(embedded_io::ErrorKind::OutOfMemory));
        }
        let sector = sector as SectorId;
        let sector_size = self.area_sector_size(area);
        match area {
            Area::Regular => {
                let start = sector as usize * sector_size;
                if free.is_none() {
                    self.fat.push(END_OF_CHAIN);
                    self.sectors.resize(start + sector_size, 0);
                } else {
                    self.sectors[start..start + sector_size].fill(0);
                }
            }
            Area::Mini => {
                if free.is_none() {
                    self.mini_fat.push(END_OF_CHAIN);
                    let mut mini_stream = self.mini_stream;
                    let len = mini_stream.len;
                    self.write_chain(Area::Regular, &mut mini_stream, &[0; MINI_SECTOR_SIZE], len)?;
                    self.mini_stream = mini_stream;
                } else {
                    self.put(area, sector, 0, &[0; MINI_SECTOR_SIZE])?;
                }
            }
        }
        self.table(area)[sector as usize] = END_OF_CHAIN;
        if let Some(prev) = prev {
            self.table(area)[prev as usize] = sector;
        }
        trace!("Allocated {:?} sector {:#x}", area, sector);
        Ok(sector)
    }

    fn free_chain(&mut self, area: Area, start: SectorId) -> Result<(), CfbError> {
        let mut sector = start;
        while sector != END_OF_CHAIN {
            let next = self.next(area, sector)?;
            self.table(area)[sector as usize] = FREE_SECTOR;
            sector = next;
        }
        Ok(())
    }

    /// Copies `data` into sector `sector` starting at `offset` within it.
    fn put(&mut self, area: Area, sector: SectorId, offset: usize, data: &[u8]) -> Result<(), CfbError> {
        match area {
            Area::Regular => {
                let start = sector as usize * self.sector_size + offset;
                self.sectors
                    .get_mut(start..start + data.len())
                    .ok_or(CfbError::InvalidSector(sector))?
                    .copy_from_slice(data);
            }
            Area::Mini => {
                let mut mini_stream = self.mini_stream;
                let at = sector as u64 * MINI_SECTOR_SIZE as u64 + offset as u64;
                self.write_chain(Area::Regular, &mut mini_stream, data, at)?;
                self.mini_stream = mini_stream;
            }
        }
        Ok(())
    }

    /// Writes `data` at `offset` into the chain described by `descriptor`,
    /// growing the chain as needed.
    fn write_chain(
        &mut self,
        area: Area,
        descriptor: &mut StreamDescriptor,
        data: &[u8],
        offset: u64,
    ) -> Result<(), CfbError> {
        if data.is_empty() {
            return Ok(());
        }
        if offset > descriptor.len {
            return Err(CfbError::InvalidOffset);
        }
        let sector_size = self.area_sector_size(area);
        if descriptor.start == END_OF_CHAIN {
            descriptor.start = self.allocate(area, None)?;
        }

        let mut sector = descriptor.start;
        for _ in 0..offset / sector_size as u64 {
            sector = self.next_or_allocate(area, sector)?;
        }

        let mut written = 0;
        let mut in_sector = (offset % sector_size as u64) as usize;
        loop {
            let n = core::cmp::min(sector_size - in_sector, data.len() - written);
            self.put(area, sector, in_sector, &data[written..written + n])?;
            written += n;
            in_sector = 0;
            if written == data.len() {
                break;
            }
            sector = self.next_or_allocate(area, sector)?;
        }

        descriptor.len = core::cmp::max(descriptor.len, offset + data.len() as u64);
        Ok(())
    }

    fn next_or_allocate(&mut self, area: Area, sector: SectorId) -> Result<SectorId, CfbError> {
        match self.next(area, sector)? {
            END_OF_CHAIN => self.allocate(area, Some(sector)),
            next => Ok(next),
        }
    }

    /// Moves a mini stream into regular sectors.
    fn relocate(&mut self, stream: StreamId) -> Result<(), CfbError> {
        let entry = self.entry(stream)?;
        let content = StreamCursor::new(self.mini(), entry.descriptor)?.read_vec(None)?;
        self.free_chain(Area::Mini, entry.descriptor.start)?;
        let mut descriptor = StreamDescriptor::EMPTY;
        self.write_chain(Area::Regular, &mut descriptor, &content, 0)?;
        trace!(
            "Moved stream {} out of the mini stream to sector {:#x}",
            stream.0,
            descriptor.start
        );
        self.entries[stream.0 as usize] = Entry {
            descriptor,
            mini: false,
        };
        Ok(())
    }
}

impl StreamWriter for MemoryCompound {
    fn write_stream(
        &mut self,
        stream: StreamId,
        data: &[u8],
        offset: u64,
    ) -> Result<usize, CfbError> {
        let entry = self.entry(stream)?;
        if offset > entry.descriptor.len {
            return Err(CfbError::InvalidOffset);
        }
        if entry.mini && offset + data.len() as u64 >= MINI_STREAM_CUTOFF {
            self.relocate(stream)?;
        }
        let mut entry = self.entry(stream)?;
        let area = if entry.mini { Area::Mini } else { Area::Regular };
        self.write_chain(area, &mut entry.descriptor, data, offset)?;
        self.entries[stream.0 as usize] = entry;
        Ok(data.len())
    }

    fn stream_descriptor(&self, stream: StreamId) -> Result<StreamDescriptor, CfbError> {
        self.descriptor(stream)
    }

    fn max_sector_size(&self) -> usize {
        core::cmp::max(self.sector_size, MINI_SECTOR_SIZE)
    }
}

/// The regular sector space of a [`MemoryCompound`].
#[derive(Clone, Copy)]
pub struct RegularSectors<'a> {
    compound: &'a MemoryCompound,
}

impl SectorSource for RegularSectors<'_> {
    fn sector_size(&self) -> usize {
        self.compound.sector_size
    }

    fn read_sector(&self, id: SectorId, buf: &mut [u8]) -> Result<(), CfbError> {
        let sector_size = self.compound.sector_size;
        let start = id as usize * sector_size;
        let data = self
            .compound
            .sectors
            .get(start..start + sector_size)
            .ok_or(CfbError::InvalidSector(id))?;
        buf[..sector_size].copy_from_slice(data);
        Ok(())
    }
}

impl ChainWalker for RegularSectors<'_> {
    fn next_sector(&self, id: SectorId) -> Result<SectorId, CfbError> {
        self.compound
            .fat
            .get(id as usize)
            .copied()
            .ok_or(CfbError::InvalidSector(id))
    }
}

/// The mini sector space of a [`MemoryCompound`].
///
/// Mini sectors are read out of the mini stream through a regular space
/// cursor, so each read walks the mini stream's chain from its start and
/// reading a whole mini stream costs O(n²) regular chain hops.
#[derive(Clone, Copy)]
pub struct MiniSectors<'a> {
    compound: &'a MemoryCompound,
}

impl SectorSource for MiniSectors<'_> {
    fn sector_size(&self) -> usize {
        MINI_SECTOR_SIZE
    }

    fn read_sector(&self, id: SectorId, buf: &mut [u8]) -> Result<(), CfbError> {
        if id as usize >= self.compound.mini_fat.len() {
            return Err(CfbError::InvalidSector(id));
        }
        let mut cursor = StreamCursor::new(self.compound.regular(), self.compound.mini_stream)?;
        let at = id as u64 * MINI_SECTOR_SIZE as u64;
        if !cursor.seek(SeekFrom::Start(at))?.is_in_bounds() {
            return Err(CfbError::InvalidSector(id));
        }
        if cursor.read(&mut buf[..MINI_SECTOR_SIZE])? < MINI_SECTOR_SIZE {
            return Err(CfbError::InvalidSector(id));
        }
        Ok(())
    }
}

impl ChainWalker for MiniSectors<'_> {
    fn next_sector(&self, id: SectorId) -> Result<SectorId, CfbError> {
        self.compound
            .mini_fat
            .get(id as usize)
            .copied()
            .ok_or(CfbError::InvalidSector(id))
    }
}

/// Either sector space of a [`MemoryCompound`].
#[derive(Clone, Copy)]
pub enum StreamSpace<'a> {
    Regular(RegularSectors<'a>),
    Mini(MiniSectors<'a>),
}

impl SectorSource for StreamSpace<'_> {
    fn sector_size(&self) -> usize {
        match self {
            StreamSpace::Regular(space) => space.sector_size(),
            StreamSpace::Mini(space) => space.sector_size(),
        }
    }

    fn read_sector(&self, id: SectorId, buf: &mut [u8]) -> Result<(), CfbError> {
        match self {
            StreamSpace::Regular(space) => space.read_sector(id, buf),
            StreamSpace::Mini(space) => space.read_sector(id, buf),
        }
    }
}

impl ChainWalker for StreamSpace<'_> {
    fn next_sector(&self, id: SectorId) -> Result<SectorId, CfbError> {
        match self {
            StreamSpace::Regular(space) => space.next_sector(id),
            StreamSpace::Mini(space) => space.next_sector(id),
        }
    }
}

/// Mutable access to one stream of a [`MemoryCompound`].
///
/// Resolves sectors against whichever space the stream lives in right now,
/// which changes when a growing mini stream is moved to regular sectors.
pub struct StreamHandle<'a> {
    compound: &'a mut MemoryCompound,
    stream: StreamId,
}

impl StreamHandle<'_> {
    fn space(&self) -> StreamSpace<'_> {
        match self.compound.is_mini(self.stream) {
            Ok(false) => StreamSpace::Regular(self.compound.regular()),
            _ => StreamSpace::Mini(self.compound.mini()),
        }
    }
}

impl SectorSource for StreamHandle<'_> {
    fn sector_size(&self) -> usize {
        self.space().sector_size()
    }

    fn read_sector(&self, id: SectorId, buf: &mut [u8]) -> Result<(), CfbError> {
        self.space().read_sector(id, buf)
    }
}

impl ChainWalker for StreamHandle<'_> {
    fn next_sector(&self, id: SectorId) -> Result<SectorId, CfbError> {
        self.space().next_sector(id)
    }
}

impl StreamWriter for StreamHandle<'_> {
    fn write_stream(
        &mut self,
        stream: StreamId,
        data: &[u8],
        offset: u64,
    ) -> Result<usize, CfbError> {
        self.compound.write_stream(stream, data, offset)
    }

    fn stream_descriptor(&self, stream: StreamId) -> Result<StreamDescriptor, CfbError> {
        self.compound.descriptor(stream)
    }

    fn max_sector_size(&self) -> usize {
        self.compound.max_sector_size()
    }
}
