use embedded_io::SeekFrom;

use crate::consts::END_OF_CHAIN;
use crate::{CfbError, ChainWalker, SectorId, SectorSource, StreamDescriptor};

/// Result of a [`StreamCursor::seek`].
///
/// Seeking past the end of a stream is not an error: the cursor is clamped
/// to the end and `PastEnd` is returned.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    InBounds,
    PastEnd,
}

impl SeekOutcome {
    pub fn is_in_bounds(self) -> bool {
        self == SeekOutcome::InBounds
    }
}

/// Random access reader for one stream of a compound file.
///
/// The same type serves regular and mini streams, the address space is
/// whatever `S` resolves sector ids against. At most one sector is held
/// in `buffer`; re-seeking inside that sector neither refetches it nor
/// walks the chain again.
///
/// Seeking to a different sector walks the chain from the start of the
/// stream, so a seek costs O(target sector index) calls to
/// [`ChainWalker::next_sector`].
pub struct StreamCursor<S, Buffer> {
    space: S,
    descriptor: StreamDescriptor,
    pos: u64,
    // `None` while the sector under `pos` is unknown and has to be walked to.
    chain: Option<SectorId>,
    buffer: Buffer,
    buffered: bool,
}

impl<'a, S: SectorSource + ChainWalker> StreamCursor<S, &'a mut [u8]> {
    /// Creates a new cursor with a borrowed sector buffer.
    /// The buffer must hold at least one sector.
    /// ```
    /// # use embedded_cfb::{MemoryCompound, StreamCursor, CfbError};
    /// # fn main() -> Result<(), CfbError> {
    /// let mut compound = MemoryCompound::new(512);
    /// let id = compound.add_stream(&[7u8; 5000])?;
    /// let descriptor = compound.descriptor(id)?;
    /// let mut buffer = [0u8; 512];
    /// let mut cursor = StreamCursor::new_borrowed(compound.regular(), descriptor, &mut buffer)?;
    /// assert_eq!(cursor.read_u8()?, 7);
    /// # Ok(())
    /// # }
    /// ```
    pub fn new_borrowed(
        space: S,
        descriptor: StreamDescriptor,
        buffer: &'a mut [u8],
    ) -> Result<Self, CfbError> {
        Self::new_with_buffer(space, descriptor, buffer)
    }
}

#[cfg(feature = "alloc")]
impl<S: SectorSource + ChainWalker> StreamCursor<S, alloc::vec::Vec<u8>> {
    /// Creates a new cursor owning a buffer of one sector.
    /// ```
    /// # use embedded_cfb::{MemoryCompound, StreamCursor, CfbError};
    /// # fn main() -> Result<(), CfbError> {
    /// let mut compound = MemoryCompound::new(512);
    /// let id = compound.add_stream(b"hello compound file")?;
    /// let mut cursor = StreamCursor::new(compound.mini(), compound.descriptor(id)?)?;
    /// assert_eq!(cursor.read_vec(Some(5))?, b"hello");
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(space: S, descriptor: StreamDescriptor) -> Result<Self, CfbError> {
        let buffer = alloc::vec![0; space.sector_size()];
        Self::new_with_buffer(space, descriptor, buffer)
    }
}

impl<S, Buffer> StreamCursor<S, Buffer>
where
    S: SectorSource + ChainWalker,
    Buffer: AsRef<[u8]> + AsMut<[u8]>,
{
    pub(crate) fn new_with_buffer(
        space: S,
        descriptor: StreamDescriptor,
        buffer: Buffer,
    ) -> Result<Self, CfbError> {
        if buffer.as_ref().len() < space.sector_size() {
            return Err(CfbError::BufferTooSmall);
        }
        Ok(StreamCursor {
            space,
            descriptor,
            pos: 0,
            chain: Some(descriptor.start),
            buffer,
            buffered: false,
        })
    }

    pub fn descriptor(&self) -> StreamDescriptor {
        self.descriptor
    }

    pub fn sector_size(&self) -> usize {
        self.space.sector_size()
    }

    /// Length of the stream in bytes.
    pub fn len(&self) -> u64 {
        self.descriptor.len
    }

    pub fn is_empty(&self) -> bool {
        self.descriptor.len == 0
    }

    /// Current absolute position.
    pub fn tell(&self) -> u64 {
        self.pos
    }

    pub fn eof(&self) -> bool {
        self.pos == self.descriptor.len
    }

    /// Moves the cursor.
    ///
    /// A target past the end clamps the cursor to the end and returns
    /// [`SeekOutcome::PastEnd`]. A target before the start is an error and
    /// leaves the cursor where it was.
    pub fn seek(&mut self, pos: SeekFrom) -> Result<SeekOutcome, CfbError> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(n) => self.pos.checked_add_signed(n),
            SeekFrom::End(n) => self.descriptor.len.checked_add_signed(n),
        }
        .ok_or(CfbError::InvalidSeek)?;

        if target > self.descriptor.len {
            trace!(
                "Seek to {} clamped to end of stream at {}",
                target,
                self.descriptor.len
            );
            self.pos = self.descriptor.len;
            self.chain = None;
            self.buffered = false;
            return Ok(SeekOutcome::PastEnd);
        }

        let sector_size = self.sector_size() as u64;
        if self.chain.is_none() || target / sector_size != self.pos / sector_size {
            self.buffered = false;
            self.chain = None;
            let sector = self.walk(target / sector_size)?;
            self.chain = Some(sector);
        }
        self.pos = target;
        Ok(SeekOutcome::InBounds)
    }

    /// Moves back to the start of the stream, dropping the buffered sector.
    pub fn rewind(&mut self) {
        self.pos = 0;
        self.chain = Some(self.descriptor.start);
        self.buffered = false;
    }

    /// Reads up to `buf.len()` bytes and returns how many were read.
    ///
    /// Returns 0 at the end of the stream. A chain that ends before the
    /// stream length is reached yields a short read, not an error.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, CfbError> {
        let result = self.read_sectors(buf);
        if result.is_err() {
            // the chain pointer may already be past `pos`
            self.chain = None;
            self.buffered = false;
        }
        result
    }

    fn read_sectors(&mut self, buf: &mut [u8]) -> Result<usize, CfbError> {
        let remaining = self.descriptor.len - self.pos;
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = core::cmp::min(buf.len() as u64, remaining) as usize;
        let sector_size = self.sector_size();

        let mut sector = match self.chain {
            Some(sector) => sector,
            None => {
                let sector = self.walk(self.pos / sector_size as u64)?;
                self.chain = Some(sector);
                sector
            }
        };

        if !self.buffered {
            if sector == END_OF_CHAIN {
                trace!("Chain ended before position {}", self.pos);
                return Ok(0);
            }
            self.fill(sector)?;
        }

        let offset = (self.pos % sector_size as u64) as usize;
        let in_sector = sector_size - offset;

        if want <= in_sector {
            buf[..want].copy_from_slice(&self.buffer.as_ref()[offset..offset + want]);
            if want == in_sector {
                self.chain = Some(self.space.next_sector(sector)?);
                self.buffered = false;
            }
            self.pos += want as u64;
            return Ok(want);
        }

        buf[..in_sector].copy_from_slice(&self.buffer.as_ref()[offset..sector_size]);
        let mut read = in_sector;
        self.buffered = false;
        sector = self.space.next_sector(sector)?;
        self.chain = Some(sector);

        while sector != END_OF_CHAIN && read < want {
            let rest = want - read;
            if rest < sector_size {
                self.fill(sector)?;
                buf[read..want].copy_from_slice(&self.buffer.as_ref()[..rest]);
                read = want;
                break;
            }
            self.space
                .read_sector(sector, &mut buf[read..read + sector_size])?;
            read += sector_size;
            sector = self.space.next_sector(sector)?;
            self.chain = Some(sector);
        }

        if read < want {
            trace!("Short read: {} of {} bytes", read, want);
        }
        self.pos += read as u64;
        Ok(read)
    }

    /// Reads up to `max` bytes, or the rest of the stream if `max` is `None`.
    #[cfg(feature = "alloc")]
    pub fn read_vec(&mut self, max: Option<usize>) -> Result<alloc::vec::Vec<u8>, CfbError> {
        let remaining = (self.descriptor.len - self.pos) as usize;
        let len = max.map_or(remaining, |max| core::cmp::min(max, remaining));
        let mut data = alloc::vec![0u8; len];
        let read = self.read(&mut data)?;
        data.truncate(read);
        Ok(data)
    }

    pub fn read_u8(&mut self) -> Result<u8, CfbError> {
        let [b0] = self.read_int::<1>()?;
        Ok(b0)
    }

    /// Reads a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16, CfbError> {
        let [b0, b1] = self.read_int::<2>()?;
        Ok(b0 as u16 | (b1 as u16) << 8)
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, CfbError> {
        let [b0, b1, b2, b3] = self.read_int::<4>()?;
        Ok(b0 as u32 | (b1 as u32) << 8 | (b2 as u32) << 16 | (b3 as u32) << 24)
    }

    fn read_int<const N: usize>(&mut self) -> Result<[u8; N], CfbError> {
        let mut bytes = [0u8; N];
        let read = self.read(&mut bytes)?;
        if read < N {
            return Err(CfbError::IntegerRead { expected: N, read });
        }
        Ok(bytes)
    }

    /// Follows the chain `index` hops from the first sector.
    fn walk(&self, index: u64) -> Result<SectorId, CfbError> {
        trace!(
            "Walking {} hops from sector {:#x}",
            index,
            self.descriptor.start
        );
        let mut sector = self.descriptor.start;
        for _ in 0..index {
            if sector == END_OF_CHAIN {
                break;
            }
            sector = self.space.next_sector(sector)?;
        }
        Ok(sector)
    }

    fn fill(&mut self, sector: SectorId) -> Result<(), CfbError> {
        let sector_size = self.space.sector_size();
        let buffer = self
            .buffer
            .as_mut()
            .get_mut(..sector_size)
            .ok_or(CfbError::BufferTooSmall)?;
        self.space.read_sector(sector, buffer)?;
        self.buffered = true;
        Ok(())
    }

    pub(crate) fn space_mut(&mut self) -> &mut S {
        &mut self.space
    }

    pub(crate) fn space(&self) -> &S {
        &self.space
    }

    pub(crate) fn buffer_len(&self) -> usize {
        self.buffer.as_ref().len()
    }

    /// Swaps in a fresh descriptor. Chain pointer and buffer become unknown.
    pub(crate) fn reset_descriptor(&mut self, descriptor: StreamDescriptor) {
        self.descriptor = descriptor;
        self.pos = core::cmp::min(self.pos, descriptor.len);
        self.invalidate();
    }

    /// Forgets the chain pointer and the buffered sector.
    pub(crate) fn invalidate(&mut self) {
        self.chain = None;
        self.buffered = false;
    }
}

impl<S, Buffer> embedded_io::ErrorType for StreamCursor<S, Buffer> {
    type Error = CfbError;
}

impl<S, Buffer> embedded_io::Read for StreamCursor<S, Buffer>
where
    S: SectorSource + ChainWalker,
    Buffer: AsRef<[u8]> + AsMut<[u8]>,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        StreamCursor::read(self, buf)
    }
}

impl<S, Buffer> embedded_io::Seek for StreamCursor<S, Buffer>
where
    S: SectorSource + ChainWalker,
    Buffer: AsRef<[u8]> + AsMut<[u8]>,
{
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        match StreamCursor::seek(self, pos)? {
            SeekOutcome::InBounds => Ok(self.pos),
            SeekOutcome::PastEnd => Err(CfbError::SeekPastEnd),
        }
    }
}
