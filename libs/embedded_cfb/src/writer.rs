use embedded_io::SeekFrom;

use crate::{
    CfbError, ChainWalker, SectorSource, SeekOutcome, StreamCursor, StreamDescriptor, StreamId,
    StreamWriter,
};

/// A [`StreamCursor`] that can also write through the owning container.
///
/// Allocation is left to the container. After every write the descriptor
/// is fetched again and the cursor walks the chain from scratch, since the
/// write may have extended the chain or moved the stream.
pub struct StreamWriterCursor<C, Buffer> {
    cursor: StreamCursor<C, Buffer>,
    stream: StreamId,
}

impl<'a, C> StreamWriterCursor<C, &'a mut [u8]>
where
    C: SectorSource + ChainWalker + StreamWriter,
{
    pub fn new_borrowed(
        container: C,
        stream: StreamId,
        buffer: &'a mut [u8],
    ) -> Result<Self, CfbError> {
        Self::with_buffer(container, stream, buffer)
    }
}

#[cfg(feature = "alloc")]
impl<C> StreamWriterCursor<C, alloc::vec::Vec<u8>>
where
    C: SectorSource + ChainWalker + StreamWriter,
{
    pub fn new(container: C, stream: StreamId) -> Result<Self, CfbError> {
        let descriptor = container.stream_descriptor(stream)?;
        let cursor = StreamCursor::new(container, descriptor)?;
        Ok(Self { cursor, stream })
    }
}

impl<C, Buffer> StreamWriterCursor<C, Buffer>
where
    C: SectorSource + ChainWalker + StreamWriter,
    Buffer: AsRef<[u8]> + AsMut<[u8]>,
{
    /// Creates a cursor with caller-provided buffer storage.
    ///
    /// Containers that may move a stream to a space with larger sectors
    /// need a buffer sized for the largest of them
    /// ([`StreamWriter::max_sector_size`]). With a smaller buffer every
    /// write fails with [`CfbError::BufferTooSmall`] before anything is
    /// written; reading still works.
    pub fn with_buffer(container: C, stream: StreamId, buffer: Buffer) -> Result<Self, CfbError> {
        let descriptor = container.stream_descriptor(stream)?;
        let cursor = StreamCursor::new_with_buffer(container, descriptor, buffer)?;
        Ok(Self { cursor, stream })
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Writes `data` at the current position and returns how many bytes the
    /// container committed. The cursor ends up right behind them.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, CfbError> {
        let pos = self.cursor.tell();
        if self.cursor.buffer_len() < self.cursor.space().max_sector_size() {
            return Err(CfbError::BufferTooSmall);
        }
        let written = match self.cursor.space_mut().write_stream(self.stream, data, pos) {
            Ok(written) => written,
            Err(e) => {
                // the container may have touched the chain before failing
                self.refresh();
                return Err(e);
            }
        };
        let descriptor = match self.cursor.space().stream_descriptor(self.stream) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                self.cursor.invalidate();
                return Err(e);
            }
        };
        self.cursor.reset_descriptor(descriptor);
        trace!(
            "Wrote {} bytes at {}, stream now {} bytes from sector {:#x}",
            written,
            pos,
            descriptor.len,
            descriptor.start
        );
        match self.cursor.seek(SeekFrom::Start(pos + written as u64))? {
            SeekOutcome::InBounds => Ok(written),
            // the container reported more bytes than the stream now holds
            SeekOutcome::PastEnd => Err(CfbError::InvalidOffset),
        }
    }

    fn refresh(&mut self) {
        match self.cursor.space().stream_descriptor(self.stream) {
            Ok(descriptor) => self.cursor.reset_descriptor(descriptor),
            Err(_) => self.cursor.invalidate(),
        }
    }

    pub fn descriptor(&self) -> StreamDescriptor {
        self.cursor.descriptor()
    }

    pub fn len(&self) -> u64 {
        self.cursor.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty()
    }

    pub fn tell(&self) -> u64 {
        self.cursor.tell()
    }

    pub fn eof(&self) -> bool {
        self.cursor.eof()
    }

    pub fn seek(&mut self, pos: SeekFrom) -> Result<SeekOutcome, CfbError> {
        self.cursor.seek(pos)
    }

    pub fn rewind(&mut self) {
        self.cursor.rewind()
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, CfbError> {
        self.cursor.read(buf)
    }

    #[cfg(feature = "alloc")]
    pub fn read_vec(&mut self, max: Option<usize>) -> Result<alloc::vec::Vec<u8>, CfbError> {
        self.cursor.read_vec(max)
    }

    pub fn read_u8(&mut self) -> Result<u8, CfbError> {
        self.cursor.read_u8()
    }

    pub fn read_u16(&mut self) -> Result<u16, CfbError> {
        self.cursor.read_u16()
    }

    pub fn read_u32(&mut self) -> Result<u32, CfbError> {
        self.cursor.read_u32()
    }
}

impl<C, Buffer> embedded_io::ErrorType for StreamWriterCursor<C, Buffer> {
    type Error = CfbError;
}

impl<C, Buffer> embedded_io::Read for StreamWriterCursor<C, Buffer>
where
    C: SectorSource + ChainWalker + StreamWriter,
    Buffer: AsRef<[u8]> + AsMut<[u8]>,
{
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.cursor.read(buf)
    }
}

impl<C, Buffer> embedded_io::Seek for StreamWriterCursor<C, Buffer>
where
    C: SectorSource + ChainWalker + StreamWriter,
    Buffer: AsRef<[u8]> + AsMut<[u8]>,
{
    fn seek(&mut self, pos: SeekFrom) -> Result<u64, Self::Error> {
        embedded_io::Seek::seek(&mut self.cursor, pos)
    }
}

impl<C, Buffer> embedded_io::Write for StreamWriterCursor<C, Buffer>
where
    C: SectorSource + ChainWalker + StreamWriter,
    Buffer: AsRef<[u8]> + AsMut<[u8]>,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        StreamWriterCursor::write(self, buf)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
