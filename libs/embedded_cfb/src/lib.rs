/*!
A no_std reader for the streams of a compound file (OLE/CFB) using embedded-io.

A stream's bytes are spread over fixed-size sectors linked through an
allocation table. [`StreamCursor`] turns byte positions into chain walks
and keeps one sector buffered. The same cursor serves regular streams and
mini streams; the sector space it reads from is the only difference.

## Features
- no_std
- alloc optional (owned buffers, [`MemoryCompound`])
- borrowed sector buffers for allocation-free reading
- `log` for tracing chain walks

## Usage
```
# use embedded_cfb::{MemoryCompound, StreamCursor, CfbError, SeekFrom};
# fn main() -> Result<(), CfbError> {
let mut compound = MemoryCompound::new(512);
let id = compound.add_stream(&[0x01, 0x00, 0x00, 0x00, 0xff, 0xff])?;

let mut cursor = StreamCursor::new(compound.mini(), compound.descriptor(id)?)?;
assert_eq!(cursor.read_u32()?, 1);
assert_eq!(cursor.read_u16()?, 0xffff);
assert!(cursor.eof());

// seeking past the end is reported, not raised
assert!(!cursor.seek(SeekFrom::Start(100))?.is_in_bounds());
assert_eq!(cursor.tell(), 6);
# Ok(())
# }
```

## Limitations & non-goals
- parsing the file header, FAT and directory is up to the caller
- seeking to another sector walks the chain from the start of the stream
- [`MiniSectors`] re-walks the mini stream's chain for every mini sector it
  fetches, so large mini streams read in quadratic time
- no validation of the chain beyond the end-of-chain marker
- no locking; writes must be serialized with all cursors of a container
*/

#![no_std]

#[cfg(test)]
extern crate std;

#[cfg(feature = "alloc")]
extern crate alloc;

macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "log")]
        log::trace!($($arg)*);
        #[cfg(test)]
        std::eprintln!($($arg)*);
    };
}

pub mod consts;
mod cursor;
mod error;
#[cfg(feature = "alloc")]
mod memory;
mod source;
mod writer;


pub use cursor::{SeekOutcome, StreamCursor};
pub use embedded_io::SeekFrom;
pub use error::CfbError;
#[cfg(feature = "alloc")]
pub use memory::{MemoryCompound, MiniSectors, RegularSectors, StreamHandle, StreamSpace};
pub use source::{ChainWalker, SectorSource, StreamDescriptor, StreamId, StreamWriter};
pub use writer::StreamWriterCursor;

/// Index of a sector within its address space.
pub type SectorId = u32;

#[cfg(feature = "alloc")]
pub type OwnedStreamCursor<S> = StreamCursor<S, alloc::vec::Vec<u8>>;
