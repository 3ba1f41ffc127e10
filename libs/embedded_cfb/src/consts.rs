//! Reserved sector ids and sector geometry of the compound file format.

use crate::SectorId;

/// Marks the last sector of a chain.
pub const END_OF_CHAIN: SectorId = 0xFFFF_FFFE;
/// Unallocated slot in the FAT.
pub const FREE_SECTOR: SectorId = 0xFFFF_FFFF;
pub const FAT_SECTOR: SectorId = 0xFFFF_FFFD;
pub const DIFAT_SECTOR: SectorId = 0xFFFF_FFFC;
pub const MAX_REGULAR_SECTOR: SectorId = 0xFFFF_FFFA;

pub const SECTOR_SIZE_V3: usize = 512;
pub const SECTOR_SIZE_V4: usize = 4096;
pub const MINI_SECTOR_SIZE: usize = 64;
/// Streams shorter than this are stored in the mini stream.
pub const MINI_STREAM_CUTOFF: u64 = 4096;
