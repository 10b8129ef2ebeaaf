//! Sector-0 inspection used before handing the card to the FAT driver: is
//! the card a bare FAT volume, or an MBR with a FAT partition, and where does
//! that partition live.

pub const SECTOR_SIZE: usize = 512;

const MBR_TABLE_OFFSET: usize = 446;
const MBR_ENTRY_LEN: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Partition {
    pub start_lba: u64,
    pub sectors: u64,
}

impl Partition {
    pub fn byte_range(&self) -> (u64, u64) {
        let start = self.start_lba * SECTOR_SIZE as u64;
        (start, start + self.sectors * SECTOR_SIZE as u64)
    }
}

fn has_boot_signature(sector: &[u8; SECTOR_SIZE]) -> bool {
    sector[510] == 0x55 && sector[511] == 0xAA
}

/// True when `sector` is a FAT12/16/32 volume boot record.
pub fn is_fat_boot_sector(sector: &[u8; SECTOR_SIZE]) -> bool {
    has_boot_signature(sector)
        && (&sector[82..90] == b"FAT32   "
            || &sector[54..62] == b"FAT16   "
            || &sector[54..62] == b"FAT12   ")
}

/// Finds the FAT volume on a card of `card_sectors` sectors from its first
/// sector. A card formatted without a partition table is one volume covering
/// the whole card.
pub fn locate_volume(sector0: &[u8; SECTOR_SIZE], card_sectors: u64) -> Option<Partition> {
    if is_fat_boot_sector(sector0) {
        return Some(Partition {
            start_lba: 0,
            sectors: card_sectors,
        });
    }
    if !has_boot_signature(sector0) {
        return None;
    }
    for idx in 0..4 {
        let entry = &sector0[MBR_TABLE_OFFSET + idx * MBR_ENTRY_LEN..][..MBR_ENTRY_LEN];
        if !matches!(entry[4], 0x01 | 0x04 | 0x06 | 0x0B | 0x0C | 0x0E) {
            continue;
        }
        let start = u32::from_le_bytes([entry[8], entry[9], entry[10], entry[11]]) as u64;
        let count = u32::from_le_bytes([entry[12], entry[13], entry[14], entry[15]]) as u64;
        if start == 0 || start >= card_sectors {
            continue;
        }
        return Some(Partition {
            start_lba: start,
            sectors: count.min(card_sectors - start),
        });
    }
    None
}
