// Initial FAT content: the reserved entries at the head of every FAT copy

use byteorder::{ByteOrder, LittleEndian};
use fatfmt_core::FatType;
use super::constants::*;
use super::params::FormatParameters;

/// Store `value` as entry `index` of a FAT held in `fat`.
///
/// FAT12 packs two entries into three bytes: even entries own the low
/// twelve bits, odd entries the high twelve.
pub fn set_fat_entry(fat: &mut [u8], fat_type: FatType, index: usize, value: u32) {
    match fat_type {
        FatType::Fat12 => {
            let offset = index + index / 2;
            let value = (value & 0x0FFF) as u16;
            let current = LittleEndian::read_u16(&fat[offset..]);
            let packed = if index % 2 == 0 {
                (current & 0xF000) | value
            } else {
                (current & 0x000F) | (value << 4)
            };
            LittleEndian::write_u16(&mut fat[offset..], packed);
        }
        FatType::Fat16 => LittleEndian::write_u16(&mut fat[index * 2..], value as u16),
        FatType::Fat32 => LittleEndian::write_u32(&mut fat[index * 4..], value),
    }
}

/// First sector of each FAT copy.
///
/// Entry 0 carries the media descriptor, entry 1 the end-of-chain marker.
/// On FAT32 entry 2 is the root directory's single cluster and is marked
/// end-of-chain as well. Everything else is zero.
pub fn encode_initial_fat_entries(params: &FormatParameters) -> Vec<u8> {
    let mut sector = vec![0u8; params.bytes_per_sector as usize];
    let media = params.media_code as u32;

    match params.fat_type {
        FatType::Fat12 => {
            set_fat_entry(&mut sector, FatType::Fat12, 0, 0x0F00 | media);
            set_fat_entry(&mut sector, FatType::Fat12, 1, FAT12_EOC as u32);
        }
        FatType::Fat16 => {
            set_fat_entry(&mut sector, FatType::Fat16, 0, 0xFF00 | media);
            set_fat_entry(&mut sector, FatType::Fat16, 1, FAT16_EOC as u32);
        }
        FatType::Fat32 => {
            set_fat_entry(&mut sector, FatType::Fat32, 0, 0xFFFF_FF00 | media);
            set_fat_entry(&mut sector, FatType::Fat32, 1, FAT32_EOC);
            set_fat_entry(&mut sector, FatType::Fat32, FAT32_ROOT_CLUSTER as usize, FAT32_EOC);
        }
    }

    sector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fat::params::derive;
    use fatfmt_core::{DeviceGeometry, FormatRequest};

    fn params_for(sectors: u64, request: Option<&FormatRequest>) -> FormatParameters {
        derive(&DeviceGeometry::new(512, sectors).unwrap(), request).unwrap()
    }

    #[test]
    fn test_fat12_reserved_entries() {
        let fat = encode_initial_fat_entries(&params_for(30_000, None));
        assert_eq!(fat.len(), 512);
        assert_eq!(&fat[0..3], &[0xF8, 0x8F, 0xFF]);
        assert!(fat[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fat16_reserved_entries() {
        let req = FormatRequest { media: 0xF0, ..Default::default() };
        let fat = encode_initial_fat_entries(&params_for(131_072, Some(&req)));
        assert_eq!(&fat[0..4], &[0xF0, 0xFF, 0xF8, 0xFF]);
        assert!(fat[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fat32_reserves_root_cluster() {
        let fat = encode_initial_fat_entries(&params_for(8_000_000, None));
        assert_eq!(LittleEndian::read_u32(&fat[0..]), 0xFFFF_FFF8);
        assert_eq!(LittleEndian::read_u32(&fat[4..]), 0x0FFF_FFF8);
        assert_eq!(LittleEndian::read_u32(&fat[8..]), 0x0FFF_FFF8);
        assert!(fat[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_fat12_packing_keeps_neighbours() {
        let mut fat = vec![0u8; 6];
        set_fat_entry(&mut fat, FatType::Fat12, 2, 0xABC);
        set_fat_entry(&mut fat, FatType::Fat12, 3, 0x123);
        assert_eq!(&fat[3..6], &[0xBC, 0x3A, 0x12]);
        set_fat_entry(&mut fat, FatType::Fat12, 2, 0x000);
        assert_eq!(&fat[3..6], &[0x00, 0x30, 0x12]);
    }
}
