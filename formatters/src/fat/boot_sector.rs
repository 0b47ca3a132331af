// Boot sector and FSInfo sector encoding
// One serializer per boot sector variant so every offset can be checked against the layout tables

use byteorder::{ByteOrder, LittleEndian};
use fatfmt_core::FatType;
use super::constants::*;
use super::params::FormatParameters;

/// Render the boot sector / BPB for `params`.
pub fn encode_boot_sector(params: &FormatParameters) -> [u8; BOOT_SECTOR_SIZE] {
    match params.fat_type {
        FatType::Fat12 | FatType::Fat16 => build_fat16_boot_sector(params),
        FatType::Fat32 => build_fat32_boot_sector(params),
    }
}

/// Fields shared by both variants, offsets 0..36, plus the trailing signature.
fn write_common_bpb(boot_sector: &mut [u8; BOOT_SECTOR_SIZE], params: &FormatParameters) {
    boot_sector[BS_JMP_BOOT..BS_JMP_BOOT + 3].copy_from_slice(&JUMP_BOOT);
    boot_sector[BS_OEM_NAME..BS_OEM_NAME + OEM_NAME_LEN].copy_from_slice(&params.oem_name);

    LittleEndian::write_u16(&mut boot_sector[BPB_BYTES_PER_SEC..], params.bytes_per_sector as u16);
    boot_sector[BPB_SEC_PER_CLUS] = params.sectors_per_cluster as u8;
    LittleEndian::write_u16(
        &mut boot_sector[BPB_RSVD_SEC_CNT..],
        params.reserved_sector_count as u16,
    );
    // The BPB always records two FATs, whatever count the layout used
    boot_sector[BPB_NUM_FATS] = BPB_FAT_COPIES;
    LittleEndian::write_u16(
        &mut boot_sector[BPB_ROOT_ENT_CNT..],
        params.files_per_root_dir as u16,
    );

    let (total16, total32) = if params.total_sector_count < 0x10000 {
        (params.total_sector_count as u16, 0)
    } else {
        (0, params.total_sector_count)
    };
    LittleEndian::write_u16(&mut boot_sector[BPB_TOT_SEC16..], total16);
    boot_sector[BPB_MEDIA] = params.media_code;

    // No CHS geometry is modelled
    LittleEndian::write_u16(&mut boot_sector[BPB_SEC_PER_TRK..], 0);
    LittleEndian::write_u16(&mut boot_sector[BPB_NUM_HEADS..], 0);
    LittleEndian::write_u32(&mut boot_sector[BPB_HIDD_SEC..], 0);
    LittleEndian::write_u32(&mut boot_sector[BPB_TOT_SEC32..], total32);

    boot_sector[BOOT_SIGNATURE_OFFSET..BOOT_SIGNATURE_OFFSET + 2].copy_from_slice(&BOOT_SIGNATURE);
}

/// FAT12 and FAT16 share one layout, told apart by the type tag.
pub fn build_fat16_boot_sector(params: &FormatParameters) -> [u8; BOOT_SECTOR_SIZE] {
    let mut boot_sector = [0u8; BOOT_SECTOR_SIZE];
    write_common_bpb(&mut boot_sector, params);

    LittleEndian::write_u16(&mut boot_sector[BPB_FAT_SZ16..], params.sectors_per_fat as u16);
    boot_sector[BS16_DRV_NUM] = 0;
    boot_sector[BS16_RESERVED1] = 0;
    boot_sector[BS16_BOOT_SIG] = EXT_BOOT_SIGNATURE;
    LittleEndian::write_u32(&mut boot_sector[BS16_VOL_ID..], params.volume_id);
    boot_sector[BS16_VOL_LAB..BS16_VOL_LAB + VOLUME_LABEL_LEN].copy_from_slice(&params.volume_label);

    let fs_type: &[u8; FS_TYPE_LEN] = match params.fat_type {
        FatType::Fat12 => b"FAT12   ",
        _ => b"FAT16   ",
    };
    boot_sector[BS16_FIL_SYS_TYPE..BS16_FIL_SYS_TYPE + FS_TYPE_LEN].copy_from_slice(fs_type);

    boot_sector
}

pub fn build_fat32_boot_sector(params: &FormatParameters) -> [u8; BOOT_SECTOR_SIZE] {
    let mut boot_sector = [0u8; BOOT_SECTOR_SIZE];
    write_common_bpb(&mut boot_sector, params);

    LittleEndian::write_u32(&mut boot_sector[BPB_FAT_SZ32..], params.sectors_per_fat);
    LittleEndian::write_u16(&mut boot_sector[BPB_EXT_FLAGS..], 0);
    LittleEndian::write_u16(&mut boot_sector[BPB_FS_VER..], 0);
    LittleEndian::write_u32(&mut boot_sector[BPB_ROOT_CLUS..], FAT32_ROOT_CLUSTER);
    LittleEndian::write_u16(&mut boot_sector[BPB_FS_INFO..], params.fsinfo_sector as u16);
    LittleEndian::write_u16(
        &mut boot_sector[BPB_BK_BOOT_SEC..],
        params.mbr_backup_sector as u16,
    );
    boot_sector[BPB_RESERVED..BPB_RESERVED + BPB32_RESERVED_LEN].fill(0);

    boot_sector[BS32_DRV_NUM] = 0;
    boot_sector[BS32_RESERVED1] = 0;
    boot_sector[BS32_BOOT_SIG] = EXT_BOOT_SIGNATURE;
    // FAT32 volumes are written without id or label in the BPB
    LittleEndian::write_u32(&mut boot_sector[BS32_VOL_ID..], 0);
    boot_sector[BS32_VOL_LAB..BS32_VOL_LAB + VOLUME_LABEL_LEN].fill(0);
    boot_sector[BS32_FIL_SYS_TYPE..BS32_FIL_SYS_TYPE + FS_TYPE_LEN].copy_from_slice(b"FAT32   ");

    boot_sector
}

/// FAT32 FSInfo sector with free count and next-free hint left unknown.
pub fn encode_fsinfo_sector(_params: &FormatParameters) -> [u8; BOOT_SECTOR_SIZE] {
    let mut fsinfo = [0u8; BOOT_SECTOR_SIZE];

    LittleEndian::write_u32(&mut fsinfo[FSI_LEAD_SIG..], FSI_LEAD_SIGNATURE);
    LittleEndian::write_u32(&mut fsinfo[FSI_STRUC_SIG..], FSI_STRUC_SIGNATURE);
    LittleEndian::write_u32(&mut fsinfo[FSI_FREE_COUNT..], FSI_UNKNOWN);
    LittleEndian::write_u32(&mut fsinfo[FSI_NXT_FREE..], FSI_UNKNOWN);
    LittleEndian::write_u32(&mut fsinfo[FSI_TRAIL_SIG..], FSI_TRAIL_SIGNATURE);

    fsinfo
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
    fn test_fat16_boot_sector_fields() {
        let req = FormatRequest::default().with_label("MYDISK");
        let p = params_for(131_072, Some(&req));
        assert_eq!(p.fat_type, FatType::Fat16);
        let bs = encode_boot_sector(&p);

        assert_eq!(&bs[0..3], &[0xEB, 0x3C, 0x90]);
        assert_eq!(&bs[3..11], b"FATFMT  ");
        assert_eq!(LittleEndian::read_u16(&bs[11..]), 512);
        assert_eq!(bs[13] as u32, p.sectors_per_cluster);
        assert_eq!(LittleEndian::read_u16(&bs[14..]), 1);
        assert_eq!(bs[16], 2);
        assert_eq!(LittleEndian::read_u16(&bs[17..]), 512);
        // 131072 does not fit the 16-bit field
        assert_eq!(LittleEndian::read_u16(&bs[19..]), 0);
        assert_eq!(LittleEndian::read_u32(&bs[32..]), 131_072);
        assert_eq!(bs[21], 0xF8);
        assert_eq!(LittleEndian::read_u16(&bs[22..]) as u32, p.sectors_per_fat);
        assert_eq!(&bs[24..32], &[0u8; 8]);
        assert_eq!(bs[36], 0);
        assert_eq!(bs[38], 0x29);
        assert_eq!(LittleEndian::read_u32(&bs[39..]), p.volume_id);
        assert_eq!(&bs[43..54], b"MYDISK     ");
        assert_eq!(&bs[54..62], b"FAT16   ");
        assert_eq!(&bs[510..512], &[0x55, 0xAA]);
    }

    #[test]
    fn test_fat12_small_volume_uses_16_bit_total() {
        let p = params_for(30_000, None);
        let bs = encode_boot_sector(&p);
        assert_eq!(LittleEndian::read_u16(&bs[19..]), 30_000);
        assert_eq!(LittleEndian::read_u32(&bs[32..]), 0);
        assert_eq!(&bs[54..62], b"FAT12   ");
        assert_eq!(&bs[43..54], b"           ");
    }

    #[test]
    fn test_bpb_fat_count_stays_two() {
        let req = FormatRequest { fat_count: 1, ..Default::default() };
        let p = params_for(30_000, Some(&req));
        assert_eq!(p.fat_copy_count, 1);
        assert_eq!(encode_boot_sector(&p)[16], 2);
    }

    #[test]
    fn test_fat32_boot_sector_fields() {
        let req = FormatRequest::default().with_label("IGNORED");
        let p = params_for(8_000_000, Some(&req));
        let bs = encode_boot_sector(&p);

        assert_eq!(LittleEndian::read_u16(&bs[14..]), 32);
        assert_eq!(LittleEndian::read_u16(&bs[17..]), 0);
        assert_eq!(LittleEndian::read_u32(&bs[32..]), 8_000_000);
        assert_eq!(LittleEndian::read_u32(&bs[36..]), p.sectors_per_fat);
        assert_eq!(LittleEndian::read_u16(&bs[40..]), 0);
        assert_eq!(LittleEndian::read_u16(&bs[42..]), 0);
        assert_eq!(LittleEndian::read_u32(&bs[44..]), 2);
        assert_eq!(LittleEndian::read_u16(&bs[48..]), 1);
        assert_eq!(LittleEndian::read_u16(&bs[50..]), 6);
        assert_eq!(&bs[52..64], &[0u8; 12]);
        assert_eq!(bs[66], 0x29);
        assert_eq!(LittleEndian::read_u32(&bs[67..]), 0);
        assert_eq!(&bs[71..82], &[0u8; 11]);
        assert_eq!(&bs[82..90], b"FAT32   ");
        assert_eq!(&bs[510..512], &[0x55, 0xAA]);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let p = params_for(2_000_000, None);
        assert_eq!(encode_boot_sector(&p), encode_boot_sector(&p));
        assert_eq!(encode_fsinfo_sector(&p), encode_fsinfo_sector(&p));
    }

    #[test]
    fn test_fsinfo_layout() {
        let p = params_for(8_000_000, None);
        let fsinfo = encode_fsinfo_sector(&p);
        assert_eq!(&fsinfo[0..4], b"RRaA");
        assert_eq!(&fsinfo[484..488], b"rrAa");
        assert_eq!(LittleEndian::read_u32(&fsinfo[488..]), 0xFFFF_FFFF);
        assert_eq!(LittleEndian::read_u32(&fsinfo[492..]), 0xFFFF_FFFF);
        assert_eq!(&fsinfo[508..512], &[0x00, 0x00, 0x55, 0xAA]);
        assert!(fsinfo[4..484].iter().all(|&b| b == 0));
    }
}
