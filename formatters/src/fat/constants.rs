// On-disk constants shared by the FAT12/16 and FAT32 layouts

use static_assertions::const_assert;

// Boot sector, common BPB
pub const BS_JMP_BOOT: usize = 0x00;
pub const BS_OEM_NAME: usize = 0x03;
pub const BPB_BYTES_PER_SEC: usize = 0x0B;
pub const BPB_SEC_PER_CLUS: usize = 0x0D;
pub const BPB_RSVD_SEC_CNT: usize = 0x0E;
pub const BPB_NUM_FATS: usize = 0x10;
pub const BPB_ROOT_ENT_CNT: usize = 0x11;
pub const BPB_TOT_SEC16: usize = 0x13;
pub const BPB_MEDIA: usize = 0x15;
pub const BPB_FAT_SZ16: usize = 0x16;
pub const BPB_SEC_PER_TRK: usize = 0x18;
pub const BPB_NUM_HEADS: usize = 0x1A;
pub const BPB_HIDD_SEC: usize = 0x1C;
pub const BPB_TOT_SEC32: usize = 0x20;

// FAT12/16 tail
pub const BS16_DRV_NUM: usize = 0x24;
pub const BS16_RESERVED1: usize = 0x25;
pub const BS16_BOOT_SIG: usize = 0x26;
pub const BS16_VOL_ID: usize = 0x27;
pub const BS16_VOL_LAB: usize = 0x2B;
pub const BS16_FIL_SYS_TYPE: usize = 0x36;

// FAT32 tail
pub const BPB_FAT_SZ32: usize = 0x24;
pub const BPB_EXT_FLAGS: usize = 0x28;
pub const BPB_FS_VER: usize = 0x2A;
pub const BPB_ROOT_CLUS: usize = 0x2C;
pub const BPB_FS_INFO: usize = 0x30;
pub const BPB_BK_BOOT_SEC: usize = 0x32;
pub const BPB_RESERVED: usize = 0x34;
pub const BS32_DRV_NUM: usize = 0x40;
pub const BS32_RESERVED1: usize = 0x41;
pub const BS32_BOOT_SIG: usize = 0x42;
pub const BS32_VOL_ID: usize = 0x43;
pub const BS32_VOL_LAB: usize = 0x47;
pub const BS32_FIL_SYS_TYPE: usize = 0x52;

pub const OEM_NAME_LEN: usize = 8;
pub const VOLUME_LABEL_LEN: usize = 11;
pub const FS_TYPE_LEN: usize = 8;
pub const BPB32_RESERVED_LEN: usize = 12;

pub const JUMP_BOOT: [u8; 3] = [0xEB, 0x3C, 0x90];
pub const EXT_BOOT_SIGNATURE: u8 = 0x29;
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];
pub const BOOT_SIGNATURE_OFFSET: usize = 0x1FE;
pub const BOOT_SECTOR_SIZE: usize = 512;

/// Copies of the FAT recorded in the BPB, independent of the layout's count.
pub const BPB_FAT_COPIES: u8 = 2;

// Offsets must stay inside their field layout and ahead of the signature
const_assert!(BS_OEM_NAME + OEM_NAME_LEN == BPB_BYTES_PER_SEC);
const_assert!(BPB_TOT_SEC32 + 4 == BS16_DRV_NUM);
const_assert!(BS16_VOL_ID + 4 == BS16_VOL_LAB);
const_assert!(BS16_VOL_LAB + VOLUME_LABEL_LEN == BS16_FIL_SYS_TYPE);
const_assert!(BS16_FIL_SYS_TYPE + FS_TYPE_LEN <= BOOT_SIGNATURE_OFFSET);
const_assert!(BPB_RESERVED + BPB32_RESERVED_LEN == BS32_DRV_NUM);
const_assert!(BS32_VOL_ID + 4 == BS32_VOL_LAB);
const_assert!(BS32_VOL_LAB + VOLUME_LABEL_LEN == BS32_FIL_SYS_TYPE);
const_assert!(BS32_FIL_SYS_TYPE + FS_TYPE_LEN <= BOOT_SIGNATURE_OFFSET);
const_assert!(BOOT_SIGNATURE_OFFSET + 2 == BOOT_SECTOR_SIZE);

// FSInfo sector
pub const FSI_LEAD_SIG: usize = 0;
pub const FSI_STRUC_SIG: usize = 484;
pub const FSI_FREE_COUNT: usize = 488;
pub const FSI_NXT_FREE: usize = 492;
pub const FSI_TRAIL_SIG: usize = 508;
pub const FSI_LEAD_SIGNATURE: u32 = 0x4161_5252;
pub const FSI_STRUC_SIGNATURE: u32 = 0x6141_7272;
// Bytes 00 00 55 AA. Some formatters store 0x0000_55AA here; that value is not reproduced
pub const FSI_TRAIL_SIGNATURE: u32 = 0xAA55_0000;
pub const FSI_UNKNOWN: u32 = 0xFFFF_FFFF;

const_assert!(FSI_TRAIL_SIG + 4 == BOOT_SECTOR_SIZE);

// FAT entry values
pub const FAT12_EOC: u16 = 0x0FF8;
pub const FAT16_EOC: u16 = 0xFFF8;
pub const FAT32_EOC: u32 = 0x0FFF_FFF8;

// Cluster geometry
pub const FAT12_MAX_CLUSTERS: u32 = 4084;
pub const FAT16_MAX_CLUSTERS: u32 = 65524;
pub const MAX_SECTORS_PER_CLUSTER: u32 = 128;
pub const MAX_CLUSTER_BYTES: u32 = 32768;

// Auto-selection thresholds, in sectors
pub const FAT12_AUTO_LIMIT: u64 = FAT12_MAX_CLUSTERS as u64 * 8;
pub const FAT16_AUTO_LIMIT: u64 = FAT16_MAX_CLUSTERS as u64 * 32;

// Layout defaults
pub const FAT12_16_RESERVED_SECTORS: u32 = 1;
pub const FAT32_RESERVED_SECTORS: u32 = 32;
pub const FAT32_FS_INFO_SECTOR: u32 = 1;
pub const FAT32_BACKUP_BOOT_SECTOR: u32 = 6;
pub const FAT32_ROOT_CLUSTER: u32 = 2;
pub const FAT12_ROOT_ENTRIES: u32 = 64;
pub const FAT16_ROOT_ENTRIES: u32 = 512;
pub const DEFAULT_FAT_COPIES: u8 = 2;
pub const MAX_FAT_COPIES: u32 = 6;
pub const DEFAULT_OEM_NAME: &str = "FATFMT";

// Media descriptors
pub const MEDIA_FIXED: u8 = 0xF8;
pub const VALID_MEDIA_CODES: [u8; 9] = [0xF0, 0xF8, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF];

// Directory entries
pub const DIR_ENTRY_SIZE: u32 = 32;
pub const DIR_NAME: usize = 0x00;
pub const DIR_ATTR: usize = 0x0B;
pub const ATTR_VOLUME_ID: u8 = 0x08;

/// Fill byte for the full-extent wipe.
pub const WIPE_FILL_BYTE: u8 = 0xE5;
