// Format parameter derivation
// Turns device geometry plus an optional request into a complete, legal layout

use fatfmt_core::{DeviceGeometry, FatType, FormatError, FormatRequest};
use log::{debug, warn};
use std::time::{SystemTime, UNIX_EPOCH};
use super::cluster_calc::{legalize, max_sectors_per_cluster};
use super::constants::*;

/// Complete on-disk layout for one format run. Built once by [`derive`],
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatParameters {
    pub fat_type: FatType,
    pub bytes_per_sector: u32,
    pub total_sector_count: u32,
    pub reserved_sector_count: u32,
    pub sectors_per_cluster: u32,
    pub sectors_per_fat: u32,
    pub fat_copy_count: u8,
    pub files_per_root_dir: u32,
    pub root_dir_sector_count: u32,
    pub root_dir_start_sector: u32,
    pub root_dir_format_sector_count: u32,
    /// Backup boot sector, 0 if none.
    pub mbr_backup_sector: u32,
    /// FSInfo sector, 0 if none.
    pub fsinfo_sector: u32,
    pub media_code: u8,
    pub oem_name: [u8; OEM_NAME_LEN],
    pub volume_label: [u8; VOLUME_LABEL_LEN],
    pub volume_label_present: bool,
    pub volume_id: u32,
}

impl FormatParameters {
    pub fn fat_start_sector(&self) -> u32 {
        self.reserved_sector_count
    }

    pub fn fat_region_sector_count(&self) -> u32 {
        self.fat_copy_count as u32 * self.sectors_per_fat
    }

    /// First sector of cluster 2.
    pub fn data_start_sector(&self) -> u32 {
        self.root_dir_start_sector + self.root_dir_sector_count
    }

    pub fn data_cluster_count(&self) -> u32 {
        self.total_sector_count.saturating_sub(self.data_start_sector()) / self.sectors_per_cluster
    }

    pub fn cluster_bytes(&self) -> u32 {
        self.sectors_per_cluster * self.bytes_per_sector
    }

    pub fn oem_name_str(&self) -> String {
        String::from_utf8_lossy(&self.oem_name).into_owned()
    }

    pub fn volume_label_str(&self) -> Option<String> {
        self.volume_label_present
            .then(|| String::from_utf8_lossy(&self.volume_label).trim_end().to_string())
    }
}

/// Derive the layout for `geometry`. `None` behaves like an all-defaults request.
pub fn derive(
    geometry: &DeviceGeometry,
    request: Option<&FormatRequest>,
) -> Result<FormatParameters, FormatError> {
    geometry.validate()?;
    let bytes_per_sector = geometry.bytes_per_sector;
    if (bytes_per_sector as usize) < BOOT_SECTOR_SIZE {
        return Err(FormatError::invalid(format!(
            "{} byte sectors cannot hold a boot sector",
            bytes_per_sector
        )));
    }
    let total_sector_count = u32::try_from(geometry.total_sector_count).map_err(|_| {
        FormatError::invalid(format!(
            "{} sectors cannot be described by a FAT boot sector",
            geometry.total_sector_count
        ))
    })?;

    let fat_copy_count = resolve_fat_copies(request.map_or(0, |r| r.fat_count))?;

    let (fat_type, seed) = match request.and_then(|r| r.fat_type.fixed()) {
        Some(fat_type) => (fat_type, 1),
        None => auto_fat_type(geometry.total_sector_count),
    };
    let candidate = match request.map_or(0, |r| r.sectors_per_cluster) {
        0 => seed,
        requested => requested,
    };
    let candidate = clamp_sectors_per_cluster(candidate, bytes_per_sector)?;

    if let Some(align) = request.map(|r| r.cluster_align).filter(|&a| a != 0) {
        warn!("Cluster alignment hint {} is not applied to the layout", align);
    }

    let (reserved_sector_count, files_per_root_dir, mbr_backup_sector, fsinfo_sector) =
        match fat_type {
            FatType::Fat32 => (
                FAT32_RESERVED_SECTORS,
                0,
                FAT32_BACKUP_BOOT_SECTOR,
                FAT32_FS_INFO_SECTOR,
            ),
            FatType::Fat12 | FatType::Fat16 => {
                let requested = request.map_or(0, |r| r.files_per_root_dir);
                let files = match requested {
                    0 if fat_type == FatType::Fat16 => FAT16_ROOT_ENTRIES,
                    0 => FAT12_ROOT_ENTRIES,
                    n => n,
                };
                (
                    FAT12_16_RESERVED_SECTORS,
                    round_root_entries(files, bytes_per_sector)?,
                    0,
                    0,
                )
            }
        };

    let root_dir_sector_count =
        (files_per_root_dir * DIR_ENTRY_SIZE + bytes_per_sector - 1) / bytes_per_sector;

    let available = geometry
        .total_sector_count
        .checked_sub(reserved_sector_count as u64 + root_dir_sector_count as u64)
        .ok_or_else(|| {
            FormatError::invalid(format!(
                "{} sectors cannot hold {} reserved and {} root directory sectors",
                total_sector_count, reserved_sector_count, root_dir_sector_count
            ))
        })?;

    let fit = legalize(fat_type, bytes_per_sector, available, fat_copy_count, candidate)?;

    let media_code = resolve_media(request.map_or(0, |r| r.media))?;

    let root_dir_start_sector =
        reserved_sector_count + fat_copy_count as u32 * fit.sectors_per_fat;
    let root_dir_format_sector_count = match fat_type {
        FatType::Fat32 => fit.sectors_per_cluster,
        _ => root_dir_sector_count,
    };

    let oem_name: [u8; OEM_NAME_LEN] = sanitize_field(
        request
            .and_then(|r| r.oem_name.as_deref())
            .unwrap_or(DEFAULT_OEM_NAME)
            .as_bytes(),
    );
    let label = request.and_then(|r| r.volume_label.as_deref());
    let volume_label: [u8; VOLUME_LABEL_LEN] = sanitize_field(label.unwrap_or("").as_bytes());

    let params = FormatParameters {
        fat_type,
        bytes_per_sector,
        total_sector_count,
        reserved_sector_count,
        sectors_per_cluster: fit.sectors_per_cluster,
        sectors_per_fat: fit.sectors_per_fat,
        fat_copy_count,
        files_per_root_dir,
        root_dir_sector_count,
        root_dir_start_sector,
        root_dir_format_sector_count,
        mbr_backup_sector,
        fsinfo_sector,
        media_code,
        oem_name,
        volume_label,
        volume_label_present: label.is_some(),
        volume_id: generate_volume_id(),
    };

    debug!("Derived format parameters: {:?}", params);
    Ok(params)
}

/// 0 means the default of two copies; 1..=6 is taken as-is.
pub fn resolve_fat_copies(requested: u32) -> Result<u8, FormatError> {
    match requested {
        0 => Ok(DEFAULT_FAT_COPIES),
        n if n <= MAX_FAT_COPIES => Ok(n as u8),
        n => Err(FormatError::invalid(format!(
            "FAT copy count must be 1..={}, got {}",
            MAX_FAT_COPIES, n
        ))),
    }
}

/// FAT width and seed cluster size picked from the raw sector count.
pub fn auto_fat_type(total_sector_count: u64) -> (FatType, u32) {
    if total_sector_count < FAT12_AUTO_LIMIT {
        (FatType::Fat12, 2)
    } else if total_sector_count < FAT16_AUTO_LIMIT {
        (FatType::Fat16, 2)
    } else {
        (FatType::Fat32, 1)
    }
}

/// Greatest power of two not above `requested` that is at most 128 and keeps
/// a cluster within 32 KiB.
pub fn clamp_sectors_per_cluster(requested: u32, bytes_per_sector: u32) -> Result<u32, FormatError> {
    let limit = max_sectors_per_cluster(bytes_per_sector);
    let mut onebit = MAX_SECTORS_PER_CLUSTER;
    while onebit >= 1 {
        if onebit <= requested && onebit <= limit {
            return Ok(onebit);
        }
        onebit >>= 1;
    }
    Err(FormatError::invalid(format!(
        "no legal cluster size for {} sectors of {} bytes",
        requested, bytes_per_sector
    )))
}

/// Round up to a whole even number of directory sectors.
fn round_root_entries(files: u32, bytes_per_sector: u32) -> Result<u32, FormatError> {
    let step = 2 * bytes_per_sector / DIR_ENTRY_SIZE;
    if step == 0 {
        return Err(FormatError::invalid(format!(
            "sector size {} is smaller than a directory entry",
            bytes_per_sector
        )));
    }
    files
        .checked_add(step - 1)
        .map(|n| n - n % step)
        .filter(|&n| n <= u16::MAX as u32)
        .ok_or_else(|| FormatError::invalid(format!("{} root directory entries is too many", files)))
}

pub fn resolve_media(requested: u8) -> Result<u8, FormatError> {
    match requested {
        0 => Ok(MEDIA_FIXED),
        code if VALID_MEDIA_CODES.contains(&code) => Ok(code),
        code => Err(FormatError::invalid(format!("invalid media code {:#04x}", code))),
    }
}

/// Copy `from` into a fixed-width field. The first non-printable byte and
/// everything after it (including running off the end of `from`) become spaces.
pub fn sanitize_field<const N: usize>(from: &[u8]) -> [u8; N] {
    let mut field = [b' '; N];
    for (dst, &src) in field.iter_mut().zip(from.iter().take_while(|b| is_print(**b))) {
        *dst = src;
    }
    field
}

fn is_print(b: u8) -> bool {
    (0x20..=0x7E).contains(&b)
}

/// Volume id from the wall clock, seconds plus sub-second part; random when
/// the clock is unusable.
pub fn generate_volume_id() -> u32 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(elapsed) => (elapsed.as_secs() as u32).wrapping_add(elapsed.subsec_micros()),
        Err(_) => rand::random(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fat::cluster_calc::max_data_clusters;
    use fatfmt_core::FatTypeRequest;

    fn geometry(sectors: u64) -> DeviceGeometry {
        DeviceGeometry::new(512, sectors).unwrap()
    }

    fn assert_invariants(p: &FormatParameters) {
        assert!(p.sectors_per_cluster.is_power_of_two());
        assert!(p.sectors_per_cluster <= MAX_SECTORS_PER_CLUSTER);
        assert!(p.sectors_per_cluster * p.bytes_per_sector <= MAX_CLUSTER_BYTES);
        match p.fat_type {
            FatType::Fat32 => {
                assert_eq!(p.reserved_sector_count, 32);
                assert_eq!(p.files_per_root_dir, 0);
                assert_ne!(p.fsinfo_sector, 0);
            }
            _ => {
                assert_eq!(p.reserved_sector_count, 1);
                assert_eq!(p.fsinfo_sector, 0);
                assert_eq!(p.files_per_root_dir % (2 * p.bytes_per_sector / 32), 0);
                assert!(p.root_dir_sector_count * p.bytes_per_sector >= p.files_per_root_dir * 32);
            }
        }
    }

    #[test]
    fn test_auto_selection_is_monotonic() {
        let small = derive(&geometry(30_000), None).unwrap();
        let medium = derive(&geometry(2_000_000), None).unwrap();
        let large = derive(&geometry(8_000_000), None).unwrap();
        assert_eq!(small.fat_type, FatType::Fat12);
        assert_eq!(medium.fat_type, FatType::Fat16);
        assert_eq!(large.fat_type, FatType::Fat32);
        for p in [&small, &medium, &large] {
            assert_invariants(p);
        }
    }

    #[test]
    fn test_invariants_across_geometries() {
        for &bps in &[512u32, 1024, 2048, 4096] {
            for &sectors in &[2_000u64, 20_000, 32_671, 32_672, 150_000, 2_096_767, 2_096_768, 9_000_000] {
                let g = DeviceGeometry::new(bps, sectors).unwrap();
                if let Ok(p) = derive(&g, None) {
                    assert_invariants(&p);
                    if let Some(max) = max_data_clusters(p.fat_type) {
                        assert!(p.data_cluster_count() as u64 <= max, "{:?}", p);
                    }
                }
            }
        }
    }

    #[test]
    fn test_data_clusters_stay_under_fat16_ceiling() {
        for sectors in [262_647u64, 262_648, 524_747, 524_748] {
            let p = derive(&geometry(sectors), None).unwrap();
            assert_eq!(p.fat_type, FatType::Fat16);
            assert!(p.data_cluster_count() <= FAT16_MAX_CLUSTERS, "{:?}", p);
        }

        let p = derive(&geometry(262_647), None).unwrap();
        assert_eq!(p.sectors_per_cluster, 8);
        assert_eq!(p.sectors_per_fat, 129);
        assert_eq!(p.data_cluster_count(), 32_794);
    }

    #[test]
    fn test_legalizer_and_layout_agree_on_cluster_count() {
        for sectors in (8_000u64..2_096_768).step_by(4_099) {
            let g = geometry(sectors);
            let p = derive(&g, None).unwrap();
            let available =
                sectors - p.reserved_sector_count as u64 - p.root_dir_sector_count as u64;
            let fit = legalize(p.fat_type, 512, available, p.fat_copy_count, p.sectors_per_cluster)
                .unwrap();
            assert_eq!(fit.data_clusters, p.data_cluster_count() as u64, "{:?}", p);
            if let Some(max) = max_data_clusters(p.fat_type) {
                assert!(p.data_cluster_count() as u64 <= max, "{:?}", p);
            }
        }
    }

    #[test]
    fn test_fat_copy_boundaries() {
        let req = FormatRequest { fat_count: 7, ..Default::default() };
        assert!(matches!(
            derive(&geometry(30_000), Some(&req)),
            Err(FormatError::InvalidParameter(_))
        ));
        let req = FormatRequest { fat_count: 0, ..Default::default() };
        assert_eq!(derive(&geometry(30_000), Some(&req)).unwrap().fat_copy_count, 2);
        let req = FormatRequest { fat_count: 6, ..Default::default() };
        assert_eq!(derive(&geometry(30_000), Some(&req)).unwrap().fat_copy_count, 6);
    }

    #[test]
    fn test_media_code_validation() {
        assert_eq!(derive(&geometry(30_000), None).unwrap().media_code, 0xF8);
        let req = FormatRequest { media: 0xF0, ..Default::default() };
        assert_eq!(derive(&geometry(30_000), Some(&req)).unwrap().media_code, 0xF0);
        let req = FormatRequest { media: 0xF7, ..Default::default() };
        assert!(matches!(
            derive(&geometry(30_000), Some(&req)),
            Err(FormatError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_fat32_layout() {
        let p = derive(&geometry(8_000_000), None).unwrap();
        assert_eq!(p.mbr_backup_sector, 6);
        assert_eq!(p.fsinfo_sector, 1);
        assert_eq!(p.root_dir_sector_count, 0);
        assert_eq!(p.root_dir_start_sector, 32 + 2 * p.sectors_per_fat);
        assert_eq!(p.root_dir_format_sector_count, p.sectors_per_cluster);
    }

    #[test]
    fn test_fat12_layout_for_30000_sectors() {
        let p = derive(&geometry(30_000), None).unwrap();
        assert_eq!(p.files_per_root_dir, 64);
        assert_eq!(p.root_dir_sector_count, 4);
        assert_eq!(p.sectors_per_cluster, 8);
        assert_eq!(p.sectors_per_fat, 11);
        assert_eq!(p.root_dir_start_sector, 1 + 2 * 11);
        assert_eq!(p.root_dir_format_sector_count, 4);
    }

    #[test]
    fn test_explicit_fat_type_overrides_size() {
        let req = FormatRequest { fat_type: FatTypeRequest::Fat16, ..Default::default() };
        let p = derive(&geometry(30_000), Some(&req)).unwrap();
        assert_eq!(p.fat_type, FatType::Fat16);
        assert_eq!(p.files_per_root_dir, 512);

        let req = FormatRequest { fat_type: FatTypeRequest::Fat12, ..Default::default() };
        assert!(matches!(
            derive(&geometry(8_000_000), Some(&req)),
            Err(FormatError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_root_entries_round_up() {
        let req = FormatRequest { files_per_root_dir: 100, ..Default::default() };
        let p = derive(&geometry(30_000), Some(&req)).unwrap();
        assert_eq!(p.files_per_root_dir, 128);
        assert_eq!(p.root_dir_sector_count, 8);
    }

    #[test]
    fn test_cluster_size_clamp() {
        assert_eq!(clamp_sectors_per_cluster(3, 512).unwrap(), 2);
        assert_eq!(clamp_sectors_per_cluster(2, 512).unwrap(), 2);
        assert_eq!(clamp_sectors_per_cluster(200, 512).unwrap(), 64);
        assert_eq!(clamp_sectors_per_cluster(200, 128).unwrap(), 128);
        assert_eq!(clamp_sectors_per_cluster(16, 4096).unwrap(), 8);
        assert!(clamp_sectors_per_cluster(1, 65536).is_err());
    }

    #[test]
    fn test_sanitize_stops_at_non_printable() {
        let field: [u8; 8] = sanitize_field(b"ABC\x01DEFG");
        assert_eq!(&field, b"ABC     ");
        let field: [u8; 8] = sanitize_field(b"LONGOEMNAME");
        assert_eq!(&field, b"LONGOEMN");
        let field: [u8; 11] = sanitize_field(b"");
        assert_eq!(&field, b"           ");
    }

    #[test]
    fn test_oem_with_control_byte_at_position_three() {
        let req = FormatRequest { oem_name: Some("MSD\x07OS".to_string()), ..Default::default() };
        let p = derive(&geometry(30_000), Some(&req)).unwrap();
        assert_eq!(&p.oem_name[..3], b"MSD");
        assert!(p.oem_name[3..].iter().all(|&b| b == b' '));
    }

    #[test]
    fn test_label_presence_flag() {
        let p = derive(&geometry(30_000), None).unwrap();
        assert!(!p.volume_label_present);
        assert_eq!(p.oem_name_str(), "FATFMT  ");

        let req = FormatRequest::default().with_label("DATA");
        let p = derive(&geometry(30_000), Some(&req)).unwrap();
        assert!(p.volume_label_present);
        assert_eq!(&p.volume_label, b"DATA       ");
        assert_eq!(p.volume_label_str().as_deref(), Some("DATA"));
    }

    #[test]
    fn test_tiny_device_is_rejected() {
        assert!(matches!(
            derive(&geometry(3), None),
            Err(FormatError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_small_sectors_are_rejected() {
        let g = DeviceGeometry::new(256, 10_000).unwrap();
        assert!(matches!(derive(&g, None), Err(FormatError::InvalidParameter(_))));
    }

    #[test]
    fn test_huge_device_is_rejected() {
        let g = DeviceGeometry::new(512, u32::MAX as u64 + 1).unwrap();
        assert!(matches!(derive(&g, None), Err(FormatError::InvalidParameter(_))));
    }
}
