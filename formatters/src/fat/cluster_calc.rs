// Cluster size and FAT size calculation
// Finds the smallest legal cluster size for a FAT width on a given sector budget

use fatfmt_core::{FatType, FormatError};
use log::debug;
use super::constants::*;

/// Outcome of fitting a FAT width onto a sector budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterFit {
    pub sectors_per_cluster: u32,
    pub sectors_per_fat: u32,
    pub data_clusters: u64,
}

/// Highest data cluster count a FAT width can address, `None` if unbounded here
pub fn max_data_clusters(fat_type: FatType) -> Option<u64> {
    match fat_type {
        FatType::Fat12 => Some(FAT12_MAX_CLUSTERS as u64),
        FatType::Fat16 => Some(FAT16_MAX_CLUSTERS as u64),
        FatType::Fat32 => None,
    }
}

/// Bytes one FAT needs to describe `entries` entries (reserved ones included)
pub fn fat_bytes_for(fat_type: FatType, entries: u64) -> u64 {
    match fat_type {
        // 1.5 bytes per entry, a trailing half entry still takes a byte
        FatType::Fat12 => (entries * 3 + 1) / 2,
        FatType::Fat16 => entries * 2,
        FatType::Fat32 => entries * 4,
    }
}

/// Largest sectors-per-cluster value the byte limit allows for this sector size
pub fn max_sectors_per_cluster(bytes_per_sector: u32) -> u32 {
    (MAX_CLUSTER_BYTES / bytes_per_sector.max(1)).min(MAX_SECTORS_PER_CLUSTER)
}

/// Grow the cluster size from `candidate` until the data cluster count fits
/// the FAT width.
///
/// Each round takes the whole clusters in `available_sectors`, sizes one FAT
/// for them plus the two reserved entries, takes `fat_copies` FATs off the
/// budget and checks how many whole clusters are left.
/// Too many clusters doubles the cluster size; passing 32 KiB per cluster
/// means no legal layout exists and fails with `InvalidParameter`.
pub fn legalize(
    fat_type: FatType,
    bytes_per_sector: u32,
    available_sectors: u64,
    fat_copies: u8,
    candidate: u32,
) -> Result<ClusterFit, FormatError> {
    if bytes_per_sector == 0 || candidate == 0 || fat_copies == 0 {
        return Err(FormatError::invalid(format!(
            "cannot size clusters: {} bytes/sector, {} sectors/cluster, {} FATs",
            bytes_per_sector, candidate, fat_copies
        )));
    }

    let limit = max_sectors_per_cluster(bytes_per_sector);
    if limit == 0 {
        return Err(FormatError::invalid(format!(
            "sector size {} exceeds the {} byte cluster limit",
            bytes_per_sector, MAX_CLUSTER_BYTES
        )));
    }

    let mut sectors_per_cluster = candidate;
    while sectors_per_cluster > limit {
        sectors_per_cluster /= 2;
    }

    let ceiling = max_data_clusters(fat_type);

    loop {
        let spc = sectors_per_cluster as u64;
        let clusters = available_sectors / spc;
        let fat_bytes = fat_bytes_for(fat_type, clusters + 2);
        let sectors_per_fat = (fat_bytes + bytes_per_sector as u64 - 1) / bytes_per_sector as u64;
        // Counted the way a driver counts them: whole clusters after the FATs
        let data_clusters = available_sectors.saturating_sub(sectors_per_fat * fat_copies as u64) / spc;

        debug!(
            "{}: {} sectors/cluster -> {} clusters, {} sectors/FAT, {} data clusters",
            fat_type, sectors_per_cluster, clusters, sectors_per_fat, data_clusters
        );

        let fits = data_clusters > 0 && ceiling.map_or(true, |max| data_clusters <= max);
        if fits {
            let sectors_per_fat = u32::try_from(sectors_per_fat).map_err(|_| {
                FormatError::invalid(format!("FAT of {} sectors is too large", sectors_per_fat))
            })?;
            return Ok(ClusterFit {
                sectors_per_cluster,
                sectors_per_fat,
                data_clusters,
            });
        }

        sectors_per_cluster *= 2;
        if sectors_per_cluster > limit {
            return Err(FormatError::invalid(format!(
                "no legal {} cluster size for {} sectors of {} bytes",
                fat_type, available_sectors, bytes_per_sector
            )));
        }
    }
}
