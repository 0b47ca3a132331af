pub mod fat;

// Re-export the formatter and its building blocks
pub use fat::{
    derive, encode_boot_sector, encode_fsinfo_sector, encode_initial_fat_entries,
    encode_volume_label_entry, legalize, ClusterFit, FatFormatter, FormatParameters,
};
