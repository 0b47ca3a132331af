// FAT12/16/32 formatter: parameter derivation, structure encoding, device sequencing

pub mod boot_sector;
pub mod cluster_calc;
pub mod constants;
pub mod directory;
pub mod fat_init;
pub mod formatter;
pub mod params;

pub use boot_sector::{encode_boot_sector, encode_fsinfo_sector};
pub use cluster_calc::{legalize, ClusterFit};
pub use directory::encode_volume_label_entry;
pub use fat_init::encode_initial_fat_entries;
pub use formatter::FatFormatter;
pub use params::{derive, FormatParameters};
