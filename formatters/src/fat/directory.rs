// Root directory content written at format time

use super::constants::*;

/// A zeroed directory sector whose first entry is the volume label.
pub fn encode_volume_label_entry(label: &[u8; VOLUME_LABEL_LEN], bytes_per_sector: u32) -> Vec<u8> {
    let mut sector = vec![0u8; bytes_per_sector as usize];
    sector[DIR_NAME..DIR_NAME + VOLUME_LABEL_LEN].copy_from_slice(label);
    sector[DIR_ATTR] = ATTR_VOLUME_ID;
    sector
}
