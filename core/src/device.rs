use crate::FormatError;
use serde::{Deserialize, Serialize};

/// Fixed geometry of a sector-addressed storage extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceGeometry {
    pub bytes_per_sector: u32,
    pub total_sector_count: u64,
}

impl DeviceGeometry {
    pub fn new(bytes_per_sector: u32, total_sector_count: u64) -> Result<Self, FormatError> {
        let geometry = Self {
            bytes_per_sector,
            total_sector_count,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Both fields non-zero, sector size a power of two.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.bytes_per_sector == 0 || !self.bytes_per_sector.is_power_of_two() {
            return Err(FormatError::invalid(format!(
                "bytes per sector must be a non-zero power of two, got {}",
                self.bytes_per_sector
            )));
        }
        if self.total_sector_count == 0 {
            return Err(FormatError::invalid("device has no sectors"));
        }
        Ok(())
    }

    pub fn size_bytes(&self) -> u64 {
        self.total_sector_count * self.bytes_per_sector as u64
    }
}

/// How the target node is addressed by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceKind {
    /// Sector-addressable character/raw node or a disk image file.
    Raw,
    /// Conventional buffered block device node.
    Block,
    Other,
}

/// The block device collaborator a format run is driven against.
///
/// A formatter calls these in a fixed order: `kind`, `acquire`, `open_write`,
/// any number of sector reads and writes, then `close` and `release`.
/// `close` and `release` must tolerate being called when the matching
/// `open_write`/`acquire` never happened or already failed.
/// Geometry failures inside `acquire` are reported as
/// [`FormatError::DeviceUnavailable`].
pub trait BlockDevice {
    fn name(&self) -> &str;

    fn kind(&self) -> Result<DeviceKind, FormatError>;

    /// Take the exclusive lock record and report the geometry.
    fn acquire(&mut self) -> Result<DeviceGeometry, FormatError>;

    fn release(&mut self);

    fn open_write(&mut self) -> std::io::Result<()>;

    /// Flush and drop the write handle.
    fn close(&mut self) -> std::io::Result<()>;

    /// `buf` must be exactly one sector long.
    fn read_sector(&mut self, index: u64, buf: &mut [u8]) -> std::io::Result<()>;

    /// `buf` must be exactly one sector long.
    fn write_sector(&mut self, index: u64, buf: &[u8]) -> std::io::Result<()>;
}

impl<D: BlockDevice + ?Sized> BlockDevice for &mut D {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn kind(&self) -> Result<DeviceKind, FormatError> {
        (**self).kind()
    }

    fn acquire(&mut self) -> Result<DeviceGeometry, FormatError> {
        (**self).acquire()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn open_write(&mut self) -> std::io::Result<()> {
        (**self).open_write()
    }

    fn close(&mut self) -> std::io::Result<()> {
        (**self).close()
    }

    fn read_sector(&mut self, index: u64, buf: &mut [u8]) -> std::io::Result<()> {
        (**self).read_sector(index, buf)
    }

    fn write_sector(&mut self, index: u64, buf: &[u8]) -> std::io::Result<()> {
        (**self).write_sector(index, buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_rejects_zero_and_odd_sector_sizes() {
        assert!(DeviceGeometry::new(0, 100).is_err());
        assert!(DeviceGeometry::new(520, 100).is_err());
        assert!(DeviceGeometry::new(512, 0).is_err());
        let g = DeviceGeometry::new(4096, 10).unwrap();
        assert_eq!(g.size_bytes(), 40960);
    }
}
