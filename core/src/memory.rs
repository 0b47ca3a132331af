// In-memory block device, used for tests and for building images without
// touching real hardware.

use crate::{BlockDevice, DeviceGeometry, DeviceKind, FormatError};
use std::io;

#[derive(Debug, Clone)]
pub struct MemoryDevice {
    name: String,
    geometry: DeviceGeometry,
    kind: DeviceKind,
    data: Vec<u8>,
    held: bool,
    open: bool,
}

impl MemoryDevice {
    pub fn new(bytes_per_sector: u32, total_sector_count: u64) -> Result<Self, FormatError> {
        let geometry = DeviceGeometry::new(bytes_per_sector, total_sector_count)?;
        let len = usize::try_from(geometry.size_bytes())
            .map_err(|_| FormatError::invalid("memory device too large for this platform"))?;
        Ok(Self {
            name: format!("mem:{}x{}", total_sector_count, bytes_per_sector),
            geometry,
            kind: DeviceKind::Raw,
            data: vec![0u8; len],
            held: false,
            open: false,
        })
    }

    pub fn with_kind(mut self, kind: DeviceKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn geometry(&self) -> DeviceGeometry {
        self.geometry
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    /// Borrow one sector of the backing buffer.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the end of the device. Use
    /// [`BlockDevice::read_sector`] for a checked read.
    pub fn sector(&self, index: u64) -> &[u8] {
        let size = self.geometry.bytes_per_sector as usize;
        let start = index as usize * size;
        &self.data[start..start + size]
    }

    fn range(&self, index: u64, len: usize) -> io::Result<std::ops::Range<usize>> {
        let size = self.geometry.bytes_per_sector as usize;
        if len != size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("buffer is {} bytes, sector is {}", len, size),
            ));
        }
        if index >= self.geometry.total_sector_count {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("sector {} beyond end of {}", index, self.name),
            ));
        }
        let start = index as usize * size;
        Ok(start..start + size)
    }
}

impl BlockDevice for MemoryDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Result<DeviceKind, FormatError> {
        Ok(self.kind)
    }

    fn acquire(&mut self) -> Result<DeviceGeometry, FormatError> {
        if self.held {
            return Err(FormatError::DeviceUnavailable(format!(
                "{} is already in use",
                self.name
            )));
        }
        self.held = true;
        Ok(self.geometry)
    }

    fn release(&mut self) {
        self.held = false;
    }

    fn open_write(&mut self) -> io::Result<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.open = false;
        Ok(())
    }

    fn read_sector(&mut self, index: u64, buf: &mut [u8]) -> io::Result<()> {
        let range = self.range(index, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    fn write_sector(&mut self, index: u64, buf: &[u8]) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("{} is not open for writing", self.name),
            ));
        }
        let range = self.range(index, buf.len())?;
        self.data[range].copy_from_slice(buf);
        Ok(())
    }
}
