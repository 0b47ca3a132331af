// Path-backed block device: raw device nodes and disk image files.

use crate::{BlockDevice, DeviceGeometry, DeviceKind, FormatError};
use log::{debug, warn};
use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Paths currently held by a `FileDevice` in this process.
static HELD_DEVICES: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

pub const DEFAULT_SECTOR_SIZE: u32 = 512;

#[derive(Debug)]
pub struct FileDevice {
    path: PathBuf,
    name: String,
    bytes_per_sector: u32,
    sector_count: Option<u64>,
    lock_key: Option<PathBuf>,
    file: Option<File>,
}

impl FileDevice {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            name: path.display().to_string(),
            path,
            bytes_per_sector: DEFAULT_SECTOR_SIZE,
            sector_count: None,
            lock_key: None,
            file: None,
        }
    }

    pub fn with_sector_size(mut self, bytes_per_sector: u32) -> Self {
        self.bytes_per_sector = bytes_per_sector;
        self
    }

    /// Use a fixed sector count instead of the node's length.
    pub fn with_sector_count(mut self, sectors: u64) -> Self {
        self.sector_count = Some(sectors);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn geometry(&self) -> Result<DeviceGeometry, FormatError> {
        let total = match self.sector_count {
            Some(count) => count,
            None => {
                let mut file = File::open(&self.path)?;
                let len = file.seek(SeekFrom::End(0))?;
                len / self.bytes_per_sector.max(1) as u64
            }
        };
        DeviceGeometry::new(self.bytes_per_sector, total)
    }

    fn offset(&self, index: u64, len: usize) -> io::Result<u64> {
        if len != self.bytes_per_sector as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("buffer is {} bytes, sector is {}", len, self.bytes_per_sector),
            ));
        }
        Ok(index * self.bytes_per_sector as u64)
    }

    fn handle(&mut self) -> io::Result<&mut File> {
        let name = &self.name;
        self.file.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, format!("{} is not open", name))
        })
    }
}

impl BlockDevice for FileDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> Result<DeviceKind, FormatError> {
        let file_type = std::fs::metadata(&self.path)?.file_type();
        if file_type.is_file() {
            return Ok(DeviceKind::Raw);
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileTypeExt;
            if file_type.is_char_device() {
                return Ok(DeviceKind::Raw);
            }
            if file_type.is_block_device() {
                return Ok(DeviceKind::Block);
            }
        }
        Ok(DeviceKind::Other)
    }

    fn acquire(&mut self) -> Result<DeviceGeometry, FormatError> {
        let geometry = self.geometry().map_err(|e| {
            FormatError::DeviceUnavailable(format!("{}: cannot determine geometry: {}", self.name, e))
        })?;
        let key = self.path.canonicalize().unwrap_or_else(|_| self.path.clone());
        let mut held = HELD_DEVICES
            .lock()
            .map_err(|_| FormatError::DeviceUnavailable("device registry poisoned".to_string()))?;
        if !held.insert(key.clone()) {
            return Err(FormatError::DeviceUnavailable(format!(
                "{} is already in use",
                self.name
            )));
        }
        debug!("Acquired {} ({} x {} bytes)", self.name, geometry.total_sector_count, geometry.bytes_per_sector);
        self.lock_key = Some(key);
        Ok(geometry)
    }

    fn release(&mut self) {
        if let Some(key) = self.lock_key.take() {
            match HELD_DEVICES.lock() {
                Ok(mut held) => {
                    held.remove(&key);
                }
                Err(poisoned) => {
                    poisoned.into_inner().remove(&key);
                }
            }
            debug!("Released {}", self.name);
        }
    }

    fn open_write(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => {
                file.flush()?;
                file.sync_all()
            }
            None => Ok(()),
        }
    }

    fn read_sector(&mut self, index: u64, buf: &mut [u8]) -> io::Result<()> {
        let offset = self.offset(index, buf.len())?;
        let file = self.handle()?;
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)
    }

    fn write_sector(&mut self, index: u64, buf: &[u8]) -> io::Result<()> {
        let offset = self.offset(index, buf.len())?;
        let file = self.handle()?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)
    }
}

impl Drop for FileDevice {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close {}: {}", self.name, e);
        }
        self.release();
    }
}
