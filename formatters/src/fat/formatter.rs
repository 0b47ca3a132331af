// FAT formatter: drives a block device through the format sequence
// Every step is fail-fast; the device is closed and released on every exit path

use fatfmt_core::{BlockDevice, DeviceGeometry, DeviceKind, FormatError, FormatRequest};
use log::{debug, info, warn};
use super::boot_sector::{encode_boot_sector, encode_fsinfo_sector};
use super::constants::*;
use super::directory::encode_volume_label_entry;
use super::fat_init::encode_initial_fat_entries;
use super::params::{derive, FormatParameters};

pub struct FatFormatter;

/// Holds the device between `acquire` and `release`.
struct DeviceSession<'a, D: BlockDevice + ?Sized> {
    device: &'a mut D,
    open: bool,
}

impl<'a, D: BlockDevice + ?Sized> DeviceSession<'a, D> {
    fn acquire(device: &'a mut D) -> Result<(Self, DeviceGeometry), FormatError> {
        let geometry = device.acquire()?;
        Ok((Self { device, open: false }, geometry))
    }

    fn open_write(&mut self) -> Result<(), FormatError> {
        self.device.open_write()?;
        self.open = true;
        Ok(())
    }

    fn write(&mut self, sector: u32, buf: &[u8]) -> Result<(), FormatError> {
        self.device.write_sector(sector as u64, buf).map_err(|e| {
            FormatError::IoError(std::io::Error::new(
                e.kind(),
                format!("writing sector {} of {}: {}", sector, self.device.name(), e),
            ))
        })
    }

    fn fill(&mut self, start: u32, count: u32, bytes_per_sector: u32, fill_byte: u8) -> Result<(), FormatError> {
        debug!("Filling sectors {}..{} with {:#04x}", start, start as u64 + count as u64, fill_byte);
        let buf = vec![fill_byte; bytes_per_sector as usize];
        for sector in start..start + count {
            self.write(sector, &buf)?;
        }
        Ok(())
    }

    fn read(&mut self, sector: u32, buf: &mut [u8]) -> Result<(), FormatError> {
        self.device.read_sector(sector as u64, buf)?;
        Ok(())
    }

    /// Close cleanly on the success path so flush errors surface.
    fn finish(mut self) -> Result<(), FormatError> {
        self.open = false;
        self.device.close()?;
        Ok(())
    }
}

impl<D: BlockDevice + ?Sized> Drop for DeviceSession<'_, D> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.device.close() {
                warn!("Failed to close {}: {}", self.device.name(), e);
            }
        }
        self.device.release();
    }
}

/// Pad a 512-byte image out to one device sector.
fn to_sector(image: &[u8], bytes_per_sector: u32) -> Vec<u8> {
    let mut sector = vec![0u8; bytes_per_sector as usize];
    sector[..image.len()].copy_from_slice(image);
    sector
}

impl FatFormatter {
    /// Derive the layout without touching any device.
    pub fn plan(
        &self,
        geometry: &DeviceGeometry,
        request: Option<&FormatRequest>,
    ) -> Result<FormatParameters, FormatError> {
        derive(geometry, request)
    }

    /// Lay a fresh FAT filesystem onto `device`.
    ///
    /// Nothing is written unless parameter derivation succeeds. Once writing
    /// has started a failure leaves the device content undefined.
    pub fn format<D: BlockDevice + ?Sized>(
        &self,
        device: &mut D,
        request: Option<&FormatRequest>,
    ) -> Result<FormatParameters, FormatError> {
        info!("Starting FAT format for device: {}", device.name());

        match device.kind()? {
            DeviceKind::Raw => {}
            kind => {
                return Err(FormatError::NotABlockDevice(format!(
                    "{} is not a raw sector device ({:?})",
                    device.name(),
                    kind
                )))
            }
        }

        let (mut session, geometry) = DeviceSession::acquire(device)?;
        session.open_write()?;

        let params = derive(&geometry, request)?;
        Self::log_layout(&params);

        let bytes_per_sector = params.bytes_per_sector;

        if request.map_or(false, |r| !r.quick_format) {
            info!("Wiping {} sectors", params.total_sector_count);
            session.fill(0, params.total_sector_count, bytes_per_sector, WIPE_FILL_BYTE)?;
        }

        let boot_sector = to_sector(&encode_boot_sector(&params), bytes_per_sector);
        session.write(0, &boot_sector)?;
        if params.mbr_backup_sector != 0 {
            session.write(params.mbr_backup_sector, &boot_sector)?;
        }
        info!("Wrote {} boot sector", params.fat_type);

        if params.fsinfo_sector != 0 {
            let fsinfo = to_sector(&encode_fsinfo_sector(&params), bytes_per_sector);
            session.write(params.fsinfo_sector, &fsinfo)?;
            info!("Wrote FSInfo sector at {}", params.fsinfo_sector);
        }

        session.fill(
            params.fat_start_sector(),
            params.fat_region_sector_count(),
            bytes_per_sector,
            0,
        )?;
        info!("Cleared {} FAT copies", params.fat_copy_count);

        session.fill(
            params.root_dir_start_sector,
            params.root_dir_format_sector_count,
            bytes_per_sector,
            0,
        )?;
        info!("Cleared root directory");

        if params.volume_label_present {
            let label = encode_volume_label_entry(&params.volume_label, bytes_per_sector);
            session.write(params.root_dir_start_sector, &label)?;

            let fat_head = encode_initial_fat_entries(&params);
            for copy in 0..params.fat_copy_count as u32 {
                session.write(params.fat_start_sector() + copy * params.sectors_per_fat, &fat_head)?;
            }
            info!("Wrote volume label and reserved FAT entries");
        }

        if request.map_or(false, |r| r.verify) {
            Self::verify_boot_sectors(&mut session, &params, &boot_sector)?;
        }

        session.finish()?;
        info!("FAT format completed successfully");
        Ok(params)
    }

    fn verify_boot_sectors<D: BlockDevice + ?Sized>(
        session: &mut DeviceSession<'_, D>,
        params: &FormatParameters,
        expected: &[u8],
    ) -> Result<(), FormatError> {
        let mut readback = vec![0u8; params.bytes_per_sector as usize];
        let mut locations = vec![0];
        if params.mbr_backup_sector != 0 {
            locations.push(params.mbr_backup_sector);
        }
        for sector in locations {
            session.read(sector, &mut readback)?;
            if readback != expected {
                return Err(FormatError::VerifyFailed(format!(
                    "boot sector at {} does not match what was written",
                    sector
                )));
            }
        }
        info!("Verified boot sector");
        Ok(())
    }

    fn log_layout(params: &FormatParameters) {
        info!(
            "{} layout: {} sectors of {} bytes, {} sectors/cluster, {} reserved, {} x {} sectors/FAT",
            params.fat_type,
            params.total_sector_count,
            params.bytes_per_sector,
            params.sectors_per_cluster,
            params.reserved_sector_count,
            params.fat_copy_count,
            params.sectors_per_fat
        );
        info!(
            "Root directory at sector {} ({} sectors formatted), data from sector {}, {} clusters",
            params.root_dir_start_sector,
            params.root_dir_format_sector_count,
            params.data_start_sector(),
            params.data_cluster_count()
        );
    }
}
