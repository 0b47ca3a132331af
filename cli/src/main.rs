use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use fatfmt_core::{BlockDevice, DeviceGeometry, FatTypeRequest, FileDevice, FormatRequest};
use fatfmt_formatters::{FatFormatter, FormatParameters};
use log::debug;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fatfmt")]
#[command(about = "Lay a fresh FAT12/16/32 filesystem onto a raw device or disk image", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format a raw device node or image file
    Format {
        /// Device or image path
        device: PathBuf,
        #[command(flatten)]
        request: RequestArgs,
        #[command(flatten)]
        geometry: GeometryArgs,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
        /// Print the resulting layout as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the layout a format would produce without writing anything
    Plan {
        /// Device or image path; may be omitted when --sectors is given
        device: Option<PathBuf>,
        #[command(flatten)]
        request: RequestArgs,
        #[command(flatten)]
        geometry: GeometryArgs,
        /// Print the layout as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// JSON format request; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// FAT width: any, fat12, fat16, fat32 (or 0..=3)
    #[arg(short = 't', long)]
    fat_type: Option<FatTypeRequest>,
    /// Volume label, up to 11 characters
    #[arg(short, long)]
    label: Option<String>,
    /// OEM name, up to 8 characters
    #[arg(long)]
    oem: Option<String>,
    #[arg(long)]
    sectors_per_cluster: Option<u32>,
    /// Number of FAT copies (1..=6)
    #[arg(long)]
    fats: Option<u32>,
    /// Root directory entries (FAT12/16 only)
    #[arg(long)]
    root_entries: Option<u32>,
    /// Media descriptor, e.g. 0xF8
    #[arg(long, value_parser = parse_media)]
    media: Option<u8>,
    /// Skip the full-device wipe
    #[arg(short, long)]
    quick: bool,
    /// Read the boot sector back after writing
    #[arg(long)]
    verify: bool,
}

#[derive(Args)]
struct GeometryArgs {
    #[arg(long, default_value_t = 512)]
    sector_size: u32,
    /// Sector count; defaults to the size of the device
    #[arg(long)]
    sectors: Option<u64>,
}

fn parse_media(s: &str) -> Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| format!("invalid media code '{}': {}", s, e))
}

impl RequestArgs {
    fn build(&self) -> anyhow::Result<FormatRequest> {
        let mut request = match &self.config {
            Some(path) => FormatRequest::from_json_file(path)
                .with_context(|| format!("Failed to load format request from {}", path.display()))?,
            None => FormatRequest::default(),
        };

        if let Some(fat_type) = self.fat_type {
            request.fat_type = fat_type;
        }
        if let Some(label) = &self.label {
            request.volume_label = Some(label.clone());
        }
        if let Some(oem) = &self.oem {
            request.oem_name = Some(oem.clone());
        }
        if let Some(spc) = self.sectors_per_cluster {
            request.sectors_per_cluster = spc;
        }
        if let Some(fats) = self.fats {
            request.fat_count = fats;
        }
        if let Some(entries) = self.root_entries {
            request.files_per_root_dir = entries;
        }
        if let Some(media) = self.media {
            request.media = media;
        }
        request.quick_format |= self.quick;
        request.verify |= self.verify;

        debug!("Effective format request: {:?}", request);
        Ok(request)
    }
}

fn open_device(path: &Path, geometry: &GeometryArgs) -> FileDevice {
    let device = FileDevice::new(path).with_sector_size(geometry.sector_size);
    match geometry.sectors {
        Some(sectors) => device.with_sector_count(sectors),
        None => device,
    }
}

fn print_layout(params: &FormatParameters, json: bool) -> anyhow::Result<()> {
    if json {
        let layout = serde_json::json!({
            "fat_type": params.fat_type.as_str(),
            "bytes_per_sector": params.bytes_per_sector,
            "total_sectors": params.total_sector_count,
            "sectors_per_cluster": params.sectors_per_cluster,
            "cluster_bytes": params.cluster_bytes(),
            "reserved_sectors": params.reserved_sector_count,
            "fat_copies": params.fat_copy_count,
            "sectors_per_fat": params.sectors_per_fat,
            "root_entries": params.files_per_root_dir,
            "root_dir_start": params.root_dir_start_sector,
            "data_start": params.data_start_sector(),
            "data_clusters": params.data_cluster_count(),
            "media": params.media_code,
            "oem_name": params.oem_name_str(),
            "volume_label": params.volume_label_str(),
            "volume_id": format!("{:08X}", params.volume_id),
        });
        println!("{}", serde_json::to_string_pretty(&layout)?);
        return Ok(());
    }

    println!("Filesystem:          {}", params.fat_type);
    println!("  Sector size:       {} bytes", params.bytes_per_sector);
    println!("  Total sectors:     {}", params.total_sector_count);
    println!(
        "  Cluster size:      {} sectors ({} bytes)",
        params.sectors_per_cluster,
        params.cluster_bytes()
    );
    println!("  Reserved sectors:  {}", params.reserved_sector_count);
    println!("  FATs:              {} x {} sectors", params.fat_copy_count, params.sectors_per_fat);
    if params.files_per_root_dir != 0 {
        println!(
            "  Root directory:    {} entries at sector {}",
            params.files_per_root_dir, params.root_dir_start_sector
        );
    } else {
        println!("  Root directory:    cluster 2 at sector {}", params.root_dir_start_sector);
    }
    println!("  Data area:         sector {}, {} clusters", params.data_start_sector(), params.data_cluster_count());
    println!("  Media descriptor:  {:#04X}", params.media_code);
    println!("  OEM name:          {}", params.oem_name_str());
    if let Some(label) = params.volume_label_str() {
        println!("  Volume label:      {}", label);
    }
    println!("  Volume id:         {:08X}", params.volume_id);
    Ok(())
}

fn confirm(device: &Path) -> anyhow::Result<bool> {
    println!("\nWARNING: This will ERASE ALL DATA on {}!", device.display());
    print!("Type 'yes' to continue: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim() == "yes")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    let formatter = FatFormatter;

    match cli.command {
        Commands::Format { device, request, geometry, yes, json } => {
            let request = request.build()?;
            let mut target = open_device(&device, &geometry);

            if !yes && !confirm(&device)? {
                println!("Format cancelled.");
                return Ok(());
            }

            let params = formatter
                .format(&mut target, Some(&request))
                .with_context(|| format!("Failed to format {}", device.display()))?;
            print_layout(&params, json)?;
            if !json {
                println!("\nFormat completed successfully!");
            }
        }
        Commands::Plan { device, request, geometry, json } => {
            let request = request.build()?;
            let device_geometry = match (&device, geometry.sectors) {
                (_, Some(sectors)) => DeviceGeometry::new(geometry.sector_size, sectors)?,
                (Some(path), None) => {
                    let mut target = open_device(path, &geometry);
                    let device_geometry = target
                        .acquire()
                        .with_context(|| format!("Failed to read geometry of {}", path.display()))?;
                    target.release();
                    device_geometry
                }
                (None, None) => bail!("plan needs a device path or --sectors"),
            };

            let params = formatter.plan(&device_geometry, Some(&request))?;
            print_layout(&params, json)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_parsing() {
        assert_eq!(parse_media("0xF0").unwrap(), 0xF0);
        assert_eq!(parse_media("248").unwrap(), 0xF8);
        assert!(parse_media("0x1FF").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "fatfmt", "plan", "--sectors", "30000", "-t", "fat16", "--label", "DATA", "--fats", "1", "-q",
        ])
        .unwrap();
        let Commands::Plan { request, .. } = cli.command else {
            panic!("expected plan");
        };
        let request = request.build().unwrap();
        assert_eq!(request.fat_type, FatTypeRequest::Fat16);
        assert_eq!(request.volume_label.as_deref(), Some("DATA"));
        assert_eq!(request.fat_count, 1);
        assert!(request.quick_format);
        assert!(!request.verify);
    }

    #[test]
    fn test_unknown_fat_type_is_rejected() {
        assert!(Cli::try_parse_from(["fatfmt", "plan", "--sectors", "100", "-t", "fat64"]).is_err());
    }
}
