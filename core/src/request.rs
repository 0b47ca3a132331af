use crate::FormatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// FAT width of a laid-out volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

impl FatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FatType::Fat12 => "FAT12",
            FatType::Fat16 => "FAT16",
            FatType::Fat32 => "FAT32",
        }
    }
}

impl fmt::Display for FatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// FAT type asked for by the caller.
///
/// Parses from the names `any`, `fat12`, `fat16`, `fat32` (case-insensitive)
/// and from the numeric codes 0..=3 used by older tooling. Anything else is
/// rejected with [`FormatError::InvalidParameter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "FatTypeValue", into = "String")]
pub enum FatTypeRequest {
    #[default]
    Any,
    Fat12,
    Fat16,
    Fat32,
}

impl FatTypeRequest {
    pub fn fixed(&self) -> Option<FatType> {
        match self {
            FatTypeRequest::Any => None,
            FatTypeRequest::Fat12 => Some(FatType::Fat12),
            FatTypeRequest::Fat16 => Some(FatType::Fat16),
            FatTypeRequest::Fat32 => Some(FatType::Fat32),
        }
    }
}

impl TryFrom<u8> for FatTypeRequest {
    type Error = FormatError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(FatTypeRequest::Any),
            1 => Ok(FatTypeRequest::Fat12),
            2 => Ok(FatTypeRequest::Fat16),
            3 => Ok(FatTypeRequest::Fat32),
            other => Err(FormatError::invalid(format!("unknown FAT type code {}", other))),
        }
    }
}

impl FromStr for FatTypeRequest {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "any" | "auto" => Ok(FatTypeRequest::Any),
            "fat12" => Ok(FatTypeRequest::Fat12),
            "fat16" => Ok(FatTypeRequest::Fat16),
            "fat32" => Ok(FatTypeRequest::Fat32),
            other => match other.parse::<u8>() {
                Ok(code) => FatTypeRequest::try_from(code),
                Err(_) => Err(FormatError::invalid(format!("unknown FAT type '{}'", s))),
            },
        }
    }
}

impl From<FatTypeRequest> for String {
    fn from(value: FatTypeRequest) -> Self {
        match value {
            FatTypeRequest::Any => "any",
            FatTypeRequest::Fat12 => "fat12",
            FatTypeRequest::Fat16 => "fat16",
            FatTypeRequest::Fat32 => "fat32",
        }
        .to_string()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FatTypeValue {
    Code(u8),
    Name(String),
}

impl TryFrom<FatTypeValue> for FatTypeRequest {
    type Error = FormatError;

    fn try_from(value: FatTypeValue) -> Result<Self, Self::Error> {
        match value {
            FatTypeValue::Code(code) => FatTypeRequest::try_from(code),
            FatTypeValue::Name(name) => name.parse(),
        }
    }
}

/// Caller's wishes for a format run. Zero means "pick automatically" for
/// every numeric field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatRequest {
    pub oem_name: Option<String>,
    pub volume_label: Option<String>,
    pub fat_type: FatTypeRequest,
    pub sectors_per_cluster: u32,
    pub fat_count: u32,
    pub files_per_root_dir: u32,
    pub media: u8,
    /// Skip the full-extent wipe.
    pub quick_format: bool,
    /// Alignment hint for the first data sector. Carried but not applied.
    pub cluster_align: u32,
    /// Read the boot sector back after writing and compare.
    pub verify: bool,
}

impl FormatRequest {
    pub fn from_json_str(text: &str) -> Result<Self, FormatError> {
        serde_json::from_str(text)
            .map_err(|e| FormatError::Configuration(format!("invalid format request: {}", e)))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, FormatError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FormatError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.volume_label = Some(label.into());
        self
    }

    pub fn quick(mut self) -> Self {
        self.quick_format = true;
        self
    }
}
