pub mod device;
pub mod error;
pub mod file_device;
pub mod memory;
pub mod request;

pub use device::{BlockDevice, DeviceGeometry, DeviceKind};
pub use error::FormatError;
pub use file_device::FileDevice;
pub use memory::MemoryDevice;
pub use request::{FatType, FatTypeRequest, FormatRequest};
