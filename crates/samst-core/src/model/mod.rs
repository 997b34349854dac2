// ── Domain model ──

pub mod attributes;
pub mod capability;
pub mod command;
pub mod device;

pub use attributes::{Attribute, AttributeRow, AttributeStore};
pub use capability::CapabilityIndex;
pub use command::{CommandRequest, execute};
pub use device::{CapabilityId, Device, DeviceFamily};
