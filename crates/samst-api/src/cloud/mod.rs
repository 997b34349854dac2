// SmartThings cloud REST API.

pub mod client;
pub mod types;

pub use client::{CloudClient, DEFAULT_BASE_URL, parse_retry_after};
pub use types::{
    AttributeState, CapabilityRef, ComponentDto, ComponentStatus, DeviceCommand, DeviceDto,
    DeviceStatus, OcfInfo, UserInfo,
};
