// ── Cloud backend seam ──
//
// The reliability layer talks to SmartThings through this trait so the
// coordinator, dispatcher and prober can run against an in-memory fake.

use async_trait::async_trait;
use serde_json::Value;

use samst_api::CloudClient;
use samst_api::cloud::{DeviceCommand, DeviceDto, DeviceStatus, UserInfo};

#[async_trait]
pub trait CloudBackend: Send + Sync {
    async fn list_devices(&self) -> Result<Vec<DeviceDto>, samst_api::Error>;

    async fn get_device(&self, device_id: &str) -> Result<DeviceDto, samst_api::Error>;

    async fn get_status(&self, device_id: &str) -> Result<DeviceStatus, samst_api::Error>;

    async fn get_capability_def(
        &self,
        capability: &str,
        version: u32,
    ) -> Result<Value, samst_api::Error>;

    async fn send_commands(
        &self,
        device_id: &str,
        commands: &[DeviceCommand],
    ) -> Result<(), samst_api::Error>;

    /// Account behind the token; used to validate credentials.
    async fn get_user_me(&self) -> Result<UserInfo, samst_api::Error>;
}

#[async_trait]
impl CloudBackend for CloudClient {
    async fn list_devices(&self) -> Result<Vec<DeviceDto>, samst_api::Error> {
        CloudClient::list_devices(self).await
    }

    async fn get_device(&self, device_id: &str) -> Result<DeviceDto, samst_api::Error> {
        CloudClient::get_device(self, device_id).await
    }

    async fn get_status(&self, device_id: &str) -> Result<DeviceStatus, samst_api::Error> {
        CloudClient::get_status(self, device_id).await
    }

    async fn get_capability_def(
        &self,
        capability: &str,
        version: u32,
    ) -> Result<Value, samst_api::Error> {
        CloudClient::get_capability_def(self, capability, version).await
    }

    async fn send_commands(
        &self,
        device_id: &str,
        commands: &[DeviceCommand],
    ) -> Result<(), samst_api::Error> {
        CloudClient::send_commands(self, device_id, commands).await
    }

    async fn get_user_me(&self) -> Result<UserInfo, samst_api::Error> {
        CloudClient::get_user_me(self).await
    }
}
