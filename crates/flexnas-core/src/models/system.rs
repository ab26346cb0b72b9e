use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    #[serde(other)]
    Unknown,
}

impl HealthStatus {
    pub fn display_name(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "Healthy",
            HealthStatus::Warning => "Warning",
            HealthStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(rename = "cpuUsage")]
    pub cpu_usage: f64,
    #[serde(rename = "memoryUsage")]
    pub memory_usage: f64,
    #[serde(rename = "storageUsage")]
    pub storage_usage: f64,
    #[serde(rename = "totalStorage")]
    pub total_storage: String,
    #[serde(rename = "usedStorage")]
    pub used_storage: String,
    #[serde(rename = "freeStorage")]
    pub free_storage: String,
    #[serde(rename = "systemStatus")]
    pub status: HealthStatus,
}

impl SystemStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
