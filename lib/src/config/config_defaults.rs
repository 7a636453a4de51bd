// lib/src/config/config_defaults.rs

use std::path::PathBuf;

use super::config_structs::StorageEngineType;

pub const DEFAULT_CONFIG_FILE: &str = "config/hms.yaml";
pub const DEFAULT_DATA_DIRECTORY: &str = "./data/hms";
pub const DEFAULT_REST_API_PORT: u16 = 8082;
pub const ENV_PREFIX: &str = "HMS";

pub fn default_host() -> String {
    "127.0.0.1".to_string()
}
pub fn default_port() -> u16 { DEFAULT_REST_API_PORT }
pub fn default_storage_engine_type() -> StorageEngineType { StorageEngineType::Sled }
pub fn default_data_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DATA_DIRECTORY)
}
pub fn default_cache_capacity() -> u64 { 256 * 1024 * 1024 }
pub fn default_token_ttl_hours() -> i64 { 12 }
pub fn default_reset_token_ttl_minutes() -> i64 { 30 }
pub fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}
pub fn default_hospital_number_prefix() -> String {
    "MH".to_string()
}
pub fn default_hospital_number_width() -> usize { 4 }
pub fn default_currency() -> String {
    "NGN".to_string()
}
