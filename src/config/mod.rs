//! Application configuration

mod app_config;

pub use app_config::{
    minutes, AppConfig, AwsConfig, FallbackStorageConfig, IngestionConfig, KnowledgeBaseConfig,
    LogFormat, LoggingConfig, OutputConfig, PrimaryStorageConfig, StorageConfig,
};
