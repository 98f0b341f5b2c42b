//! Configuration: schema types and disk/env loading.

pub mod loader;
pub mod schema;

pub use loader::{get_config_path, load_config, save_config};
pub use schema::{
    Config, DeploymentConfig, LiveConfig, LocalConfig, ManagedConfig, ProvidersConfig,
    RouterConfig,
};
