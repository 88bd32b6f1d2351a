// Configuration management module
// TOML settings for the service, the embedding model, the store and the client

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    ClientConfig, Config, ConfigError, OllamaConfig, QueryConfig, ServerConfig, StoreConfig,
};
