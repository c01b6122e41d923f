//! Configuration file loader with multi-source merging (§1 of SPEC_FULL).
//!
//! Priority (highest to lowest):
//! 1. `--config <path>` explicit file
//! 2. Project root: `./agora.toml`
//! 3. XDG config: `$XDG_CONFIG_HOME/agora/config.toml` (or the platform
//!    fallback `dirs::config_dir()` resolves to)
//! 4. Built-in defaults

use super::file_config::FileConfig;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use std::path::PathBuf;

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load(config_path: Option<&PathBuf>) -> Result<FileConfig, Box<figment::Error>> {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                figment = figment.merge(Toml::file(&global_path).nested());
            }
        }

        if let Some(path) = Self::project_config_path() {
            figment = figment.merge(Toml::file(&path));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path).nested());
        }

        figment.extract().map_err(Box::new)
    }

    /// Used for `--no-config`: skip every file source, keep only defaults
    /// layered under explicit CLI overrides.
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("agora").join("config.toml"))
    }

    pub fn project_config_path() -> Option<PathBuf> {
        let path = PathBuf::from("agora.toml");
        path.exists().then_some(path)
    }

    /// Print the config file locations being used, for `--verbose` startup
    /// diagnostics.
    pub fn print_config_sources() {
        println!("Configuration sources (in priority order):");

        match Self::project_config_path() {
            Some(path) => println!("  [FOUND] Project: {}", path.display()),
            None => println!("  [     ] Project: ./agora.toml"),
        }

        if let Some(path) = Self::global_config_path() {
            if path.exists() {
                println!("  [FOUND] Global:  {}", path.display());
            } else {
                println!("  [     ] Global:  {}", path.display());
            }
        }

        println!("  [     ] Default: built-in defaults");
    }
}
