//! Configuration - Defaults, Optional TOML File, Environment
//!
//! Layering, lowest to highest: built-in defaults, the config file (explicit
//! path or `REPORTPRESS_CONFIG`), then `REPORTPRESS_*` environment
//! variables with `__` between nested keys, e.g.
//! `REPORTPRESS_RENDER__TIMEOUT_SECS=60`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub use config::ConfigError;
use serde::Deserialize;

#[cfg(feature = "chromium")]
use crate::rasterizer::ChromiumRasterizer;
use crate::rasterizer::{Rasterizer, WkhtmltopdfRasterizer};

pub const ENV_PREFIX: &str = "REPORTPRESS";
pub const CONFIG_PATH_VAR: &str = "REPORTPRESS_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub render: RenderConfig,
    pub rasterizer: RasterizerConfig,
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterizerKind {
    Wkhtmltopdf,
    Chromium,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RasterizerConfig {
    pub kind: RasterizerKind,
    /// Executable for process-based backends.
    pub binary: PathBuf,
    /// Chromium only.
    pub sandbox: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    pub assets_dir: PathBuf,
    /// One sub-directory per report; reports without one use the
    /// built-in templates.
    pub templates_dir: PathBuf,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("render.timeout_secs", 30_i64)?
            .set_default("rasterizer.kind", "wkhtmltopdf")?
            .set_default("rasterizer.binary", "wkhtmltopdf")?
            .set_default("rasterizer.sandbox", true)?
            .set_default("paths.assets_dir", "assets")?
            .set_default("paths.templates_dir", "templates")?;

        let file = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));

        if let Some(file) = file {
            if !file.exists() {
                return Err(ConfigError::Message(format!(
                    "Configuration file '{}' does not exist",
                    file.display()
                )));
            }
            tracing::debug!(path = %file.display(), "loading configuration file");
            builder = builder.add_source(config::File::from(file));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.render.timeout_secs)
    }

    /// The configured backend, bounded by the render timeout.
    pub fn rasterizer(&self) -> Result<Arc<dyn Rasterizer>, ConfigError> {
        self.rasterizer.build(self.timeout())
    }
}

impl RasterizerConfig {
    #[cfg_attr(not(feature = "chromium"), allow(unused_variables))]
    pub fn build(&self, timeout: Duration) -> Result<Arc<dyn Rasterizer>, ConfigError> {
        match self.kind {
            RasterizerKind::Wkhtmltopdf => {
                Ok(Arc::new(WkhtmltopdfRasterizer::new(self.binary.clone())))
            }
            #[cfg(feature = "chromium")]
            RasterizerKind::Chromium => {
                let rasterizer = ChromiumRasterizer::new().with_timeout(timeout);
                let rasterizer = if self.sandbox {
                    rasterizer
                } else {
                    rasterizer.without_sandbox()
                };
                Ok(Arc::new(rasterizer))
            }
            #[cfg(not(feature = "chromium"))]
            RasterizerKind::Chromium => Err(ConfigError::Message(
                "The chromium rasterizer requires the 'chromium' feature".to_string(),
            )),
        }
    }
}
