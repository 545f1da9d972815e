//! Configuration loading for imap-idle-notifier.

use std::path::PathBuf;

use config_core::Config;

pub mod locate;
pub mod paths;

/// The env var that overrides the config file path.
pub const CONFIG_PATH_ENV_VAR: &str = "IMAP_IDLE_NOTIFIER_CONFIG";

/// Load configuration using the standard configuration loading process.
#[cfg(feature = "env")]
pub async fn with_default_env_var() -> Result<locate::Meta<Config>, WithDefaultEnvVarError> {
    let env_path = envfury::maybe(CONFIG_PATH_ENV_VAR).map_err(WithDefaultEnvVarError::Env)?;
    with(env_path)
        .await
        .map_err(WithDefaultEnvVarError::Load)
}

/// Errors that can occur during configuration loading.
#[cfg(feature = "env")]
#[derive(Debug, thiserror::Error)]
pub enum WithDefaultEnvVarError {
    /// Env variable reading error.
    #[error("config path env var read: {0}")]
    Env(#[source] envfury::Error<envfury::ValueError<<PathBuf as std::str::FromStr>::Err>>),

    /// Loading configuration error.
    #[error(transparent)]
    Load(#[from] locate::LoadError<YamlError>),
}

/// Load configuration using the standard configuration loading process but
/// with a custom env path value.
pub async fn with(
    env_path: Option<PathBuf>,
) -> Result<locate::Meta<Config>, locate::LoadError<YamlError>> {
    let paths: Vec<PathBuf> = paths::resolve(env_path).collect();
    locate::load(&paths, |contents| parse_str(&contents)).await
}

/// Parse configuration directly from a YAML string.
pub fn parse_str(contents: &str) -> Result<Config, YamlError> {
    serde_yaml_bw::from_str(contents)
}

/// A convenience type-alias for the YAML parser error type.
pub type YamlError = serde_yaml_bw::Error;
