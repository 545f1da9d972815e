//! Default configuration file paths.

use std::path::PathBuf;

use either::Either;

/// Returns an iterator over default configuration file paths.
///
/// The paths are yielded in order of preference:
/// 1. User-specific config directory (XDG standard) - multiple variants
/// 2. User-specific config in home directory (fallback) - multiple variants
/// 3. System-wide config
pub fn defaults() -> impl Iterator<Item = PathBuf> {
    let config_path = dirs::config_dir().into_iter().flat_map(|d| {
        [
            d.join("imap-idle-notifier/config.yaml"),
            d.join("imap-idle-notifier.yaml"),
        ]
    });
    let home_path = dirs::home_dir().into_iter().flat_map(|d| {
        [
            d.join(".imap-idle-notifier.yaml"),
            d.join(".imap-idle-notifier/config.yaml"),
        ]
    });
    let system_path =
        std::iter::once_with(|| PathBuf::from("/etc/imap-idle-notifier/config.yaml"));

    config_path.chain(home_path).chain(system_path)
}

/// Use the explicit path if there is one, the defaults otherwise.
pub fn resolve(env_path: Option<PathBuf>) -> impl Iterator<Item = PathBuf> {
    match env_path {
        Some(val) => Either::Left(std::iter::once(val)),
        None => Either::Right(defaults()),
    }
}
