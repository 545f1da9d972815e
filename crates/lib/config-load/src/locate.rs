//! Configuration file lookup.

use std::path::{Path, PathBuf};

/// A payload along with the file it came from.
#[derive(Debug)]
pub struct Meta<T> {
    /// The actual payload.
    pub payload: T,

    /// The path.
    pub path: PathBuf,
}

/// Error returned while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// No configuration file found in any of the provided paths.
    #[error("no config file found in paths: {paths:?}")]
    NotFound {
        /// The paths that were tried.
        paths: Vec<PathBuf>,
    },

    /// Failed to read the configuration file from disk.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path to the configuration file.
        path: PathBuf,

        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Read the first of `paths` that exists.
///
/// Missing files are skipped; any other read error stops the search.
pub async fn read<P>(paths: &[P]) -> Result<Meta<String>, ReadError>
where
    P: AsRef<Path>,
{
    for path in paths {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(payload) => {
                return Ok(Meta {
                    payload,
                    path: path.to_path_buf(),
                });
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => continue,
            Err(source) => {
                return Err(ReadError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }

    Err(ReadError::NotFound {
        paths: paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
    })
}

/// Error returned while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum LoadError<LoaderError> {
    /// Failed to read the configuration file.
    #[error(transparent)]
    Read(ReadError),

    /// Failed to parse the configuration contents.
    #[error("failed to load config file {path}: {source}")]
    Load {
        /// Path to the configuration file.
        path: PathBuf,

        /// Underlying loader error.
        #[source]
        source: LoaderError,
    },
}

/// Read the first existing file and parse it with `loader`.
pub async fn load<P, L, T, E>(paths: &[P], loader: L) -> Result<Meta<T>, LoadError<E>>
where
    L: FnOnce(String) -> Result<T, E>,
    P: AsRef<Path>,
{
    let Meta { path, payload } = read(paths).await.map_err(LoadError::Read)?;
    match (loader)(payload) {
        Ok(payload) => Ok(Meta { payload, path }),
        Err(source) => Err(LoadError::Load { path, source }),
    }
}
