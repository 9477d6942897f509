use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEFAULT_STORE_NAME: &str = "NoteVault.store";
pub const TEMPORARY_PREFIX: &str = "Temporary";
pub const RESET_FLAG: &str = "--clean";

/// Where the store lives and how to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// The persistent store file
    pub store_path: PathBuf,

    /// Scratch location a migration step writes into before the swap
    pub temporary_path: PathBuf,

    /// Discard the existing store instead of migrating it
    pub reset: bool,
}

impl StoreConfig {
    /// Create a configuration for `store_path`, with the temporary store as a
    /// `Temporary`-prefixed sibling.
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        let store_path = store_path.into();
        let file_name = store_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string());
        let temporary_path =
            store_path.with_file_name(format!("{}{}", TEMPORARY_PREFIX, file_name));
        Self {
            store_path,
            temporary_path,
            reset: false,
        }
    }

    /// Default file names inside `dir`
    pub fn in_directory(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(DEFAULT_STORE_NAME))
    }

    /// Set the temporary store location
    pub fn with_temporary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.temporary_path = path.into();
        self
    }

    /// Set the reset flag
    pub fn with_reset(mut self, reset: bool) -> Self {
        self.reset = reset;
        self
    }

    /// Turn reset on when `--clean` is among the launch arguments
    pub fn with_reset_from_args<I, S>(self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let requested = args.into_iter().any(|arg| arg.into() == RESET_FLAG);
        if requested { self.with_reset(true) } else { self }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.store_path.as_os_str().is_empty() {
            return Err("store_path cannot be empty".to_string());
        }
        if self.store_path == self.temporary_path {
            return Err("temporary_path must differ from store_path".to_string());
        }
        if self.store_path.parent() != self.temporary_path.parent() {
            return Err("temporary_path must be in the same directory as store_path".to_string());
        }
        Ok(())
    }
}
