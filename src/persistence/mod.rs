//! Key/value persistence
//!
//! Small JSON documents stored under a string key:
//! - LocalStorage on web
//! - One `<key>.json` file per key on native, under `ANTIGRAVITY_DATA_DIR`
//!   (default: the working directory)

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StoreError;

/// Raw string storage backend
pub trait Storage {
    /// `Ok(None)` when nothing is stored under `key`.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&self, key: &str, data: &str) -> Result<(), StoreError>;
}

pub fn load_json<T: DeserializeOwned, S: Storage + ?Sized>(
    store: &S,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.read(key)? {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize, S: Storage + ?Sized>(store: &S, key: &str, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    store.write(key, &json)
}

#[cfg(not(target_arch = "wasm32"))]
pub use native::FileStore;

#[cfg(target_arch = "wasm32")]
pub use web::LocalStore;

/// The platform's default backend.
#[cfg(not(target_arch = "wasm32"))]
pub fn default_store() -> FileStore {
    FileStore::from_env()
}

#[cfg(target_arch = "wasm32")]
pub fn default_store() -> LocalStore {
    LocalStore
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fs;
    use std::io::ErrorKind;
    use std::path::PathBuf;

    use super::Storage;
    use crate::error::StoreError;

    /// Environment variable overriding the data directory
    pub const DATA_DIR_ENV: &str = "ANTIGRAVITY_DATA_DIR";

    #[derive(Debug, Clone)]
    pub struct FileStore {
        dir: PathBuf,
    }

    impl FileStore {
        pub fn new(dir: impl Into<PathBuf>) -> Self {
            Self { dir: dir.into() }
        }

        pub fn from_env() -> Self {
            let dir = std::env::var_os(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            Self::new(dir)
        }

        fn path(&self, key: &str) -> PathBuf {
            self.dir.join(format!("{key}.json"))
        }
    }

    impl Storage for FileStore {
        fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
            match fs::read_to_string(self.path(key)) {
                Ok(json) => Ok(Some(json)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        fn write(&self, key: &str, data: &str) -> Result<(), StoreError> {
            fs::create_dir_all(&self.dir)?;
            // Write then rename so a crash never leaves half a file
            let tmp = self.dir.join(format!("{key}.json.tmp"));
            fs::write(&tmp, data)?;
            fs::rename(&tmp, self.path(key))?;
            Ok(())
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod web {
    use super::Storage;
    use crate::error::StoreError;

    /// Browser LocalStorage
    #[derive(Debug, Clone, Copy, Default)]
    pub struct LocalStore;

    fn storage() -> Result<web_sys::Storage, StoreError> {
        web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or(StoreError::Unavailable)
    }

    impl Storage for LocalStore {
        fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
            storage()?.get_item(key).map_err(|_| StoreError::Unavailable)
        }

        fn write(&self, key: &str, data: &str) -> Result<(), StoreError> {
            storage()?.set_item(key, data).map_err(|_| StoreError::Unavailable)
        }
    }
}
