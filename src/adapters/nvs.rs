//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] for the persistence manager.  Two backends:
//!
//! - **`target_os = "espidf"`**: NVS blobs, one namespace per record
//!   family (`config`, `fuel`), committed after every write.
//! - **host**: an in-memory map, used by tests and bench simulation.
//!
//! NVS namespace and key names are limited to 15 characters; both
//! backends truncate longer names the same way.

use crate::app::ports::{StorageError, StoragePort};
use log::info;

/// NVS name length limit (excluding the NUL terminator).
const NVS_NAME_MAX: usize = 15;

pub struct NvsAdapter {
    backend: backend::Blobs,
}

/// Adapter without flash initialisation.  On target every access then
/// fails, so the controller runs on defaults without persistence.
impl Default for NvsAdapter {
    fn default() -> Self {
        Self {
            backend: backend::Blobs::default(),
        }
    }
}

impl NvsAdapter {
    /// Initialise the NVS partition and return an adapter over it.
    ///
    /// A full partition, or one written by a newer NVS layout, is erased
    /// first; persisted records then load as missing.
    pub fn new() -> Result<Self, StorageError> {
        backend::init()?;
        Ok(Self::default())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.backend
            .get(truncate_name(namespace), truncate_name(key), buf)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.backend
            .set(truncate_name(namespace), truncate_name(key), data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.backend
            .erase(truncate_name(namespace), truncate_name(key))
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.backend
            .contains(truncate_name(namespace), truncate_name(key))
    }
}

fn truncate_name(name: &str) -> &str {
    let mut end = name.len().min(NVS_NAME_MAX);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

// ---------------------------------------------------------------------------
// Host backend
// ---------------------------------------------------------------------------

#[cfg(not(target_os = "espidf"))]
mod backend {
    use super::{StorageError, info};
    use std::cell::RefCell;
    use std::collections::HashMap;

    pub(super) fn init() -> Result<(), StorageError> {
        info!("NvsAdapter: simulation backend");
        Ok(())
    }

    /// `(namespace, key)` → blob.
    #[derive(Default)]
    pub(super) struct Blobs {
        map: RefCell<HashMap<(String, String), Vec<u8>>>,
    }

    impl Blobs {
        fn slot(namespace: &str, key: &str) -> (String, String) {
            (namespace.to_owned(), key.to_owned())
        }

        pub(super) fn get(
            &self,
            namespace: &str,
            key: &str,
            buf: &mut [u8],
        ) -> Result<usize, StorageError> {
            let map = self.map.borrow();
            let blob = map
                .get(&Self::slot(namespace, key))
                .ok_or(StorageError::NotFound)?;
            let dst = buf
                .get_mut(..blob.len())
                .ok_or(StorageError::BufferTooSmall)?;
            dst.copy_from_slice(blob);
            Ok(blob.len())
        }

        pub(super) fn set(
            &self,
            namespace: &str,
            key: &str,
            data: &[u8],
        ) -> Result<(), StorageError> {
            self.map
                .borrow_mut()
                .insert(Self::slot(namespace, key), data.to_vec());
            Ok(())
        }

        pub(super) fn erase(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
            self.map.borrow_mut().remove(&Self::slot(namespace, key));
            Ok(())
        }

        pub(super) fn contains(&self, namespace: &str, key: &str) -> bool {
            self.map
                .borrow()
                .contains_key(&Self::slot(namespace, key))
        }
    }
}

// ---------------------------------------------------------------------------
// ESP-IDF backend
// ---------------------------------------------------------------------------

#[cfg(target_os = "espidf")]
mod backend {
    use super::{NVS_NAME_MAX, StorageError, info};
    use esp_idf_svc::sys::*;
    use log::warn;

    /// Map an `esp_err_t` to `Result`.
    fn check(ret: esp_err_t) -> Result<(), esp_err_t> {
        if ret == ESP_OK { Ok(()) } else { Err(ret) }
    }

    pub(super) fn init() -> Result<(), StorageError> {
        // SAFETY: called once from the main task before any NVS access.
        let ret = unsafe { nvs_flash_init() };
        let ret = if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
            warn!("NVS: partition unusable ({}), erasing", ret);
            check(unsafe { nvs_flash_erase() }).map_err(|_| StorageError::IoError)?;
            unsafe { nvs_flash_init() }
        } else {
            ret
        };
        check(ret).map_err(|_| StorageError::IoError)?;
        info!("NvsAdapter: ESP-IDF NVS initialised");
        Ok(())
    }

    /// NUL-terminated copy of an (already truncated) NVS name.
    fn c_name(name: &str) -> [u8; NVS_NAME_MAX + 1] {
        let mut buf = [0u8; NVS_NAME_MAX + 1];
        buf[..name.len()].copy_from_slice(name.as_bytes());
        buf
    }

    /// Open namespace handle; closed on drop.
    struct Handle(nvs_handle_t);

    impl Handle {
        fn open(namespace: &str, writable: bool) -> Result<Self, esp_err_t> {
            let ns = c_name(namespace);
            let mode = if writable {
                nvs_open_mode_t_NVS_READWRITE
            } else {
                nvs_open_mode_t_NVS_READONLY
            };
            let mut raw: nvs_handle_t = 0;
            check(unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut raw) })?;
            Ok(Self(raw))
        }

        fn commit(&self) -> Result<(), esp_err_t> {
            check(unsafe { nvs_commit(self.0) })
        }
    }

    impl Drop for Handle {
        fn drop(&mut self) {
            unsafe { nvs_close(self.0) };
        }
    }

    /// Stateless: every access opens its namespace.
    #[derive(Default)]
    pub(super) struct Blobs;

    impl Blobs {
        pub(super) fn get(
            &self,
            namespace: &str,
            key: &str,
            buf: &mut [u8],
        ) -> Result<usize, StorageError> {
            let k = c_name(key);
            let mut len = buf.len();
            let result = Handle::open(namespace, false).and_then(|h| {
                check(unsafe {
                    nvs_get_blob(h.0, k.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut len)
                })
            });
            match result {
                Ok(()) => Ok(len),
                Err(ESP_ERR_NVS_NOT_FOUND) => Err(StorageError::NotFound),
                Err(ESP_ERR_NVS_INVALID_LENGTH) => Err(StorageError::BufferTooSmall),
                Err(e) => {
                    warn!("NvsAdapter: read {}/{} failed ({})", namespace, key, e);
                    Err(StorageError::IoError)
                }
            }
        }

        pub(super) fn set(
            &self,
            namespace: &str,
            key: &str,
            data: &[u8],
        ) -> Result<(), StorageError> {
            let k = c_name(key);
            let result = Handle::open(namespace, true).and_then(|h| {
                check(unsafe {
                    nvs_set_blob(h.0, k.as_ptr().cast(), data.as_ptr().cast(), data.len())
                })?;
                h.commit()
            });
            result.map_err(|e| {
                warn!("NvsAdapter: write {}/{} failed ({})", namespace, key, e);
                match e {
                    ESP_ERR_NVS_NOT_ENOUGH_SPACE => StorageError::Full,
                    _ => StorageError::IoError,
                }
            })
        }

        pub(super) fn erase(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
            let k = c_name(key);
            let result = Handle::open(namespace, true).and_then(|h| {
                match check(unsafe { nvs_erase_key(h.0, k.as_ptr().cast()) }) {
                    Ok(()) | Err(ESP_ERR_NVS_NOT_FOUND) => h.commit(),
                    Err(e) => Err(e),
                }
            });
            match result {
                // Namespace never created: nothing to erase.
                Ok(()) | Err(ESP_ERR_NVS_NOT_FOUND) => Ok(()),
                Err(_) => Err(StorageError::IoError),
            }
        }

        pub(super) fn contains(&self, namespace: &str, key: &str) -> bool {
            let k = c_name(key);
            Handle::open(namespace, false)
                .and_then(|h| {
                    check(unsafe {
                        nvs_find_key(h.0, k.as_ptr().cast(), core::ptr::null_mut())
                    })
                })
                .is_ok()
        }
    }
}
