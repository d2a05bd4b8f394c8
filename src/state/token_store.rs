use crate::types::TokenPair;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::warn;

pub const DEFAULT_KEYRING_SERVICE: &str = "io.loyalbridge.admin-console";
pub const KEY_ACCESS_TOKEN: &str = "accessToken";
pub const KEY_REFRESH_TOKEN: &str = "refreshToken";

#[derive(Debug, Error)]
pub enum TokenStoreError {
    #[error("OS keychain/secret service is unavailable: {0}")]
    Unavailable(String),
    #[error("failed to access stored `{key}`: {message}")]
    Backend { key: String, message: String },
}

/// Durable string storage for the two token entries.
pub trait SecretBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, TokenStoreError>;
    fn write(&self, key: &str, value: &str) -> Result<(), TokenStoreError>;
    fn remove(&self, key: &str) -> Result<(), TokenStoreError>;
}

pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, keyring::Error> {
        keyring::Entry::new(&self.service, key)
    }
}

fn backend_error(key: &str, err: keyring::Error) -> TokenStoreError {
    match err {
        keyring::Error::NoStorageAccess(e) | keyring::Error::PlatformFailure(e) => {
            TokenStoreError::Unavailable(e.to_string())
        }
        other => TokenStoreError::Backend {
            key: key.to_string(),
            message: other.to_string(),
        },
    }
}

impl SecretBackend for KeyringBackend {
    fn read(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
        let entry = self.entry(key).map_err(|e| backend_error(key, e))?;
        match entry.get_password() {
            Ok(value) => {
                let trimmed = value.trim().to_string();
                Ok((!trimmed.is_empty()).then_some(trimmed))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e @ (keyring::Error::NoStorageAccess(_) | keyring::Error::PlatformFailure(_))) => {
                Err(backend_error(key, e))
            }
            // Undecodable or ambiguous entries cannot be a usable token.
            Err(_) => Ok(None),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), TokenStoreError> {
        let entry = self.entry(key).map_err(|e| backend_error(key, e))?;
        entry.set_password(value).map_err(|e| backend_error(key, e))
    }

    fn remove(&self, key: &str) -> Result<(), TokenStoreError> {
        let entry = self.entry(key).map_err(|e| backend_error(key, e))?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(backend_error(key, e)),
        }
    }
}

/// Process-local backend; tokens do not survive a restart.
#[derive(Default)]
pub struct MemoryBackend {
    values: std::sync::Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    fn values(
        &self,
        key: &str,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, TokenStoreError> {
        self.values.lock().map_err(|_| TokenStoreError::Backend {
            key: key.to_string(),
            message: "in-memory store poisoned".to_string(),
        })
    }
}

impl SecretBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
        Ok(self.values(key)?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), TokenStoreError> {
        self.values(key)?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), TokenStoreError> {
        self.values(key)?.remove(key);
        Ok(())
    }
}

enum Cached {
    Unloaded,
    Loaded(Option<TokenPair>),
}

/// Holder of the persisted access/refresh pair.
///
/// Reads are public; writes are crate-private so only the session manager
/// can change what is stored. A cache sits in front of the backend and is
/// updated under the same lock as every backend write.
#[derive(Clone)]
pub struct TokenStore {
    backend: Arc<dyn SecretBackend>,
    cached: Arc<Mutex<Cached>>,
}

impl TokenStore {
    pub fn new(backend: Arc<dyn SecretBackend>) -> Self {
        Self {
            backend,
            cached: Arc::new(Mutex::new(Cached::Unloaded)),
        }
    }

    pub fn keyring(service: &str) -> Self {
        Self::with_fallback(Arc::new(KeyringBackend::new(service)))
    }

    /// Uses `primary` if it answers a read, otherwise a process-local store.
    pub fn with_fallback(primary: Arc<dyn SecretBackend>) -> Self {
        match primary.read(KEY_ACCESS_TOKEN) {
            Ok(_) => Self::new(primary),
            Err(err) => {
                warn!(error = %err, "secure token storage unavailable; session will not persist");
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()))
    }

    /// Returns the stored pair; a partial pair counts as absent.
    pub async fn load(&self) -> Result<Option<TokenPair>, TokenStoreError> {
        let mut guard = self.cached.lock().await;
        if let Cached::Loaded(pair) = &*guard {
            return Ok(pair.clone());
        }

        let access = self.backend.read(KEY_ACCESS_TOKEN)?;
        let refresh = self.backend.read(KEY_REFRESH_TOKEN)?;
        let pair = TokenPair::from_parts(access, refresh);
        *guard = Cached::Loaded(pair.clone());
        Ok(pair)
    }

    pub async fn current(&self) -> Option<TokenPair> {
        match self.load().await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(error = %err, "token store unreadable; treating session as absent");
                None
            }
        }
    }

    pub async fn access_token(&self) -> Option<String> {
        self.current().await.map(|pair| pair.access_token)
    }

    pub(crate) async fn save(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        let mut guard = self.cached.lock().await;
        let written = self
            .backend
            .write(KEY_ACCESS_TOKEN, &pair.access_token)
            .and_then(|()| self.backend.write(KEY_REFRESH_TOKEN, &pair.refresh_token));

        match written {
            Ok(()) => {
                *guard = Cached::Loaded(Some(pair.clone()));
                Ok(())
            }
            Err(err) => {
                // Never leave half a pair behind.
                for key in [KEY_ACCESS_TOKEN, KEY_REFRESH_TOKEN] {
                    if let Err(remove_err) = self.backend.remove(key) {
                        warn!(key, error = %remove_err, "failed to roll back partial token write");
                    }
                }
                *guard = Cached::Loaded(None);
                Err(err)
            }
        }
    }

    /// Empties the cache unconditionally, then removes both entries.
    pub(crate) async fn clear(&self) -> Result<(), TokenStoreError> {
        let mut guard = self.cached.lock().await;
        *guard = Cached::Loaded(None);
        let access = self.backend.remove(KEY_ACCESS_TOKEN);
        let refresh = self.backend.remove(KEY_REFRESH_TOKEN);
        access.and(refresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingWrites {
        inner: MemoryBackend,
        fail_key: &'static str,
        fail_removes: bool,
    }

    impl SecretBackend for FailingWrites {
        fn read(&self, key: &str) -> Result<Option<String>, TokenStoreError> {
            self.inner.read(key)
        }

        fn write(&self, key: &str, value: &str) -> Result<(), TokenStoreError> {
            if key == self.fail_key {
                return Err(TokenStoreError::Unavailable("locked".to_string()));
            }
            self.inner.write(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), TokenStoreError> {
            if self.fail_removes {
                return Err(TokenStoreError::Backend {
                    key: key.to_string(),
                    message: "delete denied".to_string(),
                });
            }
            self.inner.remove(key)
        }
    }

    struct Unreachable;

    impl SecretBackend for Unreachable {
        fn read(&self, _key: &str) -> Result<Option<String>, TokenStoreError> {
            Err(TokenStoreError::Unavailable("no secret service".to_string()))
        }

        fn write(&self, _key: &str, _value: &str) -> Result<(), TokenStoreError> {
            Err(TokenStoreError::Unavailable("no secret service".to_string()))
        }

        fn remove(&self, _key: &str) -> Result<(), TokenStoreError> {
            Err(TokenStoreError::Unavailable("no secret service".to_string()))
        }
    }

    fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair::from_parts(Some(access.to_string()), Some(refresh.to_string())).unwrap()
    }

    #[tokio::test]
    async fn save_then_load_returns_the_same_pair() {
        let store = TokenStore::in_memory();
        store.save(&pair("acc", "ref")).await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some(pair("acc", "ref")));
        assert_eq!(store.access_token().await.as_deref(), Some("acc"));
    }

    #[tokio::test]
    async fn partial_pair_in_backend_is_treated_as_absent() {
        let backend = Arc::new(MemoryBackend::default());
        backend.write(KEY_ACCESS_TOKEN, "acc").unwrap();
        let store = TokenStore::new(backend);
        assert_eq!(store.load().await.unwrap(), None);
        assert_eq!(store.access_token().await, None);
    }

    #[tokio::test]
    async fn clear_removes_both_entries_from_the_backend() {
        let backend = Arc::new(MemoryBackend::default());
        let store = TokenStore::new(backend.clone());
        store.save(&pair("acc", "ref")).await.unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.current().await, None);
        assert_eq!(backend.read(KEY_ACCESS_TOKEN).unwrap(), None);
        assert_eq!(backend.read(KEY_REFRESH_TOKEN).unwrap(), None);
    }

    #[tokio::test]
    async fn failed_second_write_rolls_back_the_first() {
        let backend = Arc::new(FailingWrites {
            inner: MemoryBackend::default(),
            fail_key: KEY_REFRESH_TOKEN,
            fail_removes: false,
        });
        let store = TokenStore::new(backend.clone());

        assert!(store.save(&pair("acc", "ref")).await.is_err());
        assert_eq!(backend.read(KEY_ACCESS_TOKEN).unwrap(), None);
        assert_eq!(store.current().await, None);
    }

    #[tokio::test]
    async fn failed_rollback_still_reports_the_write_error() {
        let backend = Arc::new(FailingWrites {
            inner: MemoryBackend::default(),
            fail_key: KEY_REFRESH_TOKEN,
            fail_removes: true,
        });
        let store = TokenStore::new(backend);

        let err = store.save(&pair("acc", "ref")).await.unwrap_err();

        assert!(matches!(err, TokenStoreError::Unavailable(_)));
        assert_eq!(store.current().await, None);
    }

    #[tokio::test]
    async fn unavailable_backend_falls_back_to_memory() {
        let store = TokenStore::with_fallback(Arc::new(Unreachable));

        store.save(&pair("acc", "ref")).await.unwrap();

        assert_eq!(store.current().await, Some(pair("acc", "ref")));
    }

    #[tokio::test]
    async fn reachable_backend_is_kept_by_the_fallback_constructor() {
        let backend = Arc::new(MemoryBackend::default());
        backend.write(KEY_ACCESS_TOKEN, "acc").unwrap();
        backend.write(KEY_REFRESH_TOKEN, "ref").unwrap();

        let store = TokenStore::with_fallback(backend);

        assert_eq!(store.current().await, Some(pair("acc", "ref")));
    }
}
