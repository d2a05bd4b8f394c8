mod session;
mod token_store;

pub use session::{SessionError, SessionManager};
pub use token_store::{
    KeyringBackend, MemoryBackend, SecretBackend, TokenStore, TokenStoreError,
    DEFAULT_KEYRING_SERVICE,
};
