pub mod obfuscate;
pub mod service;
pub mod vault;

pub use obfuscate::{decode_secret, encode_secret, mask_secret};
pub use service::{KeyStore, KeyStoreError, MaskedCredential, SaveOutcome};
pub use vault::{CredentialVault, LocalFileVault, MemoryVault, UserCredential, VaultError};
