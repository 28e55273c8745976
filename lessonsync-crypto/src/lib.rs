//! Key custody and authenticated encryption for LessonSync.
//!
//! The vault never holds key material. It asks a [`KeyStore`] for a
//! [`KeyHandle`] by name and seals/opens through it:
//!
//! - [`MemoryKeyStore`] keeps keys in process memory (tests, ephemeral runs).
//! - [`OsKeyStore`] keeps keys in the host credential facility.
//!
//! Both use ChaCha20-Poly1305 with a 96-bit nonce supplied by the caller.

mod cipher;
mod error;
pub mod keystore;
pub mod memory;
pub mod os;

pub use cipher::{generate_nonce, open, seal, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use keystore::{KeyAlgorithm, KeyHandle, KeyPurposes, KeySpec, KeyStore};
pub use memory::MemoryKeyStore;
pub use os::OsKeyStore;
