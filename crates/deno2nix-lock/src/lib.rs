//! Lock manifest layer for deno2nix.
//!
//! This crate decodes `deno.lock` v5 documents (`LockManifest`), splits the
//! composite package keys used by the `npm` and `jsr` sections (`parse_npm_key`,
//! `parse_jsr_key`), and normalizes the three hash encodings found in lock files
//! and registry metadata into a single representation (`Integrity`).

pub mod integrity;
pub mod key;
pub mod lock;
pub mod types;

pub use integrity::{HashAlgorithm, Integrity, IntegrityEncoding, IntegrityError};
pub use key::{parse_jsr_key, parse_npm_key, JsrKey, NpmKey};
pub use lock::{
    decode_lock_str, read_lock_file, JsrPackage, LockError, LockManifest, NpmPackage,
    SUPPORTED_LOCK_VERSION,
};
pub use types::{PackageName, Version};
