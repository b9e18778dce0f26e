//! Source resolution pipeline for deno2nix.
//!
//! Turns a decoded `deno.lock` into a `deps.nix` document: each lock entry is
//! resolved into a `SourceRecord` by the policy of its family (`Resolver`),
//! records are deduplicated by `packageName-version` (`SourceSet`), and the
//! sorted set is rendered through the Nix formatter in [`emit`]. `generate` runs
//! the whole pipeline and reports per-family counts in a `Summary`.

pub mod emit;
pub mod generate;
pub mod resolve;
pub mod set;
pub mod source;

pub use emit::{escape_nix_name, escape_nix_string, render, NixDocument, SourceBlock};
pub use generate::{generate, generate_from_str, FamilySummary, Generation, SkippedEntry, Summary};
pub use resolve::{Resolver, SkipReason};
pub use set::{Insertion, SourceSet};
pub use source::{SourceKind, SourceRecord};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("lock error: {0}")]
    Lock(#[from] deno2nix_lock::LockError),
    #[error("registry error: {0}")]
    Registry(#[from] deno2nix_registry::RegistryError),
    #[error("failed to start lookup workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
