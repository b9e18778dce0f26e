use crate::emit::render;
use crate::resolve::{Resolver, SkipReason};
use crate::set::{Insertion, SourceSet};
use crate::source::{SourceKind, SourceRecord};
use crate::CoreError;
use deno2nix_lock::{decode_lock_str, parse_jsr_key, JsrKey, LockManifest};
use deno2nix_registry::{MetadataSource, RegistryConfig};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Counts for one lock section.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct FamilySummary {
    /// Entries present in the lock file.
    pub entries: usize,
    /// Entries that produced a source in the output.
    pub emitted: usize,
    /// Entries dropped because an earlier entry already produced the same key.
    pub duplicates: usize,
    /// Entries dropped with a warning.
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedEntry {
    pub kind: SourceKind,
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Summary {
    pub npm: FamilySummary,
    pub jsr: FamilySummary,
    pub remote: FamilySummary,
    /// Sources written to the output.
    pub sources: usize,
    pub skipped_entries: Vec<SkippedEntry>,
}

impl Summary {
    pub fn family(&self, kind: SourceKind) -> &FamilySummary {
        match kind {
            SourceKind::Npm => &self.npm,
            SourceKind::Jsr => &self.jsr,
            SourceKind::Remote => &self.remote,
        }
    }

    fn family_mut(&mut self, kind: SourceKind) -> &mut FamilySummary {
        match kind {
            SourceKind::Npm => &mut self.npm,
            SourceKind::Jsr => &mut self.jsr,
            SourceKind::Remote => &mut self.remote,
        }
    }

    pub fn total_skipped(&self) -> usize {
        self.npm.skipped + self.jsr.skipped + self.remote.skipped
    }

    fn record(
        &mut self,
        kind: SourceKind,
        entry: &str,
        outcome: Result<SourceRecord, SkipReason>,
        set: &SourceSet,
    ) {
        match outcome {
            Ok(record) => {
                let key = record.key();
                match set.insert_if_absent(record) {
                    Insertion::Inserted => self.family_mut(kind).emitted += 1,
                    Insertion::Duplicate => {
                        debug!("{kind} entry {entry} duplicates {key}, keeping the first");
                        self.family_mut(kind).duplicates += 1;
                    }
                    Insertion::Conflict => {
                        warn!("{kind} entry {entry} has a different hash than {key}, keeping the first");
                        self.family_mut(kind).duplicates += 1;
                    }
                }
            }
            Err(reason) => {
                warn!("skipping {kind} entry {entry}: {reason}");
                self.family_mut(kind).skipped += 1;
                self.skipped_entries.push(SkippedEntry {
                    kind,
                    key: entry.to_owned(),
                    reason: reason.to_string(),
                });
            }
        }
    }
}

/// Generated `deps.nix` text and what went into it.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub summary: Summary,
}

/// Resolve every entry of `lock` and render the result.
///
/// Families are processed npm, jsr, remote; within a family, in key order. jsr
/// lookups run on a pool of `config.max_concurrent_lookups` threads but their
/// results are applied in key order, so which duplicate wins never depends on
/// network timing.
pub fn generate(
    lock: &LockManifest,
    config: &RegistryConfig,
    source: &dyn MetadataSource,
) -> Result<Generation, CoreError> {
    config.validate()?;
    let resolver = Resolver::new(config)?;
    let set = SourceSet::new();
    let mut summary = Summary::default();

    info!(
        "resolving {} npm, {} jsr and {} remote entries",
        lock.npm.len(),
        lock.jsr.len(),
        lock.remote.len()
    );

    summary.npm.entries = lock.npm.len();
    for (key, package) in &lock.npm {
        summary.record(SourceKind::Npm, key, resolver.resolve_npm(key, package), &set);
    }

    summary.jsr.entries = lock.jsr.len();
    let mut pending: Vec<(&str, JsrKey)> = Vec::new();
    for key in lock.jsr.keys() {
        let Some(parsed) = parse_jsr_key(key) else {
            let reason = SkipReason::InvalidKey {
                kind: SourceKind::Jsr,
                key: key.clone(),
            };
            summary.record(SourceKind::Jsr, key, Err(reason), &set);
            continue;
        };
        let source_key = format!("{}-{}", parsed.full_name(), parsed.version);
        if set.contains(&source_key) {
            debug!("jsr entry {key} already resolved as {source_key}");
            summary.jsr.duplicates += 1;
            continue;
        }
        pending.push((key.as_str(), parsed));
    }
    if !pending.is_empty() {
        info!(
            "fetching metadata for {} jsr packages from {}",
            pending.len(),
            config.mirror_url
        );
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.max_concurrent_lookups)
            .thread_name(|i| format!("jsr-lookup-{i}"))
            .build()?;
        let outcomes: Vec<Result<SourceRecord, SkipReason>> = pool.install(|| {
            pending
                .par_iter()
                .map(|(_, parsed)| resolver.resolve_jsr(parsed, source))
                .collect()
        });
        for ((key, _), outcome) in pending.iter().zip(outcomes) {
            summary.record(SourceKind::Jsr, key, outcome, &set);
        }
    }

    summary.remote.entries = lock.remote.len();
    for (url, hash) in &lock.remote {
        summary.record(SourceKind::Remote, url, resolver.resolve_remote(url, hash), &set);
    }

    let records = set.into_sorted();
    summary.sources = records.len();
    debug!(
        "{} sources, {} entries skipped",
        summary.sources,
        summary.total_skipped()
    );
    Ok(Generation {
        text: render(&records),
        summary,
    })
}

/// Decode lock text and run [`generate`] on it.
pub fn generate_from_str(
    input: &str,
    config: &RegistryConfig,
    source: &dyn MetadataSource,
) -> Result<Generation, CoreError> {
    let lock = decode_lock_str(input)?;
    generate(&lock, config, source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deno2nix_registry::{DistInfo, RegistryError};
    use deno2nix_registry::HttpMetadataSource;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    const HEX: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[derive(Default)]
    struct StubSource {
        dists: HashMap<String, DistInfo>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl StubSource {
        fn with(mut self, package: &str, version: &str, integrity: &str) -> Self {
            self.dists.insert(
                format!("{package}@{version}"),
                DistInfo {
                    tarball: format!("https://npm.jsr.io/~/11/{package}/{version}.tgz"),
                    integrity: integrity.to_owned(),
                },
            );
            self
        }
    }

    impl MetadataSource for StubSource {
        fn fetch_dist(&self, package: &str, version: &str) -> Result<DistInfo, RegistryError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                // Later calls finish first, so completion order differs from key order.
                std::thread::sleep(delay.saturating_sub(delay / 8 * call as u32));
            }
            self.dists
                .get(&format!("{package}@{version}"))
                .cloned()
                .ok_or_else(|| RegistryError::NotFound(package.to_owned()))
        }
    }

    fn run(lock: &serde_json::Value, source: &StubSource) -> Generation {
        generate_from_str(&lock.to_string(), &RegistryConfig::default(), source).unwrap()
    }

    #[test]
    fn npm_scenario() {
        let lock = serde_json::json!({
            "version": "5",
            "npm": {"hono@4.11.3": {"integrity": "sha512-AAAA=="}}
        });
        let generation = run(&lock, &StubSource::default());
        assert_eq!(generation.summary.npm.emitted, 1);
        assert!(generation
            .text
            .contains("url = \"https://registry.npmjs.org/hono/-/hono-4.11.3.tgz\";"));
        assert!(generation.text.contains("sha512 = \"AAAA==\";"));
        assert!(generation.text.contains("type = \"npm\";"));
    }

    #[test]
    fn jsr_scenario() {
        let lock = serde_json::json!({
            "version": "5",
            "jsr": {"@std/assert@1.0.0": {"integrity": HEX}}
        });
        let source = StubSource::default().with("@jsr/std__assert", "1.0.0", "sha512-EEEE==");
        let generation = run(&lock, &source);
        assert_eq!(generation.summary.jsr.emitted, 1);
        assert!(generation
            .text
            .contains("registryPath = \"npm.jsr.io/@jsr/std__assert/1.0.0\";"));
        assert!(generation.text.contains("type = \"jsr\";"));
        assert!(generation.text.contains("sha512 = \"EEEE==\";"));
    }

    #[test]
    fn remote_scenario() {
        let lock = serde_json::json!({
            "version": "5",
            "remote": {"https://deno.land/std@0.167.0/fs/mod.ts": HEX}
        });
        let generation = run(&lock, &StubSource::default());
        let text = &generation.text;
        assert!(text.contains("\"remote:deno.land/mod.ts-0.167.0\" = {"));
        assert!(text.contains("name = \"remote:deno.land_slash_mod.ts\";"));
        assert!(text.contains("version = \"0.167.0\";"));
        assert!(text.contains("registryPath = \"\";"));
        assert!(text.contains("sha256 = \"47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=\";"));
    }

    #[test]
    fn unsupported_version_is_fatal() {
        let result = generate_from_str(
            r#"{"version": "4", "npm": {}}"#,
            &RegistryConfig::default(),
            &StubSource::default(),
        );
        assert!(matches!(result, Err(CoreError::Lock(_))));
    }

    #[test]
    fn bad_keys_and_hashes_are_skipped() {
        let lock = serde_json::json!({
            "version": "5",
            "npm": {
                "hono": {"integrity": "sha512-AAAA=="},
                "zod@3.24.1": {"integrity": "sha512-BBBB=="},
                "broken@1.0.0": {"integrity": "md5-CCCC"}
            },
            "jsr": {"std-assert@1.0.0": {"integrity": HEX}},
            "remote": {"https://deno.land/x/a.ts": "XYZ"}
        });
        let source = StubSource::default();
        let generation = run(&lock, &source);
        let summary = &generation.summary;
        assert_eq!(summary.npm.entries, 3);
        assert_eq!(summary.npm.emitted, 1);
        assert_eq!(summary.npm.skipped, 2);
        assert_eq!(summary.jsr.skipped, 1);
        assert_eq!(summary.remote.skipped, 1);
        assert_eq!(summary.total_skipped(), 4);
        assert_eq!(summary.skipped_entries.len(), 4);
        assert_eq!(summary.sources, 1);
        assert!(generation.text.contains("\"zod-3.24.1\" = {"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failed_lookup_does_not_affect_others() {
        let lock = serde_json::json!({
            "version": "5",
            "jsr": {
                "@std/assert@1.0.0": {"integrity": HEX},
                "@std/fmt@1.0.0": {"integrity": HEX},
                "@std/path@1.0.0": {"integrity": HEX}
            }
        });
        let source = StubSource::default()
            .with("@jsr/std__assert", "1.0.0", "sha512-AAAA==")
            .with("@jsr/std__path", "1.0.0", "sha512-BBBB==");
        let generation = run(&lock, &source);
        assert_eq!(generation.summary.jsr.emitted, 2);
        assert_eq!(generation.summary.jsr.skipped, 1);
        assert_eq!(generation.summary.skipped_entries[0].key, "@std/fmt@1.0.0");
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn peer_variants_collapse_to_first() {
        let lock = serde_json::json!({
            "version": "5",
            "npm": {
                "preact-render-to-string@6.5.0_preact@10.24.0": {"integrity": "sha512-AAAA=="},
                "preact-render-to-string@6.5.0_preact@10.25.0": {"integrity": "sha512-AAAA=="}
            }
        });
        let generation = run(&lock, &StubSource::default());
        assert_eq!(generation.summary.npm.emitted, 1);
        assert_eq!(generation.summary.npm.duplicates, 1);
        assert_eq!(generation.summary.sources, 1);
    }

    #[test]
    fn jsr_already_resolved_skips_lookup() {
        let lock = serde_json::json!({
            "version": "5",
            "npm": {"@std/assert@1.0.0": {"integrity": "sha512-AAAA=="}},
            "jsr": {"@std/assert@1.0.0": {"integrity": HEX}}
        });
        let source = StubSource::default().with("@jsr/std__assert", "1.0.0", "sha512-BBBB==");
        let generation = run(&lock, &source);
        assert_eq!(generation.summary.jsr.duplicates, 1);
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(generation.text.contains("type = \"npm\";"));
        assert!(!generation.text.contains("type = \"jsr\";"));
    }

    #[test]
    fn output_independent_of_key_order() {
        let forward = r#"{"version": "5",
            "npm": {"zod@3.24.1": {"integrity": "sha512-Z=="}, "hono@4.11.3": {"integrity": "sha512-H=="}},
            "remote": {"https://deno.land/std@0.167.0/fs/mod.ts": "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"}}"#;
        let backward = r#"{"remote": {"https://deno.land/std@0.167.0/fs/mod.ts": "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"},
            "npm": {"hono@4.11.3": {"integrity": "sha512-H=="}, "zod@3.24.1": {"integrity": "sha512-Z=="}},
            "version": "5"}"#;
        let config = RegistryConfig::default();
        let a = generate_from_str(forward, &config, &StubSource::default()).unwrap();
        let b = generate_from_str(backward, &config, &StubSource::default()).unwrap();
        assert_eq!(a.text, b.text);
        let hono = a.text.find("\"hono-4.11.3\"").unwrap();
        let remote = a.text.find("\"remote:deno.land/mod.ts-0.167.0\"").unwrap();
        let zod = a.text.find("\"zod-3.24.1\"").unwrap();
        assert!(hono < remote && remote < zod);
    }

    #[test]
    fn single_worker_pool_resolves_everything() {
        let lock = serde_json::json!({
            "version": "5",
            "jsr": {
                "@std/assert@1.0.0": {"integrity": HEX},
                "@std/path@1.0.0": {"integrity": HEX}
            }
        });
        let source = StubSource::default()
            .with("@jsr/std__assert", "1.0.0", "sha512-AAAA==")
            .with("@jsr/std__path", "1.0.0", "sha512-BBBB==");
        let config = RegistryConfig::default().with_max_concurrent_lookups(1);
        let generation = generate_from_str(&lock.to_string(), &config, &source).unwrap();
        assert_eq!(generation.summary.jsr.emitted, 2);
    }

    #[test]
    fn invalid_config_is_fatal() {
        let config = RegistryConfig::default().with_max_concurrent_lookups(0);
        let result = generate_from_str(r#"{"version": "5"}"#, &config, &StubSource::default());
        assert!(matches!(result, Err(CoreError::Registry(_))));
    }

    fn jsr_lock(keys: &[&str]) -> String {
        let entries: Vec<String> = keys
            .iter()
            .map(|k| format!(r#""{k}": {{"integrity": "{HEX}"}}"#))
            .collect();
        format!(
            r#"{{"version": "5", "jsr": {{{}}}, "npm": {{"hono@4.11.3": {{"integrity": "sha512-H=="}}}}}}"#,
            entries.join(", ")
        )
    }

    fn slow_jsr_source() -> StubSource {
        let mut source = StubSource::default()
            .with("@jsr/std__assert", "1.0.0", "sha512-AAAA==")
            .with("@jsr/std__fmt", "1.0.0", "sha512-BBBB==")
            .with("@jsr/std__path", "1.0.0", "sha512-CCCC==")
            .with("@jsr/std__cli", "1.0.0", "sha512-DDDD==");
        source.delay = Some(Duration::from_millis(40));
        source
    }

    #[test]
    fn parallel_lookups_are_deterministic() {
        let keys = [
            "@std/assert@1.0.0",
            "@std/fmt@1.0.0",
            "@std/path@1.0.0",
            "@std/cli@1.0.0",
            "@std/missing@1.0.0",
        ];
        let mut reversed = keys;
        reversed.reverse();
        let config = RegistryConfig::default().with_max_concurrent_lookups(4);

        let a = generate_from_str(&jsr_lock(&keys), &config, &slow_jsr_source()).unwrap();
        let b = generate_from_str(&jsr_lock(&reversed), &config, &slow_jsr_source()).unwrap();
        assert_eq!(a.text, b.text);
        assert_eq!(a.summary, b.summary);
        assert_eq!(a.summary.jsr.emitted, 4);
        assert_eq!(a.summary.jsr.skipped, 1);

        let serial = RegistryConfig::default().with_max_concurrent_lookups(1);
        let c = generate_from_str(&jsr_lock(&keys), &serial, &slow_jsr_source()).unwrap();
        assert_eq!(a.text, c.text);
    }

    #[test]
    fn conflicting_hash_keeps_first_record() {
        let lock = serde_json::json!({
            "version": "5",
            "npm": {
                "pkg@1.0.0_a@1.0.0": {"integrity": "sha512-FIRST=="},
                "pkg@1.0.0_b@1.0.0": {"integrity": "sha512-SECOND=="}
            }
        });
        let generation = run(&lock, &StubSource::default());
        let npm = generation.summary.family(SourceKind::Npm);
        assert_eq!(npm.emitted, 1);
        assert_eq!(npm.duplicates, 1);
        assert_eq!(npm.skipped, 0);
        assert!(generation.text.contains("sha512 = \"FIRST==\";"));
        assert!(!generation.text.contains("SECOND"));
    }

    #[test]
    fn passed_deadline_skips_jsr_only() {
        let lock = serde_json::json!({
            "version": "5",
            "npm": {"hono@4.11.3": {"integrity": "sha512-AAAA=="}},
            "jsr": {
                "@std/assert@1.0.0": {"integrity": HEX},
                "@std/path@1.0.0": {"integrity": HEX}
            },
            "remote": {"https://deno.land/std@0.167.0/fs/mod.ts": HEX}
        });
        let config = RegistryConfig::default().with_mirror_url("http://127.0.0.1:1");
        let source = HttpMetadataSource::new(&config).with_deadline(Instant::now());

        let generation = generate_from_str(&lock.to_string(), &config, &source).unwrap();
        let summary = &generation.summary;
        assert_eq!(summary.family(SourceKind::Jsr).skipped, 2);
        assert_eq!(summary.family(SourceKind::Npm).emitted, 1);
        assert_eq!(summary.family(SourceKind::Remote).emitted, 1);
        assert_eq!(summary.sources, 2);
        assert!(summary
            .skipped_entries
            .iter()
            .all(|e| e.kind == SourceKind::Jsr && e.reason.contains("deadline")));
        assert!(!generation.text.contains("type = \"jsr\";"));
    }
}
