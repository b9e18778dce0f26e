use super::{json_pretty, spin_fail, spin_ok, spinner, write_atomic, EXIT_FAILURE, EXIT_SUCCESS};
use deno2nix_core::{generate, SourceKind, Summary};
use deno2nix_lock::read_lock_file;
use deno2nix_registry::{HttpMetadataSource, RegistryConfig};
use std::path::{Path, PathBuf};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub lock: PathBuf,
    pub output: PathBuf,
    pub config: Option<PathBuf>,
    pub registry_url: Option<String>,
    pub mirror_url: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub deadline_secs: Option<u64>,
    pub check: bool,
}

pub fn run(options: &GenerateOptions, json: bool) -> Result<u8, String> {
    let config = load_config(options)?;

    tracing::info!("reading {}", options.lock.display());
    let lock = read_lock_file(&options.lock).map_err(|e| format!("lock error: {e}"))?;
    if lock.is_empty() {
        tracing::warn!("{} lists no npm, jsr or remote packages", options.lock.display());
    }

    let mut source = HttpMetadataSource::new(&config);
    if let Some(deadline) = Instant::now().checked_add(config.deadline()) {
        source = source.with_deadline(deadline);
    }

    let pb = if json || lock.jsr.is_empty() {
        None
    } else {
        Some(spinner("fetching jsr package metadata..."))
    };
    let generation = match generate(&lock, &config, &source) {
        Ok(g) => {
            if let Some(ref pb) = pb {
                spin_ok(pb, "jsr package metadata fetched");
            }
            g
        }
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "generation failed");
            }
            return Err(e.to_string());
        }
    };

    if options.check {
        return check_output(&options.output, &generation.text, &generation.summary, json);
    }

    tracing::info!("writing {}", options.output.display());
    write_atomic(&options.output, &generation.text)
        .map_err(|e| format!("could not write {}: {e}", options.output.display()))?;

    print_summary(&options.output, &generation.summary, json, None)?;
    Ok(EXIT_SUCCESS)
}

fn load_config(options: &GenerateOptions) -> Result<RegistryConfig, String> {
    let mut config = match options.config {
        Some(ref path) => RegistryConfig::load(path)
            .map_err(|e| format!("config error ({}): {e}", path.display()))?,
        None => RegistryConfig::default(),
    };
    if let Some(ref url) = options.registry_url {
        config = config.with_registry_url(url);
    }
    if let Some(ref url) = options.mirror_url {
        config = config.with_mirror_url(url);
    }
    if let Some(limit) = options.concurrency {
        config = config.with_max_concurrent_lookups(limit);
    }
    if let Some(secs) = options.timeout_secs {
        config = config.with_request_timeout_secs(secs);
    }
    if let Some(secs) = options.deadline_secs {
        config = config.with_deadline_secs(secs);
    }
    config
        .validate()
        .map_err(|e| format!("config error: {e}"))?;
    Ok(config)
}

fn check_output(path: &Path, generated: &str, summary: &Summary, json: bool) -> Result<u8, String> {
    let current = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(format!("could not read {}: {e}", path.display())),
    };
    let up_to_date = current == generated;
    print_summary(path, summary, json, Some(up_to_date))?;
    if up_to_date {
        Ok(EXIT_SUCCESS)
    } else {
        if !json {
            eprintln!("{} is out of date; rerun deno2nix", path.display());
        }
        Ok(EXIT_FAILURE)
    }
}

fn print_summary(
    output: &Path,
    summary: &Summary,
    json: bool,
    up_to_date: Option<bool>,
) -> Result<(), String> {
    if json {
        let mut payload = serde_json::json!({
            "output": output.display().to_string(),
            "sources": summary.sources,
            "npm": summary.npm,
            "jsr": summary.jsr,
            "remote": summary.remote,
            "skipped": summary.skipped_entries,
        });
        if let Some(fresh) = up_to_date {
            payload["up_to_date"] = serde_json::Value::Bool(fresh);
        }
        println!("{}", json_pretty(&payload)?);
        return Ok(());
    }

    match up_to_date {
        Some(true) => println!("{} is up to date ({} sources)", output.display(), summary.sources),
        Some(false) => println!("{} differs from the lock file", output.display()),
        None => println!("wrote {} ({} sources)", output.display(), summary.sources),
    }
    for (kind, label) in [
        (SourceKind::Npm, "npm packages"),
        (SourceKind::Jsr, "jsr packages"),
        (SourceKind::Remote, "remote urls"),
    ] {
        let family = summary.family(kind);
        println!("  {label}: {} ({} skipped)", family.entries, family.skipped);
    }
    Ok(())
}
