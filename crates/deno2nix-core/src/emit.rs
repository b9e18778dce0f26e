//! Nix rendering of resolved sources.
//!
//! Records are first mapped to [`SourceBlock`]s, then written by a single
//! formatter. Every string literal goes through [`escape_nix_string`] exactly
//! once, at the point it is written.

use crate::source::SourceRecord;
use deno2nix_lock::HashAlgorithm;

pub const GENERATED_MARKER: &str = "# This file has been generated by deno2nix. Do not edit!";

// Unpacks every source with a registry path into the shared cache, stripping
// the archive's top-level directory. Evaluated by Nix, so it is written verbatim.
const CACHE_DERIVATION: &str = r#"  # Build the npm cache directory for Deno
  cache = stdenv.mkDerivation {
    name = "deno-npm-cache";
    dontUnpack = true;
    buildPhase = ''
      mkdir -p $out
      ${lib.concatStringsSep "\n" (lib.mapAttrsToList (name: pkg:
        lib.optionalString (pkg.registryPath != "") ''
          mkdir -p "$out/${pkg.registryPath}"
          tar -xzf ${pkg.src} -C "$out/${pkg.registryPath}" --strip-components=1
        ''
      ) sources)}
    '';
    installPhase = "true";
  };
"#;

/// One entry of the `sources` attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceBlock {
    pub attr: String,
    pub kind: &'static str,
    pub name: String,
    pub package_name: String,
    pub version: String,
    pub registry_path: String,
    pub url: String,
    pub hash_field: HashAlgorithm,
    pub hash: String,
}

impl From<&SourceRecord> for SourceBlock {
    fn from(record: &SourceRecord) -> Self {
        Self {
            attr: record.key(),
            kind: record.kind.as_str(),
            name: escape_nix_name(&record.name),
            package_name: record.package_name.to_string(),
            version: record.version.to_string(),
            registry_path: record.registry_path.clone(),
            url: record.url.clone(),
            hash_field: record.integrity.algorithm(),
            hash: record.integrity.value.clone(),
        }
    }
}

/// The whole `deps.nix` file: the `sources` set plus the cache derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NixDocument {
    pub sources: Vec<SourceBlock>,
}

impl NixDocument {
    /// Build a document from records already in output order.
    pub fn from_records(records: &[SourceRecord]) -> Self {
        Self {
            sources: records.iter().map(SourceBlock::from).collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut w = NixWriter::default();
        w.raw(GENERATED_MARKER);
        w.raw("");
        w.raw("{ stdenv, fetchurl, lib }:");
        w.raw("");
        w.raw("let");
        w.raw("  sources = {");
        for block in &self.sources {
            w.write_source(block);
        }
        w.raw("  };");
        w.raw("");
        w.out.push_str(CACHE_DERIVATION);
        w.raw("");
        w.raw("in {");
        w.raw("  inherit sources cache;");
        w.raw("}");
        w.out
    }
}

/// Render records (already sorted) as a complete `deps.nix` file.
pub fn render(records: &[SourceRecord]) -> String {
    NixDocument::from_records(records).render()
}

#[derive(Default)]
struct NixWriter {
    out: String,
}

impl NixWriter {
    fn raw(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    fn open(&mut self, indent: usize, head: &str) {
        self.out.push_str(&" ".repeat(indent));
        self.out.push_str(head);
        self.out.push_str(" {\n");
    }

    fn close(&mut self, indent: usize) {
        self.out.push_str(&" ".repeat(indent));
        self.out.push_str("};\n");
    }

    fn string_attr(&mut self, indent: usize, name: &str, value: &str) {
        self.out.push_str(&" ".repeat(indent));
        self.out.push_str(name);
        self.out.push_str(" = \"");
        self.out.push_str(&escape_nix_string(value));
        self.out.push_str("\";\n");
    }

    fn write_source(&mut self, block: &SourceBlock) {
        self.open(4, &format!("\"{}\" =", escape_nix_string(&block.attr)));
        self.string_attr(6, "type", block.kind);
        self.string_attr(6, "name", &block.name);
        self.string_attr(6, "packageName", &block.package_name);
        self.string_attr(6, "version", &block.version);
        self.string_attr(6, "registryPath", &block.registry_path);
        self.open(6, "src = fetchurl");
        self.string_attr(8, "url", &block.url);
        self.string_attr(8, block.hash_field.as_str(), &block.hash);
        self.close(6);
        self.close(4);
    }
}

/// Escape `\`, `"` and `$` for a double-quoted Nix string.
pub fn escape_nix_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            _ => out.push(c),
        }
    }
    out
}

/// Make a package name usable where `@` and `/` are unwelcome.
pub fn escape_nix_name(name: &str) -> String {
    name.replace('@', "_at_").replace('/', "_slash_")
}
