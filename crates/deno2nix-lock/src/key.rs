//! Composite package keys used by the `npm` and `jsr` lock sections.
//!
//! npm keys look like `name@version`, `@scope/name@version`, or either form followed
//! by one or more `_peer@version` suffixes describing the peer set the package was
//! resolved against. jsr keys are always scoped: `@scope/name@version`.

use crate::types::{PackageName, Version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmKey {
    pub name: PackageName,
    pub version: Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsrKey {
    pub scope: String,
    pub name: String,
    pub version: Version,
}

impl JsrKey {
    /// `@scope/name`
    pub fn full_name(&self) -> PackageName {
        PackageName::new(format!("@{}/{}", self.scope, self.name))
    }

    /// Name under which the npm compatibility mirror publishes this package.
    pub fn mirror_name(&self) -> String {
        format!("@jsr/{}__{}", self.scope, self.name)
    }
}

/// Parse an npm section key.
///
/// The name runs up to the first `@` after an optional leading scope marker; the
/// version runs from there up to the first `_`, which drops any peer suffixes.
/// Returns `None` when the key has no version segment.
pub fn parse_npm_key(key: &str) -> Option<NpmKey> {
    let (scope_marker, rest) = match key.strip_prefix('@') {
        Some(rest) => ("@", rest),
        None => ("", key),
    };
    let (name, tail) = rest.split_once('@')?;
    if name.is_empty() {
        return None;
    }
    let version = tail.split('_').next().unwrap_or_default();
    if version.is_empty() {
        return None;
    }
    Some(NpmKey {
        name: PackageName::new(format!("{scope_marker}{name}")),
        version: Version::from(version),
    })
}

/// Parse a jsr section key of the form `@scope/name@version`.
pub fn parse_jsr_key(key: &str) -> Option<JsrKey> {
    let rest = key.strip_prefix('@')?;
    let (scope, rest) = rest.split_once('/')?;
    let (name, version) = rest.split_once('@')?;
    if scope.is_empty() || name.is_empty() || version.is_empty() {
        return None;
    }
    Some(JsrKey {
        scope: scope.to_owned(),
        name: name.to_owned(),
        version: Version::from(version),
    })
}
