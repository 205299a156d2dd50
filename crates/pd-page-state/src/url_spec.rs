//! URL specs read through the 8-bit string path.

use url::Url;

/// Canonicalizes `spec` when it parses as a URL; otherwise keeps the raw spec,
/// which may be an invalid URL that was persisted verbatim.
pub(crate) fn canonicalize(spec: String) -> String {
    match Url::parse(&spec) {
        Ok(url) => url.into(),
        Err(_) => spec,
    }
}
