//! Rewrites frame unique names persisted before their length was limited.
//!
//! Unnamed frames get generated names that embed the path from the main frame:
//!
//! ```text
//! <!--framePath //<!--frame2-->/named child/<!--frame0-->--><!--framePosition-0-2/0-->
//! ```
//!
//! Older page states stored these names at any length. Names over
//! [`MAX_SIZE`] bytes are replaced by a SHA-256 based frame path, and every
//! replacement is remembered so that descendants, whose own generated names
//! embed the long ancestor name, are rewritten consistently.

use sha2::Digest;
use sha2::Sha256;
use std::fmt::Write;

/// Longest unique name kept verbatim.
pub const MAX_SIZE: usize = 512;

const FRAME_PATH_PREFIX: &str = "<!--framePath /";
const FRAME_HASH_PREFIX: &str = "<!--frameHash ";
const FRAME_POSITION_MARKER: &str = "<!--framePosition";
const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";
const MAX_HASHED_FRAME_POSITIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplacementKind {
    /// A generated frame path; matches descendants by prefix.
    FramePath,
    /// A requested name; matches as a component of a descendant's frame path.
    RequestedName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Replacement {
    kind: ReplacementKind,
    legacy: String,
    updated: String,
}

/// Replacements made so far while decoding one frame tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueNameReplacements {
    entries: Vec<Replacement>,
}

impl UniqueNameReplacements {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites the longest embedded ancestor name, if any.
    fn rewrite(&self, name: &str) -> Option<String> {
        if !name.starts_with(FRAME_PATH_PREFIX) {
            return None;
        }

        let mut best: Option<(usize, &Replacement)> = None;
        for entry in &self.entries {
            let end = match entry.kind {
                ReplacementKind::FramePath => frame_path_match_end(name, &entry.legacy),
                ReplacementKind::RequestedName => component_match_end(name, &entry.legacy),
            };
            let Some(end) = end else {
                continue;
            };
            if best.is_none_or(|(best_end, _)| end > best_end) {
                best = Some((end, entry));
            }
        }

        best.map(|(end, entry)| format!("{}{}", entry.updated, &name[end..]))
    }
}

/// Returns the unique name a frame saved with `legacy_name` has today.
/// Frames must be visited parents first, sharing one `replacements` list.
pub fn update_legacy_name(legacy_name: &str, replacements: &mut UniqueNameReplacements) -> String {
    if legacy_name.is_empty() {
        return String::new();
    }

    let current = replacements
        .rewrite(legacy_name)
        .unwrap_or_else(|| legacy_name.to_owned());
    if current.len() <= MAX_SIZE {
        return current;
    }

    let (base, suffix) = split_unique_suffix(&current);
    let hashed = hashed_frame_path(base);
    let updated = match suffix {
        Some(suffix) => format!("{hashed}{}", trim_unique_suffix(suffix)),
        None => hashed.clone(),
    };

    let entry = if legacy_name.starts_with(FRAME_PATH_PREFIX) {
        Replacement {
            kind: ReplacementKind::FramePath,
            legacy: strip_close(legacy_name).to_owned(),
            updated: strip_close(&updated).to_owned(),
        }
    } else {
        Replacement {
            kind: ReplacementKind::RequestedName,
            legacy: legacy_name.to_owned(),
            updated: strip_close(&hashed).to_owned(),
        }
    };
    replacements.entries.push(entry);

    updated
}

fn hashed_frame_path(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02X}");
    }
    format!("{FRAME_PATH_PREFIX}/{FRAME_HASH_PREFIX}{hex}{COMMENT_CLOSE}{COMMENT_CLOSE}")
}

fn strip_close(name: &str) -> &str {
    name.strip_suffix(COMMENT_CLOSE).unwrap_or(name)
}

/// Splits a trailing `<!--framePosition-...-->` marker off `name`. A marker
/// followed by further path components is part of an ancestor's name, not a
/// suffix.
fn split_unique_suffix(name: &str) -> (&str, Option<&str>) {
    let Some(position) = name.rfind(FRAME_POSITION_MARKER) else {
        return (name, None);
    };

    let tail = &name[position + FRAME_POSITION_MARKER.len()..];
    if tail.contains(COMMENT_OPEN) || !tail.ends_with(COMMENT_CLOSE) {
        return (name, None);
    }

    (&name[..position], Some(&name[position..]))
}

/// Keeps only the innermost frame positions of a unique suffix.
fn trim_unique_suffix(suffix: &str) -> String {
    let Some(body) = suffix
        .strip_prefix(FRAME_POSITION_MARKER)
        .and_then(|rest| rest.strip_suffix(COMMENT_CLOSE))
    else {
        return suffix.to_owned();
    };
    let Some((positions, index)) = body.rsplit_once('/') else {
        return suffix.to_owned();
    };

    let kept: Vec<&str> = positions
        .split('-')
        .filter(|position| !position.is_empty())
        .take(MAX_HASHED_FRAME_POSITIONS)
        .collect();
    format!(
        "{FRAME_POSITION_MARKER}-{}/{index}{COMMENT_CLOSE}",
        kept.join("-")
    )
}

fn frame_path_match_end(name: &str, legacy: &str) -> Option<usize> {
    let rest = name.strip_prefix(legacy)?;
    if rest.starts_with('/') || rest.starts_with(COMMENT_CLOSE) {
        Some(legacy.len())
    } else {
        None
    }
}

fn component_match_end(name: &str, legacy: &str) -> Option<usize> {
    let mut best = None;
    let mut search_from = 0_usize;
    while let Some(found) = name[search_from..].find(legacy) {
        let start = search_from + found;
        let end = start + legacy.len();
        let preceded = name[..start].ends_with('/');
        let followed = name[end..].starts_with('/') || name[end..].starts_with(COMMENT_CLOSE);
        if preceded && followed {
            best = Some(end);
        }
        search_from = start + 1;
        while !name.is_char_boundary(search_from) {
            search_from += 1;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::MAX_SIZE;
    use super::UniqueNameReplacements;
    use super::update_legacy_name;

    fn frame_path(components: &[&str]) -> String {
        format!("<!--framePath //{}-->", components.join("/"))
    }

    #[test]
    fn short_names_are_unchanged() {
        let mut replacements = UniqueNameReplacements::new();
        for name in [
            "",
            "child frame with name",
            "<!--framePath //<!--frame2-->--><!--framePosition-2/0-->",
        ] {
            assert_eq!(update_legacy_name(name, &mut replacements), name);
        }
        assert!(replacements.is_empty());
    }

    #[test]
    fn long_requested_name_is_hashed() {
        let mut replacements = UniqueNameReplacements::new();
        let name = "a".repeat(MAX_SIZE * 2);
        assert_eq!(
            update_legacy_name(&name, &mut replacements),
            "<!--framePath //<!--frameHash \
             2EDC986847E209B4016E141A6DC8716D3207350F416969382D431539BF292E4A-->-->"
        );
        assert_eq!(replacements.len(), 1);
    }

    #[test]
    fn descendants_embed_hashed_ancestor() {
        let mut replacements = UniqueNameReplacements::new();
        let long_name = "a".repeat(MAX_SIZE * 2);

        assert_eq!(
            update_legacy_name("<!--framePath //<!--frame0-->-->", &mut replacements),
            "<!--framePath //<!--frame0-->-->"
        );
        update_legacy_name(&long_name, &mut replacements);

        let child = frame_path(&["<!--frame0-->", &long_name, "<!--frame0-->"]);
        assert_eq!(
            update_legacy_name(&child, &mut replacements),
            "<!--framePath //<!--frameHash \
             2EDC986847E209B4016E141A6DC8716D3207350F416969382D431539BF292E4A-->\
             /<!--frame0-->-->"
        );

        let sibling = format!("{}<!--framePosition-0-0-0/0-->", child);
        assert_eq!(
            update_legacy_name(&sibling, &mut replacements),
            "<!--framePath //<!--frameHash \
             2EDC986847E209B4016E141A6DC8716D3207350F416969382D431539BF292E4A-->\
             /<!--frame0-->--><!--framePosition-0-0-0/0-->"
        );
    }

    #[test]
    fn longest_embedded_ancestor_wins() {
        let mut replacements = UniqueNameReplacements::new();
        let long_name = "a".repeat(MAX_SIZE * 2);
        let longer_name = "a".repeat(MAX_SIZE * 2 + 1);
        update_legacy_name(&long_name, &mut replacements);
        assert_eq!(
            update_legacy_name(&longer_name, &mut replacements),
            "<!--framePath //<!--frameHash \
             4A82297889EB505CF6B5CBDF69977AFAB4632D6557539782F657BD7DC78091A5-->-->"
        );

        let grandchild = frame_path(&[
            "<!--frame0-->",
            &long_name,
            "<!--frame0-->",
            &longer_name,
            "<!--frame0-->",
        ]);
        assert_eq!(
            update_legacy_name(&grandchild, &mut replacements),
            "<!--framePath //<!--frameHash \
             4A82297889EB505CF6B5CBDF69977AFAB4632D6557539782F657BD7DC78091A5-->\
             /<!--frame0-->-->"
        );
    }

    #[test]
    fn generated_frame_path_over_limit_is_hashed() {
        let mut replacements = UniqueNameReplacements::new();
        let just_fits = "a".repeat(MAX_SIZE - 1);
        assert_eq!(update_legacy_name(&just_fits, &mut replacements), just_fits);

        let frame = frame_path(&["<!--frame0-->", &just_fits, "<!--frame0-->"]);
        let hashed = "<!--framePath //<!--frameHash \
                      56D999B69FA6734C5ED4B7C34CC994909AA7C5BF46D6A2B9E6357CB0911CD48C-->-->";
        assert_eq!(update_legacy_name(&frame, &mut replacements), hashed);

        let collided = format!("{frame}<!--framePosition-0-0-0/0-->");
        assert_eq!(
            update_legacy_name(&collided, &mut replacements),
            format!("{hashed}<!--framePosition-0-0-0/0-->")
        );

        let nested = format!("{}/<!--frame0-->-->", &collided[..collided.len() - 3]);
        assert_eq!(
            update_legacy_name(&nested, &mut replacements),
            format!("{}<!--framePosition-0-0-0/0/<!--frame0-->-->", hashed)
        );
    }

    #[test]
    fn rewritten_name_still_over_limit_is_hashed_again() {
        let mut replacements = UniqueNameReplacements::new();
        let just_fits = "a".repeat(MAX_SIZE - 1);
        let just_fits_2 = "a".repeat(MAX_SIZE - 2);

        let frame = frame_path(&["<!--frame0-->", &just_fits, "<!--frame0-->"]);
        update_legacy_name(&frame, &mut replacements);

        let grandchild = frame_path(&[
            "<!--frame0-->",
            &just_fits,
            "<!--frame0-->",
            &just_fits_2,
            "<!--frame0-->",
        ]);
        assert_eq!(
            update_legacy_name(&grandchild, &mut replacements),
            "<!--framePath //<!--frameHash \
             9674397B6C53B4C9DA2D5E150FB090A75E6F89E18F2BD372851E6CC38A337060-->-->"
        );
    }

    #[test]
    fn hashed_unique_suffix_keeps_ten_positions() {
        let mut replacements = UniqueNameReplacements::new();
        let components: Vec<String> = (1..=28).map(|index| format!("<!--frame{index}-->")).collect();
        let refs: Vec<&str> = components.iter().map(String::as_str).collect();
        let positions: Vec<String> = (1..=28).rev().map(|index| index.to_string()).collect();
        let name = format!(
            "{}<!--framePosition-{}/0-->",
            frame_path(&refs),
            positions.join("-")
        );

        assert_eq!(
            update_legacy_name(&name, &mut replacements),
            "<!--framePath //<!--frameHash \
             7B8BD7AD1163EF2FA14D299769A779DE7F11CB275FDAF81B54FBB89D3D88B640-->-->\
             <!--framePosition-28-27-26-25-24-23-22-21-20-19/0-->"
        );
    }

    #[test]
    fn deep_path_under_limit_is_unchanged() {
        let mut replacements = UniqueNameReplacements::new();
        let components: Vec<String> = (1..=27).map(|index| format!("<!--frame{index}-->")).collect();
        let refs: Vec<&str> = components.iter().map(String::as_str).collect();
        let positions: Vec<String> = (1..=27).rev().map(|index| index.to_string()).collect();
        let name = format!(
            "{}<!--framePosition-{}/0-->",
            frame_path(&refs),
            positions.join("-")
        );

        assert!(name.len() <= MAX_SIZE);
        assert_eq!(update_legacy_name(&name, &mut replacements), name);
    }
}
