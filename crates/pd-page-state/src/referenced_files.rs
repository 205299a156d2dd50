//! Referenced-file bookkeeping.
//!
//! Streams older than version 14 did not store the list of local files a page
//! references, so it is rebuilt from upload bodies and from the serialized
//! form-control state of every frame.

use crate::exploded::ExplodedFrameState;

/// Collapses consecutive equal entries, keeping the first.
pub(crate) fn dedup(files: &mut Vec<Option<String>>) {
    files.dedup();
}

/// Appends the files referenced by `frame` and its descendants, parents
/// first. Returns `None` when a frame's form state is malformed.
pub(crate) fn collect_from_frame(
    frame: &ExplodedFrameState,
    files: &mut Vec<Option<String>>,
) -> Option<()> {
    if let Some(body) = &frame.http_body.request_body {
        files.extend(body.file_paths().map(|path| Some(path.to_owned())));
    }

    collect_from_document_state(&frame.document_state, files)?;

    for child in &frame.children {
        collect_from_frame(child, files)?;
    }
    Some(())
}

/// Walks the renderer's form-state vector:
///
/// ```text
/// signature, form key, item count,
/// per item: name, type, value count, value...
/// ```
///
/// A `file` item has exactly two values: the path, then a display name.
fn collect_from_document_state(
    document_state: &[Option<String>],
    files: &mut Vec<Option<String>>,
) -> Option<()> {
    if document_state.is_empty() {
        return Some(());
    }
    if document_state.len() < 3 {
        return None;
    }

    // Skip the signature and the form key.
    let mut index = 2;
    let item_count = parse_count(&document_state[index])?;
    index += 1;

    for _ in 0..item_count {
        if index + 1 >= document_state.len() {
            return None;
        }
        // Skip the name.
        index += 1;
        let item_type = &document_state[index];
        index += 1;

        let value_count = parse_count(document_state.get(index)?)?;
        index += 1;
        let values_end = index.checked_add(value_count)?;
        if values_end > document_state.len() {
            return None;
        }

        if item_type.as_deref() == Some("file") {
            if value_count != 2 {
                return None;
            }
            files.push(document_state[index].clone());
        }
        index = values_end;
    }

    Some(())
}

/// Unsigned decimal only; `usize::from_str` alone would also take a `+`.
fn parse_count(value: &Option<String>) -> Option<usize> {
    let digits = value.as_deref().unwrap_or_default();
    if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
