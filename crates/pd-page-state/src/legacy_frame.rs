//! Legacy (pickle) layout of frame trees, versions 11 through 25.
//!
//! The writer emits exactly the layout the reader expects for the requested
//! version: obsolete fields are written as placeholders and fields that did
//! not exist yet are left out.

use crate::exploded::ExplodedFrameState;
use crate::exploded::ExplodedPageState;
use crate::exploded::MAX_FRAME_TREE_DEPTH;
use crate::exploded::ReferrerPolicy;
use crate::exploded::ScrollRestorationType;
use crate::legacy_body;
use crate::options::DecodeOptions;
use crate::pickle::PickleReader;
use crate::pickle::PickleWriter;
use crate::referenced_files;
use crate::unique_name;
use crate::unique_name::UniqueNameReplacements;
use crate::version::FRAME_SEQUENCE_NUMBER_VERSION;
use crate::version::JOINT_SCALE_VERSION;
use crate::version::LIMITED_UNIQUE_NAME_VERSION;
use crate::version::NO_FRAME_SEQUENCE_NUMBER_VERSION;
use crate::version::NO_ORIGINAL_URL_VERSION;
use crate::version::REFERENCED_FILES_VERSION;
use crate::version::REFERRER_POLICY_VERSION;
use crate::version::SAVE_SCROLL_FLAG_VERSION;
use crate::version::SCROLL_RESTORATION_VERSION;
use crate::version::TARGET_FRAME_ID_VERSION;
use crate::version::TRIMMED_FIELDS_VERSION;
use crate::version::VISUAL_VIEWPORT_VERSION;
use pd_core::BrowserResult;
use pd_core::Point;
use pd_core::PointF;

/// Viewport offset reported for frames that never saved one.
const UNKNOWN_VIEWPORT_OFFSET: PointF = PointF::new(-1.0, -1.0);

/// Reads the page body that follows the version tag.
pub(crate) fn read_page_state(
    reader: &mut PickleReader<'_>,
    version: i32,
    options: &DecodeOptions,
) -> ExplodedPageState {
    let mut state = ExplodedPageState::default();
    if version >= REFERENCED_FILES_VERSION {
        state.referenced_files = reader.read_string16_vector();
    }

    let mut frames = FrameReader {
        reader: &mut *reader,
        version,
        options,
        replacements: UniqueNameReplacements::new(),
    };
    state.top = frames.read_frame(true, 0);

    if version < REFERENCED_FILES_VERSION
        && referenced_files::collect_from_frame(&state.top, &mut state.referenced_files).is_none()
    {
        reader.set_error();
    }
    referenced_files::dedup(&mut state.referenced_files);
    state
}

/// Writes the version tag and page body for a legacy `version`.
pub(crate) fn write_page_state(
    writer: &mut PickleWriter,
    version: i32,
    state: &ExplodedPageState,
) -> BrowserResult<()> {
    state.check_depth()?;
    writer.write_i32(version);
    if version >= REFERENCED_FILES_VERSION {
        writer.write_string16_vector(&state.referenced_files)?;
    }
    write_frame(writer, version, &state.top, true)
}

struct FrameReader<'r, 'a> {
    reader: &'r mut PickleReader<'a>,
    version: i32,
    options: &'r DecodeOptions,
    replacements: UniqueNameReplacements,
}

impl FrameReader<'_, '_> {
    fn read_frame(&mut self, is_top: bool, depth: usize) -> ExplodedFrameState {
        let version = self.version;
        let mut state = ExplodedFrameState::default();
        if depth > MAX_FRAME_TREE_DEPTH {
            self.reader.set_error();
            return state;
        }

        if version < REFERENCED_FILES_VERSION && !is_top {
            // Redundant per-frame copy of the version.
            self.reader.read_i32();
        }

        state.url_string = self.reader.read_string16();
        if version < NO_ORIGINAL_URL_VERSION {
            self.reader.read_string16();
        }

        state.target = self.reader.read_string16();
        if version < LIMITED_UNIQUE_NAME_VERSION {
            state.target = state
                .target
                .map(|name| unique_name::update_legacy_name(&name, &mut self.replacements));
        }

        if version < TRIMMED_FIELDS_VERSION {
            // Parent, title, alternate title, visited time.
            self.reader.read_string16();
            self.reader.read_string16();
            self.reader.read_string16();
            self.reader.read_f64();
        }

        state.did_save_scroll_or_scale_state = if version >= SAVE_SCROLL_FLAG_VERSION {
            self.reader.read_bool()
        } else {
            true
        };
        let did_save = state.did_save_scroll_or_scale_state;

        if did_save {
            let x = self.reader.read_i32();
            let y = self.reader.read_i32();
            state.scroll_offset = Point::new(x, y);
        }

        if version < TRIMMED_FIELDS_VERSION {
            // Target item flag, visit count.
            self.reader.read_bool();
            self.reader.read_i32();
        }

        state.referrer = self.reader.read_string16();
        state.document_state = self.reader.read_string16_vector();

        if did_save {
            state.page_scale_factor = self.reader.read_f64();
        }

        state.item_sequence_number = self.reader.read_i64();
        state.document_sequence_number = self.reader.read_i64();
        if (FRAME_SEQUENCE_NUMBER_VERSION..NO_FRAME_SEQUENCE_NUMBER_VERSION).contains(&version) {
            self.reader.read_i64();
        }
        if (TARGET_FRAME_ID_VERSION..NO_ORIGINAL_URL_VERSION).contains(&version) {
            self.reader.read_i64();
        }

        if version >= REFERRER_POLICY_VERSION {
            state.referrer_policy =
                ReferrerPolicy::from_raw(self.reader.read_i32()).unwrap_or_default();
        }

        state.visual_viewport_scroll_offset = if version >= VISUAL_VIEWPORT_VERSION && did_save {
            let x = self.reader.read_f64();
            let y = self.reader.read_f64();
            PointF::new(x, y)
        } else {
            UNKNOWN_VIEWPORT_OFFSET
        };

        if version >= SCROLL_RESTORATION_VERSION {
            state.scroll_restoration_type =
                ScrollRestorationType::from_raw(self.reader.read_i32()).unwrap_or_default();
        }

        if self.reader.read_bool() {
            state.state_object = self.reader.read_string16();
        }

        state.http_body = legacy_body::read_http_body(self.reader, version);
        // Present even when there is no body.
        state.http_body.http_content_type = self.reader.read_string16();

        if version < REFERENCED_FILES_VERSION {
            // Unused referrer copy.
            self.reader.read_string16();
        }

        if version == JOINT_SCALE_VERSION {
            self.read_joint_scale(&mut state);
        }

        let child_count = self.reader.read_vector_size(size_of::<ExplodedFrameState>());
        for _ in 0..child_count {
            let child = self.read_frame(false, depth + 1);
            state.children.push(child);
            if self.reader.has_error() {
                break;
            }
        }

        state
    }

    /// Version 11 stored scroll offsets premultiplied by the page scale, and a
    /// page scale that included the device scale factor.
    fn read_joint_scale(&mut self, state: &mut ExplodedFrameState) {
        // Two fields nothing reads any more.
        self.reader.read_f64();
        self.reader.read_bool();

        let page_scale_factor = state.page_scale_factor;
        if page_scale_factor == 0.0 {
            return;
        }
        state.scroll_offset = Point::new(
            (f64::from(state.scroll_offset.x) / page_scale_factor) as i32,
            (f64::from(state.scroll_offset.y) / page_scale_factor) as i32,
        );
        state.page_scale_factor = page_scale_factor / f64::from(self.options.device_scale_factor);
    }
}

fn write_frame(
    writer: &mut PickleWriter,
    version: i32,
    state: &ExplodedFrameState,
    is_top: bool,
) -> BrowserResult<()> {
    if version < REFERENCED_FILES_VERSION && !is_top {
        writer.write_i32(version);
    }

    writer.write_string16(state.url_string.as_deref())?;
    if version < NO_ORIGINAL_URL_VERSION {
        writer.write_string16(state.url_string.as_deref())?;
    }
    writer.write_string16(state.target.as_deref())?;

    if version < TRIMMED_FIELDS_VERSION {
        writer.write_string16(None)?;
        writer.write_string16(None)?;
        writer.write_string16(None)?;
        writer.write_f64(0.0);
    }

    // Versions before the flag always carry scroll and scale.
    let did_save = version < SAVE_SCROLL_FLAG_VERSION || state.did_save_scroll_or_scale_state;
    if version >= SAVE_SCROLL_FLAG_VERSION {
        writer.write_bool(did_save);
    }
    if did_save {
        writer.write_i32(state.scroll_offset.x);
        writer.write_i32(state.scroll_offset.y);
    }

    if version < TRIMMED_FIELDS_VERSION {
        writer.write_bool(false);
        writer.write_i32(0);
    }

    writer.write_string16(state.referrer.as_deref())?;
    writer.write_string16_vector(&state.document_state)?;

    if did_save {
        writer.write_f64(state.page_scale_factor);
    }

    writer.write_i64(state.item_sequence_number);
    writer.write_i64(state.document_sequence_number);
    if (FRAME_SEQUENCE_NUMBER_VERSION..NO_FRAME_SEQUENCE_NUMBER_VERSION).contains(&version) {
        writer.write_i64(0);
    }
    if (TARGET_FRAME_ID_VERSION..NO_ORIGINAL_URL_VERSION).contains(&version) {
        writer.write_i64(0);
    }

    if version >= REFERRER_POLICY_VERSION {
        writer.write_i32(state.referrer_policy.as_raw());
    }

    if version >= VISUAL_VIEWPORT_VERSION && did_save {
        writer.write_f64(state.visual_viewport_scroll_offset.x);
        writer.write_f64(state.visual_viewport_scroll_offset.y);
    }

    if version >= SCROLL_RESTORATION_VERSION {
        writer.write_i32(state.scroll_restoration_type.as_raw());
    }

    writer.write_bool(state.state_object.is_some());
    if let Some(state_object) = &state.state_object {
        writer.write_string16(Some(state_object))?;
    }

    legacy_body::write_http_body(writer, version, &state.http_body)?;
    writer.write_string16(state.http_body.http_content_type.as_deref())?;

    if version < REFERENCED_FILES_VERSION {
        writer.write_string16(None)?;
    }

    if version == JOINT_SCALE_VERSION {
        writer.write_f64(0.0);
        writer.write_bool(false);
    }

    writer.write_vector_size(state.children.len(), size_of::<ExplodedFrameState>())?;
    for child in &state.children {
        write_frame(writer, version, child, false)?;
    }
    Ok(())
}
