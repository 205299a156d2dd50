//! Version dispatch for encoded page states.
//!
//! ```text
//! i32 version
//!   -1      std string URL
//!   11..=25 legacy pickle fields
//!   26      data blob holding the schema message
//! ```

use crate::exploded::ExplodedPageState;
use crate::legacy_body;
use crate::legacy_frame;
use crate::options::DecodeOptions;
use crate::pickle::PickleReader;
use crate::pickle::PickleWriter;
use crate::request_body::ResourceRequestBody;
use crate::schema;
use crate::url_spec;
use crate::version::CURRENT_VERSION;
use crate::version::LAST_LEGACY_VERSION;
use crate::version::MIN_VERSION;
use crate::version::SCHEMA_VERSION;
use crate::version::URL_ONLY_VERSION;
use crate::version::is_supported;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use tracing::debug;
use tracing::warn;

/// A decoded page state and the format version it was stored in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPageState {
    /// `None` when the input was empty.
    pub version: Option<i32>,
    pub state: ExplodedPageState,
}

/// Encodes `state` in the current format.
pub fn encode_page_state(state: &ExplodedPageState) -> BrowserResult<Vec<u8>> {
    encode_page_state_for_version(state, CURRENT_VERSION)
}

/// Encodes `state` in an older format, for downgrades and compatibility
/// fixtures. The URL-only format keeps nothing but `state.top.url_string`.
pub fn encode_page_state_for_version(
    state: &ExplodedPageState,
    version: i32,
) -> BrowserResult<Vec<u8>> {
    let mut writer = PickleWriter::new();
    match version {
        URL_ONLY_VERSION => {
            writer.write_i32(URL_ONLY_VERSION);
            writer.write_std_string(state.top.url_string.as_deref().unwrap_or_default())?;
        }
        MIN_VERSION..=LAST_LEGACY_VERSION => {
            legacy_frame::write_page_state(&mut writer, version, state)?;
        }
        SCHEMA_VERSION => {
            let message = schema::encode_message(state)?;
            writer.write_i32(SCHEMA_VERSION);
            writer.write_data(&message)?;
        }
        _ => return Err(unsupported_version(version)),
    }
    writer.into_bytes()
}

/// Decodes a page state in any supported format.
pub fn decode_page_state(encoded: &[u8]) -> BrowserResult<ExplodedPageState> {
    decode_page_state_with_options(encoded, &DecodeOptions::default()).map(|decoded| decoded.state)
}

/// Decodes a page state and reports the version it was stored in. Decoding is
/// all-or-nothing: a malformed field anywhere fails the whole call.
pub fn decode_page_state_with_options(
    encoded: &[u8],
    options: &DecodeOptions,
) -> BrowserResult<DecodedPageState> {
    options.validate()?;
    if encoded.is_empty() {
        return Ok(DecodedPageState::default());
    }

    let mut reader = PickleReader::new(encoded);
    let version = reader.read_i32();
    if reader.has_error() {
        return Err(log_failure(version, parse_error("missing version tag")));
    }

    let state = if version == URL_ONLY_VERSION {
        debug!(target: "page-state", version, branch = "url_only", "decoding page state");
        let url = url_spec::canonicalize(reader.read_std_string());
        ExplodedPageState::from_url(url)
    } else if !is_supported(version) {
        return Err(log_failure(version, unsupported_version(version)));
    } else if version >= SCHEMA_VERSION {
        debug!(target: "page-state", version, branch = "schema", "decoding page state");
        let message = reader.read_data();
        if reader.has_error() {
            return Err(log_failure(version, parse_error("truncated message blob")));
        }
        schema::decode_message(message).map_err(|error| log_failure(version, error))?
    } else {
        debug!(target: "page-state", version, branch = "legacy", "decoding page state");
        legacy_frame::read_page_state(&mut reader, version, options)
    };

    if reader.has_error() {
        return Err(log_failure(version, parse_error("malformed or truncated fields")));
    }

    Ok(DecodedPageState {
        version: Some(version),
        state,
    })
}

/// Encodes a request body on its own, followed by its
/// `contains_sensitive_info` flag.
pub fn encode_resource_request_body(body: &ResourceRequestBody) -> BrowserResult<Vec<u8>> {
    let mut writer = PickleWriter::new();
    legacy_body::write_request_body(&mut writer, LAST_LEGACY_VERSION, body)?;
    writer.write_bool(body.contains_sensitive_info);
    writer.into_bytes()
}

pub fn decode_resource_request_body(encoded: &[u8]) -> BrowserResult<ResourceRequestBody> {
    let mut reader = PickleReader::new(encoded);
    let mut body = legacy_body::read_request_body(&mut reader, LAST_LEGACY_VERSION);
    body.contains_sensitive_info = reader.read_bool();

    if reader.has_error() {
        warn!(target: "page-state", bytes = encoded.len(), "request body decode failed");
        return Err(parse_error("malformed request body"));
    }
    Ok(body)
}

fn parse_error(detail: &str) -> BrowserError {
    BrowserError::new(
        "page_state.parse_error",
        format!("page state could not be decoded: {detail}"),
    )
}

fn unsupported_version(version: i32) -> BrowserError {
    BrowserError::new(
        "page_state.version_unsupported",
        format!(
            "page state version {version} is outside the supported range \
             ({URL_ONLY_VERSION} or {MIN_VERSION}..={CURRENT_VERSION})"
        ),
    )
}

fn log_failure(version: i32, error: BrowserError) -> BrowserError {
    warn!(target: "page-state", version, code = error.code, "page state decode failed");
    error
}
