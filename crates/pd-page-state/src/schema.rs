//! Version 26 page-state message: a CBOR schema carried in a single pickle
//! data blob.
//!
//! Every struct is a CBOR map keyed by small field numbers, so readers skip
//! fields they do not know and treat missing fields as defaults. Body elements
//! are tagged unions encoded as `[tag, value]`.
//!
//! ```text
//! PageState    { 0: [string?] referenced_files, 1: FrameState top }
//! FrameState   { 0: url, 1: referrer, 2: target, 3: state_object,
//!                4: [string?] document_state, 5: scroll_restoration_type,
//!                6: did_save_scroll_or_scale_state, 7: [x, y] scroll_offset,
//!                8: [x, y] visual_viewport_scroll_offset,
//!                9: item_sequence_number, 10: document_sequence_number,
//!                11: page_scale_factor, 12: referrer_policy,
//!                13: HttpBody, 14: [FrameState] children }
//! HttpBody     { 0: http_content_type, 1: RequestBody, 2: contains_passwords }
//! RequestBody  { 0: [Element] elements, 1: identifier }
//! Element      [0, bytes] | [1, [path, offset, length, mtime]]
//!              | [2, [url, offset, length, mtime]] | [3, uuid]
//! ```

use crate::exploded::ExplodedFrameState;
use crate::exploded::ExplodedHttpBody;
use crate::exploded::ExplodedPageState;
use crate::exploded::MAX_FRAME_TREE_DEPTH;
use crate::exploded::ReferrerPolicy;
use crate::exploded::ScrollRestorationType;
use crate::referenced_files;
use crate::request_body::BodyElement;
use crate::request_body::ResourceRequestBody;
use crate::url_spec;
use minicbor::Decoder;
use minicbor::Encoder;
use minicbor::data::Type;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_core::Point;
use pd_core::PointF;
use std::convert::Infallible;
use std::fmt;

type EncodeResult = Result<(), minicbor::encode::Error<Infallible>>;

mod page_field {
    pub const REFERENCED_FILES: u32 = 0;
    pub const TOP: u32 = 1;
}

mod frame_field {
    pub const URL_STRING: u32 = 0;
    pub const REFERRER: u32 = 1;
    pub const TARGET: u32 = 2;
    pub const STATE_OBJECT: u32 = 3;
    pub const DOCUMENT_STATE: u32 = 4;
    pub const SCROLL_RESTORATION_TYPE: u32 = 5;
    pub const DID_SAVE_SCROLL_OR_SCALE_STATE: u32 = 6;
    pub const SCROLL_OFFSET: u32 = 7;
    pub const VISUAL_VIEWPORT_SCROLL_OFFSET: u32 = 8;
    pub const ITEM_SEQUENCE_NUMBER: u32 = 9;
    pub const DOCUMENT_SEQUENCE_NUMBER: u32 = 10;
    pub const PAGE_SCALE_FACTOR: u32 = 11;
    pub const REFERRER_POLICY: u32 = 12;
    pub const HTTP_BODY: u32 = 13;
    pub const CHILDREN: u32 = 14;
    pub const COUNT: u64 = 15;
}

mod http_body_field {
    pub const HTTP_CONTENT_TYPE: u32 = 0;
    pub const REQUEST_BODY: u32 = 1;
    pub const CONTAINS_PASSWORDS: u32 = 2;
}

mod request_body_field {
    pub const ELEMENTS: u32 = 0;
    pub const IDENTIFIER: u32 = 1;
}

mod element_tag {
    pub const BYTES: u32 = 0;
    pub const FILE: u32 = 1;
    pub const FILE_SYSTEM: u32 = 2;
    pub const BLOB: u32 = 3;
}

/// Why a schema message was rejected.
#[derive(Debug)]
enum SchemaError {
    Cbor(minicbor::decode::Error),
    IndefiniteLength,
    TooDeep,
    ImplausibleLength(u64),
    UnknownElement(u32),
    TrailingBytes(usize),
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cbor(error) => write!(f, "malformed CBOR: {error}"),
            Self::IndefiniteLength => write!(f, "indefinite-length CBOR items are not allowed"),
            Self::TooDeep => write!(f, "frame tree deeper than {MAX_FRAME_TREE_DEPTH} levels"),
            Self::ImplausibleLength(len) => {
                write!(f, "collection of {len} entries exceeds the remaining input")
            }
            Self::UnknownElement(tag) => write!(f, "unknown body element tag {tag}"),
            Self::TrailingBytes(count) => write!(f, "{count} bytes after the message"),
        }
    }
}

impl From<minicbor::decode::Error> for SchemaError {
    fn from(error: minicbor::decode::Error) -> Self {
        Self::Cbor(error)
    }
}

/// Encodes the version 26 message.
pub(crate) fn encode_message(state: &ExplodedPageState) -> BrowserResult<Vec<u8>> {
    state.check_depth()?;
    let mut buf = Vec::new();
    let mut enc = Encoder::new(&mut buf);
    encode_page(&mut enc, state).map_err(|error| {
        BrowserError::new(
            "page_state.encode_failed",
            format!("failed to encode page state message: {error}"),
        )
    })?;
    Ok(buf)
}

/// Decodes the version 26 message. An empty message is a default state.
pub(crate) fn decode_message(bytes: &[u8]) -> BrowserResult<ExplodedPageState> {
    if bytes.is_empty() {
        return Ok(ExplodedPageState::default());
    }

    let mut dec = Decoder::new(bytes);
    let mut state = decode_page(&mut dec).map_err(malformed)?;
    if dec.position() != bytes.len() {
        return Err(malformed(SchemaError::TrailingBytes(
            bytes.len() - dec.position(),
        )));
    }

    referenced_files::dedup(&mut state.referenced_files);
    Ok(state)
}

fn malformed(error: SchemaError) -> BrowserError {
    BrowserError::new(
        "page_state.parse_error",
        format!("page state message rejected: {error}"),
    )
}

fn encode_page(enc: &mut Encoder<&mut Vec<u8>>, state: &ExplodedPageState) -> EncodeResult {
    enc.map(2)?;
    enc.u32(page_field::REFERENCED_FILES)?;
    encode_string_list(enc, &state.referenced_files)?;
    enc.u32(page_field::TOP)?;
    encode_frame(enc, &state.top)
}

fn encode_frame(enc: &mut Encoder<&mut Vec<u8>>, state: &ExplodedFrameState) -> EncodeResult {
    // Scroll and scale are only meaningful when they were saved.
    let did_save = state.did_save_scroll_or_scale_state;
    let scroll_offset = if did_save { state.scroll_offset } else { Point::default() };
    let viewport_offset = if did_save {
        state.visual_viewport_scroll_offset
    } else {
        PointF::default()
    };
    let page_scale_factor = if did_save { state.page_scale_factor } else { 0.0 };

    enc.map(frame_field::COUNT)?;
    enc.u32(frame_field::URL_STRING)?;
    encode_optional_str(enc, state.url_string.as_deref())?;
    enc.u32(frame_field::REFERRER)?;
    encode_optional_str(enc, state.referrer.as_deref())?;
    enc.u32(frame_field::TARGET)?;
    encode_optional_str(enc, state.target.as_deref())?;
    enc.u32(frame_field::STATE_OBJECT)?;
    encode_optional_str(enc, state.state_object.as_deref())?;
    enc.u32(frame_field::DOCUMENT_STATE)?;
    encode_string_list(enc, &state.document_state)?;
    enc.u32(frame_field::SCROLL_RESTORATION_TYPE)?;
    enc.i32(state.scroll_restoration_type.as_raw())?;
    enc.u32(frame_field::DID_SAVE_SCROLL_OR_SCALE_STATE)?;
    enc.bool(did_save)?;
    enc.u32(frame_field::SCROLL_OFFSET)?;
    enc.array(2)?.i32(scroll_offset.x)?.i32(scroll_offset.y)?;
    enc.u32(frame_field::VISUAL_VIEWPORT_SCROLL_OFFSET)?;
    enc.array(2)?.f64(viewport_offset.x)?.f64(viewport_offset.y)?;
    enc.u32(frame_field::ITEM_SEQUENCE_NUMBER)?;
    enc.i64(state.item_sequence_number)?;
    enc.u32(frame_field::DOCUMENT_SEQUENCE_NUMBER)?;
    enc.i64(state.document_sequence_number)?;
    enc.u32(frame_field::PAGE_SCALE_FACTOR)?;
    enc.f64(page_scale_factor)?;
    enc.u32(frame_field::REFERRER_POLICY)?;
    enc.i32(state.referrer_policy.as_raw())?;
    enc.u32(frame_field::HTTP_BODY)?;
    encode_http_body(enc, &state.http_body)?;
    enc.u32(frame_field::CHILDREN)?;
    enc.array(state.children.len() as u64)?;
    for child in &state.children {
        encode_frame(enc, child)?;
    }
    Ok(())
}

fn encode_http_body(enc: &mut Encoder<&mut Vec<u8>>, http_body: &ExplodedHttpBody) -> EncodeResult {
    let len = if http_body.request_body.is_some() { 3 } else { 2 };
    enc.map(len)?;
    enc.u32(http_body_field::HTTP_CONTENT_TYPE)?;
    encode_optional_str(enc, http_body.http_content_type.as_deref())?;
    enc.u32(http_body_field::CONTAINS_PASSWORDS)?;
    enc.bool(http_body.contains_passwords)?;
    if let Some(body) = &http_body.request_body {
        enc.u32(http_body_field::REQUEST_BODY)?;
        encode_request_body(enc, body)?;
    }
    Ok(())
}

fn encode_request_body(enc: &mut Encoder<&mut Vec<u8>>, body: &ResourceRequestBody) -> EncodeResult {
    enc.map(2)?;
    enc.u32(request_body_field::ELEMENTS)?;
    enc.array(body.elements.len() as u64)?;
    for element in &body.elements {
        enc.array(2)?;
        match element {
            BodyElement::Bytes(data) => {
                enc.u32(element_tag::BYTES)?.bytes(data)?;
            }
            BodyElement::File {
                path,
                offset,
                length,
                expected_modification_time,
            } => {
                enc.u32(element_tag::FILE)?;
                enc.array(4)?
                    .str(path)?
                    .u64(*offset)?
                    .u64(*length)?
                    .f64(*expected_modification_time)?;
            }
            BodyElement::FileSystem {
                url,
                offset,
                length,
                expected_modification_time,
            } => {
                enc.u32(element_tag::FILE_SYSTEM)?;
                enc.array(4)?
                    .str(url)?
                    .u64(*offset)?
                    .u64(*length)?
                    .f64(*expected_modification_time)?;
            }
            BodyElement::Blob { uuid } => {
                enc.u32(element_tag::BLOB)?.str(uuid)?;
            }
        }
    }
    enc.u32(request_body_field::IDENTIFIER)?;
    enc.i64(body.identifier)?;
    Ok(())
}

fn encode_optional_str(enc: &mut Encoder<&mut Vec<u8>>, value: Option<&str>) -> EncodeResult {
    match value {
        Some(value) => enc.str(value)?,
        None => enc.null()?,
    };
    Ok(())
}

fn encode_string_list(enc: &mut Encoder<&mut Vec<u8>>, values: &[Option<String>]) -> EncodeResult {
    enc.array(values.len() as u64)?;
    for value in values {
        encode_optional_str(enc, value.as_deref())?;
    }
    Ok(())
}

fn decode_page(dec: &mut Decoder<'_>) -> Result<ExplodedPageState, SchemaError> {
    let mut state = ExplodedPageState::default();
    let len = decode_map_len(dec)?;
    for _ in 0..len {
        match dec.u32()? {
            page_field::REFERENCED_FILES => state.referenced_files = decode_string_list(dec)?,
            page_field::TOP => state.top = decode_frame(dec, 0)?,
            _ => skip_value(dec)?,
        }
    }
    Ok(state)
}

fn decode_frame(dec: &mut Decoder<'_>, depth: usize) -> Result<ExplodedFrameState, SchemaError> {
    if depth > MAX_FRAME_TREE_DEPTH {
        return Err(SchemaError::TooDeep);
    }

    let mut state = ExplodedFrameState::default();
    let len = decode_map_len(dec)?;
    for _ in 0..len {
        match dec.u32()? {
            frame_field::URL_STRING => state.url_string = decode_optional_string(dec)?,
            frame_field::REFERRER => state.referrer = decode_optional_string(dec)?,
            frame_field::TARGET => state.target = decode_optional_string(dec)?,
            frame_field::STATE_OBJECT => state.state_object = decode_optional_string(dec)?,
            frame_field::DOCUMENT_STATE => state.document_state = decode_string_list(dec)?,
            frame_field::SCROLL_RESTORATION_TYPE => {
                state.scroll_restoration_type =
                    ScrollRestorationType::from_raw(dec.i32()?).unwrap_or_default();
            }
            frame_field::DID_SAVE_SCROLL_OR_SCALE_STATE => {
                state.did_save_scroll_or_scale_state = dec.bool()?;
            }
            frame_field::SCROLL_OFFSET => {
                expect_array_len(dec, 2)?;
                state.scroll_offset = Point::new(dec.i32()?, dec.i32()?);
            }
            frame_field::VISUAL_VIEWPORT_SCROLL_OFFSET => {
                expect_array_len(dec, 2)?;
                state.visual_viewport_scroll_offset = PointF::new(dec.f64()?, dec.f64()?);
            }
            frame_field::ITEM_SEQUENCE_NUMBER => state.item_sequence_number = dec.i64()?,
            frame_field::DOCUMENT_SEQUENCE_NUMBER => state.document_sequence_number = dec.i64()?,
            frame_field::PAGE_SCALE_FACTOR => state.page_scale_factor = dec.f64()?,
            frame_field::REFERRER_POLICY => {
                state.referrer_policy = ReferrerPolicy::from_raw(dec.i32()?).unwrap_or_default();
            }
            frame_field::HTTP_BODY => state.http_body = decode_http_body(dec)?,
            frame_field::CHILDREN => {
                let count = decode_array_len(dec)?;
                for _ in 0..count {
                    state.children.push(decode_frame(dec, depth + 1)?);
                }
            }
            _ => skip_value(dec)?,
        }
    }
    Ok(state)
}

fn decode_http_body(dec: &mut Decoder<'_>) -> Result<ExplodedHttpBody, SchemaError> {
    let mut http_body = ExplodedHttpBody::default();
    let len = decode_map_len(dec)?;
    for _ in 0..len {
        match dec.u32()? {
            http_body_field::HTTP_CONTENT_TYPE => {
                http_body.http_content_type = decode_optional_string(dec)?;
            }
            http_body_field::REQUEST_BODY => {
                http_body.request_body = Some(decode_request_body(dec)?);
            }
            http_body_field::CONTAINS_PASSWORDS => http_body.contains_passwords = dec.bool()?,
            _ => skip_value(dec)?,
        }
    }
    Ok(http_body)
}

fn decode_request_body(dec: &mut Decoder<'_>) -> Result<ResourceRequestBody, SchemaError> {
    let mut body = ResourceRequestBody::new();
    let len = decode_map_len(dec)?;
    for _ in 0..len {
        match dec.u32()? {
            request_body_field::ELEMENTS => {
                let count = decode_array_len(dec)?;
                for _ in 0..count {
                    decode_element(dec, &mut body)?;
                }
            }
            request_body_field::IDENTIFIER => body.identifier = dec.i64()?,
            _ => skip_value(dec)?,
        }
    }
    Ok(body)
}

fn decode_element(dec: &mut Decoder<'_>, body: &mut ResourceRequestBody) -> Result<(), SchemaError> {
    expect_array_len(dec, 2)?;
    match dec.u32()? {
        element_tag::BYTES => {
            let data = decode_bytes(dec)?;
            body.append_bytes(data);
        }
        element_tag::FILE => {
            expect_array_len(dec, 4)?;
            let path = decode_text(dec)?.to_owned();
            body.append_file_range(path, dec.u64()?, dec.u64()?, dec.f64()?);
        }
        element_tag::FILE_SYSTEM => {
            expect_array_len(dec, 4)?;
            let url = url_spec::canonicalize(decode_text(dec)?.to_owned());
            body.append_file_system_range(url, dec.u64()?, dec.u64()?, dec.f64()?);
        }
        element_tag::BLOB => {
            let uuid = decode_text(dec)?.to_owned();
            body.append_blob(uuid);
        }
        tag => return Err(SchemaError::UnknownElement(tag)),
    }
    Ok(())
}

fn decode_optional_string(dec: &mut Decoder<'_>) -> Result<Option<String>, SchemaError> {
    if dec.datatype()? == Type::Null {
        dec.null()?;
        return Ok(None);
    }
    Ok(Some(decode_text(dec)?.to_owned()))
}

fn decode_string_list(dec: &mut Decoder<'_>) -> Result<Vec<Option<String>>, SchemaError> {
    let count = decode_array_len(dec)?;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(decode_optional_string(dec)?);
    }
    Ok(values)
}

fn decode_text<'a>(dec: &mut Decoder<'a>) -> Result<&'a str, SchemaError> {
    if dec.datatype()? == Type::StringIndef {
        return Err(SchemaError::IndefiniteLength);
    }
    Ok(dec.str()?)
}

fn decode_bytes<'a>(dec: &mut Decoder<'a>) -> Result<&'a [u8], SchemaError> {
    if dec.datatype()? == Type::BytesIndef {
        return Err(SchemaError::IndefiniteLength);
    }
    Ok(dec.bytes()?)
}

fn decode_map_len(dec: &mut Decoder<'_>) -> Result<usize, SchemaError> {
    let len = dec.map()?.ok_or(SchemaError::IndefiniteLength)?;
    // Every entry takes at least two bytes.
    plausible_len(dec, len, 2)
}

fn decode_array_len(dec: &mut Decoder<'_>) -> Result<usize, SchemaError> {
    let len = dec.array()?.ok_or(SchemaError::IndefiniteLength)?;
    plausible_len(dec, len, 1)
}

fn expect_array_len(dec: &mut Decoder<'_>, expected: u64) -> Result<(), SchemaError> {
    let len = dec.array()?.ok_or(SchemaError::IndefiniteLength)?;
    if len != expected {
        return Err(SchemaError::Cbor(minicbor::decode::Error::message(
            "unexpected array length",
        )));
    }
    Ok(())
}

fn plausible_len(dec: &Decoder<'_>, len: u64, min_entry_bytes: u64) -> Result<usize, SchemaError> {
    let remaining = (dec.input().len() - dec.position()) as u64;
    if len.saturating_mul(min_entry_bytes) > remaining {
        return Err(SchemaError::ImplausibleLength(len));
    }
    usize::try_from(len).map_err(|_| SchemaError::ImplausibleLength(len))
}

/// Skips a field this reader does not know. Only scalar and definite-length
/// string values are skipped; containers would need unbounded nesting.
fn skip_value(dec: &mut Decoder<'_>) -> Result<(), SchemaError> {
    match dec.datatype()? {
        Type::Array
        | Type::ArrayIndef
        | Type::Map
        | Type::MapIndef
        | Type::Tag
        | Type::BytesIndef
        | Type::StringIndef => Err(SchemaError::Cbor(minicbor::decode::Error::message(
            "unknown field holds a container",
        ))),
        _ => Ok(dec.skip()?),
    }
}
