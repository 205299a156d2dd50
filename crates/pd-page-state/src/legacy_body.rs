//! Legacy (pickle) layout of HTTP bodies.
//!
//! ```text
//! bool has_body
//! [ i32 element_count
//!   per element: i32 type tag, then
//!     0 bytes:       data
//!     1 file:        string16 path, i64 offset, i64 length, f64 mtime
//!     2 fs url:      string url,    i64 offset, i64 length, f64 mtime
//!     3 blob:        string uuid (>= 16) | string blob url (< 16, dropped)
//!   i64 identifier
//!   bool contains_passwords (>= 12) ]
//! ```

use crate::exploded::ExplodedHttpBody;
use crate::pickle::PickleReader;
use crate::pickle::PickleWriter;
use crate::request_body::BodyElement;
use crate::request_body::ResourceRequestBody;
use crate::url_spec;
use crate::version::BLOB_UUID_VERSION;
use crate::version::CONTAINS_PASSWORDS_VERSION;
use crate::version::FILESYSTEM_URL_VERSION;
use pd_core::BrowserError;
use pd_core::BrowserResult;

const TYPE_BYTES: i32 = 0;
const TYPE_FILE: i32 = 1;
const TYPE_FILE_SYSTEM_URL: i32 = 2;
const TYPE_BLOB: i32 = 3;

pub(crate) fn read_request_body(reader: &mut PickleReader<'_>, version: i32) -> ResourceRequestBody {
    let mut body = ResourceRequestBody::new();
    let count = reader.read_i32();

    for _ in 0..count.max(0) {
        if reader.has_error() {
            break;
        }

        match reader.read_i32() {
            TYPE_BYTES => {
                let data = reader.read_data();
                body.append_bytes(data);
            }
            TYPE_FILE => {
                let path = reader.read_string16().unwrap_or_default();
                let offset = reader.read_i64();
                let length = reader.read_i64();
                let modification_time = reader.read_f64();
                body.append_file_range(path, offset as u64, length as u64, modification_time);
            }
            TYPE_FILE_SYSTEM_URL => {
                let url = url_spec::canonicalize(reader.read_std_string());
                let offset = reader.read_i64();
                let length = reader.read_i64();
                let modification_time = reader.read_f64();
                body.append_file_system_range(url, offset as u64, length as u64, modification_time);
            }
            TYPE_BLOB if version >= BLOB_UUID_VERSION => {
                body.append_blob(reader.read_std_string());
            }
            TYPE_BLOB => {
                // Blob URLs cannot be resolved any more; the element is dropped.
                reader.read_std_string();
            }
            _ => reader.set_error(),
        }
    }

    body.identifier = reader.read_i64();
    body
}

pub(crate) fn write_request_body(
    writer: &mut PickleWriter,
    version: i32,
    body: &ResourceRequestBody,
) -> BrowserResult<()> {
    writer.write_vector_size(body.elements.len(), size_of::<BodyElement>())?;

    for element in &body.elements {
        writer.write_i32(element.legacy_type_tag());
        match element {
            BodyElement::Bytes(data) => writer.write_data(data)?,
            BodyElement::File {
                path,
                offset,
                length,
                expected_modification_time,
            } => {
                writer.write_string16(Some(path))?;
                writer.write_i64(*offset as i64);
                writer.write_i64(*length as i64);
                writer.write_f64(*expected_modification_time);
            }
            BodyElement::FileSystem {
                url,
                offset,
                length,
                expected_modification_time,
            } => {
                if version < FILESYSTEM_URL_VERSION {
                    return Err(unsupported_element(element, version));
                }
                writer.write_std_string(url)?;
                writer.write_i64(*offset as i64);
                writer.write_i64(*length as i64);
                writer.write_f64(*expected_modification_time);
            }
            BodyElement::Blob { uuid } => {
                if version < BLOB_UUID_VERSION {
                    return Err(unsupported_element(element, version));
                }
                writer.write_std_string(uuid)?;
            }
        }
    }

    writer.write_i64(body.identifier);
    Ok(())
}

/// Reads the body flag and, when set, the body and its password flag. The
/// content type is owned by the frame layout, not by this block.
pub(crate) fn read_http_body(reader: &mut PickleReader<'_>, version: i32) -> ExplodedHttpBody {
    let mut http_body = ExplodedHttpBody::default();
    if !reader.read_bool() {
        return http_body;
    }

    http_body.request_body = Some(read_request_body(reader, version));
    if version >= CONTAINS_PASSWORDS_VERSION {
        http_body.contains_passwords = reader.read_bool();
    }
    http_body
}

pub(crate) fn write_http_body(
    writer: &mut PickleWriter,
    version: i32,
    http_body: &ExplodedHttpBody,
) -> BrowserResult<()> {
    let Some(body) = &http_body.request_body else {
        writer.write_bool(false);
        return Ok(());
    };

    writer.write_bool(true);
    write_request_body(writer, version, body)?;
    if version >= CONTAINS_PASSWORDS_VERSION {
        writer.write_bool(http_body.contains_passwords);
    }
    Ok(())
}

fn unsupported_element(element: &BodyElement, version: i32) -> BrowserError {
    BrowserError::new(
        "page_state.element_unsupported",
        format!(
            "{} body elements cannot be written in page state version {version}",
            element.as_str()
        ),
    )
}
