//! Pickle buffers: the flat, 4-byte aligned, length-prefixed layout used by
//! legacy page states.
//!
//! All integers are little-endian. A buffer starts with a `u32` payload size;
//! every field is padded to a multiple of four bytes.
//!
//! Reads never fail loudly. The first malformed field sets a sticky
//! parse-error flag and every later read returns a default value, so a decode
//! pass always walks to completion and the caller inspects the flag once.

use pd_core::BrowserError;
use pd_core::BrowserResult;

const HEADER_BYTES: usize = 4;
const ALIGNMENT: usize = 4;
const NULL_STRING_LENGTH: i32 = -1;

fn align(len: usize) -> usize {
    len.div_ceil(ALIGNMENT) * ALIGNMENT
}

fn length_prefix(len: usize, what: &str) -> BrowserResult<i32> {
    i32::try_from(len).map_err(|_| {
        BrowserError::new(
            "page_state.string_too_large",
            format!("{what} of {len} bytes does not fit in a 32-bit length prefix"),
        )
    })
}

/// Append-only pickle builder.
#[derive(Debug, Default, Clone)]
pub struct PickleWriter {
    payload: Vec<u8>,
}

impl PickleWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_i32(&mut self, value: i32) {
        self.payload.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.payload.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.write_i32(i32::from(value));
    }

    /// Doubles travel as an 8-byte data blob holding the raw IEEE-754 bits.
    pub fn write_f64(&mut self, value: f64) {
        self.write_i32(8);
        self.write_padded(&value.to_le_bytes());
    }

    pub fn write_data(&mut self, data: &[u8]) -> BrowserResult<()> {
        let len = length_prefix(data.len(), "data blob")?;
        self.write_i32(len);
        self.write_padded(data);
        Ok(())
    }

    /// Writes an 8-bit string (URLs, blob UUIDs).
    pub fn write_std_string(&mut self, value: &str) -> BrowserResult<()> {
        self.write_data(value.as_bytes())
    }

    /// Writes a nullable UTF-16 string as a byte length (`-1` for null)
    /// followed by little-endian code units.
    pub fn write_string16(&mut self, value: Option<&str>) -> BrowserResult<()> {
        let Some(value) = value else {
            self.write_i32(NULL_STRING_LENGTH);
            return Ok(());
        };

        let mut bytes = Vec::with_capacity(value.len() * 2);
        for unit in value.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let len = length_prefix(bytes.len(), "UTF-16 string")?;
        self.write_i32(len);
        self.write_padded(&bytes);
        Ok(())
    }

    pub fn write_string16_vector(&mut self, values: &[Option<String>]) -> BrowserResult<()> {
        self.write_vector_size(values.len(), size_of::<Option<String>>())?;
        for value in values {
            self.write_string16(value.as_deref())?;
        }
        Ok(())
    }

    /// Writes an element count, refusing counts a reader would reject.
    pub fn write_vector_size(&mut self, len: usize, element_size: usize) -> BrowserResult<()> {
        let limit = (i32::MAX as usize) / element_size.max(1);
        if len >= limit {
            return Err(BrowserError::new(
                "page_state.vector_too_large",
                format!("vector of {len} elements exceeds the serializable limit ({limit})"),
            ));
        }
        self.write_i32(len as i32);
        Ok(())
    }

    /// Finishes the pickle, prefixing the payload-size header.
    pub fn into_bytes(self) -> BrowserResult<Vec<u8>> {
        let payload_len = u32::try_from(self.payload.len()).map_err(|_| {
            BrowserError::new(
                "page_state.payload_too_large",
                format!(
                    "pickle payload of {} bytes does not fit in the 32-bit header",
                    self.payload.len()
                ),
            )
        })?;

        let mut out = Vec::with_capacity(HEADER_BYTES + self.payload.len());
        out.extend_from_slice(&payload_len.to_le_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    fn write_padded(&mut self, data: &[u8]) {
        self.payload.extend_from_slice(data);
        let padding = align(data.len()) - data.len();
        self.payload.extend(std::iter::repeat_n(0_u8, padding));
    }
}

/// Fail-soft cursor over a pickle.
#[derive(Debug)]
pub struct PickleReader<'a> {
    payload: &'a [u8],
    offset: usize,
    parse_error: bool,
}

impl<'a> PickleReader<'a> {
    /// Wraps `data`; a missing or inconsistent header poisons the reader so the
    /// first read reports a parse error.
    pub fn new(data: &'a [u8]) -> Self {
        let header = data
            .get(..HEADER_BYTES)
            .map(|bytes| u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize);

        match header {
            Some(payload_len) if payload_len <= data.len() - HEADER_BYTES => Self {
                payload: &data[HEADER_BYTES..HEADER_BYTES + payload_len],
                offset: 0,
                parse_error: false,
            },
            _ => Self {
                payload: &[],
                offset: 0,
                parse_error: true,
            },
        }
    }

    pub fn has_error(&self) -> bool {
        self.parse_error
    }

    /// Records a parse error discovered by a caller (structural checks that
    /// sit above the primitive reads).
    pub fn set_error(&mut self) {
        self.parse_error = true;
    }

    pub fn remaining(&self) -> usize {
        self.payload.len().saturating_sub(self.offset)
    }

    pub fn read_i32(&mut self) -> i32 {
        match self.read_exact(4) {
            Some(bytes) => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            None => 0,
        }
    }

    pub fn read_i64(&mut self) -> i64 {
        match self.read_exact(8) {
            Some(bytes) => i64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]),
            None => 0,
        }
    }

    pub fn read_bool(&mut self) -> bool {
        self.read_i32() != 0
    }

    pub fn read_f64(&mut self) -> f64 {
        let data = self.read_data();
        if self.parse_error {
            return 0.0;
        }

        match <[u8; 8]>::try_from(data) {
            Ok(bytes) => f64::from_le_bytes(bytes),
            Err(_) => {
                self.parse_error = true;
                0.0
            }
        }
    }

    pub fn read_data(&mut self) -> &'a [u8] {
        let len = self.read_i32();
        if self.parse_error {
            return &[];
        }

        let Ok(len) = usize::try_from(len) else {
            self.parse_error = true;
            return &[];
        };
        self.read_exact(len).unwrap_or_default()
    }

    pub fn read_std_string(&mut self) -> String {
        String::from_utf8_lossy(self.read_data()).into_owned()
    }

    /// Reads a nullable UTF-16 string. `-1` is null; any other negative
    /// length is malformed. An odd trailing byte is ignored.
    pub fn read_string16(&mut self) -> Option<String> {
        let len = self.read_i32();
        if self.parse_error {
            return None;
        }

        if len == NULL_STRING_LENGTH {
            return None;
        }
        let Ok(len) = usize::try_from(len) else {
            self.parse_error = true;
            return None;
        };

        let bytes = self.read_exact(len)?;
        let even = bytes.len() - bytes.len() % 2;
        let (text, _) = encoding_rs::UTF_16LE.decode_without_bom_handling(&bytes[..even]);
        Some(text.into_owned())
    }

    pub fn read_string16_vector(&mut self) -> Vec<Option<String>> {
        let count = self.read_vector_size(size_of::<Option<String>>());
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.read_string16());
            if self.parse_error {
                break;
            }
        }
        values
    }

    /// Reads an element count and rejects counts that would overflow an
    /// allocation of `element_size`-byte elements, or that the buffer cannot
    /// plausibly hold.
    pub fn read_vector_size(&mut self, element_size: usize) -> usize {
        let raw = self.read_i32();
        if self.parse_error {
            return 0;
        }

        let Ok(count) = usize::try_from(raw) else {
            self.parse_error = true;
            return 0;
        };

        if (i32::MAX as usize) / element_size.max(1) <= count {
            self.parse_error = true;
            return 0;
        }

        if self.payload.len() <= count {
            self.parse_error = true;
            return 0;
        }

        count
    }

    fn read_exact(&mut self, len: usize) -> Option<&'a [u8]> {
        if self.parse_error {
            return None;
        }

        let end = self.offset.saturating_add(len);
        if end > self.payload.len() {
            self.parse_error = true;
            return None;
        }

        let out = &self.payload[self.offset..end];
        self.offset = self.offset.saturating_add(align(len)).min(self.payload.len());
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::PickleReader;
    use super::PickleWriter;

    fn finish(writer: PickleWriter) -> Vec<u8> {
        writer.into_bytes().unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn header_records_payload_size() {
        let mut writer = PickleWriter::new();
        writer.write_i32(7);
        writer.write_i64(-3);
        let bytes = finish(writer);
        assert_eq!(&bytes[..4], &12_u32.to_le_bytes());
        assert_eq!(bytes.len(), 16);
    }

    #[test]
    fn fields_are_padded_to_four_bytes() {
        let mut writer = PickleWriter::new();
        assert!(writer.write_data(b"abc").is_ok());
        writer.write_i32(9);
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes);
        assert_eq!(reader.read_data(), b"abc");
        assert_eq!(reader.read_i32(), 9);
        assert!(!reader.has_error());
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn null_and_empty_strings_stay_distinct() {
        let mut writer = PickleWriter::new();
        assert!(writer.write_string16(None).is_ok());
        assert!(writer.write_string16(Some("")).is_ok());
        assert!(writer.write_string16(Some("h\u{e9}llo \u{1f600}")).is_ok());
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes);
        assert_eq!(reader.read_string16(), None);
        assert_eq!(reader.read_string16(), Some(String::new()));
        assert_eq!(reader.read_string16(), Some("h\u{e9}llo \u{1f600}".to_owned()));
        assert!(!reader.has_error());
    }

    #[test]
    fn string16_length_counts_bytes() {
        let mut writer = PickleWriter::new();
        assert!(writer.write_string16(Some("ab")).is_ok());
        let bytes = finish(writer);
        assert_eq!(&bytes[4..8], &4_i32.to_le_bytes());
        assert_eq!(&bytes[8..12], &[b'a', 0, b'b', 0]);
    }

    #[test]
    fn doubles_keep_their_bits() {
        let mut writer = PickleWriter::new();
        writer.write_f64(-0.0);
        writer.write_f64(1.0e-300);
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes);
        assert_eq!(reader.read_f64().to_bits(), (-0.0_f64).to_bits());
        assert_eq!(reader.read_f64(), 1.0e-300);
        assert!(!reader.has_error());
    }

    #[test]
    fn negative_string_length_other_than_null_is_an_error() {
        let mut writer = PickleWriter::new();
        writer.write_i32(-2);
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes);
        assert_eq!(reader.read_string16(), None);
        assert!(reader.has_error());
    }

    #[test]
    fn errors_are_sticky_and_reads_return_defaults() {
        let mut writer = PickleWriter::new();
        writer.write_i32(1);
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes);
        assert_eq!(reader.read_i32(), 1);
        assert_eq!(reader.read_i64(), 0);
        assert!(reader.has_error());
        assert!(!reader.read_bool());
        assert_eq!(reader.read_std_string(), "");
        assert!(reader.has_error());
    }

    #[test]
    fn truncated_header_poisons_reader() {
        let mut writer = PickleWriter::new();
        writer.write_i32(5);
        writer.write_i32(6);
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes[..bytes.len() - 1]);
        assert_eq!(reader.read_i32(), 0);
        assert!(reader.has_error());

        let mut reader = PickleReader::new(&bytes[..2]);
        assert_eq!(reader.read_i32(), 0);
        assert!(reader.has_error());
    }

    #[test]
    fn vector_size_rejects_overflowing_counts() {
        let mut writer = PickleWriter::new();
        writer.write_i32(0x7fff_ffff);
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes);
        assert_eq!(reader.read_vector_size(24), 0);
        assert!(reader.has_error());
    }

    #[test]
    fn vector_size_rejects_counts_larger_than_payload() {
        let mut writer = PickleWriter::new();
        writer.write_i32(64);
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes);
        assert_eq!(reader.read_vector_size(1), 0);
        assert!(reader.has_error());
    }

    #[test]
    fn vector_size_rejects_negative_counts() {
        let mut writer = PickleWriter::new();
        writer.write_i32(-5);
        let bytes = finish(writer);

        let mut reader = PickleReader::new(&bytes);
        assert_eq!(reader.read_vector_size(1), 0);
        assert!(reader.has_error());
    }

    #[test]
    fn writer_refuses_oversized_vectors() {
        let mut writer = PickleWriter::new();
        let written = writer.write_vector_size(usize::MAX / 2, 8);
        assert!(written.is_err());
        if let Err(error) = written {
            assert_eq!(error.code, "page_state.vector_too_large");
        }
    }
}
