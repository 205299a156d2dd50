//! Submitted HTTP request bodies as restored from history.

/// One chunk of a request body. Element order is replay order.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyElement {
    Bytes(Vec<u8>),
    File {
        path: String,
        offset: u64,
        length: u64,
        /// Seconds since the Unix epoch; `0.0` means "do not check".
        expected_modification_time: f64,
    },
    FileSystem {
        url: String,
        offset: u64,
        length: u64,
        expected_modification_time: f64,
    },
    Blob {
        uuid: String,
    },
}

impl BodyElement {
    /// Wire discriminant used by the legacy pickle layout.
    pub fn legacy_type_tag(&self) -> i32 {
        match self {
            Self::Bytes(_) => 0,
            Self::File { .. } => 1,
            Self::FileSystem { .. } => 2,
            Self::Blob { .. } => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bytes(_) => "bytes",
            Self::File { .. } => "file",
            Self::FileSystem { .. } => "filesystem-url",
            Self::Blob { .. } => "blob",
        }
    }
}

/// Ordered request body plus the identifier the network layer assigned to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRequestBody {
    pub elements: Vec<BodyElement>,
    pub identifier: i64,
    /// Only carried by the standalone body codec, never by page states.
    pub contains_sensitive_info: bool,
}

impl ResourceRequestBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_bytes(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.elements.push(BodyElement::Bytes(bytes.to_vec()));
    }

    pub fn append_file_range(
        &mut self,
        path: impl Into<String>,
        offset: u64,
        length: u64,
        expected_modification_time: f64,
    ) {
        self.elements.push(BodyElement::File {
            path: path.into(),
            offset,
            length,
            expected_modification_time,
        });
    }

    pub fn append_file_system_range(
        &mut self,
        url: impl Into<String>,
        offset: u64,
        length: u64,
        expected_modification_time: f64,
    ) {
        self.elements.push(BodyElement::FileSystem {
            url: url.into(),
            offset,
            length,
            expected_modification_time,
        });
    }

    pub fn append_blob(&mut self, uuid: impl Into<String>) {
        self.elements.push(BodyElement::Blob { uuid: uuid.into() });
    }

    /// Paths of local files the body uploads, in element order.
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|element| match element {
            BodyElement::File { path, .. } => Some(path.as_str()),
            _ => None,
        })
    }
}
