//! Session-history page state: the versioned binary encoding of a page's
//! frame tree, form state, scroll positions and submitted HTTP bodies.
//!
//! Versions 11 through 25 use the legacy pickle layout, version 26 a CBOR
//! schema message, and version `-1` holds only a URL.

mod codec;
mod exploded;
mod legacy_body;
mod legacy_frame;
mod options;
mod page_state;
mod pickle;
mod referenced_files;
mod request_body;
mod schema;
mod url_spec;

pub mod unique_name;
pub mod version;

pub use codec::DecodedPageState;
pub use codec::decode_page_state;
pub use codec::decode_page_state_with_options;
pub use codec::decode_resource_request_body;
pub use codec::encode_page_state;
pub use codec::encode_page_state_for_version;
pub use codec::encode_resource_request_body;
pub use exploded::ExplodedFrameState;
pub use exploded::ExplodedHttpBody;
pub use exploded::ExplodedPageState;
pub use exploded::MAX_FRAME_TREE_DEPTH;
pub use exploded::ReferrerPolicy;
pub use exploded::ScrollRestorationType;
pub use options::DEFAULT_DEVICE_SCALE_FACTOR;
pub use options::DecodeOptions;
pub use page_state::PageState;
pub use pickle::PickleReader;
pub use pickle::PickleWriter;
pub use request_body::BodyElement;
pub use request_body::ResourceRequestBody;
