//! In-memory ("exploded") page state: the tree a decoder builds and an
//! encoder consumes.

use crate::request_body::ResourceRequestBody;
use pd_core::BrowserError;
use pd_core::BrowserResult;
use pd_core::Point;
use pd_core::PointF;

/// Deepest frame nesting the codec accepts; the top frame is depth 0. Both
/// decoders recurse once per level, so this also bounds their stack use.
pub const MAX_FRAME_TREE_DEPTH: usize = 64;

/// History scroll restoration mode (`history.scrollRestoration`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScrollRestorationType {
    #[default]
    Auto,
    Manual,
}

impl ScrollRestorationType {
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Auto => 0,
            Self::Manual => 1,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Auto),
            1 => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Referrer policy in effect when the entry was committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferrerPolicy {
    Always,
    #[default]
    Default,
    NoReferrerWhenDowngrade,
    Never,
    Origin,
    OriginWhenCrossOrigin,
    NoReferrerWhenDowngradeOriginWhenCrossOrigin,
    SameOrigin,
    StrictOrigin,
}

impl ReferrerPolicy {
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Always => 0,
            Self::Default => 1,
            Self::NoReferrerWhenDowngrade => 2,
            Self::Never => 3,
            Self::Origin => 4,
            Self::OriginWhenCrossOrigin => 5,
            Self::NoReferrerWhenDowngradeOriginWhenCrossOrigin => 6,
            Self::SameOrigin => 7,
            Self::StrictOrigin => 8,
        }
    }

    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(Self::Always),
            1 => Some(Self::Default),
            2 => Some(Self::NoReferrerWhenDowngrade),
            3 => Some(Self::Never),
            4 => Some(Self::Origin),
            5 => Some(Self::OriginWhenCrossOrigin),
            6 => Some(Self::NoReferrerWhenDowngradeOriginWhenCrossOrigin),
            7 => Some(Self::SameOrigin),
            8 => Some(Self::StrictOrigin),
            _ => None,
        }
    }
}

/// HTTP body submitted by a frame's navigation, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplodedHttpBody {
    pub http_content_type: Option<String>,
    /// `None` means no body was submitted.
    pub request_body: Option<ResourceRequestBody>,
    pub contains_passwords: bool,
}

/// One frame of the navigation tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplodedFrameState {
    pub url_string: Option<String>,
    pub referrer: Option<String>,
    /// Unique name of the frame.
    pub target: Option<String>,
    /// Serialized `history.pushState` payload.
    pub state_object: Option<String>,
    /// Form-control state, serialized by the renderer.
    pub document_state: Vec<Option<String>>,
    pub scroll_restoration_type: ScrollRestorationType,
    pub did_save_scroll_or_scale_state: bool,
    pub scroll_offset: Point,
    pub visual_viewport_scroll_offset: PointF,
    pub item_sequence_number: i64,
    pub document_sequence_number: i64,
    pub page_scale_factor: f64,
    pub referrer_policy: ReferrerPolicy,
    pub http_body: ExplodedHttpBody,
    pub children: Vec<ExplodedFrameState>,
}

impl Default for ExplodedFrameState {
    fn default() -> Self {
        Self {
            url_string: None,
            referrer: None,
            target: None,
            state_object: None,
            document_state: Vec::new(),
            scroll_restoration_type: ScrollRestorationType::Auto,
            did_save_scroll_or_scale_state: true,
            scroll_offset: Point::default(),
            visual_viewport_scroll_offset: PointF::default(),
            item_sequence_number: 0,
            document_sequence_number: 0,
            page_scale_factor: 0.0,
            referrer_policy: ReferrerPolicy::Default,
            http_body: ExplodedHttpBody::default(),
            children: Vec::new(),
        }
    }
}

impl ExplodedFrameState {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url_string: Some(url.into()),
            ..Self::default()
        }
    }

    /// Visits this frame and every descendant, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ExplodedFrameState)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut ExplodedFrameState)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }

    /// True when some descendant sits more than `limit` levels below this
    /// frame. Recursion stops at `limit`.
    pub fn deeper_than(&self, limit: usize) -> bool {
        match limit.checked_sub(1) {
            None => !self.children.is_empty(),
            Some(rest) => self.children.iter().any(|child| child.deeper_than(rest)),
        }
    }
}

/// Root of a decoded page state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplodedPageState {
    /// Local files referenced by forms or uploads, consecutive duplicates
    /// collapsed.
    pub referenced_files: Vec<Option<String>>,
    pub top: ExplodedFrameState,
}

impl ExplodedPageState {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            referenced_files: Vec::new(),
            top: ExplodedFrameState::with_url(url),
        }
    }

    /// Rejects frame trees the decoders would refuse to read back.
    pub(crate) fn check_depth(&self) -> BrowserResult<()> {
        if self.top.deeper_than(MAX_FRAME_TREE_DEPTH) {
            return Err(BrowserError::new(
                "page_state.tree_too_deep",
                format!("frame tree is nested deeper than {MAX_FRAME_TREE_DEPTH} levels"),
            ));
        }
        Ok(())
    }
}
