//! Opaque encoded page state, as stored by session history.

use crate::codec::decode_page_state;
use crate::codec::encode_page_state;
use crate::exploded::ExplodedFrameState;
use crate::exploded::ExplodedHttpBody;
use crate::exploded::ExplodedPageState;
use crate::exploded::ReferrerPolicy;
use pd_core::BrowserResult;
use pd_core::Point;
use pd_core::PointF;

/// Encoded bytes of one history entry. Editing operations decode, change and
/// re-encode in the current format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PageState {
    data: Vec<u8>,
}

impl PageState {
    pub fn create_from_url(url: impl Into<String>) -> BrowserResult<Self> {
        Self::from_exploded(&ExplodedPageState::from_url(url))
    }

    /// Wraps bytes without checking them.
    pub fn create_from_encoded_data(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn from_exploded(state: &ExplodedPageState) -> BrowserResult<Self> {
        Ok(Self {
            data: encode_page_state(state)?,
        })
    }

    /// True when there is anything to restore.
    pub fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn to_encoded_data(&self) -> &[u8] {
        &self.data
    }

    pub fn explode(&self) -> BrowserResult<ExplodedPageState> {
        decode_page_state(&self.data)
    }

    pub fn referenced_files(&self) -> BrowserResult<Vec<Option<String>>> {
        Ok(self.explode()?.referenced_files)
    }

    /// Drops the main frame's HTTP body when it carried password fields.
    pub fn remove_password_data(&self) -> BrowserResult<Self> {
        self.edit(|state| {
            if state.top.http_body.contains_passwords {
                state.top.http_body = ExplodedHttpBody::default();
            }
        })
    }

    pub fn remove_scroll_offset(&self) -> BrowserResult<Self> {
        self.edit(|state| {
            state.top.walk_mut(&mut |frame: &mut ExplodedFrameState| {
                frame.scroll_offset = Point::default();
                frame.visual_viewport_scroll_offset = PointF::default();
            });
        })
    }

    pub fn remove_referrer(&self) -> BrowserResult<Self> {
        if self.data.is_empty() {
            return Ok(self.clone());
        }
        self.edit(|state| {
            state.top.walk_mut(&mut |frame: &mut ExplodedFrameState| {
                frame.referrer = None;
                frame.referrer_policy = ReferrerPolicy::Default;
            });
        })
    }

    fn edit(&self, change: impl FnOnce(&mut ExplodedPageState)) -> BrowserResult<Self> {
        let mut state = self.explode()?;
        change(&mut state);
        Self::from_exploded(&state)
    }
}
