//! Next-page cursor derivation.
//!
//! The proxy forwards `after=` to 9GAG's group-posts endpoint, which wants the
//! trailing three post ids of the current page (newest position first) plus
//! a running count `c`. The ids sit inside the proxy's own `url=` parameter,
//! so the separators must reach it already encoded as `%2C`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::model::{Item, Page};

pub const ANCHOR_LEN: usize = 3;
pub const DEFAULT_OFFSET_STEP: u64 = 40;

const ID_SEPARATOR: &str = "%2C";
const ID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("cursor: page has {len} items, at least 3 are needed to continue")]
    InsufficientPageSize { len: usize },
    #[error("cursor: item at position {index} has no id")]
    MissingAnchorId { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum CursorOrder {
    /// Last item first, then second-to-last, then third-to-last.
    #[default]
    NewestFirst,
    /// Trailing ids in the order the page listed them.
    ResponseOrder,
}

impl CursorOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            CursorOrder::NewestFirst => "newest_first",
            CursorOrder::ResponseOrder => "response_order",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim() {
            "newest_first" => Some(CursorOrder::NewestFirst),
            "response_order" => Some(CursorOrder::ResponseOrder),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRules {
    pub order: CursorOrder,
    pub offset_step: u64,
}

impl Default for CursorRules {
    fn default() -> Self {
        Self {
            order: CursorOrder::default(),
            offset_step: DEFAULT_OFFSET_STEP,
        }
    }
}

/// Trailing item ids of a decoded page, in response order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    ids: [String; ANCHOR_LEN],
}

impl Anchor {
    pub fn from_items(items: &[Item]) -> Result<Self, CursorError> {
        let len = items.len();
        if len < ANCHOR_LEN {
            return Err(CursorError::InsufficientPageSize { len });
        }
        let start = len - ANCHOR_LEN;
        let tail = &items[start..];
        if let Some(pos) = tail.iter().position(|item| item.id.trim().is_empty()) {
            return Err(CursorError::MissingAnchorId { index: start + pos });
        }
        Ok(Anchor {
            ids: [tail[0].id.clone(), tail[1].id.clone(), tail[2].id.clone()],
        })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn cursor(&self, offset: u64, rules: &CursorRules) -> Cursor {
        let next_offset = offset.saturating_add(rules.offset_step);
        let ordered: Vec<&String> = match rules.order {
            CursorOrder::NewestFirst => self.ids.iter().rev().collect(),
            CursorOrder::ResponseOrder => self.ids.iter().collect(),
        };
        let ids = ordered
            .into_iter()
            .map(|id| utf8_percent_encode(id, ID_ENCODE_SET).to_string())
            .collect::<Vec<_>>()
            .join(ID_SEPARATOR);
        Cursor {
            fragment: format!("{ids}&c={next_offset}"),
            next_offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Appended verbatim after the `after=` parameter.
    pub fragment: String,
    /// Offset to persist once the page fetched with this cursor decodes.
    pub next_offset: u64,
}

pub fn build_cursor(page: &Page, offset: u64) -> Result<Cursor, CursorError> {
    build_cursor_with(page, offset, &CursorRules::default())
}

pub fn build_cursor_with(
    page: &Page,
    offset: u64,
    rules: &CursorRules,
) -> Result<Cursor, CursorError> {
    Ok(Anchor::from_items(&page.items)?.cursor(offset, rules))
}
