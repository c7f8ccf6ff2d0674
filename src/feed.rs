use std::time::Duration;

use parking_lot::Mutex;
use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, USER_AGENT};
use tracing::{debug, warn};
use url::Url;

use crate::cursor::{Anchor, Cursor, CursorError, CursorRules};
use crate::model::{DecodeError, Page};

pub const DEFAULT_BASE_URL: &str =
    "https://agile-river-75797.herokuapp.com/crawl.json?spider_name=ninegag&start_requests=true";
pub const DEFAULT_CURSOR_SUFFIX: &str =
    "&url=https://9gag.com/v1/group-posts/group/default/type/hot?after=";

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub cursor_suffix: Option<String>,
    pub rules: CursorRules,
    /// Request timeout; `None` keeps the transport's default.
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed: transport: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("feed: upstream returned status {status}")]
    Upstream { status: u16 },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Cursor(#[from] CursorError),
    #[error("feed: page numbers start at 1, got {0}")]
    InvalidPage(u32),
    #[error("feed: page {requested} requested before any page was fetched")]
    NoPreviousPage { requested: u32 },
    #[error("feed: invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("feed: {0}")]
    Config(&'static str),
}

/// What the last successful decode left behind for the next cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AnchorState {
    #[default]
    NotFetched,
    /// The last page was too short to anchor a cursor.
    Exhausted { len: usize },
    Ready(Anchor),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationState {
    pub offset: u64,
    pub anchor: AnchorState,
    pub last_page: Option<u32>,
}

impl PaginationState {
    pub fn has_more(&self) -> bool {
        matches!(self.anchor, AnchorState::Ready(_))
    }
}

/// Blocking client for the crawler proxy.
///
/// Pagination state lives inside the client and is only replaced after a
/// page has been fetched and fully decoded. The state lock is held for the
/// whole of [`Client::fetch_page`], so concurrent callers take turns.
pub struct Client {
    http: HttpClient,
    user_agent: String,
    base_url: String,
    cursor_suffix: String,
    rules: CursorRules,
    state: Mutex<PaginationState>,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, FeedError> {
        if config.user_agent.trim().is_empty() {
            return Err(FeedError::Config("user agent required"));
        }
        if config.rules.offset_step == 0 {
            return Err(FeedError::Config("cursor offset step must be positive"));
        }
        let base_url = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Url::parse(&base_url)?;

        let http = match config.http_client {
            Some(client) => client,
            None => {
                let mut builder = HttpClient::builder();
                if let Some(timeout) = config.timeout {
                    builder = builder.timeout(timeout);
                }
                builder.build()?
            }
        };

        Ok(Client {
            http,
            user_agent: config.user_agent,
            base_url,
            cursor_suffix: config
                .cursor_suffix
                .unwrap_or_else(|| DEFAULT_CURSOR_SUFFIX.to_string()),
            rules: config.rules,
            state: Mutex::new(PaginationState::default()),
        })
    }

    pub fn state(&self) -> PaginationState {
        self.state.lock().clone()
    }

    pub fn has_more(&self) -> bool {
        self.state.lock().has_more()
    }

    pub fn fetch_page(&self, page_number: u32) -> Result<Page, FeedError> {
        let mut state = self.state.lock();

        let cursor = match page_number {
            0 => return Err(FeedError::InvalidPage(page_number)),
            1 => None,
            requested => Some(self.next_cursor(&state, requested)?),
        };
        let url = match &cursor {
            Some(cursor) => format!("{}{}{}", self.base_url, self.cursor_suffix, cursor.fragment),
            None => self.base_url.clone(),
        };

        debug!(page = page_number, url = %url, "fetching feed page");
        let page = self.get_page(&url)?;

        let anchor = match page.anchor() {
            Ok(anchor) => AnchorState::Ready(anchor),
            Err(CursorError::InsufficientPageSize { len }) => AnchorState::Exhausted { len },
            Err(CursorError::MissingAnchorId { index }) => {
                warn!(page = page_number, index, "feed page item without id");
                return Err(DecodeError::MissingAnchorId { index }.into());
            }
        };

        if let Some(cursor) = cursor {
            state.offset = cursor.next_offset;
        }
        state.anchor = anchor;
        state.last_page = Some(page_number);

        debug!(
            page = page_number,
            items = page.items.len(),
            offset = state.offset,
            has_more = state.has_more(),
            "decoded feed page"
        );
        Ok(page)
    }

    fn next_cursor(&self, state: &PaginationState, requested: u32) -> Result<Cursor, FeedError> {
        match &state.anchor {
            AnchorState::NotFetched => Err(FeedError::NoPreviousPage { requested }),
            AnchorState::Exhausted { len } => {
                Err(CursorError::InsufficientPageSize { len: *len }.into())
            }
            AnchorState::Ready(anchor) => Ok(anchor.cursor(state.offset, &self.rules)),
        }
    }

    fn get_page(&self, url: &str) -> Result<Page, FeedError> {
        let resp = self
            .http
            .get(url)
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), url = %url, "upstream rejected feed request");
            return Err(FeedError::Upstream {
                status: status.as_u16(),
            });
        }

        let body = resp.bytes()?;
        Page::from_slice(&body).map_err(|err| {
            warn!(error = %err, bytes = body.len(), "failed to decode feed page");
            err.into()
        })
    }
}
