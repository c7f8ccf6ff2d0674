use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::feed;
use crate::model::{Item, Page};

/// One rendered page's worth of data for the front end.
#[derive(Debug, Clone)]
pub struct PageView {
    pub number: u32,
    pub page: Page,
    pub has_more: bool,
    pub published: Option<String>,
}

impl PageView {
    pub fn new(number: u32, page: Page) -> Self {
        Self {
            number,
            has_more: page.has_more(),
            published: page.display_date(),
            page,
        }
    }
}

pub trait FeedService: Send + Sync {
    fn first_page(&self) -> Result<PageView>;
    fn next_page(&self) -> Result<PageView>;
}

/// Walks the feed forward one page per `next_page` call.
///
/// The page counter stays locked for the whole fetch, so concurrent callers
/// each get their own page number.
pub struct NineGagFeedService {
    client: Arc<feed::Client>,
    current: Mutex<u32>,
}

impl NineGagFeedService {
    pub fn new(client: Arc<feed::Client>) -> Self {
        Self {
            client,
            current: Mutex::new(0),
        }
    }

    fn load(&self, current: &mut u32, number: u32) -> Result<PageView> {
        let page = self
            .client
            .fetch_page(number)
            .with_context(|| format!("fetch feed page {number}"))?;
        *current = number;
        Ok(PageView::new(number, page))
    }
}

impl FeedService for NineGagFeedService {
    fn first_page(&self) -> Result<PageView> {
        let mut current = self.current.lock();
        self.load(&mut current, 1)
    }

    fn next_page(&self) -> Result<PageView> {
        let mut current = self.current.lock();
        let next = *current + 1;
        self.load(&mut current, next)
    }
}

#[derive(Default)]
pub struct MockFeedService {
    served: Mutex<u32>,
}

impl FeedService for MockFeedService {
    fn first_page(&self) -> Result<PageView> {
        *self.served.lock() = 1;
        Ok(PageView::new(1, mock_page(1)))
    }

    fn next_page(&self) -> Result<PageView> {
        let mut served = self.served.lock();
        *served += 1;
        Ok(PageView::new(*served, mock_page(*served)))
    }
}

fn mock_page(number: u32) -> Page {
    Page {
        status: "ok".into(),
        items: (1..=3u32)
            .map(|n| Item {
                id: format!("mock{number}x{n}"),
                title: Some(format!("Sample post {n} on page {number}")),
                kind: Some("Photo".into()),
                creation_ts: Some(1_571_500_000),
                up_vote: Some(100 * i64::from(n)),
                down_vote: Some(i64::from(n)),
                ..Item::default()
            })
            .collect(),
        ..Page::default()
    }
}
