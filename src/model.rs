use std::collections::BTreeMap;

use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cursor::{Anchor, CursorError};
use crate::lenient;

/// `date(1)`-style layout used for the page's publish date.
///
/// chrono's `Local` has no zone abbreviation, so `%Z` prints the UTC offset
/// (`+00:00`) instead of a name like `UTC`.
pub const DISPLAY_DATE_FORMAT: &str = "%a %b %e %H:%M:%S %Z %Y";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("decode: malformed page: {0}")]
    Json(#[from] serde_json::Error),
    #[error("decode: item at position {index} has no id and cannot anchor the next cursor")]
    MissingAnchorId { index: usize },
}

/// One decoded response from the crawler proxy.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Page {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub items: Vec<Item>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub items_dropped: Vec<Value>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub stats: Stats,
    #[serde(default)]
    pub spider_name: Option<String>,
}

impl Page {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Whether a cursor for the following page can be taken from this one.
    pub fn has_more(&self) -> bool {
        Anchor::from_items(&self.items).is_ok()
    }

    pub fn anchor(&self) -> Result<Anchor, CursorError> {
        Anchor::from_items(&self.items)
    }

    /// Creation time of the first item, rendered in the local time zone.
    pub fn display_date(&self) -> Option<String> {
        let ts = self.items.first()?.creation_ts?;
        let date = Local.timestamp_opt(ts, 0).single()?;
        Some(date.format(DISPLAY_DATE_FORMAT).to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Item {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default)]
    pub src_alias: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, rename = "creationTs", deserialize_with = "lenient::opt_int")]
    pub creation_ts: Option<i64>,
    #[serde(default, rename = "upVote", deserialize_with = "lenient::opt_int")]
    pub up_vote: Option<i64>,
    #[serde(default, rename = "downVote", deserialize_with = "lenient::opt_int")]
    pub down_vote: Option<i64>,
    #[serde(default, rename = "urls_resource", deserialize_with = "lenient::null_default")]
    pub media: Media,
    #[serde(default)]
    pub raw: Option<RawPost>,
}

impl Item {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or_else(|| self.raw.as_ref().map(|raw| raw.title.as_str()))
            .unwrap_or_default()
    }

    /// Media from `urls_resource`, falling back to the raw record's `images`.
    pub fn best_media(&self) -> &Media {
        match &self.raw {
            Some(raw) if self.media.is_empty() => &raw.images,
            _ => &self.media,
        }
    }

    pub fn score(&self) -> i64 {
        self.up_vote.unwrap_or(0) - self.down_vote.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Media {
    #[serde(default, rename = "image700")]
    pub large: Option<ImageVariant>,
    #[serde(default, rename = "image460")]
    pub medium: Option<ImageVariant>,
    #[serde(default, rename = "imageFbThumbnail")]
    pub thumbnail: Option<ImageVariant>,
    #[serde(default, rename = "image460sv")]
    pub video: Option<VideoVariant>,
}

impl Media {
    pub fn is_empty(&self) -> bool {
        self.large.is_none()
            && self.medium.is_none()
            && self.thumbnail.is_none()
            && self.video.is_none()
    }

    /// Still image to show in a listing, largest first after `medium`.
    pub fn preview_image(&self) -> Option<&ImageVariant> {
        self.medium
            .as_ref()
            .or(self.large.as_ref())
            .or(self.thumbnail.as_ref())
            .filter(|image| !image.url.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ImageVariant {
    #[serde(default, deserialize_with = "lenient::int")]
    pub width: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub height: i64,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub url: String,
    #[serde(default, rename = "webpUrl")]
    pub webp_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct VideoVariant {
    #[serde(default, deserialize_with = "lenient::int")]
    pub width: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub height: i64,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub url: String,
    #[serde(default, rename = "hasAudio", deserialize_with = "lenient::int")]
    pub has_audio: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub duration: i64,
    #[serde(default, rename = "vp8Url")]
    pub vp8_url: Option<String>,
    #[serde(default, rename = "h265Url")]
    pub h265_url: Option<String>,
    #[serde(default, rename = "av1Url")]
    pub av1_url: Option<String>,
}

impl VideoVariant {
    /// Primary URL if present, otherwise the first alternate codec.
    pub fn playback_url(&self) -> Option<&str> {
        [
            Some(self.url.as_str()),
            self.vp8_url.as_deref(),
            self.h265_url.as_deref(),
            self.av1_url.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|url| !url.is_empty())
    }
}

/// Richer duplicate of an item; only present on some items.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RawPost {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub description: String,
    #[serde(default, rename = "type", deserialize_with = "lenient::null_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub nsfw: i64,
    #[serde(default, rename = "upVoteCount", deserialize_with = "lenient::int")]
    pub up_vote_count: i64,
    #[serde(default, rename = "downVoteCount", deserialize_with = "lenient::int")]
    pub down_vote_count: i64,
    #[serde(default, rename = "creationTs", deserialize_with = "lenient::int")]
    pub creation_ts: i64,
    #[serde(default, deserialize_with = "lenient::int")]
    pub promoted: i64,
    #[serde(default, rename = "isVoteMasked", deserialize_with = "lenient::int")]
    pub is_vote_masked: i64,
    #[serde(default, rename = "hasLongPostCover", deserialize_with = "lenient::int")]
    pub has_long_post_cover: i64,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub images: Media,
    #[serde(default, rename = "sourceDomain", deserialize_with = "lenient::null_default")]
    pub source_domain: String,
    #[serde(default, rename = "sourceUrl", deserialize_with = "lenient::null_default")]
    pub source_url: String,
    #[serde(default, rename = "commentsCount", deserialize_with = "lenient::int")]
    pub comments_count: i64,
    #[serde(default, rename = "postSection")]
    pub post_section: Option<PostSection>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub tags: Vec<Value>,
}

impl RawPost {
    pub fn is_nsfw(&self) -> bool {
        self.nsfw != 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PostSection {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub url: String,
    #[serde(default, rename = "imageUrl", deserialize_with = "lenient::null_default")]
    pub image_url: String,
    #[serde(default, rename = "webpUrl", deserialize_with = "lenient::null_default")]
    pub webp_url: String,
}

/// Crawl statistics, kept verbatim. Keys are the crawler's slash-separated
/// counter names, e.g. `downloader/request_count`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(transparent)]
pub struct Stats(pub BTreeMap<String, Value>);

impl Stats {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Counter value, accepting numeric strings.
    pub fn counter(&self, key: &str) -> Option<i64> {
        self.0
            .get(key)
            .and_then(|value| lenient::opt_int(value).ok().flatten())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn item_scraped_count(&self) -> Option<i64> {
        self.counter("item_scraped_count")
    }

    pub fn request_count(&self) -> Option<i64> {
        self.counter("downloader/request_count")
    }

    pub fn response_count(&self) -> Option<i64> {
        self.counter("downloader/response_count")
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.text("finish_reason")
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "status": "ok",
        "spider_name": "ninegag",
        "items": [
            {
                "src_alias": "hot",
                "id": "aYb6Ld1",
                "url": "https://9gag.com/gag/aYb6Ld1",
                "title": "When the build finally passes",
                "type": "Photo",
                "creationTs": 1571500000,
                "upVote": 1520,
                "downVote": "31",
                "urls_resource": {
                    "image700": {"width": 700, "height": 525, "url": "https://img/700.jpg"},
                    "image460": {"width": 460, "height": "345", "url": "https://img/460.jpg", "webpUrl": "https://img/460.webp"},
                    "imageFbThumbnail": {"width": 220, "height": 220, "url": "https://img/fb.jpg"}
                },
                "raw": {
                    "id": "aYb6Ld1",
                    "title": "When the build finally passes",
                    "description": "",
                    "nsfw": "0",
                    "upVoteCount": 1520,
                    "downVoteCount": 31,
                    "commentsCount": "88",
                    "sourceDomain": "",
                    "postSection": {"name": "Funny", "url": "https://9gag.com/funny"},
                    "tags": [{"key": "build", "url": "/tag/build"}, "ci", 3, null],
                    "someNewField": {"nested": true}
                }
            },
            {
                "id": "bQ9x2Kp",
                "title": "Clip",
                "type": "Animated",
                "upVote": 12,
                "urls_resource": {
                    "image460sv": {
                        "width": 460, "height": 258, "url": "",
                        "hasAudio": 1, "duration": "14",
                        "vp8Url": "https://img/460sv.webm", "h265Url": "https://img/460svh265.mp4"
                    }
                }
            }
        ],
        "items_dropped": [{"reason": "duplicate"}],
        "stats": {
            "downloader/request_count": 3,
            "downloader/response_count": "3",
            "item_scraped_count": 10,
            "finish_reason": "finished",
            "start_time": "2019-10-19 15:46:40"
        }
    }"#;

    #[test]
    fn decodes_full_page() {
        let page = Page::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(page.status, "ok");
        assert_eq!(page.spider_name.as_deref(), Some("ninegag"));
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items_dropped.len(), 1);

        let first = &page.items[0];
        assert_eq!(first.id, "aYb6Ld1");
        assert_eq!(first.kind.as_deref(), Some("Photo"));
        assert_eq!(first.down_vote, Some(31));
        assert_eq!(first.score(), 1489);
        let medium = first.media.medium.as_ref().unwrap();
        assert_eq!(medium.height, 345);
        assert_eq!(medium.webp_url.as_deref(), Some("https://img/460.webp"));

        let raw = first.raw.as_ref().unwrap();
        assert_eq!(raw.comments_count, 88);
        assert!(!raw.is_nsfw());
        assert_eq!(raw.tags.len(), 4);
        assert_eq!(raw.post_section.as_ref().unwrap().name, "Funny");
    }

    #[test]
    fn items_without_raw_decode_to_none() {
        let page = Page::from_slice(SAMPLE.as_bytes()).unwrap();
        let second = &page.items[1];
        assert!(second.raw.is_none());
        assert_eq!(second.down_vote, None);
        assert_eq!(second.creation_ts, None);
    }

    #[test]
    fn video_variant_falls_back_to_alternate_codecs() {
        let page = Page::from_slice(SAMPLE.as_bytes()).unwrap();
        let video = page.items[1].media.video.as_ref().unwrap();
        assert_eq!(video.duration, 14);
        assert_eq!(video.playback_url(), Some("https://img/460sv.webm"));
        assert!(page.items[1].media.preview_image().is_none());
    }

    #[test]
    fn stats_are_passed_through() {
        let page = Page::from_slice(SAMPLE.as_bytes()).unwrap();
        assert_eq!(page.stats.len(), 5);
        assert_eq!(page.stats.request_count(), Some(3));
        assert_eq!(page.stats.response_count(), Some(3));
        assert_eq!(page.stats.item_scraped_count(), Some(10));
        assert_eq!(page.stats.finish_reason(), Some("finished"));
        assert_eq!(
            page.stats.text("start_time"),
            Some("2019-10-19 15:46:40")
        );
    }

    #[test]
    fn numeric_strings_match_native_numbers() {
        let native = Page::from_slice(br#"{"items":[{"id":"x","upVote":42,"creationTs":1571500000}]}"#)
            .unwrap();
        let drifted =
            Page::from_slice(br#"{"items":[{"id":"x","upVote":"42","creationTs":"1571500000"}]}"#)
                .unwrap();
        assert_eq!(native, drifted);
    }

    #[test]
    fn empty_document_decodes_to_empty_page() {
        let page = Page::from_slice(b"{}").unwrap();
        assert!(page.items.is_empty());
        assert!(page.stats.is_empty());
        assert!(!page.has_more());
        assert_eq!(page.display_date(), None);
    }

    #[test]
    fn explicit_nulls_decode_as_absent() {
        let page = Page::from_slice(
            br#"{"status":null,"items_dropped":null,"stats":null,"items":[
                {"id":"n1","urls_resource":null,"raw":{"description":null,"tags":null,"images":null}}
            ]}"#,
        )
        .unwrap();
        assert!(page.status.is_empty());
        assert!(page.stats.is_empty());
        let raw = page.items[0].raw.as_ref().unwrap();
        assert!(raw.description.is_empty());
        assert!(raw.tags.is_empty());
        assert!(page.items[0].best_media().is_empty());
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        let err = Page::from_slice(b"{\"items\": [").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
        let err = Page::from_slice(b"<html>503</html>").unwrap_err();
        assert!(matches!(err, DecodeError::Json(_)));
    }

    #[test]
    fn display_date_uses_first_item() {
        let page = Page::from_slice(SAMPLE.as_bytes()).unwrap();
        let expected = Local
            .timestamp_opt(1_571_500_000, 0)
            .single()
            .unwrap()
            .format(DISPLAY_DATE_FORMAT)
            .to_string();
        assert_eq!(page.display_date(), Some(expected));
    }

    #[test]
    fn display_title_falls_back_to_raw() {
        let item = Item {
            raw: Some(RawPost {
                title: "from raw".into(),
                ..RawPost::default()
            }),
            ..Item::default()
        };
        assert_eq!(item.display_title(), "from raw");
    }
}
