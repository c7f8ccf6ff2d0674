use std::fmt::Write;

use crate::data::PageView;
use crate::model::Item;

const STYLE: &str = r#"
      :root {
        color-scheme: dark light;
        --bg: #11151d;
        --panel: #1c2230;
        --accent: #52b4ff;
        --text: #e8edf5;
        --muted: #9aa3b7;
        font-family: "Inter", "Segoe UI", -apple-system, BlinkMacSystemFont, "Helvetica Neue", sans-serif;
      }
      body { margin: 0 auto; max-width: 720px; background: var(--bg); color: var(--text); }
      header { padding: 1.5rem 1rem 0.5rem; color: var(--muted); }
      article { background: var(--panel); margin: 1rem; padding: 1rem 1.25rem; border-radius: 12px; }
      article h2 { margin: 0 0 0.75rem; font-size: 1.2rem; }
      article img, article video { max-width: 100%; border-radius: 8px; }
      .meta { color: var(--muted); font-size: 0.9rem; }
      .next { display: block; margin: 1.5rem 1rem 3rem; text-align: center; color: var(--accent); }
      .error { color: #ff7a7a; }
"#;

pub fn page(view: &PageView) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<header>Page {}{}</header>",
        view.number,
        view.published
            .as_deref()
            .map(|date| format!(" &middot; {}", escape(date)))
            .unwrap_or_default()
    );
    for item in &view.page.items {
        item_card(&mut body, item);
    }
    if view.has_more {
        body.push_str("<a class=\"next\" href=\"/feed/\">Next page</a>\n");
    }
    document("9GAG hot", &body)
}

pub fn error(message: &str) -> String {
    let body = format!(
        "<article><h2>Feed unavailable</h2><p class=\"error\">{}</p><a href=\"/\">Start over</a></article>\n",
        escape(message)
    );
    document("9GAG hot - error", &body)
}

fn item_card(out: &mut String, item: &Item) {
    let _ = writeln!(out, "<article>");
    let title = escape(item.display_title());
    match item.url.as_deref().filter(|url| !url.is_empty()) {
        Some(url) => {
            let _ = writeln!(out, "<h2><a href=\"{}\">{}</a></h2>", escape(url), title);
        }
        None => {
            let _ = writeln!(out, "<h2>{}</h2>", title);
        }
    }

    let media = item.best_media();
    if let Some(url) = media.video.as_ref().and_then(|video| video.playback_url()) {
        let _ = writeln!(
            out,
            "<video src=\"{}\" controls loop muted playsinline></video>",
            escape(url)
        );
    } else if let Some(image) = media.preview_image() {
        let _ = writeln!(
            out,
            "<img src=\"{}\" width=\"{}\" height=\"{}\" alt=\"{}\" loading=\"lazy\">",
            escape(&image.url),
            image.width,
            image.height,
            title
        );
    }

    let mut meta = format!(
        "&#9650; {} &#9660; {}",
        item.up_vote.unwrap_or(0),
        item.down_vote.unwrap_or(0)
    );
    if let Some(raw) = &item.raw {
        let _ = write!(meta, " &middot; {} comments", raw.comments_count);
        if let Some(section) = raw.post_section.as_ref().filter(|s| !s.name.is_empty()) {
            let _ = write!(meta, " &middot; {}", escape(&section.name));
        }
        if raw.is_nsfw() {
            meta.push_str(" &middot; NSFW");
        }
    }
    let _ = writeln!(out, "<p class=\"meta\">{meta}</p>");
    let _ = writeln!(out, "</article>");
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"utf-8\" />\n    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n    <title>{}</title>\n    <style>{}</style>\n  </head>\n  <body>\n{}  </body>\n</html>\n",
        escape(title),
        STYLE,
        body
    )
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ImageVariant, Media, Page, RawPost, VideoVariant};

    fn view(items: Vec<Item>) -> PageView {
        PageView::new(
            2,
            Page {
                items,
                ..Page::default()
            },
        )
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn renders_items_and_next_link() {
        let items = (0..3)
            .map(|n| Item {
                id: format!("id{n}"),
                title: Some(format!("<post {n}>")),
                up_vote: Some(10),
                media: Media {
                    medium: Some(ImageVariant {
                        width: 460,
                        height: 300,
                        url: format!("https://img/{n}.jpg"),
                        webp_url: None,
                    }),
                    ..Media::default()
                },
                ..Item::default()
            })
            .collect();
        let html = page(&view(items));
        assert!(html.contains("Page 2"));
        assert!(html.contains("&lt;post 1&gt;"));
        assert!(html.contains("https://img/2.jpg"));
        assert!(html.contains("href=\"/feed/\""));
    }

    #[test]
    fn short_page_has_no_next_link() {
        let html = page(&view(vec![Item {
            id: "solo".into(),
            title: Some("solo".into()),
            ..Item::default()
        }]));
        assert!(!html.contains("/feed/"));
    }

    #[test]
    fn prefers_video_and_raw_metadata() {
        let item = Item {
            id: "v".into(),
            media: Media {
                video: Some(VideoVariant {
                    av1_url: Some("https://img/v.av1.mp4".into()),
                    ..VideoVariant::default()
                }),
                ..Media::default()
            },
            raw: Some(RawPost {
                title: "from raw".into(),
                nsfw: 1,
                comments_count: 5,
                ..RawPost::default()
            }),
            ..Item::default()
        };
        let html = page(&view(vec![item]));
        assert!(html.contains("<video src=\"https://img/v.av1.mp4\""));
        assert!(html.contains("from raw"));
        assert!(html.contains("5 comments"));
        assert!(html.contains("NSFW"));
    }

    #[test]
    fn error_page_escapes_message() {
        let html = error("feed: upstream returned status <503>");
        assert!(html.contains("status &lt;503&gt;"));
    }
}
