use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{self, Config};
use crate::data::{FeedService, NineGagFeedService, PageView};
use crate::feed;
use crate::server::Server;

pub fn run() -> Result<()> {
    let cfg = load_config()?;
    let client = build_client(&cfg)?;
    let service: Arc<dyn FeedService> = Arc::new(NineGagFeedService::new(client));

    let server = Server::bind(&cfg.server.listen_addr, service).context("start server")?;
    info!(
        addr = %server.local_addr(),
        config = %friendly_path(config::default_path().as_ref()),
        "ninegag-feed ready"
    );
    server.run();
    Ok(())
}

/// Fetch pages `1..=pages` in order and print one line per item.
pub fn dump(pages: u32) -> Result<()> {
    let cfg = load_config()?;
    let client = build_client(&cfg)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for number in 1..=pages {
        let page = client
            .fetch_page(number)
            .with_context(|| format!("fetch feed page {number}"))?;
        let view = PageView::new(number, page);
        write_page(&mut out, &view)?;
        if !view.has_more && number < pages {
            warn!(page = number, "feed ended early");
            break;
        }
    }
    Ok(())
}

fn load_config() -> Result<Config> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    init_logging(&cfg.log.level);
    Ok(cfg)
}

fn build_client(cfg: &Config) -> Result<Arc<feed::Client>> {
    let client =
        feed::Client::new(cfg.feed.client_config()).context("initialize feed client")?;
    Ok(Arc::new(client))
}

/// RUST_LOG wins over the configured level.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn write_page<W: Write>(out: &mut W, view: &PageView) -> io::Result<()> {
    writeln!(
        out,
        "# page {} ({} items{})",
        view.number,
        view.page.items.len(),
        view.published
            .as_deref()
            .map(|date| format!(", {date}"))
            .unwrap_or_default()
    )?;
    for item in &view.page.items {
        writeln!(
            out,
            "{}\t+{}/-{}\t{}",
            item.id,
            item.up_vote.unwrap_or(0),
            item.down_vote.unwrap_or(0),
            item.display_title()
        )?;
    }
    Ok(())
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/ninegag-feed/config.yaml".to_string()
    }
}
