#![allow(clippy::uninlined_format_args)]

pub mod app;
pub mod config;
pub mod cursor;
pub mod data;
pub mod feed;
pub mod lenient;
pub mod model;
pub mod render;
pub mod server;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{dump, run};
pub use cursor::{build_cursor, Cursor, CursorError};
pub use feed::{Client, ClientConfig, FeedError, PaginationState};
pub use model::{DecodeError, Item, Page};
