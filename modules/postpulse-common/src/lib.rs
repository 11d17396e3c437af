pub mod config;
pub mod error;
pub mod handle;
pub mod post;
pub mod text_extract;

pub use config::{BlueskyCredentials, Config, TwitterCredentials};
pub use error::{CollectError, ErrorKind, ParseError, Result};
pub use handle::{detect_provider, normalize_handle};
pub use post::{parse_timestamp, permalink, NewPost, Post, Provider};
