pub mod bluesky;
pub mod twitter;

pub use bluesky::BlueskyCollector;
pub use twitter::TwitterCollector;
