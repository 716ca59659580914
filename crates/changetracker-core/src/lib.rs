pub mod config;
pub mod dump;
pub mod error;
pub mod model;
pub mod text_match;
pub mod whats_new;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use model::{Row, RowDetails, ScrapeReport, View};
pub use text_match::TextMatch;
