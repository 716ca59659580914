pub mod completion;
pub mod config;
pub mod run;
pub mod scrape;
pub mod upload;
pub mod whats_new;
