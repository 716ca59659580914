//! Microsoft Graph access for uploading scraped rows to SharePoint lists.

mod auth;
mod client;
mod error;
mod mapping;
mod session;
mod upload;

pub use auth::{DeviceCode, DeviceCodeAuth, TokenCache, DEFAULT_AUTHORITY, GRAPH_SCOPE, TOKEN_CACHE_FILE};
pub use client::{GraphClient, GRAPH_BASE_URL};
pub use error::{Error, Result};
pub use mapping::{map_row, TITLE_FIELD};
pub use session::{odata_quote, GraphSession};
pub use upload::{upload_rows, UploadStats};
