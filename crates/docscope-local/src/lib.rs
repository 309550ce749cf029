pub mod blobs;
pub mod config;
pub mod convert;
pub mod debounce;
pub mod extract;
pub mod highlight;
pub mod ingest;
pub mod markup;
pub mod notices;
mod ooxml;
pub mod pattern;
pub mod preview;
pub mod sanitize;
pub mod search;
pub mod session;
pub mod text_layer;
pub mod tokenize;

pub use config::{load_env_file, ConvertConfig, ViewerConfig};
pub use convert::JobConversionClient;
pub use extract::extract;
pub use highlight::{highlight, HighlightStats, TextSurface};
pub use markup::MarkupTree;
pub use notices::Notice;
pub use preview::PreviewContent;
pub use session::Session;
pub use tokenize::tokenize;
pub use tokio_util::sync::CancellationToken;
