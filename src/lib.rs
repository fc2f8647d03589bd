pub mod config;
pub mod crawler;
pub mod delay_manager;
pub mod error;
pub mod extractor;
pub mod fetcher;
pub mod graph_store;
pub mod input_loader;
pub mod logger;
pub mod normalizer;
pub mod overrides;
pub mod resolver;

// Exporting types for convenience
pub use config::{Cli, CrawlConfig};
pub use crawler::{CrawlSummary, Crawler};
pub use delay_manager::{DelayPolicy, Throttle};
pub use error::{CrawlError, Result};
pub use fetcher::{HttpFetcher, Page, PageSource};
pub use graph_store::{GraphStore, StoreGuard};
pub use overrides::OverrideTable;
pub use resolver::Resolver;
