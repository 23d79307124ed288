//! Provider Adapters (spec C1): one module per upstream source.

pub mod rest_portal;
pub mod scrape_portal;

pub use rest_portal::{RestControlNumber, RestPortalAdapter, RestPortalConfig};
pub use scrape_portal::{ScrapePortalAdapter, ScrapePortalConfig};
