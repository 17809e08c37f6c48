pub mod config;
pub mod controller;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod models;
pub mod parser;
pub mod pod;
pub mod selector;
pub mod session;
pub mod timeline;
pub mod tracking;
pub mod version;
pub mod vpaid;

pub use driver::PlaybackDriver;

pub mod async_api {
    use crate::error::Result;
    use crate::models::VastResponse;
    use crate::timeline::{BreakPosition, ScheduledBreak};

    pub async fn parse_vast(xml: &str) -> Result<VastResponse> {
        // Parsing is CPU-bound, so we can just wrap the sync version
        crate::parser::parse_vast(xml)
    }

    /// Fetch a response from a URL or file and resolve it into a scheduled break
    pub async fn fetch_ad_break(
        input: &str,
        position: BreakPosition,
        framework: &str,
    ) -> Result<ScheduledBreak> {
        let xml = crate::fetch::fetch_vast_content_async(input).await?;
        crate::timeline::schedule_ad_break(&xml, position, framework)
    }
}
