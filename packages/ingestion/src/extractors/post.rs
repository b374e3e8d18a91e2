//! Social post extraction through a scripted browser session.
//!
//! Post feeds render incrementally, so the session scrolls to a stable
//! height before pulling text. Sources that gate content behind a login
//! configure the script via `BrowserConfig::with_login_script`.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::info;

use crate::error::ExtractResult;
use crate::extractors::browser::{BrowserSession, EngineProvider, WebDriverProvider};
use crate::traits::extractor::{ExtractContext, Extractor};
use crate::traits::store::{DocumentFilter, DocumentRecord, DocumentStore};
use crate::types::config::BrowserConfig;
use crate::types::document::PostDocument;

const TEXT_SCRIPT: &str = "return document.body ? document.body.innerText : '';";
const IMAGE_SCRIPT: &str =
    "var img = document.querySelector('article img, img'); return img ? img.src : null;";

/// Extraction capability for short-form social posts.
pub struct PostExtractor<S> {
    store: Arc<S>,
    provider: Arc<dyn EngineProvider>,
    config: BrowserConfig,
    platform: String,
}

impl<S: DocumentStore> PostExtractor<S> {
    pub fn new(store: Arc<S>, config: BrowserConfig) -> Self {
        Self {
            store,
            provider: Arc::new(WebDriverProvider),
            config,
            platform: "linkedin".to_string(),
        }
    }

    /// Swap the engine provider (used by tests).
    pub fn with_provider(mut self, provider: Arc<dyn EngineProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Set the platform tag.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    async fn scrape(
        &self,
        session: &mut BrowserSession,
        link: &str,
    ) -> ExtractResult<(IndexMap<String, String>, Option<String>)> {
        session.login().await?;
        session.navigate(link).await?;
        session.scroll_to_stable(self.config.scroll_limit).await?;

        let text = session
            .execute_script(TEXT_SCRIPT)
            .await?
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        let image = session
            .execute_script(IMAGE_SCRIPT)
            .await?
            .as_str()
            .map(|src| src.to_string());

        let mut content = IndexMap::new();
        content.insert("text".to_string(), text);
        Ok((content, image))
    }
}

#[async_trait]
impl<S: DocumentStore> Extractor for PostExtractor<S> {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn extract(&self, link: &str, ctx: &ExtractContext) -> ExtractResult<()> {
        if let Some(existing) = self
            .store
            .find::<PostDocument>(&DocumentFilter::by_link(link))
            .await?
        {
            info!(link = %link, id = %existing.id(), "post already ingested, skipping");
            return Ok(());
        }

        info!(link = %link, "starting post extraction");
        let engine = self.provider.acquire(&self.config).await?;
        let mut session = BrowserSession::new(engine, self.config.clone());

        let scraped = self.scrape(&mut session, link).await;
        session.release().await;
        let (content, image) = scraped?;

        let mut document =
            PostDocument::new(content, &self.platform, &ctx.user).with_link(link);
        if let Some(image) = image {
            document = document.with_image(image);
        }

        let outcome = self
            .store
            .insert_unique(&DocumentFilter::by_link(link), &document)
            .await?;
        info!(
            link = %link,
            id = %outcome.into_inner().id(),
            "post document persisted"
        );
        Ok(())
    }
}
