//! Article extraction through a scripted browser session.

use async_trait::async_trait;
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::info;

use crate::error::ExtractResult;
use crate::extractors::browser::{BrowserSession, EngineProvider, WebDriverProvider};
use crate::traits::extractor::{ExtractContext, Extractor};
use crate::traits::store::{DocumentFilter, DocumentRecord, DocumentStore};
use crate::types::config::BrowserConfig;
use crate::types::document::ArticleDocument;

const TITLE_SCRIPT: &str = "return document.title;";
const BODY_SCRIPT: &str = "return document.body ? document.body.innerText : '';";

/// Extraction capability for long-form articles on rendered pages.
pub struct ArticleExtractor<S> {
    store: Arc<S>,
    provider: Arc<dyn EngineProvider>,
    config: BrowserConfig,
    platform: String,
}

impl<S: DocumentStore> ArticleExtractor<S> {
    pub fn new(store: Arc<S>, config: BrowserConfig) -> Self {
        Self {
            store,
            provider: Arc::new(WebDriverProvider),
            config,
            platform: "medium".to_string(),
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
    ) -> ExtractResult<IndexMap<String, String>> {
        session.login().await?;
        session.navigate(link).await?;
        session.scroll_to_stable(self.config.scroll_limit).await?;

        let title = session
            .execute_script(TITLE_SCRIPT)
            .await?
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();
        let body = session
            .execute_script(BODY_SCRIPT)
            .await?
            .as_str()
            .unwrap_or_default()
            .trim()
            .to_string();

        let mut content = IndexMap::new();
        content.insert("title".to_string(), title);
        content.insert("content".to_string(), body);
        Ok(content)
    }
}

#[async_trait]
impl<S: DocumentStore> Extractor for ArticleExtractor<S> {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn extract(&self, link: &str, ctx: &ExtractContext) -> ExtractResult<()> {
        if let Some(existing) = self
            .store
            .find::<ArticleDocument>(&DocumentFilter::by_link(link))
            .await?
        {
            info!(link = %link, id = %existing.id(), "article already ingested, skipping");
            return Ok(());
        }

        info!(link = %link, "starting article extraction");
        let engine = self.provider.acquire(&self.config).await?;
        let mut session = BrowserSession::new(engine, self.config.clone());

        // The session is released on every exit path; scrape errors are
        // captured, never allowed to leak past the release.
        let scraped = self.scrape(&mut session, link).await;
        session.release().await;
        let content = scraped?;

        let document = ArticleDocument::new(link, content, &self.platform, &ctx.user);
        let outcome = self
            .store
            .insert_unique(&DocumentFilter::by_link(link), &document)
            .await?;
        info!(
            link = %link,
            id = %outcome.into_inner().id(),
            "article document persisted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::memory::MemoryDocumentStore;
    use crate::testing::{MockBrowserEngine, MockEngineProvider};
    use crate::types::document::UserDocument;
    use serde_json::json;
    use std::time::Duration;

    fn quick_config() -> BrowserConfig {
        BrowserConfig::default().with_settle(Duration::from_millis(1))
    }

    fn test_ctx() -> ExtractContext {
        ExtractContext::for_user(&UserDocument::new("Ada", "Lovelace"))
    }

    #[tokio::test]
    async fn test_extracts_title_and_body() {
        let engine = MockBrowserEngine::new()
            .with_heights([1000, 1000])
            .with_script_result("document.title", json!("On Engines"))
            .with_script_result("innerText", json!("Analytical engines compute."));
        let provider = MockEngineProvider::new(engine.clone());

        let store = Arc::new(MemoryDocumentStore::new());
        let extractor =
            ArticleExtractor::new(store.clone(), quick_config()).with_provider(Arc::new(provider));

        let link = "https://medium.com/@ada/on-engines";
        extractor.extract(link, &test_ctx()).await.unwrap();

        let doc = store
            .find::<ArticleDocument>(&DocumentFilter::by_link(link))
            .await
            .unwrap()
            .expect("article persisted");
        assert_eq!(doc.content["title"], "On Engines");
        assert_eq!(doc.content["content"], "Analytical engines compute.");
        assert_eq!(doc.platform, "medium");
        assert!(engine.quit_called());
    }

    #[tokio::test]
    async fn test_second_extract_skips_browser_entirely() {
        let engine = MockBrowserEngine::new().with_heights([1000, 1000]);
        let provider = MockEngineProvider::new(engine);

        let store = Arc::new(MemoryDocumentStore::new());
        let extractor = ArticleExtractor::new(store.clone(), quick_config())
            .with_provider(Arc::new(provider.clone()));

        let link = "https://medium.com/@ada/on-engines";
        let ctx = test_ctx();
        extractor.extract(link, &ctx).await.unwrap();
        extractor.extract(link, &ctx).await.unwrap();

        assert_eq!(provider.acquire_count(), 1);
    }

    #[tokio::test]
    async fn test_browser_released_when_navigation_fails() {
        let engine = MockBrowserEngine::new().failing_navigation();
        let provider = MockEngineProvider::new(engine.clone());

        let store = Arc::new(MemoryDocumentStore::new());
        let extractor =
            ArticleExtractor::new(store.clone(), quick_config()).with_provider(Arc::new(provider));

        let result = extractor
            .extract("https://medium.com/@ada/broken", &test_ctx())
            .await;
        assert!(result.is_err());
        assert!(engine.quit_called());
        assert_eq!(store.write_count(), 0);
    }
}
