//! The per-link dispatch boundary.
//!
//! Extraction failures are isolated per link: each job's error is caught
//! here, logged, and folded into a per-domain success/failure tally. One
//! bad link never aborts the batch.

use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatcher::{host_of, Dispatcher};
use crate::error::Result;
use crate::traits::extractor::{ExtractContext, Extractor};
use crate::types::document::UserDocument;

/// Success/total counts for one source domain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DomainTally {
    pub successful: usize,
    pub total: usize,
}

/// Aggregate outcome of a crawl batch.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    /// Tallies keyed by source domain
    pub domains: BTreeMap<String, DomainTally>,

    /// Whether the batch stopped early on cancellation
    pub cancelled: bool,
}

impl CrawlReport {
    /// Total links that succeeded.
    pub fn successful(&self) -> usize {
        self.domains.values().map(|tally| tally.successful).sum()
    }

    /// Total links attempted.
    pub fn total(&self) -> usize {
        self.domains.values().map(|tally| tally.total).sum()
    }

    fn record(&mut self, domain: String, success: bool) {
        let tally = self.domains.entry(domain).or_default();
        tally.total += 1;
        if success {
            tally.successful += 1;
        }
    }
}

/// Drive a batch of links through the dispatcher on behalf of a user.
///
/// Links are processed sequentially; jobs are independent, so a caller
/// may shard the list across workers instead. The optional token is
/// checked between links, and a cancelled batch still returns the tally
/// accumulated so far.
pub async fn crawl_links(
    dispatcher: &Dispatcher,
    links: &[String],
    user: &UserDocument,
    cancel: Option<&CancellationToken>,
) -> CrawlReport {
    let ctx = ExtractContext::for_user(user);
    let mut report = CrawlReport::default();

    info!(links = links.len(), user = %user.full_name(), "starting crawl batch");

    for link in links {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            warn!("crawl batch cancelled");
            report.cancelled = true;
            break;
        }

        let domain = host_of(link).unwrap_or_else(|| link.clone());
        let success = match crawl_one(dispatcher, link, &ctx).await {
            Ok(()) => true,
            Err(error) => {
                warn!(link = %link, error = %error, "crawl failed");
                false
            }
        };
        report.record(domain, success);
    }

    info!(
        successful = report.successful(),
        total = report.total(),
        "crawl batch complete"
    );
    report
}

async fn crawl_one(dispatcher: &Dispatcher, link: &str, ctx: &ExtractContext) -> Result<()> {
    let capability = dispatcher.lookup(link)?;
    capability.extract(link, ctx).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StaticExtractor;
    use crate::traits::extractor::Extractor;

    fn links(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|link| link.to_string()).collect()
    }

    #[tokio::test]
    async fn test_tally_keyed_by_domain() {
        let github = StaticExtractor::new("github");
        let medium = StaticExtractor::new("medium");
        let dispatcher = {
            let github = github.clone();
            let medium = medium.clone();
            Dispatcher::builder()
                .register_host("github.com", move || -> Box<dyn Extractor> { Box::new(github.clone()) })
                .register_host("medium.com", move || -> Box<dyn Extractor> { Box::new(medium.clone()) })
                .build()
        };

        let user = UserDocument::new("Ada", "Lovelace");
        let report = crawl_links(
            &dispatcher,
            &links(&[
                "https://github.com/ada/engine",
                "https://github.com/ada/notes",
                "https://medium.com/@ada/on-engines",
            ]),
            &user,
            None,
        )
        .await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.successful(), 3);
        assert_eq!(report.domains["github.com"].total, 2);
        assert_eq!(report.domains["medium.com"].total, 1);
        assert_eq!(github.extracted().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_link() {
        let good = StaticExtractor::new("github");
        let bad = StaticExtractor::new("medium").failing();
        let dispatcher = {
            let good = good.clone();
            let bad = bad.clone();
            Dispatcher::builder()
                .register_host("github.com", move || -> Box<dyn Extractor> { Box::new(good.clone()) })
                .register_host("medium.com", move || -> Box<dyn Extractor> { Box::new(bad.clone()) })
                .build()
        };

        let user = UserDocument::new("Ada", "Lovelace");
        let report = crawl_links(
            &dispatcher,
            &links(&[
                "https://medium.com/@ada/broken",
                "https://github.com/ada/engine",
            ]),
            &user,
            None,
        )
        .await;

        // The failing first link did not stop the second.
        assert_eq!(report.total(), 2);
        assert_eq!(report.successful(), 1);
        assert_eq!(report.domains["medium.com"].successful, 0);
        assert_eq!(report.domains["github.com"].successful, 1);
        assert_eq!(good.extracted().len(), 1);
    }

    #[tokio::test]
    async fn test_unroutable_link_counts_as_failure() {
        let github = StaticExtractor::new("github");
        let dispatcher = {
            let github = github.clone();
            Dispatcher::builder()
                .register_host("github.com", move || -> Box<dyn Extractor> { Box::new(github.clone()) })
                .build()
        };

        let user = UserDocument::new("Ada", "Lovelace");
        let report = crawl_links(
            &dispatcher,
            &links(&["https://unknown.example/x", "https://github.com/ada/engine"]),
            &user,
            None,
        )
        .await;

        assert_eq!(report.total(), 2);
        assert_eq!(report.successful(), 1);
        assert_eq!(report.domains["unknown.example"].successful, 0);
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_links() {
        let github = StaticExtractor::new("github");
        let dispatcher = {
            let github = github.clone();
            Dispatcher::builder()
                .register_host("github.com", move || -> Box<dyn Extractor> { Box::new(github.clone()) })
                .build()
        };

        let token = CancellationToken::new();
        token.cancel();

        let user = UserDocument::new("Ada", "Lovelace");
        let report = crawl_links(
            &dispatcher,
            &links(&["https://github.com/ada/engine"]),
            &user,
            Some(&token),
        )
        .await;

        assert!(report.cancelled);
        assert_eq!(report.total(), 0);
        assert!(github.extracted().is_empty());
    }
}
