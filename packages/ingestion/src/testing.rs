//! Testing utilities including mock implementations.
//!
//! These exercise capabilities without real browsers, subprocesses, or
//! network access. Mocks track their calls so tests can assert on
//! behavior, not just outcomes.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::error::{ExtractError, ExtractResult};
use crate::extractors::browser::{BrowserEngine, EngineProvider};
use crate::extractors::repository::{repo_name, RepositorySource};
use crate::traits::extractor::{ExtractContext, Extractor};
use crate::types::config::BrowserConfig;

/// Record of a call made to the mock browser engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Navigate(String),
    Script(String),
    Quit,
}

/// A scriptable browser engine.
///
/// Page heights are served from a queue so scroll-settling behavior can
/// be simulated; script results are matched by substring. All state is
/// shared through `Arc`, so a clone kept by the test observes calls made
/// through the boxed clone handed to a session.
#[derive(Clone, Default)]
pub struct MockBrowserEngine {
    heights: Arc<RwLock<VecDeque<i64>>>,
    last_height: Arc<RwLock<i64>>,
    script_results: Arc<RwLock<Vec<(String, Value)>>>,
    calls: Arc<RwLock<Vec<EngineCall>>>,
    fail_navigate: bool,
}

impl MockBrowserEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the heights successive `scrollHeight` reads will report.
    pub fn with_heights(self, heights: impl IntoIterator<Item = i64>) -> Self {
        self.heights.write().unwrap().extend(heights);
        self
    }

    /// Return `value` for scripts containing `fragment`.
    pub fn with_script_result(self, fragment: impl Into<String>, value: Value) -> Self {
        self.script_results
            .write()
            .unwrap()
            .push((fragment.into(), value));
        self
    }

    /// Make navigation fail.
    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigate = true;
        self
    }

    /// All calls made to this engine.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.read().unwrap().clone()
    }

    /// Whether the engine was terminated.
    pub fn quit_called(&self) -> bool {
        self.calls
            .read()
            .unwrap()
            .iter()
            .any(|call| matches!(call, EngineCall::Quit))
    }

    fn next_height(&self) -> i64 {
        let mut heights = self.heights.write().unwrap();
        match heights.pop_front() {
            Some(height) => {
                *self.last_height.write().unwrap() = height;
                height
            }
            None => *self.last_height.read().unwrap(),
        }
    }
}

#[async_trait]
impl BrowserEngine for MockBrowserEngine {
    async fn navigate(&mut self, url: &str) -> ExtractResult<()> {
        self.calls
            .write()
            .unwrap()
            .push(EngineCall::Navigate(url.to_string()));
        if self.fail_navigate {
            return Err(ExtractError::Browser("mock navigation failure".into()));
        }
        Ok(())
    }

    async fn execute_script(&mut self, script: &str) -> ExtractResult<Value> {
        self.calls
            .write()
            .unwrap()
            .push(EngineCall::Script(script.to_string()));

        if script.contains("return document.body.scrollHeight") {
            return Ok(Value::from(self.next_height()));
        }
        if script.contains("window.scrollTo") {
            return Ok(Value::Null);
        }

        let results = self.script_results.read().unwrap();
        Ok(results
            .iter()
            .find(|(fragment, _)| script.contains(fragment.as_str()))
            .map(|(_, value)| value.clone())
            .unwrap_or(Value::Null))
    }

    async fn quit(&mut self) -> ExtractResult<()> {
        self.calls.write().unwrap().push(EngineCall::Quit);
        Ok(())
    }
}

/// Provider handing out clones of one mock engine.
#[derive(Clone)]
pub struct MockEngineProvider {
    engine: MockBrowserEngine,
    acquisitions: Arc<RwLock<usize>>,
}

impl MockEngineProvider {
    pub fn new(engine: MockBrowserEngine) -> Self {
        Self {
            engine,
            acquisitions: Arc::new(RwLock::new(0)),
        }
    }

    /// How many sessions were acquired.
    pub fn acquire_count(&self) -> usize {
        *self.acquisitions.read().unwrap()
    }
}

#[async_trait]
impl EngineProvider for MockEngineProvider {
    async fn acquire(&self, _config: &BrowserConfig) -> ExtractResult<Box<dyn BrowserEngine>> {
        *self.acquisitions.write().unwrap() += 1;
        Ok(Box::new(self.engine.clone()))
    }
}

/// Repository source that copies a fixture tree instead of cloning.
#[derive(Clone)]
pub struct FixtureRepositorySource {
    fixture: PathBuf,
    fetches: Arc<RwLock<usize>>,
}

impl FixtureRepositorySource {
    pub fn new(fixture: impl Into<PathBuf>) -> Self {
        Self {
            fixture: fixture.into(),
            fetches: Arc::new(RwLock::new(0)),
        }
    }

    /// How many times a checkout was materialized.
    pub fn fetch_count(&self) -> usize {
        *self.fetches.read().unwrap()
    }
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[async_trait]
impl RepositorySource for FixtureRepositorySource {
    async fn fetch(&self, link: &str, workspace: &Path) -> ExtractResult<PathBuf> {
        *self.fetches.write().unwrap() += 1;

        if !self.fixture.exists() {
            return Err(ExtractError::Clone {
                link: link.to_string(),
                message: format!("fixture missing: {}", self.fixture.display()),
            });
        }

        let dest = workspace.join(repo_name(link)?);
        copy_tree(&self.fixture, &dest)?;
        Ok(dest)
    }
}

/// Extractor that only records the links it was asked to extract.
#[derive(Clone)]
pub struct StaticExtractor {
    platform: String,
    extracted: Arc<RwLock<Vec<String>>>,
    fail: bool,
}

impl StaticExtractor {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            extracted: Arc::new(RwLock::new(Vec::new())),
            fail: false,
        }
    }

    /// Make every extraction fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Links extracted so far.
    pub fn extracted(&self) -> Vec<String> {
        self.extracted.read().unwrap().clone()
    }
}

#[async_trait]
impl Extractor for StaticExtractor {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn extract(&self, link: &str, _ctx: &ExtractContext) -> ExtractResult<()> {
        if self.fail {
            return Err(ExtractError::Browser("extractor configured to fail".into()));
        }
        self.extracted.write().unwrap().push(link.to_string());
        Ok(())
    }
}
