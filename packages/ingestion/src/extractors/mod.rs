//! Extraction capability implementations.
//!
//! - [`browser`] - Scripted browser sessions (WebDriver)
//! - [`repository`] - Version-control repositories (clone + budgeted walk)
//! - [`article`] - Long-form articles on rendered pages
//! - [`post`] - Short-form social posts

pub mod article;
pub mod browser;
pub mod post;
pub mod repository;
