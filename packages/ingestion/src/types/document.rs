//! Users and content documents.
//!
//! Every content document carries its author's identity and a platform
//! tag. Documents are created by a capability at crawl time and mutated
//! only by the persistence layer afterwards.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::store::DocumentRecord;

/// Collection names for the document store, one per content category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentCategory {
    Users,
    Repositories,
    Articles,
    Posts,
}

impl ContentCategory {
    /// Collection name in the document store.
    pub const fn collection_name(self) -> &'static str {
        match self {
            ContentCategory::Users => "users",
            ContentCategory::Repositories => "repositories",
            ContentCategory::Articles => "articles",
            ContentCategory::Posts => "posts",
        }
    }
}

impl std::fmt::Display for ContentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.collection_name())
    }
}

/// A tracked user/author. All crawled content is linked to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDocument {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl UserDocument {
    /// Create a new user with a freshly assigned id.
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into(),
            last_name: last_name.into(),
        }
    }

    /// Derived display name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Lightweight reference carried in extraction contexts.
    pub fn user_ref(&self) -> UserRef {
        UserRef {
            id: self.id,
            full_name: self.full_name(),
        }
    }
}

impl DocumentRecord for UserDocument {
    const COLLECTION: &'static str = ContentCategory::Users.collection_name();

    fn id(&self) -> Uuid {
        self.id
    }
}

/// Identity of the user a crawl job runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub full_name: String,
}

/// A crawled code repository.
///
/// `content` maps relative file path to normalized file text, in the
/// order the budgeted walk accumulated it. One document exists per
/// distinct `link`; a prior find-by-link suppresses re-extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryDocument {
    pub id: Uuid,
    pub name: String,
    pub link: String,
    pub content: IndexMap<String, String>,
    pub platform: String,
    pub author_id: Uuid,
    pub author_full_name: String,
    pub crawled_at: DateTime<Utc>,
}

impl RepositoryDocument {
    /// Build a repository document for an author.
    pub fn new(
        name: impl Into<String>,
        link: impl Into<String>,
        content: IndexMap<String, String>,
        platform: impl Into<String>,
        author: &UserRef,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            link: link.into(),
            content,
            platform: platform.into(),
            author_id: author.id,
            author_full_name: author.full_name.clone(),
            crawled_at: Utc::now(),
        }
    }

    /// Sum of stored content lengths in bytes.
    pub fn total_content_bytes(&self) -> usize {
        self.content.values().map(|text| text.len()).sum()
    }
}

impl DocumentRecord for RepositoryDocument {
    const COLLECTION: &'static str = ContentCategory::Repositories.collection_name();

    fn id(&self) -> Uuid {
        self.id
    }
}

/// A long-form article. The link is required and is the dedup key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDocument {
    pub id: Uuid,
    pub link: String,
    pub content: IndexMap<String, String>,
    pub platform: String,
    pub author_id: Uuid,
    pub author_full_name: String,
    pub crawled_at: DateTime<Utc>,
}

impl ArticleDocument {
    pub fn new(
        link: impl Into<String>,
        content: IndexMap<String, String>,
        platform: impl Into<String>,
        author: &UserRef,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            link: link.into(),
            content,
            platform: platform.into(),
            author_id: author.id,
            author_full_name: author.full_name.clone(),
            crawled_at: Utc::now(),
        }
    }
}

impl DocumentRecord for ArticleDocument {
    const COLLECTION: &'static str = ContentCategory::Articles.collection_name();

    fn id(&self) -> Uuid {
        self.id
    }
}

/// A short-form social post, optionally carrying an image and a link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDocument {
    pub id: Uuid,
    pub image: Option<String>,
    pub link: Option<String>,
    pub content: IndexMap<String, String>,
    pub platform: String,
    pub author_id: Uuid,
    pub author_full_name: String,
    pub crawled_at: DateTime<Utc>,
}

impl PostDocument {
    pub fn new(
        content: IndexMap<String, String>,
        platform: impl Into<String>,
        author: &UserRef,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            image: None,
            link: None,
            content,
            platform: platform.into(),
            author_id: author.id,
            author_full_name: author.full_name.clone(),
            crawled_at: Utc::now(),
        }
    }

    /// Set the originating link.
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Set the image URL.
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}

impl DocumentRecord for PostDocument {
    const COLLECTION: &'static str = ContentCategory::Posts.collection_name();

    fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let user = UserDocument::new("Ada", "Lovelace");
        assert_eq!(user.full_name(), "Ada Lovelace");
        assert_eq!(user.user_ref().full_name, "Ada Lovelace");
    }

    #[test]
    fn test_repository_document_carries_author() {
        let user = UserDocument::new("Ada", "Lovelace");
        let doc = RepositoryDocument::new(
            "engine",
            "https://github.com/ada/engine",
            IndexMap::new(),
            "github",
            &user.user_ref(),
        );
        assert_eq!(doc.author_id, user.id);
        assert_eq!(doc.author_full_name, "Ada Lovelace");
        assert_eq!(doc.total_content_bytes(), 0);
    }

    #[test]
    fn test_content_byte_total() {
        let mut content = IndexMap::new();
        content.insert("a.py".to_string(), "12345".to_string());
        content.insert("b.md".to_string(), "123".to_string());
        let user = UserDocument::new("Ada", "Lovelace");
        let doc = RepositoryDocument::new(
            "engine",
            "https://github.com/ada/engine",
            content,
            "github",
            &user.user_ref(),
        );
        assert_eq!(doc.total_content_bytes(), 8);
    }

    #[test]
    fn test_collection_names() {
        assert_eq!(ContentCategory::Repositories.collection_name(), "repositories");
        assert_eq!(UserDocument::COLLECTION, "users");
        assert_eq!(PostDocument::COLLECTION, "posts");
    }
}
