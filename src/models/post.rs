use super::{Category, UserSummary};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl FromStr for PostStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(Self::Draft),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Published => write!(f, "published"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

/// Status restriction for list and search queries. `"all"` lifts the restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Any,
    Only(PostStatus),
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::Only(PostStatus::Published)
    }
}

impl StatusFilter {
    pub const ALL: &'static str = "all";

    pub fn status(&self) -> Option<PostStatus> {
        match self {
            Self::Any => None,
            Self::Only(s) => Some(*s),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case(Self::ALL) {
            return Ok(Self::Any);
        }
        s.parse::<PostStatus>().map(Self::Only)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AffiliatePlatform {
    Daraz,
    Amazon,
    Flipkart,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateLink {
    pub title: String,
    pub url: String,
    pub platform: AffiliatePlatform,
    pub product_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(default)]
    pub position: i64,
}

/// A post's category, either as the stored identifier or joined with its record.
///
/// Resolution happens once, in the data-access layer; handlers never inspect
/// the shape at runtime.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CategoryRef {
    Unresolved(Uuid),
    Resolved(Category),
}

impl CategoryRef {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Unresolved(id) => *id,
            Self::Resolved(c) => c.id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: String,
    pub featured_image: String,
    pub author_id: Uuid,
    pub author: Option<UserSummary>,
    pub category: CategoryRef,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub is_featured: bool,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Vec<String>,
    pub affiliate_links: Vec<AffiliateLink>,
    pub read_time: i64,
    pub view_count: i64,
    pub like_count: i64,
    pub published_at: Option<String>,
    pub content_images: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// List/search projection of a post. Carries no body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostSummary {
    pub id: Uuid,
    pub title: String,
    pub slug: String,
    pub excerpt: String,
    pub featured_image: String,
    pub author: Option<UserSummary>,
    pub category: CategoryRef,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub is_featured: bool,
    pub read_time: i64,
    pub view_count: i64,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePost {
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub featured_image: String,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub is_featured: bool,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<Vec<String>>,
    #[serde(default)]
    pub affiliate_links: Vec<AffiliateLink>,
    #[serde(default)]
    pub content_images: Vec<String>,
}

/// Patchable post fields. Anything absent is left unchanged.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePost {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub featured_image: Option<String>,
    pub status: Option<PostStatus>,
    pub is_featured: Option<bool>,
    pub seo_title: Option<String>,
    pub seo_description: Option<String>,
    pub seo_keywords: Option<Vec<String>>,
    pub affiliate_links: Option<Vec<AffiliateLink>>,
    pub content_images: Option<Vec<String>>,
    pub published_at: Option<String>,
}
