//! Sitemap and index entry types.
//!
//! A [`SitemapEntry`] is one `<url>` element of a sitemap file; an
//! [`IndexEntry`] is one `<sitemap>` element of an index file. Both are
//! keyed by `url`.
//!
//! Empty metadata collections are never serialized, so an entry read back
//! from storage compares equal to the one that was written.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Current time formatted the way `lastmod` values are written.
pub fn now_lastmod() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Image attached to a sitemap URL (`<image:image>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapImage {
    /// Image location
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Video attached to a sitemap URL (`<video:video>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapVideo {
    pub thumbnail_loc: String,
    pub title: String,
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_loc: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_loc: Option<String>,

    /// Duration in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

/// Publication block of a news entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapNewsPublication {
    pub name: String,
    pub language: String,
}

/// News metadata (`<news:news>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapNews {
    pub publication: SitemapNewsPublication,
    pub publication_date: String,
    pub title: String,
}

/// Alternate-language link (`<xhtml:link rel="alternate">`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SitemapLink {
    pub lang: String,
    pub url: String,
}

/// One content URL in a sitemap file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SitemapEntry {
    /// Natural key
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub img: Vec<SitemapImage>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub video: Vec<SitemapVideo>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<SitemapNews>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<SitemapLink>,
}

impl SitemapEntry {
    /// Create an entry with only a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            lastmod: None,
            changefreq: None,
            priority: None,
            img: Vec::new(),
            video: Vec::new(),
            news: None,
            links: Vec::new(),
        }
    }

    /// Set `lastmod`.
    pub fn with_lastmod(mut self, lastmod: impl Into<String>) -> Self {
        self.lastmod = Some(lastmod.into());
        self
    }

    /// Attach an image.
    pub fn with_image(mut self, image: SitemapImage) -> Self {
        self.img.push(image);
        self
    }

    /// Attach an alternate-language link.
    pub fn with_link(mut self, lang: impl Into<String>, url: impl Into<String>) -> Self {
        self.links.push(SitemapLink {
            lang: lang.into(),
            url: url.into(),
        });
        self
    }

    /// Whether any extended metadata is present.
    pub fn has_extensions(&self) -> bool {
        !self.img.is_empty() || !self.video.is_empty() || self.news.is_some() || !self.links.is_empty()
    }
}

/// Reference from an index file to a sitemap file.
///
/// Always exactly `url` + `lastmod`; anything else a producer attaches is
/// dropped on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexEntry {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
}

impl IndexEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            lastmod: None,
        }
    }

    pub fn with_lastmod(mut self, lastmod: impl Into<String>) -> Self {
        self.lastmod = Some(lastmod.into());
        self
    }

    /// Final path segment of the URL, i.e. the referenced file's name.
    pub fn filename(&self) -> &str {
        self.url.rsplit('/').next().unwrap_or(&self.url)
    }
}
