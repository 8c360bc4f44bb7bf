//! XML codec for sitemap and index documents.
//!
//! Serialization is hand-written so that the byte size of every entry is
//! known before it is committed to a file. Parsing goes through
//! `roxmltree`, which handles entity unescaping and namespaces.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use roxmltree::{Document, Node};

use sitemap_types::{
    IndexEntry, SitemapEntry, SitemapImage, SitemapLink, SitemapNews, SitemapNewsPublication,
    SitemapVideo,
};

use crate::error::FileError;

/// An entry type that can live in a bounded file.
pub trait XmlEntry: Clone + Send + Sync + 'static {
    /// Everything before the first entry
    const HEADER: &'static str;
    /// Everything after the last entry
    const FOOTER: &'static str;
    /// Local name of the document element
    const ROOT_TAG: &'static str;
    /// Local name of each entry element
    const ENTRY_TAG: &'static str;

    /// Natural key.
    fn url(&self) -> &str;

    /// Serialized element, exactly as it is written to the file.
    fn to_xml(&self) -> String;

    /// Decode one entry element.
    fn from_xml(node: Node<'_, '_>) -> Result<Self, FileError>;
}

/// Escape text for use in element content or a double-quoted attribute.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

fn push_element(out: &mut String, tag: &str, text: &str) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    out.push_str(&escape(text));
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn push_optional(out: &mut String, tag: &str, text: Option<&str>) {
    if let Some(text) = text {
        push_element(out, tag, text);
    }
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.tag_name().name() == name)
}

fn text_of(node: Node<'_, '_>) -> String {
    node.text().unwrap_or_default().trim().to_string()
}

fn child_text(node: Node<'_, '_>, name: &str) -> Option<String> {
    child(node, name).map(text_of)
}

fn required_text(node: Node<'_, '_>, name: &str) -> Result<String, FileError> {
    child_text(node, name).ok_or_else(|| {
        FileError::Parse(format!(
            "<{}> missing <{}>",
            node.tag_name().name(),
            name
        ))
    })
}

impl XmlEntry for SitemapEntry {
    const HEADER: &'static str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        "\n",
        r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9""#,
        r#" xmlns:news="http://www.google.com/schemas/sitemap-news/0.9""#,
        r#" xmlns:xhtml="http://www.w3.org/1999/xhtml""#,
        r#" xmlns:image="http://www.google.com/schemas/sitemap-image/1.1""#,
        r#" xmlns:video="http://www.google.com/schemas/sitemap-video/1.1">"#
    );
    const FOOTER: &'static str = "</urlset>";
    const ROOT_TAG: &'static str = "urlset";
    const ENTRY_TAG: &'static str = "url";

    fn url(&self) -> &str {
        &self.url
    }

    fn to_xml(&self) -> String {
        let mut out = String::with_capacity(128);
        out.push_str("<url>");
        push_element(&mut out, "loc", &self.url);
        push_optional(&mut out, "lastmod", self.lastmod.as_deref());
        push_optional(&mut out, "changefreq", self.changefreq.as_deref());
        if let Some(priority) = self.priority {
            push_element(&mut out, "priority", &priority.to_string());
        }
        for img in &self.img {
            out.push_str("<image:image>");
            push_element(&mut out, "image:loc", &img.url);
            push_optional(&mut out, "image:caption", img.caption.as_deref());
            push_optional(&mut out, "image:title", img.title.as_deref());
            out.push_str("</image:image>");
        }
        for video in &self.video {
            out.push_str("<video:video>");
            push_element(&mut out, "video:thumbnail_loc", &video.thumbnail_loc);
            push_element(&mut out, "video:title", &video.title);
            push_element(&mut out, "video:description", &video.description);
            push_optional(&mut out, "video:content_loc", video.content_loc.as_deref());
            push_optional(&mut out, "video:player_loc", video.player_loc.as_deref());
            if let Some(duration) = video.duration {
                push_element(&mut out, "video:duration", &duration.to_string());
            }
            out.push_str("</video:video>");
        }
        if let Some(news) = &self.news {
            out.push_str("<news:news><news:publication>");
            push_element(&mut out, "news:name", &news.publication.name);
            push_element(&mut out, "news:language", &news.publication.language);
            out.push_str("</news:publication>");
            push_element(&mut out, "news:publication_date", &news.publication_date);
            push_element(&mut out, "news:title", &news.title);
            out.push_str("</news:news>");
        }
        for link in &self.links {
            out.push_str(r#"<xhtml:link rel="alternate" hreflang=""#);
            out.push_str(&escape(&link.lang));
            out.push_str(r#"" href=""#);
            out.push_str(&escape(&link.url));
            out.push_str(r#""/>"#);
        }
        out.push_str("</url>");
        out
    }

    fn from_xml(node: Node<'_, '_>) -> Result<Self, FileError> {
        let mut entry = SitemapEntry::new(required_text(node, "loc")?);
        for c in node.children().filter(|c| c.is_element()) {
            match c.tag_name().name() {
                "lastmod" => entry.lastmod = Some(text_of(c)),
                "changefreq" => entry.changefreq = Some(text_of(c)),
                "priority" => {
                    let raw = text_of(c);
                    entry.priority = Some(raw.parse().map_err(|_| {
                        FileError::Parse(format!("invalid priority {raw:?}"))
                    })?);
                }
                "image" => entry.img.push(SitemapImage {
                    url: required_text(c, "loc")?,
                    caption: child_text(c, "caption"),
                    title: child_text(c, "title"),
                }),
                "video" => entry.video.push(SitemapVideo {
                    thumbnail_loc: required_text(c, "thumbnail_loc")?,
                    title: required_text(c, "title")?,
                    description: required_text(c, "description")?,
                    content_loc: child_text(c, "content_loc"),
                    player_loc: child_text(c, "player_loc"),
                    duration: child_text(c, "duration").and_then(|d| d.parse().ok()),
                }),
                "news" => {
                    let publication = child(c, "publication")
                        .ok_or_else(|| FileError::Parse("<news> missing <publication>".into()))?;
                    entry.news = Some(SitemapNews {
                        publication: SitemapNewsPublication {
                            name: required_text(publication, "name")?,
                            language: required_text(publication, "language")?,
                        },
                        publication_date: required_text(c, "publication_date")?,
                        title: required_text(c, "title")?,
                    });
                }
                "link" => {
                    if let (Some(lang), Some(href)) = (c.attribute("hreflang"), c.attribute("href"))
                    {
                        entry.links.push(SitemapLink {
                            lang: lang.to_string(),
                            url: href.to_string(),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(entry)
    }
}

impl XmlEntry for IndexEntry {
    const HEADER: &'static str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8"?>"#,
        "\n",
        r#"<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">"#
    );
    const FOOTER: &'static str = "</sitemapindex>";
    const ROOT_TAG: &'static str = "sitemapindex";
    const ENTRY_TAG: &'static str = "sitemap";

    fn url(&self) -> &str {
        &self.url
    }

    fn to_xml(&self) -> String {
        let mut out = String::with_capacity(96);
        out.push_str("<sitemap>");
        push_element(&mut out, "loc", &self.url);
        push_optional(&mut out, "lastmod", self.lastmod.as_deref());
        out.push_str("</sitemap>");
        out
    }

    fn from_xml(node: Node<'_, '_>) -> Result<Self, FileError> {
        Ok(IndexEntry {
            url: required_text(node, "loc")?,
            lastmod: child_text(node, "lastmod"),
        })
    }
}

/// Parse a whole document into its entries.
pub fn parse_entries<E: XmlEntry>(xml: &str) -> Result<Vec<E>, FileError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != E::ROOT_TAG {
        return Err(FileError::Parse(format!(
            "expected <{}>, found <{}>",
            E::ROOT_TAG,
            root.tag_name().name()
        )));
    }
    root.children()
        .filter(|c| c.is_element() && c.tag_name().name() == E::ENTRY_TAG)
        .map(E::from_xml)
        .collect()
}

/// Parse raw (possibly gzipped) bytes into entries.
pub fn decode_entries<E: XmlEntry>(bytes: &[u8]) -> Result<Vec<E>, FileError> {
    let plain;
    let bytes = if is_gzip(bytes) {
        plain = gunzip(bytes)?;
        plain.as_slice()
    } else {
        bytes
    };
    let xml = std::str::from_utf8(bytes).map_err(|e| FileError::Parse(e.to_string()))?;
    parse_entries(xml)
}

/// Whether the bytes start with the gzip magic number.
pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

pub fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

pub fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    GzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Byte length of the document skeleton shared by every file of this type.
pub fn skeleton_len<E: XmlEntry>() -> usize {
    E::HEADER.len() + E::FOOTER.len()
}
