//! Object key and public URL construction.

/// Join a blob directory and a filename into an object key.
///
/// Leading and trailing slashes on the directory are ignored; an empty
/// directory yields the bare filename.
pub fn object_key(directory: &str, filename: &str) -> String {
    let directory = directory.trim_matches('/');
    if directory.is_empty() {
        filename.to_string()
    } else {
        format!("{directory}/{filename}")
    }
}

/// Fully-qualified URL under which an object key is served.
pub fn public_url(site_base_url: &str, key: &str) -> String {
    format!(
        "{}/{}",
        site_base_url.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key() {
        assert_eq!(object_key("sitemaps/image", "image-00001.xml"), "sitemaps/image/image-00001.xml");
        assert_eq!(object_key("/sitemaps/", "a.xml"), "sitemaps/a.xml");
        assert_eq!(object_key("", "a.xml"), "a.xml");
    }

    #[test]
    fn test_public_url() {
        assert_eq!(
            public_url("https://ex.com", "sitemaps/a/a-1.xml"),
            "https://ex.com/sitemaps/a/a-1.xml"
        );
        assert_eq!(public_url("https://ex.com/", "/a.xml"), "https://ex.com/a.xml");
    }
}
