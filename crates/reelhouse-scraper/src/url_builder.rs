use crate::error::Result;
use crate::site::SiteDefinition;
use url::Url;

/// Lower-case, hyphen-separated slug of a title.
///
/// Keeps alphanumerics, turns whitespace and hyphens into single hyphens
/// and drops everything else.
pub fn slugify(title: &str) -> String {
    let mut raw = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_alphanumeric() {
            raw.extend(c.to_lowercase());
        } else if c.is_whitespace() || c == '-' {
            raw.push('-');
        }
    }

    raw.split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Slug with the release year appended, for same-title re-releases.
pub fn slug_with_year(title: &str, year: i32) -> String {
    format!("{}-{year}", slugify(title))
}

/// Detail page URL for a slug.
pub fn page_url(site: &SiteDefinition, slug: &str) -> String {
    site.page_template
        .replace("{base}", site.base_url.trim_end_matches('/'))
        .replace("{slug}", slug)
}

/// Search page URL for a title, if the site supports search.
pub fn search_url(site: &SiteDefinition, title: &str) -> Option<String> {
    let template = site.search_template.as_ref()?;
    let query: String = url::form_urlencoded::byte_serialize(title.trim().as_bytes()).collect();
    Some(
        template
            .replace("{base}", site.base_url.trim_end_matches('/'))
            .replace("{query}", &query),
    )
}

/// Resolve a possibly relative link against the site root.
pub fn absolute_url(site: &SiteDefinition, href: &str) -> Result<String> {
    let base = Url::parse(&site.base_url)?;
    Ok(base.join(href)?.to_string())
}
