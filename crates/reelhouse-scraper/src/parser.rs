//! HTML extraction for search results and detail pages.

use crate::error::{Result, ScrapeError};
use crate::site::{PageSelectors, SiteDefinition};
use crate::url_builder::absolute_url;
use regex::Regex;
use reelhouse_core::{ScrapedRating, StreamingProvider};
use reelhouse_lists::ProviderAllowList;
use scraper::{ElementRef, Html};
use std::sync::OnceLock;

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b(\d{4})\b").expect("valid year regex"))
}

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid number regex"))
}

fn bar_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*([\d,]+)\b.*?\((\d+(?:\.\d+)?)%\)").expect("valid histogram regex")
    })
}

/// One entry on a search results page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    /// Displayed title
    pub title: String,
    /// Absolute link to the detail page
    pub url: String,
}

/// What a detail page yielded.
#[derive(Debug, Clone, PartialEq)]
pub enum PageData {
    /// Rating site payload
    Rating(ScrapedRating),
    /// Availability site payload, allow-listed and ranked
    Providers(Vec<StreamingProvider>),
}

/// Parses pages of one site.
pub struct PageParser<'a> {
    site: &'a SiteDefinition,
}

impl<'a> PageParser<'a> {
    /// Create a parser for a site.
    #[must_use]
    pub fn new(site: &'a SiteDefinition) -> Self {
        Self { site }
    }

    /// Release year shown on a detail page, if any.
    #[must_use]
    pub fn release_year(&self, html: &str) -> Option<i32> {
        let document = Html::parse_document(html);
        document
            .select(&self.site.year)
            .map(|el| element_text(&el))
            .find_map(|text| first_year(&text))
    }

    /// Search results in page order. Items without a link are skipped.
    pub fn search_results(&self, html: &str) -> Result<Vec<SearchHit>> {
        let document = Html::parse_document(html);
        let mut hits = Vec::new();

        for item in document.select(&self.site.search_item) {
            let Some(link) = item.select(&self.site.search_title).next() else {
                continue;
            };
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            hits.push(SearchHit {
                title: element_text(&link),
                url: absolute_url(self.site, href)?,
            });
        }

        Ok(hits)
    }

    /// First search result whose title is exactly `title`.
    pub fn find_exact(&self, html: &str, title: &str) -> Result<Option<SearchHit>> {
        let wanted = title.trim();
        Ok(self
            .search_results(html)?
            .into_iter()
            .find(|hit| hit.title == wanted))
    }

    /// Extract the detail page payload.
    pub fn page_data(
        &self,
        url: &str,
        html: &str,
        allow_list: &ProviderAllowList,
    ) -> Result<PageData> {
        let document = Html::parse_document(html);
        match &self.site.page {
            PageSelectors::Rating { rating, histogram } => {
                let bars: Vec<ElementRef<'_>> = document.select(histogram).collect();
                if bars.is_empty() {
                    return Err(ScrapeError::ShapeMismatch {
                        url: url.to_string(),
                        reason: "no histogram bars".to_string(),
                    });
                }

                let (histogram_counts, histogram_weights): (Vec<u64>, Vec<f64>) =
                    bars.iter().map(parse_bar).unzip();

                let average = rating
                    .as_ref()
                    .and_then(|sel| document.select(sel).next())
                    .and_then(|el| {
                        el.value()
                            .attr("title")
                            .and_then(first_number)
                            .or_else(|| first_number(&element_text(&el)))
                    })
                    .unwrap_or_else(|| average_from_weights(&histogram_weights));

                Ok(PageData::Rating(ScrapedRating {
                    average,
                    histogram_counts,
                    histogram_weights,
                }))
            }
            PageSelectors::Availability { offer, name_attr } => {
                let names: Vec<&str> = document
                    .select(offer)
                    .filter_map(|el| el.value().attr(name_attr))
                    .collect();
                Ok(PageData::Providers(allow_list.filter(names)))
            }
        }
    }
}

/// Count and share of one histogram bar.
///
/// The bar's tooltip reads like `"1,234 ★★★½ ratings (12%)"`, either on the
/// bar itself or on a child element. Bars without a tooltip are empty.
fn parse_bar(bar: &ElementRef<'_>) -> (u64, f64) {
    let tooltip = bar
        .value()
        .attr("title")
        .or_else(|| {
            bar.descendants()
                .filter_map(ElementRef::wrap)
                .find_map(|el| el.value().attr("title"))
        })
        .unwrap_or_default();

    bar_pattern()
        .captures(tooltip)
        .map_or((0, 0.0), |caps| {
            let count = caps[1].replace(',', "").parse().unwrap_or(0);
            let weight = caps[2].parse().unwrap_or(0.0);
            (count, weight)
        })
}

/// Average implied by the bucket shares.
///
/// Buckets are half-star steps starting at 0.5, lowest first.
#[must_use]
pub fn average_from_weights(weights: &[f64]) -> f64 {
    weights
        .iter()
        .enumerate()
        .map(|(i, weight)| {
            #[allow(clippy::cast_precision_loss)]
            let bucket = i as f64 * 0.5 + 0.5;
            bucket * weight * 0.01
        })
        .sum()
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn first_year(text: &str) -> Option<i32> {
    year_pattern()
        .captures(text)
        .and_then(|caps| caps[1].parse().ok())
}

fn first_number(text: &str) -> Option<f64> {
    number_pattern()
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelhouse_core::{ScraperKind, SiteConfig};
    use std::collections::BTreeMap;

    fn rating_site() -> SiteDefinition {
        SiteDefinition::compile(ScraperKind::Rating, &SiteConfig::rating_default())
            .expect("compile rating site")
    }

    fn availability_site() -> SiteDefinition {
        SiteDefinition::compile(ScraperKind::Availability, &SiteConfig::availability_default())
            .expect("compile availability site")
    }

    const RATING_PAGE: &str = r#"
        <html><body>
          <section class="film-header">
            <h1>Dune</h1>
            <small class="number"><a href="/films/year/2021/">2021</a></small>
          </section>
          <a class="display-rating" title="Weighted average of 3.85 based on 1,234 ratings">3.9</a>
          <ul>
            <li class="rating-histogram-bar"><a class="ir" title="1,200 half-★ ratings (2%)"></a></li>
            <li class="rating-histogram-bar"><a class="ir" title="12 ★ ratings (1%)"></a></li>
            <li class="rating-histogram-bar"></li>
            <li class="rating-histogram-bar"><a class="ir" title="34,567 ★★ ratings (97%)"></a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_release_year() {
        let site = rating_site();
        let parser = PageParser::new(&site);
        assert_eq!(parser.release_year(RATING_PAGE), Some(2021));
        assert_eq!(parser.release_year("<html><body></body></html>"), None);
    }

    #[test]
    fn test_release_year_strips_parentheses() {
        let site = availability_site();
        let parser = PageParser::new(&site);
        let html = r#"<div class="title-block"><h1>Drive</h1><span class="text-muted">(2011)</span></div>"#;
        assert_eq!(parser.release_year(html), Some(2011));
    }

    #[test]
    fn test_rating_page() {
        let site = rating_site();
        let parser = PageParser::new(&site);
        let data = parser
            .page_data("https://letterboxd.com/film/dune/", RATING_PAGE, &ProviderAllowList::default())
            .expect("parse rating page");

        let PageData::Rating(rating) = data else {
            panic!("expected rating payload");
        };
        assert!((rating.average - 3.85).abs() < f64::EPSILON);
        assert_eq!(rating.histogram_counts, vec![1200, 12, 0, 34567]);
        assert_eq!(rating.histogram_weights, vec![2.0, 1.0, 0.0, 97.0]);
    }

    #[test]
    fn test_rating_falls_back_to_histogram_average() {
        let site = rating_site();
        let parser = PageParser::new(&site);
        let html = r#"
            <li class="rating-histogram-bar"><a title="10 ratings (50%)"></a></li>
            <li class="rating-histogram-bar"><a title="10 ratings (50%)"></a></li>
        "#;
        let PageData::Rating(rating) = parser
            .page_data("u", html, &ProviderAllowList::default())
            .expect("parse rating page")
        else {
            panic!("expected rating payload");
        };
        // 0.5 * 0.5 + 1.0 * 0.5
        assert!((rating.average - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_rating_page_without_histogram_is_shape_mismatch() {
        let site = rating_site();
        let parser = PageParser::new(&site);
        let err = parser
            .page_data("u", "<html><body><p>moved</p></body></html>", &ProviderAllowList::default())
            .expect_err("no histogram");
        assert!(matches!(err, ScrapeError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_availability_page_filters_providers() {
        let site = availability_site();
        let parser = PageParser::new(&site);
        let allow = ProviderAllowList::new(
            ["Tubi TV", "Pluto TV", "Freevee"],
            BTreeMap::from([("Amazon Freevee".to_string(), "Freevee".to_string())]),
        );
        let html = r#"
            <div class="buybox-row stream">
              <a class="offer"><img alt="Netflix"></a>
              <a class="offer"><img alt="Amazon Freevee"></a>
              <a class="offer"><img alt="Tubi TV"></a>
            </div>
            <div class="buybox-row rent">
              <a class="offer"><img alt="Pluto TV"></a>
            </div>
        "#;

        let PageData::Providers(providers) = parser
            .page_data("u", html, &allow)
            .expect("parse availability page")
        else {
            panic!("expected providers payload");
        };
        let names: Vec<&str> = providers.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Tubi TV", "Freevee"]);
    }

    #[test]
    fn test_find_exact_search_hit() {
        let site = rating_site();
        let parser = PageParser::new(&site);
        let html = r#"
            <ul class="results">
              <li><span class="film-title-wrapper"><a href="/film/dune-1984/">Dune Part Two</a></span></li>
              <li><span class="film-title-wrapper"><a href="/film/dune-2021/">Dune</a></span></li>
              <li><span class="film-title-wrapper">no link</span></li>
            </ul>
        "#;

        assert_eq!(parser.search_results(html).expect("parse results").len(), 2);
        let hit = parser
            .find_exact(html, "Dune")
            .expect("parse results")
            .expect("exact match");
        assert_eq!(hit.url, "https://letterboxd.com/film/dune-2021/");
        assert!(parser.find_exact(html, "Dun").expect("parse results").is_none());
    }
}
