//! Pathway names scraped from the Reactome content site.

use super::{PathwayLookup, http_client, remote_failure, validate_gene_name};
use crate::config::EnrichmentConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

static RESULT_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.result-title").expect("Invalid selector: result title"));
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("Invalid selector: a"));
static DETAILS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("fieldset.fieldset-details").expect("Invalid selector: fieldset details")
});

/// Scrapes the Reactome search and detail pages for a gene.
pub struct ReactomeScraper {
    base_url: Url,
    client: Client,
}

static_assertions::assert_impl_all!(ReactomeScraper: Send, Sync);

impl ReactomeScraper {
    pub fn new() -> Result<Self> {
        Self::from_config(&EnrichmentConfig::default())
    }

    pub fn from_config(config: &EnrichmentConfig) -> Result<Self> {
        let base_url = Url::parse(&config.reactome_url).map_err(|e| {
            crate::error::VolcanoError::InvalidConfig(format!(
                "reactome_url '{}': {}",
                config.reactome_url, e
            ))
        })?;
        Ok(Self {
            base_url,
            client: http_client(config.timeout_secs)?,
        })
    }

    fn search_url(&self, gene: &str) -> std::result::Result<Url, url::ParseError> {
        let mut url = self.base_url.join("query")?;
        url.query_pairs_mut().append_pair("q", gene);
        Ok(url)
    }

    /// `None` on a non-200 response.
    fn fetch(&self, url: Url) -> std::result::Result<Option<String>, reqwest::Error> {
        let response = self.client.get(url).send()?;
        if response.status() != StatusCode::OK {
            debug!("Reactome returned {}", response.status());
            return Ok(None);
        }
        Ok(Some(response.text()?))
    }

    fn scrape(&self, gene: &str) -> std::result::Result<Vec<String>, String> {
        let search = self.search_url(gene).map_err(|e| e.to_string())?;
        let Some(page) = self.fetch(search).map_err(|e| e.to_string())? else {
            return Ok(Vec::new());
        };
        if is_no_results_page(&page, gene) {
            return Ok(Vec::new());
        }

        let Some(href) = first_result_link(&page) else {
            return Ok(Vec::new());
        };
        let detail = self.base_url.join(&href).map_err(|e| e.to_string())?;
        debug!("Following Reactome result {}", detail);

        match self.fetch(detail).map_err(|e| e.to_string())? {
            Some(page) => Ok(collect_pathway_names(&page)),
            None => Ok(Vec::new()),
        }
    }
}

impl PathwayLookup for ReactomeScraper {
    fn lookup(&self, gene: &str) -> Result<Vec<String>> {
        validate_gene_name(gene)?;
        self.scrape(gene).map_err(|reason| remote_failure(gene, reason))
    }

    fn name(&self) -> &str {
        "Reactome"
    }
}

fn is_no_results_page(html: &str, gene: &str) -> bool {
    let document = Html::parse_document(html);
    let text: String = document.root_element().text().collect();
    text.contains(&format!("No results found for {gene}"))
}

/// `href` of the first link inside the first search result title.
fn first_result_link(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let title = document.select(&RESULT_LINK).next()?;
    let anchor = title.select(&ANCHOR).next()?;
    anchor.value().attr("href").map(str::to_string)
}

fn child_elements<'a>(
    element: ElementRef<'a>,
    tag: &'static str,
) -> impl Iterator<Item = ElementRef<'a>> {
    element
        .children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == tag)
}

/// Walk the details fieldset and collect span labels.
///
/// Each outermost `div` is walked depth-first with an explicit stack; the
/// trimmed text of every direct `span` child of a visited `div` is kept.
fn collect_pathway_names(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Some(fieldset) = document.select(&DETAILS).next() else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for outer in child_elements(fieldset, "div") {
        let mut stack = vec![outer];
        while let Some(current) = stack.pop() {
            names.extend(
                child_elements(current, "span")
                    .map(|span| span.text().collect::<String>().trim().to_string()),
            );
            stack.extend(child_elements(current, "div"));
        }
    }
    names
}
