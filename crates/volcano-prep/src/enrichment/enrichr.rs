//! Enrichr gene-set library queries (<https://maayanlab.cloud/Enrichr>).
//!
//! A lookup submits a one-gene list, then queries every library whose name
//! carries the configured organism marker and collects the term names.

use super::{PathwayLookup, http_client, remote_failure, validate_gene_name};
use crate::config::EnrichmentConfig;
use crate::error::{Result, VolcanoError};
use once_cell::sync::OnceCell;
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct DatasetStatistics {
    statistics: Vec<LibraryStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibraryStatistics {
    library_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddListResponse {
    user_list_id: u64,
}

/// Library-style enrichment against the Enrichr API.
pub struct EnrichrClient {
    base_url: String,
    organism: String,
    client: Client,
    libraries: OnceCell<Vec<String>>,
}

static_assertions::assert_impl_all!(EnrichrClient: Send, Sync);

impl EnrichrClient {
    /// Client with the default endpoint, organism and timeout.
    pub fn new() -> Result<Self> {
        Self::from_config(&EnrichmentConfig::default())
    }

    pub fn from_config(config: &EnrichmentConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.enrichr_url.trim_end_matches('/').to_string(),
            organism: config.organism.clone(),
            client: http_client(config.timeout_secs)?,
            libraries: OnceCell::new(),
        })
    }

    /// Libraries whose name contains the organism marker.
    ///
    /// Fetched once and cached for the lifetime of the client.
    pub fn libraries(&self) -> Result<&[String]> {
        let libraries = self.libraries.get_or_try_init(|| {
            let stats: DatasetStatistics = self
                .client
                .get(format!("{}/datasetStatistics", self.base_url))
                .send()?
                .error_for_status()?
                .json()?;
            let names = organism_libraries(stats, &self.organism);
            debug!("{} Enrichr libraries match '{}'", names.len(), self.organism);
            Ok::<_, VolcanoError>(names)
        })?;
        Ok(libraries)
    }

    fn add_list(&self, gene: &str) -> Result<u64> {
        let form = multipart::Form::new()
            .text("list", format!("{gene}\n"))
            .text("description", format!("volcano-prep {gene}"));
        let response: AddListResponse = self
            .client
            .post(format!("{}/addList", self.base_url))
            .multipart(form)
            .send()?
            .error_for_status()?
            .json()?;
        Ok(response.user_list_id)
    }

    fn enrich(&self, user_list_id: u64, library: &str) -> Result<Vec<String>> {
        let body: Value = self
            .client
            .get(format!("{}/enrich", self.base_url))
            .query(&[
                ("userListId", user_list_id.to_string()),
                ("backgroundType", library.to_string()),
            ])
            .send()?
            .error_for_status()?
            .json()?;
        Ok(parse_enrich_terms(&body, library))
    }

    fn query(&self, gene: &str) -> Result<Vec<String>> {
        let libraries = self.libraries()?;
        let user_list_id = self.add_list(gene)?;

        let mut terms = Vec::new();
        for library in libraries {
            terms.extend(self.enrich(user_list_id, library)?);
        }
        Ok(terms)
    }
}

impl PathwayLookup for EnrichrClient {
    fn lookup(&self, gene: &str) -> Result<Vec<String>> {
        validate_gene_name(gene)?;
        self.query(gene).map_err(|e| remote_failure(gene, e))
    }

    fn name(&self) -> &str {
        "Enrichr"
    }
}

fn organism_libraries(stats: DatasetStatistics, organism: &str) -> Vec<String> {
    stats
        .statistics
        .into_iter()
        .map(|s| s.library_name)
        .filter(|name| name.contains(organism))
        .collect()
}

/// Term names from an `enrich` response.
///
/// The body maps the library name to rows of
/// `[rank, term, p, z, combined, genes, adjusted p, ...]`.
fn parse_enrich_terms(body: &Value, library: &str) -> Vec<String> {
    body.get(library)
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| row.get(1).and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
