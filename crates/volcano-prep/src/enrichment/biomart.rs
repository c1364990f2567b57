//! Protein-coding gene names from Ensembl BioMart.

use super::http_client;
use crate::config::EnrichmentConfig;
use crate::error::Result;
use reqwest::blocking::Client;
use std::collections::HashSet;
use tracing::info;

/// Downloads gene lists from a BioMart `martservice` endpoint.
pub struct BiomartClient {
    base_url: String,
    dataset: String,
    client: Client,
}

impl BiomartClient {
    pub fn new() -> Result<Self> {
        Self::from_config(&EnrichmentConfig::default())
    }

    pub fn from_config(config: &EnrichmentConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.biomart_url.clone(),
            dataset: config.biomart_dataset.clone(),
            client: http_client(config.timeout_secs)?,
        })
    }

    /// External names of every protein-coding gene in the dataset.
    pub fn protein_coding_genes(&self) -> Result<HashSet<String>> {
        let body = self
            .client
            .get(&self.base_url)
            .query(&[("query", protein_coding_query(&self.dataset))])
            .send()?
            .error_for_status()?
            .text()?;

        let genes = parse_gene_list(&body);
        info!(
            "Downloaded {} protein-coding genes for {}",
            genes.len(),
            self.dataset
        );
        Ok(genes)
    }
}

fn protein_coding_query(dataset: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><!DOCTYPE Query><Query virtualSchemaName="default" formatter="TSV" header="0" uniqueRows="1" count="" datasetConfigVersion="0.6"><Dataset name="{dataset}" interface="default"><Filter name="biotype" value="protein_coding"/><Attribute name="external_gene_name"/></Dataset></Query>"#
    )
}

/// First tab-separated field of each non-empty line.
fn parse_gene_list(body: &str) -> HashSet<String> {
    body.lines()
        .filter_map(|line| line.split('\t').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_gene_list() {
        let genes = parse_gene_list("Actb\nGapdh\n\nSox2\tENSMUSG0001\nActb\n");
        assert_eq!(genes.len(), 3);
        assert!(genes.contains("Sox2"));
    }

    #[test]
    fn test_query_names_dataset() {
        let query = protein_coding_query("mmusculus_gene_ensembl");
        assert!(query.contains(r#"<Dataset name="mmusculus_gene_ensembl""#));
        assert!(query.contains(r#"value="protein_coding""#));
    }
}
