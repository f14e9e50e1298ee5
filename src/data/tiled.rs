//! Tiled HTTP API integration for databroker catalogs.

use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::config::ServerSettings;
use crate::data::ScanSource;
use crate::data::document::{parse_header, parse_table};
use crate::domain::{Scan, ScanHeader, ScanRef};
use crate::error::AppError;

const API_PREFIX: &str = "api/v1";

pub struct TiledClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    catalog: String,
}

impl TiledClient {
    pub fn new(settings: &ServerSettings, catalog: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            catalog: catalog.trim_matches('/').to_string(),
        }
    }

    pub fn from_env(catalog: &str) -> Result<Self, AppError> {
        Ok(Self::new(&ServerSettings::from_env()?, catalog))
    }

    fn url(&self, route: &str, path: &str) -> String {
        format!("{}/{API_PREFIX}/{route}/{}{path}", self.base_url, self.catalog)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let req = self.client.get(url);
        match &self.api_key {
            Some(key) => req.header("Authorization", format!("Apikey {key}")),
            None => req,
        }
    }

    fn send(&self, req: RequestBuilder, what: &str) -> Result<Value, AppError> {
        let resp = req
            .send()
            .map_err(|e| AppError::runtime(format!("Tiled request for {what} failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::runtime(format!(
                "Tiled request for {what} failed with status {}.",
                resp.status()
            )));
        }

        resp.json()
            .map_err(|e| AppError::runtime(format!("Failed to parse Tiled response for {what}: {e}")))
    }

    /// Resolve a scan reference to its start document.
    pub fn resolve(&self, scan: &ScanRef) -> Result<ScanHeader, AppError> {
        let search = self.url("search", "");
        let body = match scan {
            ScanRef::Id(id) => {
                let id = id.to_string();
                let req = self.get(&search).query(&[
                    ("filter[eq][condition][key]", "scan_id"),
                    ("filter[eq][condition][value]", id.as_str()),
                    ("sort", "-time"),
                    ("page[limit]", "1"),
                ]);
                self.send(req, &format!("scan {scan}"))?
            }
            ScanRef::Recent(n) => {
                let offset = n.saturating_sub(1).to_string();
                let req = self.get(&search).query(&[
                    ("sort", "-time"),
                    ("page[offset]", offset.as_str()),
                    ("page[limit]", "1"),
                ]);
                self.send(req, &format!("scan {scan}"))?
            }
            ScanRef::Uid(uid) => {
                let req = self.get(&self.url("metadata", &format!("/{uid}")));
                self.send(req, &format!("scan {scan}"))?
            }
        };

        let start = match scan {
            ScanRef::Uid(_) => {
                let node: NodeResponse = serde_json::from_value(body)
                    .map_err(|e| AppError::runtime(format!("Unexpected Tiled metadata: {e}")))?;
                node.data.attributes.metadata.start
            }
            _ => {
                let page: SearchResponse = serde_json::from_value(body)
                    .map_err(|e| AppError::runtime(format!("Unexpected Tiled search result: {e}")))?;
                page.data
                    .into_iter()
                    .next()
                    .map(|item| item.attributes.metadata.start)
                    .ok_or_else(|| {
                        AppError::usage(format!("Scan {scan} not found in catalog '{}'.", self.catalog))
                    })?
            }
        };
        parse_header(&start)
    }

    /// Numeric columns of the primary stream.
    pub fn fetch_table(&self, header: &ScanHeader) -> Result<Map<String, Value>, AppError> {
        let url = self.url("node/full", &format!("/{}/primary/data", header.uid));
        let req = self.get(&url).query(&[("format", "application/json")]);
        match self.send(req, &format!("scan {} data", header.scan_id))? {
            Value::Object(map) => Ok(map),
            _ => Err(AppError::runtime(format!(
                "Scan {} data is not a table of columns.",
                header.scan_id
            ))),
        }
    }
}

impl ScanSource for TiledClient {
    fn fetch(&self, scan: &ScanRef) -> Result<Scan, AppError> {
        let header = self.resolve(scan)?;
        log::info!("fetching scan {} ({})", header.scan_id, header.uid);
        let table = parse_table(&self.fetch_table(&header)?)?.order_for(&header);
        Ok(Scan { header, table })
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    data: Vec<NodeItem>,
}

#[derive(Debug, Deserialize)]
struct NodeResponse {
    data: NodeItem,
}

#[derive(Debug, Deserialize)]
struct NodeItem {
    attributes: NodeAttributes,
}

#[derive(Debug, Deserialize)]
struct NodeAttributes {
    metadata: RunMetadata,
}

#[derive(Debug, Deserialize)]
struct RunMetadata {
    start: Value,
}
