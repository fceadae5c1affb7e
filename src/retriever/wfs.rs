//! WFS GetFeature retriever
//!
//! Requests GeoJSON from an OGC WFS endpoint. With a page size configured,
//! the layer is fetched in `count`/`startIndex` pages which are merged into
//! one FeatureCollection before anything is returned.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ServiceConfig;
use crate::error::{FetchError, ParseError, Result, SerializationError};
use crate::geo::ReferenceSystemCode;

use super::{FeatureRetriever, FetchRequest};

/// Output format requested from the service
pub const GEOJSON_OUTPUT_FORMAT: &str = "application/json";

/// Query parameters owned by the retriever (lower-cased)
const RESERVED_PARAMS: &[&str] = &[
    "service",
    "request",
    "version",
    "typename",
    "typenames",
    "outputformat",
    "srsname",
    "count",
    "maxfeatures",
    "startindex",
];

/// Retriever for OGC WFS services
pub struct WfsRetriever {
    client: Client,
    version: String,
    page_size: u64,
    standard_projection: ReferenceSystemCode,
}

impl WfsRetriever {
    /// Create a retriever from service configuration
    ///
    /// # Arguments
    /// * `config` - Timeout, page size, protocol version and user agent
    ///
    /// # Returns
    /// * `Result<Self>` - New retriever or error if the HTTP client cannot be built
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(FetchError::from)?;

        Ok(Self {
            client,
            version: config.wfs_version.clone(),
            page_size: config.page_size,
            standard_projection: ReferenceSystemCode::wgs84(),
        })
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Projection requested when native coordinates are not wanted
    pub fn with_standard_projection(mut self, code: ReferenceSystemCode) -> Self {
        self.standard_projection = code;
        self
    }

    fn is_wfs2(&self) -> bool {
        self.version.starts_with('2')
    }

    /// `srsName` for a request, `None` lets the service use the layer default
    fn srs_name(&self, request: &FetchRequest) -> Option<String> {
        if request.wants_native_coordinates() {
            request
                .layer
                .default_projection
                .as_ref()
                .map(|code| code.label().to_string())
        } else {
            Some(self.standard_projection.as_str().to_string())
        }
    }

    /// Build a GetFeature URL
    ///
    /// Query parameters already present on the service URL are kept unless
    /// the retriever sets them itself.
    ///
    /// # Arguments
    /// * `request` - What to retrieve
    /// * `count` - Page size or cap, `None` for no limit
    /// * `start_index` - Offset of the first feature
    ///
    /// # Returns
    /// * `Result<Url>` - Request URL or `FetchError::InvalidUrl`
    pub fn build_url(
        &self,
        request: &FetchRequest,
        count: Option<u64>,
        start_index: u64,
    ) -> Result<Url> {
        let mut url = Url::parse(request.service_url.trim())
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", request.service_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(request.service_url.clone()).into());
        }

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !RESERVED_PARAMS.contains(&key.to_ascii_lowercase().as_str()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        let wfs2 = self.is_wfs2();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in &kept {
                query.append_pair(key, value);
            }
            query
                .append_pair("service", "WFS")
                .append_pair("version", &self.version)
                .append_pair("request", "GetFeature")
                .append_pair(if wfs2 { "typeNames" } else { "typeName" }, &request.layer_id)
                .append_pair("outputFormat", GEOJSON_OUTPUT_FORMAT);
            if let Some(srs) = self.srs_name(request) {
                query.append_pair("srsName", &srs);
            }
            if let Some(count) = count {
                let key = if wfs2 { "count" } else { "maxFeatures" };
                query.append_pair(key, &count.to_string());
            }
            if start_index > 0 {
                query.append_pair("startIndex", &start_index.to_string());
            }
        }
        Ok(url)
    }

    /// GET a URL and return the body of a successful, non-exception response
    async fn get(&self, url: Url) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from)?;

        let status = response.status();
        let body = response.text().await.map_err(FetchError::from)?;
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }
        if let Some(message) = exception_message(&body) {
            return Err(FetchError::ServiceException(message).into());
        }
        Ok(body)
    }

    async fn get_page(&self, url: Url) -> Result<Value> {
        let body = self.get(url).await?;
        parse_page(&body)
    }

    async fn fetch_paged(&self, request: &FetchRequest) -> Result<String> {
        let cap = request.max_features;
        let mut pages: Vec<Value> = Vec::new();
        let mut first_features: HashSet<String> = HashSet::new();
        let mut fetched = 0u64;

        loop {
            let wanted = if cap > 0 {
                self.page_size.min(cap - fetched)
            } else {
                self.page_size
            };
            let page = self.get_page(self.build_url(request, Some(wanted), fetched)?).await?;
            let features = page_features(&page)?;
            let returned = features.len() as u64;

            // A repeated leading feature means the service ignores startIndex
            if let Some(first) = features.first() {
                if !first_features.insert(first.to_string()) {
                    warn!(
                        "Service repeated an earlier page at offset {} of '{}'",
                        fetched, request.layer_id
                    );
                    return Err(FetchError::PagingIgnored { offset: fetched }.into());
                }
            }
            let matched = number_matched(&page);

            fetched += returned;
            pages.push(page);
            debug!("Page {} returned {} feature(s), {} so far", pages.len(), returned, fetched);

            if returned == 0 || (cap > 0 && fetched >= cap) {
                break;
            }
            match matched {
                Some(total) if fetched >= total => break,
                Some(_) => {
                    if returned < wanted {
                        debug!("Short page of {} while more features are matched", returned);
                    }
                }
                None if returned < wanted => break,
                None => {}
            }
        }

        info!(
            "Retrieved {} feature(s) of '{}' in {} page(s)",
            fetched,
            request.layer_id,
            pages.len()
        );
        merge_pages(pages)
    }
}

#[async_trait]
impl FeatureRetriever for WfsRetriever {
    async fn fetch(&self, request: &FetchRequest) -> Result<String> {
        if self.page_size == 0 {
            let count = request.is_capped().then_some(request.max_features);
            let body = self.get(self.build_url(request, count, 0)?).await?;
            parse_page(&body)?;
            return Ok(body);
        }
        self.fetch_paged(request).await
    }
}

/// Parse a GetFeature response, rejecting exception reports and non-collections
fn parse_page(body: &str) -> Result<Value> {
    let page: Value =
        serde_json::from_str(body).map_err(|e| ParseError::InvalidJson(e.to_string()))?;
    if let Some(message) = json_exception_message(&page) {
        return Err(FetchError::ServiceException(message).into());
    }
    page_features(&page)?;
    Ok(page)
}

fn page_features(page: &Value) -> Result<&Vec<Value>> {
    page.get("features").and_then(Value::as_array).ok_or_else(|| {
        let kind = page.get("type").and_then(Value::as_str).unwrap_or("<missing>");
        ParseError::NotAFeatureCollection(kind.to_string()).into()
    })
}

/// `numberMatched` (WFS 2.0) or `totalFeatures` (GeoServer), when numeric
fn number_matched(page: &Value) -> Option<u64> {
    page.get("numberMatched")
        .and_then(Value::as_u64)
        .or_else(|| page.get("totalFeatures").and_then(Value::as_u64))
}

/// Merge GeoJSON pages into one FeatureCollection payload
pub(crate) fn merge_pages(pages: Vec<Value>) -> Result<String> {
    let mut pages = pages.into_iter();
    let Some(mut merged) = pages.next() else {
        return Err(ParseError::InvalidJson("service returned no pages".to_string()).into());
    };

    for page in pages {
        let Value::Object(mut page) = page else {
            continue;
        };
        if let Some(Value::Array(features)) = page.remove("features") {
            if let Some(Value::Array(all)) = merged.get_mut("features") {
                all.extend(features);
            }
        }
    }

    let total = merged
        .get("features")
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    if let Value::Object(map) = &mut merged {
        if map.contains_key("numberReturned") {
            map.insert("numberReturned".to_string(), Value::from(total));
        }
    }

    serde_json::to_string(&merged).map_err(|e| SerializationError::Json(e.to_string()).into())
}

/// Message of an XML exception report, if the body is one
fn exception_message(body: &str) -> Option<String> {
    let trimmed = body.trim_start();
    if !trimmed.starts_with('<') {
        return None;
    }

    let text = ["ExceptionText", "ServiceException"]
        .iter()
        .find_map(|tag| element_text(trimmed, tag));
    Some(text.unwrap_or_else(|| trimmed.chars().take(200).collect()))
}

/// Text of the first non-empty element with local name `tag`
fn element_text(xml: &str, tag: &str) -> Option<String> {
    xml.split('<').find_map(|segment| {
        if segment.starts_with(['/', '?', '!']) {
            return None;
        }
        let (head, text) = segment.split_once('>')?;
        let name = head.split_whitespace().next()?;
        let local = name.rsplit(':').next()?;
        let text = text.trim();
        (local == tag && !text.is_empty()).then(|| text.to_string())
    })
}

/// Message of a JSON exception report (`{"exceptions": [{"text": ...}]}`)
fn json_exception_message(page: &Value) -> Option<String> {
    let exceptions = page.get("exceptions")?.as_array()?;
    let texts: Vec<&str> = exceptions
        .iter()
        .filter_map(|e| e.get("text").and_then(Value::as_str))
        .collect();
    if texts.is_empty() {
        Some("service reported an exception".to_string())
    } else {
        Some(texts.join("; "))
    }
}
