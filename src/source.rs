use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use crate::api::{endpoints, ApiClient};
use crate::error::{empty_on_auth, ApiError, Result};
use crate::filter::FilterPayload;
use crate::models::ListingPage;

pub const PAGE_SIZE: u32 = 10;

/// Body of a listing call: the filter payload plus pagination.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRequest {
    #[serde(flatten)]
    pub filter: FilterPayload,
    pub page: u32,
    pub per_page: u32,
}

impl ListingRequest {
    pub fn new(filter: FilterPayload, page: u32) -> Self {
        Self {
            filter,
            page: page.max(1),
            per_page: PAGE_SIZE,
        }
    }

    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut fields = self.filter.form_fields();
        fields.push(("page".to_string(), self.page.to_string()));
        fields.push(("per_page".to_string(), self.per_page.to_string()));
        fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingEndpoint {
    /// Public filter endpoint, JSON body.
    FilterAll,
    /// User-aware search endpoint, multipart body.
    SearchAll,
    LastWeek,
    ByOccupation(i64),
    ByCountry(i64),
}

impl ListingEndpoint {
    pub fn path(&self, page: u32) -> String {
        match self {
            Self::FilterAll => endpoints::FILTER_ALL_JOBS.to_string(),
            Self::SearchAll => endpoints::SEARCH_ALL_JOBS.to_string(),
            Self::LastWeek => endpoints::LAST_WEEK_JOBS.to_string(),
            Self::ByOccupation(id) => format!("{}/{}?page={}", endpoints::OCCUPATION_WISE_JOBS, id, page),
            Self::ByCountry(id) => format!("{}/{}?page={}", endpoints::COUNTRY_WISE_JOBS, id, page),
        }
    }
}

/// Anything that can answer a listing request with one page of jobs.
#[async_trait::async_trait]
pub trait JobSource: Send + Sync {
    fn name(&self) -> String;
    async fn fetch_page(&self, request: &ListingRequest) -> Result<ListingPage>;
}

pub struct HttpJobSource {
    client: ApiClient,
    endpoint: ListingEndpoint,
}

impl HttpJobSource {
    pub fn new(client: ApiClient, endpoint: ListingEndpoint) -> Self {
        Self { client, endpoint }
    }
}

#[async_trait::async_trait]
impl JobSource for HttpJobSource {
    fn name(&self) -> String {
        format!("{:?}", self.endpoint)
    }

    async fn fetch_page(&self, request: &ListingRequest) -> Result<ListingPage> {
        let path = self.endpoint.path(request.page);
        let result = match self.endpoint {
            ListingEndpoint::FilterAll | ListingEndpoint::LastWeek => self.client.post_json(&path, request).await,
            ListingEndpoint::SearchAll => self.client.post_form(&path, &request.form_fields()).await,
            ListingEndpoint::ByOccupation(_) | ListingEndpoint::ByCountry(_) => self.client.get_json(&path).await,
        };

        // anonymous visitors still get a usable (empty) page
        let data = empty_on_auth(result)?;
        Ok(ListingPage::from_value(&data)?)
    }
}

/// Ordered list of equivalent sources. The first success wins; the call
/// fails only after every source has failed.
#[derive(Clone, Default)]
pub struct SourceChain {
    sources: Vec<Arc<dyn JobSource>>,
}

impl SourceChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl JobSource + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    /// The main job listing: filter endpoint first, user-aware search second.
    pub fn standard(client: &ApiClient) -> Self {
        Self::new()
            .with(HttpJobSource::new(client.clone(), ListingEndpoint::FilterAll))
            .with(HttpJobSource::new(client.clone(), ListingEndpoint::SearchAll))
    }

    pub fn scoped(client: &ApiClient, endpoint: ListingEndpoint) -> Self {
        Self::new().with(HttpJobSource::new(client.clone(), endpoint))
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub async fn fetch(&self, request: &ListingRequest) -> Result<ListingPage> {
        let mut last = None;
        for source in &self.sources {
            debug!("Requesting page {} from {}", request.page, source.name());
            match source.fetch_page(request).await {
                Ok(page) => return Ok(page),
                Err(e) => {
                    warn!("Job source {} failed: {}", source.name(), e);
                    last = Some(e);
                }
            }
        }
        match last {
            Some(e) => Err(ApiError::SourcesExhausted {
                attempts: self.sources.len(),
                last: Box::new(e),
            }),
            None => Err(ApiError::NoSources),
        }
    }
}
