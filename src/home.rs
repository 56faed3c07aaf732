use chrono::{DateTime, Utc};
use log::warn;

use crate::api::ApiClient;
use crate::cache::{CacheStore, ReferenceCache};
use crate::error::{empty_on_auth, ApiError};
use crate::filter::FilterPayload;
use crate::models::{Company, Institute, JobListing, ReferenceData};
use crate::source::{ListingEndpoint, ListingRequest, SourceChain};

/// Home page widgets. Each one loads on its own, so a failing widget leaves
/// the others intact.
pub struct HomePage {
    pub latest_jobs: Result<Vec<JobListing>, ApiError>,
    pub reference: Result<ReferenceData, ApiError>,
    pub institutes: Result<Vec<Institute>, ApiError>,
    pub companies: Result<Vec<Company>, ApiError>,
}

impl HomePage {
    pub async fn load<S: CacheStore>(client: &ApiClient, cache: &ReferenceCache<S>, now: DateTime<Utc>) -> Self {
        let latest = async {
            SourceChain::scoped(client, ListingEndpoint::LastWeek)
                .fetch(&ListingRequest::new(FilterPayload::default(), 1))
                .await
                .map(|page| page.jobs)
        };
        let institutes = async { empty_on_auth(client.institutes().await) };
        let companies = async { empty_on_auth(client.companies().await) };

        let (latest_jobs, reference, institutes, companies) =
            futures::join!(latest, cache.load(client, now), institutes, companies);

        let page = Self {
            latest_jobs,
            reference,
            institutes,
            companies,
        };
        for (widget, err) in page.failures() {
            warn!("Home widget '{}' failed: {}", widget, err);
        }
        page
    }

    pub fn failures(&self) -> Vec<(&'static str, &ApiError)> {
        [
            ("latest jobs", self.latest_jobs.as_ref().err()),
            ("reference data", self.reference.as_ref().err()),
            ("institutes", self.institutes.as_ref().err()),
            ("companies", self.companies.as_ref().err()),
        ]
        .into_iter()
        .filter_map(|(name, err)| err.map(|e| (name, e)))
        .collect()
    }

    /// Occupation title for a filter badge, falling back to the raw id.
    pub fn occupation_label(&self, id: i64) -> String {
        self.reference
            .as_ref()
            .ok()
            .and_then(|r| r.occupations.iter().find(|o| o.id.to_string() == id.to_string()))
            .map(|o| o.title.clone())
            .unwrap_or_else(|| format!("Occupation {}", id))
    }
}
