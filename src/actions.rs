use log::{info, warn};
use serde_json::Value;

use crate::api::{endpoints, ApiClient};
use crate::error::{empty_on_auth, ApiError, Result};
use crate::models::{ActionAck, FlexibleId, JobListing, ListingPage};

fn job_form(job_id: &FlexibleId) -> Vec<(String, String)> {
    vec![("jobId".to_string(), job_id.to_string())]
}

/// The action endpoints answer `{message}` on success; anything else is
/// logged and treated as a bare acknowledgement.
fn ack_from(data: Value) -> ActionAck {
    match serde_json::from_value(data) {
        Ok(ack) => ack,
        Err(e) => {
            warn!("Unexpected action reply: {}", e);
            ActionAck::default()
        }
    }
}

fn list_or_empty(result: Result<Value>) -> Result<Vec<JobListing>> {
    empty_on_auth(result.and_then(|data| Ok(ListingPage::from_value(&data)?.jobs)))
}

impl ApiClient {
    fn require_token(&self) -> Result<()> {
        if self.has_token() {
            Ok(())
        } else {
            Err(ApiError::MissingToken)
        }
    }

    pub async fn apply_job(&self, job_id: &FlexibleId) -> Result<ActionAck> {
        self.require_token()?;
        let data = self.post_form(endpoints::APPLY_JOB, &job_form(job_id)).await?;
        info!("Applied to job {}", job_id);
        Ok(ack_from(data))
    }

    pub async fn save_job(&self, job_id: &FlexibleId) -> Result<ActionAck> {
        self.require_token()?;
        let data = self.post_form(endpoints::SAVE_JOB, &job_form(job_id)).await?;
        info!("Saved job {}", job_id);
        Ok(ack_from(data))
    }

    pub async fn saved_jobs(&self) -> Result<Vec<JobListing>> {
        if !self.has_token() {
            return Ok(Vec::new());
        }
        list_or_empty(self.get_json(endpoints::SAVED_JOBS).await)
    }

    pub async fn applied_jobs(&self) -> Result<Vec<JobListing>> {
        if !self.has_token() {
            return Ok(Vec::new());
        }
        list_or_empty(self.get_json(endpoints::APPLIED_JOBS).await)
    }
}
