use crate::domain::batch::{JobRun, JobRunRequest, JobRunState};
use crate::domain::ports::JobTrigger;
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Jobs API 2.1 client: `run-now` and `runs/get`.
#[derive(Debug, Clone)]
pub struct DatabricksClient {
    client: Client,
    host: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct RunGetResponse {
    state: JobRunState,
}

impl DatabricksClient {
    pub fn new(host: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/2.1/jobs/{}", self.host, path)
    }

    async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(EtlError::JobError {
            message: format!("{} returned HTTP {}: {}", action, status, body),
        })
    }
}

#[async_trait]
impl JobTrigger for DatabricksClient {
    async fn run_now(&self, request: &JobRunRequest) -> Result<JobRun> {
        tracing::debug!("POST {}", self.endpoint("run-now"));
        let response = self
            .client
            .post(self.endpoint("run-now"))
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await?;

        let run = Self::check(response, "run-now").await?.json::<JobRun>().await?;
        Ok(run)
    }

    async fn run_state(&self, run_id: i64) -> Result<JobRunState> {
        let response = self
            .client
            .get(self.endpoint("runs/get"))
            .bearer_auth(&self.token)
            .query(&[("run_id", run_id)])
            .send()
            .await?;

        let body = Self::check(response, "runs/get")
            .await?
            .json::<RunGetResponse>()
            .await?;
        Ok(body.state)
    }
}
