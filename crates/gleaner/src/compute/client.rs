//! Scheduler client capability: real REST client and a fake for harnesses.

use crate::error::{GleanerError, Result};
use gleaner_protocol::{ComputeJobStatus, DriverSpec, ExecutorSpec, JobFileConfig};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

const HTTP_TIMEOUT_SECS: u64 = 30;

/// Capability interface over the system that runs the distributed compute
/// job. One trait, two implementations selected by configuration.
pub trait SchedulerClient: Send + Sync {
    /// Returns false when the scheduler rejects the submission.
    fn create(
        &self,
        name: &str,
        file_config: &JobFileConfig,
        driver: &DriverSpec,
        executor: &ExecutorSpec,
    ) -> Result<bool>;

    /// Current lifecycle status plus the scheduler's raw status message.
    fn get(&self, name: &str) -> Result<(ComputeJobStatus, String)>;

    /// Returns false when there was nothing to delete.
    fn delete(&self, name: &str) -> Result<bool>;

    fn fetch_logs(&self, name: &str) -> Result<String>;
}

// ============================================================================
// REST client (compute platform console API)
// ============================================================================

#[derive(Serialize)]
struct SigninRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct SigninResponse {
    data: SigninData,
}

#[derive(Deserialize)]
struct SigninData {
    access_token: String,
}

#[derive(Serialize)]
struct CreateAppRequest<'a> {
    name: &'a str,
    image: &'a str,
    entry_file: &'a str,
    config_file: &'a str,
    dep_file: &'a str,
    driver: &'a DriverSpec,
    executor: &'a ExecutorSpec,
}

#[derive(Deserialize)]
struct AppResponse {
    data: AppData,
}

#[derive(Deserialize)]
struct AppData {
    #[serde(default)]
    state: String,
}

/// Client for the compute platform's console REST API.
///
/// Signs in once and caches the session token; all job operations are
/// bearer-authenticated.
pub struct RestSchedulerClient {
    http: reqwest::blocking::Client,
    base_url: String,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
}

impl RestSchedulerClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| GleanerError::Scheduler(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            token: Mutex::new(None),
        })
    }

    fn auth_token(&self) -> Result<String> {
        let mut token = self.token.lock().unwrap();
        if let Some(t) = token.as_ref() {
            return Ok(t.clone());
        }
        let url = format!("{}/api/v1/auth/signin", self.base_url);
        let response: SigninResponse = self
            .http
            .post(&url)
            .json(&SigninRequest {
                username: &self.username,
                password: &self.password,
            })
            .send()
            .map_err(|e| GleanerError::Scheduler(format!("signin request failed: {}", e)))?
            .error_for_status()
            .map_err(|e| GleanerError::Scheduler(format!("signin rejected: {}", e)))?
            .json()
            .map_err(|e| GleanerError::Scheduler(format!("malformed signin response: {}", e)))?;
        *token = Some(response.data.access_token.clone());
        Ok(response.data.access_token)
    }

    fn app_url(&self, name: &str) -> String {
        format!("{}/api/v1/sparkapps/{}", self.base_url, name)
    }

    /// Map the scheduler's free-form state strings onto the lifecycle enum.
    fn map_state(state: &str) -> ComputeJobStatus {
        match state.to_uppercase().as_str() {
            "COMPLETED" => ComputeJobStatus::Completed,
            "FAILED" | "SUBMISSION_FAILED" | "FAILING" => ComputeJobStatus::Failed,
            "" | "UNKNOWN" => ComputeJobStatus::Unknown,
            _ => ComputeJobStatus::Running,
        }
    }
}

impl SchedulerClient for RestSchedulerClient {
    fn create(
        &self,
        name: &str,
        file_config: &JobFileConfig,
        driver: &DriverSpec,
        executor: &ExecutorSpec,
    ) -> Result<bool> {
        let token = self.auth_token()?;
        let url = format!("{}/api/v1/sparkapps", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&CreateAppRequest {
                name,
                image: &file_config.image,
                entry_file: &file_config.entry_point,
                config_file: &file_config.config_path,
                dep_file: &file_config.dependent_package,
                driver,
                executor,
            })
            .send()
            .map_err(|e| GleanerError::Scheduler(format!("create request failed: {}", e)))?;
        debug!(name, status = %response.status(), "Create compute job");
        Ok(response.status().is_success())
    }

    fn get(&self, name: &str) -> Result<(ComputeJobStatus, String)> {
        let token = self.auth_token()?;
        let response = self
            .http
            .get(self.app_url(name))
            .bearer_auth(token)
            .send()
            .map_err(|e| GleanerError::Scheduler(format!("status request failed: {}", e)))?;
        if !response.status().is_success() {
            let message = format!("scheduler returned {}", response.status());
            return Ok((ComputeJobStatus::Unknown, message));
        }
        let body = response
            .text()
            .map_err(|e| GleanerError::Scheduler(format!("malformed status body: {}", e)))?;
        let state = serde_json::from_str::<AppResponse>(&body)
            .map(|r| r.data.state)
            .unwrap_or_default();
        Ok((Self::map_state(&state), body))
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let token = self.auth_token()?;
        let response = self
            .http
            .delete(self.app_url(name))
            .bearer_auth(token)
            .send()
            .map_err(|e| GleanerError::Scheduler(format!("delete request failed: {}", e)))?;
        Ok(response.status().is_success())
    }

    fn fetch_logs(&self, name: &str) -> Result<String> {
        let token = self.auth_token()?;
        let response = self
            .http
            .get(format!("{}/log", self.app_url(name)))
            .bearer_auth(token)
            .send()
            .map_err(|e| GleanerError::Scheduler(format!("log request failed: {}", e)))?;
        response
            .text()
            .map_err(|e| GleanerError::Scheduler(format!("malformed log body: {}", e)))
    }
}

// ============================================================================
// Fake client (test harnesses, dry runs)
// ============================================================================

/// Fake scheduler that reports every job as immediately completed.
///
/// Selected by configuration for harness runs where the compute layer is
/// exercised separately.
#[derive(Default)]
pub struct FakeSchedulerClient {
    created: Mutex<Vec<String>>,
}

impl FakeSchedulerClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of jobs submitted so far, in order.
    pub fn created_jobs(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

impl SchedulerClient for FakeSchedulerClient {
    fn create(
        &self,
        name: &str,
        _file_config: &JobFileConfig,
        _driver: &DriverSpec,
        _executor: &ExecutorSpec,
    ) -> Result<bool> {
        info!(name, "Fake scheduler accepted compute job");
        self.created.lock().unwrap().push(name.to_string());
        Ok(true)
    }

    fn get(&self, _name: &str) -> Result<(ComputeJobStatus, String)> {
        Ok((ComputeJobStatus::Completed, "fake scheduler".to_string()))
    }

    fn delete(&self, _name: &str) -> Result<bool> {
        Ok(true)
    }

    fn fetch_logs(&self, _name: &str) -> Result<String> {
        Ok(String::new())
    }
}
