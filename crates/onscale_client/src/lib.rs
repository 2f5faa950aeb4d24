//! # OnScale Client
//!
//! An async HTTP client for an OnScale portal.
//!
//! [`PortalClient`] implements [`PortalApi`] over the portal's REST API and listens on the
//! user websocket while an estimate is computed. Every method is a single request: no
//! caching, no retries.
//!
//! ## Example: Listing jobs
//!
//! ```no_run
//! use onscale_client::{PortalClient, PortalClientConfig};
//! use onscale_core::prelude::*;
//!
//! async fn run() -> Result<(), PortalError> {
//!     let config = PortalClientConfig::for_portal(PortalTarget::Prod);
//!     let client = PortalClient::new(config, "my-developer-token");
//!
//!     let accounts = client.account_list().await?;
//!     for job in client.job_list(&accounts[0].account_id, Some(10)).await? {
//!         println!("{} {:?}", job.job_id, job.job_name);
//!     }
//!     Ok(())
//! }
//! ```

mod socket;
mod upload;

use onscale_core::constants::routes::*;
use onscale_core::prelude::*;

use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub use upload::fill_placeholders;

pub type Result<T> = std::result::Result<T, PortalError>;

/// Where and how a [`PortalClient`] talks to a portal.
#[derive(Debug, Clone)]
pub struct PortalClientConfig {
    pub portal: PortalTarget,
    /// REST base, e.g. `https://prod.portal.onscale.com/api`.
    pub api_url: String,
    /// Websocket base, e.g. `wss://prod.portal.onscale.com`.
    pub socket_url: String,
    /// Upper bound on the wait for estimate results.
    pub estimate_timeout: Duration,
    /// Per-request timeout. `None` leaves requests unbounded.
    pub request_timeout: Option<Duration>,
}

impl PortalClientConfig {
    pub fn for_portal(portal: PortalTarget) -> Self {
        Self {
            portal,
            api_url: portal.api_url(),
            socket_url: portal.socket_url(),
            estimate_timeout: Duration::from_secs(60 * 60),
            request_timeout: None,
        }
    }

    /// Points the client at a different host, keeping the portal label.
    pub fn with_urls(mut self, api_url: impl Into<String>, socket_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self.socket_url = socket_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_estimate_timeout(mut self, timeout: Duration) -> Self {
        self.estimate_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

impl Default for PortalClientConfig {
    fn default() -> Self {
        Self::for_portal(PortalTarget::default())
    }
}

#[derive(Clone)]
pub struct PortalClient {
    config: PortalClientConfig,
    client: Client,
    token: String,
}

impl PortalClient {
    pub fn new(config: PortalClientConfig, token: impl Into<String>) -> Self {
        Self {
            config,
            client: Client::new(),
            token: token.into(),
        }
    }

    pub fn config(&self) -> &PortalClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url, path)
    }

    fn auth_request(&self, builder: RequestBuilder) -> RequestBuilder {
        let builder = builder.header("Authorization", &self.token);
        match self.config.request_timeout {
            Some(timeout) => builder.timeout(timeout),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(transport_error)?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.send(self.auth_request(self.client.get(&url))).await?;
        parse_json(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self
            .send(self.auth_request(self.client.post(&url)).json(body))
            .await?;
        parse_json(response).await
    }

    /// Sends a JSON body and ignores whatever the platform answers on success.
    async fn send_unit<B>(&self, method: Method, path: &str, body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        debug!(%url, %method, "request");
        self.send(self.auth_request(self.client.request(method, &url)).json(body))
            .await?;
        Ok(())
    }

    /// Streams a file from disk into the job's input directory without buffering it.
    ///
    /// Required for very large files.
    pub async fn upload_stream(&self, job_id: &JobId, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PortalError::InvalidRequest(format!("bad file name {path:?}")))?
            .to_string();
        let target = self.upload_request(job_id).await?;
        upload::send_file(&self.client, &target, &name, path).await?;
        Ok(name)
    }

    async fn upload_request(&self, job_id: &JobId) -> Result<HttpRequest> {
        self.get_json(&JOB_UPLOAD_URL.replace("{id}", job_id.as_str()))
            .await
    }
}

impl PortalApi for PortalClient {
    fn portal(&self) -> PortalTarget {
        self.config.portal
    }

    async fn user_details(&self) -> Result<UserDetails> {
        self.get_json(USER_DETAILS).await
    }

    async fn account_list(&self) -> Result<Vec<Account>> {
        let entries: Vec<AccountListEntry> = self
            .post_json(ACCOUNT_LIST, &serde_json::json!({}))
            .await?;
        Ok(entries.into_iter().filter_map(|e| e.account).collect())
    }

    async fn hpc_list(&self, account_id: &str) -> Result<Vec<HpcDescriptor>> {
        let body = AccountRequest {
            account_id: account_id.to_string(),
        };
        self.post_json(ACCOUNT_HPC_LIST, &body).await
    }

    async fn account_balance(&self, account_id: &str) -> Result<AccountBalance> {
        let body = AccountRequest {
            account_id: account_id.to_string(),
        };
        self.post_json(ACCOUNT_BALANCE, &body).await
    }

    async fn job_init(&self, request: &JobInitRequest) -> Result<JobId> {
        let response: JobInitResponse = self.post_json(JOB_INIT, request).await?;
        Ok(JobId::new(response.job_id))
    }

    async fn job_load(&self, job_id: &JobId) -> Result<JobRecord> {
        let body = JobLoadRequest {
            job_id: job_id.to_string(),
            exclude_simulation: true,
            exclude_job_status: true,
        };
        self.post_json(JOB_LOAD, &body).await
    }

    async fn job_list(&self, account_id: &str, max: Option<usize>) -> Result<Vec<JobRecord>> {
        let body = JobListRequest {
            account_id: account_id.to_string(),
            max_num: max,
        };
        self.post_json(JOB_LIST, &body).await
    }

    async fn job_submit(&self, request: &JobSubmitRequest) -> Result<JobRecord> {
        self.post_json(JOB_SUBMIT, request).await
    }

    async fn job_rename(&self, job_id: &JobId, name: &str) -> Result<()> {
        let body = JobRenameRequest {
            job_id: job_id.to_string(),
            job_name: name.to_string(),
        };
        self.send_unit(Method::POST, JOB_RENAME, &body).await
    }

    async fn estimate(&self, request: &EstimateRequest) -> Result<EstimateResults> {
        // Subscribe before asking, the results may arrive before the POST returns.
        let url = format!("{}{}", self.config.socket_url, SOCKET_USER);
        let listener = socket::EstimateListener::connect(&url, &self.token).await?;

        let ticket: EstimateTicket = self.post_json(JOB_ESTIMATE, request).await?;
        debug!(job_id = %request.job_id, estimate_id = ?ticket.estimate_id, "estimate requested");

        listener
            .wait(&request.job_id, self.config.estimate_timeout)
            .await
    }

    async fn job_stop(&self, job_id: &JobId) -> Result<Vec<StopSimulationResponse>> {
        let body = JobRequest {
            job_id: job_id.to_string(),
        };
        self.post_json(JOB_STOP, &body).await
    }

    async fn simulation_stop(
        &self,
        job_id: &JobId,
        simulation_id: &str,
    ) -> Result<StopSimulationResponse> {
        let body = SimulationStopRequest {
            job_id: job_id.to_string(),
            simulation_id: simulation_id.to_string(),
        };
        self.post_json(JOB_SIMULATION_STOP, &body).await
    }

    async fn job_progress(&self, job_id: &JobId) -> Result<JobProgress> {
        let body = JobRequest {
            job_id: job_id.to_string(),
        };
        self.post_json(JOB_PROGRESS, &body).await
    }

    async fn file_list(&self, job_id: &JobId) -> Result<Vec<JobFile>> {
        self.get_json(&JOB_FILES.replace("{id}", job_id.as_str()))
            .await
    }

    async fn upload_file(&self, job_id: &JobId, name: &str, data: Bytes) -> Result<()> {
        let target = self.upload_request(job_id).await?;
        debug!(%job_id, name, size = data.len(), "uploading file");
        upload::send_bytes(&self.client, &target, name, data).await
    }

    async fn download_file(&self, file: &JobFile) -> Result<Bytes> {
        let Some(request) = &file.download_request else {
            return Err(PortalError::NotFound(format!(
                "no download link for {}",
                file.file_name
            )));
        };
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| PortalError::InvalidRequest(e.to_string()))?;

        debug!(file = %file.file_name, "downloading file");
        let mut builder = self.client.request(method, &request.uri);
        for (k, v) in &request.headers {
            builder = builder.header(k, v);
        }
        let response = self.send(builder).await?;
        response.bytes().await.map_err(transport_error)
    }

    async fn blob_list(&self, object_id: &str) -> Result<Vec<Blob>> {
        self.get_json(&BLOB_LIST.replace("{id}", object_id)).await
    }

    async fn upload_blob(
        &self,
        job_id: &JobId,
        blob_type: BlobType,
        name: &str,
        data: Bytes,
    ) -> Result<String> {
        let local_hash = hex::encode(Sha256::digest(&data));
        let metadata = BlobUploadRequest {
            object_id: job_id.to_string(),
            object_type: "JOB".to_string(),
            blob_type,
            file_size: data.len() as u64,
            hash: local_hash.clone(),
            blob_title: name.to_string(),
            blob_description: name.to_string(),
        };
        let form = reqwest::multipart::Form::new()
            .text("metadata", serde_json::to_string(&metadata)?)
            .part(
                "file",
                reqwest::multipart::Part::bytes(data.to_vec()).file_name(name.to_string()),
            );

        let url = self.url(BLOB_UPLOAD);
        debug!(%url, name, "POST blob");
        let response = self
            .send(self.auth_request(self.client.post(&url)).multipart(form))
            .await?;
        let blob: Blob = parse_json(response).await?;

        if blob.hash.as_deref().is_some_and(|h| h != local_hash) {
            warn!(blob_id = %blob.blob_id, "server hash mismatch");
        }
        Ok(blob.blob_id)
    }

    async fn tag(&self, tag: &Tag) -> Result<()> {
        self.send_unit(Method::POST, TAG_JOB, tag).await
    }

    async fn untag(&self, tag: &Tag) -> Result<()> {
        self.send_unit(Method::DELETE, TAG_JOB, tag).await
    }

    async fn tag_list(&self, item_id: &str) -> Result<Vec<Tag>> {
        let body = ItemIdRequest {
            item_id: item_id.to_string(),
        };
        self.post_json(TAG_LIST, &body).await
    }
}

pub(crate) fn transport_error(e: reqwest::Error) -> PortalError {
    if e.is_timeout() {
        PortalError::Timeout(e.to_string())
    } else {
        PortalError::Transport(e.to_string())
    }
}

/// Maps non-success responses onto [`PortalError`].
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    debug!(%status, body = %text, "request failed");

    Err(match status {
        StatusCode::UNAUTHORIZED if text.to_ascii_lowercase().contains("expired") => {
            AuthError::Expired.into()
        }
        StatusCode::UNAUTHORIZED => AuthError::Invalid.into(),
        StatusCode::FORBIDDEN => AuthError::Forbidden(text).into(),
        StatusCode::NOT_FOUND => PortalError::NotFound(text),
        s if s.is_client_error() => PortalError::InvalidRequest(text),
        s => PortalError::Remote {
            status: s.as_u16(),
            message: text,
        },
    })
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    Ok(serde_json::from_slice(&bytes)?)
}
