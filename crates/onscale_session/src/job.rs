use bytes::Bytes;
use onscale_core::constants::defaults::TAG_TYPE;
use onscale_core::prelude::*;
use std::path::{Component, Path, PathBuf};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{OnscaleError, Result};
use crate::fs::atomic_write;
use crate::poll::PollPolicy;
use crate::progress::ProgressTracker;

/// What [`JobHandle::stop`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// The job had already ended. Nothing was sent.
    AlreadyTerminal(JobStatus),
    /// The platform was asked to stop the job's simulations.
    Requested {
        stopped: Vec<String>,
        not_stopped: Vec<String>,
    },
}

/// Which result files [`JobHandle::download_results`] fetches.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ResultFilter {
    #[default]
    All,
    /// Exactly this file name.
    Name(String),
    /// Any of these extensions, with or without the leading dot.
    Extensions(Vec<String>),
}

impl ResultFilter {
    pub fn matches(&self, file: &JobFile) -> bool {
        match self {
            ResultFilter::All => true,
            ResultFilter::Name(name) => file.file_name == *name,
            ResultFilter::Extensions(extensions) => file.extension().is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|e| ext[1..].eq_ignore_ascii_case(e.trim_start_matches('.')))
            }),
        }
    }
}

/// Outcome of a batch download. One failed file doesn't stop the others.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<(String, OnscaleError)>,
}

impl DownloadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One remote job.
///
/// The handle keeps the last [`JobRecord`] it saw. Every other query goes to the platform.
#[derive(Clone)]
pub struct JobHandle<A: PortalApi> {
    api: A,
    record: JobRecord,
}

impl<A: PortalApi> std::fmt::Debug for JobHandle<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("portal", &self.api.portal())
            .field("record", &self.record)
            .finish()
    }
}

impl<A: PortalApi> JobHandle<A> {
    pub fn new(api: A, record: JobRecord) -> Self {
        Self { api, record }
    }

    pub fn id(&self) -> JobId {
        self.record.id()
    }

    pub fn name(&self) -> Option<&str> {
        self.record.job_name.as_deref()
    }

    /// The record as of the last fetch.
    pub fn snapshot(&self) -> &JobRecord {
        &self.record
    }

    pub async fn refresh(&mut self) -> Result<&JobRecord> {
        self.record = self.api.job_load(&self.id()).await?;
        Ok(&self.record)
    }

    /// The job's current remote status, fetched on every call.
    pub async fn status(&self) -> Result<JobStatus> {
        Ok(self.api.job_load(&self.id()).await?.status())
    }

    pub async fn file_list(&self) -> Result<Vec<JobFile>> {
        Ok(self.api.file_list(&self.id()).await?)
    }

    pub async fn blob_list(&self) -> Result<Vec<Blob>> {
        Ok(self.api.blob_list(self.id().as_str()).await?)
    }

    /// Downloads the job file called `name` into `dir` and returns the written path.
    pub async fn download_file(&self, name: &str, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let files = self.file_list().await?;
        let file = files
            .iter()
            .find(|f| f.file_name == name)
            .ok_or_else(|| OnscaleError::NotFound(format!("file '{name}' in job {}", self.id())))?;
        self.fetch(file, dir.as_ref()).await
    }

    async fn fetch(&self, file: &JobFile, dir: &Path) -> Result<PathBuf> {
        let target = dir.join(safe_relative_path(&file.file_name)?);
        let data = self
            .api
            .download_file(file)
            .await
            .map_err(|source| OnscaleError::Download {
                file: file.file_name.clone(),
                source,
            })?;
        atomic_write(&target, data)
            .await
            .map_err(|e| OnscaleError::Download {
                file: file.file_name.clone(),
                source: e.into(),
            })?;
        debug!(job_id = %self.id(), file = %file.file_name, "downloaded");
        Ok(target)
    }

    /// Downloads every result file the filter accepts into `dir`.
    pub async fn download_results(
        &self,
        dir: impl AsRef<Path>,
        filter: &ResultFilter,
    ) -> Result<DownloadReport> {
        let dir = dir.as_ref();
        let files = self.file_list().await?;

        let mut report = DownloadReport::default();
        for file in files.iter().filter(|f| f.is_result() && filter.matches(f)) {
            match self.fetch(file, dir).await {
                Ok(path) => report.succeeded.push(path),
                Err(e) => {
                    warn!(job_id = %self.id(), file = %file.file_name, error = %e, "result download failed");
                    report.failed.push((file.file_name.clone(), e));
                }
            }
        }
        info!(
            job_id = %self.id(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "downloaded results"
        );
        Ok(report)
    }

    /// Uploads a local file into the job's input directory under its base name.
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let (name, data) = read_upload(path.as_ref()).await?;
        self.upload_bytes(&name, data).await
    }

    pub async fn upload_bytes(&self, name: &str, data: Bytes) -> Result<()> {
        self.api
            .upload_file(&self.id(), name, data)
            .await
            .map_err(|source| OnscaleError::Upload {
                file: name.to_string(),
                source,
            })
    }

    /// Uploads a local file as a blob of the job and returns the blob id.
    pub async fn upload_blob(&self, blob_type: BlobType, path: impl AsRef<Path>) -> Result<String> {
        let (name, data) = read_upload(path.as_ref()).await?;
        self.api
            .upload_blob(&self.id(), blob_type, &name, data)
            .await
            .map_err(|source| OnscaleError::Upload { file: name, source })
    }

    /// Asks the platform to stop the job, unless it has already ended.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let status = self.status().await?;
        if status.is_terminal() {
            info!(job_id = %self.id(), %status, "job already ended");
            return Ok(StopOutcome::AlreadyTerminal(status));
        }

        let responses = self.api.job_stop(&self.id()).await?;
        let (stopped, not_stopped): (Vec<_>, Vec<_>) =
            responses.into_iter().partition(|r| r.stopped());
        let ids = |responses: Vec<StopSimulationResponse>| {
            responses
                .into_iter()
                .map(|r| r.simulation_id.unwrap_or_else(|| self.id().to_string()))
                .collect::<Vec<_>>()
        };
        let outcome = StopOutcome::Requested {
            stopped: ids(stopped),
            not_stopped: ids(not_stopped),
        };
        info!(job_id = %self.id(), ?outcome, "stop requested");
        Ok(outcome)
    }

    pub async fn stop_simulation(&self, simulation_id: &str) -> Result<bool> {
        Ok(self
            .api
            .simulation_stop(&self.id(), simulation_id)
            .await?
            .stopped())
    }

    fn project_tag(&self, tag: &str) -> Tag {
        Tag {
            item_id: self.id().to_string(),
            tag: tag.to_string(),
            tag_type: TAG_TYPE.to_string(),
        }
    }

    pub async fn tag(&self, tag: &str) -> Result<()> {
        Ok(self.api.tag(&self.project_tag(tag)).await?)
    }

    pub async fn untag(&self, tag: &str) -> Result<()> {
        Ok(self.api.untag(&self.project_tag(tag)).await?)
    }

    /// Project tags on this job.
    pub async fn tag_list(&self) -> Result<Vec<String>> {
        let tags = self.api.tag_list(self.id().as_str()).await?;
        Ok(tags
            .into_iter()
            .filter(|t| t.tag_type == TAG_TYPE)
            .map(|t| t.tag)
            .collect())
    }

    pub async fn rename(&mut self, name: &str) -> Result<()> {
        self.api.job_rename(&self.id(), name).await?;
        self.refresh().await?;
        Ok(())
    }

    pub async fn progress(&self) -> Result<JobProgress> {
        Ok(self.api.job_progress(&self.id()).await?)
    }

    /// Polls with backoff until the job ends, the policy times out or `cancel` fires.
    pub async fn wait_for_terminal(
        &mut self,
        policy: &PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<JobStatus> {
        self.wait(policy, cancel, None).await
    }

    /// Like [`wait_for_terminal`](Self::wait_for_terminal), folding the job's progress into
    /// `tracker` on every poll.
    pub async fn wait_with_progress(
        &mut self,
        policy: &PollPolicy,
        cancel: &CancellationToken,
        tracker: &mut ProgressTracker,
    ) -> Result<JobStatus> {
        self.wait(policy, cancel, Some(tracker)).await
    }

    async fn wait(
        &mut self,
        policy: &PollPolicy,
        cancel: &CancellationToken,
        mut tracker: Option<&mut ProgressTracker>,
    ) -> Result<JobStatus> {
        let deadline = policy.timeout.map(|t| Instant::now() + t);
        let mut interval = policy.initial_interval;

        loop {
            if cancel.is_cancelled() {
                return Err(OnscaleError::Cancelled);
            }

            let status = self.refresh().await?.status();
            if let Some(tracker) = tracker.as_deref_mut() {
                tracker.observe(&self.progress().await?);
            }
            debug!(job_id = %self.id(), %status, "polled");
            if status.is_terminal() {
                info!(job_id = %self.id(), %status, "job ended");
                return Ok(status);
            }

            let mut sleep_for = interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Err(OnscaleError::Timeout {
                        job_id: self.id(),
                        last_status: status,
                    });
                }
                sleep_for = sleep_for.min(deadline - now);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(OnscaleError::Cancelled),
                _ = tokio::time::sleep(sleep_for) => {}
            }
            interval = policy.next_interval(interval);
        }
    }
}

async fn read_upload(path: &Path) -> Result<(String, Bytes)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| OnscaleError::Validation(format!("bad file name {}", path.display())))?
        .to_string();
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| OnscaleError::Upload {
            file: name.clone(),
            source: e.into(),
        })?;
    Ok((name, Bytes::from(data)))
}

/// Remote file names may contain directories but must stay inside the target directory.
fn safe_relative_path(name: &str) -> Result<PathBuf> {
    let path = Path::new(name);
    let safe = !name.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if safe {
        Ok(path.to_path_buf())
    } else {
        Err(OnscaleError::Validation(format!(
            "refusing to write remote file '{name}' outside the target directory"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> JobFile {
        JobFile {
            file_name: name.into(),
            simulation_id: Some("s".into()),
            ..Default::default()
        }
    }

    #[test]
    fn filters() {
        assert!(ResultFilter::All.matches(&file("a.vtu")));
        assert!(ResultFilter::Name("a.vtu".into()).matches(&file("a.vtu")));
        assert!(!ResultFilter::Name("a.vtu".into()).matches(&file("b.vtu")));

        let ext = ResultFilter::Extensions(vec![".VTU".into(), "csv".into()]);
        assert!(ext.matches(&file("a.vtu")));
        assert!(ext.matches(&file("out/b.csv")));
        assert!(!ext.matches(&file("c.log")));
        assert!(!ext.matches(&file("noext")));
    }

    #[test]
    fn remote_names_stay_inside_the_directory() {
        assert_eq!(
            safe_relative_path("sim/out.vtu").unwrap(),
            PathBuf::from("sim/out.vtu")
        );
        assert!(safe_relative_path("../etc/passwd").is_err());
        assert!(safe_relative_path("/etc/passwd").is_err());
        assert!(safe_relative_path("").is_err());
    }
}
