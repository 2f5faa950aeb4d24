use futures_util::StreamExt;
use onscale_core::prelude::*;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::Result;

/// A connection to the user socket, opened before an estimate is requested.
pub(crate) struct EstimateListener {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl EstimateListener {
    pub(crate) async fn connect(url: &str, token: &str) -> Result<Self> {
        let mut req = url
            .into_client_request()
            .map_err(|e| PortalError::InvalidRequest(e.to_string()))?;
        let header_val =
            HeaderValue::from_str(token).map_err(|e| PortalError::InvalidRequest(e.to_string()))?;
        req.headers_mut().insert("Authorization", header_val);

        let (stream, _) = tokio_tungstenite::connect_async(req)
            .await
            .map_err(|e| match e {
                WsError::Http(res) if res.status().as_u16() == 401 => {
                    PortalError::Auth(AuthError::Invalid)
                }
                WsError::Http(res) => PortalError::Remote {
                    status: res.status().as_u16(),
                    message: "Handshake rejected".into(),
                },
                _ => PortalError::Transport(e.to_string()),
            })?;

        debug!(%url, "user socket connected");
        Ok(Self { stream })
    }

    /// Reads messages until the estimate for `job_id` completes, fails, or `timeout` elapses.
    pub(crate) async fn wait(mut self, job_id: &str, timeout: Duration) -> Result<EstimateResults> {
        let outcome = tokio::time::timeout(timeout, self.next_outcome(job_id)).await;
        let _ = self.stream.close(None).await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(PortalError::Timeout(format!(
                "no estimate for job {job_id} after {timeout:?}"
            ))),
        }
    }

    async fn next_outcome(&mut self, job_id: &str) -> Result<EstimateResults> {
        while let Some(msg) = self.stream.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => return Err(PortalError::Transport(e.to_string())),
            };

            let value: serde_json::Value = match serde_json::from_str(text.as_str()) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Websocket message is not valid JSON: {e}");
                    continue;
                }
            };
            let for_other_job = value
                .get("jobId")
                .and_then(|v| v.as_str())
                .is_some_and(|other| other != job_id);
            if for_other_job {
                continue;
            }

            let event: EstimateEvent = match serde_json::from_value(value) {
                Ok(ev) => ev,
                Err(e) => {
                    debug!("ignoring socket message: {e}");
                    continue;
                }
            };

            match event {
                EstimateEvent::Results(results) => return Ok(results),
                EstimateEvent::Error { message } => {
                    return Err(PortalError::Remote {
                        status: 0,
                        message: message.unwrap_or_else(|| "estimate failed".into()),
                    });
                }
                ev @ EstimateEvent::Status { .. } if ev.is_failure() => {
                    return Err(PortalError::Remote {
                        status: 0,
                        message: "the estimator failed".into(),
                    });
                }
                EstimateEvent::Status { status } => debug!(%status, "estimate status"),
                EstimateEvent::Progress { finished, total } => {
                    debug!(finished, total, "estimate progress")
                }
            }
        }

        Err(PortalError::Transport(
            "user socket closed before the estimate finished".into(),
        ))
    }
}
