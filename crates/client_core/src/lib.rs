use std::{sync::Arc, time::Duration};

use anyhow::Result;
use capture::{encode_jpeg_data_url, CaptureError, FrameSource, VideoFrame};
use reqwest::Client;
use shared::protocol::{CheckinRequest, CheckinResponse, StationSummary, StationsResponse};
use thiserror::Error;
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{info, warn};

pub mod chat;
pub mod markup;

pub use chat::{ChatClient, ChatEvent, ChatTurn, CHAT_FAILURE_APOLOGY};
pub use markup::{parse_reply_markup, reply_plain_text, ReplySegment};

/// Fixed cadence of the capture loop. Every iteration retries after this
/// interval regardless of outcome.
pub const CHECKIN_INTERVAL: Duration = Duration::from_secs(3);
const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckinErrorKind {
    /// No station selected, or the camera could not deliver a frame.
    Configuration,
    /// Network failure, non-2xx status, or a malformed response body.
    Transport,
}

/// Operator-facing status surface of the capture loop.
///
/// `Idle -> Checking -> {Pass | Deny | Error} -> (timer) -> Checking -> ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinStatus {
    Idle,
    Checking,
    Pass { message: String },
    Deny { message: String },
    Error { kind: CheckinErrorKind, message: String },
}

#[derive(Debug, Clone)]
pub enum CheckinEvent {
    StatusChanged(CheckinStatus),
    /// The mirrored frame that was just submitted. Drives the capture flash
    /// and the last-frame preview in the GUI.
    FrameCaptured(VideoFrame),
}

#[derive(Debug, Error)]
enum AttemptFailure {
    #[error("camera capture failed: {source}")]
    Camera { source: anyhow::Error },
    #[error("frame encoding failed: {0}")]
    Encode(#[from] CaptureError),
    #[error("check-in endpoint failure: {0}")]
    Transport(#[from] reqwest::Error),
}

impl AttemptFailure {
    fn kind(&self) -> CheckinErrorKind {
        match self {
            AttemptFailure::Camera { .. } => CheckinErrorKind::Configuration,
            AttemptFailure::Encode(_) | AttemptFailure::Transport(_) => {
                CheckinErrorKind::Transport
            }
        }
    }
}

struct CheckinClientState {
    station: Option<String>,
    checking: bool,
    status: CheckinStatus,
}

/// Capture loop controller: snapshots one frame per tick, mirrors it, encodes
/// it as a JPEG data URL, and submits it to the validation endpoint with the
/// selected station.
pub struct CheckinClient {
    http: Client,
    server_url: String,
    interval: Duration,
    jpeg_quality: u8,
    inner: Mutex<CheckinClientState>,
    events: broadcast::Sender<CheckinEvent>,
}

impl CheckinClient {
    pub fn new(server_url: impl Into<String>) -> Arc<Self> {
        Self::new_with_interval(server_url, CHECKIN_INTERVAL)
    }

    pub fn new_with_interval(server_url: impl Into<String>, interval: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            http: Client::new(),
            server_url: server_url.into(),
            interval,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            inner: Mutex::new(CheckinClientState {
                station: None,
                checking: false,
                status: CheckinStatus::Idle,
            }),
            events,
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CheckinEvent> {
        self.events.subscribe()
    }

    pub async fn status(&self) -> CheckinStatus {
        self.inner.lock().await.status.clone()
    }

    pub async fn station(&self) -> Option<String> {
        self.inner.lock().await.station.clone()
    }

    /// Select or clear the station. Whitespace-only names normalize to
    /// cleared. Either way the status surface resets to `Idle`; a cleared
    /// station disarms the next capture attempt rather than the loop itself.
    pub async fn set_station(&self, station: Option<String>) {
        let station = station
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        {
            let mut guard = self.inner.lock().await;
            guard.station = station;
            guard.status = CheckinStatus::Idle;
        }
        let _ = self
            .events
            .send(CheckinEvent::StatusChanged(CheckinStatus::Idle));
    }

    pub async fn list_stations(&self) -> Result<Vec<StationSummary>> {
        let response: StationsResponse = self
            .http
            .get(format!("{}/api/stations", self.server_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.stations)
    }

    /// One capture iteration. A call while a previous attempt is still in
    /// flight returns immediately with no side effects; the guard is the only
    /// concurrency control the loop needs.
    pub async fn perform_check(&self, source: &dyn FrameSource) {
        let station = {
            let mut guard = self.inner.lock().await;
            if guard.checking {
                return;
            }
            guard.checking = true;
            guard.station.clone()
        };

        let Some(station) = station else {
            self.transition(CheckinStatus::Error {
                kind: CheckinErrorKind::Configuration,
                message: "No station selected. Choose a station to resume scanning.".to_string(),
            })
            .await;
            self.inner.lock().await.checking = false;
            return;
        };

        self.transition(CheckinStatus::Checking).await;

        let status = match self.submit_frame(source, &station).await {
            Ok(response) => map_checkin_response(response),
            Err(failure) => {
                warn!(station = %station, "checkin: attempt failed: {failure}");
                let message = match failure.kind() {
                    CheckinErrorKind::Configuration => {
                        "Camera unavailable. Check device permissions and retry.".to_string()
                    }
                    CheckinErrorKind::Transport => {
                        "Cannot reach the check-in server. Retrying...".to_string()
                    }
                };
                CheckinStatus::Error {
                    kind: failure.kind(),
                    message,
                }
            }
        };

        self.transition(status).await;
        self.inner.lock().await.checking = false;
    }

    /// Run forever: check, sleep the fixed interval, check again. No backoff
    /// and no cutoff; the loop lives until the process exits. The handle is
    /// returned for test harnesses, not as a cancellation surface.
    pub fn run_capture_loop(self: &Arc<Self>, source: Arc<dyn FrameSource>) -> JoinHandle<()> {
        info!(
            source = source.label(),
            interval_ms = self.interval.as_millis() as u64,
            "checkin: capture loop started"
        );
        let client = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                client.perform_check(source.as_ref()).await;
                tokio::time::sleep(client.interval).await;
            }
        })
    }

    async fn submit_frame(
        &self,
        source: &dyn FrameSource,
        station: &str,
    ) -> std::result::Result<CheckinResponse, AttemptFailure> {
        let frame = source
            .next_frame()
            .await
            .map_err(|source| AttemptFailure::Camera { source })?
            .mirrored();
        let _ = self.events.send(CheckinEvent::FrameCaptured(frame.clone()));

        let image_b64 = encode_jpeg_data_url(&frame, self.jpeg_quality)?;
        let response = self
            .http
            .post(format!("{}/api/checkin", self.server_url))
            .json(&CheckinRequest {
                image_b64,
                station: station.to_string(),
            })
            .send()
            .await?
            .error_for_status()?
            .json::<CheckinResponse>()
            .await?;
        Ok(response)
    }

    async fn transition(&self, status: CheckinStatus) {
        {
            let mut guard = self.inner.lock().await;
            guard.status = status.clone();
        }
        let _ = self.events.send(CheckinEvent::StatusChanged(status));
    }
}

fn map_checkin_response(response: CheckinResponse) -> CheckinStatus {
    if response.success {
        let message = response.message.unwrap_or_else(|| {
            let ticket = response.reason.as_deref().unwrap_or("valid");
            match response.user_id {
                Some(user_id) => format!("User {} | Ticket: {ticket}", user_id.0),
                None => format!("Ticket: {ticket}"),
            }
        });
        CheckinStatus::Pass { message }
    } else {
        let message = response.message.unwrap_or_else(|| {
            format!(
                "Reason: {}",
                response.reason.as_deref().unwrap_or("not recognized")
            )
        });
        CheckinStatus::Deny { message }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
