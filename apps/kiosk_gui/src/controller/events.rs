//! Backend-to-UI events and error modeling for the kiosk GUI.

use client_core::{ChatTurn, CheckinStatus};
use shared::protocol::StationSummary;

pub enum UiEvent {
    Info(String),
    StationsLoaded(Vec<StationSummary>),
    CheckinStatusChanged(CheckinStatus),
    /// The mirrored frame that was just submitted; drives the flash overlay
    /// and the preview texture.
    FrameCaptured {
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    },
    CaptureStarted,
    ChatTranscriptUpdated(Vec<ChatTurn>),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Configuration,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    LoadStations,
    Checkin,
    Chat,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("no station")
            || message_lower.contains("camera")
            || message_lower.contains("permission")
            || message_lower.contains("not configured")
        {
            UiErrorCategory::Configuration
        } else if message_lower.contains("timeout")
            || message_lower.contains("timed out")
            || message_lower.contains("connection")
            || message_lower.contains("connect")
            || message_lower.contains("network")
            || message_lower.contains("refused")
            || message_lower.contains("dns")
            || message_lower.contains("unreachable")
            || message_lower.contains("unavailable")
        {
            UiErrorCategory::Transport
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
        {
            UiErrorCategory::Validation
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Configuration => "Configuration",
        UiErrorCategory::Transport => "Transport",
        UiErrorCategory::Validation => "Validation",
        UiErrorCategory::Unknown => "Unexpected",
    }
}
