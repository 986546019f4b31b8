//! Backend worker: owns the tokio runtime and the two controllers, drains the
//! UI command queue, and forwards controller events back to the UI thread.

use std::{sync::Arc, thread, time::Duration};

use capture::{CameraConnector, CameraOptions, TestPatternCamera};
use client_core::{ChatClient, ChatEvent, CheckinClient, CheckinEvent};
use crossbeam_channel::{Receiver, Sender};
use tokio::task::JoinHandle;

use crate::backend_bridge::commands::BackendCommand;
use crate::config::Settings;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

pub fn launch(settings: Settings, cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let checkin = CheckinClient::new_with_interval(
                settings.server_url.clone(),
                Duration::from_millis(settings.checkin_interval_ms),
            );
            checkin.set_station(settings.station.clone()).await;

            // A disabled chat panel means the controller is never constructed.
            let chat = settings
                .chat_enabled
                .then(|| Arc::new(ChatClient::new(settings.server_url.clone())));

            spawn_checkin_event_forwarder(&checkin, ui_tx.clone());
            if let Some(chat) = &chat {
                spawn_chat_event_forwarder(chat, ui_tx.clone());
            }

            let camera: Arc<dyn CameraConnector> = Arc::new(TestPatternCamera);
            let mut capture_loop: Option<JoinHandle<()>> = None;

            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::ListStations => match checkin.list_stations().await {
                        Ok(stations) => {
                            let _ = ui_tx.try_send(UiEvent::StationsLoaded(stations));
                        }
                        Err(err) => {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::LoadStations,
                                err.to_string(),
                            )));
                        }
                    },
                    BackendCommand::SetStation { station } => {
                        checkin.set_station(station).await;
                    }
                    BackendCommand::StartCheckin => {
                        if capture_loop.is_some() {
                            let _ = ui_tx
                                .try_send(UiEvent::Info("Check-in already running".to_string()));
                            continue;
                        }
                        match camera.open(CameraOptions::default()).await {
                            Ok(source) => {
                                capture_loop = Some(checkin.run_capture_loop(source));
                                let _ = ui_tx.try_send(UiEvent::CaptureStarted);
                            }
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                    UiErrorContext::Checkin,
                                    format!("camera unavailable: {err}"),
                                )));
                            }
                        }
                    }
                    BackendCommand::SendChatMessage { text } => {
                        let Some(chat) = &chat else {
                            continue;
                        };
                        if let Err(err) = chat.send_message(&text).await {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::Chat,
                                err.to_string(),
                            )));
                        }
                    }
                }
            }
        });
    });
}

fn spawn_checkin_event_forwarder(checkin: &Arc<CheckinClient>, ui_tx: Sender<UiEvent>) {
    let mut events = checkin.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let evt = match event {
                CheckinEvent::StatusChanged(status) => UiEvent::CheckinStatusChanged(status),
                CheckinEvent::FrameCaptured(frame) => UiEvent::FrameCaptured {
                    width: frame.width,
                    height: frame.height,
                    rgba: frame.rgba,
                },
            };
            let _ = ui_tx.try_send(evt);
        }
    });
}

fn spawn_chat_event_forwarder(chat: &Arc<ChatClient>, ui_tx: Sender<UiEvent>) {
    let mut events = chat.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let ChatEvent::TranscriptUpdated(turns) = event;
            let _ = ui_tx.try_send(UiEvent::ChatTranscriptUpdated(turns));
        }
    });
}
