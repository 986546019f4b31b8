//! The kiosk window: station selector, check-in status surface with capture
//! flash, and the toggleable assistant panel.

use std::time::{Duration, Instant};

use client_core::{parse_reply_markup, ChatTurn, CheckinErrorKind, CheckinStatus};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use shared::{domain::ChatRole, protocol::StationSummary};

use crate::backend_bridge::commands::BackendCommand;
use crate::config::Settings;
use crate::controller::events::{err_label, UiErrorContext, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

const FLASH_DURATION: Duration = Duration::from_millis(300);
const PREVIEW_SIZE: egui::Vec2 = egui::Vec2::new(360.0, 270.0);

struct PreviewFrame {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    texture: Option<egui::TextureHandle>,
}

pub struct KioskApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,

    settings: Settings,
    bootstrapped: bool,

    stations: Vec<StationSummary>,
    selected_station: Option<String>,
    checkin_status: CheckinStatus,
    capture_running: bool,
    flash_until: Option<Instant>,
    preview: Option<PreviewFrame>,

    chat_open: bool,
    chat_input: String,
    chat_focus_input: bool,
    chat_turns: Vec<ChatTurn>,

    status: String,
    startup_banner: Option<String>,
}

impl KioskApp {
    pub fn new(
        settings: Settings,
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
    ) -> Self {
        let selected_station = settings.station.clone();
        Self {
            cmd_tx,
            ui_rx,
            settings,
            bootstrapped: false,
            stations: Vec::new(),
            selected_station,
            checkin_status: CheckinStatus::Idle,
            capture_running: false,
            flash_until: None,
            preview: None,
            chat_open: false,
            chat_input: String::new(),
            chat_focus_input: false,
            chat_turns: Vec::new(),
            status: "Starting...".to_string(),
            startup_banner: None,
        }
    }

    fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::StationsLoaded(stations) => {
                    self.status = format!("Loaded {} stations", stations.len());
                    if let Some(selected) = self.selected_station.clone() {
                        if !stations
                            .iter()
                            .any(|station| station.station_name == selected)
                        {
                            // Preselected station is not in the directory;
                            // disarm instead of scanning against a bad name.
                            self.selected_station = None;
                            dispatch_backend_command(
                                &self.cmd_tx,
                                BackendCommand::SetStation { station: None },
                                &mut self.status,
                            );
                        }
                    }
                    self.stations = stations;
                }
                UiEvent::CheckinStatusChanged(status) => {
                    self.checkin_status = status;
                }
                UiEvent::FrameCaptured {
                    width,
                    height,
                    rgba,
                } => {
                    self.flash_until = Some(Instant::now() + FLASH_DURATION);
                    self.preview = Some(PreviewFrame {
                        width,
                        height,
                        rgba,
                        texture: None,
                    });
                }
                UiEvent::CaptureStarted => {
                    self.capture_running = true;
                    self.status = "Check-in running".to_string();
                }
                UiEvent::ChatTranscriptUpdated(turns) => {
                    self.chat_turns = turns;
                }
                UiEvent::Error(err) => {
                    self.status = format!("{} error: {}", err_label(err.category()), err.message());
                    if err.context() == UiErrorContext::BackendStartup {
                        self.startup_banner = Some(self.status.clone());
                    }
                }
            }
        }
    }

    fn flash_active(&self) -> bool {
        self.flash_until
            .map(|until| Instant::now() < until)
            .unwrap_or(false)
    }

    fn show_station_controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Station").strong());
            let selected_label = self
                .selected_station
                .clone()
                .unwrap_or_else(|| "Select a station...".to_string());
            let mut selection_changed = false;
            egui::ComboBox::from_id_source("station_combo")
                .selected_text(selected_label)
                .show_ui(ui, |ui| {
                    if ui
                        .selectable_label(self.selected_station.is_none(), "— none —")
                        .clicked()
                        && self.selected_station.take().is_some()
                    {
                        selection_changed = true;
                    }
                    for station in &self.stations {
                        let selected =
                            self.selected_station.as_deref() == Some(station.station_name.as_str());
                        if ui
                            .selectable_label(selected, &station.station_name)
                            .clicked()
                            && !selected
                        {
                            self.selected_station = Some(station.station_name.clone());
                            selection_changed = true;
                        }
                    }
                });
            if selection_changed {
                dispatch_backend_command(
                    &self.cmd_tx,
                    BackendCommand::SetStation {
                        station: self.selected_station.clone(),
                    },
                    &mut self.status,
                );
            }

            let can_start = self.selected_station.is_some() && !self.capture_running;
            let start_label = if self.capture_running {
                "RUNNING..."
            } else {
                "Start Check-in"
            };
            if ui
                .add_enabled(can_start, egui::Button::new(start_label))
                .clicked()
            {
                dispatch_backend_command(
                    &self.cmd_tx,
                    BackendCommand::StartCheckin,
                    &mut self.status,
                );
            }

            if ui.small_button("Reload stations").clicked() {
                dispatch_backend_command(
                    &self.cmd_tx,
                    BackendCommand::ListStations,
                    &mut self.status,
                );
            }
        });
    }

    fn show_preview(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let flash = self.flash_active();
        egui::Frame::none()
            .fill(egui::Color32::from_gray(18))
            .rounding(10.0)
            .inner_margin(egui::Margin::symmetric(8, 8))
            .show(ui, |ui| {
                match &mut self.preview {
                    Some(preview) => {
                        if preview.texture.is_none() {
                            let image = egui::ColorImage::from_rgba_unmultiplied(
                                [preview.width as usize, preview.height as usize],
                                &preview.rgba,
                            );
                            preview.texture = Some(ctx.load_texture(
                                "checkin-preview",
                                image,
                                egui::TextureOptions::LINEAR,
                            ));
                        }
                        if let Some(texture) = &preview.texture {
                            let response = ui.add(egui::Image::new(
                                egui::load::SizedTexture::new(texture.id(), PREVIEW_SIZE),
                            ));
                            if flash {
                                ui.painter().rect_filled(
                                    response.rect,
                                    6.0,
                                    egui::Color32::from_white_alpha(170),
                                );
                            }
                        }
                    }
                    None => {
                        let _ = ui.allocate_space(PREVIEW_SIZE);
                    }
                }
            });
    }

    fn show_status_box(&self, ui: &mut egui::Ui) {
        let presentation =
            status_presentation(&self.checkin_status, self.selected_station.is_some());
        egui::Frame::none()
            .fill(presentation.fill)
            .rounding(10.0)
            .inner_margin(egui::Margin::symmetric(14, 12))
            .show(ui, |ui| {
                ui.set_min_width(PREVIEW_SIZE.x);
                ui.label(
                    egui::RichText::new(presentation.title)
                        .strong()
                        .size(22.0)
                        .color(egui::Color32::WHITE),
                );
                ui.label(
                    egui::RichText::new(&presentation.detail).color(egui::Color32::WHITE),
                );
            });
    }

    fn send_chat(&mut self) {
        let text = self.chat_input.trim().to_string();
        self.chat_input.clear();
        if text.is_empty() {
            return;
        }
        dispatch_backend_command(
            &self.cmd_tx,
            BackendCommand::SendChatMessage { text },
            &mut self.status,
        );
    }

    fn show_chat_window(&mut self, ctx: &egui::Context) {
        if !self.chat_open {
            return;
        }
        let mut open = self.chat_open;
        egui::Window::new("Metro Assistant")
            .open(&mut open)
            .default_size([340.0, 420.0])
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .max_height(320.0)
                    .show(ui, |ui| {
                        if self.chat_turns.is_empty() {
                            ui.weak("Ask about fares or train schedules.");
                        }
                        for turn in &self.chat_turns {
                            render_chat_turn(ui, turn);
                        }
                    });
                ui.separator();
                ui.horizontal(|ui| {
                    let edit = egui::TextEdit::singleline(&mut self.chat_input)
                        .hint_text("Type a question...")
                        .desired_width(ui.available_width() - 60.0);
                    let response = ui.add(edit);
                    if self.chat_focus_input {
                        response.request_focus();
                        self.chat_focus_input = false;
                    }
                    let submitted = response.lost_focus()
                        && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    let clicked = ui.button("Send").clicked();
                    if submitted || clicked {
                        self.send_chat();
                        if submitted {
                            response.request_focus();
                        }
                    }
                });
            });
        self.chat_open = open;
    }
}

impl eframe::App for KioskApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();

        if !self.bootstrapped {
            self.bootstrapped = true;
            dispatch_backend_command(
                &self.cmd_tx,
                BackendCommand::ListStations,
                &mut self.status,
            );
        }

        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("FaceGate Kiosk");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    ui.small(self.settings.server_url.as_str());
                });
            });
        });

        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.small("Status:");
                ui.small(egui::RichText::new(&self.status).weak());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if self.settings.chat_enabled {
                        let label = if self.chat_open {
                            "Close assistant"
                        } else {
                            "💬 Assistant"
                        };
                        if ui.button(label).clicked() {
                            self.chat_open = !self.chat_open;
                            if self.chat_open {
                                self.chat_focus_input = true;
                            }
                        }
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            if let Some(banner) = self.startup_banner.clone() {
                egui::Frame::none()
                    .fill(egui::Color32::from_rgb(111, 53, 53))
                    .rounding(8.0)
                    .inner_margin(egui::Margin::symmetric(10, 8))
                    .show(ui, |ui| {
                        ui.horizontal_wrapped(|ui| {
                            ui.label(egui::RichText::new(&banner).color(egui::Color32::WHITE));
                            if ui.button("Dismiss").clicked() {
                                self.startup_banner = None;
                            }
                        });
                    });
                ui.add_space(8.0);
            }

            self.show_station_controls(ui);
            ui.add_space(10.0);
            ui.horizontal_top(|ui| {
                ui.vertical(|ui| {
                    self.show_preview(ui, ctx);
                });
                ui.add_space(12.0);
                ui.vertical(|ui| {
                    self.show_status_box(ui);
                });
            });
        });

        self.show_chat_window(ctx);

        // Backend events arrive on a channel the UI only drains inside
        // `update`, so keep a modest repaint cadence while idle and a fast
        // one while the flash is fading.
        if self.flash_active() {
            ctx.request_repaint_after(Duration::from_millis(33));
        } else {
            ctx.request_repaint_after(Duration::from_millis(200));
        }
    }
}

fn render_chat_turn(ui: &mut egui::Ui, turn: &ChatTurn) {
    let stamp = turn
        .sent_at
        .with_timezone(&chrono::Local)
        .format("%H:%M")
        .to_string();
    match turn.role {
        ChatRole::User => {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Min), |ui| {
                egui::Frame::none()
                    .fill(egui::Color32::from_rgb(52, 90, 170))
                    .rounding(8.0)
                    .inner_margin(egui::Margin::symmetric(8, 6))
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new(&turn.text).color(egui::Color32::WHITE));
                    });
                ui.small(egui::RichText::new(stamp).weak());
            });
        }
        ChatRole::BotPending => {
            ui.weak("Assistant is typing…");
        }
        ChatRole::Bot => {
            egui::Frame::none()
                .fill(egui::Color32::from_gray(48))
                .rounding(8.0)
                .inner_margin(egui::Margin::symmetric(8, 6))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        for segment in parse_reply_markup(&turn.text) {
                            let mut text = egui::RichText::new(segment.text)
                                .color(egui::Color32::WHITE);
                            if segment.emphasis {
                                text = text.strong();
                            }
                            ui.label(text);
                        }
                    });
                });
        }
    }
}

struct StatusPresentation {
    title: &'static str,
    detail: String,
    fill: egui::Color32,
}

fn status_presentation(status: &CheckinStatus, has_station: bool) -> StatusPresentation {
    match status {
        CheckinStatus::Idle if !has_station => StatusPresentation {
            title: "NOT READY",
            detail: "Select your station to begin.".to_string(),
            fill: egui::Color32::from_gray(70),
        },
        CheckinStatus::Idle => StatusPresentation {
            title: "READY",
            detail: "Press Start Check-in to open the camera.".to_string(),
            fill: egui::Color32::from_rgb(55, 75, 105),
        },
        CheckinStatus::Checking => StatusPresentation {
            title: "SCANNING",
            detail: "Hold still, eyes open, look straight at the camera...".to_string(),
            fill: egui::Color32::from_rgb(160, 120, 30),
        },
        CheckinStatus::Pass { message } => StatusPresentation {
            title: "SUCCESS",
            detail: message.clone(),
            fill: egui::Color32::from_rgb(35, 120, 60),
        },
        CheckinStatus::Deny { message } => StatusPresentation {
            title: "DENIED",
            detail: message.clone(),
            fill: egui::Color32::from_rgb(150, 45, 45),
        },
        CheckinStatus::Error { kind, message } => StatusPresentation {
            title: match kind {
                CheckinErrorKind::Configuration => "STOPPED",
                CheckinErrorKind::Transport => "ERROR",
            },
            detail: message.clone(),
            fill: match kind {
                CheckinErrorKind::Configuration => egui::Color32::from_rgb(150, 90, 30),
                CheckinErrorKind::Transport => egui::Color32::from_rgb(110, 40, 40),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_presentation_depends_on_station_selection() {
        let without = status_presentation(&CheckinStatus::Idle, false);
        assert_eq!(without.title, "NOT READY");
        let with = status_presentation(&CheckinStatus::Idle, true);
        assert_eq!(with.title, "READY");
    }

    #[test]
    fn pass_and_deny_presentations_carry_server_messages() {
        let pass = status_presentation(
            &CheckinStatus::Pass {
                message: "Monthly ticket valid. Welcome.".to_string(),
            },
            true,
        );
        assert_eq!(pass.title, "SUCCESS");
        assert_eq!(pass.detail, "Monthly ticket valid. Welcome.");

        let deny = status_presentation(
            &CheckinStatus::Deny {
                message: "Reason: wrong_station".to_string(),
            },
            true,
        );
        assert_eq!(deny.title, "DENIED");
        assert_eq!(deny.detail, "Reason: wrong_station");
    }

    #[test]
    fn configuration_and_transport_errors_present_differently() {
        let configuration = status_presentation(
            &CheckinStatus::Error {
                kind: CheckinErrorKind::Configuration,
                message: "No station selected.".to_string(),
            },
            false,
        );
        assert_eq!(configuration.title, "STOPPED");

        let transport = status_presentation(
            &CheckinStatus::Error {
                kind: CheckinErrorKind::Transport,
                message: "Cannot reach the check-in server.".to_string(),
            },
            true,
        );
        assert_eq!(transport.title, "ERROR");
    }
}
