// Main UI - step grid, transport controls and the tap-the-beat game
// Every change goes through Session intents; drawing reads a snapshot

use crate::audio::parameters::MasterVolume;
use crate::game::{HitOutcome, HitReport};
use crate::messaging::channels::NotificationConsumer;
use crate::messaging::notification::{Notification, NotificationCategory, NotificationLevel};
use crate::sequencer::{STEP_COUNT, SequencerError, TrackId};
use crate::session::{AudioGate, Session, SessionSnapshot};
use eframe::egui;
use std::collections::VecDeque;

const MAX_NOTIFICATIONS: usize = 10;
const NOTIFICATION_LIFETIME_MS: u64 = 5000;
const STEP_BUTTON_SIZE: egui::Vec2 = egui::vec2(34.0, 34.0);

const ACTIVE_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 140, 40);
const CURSOR_COLOR: egui::Color32 = egui::Color32::from_rgb(90, 90, 140);
const IDLE_COLOR: egui::Color32 = egui::Color32::from_gray(45);

pub struct StepBeatApp {
    session: Session,
    volume: MasterVolume,
    volume_ui: f32,
    bpm_ui: f64,
    last_report: Option<HitReport>,
    notification_rx: NotificationConsumer,
    notification_queue: VecDeque<Notification>,
}

impl StepBeatApp {
    pub fn new(
        session: Session,
        volume: MasterVolume,
        notification_rx: NotificationConsumer,
    ) -> Self {
        let volume_ui = volume.get();
        let bpm_ui = session.tempo().bpm();

        Self {
            session,
            volume,
            volume_ui,
            bpm_ui,
            last_report: None,
            notification_rx,
            notification_queue: VecDeque::new(),
        }
    }

    fn push_local(&mut self, notification: Notification) {
        self.notification_queue.push_back(notification);
        if self.notification_queue.len() > MAX_NOTIFICATIONS {
            self.notification_queue.pop_front();
        }
    }

    /// Drain the notification ring buffer into the display queue
    fn update_notifications(&mut self) {
        while let Some(notification) =
            ringbuf::traits::Consumer::try_pop(&mut self.notification_rx)
        {
            self.push_local(notification);
        }
    }

    fn report(&mut self, result: Result<impl Sized, SequencerError>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "intent rejected");
            self.push_local(Notification::warning(NotificationCategory::Sequencer, e.to_string()));
        }
    }

    fn handle_keys(&mut self, ctx: &egui::Context) {
        // Sample the clock as close to the key event as the frame allows
        if ctx.input(|i| i.key_pressed(egui::Key::Space)) {
            self.last_report = Some(self.session.tap());
        }
        if ctx.input(|i| i.key_pressed(egui::Key::Enter)) {
            self.session.toggle_playback();
        }
    }

    fn draw_transport(&mut self, ui: &mut egui::Ui, snapshot: &SessionSnapshot) {
        ui.horizontal(|ui| {
            let label = if snapshot.running { "■ Stop" } else { "▶ Play" };
            if ui.button(label).clicked() {
                self.session.toggle_playback();
            }

            ui.separator();
            ui.label("Tempo:");
            let range = self.session.tempo_range();
            let slider = egui::Slider::new(&mut self.bpm_ui, range.min_bpm..=range.max_bpm)
                .suffix(" BPM")
                .fixed_decimals(0);
            if ui.add(slider).changed() {
                let result = self.session.set_tempo(self.bpm_ui);
                if let Ok(tempo) = &result {
                    self.bpm_ui = tempo.bpm();
                }
                self.report(result);
            }

            ui.separator();
            if ui.button("🎲 Randomize").clicked() {
                self.session.randomize();
            }
            if ui.button("Clear").clicked() {
                self.session.clear();
                self.last_report = None;
            }
        });

        ui.horizontal(|ui| {
            ui.label("Volume:");
            if ui.add(egui::Slider::new(&mut self.volume_ui, 0.0..=1.0)).changed() {
                self.volume.set(self.volume_ui);
            }

            let (text, color) = match self.session.audio_gate() {
                AudioGate::Locked => ("audio starts with Play".to_string(), egui::Color32::GRAY),
                AudioGate::Ready => ("audio ready".to_string(), egui::Color32::GREEN),
                AudioGate::Unavailable(e) => (format!("no audio: {e}"), egui::Color32::RED),
            };
            ui.colored_label(color, text);
        });
    }

    fn step_button(label: String, active: bool, under_cursor: bool) -> egui::Button<'static> {
        let fill = if active {
            ACTIVE_COLOR
        } else if under_cursor {
            CURSOR_COLOR
        } else {
            IDLE_COLOR
        };
        let stroke = if under_cursor {
            egui::Stroke::new(2.0, egui::Color32::WHITE)
        } else {
            egui::Stroke::NONE
        };
        egui::Button::new(label)
            .fill(fill)
            .stroke(stroke)
            .min_size(STEP_BUTTON_SIZE)
    }

    fn draw_grid(&mut self, ui: &mut egui::Ui, snapshot: &SessionSnapshot) {
        let cursor = snapshot.running.then_some(snapshot.step);

        egui::Grid::new("step_grid")
            .spacing(egui::vec2(4.0, 4.0))
            .show(ui, |ui| {
                for track in TrackId::DRUMS {
                    ui.label(track.name());
                    if let Some(steps) = snapshot.drum_track(track) {
                        for (step, active) in steps.iter().enumerate() {
                            let button = Self::step_button(
                                String::new(),
                                *active,
                                cursor == Some(step),
                            );
                            if ui.add(button).clicked() {
                                let result = self.session.toggle_step(track, step);
                                self.report(result);
                            }
                        }
                    }
                    ui.end_row();
                }

                ui.label(TrackId::Melody.name());
                for step in 0..STEP_COUNT {
                    let active = snapshot.melody[step] != 0;
                    let button = Self::step_button(
                        snapshot.melody_labels[step].clone(),
                        active,
                        cursor == Some(step),
                    );
                    if ui.add(button).clicked() {
                        let result = self.session.cycle_note(step);
                        self.report(result);
                    }
                }
                ui.end_row();

                // Beat markers under every fourth step
                ui.label("");
                for step in 0..STEP_COUNT {
                    let marker = if step % 4 == 0 {
                        format!("{}", step / 4 + 1)
                    } else {
                        String::new()
                    };
                    ui.label(marker);
                }
                ui.end_row();
            });
    }

    fn draw_game(&self, ui: &mut egui::Ui, snapshot: &SessionSnapshot) {
        ui.heading("Tap the beat (Space)");
        ui.horizontal(|ui| {
            ui.label(format!("Score: {}", snapshot.score));
            ui.separator();
            ui.label(format!("Combo: {}", snapshot.combo));
            ui.separator();

            match (snapshot.last_hit, &self.last_report) {
                (Some(HitOutcome::OnBeat), report) => {
                    ui.colored_label(egui::Color32::GREEN, "On beat!");
                    if let Some(report) = report {
                        ui.label(format!("{:+.0} ms", report.offset * 1000.0));
                    }
                }
                (Some(HitOutcome::OffBeat), report) => {
                    ui.colored_label(egui::Color32::RED, "Off beat");
                    if let Some(report) = report {
                        ui.label(format!("{:+.0} ms", report.offset * 1000.0));
                    }
                }
                (None, _) => {
                    ui.label("No hits yet");
                }
            }
        });
    }

    fn draw_status_bar(&self, ui: &mut egui::Ui) {
        ui.separator();
        ui.horizontal(|ui| {
            let recent: Vec<&Notification> = self
                .notification_queue
                .iter()
                .rev()
                .filter(|n| n.is_recent(NOTIFICATION_LIFETIME_MS))
                .take(3)
                .collect();

            if recent.is_empty() {
                ui.label("Ready");
            }
            for notification in recent {
                let (icon, color) = match notification.level {
                    NotificationLevel::Info => ("ℹ", egui::Color32::from_rgb(100, 150, 255)),
                    NotificationLevel::Warning => ("⚠", egui::Color32::from_rgb(255, 165, 0)),
                    NotificationLevel::Error => ("✖", egui::Color32::RED),
                };
                ui.colored_label(color, icon);
                ui.colored_label(color, &notification.message);
                ui.add_space(10.0);
            }
        });
    }
}

impl eframe::App for StepBeatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_notifications();
        self.handle_keys(ctx);

        let snapshot = self.session.snapshot();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("StepBeat");
            ui.separator();

            self.draw_transport(ui, &snapshot);
            ui.add_space(10.0);
            self.draw_grid(ui, &snapshot);
            ui.add_space(10.0);
            ui.separator();
            self.draw_game(ui, &snapshot);

            ui.add_space(10.0);
            self.draw_status_bar(ui);
        });

        // The cursor moves without input while playing
        if snapshot.running {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(std::time::Duration::from_millis(250));
        }
    }
}

impl Drop for StepBeatApp {
    fn drop(&mut self) {
        self.session.stop();
    }
}
