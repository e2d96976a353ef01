use crate::danmaq_app::DanmaqApp;
use crate::overlay;
use crate::tray::TrayAction;

use danmaq::DisplayPreferences;
use eframe::egui::{self, Color32, FontId, TextStyle};
use std::time::{Duration, Instant};

impl eframe::App for DanmaqApp {
    // Handles UI updates.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        self.update_state(now);

        let mut style = (*ctx.style()).clone();
        style.text_styles.insert(
            TextStyle::Button,
            FontId::new(16.0, egui::FontFamily::Proportional),
        );
        ctx.set_style(style);

        self.handle_tray_actions(ctx);

        // Without a tray the same entries live in the window's menu bar.
        if !self.tray.is_connected() {
            let mut picked = None;
            egui::TopBottomPanel::top("menu").show(ctx, |ui| {
                egui::menu::bar(ui, |ui| {
                    ui.menu_button("DanmaQ", |ui| {
                        let toggle_label = if self.presenter.is_running() {
                            "Unsubscribe"
                        } else {
                            "Subscribe"
                        };
                        for (label, action) in [
                            ("Show", TrayAction::ShowForm),
                            (toggle_label, TrayAction::ToggleSubscription),
                            ("Preferences", TrayAction::OpenPreferences),
                        ] {
                            if ui.button(label).clicked() {
                                picked = Some(action);
                                ui.close_menu();
                            }
                        }
                        ui.separator();
                        if ui.button("Exit").clicked() {
                            picked = Some(TrayAction::Exit);
                        }
                    });
                });
            });
            if let Some(action) = picked {
                self.run_action(ctx, action);
            }
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let running = self.presenter.is_running();

            ui.add_enabled_ui(!running, |ui| {
                egui::Grid::new("connection_form")
                    .num_columns(2)
                    .spacing([8.0, 6.0])
                    .show(ui, |ui| {
                        ui.label("Server: ");
                        ui.text_edit_singleline(&mut self.connection.server_url);
                        ui.end_row();

                        ui.label("Save As Default Server: ");
                        ui.checkbox(&mut self.connection.save_as_default, "");
                        ui.end_row();

                        ui.label("Channel: ");
                        ui.text_edit_singleline(&mut self.connection.channel);
                        ui.end_row();

                        ui.label("Password: ");
                        ui.add(
                            egui::TextEdit::singleline(&mut self.connection.access_token)
                                .password(true),
                        );
                        ui.end_row();
                    });
            });

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                if ui.button("Hide").clicked() {
                    self.hide_form(ctx);
                }
                let main_label = if running { "Unsubscribe" } else { "Subscribe" };
                if ui
                    .button(main_label)
                    .on_hover_cursor(egui::CursorIcon::PointingHand)
                    .clicked()
                {
                    self.toggle_subscription(ctx);
                }
            });

            ui.add_space(10.0);
            ui.separator();
            if self.presenter.is_running() {
                ui.colored_label(
                    Color32::from_rgb(4, 205, 0),
                    format!("● Running ({} on screen)", self.presenter.active_count()),
                );
            } else {
                ui.colored_label(Color32::GRAY, "● Not running");
            }
            if let Some((notification, _)) = &self.notification {
                ui.label(format!("{}: {}", notification.title, notification.body));
            }
            if let Some(error) = &self.last_error {
                ui.colored_label(Color32::from_rgb(231, 34, 0), error);
            }
        });

        self.preferences_window(ctx);

        overlay::show(ctx, &self.presenter, now);

        // Keep pumping poller events and expiring notifications.
        if self.presenter.is_running() || self.notification.is_some() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }

    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        // The overlay viewport relies on a transparent clear.
        egui::Rgba::TRANSPARENT.to_array()
    }
}

impl DanmaqApp {
    fn preferences_window(&mut self, ctx: &egui::Context) {
        let mut open = self.preferences_open;
        let mut apply = false;
        let draft = &mut self.preferences_draft;

        egui::Window::new("Preferences")
            .open(&mut open)
            .resizable(false)
            .collapsible(false)
            .show(ctx, |ui| {
                ui.add(egui::Slider::new(&mut draft.font_size, 12.0..=96.0).text("Font size"));
                ui.add(
                    egui::Slider::new(&mut draft.line_spacing, 1.0..=2.0).text("Line spacing"),
                );
                ui.add(
                    egui::Slider::new(&mut draft.fly_duration_secs, 3.0..=30.0)
                        .text("Scrolling duration (s)"),
                );
                ui.add(
                    egui::Slider::new(&mut draft.fixed_duration_secs, 1.0..=20.0)
                        .text("Top / bottom duration (s)"),
                );
                ui.add(egui::Slider::new(&mut draft.speed_scale, 0.25..=4.0).text("Speed scale"));
                ui.add(egui::Slider::new(&mut draft.max_lanes, 1..=30).text("Lanes"));
                ui.add(egui::Slider::new(&mut draft.opacity, 0.1..=1.0).text("Opacity"));
                ui.checkbox(&mut draft.outline, "Outline text");

                ui.add_space(8.0);
                ui.horizontal(|ui| {
                    if ui.button("Apply").clicked() {
                        apply = true;
                    }
                    if ui.button("Reset").clicked() {
                        *draft = DisplayPreferences::default();
                    }
                });
            });

        self.preferences_open = open;
        if apply {
            self.apply_preferences();
        }
    }
}
