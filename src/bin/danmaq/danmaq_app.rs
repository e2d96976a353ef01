use crate::tray::{Tray, TrayAction};
use crate::Cli;
use danmaq::poller::Waker;
use danmaq::{ConnectionPreferences, DisplayPreferences, Notification, Presenter, SettingsStore};
use eframe::egui;
use std::time::{Duration, Instant};

const NOTIFICATION_LIFETIME: Duration = Duration::from_secs(4);

pub struct DanmaqApp {
    pub presenter: Presenter,
    pub connection: ConnectionPreferences,
    pub settings: SettingsStore,
    pub preferences_open: bool,
    pub preferences_draft: DisplayPreferences,
    pub notification: Option<(Notification, Instant)>,
    pub last_error: Option<String>,
    pub tray: Tray,
}

impl DanmaqApp {
    pub fn new(ctx: &egui::Context, settings: SettingsStore, cli: &Cli) -> Self {
        let config = settings.load_or_default();

        let mut connection = ConnectionPreferences::from_config(&config);
        if let Some(server) = &cli.server {
            connection.server_url = server.clone();
        }
        connection.channel = cli.channel.clone();
        connection.access_token = cli.password.clone();

        // Every poller gets its own handle on the context so it can wake the UI.
        let repaint_ctx = ctx.clone();
        let presenter = Presenter::new(
            settings.clone(),
            config.display.clone(),
            config.polling.clone(),
        )
        .with_waker_factory(Box::new(move || {
            let ctx = repaint_ctx.clone();
            Box::new(move || ctx.request_repaint()) as Waker
        }));

        let mut app = DanmaqApp {
            presenter,
            connection,
            settings,
            preferences_open: false,
            preferences_draft: config.display,
            notification: None,
            last_error: None,
            tray: Tray::spawn(ctx),
        };

        if cli.subscribe {
            app.toggle_subscription(ctx);
        }

        app
    }

    /// Subscribe / Unsubscribe, shared by the button and the menu.
    pub fn toggle_subscription(&mut self, ctx: &egui::Context) {
        if self.presenter.is_running() {
            self.presenter.stop();
            return;
        }

        match self.presenter.start(&self.connection) {
            Ok(_) => {
                self.last_error = None;
                self.hide_form(ctx);
            }
            Err(start_error) => {
                tracing::error!("Could not subscribe: {start_error:#}");
                self.last_error = Some(format!("{start_error:#}"));
            }
        }
    }

    /// Runs an entry picked from the tray or the window menu.
    pub fn run_action(&mut self, ctx: &egui::Context, action: TrayAction) {
        tracing::debug!(?action, "Menu action.");
        match action {
            TrayAction::ShowForm => self.show_form(ctx),
            TrayAction::ToggleSubscription => self.toggle_subscription(ctx),
            TrayAction::OpenPreferences => {
                self.show_form(ctx);
                self.open_preferences();
            }
            TrayAction::Exit => {
                self.presenter.stop();
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        }
    }

    pub fn handle_tray_actions(&mut self, ctx: &egui::Context) {
        for action in self.tray.take_actions() {
            self.run_action(ctx, action);
        }
    }

    pub fn hide_form(&self, ctx: &egui::Context) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(true));
    }

    pub fn show_form(&self, ctx: &egui::Context) {
        ctx.send_viewport_cmd(egui::ViewportCommand::Minimized(false));
        ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
    }

    pub fn open_preferences(&mut self) {
        self.preferences_draft = self.presenter.display().clone();
        self.preferences_open = true;
    }

    /// Applies the edited preferences to new danmaku and saves them.
    pub fn apply_preferences(&mut self) {
        self.presenter
            .apply_preferences(self.preferences_draft.clone());

        if let Err(save_error) = self.settings.save_display(&self.preferences_draft) {
            tracing::error!("{save_error:#}");
        }
    }

    /// Feeds poller events into the presenter and retires finished danmaku.
    pub fn update_state(&mut self, now: Instant) {
        self.presenter.pump(now);
        self.presenter.tick(now);

        if let Some(latest) = self.presenter.take_notifications().pop() {
            self.tray.show_message(&latest.body);
            self.notification = Some((latest, now));
        }
        self.tray.set_running(self.presenter.is_running());
        if let Some((_, shown_at)) = &self.notification {
            if now.saturating_duration_since(*shown_at) >= NOTIFICATION_LIFETIME {
                self.notification = None;
            }
        }
    }
}
