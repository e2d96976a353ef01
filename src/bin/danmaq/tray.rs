use eframe::egui;
use std::sync::{Arc, Mutex};

#[cfg(target_os = "linux")]
use ksni::TrayMethods;

const ICON_SIZE: i32 = 22;
const RUNNING_RGB: [u8; 3] = [4, 205, 0];
const IDLE_RGB: [u8; 3] = [140, 140, 140];

/// Something picked from the tray (or the in-window fallback menu).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayAction {
    ShowForm,
    ToggleSubscription,
    OpenPreferences,
    Exit,
}

/// State shared between the GUI thread and the tray service.
#[derive(Debug, Default)]
pub struct TrayState {
    running: bool,
    connected: bool,
    message: Option<String>,
    actions: Vec<TrayAction>,
}

impl TrayState {
    pub fn title(&self) -> String {
        if self.running {
            "DanmaQ (Running)".to_string()
        } else {
            "DanmaQ (Idle)".to_string()
        }
    }

    pub fn toggle_label(&self) -> &'static str {
        if self.running {
            "Unsubscribe"
        } else {
            "Subscribe"
        }
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn push(&mut self, action: TrayAction) {
        self.actions.push(action);
    }

    /// Returns whether anything the tray displays changed.
    fn set_running(&mut self, running: bool) -> bool {
        let changed = self.running != running;
        self.running = running;
        changed
    }

    fn set_message(&mut self, message: &str) -> bool {
        let changed = self.message.as_deref() != Some(message);
        self.message = Some(message.to_string());
        changed
    }
}

/// A filled circle, green while subscribed and grey otherwise, as ARGB rows.
pub fn status_icon(running: bool) -> Vec<u8> {
    let [r, g, b] = if running { RUNNING_RGB } else { IDLE_RGB };
    let center = (ICON_SIZE as f32 - 1.0) / 2.0;
    let radius = ICON_SIZE as f32 / 2.0 - 1.0;

    (0..ICON_SIZE)
        .flat_map(|y| (0..ICON_SIZE).map(move |x| (x, y)))
        .flat_map(|(x, y)| {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            if dx * dx + dy * dy <= radius * radius {
                [0xFF, r, g, b]
            } else {
                [0, 0, 0, 0]
            }
        })
        .collect()
}

/// System tray icon on Linux (StatusNotifierItem over D-Bus).
#[cfg(target_os = "linux")]
struct DanmaqTray {
    state: Arc<Mutex<TrayState>>,
    ctx: egui::Context,
}

#[cfg(target_os = "linux")]
impl DanmaqTray {
    fn request(&mut self, action: TrayAction) {
        if let Ok(mut state) = self.state.lock() {
            state.push(action);
        }
        self.ctx.request_repaint();
    }

    fn running(&self) -> bool {
        self.state.lock().map(|state| state.running).unwrap_or(false)
    }
}

#[cfg(target_os = "linux")]
impl ksni::Tray for DanmaqTray {
    fn id(&self) -> String {
        "danmaq".into()
    }

    fn title(&self) -> String {
        self.state
            .lock()
            .map(|state| state.title())
            .unwrap_or_else(|_| "DanmaQ".into())
    }

    fn icon_pixmap(&self) -> Vec<ksni::Icon> {
        vec![ksni::Icon {
            width: ICON_SIZE,
            height: ICON_SIZE,
            data: status_icon(self.running()),
        }]
    }

    fn tool_tip(&self) -> ksni::ToolTip {
        let (title, description) = match self.state.lock() {
            Ok(state) => (state.title(), state.message().unwrap_or_default().to_string()),
            Err(_) => ("DanmaQ".to_string(), String::new()),
        };
        ksni::ToolTip {
            title,
            description,
            ..Default::default()
        }
    }

    // Left click brings the form back.
    fn activate(&mut self, _x: i32, _y: i32) {
        self.request(TrayAction::ShowForm);
    }

    fn menu(&self) -> Vec<ksni::MenuItem<Self>> {
        use ksni::menu::*;

        let toggle_label = self
            .state
            .lock()
            .map(|state| state.toggle_label())
            .unwrap_or("Subscribe");

        vec![
            StandardItem {
                label: "Show".into(),
                activate: Box::new(|this: &mut DanmaqTray| this.request(TrayAction::ShowForm)),
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: toggle_label.into(),
                activate: Box::new(|this: &mut DanmaqTray| {
                    this.request(TrayAction::ToggleSubscription)
                }),
                ..Default::default()
            }
            .into(),
            StandardItem {
                label: "Preferences".into(),
                activate: Box::new(|this: &mut DanmaqTray| {
                    this.request(TrayAction::OpenPreferences)
                }),
                ..Default::default()
            }
            .into(),
            MenuItem::Separator,
            StandardItem {
                label: "Exit".into(),
                activate: Box::new(|this: &mut DanmaqTray| this.request(TrayAction::Exit)),
                ..Default::default()
            }
            .into(),
        ]
    }
}

/// GUI-side handle on the tray. When no tray could be registered
/// `is_connected` stays false and the window shows its own menu.
pub struct Tray {
    state: Arc<Mutex<TrayState>>,
    #[cfg(target_os = "linux")]
    update_signal: Arc<tokio::sync::Notify>,
    #[cfg(target_os = "linux")]
    shutdown_signal: Arc<tokio::sync::Notify>,
}

impl Tray {
    pub fn spawn(ctx: &egui::Context) -> Self {
        let state = Arc::new(Mutex::new(TrayState::default()));

        #[cfg(target_os = "linux")]
        {
            let update_signal = Arc::new(tokio::sync::Notify::new());
            let shutdown_signal = Arc::new(tokio::sync::Notify::new());
            spawn_service(
                DanmaqTray {
                    state: Arc::clone(&state),
                    ctx: ctx.clone(),
                },
                Arc::clone(&update_signal),
                Arc::clone(&shutdown_signal),
            );
            Self {
                state,
                update_signal,
                shutdown_signal,
            }
        }

        #[cfg(not(target_os = "linux"))]
        {
            let _ = ctx;
            tracing::debug!("No system tray on this platform, using the window menu.");
            Self { state }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state
            .lock()
            .map(|state| state.connected)
            .unwrap_or(false)
    }

    pub fn take_actions(&self) -> Vec<TrayAction> {
        self.state
            .lock()
            .map(|mut state| std::mem::take(&mut state.actions))
            .unwrap_or_default()
    }

    pub fn set_running(&self, running: bool) {
        let changed = self
            .state
            .lock()
            .map(|mut state| state.set_running(running))
            .unwrap_or(false);
        if changed {
            self.refresh();
        }
    }

    pub fn show_message(&self, message: &str) {
        let changed = self
            .state
            .lock()
            .map(|mut state| state.set_message(message))
            .unwrap_or(false);
        if changed {
            self.refresh();
        }
    }

    fn refresh(&self) {
        #[cfg(target_os = "linux")]
        self.update_signal.notify_one();
    }
}

impl Drop for Tray {
    fn drop(&mut self) {
        #[cfg(target_os = "linux")]
        {
            self.shutdown_signal.notify_one();
            tracing::debug!("Signaled tray thread to shut down.");
        }
    }
}

#[cfg(target_os = "linux")]
fn spawn_service(
    tray: DanmaqTray,
    update_signal: Arc<tokio::sync::Notify>,
    shutdown_signal: Arc<tokio::sync::Notify>,
) {
    let spawned = std::thread::Builder::new()
        .name("danmaq-tray".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(runtime_error) => {
                    tracing::error!("Could not build the tray runtime: {runtime_error}");
                    return;
                }
            };

            runtime.block_on(async move {
                let state = Arc::clone(&tray.state);
                let ctx = tray.ctx.clone();

                let handle = match tray.spawn().await {
                    Ok(handle) => handle,
                    Err(tray_error) => {
                        tracing::warn!(
                            "No system tray available ({tray_error}), using the window menu."
                        );
                        return;
                    }
                };

                tracing::info!("Tray icon registered.");
                if let Ok(mut state) = state.lock() {
                    state.connected = true;
                }
                ctx.request_repaint();

                loop {
                    tokio::select! {
                        _ = shutdown_signal.notified() => {
                            handle.shutdown().await;
                            break;
                        }
                        _ = update_signal.notified() => {
                            // Makes the host re-read title, icon and menu.
                            handle.update(|_| {}).await;
                        }
                    }
                }
            });
        });

    if let Err(spawn_error) = spawned {
        tracing::error!("Could not spawn the tray thread: {spawn_error}");
    }
}
