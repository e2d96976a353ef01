use crate::comment::Comment;
use crate::config::{ConnectionPreferences, DisplayPreferences, PollingSettings, SettingsStore};
use crate::danmaku::{Danmaku, DanmakuId};
use crate::poller::{Poller, PollerEvent, PollerHandle, Waker};
use anyhow::Result;
use crossbeam_channel::{Receiver, TryRecvError};
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Running,
}

/// A short message for the user about the subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
}

impl Notification {
    fn new(body: impl Into<String>) -> Self {
        Self {
            title: "DanmaQ".to_string(),
            body: body.into(),
        }
    }
}

/// Builds a repaint waker for each new poller.
pub type WakerFactory = Box<dyn Fn() -> Waker>;

/// Connects poller events to the set of danmaku currently on screen.
///
/// Lives on the GUI thread; the poller only talks to it through its channel.
pub struct Presenter {
    state: ConnectionState,
    poller: Option<PollerHandle>,
    events: Option<Receiver<PollerEvent>>,
    active: BTreeMap<DanmakuId, Danmaku>,
    next_id: u64,
    display: DisplayPreferences,
    polling: PollingSettings,
    settings: SettingsStore,
    pending_default_server: Option<String>,
    notifications: Vec<Notification>,
    waker_factory: Option<WakerFactory>,
}

impl Presenter {
    pub fn new(
        settings: SettingsStore,
        display: DisplayPreferences,
        polling: PollingSettings,
    ) -> Self {
        Self {
            state: ConnectionState::Idle,
            poller: None,
            events: None,
            active: BTreeMap::new(),
            next_id: 0,
            display: display.sanitized(),
            polling,
            settings,
            pending_default_server: None,
            notifications: Vec::new(),
            waker_factory: None,
        }
    }

    pub fn with_waker_factory(mut self, factory: WakerFactory) -> Self {
        self.waker_factory = Some(factory);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ConnectionState::Running
    }

    /// Server of the running subscription, if any.
    pub fn server(&self) -> Option<&str> {
        self.poller.as_ref().map(PollerHandle::server)
    }

    pub fn display(&self) -> &DisplayPreferences {
        &self.display
    }

    pub fn active(&self) -> impl Iterator<Item = &Danmaku> {
        self.active.values()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Starts polling with the form values. Returns `false` when a
    /// subscription is already running.
    pub fn start(&mut self, connection: &ConnectionPreferences) -> Result<bool> {
        if self.is_running() {
            tracing::debug!("Subscription already running, ignoring start request.");
            return Ok(false);
        }
        connection.validate()?;

        let (sender, receiver) = crossbeam_channel::unbounded();
        let waker = self.waker_factory.as_ref().map(|factory| factory());
        let handle = Poller::from_preferences(connection, &self.polling).spawn(sender, waker)?;

        self.pending_default_server = connection
            .save_as_default
            .then(|| connection.server_url.trim().to_string());
        self.poller = Some(handle);
        self.events = Some(receiver);
        self.state = ConnectionState::Running;
        Ok(true)
    }

    /// Stops the running poller and closes every danmaku.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        if let Some(handle) = self.poller.take() {
            handle.stop();
        }
        self.finish();
    }

    /// Starts when idle, stops when running.
    pub fn toggle(&mut self, connection: &ConnectionPreferences) -> Result<()> {
        if self.is_running() {
            self.stop();
        } else {
            self.start(connection)?;
        }
        Ok(())
    }

    /// Handles every queued poller event. Returns how many were handled.
    pub fn pump(&mut self, now: Instant) -> usize {
        let mut handled = 0;
        while let Some(receiver) = &self.events {
            let event = match receiver.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => PollerEvent::Finished,
            };
            handled += 1;

            match event {
                PollerEvent::Started => self.on_started(),
                PollerEvent::Comment(comment) => {
                    self.on_comment(comment, now);
                }
                PollerEvent::Finished => {
                    self.poller = None;
                    self.finish();
                }
            }
        }
        handled
    }

    /// Retires every danmaku whose lifetime is over.
    pub fn tick(&mut self, now: Instant) {
        let expired: Vec<DanmakuId> = self
            .active
            .values()
            .filter(|danmaku| danmaku.is_expired(now))
            .map(Danmaku::id)
            .collect();

        for id in expired {
            self.on_exited(id);
        }
    }

    pub fn on_comment(&mut self, comment: Comment, now: Instant) -> DanmakuId {
        let id = DanmakuId(self.next_id);
        self.next_id += 1;

        let lane = self.free_lane(&comment, id, now);
        let danmaku = Danmaku::new(id, comment, &self.display, lane, now);
        tracing::debug!(%id, lane, text = danmaku.text(), "Showing danmaku.");
        self.active.insert(id, danmaku);
        id
    }

    /// Releases a finished danmaku. Unknown ids are ignored.
    pub fn on_exited(&mut self, id: DanmakuId) -> bool {
        match self.active.remove(&id) {
            Some(_) => true,
            None => {
                tracing::trace!(%id, "Exit signal for an untracked danmaku.");
                false
            }
        }
    }

    /// Replaces the preferences used for danmaku created from now on.
    pub fn apply_preferences(&mut self, display: DisplayPreferences) {
        self.display = display.sanitized();
    }

    /// Feeds events from `receiver` as if a poller had been started.
    #[cfg(test)]
    pub(crate) fn attach_events(&mut self, receiver: Receiver<PollerEvent>) {
        self.events = Some(receiver);
        self.state = ConnectionState::Running;
    }

    fn on_started(&mut self) {
        if let Some(server) = self.pending_default_server.take() {
            if let Err(save_error) = self.settings.save_default_server(&server) {
                tracing::error!("{save_error:#}");
            }
        }
        let server = self.server().unwrap_or_default().to_string();
        tracing::info!(%server, "Subscription started.");
        self.notifications
            .push(Notification::new(format!("Subscribing danmaku from {server}")));
    }

    fn finish(&mut self) {
        self.events = None;
        self.pending_default_server = None;

        let closed = self.active.len();
        self.active.clear();
        self.state = ConnectionState::Idle;

        tracing::info!(closed, "Subscription finished.");
        self.notifications
            .push(Notification::new("Subscription Finished"));
    }

    fn free_lane(&self, comment: &Comment, id: DanmakuId, now: Instant) -> usize {
        let position = comment.position();
        let lanes = self.display.lanes();

        (0..lanes)
            .find(|lane| {
                !self.active.values().any(|other| {
                    other.position() == position
                        && other.lane() == *lane
                        && !other.releases_lane(now)
                })
            })
            .unwrap_or((id.0 % lanes as u64) as usize)
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        if let Some(handle) = &self.poller {
            handle.stop();
        }
    }
}
