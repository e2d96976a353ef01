use crate::comment::Comment;
use crate::config::{ConnectionPreferences, PollingSettings};
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const AUTH_HEADER: &str = "X-GDANMAKU-AUTH-KEY";

const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(50);

/// Called after events were queued so the GUI thread wakes up.
pub type Waker = Box<dyn Fn() + Send + 'static>;

/// Messages sent from the poller thread to the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollerEvent {
    Started,
    Comment(Comment),
    Finished,
}

/// Result of a single request against the channel endpoint.
#[derive(Debug)]
pub enum PollOutcome {
    Comments(Vec<Comment>),
    /// 200 with an empty body.
    Empty,
    /// 200 with a body that is not a JSON array of comments.
    Malformed,
    Rejected(StatusCode),
    Unreachable(reqwest::Error),
}

/// Joins the server base and the channel resource with exactly one `/`.
pub fn channel_url(server: &str, channel: &str) -> String {
    let uri = format!("/api/v1/channels/{channel}/danmaku");
    let server = server.strip_suffix('/').unwrap_or(server);
    format!("{server}{uri}")
}

/// Interprets a response; the whole body is discarded if any entry fails to decode.
pub fn decode_body(status: StatusCode, body: &str) -> PollOutcome {
    if status != StatusCode::OK {
        return PollOutcome::Rejected(status);
    }
    if body.is_empty() {
        return PollOutcome::Empty;
    }
    match serde_json::from_str::<Vec<Comment>>(body) {
        Ok(comments) => PollOutcome::Comments(comments),
        Err(decode_error) => {
            tracing::debug!("Discarding undecodable danmaku response: {decode_error}");
            PollOutcome::Malformed
        }
    }
}

/// Fetches danmaku for one channel until cancelled.
#[derive(Debug, Clone)]
pub struct Poller {
    server: String,
    url: String,
    access_token: String,
    request_timeout: Duration,
    retry_delay: Duration,
    min_interval: Duration,
}

impl Poller {
    pub fn new(server: &str, channel: &str, access_token: &str) -> Self {
        let polling = PollingSettings::default();
        Self {
            server: server.to_string(),
            url: channel_url(server, channel),
            access_token: access_token.to_string(),
            request_timeout: polling.request_timeout(),
            retry_delay: polling.retry_delay(),
            min_interval: polling.min_interval(),
        }
    }

    pub fn from_preferences(connection: &ConnectionPreferences, polling: &PollingSettings) -> Self {
        Self::new(
            connection.server_url.trim(),
            connection.channel.trim(),
            &connection.access_token,
        )
        .with_request_timeout(polling.request_timeout())
        .with_retry_delay(polling.retry_delay())
        .with_min_interval(polling.min_interval())
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn build_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .build()
            .context("Could not build the HTTP client for the danmaku poller.")
    }

    /// Issues one GET and classifies the response.
    pub fn poll_once(&self, client: &Client) -> PollOutcome {
        let response = match client
            .get(&self.url)
            .header(AUTH_HEADER, &self.access_token)
            .send()
        {
            Ok(response) => response,
            Err(request_error) => return PollOutcome::Unreachable(request_error),
        };

        let status = response.status();
        match response.text() {
            Ok(body) => decode_body(status, &body),
            Err(read_error) => PollOutcome::Unreachable(read_error),
        }
    }

    /// Polls until `cancel` is set or the receiving side goes away.
    ///
    /// `Started` is sent once the client is ready and `Finished` is always
    /// the last event.
    pub fn run(&self, events: &Sender<PollerEvent>, cancel: &AtomicBool, waker: Option<&Waker>) {
        let wake = || {
            if let Some(waker) = waker {
                waker();
            }
        };

        match self.build_client() {
            Ok(client) => {
                tracing::info!(url = %self.url, "Subscribing to danmaku ...");
                if events.send(PollerEvent::Started).is_ok() {
                    wake();
                    self.poll_loop(&client, events, cancel, &wake);
                }
            }
            Err(client_error) => {
                tracing::error!("{client_error:#}");
            }
        }

        tracing::info!(url = %self.url, "Danmaku subscription finished.");
        let _ = events.send(PollerEvent::Finished);
        wake();
    }

    fn poll_loop(
        &self,
        client: &Client,
        events: &Sender<PollerEvent>,
        cancel: &AtomicBool,
        wake: &dyn Fn(),
    ) {
        while !cancel.load(Ordering::Relaxed) {
            let requested_at = Instant::now();
            match self.poll_once(client) {
                PollOutcome::Comments(comments) => {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    if !comments.is_empty() {
                        tracing::debug!(count = comments.len(), "Received danmaku.");
                        for comment in comments {
                            if events.send(PollerEvent::Comment(comment)).is_err() {
                                return;
                            }
                        }
                        wake();
                    }
                    self.pace(requested_at, cancel);
                }
                PollOutcome::Empty | PollOutcome::Malformed => self.pace(requested_at, cancel),
                PollOutcome::Rejected(status) => {
                    tracing::warn!(%status, url = %self.url, "Danmaku server rejected the request.");
                    sleep_unless_cancelled(self.retry_delay, cancel);
                }
                PollOutcome::Unreachable(request_error) => {
                    tracing::debug!(url = %self.url, "Danmaku request failed: {request_error}");
                    sleep_unless_cancelled(self.retry_delay, cancel);
                }
            }
        }
    }

    /// Keeps a server that answers instantly from turning the loop into a spin.
    fn pace(&self, requested_at: Instant, cancel: &AtomicBool) {
        let remaining = self.min_interval.saturating_sub(requested_at.elapsed());
        sleep_unless_cancelled(remaining, cancel);
    }

    /// Runs the poller on its own thread.
    pub fn spawn(self, events: Sender<PollerEvent>, waker: Option<Waker>) -> Result<PollerHandle> {
        let cancel = Arc::new(AtomicBool::new(false));
        let thread_cancel = Arc::clone(&cancel);
        let server = self.server.clone();

        let thread = thread::Builder::new()
            .name("danmaku-poller".to_string())
            .spawn(move || self.run(&events, &thread_cancel, waker.as_ref()))
            .context("Could not spawn the danmaku poller thread.")?;

        Ok(PollerHandle {
            server,
            cancel,
            thread,
        })
    }
}

fn sleep_unless_cancelled(delay: Duration, cancel: &AtomicBool) {
    let Some(deadline) = Instant::now().checked_add(delay) else {
        return;
    };
    loop {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        thread::sleep(CANCEL_CHECK_INTERVAL.min(deadline - now));
    }
}

/// Owner side of a running poller thread.
#[derive(Debug)]
pub struct PollerHandle {
    server: String,
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl PollerHandle {
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Asks the thread to stop; an in-flight request still runs to its timeout.
    pub fn stop(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_stopping(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    pub fn join(self) -> Result<()> {
        self.stop();
        self.thread
            .join()
            .map_err(|_| anyhow::anyhow!("The danmaku poller thread panicked."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_separator_is_not_doubled() {
        assert_eq!(
            channel_url("http://dm.tuna.moe/", "demo"),
            "http://dm.tuna.moe/api/v1/channels/demo/danmaku"
        );
    }

    #[test]
    fn missing_separator_is_not_omitted() {
        assert_eq!(
            channel_url("http://localhost:5000", "live"),
            "http://localhost:5000/api/v1/channels/live/danmaku"
        );
    }

    #[test]
    fn server_with_path_prefix_keeps_it() {
        assert_eq!(
            channel_url("https://example.org/dm/", "c"),
            "https://example.org/dm/api/v1/channels/c/danmaku"
        );
    }

    #[test]
    fn decodes_comments_in_array_order() {
        let body = r#"[{"text":"hi","style":"scroll","position":"top"},{"text":"yo","style":"float","position":"bottom"}]"#;

        match decode_body(StatusCode::OK, body) {
            PollOutcome::Comments(comments) => assert_eq!(
                comments,
                vec![
                    Comment::new("hi", "scroll", "top"),
                    Comment::new("yo", "float", "bottom"),
                ]
            ),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn empty_array_yields_no_comments() {
        match decode_body(StatusCode::OK, "[]") {
            PollOutcome::Comments(comments) => assert!(comments.is_empty()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_malformed() {
        assert!(matches!(
            decode_body(StatusCode::OK, "<html>oops</html>"),
            PollOutcome::Malformed
        ));
    }

    #[test]
    fn entry_missing_a_field_discards_the_response() {
        let body = r#"[{"text":"hi","style":"white","position":"fly"},{"text":"no style"}]"#;

        assert!(matches!(
            decode_body(StatusCode::OK, body),
            PollOutcome::Malformed
        ));
    }

    #[test]
    fn empty_body_and_other_statuses_carry_no_data() {
        assert!(matches!(decode_body(StatusCode::OK, ""), PollOutcome::Empty));
        assert!(matches!(
            decode_body(StatusCode::FORBIDDEN, r#"[{"text":"a","style":"b","position":"c"}]"#),
            PollOutcome::Rejected(status) if status == StatusCode::FORBIDDEN
        ));
    }

    #[test]
    fn cancelled_sleep_returns_early() {
        let cancel = AtomicBool::new(true);
        let started = Instant::now();

        sleep_unless_cancelled(Duration::from_secs(5), &cancel);

        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn preferences_are_trimmed_into_the_url() {
        let connection = ConnectionPreferences {
            server_url: " http://host/ ".to_string(),
            channel: "demo ".to_string(),
            access_token: "secret".to_string(),
            save_as_default: false,
        };

        let poller = Poller::from_preferences(&connection, &PollingSettings::default());

        assert_eq!(poller.url(), "http://host/api/v1/channels/demo/danmaku");
        assert_eq!(poller.server(), "http://host/");
    }
}
