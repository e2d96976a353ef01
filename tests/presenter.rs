mod common;

use common::FakeServer;
use danmaq::config::PollingSettings;
use danmaq::{
    ConnectionPreferences, ConnectionState, Danmaku, DisplayPreferences, Presenter, SettingsStore,
};
use std::thread;
use std::time::{Duration, Instant};

fn connection(server: &FakeServer) -> ConnectionPreferences {
    ConnectionPreferences {
        server_url: server.base.clone(),
        channel: "demo".to_string(),
        access_token: "secret".to_string(),
        save_as_default: false,
    }
}

fn presenter(dir: &tempfile::TempDir) -> Presenter {
    Presenter::new(
        SettingsStore::at(dir.path().join("danmaq.toml")),
        DisplayPreferences::default(),
        PollingSettings {
            request_timeout_secs: 2,
            retry_delay_ms: 10,
            min_interval_ms: 10,
        },
    )
}

fn pump_until(presenter: &mut Presenter, done: impl Fn(&Presenter) -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !done(presenter) {
        assert!(Instant::now() < deadline, "presenter did not settle in time");
        presenter.pump(Instant::now());
        thread::sleep(Duration::from_millis(10));
    }
}

#[test]
fn two_comments_become_two_overlays_that_exit_cleanly() {
    let server = FakeServer::start(vec![(
        200,
        r#"[{"text":"hi","style":"scroll","position":"top"}, {"text":"yo","style":"float","position":"bottom"}]"#,
    )]);
    let dir = tempfile::tempdir().unwrap();
    let mut presenter = presenter(&dir);

    assert!(presenter.start(&connection(&server)).unwrap());
    pump_until(&mut presenter, |presenter| presenter.active_count() == 2);

    let shown: Vec<(String, String, String)> = presenter
        .active()
        .map(|danmaku| {
            let comment = danmaku.comment();
            (
                comment.text.clone(),
                comment.style.clone(),
                comment.position.clone(),
            )
        })
        .collect();
    assert_eq!(
        shown,
        vec![
            ("hi".to_string(), "scroll".to_string(), "top".to_string()),
            ("yo".to_string(), "float".to_string(), "bottom".to_string()),
        ]
    );

    let ids: Vec<_> = presenter.active().map(Danmaku::id).collect();
    for id in ids {
        assert!(presenter.on_exited(id));
    }
    assert_eq!(presenter.active_count(), 0);
    assert_eq!(presenter.state(), ConnectionState::Running);

    presenter.stop();
}

#[test]
fn start_notification_names_the_server() {
    let server = FakeServer::start(Vec::new());
    let dir = tempfile::tempdir().unwrap();
    let mut presenter = presenter(&dir);

    presenter.start(&connection(&server)).unwrap();
    assert_eq!(presenter.server(), Some(server.base.as_str()));
    let mut notifications = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while notifications.is_empty() && Instant::now() < deadline {
        presenter.pump(Instant::now());
        notifications.extend(presenter.take_notifications());
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(
        notifications[0].body,
        format!("Subscribing danmaku from {}", server.base)
    );
    presenter.stop();
}

#[test]
fn stopping_with_live_overlays_clears_them_and_allows_restart() {
    let body = r#"[{"text":"a","style":"white","position":"fly"},{"text":"b","style":"red","position":"fly"},{"text":"c","style":"blue","position":"top"}]"#;
    let server = FakeServer::start(vec![(200, body), (200, body)]);
    let dir = tempfile::tempdir().unwrap();
    let mut presenter = presenter(&dir);

    presenter.start(&connection(&server)).unwrap();
    pump_until(&mut presenter, |presenter| presenter.active_count() >= 3);

    presenter.stop();
    assert_eq!(presenter.state(), ConnectionState::Idle);
    assert_eq!(presenter.active_count(), 0);

    // Events from the old poller never reach the presenter again.
    thread::sleep(Duration::from_millis(100));
    presenter.pump(Instant::now());
    assert_eq!(presenter.active_count(), 0);

    assert!(presenter.start(&connection(&server)).unwrap());
    assert_eq!(presenter.state(), ConnectionState::Running);
    presenter.stop();
}
