//! Danmaku overlay client.
//!
//! A background [`poller`] fetches comments for a channel and hands them to
//! the [`presenter`], which owns the set of on-screen [`danmaku`].

pub mod comment;
pub mod config;
pub mod danmaku;
pub mod poller;
pub mod presenter;

pub use comment::{Comment, DanmakuColor, Position};
pub use config::{ConnectionPreferences, DanmaqConfig, DisplayPreferences, SettingsStore};
pub use danmaku::{Danmaku, DanmakuId};
pub use poller::{channel_url, PollOutcome, Poller, PollerEvent, PollerHandle};
pub use presenter::{ConnectionState, Notification, Presenter};
