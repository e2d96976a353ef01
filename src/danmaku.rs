use crate::comment::{Comment, DanmakuColor, Position};
use crate::config::DisplayPreferences;
use std::fmt;
use std::time::{Duration, Instant};

/// Tracking key issued by the presenter, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DanmakuId(pub u64);

impl fmt::Display for DanmakuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dm-{}", self.0)
    }
}

/// A single on-screen comment.
///
/// Timing and size are copied from the display preferences at creation, so
/// later preference changes leave it alone.
#[derive(Debug, Clone)]
pub struct Danmaku {
    id: DanmakuId,
    comment: Comment,
    position: Position,
    color: DanmakuColor,
    lane: usize,
    spawned_at: Instant,
    lifetime: Duration,
    font_size: f32,
    lane_height: f32,
    opacity: f32,
    outline: bool,
}

impl Danmaku {
    pub fn new(
        id: DanmakuId,
        comment: Comment,
        display: &DisplayPreferences,
        lane: usize,
        now: Instant,
    ) -> Self {
        let position = comment.position();
        let lifetime = match position {
            Position::Fly => display.fly_duration(),
            Position::Top | Position::Bottom => display.fixed_duration(),
        };

        Self {
            id,
            color: comment.color(),
            comment,
            position,
            lane,
            spawned_at: now,
            lifetime,
            font_size: display.font_size,
            lane_height: display.lane_height(),
            opacity: display.opacity.clamp(0.0, 1.0),
            outline: display.outline,
        }
    }

    pub fn id(&self) -> DanmakuId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.comment.text
    }

    pub fn comment(&self) -> &Comment {
        &self.comment
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn color(&self) -> DanmakuColor {
        self.color
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn font_size(&self) -> f32 {
        self.font_size
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn outline(&self) -> bool {
        self.outline
    }

    /// Fraction of the lifetime already elapsed, in `0.0..=1.0`.
    pub fn progress(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.spawned_at);
        (elapsed.as_secs_f32() / self.lifetime.as_secs_f32()).clamp(0.0, 1.0)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.spawned_at) >= self.lifetime
    }

    /// Whether a newer danmaku may share this one's lane.
    pub fn releases_lane(&self, now: Instant) -> bool {
        match self.position {
            Position::Fly => self.progress(now) >= 0.25,
            Position::Top | Position::Bottom => self.is_expired(now),
        }
    }

    /// Top-left corner of the text inside a `screen` sized area.
    pub fn origin(&self, screen: [f32; 2], text_width: f32, now: Instant) -> [f32; 2] {
        let [width, height] = screen;
        let margin = self.lane_height * 0.25;
        let lane_offset = self.lane as f32 * self.lane_height;

        match self.position {
            Position::Fly => {
                let travel = width + text_width;
                [width - travel * self.progress(now), margin + lane_offset]
            }
            Position::Top => [(width - text_width) / 2.0, margin + lane_offset],
            Position::Bottom => [
                (width - text_width) / 2.0,
                height - margin - lane_offset - self.lane_height,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> DisplayPreferences {
        DisplayPreferences {
            font_size: 20.0,
            line_spacing: 1.0,
            fly_duration_secs: 10.0,
            fixed_duration_secs: 4.0,
            ..Default::default()
        }
    }

    #[test]
    fn lifetime_follows_position() {
        let now = Instant::now();
        let fly = Danmaku::new(DanmakuId(1), Comment::new("a", "white", "fly"), &display(), 0, now);
        let top = Danmaku::new(DanmakuId(2), Comment::new("b", "white", "top"), &display(), 0, now);

        assert_eq!(fly.lifetime(), Duration::from_secs(10));
        assert_eq!(top.lifetime(), Duration::from_secs(4));
    }

    #[test]
    fn expires_after_lifetime() {
        let now = Instant::now();
        let dm = Danmaku::new(DanmakuId(1), Comment::new("a", "white", "top"), &display(), 0, now);

        assert!(!dm.is_expired(now + Duration::from_secs(3)));
        assert!(dm.is_expired(now + Duration::from_secs(4)));
        assert_eq!(dm.progress(now + Duration::from_secs(60)), 1.0);
    }

    #[test]
    fn fly_scrolls_from_right_edge_past_left_edge() {
        let now = Instant::now();
        let dm = Danmaku::new(DanmakuId(1), Comment::new("a", "white", "fly"), &display(), 2, now);

        let start = dm.origin([1000.0, 500.0], 100.0, now);
        let end = dm.origin([1000.0, 500.0], 100.0, now + Duration::from_secs(10));

        assert_eq!(start, [1000.0, 45.0]);
        assert_eq!(end[0], -100.0);
    }

    #[test]
    fn bottom_lanes_stack_upwards() {
        let now = Instant::now();
        let first = Danmaku::new(DanmakuId(1), Comment::new("a", "white", "bottom"), &display(), 0, now);
        let second = Danmaku::new(DanmakuId(2), Comment::new("b", "white", "bottom"), &display(), 1, now);

        let [x, y0] = first.origin([1000.0, 500.0], 200.0, now);
        let [_, y1] = second.origin([1000.0, 500.0], 200.0, now);

        assert_eq!(x, 400.0);
        assert_eq!(y0, 475.0);
        assert!(y1 < y0);
    }

    #[test]
    fn fly_lane_frees_up_before_expiry() {
        let now = Instant::now();
        let dm = Danmaku::new(DanmakuId(1), Comment::new("a", "white", "fly"), &display(), 0, now);

        assert!(!dm.releases_lane(now + Duration::from_secs(1)));
        assert!(dm.releases_lane(now + Duration::from_secs(3)));
    }

    #[test]
    fn later_preference_changes_do_not_apply() {
        let now = Instant::now();
        let mut prefs = display();
        let dm = Danmaku::new(DanmakuId(1), Comment::new("a", "white", "fly"), &prefs, 0, now);
        prefs.font_size = 80.0;

        assert_eq!(dm.font_size(), 20.0);
    }
}
