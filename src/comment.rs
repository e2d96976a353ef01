use serde::{Deserialize, Serialize};

/// One danmaku entry as served by the channel endpoint.
///
/// The three fields are kept verbatim; [`Comment::position`] and
/// [`Comment::color`] interpret them for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub text: String,
    pub style: String,
    pub position: String,
}

impl Comment {
    pub fn new(
        text: impl Into<String>,
        style: impl Into<String>,
        position: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            style: style.into(),
            position: position.into(),
        }
    }

    pub fn position(&self) -> Position {
        Position::parse(&self.position)
    }

    pub fn color(&self) -> DanmakuColor {
        DanmakuColor::parse(&self.style)
    }
}

/// Where a danmaku is placed on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Scrolls from the right edge to the left edge.
    Fly,
    Top,
    Bottom,
}

impl Position {
    /// Unknown values scroll, like the server's default.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "top" => Position::Top,
            "bottom" => Position::Bottom,
            _ => Position::Fly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DanmakuColor {
    White,
    Black,
    Blue,
    Red,
    Yellow,
    Cyan,
    Green,
    Purple,
}

impl DanmakuColor {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "black" => DanmakuColor::Black,
            "blue" => DanmakuColor::Blue,
            "red" => DanmakuColor::Red,
            "yellow" => DanmakuColor::Yellow,
            "cyan" => DanmakuColor::Cyan,
            "green" => DanmakuColor::Green,
            "purple" => DanmakuColor::Purple,
            _ => DanmakuColor::White,
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            DanmakuColor::White => [255, 255, 255],
            DanmakuColor::Black => [0, 0, 0],
            DanmakuColor::Blue => [20, 95, 198],
            DanmakuColor::Red => [231, 34, 0],
            DanmakuColor::Yellow => [255, 221, 2],
            DanmakuColor::Cyan => [0, 255, 255],
            DanmakuColor::Green => [4, 205, 0],
            DanmakuColor::Purple => [135, 76, 177],
        }
    }

    /// Colour of the text outline, chosen to contrast with the fill.
    pub fn outline_rgb(self) -> [u8; 3] {
        match self {
            DanmakuColor::Black => [255, 255, 255],
            _ => [0, 0, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_and_keeps_fields_verbatim() {
        let comment: Comment =
            serde_json::from_str(r#"{"text":" hi ","style":"Blue","position":"TOP","extra":1}"#)
                .unwrap();

        assert_eq!(comment, Comment::new(" hi ", "Blue", "TOP"));
        assert_eq!(comment.position(), Position::Top);
        assert_eq!(comment.color(), DanmakuColor::Blue);
    }

    #[test]
    fn unknown_attributes_fall_back() {
        let comment = Comment::new("yo", "scroll", "float");

        assert_eq!(comment.position(), Position::Fly);
        assert_eq!(comment.color(), DanmakuColor::White);
    }

    #[test]
    fn black_text_gets_a_light_outline() {
        assert_eq!(DanmakuColor::Black.outline_rgb(), [255, 255, 255]);
        assert_eq!(DanmakuColor::Red.outline_rgb(), [0, 0, 0]);
    }
}
