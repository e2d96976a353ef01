use danmaq::{Danmaku, Presenter};
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Vec2};
use std::time::Instant;

const OUTLINE_OFFSETS: [Vec2; 4] = [
    Vec2::new(-1.5, 0.0),
    Vec2::new(1.5, 0.0),
    Vec2::new(0.0, -1.5),
    Vec2::new(0.0, 1.5),
];

/// Shows the click-through overlay window while subscribed or while danmaku
/// are still on screen.
pub fn show(ctx: &egui::Context, presenter: &Presenter, now: Instant) {
    if !presenter.is_running() && presenter.active_count() == 0 {
        return;
    }

    ctx.show_viewport_immediate(
        egui::ViewportId::from_hash_of("danmaku_overlay"),
        egui::ViewportBuilder::default()
            .with_title("Danmaku Overlay")
            .with_transparent(true)
            .with_decorations(false)
            .with_maximized(true)
            .with_always_on_top()
            .with_mouse_passthrough(true)
            .with_taskbar(false),
        |ctx, _class| paint(ctx, presenter, now),
    );
}

fn paint(ctx: &egui::Context, presenter: &Presenter, now: Instant) {
    // Keep the panel transparent so only the text is visible.
    egui::CentralPanel::default()
        .frame(egui::Frame::default())
        .show(ctx, |ui| {
            let screen = ui.max_rect();
            let painter = ui.painter();

            for danmaku in presenter.active() {
                paint_danmaku(painter, danmaku, screen, now);
            }
        });

    if presenter.active_count() > 0 {
        ctx.request_repaint();
    }
}

fn paint_danmaku(painter: &egui::Painter, danmaku: &Danmaku, screen: egui::Rect, now: Instant) {
    let font = FontId::proportional(danmaku.font_size());
    let alpha = (danmaku.opacity() * 255.0).round() as u8;
    let fill = rgba(danmaku.color().rgb(), alpha);

    let galley = painter.layout_no_wrap(danmaku.text().to_string(), font.clone(), fill);
    let [x, y] = danmaku.origin([screen.width(), screen.height()], galley.size().x, now);
    let origin = Pos2::new(screen.min.x + x, screen.min.y + y);

    if danmaku.outline() {
        let outline = rgba(danmaku.color().outline_rgb(), alpha);
        for offset in OUTLINE_OFFSETS {
            painter.text(
                origin + offset,
                Align2::LEFT_TOP,
                danmaku.text(),
                font.clone(),
                outline,
            );
        }
    }

    painter.galley(origin, galley, fill);
}

fn rgba([r, g, b]: [u8; 3], alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(r, g, b, alpha)
}
