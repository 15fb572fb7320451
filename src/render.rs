//! Half-block pixel renderer.
//!
//! Every terminal cell shows two vertically stacked pixels (`▀` with separate
//! foreground and background colors). Drawing reads the world and the game state
//! and never mutates either.

use crate::game::{Game, MAIN_MENU, MenuScreen, Mode};
use crate::physics::World;
use crossterm::{
    cursor, queue,
    style::{self, Color as CColor},
};
use std::io::{self, Write};

// ── Colors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    const fn lerp(a: Rgb, b: Rgb, t_256: u16) -> Rgb {
        let t = t_256 as i32;
        Rgb(
            (a.0 as i32 + (b.0 as i32 - a.0 as i32) * t / 256) as u8,
            (a.1 as i32 + (b.1 as i32 - a.1 as i32) * t / 256) as u8,
            (a.2 as i32 + (b.2 as i32 - a.2 as i32) * t / 256) as u8,
        )
    }

    const fn halve(self) -> Rgb {
        Rgb(self.0 / 2, self.1 / 2, self.2 / 2)
    }

    fn term(self) -> CColor {
        CColor::Rgb {
            r: self.0,
            g: self.1,
            b: self.2,
        }
    }
}

const SKY_TOP: Rgb = Rgb(135, 206, 235);
const SKY_BOT: Rgb = Rgb(184, 230, 240);
const GRASS: Rgb = Rgb(126, 200, 80);
const GRASS_LIGHT: Rgb = Rgb(154, 222, 108);
const DIRT: Rgb = Rgb(196, 163, 90);
const DIRT_DARK: Rgb = Rgb(166, 139, 75);
const PIPE_L: Rgb = Rgb(58, 154, 44);
const PIPE_M: Rgb = Rgb(93, 190, 76);
const PIPE_R: Rgb = Rgb(105, 200, 86);
const PIPE_HI: Rgb = Rgb(125, 216, 108);
const CAP_DARK: Rgb = Rgb(45, 122, 32);
const BIRD_Y: Rgb = Rgb(249, 215, 28);
const BIRD_HI: Rgb = Rgb(255, 235, 110);
const BIRD_WING: Rgb = Rgb(215, 165, 35);
const BIRD_EYE: Rgb = Rgb(255, 255, 255);
const BIRD_PUPIL: Rgb = Rgb(20, 20, 20);
const BIRD_BEAK: Rgb = Rgb(225, 75, 35);
const BIRD_BEAK_HI: Rgb = Rgb(240, 110, 50);
const HILL_FAR: Rgb = Rgb(120, 195, 75);
const HILL_NEAR: Rgb = Rgb(95, 175, 55);
const PANEL_EDGE: Rgb = Rgb(61, 33, 6);
const PANEL: Rgb = Rgb(139, 90, 43);
const PANEL_IN: Rgb = Rgb(112, 66, 20);
const WHITE: Rgb = Rgb(255, 255, 255);
const GOLD: Rgb = Rgb(255, 215, 0);
const RED: Rgb = Rgb(248, 113, 113);
const SHADOW: Rgb = Rgb(30, 30, 30);

// ── Pixel buffer with half-block rendering ──────────────────────────────────

pub struct PixelBuf {
    w: usize,
    h: usize, // pixel height = terminal rows * 2
    px: Vec<Rgb>,
}

/// A line of text centered on a terminal row, drawn over the pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub row: u16,
    pub text: String,
    pub color: Rgb,
}

impl TextLine {
    fn new(row: u16, text: impl Into<String>, color: Rgb) -> Self {
        TextLine {
            row,
            text: text.into(),
            color,
        }
    }
}

impl PixelBuf {
    /// `cols` by `rows` terminal cells.
    pub fn new(cols: u16, rows: u16) -> Self {
        let (w, h) = (cols as usize, rows as usize * 2);
        Self {
            w,
            h,
            px: vec![SKY_TOP; w * h],
        }
    }

    pub fn resize(&mut self, cols: u16, rows: u16) {
        self.w = cols as usize;
        self.h = rows as usize * 2;
        self.px.resize(self.w * self.h, SKY_TOP);
    }

    pub fn set(&mut self, x: i32, y: i32, c: Rgb) {
        if x >= 0 && y >= 0 && (x as usize) < self.w && (y as usize) < self.h {
            self.px[y as usize * self.w + x as usize] = c;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Rgb {
        self.px[y * self.w + x]
    }

    fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, c: Rgb) {
        for dy in 0..h {
            for dx in 0..w {
                self.set(x + dx, y + dy, c);
            }
        }
    }

    fn dim(&mut self) {
        for c in &mut self.px {
            *c = c.halve();
        }
    }

    pub fn render(&self, out: &mut impl Write, text: &[TextLine]) -> io::Result<()> {
        queue!(out, cursor::MoveTo(0, 0))?;
        let rows = self.h / 2;
        let mut prev_fg = Rgb(0, 0, 0);
        let mut prev_bg = Rgb(0, 0, 0);
        let mut need_fg = true;
        let mut need_bg = true;

        for row in 0..rows {
            for col in 0..self.w {
                let top = self.get(col, row * 2);
                let bot = self.get(col, row * 2 + 1);

                if top == bot {
                    if need_bg || prev_bg != top {
                        queue!(out, style::SetBackgroundColor(top.term()))?;
                        prev_bg = top;
                        need_bg = false;
                    }
                    queue!(out, style::Print(' '))?;
                } else {
                    if need_fg || prev_fg != top {
                        queue!(out, style::SetForegroundColor(top.term()))?;
                        prev_fg = top;
                        need_fg = false;
                    }
                    if need_bg || prev_bg != bot {
                        queue!(out, style::SetBackgroundColor(bot.term()))?;
                        prev_bg = bot;
                        need_bg = false;
                    }
                    queue!(out, style::Print('\u{2580}'))?; // ▀
                }
            }
            if row + 1 < rows {
                queue!(out, style::ResetColor, style::Print("\r\n"))?;
                need_fg = true;
                need_bg = true;
            }
        }

        for line in text {
            self.render_text(out, line)?;
        }
        queue!(out, style::ResetColor)?;
        out.flush()
    }

    /// Text takes the color of the upper pixel underneath as its background.
    fn render_text(&self, out: &mut impl Write, line: &TextLine) -> io::Result<()> {
        let row = line.row as usize;
        if row * 2 >= self.h {
            return Ok(());
        }
        let chars: Vec<char> = line.text.chars().take(self.w).collect();
        let start = (self.w - chars.len()) / 2;
        queue!(
            out,
            cursor::MoveTo(start as u16, line.row),
            style::SetForegroundColor(line.color.term())
        )?;
        for (i, ch) in chars.into_iter().enumerate() {
            let bg = self.get(start + i, row * 2);
            queue!(out, style::SetBackgroundColor(bg.term()), style::Print(ch))?;
        }
        Ok(())
    }
}

// ── 3x5 bitmap digits ──────────────────────────────────────────────────────

#[rustfmt::skip]
const DIGITS: [[u8; 15]; 10] = [
    [1,1,1, 1,0,1, 1,0,1, 1,0,1, 1,1,1], // 0
    [0,1,0, 1,1,0, 0,1,0, 0,1,0, 1,1,1], // 1
    [1,1,1, 0,0,1, 1,1,1, 1,0,0, 1,1,1], // 2
    [1,1,1, 0,0,1, 0,1,1, 0,0,1, 1,1,1], // 3
    [1,0,1, 1,0,1, 1,1,1, 0,0,1, 0,0,1], // 4
    [1,1,1, 1,0,0, 1,1,1, 0,0,1, 1,1,1], // 5
    [1,1,1, 1,0,0, 1,1,1, 1,0,1, 1,1,1], // 6
    [1,1,1, 0,0,1, 0,1,0, 0,1,0, 0,1,0], // 7
    [1,1,1, 1,0,1, 1,1,1, 1,0,1, 1,1,1], // 8
    [1,1,1, 1,0,1, 1,1,1, 0,0,1, 1,1,1], // 9
];

fn draw_digit(buf: &mut PixelBuf, x: i32, y: i32, d: u8, fg: Rgb) {
    let glyph = &DIGITS[d as usize];
    for row in 0..5 {
        for col in 0..3 {
            if glyph[row * 3 + col] == 1 {
                let px = x + col as i32;
                let py = y + row as i32;
                buf.set(px + 1, py + 1, SHADOW);
                buf.set(px, py, fg);
            }
        }
    }
}

fn draw_number(buf: &mut PixelBuf, cx: i32, y: i32, n: u32, fg: Rgb) {
    let s = n.to_string();
    let total_w = s.len() as i32 * 4 - 1; // 3px per digit + 1px spacing
    let start_x = cx - total_w / 2;
    for (i, ch) in s.bytes().enumerate() {
        draw_digit(buf, start_x + i as i32 * 4, y, ch - b'0', fg);
    }
}

// ── Scene ───────────────────────────────────────────────────────────────────

/// Maps world units onto the pixel buffer.
struct View {
    k: f64,     // pixels per world unit
    scale: f64, // decoration scale, 1.0 at 48 pixel rows
    pw: i32,
    sky_h: i32,
}

impl View {
    fn new(buf: &PixelBuf, world_height: f64, ground_height: f64) -> Self {
        let k = buf.h as f64 / world_height;
        View {
            k,
            scale: buf.h as f64 / 48.0,
            pw: buf.w as i32,
            sky_h: ((world_height - ground_height) * k) as i32,
        }
    }

    fn px(&self, v: f64) -> i32 {
        (v * self.k).floor() as i32
    }
}

/// Everything for the current frame. Returns the text to lay over the pixels.
pub fn draw(game: &Game, buf: &mut PixelBuf, idle_scroll: f64) -> Vec<TextLine> {
    let (_, world_h) = game.size();
    let rows = (buf.h / 2) as u16;
    let mid = rows / 2;
    match game.mode() {
        Mode::Playing => {
            draw_world(game.world(), world_h, buf);
            Vec::new()
        }
        Mode::GameOver { score } => {
            draw_world(game.world(), world_h, buf);
            buf.dim();
            draw_panel(buf, score, game.best());
            let mut lines = vec![
                TextLine::new(mid.saturating_sub(6), "GAME OVER", RED),
                TextLine::new(mid + 6, "ENTER play again   M menu   Q quit", WHITE),
            ];
            if !game.player_name().trim().is_empty() {
                let saved = format!("saved as {}", game.player_name().trim());
                lines.push(TextLine::new(mid + 7, saved, WHITE));
            }
            lines
        }
        Mode::Menu(screen) => {
            let ground = game.world().physics.ground_height;
            draw_backdrop(buf, world_h, ground, idle_scroll);
            menu_text(game, screen, mid)
        }
    }
}

fn menu_text(game: &Game, screen: MenuScreen, mid: u16) -> Vec<TextLine> {
    let top = mid.saturating_sub(6);
    let mut lines = Vec::new();
    match screen {
        MenuScreen::Main => {
            lines.push(TextLine::new(top, "F L A P P Y   B O A R D", WHITE));
            for (i, item) in MAIN_MENU.iter().enumerate() {
                let text = if i == game.menu_cursor() {
                    format!("> {} <", item.label())
                } else {
                    item.label().to_string()
                };
                let color = if i == game.menu_cursor() { GOLD } else { WHITE };
                lines.push(TextLine::new(top + 3 + i as u16 * 2, text, color));
            }
            lines.push(TextLine::new(top + 12, "SPACE / CLICK TO FLY", WHITE));
        }
        MenuScreen::EnterName => {
            lines.push(TextLine::new(top, "ENTER NAME", WHITE));
            lines.push(TextLine::new(top + 3, format!("[ {:<10} ]", game.player_name()), GOLD));
            lines.push(TextLine::new(top + 6, "ENTER start   ESC back", WHITE));
            if game.player_name().trim().is_empty() {
                lines.push(TextLine::new(top + 8, "no name, no leaderboard entry", WHITE));
            }
        }
        MenuScreen::Leaderboard => {
            lines.push(TextLine::new(top, "LEADERBOARD", WHITE));
            let standings = game.standings();
            if standings.is_empty() {
                lines.push(TextLine::new(top + 3, "No scores yet!", WHITE));
            }
            for (i, entry) in standings.iter().take(10).enumerate() {
                let text = format!("{:>2}. {:<10} {:>6}", i + 1, entry.name, entry.score);
                let color = if i == 0 { GOLD } else { WHITE };
                lines.push(TextLine::new(top + 2 + i as u16, text, color));
            }
            lines.push(TextLine::new(top + 13, "ESC back", WHITE));
        }
        MenuScreen::Credits => {
            let credits = [
                "CREDITS",
                "",
                "a flappy bird for your terminal",
                "pixels: half-block renderer",
                "sound: synthesized with fundsp",
                "",
                "made for fun and entertainment only",
            ];
            for (i, text) in credits.iter().enumerate() {
                lines.push(TextLine::new(top + i as u16, *text, WHITE));
            }
            lines.push(TextLine::new(top + 9, "ESC back", WHITE));
        }
    }
    lines
}

pub fn draw_world(world: &World, world_height: f64, buf: &mut PixelBuf) {
    let view = View::new(buf, world_height, world.physics.ground_height);
    let scroll = world.scroll() * view.k;
    draw_sky(buf, &view);
    draw_hills(buf, &view, scroll);
    draw_pipes(buf, &view, world);
    draw_ground(buf, &view, scroll);
    draw_bird(buf, &view, world);
    draw_number(buf, view.pw / 2, 4, world.score(), WHITE);
}

fn draw_backdrop(buf: &mut PixelBuf, world_height: f64, ground_height: f64, scroll: f64) {
    let view = View::new(buf, world_height, ground_height);
    draw_sky(buf, &view);
    draw_hills(buf, &view, scroll);
    draw_ground(buf, &view, scroll);
}

fn draw_sky(buf: &mut PixelBuf, view: &View) {
    let sky_h = view.sky_h.max(1);
    for y in 0..view.sky_h {
        let t = (y * 256 / sky_h) as u16;
        let c = Rgb::lerp(SKY_TOP, SKY_BOT, t);
        for x in 0..view.pw {
            buf.set(x, y, c);
        }
    }
}

fn draw_hills(buf: &mut PixelBuf, view: &View, scroll: f64) {
    let base = view.sky_h;
    // Far hills
    for x in 0..view.pw {
        let fx = (x as f64 + scroll * 0.2) * 0.04;
        let h = (fx.sin() * 6.0 + (fx * 1.7).sin() * 3.0) * view.scale;
        let top = base - h as i32 - (4.0 * view.scale) as i32;
        for y in top..base {
            buf.set(x, y, HILL_FAR);
        }
    }
    // Near hills
    for x in 0..view.pw {
        let fx = (x as f64 + scroll * 0.4) * 0.06;
        let h = (fx.sin() * 4.0 + (fx * 2.3).sin() * 2.0) * view.scale;
        let top = base - h as i32 - (2.0 * view.scale) as i32;
        for y in top..base {
            buf.set(x, y, HILL_NEAR);
        }
    }
}

fn draw_ground(buf: &mut PixelBuf, view: &View, scroll: f64) {
    let gy = view.sky_h;
    let ph = buf.h as i32;
    for x in 0..view.pw {
        let alt = ((x as f64 + scroll) as i32 / 3) % 2 == 0;
        buf.set(x, gy, if alt { GRASS } else { GRASS_LIGHT });
        buf.set(x, gy + 1, GRASS);
    }
    for y in (gy + 2)..ph {
        for x in 0..view.pw {
            let stripe = ((x as f64 + scroll * 0.8) as i32 + (y - gy) * 2).rem_euclid(12) < 6;
            buf.set(x, y, if stripe { DIRT } else { DIRT_DARK });
        }
    }
}

fn draw_pipes(buf: &mut PixelBuf, view: &View, world: &World) {
    let p = &world.physics;
    let cap_extra = (2.0 * view.scale).max(1.0) as i32;
    let cap_h = (3.0 * view.scale).max(2.0) as i32;
    let pw = view.px(p.pipe_width).max(2);

    for pipe in &world.obstacles {
        let px = view.px(pipe.x);
        let gap_top = view.px(pipe.gap_top(p));
        let gap_bot = view.px(pipe.gap_bottom(p));

        // Top pipe body
        for x in 0..pw {
            let c = pipe_shade(x, pw);
            for y in 0..gap_top - cap_h {
                buf.set(px + x, y, c);
            }
        }
        // Top pipe cap
        for x in -cap_extra..(pw + cap_extra) {
            let c = pipe_shade(x + cap_extra, pw + cap_extra * 2);
            for y in (gap_top - cap_h)..gap_top {
                buf.set(px + x, y, c);
            }
            buf.set(px + x, gap_top - cap_h, CAP_DARK);
            buf.set(px + x, gap_top - 1, CAP_DARK);
        }

        // Bottom pipe cap
        for x in -cap_extra..(pw + cap_extra) {
            let c = pipe_shade(x + cap_extra, pw + cap_extra * 2);
            for y in gap_bot..(gap_bot + cap_h) {
                buf.set(px + x, y, c);
            }
            buf.set(px + x, gap_bot, CAP_DARK);
            buf.set(px + x, gap_bot + cap_h - 1, CAP_DARK);
        }
        // Bottom pipe body
        for x in 0..pw {
            let c = pipe_shade(x, pw);
            for y in (gap_bot + cap_h)..view.sky_h {
                buf.set(px + x, y, c);
            }
        }
    }
}

fn draw_bird(buf: &mut PixelBuf, view: &View, world: &World) {
    let actor = &world.actor;
    let cx = view.px(actor.x);
    let cy = view.px(actor.y);
    // Sprite proportions: the body is about six units of `s` wide.
    let s = world.physics.bird_size * view.k / 6.0;

    let tilt = (actor.velocity / 7.0).clamp(-1.0, 1.0) as i32;

    // Body core
    let bw = (3.0 * s).max(2.0) as i32;
    let bh = (2.0 * s).max(2.0) as i32;
    buf.fill_rect(cx - bw, cy - bh, bw * 2 + 1, bh * 2, BIRD_Y);

    // Highlight
    buf.fill_rect(cx - bw + 1, cy - bh, bw * 2 - 2, 1.max((s * 0.8) as i32), BIRD_HI);

    // Wing beats with distance travelled
    let wing_y_off = if (world.scroll() / 24.0) as i64 % 2 == 0 { -1 } else { 1 };
    let wing_h = (1.5 * s).max(1.0) as i32;
    let wing_w = (2.0 * s).max(1.0) as i32;
    buf.fill_rect(cx - bw + 1, cy + wing_y_off + tilt, wing_w, wing_h, BIRD_WING);

    // Eye
    let ex = cx + bw - (1.5 * s) as i32;
    let ey = cy - bh + (1.0 * s).max(1.0) as i32;
    let eye_r = (0.8 * s).max(1.0) as i32;
    buf.fill_rect(ex, ey, eye_r + 1, eye_r + 1, BIRD_EYE);
    buf.set(ex + eye_r, ey + eye_r, BIRD_PUPIL);

    // Beak
    let beak_x = cx + bw;
    let beak_y = cy - (0.5 * s) as i32 + tilt;
    let beak_w = (2.5 * s).max(2.0) as i32;
    let beak_h = (1.5 * s).max(1.0) as i32;
    buf.fill_rect(beak_x, beak_y, beak_w, beak_h / 2 + 1, BIRD_BEAK_HI);
    buf.fill_rect(beak_x, beak_y + beak_h / 2 + 1, beak_w, beak_h / 2, BIRD_BEAK);

    // Tail
    let tail_w = (1.5 * s).max(1.0) as i32;
    buf.fill_rect(cx - bw - tail_w, cy - 1 + tilt, tail_w, 2, BIRD_WING);
}

fn draw_panel(buf: &mut PixelBuf, score: u32, best: u32) {
    let scale = buf.h as f64 / 48.0;
    let cx = buf.w as i32 / 2;
    let cy = buf.h as i32 / 2;
    let panel_w = (40.0 * scale).max(30.0) as i32;
    let panel_h = (20.0 * scale).max(16.0) as i32;

    let px = cx - panel_w / 2;
    let py = cy - panel_h / 2;
    buf.fill_rect(px - 1, py - 1, panel_w + 2, panel_h + 2, PANEL_EDGE);
    buf.fill_rect(px, py, panel_w, panel_h, PANEL);
    buf.fill_rect(px + 1, py + 1, panel_w - 2, panel_h - 2, PANEL_IN);

    draw_number(buf, cx, py + 3, score, WHITE);
    draw_number(buf, cx, py + 10, best, GOLD);
}

fn pipe_shade(x: i32, total_w: i32) -> Rgb {
    if total_w <= 1 {
        return PIPE_M;
    }
    let t = (x as f64 / (total_w - 1) as f64 * 256.0) as u16;
    if t < 64 {
        Rgb::lerp(PIPE_L, PIPE_M, (t * 4).min(256))
    } else if t < 100 {
        Rgb::lerp(PIPE_M, PIPE_HI, ((t - 64) * 7).min(256))
    } else if t < 160 {
        Rgb::lerp(PIPE_HI, PIPE_R, ((t - 100) * 4).min(256))
    } else {
        Rgb::lerp(PIPE_R, PIPE_L, ((t - 160) * 3).min(256))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Obstacle, Physics};

    #[test]
    fn drawing_leaves_the_world_untouched() {
        let mut world = World::seeded(Physics::default(), 600.0, 1);
        world.obstacles.push(Obstacle::new(200.0, 300.0));
        world.tick(500.0, 600.0);
        let actor = world.actor;
        let pipes = world.obstacles.clone();

        let mut buf = PixelBuf::new(50, 30);
        draw_world(&world, 600.0, &mut buf);
        assert_eq!(world.actor, actor);
        assert_eq!(world.obstacles, pipes);
    }

    #[test]
    fn pipes_and_bird_land_where_the_world_says() {
        let mut world = World::seeded(Physics::default(), 600.0, 1);
        world.obstacles.push(Obstacle::new(300.0, 300.0));
        let mut buf = PixelBuf::new(50, 30); // 60 pixel rows, 0.1 px per unit
        draw_world(&world, 600.0, &mut buf);

        // Pipe body above the gap, a few pixels below the top edge.
        assert_ne!(buf.get(32, 10), buf.get(20, 10));
        // The bird body is yellow at its center.
        assert_eq!(buf.get(10, 30), BIRD_Y);
    }

    #[test]
    fn text_lines_render_without_panicking_off_screen() {
        let buf = PixelBuf::new(10, 4);
        let mut out = Vec::new();
        let lines = [
            TextLine::new(1, "a much longer line than the buffer", WHITE),
            TextLine::new(40, "gone", WHITE),
        ];
        buf.render(&mut out, &lines).unwrap();
        assert!(!out.is_empty());
    }
}
