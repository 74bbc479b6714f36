use crate::geometry::Vec3;
use crate::model::{
    Building, GameState, Obstacle, ObstacleKind, Phase, PowerUp, PowerUpKind, Tuning, CAMERA_Y,
    CAMERA_Z,
};
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, Write};

pub(crate) const HUD_ROWS: u16 = 2;
pub(crate) const MIN_COLS: u16 = 40;
pub(crate) const MIN_ROWS: u16 = 12;

// terminal cells are roughly twice as tall as they are wide
const ASPECT: f32 = 2.0;
const ROAD_PLANE_Y: f32 = -0.5;
const NEAR_CLIP: f32 = 1.0;
const FOG_NEAR: f32 = 1.0;
const FOG_FAR: f32 = 200.0;
const DASH_PERIOD: f32 = 8.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            *c = Cell {
                bg,
                ..Cell::default()
            };
        }
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        queue!(self.out, Clear(ClearType::All))?;
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Palette
------------------------------ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Rgb {
    r: u8,
    g: u8,
    b: u8,
}

impl Rgb {
    const fn hex(v: u32) -> Self {
        Self {
            r: ((v >> 16) & 0xff) as u8,
            g: ((v >> 8) & 0xff) as u8,
            b: (v & 0xff) as u8,
        }
    }
    fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
    fn scale(self, s: f32) -> Rgb {
        let f = |c: u8| (c as f32 * s).round().clamp(0.0, 255.0) as u8;
        Rgb {
            r: f(self.r),
            g: f(self.g),
            b: f(self.b),
        }
    }
    fn to_color(self) -> Color {
        Color::Rgb {
            r: self.r,
            g: self.g,
            b: self.b,
        }
    }
}

const SKY_TOP: Rgb = Rgb::hex(0x0077ff);
const SKY_BOTTOM: Rgb = Rgb::hex(0xffffff);
const FOG: Rgb = Rgb::hex(0x87ceeb);
const ROAD: Rgb = Rgb::hex(0x808080);
const KERB: Rgb = Rgb::hex(0xd8d8d8);
const VERGE: Rgb = Rgb::hex(0x3a3a3a);
const LANE_MARK: Rgb = Rgb::hex(0xf4f4f4);
const HUD_FG: Rgb = Rgb::hex(0xa0ffd2);
const HUD_BG: Rgb = Rgb::hex(0x05070a);
const ACCENT: Rgb = Rgb::hex(0xffdc8c);

const BUILDING_PALETTE: [Rgb; 5] = [
    Rgb::hex(0xffc300),
    Rgb::hex(0xff5733),
    Rgb::hex(0xc70039),
    Rgb::hex(0x900c3f),
    Rgb::hex(0x581845),
];
const WINDOW: Rgb = Rgb::hex(0xfff2b0);

const DANFO: Rgb = Rgb::hex(0xffc300);
const TRUCK: Rgb = Rgb::hex(0xaaaaaa);
const WHEEL: Rgb = Rgb::hex(0x101010);

const SKIN: Rgb = Rgb::hex(0xe0ac69);
const SHIRT: Rgb = Rgb::hex(0xff0000);
const TROUSERS: Rgb = Rgb::hex(0x0000ff);

fn powerup_look(kind: PowerUpKind) -> (char, Rgb) {
    match kind {
        PowerUpKind::Shawarma => ('@', Rgb::hex(0xffd700)),
        PowerUpKind::SachetWater => ('▣', Rgb::hex(0xadd8e6)),
        PowerUpKind::EnergyDrink => ('E', Rgb::hex(0x00ff00)),
        PowerUpKind::SpeedBoost2x => ('2', Rgb::hex(0xffa500)),
        PowerUpKind::SpeedBoost5x => ('5', Rgb::hex(0x8a2be2)),
    }
}

fn fogged(c: Rgb, depth: f32) -> Rgb {
    c.lerp(FOG, (depth - FOG_NEAR) / (FOG_FAR - FOG_NEAR))
}

/* -----------------------------
   Camera
------------------------------ */

/// Pinhole camera behind the runner, mapped onto the playfield rows.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Camera {
    cx: f32,
    horizon: f32,
    focal: f32,
    top: f32,
    bottom: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ScreenRect {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl Camera {
    pub(crate) fn for_size(cols: u16, rows: u16) -> Self {
        let top = HUD_ROWS as f32;
        let h = (rows as f32 - top).max(1.0);
        Self {
            cx: cols as f32 / 2.0,
            horizon: top + h * 0.35,
            focal: h * 0.9,
            top,
            bottom: rows as f32,
        }
    }

    pub(crate) fn project(&self, x: f32, y: f32, z: f32) -> Option<(f32, f32)> {
        let d = CAMERA_Z - z;
        if d < NEAR_CLIP {
            return None;
        }
        Some((
            self.cx + x * self.focal * ASPECT / d,
            self.horizon + (CAMERA_Y - y) * self.focal / d,
        ))
    }

    /// Distance to the road plane seen through screen row `sy`.
    fn ground_depth(&self, sy: f32) -> Option<f32> {
        let dy = sy - self.horizon;
        if dy <= 0.0 {
            return None;
        }
        Some((CAMERA_Y - ROAD_PLANE_Y) * self.focal / dy)
    }

    fn world_x(&self, sx: f32, depth: f32) -> f32 {
        (sx - self.cx) * depth / (self.focal * ASPECT)
    }

    /// Screen rectangle of the camera-facing side of a box.
    fn face(&self, min: Vec3, max: Vec3) -> Option<ScreenRect> {
        let (x0, y0) = self.project(min.x, max.y, max.z)?;
        let (x1, y1) = self.project(max.x, min.y, max.z)?;
        let x0i = x0.floor() as i32;
        let y0i = y0.floor() as i32;
        Some(ScreenRect {
            x0: x0i,
            y0: y0i,
            x1: (x1.ceil() as i32).max(x0i + 1),
            y1: (y1.ceil() as i32).max(y0i + 1),
        })
    }
}

/* -----------------------------
   Frame composition
------------------------------ */

pub(crate) struct Hud {
    pub(crate) high_score: u64,
    pub(crate) new_record: bool,
    pub(crate) color: bool,
}

struct Painter<'a> {
    buf: &'a mut CellBuffer,
    color: bool,
    top: i32,
}

impl Painter<'_> {
    fn put(&mut self, x: i32, y: i32, ch: char, fg: Rgb, bg: Rgb) {
        if x < 0 || y < self.top || x >= self.buf.w as i32 || y >= self.buf.h as i32 {
            return;
        }
        let cell = if self.color {
            Cell {
                ch,
                fg: fg.to_color(),
                bg: bg.to_color(),
            }
        } else {
            Cell {
                ch,
                ..Cell::default()
            }
        };
        self.buf.set(x as u16, y as u16, cell);
    }

    fn fill(&mut self, r: ScreenRect, mut paint: impl FnMut(i32, i32) -> (char, Rgb, Rgb)) {
        let y0 = r.y0.max(self.top);
        let y1 = r.y1.min(self.buf.h as i32);
        let x0 = r.x0.max(0);
        let x1 = r.x1.min(self.buf.w as i32);
        for y in y0..y1 {
            for x in x0..x1 {
                let (ch, fg, bg) = paint(x - r.x0, y - r.y0);
                self.put(x, y, ch, fg, bg);
            }
        }
    }
}

pub(crate) fn draw_frame(buf: &mut CellBuffer, st: &GameState, hud: &Hud) {
    buf.clear(Color::Black);
    if buf.w < MIN_COLS || buf.h < MIN_ROWS {
        draw_text(
            buf,
            0,
            0,
            "Terminal too small. Try at least 40x12.",
            Color::White,
            Color::Black,
        );
        return;
    }

    let cam = Camera::for_size(buf.w, buf.h);
    {
        let mut p = Painter {
            buf: &mut *buf,
            color: hud.color,
            top: HUD_ROWS as i32,
        };
        draw_backdrop(&mut p, &cam, st);
        draw_world(&mut p, &cam, st);
    }
    draw_hud(buf, st, hud);

    match st.phase {
        Phase::Title => draw_center_box(
            buf,
            "DANFO DASH",
            "Run the expressway. Dodge the traffic.\n\n\
             A/D or Left/Right   switch lanes\n\
             W/Up/Space          jump (twice quickly: high jump)\n\
             S/Down              slide under trucks\n\
             P/Esc pause   C colour   Q quit\n\n\
             Shawarma: shield     Sachet water: invincible\n\
             Energy drink: 2x score   2/5 cans: speed boost\n\n\
             Press Enter to start",
        ),
        Phase::Paused => draw_center_box(buf, "Paused", "P or Esc to resume, Q to quit."),
        Phase::GameOver => {
            let record = if hud.new_record {
                "NEW HIGH SCORE!"
            } else {
                ""
            };
            draw_center_box(
                buf,
                "Game over",
                &format!(
                    "Score: {}\nHigh score: {}\n{}\n\nEnter or R to run again, Q to quit.",
                    st.final_score, hud.high_score, record
                ),
            );
        }
        Phase::Running | Phase::Falling => {}
    }
}

fn draw_backdrop(p: &mut Painter, cam: &Camera, st: &GameState) {
    let t = &st.tuning;
    let cols = p.buf.w as i32;
    for sy in cam.top as i32..cam.bottom as i32 {
        let row = sy as f32 + 0.5;
        match cam.ground_depth(row) {
            None => {
                let k = ((row - cam.top) / (cam.horizon - cam.top).max(1.0)).clamp(0.0, 1.0);
                let c = SKY_TOP.lerp(SKY_BOTTOM, k * k);
                for sx in 0..cols {
                    p.put(sx, sy, ' ', c, c);
                }
            }
            Some(d) => {
                let z = CAMERA_Z - d;
                let cell_w = d / (cam.focal * ASPECT);
                let dash_on = (z - st.road_offsets[0]).rem_euclid(DASH_PERIOD) < DASH_PERIOD / 2.0;
                for sx in 0..cols {
                    let x = cam.world_x(sx as f32 + 0.5, d);
                    let (ch, fg, bg) = ground_cell(t, x, cell_w, dash_on);
                    p.put(sx, sy, ch, fogged(fg, d), fogged(bg, d));
                }
            }
        }
    }
}

fn ground_cell(t: &Tuning, x: f32, cell_w: f32, dash_on: bool) -> (char, Rgb, Rgb) {
    let ax = x.abs();
    if ax > t.road_half_width {
        return (' ', VERGE, VERGE);
    }
    if ax > t.road_half_width - cell_w.max(0.5) {
        return ('█', KERB, ROAD);
    }
    let mark_w = (cell_w * 0.5).max(0.12);
    let half_lane = t.lane_width / 2.0;
    if dash_on && ((x - half_lane).abs() < mark_w || (x + half_lane).abs() < mark_w) {
        return ('┃', LANE_MARK, ROAD);
    }
    (' ', ROAD, ROAD)
}

enum Sprite<'a> {
    Building(&'a Building),
    Obstacle(&'a Obstacle),
    PowerUp(&'a PowerUp),
    Runner,
}

fn draw_world(p: &mut Painter, cam: &Camera, st: &GameState) {
    let t = &st.tuning;
    let mut sprites: Vec<(f32, Sprite)> = Vec::new();
    for b in &st.buildings {
        sprites.push((b.z + t.building_depth / 2.0, Sprite::Building(b)));
    }
    for o in st.active_obstacles() {
        sprites.push((o.pos.z + o.kind.local_bounds().1.z, Sprite::Obstacle(o)));
    }
    for pu in st.active_powerups() {
        sprites.push((pu.pos.z + pu.kind.local_bounds().1.z, Sprite::PowerUp(pu)));
    }
    sprites.push((st.player_bounds().max.z, Sprite::Runner));

    // painter's order: far to near
    sprites.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (front_z, sprite) in sprites {
        let depth = CAMERA_Z - front_z;
        match sprite {
            Sprite::Building(b) => draw_building(p, cam, t, b, depth),
            Sprite::Obstacle(o) => draw_obstacle(p, cam, o, depth),
            Sprite::PowerUp(pu) => draw_powerup(p, cam, pu, depth),
            Sprite::Runner => draw_runner(p, cam, st),
        }
    }
}

fn draw_building(p: &mut Painter, cam: &Camera, t: &Tuning, b: &Building, depth: f32) {
    let cx = t.building_x(b.side);
    let hw = t.building_width / 2.0;
    let hd = t.building_depth / 2.0;
    let min = Vec3::new(cx - hw, ROAD_PLANE_Y, b.z - hd);
    let max = Vec3::new(cx + hw, b.height as f32 + ROAD_PLANE_Y, b.z + hd);
    let Some(r) = cam.face(min, max) else {
        return;
    };
    let base = fogged(BUILDING_PALETTE[b.color % BUILDING_PALETTE.len()], depth);
    let lit = fogged(WINDOW, depth);
    let wall = base.scale(0.85);
    p.fill(r, |x, y| {
        if x % 3 == 1 && y % 2 == 1 {
            ('▪', lit, base)
        } else {
            ('▒', wall, base)
        }
    });
}

fn draw_obstacle(p: &mut Painter, cam: &Camera, o: &Obstacle, depth: f32) {
    let (lo, hi) = o.kind.local_bounds();
    let Some(r) = cam.face(o.pos + lo, o.pos + hi) else {
        return;
    };
    let (body, glyph) = match o.kind {
        ObstacleKind::Danfo => (DANFO, '█'),
        ObstacleKind::Truck => (TRUCK, '▓'),
    };
    let body = fogged(body, depth);
    let wheel = fogged(WHEEL, depth);
    let glass = fogged(SKY_BOTTOM, depth).scale(0.7);
    let h = r.y1 - r.y0;
    let w = r.x1 - r.x0;
    p.fill(r, |x, y| {
        if h >= 3 && y == h - 1 {
            if x == 0 || x == w - 1 {
                ('●', wheel, body)
            } else {
                ('▀', body, wheel)
            }
        } else if h >= 4 && y == 1 && x > 0 && x < w - 1 {
            ('▄', glass, body)
        } else {
            (glyph, body, body)
        }
    });
}

fn draw_powerup(p: &mut Painter, cam: &Camera, pu: &PowerUp, depth: f32) {
    let (lo, hi) = pu.kind.local_bounds();
    let Some(r) = cam.face(pu.pos + lo, pu.pos + hi) else {
        return;
    };
    let (ch, c) = powerup_look(pu.kind);
    let fg = fogged(c, depth);
    let bg = fg.scale(0.35);
    p.fill(r, |_, _| (ch, fg, bg));
}

fn draw_runner(p: &mut Painter, cam: &Camera, st: &GameState) {
    if st.effects.blink_hidden() {
        return;
    }
    let mut b = st.player_bounds();
    if st.player.tilt > 0.0 {
        let height = (b.max.y - b.min.y) * st.player.tilt.cos().max(0.2);
        b.max.y = b.min.y + height;
    }
    let Some(r) = cam.face(b.min, b.max) else {
        return;
    };
    let h = (r.y1 - r.y0).max(1);
    let w = r.x1 - r.x0;
    let head = (h / 4).max(1);
    let legs = h - (h * 2 / 5).max(1);
    let grounded = st.is_alive() && !st.player.jumping && !st.player.sliding;
    let stride = ((st.run_clock_ms / 150.0) as u32) % 2;
    p.fill(r, |x, y| {
        if y < head {
            ('█', SKIN, SKIN)
        } else if y < legs {
            ('█', SHIRT, SHIRT)
        } else if grounded && y == h - 1 {
            // alternate feet while running
            let lifted = if stride == 0 { x < w / 2 } else { x >= w / 2 };
            if lifted {
                ('▀', TROUSERS, ROAD)
            } else {
                ('█', TROUSERS, TROUSERS)
            }
        } else {
            ('█', TROUSERS, TROUSERS)
        }
    });
}

fn draw_hud(buf: &mut CellBuffer, st: &GameState, hud: &Hud) {
    let (fg, bg, accent) = if hud.color {
        (HUD_FG.to_color(), HUD_BG.to_color(), ACCENT.to_color())
    } else {
        (Color::White, Color::Black, Color::White)
    };
    let blank = " ".repeat(buf.w as usize);
    for y in 0..HUD_ROWS {
        draw_text(buf, 0, y, &blank, fg, bg);
    }

    let mut line = format!(
        " DANFO DASH | Score {:06} | High {:06} | Level {} | Shawarma {}",
        st.display_score(),
        hud.high_score.max(st.display_score()),
        st.level,
        st.shields
    );
    if st.effects.score_boost.active() {
        line.push_str(" | 2x SCORE");
    }
    if st.effects.speed_boost.active() {
        line.push_str(&format!(" | SPEED x{}", st.effects.speed_factor));
    }
    if st.effects.invincible.active() {
        line.push_str(" | INVINCIBLE");
    }
    draw_text(buf, 0, 0, &line, fg, bg);

    if st.effects.notice.active() {
        let text = st.effects.notice_text;
        let x = (buf.w as usize).saturating_sub(text.chars().count()) / 2;
        draw_text(buf, x as u16, 1, text, accent, bg);
    } else {
        let hint = match st.phase {
            Phase::Title => " Enter start   Q quit",
            Phase::Running => {
                " A/D lanes   W/Space jump (x2 high)   S slide   P pause   C colour   Q quit"
            }
            Phase::Paused => " PAUSED   P resume   Q quit",
            Phase::Falling => " Ouch!",
            Phase::GameOver => " Enter/R restart   Q quit",
        };
        draw_text(buf, 0, 1, hint, fg, bg);
    }
}

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    let mut xx = x;
    for ch in s.chars() {
        if xx >= buf.w {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
        xx += 1;
    }
}

pub(crate) fn draw_center_box(buf: &mut CellBuffer, title: &str, body: &str) {
    let w = buf.w;
    let h = buf.h;

    let bw = 60.min(w.saturating_sub(4));
    let bh = 18.min(h.saturating_sub(4));
    if bw < 4 || bh < 4 {
        return;
    }

    let x0 = (w - bw) / 2;
    let y0 = (h - bh) / 2;
    let (fg, bg) = (Color::White, Color::Black);
    let edge = |ch| Cell { ch, fg, bg };

    for y in y0..y0 + bh {
        for x in x0..x0 + bw {
            let top_or_bottom = y == y0 || y == y0 + bh - 1;
            let side = x == x0 || x == x0 + bw - 1;
            let ch = match (top_or_bottom, side) {
                (true, true) => match (x == x0, y == y0) {
                    (true, true) => '┌',
                    (false, true) => '┐',
                    (true, false) => '└',
                    (false, false) => '┘',
                },
                (true, false) => '─',
                (false, true) => '│',
                (false, false) => ' ',
            };
            buf.set(x, y, edge(ch));
        }
    }

    draw_text(buf, x0 + 2, y0 + 1, title, fg, bg);

    let mut yy = y0 + 3;
    for line in body.lines() {
        if yy >= y0 + bh - 1 {
            break;
        }
        let clipped: String = line.chars().take(bw.saturating_sub(4) as usize).collect();
        draw_text(buf, x0 + 2, yy, &clipped, fg, bg);
        yy += 1;
    }
}
