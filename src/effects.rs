use rand::Rng;
use ratatui::layout::{Position, Rect};
use ratatui::style::Color;

pub const CONFETTI_PARTICLES: usize = 100;
/// Lifetime of a confetti burst. Ticks arrive every 100ms, so 20 ticks ≈ 2s.
pub const CONFETTI_LIFETIME_TICKS: u8 = 20;
const CONFETTI_SPREAD_DEGREES: f32 = 70.0;
const CONFETTI_ORIGIN_Y: f32 = 0.6;
const CONFETTI_GRAVITY: f32 = 0.35;

pub const EMOJI_COUNT: usize = 20;
pub const EMOJI_GLYPHS: [&str; 4] = ["🎉", "🏆", "✨", "🎊"];
/// Per-emoji start delays are spread over this window (2s).
pub const EMOJI_DELAY_TICKS: u8 = 20;
/// The whole emoji overlay is removed after this long (5s), finished or not.
pub const EMOJI_OVERLAY_TICKS: u8 = 50;

const CONFETTI_COLORS: [Color; 7] = [
    Color::Cyan,
    Color::Magenta,
    Color::Red,
    Color::Green,
    Color::Yellow,
    Color::LightBlue,
    Color::LightMagenta,
];

const CONFETTI_GLYPHS: [char; 4] = ['▪', '•', '◆', '*'];

#[derive(Debug)]
struct Particle {
    x: f32,
    y: f32,
    dx: f32,
    dy: f32,
    glyph: char,
    color: Color,
}

/// One-shot confetti burst: particles fan out from a point and fall under
/// gravity until the burst's fixed lifetime runs out.
#[derive(Debug)]
pub struct ConfettiBurst {
    particles: Vec<Particle>,
    age: u8,
}

impl ConfettiBurst {
    fn new(area: Rect) -> Self {
        let mut rng = rand::thread_rng();
        let origin_x = area.x as f32 + area.width as f32 / 2.0;
        let origin_y = area.y as f32 + area.height as f32 * CONFETTI_ORIGIN_Y;
        let half_spread = CONFETTI_SPREAD_DEGREES.to_radians() / 2.0;

        let particles = (0..CONFETTI_PARTICLES)
            .map(|_| {
                // Angle measured from straight up; terminal rows grow downward,
                // and cells are taller than wide, so horizontal speed is doubled.
                let angle = rng.gen_range(-half_spread..half_spread);
                let speed = rng.gen_range(1.5..4.0);
                Particle {
                    x: origin_x,
                    y: origin_y,
                    dx: angle.sin() * speed * 2.0,
                    dy: -angle.cos() * speed,
                    glyph: CONFETTI_GLYPHS[rng.gen_range(0..CONFETTI_GLYPHS.len())],
                    color: CONFETTI_COLORS[rng.gen_range(0..CONFETTI_COLORS.len())],
                }
            })
            .collect();

        Self { particles, age: 0 }
    }

    fn tick(&mut self) {
        self.age = self.age.saturating_add(1);
        for p in &mut self.particles {
            p.x += p.dx;
            p.y += p.dy;
            p.dy += CONFETTI_GRAVITY;
        }
    }

    fn finished(&self) -> bool {
        self.age >= CONFETTI_LIFETIME_TICKS
    }

    /// Particle positions inside `clip`, ready to paint over the chat area.
    pub fn cells(&self, clip: Rect) -> Vec<(u16, u16, char, Color)> {
        self.particles
            .iter()
            .filter_map(|p| {
                if p.x < 0.0 || p.y < 0.0 {
                    return None;
                }
                let x = p.x.round() as u16;
                let y = p.y.round() as u16;
                clip.contains(Position::new(x, y))
                    .then_some((x, y, p.glyph, p.color))
            })
            .collect()
    }
}

#[derive(Debug)]
struct FloatingEmoji {
    column: u16,
    delay: u8,
    glyph: &'static str,
}

/// Floating-emoji overlay: glyphs appear at random columns after individual
/// start delays and drift up from the bottom edge, one row per tick. The
/// overlay self-removes on a hard deadline whether or not every glyph has
/// floated off.
#[derive(Debug)]
pub struct EmojiBurst {
    emojis: Vec<FloatingEmoji>,
    bottom: u16,
    age: u8,
}

impl EmojiBurst {
    fn new(area: Rect) -> Self {
        let mut rng = rand::thread_rng();
        let emojis = (0..EMOJI_COUNT)
            .map(|_| {
                let column = if area.width > 0 {
                    area.x + rng.gen_range(0..area.width)
                } else {
                    area.x
                };
                FloatingEmoji {
                    column,
                    delay: rng.gen_range(0..EMOJI_DELAY_TICKS),
                    glyph: EMOJI_GLYPHS[rng.gen_range(0..EMOJI_GLYPHS.len())],
                }
            })
            .collect();

        Self {
            emojis,
            bottom: area.bottom().saturating_sub(1),
            age: 0,
        }
    }

    fn tick(&mut self) {
        self.age = self.age.saturating_add(1);
    }

    fn finished(&self) -> bool {
        self.age >= EMOJI_OVERLAY_TICKS
    }

    pub fn cells(&self, clip: Rect) -> Vec<(u16, u16, &'static str)> {
        self.emojis
            .iter()
            .filter_map(|e| {
                let risen = self.age.checked_sub(e.delay)? as u16;
                let y = self.bottom.checked_sub(risen)?;
                clip.contains(Position::new(e.column, y))
                    .then_some((e.column, y, e.glyph))
            })
            .collect()
    }
}

/// Celebration capability. When disabled (config or OCTOCOACH_NO_EFFECTS)
/// the launch calls are silent no-ops and nothing else changes.
#[derive(Debug)]
pub struct Celebrations {
    enabled: bool,
    confetti: Option<ConfettiBurst>,
    emojis: Option<EmojiBurst>,
}

impl Celebrations {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            confetti: None,
            emojis: None,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn launch_confetti(&mut self, area: Rect) {
        if !self.enabled {
            return;
        }
        tracing::debug!("launching confetti burst");
        self.confetti = Some(ConfettiBurst::new(area));
    }

    pub fn launch_emojis(&mut self, area: Rect) {
        if !self.enabled {
            return;
        }
        tracing::debug!("launching floating emojis");
        self.emojis = Some(EmojiBurst::new(area));
    }

    pub fn tick(&mut self) {
        if let Some(burst) = &mut self.confetti {
            burst.tick();
            if burst.finished() {
                self.confetti = None;
            }
        }
        if let Some(burst) = &mut self.emojis {
            burst.tick();
            if burst.finished() {
                self.emojis = None;
            }
        }
    }

    pub fn confetti(&self) -> Option<&ConfettiBurst> {
        self.confetti.as_ref()
    }

    pub fn emojis(&self) -> Option<&EmojiBurst> {
        self.emojis.as_ref()
    }

    pub fn is_idle(&self) -> bool {
        self.confetti.is_none() && self.emojis.is_none()
    }
}
