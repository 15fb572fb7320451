//! Fixed-timestep simulation: the bird, the pipes and everything that can kill it.
//!
//! All positions are in world units. The world is `height` units tall (600 by
//! default) and as wide as the viewport aspect ratio allows; the renderer scales it
//! down to pixels.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

/// Length of one physics tick in milliseconds.
pub const TICK_MS: f64 = 1000.0 / 60.0;

/// Largest real-time gap a single displayed frame may feed into the accumulator.
pub const MAX_FRAME_MS: f64 = 50.0;

// ── Tuning ──────────────────────────────────────────────────────────────────

/// Physics constants. Fixed for the length of a run.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Physics {
    pub gravity: f64,
    pub jump_velocity: f64,
    pub pipe_speed: f64,
    pub spawn_interval_ms: f64,
    pub bird_size: f64,
    pub hitbox_inset: f64,
    pub bird_x: f64,
    pub pipe_width: f64,
    pub gap_size: f64,
    pub gap_margin: f64,
    pub ground_height: f64,
    pub ambient_min_ms: f64,
    pub ambient_jitter_ms: f64,
}

impl Default for Physics {
    fn default() -> Self {
        Physics {
            gravity: 0.38,
            jump_velocity: -7.0,
            pipe_speed: 3.0,
            spawn_interval_ms: 1700.0,
            bird_size: 40.0,
            hitbox_inset: 6.0,
            bird_x: 100.0,
            pipe_width: 60.0,
            gap_size: 155.0,
            gap_margin: 60.0,
            ground_height: 80.0,
            ambient_min_ms: 10_000.0,
            ambient_jitter_ms: 8_000.0,
        }
    }
}

// ── Geometry ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Rect {
    /// Strict overlap: rects that merely touch do not collide.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.left < other.right
            && self.right > other.left
            && self.top < other.bottom
            && self.bottom > other.top
    }
}

// ── Entities ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Actor {
    pub x: f64,
    pub y: f64,
    pub velocity: f64,
}

impl Actor {
    /// Visual sprite bounds, centered on the actor position.
    pub fn sprite(&self, physics: &Physics) -> Rect {
        let half = physics.bird_size / 2.0;
        Rect {
            left: self.x - half,
            top: self.y - half,
            right: self.x + half,
            bottom: self.y + half,
        }
    }

    pub fn hitbox(&self, physics: &Physics) -> Rect {
        let s = self.sprite(physics);
        let inset = physics.hitbox_inset;
        Rect {
            left: s.left + inset,
            top: s.top + inset,
            right: s.right - inset,
            bottom: s.bottom - inset,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obstacle {
    pub x: f64,
    pub gap_center: f64,
    pub scored: bool,
}

impl Obstacle {
    pub fn new(x: f64, gap_center: f64) -> Self {
        Obstacle {
            x,
            gap_center,
            scored: false,
        }
    }

    pub fn gap_top(&self, physics: &Physics) -> f64 {
        self.gap_center - physics.gap_size / 2.0
    }

    pub fn gap_bottom(&self, physics: &Physics) -> f64 {
        self.gap_center + physics.gap_size / 2.0
    }

    /// The solid parts above and below the gap. Both run off to infinity so that
    /// nothing can slip over or under a pipe.
    pub fn solids(&self, physics: &Physics) -> [Rect; 2] {
        let right = self.x + physics.pipe_width;
        [
            Rect {
                left: self.x,
                top: f64::NEG_INFINITY,
                right,
                bottom: self.gap_top(physics),
            },
            Rect {
                left: self.x,
                top: self.gap_bottom(physics),
                right,
                bottom: f64::INFINITY,
            },
        ]
    }
}

// ── Tick results ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collision {
    Pipe,
    Ground,
    Ceiling,
}

/// What happened during one tick, for the state machine and its collaborators.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub scored: u32,
    pub ambient: bool,
    pub collision: Option<Collision>,
}

// ── World ───────────────────────────────────────────────────────────────────

pub struct World {
    pub physics: Physics,
    pub actor: Actor,
    pub obstacles: Vec<Obstacle>,
    score: u32,
    spawn_timer: f64,
    ambient_timer: f64,
    ambient_due: f64,
    scroll: f64,
    crashed: Option<Collision>,
    rng: StdRng,
}

impl World {
    pub fn new(physics: Physics, height: f64) -> Self {
        Self::with_rng(physics, height, StdRng::from_entropy())
    }

    /// Deterministic world for replays and tests.
    pub fn seeded(physics: Physics, height: f64, seed: u64) -> Self {
        Self::with_rng(physics, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(physics: Physics, height: f64, rng: StdRng) -> Self {
        let mut w = World {
            physics,
            actor: Actor {
                x: physics.bird_x,
                y: height / 2.0,
                velocity: 0.0,
            },
            obstacles: Vec::new(),
            score: 0,
            spawn_timer: 0.0,
            ambient_timer: 0.0,
            ambient_due: 0.0,
            scroll: 0.0,
            crashed: None,
            rng,
        };
        w.ambient_due = w.next_ambient_due();
        w
    }

    /// Puts everything back to the start-of-run state. The rng keeps its stream.
    pub fn reset(&mut self, height: f64) {
        self.actor = Actor {
            x: self.physics.bird_x,
            y: height / 2.0,
            velocity: 0.0,
        };
        self.obstacles.clear();
        self.score = 0;
        self.spawn_timer = 0.0;
        self.ambient_timer = 0.0;
        self.ambient_due = self.next_ambient_due();
        self.scroll = 0.0;
        self.crashed = None;
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn scroll(&self) -> f64 {
        self.scroll
    }

    pub fn crashed(&self) -> Option<Collision> {
        self.crashed
    }

    pub fn flap(&mut self) {
        if self.crashed.is_none() {
            self.actor.velocity = self.physics.jump_velocity;
        }
    }

    fn next_ambient_due(&mut self) -> f64 {
        // An unbounded range would panic in `gen_range`; treat it as no jitter.
        let jitter = self.physics.ambient_jitter_ms;
        let jitter = if jitter.is_finite() { jitter.max(0.0) } else { 0.0 };
        self.physics.ambient_min_ms + self.rng.gen_range(0.0..=jitter)
    }

    fn spawn_gap_center(&mut self, height: f64) -> f64 {
        let p = &self.physics;
        let min = p.gap_size / 2.0 + p.gap_margin;
        let max = height - p.ground_height - p.gap_size / 2.0 - p.gap_margin;
        if max > min && (max - min).is_finite() {
            self.rng.gen_range(min..max)
        } else {
            (min + max) / 2.0
        }
    }

    /// Advances the world by exactly one tick. Once a terminal collision has been
    /// reported the world is frozen and further calls return an empty report.
    pub fn tick(&mut self, width: f64, height: f64) -> TickReport {
        let mut report = TickReport::default();
        if self.crashed.is_some() {
            return report;
        }
        let p = self.physics;

        self.actor.velocity += p.gravity;
        self.actor.y += self.actor.velocity;
        self.scroll += p.pipe_speed;

        self.ambient_timer += TICK_MS;
        if self.ambient_timer > self.ambient_due {
            self.ambient_timer = 0.0;
            self.ambient_due = self.next_ambient_due();
            report.ambient = true;
        }

        self.spawn_timer += TICK_MS;
        if self.spawn_timer > p.spawn_interval_ms {
            self.spawn_timer = 0.0;
            let gap_center = self.spawn_gap_center(height);
            self.obstacles.push(Obstacle::new(width, gap_center));
        }

        let hitbox = self.actor.hitbox(&p);
        for pipe in &mut self.obstacles {
            pipe.x -= p.pipe_speed;

            if !pipe.scored && pipe.x + p.pipe_width < self.actor.x {
                pipe.scored = true;
                self.score += 1;
                report.scored += 1;
            }

            if pipe.solids(&p).iter().any(|r| r.overlaps(&hitbox)) {
                self.crashed = Some(Collision::Pipe);
                report.collision = self.crashed;
                return report;
            }
        }

        self.obstacles.retain(|o| o.x > -p.pipe_width);

        let sprite = self.actor.sprite(&p);
        let collision = if sprite.bottom > height - p.ground_height {
            Some(Collision::Ground)
        } else if sprite.top < 0.0 {
            Some(Collision::Ceiling)
        } else {
            None
        };
        if collision.is_some() {
            self.crashed = collision;
            report.collision = collision;
        }
        report
    }
}

// ── Frame clock ─────────────────────────────────────────────────────────────

/// Accumulator that turns displayed-frame durations into whole physics ticks.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameClock {
    accumulator: f64,
}

impl FrameClock {
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// Feeds `elapsed_ms` of real time and returns how many ticks are now due.
    pub fn advance(&mut self, elapsed_ms: f64) -> u32 {
        self.accumulator += elapsed_ms.clamp(0.0, MAX_FRAME_MS);
        let mut ticks = 0;
        while self.accumulator >= TICK_MS {
            self.accumulator -= TICK_MS;
            ticks += 1;
        }
        ticks
    }
}
