//! Game state machine: menu, playing and game over.
//!
//! `Game` owns the world and the frame clock. It never touches audio, the network
//! or the terminal itself; instead it queues [`GameEvent`]s that the frame loop
//! drains and hands to whoever cares.

use crate::input::Action;
use crate::leaderboard::{MAX_NAME_LEN, ScoreRecord};
use crate::physics::{Collision, FrameClock, Physics, World};
use std::time::Duration;
use thiserror::Error;

/// World height in world units; the width follows the viewport aspect ratio.
pub const WORLD_HEIGHT: f64 = 600.0;

/// World width for a terminal of `cols` by `rows` cells (two pixels per row).
pub fn world_width(cols: u16, rows: u16) -> f64 {
    WORLD_HEIGHT * cols as f64 / (rows.max(1) as f64 * 2.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuScreen {
    Main,
    EnterName,
    Leaderboard,
    Credits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Menu(MenuScreen),
    Playing,
    GameOver { score: u32 },
}

impl Mode {
    fn label(&self) -> &'static str {
        match self {
            Mode::Menu(_) => "menu",
            Mode::Playing => "playing",
            Mode::GameOver { .. } => "game over",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    Play,
    Leaderboard,
    Credits,
    Quit,
}

pub const MAIN_MENU: [MenuItem; 4] = [
    MenuItem::Play,
    MenuItem::Leaderboard,
    MenuItem::Credits,
    MenuItem::Quit,
];

impl MenuItem {
    pub fn label(&self) -> &'static str {
        match self {
            MenuItem::Play => "PLAY",
            MenuItem::Leaderboard => "LEADERBOARD",
            MenuItem::Credits => "CREDITS",
            MenuItem::Quit => "QUIT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Started,
    Flapped,
    Scored { score: u32 },
    Ambient,
    /// The run is over. `cause` is `None` when it was ended from outside.
    Ended {
        score: u32,
        cause: Option<Collision>,
    },
    /// Exactly one per finished run, and only when the player gave a name.
    Submit { name: String, score: u32 },
    RefreshLeaderboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} while in {from}")]
pub struct TransitionError {
    pub action: &'static str,
    pub from: &'static str,
}

pub struct Game {
    mode: Mode,
    world: World,
    clock: FrameClock,
    width: f64,
    height: f64,
    player_name: String,
    menu_cursor: usize,
    best: u32,
    standings: Vec<ScoreRecord>,
    events: Vec<GameEvent>,
}

impl Game {
    pub fn new(physics: Physics, width: f64, player_name: &str) -> Self {
        Self::with_world(World::new(physics, WORLD_HEIGHT), width, player_name)
    }

    pub fn with_world(world: World, width: f64, player_name: &str) -> Self {
        let mut player_name: String = player_name.trim().chars().take(MAX_NAME_LEN).collect();
        player_name.retain(|c| !c.is_control());
        Game {
            mode: Mode::Menu(MenuScreen::Main),
            world,
            clock: FrameClock::default(),
            width,
            height: WORLD_HEIGHT,
            player_name,
            menu_cursor: 0,
            best: 0,
            standings: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn menu_cursor(&self) -> usize {
        self.menu_cursor
    }

    pub fn best(&self) -> u32 {
        self.best
    }

    pub fn standings(&self) -> &[ScoreRecord] {
        &self.standings
    }

    pub fn set_standings(&mut self, standings: Vec<ScoreRecord>) {
        self.standings = standings;
    }

    /// Typing mode: every printable key is text, not a command.
    pub fn is_typing(&self) -> bool {
        self.mode == Mode::Menu(MenuScreen::EnterName)
    }

    pub fn resize(&mut self, width: f64) {
        self.width = width;
    }

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Transitions ─────────────────────────────────────────────────────────

    /// Starts a fresh run from the menu or the game-over screen.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        if self.mode == Mode::Playing {
            return Err(TransitionError {
                action: "start",
                from: self.mode.label(),
            });
        }
        self.world.reset(self.height);
        self.clock.reset();
        self.mode = Mode::Playing;
        self.events.push(GameEvent::Started);
        log::info!("run started (player {:?})", self.player_name);
        Ok(())
    }

    /// Ends the current run. Only valid while playing.
    pub fn end(&mut self) -> Result<(), TransitionError> {
        self.finish(None)
    }

    fn finish(&mut self, cause: Option<Collision>) -> Result<(), TransitionError> {
        if self.mode != Mode::Playing {
            return Err(TransitionError {
                action: "end",
                from: self.mode.label(),
            });
        }
        let score = self.world.score();
        self.clock.reset();
        self.mode = Mode::GameOver { score };
        self.best = self.best.max(score);
        self.events.push(GameEvent::Ended { score, cause });

        let name = self.player_name.trim();
        if !name.is_empty() {
            self.events.push(GameEvent::Submit {
                name: name.to_string(),
                score,
            });
        }
        log::info!("run ended with {score} ({cause:?})");
        Ok(())
    }

    /// Back to the main menu. Not allowed mid-run.
    pub fn to_menu(&mut self) -> Result<(), TransitionError> {
        if self.mode == Mode::Playing {
            return Err(TransitionError {
                action: "return to menu",
                from: self.mode.label(),
            });
        }
        self.open(MenuScreen::Main);
        self.events.push(GameEvent::RefreshLeaderboard);
        Ok(())
    }

    fn open(&mut self, screen: MenuScreen) {
        self.mode = Mode::Menu(screen);
        if screen == MenuScreen::Leaderboard {
            self.events.push(GameEvent::RefreshLeaderboard);
        }
    }

    /// Flap if a run is in progress. Returns whether it did anything.
    pub fn flap(&mut self) -> bool {
        if self.mode != Mode::Playing {
            return false;
        }
        self.world.flap();
        self.events.push(GameEvent::Flapped);
        true
    }

    // ── Loop ────────────────────────────────────────────────────────────────

    /// One displayed frame: runs as many ticks as `elapsed` pays for. Stops at
    /// the first terminal collision. Returns the number of ticks run.
    pub fn frame(&mut self, elapsed: Duration) -> u32 {
        if self.mode != Mode::Playing {
            return 0;
        }
        let due = self.clock.advance(elapsed.as_secs_f64() * 1000.0);
        for n in 0..due {
            let report = self.world.tick(self.width, self.height);
            if report.scored > 0 {
                self.events.push(GameEvent::Scored {
                    score: self.world.score(),
                });
            }
            if report.ambient {
                self.events.push(GameEvent::Ambient);
            }
            if let Some(cause) = report.collision {
                // Mode is Playing here, so this cannot fail.
                let _ = self.finish(Some(cause));
                return n + 1;
            }
        }
        due
    }

    // ── Input ───────────────────────────────────────────────────────────────

    pub fn apply(&mut self, action: Action) -> Flow {
        match self.mode {
            Mode::Playing => match action {
                Action::Flap | Action::Up => {
                    self.flap();
                }
                Action::Quit => return Flow::Quit,
                _ => {}
            },
            Mode::GameOver { .. } => match action {
                Action::Select => {
                    let _ = self.start();
                }
                Action::Back => {
                    let _ = self.to_menu();
                }
                Action::Quit => return Flow::Quit,
                _ => {}
            },
            Mode::Menu(MenuScreen::Main) => match action {
                Action::Up => {
                    self.menu_cursor = (self.menu_cursor + MAIN_MENU.len() - 1) % MAIN_MENU.len();
                }
                Action::Down => {
                    self.menu_cursor = (self.menu_cursor + 1) % MAIN_MENU.len();
                }
                Action::Select => match MAIN_MENU[self.menu_cursor] {
                    MenuItem::Play => self.open(MenuScreen::EnterName),
                    MenuItem::Leaderboard => self.open(MenuScreen::Leaderboard),
                    MenuItem::Credits => self.open(MenuScreen::Credits),
                    MenuItem::Quit => return Flow::Quit,
                },
                Action::Back | Action::Quit => return Flow::Quit,
                _ => {}
            },
            Mode::Menu(MenuScreen::EnterName) => match action {
                Action::Type(c) => {
                    if !c.is_control() && self.player_name.chars().count() < MAX_NAME_LEN {
                        self.player_name.push(c);
                    }
                }
                Action::Erase => {
                    self.player_name.pop();
                }
                Action::Select => {
                    let _ = self.start();
                }
                Action::Back => self.open(MenuScreen::Main),
                Action::Quit => return Flow::Quit,
                _ => {}
            },
            Mode::Menu(MenuScreen::Leaderboard | MenuScreen::Credits) => match action {
                Action::Back | Action::Select => self.open(MenuScreen::Main),
                Action::Quit => return Flow::Quit,
                _ => {}
            },
        }
        Flow::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(20);

    fn quiet_game(name: &str) -> Game {
        let physics = Physics {
            spawn_interval_ms: f64::INFINITY,
            ..Physics::default()
        };
        Game::with_world(World::seeded(physics, WORLD_HEIGHT, 7), 400.0, name)
    }

    fn run_until_over(game: &mut Game) {
        for _ in 0..1000 {
            game.frame(TICK);
            if matches!(game.mode(), Mode::GameOver { .. }) {
                return;
            }
        }
        panic!("run never ended");
    }

    #[test]
    fn starts_in_main_menu_without_physics() {
        let mut game = quiet_game("");
        assert_eq!(game.mode(), Mode::Menu(MenuScreen::Main));
        let y = game.world().actor.y;
        assert_eq!(game.frame(Duration::from_millis(100)), 0);
        assert_eq!(game.world().actor.y, y);
    }

    #[test]
    fn start_is_rejected_mid_run() {
        let mut game = quiet_game("");
        game.start().unwrap();
        let err = game.start().unwrap_err();
        assert_eq!(err.to_string(), "cannot start while in playing");
        assert!(game.to_menu().is_err());
    }

    #[test]
    fn end_only_from_playing() {
        let mut game = quiet_game("");
        assert!(game.end().is_err());
        game.start().unwrap();
        game.end().unwrap();
        assert_eq!(game.mode(), Mode::GameOver { score: 0 });
        assert!(game.end().is_err());
    }

    #[test]
    fn flap_only_while_playing() {
        let mut game = quiet_game("");
        game.world_mut().actor.velocity = 3.0;
        assert!(!game.flap());
        assert_eq!(game.world().actor.velocity, 3.0);

        game.start().unwrap();
        game.world_mut().actor.velocity = 3.0;
        assert!(game.flap());
        assert_eq!(game.world().actor.velocity, -7.0);
    }

    #[test]
    fn one_submission_per_named_run() {
        let mut game = quiet_game("AAA");
        game.start().unwrap();
        run_until_over(&mut game);
        // Extra frames after the crash must not produce more events.
        game.frame(TICK);
        game.frame(TICK);

        let events = game.drain_events();
        let ended = events.iter().filter(|e| matches!(e, GameEvent::Ended { .. })).count();
        let submits: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::Submit { name, score } => Some((name.as_str(), *score)),
                _ => None,
            })
            .collect();
        assert_eq!(ended, 1);
        assert_eq!(submits, vec![("AAA", 0)]);
    }

    #[test]
    fn blank_name_submits_nothing() {
        let mut game = quiet_game("   ");
        game.start().unwrap();
        run_until_over(&mut game);
        assert!(
            !game
                .drain_events()
                .iter()
                .any(|e| matches!(e, GameEvent::Submit { .. }))
        );
    }

    #[test]
    fn restart_resets_the_run() {
        let mut game = quiet_game("");
        game.start().unwrap();
        game.world_mut().obstacles.push(crate::physics::Obstacle::new(300.0, 300.0));
        run_until_over(&mut game);
        game.start().unwrap();
        assert_eq!(game.world().score(), 0);
        assert!(game.world().obstacles.is_empty());
        assert_eq!(game.world().actor.y, WORLD_HEIGHT / 2.0);
        assert_eq!(game.world().actor.velocity, 0.0);
    }

    #[test]
    fn menu_navigation() {
        let mut game = quiet_game("");
        game.apply(Action::Down);
        game.apply(Action::Select);
        assert_eq!(game.mode(), Mode::Menu(MenuScreen::Leaderboard));
        assert!(game.drain_events().contains(&GameEvent::RefreshLeaderboard));

        game.apply(Action::Back);
        game.apply(Action::Up);
        assert_eq!(game.menu_cursor(), 0);
        game.apply(Action::Select);
        assert!(game.is_typing());

        for c in "ABCDEFGHIJKL".chars() {
            game.apply(Action::Type(c));
        }
        game.apply(Action::Erase);
        assert_eq!(game.player_name(), "ABCDEFGHI");

        game.apply(Action::Select);
        assert_eq!(game.mode(), Mode::Playing);
        assert_eq!(game.apply(Action::Quit), Flow::Quit);
    }

    #[test]
    fn game_over_back_to_menu_refreshes() {
        let mut game = quiet_game("");
        game.start().unwrap();
        game.end().unwrap();
        game.drain_events();
        assert_eq!(game.apply(Action::Flap), Flow::Continue);
        assert!(matches!(game.mode(), Mode::GameOver { .. }));
        game.apply(Action::Back);
        assert_eq!(game.mode(), Mode::Menu(MenuScreen::Main));
        assert_eq!(game.drain_events(), vec![GameEvent::RefreshLeaderboard]);
    }
}
