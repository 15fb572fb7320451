//! Flappy Bird in the terminal, with a shared leaderboard.
//!
//! The game binary drives [`game::Game`] from a crossterm frame loop; the server
//! binary exposes a [`leaderboard::ScoreStore`] over HTTP.

pub mod audio;
pub mod config;
pub mod game;
pub mod input;
pub mod leaderboard;
pub mod physics;
pub mod render;
