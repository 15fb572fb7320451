use anyhow::{Context, Result};
use crossterm::{
    cursor,
    event::{self, DisableMouseCapture, EnableMouseCapture, Event},
    execute, terminal,
};
use flappy_board::audio::{Audio, Cue};
use flappy_board::config::Config;
use flappy_board::game::{self, Flow, Game, GameEvent};
use flappy_board::input;
use flappy_board::leaderboard::{
    HttpLeaderboard, Leaderboard, LeaderboardWorker, LocalLeaderboard, ScoreStore,
};
use flappy_board::render::{self, PixelBuf};
use std::fs::OpenOptions;
use std::io::{self, Stdout, stdout};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAME: Duration = Duration::from_millis(16); // ~60 fps

// ── Terminal ────────────────────────────────────────────────────────────────

/// Raw mode and the alternate screen for as long as this lives, panics included.
struct TerminalGuard;

impl TerminalGuard {
    fn enter(out: &mut Stdout) -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = TerminalGuard;
        execute!(
            out,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            terminal::DisableLineWrap,
            EnableMouseCapture,
        )?;
        Ok(guard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            DisableMouseCapture,
            terminal::LeaveAlternateScreen,
            cursor::Show,
            terminal::EnableLineWrap,
        );
        let _ = terminal::disable_raw_mode();
    }
}

// ── Setup ───────────────────────────────────────────────────────────────────

fn init_logging(config: &Config) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log.file)
        .with_context(|| format!("opening log file {}", config.log.file.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .init();
    Ok(())
}

fn open_leaderboard(config: &Config) -> Result<Arc<dyn Leaderboard>> {
    let lb = &config.leaderboard;
    Ok(match &lb.url {
        Some(url) => {
            let client = HttpLeaderboard::new(url, Duration::from_secs(lb.timeout_secs));
            log::info!("using leaderboard at {}", client.url());
            Arc::new(client)
        }
        None => {
            let store = ScoreStore::open(&lb.store_path)
                .with_context(|| format!("opening {}", lb.store_path.display()))?;
            log::info!("using local leaderboard {}", lb.store_path.display());
            Arc::new(LocalLeaderboard::new(store))
        }
    })
}

// ── Main ────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let config = Config::load()?;
    init_logging(&config)?;

    let worker = LeaderboardWorker::new(open_leaderboard(&config)?, config.leaderboard.top_n);
    worker.refresh();
    let audio = Audio::new(config.audio.enabled);

    let mut out = stdout();
    let _guard = TerminalGuard::enter(&mut out)?;

    let (cols, rows) = terminal::size()?;
    let mut buf = PixelBuf::new(cols, rows);
    let mut game = Game::new(
        config.physics,
        game::world_width(cols, rows),
        &config.player.name,
    );

    let result = run(&mut game, &mut buf, &mut out, &audio, &worker);
    if let Err(e) = &result {
        log::error!("game loop failed: {e:#}");
    }
    result
}

fn run(
    game: &mut Game,
    buf: &mut PixelBuf,
    out: &mut Stdout,
    audio: &Audio,
    worker: &LeaderboardWorker,
) -> Result<()> {
    let mut last = Instant::now();
    let mut idle_scroll = 0.0;

    loop {
        let frame_start = Instant::now();

        // Input
        while event::poll(Duration::ZERO)? {
            let ev = event::read()?;
            if let Event::Resize(c, r) = ev {
                buf.resize(c, r);
                game.resize(game::world_width(c, r));
                continue;
            }
            if let Some(action) = input::translate(&ev, game.is_typing()) {
                if game.apply(action) == Flow::Quit {
                    return Ok(());
                }
            }
        }

        // Update
        let now = Instant::now();
        game.frame(now - last);
        last = now;
        idle_scroll += 0.5;

        for ev in game.drain_events() {
            dispatch(ev, audio, worker);
        }
        if let Some(standings) = worker.poll() {
            game.set_standings(standings);
        }

        // Render
        let text = render::draw(game, buf, idle_scroll);
        buf.render(out, &text)?;

        // Frame pacing
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME {
            std::thread::sleep(FRAME - elapsed);
        }
    }
}

fn dispatch(ev: GameEvent, audio: &Audio, worker: &LeaderboardWorker) {
    match ev {
        GameEvent::Started => audio.start_music(),
        GameEvent::Flapped => audio.play(Cue::Flap),
        GameEvent::Scored { .. } => audio.play(Cue::Score),
        GameEvent::Ambient => audio.play(Cue::Ambient),
        GameEvent::Ended { .. } => {
            audio.stop_loops();
            audio.play(Cue::Hit);
        }
        GameEvent::Submit { name, score } => {
            worker.submit(name, score);
        }
        GameEvent::RefreshLeaderboard => {
            worker.refresh();
        }
    }
}
