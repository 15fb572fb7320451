//! Runs leaderboard calls off the game thread.
//!
//! Every request is a detached thread. Failures end up in the log only; the game
//! polls for fresh standings and never waits.

use super::{Leaderboard, NewScore, ScoreRecord};
use std::cell::Cell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

/// Standings tagged with the order in which their fetch started.
type Delivery = (u64, Vec<ScoreRecord>);

pub struct LeaderboardWorker {
    board: Arc<dyn Leaderboard>,
    top_n: usize,
    next_seq: Arc<AtomicU64>,
    shown: Cell<u64>,
    tx: Sender<Delivery>,
    rx: Receiver<Delivery>,
}

impl LeaderboardWorker {
    pub fn new(board: Arc<dyn Leaderboard>, top_n: usize) -> Self {
        let (tx, rx) = mpsc::channel();
        LeaderboardWorker {
            board,
            top_n,
            next_seq: Arc::new(AtomicU64::new(1)),
            shown: Cell::new(0),
            tx,
            rx,
        }
    }

    fn fetcher(&self) -> Fetcher {
        Fetcher {
            board: Arc::clone(&self.board),
            n: self.top_n,
            next_seq: Arc::clone(&self.next_seq),
            tx: self.tx.clone(),
        }
    }

    /// Fetches the standings in the background.
    pub fn refresh(&self) -> thread::JoinHandle<()> {
        let fetcher = self.fetcher();
        thread::spawn(move || fetcher.run())
    }

    /// Submits a score in the background, then refreshes the standings.
    pub fn submit(&self, name: String, score: u32) -> thread::JoinHandle<()> {
        let fetcher = self.fetcher();
        thread::spawn(move || {
            match fetcher.board.submit(&NewScore::new(name, score)) {
                Ok(record) => log::info!("submitted {} for {:?}", record.score, record.name),
                Err(e) => {
                    log::warn!("score submit failed: {e}");
                    return;
                }
            }
            fetcher.run();
        })
    }

    /// Newest standings delivered since the last poll, if any. Results of fetches
    /// that started before the ones already shown are dropped.
    pub fn poll(&self) -> Option<Vec<ScoreRecord>> {
        let mut newest = None;
        for (seq, records) in self.rx.try_iter() {
            if seq > self.shown.get() {
                self.shown.set(seq);
                newest = Some(records);
            }
        }
        newest
    }
}

struct Fetcher {
    board: Arc<dyn Leaderboard>,
    n: usize,
    next_seq: Arc<AtomicU64>,
    tx: Sender<Delivery>,
}

impl Fetcher {
    fn run(&self) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        match self.board.top(self.n) {
            // The receiver is gone only when the game is shutting down.
            Ok(records) => {
                let _ = self.tx.send((seq, records));
            }
            Err(e) => log::warn!("leaderboard fetch failed: {e}"),
        }
    }
}
