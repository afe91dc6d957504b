//! Progress aggregation
//!
//! Workers never share counters. Each table import holds a `TableProgress` handle
//! that sends batched increments over a channel to a single aggregator thread,
//! which owns every counter and the terminal display.

use crossbeam_channel::{unbounded, Receiver, Sender};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::warn;

/// Records between two flushes of a `TableProgress` handle.
pub const DEFAULT_STEP: u64 = 100;

#[derive(Debug)]
pub enum ProgressEvent {
    Register { id: u64, name: String, total: u64 },
    Advance { id: u64, delta: u64 },
    Unregister { id: u64 },
}

/// Final counters of one sub-progress.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub name: String,
    pub completed: u64,
    pub total: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressDisplay {
    /// Bars drawn on stderr
    Terminal,
    Hidden,
}

struct Entry {
    name: String,
    completed: u64,
    total: u64,
    bar: ProgressBar,
}

impl Entry {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            name: self.name.clone(),
            completed: self.completed,
            total: self.total,
        }
    }
}

/// Owner of the aggregator thread.
pub struct ProgressHub {
    reporter: ProgressReporter,
    handle: Option<JoinHandle<Vec<ProgressSnapshot>>>,
}

impl ProgressHub {
    pub fn start(display: ProgressDisplay) -> Self {
        let (sender, receiver) = unbounded();
        let multi = match display {
            ProgressDisplay::Terminal => MultiProgress::with_draw_target(ProgressDrawTarget::stderr()),
            ProgressDisplay::Hidden => MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
        };
        let handle = std::thread::Builder::new()
            .name("progress".to_string())
            .spawn(move || aggregate(receiver, multi));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Progress display unavailable: {}", e);
                None
            }
        };
        Self {
            reporter: ProgressReporter {
                sender,
                next_id: Arc::new(AtomicU64::new(0)),
            },
            handle,
        }
    }

    pub fn reporter(&self) -> ProgressReporter {
        self.reporter.clone()
    }

    /// Wait for every reporter to be dropped and return the counters of every
    /// sub-progress that was registered, in unregistration order.
    pub fn finish(self) -> Vec<ProgressSnapshot> {
        let Self { reporter, handle } = self;
        drop(reporter);
        handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    }
}

fn aggregate(receiver: Receiver<ProgressEvent>, multi: MultiProgress) -> Vec<ProgressSnapshot> {
    let style = ProgressStyle::with_template(
        "{prefix:>32} [{bar:40.cyan/blue}] {human_pos}/{human_len} rec ({per_sec}, eta {eta})",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let mut active: HashMap<u64, Entry> = HashMap::new();
    let mut finished = Vec::new();

    for event in receiver {
        match event {
            ProgressEvent::Register { id, name, total } => {
                let bar = multi.add(ProgressBar::new(total));
                bar.set_style(style.clone());
                bar.set_prefix(name.clone());
                active.insert(id, Entry { name, completed: 0, total, bar });
            }
            ProgressEvent::Advance { id, delta } => {
                if let Some(entry) = active.get_mut(&id) {
                    entry.completed += delta;
                    entry.bar.inc(delta);
                }
            }
            ProgressEvent::Unregister { id } => {
                if let Some(entry) = active.remove(&id) {
                    entry.bar.finish_and_clear();
                    multi.remove(&entry.bar);
                    finished.push(entry.snapshot());
                }
            }
        }
    }

    let mut leftover: Vec<_> = active.into_iter().collect();
    leftover.sort_by_key(|(id, _)| *id);
    for (_, entry) in leftover {
        entry.bar.finish_and_clear();
        finished.push(entry.snapshot());
    }
    finished
}

/// Cloneable front end handed to every worker.
#[derive(Clone)]
pub struct ProgressReporter {
    sender: Sender<ProgressEvent>,
    next_id: Arc<AtomicU64>,
}

impl ProgressReporter {
    /// A reporter whose events go nowhere.
    pub fn disconnected() -> Self {
        let (sender, _) = unbounded();
        Self {
            sender,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn register(&self, name: impl Into<String>, total: u64) -> TableProgress {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // A closed display must never fail an import.
        let _ = self.sender.send(ProgressEvent::Register {
            id,
            name: name.into(),
            total,
        });
        TableProgress {
            id,
            sender: self.sender.clone(),
            pending: 0,
            step: DEFAULT_STEP,
        }
    }
}

/// Sub-progress of one actively importing table; unregisters on drop.
pub struct TableProgress {
    id: u64,
    sender: Sender<ProgressEvent>,
    pending: u64,
    step: u64,
}

impl TableProgress {
    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step.max(1);
        self
    }

    pub fn inc(&mut self) {
        self.pending += 1;
        if self.pending >= self.step {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        if self.pending > 0 {
            let _ = self.sender.send(ProgressEvent::Advance {
                id: self.id,
                delta: self.pending,
            });
            self.pending = 0;
        }
    }
}

impl Drop for TableProgress {
    fn drop(&mut self) {
        self.flush();
        let _ = self.sender.send(ProgressEvent::Unregister { id: self.id });
    }
}
