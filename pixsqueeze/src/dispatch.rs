//! Batch orchestration: fan one task per image out to the worker pool,
//! correlate results back by record id, coalesce rapid re-runs.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::image::{self, CompressedImage};
use crate::options::CompressOptions;
use crate::registry::Registry;

/// How a batch presents itself: a full run reports progress after every
/// completed image, a preview run is silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchMode {
    Full,
    Preview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every task produced a result.
    Completed { processed: usize },
    /// Another batch was active; this request was dropped, not queued.
    Skipped,
}

/// Issues one compression task per record and applies results as they
/// arrive, in any order. At most one batch is active at a time; a request
/// made while one is running is silently skipped.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    active: Arc<AtomicBool>,
}

// Clears the active flag on every exit path, including errors.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Compress every registered image with one shared options snapshot.
    ///
    /// Fails fast: the first worker error ends the batch. Results already
    /// applied stay applied; still-running tasks finish detached and their
    /// results are discarded. `on_progress(completed, total)` fires after
    /// each success, only in [`BatchMode::Full`].
    pub fn run(
        &self,
        registry: &mut Registry,
        options: &CompressOptions,
        mode: BatchMode,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<BatchOutcome> {
        if self.active.swap(true, Ordering::SeqCst) {
            log::debug!("batch already active, skipping {mode:?} run");
            return Ok(BatchOutcome::Skipped);
        }
        let _guard = ActiveGuard(self.active.clone());

        options.validate()?;

        let jobs: Vec<(Uuid, Arc<[u8]>)> = registry
            .iter()
            .map(|r| (r.id(), r.original_bytes().clone()))
            .collect();
        let total = jobs.len();
        if total == 0 {
            return Ok(BatchOutcome::Completed { processed: 0 });
        }

        log::info!("dispatching batch of {total} images ({mode:?})");

        let (tx, rx) = mpsc::channel::<(Uuid, Result<CompressedImage>)>();
        let mut pending: HashSet<Uuid> = jobs.iter().map(|(id, _)| *id).collect();

        for (id, bytes) in jobs {
            let tx = tx.clone();
            let options = *options;
            rayon::spawn(move || {
                let result = image::compress(&bytes, &options);
                // Send fails once the batch has failed fast and dropped
                // the receiver; the straggler's result is discarded.
                tx.send((id, result)).ok();
            });
        }
        drop(tx);

        let mut completed = 0;
        while !pending.is_empty() {
            let (id, result) = rx.recv().context("worker pool disconnected")?;

            if !pending.remove(&id) {
                log::warn!("unmatched result for {id}, dropping");
                continue;
            }

            match result {
                Ok(output) => {
                    registry.upsert_compressed(id, output);
                    completed += 1;
                    if mode == BatchMode::Full {
                        on_progress(completed, total);
                    }
                }
                Err(e) => {
                    return Err(e.context(format!("compression failed for record {id}")));
                }
            }
        }

        Ok(BatchOutcome::Completed { processed: completed })
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Timer-based coalescer for live-preview re-runs. Each trigger replaces
/// the pending slot; only the last one fires, after the quiet period, and
/// only if no batch is active at that moment. A preview that lands while a
/// batch is running is dropped, not queued.
pub struct Debouncer {
    quiet: Duration,
    dispatcher: Dispatcher,
    generation: AtomicU64,
    // The slot carries the generation of the trigger that filled it, so a
    // timer thread can only take the job it was armed for.
    slot: Arc<Mutex<Option<(u64, Job)>>>,
}

impl Debouncer {
    pub fn new(quiet: Duration, dispatcher: Dispatcher) -> Self {
        Self {
            quiet,
            dispatcher,
            generation: AtomicU64::new(0),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn trigger(&self, job: impl FnOnce() + Send + 'static) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.slot.lock() = Some((generation, Box::new(job)));

        let slot = Arc::clone(&self.slot);
        let dispatcher = self.dispatcher.clone();
        let quiet = self.quiet;

        thread::spawn(move || {
            thread::sleep(quiet);
            // Check and take under one lock: a rival trigger that lands
            // between a bare check and the take would otherwise get its job
            // fired before its own quiet period has elapsed.
            let job = {
                let mut slot = slot.lock();
                if matches!(*slot, Some((armed, _)) if armed == generation) {
                    slot.take().map(|(_, job)| job)
                } else {
                    // Superseded by a newer trigger, or already fired
                    None
                }
            };
            let Some(job) = job else {
                return;
            };
            if dispatcher.is_active() {
                log::debug!("preview skipped, batch still active");
                return;
            }
            job();
        });
    }
}
