//! Named interval jobs on a background worker.
//!
//! One ticker thread scans the job table; due callbacks run on their own
//! threads so jobs never block each other. A single job is never re-entered:
//! when a callback is still running at its next tick, that tick is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::debug;

const TICK: Duration = Duration::from_millis(200);

/// Jobs registered as immediate still get a short grace period before their
/// first run, so startup wiring can finish.
const IMMEDIATE_DELAY: Duration = Duration::from_secs(3);

type JobFn = Arc<dyn Fn() + Send + Sync + 'static>;

struct Job {
    callback: JobFn,
    interval: Duration,
    next_run: Instant,
    running: Arc<AtomicBool>,
}

pub struct Scheduler {
    jobs: Arc<Mutex<HashMap<String, Job>>>,
    shutdown_tx: Mutex<Option<Sender<()>>>,
}

impl Scheduler {
    /// Creates the scheduler and spawns its worker thread.
    pub fn new() -> Arc<Self> {
        let jobs: Arc<Mutex<HashMap<String, Job>>> = Arc::new(Mutex::new(HashMap::new()));
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let worker_jobs = Arc::clone(&jobs);
        thread::Builder::new()
            .name("scheduler".to_string())
            .spawn(move || run_worker(worker_jobs, shutdown_rx))
            .expect("failed to spawn scheduler worker");

        Arc::new(Self {
            jobs,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
        })
    }

    /// Registers (or replaces) a job running every `interval_secs` seconds,
    /// first run one interval from now.
    pub fn start_job<F>(&self, name: &str, interval_secs: u64, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.start_job_every(name, Duration::from_secs(interval_secs.max(1)), false, callback);
    }

    /// Like [`Scheduler::start_job`] but with the first run a few seconds
    /// after registration instead of a full interval away.
    pub fn start_job_immediate<F>(&self, name: &str, interval_secs: u64, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.start_job_every(name, Duration::from_secs(interval_secs.max(1)), true, callback);
    }

    pub fn start_job_every<F>(&self, name: &str, interval: Duration, immediate: bool, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        debug!(job = %name, ?interval, "starting job");
        let next_run = if immediate {
            Instant::now() + IMMEDIATE_DELAY.min(interval)
        } else {
            Instant::now() + interval
        };

        let job = Job {
            callback: Arc::new(callback),
            interval,
            next_run,
            running: Arc::new(AtomicBool::new(false)),
        };

        self.lock_jobs().insert(name.to_string(), job);
    }

    /// Removes a job. Unknown names are ignored.
    pub fn stop_job(&self, name: &str) {
        if self.lock_jobs().remove(name).is_some() {
            debug!(job = %name, "stopping job");
        }
    }

    pub fn has_job(&self, name: &str) -> bool {
        self.lock_jobs().contains_key(name)
    }

    /// Stops the worker thread. Callbacks already running finish on their
    /// own threads.
    pub fn shutdown(&self) {
        self.shutdown_tx
            .lock()
            .expect("Scheduler Mutex Poisoned")
            .take();
    }

    fn lock_jobs(&self) -> std::sync::MutexGuard<'_, HashMap<String, Job>> {
        self.jobs.lock().expect("Scheduler Mutex Poisoned")
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(jobs: Arc<Mutex<HashMap<String, Job>>>, shutdown_rx: Receiver<()>) {
    debug!("scheduler worker started");
    loop {
        match shutdown_rx.recv_timeout(TICK) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        let due: Vec<(String, JobFn, Arc<AtomicBool>)> = {
            let mut jobs = jobs.lock().expect("Scheduler Mutex Poisoned");
            jobs.iter_mut()
                .filter(|(_, job)| now >= job.next_run)
                .map(|(name, job)| {
                    job.next_run = now + job.interval;
                    (
                        name.clone(),
                        Arc::clone(&job.callback),
                        Arc::clone(&job.running),
                    )
                })
                .collect()
        };

        for (name, callback, running) in due {
            if running.swap(true, Ordering::SeqCst) {
                debug!(job = %name, "previous run still active, dropping tick");
                continue;
            }
            thread::spawn(move || {
                callback();
                running.store(false, Ordering::SeqCst);
            });
        }
    }
    debug!("scheduler worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counter_job(counter: &Arc<AtomicU32>) -> impl Fn() + Send + Sync + 'static {
        let counter = Arc::clone(counter);
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_job_runs_periodically() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));

        scheduler.start_job_every("tick", Duration::from_millis(100), false, counter_job(&counter));
        thread::sleep(Duration::from_millis(600));

        let runs = counter.load(Ordering::SeqCst);
        assert!(runs >= 2, "expected at least 2 runs, got {}", runs);
        scheduler.shutdown();
    }

    #[test]
    fn test_start_replaces_existing_job() {
        let scheduler = Scheduler::new();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        scheduler.start_job_every("job", Duration::from_millis(100), false, counter_job(&first));
        scheduler.start_job_every("job", Duration::from_millis(100), false, counter_job(&second));
        thread::sleep(Duration::from_millis(500));

        assert_eq!(first.load(Ordering::SeqCst), 0, "replaced job must not run");
        assert!(second.load(Ordering::SeqCst) >= 1);
        scheduler.shutdown();
    }

    #[test]
    fn test_stop_job_is_idempotent() {
        let scheduler = Scheduler::new();
        let counter = Arc::new(AtomicU32::new(0));

        scheduler.start_job_every("gone", Duration::from_millis(100), false, counter_job(&counter));
        assert!(scheduler.has_job("gone"));

        scheduler.stop_job("gone");
        scheduler.stop_job("gone");
        scheduler.stop_job("never existed");
        assert!(!scheduler.has_job("gone"));

        thread::sleep(Duration::from_millis(400));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        scheduler.shutdown();
    }

    #[test]
    fn test_slow_job_is_not_reentered() {
        let scheduler = Scheduler::new();
        let concurrent = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let concurrent_job = Arc::clone(&concurrent);
        let max_seen_job = Arc::clone(&max_seen);
        scheduler.start_job_every("slow", Duration::from_millis(50), false, move || {
            let active = concurrent_job.fetch_add(1, Ordering::SeqCst) + 1;
            max_seen_job.fetch_max(active, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(250));
            concurrent_job.fetch_sub(1, Ordering::SeqCst);
        });

        thread::sleep(Duration::from_millis(700));
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        scheduler.shutdown();
    }
}
