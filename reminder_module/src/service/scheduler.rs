use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::document_store::DocumentStore;
use crate::reminders::ReminderEvaluator;

const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(250);

pub struct SchedulerControl {
    stop: Arc<AtomicBool>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl SchedulerControl {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn stop_and_join(&mut self) {
        self.stop();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

/// Blocks until the store answers a ping. Returns false if stopped first.
pub fn wait_for_store(store: &dyn DocumentStore, retry: Duration, stop: &AtomicBool) -> bool {
    let mut attempts = 0u32;
    while !stop.load(Ordering::Relaxed) {
        match store.ping() {
            Ok(()) => {
                if attempts > 0 {
                    info!("document store ready after {} retries", attempts);
                }
                return true;
            }
            Err(err) => {
                attempts += 1;
                warn!("document store not ready (attempt {}): {}", attempts, err);
                if !sleep_unless_stopped(retry, stop) {
                    return false;
                }
            }
        }
    }
    false
}

pub fn start_scheduler_thread(
    evaluator: Arc<ReminderEvaluator>,
    store: Arc<dyn DocumentStore>,
    poll_interval: Duration,
    ready_retry: Duration,
) -> SchedulerControl {
    let stop = Arc::new(AtomicBool::new(false));
    let scheduler_stop = stop.clone();
    let handle = thread::spawn(move || {
        if !wait_for_store(store.as_ref(), ready_retry, &scheduler_stop) {
            return;
        }
        info!(
            "reminder scheduler running every {}s in {}",
            poll_interval.as_secs(),
            evaluator.timezone()
        );
        while !scheduler_stop.load(Ordering::Relaxed) {
            let started = Instant::now();
            if let Err(err) = evaluator.tick() {
                error!("reminder tick failed: {}", err);
            }
            let remaining = poll_interval.saturating_sub(started.elapsed());
            if !sleep_unless_stopped(remaining, &scheduler_stop) {
                break;
            }
        }
        info!("reminder scheduler stopped");
    });

    SchedulerControl {
        stop,
        handles: vec![handle],
    }
}

fn sleep_unless_stopped(duration: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(STOP_CHECK_INTERVAL.min(deadline - now));
    }
}
