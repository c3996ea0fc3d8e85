use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

#[derive(Debug)]
enum Control {
    SetInterval(Duration),
    Shutdown,
}

#[derive(Debug)]
struct Worker {
    tx: mpsc::Sender<Control>,
    handle: JoinHandle<()>,
}

/// Periodic auto-drop timer running on its own thread.
///
/// The thread calls the tick callback once per interval while the scheduler is
/// running. All methods take `&self`, so a scheduler shared through an [`Arc`]
/// can be started and stopped from any thread. Starting and stopping are
/// idempotent; [`shutdown`](Self::shutdown) ends the thread for good.
///
/// # Example
///
/// ```
/// use std::{sync::mpsc, time::Duration};
///
/// use blockfall_engine::DropScheduler;
///
/// let (tx, rx) = mpsc::channel();
/// let scheduler = DropScheduler::spawn(Duration::from_millis(5), move || {
///     let _ = tx.send(());
/// });
/// scheduler.start();
/// assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
/// scheduler.shutdown();
/// assert!(scheduler.is_shut_down());
/// ```
#[derive(Debug)]
pub struct DropScheduler {
    running: Arc<AtomicBool>,
    worker: Mutex<Option<Worker>>,
}

impl DropScheduler {
    /// Spawns the timer thread in the stopped state.
    pub fn spawn<F>(interval: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::channel();
        let handle = {
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let mut interval = interval;
                loop {
                    match rx.recv_timeout(interval) {
                        Ok(Control::SetInterval(new_interval)) => interval = new_interval,
                        Ok(Control::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
                        Err(RecvTimeoutError::Timeout) => {
                            if running.load(Ordering::Acquire) {
                                on_tick();
                            }
                        }
                    }
                }
            })
        };
        Self {
            running,
            worker: Mutex::new(Some(Worker { tx, handle })),
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts ticking. No-op after shutdown.
    pub fn start(&self) {
        if self.worker().is_some() {
            self.running.store(true, Ordering::Release);
        }
    }

    /// Stops ticking; the thread stays alive for a later [`start`](Self::start).
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    /// Whether ticks are currently produced.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Changes the tick period. The new period applies from the next tick.
    pub fn set_interval(&self, interval: Duration) {
        if let Some(worker) = self.worker().as_ref() {
            // The thread only disappears through shutdown, which also clears the worker.
            let _ = worker.tx.send(Control::SetInterval(interval));
        }
    }

    /// Stops the thread permanently and waits for it to exit. Idempotent.
    pub fn shutdown(&self) {
        self.stop();
        let Some(worker) = self.worker().take() else {
            return;
        };
        let _ = worker.tx.send(Control::Shutdown);
        // Never join from the timer thread itself, i.e. inside a tick callback.
        if worker.handle.thread().id() != thread::current().id()
            && worker.handle.join().is_err()
        {
            eprintln!("blockfall: auto-drop thread panicked");
        }
    }

    /// Whether [`Self::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.worker().is_none()
    }
}

impl Drop for DropScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
