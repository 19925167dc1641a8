use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::lazy::LazyResponse;
use crate::request::HttpRequest;
use crate::response::HttpResponse;
use crate::transport::Transport;

type Outcome = std::result::Result<HttpResponse, Error>;

/// A unit of work for the dispatcher: an executor producing a response and
/// a completion callback invoked exactly once with the outcome.
pub struct DispatchTask {
    execute: Box<dyn FnOnce() -> Outcome + Send + 'static>,
    complete: Box<dyn FnOnce(Outcome) + Send + 'static>,
}

impl DispatchTask {
    pub fn new(
        execute: impl FnOnce() -> Outcome + Send + 'static,
        complete: impl FnOnce(Outcome) + Send + 'static,
    ) -> Self {
        Self {
            execute: Box::new(execute),
            complete: Box::new(complete),
        }
    }
}

/// Settings for the worker pool, read once at construction.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Number of worker threads.
    pub threads: usize,
    /// Daemon dispatchers abandon outstanding work when dropped instead of
    /// draining it. Explicit `shutdown()` drains either way.
    pub daemon: bool,
    /// How long `shutdown()` waits for in-flight and queued tasks before
    /// giving up on the workers still busy.
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            daemon: true,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

struct Shared {
    /// Single synchronization point for the accept/reject decision: while
    /// the sender is present, submissions are accepted. `shutdown` takes it.
    sender: Mutex<Option<mpsc::Sender<DispatchTask>>>,
    live_workers: Mutex<usize>,
    drained: Condvar,
    interrupt: AtomicBool,
}

/// Bounded worker pool for fire-and-forget request execution.
///
/// Tasks are pulled from one shared queue, so scheduling is FIFO-ish across
/// workers with no completion-order guarantee. Shutdown is two-phase: stop
/// accepting and drain within a grace period, then interrupt whatever is
/// left. A shut-down dispatcher is terminal.
pub struct Dispatcher {
    shared: Arc<Shared>,
    grace: Duration,
    daemon: bool,
}

impl Dispatcher {
    pub fn new(config: DispatcherConfig) -> Result<Self> {
        let threads = config.threads.max(1);
        let (sender, receiver) = mpsc::channel::<DispatchTask>();
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(Shared {
            sender: Mutex::new(Some(sender)),
            live_workers: Mutex::new(threads),
            drained: Condvar::new(),
            interrupt: AtomicBool::new(false),
        });

        for index in 0..threads {
            let receiver = Arc::clone(&receiver);
            let worker_shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("chatter-dispatcher-{index}"))
                .spawn(move || worker_loop(receiver, worker_shared));
            if let Err(err) = spawned {
                // Let the workers spawned so far drain out and exit.
                shared
                    .sender
                    .lock()
                    .expect("dispatcher lock poisoned")
                    .take();
                return Err(Error::Spawn(err));
            }
        }

        Ok(Self {
            shared,
            grace: config.shutdown_grace,
            daemon: config.daemon,
        })
    }

    /// Enqueue a task. Returns immediately; fails once shutdown has begun.
    pub fn submit(&self, task: DispatchTask) -> Result<()> {
        let sender = self.shared.sender.lock().expect("dispatcher lock poisoned");
        match sender.as_ref() {
            Some(sender) => sender.send(task).map_err(|_| Error::DispatcherShutDown),
            None => Err(Error::DispatcherShutDown),
        }
    }

    /// Schedule a request on the pool and hand back the lazy response that
    /// will observe its outcome.
    pub fn dispatch<T>(&self, transport: Arc<T>, request: HttpRequest) -> Result<LazyResponse>
    where
        T: Transport + ?Sized + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));
        let lazy = LazyResponse::pending(result_rx, Arc::clone(&cancel));
        let task = DispatchTask::new(
            move || {
                if cancel.load(Ordering::Relaxed) {
                    return Err(Error::Disconnected);
                }
                transport.execute(request)
            },
            move |outcome| {
                // Nobody listens after a disconnect; dropping the outcome
                // is exactly the best-effort contract.
                let _ = result_tx.send(outcome);
            },
        );
        self.submit(task)?;
        Ok(lazy)
    }

    /// Stop accepting work, drain for up to the grace period, then
    /// interrupt the remainder. Idempotent, and safe to call from teardown
    /// paths as well as explicitly.
    pub fn shutdown(&self) {
        let sender = self
            .shared
            .sender
            .lock()
            .expect("dispatcher lock poisoned")
            .take();
        // Dropping the sender lets idle workers drain the queue and exit
        // their recv loop.
        drop(sender);

        let deadline = Instant::now() + self.grace;
        let mut live = self
            .shared
            .live_workers
            .lock()
            .expect("dispatcher lock poisoned");
        while *live > 0 {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (guard, _) = self
                .shared
                .drained
                .wait_timeout(live, deadline - now)
                .expect("dispatcher lock poisoned");
            live = guard;
        }

        if *live > 0 {
            self.shared.interrupt.store(true, Ordering::Relaxed);
            log::warn!(
                "dispatcher shutdown grace elapsed with {} worker(s) still busy; abandoning them",
                *live
            );
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.daemon {
            // Daemon pools don't delay teardown: reject new work and tell
            // workers to fail anything still queued.
            self.shared
                .sender
                .lock()
                .expect("dispatcher lock poisoned")
                .take();
            self.shared.interrupt.store(true, Ordering::Relaxed);
        } else {
            self.shutdown();
        }
    }
}

fn worker_loop(receiver: Arc<Mutex<mpsc::Receiver<DispatchTask>>>, shared: Arc<Shared>) {
    loop {
        let task = {
            let receiver = receiver.lock().expect("dispatcher lock poisoned");
            match receiver.recv() {
                Ok(task) => task,
                // Sender gone and queue drained.
                Err(_) => break,
            }
        };
        if shared.interrupt.load(Ordering::Relaxed) {
            // Shutdown escalated past the grace period; fail queued tasks
            // fast instead of running them.
            let _ = catch_unwind(AssertUnwindSafe(move || {
                (task.complete)(Err(Error::Abandoned))
            }));
            continue;
        }
        run_task(task);
    }

    let mut live = shared.live_workers.lock().expect("dispatcher lock poisoned");
    *live -= 1;
    shared.drained.notify_all();
}

/// Run one task, isolating the pool from anything it throws. A panic in the
/// executor is routed to the task's own failure callback; a panic in the
/// callback is swallowed so the worker survives either way.
fn run_task(task: DispatchTask) {
    let DispatchTask { execute, complete } = task;
    let outcome = match catch_unwind(AssertUnwindSafe(execute)) {
        Ok(outcome) => outcome,
        Err(panic) => Err(Error::TaskPanic(panic_message(&*panic))),
    };
    let _ = catch_unwind(AssertUnwindSafe(move || complete(outcome)));
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
