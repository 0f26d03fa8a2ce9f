//! Starting children and holding on to them.
//!
//! A [`Launcher`] turns a worker or writer spec into a running child and a
//! [`ChildHandle`] for talking to it. [`ProcessLauncher`] re-executes the
//! `glint` binary so each device runs in its own OS process;
//! [`ThreadLauncher`] runs the same loops on threads, for tests and for
//! single-process setups.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use glint_io::VirtualHandle;
use glint_registry::EffectRegistry;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{ProjectError, Result};
use crate::message::{Reply, WorkerMessage, WriterMessage};
use crate::transport::{spawn_feeder, spawn_reader};
use crate::worker::{self, WorkerSpec};
use crate::writer::{self, WriterSpec};

/// Poll interval while waiting for a child to exit.
const EXIT_POLL: Duration = Duration::from_millis(2);

/// Starts worker and writer children.
pub trait Launcher: Send + Sync {
    /// Start a render worker.
    fn spawn_worker(&self, spec: &WorkerSpec) -> Result<ChildHandle<WorkerMessage>>;

    /// Start a device writer.
    fn spawn_writer(&self, spec: &WriterSpec) -> Result<ChildHandle<WriterMessage>>;
}

enum Running {
    Thread(Option<JoinHandle<()>>),
    Process { child: Child, io: Vec<JoinHandle<()>> },
}

/// Orchestrator side of a running child: its message channels plus the
/// thread or process behind them.
///
/// Process children still running when the handle is dropped are killed.
pub struct ChildHandle<M> {
    name: String,
    tx: Option<Sender<M>>,
    rx: Receiver<Reply>,
    running: Running,
}

impl<M> ChildHandle<M> {
    /// Handle for a child running on `thread`.
    pub fn from_thread(name: impl Into<String>, tx: Sender<M>, rx: Receiver<Reply>, thread: JoinHandle<()>) -> Self {
        Self {
            name: name.into(),
            tx: Some(tx),
            rx,
            running: Running::Thread(Some(thread)),
        }
    }

    /// Handle for a child process whose stdio is bridged by the `io` threads.
    pub fn from_process(
        name: impl Into<String>,
        tx: Sender<M>,
        rx: Receiver<Reply>,
        child: Child,
        io: Vec<JoinHandle<()>>,
    ) -> Self {
        Self {
            name: name.into(),
            tx: Some(tx),
            rx,
            running: Running::Process { child, io },
        }
    }

    /// Child name, `worker:<device>` or `writer:<device>`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a message for the child.
    pub fn send(&self, message: M) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| ProjectError::transport(&self.name, "input already closed"))?;
        tx.send(message)
            .map_err(|_| ProjectError::transport(&self.name, "child hung up"))
    }

    /// Wait up to `timeout` for the next reply.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Reply, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Replies already received, without blocking.
    pub fn drain(&self) -> impl Iterator<Item = Reply> + '_ {
        self.rx.try_iter()
    }

    /// True once the child thread or process has ended.
    pub fn has_exited(&mut self) -> bool {
        match &mut self.running {
            Running::Thread(handle) => handle.as_ref().is_none_or(JoinHandle::is_finished),
            Running::Process { child, .. } => !matches!(child.try_wait(), Ok(None)),
        }
    }

    /// Close the child's input. A child treats this like `Stop`.
    pub fn close_input(&mut self) {
        self.tx = None;
    }

    /// Close the input and wait up to `timeout` for the child to exit.
    ///
    /// Gives the handle back if the child is still running.
    pub fn join(mut self, timeout: Duration) -> std::result::Result<(), Self> {
        self.close_input();
        let deadline = Instant::now() + timeout;
        while !self.has_exited() {
            if Instant::now() >= deadline {
                return Err(self);
            }
            thread::sleep(EXIT_POLL);
        }
        self.reap();
        Ok(())
    }

    /// Terminate the child.
    ///
    /// Threads cannot be terminated; a thread child is detached and ends
    /// on its own once it notices its input is closed.
    pub fn kill(mut self) {
        self.close_input();
        match &mut self.running {
            Running::Thread(handle) => {
                if handle.take().is_some() {
                    tracing::warn!(child = %self.name, "detaching thread child that did not exit");
                }
            }
            Running::Process { child, .. } => {
                if let Err(e) = child.kill() {
                    tracing::debug!(child = %self.name, "kill failed: {e}");
                }
                tracing::warn!(child = %self.name, "killed child process");
            }
        }
        self.reap();
    }

    fn reap(&mut self) {
        match &mut self.running {
            Running::Thread(handle) => {
                if let Some(handle) = handle.take() {
                    if handle.join().is_err() {
                        tracing::error!(child = %self.name, "child thread panicked");
                    }
                }
            }
            Running::Process { child, io } => {
                match child.wait() {
                    Ok(status) if !status.success() => {
                        tracing::debug!(child = %self.name, %status, "child exited");
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(child = %self.name, "wait failed: {e}"),
                }
                for handle in io.drain(..) {
                    let _ = handle.join();
                }
            }
        }
    }
}

impl<M> Drop for ChildHandle<M> {
    fn drop(&mut self) {
        if let Running::Process { child, .. } = &mut self.running {
            if matches!(child.try_wait(), Ok(None)) {
                let _ = child.kill();
                let _ = child.wait();
            }
        }
    }
}

impl<M> std::fmt::Debug for ChildHandle<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.running {
            Running::Thread(_) => "thread",
            Running::Process { .. } => "process",
        };
        f.debug_struct("ChildHandle")
            .field("name", &self.name)
            .field("kind", &kind)
            .field("input_open", &self.tx.is_some())
            .finish()
    }
}

// ── Threads ────────────────────────────────────────────────────────────────

/// Runs workers and writers on threads of the current process.
pub struct ThreadLauncher {
    registry: Arc<EffectRegistry>,
    previews: Mutex<HashMap<String, VirtualHandle>>,
}

impl ThreadLauncher {
    /// Launcher whose workers build effects from `registry`.
    pub fn new(registry: Arc<EffectRegistry>) -> Self {
        Self {
            registry,
            previews: Mutex::new(HashMap::new()),
        }
    }

    /// Read side of the virtual device most recently opened for `device`.
    pub fn preview(&self, device: &str) -> Option<VirtualHandle> {
        self.previews.lock().get(device).cloned()
    }
}

impl Default for ThreadLauncher {
    fn default() -> Self {
        Self::new(Arc::new(EffectRegistry::new()))
    }
}

impl Launcher for ThreadLauncher {
    fn spawn_worker(&self, spec: &WorkerSpec) -> Result<ChildHandle<WorkerMessage>> {
        let name = spec.child_name();
        let (tx, inbox) = unbounded();
        let (outbox, rx) = unbounded();
        let spec = spec.clone();
        let registry = Arc::clone(&self.registry);
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if let Err(e) = worker::run(&spec, &registry, inbox, outbox) {
                    tracing::error!(device = %spec.device, "worker failed: {e}");
                }
            })
            .map_err(|e| ProjectError::spawn(&name, e))?;
        Ok(ChildHandle::from_thread(name, tx, rx, thread))
    }

    fn spawn_writer(&self, spec: &WriterSpec) -> Result<ChildHandle<WriterMessage>> {
        let name = spec.child_name();
        let (device, preview) = writer::open_device(&spec.device);
        if let Some(preview) = preview {
            self.previews.lock().insert(spec.device.id.clone(), preview);
        }
        let (tx, inbox) = unbounded();
        let (outbox, rx) = unbounded();
        let spec = spec.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if let Err(e) = writer::run(&spec, device, inbox, outbox) {
                    tracing::error!(device = %spec.device.id, "writer failed: {e}");
                }
            })
            .map_err(|e| ProjectError::spawn(&name, e))?;
        Ok(ChildHandle::from_thread(name, tx, rx, thread))
    }
}

// ── Processes ──────────────────────────────────────────────────────────────

/// Runs each worker and writer as `<program> worker --spec <json>` or
/// `<program> device-writer --spec <json>`, talking JSON lines over stdio.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
}

impl ProcessLauncher {
    /// Launcher that executes `program`.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Launcher that re-executes the running binary.
    pub fn current_exe() -> Result<Self> {
        let program = std::env::current_exe().map_err(|e| ProjectError::spawn("current executable", e))?;
        Ok(Self::new(program))
    }

    fn spawn<M, S>(&self, name: String, subcommand: &str, spec: &S) -> Result<ChildHandle<M>>
    where
        M: Serialize + Send + 'static,
        S: Serialize,
    {
        let spec = serde_json::to_string(spec).map_err(|e| ProjectError::transport(&name, e.to_string()))?;
        let mut child = Command::new(&self.program)
            .arg(subcommand)
            .arg("--spec")
            .arg(spec)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| ProjectError::spawn(&name, e))?;
        tracing::debug!(child = %name, pid = child.id(), "spawned child process");

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            let _ = child.kill();
            return Err(ProjectError::transport(&name, "child stdio not piped"));
        };
        let (tx, feed) = unbounded::<M>();
        let (sink, rx) = unbounded::<Reply>();
        let io = vec![
            spawn_feeder(&name, feed, stdin).map_err(|e| ProjectError::spawn(&name, e))?,
            spawn_reader(&name, stdout, sink).map_err(|e| ProjectError::spawn(&name, e))?,
        ];
        Ok(ChildHandle::from_process(name, tx, rx, child, io))
    }
}

impl Launcher for ProcessLauncher {
    fn spawn_worker(&self, spec: &WorkerSpec) -> Result<ChildHandle<WorkerMessage>> {
        self.spawn(spec.child_name(), "worker", spec)
    }

    fn spawn_writer(&self, spec: &WriterSpec) -> Result<ChildHandle<WriterMessage>> {
        self.spawn(spec.child_name(), "device-writer", spec)
    }
}
