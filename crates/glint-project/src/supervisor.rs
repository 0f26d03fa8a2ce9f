//! Liveness-checked child startup with retry.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use glint_config::RuntimeConfig;

use crate::error::{ProjectError, Result};
use crate::launcher::ChildHandle;
use crate::message::Reply;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// How hard to try before declaring a child dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartPolicy {
    /// Time a fresh child has to answer its probe.
    pub timeout: Duration,
    /// Spawns before giving up.
    pub max_attempts: u32,
    /// Pause after the first failed attempt; doubles after each further one.
    pub backoff_initial: Duration,
}

impl StartPolicy {
    /// Policy from the runtime settings.
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self {
            timeout: config.startup_timeout(),
            max_attempts: config.max_start_attempts.max(1),
            backoff_initial: config.backoff_initial(),
        }
    }
}

/// Spawn a child and wait for it to answer a probe.
///
/// A child that does not answer within `policy.timeout` is killed and
/// spawned again after an exponentially growing pause. After
/// `policy.max_attempts` failures this returns [`ProjectError::Startup`].
pub fn start_child<M>(
    name: &str,
    policy: &StartPolicy,
    mut spawn: impl FnMut() -> Result<ChildHandle<M>>,
    probe: impl Fn(u64) -> M,
) -> Result<ChildHandle<M>> {
    let attempts = policy.max_attempts.max(1);
    let mut backoff = policy.backoff_initial;
    for attempt in 1..=attempts {
        match spawn() {
            Ok(child) => match await_probe(child, policy.timeout, &probe) {
                Ok(child) => {
                    tracing::info!(child = name, attempt, "child is alive");
                    return Ok(child);
                }
                Err(child) => {
                    tracing::warn!(child = name, attempt, timeout = ?policy.timeout, "no probe answer, killing");
                    child.kill();
                }
            },
            Err(e) => tracing::warn!(child = name, attempt, "spawn failed: {e}"),
        }
        if attempt < attempts {
            thread::sleep(backoff);
            backoff = backoff.saturating_mul(2);
        }
    }
    Err(ProjectError::Startup {
        child: name.to_string(),
        attempts,
    })
}

fn await_probe<M>(
    child: ChildHandle<M>,
    timeout: Duration,
    probe: impl Fn(u64) -> M,
) -> std::result::Result<ChildHandle<M>, ChildHandle<M>> {
    let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
    if child.send(probe(token)).is_err() {
        return Err(child);
    }
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match child.recv_timeout(remaining) {
            Ok(Reply::ProbeAck { token: answered }) if answered == token => return Ok(child),
            Ok(other) => tracing::trace!(child = child.name(), ?other, "reply before probe answer"),
            Err(_) => return Err(child),
        }
    }
}
