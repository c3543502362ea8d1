//! Process supervision module for dualstream
//!
//! Keeps one external encoding process alive indefinitely, restarting it on
//! crash. Each camera runs its own supervisor as an independent failure
//! domain, so one camera's crash loop cannot stall another's.

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Delay before restarting a crashed process
const CRASH_BACKOFF: Duration = Duration::from_secs(2);

/// Delay before retrying when the executable cannot be launched at all
const LAUNCH_BACKOFF: Duration = Duration::from_secs(10);

/// How long a stopping process may take to exit after SIGTERM before SIGKILL
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Bytes of trailing stderr kept for the crash diagnostic log
const DIAG_TAIL_BYTES: usize = 400;

/// Supervises one external encoding process
///
/// `start()` spawns the supervision loop; the loop respawns the process
/// forever with a fixed backoff until `stop()` is called. Crashes are never
/// fatal: a missing executable is retried at a slower cadence, everything
/// else at the crash backoff.
pub struct ProcessSupervisor {
    name: String,
    argv: Vec<String>,
    alive: Arc<AtomicBool>,
    cancel: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessSupervisor {
    /// Create a supervisor for the given argument vector
    ///
    /// `argv[0]` is the program name; the vector is fixed for the lifetime
    /// of the supervisor. `name` labels log lines.
    pub fn new(name: impl Into<String>, argv: Vec<String>) -> Self {
        Self {
            name: name.into(),
            argv,
            alive: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Begin the supervision loop
    ///
    /// A no-op if the supervisor is already running. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) {
        let mut cancel_slot = self.cancel.lock().expect("supervisor lock poisoned");
        if cancel_slot.is_some() {
            return;
        }
        let (tx, rx) = watch::channel(false);
        *cancel_slot = Some(tx);

        let handle = tokio::spawn(run_loop(
            self.name.clone(),
            self.argv.clone(),
            self.alive.clone(),
            rx,
        ));
        *self.task.lock().expect("supervisor lock poisoned") = Some(handle);
    }

    /// Request termination and wait until the supervised process is dead
    ///
    /// Sends SIGTERM, waits up to the stop timeout, then SIGKILLs. Safe to
    /// call repeatedly or when the supervisor was never started.
    pub async fn stop(&self) {
        let cancel = self.cancel.lock().expect("supervisor lock poisoned").take();
        if let Some(cancel) = cancel {
            let _ = cancel.send(true);
        }
        let task = self.task.lock().expect("supervisor lock poisoned").take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    /// Whether the last-spawned process is currently running
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// The supervision loop itself
///
/// Runs until cancelled: spawn, wait for exit or cancellation, back off,
/// repeat. The alive flag mirrors whether a spawned process is running.
async fn run_loop(
    name: String,
    argv: Vec<String>,
    alive: Arc<AtomicBool>,
    mut cancel: watch::Receiver<bool>,
) {
    let program = match argv.first() {
        Some(program) => program.clone(),
        None => return,
    };

    loop {
        if *cancel.borrow() {
            break;
        }

        info!("[{}] start: {}", name, argv.join(" "));
        let spawned = Command::new(&program)
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        match spawned {
            Ok(mut child) => {
                alive.store(true, Ordering::SeqCst);
                let tail_task = child
                    .stderr
                    .take()
                    .map(|stderr| tokio::spawn(read_tail(stderr)));

                let exit = tokio::select! {
                    status = child.wait() => Some(status),
                    _ = cancel.changed() => None,
                };

                match exit {
                    Some(status) => {
                        alive.store(false, Ordering::SeqCst);
                        let tail = match tail_task {
                            Some(handle) => handle.await.unwrap_or_default(),
                            None => String::new(),
                        };
                        match status {
                            Ok(status) => warn!("[{}] exited ({}): {}", name, status, tail),
                            Err(e) => warn!("[{}] wait failed: {}", name, e),
                        }
                    }
                    None => {
                        terminate(&name, &mut child).await;
                        alive.store(false, Ordering::SeqCst);
                        if let Some(handle) = tail_task {
                            handle.abort();
                        }
                        break;
                    }
                }

                if backoff(&mut cancel, CRASH_BACKOFF).await {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                error!("[{}] {} not found", name, program);
                if backoff(&mut cancel, LAUNCH_BACKOFF).await {
                    break;
                }
            }
            Err(e) => {
                error!("[{}] failed to launch {}: {}", name, program, e);
                if backoff(&mut cancel, CRASH_BACKOFF).await {
                    break;
                }
            }
        }
    }
}

/// Terminate a child gracefully, escalating to SIGKILL after the timeout
async fn terminate(name: &str, child: &mut Child) {
    let pid = match child.id() {
        Some(pid) => pid,
        // Already reaped
        None => return,
    };

    let _ = signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    match tokio::time::timeout(STOP_TIMEOUT, child.wait()).await {
        Ok(_) => {}
        Err(_) => {
            warn!("[{}] still running after SIGTERM, killing", name);
            if let Err(e) = child.kill().await {
                warn!("[{}] failed to kill process: {}", name, e);
            }
        }
    }
}

/// Sleep for `delay`, returning early with `true` if cancellation fires
async fn backoff(cancel: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = cancel.changed() => true,
    }
}

/// Drain a stderr pipe, keeping only the trailing diagnostic bytes
async fn read_tail<R>(mut reader: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail: Vec<u8> = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > DIAG_TAIL_BYTES {
                    tail.drain(..tail.len() - DIAG_TAIL_BYTES);
                }
            }
        }
    }
    String::from_utf8_lossy(&tail).into_owned()
}
