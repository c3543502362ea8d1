//! Per-camera bundle for dualstream
//!
//! Couples the mode state machine with the supervised standby encoder and
//! the subscriber fan-out. Both media pipelines run at all times; the mode
//! only selects which one the frontend presents, so switching never
//! restarts a process.

use crate::broadcast::{Broadcaster, SubscriberId, Subscription};
use crate::ffmpeg;
use crate::supervisor::ProcessSupervisor;
use dualstream_config::CameraConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

/// Presentation state of a camera's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Standby,
    Live,
}

impl Mode {
    /// The opposite mode
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Standby => Mode::Live,
            Mode::Live => Mode::Standby,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Standby => "standby",
            Mode::Live => "live",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one camera's current presentation state
///
/// Fully derivable from the bundle at any time; carries no history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamStatus {
    pub id: String,
    pub name: String,
    pub mode: Mode,
    /// Playlist URL of the looping standby stream
    pub standby_url: String,
    /// Stream name on the external WebRTC gateway serving the live feed
    pub webrtc_src: String,
    /// Whether the standby encoder process is currently running
    pub standby_ok: bool,
}

/// One camera's bundle of mode, supervisor, and subscriber set
pub struct CameraStream {
    id: String,
    name: String,
    mode: Mutex<Mode>,
    supervisor: ProcessSupervisor,
    broadcaster: Broadcaster,
    standby_dir: PathBuf,
}

impl CameraStream {
    /// Build the bundle for one configured camera
    ///
    /// Cameras start in standby. Nothing is spawned until `start()`.
    pub fn new(camera: &CameraConfig, hls_root: &Path) -> Self {
        let argv = ffmpeg::build_standby_args(camera, hls_root);
        Self {
            id: camera.id.clone(),
            name: camera.name.clone(),
            mode: Mutex::new(Mode::Standby),
            supervisor: ProcessSupervisor::new(format!("{}/standby", camera.id), argv),
            broadcaster: Broadcaster::new(),
            standby_dir: ffmpeg::standby_output_dir(camera, hls_root),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start the supervised standby encoder
    ///
    /// A failure to create the output directory is logged but does not keep
    /// the supervisor from starting; the encoder's restart loop absorbs it.
    pub fn start(&self) {
        if let Err(e) = std::fs::create_dir_all(&self.standby_dir) {
            error!(
                "[{}] failed to create {}: {}",
                self.id,
                self.standby_dir.display(),
                e
            );
        }
        self.supervisor.start();
        info!("[{}] standby worker started (live feed via WebRTC gateway)", self.id);
    }

    /// Stop the standby encoder and wait for the process to die
    pub async fn stop(&self) {
        self.supervisor.stop().await;
    }

    /// Current mode snapshot
    pub fn mode(&self) -> Mode {
        *self.mode.lock().expect("mode lock poisoned")
    }

    pub fn set_live(&self) {
        self.transition(Mode::Live);
    }

    pub fn set_standby(&self) {
        self.transition(Mode::Standby);
    }

    /// Flip the mode unconditionally, notifying subscribers
    pub fn toggle(&self) {
        let mut mode = self.mode.lock().expect("mode lock poisoned");
        *mode = mode.toggled();
        info!("[{}] -> {}", self.id, *mode);
        self.notify(*mode);
    }

    /// Move to `next`; a transition to the current mode is a silent no-op
    fn transition(&self, next: Mode) {
        let mut mode = self.mode.lock().expect("mode lock poisoned");
        if *mode != next {
            *mode = next;
            info!("[{}] -> {}", self.id, next);
            self.notify(next);
        }
    }

    /// Current status snapshot
    pub fn status(&self) -> StreamStatus {
        self.view(self.mode())
    }

    /// Register a subscriber for mode-change notifications
    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    /// Remove a subscriber; safe when already removed
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.broadcaster.unsubscribe(id);
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    /// Status for a known mode, without re-locking
    fn view(&self, mode: Mode) -> StreamStatus {
        StreamStatus {
            id: self.id.clone(),
            name: self.name.clone(),
            mode,
            standby_url: ffmpeg::standby_url(&self.id),
            webrtc_src: self.id.clone(),
            standby_ok: self.supervisor.alive(),
        }
    }

    /// Serialize the status once and fan it out
    fn notify(&self, mode: Mode) {
        match serde_json::to_string(&self.view(mode)) {
            Ok(payload) => self.broadcaster.broadcast(&payload),
            Err(e) => error!("[{}] failed to serialize status: {}", self.id, e),
        }
    }
}
