//! Stream registry for dualstream
//!
//! Owns the per-camera bundles in configuration declaration order and is the
//! only place bundles are created or destroyed. Bundles are built once at
//! startup and live until shutdown.

use crate::stream::{CameraStream, StreamStatus};
use dualstream_config::Config;
use std::sync::Arc;
use tracing::info;

/// Registry of all configured camera bundles
pub struct StreamManager {
    streams: Vec<Arc<CameraStream>>,
}

impl StreamManager {
    /// Build one bundle per configured camera, preserving declaration order
    pub fn new(config: &Config) -> Self {
        let streams = config
            .cameras
            .iter()
            .map(|camera| Arc::new(CameraStream::new(camera, &config.server.hls_root)))
            .collect();
        Self { streams }
    }

    /// Start every bundle's supervised encoder, in registration order
    pub fn start_all(&self) {
        for stream in &self.streams {
            stream.start();
        }
        info!("started {} camera stream(s)", self.streams.len());
    }

    /// Stop every bundle, waiting until each supervised process is dead
    pub async fn stop_all(&self) {
        for stream in &self.streams {
            stream.stop().await;
        }
        info!("stopped all camera streams");
    }

    /// Look up a bundle by camera id
    pub fn get(&self, id: &str) -> Option<Arc<CameraStream>> {
        self.streams.iter().find(|s| s.id() == id).cloned()
    }

    /// All bundles, in registration order
    pub fn streams(&self) -> &[Arc<CameraStream>] {
        &self.streams
    }

    /// Status of every camera, in registration order
    pub fn all_status(&self) -> Vec<StreamStatus> {
        self.streams.iter().map(|s| s.status()).collect()
    }
}
