//! dualstream
//!
//! Background service that keeps a continuously-available video feed per
//! camera: a supervised looping standby encoder runs alongside the live feed
//! at all times, and remote controllers switch which one is presented
//! without ever restarting a pipeline.

pub mod broadcast;
pub mod command;
pub mod daemon;
pub mod ffmpeg;
pub mod http_server;
pub mod manager;
pub mod stream;
pub mod supervisor;
pub mod tcp_server;

pub use broadcast::{Broadcaster, SubscriberId, Subscription, SUBSCRIBER_QUEUE_CAPACITY};
pub use command::{dispatch, parse_line, Command, Response};
pub use daemon::{Daemon, DaemonError};
pub use dualstream_config as config;
pub use dualstream_config::Config;
pub use ffmpeg::{build_standby_args, standby_output_dir, standby_url};
pub use http_server::{create_api_router, run_http_server};
pub use manager::StreamManager;
pub use stream::{CameraStream, Mode, StreamStatus};
pub use supervisor::ProcessSupervisor;
pub use tcp_server::{run_command_server, serve, ServerError};
