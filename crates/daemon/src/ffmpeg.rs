//! FFmpeg command construction for dualstream
//!
//! Builds the fixed argument vector for the standby (looping placeholder)
//! encoder of one camera. The live feed is served by the external WebRTC
//! gateway and needs no process of its own.

use dualstream_config::CameraConfig;
use std::path::{Path, PathBuf};

/// Number of playlist entries kept in the rolling HLS window
const HLS_LIST_SIZE: u32 = 3;

/// HLS muxer flags for a continuously rewritten low-latency playlist
const HLS_FLAGS: &str = "delete_segments+append_list+independent_segments+split_by_time";

/// Directory holding one camera's standby playlist and segments
pub fn standby_output_dir(camera: &CameraConfig, hls_root: &Path) -> PathBuf {
    hls_root.join(&camera.id).join("standby")
}

/// Playlist URL of one camera's standby stream, as served over HTTP
pub fn standby_url(camera_id: &str) -> String {
    format!("/hls/{}/standby/index.m3u8", camera_id)
}

/// Build the full argument vector of the standby encoder process
///
/// The first element is the program name. The clip loops forever
/// (`-stream_loop -1`) at real-time pacing (`-re`) and is encoded with a
/// fixed low-latency bitrate ladder into a segmented HLS directory tree.
pub fn build_standby_args(camera: &CameraConfig, hls_root: &Path) -> Vec<String> {
    let out_dir = standby_output_dir(camera, hls_root);
    let segment_filename = out_dir.join("seg%05d.ts");
    let playlist = out_dir.join("index.m3u8");

    let mut args: Vec<String> = [
        "ffmpeg", "-y", "-loglevel", "warning",
        "-stream_loop", "-1", "-re", "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(camera.standby_media.to_string_lossy().into_owned());

    args.extend(
        [
            "-c:v", "libx264", "-preset", "ultrafast", "-tune", "zerolatency",
            "-b:v", "800k", "-maxrate", "1000k", "-bufsize", "1000k",
            "-g", "30", "-sc_threshold", "0",
            "-c:a", "aac", "-b:a", "64k",
            "-f", "hls",
        ]
        .iter()
        .map(|s| s.to_string()),
    );

    args.push("-hls_time".to_string());
    args.push(camera.segment_duration.to_string());
    args.push("-hls_list_size".to_string());
    args.push(HLS_LIST_SIZE.to_string());
    args.push("-hls_flags".to_string());
    args.push(HLS_FLAGS.to_string());
    args.push("-hls_segment_filename".to_string());
    args.push(segment_filename.to_string_lossy().into_owned());
    args.push(playlist.to_string_lossy().into_owned());

    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Helper to check if args contain a flag with a specific value
    fn has_flag_with_value(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2)
            .any(|pair| pair[0] == flag && pair[1] == value)
    }

    fn test_camera(id: &str, segment_duration: u64) -> CameraConfig {
        CameraConfig {
            id: id.to_string(),
            name: id.to_string(),
            source_url: "rtsp://cam.local/stream1".to_string(),
            standby_media: PathBuf::from("/opt/media/loop.mp4"),
            segment_duration,
        }
    }

    #[test]
    fn test_standby_output_dir_layout() {
        let camera = test_camera("cam1", 2);
        let dir = standby_output_dir(&camera, Path::new("/tmp/hls"));
        assert_eq!(dir, PathBuf::from("/tmp/hls/cam1/standby"));
    }

    #[test]
    fn test_standby_url_shape() {
        assert_eq!(standby_url("cam1"), "/hls/cam1/standby/index.m3u8");
    }

    // Strategy for generating camera-id-like strings
    fn id_strategy() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-z][a-z0-9_-]{0,15}").unwrap()
    }

    // *For any* camera id, standby clip path, and segment duration, the built
    // argument vector SHALL contain all fixed encoder settings, the looping
    // input flags, and the derived segmented output targets.
    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_standby_command_completeness(
            id in id_strategy(),
            media in prop::string::string_regex("/[a-zA-Z0-9_/.-]{1,40}").unwrap(),
            segment_duration in 1u64..30,
        ) {
            let camera = CameraConfig {
                id: id.clone(),
                name: id.clone(),
                source_url: "rtsp://cam.local/stream1".to_string(),
                standby_media: PathBuf::from(&media),
                segment_duration,
            };

            let args = build_standby_args(&camera, Path::new("/tmp/hls"));

            // Program name
            prop_assert_eq!(&args[0], "ffmpeg");

            // Looping real-time input
            prop_assert!(has_flag_with_value(&args, "-stream_loop", "-1"));
            prop_assert!(args.iter().any(|a| a == "-re"));
            prop_assert!(has_flag_with_value(&args, "-i", &media));

            // Fixed low-latency bitrate ladder
            prop_assert!(has_flag_with_value(&args, "-c:v", "libx264"));
            prop_assert!(has_flag_with_value(&args, "-preset", "ultrafast"));
            prop_assert!(has_flag_with_value(&args, "-tune", "zerolatency"));
            prop_assert!(has_flag_with_value(&args, "-b:v", "800k"));
            prop_assert!(has_flag_with_value(&args, "-maxrate", "1000k"));
            prop_assert!(has_flag_with_value(&args, "-bufsize", "1000k"));
            prop_assert!(has_flag_with_value(&args, "-c:a", "aac"));
            prop_assert!(has_flag_with_value(&args, "-b:a", "64k"));

            // Segmented HLS output
            prop_assert!(has_flag_with_value(&args, "-f", "hls"));
            prop_assert!(has_flag_with_value(
                &args,
                "-hls_time",
                &segment_duration.to_string()
            ));
            prop_assert!(has_flag_with_value(&args, "-hls_list_size", "3"));
            prop_assert!(has_flag_with_value(&args, "-hls_flags", HLS_FLAGS));

            let expected_segments = format!("/tmp/hls/{}/standby/seg%05d.ts", id);
            prop_assert!(has_flag_with_value(
                &args,
                "-hls_segment_filename",
                &expected_segments
            ));

            let expected_playlist = format!("/tmp/hls/{}/standby/index.m3u8", id);
            prop_assert_eq!(args.last().map(String::as_str), Some(expected_playlist.as_str()));
        }
    }
}
