//! Datamosh is a byte-level glitch tool for video.
//!
//! It asks `ffmpeg` for an MPEG-4-in-AVI intermediate, splits that stream on the `00dc`
//! frame chunk id without parsing the container, and rewrites the frame sequence so a
//! decoder keeps smearing stale motion vectors across the picture.
//!
//! # Pipeline overview
//!
//! 1. **Decode**: source video -> AVI bytes at a fixed frame rate and trim ([`Transcoder::decode`])
//! 2. **Scan**: AVI bytes -> [`Frame`]s classified as keyframe or delta ([`scan()`])
//! 3. **Mosh**: inside the [`EffectWindow`], drop keyframes and repeat delta frames ([`transform`])
//! 4. **Encode**: re-joined bytes -> playable output ([`Transcoder::encode`])
//!
//! Steps 2 and 3 are pure and never alter bytes within a kept frame. [`run_mosh`] wires
//! all four together and validates options before any external tool runs.
#![forbid(unsafe_code)]

mod foundation;
mod mosh;
mod pipeline;
mod scan;
mod timeline;
mod transcode;

pub use foundation::core::Fps;
pub use foundation::error::{MoshError, MoshResult};
pub use mosh::{KeyframeGate, MoshStats, Mosher, OutFrame, join, mosh_bytes, transform};
pub use pipeline::{DEFAULT_REPEAT_P_FRAMES, MoshOpts, MoshReport, run_mosh};
pub use scan::{
    FRAME_TERMINATOR, Frame, FrameKind, KEYFRAME_MARKER, KEYFRAME_MARKER_OFFSET, Markers, scan,
};
pub use timeline::{EffectTimes, EffectWindow, Region, compute_window};
pub use transcode::{
    DecodeRequest, EncodeRequest, FfmpegTranscoder, Transcoder, decode_args, encode_args,
    ensure_parent_dir, fps_from_probe_json, is_ffmpeg_on_path, is_ffprobe_on_path,
};
