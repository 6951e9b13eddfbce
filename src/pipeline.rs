use std::path::PathBuf;

use crate::{
    foundation::{
        core::Fps,
        error::{MoshError, MoshResult},
    },
    mosh::{MoshStats, mosh_bytes},
    scan::Markers,
    timeline::{EffectTimes, EffectWindow},
    transcode::{DecodeRequest, EncodeRequest, Transcoder},
};

pub const DEFAULT_REPEAT_P_FRAMES: usize = 15;

/// Everything one mosh run needs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MoshOpts {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Effect start, in seconds of the original (untrimmed) footage.
    pub start_effect_sec: f64,
    /// Effect end, in seconds of the original (untrimmed) footage.
    pub end_effect_sec: f64,
    pub trim_start_sec: f64,
    /// `None` runs to the end of the source.
    pub trim_end_sec: Option<f64>,
    /// Copies of each delta frame inside the window; `0` drops them.
    pub repeat_p_frames: usize,
    /// `None` probes the source.
    pub fps: Option<u32>,
    /// `0` keeps the source width.
    pub output_width: u32,
}

impl MoshOpts {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        start_effect_sec: f64,
        end_effect_sec: f64,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            start_effect_sec,
            end_effect_sec,
            trim_start_sec: 0.0,
            trim_end_sec: None,
            repeat_p_frames: DEFAULT_REPEAT_P_FRAMES,
            fps: None,
            output_width: 0,
        }
    }

    pub fn effect_times(&self) -> EffectTimes {
        EffectTimes {
            start_effect_sec: self.start_effect_sec,
            end_effect_sec: self.end_effect_sec,
            trim_start_sec: self.trim_start_sec,
        }
    }

    /// Checks every option that can be checked without touching the input.
    pub fn validate(&self) -> MoshResult<()> {
        self.effect_times().rebase()?;

        if self.trim_start_sec < 0.0 {
            return Err(MoshError::configuration(format!(
                "trim start must be >= 0 (got {}s)",
                self.trim_start_sec
            )));
        }
        if let Some(end) = self.trim_end_sec
            && (!end.is_finite() || end <= self.trim_start_sec)
        {
            return Err(MoshError::configuration(format!(
                "trim end ({end}s) must be after trim start ({}s)",
                self.trim_start_sec
            )));
        }
        if let Some(fps) = self.fps {
            Fps::new(fps)?;
        }
        Ok(())
    }
}

/// What a run did, for `--stats` and logs.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MoshReport {
    pub opts: MoshOpts,
    pub fps: Fps,
    pub window: EffectWindow,
    pub stats: MoshStats,
}

/// Decode, mosh and re-encode `opts.input` into `opts.output`.
///
/// Options are validated before any tool runs. The output file is written only by the
/// final encode, after the whole stream has been transformed.
#[tracing::instrument(skip(opts, tx), fields(input = %opts.input.display(), output = %opts.output.display()))]
pub fn run_mosh(opts: &MoshOpts, tx: &mut dyn Transcoder) -> MoshResult<MoshReport> {
    opts.validate()?;

    let fps = match opts.fps {
        Some(fps) => Fps::new(fps)?,
        None => {
            let fps = tx.probe_fps(&opts.input)?;
            tracing::info!(%fps, "probed source frame rate");
            fps
        }
    };
    let window = opts.effect_times().window(fps)?;
    tracing::info!(
        start = window.start,
        end = window.end,
        frames = window.len_frames(),
        repeat = opts.repeat_p_frames,
        "effect window"
    );

    let avi = tx.decode(&DecodeRequest {
        input: &opts.input,
        fps,
        trim_start_sec: opts.trim_start_sec,
        trim_end_sec: opts.trim_end_sec,
    })?;
    tracing::debug!(bytes = avi.len(), "decoded intermediate avi");

    let (moshed, stats) = mosh_bytes(&avi, &Markers::default(), &window, opts.repeat_p_frames);
    drop(avi);
    if stats.gate_opened_at.is_none() {
        tracing::warn!("no keyframe found in the decoded stream; output is unmoshed");
    }
    tracing::info!(
        frames_in = stats.input_frames,
        frames_out = stats.output_frames,
        keyframes_dropped = stats.keyframes_dropped,
        deltas_repeated = stats.deltas_repeated,
        "moshed frame stream"
    );

    tx.encode(
        &moshed,
        &EncodeRequest {
            output: &opts.output,
            fps,
            output_width: opts.output_width,
        },
    )?;
    tracing::info!(output = %opts.output.display(), "wrote moshed video");

    Ok(MoshReport {
        opts: opts.clone(),
        fps,
        window,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::scan::FRAME_TERMINATOR;

    #[derive(Default)]
    struct FakeTranscoder {
        calls: Vec<&'static str>,
        probed_fps: u32,
        avi: Vec<u8>,
        decoded_with: Option<(u32, f64, Option<f64>)>,
        encoded: Option<(Vec<u8>, PathBuf, u32, u32)>,
        fail_decode: bool,
    }

    impl Transcoder for FakeTranscoder {
        fn probe_fps(&mut self, _input: &Path) -> MoshResult<Fps> {
            self.calls.push("probe");
            Fps::new(self.probed_fps)
        }

        fn decode(&mut self, req: &DecodeRequest<'_>) -> MoshResult<Vec<u8>> {
            self.calls.push("decode");
            if self.fail_decode {
                return Err(MoshError::collaborator("ffmpeg decode", "moov atom not found"));
            }
            self.decoded_with = Some((req.fps.get(), req.trim_start_sec, req.trim_end_sec));
            Ok(self.avi.clone())
        }

        fn encode(&mut self, avi: &[u8], req: &EncodeRequest<'_>) -> MoshResult<()> {
            self.calls.push("encode");
            self.encoded = Some((
                avi.to_vec(),
                req.output.to_path_buf(),
                req.fps.get(),
                req.output_width,
            ));
            Ok(())
        }
    }

    fn key(tag: u8) -> Vec<u8> {
        vec![tag, 0, 0, 0, 0, 0x00, 0x01, 0xB0, tag]
    }

    fn delta(tag: u8) -> Vec<u8> {
        vec![tag, 0, 0, 0, 0, 0x00, 0x01, 0xB6, tag]
    }

    fn stream(parts: &[Vec<u8>]) -> Vec<u8> {
        parts
            .iter()
            .flat_map(|p| [p.as_slice(), &FRAME_TERMINATOR[..]].concat())
            .collect()
    }

    #[test]
    fn inverted_window_fails_before_any_tool_runs() {
        let mut tx = FakeTranscoder {
            probed_fps: 30,
            ..FakeTranscoder::default()
        };
        let opts = MoshOpts::new("in.mp4", "out.mp4", 5.0, 2.0);
        let err = run_mosh(&opts, &mut tx).unwrap_err();
        assert!(err.is_configuration());
        assert!(tx.calls.is_empty());
    }

    #[test]
    fn bad_trim_and_fps_are_configuration_errors() {
        let mut opts = MoshOpts::new("in.mp4", "out.mp4", 1.0, 2.0);
        opts.trim_start_sec = -1.0;
        assert!(opts.validate().unwrap_err().is_configuration());

        let mut opts = MoshOpts::new("in.mp4", "out.mp4", 1.0, 2.0);
        opts.trim_start_sec = 3.0;
        opts.trim_end_sec = Some(3.0);
        assert!(opts.validate().unwrap_err().is_configuration());

        let mut opts = MoshOpts::new("in.mp4", "out.mp4", 1.0, 2.0);
        opts.fps = Some(0);
        assert!(opts.validate().unwrap_err().is_configuration());
    }

    #[test]
    fn probes_decodes_moshes_and_encodes_in_order() {
        let mut tx = FakeTranscoder {
            probed_fps: 1,
            avi: stream(&[delta(0), key(1), delta(2), delta(3), key(4)]),
            ..FakeTranscoder::default()
        };
        let mut opts = MoshOpts::new("in.mp4", "out/moshed.mp4", 2.0, 3.0);
        opts.repeat_p_frames = 2;
        opts.output_width = 480;

        let report = run_mosh(&opts, &mut tx).unwrap();

        assert_eq!(tx.calls, vec!["probe", "decode", "encode"]);
        assert_eq!(tx.decoded_with, Some((1, 0.0, None)));
        let (bytes, out, fps, width) = tx.encoded.unwrap();
        assert_eq!(
            bytes,
            stream(&[delta(0), key(1), delta(2), delta(2), delta(3), delta(3), key(4)])
        );
        assert_eq!(out, PathBuf::from("out/moshed.mp4"));
        assert_eq!((fps, width), (1, 480));

        assert_eq!(report.fps.get(), 1);
        assert_eq!((report.window.start, report.window.end), (2, 3));
        assert_eq!(report.stats.deltas_repeated, 2);
        assert_eq!(report.stats.gate_opened_at, Some(1));
    }

    #[test]
    fn explicit_fps_skips_probe_and_trim_is_forwarded() {
        let mut tx = FakeTranscoder {
            avi: stream(&[key(1)]),
            ..FakeTranscoder::default()
        };
        let mut opts = MoshOpts::new("in.mp4", "out.mp4", 12.0, 13.0);
        opts.fps = Some(24);
        opts.trim_start_sec = 10.0;
        opts.trim_end_sec = Some(20.0);

        let report = run_mosh(&opts, &mut tx).unwrap();
        assert_eq!(tx.calls, vec!["decode", "encode"]);
        assert_eq!(tx.decoded_with, Some((24, 10.0, Some(20.0))));
        assert_eq!((report.window.start, report.window.end), (48, 72));
    }

    #[test]
    fn collaborator_failure_aborts_without_encoding() {
        let mut tx = FakeTranscoder {
            fail_decode: true,
            ..FakeTranscoder::default()
        };
        let mut opts = MoshOpts::new("in.mp4", "out.mp4", 0.0, 1.0);
        opts.fps = Some(30);

        let err = run_mosh(&opts, &mut tx).unwrap_err();
        assert!(err.to_string().contains("moov atom not found"));
        assert_eq!(tx.calls, vec!["decode"]);
        assert!(tx.encoded.is_none());
    }

    #[test]
    fn report_serializes_to_json() {
        let mut tx = FakeTranscoder {
            probed_fps: 25,
            avi: stream(&[key(1), delta(2)]),
            ..FakeTranscoder::default()
        };
        let opts = MoshOpts::new("in.mp4", "out.mp4", 0.0, 1.0);
        let report = run_mosh(&opts, &mut tx).unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["fps"], 25);
        assert_eq!(json["opts"]["repeat_p_frames"], 15);
        assert_eq!(json["stats"]["input_frames"], 3);

        let back: MoshReport = serde_json::from_value(json).unwrap();
        assert_eq!(back, report);
    }
}
