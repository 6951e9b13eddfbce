use std::{
    ffi::OsString,
    io::Write as _,
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use crate::foundation::{
    core::Fps,
    error::{MoshError, MoshResult},
};

/// Source video to intermediate AVI, trimmed and resampled.
#[derive(Clone, Debug)]
pub struct DecodeRequest<'a> {
    pub input: &'a Path,
    pub fps: Fps,
    pub trim_start_sec: f64,
    pub trim_end_sec: Option<f64>,
}

/// Moshed AVI back to a playable file.
#[derive(Clone, Debug)]
pub struct EncodeRequest<'a> {
    pub output: &'a Path,
    pub fps: Fps,
    /// `0` keeps the source width.
    pub output_width: u32,
}

/// The external tools a mosh run depends on.
pub trait Transcoder {
    fn probe_fps(&mut self, input: &Path) -> MoshResult<Fps>;

    fn decode(&mut self, req: &DecodeRequest<'_>) -> MoshResult<Vec<u8>>;

    fn encode(&mut self, avi: &[u8], req: &EncodeRequest<'_>) -> MoshResult<()>;
}

pub fn is_ffmpeg_on_path() -> bool {
    tool_runs("ffmpeg")
}

pub fn is_ffprobe_on_path() -> bool {
    tool_runs("ffprobe")
}

fn tool_runs(program: &str) -> bool {
    Command::new(program)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn ensure_parent_dir(path: &Path) -> MoshResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Runs the system `ffmpeg` and `ffprobe` binaries.
#[derive(Clone, Debug)]
pub struct FfmpegTranscoder {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for FfmpegTranscoder {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn probe_fps(&mut self, input: &Path) -> MoshResult<Fps> {
        let mut cmd = Command::new(&self.ffprobe);
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(input);
        tracing::debug!(?cmd, "probing frame rate");

        let out = cmd
            .output()
            .map_err(|e| MoshError::collaborator("ffprobe", format!("failed to run: {e}")))?;
        if !out.status.success() {
            return Err(MoshError::collaborator(
                "ffprobe",
                String::from_utf8_lossy(&out.stderr).trim(),
            ));
        }
        fps_from_probe_json(&out.stdout)
    }

    fn decode(&mut self, req: &DecodeRequest<'_>) -> MoshResult<Vec<u8>> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(decode_args(req))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        tracing::debug!(?cmd, "decoding to avi");

        let out = cmd.output().map_err(|e| {
            MoshError::collaborator(
                "ffmpeg decode",
                format!("failed to spawn ffmpeg (is it installed and on PATH?): {e}"),
            )
        })?;
        if !out.status.success() {
            return Err(MoshError::collaborator(
                "ffmpeg decode",
                String::from_utf8_lossy(&out.stderr).trim(),
            ));
        }
        Ok(out.stdout)
    }

    fn encode(&mut self, avi: &[u8], req: &EncodeRequest<'_>) -> MoshResult<()> {
        ensure_parent_dir(req.output)?;

        // ffmpeg writes a sibling file that only replaces the output once it exited cleanly.
        let staging = staging_path(req.output);
        let staged = EncodeRequest {
            output: &staging,
            ..req.clone()
        };
        let res = self.encode_to(avi, &staged).and_then(|()| {
            use anyhow::Context as _;
            std::fs::rename(&staging, req.output).with_context(|| {
                format!(
                    "failed to move '{}' to '{}'",
                    staging.display(),
                    req.output.display()
                )
            })?;
            Ok(())
        });
        if res.is_err() {
            let _ = std::fs::remove_file(&staging);
        }
        res
    }
}

impl FfmpegTranscoder {
    fn encode_to(&self, avi: &[u8], req: &EncodeRequest<'_>) -> MoshResult<()> {
        let mut cmd = Command::new(&self.ffmpeg);
        cmd.args(encode_args(req))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        tracing::debug!(?cmd, bytes = avi.len(), "encoding moshed avi");

        let mut child = cmd.spawn().map_err(|e| {
            MoshError::collaborator(
                "ffmpeg encode",
                format!("failed to spawn ffmpeg (is it installed and on PATH?): {e}"),
            )
        })?;
        let mut stdin = child.stdin.take().ok_or_else(|| {
            MoshError::collaborator("ffmpeg encode", "failed to open ffmpeg stdin (unexpected)")
        })?;

        // ffmpeg may stop reading early on error; stderr must be drained concurrently
        // or a large buffer deadlocks against a full pipe.
        let (write_res, output) = std::thread::scope(|s| {
            let writer = s.spawn(move || stdin.write_all(avi));
            let output = child.wait_with_output();
            let write_res = writer.join();
            (write_res, output)
        });

        let output = output.map_err(|e| {
            MoshError::collaborator("ffmpeg encode", format!("failed to wait for ffmpeg: {e}"))
        })?;
        if !output.status.success() {
            return Err(MoshError::collaborator(
                "ffmpeg encode",
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        match write_res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(MoshError::collaborator(
                "ffmpeg encode",
                format!("failed to write avi to ffmpeg stdin: {e}"),
            )),
            Err(_) => Err(MoshError::collaborator(
                "ffmpeg encode",
                "stdin writer thread panicked",
            )),
        }
    }
}

/// Arguments (excluding the program) for the decode step.
pub fn decode_args(req: &DecodeRequest<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-loglevel", "error", "-xerror", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(req.input.as_os_str().to_owned());
    args.extend(
        [
            "-an".to_string(),
            "-c:v".to_string(),
            "mpeg4".to_string(),
            "-q:v".to_string(),
            "1".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-r".to_string(),
            req.fps.to_string(),
            "-ss".to_string(),
            secs_arg(req.trim_start_sec),
        ]
        .into_iter()
        .map(OsString::from),
    );
    if let Some(end) = req.trim_end_sec {
        args.push("-to".into());
        args.push(secs_arg(end).into());
    }
    args.extend(["-f", "avi", "pipe:1"].into_iter().map(OsString::from));
    args
}

/// Arguments (excluding the program) for the encode step.
pub fn encode_args(req: &EncodeRequest<'_>) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-loglevel",
        "error",
        "-xerror",
        "-y",
        "-f",
        "avi",
        "-i",
        "pipe:0",
        "-r",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(req.fps.to_string().into());
    if req.output_width > 0 {
        args.push("-vf".into());
        args.push(format!("scale={}:-2:flags=lanczos", req.output_width).into());
    }
    args.push(req.output.as_os_str().to_owned());
    args
}

/// `dir/.name.partial.ext` next to `output`, keeping the extension ffmpeg picks the muxer from.
fn staging_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut name = format!(".{stem}.partial");
    if let Some(ext) = output.extension() {
        name.push('.');
        name.push_str(&ext.to_string_lossy());
    }
    output.with_file_name(name)
}

fn secs_arg(secs: f64) -> String {
    format!("{secs:.6}")
}

/// Frame rate of the first video stream in `ffprobe -print_format json -show_streams` output.
pub fn fps_from_probe_json(json: &[u8]) -> MoshResult<Fps> {
    #[derive(serde::Deserialize)]
    struct ProbeStream {
        codec_type: Option<String>,
        r_frame_rate: Option<String>,
    }
    #[derive(serde::Deserialize)]
    struct ProbeOut {
        #[serde(default)]
        streams: Vec<ProbeStream>,
    }

    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| MoshError::collaborator("ffprobe", format!("json parse failed: {e}")))?;
    let video = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MoshError::collaborator("ffprobe", "no video stream found"))?;
    let rate = video.r_frame_rate.as_deref().unwrap_or("0/1");
    Fps::parse_ratio(rate).ok_or_else(|| {
        MoshError::collaborator("ffprobe", format!("invalid video r_frame_rate '{rate}'"))
    })
}
