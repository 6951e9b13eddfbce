use std::{path::PathBuf, process::ExitCode};

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "datamosh", version, allow_negative_numbers = true)]
/// Drop keyframes and repeat delta frames inside a time window of a video.
struct Cli {
    /// Time the effect starts, in seconds of the original footage.
    #[arg(value_name = "START_EFFECT_SEC")]
    start_effect_sec: f64,

    /// Time the effect ends, in seconds of the original footage.
    #[arg(value_name = "END_EFFECT_SEC")]
    end_effect_sec: f64,

    /// Source video.
    input: PathBuf,

    /// Output video (container picked by ffmpeg from the extension).
    output: PathBuf,

    /// Trim the source to start here (seconds of the original footage).
    #[arg(long, default_value_t = 0.0)]
    start_sec: f64,

    /// Trim the source to end here. Default is the end of the video.
    #[arg(long)]
    end_sec: Option<f64>,

    /// Copies of each delta frame inside the window. 0 leaves only keyframes outside it.
    #[arg(long, default_value_t = datamosh::DEFAULT_REPEAT_P_FRAMES)]
    repeat_p_frames: usize,

    /// Width of the output in pixels (480 is Twitter-friendly). 0 keeps the source width.
    #[arg(long, default_value_t = 0)]
    output_width: u32,

    /// Frame rate of the intermediate stream. Default is the source frame rate.
    #[arg(long)]
    fps: Option<u32>,

    /// Print a JSON report of the run to stdout.
    #[arg(long)]
    stats: bool,

    /// Log every stage, including the ffmpeg command lines.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let configuration = err
                .downcast_ref::<datamosh::MoshError>()
                .is_some_and(datamosh::MoshError::is_configuration);
            ExitCode::from(if configuration { 1 } else { 2 })
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let opts = datamosh::MoshOpts {
        input: cli.input,
        output: cli.output,
        start_effect_sec: cli.start_effect_sec,
        end_effect_sec: cli.end_effect_sec,
        trim_start_sec: cli.start_sec,
        trim_end_sec: cli.end_sec,
        repeat_p_frames: cli.repeat_p_frames,
        fps: cli.fps,
        output_width: cli.output_width,
    };

    let mut tx = datamosh::FfmpegTranscoder::default();
    let report = datamosh::run_mosh(&opts, &mut tx)?;

    if cli.stats {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
