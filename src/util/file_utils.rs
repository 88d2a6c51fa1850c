use crate::util::chain_types::FrameJob;
use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// The path of frame number `frame` for the output prefix `prefix`.
pub fn frame_path(prefix: &str, frame: usize) -> PathBuf {
    PathBuf::from(format!("{}_{:05}.png", prefix, frame))
}

/// The input pattern, understood by ffmpeg, that matches every frame
/// written by [frame_path] for `prefix`.
pub fn frame_pattern(prefix: &str) -> String {
    format!("{}_%05d.png", prefix)
}

/// Create the directory that the frames for `prefix` are written into,
/// if it doesn't already exist.
pub fn create_frame_dir(prefix: &str) -> anyhow::Result<()> {
    let probe = frame_path(prefix, 0);
    if let Some(parent) = probe.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("could not create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Make sure the encoder `ffmpeg` can be executed before any work is
/// done that depends on it.
pub fn check_encoder(ffmpeg: &str) -> anyhow::Result<()> {
    let status = Command::new(ffmpeg)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(s) if s.success() => {
            debug!("found a working encoder at {}", ffmpeg);
            Ok(())
        }
        Ok(s) => bail!("`{} -version` failed with exit status {:#?}", ffmpeg, s),
        Err(e) => bail!(
            "could not execute the encoder {:?} ({}); is ffmpeg installed and on the PATH? \
             It can also be given explicitly with --ffmpeg.",
            ffmpeg,
            e
        ),
    }
}

/// The arguments passed to `ffmpeg` to stitch the frames matching
/// `pattern` into `movie` at `fps` frames per second.
pub fn encoder_args(pattern: &str, fps: u32, movie: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-framerate".to_string(),
        fps.to_string(),
        "-i".to_string(),
        pattern.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        // the yuv420p pixel format needs even dimensions
        "-vf".to_string(),
        "pad=ceil(iw/2)*2:ceil(ih/2)*2".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        movie.display().to_string(),
    ]
}

/// Stitch the frames matching `pattern` into `movie`.
pub fn encode_movie(ffmpeg: &str, pattern: &str, fps: u32, movie: &Path) -> anyhow::Result<()> {
    let args = encoder_args(pattern, fps, movie);
    debug!("running {} {}", ffmpeg, args.join(" "));
    let output = Command::new(ffmpeg)
        .args(&args)
        .output()
        .with_context(|| format!("could not execute the encoder {:?}", ffmpeg))?;
    if !output.status.success() {
        bail!(
            "`{}` failed with exit status {:#?}: {}",
            ffmpeg,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Remove the frame images once they have been encoded. Failure to
/// remove a frame is not fatal.
pub fn remove_frames(jobs: &[FrameJob]) -> usize {
    let mut removed = 0_usize;
    for job in jobs {
        match std::fs::remove_file(&job.path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("could not remove {}: {}", job.path.display(), e),
        }
    }
    removed
}
