use crate::services::Camera;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

const STOP_GRACE: Duration = Duration::from_secs(3);
const STOP_POLL: Duration = Duration::from_millis(50);
// A snapshot older than this means the recorder stopped refreshing it.
const FRAME_MAX_AGE: Duration = Duration::from_secs(5);

/// Replaced with the clip or image path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";
/// Replaced with the overlay text file the recorder draws.
pub const OVERLAY_PLACEHOLDER: &str = "{overlay}";
/// Replaced with the snapshot file the recorder keeps refreshing.
pub const FRAME_PLACEHOLDER: &str = "{frame}";

/// Files shared between the controller and the recorder pipeline.
#[derive(Debug, Clone)]
pub struct CameraFiles {
    pub overlay: PathBuf,
    pub frame: PathBuf,
}

/// Camera driven through external recorder and still-capture programs.
///
/// Recording runs as a child process that is interrupted with SIGINT to close
/// the file cleanly. A split is a stop followed by a start.
///
/// Both command lines are templates. `{output}` takes the clip or image path
/// (`-o <path>` is appended when it is missing). A recorder that reads
/// `{overlay}` draws the annotation text. A recorder that writes `{frame}`
/// lets stills be taken while it owns the camera.
pub struct CommandCamera {
    record_cmd: Vec<String>,
    still_cmd: Vec<String>,
    files: CameraFiles,
    child: Option<Child>,
}

impl CommandCamera {
    /// Fails when either program cannot be found, so a missing camera stack aborts startup.
    pub fn new(record_cmd: &str, still_cmd: &str, files: CameraFiles) -> Result<Self> {
        let record_cmd = split_command(record_cmd, "--camera-cmd")?;
        let still_cmd = split_command(still_cmd, "--still-cmd")?;
        for argv in [&record_cmd, &still_cmd] {
            if let Some(program) = argv.first() {
                find_program(program)?;
            }
        }
        Ok(Self {
            record_cmd,
            still_cmd,
            files,
            child: None,
        })
    }

    /// Whether the recorder draws the overlay file.
    pub fn draws_overlay(&self) -> bool {
        uses_placeholder(&self.record_cmd, OVERLAY_PLACEHOLDER)
    }

    /// Whether the recorder keeps a frame snapshot for stills.
    pub fn grabs_frames(&self) -> bool {
        uses_placeholder(&self.record_cmd, FRAME_PLACEHOLDER)
    }

    fn spawn_recorder(&mut self, path: &Path) -> Result<()> {
        // The overlay reader fails to start on a missing file.
        if self.draws_overlay() && !self.files.overlay.exists() {
            write_atomic(&self.files.overlay, "")?;
        }
        if self.grabs_frames() {
            let _ = fs::remove_file(&self.files.frame);
        }
        let argv = expand_command(&self.record_cmd, path, &self.files);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("recorder command is empty"))?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("failed to start recorder for {}", path.display()))?;
        self.child = Some(child);
        Ok(())
    }

    fn stop_child(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        interrupt(child.id());
        let deadline = Instant::now() + STOP_GRACE;
        loop {
            match child.try_wait() {
                Ok(Some(_status)) => return Ok(()),
                Ok(None) if Instant::now() < deadline => thread::sleep(STOP_POLL),
                Ok(None) => {
                    warn!(pid = child.id(), "recorder ignored SIGINT; killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(());
                }
                Err(err) => return Err(anyhow!("recorder wait failed: {err}")),
            }
        }
    }
}

impl Camera for CommandCamera {
    fn start_recording(&mut self, path: &Path) -> Result<()> {
        if self.child.is_some() {
            bail!("recorder already running");
        }
        self.spawn_recorder(path)
    }

    fn stop_recording(&mut self) -> Result<()> {
        if self.child.is_none() {
            bail!("recorder is not running");
        }
        self.stop_child()
    }

    fn split_recording(&mut self, path: &Path) -> Result<()> {
        self.stop_child()?;
        self.spawn_recorder(path)
    }

    fn capture(&mut self, path: &Path) -> Result<()> {
        if self.child.is_some() {
            return self.copy_frame(path);
        }
        let argv = expand_command(&self.still_cmd, path, &self.files);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("still command is empty"))?;
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("failed to run still capture for {}", path.display()))?;
        if !status.success() {
            bail!("still capture exited with {status}");
        }
        Ok(())
    }

    fn annotate(&mut self, text: &str) -> Result<()> {
        write_atomic(&self.files.overlay, text)
    }

    fn release(&mut self) {
        if let Err(err) = self.stop_child() {
            warn!(error = %err, "recorder did not stop cleanly");
        }
    }
}

impl CommandCamera {
    /// The recorder owns the camera, so a still is its latest snapshot.
    fn copy_frame(&self, path: &Path) -> Result<()> {
        if !self.grabs_frames() {
            bail!("recorder holds the camera and --camera-cmd writes no {FRAME_PLACEHOLDER} snapshot");
        }
        let frame = &self.files.frame;
        let modified = fs::metadata(frame)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("no frame snapshot at {}", frame.display()))?;
        let age = modified.elapsed().unwrap_or_default();
        if age > FRAME_MAX_AGE {
            bail!("frame snapshot {} is {}s old", frame.display(), age.as_secs());
        }
        fs::copy(frame, path)
            .with_context(|| format!("failed to copy {} to {}", frame.display(), path.display()))?;
        Ok(())
    }
}

impl Drop for CommandCamera {
    fn drop(&mut self) {
        self.release();
    }
}

fn split_command(value: &str, flag: &str) -> Result<Vec<String>> {
    let words =
        shell_words::split(value).with_context(|| format!("failed to parse {flag} '{value}'"))?;
    if words.is_empty() {
        bail!("{flag} cannot be empty");
    }
    Ok(words)
}

fn uses_placeholder(argv: &[String], placeholder: &str) -> bool {
    argv.iter().any(|word| word.contains(placeholder))
}

/// Substitute the placeholders; without `{output}` the path goes last as `-o <path>`.
fn expand_command(template: &[String], output: &Path, files: &CameraFiles) -> Vec<String> {
    let output_text = output.to_string_lossy();
    let overlay_text = files.overlay.to_string_lossy();
    let frame_text = files.frame.to_string_lossy();
    let mut argv: Vec<String> = template
        .iter()
        .map(|word| {
            word.replace(OUTPUT_PLACEHOLDER, &output_text)
                .replace(OVERLAY_PLACEHOLDER, &overlay_text)
                .replace(FRAME_PLACEHOLDER, &frame_text)
        })
        .collect();
    if !uses_placeholder(template, OUTPUT_PLACEHOLDER) {
        argv.push("-o".to_string());
        argv.push(output_text.into_owned());
    }
    argv
}

fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, text).with_context(|| format!("failed to write overlay {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace overlay {}", path.display()))
}

/// Resolve a program name against `PATH`, or check an explicit path.
pub(crate) fn find_program(program: &str) -> Result<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }
        bail!("program '{program}' not found");
    }
    let path = env::var_os("PATH").unwrap_or_default();
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
        .ok_or_else(|| anyhow!("program '{program}' not found on PATH"))
}

fn interrupt(pid: u32) {
    #[cfg(unix)]
    unsafe {
        if libc::kill(pid as i32, libc::SIGINT) != 0 {
            warn!(pid, error = %io::Error::last_os_error(), "failed to signal recorder");
        }
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        warn!("recorder interrupt unsupported on this platform");
    }
}

#[cfg(test)]
mod template_tests {
    use super::*;

    fn files() -> CameraFiles {
        CameraFiles {
            overlay: PathBuf::from("/cam/overlay.txt"),
            frame: PathBuf::from("/cam/frame.jpg"),
        }
    }

    fn words(cmd: &str) -> Vec<String> {
        shell_words::split(cmd).unwrap()
    }

    #[test]
    fn placeholders_are_substituted_in_place() {
        let argv = expand_command(
            &words("ffmpeg -vf drawtext=textfile={overlay}:reload=1 {output} -update 1 {frame}"),
            Path::new("/cam/vid_a.h264"),
            &files(),
        );
        assert_eq!(
            argv,
            words("ffmpeg -vf drawtext=textfile=/cam/overlay.txt:reload=1 /cam/vid_a.h264 -update 1 /cam/frame.jpg")
        );
    }

    #[test]
    fn output_flag_is_appended_without_placeholder() {
        let argv = expand_command(
            &words("rpicam-vid -t 0"),
            Path::new("/cam/vid_a.h264"),
            &files(),
        );
        assert_eq!(argv, words("rpicam-vid -t 0 -o /cam/vid_a.h264"));
    }
}
