use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use crate::exec::{RasterExecutor, RasterJob, RasterOp};
use crate::foundation::error::{RenderError, RenderResult};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Executor that shells out to the ImageMagick 7 `magick` binary, one process per job.
#[derive(Clone, Debug)]
pub struct MagickExecutor {
    bin: PathBuf,
    timeout: Option<Duration>,
}

impl Default for MagickExecutor {
    fn default() -> Self {
        Self::new("magick")
    }
}

impl MagickExecutor {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self {
            bin: bin.into(),
            timeout: None,
        }
    }

    /// Kill the process and fail the job if it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Probe `magick -version`.
    pub fn is_available(&self) -> bool {
        Command::new(&self.bin)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Full argument vector for `job` (excluding the program name).
    pub fn command_args(job: &RasterJob) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![job.input.clone().into_os_string()];
        for op in &job.ops {
            push_op_args(&mut args, op);
        }
        args.push(job.output.clone().into_os_string());
        args
    }

    fn wait(&self, child: &mut std::process::Child) -> RenderResult<std::process::ExitStatus> {
        let Some(timeout) = self.timeout else {
            return child
                .wait()
                .map_err(|e| RenderError::executor(format!("failed to wait for magick: {e}")));
        };

        let started = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if started.elapsed() >= timeout => {
                    // Best-effort; the process may have exited between the two calls.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(RenderError::executor(format!(
                        "magick exceeded the {}ms timeout and was killed",
                        timeout.as_millis()
                    )));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => {
                    return Err(RenderError::executor(format!(
                        "failed to poll magick: {e}"
                    )));
                }
            }
        }
    }
}

fn push_op_args(args: &mut Vec<OsString>, op: &RasterOp) {
    fn strs<const N: usize>(args: &mut Vec<OsString>, parts: [&str; N]) {
        args.extend(parts.map(OsString::from));
    }

    match op {
        RasterOp::AutoOrient => strs(args, ["-auto-orient"]),
        RasterOp::CropPercent(crop) => strs(args, ["-crop", &crop.to_geometry()]),
        RasterOp::ResetPage => strs(args, ["+repage"]),
        RasterOp::ResizeFill(size) => strs(args, ["-resize", &format!("{size}^")]),
        RasterOp::ResizeExact(size) => strs(args, ["-resize", &format!("{size}!")]),
        RasterOp::ShrinkToFit(max) => strs(args, ["-resize", &format!("{max}>")]),
        RasterOp::Extent {
            size,
            background,
            gravity,
        } => strs(
            args,
            [
                "-gravity",
                gravity.as_str(),
                "-background",
                &background.to_executor_arg(),
                "-extent",
                &size.to_string(),
            ],
        ),
        RasterOp::BrightnessContrast {
            brightness,
            contrast,
        } => strs(
            args,
            ["-brightness-contrast", &format!("{brightness}x{contrast}")],
        ),
        RasterOp::CompositeOver {
            overlay,
            gravity,
            offset,
        } => {
            args.push(overlay.clone().into_os_string());
            strs(
                args,
                [
                    "-gravity",
                    gravity.as_str(),
                    "-geometry",
                    &offset.to_geometry(),
                    "-compose",
                    "over",
                    "-composite",
                ],
            );
        }
    }
}

impl RasterExecutor for MagickExecutor {
    fn name(&self) -> &'static str {
        "magick"
    }

    fn execute(&self, job: &RasterJob) -> RenderResult<()> {
        let args = Self::command_args(job);
        tracing::debug!(bin = %self.bin.display(), ?args, "spawning magick");

        let mut child = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                RenderError::executor(format!(
                    "failed to spawn '{}' (is ImageMagick installed and on PATH?): {e}",
                    self.bin.display()
                ))
            })?;

        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| RenderError::executor("failed to open magick stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok::<_, std::io::Error>(bytes)
        });

        let status = self.wait(&mut child);
        let stderr_bytes = stderr_drain
            .join()
            .map_err(|_| RenderError::executor("magick stderr reader panicked"))?
            .unwrap_or_default();
        let status = status?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr_bytes);
            tracing::error!(%status, stderr = %stderr.trim(), "magick failed");
            return Err(RenderError::executor(format!(
                "magick exited with status {status}: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/magick.rs"]
mod tests;
