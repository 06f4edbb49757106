//! External conversion tool invocation
//!
//! File-based interchange with the neural conversion tool: normalize
//! both inputs to canonical WAVs, write a uniquely named manifest into
//! the tool directory, run the tool as a subprocess with a wall-clock
//! bound, then validate exit status and declared output before the
//! destination file is touched.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audio::{AudioNormalizer, AudioOutput};
use crate::core::error::{Result, VcError};
use crate::engine::config::ConverterConfig;
use crate::engine::manifest::ConversionManifest;
use crate::engine::orchestrator::ConversionRequest;

/// Poll interval while waiting on the subprocess
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a bounded subprocess run
#[derive(Debug)]
pub struct ProcessOutput {
    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ProcessOutput {
    /// True when the process exited with status zero
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run a command to completion with a wall-clock bound
///
/// stdout/stderr are drained on reader threads so a chatty subprocess
/// cannot deadlock on a full pipe. On timeout the process is killed
/// and `VcError::Timeout` is returned immediately: the reader threads
/// are abandoned rather than joined, because surviving grandchildren
/// of the killed process can hold the inherited pipe write ends open
/// indefinitely. A spawn failure (interpreter missing, command
/// misconfigured) is `VcError::ToolUnavailable`, keeping it on the
/// fallback-eligible path.
pub fn run_with_timeout(mut cmd: Command, timeout: Duration) -> Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    // Own process group, so killing the child does not signal us and
    // the group is identifiable; grandchildren may still outlive it.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut child = cmd.spawn().map_err(|e| VcError::ToolUnavailable {
        message: format!("failed to spawn subprocess: {}", e),
    })?;

    let stdout_reader = spawn_pipe_reader(child.stdout.take());
    let stderr_reader = spawn_pipe_reader(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let exit_code = loop {
        match child.try_wait()? {
            Some(status) => break status.code(),
            None => {
                if Instant::now() >= deadline {
                    warn!(timeout_secs = timeout.as_secs(), "subprocess exceeded bound; killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    // Do not join the readers: orphaned grandchildren
                    // can keep the pipes open past the deadline
                    drop(stdout_reader);
                    drop(stderr_reader);
                    return Err(VcError::Timeout {
                        seconds: timeout.as_secs(),
                    });
                }
                std::thread::sleep(WAIT_POLL_INTERVAL);
            }
        }
    };

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(ProcessOutput {
        exit_code,
        stdout,
        stderr,
    })
}

fn spawn_pipe_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let mut text = String::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_string(&mut text);
        }
        text
    })
}

/// Invoker for the external neural conversion tool
pub struct ExternalEngine {
    config: ConverterConfig,
    normalizer: AudioNormalizer,
}

impl ExternalEngine {
    /// Create an invoker over the given configuration
    pub fn new(config: ConverterConfig) -> Self {
        let normalizer = AudioNormalizer::new(config.sample_rate);
        Self { config, normalizer }
    }

    /// Run one conversion through the external tool
    ///
    /// Succeeds only when the subprocess exits zero AND the manifest's
    /// declared output file exists; either condition failing alone is
    /// an `ExternalTool` error carrying the captured diagnostics. On
    /// success the produced audio is moved to the request destination
    /// atomically, so a failure never leaves a partial destination.
    pub fn invoke(&self, request: &ConversionRequest, model_path: &Path) -> Result<PathBuf> {
        info!(
            source = %request.source.display(),
            target = %request.target.display(),
            model = %model_path.display(),
            "invoking external conversion tool"
        );

        let scratch = RequestScratch::prepare(&self.config)?;
        let mut manifest_path = None;
        let result = self.stage_and_run(request, &scratch, &mut manifest_path);

        // Interchange files are per-request; drop them regardless of
        // outcome, including staging failures partway through
        scratch.cleanup();
        if let Some(path) = manifest_path {
            if let Err(e) = std::fs::remove_file(&path) {
                debug!(error = %e, "manifest already gone or not removable");
            }
        }

        result
    }

    fn stage_and_run(
        &self,
        request: &ConversionRequest,
        scratch: &RequestScratch,
        manifest_path: &mut Option<PathBuf>,
    ) -> Result<PathBuf> {
        // External tools require canonical mono fixed-rate input
        let source = self.normalizer.normalize_file(&request.source)?;
        let target = self.normalizer.normalize_file(&request.target)?;
        AudioOutput::save(&source, &scratch.source_wav)?;
        AudioOutput::save(&target, &scratch.target_wav)?;

        let manifest = ConversionManifest::new(
            &scratch.source_wav,
            &scratch.target_wav,
            &scratch.output_wav,
        );
        let path = manifest.write_to(&self.config.tool_dir)?;
        debug!(manifest = %path.display(), "manifest written");
        *manifest_path = Some(path.clone());

        self.run_tool(&path, scratch, &request.destination)
    }

    fn run_tool(
        &self,
        manifest_path: &Path,
        scratch: &RequestScratch,
        destination: &Path,
    ) -> Result<PathBuf> {
        let (program, args) = self.config.tool_command.split_first().ok_or_else(|| {
            VcError::Config {
                message: "tool_command is empty".to_string(),
            }
        })?;

        let manifest_name = manifest_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();

        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(manifest_name)
            .current_dir(&self.config.tool_dir);

        let output = run_with_timeout(cmd, self.config.tool_timeout())?;

        if !output.success() {
            return Err(VcError::ExternalTool {
                message: format!(
                    "tool exited with status {}",
                    output
                        .exit_code
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "unknown (killed by signal)".to_string())
                ),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        if !scratch.output_wav.exists() {
            return Err(VcError::ExternalTool {
                message: "tool exited zero but declared output file was not created".to_string(),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        copy_atomic(&scratch.output_wav, destination)?;
        info!(destination = %destination.display(), "external conversion complete");
        Ok(destination.to_path_buf())
    }
}

/// Per-request interchange files, uniquely named so concurrent
/// requests never share filesystem state
struct RequestScratch {
    source_wav: PathBuf,
    target_wav: PathBuf,
    output_wav: PathBuf,
}

impl RequestScratch {
    fn prepare(config: &ConverterConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir).map_err(|e| VcError::Io {
            message: format!("failed to create work directory: {}", e),
            path: Some(config.work_dir.clone()),
        })?;

        // Absolute paths: the tool runs with a different working directory
        let work_dir = config.work_dir.canonicalize().map_err(|e| VcError::Io {
            message: format!("failed to resolve work directory: {}", e),
            path: Some(config.work_dir.clone()),
        })?;

        let token = Uuid::new_v4().simple().to_string();
        Ok(Self {
            source_wav: work_dir.join(format!("source_{}.wav", token)),
            target_wav: work_dir.join(format!("target_{}.wav", token)),
            output_wav: work_dir.join(format!("output_{}.wav", token)),
        })
    }

    fn cleanup(&self) {
        for path in [&self.source_wav, &self.target_wav, &self.output_wav] {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Copy `src` to `dest` via a unique temporary sibling plus rename
fn copy_atomic(src: &Path, dest: &Path) -> Result<()> {
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| VcError::Io {
            message: "destination path has no file name".to_string(),
            path: Some(dest.to_path_buf()),
        })?;
    let tmp = dest.with_file_name(format!(".{}.{}.part", file_name, Uuid::new_v4().simple()));

    std::fs::copy(src, &tmp).map_err(|e| VcError::Io {
        message: format!("failed to copy tool output: {}", e),
        path: Some(src.to_path_buf()),
    })?;
    std::fs::rename(&tmp, dest).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        VcError::Io {
            message: format!("failed to move output into place: {}", e),
            path: Some(dest.to_path_buf()),
        }
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_run_with_timeout_captures_output() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo out; echo err >&2");
        let output = run_with_timeout(cmd, Duration::from_secs(5)).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "out");
        assert_eq!(output.stderr.trim(), "err");
    }

    #[test]
    #[cfg(unix)]
    fn test_run_with_timeout_nonzero_exit() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("exit 3");
        let output = run_with_timeout(cmd, Duration::from_secs(5)).unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, Some(3));
    }

    #[test]
    #[cfg(unix)]
    fn test_run_with_timeout_kills_on_deadline() {
        // The grandchild inherits the pipe write ends and survives the
        // kill; the deadline must hold regardless
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("sleep 30 & wait");
        let start = Instant::now();
        let err = run_with_timeout(cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, VcError::Timeout { seconds: 1 }));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_spawn_failure_is_tool_unavailable() {
        let cmd = Command::new("voicemorph-no-such-interpreter");
        let err = run_with_timeout(cmd, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, VcError::ToolUnavailable { .. }));
        assert!(err.is_fallback_eligible());
    }

    #[test]
    fn test_invoke_cleans_scratch_on_input_error() {
        use crate::audio::AudioBuffer;

        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.wav");
        let target = dir.path().join("target.wav");
        let samples: Vec<f32> = (0..8000).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        AudioOutput::save(&AudioBuffer::new(samples, 16000).unwrap(), &source).unwrap();
        // Target decode fails after the scratch dir exists
        std::fs::write(&target, b"not audio at all").unwrap();

        let work_dir = dir.path().join("work");
        let config = ConverterConfig::default()
            .with_tool_dir(dir.path().join("tool"))
            .with_work_dir(work_dir.clone())
            .without_auto_fetch();
        let engine = ExternalEngine::new(config);
        let request =
            ConversionRequest::new(&source, &target, dir.path().join("out.wav"));

        let err = engine.invoke(&request, Path::new("G_0.pth")).unwrap_err();
        assert!(matches!(err, VcError::Decode { .. }));

        // No per-request scratch WAVs left behind
        let leftovers: Vec<PathBuf> = std::fs::read_dir(&work_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn test_invoke_cleans_scratch_when_manifest_write_fails() {
        use crate::audio::AudioBuffer;

        // Both inputs are valid, so the scratch WAVs get written before
        // the manifest write fails against the missing tool directory
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.wav");
        let target = dir.path().join("target.wav");
        let samples: Vec<f32> = (0..8000).map(|i| (i as f32 * 0.01).sin() * 0.5).collect();
        let buffer = AudioBuffer::new(samples, 16000).unwrap();
        AudioOutput::save(&buffer, &source).unwrap();
        AudioOutput::save(&buffer, &target).unwrap();

        let work_dir = dir.path().join("work");
        let config = ConverterConfig::default()
            .with_tool_dir(dir.path().join("no-such-tool-dir"))
            .with_work_dir(work_dir.clone())
            .without_auto_fetch();
        let engine = ExternalEngine::new(config);
        let request =
            ConversionRequest::new(&source, &target, dir.path().join("out.wav"));

        let err = engine.invoke(&request, Path::new("G_0.pth")).unwrap_err();
        assert!(matches!(err, VcError::Io { .. }));

        let leftovers: Vec<PathBuf> = std::fs::read_dir(&work_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
    }

    #[test]
    fn test_copy_atomic_no_partial_on_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.wav");
        let err = copy_atomic(&dir.path().join("missing.wav"), &dest);
        assert!(err.is_err());
        assert!(!dest.exists());
    }
}
