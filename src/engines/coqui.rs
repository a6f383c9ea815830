//! Coqui TTS backend (XTTS family).
//!
//! # System Requirements
//!
//! Python 3 with the Coqui TTS package: `pip install TTS`. Models are
//! downloaded on first use into the Coqui cache.
//!
//! XTTS models ask for their license to be accepted before the first
//! download. The prompt is interactive, so [`CoquiLoader::accept_license`]
//! answers it up front by setting `COQUI_TOS_AGREED=1` for the worker.
//!
//! # Worker Process
//!
//! [`CoquiLoader::load`] starts one Python worker per model. The worker loads
//! the model once and then serves requests, one JSON object per line:
//!
//! ```text
//! worker:  {"languages": ["en", "hi", ...]}
//! request: {"text": "...", "language": "hi", "speaker_wav": null, "output": "/tmp/a.wav"}
//! worker:  {"ok": true}  or  {"error": "..."}
//! ```
//!
//! The worker's stderr (download progress, Coqui logging) goes to
//! `log::debug!`. Dropping the model stops the worker.
//!
//! # Model Identifiers
//!
//! | Identifier | Notes |
//! |---|---|
//! | `tts_models/multilingual/multi-dataset/xtts` | Tried first |
//! | `tts_models/multilingual/multi-dataset/xtts_v2` | Fallback, voice cloning |

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, Stdio};

use serde::{Deserialize, Serialize};

use super::{Device, ModelLoader, SpeechModel};
use crate::SynthesisError;

pub const PRIMARY_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts";
pub const FALLBACK_MODEL: &str = "tts_models/multilingual/multi-dataset/xtts_v2";

const DEFAULT_PYTHON: &str = "python3";
const LICENSE_ENV: &str = "COQUI_TOS_AGREED";
const WORKER_SCRIPT: &str = include_str!("coqui_worker.py");

/// Loads Coqui models by identifier.
#[derive(Debug, Clone)]
pub struct CoquiLoader {
    python: PathBuf,
    accept_license: bool,
}

impl Default for CoquiLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CoquiLoader {
    /// Use `python3` from PATH.
    pub fn new() -> Self {
        Self::with_python(DEFAULT_PYTHON)
    }

    /// Use an explicit interpreter, e.g. inside a virtualenv.
    pub fn with_python(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            accept_license: false,
        }
    }

    /// Accept the model license non-interactively when fetching models.
    pub fn accept_license(mut self, accept: bool) -> Self {
        self.accept_license = accept;
        self
    }

    fn command(&self, model_id: &str, device: Device) -> Command {
        let mut cmd = Command::new(&self.python);
        cmd.arg("-c")
            .arg(WORKER_SCRIPT)
            .arg(model_id)
            .arg(device.to_string());
        if self.accept_license {
            cmd.env(LICENSE_ENV, "1");
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    /// Start a worker for `model_id` and wait until the model is loaded.
    pub fn start(&self, model_id: &str, device: Device) -> Result<CoquiModel, SynthesisError> {
        let mut child = self.command(model_id, device).spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SynthesisError::ToolNotFound(self.python.display().to_string())
            } else {
                SynthesisError::Io(e)
            }
        })?;

        let (Some(stdin), Some(stdout)) = (child.stdin.take(), child.stdout.take()) else {
            // Both are piped by `command`.
            let _ = child.kill();
            return Err(SynthesisError::Backend("worker pipes unavailable".to_string()));
        };
        if let Some(stderr) = child.stderr.take() {
            forward_stderr(model_id, stderr);
        }

        let mut model = CoquiModel {
            model_id: model_id.to_string(),
            device,
            child,
            stdin,
            stdout: BufReader::new(stdout),
            languages: Vec::new(),
        };
        let ready = model.read_reply()?;
        if let Some(error) = ready.error {
            return Err(SynthesisError::Backend(error));
        }
        model.languages = ready.languages;
        log::debug!("{model_id} languages: {:?}", model.languages);
        Ok(model)
    }
}

impl ModelLoader for CoquiLoader {
    fn detect_device(&self) -> Device {
        let cuda = Command::new("nvidia-smi")
            .arg("-L")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        if cuda {
            Device::Cuda
        } else {
            Device::Cpu
        }
    }

    fn load(&self, model_id: &str, device: Device) -> Result<Box<dyn SpeechModel>, SynthesisError> {
        let model = self
            .start(model_id, device)
            .map_err(|e| SynthesisError::ModelLoad {
                model: model_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(model))
    }
}

fn forward_stderr(model_id: &str, stderr: ChildStderr) {
    let model_id = model_id.to_string();
    std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines().map_while(Result::ok) {
            log::debug!("[{model_id}] {line}");
        }
    });
}

#[derive(Serialize)]
struct WorkerRequest<'a> {
    text: &'a str,
    language: &'a str,
    speaker_wav: Option<&'a Path>,
    output: &'a Path,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkerReply {
    languages: Vec<String>,
    error: Option<String>,
}

/// A Coqui model held in memory by a running worker.
pub struct CoquiModel {
    model_id: String,
    device: Device,
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    languages: Vec<String>,
}

impl CoquiModel {
    /// Language codes reported by the model, empty if it did not list any.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Whether the model lists `language`. Models that list nothing accept all.
    pub fn supports(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|l| l == language)
    }

    fn read_reply(&mut self) -> Result<WorkerReply, SynthesisError> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(SynthesisError::Backend(format!(
                    "Coqui worker for {} exited",
                    self.model_id
                )));
            }
            let reply = line.trim();
            if reply.is_empty() {
                continue;
            }
            return serde_json::from_str(reply).map_err(|e| {
                SynthesisError::Backend(format!("unexpected worker reply {reply:?}: {e}"))
            });
        }
    }
}

impl SpeechModel for CoquiModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn synthesize_to_file(
        &mut self,
        text: &str,
        language: &str,
        speaker_wav: Option<&Path>,
        output: &Path,
    ) -> Result<(), SynthesisError> {
        if !self.supports(language) {
            log::warn!("{} does not list language '{language}'", self.model_id);
        }
        let request = WorkerRequest {
            text,
            language,
            speaker_wav,
            output,
        };
        let mut line = serde_json::to_string(&request)
            .map_err(|e| SynthesisError::Backend(format!("cannot encode request: {e}")))?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes())?;
        self.stdin.flush()?;

        match self.read_reply()?.error {
            Some(error) => Err(SynthesisError::Backend(error)),
            None => Ok(()),
        }
    }
}

impl Drop for CoquiModel {
    fn drop(&mut self) {
        if let Err(e) = self.child.kill() {
            log::debug!("Coqui worker for {} already stopped: {e}", self.model_id);
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Write an executable stand-in for the Python interpreter.
    #[cfg(unix)]
    fn fake_python(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    const WORKER: &str = r#"echo started >> "$0.starts"
echo '{"languages": ["en", "hi"]}'
while IFS= read -r line; do
  case "$line" in
    *'"text":"fail"'*) echo '{"error": "RuntimeError: boom"}' ;;
    *) echo '{"ok": true}' ;;
  esac
done
"#;

    #[test]
    fn command_carries_model_device_and_license_flag() {
        let loader = CoquiLoader::with_python("/opt/venv/bin/python").accept_license(true);
        let cmd = loader.command(PRIMARY_MODEL, Device::Cuda);
        assert_eq!(cmd.get_program(), "/opt/venv/bin/python");
        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, ["-c", WORKER_SCRIPT, PRIMARY_MODEL, "cuda"]);
        assert!(cmd
            .get_envs()
            .any(|(k, v)| k == LICENSE_ENV && v == Some("1".as_ref())));

        let cpu = CoquiLoader::new().command(PRIMARY_MODEL, Device::Cpu);
        assert_eq!(cpu.get_program(), DEFAULT_PYTHON);
        assert_eq!(cpu.get_args().last().unwrap(), "cpu");
        assert_eq!(cpu.get_envs().count(), 0);
    }

    #[test]
    fn requests_are_single_json_lines() {
        let request = WorkerRequest {
            text: "line one\nline two",
            language: "te",
            speaker_wav: Some(Path::new("me.wav")),
            output: Path::new("out.wav"),
        };
        let line = serde_json::to_string(&request).unwrap();
        assert!(!line.contains('\n'));
        assert_eq!(
            line,
            r#"{"text":"line one\nline two","language":"te","speaker_wav":"me.wav","output":"out.wav"}"#
        );
    }

    #[test]
    fn missing_interpreter_is_a_model_load_error() {
        let loader = CoquiLoader::with_python("/nonexistent/bin/python3");
        let err = loader.load(PRIMARY_MODEL, Device::Cpu).err().unwrap();
        match err {
            SynthesisError::ModelLoad { model, reason } => {
                assert_eq!(model, PRIMARY_MODEL);
                assert!(reason.contains("/nonexistent/bin/python3"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn model_is_loaded_once_for_many_calls() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_python(dir.path(), "python3", WORKER);
        let mut model = CoquiLoader::with_python(&python)
            .start(FALLBACK_MODEL, Device::Cpu)
            .unwrap();
        assert_eq!(model.languages(), ["en", "hi"]);

        for i in 0..3 {
            let out = dir.path().join(format!("{i}.wav"));
            model.synthesize_to_file("namaste", "hi", None, &out).unwrap();
        }
        let starts = std::fs::read_to_string(dir.path().join("python3.starts")).unwrap();
        assert_eq!(starts.lines().count(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn worker_errors_fail_only_that_call() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_python(dir.path(), "python3", WORKER);
        let mut model = CoquiLoader::with_python(&python)
            .start(FALLBACK_MODEL, Device::Cpu)
            .unwrap();
        let out = dir.path().join("out.wav");

        let err = model
            .synthesize_to_file("fail", "en", Some(Path::new("me.wav")), &out)
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Backend(ref m) if m == "RuntimeError: boom"));
        model.synthesize_to_file("fine", "en", None, &out).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn unlisted_languages_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_python(dir.path(), "python3", WORKER);
        let model = CoquiLoader::with_python(&python)
            .start(PRIMARY_MODEL, Device::Cpu)
            .unwrap();
        assert!(model.supports("hi"));
        assert!(!model.supports("or"));
    }

    #[cfg(unix)]
    #[test]
    fn startup_failure_is_reported_with_its_cause() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_python(
            dir.path(),
            "bad-model",
            "echo '{\"error\": \"KeyError: unknown model\"}'\nexit 1\n",
        );
        let err = CoquiLoader::with_python(&python)
            .load("tts_models/nope", Device::Cpu)
            .err()
            .unwrap();
        assert!(
            matches!(err, SynthesisError::ModelLoad { ref reason, .. } if reason.contains("unknown model")),
            "{err}"
        );

        let silent = fake_python(dir.path(), "crashes", "exit 3\n");
        let err = CoquiLoader::with_python(&silent)
            .start(PRIMARY_MODEL, Device::Cpu)
            .err()
            .unwrap();
        assert!(err.to_string().contains("exited"), "{err}");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn dropping_the_model_stops_the_worker() {
        let dir = tempfile::tempdir().unwrap();
        let python = fake_python(dir.path(), "python3", WORKER);
        let model = CoquiLoader::with_python(&python)
            .start(PRIMARY_MODEL, Device::Cpu)
            .unwrap();
        let proc_dir = PathBuf::from(format!("/proc/{}", model.child.id()));
        assert!(proc_dir.exists());
        drop(model);
        assert!(!proc_dir.exists());
    }
}
