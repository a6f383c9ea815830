use std::borrow::Cow;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::SynthesisError;

/// Start of utterance.
pub const BOS: char = '^';
/// End of utterance.
pub const EOS: char = '$';
/// Inserted after every phoneme.
pub const PAD: char = '_';

/// Location of the espeak-ng binary and its data directory.
///
/// `None` falls back to `espeak-ng` on PATH and its built-in data path.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

/// Phonemize `text` in `lang` (an espeak-ng voice such as `"hi"` or `"ta"`).
///
/// Returns one IPA string per non-empty input line.
pub fn phonemize(text: &str, lang: &str, espeak: &EspeakConfig) -> Result<Vec<String>, SynthesisError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return Ok(Vec::new());
    }

    let output = run_espeak(&lines.join("\n"), lang, espeak)?;
    Ok(output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Map IPA to model token IDs: `BOS PAD (phoneme PAD)* EOS`.
///
/// Phonemes missing from the map are dropped.
pub fn phonemes_to_ids(ipa: &str, id_map: &HashMap<char, Vec<i64>>) -> Vec<i64> {
    let mut ids = Vec::with_capacity(ipa.len() * 2 + 3);
    let pad = id_map.get(&PAD).cloned().unwrap_or_default();

    if let Some(bos) = id_map.get(&BOS) {
        ids.extend_from_slice(bos);
    }
    ids.extend_from_slice(&pad);

    for ch in ipa.chars() {
        if let Some(phoneme) = id_map.get(&ch) {
            ids.extend_from_slice(phoneme);
            ids.extend_from_slice(&pad);
        }
    }

    if let Some(eos) = id_map.get(&EOS) {
        ids.extend_from_slice(eos);
    }
    ids
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, SynthesisError> {
    let bin = espeak
        .bin_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("espeak-ng"));
    let mut cmd = Command::new(&bin);
    cmd.args(["--ipa", "--stdin", "-q", "-v", lang]);
    if let Some(data) = &espeak.data_path {
        cmd.arg(format!("--path={}", data.display()));
    }

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SynthesisError::ToolNotFound(bin.display().to_string())
            } else {
                SynthesisError::Io(e)
            }
        })?;

    // espeak-ng reads stdin line by line; an unterminated last line can
    // lose its final phoneme.
    let payload = canonicalize_stdin_payload(input).into_owned();
    // Feed stdin from its own thread so a full stdout pipe cannot stall us.
    let writer = child.stdin.take().map(|mut stdin| {
        std::thread::spawn(move || -> std::io::Result<()> {
            stdin.write_all(payload.as_bytes())?;
            stdin.flush()
        })
    });

    let output = child.wait_with_output()?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(SynthesisError::Backend(format!(
            "espeak-ng exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }
    if let Some(writer) = writer {
        writer
            .join()
            .map_err(|_| SynthesisError::Backend("espeak-ng stdin writer panicked".to_string()))??;
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn canonicalize_stdin_payload(input: &str) -> Cow<'_, str> {
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}
