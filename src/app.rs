//! Command handlers for the `narrate` binary.
//!
//! Wires the Gemini client, the clip loader and the orchestrator together:
//! read text → generate → save WAV.

use crate::audio::clip::HttpClipLoader;
use crate::cancel::CancellationSignal;
use crate::cli::{EnhancementArgs, TextArgs, VoiceArgs};
use crate::config::Config;
use crate::error::{NarrateError, Result};
use crate::output::{SegmentProgress, print_failure, print_saved};
use crate::pipeline::{Enhancements, GenerationRequest, Orchestrator};
use crate::provider::{GeminiClient, ReferenceAudio, VoiceParams};
use log::{debug, info};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::AsyncReadExt;

/// Build the production orchestrator from configuration.
///
/// # Errors
/// `MissingCredential` if no API key is configured.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    config.validate()?;
    let client = Arc::new(
        GeminiClient::new(&config.provider)?.with_fragment_rate(config.generation.sample_rate),
    );
    let clips = Arc::new(HttpClipLoader::new(client.http_client()));
    Ok(Orchestrator::new(client.clone(), clips)
        .with_analyzer(client)
        .with_config(config))
}

/// Voice settings from CLI flags, falling back to defaults.
pub fn voice_params(args: &VoiceArgs) -> VoiceParams {
    let defaults = VoiceParams::default();
    VoiceParams {
        voice: args.voice.clone().unwrap_or(defaults.voice),
        language: args.language.clone().unwrap_or(defaults.language),
        speed: args.speed.unwrap_or(defaults.speed),
        pitch: args.pitch.clone().unwrap_or(defaults.pitch),
        style: args.style.clone().filter(|s| !s.trim().is_empty()),
        reference: None,
    }
}

pub fn enhancements(args: &EnhancementArgs) -> Enhancements {
    Enhancements {
        background: args.background.clone(),
        background_gain: args.background_gain,
        smart_effects: args.smart_effects,
    }
}

/// Resolve the script text from the argument, a file, or piped stdin.
pub async fn read_text(input: &TextArgs) -> Result<String> {
    let text = if let Some(text) = &input.text {
        text.clone()
    } else if let Some(path) = &input.file {
        tokio::fs::read_to_string(path).await.map_err(|e| {
            NarrateError::Other(format!("Failed to read {}: {}", path.display(), e))
        })?
    } else if std::io::stdin().is_terminal() {
        return Err(NarrateError::Other(
            "No text given. Pass TEXT, --file, or pipe text on stdin.".to_string(),
        ));
    } else {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        text
    };

    if text.trim().is_empty() {
        return Err(NarrateError::Other("Nothing to narrate: text is empty".to_string()));
    }
    Ok(text)
}

/// `narrate-<unix seconds>.wav` in the current directory.
pub fn default_output_path() -> PathBuf {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    PathBuf::from(format!("narrate-{secs}.wav"))
}

/// Cancel `signal` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(signal: &CancellationSignal) -> tokio::task::JoinHandle<()> {
    let signal = signal.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, stopping");
            signal.cancel();
        }
    })
}

/// Run one request, save the WAV to `output` and release the handle.
pub async fn narrate_to_file(
    orchestrator: &Orchestrator,
    request: &GenerationRequest,
    signal: &CancellationSignal,
    output: &Path,
    quiet: bool,
) -> Result<()> {
    let progress = SegmentProgress::new(quiet);
    progress.set_message(&format!("→ {}", output.display()));
    let result = orchestrator
        .run(request, Some(signal), |p| progress.update(p))
        .await;
    progress.finish();

    let resource = result?;
    let saved = resource.save(output);
    orchestrator.resources().revoke(resource.url());
    saved?;

    if !quiet {
        print_saved(output, resource.duration(), resource.bytes().len());
    }
    Ok(())
}

/// Run the speak command: narrate text with a prebuilt voice.
pub async fn run_speak_command(
    config: Config,
    input: TextArgs,
    voice: VoiceArgs,
    enhancement_args: EnhancementArgs,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let text = read_text(&input).await?;
    let orchestrator = build_orchestrator(&config)?;
    let request =
        GenerationRequest::new(text, voice_params(&voice)).with_enhancements(enhancements(&enhancement_args));

    let signal = CancellationSignal::new();
    let watcher = cancel_on_ctrl_c(&signal);
    let output = output.unwrap_or_else(default_output_path);
    let result = narrate_to_file(&orchestrator, &request, &signal, &output, quiet).await;
    watcher.abort();
    result
}

/// Run the clone command: narrate text in the voice of a reference sample.
pub async fn run_clone_command(
    mut config: Config,
    reference: PathBuf,
    input: TextArgs,
    chunk_chars: Option<usize>,
    enhancement_args: EnhancementArgs,
    output: Option<PathBuf>,
    quiet: bool,
) -> Result<()> {
    let text = read_text(&input).await?;
    if let Some(n) = chunk_chars {
        config.generation.clone_chunk_chars = n;
    }
    let orchestrator = build_orchestrator(&config)?;

    let reference = ReferenceAudio::from_path(&reference).await.map_err(|e| {
        NarrateError::Other(format!(
            "Failed to read reference sample {}: {}",
            reference.display(),
            e
        ))
    })?;
    let voice = VoiceParams {
        reference: Some(reference),
        ..VoiceParams::default()
    };
    let request =
        GenerationRequest::new(text, voice).with_enhancements(enhancements(&enhancement_args));

    let signal = CancellationSignal::new();
    let watcher = cancel_on_ctrl_c(&signal);
    let output = output.unwrap_or_else(default_output_path);
    let result = narrate_to_file(&orchestrator, &request, &signal, &output, quiet).await;
    watcher.abort();
    result
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Non-empty, trimmed lines of a batch file.
pub fn batch_lines(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// `<dir>/<prefix>-<n>.wav`, zero-padded so files sort in task order.
pub fn batch_output_path(dir: &Path, prefix: &str, n: usize, total: usize) -> PathBuf {
    let width = total.to_string().len();
    dir.join(format!("{prefix}-{n:0width$}.wav"))
}

/// Generate every line in order.
///
/// A failed task is reported and skipped; errors that would fail every
/// following task (quota, credential, cancellation) end the batch.
pub async fn generate_batch(
    orchestrator: &Orchestrator,
    lines: &[String],
    template: &GenerationRequest,
    output_dir: &Path,
    prefix: &str,
    signal: &CancellationSignal,
    quiet: bool,
) -> Result<BatchSummary> {
    std::fs::create_dir_all(output_dir)?;
    let mut summary = BatchSummary::default();

    for (i, line) in lines.iter().enumerate() {
        if signal.is_cancelled() {
            return Err(NarrateError::Aborted);
        }
        let output = batch_output_path(output_dir, prefix, i + 1, lines.len());
        info!("Batch task {}/{} → {}", i + 1, lines.len(), output.display());

        let request = GenerationRequest {
            text: line.clone(),
            ..template.clone()
        };
        match narrate_to_file(orchestrator, &request, signal, &output, quiet).await {
            Ok(()) => summary.succeeded += 1,
            Err(e) if e.is_fatal_to_session() => return Err(e),
            Err(e) => {
                summary.failed += 1;
                if !quiet {
                    eprintln!("Task {}/{} failed:", i + 1, lines.len());
                    print_failure(&e);
                }
            }
        }
    }

    Ok(summary)
}

/// Run the batch command: one WAV per non-empty line of `file`.
#[allow(clippy::too_many_arguments)]
pub async fn run_batch_command(
    config: Config,
    file: PathBuf,
    output_dir: PathBuf,
    prefix: String,
    voice: VoiceArgs,
    enhancement_args: EnhancementArgs,
    quiet: bool,
) -> Result<BatchSummary> {
    let contents = tokio::fs::read_to_string(&file)
        .await
        .map_err(|e| NarrateError::Other(format!("Failed to read {}: {}", file.display(), e)))?;
    let lines = batch_lines(&contents);
    if lines.is_empty() {
        return Err(NarrateError::Other(format!(
            "{} contains no text lines",
            file.display()
        )));
    }

    let orchestrator = build_orchestrator(&config)?;
    let template = GenerationRequest::new(String::new(), voice_params(&voice))
        .with_enhancements(enhancements(&enhancement_args));

    let signal = CancellationSignal::new();
    let watcher = cancel_on_ctrl_c(&signal);
    let result = generate_batch(
        &orchestrator,
        &lines,
        &template,
        &output_dir,
        &prefix,
        &signal,
        quiet,
    )
    .await;
    watcher.abort();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::clip::StaticClipLoader;
    use crate::provider::{ScriptStep, ScriptedGenerator};

    fn orchestrator(generator: ScriptedGenerator) -> (Orchestrator, Arc<ScriptedGenerator>) {
        let generator = Arc::new(generator);
        let orchestrator = Orchestrator::new(generator.clone(), Arc::new(StaticClipLoader::new()))
            .with_retry_policy(crate::retry::RetryPolicy::new(1, std::time::Duration::ZERO));
        (orchestrator, generator)
    }

    #[test]
    fn batch_lines_skip_blanks() {
        let lines = batch_lines("First line.\n\n   \nSecond line.\r\n");
        assert_eq!(lines, vec!["First line.", "Second line."]);
    }

    #[test]
    fn batch_paths_are_zero_padded() {
        let dir = Path::new("/out");
        assert_eq!(
            batch_output_path(dir, "take", 3, 12),
            PathBuf::from("/out/take-03.wav")
        );
        assert_eq!(
            batch_output_path(dir, "take", 1, 9),
            PathBuf::from("/out/take-1.wav")
        );
    }

    #[test]
    fn voice_params_fill_defaults() {
        let args = VoiceArgs {
            voice: Some("Puck".to_string()),
            style: Some("  ".to_string()),
            ..VoiceArgs::default()
        };
        let voice = voice_params(&args);
        assert_eq!(voice.voice, "Puck");
        assert_eq!(voice.language, "English");
        assert_eq!(voice.speed, 1.0);
        assert!(voice.style.is_none());
    }

    #[test]
    fn missing_api_key_fails_before_any_request() {
        let config = Config::default();
        assert!(matches!(
            build_orchestrator(&config),
            Err(NarrateError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn read_text_prefers_argument_then_file() {
        let input = TextArgs {
            text: Some("Hello.".to_string()),
            file: None,
        };
        assert_eq!(read_text(&input).await.unwrap(), "Hello.");

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.txt");
        std::fs::write(&path, "From a file.").unwrap();
        let input = TextArgs {
            text: None,
            file: Some(path),
        };
        assert_eq!(read_text(&input).await.unwrap(), "From a file.");

        let blank = TextArgs {
            text: Some("  ".to_string()),
            file: None,
        };
        assert!(read_text(&blank).await.is_err());
    }

    #[tokio::test]
    async fn batch_continues_after_task_failure() {
        // Task 2 has one segment that comes back empty.
        let (orchestrator, _) = orchestrator(
            ScriptedGenerator::silent(0.05)
                .then(ScriptStep::Audio(crate::provider::mock::silent_fragment(0.05)))
                .then(ScriptStep::NoAudio),
        );
        let dir = tempfile::tempdir().unwrap();
        let lines = vec!["One.".to_string(), "Two.".to_string(), "Three.".to_string()];
        let template = GenerationRequest::default();

        let summary = generate_batch(
            &orchestrator,
            &lines,
            &template,
            dir.path(),
            "take",
            &CancellationSignal::new(),
            true,
        )
        .await
        .unwrap();

        assert_eq!(
            summary,
            BatchSummary {
                succeeded: 2,
                failed: 1
            }
        );
        assert!(dir.path().join("take-1.wav").exists());
        assert!(!dir.path().join("take-2.wav").exists());
        assert!(dir.path().join("take-3.wav").exists());
        assert!(orchestrator.resources().is_empty());
    }

    #[tokio::test]
    async fn batch_stops_on_quota() {
        let (orchestrator, generator) = orchestrator(ScriptedGenerator::new(ScriptStep::Fail(
            "HTTP 429: RESOURCE_EXHAUSTED".to_string(),
        )));
        let dir = tempfile::tempdir().unwrap();
        let lines = vec!["One.".to_string(), "Two.".to_string()];

        let result = generate_batch(
            &orchestrator,
            &lines,
            &GenerationRequest::default(),
            dir.path(),
            "take",
            &CancellationSignal::new(),
            true,
        )
        .await;

        assert!(matches!(result, Err(NarrateError::QuotaExceeded { .. })));
        assert_eq!(generator.calls(), 1);
    }

    #[tokio::test]
    async fn batch_stops_when_cancelled() {
        let (orchestrator, generator) = orchestrator(ScriptedGenerator::silent(0.05));
        let dir = tempfile::tempdir().unwrap();
        let signal = CancellationSignal::new();
        signal.cancel();

        let result = generate_batch(
            &orchestrator,
            &["One.".to_string()],
            &GenerationRequest::default(),
            dir.path(),
            "take",
            &signal,
            true,
        )
        .await;

        assert!(matches!(result, Err(NarrateError::Aborted)));
        assert_eq!(generator.calls(), 0);
    }
}
