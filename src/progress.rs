//! Trial progress reporting.
//!
//! Reports each trial as it starts and finishes so a long benchmark run is
//! observable. Progress goes to **stderr** so stdout stays parseable when
//! the JSON report is written there.

use std::io::Write;

/// A single progress event from the trial runner.
#[derive(Clone, Debug)]
pub enum TrialProgressEvent {
    /// Trial `iteration` (1-based) of `total` is about to run.
    Started {
        strategy: String,
        iteration: usize,
        total: usize,
    },
    Succeeded {
        strategy: String,
        iteration: usize,
        total: usize,
        elapsed_seconds: f64,
        input_tokens: u64,
    },
    Failed {
        strategy: String,
        iteration: usize,
        total: usize,
        error: String,
    },
}

pub trait TrialProgressReporter: Send + Sync {
    fn report(&self, event: TrialProgressEvent);
}

/// Human-friendly progress: "rag  trial 2/5  ok  1.84s  1,532 input tokens".
pub struct StderrProgress;

impl TrialProgressReporter for StderrProgress {
    fn report(&self, event: TrialProgressEvent) {
        let line = match &event {
            TrialProgressEvent::Started {
                strategy,
                iteration,
                total,
            } => format!("{}  trial {}/{}  running...\n", strategy, iteration, total),
            TrialProgressEvent::Succeeded {
                strategy,
                iteration,
                total,
                elapsed_seconds,
                input_tokens,
            } => format!(
                "{}  trial {}/{}  ok  {:.2}s  {} input tokens\n",
                strategy,
                iteration,
                total,
                elapsed_seconds,
                format_number(*input_tokens)
            ),
            TrialProgressEvent::Failed {
                strategy,
                iteration,
                total,
                error,
            } => format!(
                "{}  trial {}/{}  FAILED  {}\n",
                strategy, iteration, total, error
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl TrialProgressReporter for JsonProgress {
    fn report(&self, event: TrialProgressEvent) {
        let obj = event_to_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

fn event_to_json(event: &TrialProgressEvent) -> serde_json::Value {
    match event {
        TrialProgressEvent::Started {
            strategy,
            iteration,
            total,
        } => serde_json::json!({
            "event": "trial",
            "strategy": strategy,
            "phase": "started",
            "n": iteration,
            "total": total
        }),
        TrialProgressEvent::Succeeded {
            strategy,
            iteration,
            total,
            elapsed_seconds,
            input_tokens,
        } => serde_json::json!({
            "event": "trial",
            "strategy": strategy,
            "phase": "succeeded",
            "n": iteration,
            "total": total,
            "elapsed_seconds": elapsed_seconds,
            "input_tokens": input_tokens
        }),
        TrialProgressEvent::Failed {
            strategy,
            iteration,
            total,
            error,
        } => serde_json::json!({
            "event": "trial",
            "strategy": strategy,
            "phase": "failed",
            "n": iteration,
            "total": total,
            "error": error
        }),
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl TrialProgressReporter for NoProgress {
    fn report(&self, _event: TrialProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn TrialProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
