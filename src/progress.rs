//! Audit progress reporting.
//!
//! Reports which repository is being cloned or analyzed and how many remain.
//! Progress is emitted on **stderr** so stdout stays the report summary.

use std::io::Write;

/// A single progress event for an audit run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuditProgressEvent {
    /// Scope resolution in progress; repository count not yet known.
    Resolving { scope: String },
    /// Work on repository `n` of `total` has started.
    Started { repo: String, n: u64, total: u64 },
    /// Repository `n` of `total` finished (successfully or not).
    Finished {
        repo: String,
        n: u64,
        total: u64,
        violations: usize,
        ok: bool,
    },
}

/// Reports audit progress. Implementations write to stderr (human or JSON).
pub trait AuditProgressReporter: Send + Sync {
    fn report(&self, event: AuditProgressEvent);
}

/// Human-friendly progress on stderr: "audit [3/40]  payments-api  2 violations".
pub struct StderrProgress;

impl AuditProgressReporter for StderrProgress {
    fn report(&self, event: AuditProgressEvent) {
        let line = match &event {
            AuditProgressEvent::Resolving { scope } => {
                format!("audit {}  resolving repositories...\n", scope)
            }
            AuditProgressEvent::Started { repo, n, total } => {
                format!("audit [{}/{}]  {}  analyzing\n", n, total, repo)
            }
            AuditProgressEvent::Finished {
                repo,
                n,
                total,
                violations,
                ok,
            } => {
                let status = if !ok {
                    "failed".to_string()
                } else if *violations == 0 {
                    "ok".to_string()
                } else {
                    format!(
                        "{} violation{}",
                        violations,
                        if *violations == 1 { "" } else { "s" }
                    )
                };
                format!("audit [{}/{}]  {}  {}\n", n, total, repo, status)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl AuditProgressReporter for JsonProgress {
    fn report(&self, event: AuditProgressEvent) {
        let obj = match &event {
            AuditProgressEvent::Resolving { scope } => serde_json::json!({
                "event": "progress",
                "phase": "resolving",
                "scope": scope
            }),
            AuditProgressEvent::Started { repo, n, total } => serde_json::json!({
                "event": "progress",
                "phase": "started",
                "repo": repo,
                "n": n,
                "total": total
            }),
            AuditProgressEvent::Finished {
                repo,
                n,
                total,
                violations,
                ok,
            } => serde_json::json!({
                "event": "progress",
                "phase": "finished",
                "repo": repo,
                "n": n,
                "total": total,
                "violations": violations,
                "ok": ok
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl AuditProgressReporter for NoProgress {
    fn report(&self, _event: AuditProgressEvent) {}
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

    pub fn reporter(&self) -> Box<dyn AuditProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Reporter that records events for assertions.
    #[derive(Default)]
    pub struct Recorder(pub Mutex<Vec<AuditProgressEvent>>);

    impl AuditProgressReporter for Recorder {
        fn report(&self, event: AuditProgressEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn recorder_collects_events() {
        let rec = Recorder::default();
        rec.report(AuditProgressEvent::Resolving {
            scope: "platform".into(),
        });
        assert_eq!(rec.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn off_mode_is_silent() {
        ProgressMode::Off.reporter().report(AuditProgressEvent::Started {
            repo: "web".into(),
            n: 1,
            total: 1,
        });
    }
}
