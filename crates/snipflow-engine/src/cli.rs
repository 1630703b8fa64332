//! Language engine backed by an external CLI process.
//!
//! The engine binary is invoked once per operation:
//!
//! ```text
//! <engine> <lint|format|test|execute> --version <v> [--language <id>]
//! ```
//!
//! The first stdin line is a JSON request carrying the source, the rule
//! configuration and, for `test`, the prepared inputs. The engine answers
//! with JSON lines on stdout, each tagged by `type`: `output`, `diagnostic`,
//! `formatted`, `input_request`, `error`.
//! During `execute`, every `input_request` is answered with an `input` line
//! on stdin.

use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use snipflow_core::Violation;

use crate::engine::{EngineInput, InputSource, LanguageEngine, OutputSink};
use crate::error::EngineError;

/// Request written as the first stdin line.
#[derive(Debug, Serialize)]
struct EngineRequest<'a> {
    source: &'a str,
    version: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language: Option<&'a str>,
    config: &'a Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    inputs: Option<&'a [String]>,
}

/// Reply to an input request.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EngineReply<'a> {
    Input { value: &'a str },
}

/// One stdout line from the engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EngineLine {
    Output {
        value: String,
    },
    Diagnostic {
        message: String,
        line: u32,
        column: u32,
        #[serde(default)]
        rule: Option<String>,
    },
    Formatted {
        value: String,
    },
    InputRequest {
        #[serde(default)]
        prompt: String,
    },
    Error {
        message: String,
    },
}

/// Language engine that shells out to the engine CLI.
#[derive(Debug, Clone)]
pub struct CliEngine {
    /// Path to the engine executable.
    engine_path: String,

    /// Additional environment variables.
    env_vars: Vec<(String, String)>,
}

impl CliEngine {
    /// Create an engine invoking the given executable.
    ///
    /// The path can be a bare name to use PATH lookup, or a full path.
    pub fn new(engine_path: impl Into<String>) -> Self {
        Self {
            engine_path: engine_path.into(),
            env_vars: Vec::new(),
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    fn spawn(&self, operation: &str, input: &EngineInput<'_>) -> Result<Child, EngineError> {
        let mut cmd = Command::new(&self.engine_path);
        cmd.arg(operation).arg("--version").arg(input.version);
        if let Some(language) = input.language {
            cmd.arg("--language").arg(language);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        debug!(engine = %self.engine_path, operation, "Spawning engine process");
        let mut child = cmd.spawn()?;

        if let Some(stderr) = child.stderr.take() {
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines() {
                    match line {
                        Ok(line) if !line.trim().is_empty() => {
                            warn!(stderr = %line.trim(), "Engine stderr");
                        }
                        Ok(_) => {}
                        Err(_) => break,
                    }
                }
            });
        }

        Ok(child)
    }

    /// Run one operation, handing every stdout line to `on_line`.
    ///
    /// stdin stays open only for interactive runs. An `error` line from the
    /// engine, or a failing `on_line`, ends the run with that error.
    fn run<F>(
        &self,
        operation: &str,
        input: &EngineInput<'_>,
        inputs: Option<&[String]>,
        interactive: bool,
        mut on_line: F,
    ) -> Result<(), EngineError>
    where
        F: FnMut(EngineLine, &mut Option<ChildStdin>) -> Result<(), EngineError>,
    {
        let mut child = self.spawn(operation, input)?;

        let mut stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| EngineError::Protocol("Failed to get stdout".to_string()))?;

        let request = EngineRequest {
            source: input.source,
            version: input.version,
            language: input.language,
            config: input.config,
            inputs,
        };
        if let Some(pipe) = stdin.as_mut() {
            write_line(pipe, &serde_json::to_string(&request)?)?;
        }
        if !interactive {
            stdin = None;
        }

        let mut outcome = Ok(());
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let parsed = serde_json::from_str::<EngineLine>(trimmed).map_err(|e| {
                let preview: String = trimmed.chars().take(200).collect();
                EngineError::Protocol(format!("{e}: {preview}"))
            });
            let step = match parsed {
                Ok(EngineLine::Error { message }) => Err(EngineError::Engine(message)),
                Ok(parsed) => on_line(parsed, &mut stdin),
                Err(e) => Err(e),
            };
            if let Err(e) = step {
                outcome = Err(e);
                break;
            }
        }

        drop(stdin);
        if outcome.is_err() {
            // Nothing more is wanted from the process.
            child.kill().ok();
            child.wait().ok();
            return outcome;
        }

        let status = child.wait()?;
        if !status.success() {
            return Err(EngineError::ProcessError(format!(
                "{} {} exited with code {}",
                self.engine_path,
                operation,
                status.code().unwrap_or(-1)
            )));
        }

        Ok(())
    }
}

fn write_line(pipe: &mut ChildStdin, json: &str) -> Result<(), EngineError> {
    pipe.write_all(json.as_bytes())?;
    pipe.write_all(b"\n")?;
    pipe.flush()?;
    Ok(())
}

fn unexpected(operation: &str, line: &EngineLine) -> EngineError {
    EngineError::Protocol(format!("unexpected line during {operation}: {line:?}"))
}

impl LanguageEngine for CliEngine {
    fn lint(&self, input: &EngineInput<'_>) -> Result<Vec<Violation>, EngineError> {
        let mut violations = Vec::new();
        self.run("lint", input, None, false, |line, _| match line {
            EngineLine::Diagnostic {
                message,
                line,
                column,
                rule,
            } => {
                violations.push(Violation {
                    message,
                    line,
                    column,
                    rule,
                });
                Ok(())
            }
            other => Err(unexpected("lint", &other)),
        })?;
        info!(violations = violations.len(), "Lint finished");
        Ok(violations)
    }

    fn format(&self, input: &EngineInput<'_>) -> Result<String, EngineError> {
        let mut formatted = None;
        self.run("format", input, None, false, |line, _| match line {
            EngineLine::Formatted { value } => {
                formatted = Some(value);
                Ok(())
            }
            other => Err(unexpected("format", &other)),
        })?;
        formatted.ok_or_else(|| EngineError::Protocol("format produced no output".to_string()))
    }

    fn execute(
        &self,
        input: &EngineInput<'_>,
        output: &mut dyn OutputSink,
        source: &mut dyn InputSource,
    ) -> Result<(), EngineError> {
        self.run("execute", input, None, true, |line, stdin| match line {
            EngineLine::Output { value } => output.emit(&value),
            EngineLine::InputRequest { prompt } => {
                let value = source.read(&prompt)?;
                let pipe = stdin
                    .as_mut()
                    .ok_or_else(|| EngineError::Protocol("stdin closed".to_string()))?;
                write_line(pipe, &serde_json::to_string(&EngineReply::Input { value: &value })?)
            }
            other => Err(unexpected("execute", &other)),
        })
    }

    fn run_test(&self, input: &EngineInput<'_>, inputs: &[String]) -> Result<Vec<String>, EngineError> {
        let mut outputs = Vec::new();
        self.run("test", input, Some(inputs), false, |line, _| match line {
            EngineLine::Output { value } => {
                outputs.push(value);
                Ok(())
            }
            EngineLine::InputRequest { .. } => Err(EngineError::InputExhausted),
            other => Err(unexpected("test", &other)),
        })?;
        Ok(outputs)
    }
}

impl Default for CliEngine {
    fn default() -> Self {
        Self::new("snipflow-engine")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_builder() {
        let engine = CliEngine::new("/opt/engine/bin/engine").with_env("ENGINE_HOME", "/opt/engine");
        assert_eq!(engine.engine_path, "/opt/engine/bin/engine");
        assert_eq!(engine.env_vars.len(), 1);
        assert_eq!(CliEngine::default().engine_path, "snipflow-engine");
    }

    #[test]
    fn test_engine_line_parsing() {
        let line: EngineLine =
            serde_json::from_str(r#"{"type":"diagnostic","message":"unused","line":2,"column":5}"#)
                .unwrap();
        assert_eq!(
            line,
            EngineLine::Diagnostic {
                message: "unused".into(),
                line: 2,
                column: 5,
                rule: None,
            }
        );

        let line: EngineLine = serde_json::from_str(r#"{"type":"input_request"}"#).unwrap();
        assert_eq!(
            line,
            EngineLine::InputRequest {
                prompt: String::new()
            }
        );
    }

    #[test]
    fn test_request_carries_inputs_only_for_tests() {
        let config = serde_json::json!({});
        let inputs = vec!["Ada".to_string()];
        let request = EngineRequest {
            source: "x",
            version: "1.1",
            language: None,
            config: &config,
            inputs: Some(&inputs),
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"source":"x","version":"1.1","config":{},"inputs":["Ada"]}"#
        );

        let request = EngineRequest { inputs: None, ..request };
        assert!(!serde_json::to_string(&request).unwrap().contains("inputs"));
    }

    #[test]
    fn test_reply_serialization() {
        let json = serde_json::to_string(&EngineReply::Input { value: "42" }).unwrap();
        assert_eq!(json, r#"{"type":"input","value":"42"}"#);
    }

    #[test]
    fn test_missing_engine_binary_is_io_error() {
        let engine = CliEngine::new("/nonexistent/snipflow-engine-for-tests");
        let config = Value::Null;
        let input = EngineInput {
            source: "println(1);",
            version: "1.1",
            language: None,
            config: &config,
        };
        assert!(matches!(engine.lint(&input), Err(EngineError::Io(_))));
    }

    /// Engine executable that runs the shell snippet in `ENGINE_SCRIPT`.
    /// Written once so no test forks while the file is open for writing.
    #[cfg(unix)]
    fn script_engine(script: &str) -> CliEngine {
        use std::os::unix::fs::PermissionsExt;
        use std::path::PathBuf;
        use std::sync::OnceLock;

        static PATH: OnceLock<PathBuf> = OnceLock::new();
        let path = PATH.get_or_init(|| {
            let path = std::env::temp_dir().join(format!("snipflow-engine-{}.sh", std::process::id()));
            std::fs::write(&path, "#!/bin/sh\neval \"$ENGINE_SCRIPT\"\n").unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        });
        CliEngine::new(path.to_string_lossy()).with_env("ENGINE_SCRIPT", script)
    }

    #[cfg(unix)]
    fn run_input(config: &Value) -> EngineInput<'_> {
        EngineInput {
            source: "println(1);",
            version: "1.1",
            language: None,
            config,
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_answers_input_requests() {
        let engine = script_engine(
            r#"[ "$1" = execute ] && [ "$3" = 1.1 ] || exit 9
read request
echo '{"type":"output","value":"hi"}'
echo '{"type":"input_request","prompt":"name?"}'
read reply
case "$reply" in
  *'"type":"input","value":"got"'*) echo '{"type":"output","value":"got"}' ;;
  *) exit 4 ;;
esac"#,
        );
        let config = Value::Null;
        let mut output = crate::CollectingOutput::default();
        let mut input = crate::ScriptedInput::new(vec!["got".to_string()]);

        engine.execute(&run_input(&config), &mut output, &mut input).unwrap();

        assert_eq!(output.lines(), ["hi", "got"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_lint_collects_diagnostics() {
        let engine = script_engine(
            r#"[ "$1" = lint ] || exit 9
read request
echo '{"type":"diagnostic","message":"unused variable","line":2,"column":5,"rule":"no-unused"}'
echo ''
echo '{"type":"diagnostic","message":"missing semicolon","line":3,"column":1}'"#,
        );
        let config = Value::Null;

        let violations = engine.lint(&run_input(&config)).unwrap();

        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].message, "unused variable");
        assert_eq!((violations[0].line, violations[0].column), (2, 5));
        assert_eq!(violations[0].rule.as_deref(), Some("no-unused"));
        assert_eq!(violations[1].rule, None);
    }

    #[cfg(unix)]
    #[test]
    fn test_format_and_test_runs() {
        let engine = script_engine(
            r#"read request
case "$1" in
  format) echo '{"type":"formatted","value":"let x = 1;"}' ;;
  test)
    case "$request" in
      *'"inputs":["Ada"]'*) echo '{"type":"output","value":"Hello Ada"}' ;;
      *) exit 5 ;;
    esac ;;
esac"#,
        );
        let config = Value::Null;

        assert_eq!(engine.format(&run_input(&config)).unwrap(), "let x = 1;");
        assert_eq!(
            engine.run_test(&run_input(&config), &["Ada".to_string()]).unwrap(),
            vec!["Hello Ada".to_string()]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_process_error() {
        let engine = script_engine("read request\nexit 3");
        let config = Value::Null;

        match engine.lint(&run_input(&config)) {
            Err(EngineError::ProcessError(message)) => {
                assert!(message.ends_with("lint exited with code 3"), "{message}")
            }
            other => panic!("expected process error, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_error_line_stops_the_process() {
        let engine = script_engine(
            r#"read request
echo '{"type":"output","value":"partial"}'
echo '{"type":"error","message":"division by zero"}'
sleep 30
echo '{"type":"output","value":"late"}'"#,
        );
        let config = Value::Null;
        let mut output = crate::CollectingOutput::default();
        let mut input = crate::ScriptedInput::default();

        let started = std::time::Instant::now();
        let err = engine
            .execute(&run_input(&config), &mut output, &mut input)
            .unwrap_err();

        assert!(matches!(err, EngineError::Engine(ref m) if m == "division by zero"));
        assert_eq!(output.lines(), ["partial"]);
        assert!(started.elapsed() < std::time::Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[test]
    fn test_input_request_during_test_run_is_exhausted() {
        let engine = script_engine(
            r#"read request
echo '{"type":"input_request","prompt":"more?"}'"#,
        );
        let config = Value::Null;

        let err = engine.run_test(&run_input(&config), &[]).unwrap_err();
        assert!(matches!(err, EngineError::InputExhausted));
    }
}
