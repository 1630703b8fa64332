//! Language engine contract.
//!
//! The engine is a blocking capability: every call runs to completion on the
//! calling thread. Callers on an async runtime must move calls onto a blocking
//! thread. Interactive execution talks back to its caller through two
//! adapters, [`OutputSink`] for produced output and [`InputSource`] for input
//! the program asks for.

use std::collections::VecDeque;

use serde_json::Value;

use snipflow_core::Violation;

use crate::error::EngineError;

/// Source plus everything the engine needs to interpret it.
#[derive(Debug, Clone, Copy)]
pub struct EngineInput<'a> {
    pub source: &'a str,
    pub version: &'a str,
    pub language: Option<&'a str>,
    /// Rule configuration (lint or format rules); an empty object for defaults.
    pub config: &'a Value,
}

/// Receives each output line produced while a program runs.
pub trait OutputSink {
    /// Deliver one output line. An error aborts the execution.
    fn emit(&mut self, line: &str) -> Result<(), EngineError>;
}

/// Supplies input when a running program asks for it.
pub trait InputSource {
    /// Block until a value for `prompt` is available.
    fn read(&mut self, prompt: &str) -> Result<String, EngineError>;
}

/// The language engine.
pub trait LanguageEngine: Send + Sync {
    /// Report every rule violation in the source.
    fn lint(&self, input: &EngineInput<'_>) -> Result<Vec<Violation>, EngineError>;

    /// Return the source reformatted according to the configuration.
    fn format(&self, input: &EngineInput<'_>) -> Result<String, EngineError>;

    /// Run the program, streaming output through `output` and pulling input
    /// through `input`.
    fn execute(
        &self,
        input: &EngineInput<'_>,
        output: &mut dyn OutputSink,
        stdin: &mut dyn InputSource,
    ) -> Result<(), EngineError>;

    /// Run the program with a fixed list of inputs and collect its output.
    fn run_test(&self, input: &EngineInput<'_>, inputs: &[String]) -> Result<Vec<String>, EngineError> {
        let mut output = CollectingOutput::default();
        let mut feed = ScriptedInput::new(inputs.iter().cloned());
        self.execute(input, &mut output, &mut feed)?;
        Ok(output.into_lines())
    }
}

/// Output sink that keeps every line.
#[derive(Debug, Default)]
pub struct CollectingOutput {
    lines: Vec<String>,
}

impl CollectingOutput {
    /// Lines collected so far.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}

impl OutputSink for CollectingOutput {
    fn emit(&mut self, line: &str) -> Result<(), EngineError> {
        self.lines.push(line.to_string());
        Ok(())
    }
}

/// Input source that answers from a prepared list, in order.
#[derive(Debug, Default)]
pub struct ScriptedInput {
    values: VecDeque<String>,
}

impl ScriptedInput {
    pub fn new(values: impl IntoIterator<Item = String>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

impl InputSource for ScriptedInput {
    fn read(&mut self, _prompt: &str) -> Result<String, EngineError> {
        self.values.pop_front().ok_or(EngineError::InputExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Echoes each input back as output, prefixed by its prompt.
    struct EchoEngine;

    impl LanguageEngine for EchoEngine {
        fn lint(&self, _input: &EngineInput<'_>) -> Result<Vec<Violation>, EngineError> {
            Ok(vec![])
        }

        fn format(&self, input: &EngineInput<'_>) -> Result<String, EngineError> {
            Ok(input.source.to_string())
        }

        fn execute(
            &self,
            input: &EngineInput<'_>,
            output: &mut dyn OutputSink,
            stdin: &mut dyn InputSource,
        ) -> Result<(), EngineError> {
            for prompt in input.source.lines() {
                let value = stdin.read(prompt)?;
                output.emit(&format!("{prompt}{value}"))?;
            }
            Ok(())
        }
    }

    fn input<'a>(source: &'a str, config: &'a Value) -> EngineInput<'a> {
        EngineInput {
            source,
            version: "1.1",
            language: None,
            config,
        }
    }

    #[test]
    fn test_run_test_feeds_inputs_in_order() {
        let config = Value::Null;
        let outputs = EchoEngine
            .run_test(&input("a:\nb:", &config), &["1".to_string(), "2".to_string()])
            .unwrap();
        assert_eq!(outputs, vec!["a:1", "b:2"]);
    }

    #[test]
    fn test_run_test_fails_when_inputs_run_out() {
        let config = Value::Null;
        let err = EchoEngine
            .run_test(&input("a:\nb:", &config), &["1".to_string()])
            .unwrap_err();
        assert!(matches!(err, EngineError::InputExhausted));
    }
}
