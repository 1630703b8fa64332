//! Shared application state.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use snipflow_dispatch::{Collaborators, Dispatch};
use snipflow_engine::{CatalogClient, FsContentStore};
use snipflow_session::{SessionRegistry, SessionServices};
use snipflow_stream::InMemoryStreams;

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// Producers, fan-out and consumers over the stream transport.
    pub dispatch: Dispatch,

    /// Live interactive sessions.
    pub sessions: Arc<SessionRegistry>,

    /// Content store and engine handed to each new session.
    pub session_services: SessionServices,

    /// Root token; cancelling it stops consumers and sessions.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Create a new AppState wrapped in Arc.
    pub fn new(
        dispatch: Dispatch,
        session_services: SessionServices,
        shutdown: CancellationToken,
    ) -> Arc<Self> {
        Arc::new(Self {
            dispatch,
            sessions: Arc::new(SessionRegistry::with_shutdown(shutdown.child_token())),
            session_services,
            shutdown,
        })
    }

    /// Wire the production collaborators described by `config`.
    pub fn from_config(config: &Config, shutdown: CancellationToken) -> Arc<Self> {
        let content = Arc::new(FsContentStore::new(&config.content_root));
        let engine = Arc::new(config.engine());
        let catalog = Arc::new(CatalogClient::new(&config.catalog_url));

        let collaborators = Collaborators {
            content: content.clone(),
            engine: engine.clone(),
            rules: catalog.clone(),
            tests: catalog.clone(),
        };
        let dispatch = Dispatch::new(
            Arc::new(InMemoryStreams::new()),
            config.stream_settings(),
            collaborators,
            catalog,
            config.fanout(),
            config.format(),
        );

        Self::new(dispatch, SessionServices { content, engine }, shutdown)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::time::Duration;

    use snipflow_core::Violation;
    use snipflow_dispatch::{FanoutConfig, FormatConfig, StreamSettings};
    use snipflow_engine::memory::{
        MemoryContentStore, MemoryRuleStore, MemorySnippetStore, MemoryTestCaseStore,
    };
    use snipflow_engine::{EngineError, EngineInput, InputSource, LanguageEngine, OutputSink};

    /// `print X` emits X, `read P` asks with prompt P and echoes the answer.
    pub(crate) struct ScriptEngine;

    impl LanguageEngine for ScriptEngine {
        fn lint(&self, _input: &EngineInput<'_>) -> Result<Vec<Violation>, EngineError> {
            Ok(Vec::new())
        }

        fn format(&self, input: &EngineInput<'_>) -> Result<String, EngineError> {
            Ok(input.source.trim().to_string())
        }

        fn execute(
            &self,
            input: &EngineInput<'_>,
            output: &mut dyn OutputSink,
            stdin: &mut dyn InputSource,
        ) -> Result<(), EngineError> {
            for line in input.source.lines() {
                if let Some(text) = line.strip_prefix("print ") {
                    output.emit(text)?;
                } else if let Some(prompt) = line.strip_prefix("read ") {
                    let value = stdin.read(prompt)?;
                    output.emit(&value)?;
                }
            }
            Ok(())
        }
    }

    /// State over in-memory collaborators with one source at `snippets/u1/5`.
    pub(crate) fn test_state(source: &str) -> Arc<AppState> {
        let content = Arc::new(MemoryContentStore::new().with_content("snippets", "u1/5", source));
        let engine = Arc::new(ScriptEngine);
        let collaborators = Collaborators {
            content: content.clone(),
            engine: engine.clone(),
            rules: Arc::new(MemoryRuleStore::new()),
            tests: Arc::new(MemoryTestCaseStore::new()),
        };
        let settings = StreamSettings {
            request_poll_timeout: Duration::from_millis(50),
            result_poll_timeout: Duration::from_millis(50),
            ..StreamSettings::default()
        };
        let dispatch = Dispatch::new(
            Arc::new(InMemoryStreams::new()),
            settings,
            collaborators,
            Arc::new(MemorySnippetStore::new()),
            FanoutConfig::default(),
            FormatConfig::default(),
        );
        AppState::new(dispatch, SessionServices { content, engine }, CancellationToken::new())
    }
}
