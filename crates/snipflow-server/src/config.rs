//! Server configuration.

use std::time::Duration;

use clap::Parser;

use snipflow_dispatch::{FanoutConfig, FormatConfig, StreamSettings};
use snipflow_engine::CliEngine;

/// snipflow server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "snipflow-server")]
#[command(about = "Snippet lint/format/test dispatch and interactive execution")]
pub struct Config {
    /// HTTP server address (API, WebSocket sessions, health, metrics).
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub http_addr: String,

    /// Directory holding snippet sources as `<container>/<key>`.
    #[arg(long, default_value = "./content")]
    pub content_root: String,

    /// Language engine executable.
    #[arg(long, default_value = "snipflow-engine")]
    pub engine_path: String,

    /// Extra environment for the engine process, as `KEY=VALUE` (repeatable).
    #[arg(long = "engine-env", value_parser = parse_key_value)]
    pub engine_env: Vec<(String, String)>,

    /// Base URL of the snippet catalog (snippets, rules, test cases).
    #[arg(long, default_value = "http://127.0.0.1:8081")]
    pub catalog_url: String,

    /// Snippets fetched per page during a rule-change fan-out.
    #[arg(long, default_value_t = 20)]
    pub page_size: usize,

    /// Name of this node within every consumer group.
    #[arg(long, default_value = "snipflow-1")]
    pub consumer_name: String,

    /// How long a request consumer blocks per poll (milliseconds).
    #[arg(long, default_value_t = 10_000)]
    pub request_poll_ms: u64,

    /// How long a result consumer blocks per poll (milliseconds).
    #[arg(long, default_value_t = 30_000)]
    pub result_poll_ms: u64,

    /// Records claimed per poll.
    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    /// Keep formatted sources out of the content store.
    #[arg(long)]
    pub no_format_write_back: bool,
}

impl Config {
    pub fn engine(&self) -> CliEngine {
        self.engine_env
            .iter()
            .fold(CliEngine::new(&self.engine_path), |engine, (key, value)| {
                engine.with_env(key, value)
            })
    }

    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            request_poll_timeout: Duration::from_millis(self.request_poll_ms),
            result_poll_timeout: Duration::from_millis(self.result_poll_ms),
            batch_size: self.batch_size.max(1),
            ..StreamSettings::default()
        }
    }

    pub fn fanout(&self) -> FanoutConfig {
        FanoutConfig {
            page_size: self.page_size.max(1),
        }
    }

    pub fn format(&self) -> FormatConfig {
        FormatConfig {
            persist_formatted: !self.no_format_write_back,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::parse_from(["snipflow-server"])
    }
}
