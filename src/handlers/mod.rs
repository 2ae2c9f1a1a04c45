pub mod debug;
pub mod metrics;

pub use debug::{DebugOptions, handle_debug};
pub use metrics::{MetricsOptions, handle_metrics};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

use crate::analysis::{LlmClient, LlmProvider};
use crate::cli::{LlmArgs, OutputFormat};
use crate::config::Config;
use crate::error::Result;

/// Settings shared by every command, already merged with the config file.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub namespace: String,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl GlobalOptions {
    /// Progress and warnings go to the terminal only for human output.
    pub fn interactive(&self) -> bool {
        !self.quiet && self.output == OutputFormat::Human
    }

    pub fn warn(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {}", "⚠".yellow(), message.yellow());
        }
    }

    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.interactive() {
            return None;
        }

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        Some(spinner)
    }
}

pub(crate) fn finish(spinner: Option<ProgressBar>) {
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
}

/// Resolve the LLM client from CLI flags, environment and config.
pub(crate) fn llm_client(args: &LlmArgs, config: &Config) -> Result<LlmClient> {
    let provider = match args.provider.as_deref().or(config.llm.provider.as_deref()) {
        Some(name) => name.parse::<LlmProvider>()?,
        None => LlmProvider::default(),
    };
    Ok(LlmClient::new(provider, args.model.clone(), config.llm.model.clone())?)
}
