//! TrustLens CLI
//!
//! # Usage
//! ```bash
//! trustlens analyze ./repo [--config trustlens.toml] [--pretty | --format text]
//! trustlens features ./repo
//! trustlens route ./repo --role security
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use trustlens_agents::config::TrustlensConfig;
use trustlens_agents::llm::{LlmCapability, OpenAiCompatibleClient, UnavailableLlm};
use trustlens_agents::Orchestrator;
use trustlens_core::extraction::FeatureExtractor;
use trustlens_core::features::FeatureSet;
use trustlens_core::routing::route;
use trustlens_core::snapshot::CodebaseSnapshot;
use trustlens_core::types::AgentRole;

mod report;

/// TrustLens - multi-agent trust assessment for AI-generated code
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML, or JSON by extension)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full review and print the recommendation
    Analyze {
        /// Root directory of the codebase
        path: PathBuf,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },

    /// Extract features and print metadata plus the snippet index
    Features {
        /// Root directory of the codebase
        path: PathBuf,
    },

    /// Show the payload one agent would receive
    Route {
        /// Root directory of the codebase
        path: PathBuf,

        /// Target agent
        #[arg(long, value_enum)]
        role: RoleArg,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RoleArg {
    Security,
    Logic,
    Quality,
}

impl From<RoleArg> for AgentRole {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Security => AgentRole::Security,
            RoleArg::Logic => AgentRole::Logic,
            RoleArg::Quality => AgentRole::Quality,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze { path, pretty, format } => {
            let snapshot = CodebaseSnapshot::from_directory(&path, &config.extractor);
            let orchestrator = Orchestrator::from_config(&config, llm_from_config(&config));
            let recommendation = orchestrator.run(&snapshot).await?;

            match format {
                Format::Json if pretty => println!("{}", serde_json::to_string_pretty(&recommendation)?),
                Format::Json => println!("{}", serde_json::to_string(&recommendation)?),
                Format::Text => report::print_recommendation(&recommendation),
            }
        }
        Commands::Features { path } => {
            let features = extract(&path, &config);
            println!("{}", serde_json::to_string_pretty(&report::feature_index(&features))?);
        }
        Commands::Route { path, role } => {
            let features = extract(&path, &config);
            let payload = route(&features, role.into())?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
    }

    Ok(())
}

/// Logs go to stderr so stdout stays machine-readable
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<TrustlensConfig> {
    match path {
        Some(path) => TrustlensConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(TrustlensConfig::default()),
    }
}

fn llm_from_config(config: &TrustlensConfig) -> Arc<dyn LlmCapability> {
    let llm = &config.llm;
    match llm.api_key() {
        Some(key) => Arc::new(
            OpenAiCompatibleClient::new("openai-compatible", Some(key), &llm.base_url, &llm.model)
                .with_temperature(llm.temperature)
                .with_max_tokens(llm.max_tokens),
        ),
        None => {
            tracing::warn!(
                env = %llm.api_key_env,
                "No API key set, security and logic agents will fail"
            );
            Arc::new(UnavailableLlm::new(format!("{} is not set", llm.api_key_env)))
        }
    }
}

fn extract(path: &Path, config: &TrustlensConfig) -> FeatureSet {
    let snapshot = CodebaseSnapshot::from_directory(path, &config.extractor);
    FeatureExtractor::new(config.extractor.clone()).extract(&snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_route_command() {
        let cli = Cli::try_parse_from(["trustlens", "route", "./repo", "--role", "logic", "-v"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Route { path, role } => {
                assert_eq!(path, PathBuf::from("./repo"));
                assert_eq!(AgentRole::from(role), AgentRole::Logic);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_analyze_defaults_to_json() {
        let cli = Cli::try_parse_from(["trustlens", "analyze", "."]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Analyze { pretty: false, format: Format::Json, .. }
        ));
        assert!(cli.config.is_none());

        let cli = Cli::try_parse_from(["trustlens", "analyze", ".", "--pretty", "-c", "t.toml"]).unwrap();
        assert!(matches!(cli.command, Commands::Analyze { pretty: true, .. }));
        assert_eq!(cli.config, Some(PathBuf::from("t.toml")));
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/trustlens.toml"))).is_err());
        assert!(load_config(None).is_ok());
    }
}
