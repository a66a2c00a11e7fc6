mod catalog;
mod cli;
mod color;
mod config;
mod providers;
mod registry;
mod utils;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use cli::{generate::generate_cmd, list::list_cmd, ColorMode};
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "SWITCHBOARD_LOG";

#[derive(
    Parser, Default, Clone, Copy, ValueEnum, strum_macros::Display, strum_macros::EnumString,
)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum RequestedColorMode {
    #[default]
    Auto,
    On,
    Off,
}

#[derive(Parser)]
#[command(name = "switchboard")]
#[command(
    about = "Resolves model identifiers against a discovery backend and generates text",
    version = "0.1.0"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(long, default_value_t = RequestedColorMode::default())]
    color: RequestedColorMode,
    /// Read the configuration from the specified file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a response to a prompt
    Generate(GenerateArgs),
    /// List models or role bindings
    List(ListArgs),
}

#[derive(Parser, Default)]
pub(crate) struct GenerateArgs {
    /// Model identifier or role alias, defaults to the chat role
    #[arg(short, long)]
    model: Option<String>,
    /// Wait for the complete response instead of streaming it
    #[arg(long)]
    no_stream: bool,
    /// The prompt, read from standard input when omitted
    prompt: Option<String>,
}

/// Possible listings
#[derive(Subcommand)]
pub(crate) enum ListObject {
    /// Models available for generation
    Models,
    /// Roles and the models they are bound to
    Roles,
}

/// Output formats
#[derive(
    ValueEnum, Default, Clone, Copy, Debug, PartialEq, Eq, strum_macros::Display,
    strum_macros::EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum ListingFormat {
    /// Format the output as a table
    #[default]
    Table,
    /// Format the output as JSON
    Json,
    /// Format the output as a table without a header
    #[value(alias = "headerless_table")]
    HeaderlessTable,
}

#[derive(Parser)]
pub(crate) struct ListArgs {
    /// Output the listing with the specified format
    #[arg(short, long, default_value_t = ListingFormat::default())]
    format: ListingFormat,
    /// List the specified object
    #[command(subcommand)]
    object: ListObject,
}

/// Diagnostics go to standard error so they never mix with generated text.
fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    color::configure_color(ColorMode::resolve_auto(cli.color));

    init_logging();

    let config = config::read_config(cli.config.clone());
    let settings = config::Settings::from_env(&config);

    let registry = registry::populate::populated_registry(&settings);

    match &cli.command {
        Commands::Generate(args) => generate_cmd(&registry, args).await,
        Commands::List(args) => list_cmd(&registry, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headerless_table_spellings() {
        for spelling in ["headerless_table", "headerless-table"] {
            let cli = Cli::try_parse_from(["switchboard", "list", "-f", spelling, "models"]).unwrap();

            match cli.command {
                Commands::List(args) => {
                    assert_eq!(args.format, ListingFormat::HeaderlessTable);
                    assert!(matches!(args.object, ListObject::Models));
                }
                Commands::Generate(_) => panic!("parsed as generate"),
            }
        }
    }

    #[test]
    fn test_generate_args() {
        let cli = Cli::try_parse_from([
            "switchboard",
            "--color",
            "off",
            "generate",
            "-m",
            "llama3",
            "--no-stream",
            "why is the sky blue?",
        ])
        .unwrap();

        assert!(matches!(cli.color, RequestedColorMode::Off));

        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.model.as_deref(), Some("llama3"));
                assert!(args.no_stream);
                assert_eq!(args.prompt.as_deref(), Some("why is the sky blue?"));
            }
            Commands::List(_) => panic!("parsed as list"),
        }
    }

    #[test]
    fn test_listing_defaults_to_table() {
        let cli = Cli::try_parse_from(["switchboard", "list", "roles"]).unwrap();

        match cli.command {
            Commands::List(args) => {
                assert_eq!(args.format, ListingFormat::Table);
                assert!(matches!(args.object, ListObject::Roles));
            }
            Commands::Generate(_) => panic!("parsed as generate"),
        }
    }
}
