//! supasurvey CLI — schema conversion, linting, and response scoring.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "supasurvey", version, about = "Schema-driven survey scoring")]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a schema between the flat CSV table and the JSON format
    Convert {
        /// Input schema (.csv or .json)
        #[arg(long)]
        input: PathBuf,

        /// Output schema (.csv or .json)
        #[arg(long)]
        output: PathBuf,
    },

    /// Check a schema for problems
    Validate {
        /// Schema file (.csv or .json)
        #[arg(long)]
        schema: Option<PathBuf>,
    },

    /// Score stored responses against a schema
    Score {
        /// Schema file (.csv or .json)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Responses JSON file
        #[arg(long)]
        responses: PathBuf,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,

        /// Write the report to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check a verifier score against a question set's max score
    Verify {
        /// Schema file (.csv or .json)
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Question set id
        #[arg(long)]
        questionset: u32,

        /// Verifier score, e.g. "12.5"
        #[arg(long, allow_hyphen_values = true)]
        score: String,
    },

    /// Create a starter config, schema, and responses file
    Init,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("supasurvey=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;

    let result = match cli.command {
        Commands::Convert { input, output } => commands::convert::execute(input, output),
        Commands::Validate { schema } => commands::validate::execute(schema, config),
        Commands::Score {
            schema,
            responses,
            format,
            output,
        } => commands::score::execute(schema, responses, format, output, config),
        Commands::Verify {
            schema,
            questionset,
            score,
        } => commands::verify::execute(schema, questionset, score, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
