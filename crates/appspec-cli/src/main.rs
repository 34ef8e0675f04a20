use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "appspec",
    about = "appspec — translate, encode, and validate app documents",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and canonicalize an app document
    Parse {
        /// Path to the YAML app document
        file: PathBuf,
        /// Output format: json or yaml
        #[arg(short, long, default_value = "json")]
        format: String,
    },
    /// Print the form model, with each field's source lock
    Form {
        file: PathBuf,
    },
    /// Encode an app document as base64 protobuf
    Encode {
        file: PathBuf,
    },
    /// Decode a base64 protobuf app specification.
    ///
    /// Reads standard input when PAYLOAD is `-`.
    Decode {
        payload: String,
    },
    /// Validate an app document against the remote authority
    Validate {
        file: PathBuf,
        /// Commit SHA the document was read from
        #[arg(long)]
        commit: String,
        /// Gateway config file
        #[arg(short, long, default_value = "appspec.toml")]
        config: PathBuf,
        /// Override [gateway].endpoint
        #[arg(long)]
        endpoint: Option<String>,
        /// Override [gateway].timeout (e.g. "10s")
        #[arg(long)]
        timeout: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("appspec=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { file, format } => {
            commands::document::parse(&file, &format)
        }
        Commands::Form { file } => {
            commands::document::form(&file)
        }
        Commands::Encode { file } => {
            commands::document::encode(&file)
        }
        Commands::Decode { payload } => {
            commands::document::decode(&payload)
        }
        Commands::Validate { file, commit, config, endpoint, timeout } => {
            let overrides = commands::validate::Overrides { endpoint, timeout };
            commands::validate::validate(&file, &commit, &config, overrides).await
        }
    }
}
