use anyhow::Context;
use ao_cli::{search, SearchArgs};
use clap::{Parser, Subcommand};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

#[derive(Parser)]
#[command(
    name = "allenopt",
    version,
    about = "Hyperparameter tuning for AllenNLP",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize hyperparameters
    Search(SearchArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Search(args) => {
            let outcome = search::run(&args).with_context(|| {
                format!(
                    "search over {} with {} failed",
                    args.search_space.display(),
                    args.base_config.display()
                )
            })?;
            println!("{}", outcome.report()?);
        }
    }

    Ok(())
}
