use clap::Parser;
use newsniche::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "newsniche=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { path, name }) => {
            newsniche::cli::init::run(path, name).await?;
        }
        Some(Commands::Serve { host, port }) => {
            newsniche::cli::serve::run(&cli.config, host, port).await?;
        }
        Some(Commands::Migrate { command }) => {
            newsniche::cli::migrate::run(&cli.config, command).await?;
        }
        Some(Commands::User { command }) => {
            newsniche::cli::user::run(&cli.config, command).await?;
        }
        Some(Commands::FixSlugs) => {
            newsniche::cli::fix_slugs::run(&cli.config).await?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
