use clap::Parser;
use risk_engine::cli::{build_engine, Cli, Commands};
use risk_engine::config::Config;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = if Path::new(&cli.config).exists() {
        Config::load(&cli.config)?
    } else {
        eprintln!("Warning: {} not found, using default configuration", cli.config);
        Config::default()
    };

    // Initialize telemetry
    risk_engine::telemetry::init_telemetry(&config.telemetry)?;

    if let Commands::Config = cli.command {
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            print!("{}", toml::to_string_pretty(&config)?);
        }
        return Ok(());
    }

    let engine = build_engine(&config)?;

    match cli.command {
        Commands::Decide(args) => args.execute(&engine, cli.json).await?,
        Commands::Forecast(args) => args.execute(&engine, cli.json).await?,
        Commands::Portfolio(args) => {
            args.execute(&engine, config.portfolio.starting_capital_zar, cli.json)
                .await?
        }
        Commands::Decisions(args) => args.execute(&engine, cli.json).await?,
        Commands::Reject(args) => args.execute(&engine, cli.json).await?,
        Commands::Approve(args) => args.execute(&engine, cli.json).await?,
        Commands::Execute(args) => args.execute(&engine, cli.json).await?,
        Commands::Config => {}
    }

    Ok(())
}
