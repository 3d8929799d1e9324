use clap::Parser;
use rigup::cli::Cli;
use rigup::commands;
use rigup::CommandError;

fn main() {
    // Initialize tracing
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("rigup=info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Execute command. When a provisioning step's underlying tool exits
    // non-zero, exit with that same status.
    if let Err(err) = commands::execute(cli) {
        eprintln!("Error: {err:#}");
        let code = err
            .downcast_ref::<CommandError>()
            .map(CommandError::exit_code)
            .unwrap_or(1);
        std::process::exit(code);
    }
}
