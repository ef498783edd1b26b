use clap::Parser;
use log::info;
use server::config::GameConfig;
use server::network::Server;
use shared::DEFAULT_PORT;

/// Authoritative light-cycle game server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on for game connections
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);

    let server = Server::bind(&address, GameConfig::default()).await?;

    tokio::select! {
        result = server.run() => {
            let summary = result?;
            info!(
                "Played {} rounds, final scores {:?}",
                summary.rounds_played, summary.scores
            );
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
