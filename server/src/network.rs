//! Server network layer: accepts game connections and runs the match

use crate::config::GameConfig;
use crate::connection::{handle_connection, MatchContext};
use crate::error::ServerError;
use crate::lifecycle::{MatchPhase, MatchRunner, MatchSummary};
use crate::roster::Roster;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Main server coordinating connections and the match
pub struct Server {
    listener: TcpListener,
    context: MatchContext,
    config: GameConfig,
}

impl Server {
    pub async fn bind(addr: &str, config: GameConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Game server listening on {}", listener.local_addr()?);

        let (phase, _) = watch::channel(MatchPhase::Lobby);
        let context = MatchContext {
            roster: Roster::shared(config.max_players),
            phase: Arc::new(phase),
        };

        Ok(Server {
            listener,
            context,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Spawns the task that accepts connections for the lifetime of the match
    fn spawn_acceptor(listener: TcpListener, context: MatchContext) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            warn!("Failed to disable Nagle for {}: {}", addr, e);
                        }

                        let context = context.clone();
                        tokio::spawn(async move {
                            match handle_connection(stream, addr, context).await {
                                Ok(()) => {}
                                Err(ServerError::RegistrationClosed) => {
                                    warn!("Rejected {}: match already started", addr)
                                }
                                Err(e) => warn!("Connection from {} ended: {}", addr, e),
                            }
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        })
    }

    /// Runs the match to completion.
    ///
    /// Connections are accepted until everybody registered is ready; the
    /// rounds are then played and the final standings returned.
    pub async fn run(self) -> Result<MatchSummary, ServerError> {
        let Server {
            listener,
            context,
            config,
        } = self;

        let acceptor = Self::spawn_acceptor(listener, context.clone());
        info!("Server started, waiting for players");

        let runner = MatchRunner::new(context.roster.clone(), Arc::clone(&context.phase), config);
        let summary = runner.run().await;

        acceptor.abort();
        Ok(summary)
    }
}
