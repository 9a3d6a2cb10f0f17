//! `MorrisServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → auth → registry. One
//! registry behind one coordinating lock; one spawned handler task per
//! accepted connection.

use std::sync::Arc;

use morris_auth::CredentialGateway;
use morris_protocol::{Codec, JsonCodec};
use morris_registry::{Registry, RulesEngine};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use crate::ServerError;
use crate::net::handle_socket;

/// Produces a fresh rules engine for every new game.
///
/// The server never implements game rules itself; this is the seam the
/// external rules engine is plugged in through.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: RulesEngine;

    fn create(&self) -> Self::Engine;
}

/// Any `Fn() -> E` closure works as a factory.
impl<E, F> EngineFactory for F
where
    E: RulesEngine,
    F: Fn() -> E + Send + Sync + 'static,
{
    type Engine = E;

    fn create(&self) -> E {
        self()
    }
}

/// Shared server state passed to each connection handler task.
///
/// The registry mutex is the global coordinating lock: every compound
/// registry operation happens under it, and it is always taken before any
/// per-game lock, never after.
pub(crate) struct ServerState<F: EngineFactory, C: CredentialGateway, G: Codec> {
    pub(crate) registry: Mutex<Registry<F::Engine>>,
    pub(crate) engines: F,
    pub(crate) credentials: C,
    pub(crate) codec: G,
}

/// Builder for configuring and starting a morris server.
///
/// # Example
///
/// ```rust,ignore
/// let server = MorrisServer::builder()
///     .bind("0.0.0.0:8080")
///     .build(my_engine_factory, my_credentials)
///     .await?;
/// server.run().await
/// ```
pub struct MorrisServerBuilder {
    bind_addr: String,
}

impl MorrisServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Binds the listener and assembles the server state.
    ///
    /// Uses `JsonCodec` for the wire format.
    pub async fn build<F, C>(
        self,
        engines: F,
        credentials: C,
    ) -> Result<MorrisServer<F, C, JsonCodec>, ServerError>
    where
        F: EngineFactory,
        C: CredentialGateway,
    {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        tracing::info!(addr = %self.bind_addr, "listening");

        let state = Arc::new(ServerState {
            registry: Mutex::new(Registry::new()),
            engines,
            credentials,
            codec: JsonCodec,
        });

        Ok(MorrisServer { listener, state })
    }
}

impl Default for MorrisServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running morris server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct MorrisServer<F: EngineFactory, C: CredentialGateway, G: Codec> {
    listener: TcpListener,
    state: Arc<ServerState<F, C, G>>,
}

impl<F, C, G> MorrisServer<F, C, G>
where
    F: EngineFactory,
    C: CredentialGateway,
    G: Codec + Send + Sync + 'static,
{
    pub fn builder() -> MorrisServerBuilder {
        MorrisServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Each accepted connection gets its own handler task. An accept
    /// failure is logged and the loop continues; a handler failure never
    /// reaches the loop at all.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("morris server running");

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_socket(stream, addr, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
