//! Server execution logic.

use std::{future::Future, io, sync::Arc};

use thiserror::Error;
use tokio::net::TcpListener;

use crate::{
    config::{ConfigError, ServerConfig},
    domain::UserRegistry,
    infrastructure::{InMemoryUserRegistry, MessageQueue},
    usecase::{BroadcastDispatcher, SessionContext},
};

use super::{handler::handle_connection, signal::shutdown_signal, state::AppState};

/// Errors that stop the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("failed to accept connection: {0}")]
    Accept(io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// TCP chat server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(ServerConfig::default());
/// server.run("0.0.0.0", 4000).await?;
/// ```
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Bind to `host:port` and serve until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the address cannot be
    /// bound, or accepting connections fails for a non-transient reason.
    pub async fn run(self, host: &str, port: u16) -> Result<(), ServerError> {
        self.config.validate()?;

        let bind_addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: bind_addr.clone(),
                source,
            })?;

        tracing::info!("Chat server listening on {}", listener.local_addr()?);
        tracing::info!("Connect with: nc {} {}", host, port);
        tracing::info!("Press Ctrl+C to shutdown");

        self.serve(listener, shutdown_signal()).await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }

    /// Accept connections on `listener` until `shutdown` resolves.
    ///
    /// Starts the broadcast dispatcher, then hands every accepted connection
    /// to its own detached task.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        self.config.validate()?;

        let (queue, consumer) = MessageQueue::bounded(self.config.queue_capacity);
        let registry: Arc<dyn UserRegistry> = Arc::new(InMemoryUserRegistry::new(
            self.config.max_users,
            self.config.server_nickname.as_str(),
            queue.clone(),
        ));
        tokio::spawn(BroadcastDispatcher::new(registry.clone(), consumer).run());

        let state = Arc::new(AppState::new(
            SessionContext {
                registry,
                queue,
                server_nickname: Arc::from(self.config.server_nickname.as_str()),
                max_nickname_len: self.config.max_nickname_len,
            },
            self.config.max_line_len,
            self.config.outbound_buffer,
        ));

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, address)) => {
                        tokio::spawn(handle_connection(stream, address, state.clone()));
                    }
                    Err(e) if is_transient(&e) => {
                        tracing::warn!("Transient accept error: {}", e);
                    }
                    Err(e) => return Err(ServerError::Accept(e)),
                },
            }
        }

        Ok(())
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        // テスト項目: 接続単位の accept エラーのみ一時的なものとして扱う
        // given (前提条件) / when (操作) / then (期待する結果):
        assert!(is_transient(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_transient(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_transient(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }

    #[tokio::test]
    async fn test_serve_rejects_invalid_config() {
        // テスト項目: 不正な設定では起動しない
        // given (前提条件):
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::new(ServerConfig {
            queue_capacity: 0,
            ..ServerConfig::default()
        });

        // when (操作):
        let result = server.serve(listener, std::future::ready(())).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ServerError::Config(ConfigError::Zero("queue_capacity")))
        ));
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        // テスト項目: シャットダウン信号で accept ループが終了する
        // given (前提条件):
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = Server::new(ServerConfig::default());

        // when (操作):
        let result = server.serve(listener, std::future::ready(())).await;

        // then (期待する結果):
        assert!(result.is_ok());
    }
}
