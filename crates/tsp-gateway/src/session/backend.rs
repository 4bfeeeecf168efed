//! Backend connection setup

use std::io;

use tokio::net::TcpStream;

use tsp_core::config::BackendConfig;
use tsp_core::error::SessionError;

/// Open the single TCP connection a session uses to talk to the backend.
///
/// Gives up after `connect_timeout`. There is no retry: a failure ends the
/// session.
pub async fn connect_backend(config: &BackendConfig) -> Result<TcpStream, SessionError> {
    let address = config.address();
    tracing::debug!("Connecting to backend at {}", address);

    let stream = match tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address))
        .await
    {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => return Err(SessionError::BackendUnavailable { address, source }),
        Err(_) => {
            return Err(SessionError::BackendUnavailable {
                source: io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", config.connect_timeout),
                ),
                address,
            })
        }
    };

    // Requests are small and latency-bound
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Failed to set TCP_NODELAY on backend socket: {}", e);
    }

    tracing::debug!("Connected to backend at {}", address);
    Ok(stream)
}
