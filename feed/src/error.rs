use thiserror::Error;

/// Why a live connection attempt or session ended. Connection loss is never
/// surfaced as a stream error; these only ride along on status events.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("websocket transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("server closed the connection")]
    ConnectionClosed,
}
