use redis::aio::ConnectionManager;

use crate::error::StoreError;

/// Creates a single `ConnectionManager` that auto-reconnects on failure.
///
/// `ConnectionManager` is cheaply cloneable — every clone shares the same
/// underlying multiplexed TCP connection, which is plenty for a handful of
/// increments per flush.
pub async fn connect(url: &str) -> Result<ConnectionManager, StoreError> {
    let client = redis::Client::open(url)
        .map_err(|e| StoreError::Unavailable(format!("invalid Redis URL {url:?}: {e}")))?;

    let conn = ConnectionManager::new(client)
        .await
        .map_err(|e| StoreError::Unavailable(format!("cannot connect to Redis at {url}: {e}")))?;

    tracing::info!(%url, "connected to redis");
    Ok(conn)
}
