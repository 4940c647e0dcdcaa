use crate::error::{AuthError, AuthResult};
use redis::aio::MultiplexedConnection;
use redis::Client;

/// Creates a new multiplexed Redis connection.
///
/// Logs the failure; callers surface it as an internal error.
pub(crate) async fn connect(client: &Client) -> AuthResult<MultiplexedConnection> {
    // ---
    client
        .get_multiplexed_async_connection()
        .await
        .map_err(|err| {
            tracing::error!("Failed to connect to Redis: {:?}", err);
            AuthError::from(err)
        })
}

/// Longest lifetime a challenge or session can be given.
const MAX_TTL_DAYS: i64 = 3650;

/// Converts a std duration into a chrono one, capped at ten years.
pub(crate) fn chrono_ttl(ttl: std::time::Duration) -> chrono::Duration {
    // ---
    chrono::Duration::from_std(ttl)
        .ok()
        .filter(|d| *d <= chrono::Duration::days(MAX_TTL_DAYS))
        .unwrap_or_else(|| chrono::Duration::days(MAX_TTL_DAYS))
}
