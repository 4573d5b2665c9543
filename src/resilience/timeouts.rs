//! Timeout enforcement.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the inner future is dropped on expiry
//! - Timeout errors are distinct from transport errors

use std::future::Future;
use std::time::Duration;

use crate::error::{RdapError, Result};

/// Race `fut` against `limit`, mapping expiry to `RdapError::Timeout`.
pub async fn with_timeout<F, T>(url: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(url, after = ?limit, "Request timed out");
            Err(RdapError::Timeout {
                url: url.to_string(),
                after: limit,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_expiry_maps_to_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(1)
        };
        let err = with_timeout("https://rdap.example/", Duration::from_secs(1), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, RdapError::Timeout { after, .. } if after == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_passes_through_result() {
        let value = with_timeout("u", Duration::from_secs(1), async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
