//! Token maintenance commands.

use ecommerce_api::db::TokenBlacklistRepository;

/// Delete blacklist entries whose refresh token has expired anyway.
///
/// # Errors
///
/// Returns an error if the connection or the delete fails.
pub async fn purge() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let removed = TokenBlacklistRepository::new(&pool).purge_expired().await?;

    tracing::info!(removed, "Expired blacklist entries purged");
    Ok(())
}
