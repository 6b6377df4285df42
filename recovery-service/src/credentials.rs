use anyhow::Result;
use secrecy::SecretString;
use tracing::debug;

use crate::store::CheckoutStore;

const LEGACY_SUFFIX: &str = ".0";

/// Looks up the access token for a normalized store id. Stores registered
/// before ids were normalized live under the `"<id>.0"` form, so a miss is
/// retried with that suffix. `Ok(None)` means the store is unknown.
pub async fn resolve_access_token(
    store: &dyn CheckoutStore,
    store_id: &str,
) -> Result<Option<SecretString>> {
    if let Some(token) = store.find_store_by_id(store_id).await? {
        return Ok(Some(token));
    }
    if store_id.ends_with(LEGACY_SUFFIX) {
        return Ok(None);
    }

    let legacy_id = format!("{store_id}{LEGACY_SUFFIX}");
    let token = store.find_store_by_id(&legacy_id).await?;
    if token.is_some() {
        debug!(store_id, legacy_id = %legacy_id, "Resolved credential under legacy store id");
    }
    Ok(token)
}
