use clopetracker_common::StoredAsset;

use super::storage::AssetStorage;

/// Public URL of a profile's avatar, or `default_url` when it has none.
pub fn avatar_url(
    asset: Option<&StoredAsset>,
    storage: &dyn AssetStorage,
    default_url: &str,
) -> String {
    match asset {
        Some(asset) => storage.url_for(&asset.name),
        None => default_url.to_string(),
    }
}
