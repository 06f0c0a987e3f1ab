//! Tag backfill for auctions created without NFT tags.

use std::collections::{HashMap, HashSet};

use futures::stream::{self, StreamExt, TryStreamExt};

use marketindex_core::error::ReindexError;
use marketindex_core::services::MetadataService;
use marketindex_core::state::ReindexState;

/// Fields requested from the metadata service.
pub const TAG_FIELDS: [&str; 2] = ["identifier", "tags"];

/// Fill in the tags of every auction whose tag list is empty.
///
/// Identifiers are deduplicated, sent in batches of `batch_size`, and at most
/// `concurrency` requests are in flight. Returns the number of auctions that
/// received tags.
pub async fn backfill_tags(
    state: &mut ReindexState,
    metadata: &dyn MetadataService,
    batch_size: usize,
    concurrency: usize,
) -> Result<usize, ReindexError> {
    let identifiers: Vec<String> = {
        let mut seen = HashSet::new();
        state
            .auctions()
            .iter()
            .filter(|a| a.tags.is_empty())
            .filter(|a| seen.insert(a.identifier.as_str()))
            .map(|a| a.identifier.clone())
            .collect()
    };
    if identifiers.is_empty() {
        return Ok(0);
    }

    let batches: Vec<Vec<String>> = identifiers
        .chunks(batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect();
    tracing::debug!(
        identifiers = identifiers.len(),
        batches = batches.len(),
        "backfilling auction tags"
    );

    let responses: Vec<_> = stream::iter(batches)
        .map(|batch| async move { metadata.nfts_by_identifiers(&batch, 0, &TAG_FIELDS).await })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    let tags: HashMap<String, Vec<String>> = responses
        .into_iter()
        .flatten()
        .filter(|nft| !nft.tags.is_empty())
        .map(|nft| (nft.identifier, nft.tags))
        .collect();

    let mut filled = 0;
    for auction in state.auctions_mut() {
        if !auction.tags.is_empty() {
            continue;
        }
        if let Some(found) = tags.get(&auction.identifier) {
            auction.tags = found.clone();
            filled += 1;
        }
    }
    Ok(filled)
}
