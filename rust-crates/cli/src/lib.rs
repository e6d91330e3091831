use cipher_loot::{
    auth::address_of,
    prizes::{
        LootCard,
        RarityMeta,
        resolve_loot_card,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use ed25519_dalek::SigningKey;

pub mod node_client;

pub use node_client::{
    DEFAULT_NODE_URL,
    NodeClient,
};

/// A draw after its rarity and variant handles were decrypted.
#[derive(Debug, Clone, Copy)]
pub struct RevealedLoot {
    pub draw_id: u64,
    pub timestamp: u64,
    pub rarity_code: u64,
    pub variant: u64,
    pub meta: &'static RarityMeta,
    pub card: &'static LootCard,
}

/// Fetch a draw of the account owning `key` and decrypt it.
///
/// `draw_id = None` reveals the latest draw. Returns `None` when there is
/// nothing to reveal.
pub async fn reveal_draw(
    client: &NodeClient,
    key: &SigningKey,
    draw_id: Option<u64>,
) -> Result<Option<RevealedLoot>> {
    let player = &address_of(&key.verifying_key());
    let (draw_id, rarity, variant, timestamp) = match draw_id {
        Some(draw_id) => match client.encrypted_result(player, draw_id).await? {
            Some(result) => (draw_id, result.rarity, result.variant, result.timestamp),
            None => return Ok(None),
        },
        None => {
            let latest = client.latest(player).await?;
            if latest.draw_id == 0 {
                return Ok(None);
            }
            (latest.draw_id, latest.rarity, latest.variant, latest.timestamp)
        }
    };
    tracing::debug!(%player, draw_id, "decrypting draw");

    let values = client.decrypt(key, &[rarity, variant]).await?;
    let rarity_code = *values
        .get(&rarity)
        .ok_or_else(|| eyre!("node did not return the rarity of draw {draw_id}"))?;
    let variant_index = *values
        .get(&variant)
        .ok_or_else(|| eyre!("node did not return the variant of draw {draw_id}"))?;
    let (meta, card) = resolve_loot_card(rarity_code, variant_index);
    Ok(Some(RevealedLoot {
        draw_id,
        timestamp,
        rarity_code,
        variant: variant_index,
        meta,
        card,
    }))
}
