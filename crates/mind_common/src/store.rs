//! Store transaction - exchange coins for energy in one atomic update.

use crate::catalog::{self, StoreItem};
use crate::db;
use crate::energy::{self, MAX_ENERGY};
use crate::error::{MindError, MindResult};
use crate::types::{Learner, PurchaseReceipt};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{info, warn};

/// Check a purchase against a learner snapshot and apply it in place.
///
/// Checks run in a fixed order (unknown item, funds, full tank) and nothing
/// is modified unless all of them pass.
pub fn apply_purchase(learner: &mut Learner, item: &StoreItem) -> MindResult<()> {
    if learner.coins < item.cost {
        return Err(MindError::InsufficientFunds {
            have: learner.coins,
            need: item.cost,
        });
    }
    if learner.energy >= MAX_ENERGY {
        return Err(MindError::EnergyFull);
    }

    learner.energy = (learner.energy + item.energy_delta).min(MAX_ENERGY);
    learner.coins -= item.cost;
    Ok(())
}

/// Buy `item_key` for a learner.
///
/// Energy is regenerated first inside the same transaction, so the full-tank
/// check sees the same value the learner would be shown.
pub fn purchase(
    conn: &Connection,
    learner_id: i64,
    item_key: &str,
    now: DateTime<Utc>,
) -> MindResult<PurchaseReceipt> {
    let item = catalog::store_item(item_key)
        .ok_or_else(|| MindError::InvalidItem(item_key.to_string()))?;

    let result = db::mutate_learner(conn, learner_id, |_, learner| {
        energy::apply_regeneration(learner, now);
        apply_purchase(learner, item)
    });

    match result {
        Ok((learner, ())) => {
            info!(
                "Learner {} bought {} for {} coins -> energy {}, coins {}",
                learner.id, item.key, item.cost, learner.energy, learner.coins
            );
            Ok(PurchaseReceipt {
                item: item.key.to_string(),
                coins: learner.coins,
                energy: learner.energy,
            })
        }
        Err(err) => {
            warn!("Purchase of {} by learner {} refused: {}", item.key, learner_id, err);
            Err(err)
        }
    }
}
