//! Reward catalog - server-side prices and badge award rules.
//!
//! Nothing here is ever taken from the client: item costs, energy deltas and
//! badge predicates are compiled in and seeded into the `badges` table.

use crate::types::{BadgeId, StoreItemView};

/// Coins paid for a genuinely new high-water mark in a course
pub const LEVEL_REWARD_COINS: i64 = 20;

/// Purchasable store item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreItem {
    pub key: &'static str,
    pub cost: i64,
    pub energy_delta: i64,
}

pub const STORE_ITEMS: &[StoreItem] = &[
    StoreItem {
        key: "recarga_1",
        cost: 10,
        energy_delta: 1,
    },
    StoreItem {
        key: "recarga_full",
        cost: 40,
        energy_delta: 5,
    },
];

/// Resolve a store item by key
pub fn store_item(key: &str) -> Option<&'static StoreItem> {
    STORE_ITEMS.iter().find(|item| item.key == key)
}

pub fn store_items() -> Vec<StoreItemView> {
    STORE_ITEMS
        .iter()
        .map(|item| StoreItemView {
            key: item.key.to_string(),
            cost: item.cost,
            energy_delta: item.energy_delta,
        })
        .collect()
}

/// Facts about one approved completion, used by badge predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionFacts {
    pub level: u32,
    pub mistakes: u32,
    /// True when this completion moved the learner's frontier forward
    pub new_high_water: bool,
}

/// Badge definition with its award predicate
#[derive(Debug, Clone, Copy)]
pub struct BadgeRule {
    pub id: BadgeId,
    pub name: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
    pub awarded: fn(&CompletionFacts) -> bool,
}

pub const FIRST_STEPS_BADGE: BadgeId = 1;
pub const PERFECTIONIST_BADGE: BadgeId = 2;

fn first_level_completed(facts: &CompletionFacts) -> bool {
    facts.new_high_water && facts.level == 1
}

// Deliberately ignores `new_high_water`: a flawless replay still earns it
fn zero_mistakes(facts: &CompletionFacts) -> bool {
    facts.mistakes == 0
}

pub const BADGES: &[BadgeRule] = &[
    BadgeRule {
        id: FIRST_STEPS_BADGE,
        name: "Primeros Pasos",
        icon: "👣",
        description: "Completed the first level of a course",
        awarded: first_level_completed,
    },
    BadgeRule {
        id: PERFECTIONIST_BADGE,
        name: "Perfeccionista",
        icon: "🎯",
        description: "Finished a level without a single mistake",
        awarded: zero_mistakes,
    },
];

/// Badges whose predicate holds for this completion, in catalog order
pub fn badges_earned(facts: &CompletionFacts) -> Vec<BadgeId> {
    BADGES
        .iter()
        .filter(|rule| (rule.awarded)(facts))
        .map(|rule| rule.id)
        .collect()
}
