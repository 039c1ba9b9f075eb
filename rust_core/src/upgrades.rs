//! Upgrade catalog, effect resolution and the upgrade shop.
//!
//! Upgrades are persistent, leveled player enhancements. Each catalog entry
//! maps a level to a partial [`UpgradeEffects`] record; the resolver merges
//! the records of every owned upgrade into one. Merging is a field-wise
//! override, so two upgrades touching the same bonus never stack.

use crate::error::PurchaseError;
use crate::models::UpgradeState;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Merged upgrade effects. `None` means "no upgrade provides this bonus".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeEffects {
    pub fact_checks_bonus: Option<u32>,
    pub speed_multiplier: Option<f64>,
    pub mistake_penalty_reduction: Option<f64>,
    pub time_score_bonus: Option<f64>,
}

impl UpgradeEffects {
    /// Extra fact checks per session (default 0)
    pub fn fact_checks_bonus(&self) -> u32 {
        self.fact_checks_bonus.unwrap_or(0)
    }

    /// Speed bonus multiplier, >= 1 (default 1)
    pub fn speed_multiplier(&self) -> f64 {
        self.speed_multiplier.unwrap_or(1.0).max(1.0)
    }

    /// Fraction of the mistake penalty still applied, in [0, 1] (default 1)
    pub fn mistake_penalty_reduction(&self) -> f64 {
        self.mistake_penalty_reduction.unwrap_or(1.0).clamp(0.0, 1.0)
    }

    /// Relative boost of the passive time score (default 0)
    pub fn time_score_bonus(&self) -> f64 {
        self.time_score_bonus.unwrap_or(0.0).max(0.0)
    }

    /// Overlay `other` on top of `self`, field by field
    pub fn merge(&mut self, other: UpgradeEffects) {
        if other.fact_checks_bonus.is_some() {
            self.fact_checks_bonus = other.fact_checks_bonus;
        }
        if other.speed_multiplier.is_some() {
            self.speed_multiplier = other.speed_multiplier;
        }
        if other.mistake_penalty_reduction.is_some() {
            self.mistake_penalty_reduction = other.mistake_penalty_reduction;
        }
        if other.time_score_bonus.is_some() {
            self.time_score_bonus = other.time_score_bonus;
        }
    }
}

/// Static definition of a purchasable upgrade
#[derive(Debug, Clone)]
pub struct UpgradeDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub max_level: u32,
    /// Price of level `n + 1` at index `n`
    pub prices: &'static [i64],
    pub level_descriptions: &'static [&'static str],
    pub effect: fn(u32) -> UpgradeEffects,
}

impl UpgradeDefinition {
    /// Price of the next level, `None` at max level
    pub fn next_price(&self, current_level: u32) -> Option<i64> {
        if current_level >= self.max_level {
            return None;
        }
        self.prices.get(current_level as usize).copied()
    }
}

fn fact_checker_effect(level: u32) -> UpgradeEffects {
    UpgradeEffects {
        fact_checks_bonus: Some(level * 2),
        ..Default::default()
    }
}

fn speed_bonus_effect(level: u32) -> UpgradeEffects {
    UpgradeEffects {
        speed_multiplier: Some(1.0 + level as f64 * 0.25),
        ..Default::default()
    }
}

fn mistake_shield_effect(level: u32) -> UpgradeEffects {
    UpgradeEffects {
        mistake_penalty_reduction: Some(1.0 - level as f64 * 0.25),
        ..Default::default()
    }
}

fn time_bonus_effect(level: u32) -> UpgradeEffects {
    UpgradeEffects {
        time_score_bonus: Some(level as f64 * 0.2),
        ..Default::default()
    }
}

/// Every upgrade available in the shop
pub static UPGRADE_CATALOG: &[UpgradeDefinition] = &[
    UpgradeDefinition {
        id: "fact_checker",
        name: "Fact Checker Pro",
        description: "Increases your fact check allowance during games",
        max_level: 3,
        prices: &[100, 250, 500],
        level_descriptions: &[
            "+2 fact checks per game",
            "+4 fact checks per game",
            "+6 fact checks per game",
        ],
        effect: fact_checker_effect,
    },
    UpgradeDefinition {
        id: "speed_bonus",
        name: "Quick Reflexes",
        description: "Increases points earned from speed bonuses",
        max_level: 3,
        prices: &[150, 300, 600],
        level_descriptions: &[
            "+25% speed bonus points",
            "+50% speed bonus points",
            "+75% speed bonus points",
        ],
        effect: speed_bonus_effect,
    },
    UpgradeDefinition {
        id: "mistake_shield",
        name: "Mistake Shield",
        description: "Reduces points lost from incorrect flags",
        max_level: 2,
        prices: &[200, 450],
        level_descriptions: &["-25% points lost from mistakes", "-50% points lost from mistakes"],
        effect: mistake_shield_effect,
    },
    UpgradeDefinition {
        id: "time_bonus",
        name: "Time Manager",
        description: "Increases the passive points earned over time",
        max_level: 3,
        prices: &[175, 350, 700],
        level_descriptions: &[
            "+20% passive time score",
            "+40% passive time score",
            "+60% passive time score",
        ],
        effect: time_bonus_effect,
    },
];

/// Look up an upgrade by id
pub fn get_upgrade(id: &str) -> Option<&'static UpgradeDefinition> {
    UPGRADE_CATALOG.iter().find(|u| u.id == id)
}

/// Merge the effects of every owned upgrade.
///
/// Level 0 contributes nothing, unknown ids are ignored and levels above the
/// catalog maximum are clamped.
pub fn resolve_effects(state: &UpgradeState) -> UpgradeEffects {
    for id in state.keys() {
        if get_upgrade(id).is_none() {
            debug!("Ignoring unknown upgrade id '{}'", id);
        }
    }

    let mut effects = UpgradeEffects::default();
    for upgrade in UPGRADE_CATALOG {
        let level = state.get(upgrade.id).copied().unwrap_or(0);
        if level == 0 {
            continue;
        }
        let level = if level > upgrade.max_level {
            warn!(
                "Upgrade '{}' stored at level {} above max {}, clamping",
                upgrade.id, level, upgrade.max_level
            );
            upgrade.max_level
        } else {
            level
        };
        effects.merge((upgrade.effect)(level));
    }
    effects
}

/// Memoizing wrapper around [`resolve_effects`]
#[derive(Debug, Default)]
pub struct UpgradeEffectResolver {
    cached: Option<(UpgradeState, UpgradeEffects)>,
    recomputations: u64,
}

impl UpgradeEffectResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Effects for `state`, recomputed only when `state` differs from the last call
    pub fn resolve(&mut self, state: &UpgradeState) -> UpgradeEffects {
        if let Some((cached_state, effects)) = &self.cached {
            if cached_state == state {
                return *effects;
            }
        }
        let effects = resolve_effects(state);
        self.cached = Some((state.clone(), effects));
        self.recomputations += 1;
        effects
    }

    /// Number of times the effects were actually recomputed
    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}

// ============================================================================
// Shop
// ============================================================================

/// One shop line for the current player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeOffer {
    pub id: String,
    pub name: String,
    pub current_level: u32,
    pub max_level: u32,
    pub next_price: Option<i64>,
    pub can_purchase: bool,
}

/// Result of a successful purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub id: String,
    pub new_level: u32,
    pub price: i64,
    pub money: i64,
    pub upgrades: UpgradeState,
}

/// Shop listing for every catalog entry
pub fn offers(state: &UpgradeState, money: i64) -> Vec<UpgradeOffer> {
    UPGRADE_CATALOG
        .iter()
        .map(|upgrade| {
            let current_level = state.get(upgrade.id).copied().unwrap_or(0).min(upgrade.max_level);
            let next_price = upgrade.next_price(current_level);
            UpgradeOffer {
                id: upgrade.id.to_string(),
                name: upgrade.name.to_string(),
                current_level,
                max_level: upgrade.max_level,
                next_price,
                can_purchase: next_price.map_or(false, |price| money >= price),
            }
        })
        .collect()
}

/// Buy the next level of `id`
pub fn purchase(state: &UpgradeState, money: i64, id: &str) -> Result<PurchaseReceipt, PurchaseError> {
    let upgrade = get_upgrade(id).ok_or_else(|| PurchaseError::UnknownUpgrade(id.to_string()))?;
    let current_level = state.get(id).copied().unwrap_or(0);

    let price = upgrade.next_price(current_level).ok_or(PurchaseError::MaxLevel {
        id: id.to_string(),
        max_level: upgrade.max_level,
    })?;

    if money < price {
        return Err(PurchaseError::InsufficientFunds {
            id: id.to_string(),
            price,
            money,
        });
    }

    let mut upgrades = state.clone();
    upgrades.insert(id.to_string(), current_level + 1);

    Ok(PurchaseReceipt {
        id: id.to_string(),
        new_level: current_level + 1,
        price,
        money: money - price,
        upgrades,
    })
}
