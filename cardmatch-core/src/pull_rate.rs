//! Pack pull-rate engine.
//!
//! Computes the chance that opening one pack yields at least one card the
//! collector does not own yet.
//!
//! # Model
//!
//! A pack is a sequence of slots. Each slot draws a rarity from its odds
//! table, then a card uniformly among the pack's cards of that rarity. Odds
//! are relative weights and are renormalized over the rarities the pack
//! actually contains, so a table can be shared by sets that lack some tiers.
//!
//! Two special rules apply on top of the slots:
//!
//! - **Rare packs**: with probability `rare_pack_chance` every slot draws
//!   from the rare table instead of its own.
//! - **Baby bonus slot**: baby cards never appear in regular slots. A regular
//!   pack gains an extra card with probability `baby_chance`, drawn uniformly
//!   among the baby cards.
//!
//! Shiny cards are ordinary cards whose rarity is one of the shiny tiers.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CardMatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    OneDiamond,
    TwoDiamond,
    ThreeDiamond,
    FourDiamond,
    OneStar,
    TwoStar,
    ThreeStar,
    OneShiny,
    TwoShiny,
    Crown,
}

impl Rarity {
    pub fn is_shiny(self) -> bool {
        matches!(self, Rarity::OneShiny | Rarity::TwoShiny)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Rarity::OneDiamond => "◊",
            Rarity::TwoDiamond => "◊◊",
            Rarity::ThreeDiamond => "◊◊◊",
            Rarity::FourDiamond => "◊◊◊◊",
            Rarity::OneStar => "☆",
            Rarity::TwoStar => "☆☆",
            Rarity::ThreeStar => "☆☆☆",
            Rarity::OneShiny => "✵",
            Rarity::TwoShiny => "✵✵",
            Rarity::Crown => "♛",
        };
        f.write_str(symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackCard {
    pub id: String,
    pub rarity: Rarity,
    #[serde(default)]
    pub baby: bool,
}

/// Relative rarity weights for one slot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotOdds {
    pub weights: BTreeMap<Rarity, f64>,
}

impl SlotOdds {
    pub fn new(weights: impl IntoIterator<Item = (Rarity, f64)>) -> Self {
        Self {
            weights: weights.into_iter().collect(),
        }
    }

    fn only(rarity: Rarity) -> Self {
        Self::new([(rarity, 1.0)])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackStructure {
    pub slots: Vec<SlotOdds>,
    #[serde(default)]
    pub rare_pack_chance: f64,
    #[serde(default)]
    pub rare_pack: Option<SlotOdds>,
    #[serde(default)]
    pub baby_chance: f64,
}

impl PackStructure {
    /// Three common slots followed by two rarer slots.
    pub fn five_card() -> Self {
        let mut slots = vec![SlotOdds::only(Rarity::OneDiamond); 3];
        slots.push(fourth_slot());
        slots.push(fifth_slot());
        Self {
            slots,
            rare_pack_chance: 0.0005,
            rare_pack: Some(rare_slot()),
            baby_chance: 0.05,
        }
    }

    /// The five-card layout with one common slot fewer.
    pub fn four_card() -> Self {
        let mut structure = Self::five_card();
        structure.slots.remove(0);
        structure
    }

    pub fn validate(&self) -> Result<()> {
        if self.slots.is_empty() {
            return Err(CardMatchError::InvalidPack("pack has no slots".into()));
        }
        for (name, chance) in [
            ("rare_pack_chance", self.rare_pack_chance),
            ("baby_chance", self.baby_chance),
        ] {
            if !(0.0..=1.0).contains(&chance) {
                return Err(CardMatchError::InvalidPack(format!(
                    "{name} must be within [0, 1], got {chance}"
                )));
            }
        }
        for odds in self.slots.iter().chain(self.rare_pack.iter()) {
            if let Some((rarity, weight)) = odds
                .weights
                .iter()
                .find(|(_, w)| !w.is_finite() || **w < 0.0)
            {
                return Err(CardMatchError::InvalidPack(format!(
                    "invalid weight {weight} for {rarity:?}"
                )));
            }
        }
        Ok(())
    }
}

fn fourth_slot() -> SlotOdds {
    SlotOdds::new([
        (Rarity::TwoDiamond, 89.000),
        (Rarity::ThreeDiamond, 4.952),
        (Rarity::FourDiamond, 1.666),
        (Rarity::OneStar, 2.572),
        (Rarity::TwoStar, 0.500),
        (Rarity::ThreeStar, 0.222),
        (Rarity::OneShiny, 0.714),
        (Rarity::TwoShiny, 0.333),
        (Rarity::Crown, 0.040),
    ])
}

fn fifth_slot() -> SlotOdds {
    SlotOdds::new([
        (Rarity::TwoDiamond, 56.000),
        (Rarity::ThreeDiamond, 19.810),
        (Rarity::FourDiamond, 6.664),
        (Rarity::OneStar, 10.288),
        (Rarity::TwoStar, 2.000),
        (Rarity::ThreeStar, 0.888),
        (Rarity::OneShiny, 2.857),
        (Rarity::TwoShiny, 1.333),
        (Rarity::Crown, 0.160),
    ])
}

fn rare_slot() -> SlotOdds {
    SlotOdds::new([
        (Rarity::OneStar, 1.0),
        (Rarity::TwoStar, 1.0),
        (Rarity::ThreeStar, 1.0),
        (Rarity::OneShiny, 1.0),
        (Rarity::TwoShiny, 1.0),
        (Rarity::Crown, 1.0),
    ])
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackKind {
    #[default]
    FiveCard,
    FourCard,
}

/// A pack definition as stored in JSON. `structure` overrides the default
/// layout of `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    #[serde(default)]
    pub name: Option<String>,
    pub cards: Vec<PackCard>,
    #[serde(default)]
    pub kind: PackKind,
    #[serde(default)]
    pub structure: Option<PackStructure>,
}

impl Pack {
    pub fn new(cards: Vec<PackCard>, kind: PackKind) -> Self {
        Self {
            name: None,
            cards,
            kind,
            structure: None,
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn structure(&self) -> PackStructure {
        self.structure.clone().unwrap_or_else(|| match self.kind {
            PackKind::FiveCard => PackStructure::five_card(),
            PackKind::FourCard => PackStructure::four_card(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RarityOdds {
    pub rarity: Rarity,
    pub total: usize,
    pub owned: usize,
    /// Chance of at least one unowned card of this rarity in one pack.
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PullRateReport {
    /// Chance of at least one unowned card in one pack.
    pub probability: f64,
    pub total: usize,
    pub unowned: usize,
    pub by_rarity: Vec<RarityOdds>,
}

/// Cards of a pack grouped the way slots draw them.
struct Pool<'a> {
    regular: BTreeMap<Rarity, Vec<&'a PackCard>>,
    baby: Vec<&'a PackCard>,
}

impl<'a> Pool<'a> {
    fn new(cards: &'a [PackCard]) -> Self {
        let mut regular: BTreeMap<Rarity, Vec<&PackCard>> = BTreeMap::new();
        let mut baby = Vec::new();
        for card in cards {
            if card.baby {
                baby.push(card);
            } else {
                regular.entry(card.rarity).or_default().push(card);
            }
        }
        Self { regular, baby }
    }

    /// Weights of `odds` restricted to rarities this pack contains.
    fn available(&self, odds: &SlotOdds) -> Vec<(Rarity, f64)> {
        odds.weights
            .iter()
            .filter(|(rarity, weight)| **weight > 0.0 && self.regular.contains_key(*rarity))
            .map(|(rarity, weight)| (*rarity, *weight))
            .collect()
    }

    /// Chance that one draw from `odds` satisfies `wanted`.
    fn slot_hit(&self, odds: &SlotOdds, wanted: &dyn Fn(&PackCard) -> bool) -> f64 {
        let available = self.available(odds);
        let total: f64 = available.iter().map(|(_, w)| w).sum();
        if total <= 0.0 {
            return 0.0;
        }
        available
            .iter()
            .map(|(rarity, weight)| {
                let cards = &self.regular[rarity];
                let hits = cards.iter().filter(|&&card| wanted(card)).count();
                weight / total * hits as f64 / cards.len() as f64
            })
            .sum()
    }

    /// Chance that a whole pack contains at least one card satisfying
    /// `wanted`.
    fn pack_hit(&self, structure: &PackStructure, wanted: &dyn Fn(&PackCard) -> bool) -> f64 {
        let mut regular_miss: f64 = structure
            .slots
            .iter()
            .map(|odds| 1.0 - self.slot_hit(odds, wanted))
            .product();

        if structure.baby_chance > 0.0 && !self.baby.is_empty() {
            let hits = self.baby.iter().filter(|&&card| wanted(card)).count();
            let baby_hit = hits as f64 / self.baby.len() as f64;
            regular_miss *= 1.0 - structure.baby_chance * baby_hit;
        }

        let rare = structure
            .rare_pack
            .as_ref()
            .filter(|odds| structure.rare_pack_chance > 0.0 && !self.available(odds).is_empty());
        let miss = match rare {
            Some(odds) => {
                let rare_miss =
                    (1.0 - self.slot_hit(odds, wanted)).powi(structure.slots.len() as i32);
                (1.0 - structure.rare_pack_chance) * regular_miss
                    + structure.rare_pack_chance * rare_miss
            }
            None => regular_miss,
        };
        (1.0 - miss).clamp(0.0, 1.0)
    }
}

/// Pull odds for `pack` given the ids the collector already owns.
pub fn pull_rate(pack: &Pack, owned: &HashSet<String>) -> Result<PullRateReport> {
    let structure = pack.structure();
    structure.validate()?;

    let pool = Pool::new(&pack.cards);
    let unowned = |card: &PackCard| !owned.contains(&card.id);

    let mut rarities: Vec<Rarity> = pack.cards.iter().map(|card| card.rarity).collect();
    rarities.sort();
    rarities.dedup();

    let by_rarity = rarities
        .into_iter()
        .map(|rarity| {
            let of_rarity = pack.cards.iter().filter(|card| card.rarity == rarity);
            let total = of_rarity.clone().count();
            let owned_count = of_rarity.filter(|card| owned.contains(&card.id)).count();
            let wanted = |card: &PackCard| card.rarity == rarity && unowned(card);
            RarityOdds {
                rarity,
                total,
                owned: owned_count,
                probability: pool.pack_hit(&structure, &wanted),
            }
        })
        .collect();

    let report = PullRateReport {
        probability: pool.pack_hit(&structure, &unowned),
        total: pack.cards.len(),
        unowned: pack.cards.iter().filter(|&card| unowned(card)).count(),
        by_rarity,
    };
    debug!(
        pack = pack.name.as_deref().unwrap_or("unnamed"),
        probability = report.probability,
        unowned = report.unowned,
        "Computed pull rate"
    );
    Ok(report)
}
