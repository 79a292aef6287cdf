// Company catalog and deck construction.

use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// The five investable companies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CompanyType {
    Gringotts,
    Ollivanders,
    WeasleysWizardWheezes,
    LeakyCauldron,
    FlourishAndBlotts,
}

impl CompanyType {
    pub const ALL: [CompanyType; 5] = [
        CompanyType::Gringotts,
        CompanyType::Ollivanders,
        CompanyType::WeasleysWizardWheezes,
        CompanyType::LeakyCauldron,
        CompanyType::FlourishAndBlotts,
    ];
}

impl fmt::Display for CompanyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A batch of cards for one company type in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(rename = "type")]
    pub company_type: CompanyType,
    pub card_count: u32,
}

/// Card batches that make up a full deck. A company type may appear in more
/// than one batch; every batch contributes its cards.
pub const COMPANY_CATALOG: [Company; 6] = [
    Company {
        company_type: CompanyType::WeasleysWizardWheezes,
        card_count: 5,
    },
    Company {
        company_type: CompanyType::Gringotts,
        card_count: 6,
    },
    Company {
        company_type: CompanyType::WeasleysWizardWheezes,
        card_count: 7,
    },
    Company {
        company_type: CompanyType::Ollivanders,
        card_count: 8,
    },
    Company {
        company_type: CompanyType::FlourishAndBlotts,
        card_count: 9,
    },
    Company {
        company_type: CompanyType::LeakyCauldron,
        card_count: 10,
    },
];

/// A single company card. Cards of the same type are interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    #[serde(rename = "type")]
    pub company: CompanyType,
}

impl Card {
    pub fn new(company: CompanyType) -> Self {
        Card { company }
    }
}

/// Total number of cards declared by the catalog.
pub fn catalog_card_count() -> usize {
    COMPANY_CATALOG.iter().map(|c| c.card_count as usize).sum()
}

/// Number of cards of `company` declared across all catalog batches.
pub fn catalog_count_for(company: CompanyType) -> usize {
    COMPANY_CATALOG
        .iter()
        .filter(|c| c.company_type == company)
        .map(|c| c.card_count as usize)
        .sum()
}

/// Build a shuffled draw pile from the catalog.
///
/// Every batch is expanded into `card_count` cards and the whole pile is
/// shuffled. The last `removed` cards are then dropped and never enter play.
/// The returned vector is used as a stack: the next card drawn is the last
/// element.
pub fn build_deck<R: Rng + ?Sized>(rng: &mut R, removed: usize) -> Vec<Card> {
    let mut deck: Vec<Card> = COMPANY_CATALOG
        .iter()
        .flat_map(|batch| (0..batch.card_count).map(move |_| Card::new(batch.company_type)))
        .collect();
    deck.shuffle(rng);
    deck.truncate(deck.len().saturating_sub(removed));
    deck
}
