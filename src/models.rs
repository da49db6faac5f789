//! Canonical domain types for lottery results and delivery accounting.
//!
//! This module defines the data structures that cross stage boundaries:
//! - [`Lottery`]: the closed set of lottery identifiers we scrape
//! - [`RawDocument`]: one fetched page, before any parsing
//! - [`ExtractedDraw`]: what a parsing strategy pulled out of a page
//! - [`CanonicalResult`]: the normalized, persisted draw record
//! - [`DeliveryOutcome`]: per-group delivery accounting for one run
//! - [`PipelineReport`]: everything a single pipeline invocation produced
//!
//! [`CanonicalResult`] serializes with camelCase field names (`lotteryId`,
//! `sourceUrl`, `fetchedAt`); that shape is the one serialization contract
//! that must stay stable across the store boundary and the run report.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of lotteries this pipeline knows how to scrape.
///
/// Each lottery has a fixed draw digit length: Federal draws are published
/// as five-digit numbers, the state lotteries as four-digit milhares. The
/// enum order is the display order used everywhere results are listed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lottery {
    Federal,
    RioDeJaneiro,
    SaoPaulo,
    Goias,
    Nacional,
}

impl Lottery {
    /// Every known lottery, in display order.
    pub fn all() -> [Lottery; 5] {
        [
            Lottery::Federal,
            Lottery::RioDeJaneiro,
            Lottery::SaoPaulo,
            Lottery::Goias,
            Lottery::Nacional,
        ]
    }

    /// Number of digits in a published draw number for this lottery.
    pub fn digit_len(&self) -> usize {
        match self {
            Lottery::Federal => 5,
            _ => 4,
        }
    }

    /// Human-readable name used by the message renderer.
    pub fn display_name(&self) -> &'static str {
        match self {
            Lottery::Federal => "Federal",
            Lottery::RioDeJaneiro => "Rio de Janeiro",
            Lottery::SaoPaulo => "São Paulo",
            Lottery::Goias => "Goiás",
            Lottery::Nacional => "Nacional",
        }
    }

    /// Stable identifier used in store keys, e.g. `RIO_DE_JANEIRO`.
    pub fn id_str(&self) -> &'static str {
        match self {
            Lottery::Federal => "FEDERAL",
            Lottery::RioDeJaneiro => "RIO_DE_JANEIRO",
            Lottery::SaoPaulo => "SAO_PAULO",
            Lottery::Goias => "GOIAS",
            Lottery::Nacional => "NACIONAL",
        }
    }
}

impl std::fmt::Display for Lottery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Messaging platform a recipient group lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Whatsapp,
    Telegram,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Whatsapp => write!(f, "whatsapp"),
            Platform::Telegram => write!(f, "telegram"),
        }
    }
}

/// One page as fetched from a source, before parsing.
#[derive(Debug, Clone)]
pub struct RawDocument {
    /// URL the page was fetched from.
    pub url: String,
    /// Response body.
    pub body: String,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

/// What one parsing strategy extracted from a page. Digit strings are raw
/// (separators and all); the normalizer fits them to the lottery's digit
/// length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedDraw {
    /// Rank (1..=5) to raw digit string.
    pub positions: BTreeMap<u8, String>,
    /// Rank to prize or animal-group label, when the page carries one.
    pub prizes: BTreeMap<u8, String>,
    /// Document-embedded draw date, unparsed. `None` when the page carries
    /// no recognizable date.
    pub date_text: Option<String>,
}

/// Draw record lifecycle state.
///
/// The pipeline only ever produces `Active` (rank 1 is present and valid)
/// or `Pending` (partial draw, rank 1 not yet announced). `Inactive` is an
/// administrative state set outside the pipeline; it round-trips through
/// the store untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Active,
    Inactive,
    Pending,
}

/// The normalized, persisted representation of one lottery draw.
///
/// (`lottery_id`, `date`) is the natural key: at most one canonical record
/// per pair is authoritative, and a later successful scrape overwrites an
/// earlier one wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalResult {
    pub lottery_id: Lottery,
    pub date: NaiveDate,
    /// Rank (1..=5) to digit string of the lottery's configured length.
    /// Ranks beyond the first may be absent.
    pub positions: BTreeMap<u8, String>,
    /// Optional parallel mapping: rank to prize/animal-group label. Only
    /// ranks present in `positions` appear here.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub prizes: BTreeMap<u8, String>,
    /// Page the draw was scraped from.
    pub source_url: String,
    pub status: ResultStatus,
    pub fetched_at: DateTime<Utc>,
}

impl CanonicalResult {
    /// The first-place digit string, when announced.
    pub fn first(&self) -> Option<&str> {
        self.positions.get(&1).map(String::as_str)
    }

    /// Store key for this record's natural key.
    pub fn key(&self) -> String {
        result_key(self.lottery_id, self.date)
    }
}

/// Store key for a (`lottery`, `date`) pair, e.g. `"FEDERAL|2024-03-10"`.
pub fn result_key(lottery: Lottery, date: NaiveDate) -> String {
    format!("{}|{}", lottery.id_str(), date)
}

/// Terminal failure for one source in one run, kept for the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFailure {
    pub lottery_id: Lottery,
    pub reason: crate::errors::FailureReason,
    pub detail: String,
}

/// Per-group delivery accounting for one pipeline run. Ephemeral: surfaced
/// in the report, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcome {
    pub group_id: String,
    pub platform: Platform,
    /// True when every message for this group went out.
    pub success: bool,
    /// First failure detail, when any send failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Messages actually delivered to this group.
    pub sent: usize,
}

/// Everything one pipeline invocation produced, for the caller/scheduler.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub date: NaiveDate,
    pub results: BTreeMap<Lottery, CanonicalResult>,
    pub failures: Vec<SourceFailure>,
    pub deliveries: Vec<DeliveryOutcome>,
}
