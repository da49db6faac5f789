//! Extraction strategies: compiled selector and pattern hints applied to
//! fetched documents.
//!
//! Result sites change layout without notice, so every source carries an
//! ordered strategy list: structured markup first, a regex fallback for
//! pages that render the same draw as loose text. A strategy either
//! extracts a draw or yields nothing; an extraction only counts when its
//! first prize looks like a draw number for that lottery, which keeps a
//! selector that started matching navigation text from poisoning results.
//!
//! `scraper::Html` is not `Send`, so parsing stays inside these synchronous
//! functions and never crosses an await point.

use std::collections::BTreeMap;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::config::{ExtractionHints, ScrapeSourceConfig};
use crate::errors::ConfigError;
use crate::models::{ExtractedDraw, RawDocument};
use crate::utils::digits_only;

/// Draws list at most five prize tiers.
const MAX_RANKS: usize = 5;

/// A source with its hints compiled, ready for the orchestrator.
#[derive(Debug, Clone)]
pub struct CompiledSource {
    pub config: ScrapeSourceConfig,
    pub strategies: Vec<CompiledStrategy>,
}

/// One compiled extraction strategy.
#[derive(Debug, Clone)]
pub enum CompiledStrategy {
    Markup {
        row: Selector,
        digit: Selector,
        prize: Option<Selector>,
        date: Option<Selector>,
    },
    Pattern {
        position: Regex,
        prize: Option<Regex>,
        date: Option<Regex>,
    },
}

/// Compile every enabled source's hints, failing fast on the first bad
/// selector or pattern so typos surface at startup, not mid-run.
pub fn compile_sources(sources: &[ScrapeSourceConfig]) -> Result<Vec<CompiledSource>, ConfigError> {
    sources
        .iter()
        .filter(|s| s.enabled)
        .map(|source| {
            let mut hints: Vec<&ExtractionHints> = source.strategies.iter().collect();
            hints.sort_by_key(|h| h.priority());
            let strategies = hints
                .into_iter()
                .map(|h| compile(source, h))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledSource {
                config: source.clone(),
                strategies,
            })
        })
        .collect()
}

fn compile(
    source: &ScrapeSourceConfig,
    hints: &ExtractionHints,
) -> Result<CompiledStrategy, ConfigError> {
    let lottery = source.lottery_id.id_str().to_string();
    match hints {
        ExtractionHints::StructuredMarkup {
            row_selector,
            digit_selector,
            prize_selector,
            date_selector,
        } => Ok(CompiledStrategy::Markup {
            row: compile_selector(&lottery, row_selector)?,
            digit: compile_selector(&lottery, digit_selector)?,
            prize: prize_selector
                .as_deref()
                .map(|s| compile_selector(&lottery, s))
                .transpose()?,
            date: date_selector
                .as_deref()
                .map(|s| compile_selector(&lottery, s))
                .transpose()?,
        }),
        ExtractionHints::PatternMatch {
            position_pattern,
            prize_pattern,
            date_pattern,
        } => {
            let position = compile_pattern(&lottery, position_pattern, &["rank", "digits"])?;
            let prize = prize_pattern
                .as_deref()
                .map(|p| compile_pattern(&lottery, p, &["rank", "label"]))
                .transpose()?;
            let date = date_pattern
                .as_deref()
                .map(|p| compile_pattern(&lottery, p, &["date"]))
                .transpose()?;
            Ok(CompiledStrategy::Pattern {
                position,
                prize,
                date,
            })
        }
    }
}

fn compile_selector(lottery: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|e| ConfigError::BadSelector {
        lottery: lottery.to_string(),
        selector: selector.to_string(),
        detail: e.to_string(),
    })
}

fn compile_pattern(lottery: &str, pattern: &str, required: &[&str]) -> Result<Regex, ConfigError> {
    let regex = Regex::new(pattern).map_err(|e| ConfigError::BadPattern {
        lottery: lottery.to_string(),
        pattern: pattern.to_string(),
        detail: e.to_string(),
    })?;
    for name in required {
        if !regex.capture_names().flatten().any(|n| n == *name) {
            return Err(ConfigError::BadPattern {
                lottery: lottery.to_string(),
                pattern: pattern.to_string(),
                detail: format!("missing capture group `{name}`"),
            });
        }
    }
    Ok(regex)
}

impl CompiledStrategy {
    /// Tag used in logs and failure details.
    pub fn kind(&self) -> &'static str {
        match self {
            CompiledStrategy::Markup { .. } => "structured_markup",
            CompiledStrategy::Pattern { .. } => "pattern_match",
        }
    }

    /// Run this strategy over a document. `None` means the document did
    /// not match this strategy's shape at all.
    pub fn apply(&self, doc: &RawDocument) -> Option<ExtractedDraw> {
        match self {
            CompiledStrategy::Markup {
                row,
                digit,
                prize,
                date,
            } => apply_markup(doc, row, digit, prize.as_ref(), date.as_ref()),
            CompiledStrategy::Pattern {
                position,
                prize,
                date,
            } => apply_pattern(doc, position, prize.as_ref(), date.as_ref()),
        }
    }
}

fn apply_markup(
    doc: &RawDocument,
    row: &Selector,
    digit: &Selector,
    prize: Option<&Selector>,
    date: Option<&Selector>,
) -> Option<ExtractedDraw> {
    let html = Html::parse_document(&doc.body);

    let mut positions = BTreeMap::new();
    let mut prizes = BTreeMap::new();
    for (index, row_el) in html.select(row).take(MAX_RANKS).enumerate() {
        let rank = (index + 1) as u8;
        if let Some(cell) = row_el.select(digit).next() {
            let text = element_text(&cell);
            if !text.is_empty() {
                positions.insert(rank, text);
            }
        }
        if let Some(prize_sel) = prize {
            if let Some(cell) = row_el.select(prize_sel).next() {
                let text = element_text(&cell);
                if !text.is_empty() {
                    prizes.insert(rank, text);
                }
            }
        }
    }

    if positions.is_empty() {
        return None;
    }

    let date_text = date.and_then(|sel| {
        html.select(sel)
            .next()
            .map(|el| element_text(&el))
            .filter(|t| !t.is_empty())
    });

    Some(ExtractedDraw {
        positions,
        prizes,
        date_text,
    })
}

fn apply_pattern(
    doc: &RawDocument,
    position: &Regex,
    prize: Option<&Regex>,
    date: Option<&Regex>,
) -> Option<ExtractedDraw> {
    let mut positions = BTreeMap::new();
    for caps in position.captures_iter(&doc.body) {
        let Some(rank) = caps.name("rank").and_then(|m| m.as_str().parse::<u8>().ok()) else {
            continue;
        };
        if !(1..=MAX_RANKS as u8).contains(&rank) {
            continue;
        }
        let Some(digits) = caps.name("digits") else {
            continue;
        };
        // First hit per rank wins; repeated matches are usually the same
        // draw rendered twice on the page.
        positions
            .entry(rank)
            .or_insert_with(|| digits.as_str().trim().to_string());
    }

    if positions.is_empty() {
        return None;
    }

    let mut prizes = BTreeMap::new();
    if let Some(prize_re) = prize {
        for caps in prize_re.captures_iter(&doc.body) {
            let Some(rank) = caps.name("rank").and_then(|m| m.as_str().parse::<u8>().ok()) else {
                continue;
            };
            if !(1..=MAX_RANKS as u8).contains(&rank) {
                continue;
            }
            if let Some(label) = caps.name("label") {
                prizes
                    .entry(rank)
                    .or_insert_with(|| label.as_str().trim().to_string());
            }
        }
    }

    let date_text = date.and_then(|re| {
        re.captures(&doc.body)
            .and_then(|caps| caps.name("date"))
            .map(|m| m.as_str().trim().to_string())
    });

    Some(ExtractedDraw {
        positions,
        prizes,
        date_text,
    })
}

fn element_text(el: &scraper::ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// An extraction is worth normalizing only when its first prize carries
/// digits and is not longer than the lottery's draw number. Overlong first
/// prizes mean the selector latched onto something else on the page.
pub fn plausible(draw: &ExtractedDraw, digit_len: usize) -> bool {
    match draw.positions.get(&1) {
        Some(raw) => {
            let digits = digits_only(raw);
            !digits.is_empty() && digits.len() <= digit_len
        }
        None => false,
    }
}

/// Try strategies in priority order and return the first plausible
/// extraction together with the kind that produced it.
pub fn extract_first_plausible(
    strategies: &[CompiledStrategy],
    doc: &RawDocument,
    digit_len: usize,
) -> Option<(ExtractedDraw, &'static str)> {
    for strategy in strategies {
        match strategy.apply(doc) {
            Some(draw) if plausible(&draw, digit_len) => {
                return Some((draw, strategy.kind()));
            }
            Some(_) => {
                debug!(kind = strategy.kind(), "extraction implausible, trying next strategy");
            }
            None => {
                debug!(kind = strategy.kind(), "strategy did not match");
            }
        }
    }
    None
}
