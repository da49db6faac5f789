//! Scrape side of the pipeline: everything between a configured source
//! and a canonical result.
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`fetch`] | HTTP retrieval of result pages through a chosen egress |
//! | [`strategy`] | compiled extraction strategies applied to raw documents |
//! | [`normalize`] | raw extractions validated into canonical results |
//! | [`orchestrator`] | per-source attempt machines and the concurrent fan-out |

pub mod fetch;
pub mod normalize;
pub mod orchestrator;
pub mod strategy;
