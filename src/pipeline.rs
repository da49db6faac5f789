//! One full pipeline run: scrape every source, persist what succeeded,
//! fan results out to groups, and summarize the run.
//!
//! Store faults are logged and swallowed: a broken disk must not stop a
//! result that is already in hand from reaching its groups.

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::{error, info, instrument};

use crate::config::AppConfig;
use crate::distribute::orchestrator::distribute;
use crate::distribute::senders::Messenger;
use crate::models::PipelineReport;
use crate::proxy::ProxyRotator;
use crate::scrape::fetch::Fetch;
use crate::scrape::orchestrator::run_all;
use crate::scrape::strategy::CompiledSource;
use crate::store::ResultStore;

/// Run the whole pipeline for `date`.
#[instrument(level = "info", skip_all, fields(date = %date))]
pub async fn run<F, S, M>(
    config: &AppConfig,
    sources: &[CompiledSource],
    fetcher: &F,
    store: &S,
    messenger: &M,
    date: NaiveDate,
) -> PipelineReport
where
    F: Fetch,
    S: ResultStore,
    M: Messenger,
{
    let rotator = Mutex::new(ProxyRotator::new(
        &config.proxies,
        config.settings.proxy_failure_threshold,
    ));

    let (results, failures) = run_all(sources, fetcher, &rotator, &config.settings, date).await;

    for result in results.values() {
        if let Err(err) = store.upsert(result).await {
            error!(
                lottery = result.lottery_id.id_str(),
                error = %err,
                "store upsert failed, continuing with distribution"
            );
        }
    }

    let deliveries = distribute(&results, &config.groups, &config.templates, messenger).await;

    info!(
        scraped = results.len(),
        failed = failures.len(),
        groups_messaged = deliveries.len(),
        "pipeline run finished"
    );

    PipelineReport {
        date,
        results,
        failures,
        deliveries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupConfig, ScrapeSourceConfig};
    use crate::errors::{FailureReason, FetchError, SendError};
    use crate::models::{Lottery, RawDocument};
    use crate::proxy::Egress;
    use crate::scrape::strategy::compile_sources;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// Serves a fixed body per lottery; unknown lotteries get a 404.
    struct MapFetcher {
        bodies: HashMap<Lottery, String>,
    }

    impl Fetch for MapFetcher {
        async fn fetch(
            &self,
            source: &ScrapeSourceConfig,
            _egress: &Egress,
        ) -> Result<RawDocument, FetchError> {
            match self.bodies.get(&source.lottery_id) {
                Some(body) => Ok(RawDocument {
                    url: source.url.clone(),
                    body: body.clone(),
                    fetched_at: Utc::now(),
                }),
                None => Err(FetchError::Http(404)),
            }
        }
    }

    #[derive(Default)]
    struct CountingMessenger {
        sent: StdMutex<Vec<String>>,
    }

    impl Messenger for CountingMessenger {
        async fn send(&self, _group: &GroupConfig, text: &str) -> Result<(), SendError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn test_config() -> AppConfig {
        serde_yaml::from_str(
            r#"
settings:
  max_retries: 1
  max_in_flight: 2
  backoff_base_ms: 1
sources:
  - lottery_id: FEDERAL
    url: https://example.com/federal
    strategies:
      - kind: pattern_match
        position_pattern: '(?P<rank>[1-5])º:\s*(?P<digits>\d{4,6})'
        date_pattern: '(?P<date>\d{2}/\d{2}/\d{4})'
  - lottery_id: RIO_DE_JANEIRO
    url: https://example.com/rio
    strategies:
      - kind: pattern_match
        position_pattern: '(?P<rank>[1-5])º:\s*(?P<digits>\d{4,6})'
        date_pattern: '(?P<date>\d{2}/\d{2}/\d{4})'
groups:
  - id: tudo
    platform: telegram
    group_id: "-100"
    lottery_types: [FEDERAL, RIO_DE_JANEIRO]
"#,
        )
        .unwrap()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    #[tokio::test]
    async fn full_run_persists_and_delivers() {
        let config = test_config();
        let sources = compile_sources(&config.sources).unwrap();
        let mut bodies = HashMap::new();
        bodies.insert(
            Lottery::Federal,
            "Extração 10/03/2024\n1º: 12345\n2º: 67890\n3º: 11111\n4º: 22222\n5º: 33333"
                .to_string(),
        );
        bodies.insert(
            Lottery::RioDeJaneiro,
            "PTM 10/03/2024\n1º: 4711\n2º: 0815\n3º: 1234\n4º: 5678\n5º: 9012".to_string(),
        );
        let fetcher = MapFetcher { bodies };
        let store = MemoryStore::default();
        let messenger = CountingMessenger::default();

        let report = run(&config, &sources, &fetcher, &store, &messenger, date()).await;

        assert_eq!(report.results.len(), 2);
        assert!(report.failures.is_empty());
        assert_eq!(report.results[&Lottery::Federal].first(), Some("12345"));
        assert_eq!(report.results[&Lottery::RioDeJaneiro].first(), Some("4711"));

        assert!(store.get("FEDERAL|2024-03-10").await.is_some());
        assert!(store.get("RIO_DE_JANEIRO|2024-03-10").await.is_some());

        assert_eq!(report.deliveries.len(), 1);
        assert!(report.deliveries[0].success);
        assert_eq!(report.deliveries[0].sent, 2);
        assert_eq!(messenger.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn bad_sources_leave_store_and_groups_untouched() {
        let config = test_config();
        let sources = compile_sources(&config.sources).unwrap();
        // federal page carries yesterday's date; rio is unreachable
        let mut bodies = HashMap::new();
        bodies.insert(
            Lottery::Federal,
            "Extração 09/03/2024\n1º: 12345\n2º: 67890".to_string(),
        );
        let fetcher = MapFetcher { bodies };
        let store = MemoryStore::default();
        let messenger = CountingMessenger::default();

        let report = run(&config, &sources, &fetcher, &store, &messenger, date()).await;

        assert!(report.results.is_empty());
        assert_eq!(report.failures.len(), 2);
        let reasons: Vec<FailureReason> =
            report.failures.iter().map(|f| f.reason).collect();
        assert!(reasons.contains(&FailureReason::Validation));
        assert!(reasons.contains(&FailureReason::Transport));

        assert_eq!(store.statistics().await.unwrap().total_results, 0);
        assert!(report.deliveries.is_empty());
        assert!(messenger.sent.lock().unwrap().is_empty());
    }
}
