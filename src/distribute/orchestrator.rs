//! Distribution fan-out.
//!
//! Groups are walked in config order; each enabled group gets one message
//! per scraped result it subscribes to. Sends run sequentially, which
//! keeps the pipeline inside platform rate limits without extra
//! machinery. A group that fails is recorded and skipped past; the
//! remaining groups still get their messages.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument, warn};

use crate::config::{GroupConfig, MessageTemplate};
use crate::distribute::senders::Messenger;
use crate::distribute::template::{render, resolve};
use crate::models::{CanonicalResult, DeliveryOutcome, Lottery};

/// Deliver `results` to every enabled, subscribed group.
///
/// Returns one outcome per group that had anything to receive: `sent`
/// counts delivered messages, `success` is true only when every send for
/// the group went through, and `error` keeps the first failure for the
/// run report. Groups with nothing eligible produce no outcome.
#[instrument(level = "info", skip_all, fields(results = results.len(), groups = groups.len()))]
pub async fn distribute<M: Messenger>(
    results: &BTreeMap<Lottery, CanonicalResult>,
    groups: &[GroupConfig],
    templates: &[MessageTemplate],
    messenger: &M,
) -> Vec<DeliveryOutcome> {
    let mut outcomes = Vec::new();

    for group in groups.iter().filter(|g| g.enabled) {
        let eligible: Vec<&CanonicalResult> = results
            .values()
            .filter(|r| group.subscribes_to(r.lottery_id))
            .collect();
        if eligible.is_empty() {
            debug!(group = group.id.as_str(), "no eligible results for group");
            continue;
        }

        let mut sent = 0usize;
        let mut first_error: Option<String> = None;
        for result in eligible {
            let template = resolve(templates, group, result.lottery_id);
            let text = render(template, result);
            match messenger.send(group, &text).await {
                Ok(()) => {
                    sent += 1;
                    info!(
                        group = group.id.as_str(),
                        platform = %group.platform,
                        lottery = result.lottery_id.id_str(),
                        "result delivered"
                    );
                }
                Err(err) => {
                    warn!(
                        group = group.id.as_str(),
                        platform = %group.platform,
                        lottery = result.lottery_id.id_str(),
                        error = %err,
                        "delivery failed"
                    );
                    if first_error.is_none() {
                        first_error = Some(err.to_string());
                    }
                }
            }
        }

        outcomes.push(DeliveryOutcome {
            group_id: group.id.clone(),
            platform: group.platform,
            success: first_error.is_none(),
            error: first_error,
            sent,
        });
    }

    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SendError;
    use crate::models::{Platform, ResultStatus};
    use chrono::{NaiveDate, Utc};
    use std::sync::Mutex as StdMutex;

    /// Records every send; fails any message whose text contains the
    /// configured marker.
    #[derive(Default)]
    struct RecordingMessenger {
        sent: StdMutex<Vec<(String, String)>>,
        fail_on: Option<String>,
    }

    impl Messenger for RecordingMessenger {
        async fn send(&self, group: &GroupConfig, text: &str) -> Result<(), SendError> {
            if let Some(marker) = &self.fail_on {
                if text.contains(marker.as_str()) {
                    return Err(SendError::Http(500));
                }
            }
            self.sent
                .lock()
                .unwrap()
                .push((group.id.clone(), text.to_string()));
            Ok(())
        }
    }

    fn result(lottery: Lottery, first: &str) -> CanonicalResult {
        let mut positions = std::collections::BTreeMap::new();
        positions.insert(1u8, first.to_string());
        CanonicalResult {
            lottery_id: lottery,
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            positions,
            prizes: Default::default(),
            source_url: "https://example.com".to_string(),
            status: ResultStatus::Active,
            fetched_at: Utc::now(),
        }
    }

    fn results() -> BTreeMap<Lottery, CanonicalResult> {
        let mut map = BTreeMap::new();
        map.insert(Lottery::Federal, result(Lottery::Federal, "12345"));
        map.insert(
            Lottery::RioDeJaneiro,
            result(Lottery::RioDeJaneiro, "4711"),
        );
        map
    }

    fn group(id: &str, lotteries: Vec<Lottery>) -> GroupConfig {
        GroupConfig {
            id: id.to_string(),
            platform: Platform::Telegram,
            group_id: format!("-100{id}"),
            enabled: true,
            lottery_types: lotteries,
            template_id: None,
            schedule: None,
        }
    }

    #[tokio::test]
    async fn groups_receive_only_subscribed_lotteries() {
        let groups = vec![
            group("federal-only", vec![Lottery::Federal]),
            group("tudo", vec![Lottery::Federal, Lottery::RioDeJaneiro]),
        ];
        let messenger = RecordingMessenger::default();

        let outcomes = distribute(&results(), &groups, &[], &messenger).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].sent, 1);
        assert!(outcomes[0].success);
        assert_eq!(outcomes[1].sent, 2);

        let sent = messenger.sent.lock().unwrap();
        let for_first: Vec<_> = sent.iter().filter(|(g, _)| g == "federal-only").collect();
        assert_eq!(for_first.len(), 1);
        assert!(for_first[0].1.contains("12345"));
        assert!(!for_first[0].1.contains("4711"));
    }

    #[tokio::test]
    async fn group_with_nothing_eligible_produces_no_outcome() {
        let groups = vec![
            group("vazio", vec![]),
            group("goias", vec![Lottery::Goias]),
            group("desligado", vec![Lottery::Federal]),
        ];
        let mut groups = groups;
        groups[2].enabled = false;
        let messenger = RecordingMessenger::default();

        let outcomes = distribute(&results(), &groups, &[], &messenger).await;
        assert!(outcomes.is_empty());
        assert!(messenger.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_sends_mark_the_group_but_spare_the_rest() {
        let groups = vec![
            group("misto", vec![Lottery::Federal, Lottery::RioDeJaneiro]),
            group("federal-only", vec![Lottery::Federal]),
        ];
        // the Rio message contains "4711", so exactly that send fails
        let messenger = RecordingMessenger {
            fail_on: Some("4711".to_string()),
            ..Default::default()
        };

        let outcomes = distribute(&results(), &groups, &[], &messenger).await;

        assert_eq!(outcomes.len(), 2);
        let misto = &outcomes[0];
        assert!(!misto.success);
        assert_eq!(misto.sent, 1);
        assert!(misto.error.as_deref().unwrap_or("").contains("500"));

        let federal = &outcomes[1];
        assert!(federal.success);
        assert_eq!(federal.sent, 1);
        assert!(federal.error.is_none());
    }

    #[tokio::test]
    async fn group_template_overrides_default() {
        let templates = vec![MessageTemplate {
            id: "curto".to_string(),
            content: "resultado: {first}".to_string(),
            variables: vec!["first".to_string()],
            lottery_types: vec![],
            enabled: true,
        }];
        let mut g = group("curto-group", vec![Lottery::Federal]);
        g.template_id = Some("curto".to_string());
        let messenger = RecordingMessenger::default();

        distribute(&results(), &[g], &templates, &messenger).await;

        let sent = messenger.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, "resultado: 12345");
    }
}
