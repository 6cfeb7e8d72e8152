use crate::error::{MatchError, Result};
use crate::window::MatchWindow;
use crate::{DeliveryChannel, EventSource, NotificationLog, RuleSource};
use chrono::{DateTime, Duration, DurationRound, Utc};
use ecocal_common::types::{CategoryRule, DeliveryStatus, EconomicEvent, NotificationRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Who asked for a tick. Only used for logging; every trigger runs the
/// same matching logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TickTrigger {
    Scheduler,
    Webhook,
    Manual,
}

impl std::fmt::Display for TickTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TickTrigger::Scheduler => write!(f, "scheduler"),
            TickTrigger::Webhook => write!(f, "webhook"),
            TickTrigger::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MatcherConfig {
    pub window: MatchWindow,
    /// A record younger than this suppresses the pair.
    pub dedup_lookback: Duration,
    /// Upper bound for one group's delivery call.
    pub delivery_timeout: std::time::Duration,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            window: MatchWindow::default(),
            dedup_lookback: Duration::hours(4),
            delivery_timeout: std::time::Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DuePair {
    pub event: EconomicEvent,
    pub rule: CategoryRule,
}

/// Pairs sharing a key go out as a single message.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GroupKey {
    pub destination: String,
    /// Event time truncated to the minute.
    pub event_minute: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DeliveryGroup {
    pub key: GroupKey,
    pub pairs: Vec<DuePair>,
}

impl DeliveryGroup {
    /// Distinct events of the group, in the order they were matched.
    pub fn events(&self) -> Vec<EconomicEvent> {
        let mut seen = HashSet::new();
        self.pairs
            .iter()
            .filter(|p| seen.insert(p.event.id.as_str()))
            .map(|p| p.event.clone())
            .collect()
    }

    /// The rule the outbound message is rendered for. Groups are never empty.
    pub fn lead_rule(&self) -> &CategoryRule {
        &self.pairs[0].rule
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub trigger: TickTrigger,
    pub started_at: DateTime<Utc>,
    pub events_scanned: usize,
    pub rules_scanned: usize,
    pub due_pairs: usize,
    pub suppressed_pairs: usize,
    pub groups: usize,
    pub sent_groups: usize,
    pub failed_groups: usize,
    pub records_written: usize,
    pub record_failures: usize,
}

impl TickReport {
    fn new(trigger: TickTrigger, started_at: DateTime<Utc>) -> Self {
        Self {
            trigger,
            started_at,
            events_scanned: 0,
            rules_scanned: 0,
            due_pairs: 0,
            suppressed_pairs: 0,
            groups: 0,
            sent_groups: 0,
            failed_groups: 0,
            records_written: 0,
            record_failures: 0,
        }
    }
}

pub struct AlertMatcher {
    events: Arc<dyn EventSource>,
    rules: Arc<dyn RuleSource>,
    log: Arc<dyn NotificationLog>,
    delivery: Arc<dyn DeliveryChannel>,
    config: MatcherConfig,
    /// Serializes ticks so one tick's records are written before the next
    /// tick runs its dedup lookups.
    tick_lock: Mutex<()>,
}

impl AlertMatcher {
    pub fn new(
        events: Arc<dyn EventSource>,
        rules: Arc<dyn RuleSource>,
        log: Arc<dyn NotificationLog>,
        delivery: Arc<dyn DeliveryChannel>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            events,
            rules,
            log,
            delivery,
            config,
            tick_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub async fn run_tick(&self) -> Result<TickReport> {
        self.run_tick_from(TickTrigger::Manual).await
    }

    pub async fn run_tick_from(&self, trigger: TickTrigger) -> Result<TickReport> {
        self.run_tick_at(trigger, Utc::now()).await
    }

    pub async fn run_tick_at(
        &self,
        trigger: TickTrigger,
        now: DateTime<Utc>,
    ) -> Result<TickReport> {
        let _guard = self.tick_lock.lock().await;
        let mut report = TickReport::new(trigger, now);

        let rules = self
            .rules
            .list_active_category_rules()
            .await
            .map_err(MatchError::RuleStore)?;
        let events = self
            .events
            .list_upcoming_events(now)
            .await
            .map_err(MatchError::EventStore)?;
        report.rules_scanned = rules.len();
        report.events_scanned = events.len();

        let due = find_due_pairs(&events, &rules, now, &self.config.window);
        report.due_pairs = due.len();

        // Every dedup lookup runs before the first delivery.
        let since = now
            .checked_sub_signed(self.config.dedup_lookback)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut pending = Vec::with_capacity(due.len());
        for pair in due {
            let notified = self
                .log
                .was_recently_notified(&pair.event.id, &pair.rule.id, since)
                .await
                .map_err(MatchError::NotificationLog)?;
            if notified {
                tracing::debug!(
                    event_id = %pair.event.id,
                    event = %pair.event.name,
                    rule_id = %pair.rule.id,
                    "Alert already sent, skipping"
                );
                report.suppressed_pairs += 1;
                continue;
            }
            pending.push(pair);
        }

        let groups = group_due_pairs(pending);
        report.groups = groups.len();

        for group in &groups {
            let (status, error) = self.deliver_group(group).await;
            match status {
                DeliveryStatus::Sent => report.sent_groups += 1,
                DeliveryStatus::Failed => report.failed_groups += 1,
            }
            self.record_group(group, status, error, now, &mut report)
                .await;
        }

        if report.groups > 0 || report.suppressed_pairs > 0 {
            tracing::info!(
                trigger = %trigger,
                events = report.events_scanned,
                rules = report.rules_scanned,
                due = report.due_pairs,
                suppressed = report.suppressed_pairs,
                sent = report.sent_groups,
                failed = report.failed_groups,
                "Alert tick finished"
            );
        } else {
            tracing::debug!(
                trigger = %trigger,
                events = report.events_scanned,
                rules = report.rules_scanned,
                "Alert tick finished, nothing due"
            );
        }

        Ok(report)
    }

    async fn deliver_group(&self, group: &DeliveryGroup) -> (DeliveryStatus, Option<String>) {
        let events = group.events();
        let rule = group.lead_rule();
        tracing::info!(
            destination = %group.key.destination,
            event_time = %group.key.event_minute.format("%Y-%m-%d %H:%M"),
            events = events.len(),
            impact = %rule.impact,
            "Sending grouped alert"
        );

        let timeout = self.config.delivery_timeout;
        let call = self.delivery.deliver(&group.key.destination, &events, rule);
        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(())) => (DeliveryStatus::Sent, None),
            Ok(Err(e)) => {
                tracing::warn!(
                    destination = %group.key.destination,
                    error = %e,
                    "Grouped alert delivery failed"
                );
                (DeliveryStatus::Failed, Some(format!("{e:#}")))
            }
            Err(_) => {
                tracing::warn!(
                    destination = %group.key.destination,
                    timeout_ms = timeout.as_millis() as u64,
                    "Grouped alert delivery timed out"
                );
                (
                    DeliveryStatus::Failed,
                    Some(format!("delivery timed out after {}ms", timeout.as_millis())),
                )
            }
        }
    }

    async fn record_group(
        &self,
        group: &DeliveryGroup,
        status: DeliveryStatus,
        error: Option<String>,
        now: DateTime<Utc>,
        report: &mut TickReport,
    ) {
        for pair in &group.pairs {
            let record = NotificationRecord {
                id: ecocal_common::id::next_id(),
                event_id: pair.event.id.clone(),
                rule_id: pair.rule.id.clone(),
                message: format!(
                    "Grouped alert for {} ({}, {:.2}h before)",
                    pair.event.name,
                    pair.rule.impact,
                    pair.rule.lead_time.as_hours()
                ),
                status,
                destination: group.key.destination.clone(),
                error_message: error.clone(),
                attempted_at: now,
            };
            match self.log.append_record(&record).await {
                Ok(()) => report.records_written += 1,
                Err(e) => {
                    report.record_failures += 1;
                    tracing::error!(
                        event_id = %pair.event.id,
                        rule_id = %pair.rule.id,
                        status = %status,
                        error = %e,
                        "Failed to append notification record"
                    );
                }
            }
        }
    }
}

/// Matches every event against every rule and keeps the pairs whose
/// lead-time boundary is inside `window` at `now`.
pub fn find_due_pairs(
    events: &[EconomicEvent],
    rules: &[CategoryRule],
    now: DateTime<Utc>,
    window: &MatchWindow,
) -> Vec<DuePair> {
    let mut due = Vec::new();
    for event in events {
        let remaining = event.scheduled_at - now;
        if remaining <= Duration::zero() {
            continue;
        }
        for rule in rules {
            if !rule.active || rule.impact != event.impact {
                continue;
            }
            if window.is_due(remaining, rule.lead_time) {
                due.push(DuePair {
                    event: event.clone(),
                    rule: rule.clone(),
                });
            }
        }
    }
    due
}

/// Groups pairs by destination and event minute, ordered by key.
pub fn group_due_pairs(pairs: Vec<DuePair>) -> Vec<DeliveryGroup> {
    let mut groups: BTreeMap<GroupKey, Vec<DuePair>> = BTreeMap::new();
    for pair in pairs {
        let event_minute = pair
            .event
            .scheduled_at
            .duration_trunc(Duration::minutes(1))
            .unwrap_or(pair.event.scheduled_at);
        let key = GroupKey {
            destination: pair.rule.destination.clone(),
            event_minute,
        };
        groups.entry(key).or_default().push(pair);
    }
    groups
        .into_iter()
        .map(|(key, pairs)| DeliveryGroup { key, pairs })
        .collect()
}
