use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::alerts;
use crate::analyzer::{self, Analyzer};
use crate::client::{ClientStats, ResilientClient};
use crate::config::{MonitoringConfig, NotificationsConfig};
use crate::error::Result;
use crate::notify::NotificationRouter;
use crate::types::{LineupResponse, MatchRef, MatchStatus, RosterEntry, Urgency, WatchEntry};

/// Pause applied when the daily cycle cap has been reached.
const DAILY_CAP_PAUSE: Duration = Duration::from_secs(3_600);

/// Ceiling for the error backoff between failed cycles.
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(300);

/// Result of one monitoring cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleOutcome {
    pub matches_checked: usize,
    pub alerts_sent: u32,
}

/// Result of one per-match lineup check, applied to the watch-list by the
/// loop after the join (the loop is the only watch-list writer).
#[derive(Debug)]
struct CheckOutcome {
    match_id: String,
    published: bool,
    alerts_sent: u32,
    missing_warned: bool,
    failed: bool,
}

/// Status snapshot for an external reporter.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MonitorStatus {
    pub uptime_seconds: u64,
    pub watched_matches: usize,
    pub total_cycles: u64,
    pub successful_cycles: u64,
    pub failed_cycles: u64,
    pub cycles_today: u32,
    pub total_checks: u64,
    pub successful_checks: u64,
    pub client: ClientStats,
}

/// Adaptive monitoring loop.
///
/// Owns the watch-list exclusively. Each cycle fetches fixtures, reconciles
/// the watch-list, runs due lineup checks concurrently, routes resulting
/// alerts, and sleeps an adaptively computed duration. Cycle failures back
/// off and never terminate the loop; shutdown is observed at sleep
/// boundaries and between joined checks.
pub struct Monitor {
    client: Arc<ResilientClient>,
    router: Arc<NotificationRouter>,
    analyzer: Analyzer,
    roster: Arc<Vec<RosterEntry>>,
    config: MonitoringConfig,
    notifications: NotificationsConfig,
    shutdown: watch::Receiver<bool>,
    watchlist: HashMap<String, WatchEntry>,
    total_cycles: u64,
    successful_cycles: u64,
    failed_cycles: u64,
    total_checks: u64,
    successful_checks: u64,
    consecutive_errors: u32,
    cycles_today: u32,
    current_day: NaiveDate,
    started_at: Instant,
}

impl Monitor {
    pub fn new(
        client: Arc<ResilientClient>,
        router: Arc<NotificationRouter>,
        analyzer: Analyzer,
        roster: Vec<RosterEntry>,
        config: MonitoringConfig,
        notifications: NotificationsConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            client,
            router,
            analyzer,
            roster: Arc::new(roster),
            config,
            notifications,
            shutdown,
            watchlist: HashMap::new(),
            total_cycles: 0,
            successful_cycles: 0,
            failed_cycles: 0,
            total_checks: 0,
            successful_checks: 0,
            consecutive_errors: 0,
            cycles_today: 0,
            current_day: Utc::now().date_naive(),
            started_at: Instant::now(),
        }
    }

    /// Drive cycles until shutdown is requested.
    pub async fn run(mut self) {
        info!(
            "starting lineup monitoring (interval {}m, lead window {}m, sprint {}m @ {}m)",
            self.config.check_interval_minutes,
            self.config.lead_window_minutes,
            self.config.final_sprint_minutes,
            self.config.final_sprint_interval_minutes,
        );
        if self.notifications.send_startup {
            let text = format!(
                "🚀 Lineup monitor started\nCheck interval: {} minutes\nRoster size: {} players",
                self.config.check_interval_minutes,
                self.roster.len()
            );
            self.router.send_message(&text, Urgency::Info).await;
        }

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            self.reset_daily_counter();
            if self.cycles_today >= self.config.max_cycles_per_day {
                warn!(
                    "daily cycle cap reached ({}), pausing",
                    self.config.max_cycles_per_day
                );
                if self.sleep_or_shutdown(DAILY_CAP_PAUSE).await {
                    break;
                }
                continue;
            }

            match self.cycle().await {
                Ok(outcome) => {
                    self.total_cycles += 1;
                    self.successful_cycles += 1;
                    self.cycles_today += 1;
                    self.consecutive_errors = 0;
                    debug!(
                        "cycle complete: {} checks, {} alerts, {} watched",
                        outcome.matches_checked,
                        outcome.alerts_sent,
                        self.watchlist.len()
                    );
                }
                Err(e) => {
                    self.total_cycles += 1;
                    self.failed_cycles += 1;
                    self.cycles_today += 1;
                    self.consecutive_errors += 1;
                    let backoff = error_backoff(self.consecutive_errors);
                    error!(
                        "cycle failed ({} consecutive): {e}; backing off {}s",
                        self.consecutive_errors,
                        backoff.as_secs()
                    );
                    if self.sleep_or_shutdown(backoff).await {
                        break;
                    }
                    continue;
                }
            }

            let sleep = self.next_sleep();
            debug!("sleeping {}s until next cycle", sleep.as_secs());
            if self.sleep_or_shutdown(sleep).await {
                break;
            }
        }

        self.wind_down().await;
    }

    /// Run exactly one cycle. Used by the one-shot mode and exercised by the
    /// loop every iteration.
    pub async fn run_once(&mut self) -> Result<CycleOutcome> {
        self.cycle().await
    }

    pub async fn status(&self) -> MonitorStatus {
        MonitorStatus {
            uptime_seconds: self.started_at.elapsed().as_secs(),
            watched_matches: self.watchlist.len(),
            total_cycles: self.total_cycles,
            successful_cycles: self.successful_cycles,
            failed_cycles: self.failed_cycles,
            cycles_today: self.cycles_today,
            total_checks: self.total_checks,
            successful_checks: self.successful_checks,
            client: self.client.stats().await,
        }
    }

    async fn cycle(&mut self) -> Result<CycleOutcome> {
        let now = Utc::now();
        let fixtures = self.client.fetch_fixtures(now.date_naive()).await?;
        self.reconcile_watchlist(&fixtures, now);
        self.recompute_priorities(now);

        let due = self.due_matches(now);
        if due.is_empty() {
            debug!("no lineup checks due");
            return Ok(CycleOutcome::default());
        }

        info!("running {} concurrent lineup checks", due.len());
        let mut set = JoinSet::new();
        for match_id in &due {
            let Some(entry) = self.watchlist.get_mut(match_id) else {
                continue;
            };
            entry.last_check = Some(Instant::now());
            set.spawn(check_match(
                Arc::clone(&self.client),
                Arc::clone(&self.router),
                self.analyzer.clone(),
                Arc::clone(&self.roster),
                entry.match_ref.clone(),
                entry.missing_reported,
                self.config.send_confirmations,
            ));
        }

        let outcomes = self.join_checks(&mut set).await;

        let mut alerts_sent = 0;
        for outcome in outcomes {
            self.total_checks += 1;
            if !outcome.failed {
                self.successful_checks += 1;
            }
            alerts_sent += outcome.alerts_sent;
            if let Some(entry) = self.watchlist.get_mut(&outcome.match_id) {
                if outcome.published {
                    entry.lineup_seen = true;
                }
                if outcome.missing_warned {
                    entry.missing_reported = true;
                }
                entry.alerts_sent += outcome.alerts_sent;
            }
        }

        Ok(CycleOutcome {
            matches_checked: due.len(),
            alerts_sent,
        })
    }

    /// Join the concurrent checks, watching for shutdown. When shutdown
    /// arrives mid-join, in-flight checks get a bounded grace period before
    /// being abandoned.
    async fn join_checks(&mut self, set: &mut JoinSet<CheckOutcome>) -> Vec<CheckOutcome> {
        let mut outcomes = Vec::new();

        let interrupted = tokio::select! {
            _ = drain(set, &mut outcomes) => false,
            _ = wait_shutdown(&mut self.shutdown) => true,
        };

        if interrupted && !set.is_empty() {
            let grace = Duration::from_secs(self.config.shutdown_grace_seconds);
            info!(
                "shutdown requested, granting {}s to {} in-flight checks",
                grace.as_secs(),
                set.len()
            );
            if tokio::time::timeout(grace, drain(set, &mut outcomes))
                .await
                .is_err()
            {
                warn!("grace period expired, abandoning {} checks", set.len());
                set.abort_all();
            }
        }

        outcomes
    }

    /// Add newly relevant matches, refresh kept ones wholesale, and drop
    /// matches that finished or fell out of the fixture window.
    fn reconcile_watchlist(&mut self, fixtures: &[MatchRef], now: DateTime<Utc>) {
        let lead = chrono::Duration::minutes(self.config.lead_window_minutes as i64);
        let mut relevant: HashSet<String> = HashSet::new();

        for fixture in fixtures {
            let until_kickoff = fixture.kickoff - now;
            let in_window =
                until_kickoff >= chrono::Duration::zero() && until_kickoff <= lead;
            let live = fixture.status == MatchStatus::Live;
            if !(in_window || live) || fixture.status == MatchStatus::Finished {
                continue;
            }

            let players: HashSet<String> = self
                .roster
                .iter()
                .filter(|p| fixture.involves_team(&p.team.name))
                .map(|p| p.name.clone())
                .collect();
            if players.is_empty() {
                continue;
            }

            relevant.insert(fixture.id.clone());
            match self.watchlist.get_mut(&fixture.id) {
                Some(entry) => entry.match_ref = fixture.clone(),
                None => {
                    info!(
                        "watching {} vs {} (kickoff {})",
                        fixture.home.name,
                        fixture.away.name,
                        fixture.kickoff.format("%H:%M")
                    );
                    let priority = priority_for(now, fixture.kickoff);
                    self.watchlist.insert(
                        fixture.id.clone(),
                        WatchEntry::new(fixture.clone(), players, priority),
                    );
                }
            }
        }

        self.watchlist.retain(|id, entry| {
            let keep =
                relevant.contains(id) && entry.match_ref.status != MatchStatus::Finished;
            if !keep {
                debug!("dropping match {id} from watch-list");
            }
            keep
        });
    }

    fn recompute_priorities(&mut self, now: DateTime<Utc>) {
        for entry in self.watchlist.values_mut() {
            entry.priority = priority_for(now, entry.match_ref.kickoff);
        }
    }

    fn due_matches(&self, now: DateTime<Utc>) -> Vec<String> {
        self.watchlist
            .values()
            .filter(|entry| self.is_due(entry, now))
            .map(|entry| entry.match_ref.id.clone())
            .collect()
    }

    /// A match is due when no lineup has been observed yet, or when the
    /// priority-dependent minimum interval has elapsed since the last check.
    fn is_due(&self, entry: &WatchEntry, now: DateTime<Utc>) -> bool {
        if !entry.lineup_seen {
            return true;
        }
        let interval = self.min_check_interval(entry, now);
        match entry.last_check {
            None => true,
            Some(last) => last.elapsed() >= interval,
        }
    }

    /// Minimum spacing between checks for one match: the final-sprint
    /// interval inside the sprint window, widening with priority further out.
    fn min_check_interval(&self, entry: &WatchEntry, now: DateTime<Utc>) -> Duration {
        let until_kickoff = entry.match_ref.kickoff - now;
        let sprint = chrono::Duration::minutes(self.config.final_sprint_minutes as i64);
        if until_kickoff <= sprint {
            return Duration::from_secs(self.config.final_sprint_interval_minutes * 60);
        }
        let base = Duration::from_secs(self.config.min_check_interval_minutes * 60);
        match entry.priority {
            1 | 2 => base,
            3 => base * 2,
            _ => base * 3,
        }
    }

    /// Next cycle sleep: the base interval, shortened by proximity to the
    /// nearest kickoff and floored at the final-sprint interval.
    fn next_sleep(&self) -> Duration {
        let base = Duration::from_secs(self.config.check_interval_minutes * 60);
        let sprint_interval =
            Duration::from_secs(self.config.final_sprint_interval_minutes * 60);
        if self.watchlist.is_empty() {
            return base;
        }

        let now = Utc::now();
        let next_kickoff_secs = self
            .watchlist
            .values()
            .filter(|e| e.match_ref.kickoff > now)
            .map(|e| (e.match_ref.kickoff - now).num_seconds())
            .min();

        let derived = match next_kickoff_secs {
            // Only live matches remain: keep the sprint cadence.
            None => sprint_interval,
            Some(secs) if secs <= (self.config.final_sprint_minutes * 60) as i64 => {
                sprint_interval
            }
            Some(secs) if secs <= 3_600 => (base / 4).max(Duration::from_secs(60)),
            Some(_) => base,
        };

        derived.min(base).max(sprint_interval)
    }

    fn reset_daily_counter(&mut self) {
        let today = Utc::now().date_naive();
        if today > self.current_day {
            self.cycles_today = 0;
            self.current_day = today;
            info!("daily cycle counter reset");
        }
    }

    /// Sleep for `duration`, returning true if shutdown interrupted it.
    async fn sleep_or_shutdown(&mut self, duration: Duration) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = wait_shutdown(&mut self.shutdown) => true,
        }
    }

    async fn wind_down(mut self) {
        info!("stopping lineup monitoring");
        if self.notifications.send_shutdown {
            let text = format!(
                "📴 Lineup monitor stopped\nUptime: {}s\nCycles: {} ({} failed)",
                self.started_at.elapsed().as_secs(),
                self.total_cycles,
                self.failed_cycles,
            );
            self.router.send_message(&text, Urgency::Info).await;
        }
        let status = self.status().await;
        match serde_json::to_string(&status) {
            Ok(json) => info!("final status: {json}"),
            Err(e) => warn!("failed to serialize final status: {e}"),
        }
        self.watchlist.clear();
        self.client.close();
    }
}

/// Drain a join set into `outcomes`, logging panicked tasks.
async fn drain(set: &mut JoinSet<CheckOutcome>, outcomes: &mut Vec<CheckOutcome>) {
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => warn!("lineup check task failed to join: {e}"),
        }
    }
}

/// Resolve only when shutdown is requested. If the shutdown sender is gone,
/// no shutdown can ever arrive; park forever.
async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Watch priority as a pure function of now vs kickoff.
/// 1 = imminent (≤15 min, or already kicked off) … 5 = distant (>24 h).
pub fn priority_for(now: DateTime<Utc>, kickoff: DateTime<Utc>) -> u8 {
    let minutes = (kickoff - now).num_minutes();
    if minutes <= 15 {
        1
    } else if minutes <= 60 {
        2
    } else if minutes <= 6 * 60 {
        3
    } else if minutes <= 24 * 60 {
        4
    } else {
        5
    }
}

/// Exponential backoff between failed cycles, capped at five minutes.
fn error_backoff(consecutive_errors: u32) -> Duration {
    let secs = 30u64.saturating_mul(u64::from(consecutive_errors).pow(2));
    Duration::from_secs(secs).min(MAX_ERROR_BACKOFF)
}

/// One match's check: fetch, analyze, alert. Strictly sequential within the
/// match; failures are contained here and never abort sibling checks.
async fn check_match(
    client: Arc<ResilientClient>,
    router: Arc<NotificationRouter>,
    analyzer: Analyzer,
    roster: Arc<Vec<RosterEntry>>,
    match_ref: MatchRef,
    missing_already_reported: bool,
    send_confirmations: bool,
) -> CheckOutcome {
    let mut outcome = CheckOutcome {
        match_id: match_ref.id.clone(),
        published: false,
        alerts_sent: 0,
        missing_warned: false,
        failed: false,
    };

    match client.fetch_lineup(&match_ref.id).await {
        Ok(LineupResponse::Published { home, away }) => {
            outcome.published = true;
            let discrepancies = analyzer.analyze(&match_ref, &home, &away, &roster);
            let summary = analyzer::summarize(&discrepancies);
            info!(
                "match {}: {} analyzed, {} benched, {} unexpected starters",
                match_ref.id, summary.total, summary.benched, summary.started
            );

            let alerts = alerts::generate(&discrepancies, &match_ref, send_confirmations);
            for alert in &alerts {
                router.send_alert(alert).await;
                outcome.alerts_sent += 1;
            }
        }
        Ok(LineupResponse::NotPublished) => {
            if missing_already_reported {
                debug!("lineup still unpublished for match {}", match_ref.id);
            } else {
                let text = format!(
                    "📋 Lineup not yet available for {} vs {} (kickoff {})",
                    match_ref.home.name,
                    match_ref.away.name,
                    match_ref.kickoff.format("%H:%M"),
                );
                router.send_message(&text, Urgency::Warning).await;
                outcome.missing_warned = true;
            }
        }
        Err(e) => {
            warn!("lineup check failed for match {}: {e}", match_ref.id);
            outcome.failed = true;
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::{FeedScript, ScriptedFeed};
    use crate::config::AppConfig;
    use crate::notify::NotificationChannel;
    use crate::notify::testing::RecordingChannel;
    use crate::types::{LineupSnapshot, PlayerPosition, Team};
    use std::sync::atomic::Ordering;

    fn entry(name: &str, team: &str, expected_starting: bool) -> RosterEntry {
        RosterEntry {
            id: name.to_lowercase(),
            name: name.to_string(),
            team: Team::new(team, "ABC"),
            position: PlayerPosition::Forward,
            expected_starting,
            average_points: 11.0,
            games_played: Some(18),
            draft_percentage: Some("90".into()),
            opponent: None,
        }
    }

    fn fixture(id: &str, home: &str, away: &str, minutes_out: i64) -> MatchRef {
        MatchRef {
            id: id.into(),
            home: Team::new(home, "HOM"),
            away: Team::new(away, "AWY"),
            kickoff: Utc::now() + chrono::Duration::minutes(minutes_out),
            status: MatchStatus::NotStarted,
        }
    }

    fn snapshot(team: &str, starters: &[&str]) -> LineupSnapshot {
        LineupSnapshot {
            team: Team::new(team, "ABC"),
            starting: starters.iter().map(|s| s.to_string()).collect(),
            bench: Vec::new(),
        }
    }

    struct Harness {
        feed: Arc<ScriptedFeed>,
        chat: Arc<RecordingChannel>,
        mail: Arc<RecordingChannel>,
        monitor: Monitor,
        _shutdown_tx: watch::Sender<bool>,
    }

    fn harness(roster: Vec<RosterEntry>) -> Harness {
        let mut config = AppConfig::default();
        config.retry.strategy = "fixed".to_string();
        config.retry.base_delay_ms = 10;

        let feed = Arc::new(ScriptedFeed::default());
        let client = Arc::new(ResilientClient::new(feed.clone(), &config));

        let chat = RecordingChannel::new("chat", true, true);
        let mail = RecordingChannel::new("mail", false, true);
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![chat.clone(), mail.clone()];
        let router = Arc::new(NotificationRouter::new(channels));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let monitor = Monitor::new(
            client,
            router,
            Analyzer::default(),
            roster,
            config.monitoring.clone(),
            config.notifications.clone(),
            shutdown_rx,
        );
        Harness {
            feed,
            chat,
            mail,
            monitor,
            _shutdown_tx: shutdown_tx,
        }
    }

    #[test]
    fn priority_tiers() {
        let now = Utc::now();
        let at = |m: i64| now + chrono::Duration::minutes(m);
        assert_eq!(priority_for(now, at(5)), 1);
        assert_eq!(priority_for(now, at(-10)), 1);
        assert_eq!(priority_for(now, at(45)), 2);
        assert_eq!(priority_for(now, at(4 * 60)), 3);
        assert_eq!(priority_for(now, at(20 * 60)), 4);
        assert_eq!(priority_for(now, at(48 * 60)), 5);
    }

    #[test]
    fn error_backoff_grows_and_caps() {
        assert_eq!(error_backoff(1), Duration::from_secs(30));
        assert_eq!(error_backoff(2), Duration::from_secs(120));
        assert_eq!(error_backoff(3), Duration::from_secs(270));
        assert_eq!(error_backoff(4), MAX_ERROR_BACKOFF);
        assert_eq!(error_backoff(10), MAX_ERROR_BACKOFF);
    }

    #[tokio::test(start_paused = true)]
    async fn benched_player_alerts_every_channel() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "55", "Arsenal", "Chelsea", 20,
        )]));
        h.feed.push_lineup(FeedScript::Ok(LineupResponse::Published {
            home: snapshot("Arsenal", &["Martinelli", "Odegaard"]),
            away: snapshot("Chelsea", &["Palmer"]),
        }));

        let outcome = h.monitor.run_once().await.unwrap();
        assert_eq!(outcome.matches_checked, 1);
        assert_eq!(outcome.alerts_sent, 1);
        // Urgent alerts broadcast to every configured channel.
        assert_eq!(h.chat.alert_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(h.mail.alert_attempts.load(Ordering::SeqCst), 1);

        let watch = &h.monitor.watchlist["55"];
        assert!(watch.lineup_seen);
        assert_eq!(watch.alerts_sent, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unpublished_lineup_warns_exactly_once() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "55", "Arsenal", "Chelsea", 20,
        )]));
        // The scripted feed answers NotPublished once scripts run dry, so
        // both cycles observe an unpublished lineup.

        let first = h.monitor.run_once().await.unwrap();
        assert_eq!(first.alerts_sent, 0);

        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "55", "Arsenal", "Chelsea", 18,
        )]));
        let second = h.monitor.run_once().await.unwrap();
        assert_eq!(second.alerts_sent, 0);

        // One warning overall, to the low-noise channel only.
        assert_eq!(h.chat.message_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(h.mail.message_attempts.load(Ordering::SeqCst), 0);
        assert_eq!(h.chat.alert_attempts.load(Ordering::SeqCst), 0);
        assert!(h.monitor.watchlist["55"].missing_reported);
    }

    #[tokio::test(start_paused = true)]
    async fn matches_outside_lead_window_ignored() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Ok(vec![
            fixture("1", "Arsenal", "Chelsea", 20),
            fixture("2", "Arsenal", "Everton", 240),
        ]));

        h.monitor.run_once().await.unwrap();
        assert!(h.monitor.watchlist.contains_key("1"));
        assert!(!h.monitor.watchlist.contains_key("2"));
    }

    #[tokio::test(start_paused = true)]
    async fn matches_without_roster_players_ignored() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "9", "Everton", "Fulham", 20,
        )]));

        let outcome = h.monitor.run_once().await.unwrap();
        assert_eq!(outcome.matches_checked, 0);
        assert!(h.monitor.watchlist.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_fixture_leaves_watchlist() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "55", "Arsenal", "Chelsea", 20,
        )]));
        h.monitor.run_once().await.unwrap();
        assert!(h.monitor.watchlist.contains_key("55"));

        // Next cycle the fixture is gone from the feed.
        h.feed.push_fixtures(FeedScript::Ok(Vec::new()));
        // Invalidate the fixtures cache by advancing past its TTL.
        tokio::time::advance(Duration::from_secs(601)).await;
        h.monitor.run_once().await.unwrap();
        assert!(h.monitor.watchlist.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn check_failure_does_not_fail_cycle() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "55", "Arsenal", "Chelsea", 20,
        )]));
        h.feed.push_lineup(FeedScript::Fail);

        let outcome = h.monitor.run_once().await.unwrap();
        assert_eq!(outcome.matches_checked, 1);
        assert_eq!(outcome.alerts_sent, 0);
        assert_eq!(h.monitor.successful_checks, 0);
        assert_eq!(h.monitor.total_checks, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fixture_failure_aborts_cycle_only() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Fail);

        assert!(h.monitor.run_once().await.is_err());

        // The next cycle recovers.
        h.feed.push_fixtures(FeedScript::Ok(Vec::new()));
        assert!(h.monitor.run_once().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn sprint_window_shortens_sleep() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "55", "Arsenal", "Chelsea", 20,
        )]));
        h.monitor.run_once().await.unwrap();

        // 20 minutes out is inside the 30-minute sprint window.
        assert_eq!(h.monitor.next_sleep(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_watchlist_sleeps_base_interval() {
        let h = harness(vec![entry("Saka", "Arsenal", true)]);
        assert_eq!(h.monitor.next_sleep(), Duration::from_secs(15 * 60));
    }

    #[tokio::test(start_paused = true)]
    async fn hour_out_quarter_interval() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        // 45 minutes out: beyond the sprint window, inside the hour.
        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "55", "Arsenal", "Chelsea", 45,
        )]));
        h.monitor.run_once().await.unwrap();

        assert_eq!(h.monitor.next_sleep(), Duration::from_secs(15 * 60 / 4));
    }

    #[tokio::test(start_paused = true)]
    async fn due_only_after_min_interval_once_lineup_seen() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h.feed.push_fixtures(FeedScript::Ok(vec![fixture(
            "55", "Arsenal", "Chelsea", 45,
        )]));
        h.feed.push_lineup(FeedScript::Ok(LineupResponse::Published {
            home: snapshot("Arsenal", &["Saka"]),
            away: snapshot("Chelsea", &["Palmer"]),
        }));
        h.monitor.run_once().await.unwrap();
        assert!(h.monitor.watchlist["55"].lineup_seen);

        // Immediately afterwards the match is not due again.
        let now = Utc::now();
        let entry = &h.monitor.watchlist["55"];
        assert!(!h.monitor.is_due(entry, now));

        // Once the minimum interval passes it becomes due.
        tokio::time::advance(Duration::from_secs(5 * 60 + 1)).await;
        let entry = &h.monitor.watchlist["55"];
        assert!(h.monitor.is_due(entry, now));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_sleep_promptly() {
        let mut h = harness(vec![entry("Saka", "Arsenal", true)]);
        h._shutdown_tx.send(true).unwrap();
        assert!(h.monitor.sleep_or_shutdown(Duration::from_secs(900)).await);
    }
}
