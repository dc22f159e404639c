use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::breaker::{BreakerSettings, BreakerState, CircuitBreaker};
use crate::cache::{CacheStats, TtlCache};
use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::roster::canonical_team_name;
use crate::types::{LineupResponse, LineupSnapshot, MatchRef, MatchStatus, Team};

/// Tournament filter applied to the upstream fixtures feed.
const PREMIER_LEAGUE_ID: i64 = 17;

/// Bound on the startup connectivity probe, independent of the breaker's
/// per-call timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw transport to the upstream match-data provider.
///
/// Implementations perform a single fetch with no resilience of their own;
/// the [`ResilientClient`] supplies limiting, breaking, retrying and caching.
#[async_trait]
pub trait UpstreamFeed: Send + Sync {
    async fn fixtures_raw(&self, date: NaiveDate) -> Result<Vec<MatchRef>>;
    async fn lineup_raw(&self, match_id: &str) -> Result<LineupResponse>;
}

/// HTTP transport against the scoreboard API.
pub struct SofaFeed {
    http: reqwest::Client,
    base_url: String,
}

impl SofaFeed {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("LineupTracker/1.0")
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl UpstreamFeed for SofaFeed {
    async fn fixtures_raw(&self, date: NaiveDate) -> Result<Vec<MatchRef>> {
        let url = format!(
            "{}/api/v1/sport/football/scheduled-events/{}",
            self.base_url,
            date.format("%Y-%m-%d")
        );
        debug!("fetching fixtures from {url}");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, "fixtures"));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;
        parse_fixtures(&body)
    }

    async fn lineup_raw(&self, match_id: &str) -> Result<LineupResponse> {
        let url = format!("{}/api/v1/event/{match_id}/lineups", self.base_url);
        debug!("fetching lineup from {url}");

        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // Not published yet: a valid result, not a failure.
            return Ok(LineupResponse::NotPublished);
        }
        if !status.is_success() {
            return Err(status_error(status, "lineup"));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;
        parse_lineups(&body)
    }
}

fn status_error(status: reqwest::StatusCode, what: &str) -> Error {
    if status.is_server_error() || status.as_u16() == 429 {
        Error::Transient(format!("{what} fetch returned {status}"))
    } else {
        Error::Upstream(format!("{what} fetch returned {status}"))
    }
}

/// Convert the scheduled-events payload into an ordered fixture list.
/// Malformed events are skipped with a warning rather than failing the batch.
pub fn parse_fixtures(body: &Value) -> Result<Vec<MatchRef>> {
    let events = body
        .get("events")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Parse("fixtures payload missing events array".into()))?;

    let mut matches = Vec::new();
    for event in events {
        let tournament_id = event
            .pointer("/tournament/id")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        if tournament_id != PREMIER_LEAGUE_ID {
            continue;
        }
        match parse_fixture(event) {
            Ok(m) => matches.push(m),
            Err(e) => warn!("skipping malformed fixture: {e}"),
        }
    }
    matches.sort_by_key(|m| m.kickoff);
    Ok(matches)
}

fn parse_fixture(event: &Value) -> Result<MatchRef> {
    let id = event
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Parse("event missing id".into()))?;
    let home = parse_team(event.get("homeTeam"))?;
    let away = parse_team(event.get("awayTeam"))?;

    let timestamp = event
        .get("startTimestamp")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Parse(format!("event {id} missing startTimestamp")))?;
    let kickoff = DateTime::<Utc>::from_timestamp(timestamp, 0)
        .ok_or_else(|| Error::Parse(format!("event {id} has invalid timestamp")))?;

    let status = match event.pointer("/status/code").and_then(Value::as_i64) {
        Some(0) => MatchStatus::NotStarted,
        Some(1) | Some(2) => MatchStatus::Live,
        Some(3) => MatchStatus::Finished,
        _ => MatchStatus::Unknown,
    };

    Ok(MatchRef {
        id: id.to_string(),
        home,
        away,
        kickoff,
        status,
    })
}

fn parse_team(value: Option<&Value>) -> Result<Team> {
    let value = value.ok_or_else(|| Error::Parse("event missing team object".into()))?;
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Parse("team missing name".into()))?;
    let abbreviation = value
        .get("shortName")
        .and_then(Value::as_str)
        .unwrap_or(name);
    Ok(Team::new(canonical_team_name(name), abbreviation))
}

/// Convert a lineups payload into the normalized tagged variant. An absent
/// or unconfirmed pair of sides maps to `NotPublished`.
pub fn parse_lineups(body: &Value) -> Result<LineupResponse> {
    let (Some(home), Some(away)) = (body.get("home"), body.get("away")) else {
        return Ok(LineupResponse::NotPublished);
    };
    let home = parse_lineup_side(home)?;
    let away = parse_lineup_side(away)?;
    if home.starting.is_empty() || away.starting.is_empty() {
        return Ok(LineupResponse::NotPublished);
    }
    Ok(LineupResponse::Published { home, away })
}

fn parse_lineup_side(side: &Value) -> Result<LineupSnapshot> {
    let team_name = side
        .pointer("/team/name")
        .and_then(Value::as_str)
        .unwrap_or("Unknown");
    let abbreviation = side
        .pointer("/team/shortName")
        .and_then(Value::as_str)
        .unwrap_or(team_name);

    let players = side
        .get("players")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Parse("lineup side missing players array".into()))?;

    let mut starting = Vec::new();
    let mut bench = Vec::new();
    for entry in players {
        let Some(name) = entry.pointer("/player/name").and_then(Value::as_str) else {
            continue;
        };
        let substitute = entry
            .get("substitute")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if substitute {
            bench.push(name.to_string());
        } else {
            starting.push(name.to_string());
        }
    }

    Ok(LineupSnapshot {
        team: Team::new(canonical_team_name(team_name), abbreviation),
        starting,
        bench,
    })
}

/// Observability snapshot for the status surface.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ClientStats {
    pub requests: u64,
    pub errors: u64,
    pub avg_latency_ms: f64,
    pub breaker_state: &'static str,
    pub rate_tokens: f64,
    pub fixtures_cache: CacheStats,
    pub lineup_cache: CacheStats,
}

/// Composes the resilience primitives around the raw feed.
///
/// Per call, in fixed order: cache lookup, rate limiter acquire, concurrency
/// permit, circuit breaker wrapping the retry policy wrapping the raw fetch,
/// then cache populate on success. Keeping the order explicit here avoids
/// hidden wrapping-order bugs.
pub struct ResilientClient {
    feed: Arc<dyn UpstreamFeed>,
    limiter: RateLimiter,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
    semaphore: Semaphore,
    fixtures_cache: Arc<TtlCache<Vec<MatchRef>>>,
    lineup_cache: Arc<TtlCache<LineupResponse>>,
    fixtures_ttl: Duration,
    lineup_ttl: Duration,
    requests: AtomicU64,
    errors: AtomicU64,
    total_latency_ms: AtomicU64,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl ResilientClient {
    pub fn new(feed: Arc<dyn UpstreamFeed>, config: &AppConfig) -> Self {
        let fixtures_cache = Arc::new(TtlCache::new(config.cache.max_size));
        let lineup_cache = Arc::new(TtlCache::new(config.cache.max_size));
        let sweeper = spawn_sweeper(
            Arc::clone(&fixtures_cache),
            Arc::clone(&lineup_cache),
            Duration::from_secs(config.cache.sweep_interval_seconds),
        );

        let strategy = config
            .retry
            .backoff_strategy()
            .unwrap_or(crate::retry::BackoffStrategy::ExponentialJitter);

        Self {
            feed,
            limiter: RateLimiter::new(config.api.rate_limit_per_minute),
            breaker: CircuitBreaker::new(BreakerSettings {
                failure_threshold: config.breaker.failure_threshold,
                recovery_timeout: config.recovery_timeout(),
                success_threshold: config.breaker.success_threshold,
                call_timeout: config.call_timeout(),
            }),
            retry: RetryPolicy::new(
                config.retry.max_attempts,
                Duration::from_millis(config.retry.base_delay_ms),
                Duration::from_millis(config.retry.max_delay_ms),
                strategy,
            ),
            semaphore: Semaphore::new(config.api.max_concurrent_requests),
            fixtures_cache,
            lineup_cache,
            fixtures_ttl: Duration::from_secs(config.cache.fixtures_ttl_seconds),
            lineup_ttl: Duration::from_secs(config.cache.lineup_ttl_seconds),
            requests: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            total_latency_ms: AtomicU64::new(0),
            sweeper: Mutex::new(Some(sweeper)),
        }
    }

    /// Fetch the fixture list for a date, ordered by kickoff.
    pub async fn fetch_fixtures(&self, date: NaiveDate) -> Result<Vec<MatchRef>> {
        let key = format!("fixtures:{date}");
        if let Some(cached) = self.fixtures_cache.get(&key) {
            return Ok(cached);
        }

        self.limiter.acquire().await;
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::Upstream("request semaphore closed".into()))?;

        let feed = Arc::clone(&self.feed);
        let started = Instant::now();
        let result = self
            .breaker
            .call(self.retry.run(move || {
                let feed = Arc::clone(&feed);
                async move { feed.fixtures_raw(date).await }
            }))
            .await;
        self.record(started, result.is_err());

        let fixtures = result?;
        info!("retrieved {} fixtures for {date}", fixtures.len());
        self.fixtures_cache.set(key, fixtures.clone(), self.fixtures_ttl);
        Ok(fixtures)
    }

    /// Fetch the lineup for a match. A "not yet published" upstream response
    /// surfaces as `LineupResponse::NotPublished`: it trips no breaker and
    /// consumes no retry attempt.
    pub async fn fetch_lineup(&self, match_id: &str) -> Result<LineupResponse> {
        let key = format!("lineup:{match_id}");
        if let Some(cached) = self.lineup_cache.get(&key) {
            return Ok(cached);
        }

        self.limiter.acquire().await;
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::Upstream("request semaphore closed".into()))?;

        let feed = Arc::clone(&self.feed);
        let id = match_id.to_string();
        let started = Instant::now();
        let result = self
            .breaker
            .call(self.retry.run(move || {
                let feed = Arc::clone(&feed);
                let id = id.clone();
                async move { feed.lineup_raw(&id).await }
            }))
            .await;
        self.record(started, result.is_err());

        let lineup = result?;
        match &lineup {
            LineupResponse::Published { .. } => info!("retrieved lineup for match {match_id}"),
            LineupResponse::NotPublished => debug!("lineup not yet published for {match_id}"),
        }
        self.lineup_cache.set(key, lineup.clone(), self.lineup_ttl);
        Ok(lineup)
    }

    /// Bounded connectivity check. Never errors; failures degrade to `false`.
    pub async fn probe(&self) -> bool {
        let today = Utc::now().date_naive();
        match tokio::time::timeout(PROBE_TIMEOUT, self.fetch_fixtures(today)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!("connectivity probe failed: {e}");
                false
            }
            Err(_) => {
                warn!("connectivity probe timed out");
                false
            }
        }
    }

    pub fn breaker_state(&self) -> BreakerState {
        self.breaker.state()
    }

    pub async fn stats(&self) -> ClientStats {
        let requests = self.requests.load(Ordering::Relaxed);
        let total_ms = self.total_latency_ms.load(Ordering::Relaxed);
        ClientStats {
            requests,
            errors: self.errors.load(Ordering::Relaxed),
            avg_latency_ms: if requests > 0 {
                total_ms as f64 / requests as f64
            } else {
                0.0
            },
            breaker_state: self.breaker.state().as_str(),
            rate_tokens: self.limiter.available().await,
            fixtures_cache: self.fixtures_cache.stats(),
            lineup_cache: self.lineup_cache.stats(),
        }
    }

    /// Stop the background cache sweeper.
    pub fn close(&self) {
        if let Some(handle) = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        info!("resilient client closed");
    }

    fn record(&self, started: Instant, failed: bool) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.total_latency_ms
            .fetch_add(started.elapsed().as_millis() as u64, Ordering::Relaxed);
        if failed {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn spawn_sweeper(
    fixtures: Arc<TtlCache<Vec<MatchRef>>>,
    lineups: Arc<TtlCache<LineupResponse>>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            fixtures.sweep();
            lineups.sweep();
        }
    })
}
