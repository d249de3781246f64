//! Stale-tolerant snapshot cache, one per upstream source.
//!
//! A single writer (the refresh loop) publishes whole snapshots through a
//! `watch` channel; any number of readers take the last committed value
//! without waiting on an in-flight fetch. A failed refresh never replaces
//! data: stale-but-valid beats empty.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{Error, MetricSnapshot, MetricSource, Result};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// The last successful fetch plus bookkeeping about later attempts.
#[derive(Debug, Clone)]
pub struct CachedSnapshot<T> {
    pub snapshot: Arc<MetricSnapshot<T>>,
    /// When the served snapshot was committed.
    pub refreshed_at: DateTime<Utc>,
    /// When the most recent fetch (successful or not) started.
    pub last_attempt_at: DateTime<Utc>,
    /// Failed attempts since `refreshed_at`.
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone)]
pub enum CacheState<T> {
    /// No successful fetch yet.
    Empty {
        last_attempt_at: Option<DateTime<Utc>>,
        consecutive_failures: u32,
    },
    Populated(Arc<CachedSnapshot<T>>),
}

/// Result of one `refresh` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { present: usize, total: usize },
    Failed { consecutive_failures: u32 },
    /// Another refresh of the same source was already running.
    Skipped,
}

/// Point-in-time view of a cache for health logging.
#[derive(Debug, Clone)]
pub struct CacheStatus {
    pub source: String,
    pub populated: bool,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub period: Duration,
}

impl CacheStatus {
    /// Age of the served data, if any.
    pub fn data_age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.refreshed_at.map(|t| now - t)
    }

    /// True once served data is older than one period plus one missed
    /// refresh.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        let Ok(bound) = chrono::Duration::from_std(self.period * 2) else {
            return false;
        };
        match self.data_age(now) {
            Some(age) => age > bound,
            None => true,
        }
    }
}

/// Periodically refreshed cache over one `MetricSource`.
pub struct StaleCache<S: MetricSource> {
    source: S,
    period: Duration,
    fetch_timeout: Duration,
    state: watch::Sender<CacheState<S::Report>>,
    in_flight: Mutex<()>,
}

impl<S: MetricSource> StaleCache<S> {
    /// `fetch_timeout` should be shorter than `period` so refreshes of the
    /// same source never overlap.
    pub fn new(source: S, period: Duration, fetch_timeout: Duration) -> Self {
        let (state, _) = watch::channel(CacheState::Empty {
            last_attempt_at: None,
            consecutive_failures: 0,
        });

        Self {
            source,
            period,
            fetch_timeout,
            state,
            in_flight: Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Last committed snapshot, or `Error::NoDataYet` before the first
    /// successful fetch. Never waits on a refresh.
    pub fn read(&self) -> Result<Arc<CachedSnapshot<S::Report>>> {
        match &*self.state.borrow() {
            CacheState::Populated(cached) => Ok(cached.clone()),
            CacheState::Empty { .. } => Err(Error::NoDataYet(self.name().to_string())),
        }
    }

    pub fn state(&self) -> CacheState<S::Report> {
        self.state.borrow().clone()
    }

    /// Receiver that is notified whenever a new snapshot is committed.
    /// Failed attempts do not notify.
    pub fn subscribe(&self) -> watch::Receiver<CacheState<S::Report>> {
        self.state.subscribe()
    }

    pub fn status(&self) -> CacheStatus {
        let (populated, refreshed_at, last_attempt_at, consecutive_failures) =
            match &*self.state.borrow() {
                CacheState::Empty {
                    last_attempt_at,
                    consecutive_failures,
                } => (false, None, *last_attempt_at, *consecutive_failures),
                CacheState::Populated(c) => (
                    true,
                    Some(c.refreshed_at),
                    Some(c.last_attempt_at),
                    c.consecutive_failures,
                ),
            };

        CacheStatus {
            source: self.name().to_string(),
            populated,
            refreshed_at,
            last_attempt_at,
            consecutive_failures,
            period: self.period,
        }
    }

    /// Fetch once and commit the result if it succeeded.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("{}: refresh already in flight, skipping", self.name());
            return RefreshOutcome::Skipped;
        };

        let attempted_at = Utc::now();
        let result = match tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await {
            Ok(r) => r,
            Err(_) => Err(Error::Timeout {
                source_name: self.name().to_string(),
                secs: self.fetch_timeout.as_secs(),
            }),
        };

        match result {
            Ok(snapshot) => {
                let present = snapshot.present_count();
                let total = snapshot.len();
                let cached = CachedSnapshot {
                    snapshot: Arc::new(snapshot),
                    refreshed_at: Utc::now(),
                    last_attempt_at: attempted_at,
                    consecutive_failures: 0,
                };
                self.state.send_replace(CacheState::Populated(Arc::new(cached)));

                info!(
                    "{}: refreshed, {}/{} resorts with data",
                    self.name(),
                    present,
                    total
                );
                RefreshOutcome::Updated { present, total }
            }
            Err(e) => {
                let mut failures = 0;
                self.state.send_if_modified(|state| {
                    let next = match &*state {
                        CacheState::Empty {
                            consecutive_failures,
                            ..
                        } => {
                            failures = *consecutive_failures + 1;
                            CacheState::Empty {
                                last_attempt_at: Some(attempted_at),
                                consecutive_failures: failures,
                            }
                        }
                        CacheState::Populated(cached) => {
                            failures = cached.consecutive_failures + 1;
                            CacheState::Populated(Arc::new(CachedSnapshot {
                                snapshot: cached.snapshot.clone(),
                                refreshed_at: cached.refreshed_at,
                                last_attempt_at: attempted_at,
                                consecutive_failures: failures,
                            }))
                        }
                    };
                    *state = next;
                    false
                });

                warn!(
                    "{}: refresh failed ({} consecutive), keeping previous data: {}",
                    self.name(),
                    failures,
                    e
                );
                RefreshOutcome::Failed {
                    consecutive_failures: failures,
                }
            }
        }
    }

    /// Refresh immediately, then once per period, forever.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.period.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            self.refresh().await;
        }
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(self.clone().run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ResortId, ResortInfo, ResortRegistry};
    use std::collections::{HashMap, VecDeque};

    struct ScriptedSource {
        registry: ResortRegistry,
        script: std::sync::Mutex<VecDeque<Option<f64>>>,
        delay: Duration,
    }

    impl ScriptedSource {
        /// `Some(v)` succeeds with resort "a" = v; `None` fails.
        fn new(script: Vec<Option<f64>>) -> Self {
            let resort = |id: &str| ResortInfo {
                id: id.into(),
                name: id.into(),
                lat: 0.0,
                lon: 0.0,
                logo: None,
            };
            Self {
                registry: ResortRegistry::new(vec![resort("a"), resort("b")]).unwrap(),
                script: std::sync::Mutex::new(script.into()),
                delay: Duration::ZERO,
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    impl MetricSource for ScriptedSource {
        type Report = f64;

        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self) -> Result<MetricSnapshot<f64>> {
            let next = self.script.lock().unwrap().pop_front().flatten();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match next {
                Some(v) => {
                    let mut values = HashMap::new();
                    values.insert(ResortId::from("a"), v);
                    Ok(MetricSnapshot::from_partial(
                        &self.registry,
                        "scripted",
                        Utc::now(),
                        values,
                    ))
                }
                None => Err(Error::Http("upstream unreachable".into())),
            }
        }
    }

    fn cache(script: Vec<Option<f64>>) -> StaleCache<ScriptedSource> {
        StaleCache::new(
            ScriptedSource::new(script),
            Duration::from_secs(60),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_read_before_first_fetch_is_no_data_yet() {
        let cache = cache(vec![]);
        assert!(matches!(cache.read(), Err(Error::NoDataYet(name)) if name == "scripted"));
    }

    #[tokio::test]
    async fn test_failure_while_empty_stays_empty() {
        let cache = cache(vec![None, None]);
        assert_eq!(
            cache.refresh().await,
            RefreshOutcome::Failed { consecutive_failures: 1 }
        );
        assert_eq!(
            cache.refresh().await,
            RefreshOutcome::Failed { consecutive_failures: 2 }
        );
        assert!(cache.read().is_err());

        let status = cache.status();
        assert!(!status.populated);
        assert!(status.last_attempt_at.is_some());
        assert_eq!(status.consecutive_failures, 2);
    }

    #[tokio::test]
    async fn test_failures_keep_last_good_snapshot() {
        let cache = cache(vec![Some(4.0), None, None, None]);
        assert_eq!(
            cache.refresh().await,
            RefreshOutcome::Updated { present: 1, total: 2 }
        );
        let first = cache.read().unwrap();

        for _ in 0..3 {
            cache.refresh().await;
        }

        let after = cache.read().unwrap();
        assert!(Arc::ptr_eq(&first.snapshot, &after.snapshot));
        assert_eq!(after.snapshot.get(&"a".into()), Some(&4.0));
        assert_eq!(after.refreshed_at, first.refreshed_at);
        assert_eq!(after.consecutive_failures, 3);
    }

    #[tokio::test]
    async fn test_success_replaces_whole_snapshot() {
        let cache = cache(vec![Some(1.0), None, Some(2.0)]);
        cache.refresh().await;
        cache.refresh().await;
        cache.refresh().await;

        let cached = cache.read().unwrap();
        assert_eq!(cached.snapshot.get(&"a".into()), Some(&2.0));
        assert_eq!(cached.snapshot.get(&"b".into()), None);
        assert_eq!(cached.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn test_slow_fetch_times_out() {
        let cache = StaleCache::new(
            ScriptedSource::new(vec![Some(1.0)]).with_delay(Duration::from_millis(200)),
            Duration::from_secs(1),
            Duration::from_millis(10),
        );
        assert_eq!(
            cache.refresh().await,
            RefreshOutcome::Failed { consecutive_failures: 1 }
        );
        assert!(cache.read().is_err());
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_skipped() {
        let cache = Arc::new(StaleCache::new(
            ScriptedSource::new(vec![Some(1.0), Some(2.0)]).with_delay(Duration::from_millis(100)),
            Duration::from_secs(60),
            Duration::from_secs(5),
        ));

        let background = cache.clone();
        let handle = tokio::spawn(async move { background.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.refresh().await, RefreshOutcome::Skipped);
        assert!(matches!(
            handle.await.unwrap(),
            RefreshOutcome::Updated { .. }
        ));
        assert_eq!(cache.read().unwrap().snapshot.get(&"a".into()), Some(&1.0));

        // A second slow refresh is in flight; readers still get the first
        // snapshot straight away.
        let background = cache.clone();
        let handle = tokio::spawn(async move { background.refresh().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        let during = tokio::time::timeout(Duration::from_millis(5), async { cache.read() })
            .await
            .expect("read must not wait on the in-flight refresh")
            .unwrap();
        assert_eq!(during.snapshot.get(&"a".into()), Some(&1.0));
        assert!(!handle.is_finished());

        handle.await.unwrap();
        assert_eq!(cache.read().unwrap().snapshot.get(&"a".into()), Some(&2.0));
    }

    #[tokio::test]
    async fn test_subscribers_only_see_commits() {
        let cache = cache(vec![Some(1.0), None]);
        let mut rx = cache.subscribe();

        cache.refresh().await;
        assert!(rx.has_changed().unwrap());
        rx.borrow_and_update();

        cache.refresh().await;
        assert!(!rx.has_changed().unwrap());
        assert_eq!(cache.status().consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_subscriber_taken_before_spawn_sees_first_commit() {
        let cache = Arc::new(cache(vec![Some(3.0)]));
        let mut rx = cache.subscribe();
        let handle = cache.spawn();

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("first commit should notify")
            .unwrap();
        handle.abort();

        assert!(matches!(&*rx.borrow(), CacheState::Populated(_)));
    }

    #[tokio::test]
    async fn test_spawned_loop_refreshes_immediately() {
        let cache = Arc::new(StaleCache::new(
            ScriptedSource::new(vec![Some(7.0)]),
            Duration::from_secs(3600),
            Duration::from_secs(1),
        ));
        let handle = cache.spawn();
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();

        assert_eq!(cache.read().unwrap().snapshot.get(&"a".into()), Some(&7.0));
        assert!(!cache.status().is_overdue(Utc::now()));
    }
}
