// ABOUTME: Rotating presence display driven by a fixed-period timer
// ABOUTME: Entries are literal or computed from live state; the index advances even when a tick fails

use anyhow::{bail, Result};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::PresenceApplyError;
use crate::metrics;
use crate::traits::{Activity, ActivityKind, OnlineStatus, Presence, PresenceSink};

/// Placeholder replaced by the live group count in templated entries
pub const GUILD_COUNT_PLACEHOLDER: &str = "{guild_count}";

pub const DEFAULT_PERIOD: Duration = Duration::from_secs(120);
pub const DEFAULT_REFRESH: Duration = Duration::from_secs(600);

/// Live state available to computed entries
#[derive(Debug, Clone, Copy)]
pub struct PresenceContext {
    pub group_count: usize,
}

pub type ComputeFn = Arc<dyn Fn(&PresenceContext) -> Activity + Send + Sync>;

/// One entry of the rotation
#[derive(Clone)]
pub enum StatusDescriptor {
    Literal(Activity),
    /// Evaluated each time the entry is applied
    Computed(ComputeFn),
}

impl StatusDescriptor {
    /// Build an entry from display text. Text containing `{guild_count}` is
    /// computed at apply time, anything else is literal.
    pub fn template(text: impl Into<String>, kind: ActivityKind) -> Self {
        let text = text.into();
        if !text.contains(GUILD_COUNT_PLACEHOLDER) {
            return Self::Literal(Activity::new(text, kind));
        }
        Self::Computed(Arc::new(move |ctx: &PresenceContext| {
            Activity::new(
                text.replace(GUILD_COUNT_PLACEHOLDER, &ctx.group_count.to_string()),
                kind,
            )
        }))
    }

    pub fn evaluate(&self, ctx: &PresenceContext) -> Activity {
        match self {
            Self::Literal(activity) => activity.clone(),
            Self::Computed(compute) => compute(ctx),
        }
    }
}

impl fmt::Debug for StatusDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(activity) => f.debug_tuple("Literal").field(activity).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Non-empty ordered list of entries plus the online state shown with them
#[derive(Debug, Clone)]
pub struct PresenceSchedule {
    entries: Vec<StatusDescriptor>,
    status: OnlineStatus,
}

impl PresenceSchedule {
    pub fn new(entries: Vec<StatusDescriptor>, status: OnlineStatus) -> Result<Self> {
        if entries.is_empty() {
            bail!("presence schedule needs at least one entry");
        }
        Ok(Self { entries, status })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn status(&self) -> OnlineStatus {
        self.status
    }

    fn presence_at(&self, index: usize, ctx: &PresenceContext) -> Presence {
        Presence {
            activity: self.entries[index % self.entries.len()].evaluate(ctx),
            status: self.status,
        }
    }
}

impl Default for PresenceSchedule {
    fn default() -> Self {
        Self {
            entries: vec![
                StatusDescriptor::template("/help", ActivityKind::Streaming),
                StatusDescriptor::template("mchbee.cloud {guild_count}", ActivityKind::Streaming),
                StatusDescriptor::template("https://mchbee.cloud", ActivityKind::Streaming),
            ],
            status: OnlineStatus::Idle,
        }
    }
}

pub struct PresenceRotator {
    schedule: PresenceSchedule,
    sink: Arc<dyn PresenceSink>,
    /// Next entry to apply; starts at 0
    index: AtomicUsize,
}

impl PresenceRotator {
    pub fn new(schedule: PresenceSchedule, sink: Arc<dyn PresenceSink>) -> Self {
        Self {
            schedule,
            sink,
            index: AtomicUsize::new(0),
        }
    }

    /// Index of the entry the next tick will apply
    pub fn index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    fn context(&self) -> PresenceContext {
        PresenceContext {
            group_count: self.sink.group_count(),
        }
    }

    async fn apply(&self, index: usize) -> Result<Presence, PresenceApplyError> {
        let presence = self.schedule.presence_at(index, &self.context());
        match self.sink.set_presence(&presence).await {
            Ok(()) => Ok(presence),
            Err(e) => Err(PresenceApplyError {
                activity: presence.activity.name,
                reason: format!("{:#}", e),
            }),
        }
    }

    /// Apply the current entry and advance. The index moves on whether or not
    /// the apply succeeds.
    pub async fn tick(&self) -> Result<(), PresenceApplyError> {
        let len = self.schedule.len();
        let index = match self
            .index
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        };

        match self.apply(index).await {
            Ok(presence) => {
                metrics::record_presence_tick("ok");
                tracing::debug!(index, activity = %presence.activity.name, "Presence updated");
                Ok(())
            }
            Err(e) => {
                metrics::record_presence_tick("error");
                tracing::warn!(index, error = %e, "Presence tick failed");
                Err(e)
            }
        }
    }

    /// Re-apply the most recently ticked entry without advancing
    pub async fn refresh(&self) -> Result<(), PresenceApplyError> {
        let len = self.schedule.len();
        let index = (self.index() + len - 1) % len;
        self.apply(index).await.map(|_| ()).inspect_err(|e| {
            tracing::warn!(index, error = %e, "Presence refresh failed");
        })
    }

    /// Tick now, then every `period`
    pub fn start(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let rotator = Arc::clone(self);
        tracing::info!(
            period_secs = period.as_secs(),
            entries = rotator.schedule.len(),
            "Starting presence rotation"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let _ = rotator.tick().await;
            }
        })
    }

    /// Re-apply the current entry every `period`, independent of rotation
    pub fn start_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let rotator = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick completes immediately; rotation already applied an entry
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let _ = rotator.refresh().await;
            }
        })
    }
}
