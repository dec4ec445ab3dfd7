// ABOUTME: Per-event task handling and the event loop that drives it
// ABOUTME: Ready runs one-time startup; messages, interactions, and joins are handled independently

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tokio_stream::StreamExt;

use crate::commands::{CommandRegistry, CommandSource};
use crate::error::{panic_message, report_critical, report_error};
use crate::events::{InboundMessage, Interaction, MemberJoin, PlatformEvent, ReadyEvent};
use crate::metrics;
use crate::presence::{PresenceRotator, PresenceSchedule, DEFAULT_PERIOD, DEFAULT_REFRESH};
use crate::reaction::ReactionDeck;
use crate::reconcile::{ReconcileOutcome, RoleReconciler};
use crate::router::{InteractionRouter, MenuHandler};
use crate::traits::{EventStream, ExternalMessagePolicy};

/// Presence timing and reaction content
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub schedule: PresenceSchedule,
    pub presence_period: Duration,
    pub presence_refresh: Duration,
    pub deck: ReactionDeck,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            schedule: PresenceSchedule::default(),
            presence_period: DEFAULT_PERIOD,
            presence_refresh: DEFAULT_REFRESH,
            deck: ReactionDeck::default(),
        }
    }
}

pub struct Dispatcher {
    source: Arc<dyn CommandSource>,
    menus: Vec<(String, Arc<dyn MenuHandler>)>,
    reconciler: Arc<RoleReconciler>,
    policy: Arc<dyn ExternalMessagePolicy>,
    settings: DispatcherSettings,
    rng: Mutex<StdRng>,
    /// Set once by the first Ready event
    router: OnceCell<Arc<InteractionRouter>>,
    timers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn CommandSource>,
        reconciler: Arc<RoleReconciler>,
        policy: Arc<dyn ExternalMessagePolicy>,
        settings: DispatcherSettings,
    ) -> Self {
        Self {
            source,
            menus: Vec::new(),
            reconciler,
            policy,
            settings,
            rng: Mutex::new(StdRng::from_entropy()),
            router: OnceCell::new(),
            timers: Mutex::new(Vec::new()),
        }
    }

    /// Attach a menu handler; takes effect when the router is built on Ready
    pub fn with_menu(
        mut self,
        custom_id: impl Into<String>,
        handler: Arc<dyn MenuHandler>,
    ) -> Self {
        self.menus.push((custom_id.into(), handler));
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// The router, once startup has loaded the registry
    pub fn router(&self) -> Option<&Arc<InteractionRouter>> {
        self.router.get()
    }

    /// Handle one event to completion
    pub async fn handle(&self, event: PlatformEvent) -> Result<()> {
        match event {
            PlatformEvent::Ready(ready) => self.on_ready(ready).await,
            PlatformEvent::Message(message) => self.on_message(message).await,
            PlatformEvent::Interaction(interaction) => {
                self.on_interaction(interaction).await;
                Ok(())
            }
            PlatformEvent::MemberJoin(join) => {
                self.on_member_join(join).await;
                Ok(())
            }
        }
    }

    async fn on_ready(&self, ready: ReadyEvent) -> Result<()> {
        if self.router.initialized() {
            tracing::debug!(bot = %ready.bot_tag, "Ready received again, startup already done");
            return Ok(());
        }
        tracing::info!(bot = %ready.bot_tag, groups = ready.group_count, "Session ready");

        let (registry, discovered) = match CommandRegistry::load(self.source.as_ref()) {
            Ok(registry) => (registry, true),
            Err(e) => {
                tracing::error!(error = %e, "Command discovery failed, serving without commands");
                (CommandRegistry::default(), false)
            }
        };
        let registry = Arc::new(registry);
        let router = self
            .menus
            .iter()
            .fold(InteractionRouter::new(Arc::clone(&registry)), |router, (id, handler)| {
                router.with_menu(id.clone(), Arc::clone(handler))
            });
        if self.router.set(Arc::new(router)).is_err() {
            return Ok(());
        }

        let rotator = Arc::new(PresenceRotator::new(
            self.settings.schedule.clone(),
            Arc::clone(&ready.presence),
        ));
        let start_presence = async {
            let rotation = rotator.start(self.settings.presence_period);
            let refresh = rotator.start_refresh(self.settings.presence_refresh);
            self.timers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend([rotation, refresh]);
        };
        let register = async {
            if !discovered {
                // Submitting an empty set would wipe the global table
                tracing::warn!("Skipping command registration after failed discovery");
                return;
            }
            if let Err(e) = registry.register_with_platform(ready.commands.as_ref()).await {
                tracing::error!(
                    error = %e,
                    "Command registration failed, commands remain usable locally"
                );
            }
        };
        tokio::join!(start_presence, register);
        Ok(())
    }

    async fn on_message(&self, message: InboundMessage) -> Result<()> {
        if message.author.is_bot {
            return Ok(());
        }
        let Some(group) = message.group else {
            return self
                .policy
                .handle(&message)
                .await
                .context("direct message policy failed");
        };

        let author = message.author.id;
        let status = self.reconciler.assess(group, author).await;
        if !status.warrants_notice() {
            return Ok(());
        }

        let reply = {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            self.settings.deck.pick(&mut *rng, author)
        };
        message
            .responder
            .reply(reply)
            .await
            .with_context(|| format!("failed to post marker notice in group {}", group))?;
        metrics::record_notice_posted();
        tracing::info!(
            group_id = %group,
            user_id = %author,
            flagged = status.flagged,
            holds_role = status.holds_role,
            "Posted marker notice"
        );
        Ok(())
    }

    async fn on_interaction(&self, interaction: Interaction) {
        match self.router.get() {
            Some(router) => {
                router.route(interaction).await;
            }
            None => tracing::warn!(
                interaction = interaction.label(),
                user_id = %interaction.actor().id,
                "Interaction arrived before startup completed, dropping"
            ),
        }
    }

    async fn on_member_join(&self, join: MemberJoin) {
        let outcome = self.reconciler.reconcile(join.group, join.member.id).await;
        tracing::debug!(
            group_id = %join.group,
            user_id = %join.member.id,
            outcome = ?outcome,
            "Reconciled joining member"
        );
        if let ReconcileOutcome::Granted(_) = outcome {
            tracing::info!(
                group_id = %join.group,
                user = %join.member.tag,
                "Restored marker role on join"
            );
        }
    }

    /// Run every event as its own task until the stream ends. Task failures
    /// go to the error handlers; nothing here stops the loop.
    pub async fn run(self: Arc<Self>, mut events: EventStream) {
        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        loop {
            tokio::select! {
                event = events.next() => {
                    let Some(event) = event else { break };
                    let kind = event.kind();
                    let dispatcher = Arc::clone(&self);
                    tasks.spawn(async move {
                        dispatcher
                            .handle(event)
                            .await
                            .with_context(|| format!("{} event", kind))
                    });
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    collect(joined);
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            collect(joined);
        }
        tracing::info!("Event stream closed");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        for timer in self
            .timers
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
        {
            timer.abort();
        }
    }
}

fn collect(joined: Result<Result<()>, JoinError>) {
    match joined {
        Ok(Ok(())) => {}
        Ok(Err(e)) => report_error("event task", &e),
        Err(e) if e.is_panic() => {
            report_critical("event task", &panic_message(e.into_panic().as_ref()))
        }
        Err(e) => tracing::debug!(error = %e, "Event task cancelled"),
    }
}
