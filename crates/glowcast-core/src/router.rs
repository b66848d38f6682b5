// ── Command router ──
//
// The single serialization point of the orchestrator. Adapters and the
// inbound request surface send `Dispatch` messages into one queue; one
// task drains it and is the only writer of ambient, score and transient
// state. Timers never mutate state directly: expiries and delayed
// follow-ups come back through internal queues and are handled by the
// same task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_stream::Stream;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{EffectTimings, RouterConfig};
use crate::device::DeviceFacade;
use crate::error::CoreError;
use crate::inbound::{LightRequest, Normalized};
use crate::ledger::PrizeLedger;
use crate::model::{
    AmbientState, Command, CommandKind, DashboardEvent, Device, DeviceSelector, Effect,
    GameSignal, MatchPhase, PatternId, PrizeUpdate, Rgba, Scene, ScoreState, SourcePriority,
    Team, TransientEffect,
};
use crate::score::ScoreTracker;
use crate::sequencer::{AmbientOutcome, EffectSequencer, Expiry};

const DASHBOARD_CHANNEL_SIZE: usize = 256;

// ── Dispatch ─────────────────────────────────────────────────────────

/// Everything the router task consumes.
#[derive(Debug)]
pub(crate) enum Dispatch {
    Command(Command),
    Game(GameSignal),
    Donation(PrizeUpdate),
    PrizeAdjustment(PrizeUpdate),
    /// Answered once everything queued before it has been handled.
    Flush(oneshot::Sender<()>),
    /// Answered once no transient runs and nothing is scheduled.
    Idle(oneshot::Sender<()>),
    /// Current ambient of one device.
    Ambient(Device, oneshot::Sender<AmbientState>),
    /// Second half of a goal, after the score had time to land.
    GoalSettled(Team),
}

/// Ordering key of an ambient command. Older loses; at the same instant
/// the higher priority wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Stamp {
    issued_at: Instant,
    priority: SourcePriority,
}

// ── Router handle ────────────────────────────────────────────────────

/// Cheaply cloneable handle to the running router task.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    inbox: mpsc::Sender<Dispatch>,
    timings: EffectTimings,
    dashboard: broadcast::Sender<Arc<DashboardEvent>>,
    score: watch::Receiver<ScoreState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Router {
    /// Spawn the router task. The startup state (panel on, strip at the
    /// configured scene) is applied before the first queued command.
    pub fn spawn(
        config: RouterConfig,
        facade: DeviceFacade,
        ledger: Option<Arc<dyn PrizeLedger>>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (expiry_tx, expiry_rx) = mpsc::unbounded_channel();
        let (deferred_tx, deferred_rx) = mpsc::unbounded_channel();
        let (dashboard, _) = broadcast::channel(DASHBOARD_CHANNEL_SIZE);
        let cancel = CancellationToken::new();

        let timings = config.timings.clone();
        let score = ScoreTracker::new();
        let score_rx = score.subscribe();

        let task = RouterTask {
            sequencer: EffectSequencer::new(facade, config.timings.power_settle, expiry_tx),
            config,
            score,
            stamps: HashMap::new(),
            dashboard: dashboard.clone(),
            ledger: ledger.map(spawn_ledger_writer),
            deferred_tx,
            pending: 0,
            idle_waiters: Vec::new(),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run(inbox_rx, expiry_rx, deferred_rx));

        Self {
            inner: Arc::new(RouterInner {
                inbox: inbox_tx,
                timings,
                dashboard,
                score: score_rx,
                cancel,
                task: Mutex::new(Some(handle)),
            }),
        }
    }

    pub(crate) async fn dispatch(&self, dispatch: Dispatch) -> Result<(), CoreError> {
        self.inner
            .inbox
            .send(dispatch)
            .await
            .map_err(|_| CoreError::RouterClosed)
    }

    /// Queue a command.
    pub async fn route(&self, command: Command) -> Result<(), CoreError> {
        self.dispatch(Dispatch::Command(command)).await
    }

    /// Validate an inbound request and queue what it normalizes to.
    /// Rejected requests never reach the queue.
    pub async fn submit(&self, request: LightRequest) -> Result<(), CoreError> {
        match request.normalize(&self.inner.timings)? {
            Normalized::Command(command) => self.route(command).await,
            Normalized::Prize(update) => self.adjust_prize(update).await,
        }
    }

    /// Effect durations this router was started with.
    pub fn timings(&self) -> &EffectTimings {
        &self.inner.timings
    }

    /// Queue a game telemetry signal.
    pub async fn signal(&self, signal: GameSignal) -> Result<(), CoreError> {
        self.dispatch(Dispatch::Game(signal)).await
    }

    /// Queue a donation: mirrored to observers, then recorded in the ledger.
    pub async fn donate(&self, update: PrizeUpdate) -> Result<(), CoreError> {
        self.dispatch(Dispatch::Donation(update)).await
    }

    /// Queue a manual prize adjustment for observers.
    pub async fn adjust_prize(&self, update: PrizeUpdate) -> Result<(), CoreError> {
        self.dispatch(Dispatch::PrizeAdjustment(update)).await
    }

    /// Wait until everything queued so far has been handled.
    pub async fn flush(&self) -> Result<(), CoreError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Dispatch::Flush(tx)).await?;
        rx.await.map_err(|_| CoreError::RouterClosed)
    }

    /// Wait until no transient runs and no delayed follow-up is pending.
    pub async fn idle(&self) -> Result<(), CoreError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Dispatch::Idle(tx)).await?;
        rx.await.map_err(|_| CoreError::RouterClosed)
    }

    /// The ambient `device` rests at (or will return to).
    pub async fn ambient(&self, device: Device) -> Result<AmbientState, CoreError> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Dispatch::Ambient(device, tx)).await?;
        rx.await.map_err(|_| CoreError::RouterClosed)
    }

    /// Subscribe to dashboard events. Slow receivers lag, they never
    /// hold up the router.
    pub fn observe(&self) -> broadcast::Receiver<Arc<DashboardEvent>> {
        self.inner.dashboard.subscribe()
    }

    /// [`observe`](Self::observe) as a `Stream`, skipping lag notices.
    pub fn dashboard_stream(&self) -> impl Stream<Item = Arc<DashboardEvent>> + use<> {
        BroadcastStream::new(self.observe()).filter_map(Result::ok)
    }

    /// Watch the tracked score.
    pub fn score(&self) -> watch::Receiver<ScoreState> {
        self.inner.score.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.inner.cancel.is_cancelled()
    }

    /// Stop the router task and every pending timer.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        let handle = self.inner.task.lock().await.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        debug!("router stopped");
    }
}

// ── Router task ──────────────────────────────────────────────────────

struct RouterTask {
    config: RouterConfig,
    sequencer: EffectSequencer,
    score: ScoreTracker,
    stamps: HashMap<Device, Stamp>,
    dashboard: broadcast::Sender<Arc<DashboardEvent>>,
    /// Queue of the ledger writer task.
    ledger: Option<mpsc::UnboundedSender<PrizeUpdate>>,
    deferred_tx: mpsc::UnboundedSender<Dispatch>,
    /// Deferred dispatches scheduled but not yet handled.
    pending: usize,
    idle_waiters: Vec<oneshot::Sender<()>>,
    cancel: CancellationToken,
}

impl RouterTask {
    async fn run(
        mut self,
        mut inbox: mpsc::Receiver<Dispatch>,
        mut expiries: mpsc::UnboundedReceiver<Expiry>,
        mut deferred: mpsc::UnboundedReceiver<Dispatch>,
    ) {
        let cancel = self.cancel.clone();
        self.startup().await;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(expiry) = expiries.recv() => self.on_expiry(expiry).await,
                Some(dispatch) = deferred.recv() => {
                    self.pending = self.pending.saturating_sub(1);
                    self.handle(dispatch).await;
                }
                dispatch = inbox.recv() => {
                    let Some(dispatch) = dispatch else { break };
                    self.handle(dispatch).await;
                }
            }
            self.wake_idle_waiters();
        }

        self.sequencer.shutdown();
    }

    async fn startup(&mut self) {
        let Some(scene) = self.config.initial_scene else {
            return;
        };
        info!(scene = %scene, "applying startup lighting");
        let _ = self
            .sequencer
            .set_ambient(Device::Panel, AmbientState::default())
            .await;
        let ambient = scene.ambient();
        if self.sequencer.set_ambient(Device::Strip, ambient).await == AmbientOutcome::Applied {
            self.publish_ambient(Device::Strip, ambient);
        }
    }

    async fn handle(&mut self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Command(command) => self.apply(command).await,
            Dispatch::Game(signal) => self.on_game(signal).await,
            Dispatch::GoalSettled(scorer) => self.on_goal(scorer),
            Dispatch::Donation(update) => self.on_donation(update),
            Dispatch::PrizeAdjustment(update) => {
                info!(from = %update.from, slot = %update.slot, amount = update.amount, "prize adjustment");
                self.publish(DashboardEvent::PrizeAdjustment(update));
            }
            Dispatch::Flush(done) => {
                let _ = done.send(());
            }
            Dispatch::Idle(done) => self.idle_waiters.push(done),
            Dispatch::Ambient(device, reply) => {
                let _ = reply.send(self.sequencer.ambient(device));
            }
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    async fn apply(&mut self, command: Command) {
        debug!(kind = ?command.kind, target = %command.target, priority = %command.priority, "routing command");
        let stamp = Stamp {
            issued_at: command.issued_at,
            priority: command.priority,
        };

        match command.kind {
            CommandKind::AmbientColor(state) => self.set_ambient(state, command.target, stamp).await,
            CommandKind::TransientEffect(effect) => {
                self.play_transient(effect, command.target).await;
            }
            CommandKind::Power(on) => {
                for &device in command.target.devices() {
                    let _ = self.sequencer.set_power(device, on).await;
                }
            }
            CommandKind::Brightness(level) => {
                for &device in command.target.devices() {
                    let _ = self.sequencer.facade().set_brightness(device, level).await;
                }
            }
            CommandKind::Temperature(value) => {
                for &device in command.target.devices() {
                    let _ = self.sequencer.facade().set_temperature(device, value).await;
                }
            }
        }
    }

    async fn set_ambient(&mut self, state: AmbientState, target: DeviceSelector, stamp: Stamp) {
        for &device in target.devices() {
            if device == Device::Panel {
                debug!(?state, "ambient color does not apply to the panel");
                continue;
            }
            if self.stamps.get(&device).is_some_and(|current| stamp < *current) {
                debug!(device = %device, ?state, priority = %stamp.priority, "stale ambient dropped");
                continue;
            }
            self.stamps.insert(device, stamp);

            match self.sequencer.set_ambient(device, state).await {
                AmbientOutcome::Applied | AmbientOutcome::Deferred => {
                    self.publish_ambient(device, state);
                }
                AmbientOutcome::Unchanged | AmbientOutcome::Failed => {}
            }
        }
    }

    /// A transient for both devices plays on the strip; the panel goes
    /// dark for the same time. Only the strip's chain fires.
    async fn play_transient(&mut self, effect: TransientEffect, target: DeviceSelector) {
        match target {
            DeviceSelector::Both => {
                let blackout = TransientEffect::new(Effect::Blackout, effect.duration);
                self.sequencer.play_transient(Device::Panel, blackout).await;
                self.sequencer.play_transient(Device::Strip, effect).await;
            }
            DeviceSelector::Strip => {
                self.sequencer.play_transient(Device::Strip, effect).await;
            }
            DeviceSelector::Panel => {
                self.sequencer.play_transient(Device::Panel, effect).await;
            }
        }
    }

    async fn on_expiry(&mut self, expiry: Expiry) {
        let Some(reverted) = self.sequencer.expire(expiry).await else {
            return;
        };
        if expiry.device == Device::Strip {
            self.publish_ambient(expiry.device, reverted.ambient);
        }
        if let Some(command) = reverted.chained {
            debug!(device = %expiry.device, "re-dispatching chained command");
            self.enqueue(Dispatch::Command(command));
        }
    }

    // ── Game signals ─────────────────────────────────────────────────

    async fn on_game(&mut self, signal: GameSignal) {
        match signal {
            GameSignal::Score(score) => {
                if self.score.update(score.clone()) {
                    debug!(?score, "score updated");
                    self.publish(DashboardEvent::Score(score));
                }
            }
            GameSignal::Goal { scorer, player } => {
                info!(team = %scorer, player = player.as_deref().unwrap_or("<unknown>"), "goal scored");
                self.schedule(Dispatch::GoalSettled(scorer), self.config.timings.goal_settle);
            }
            GameSignal::Match(phase) => self.reset_for_match(phase).await,
            GameSignal::Demolition { attacker, victim } => {
                info!(
                    attacker = attacker.as_deref().unwrap_or("<unknown>"),
                    victim = victim.as_deref().unwrap_or("<unknown>"),
                    "demolition"
                );
                let flash =
                    TransientEffect::new(Effect::Solid(Rgba::RED), self.config.timings.demolition);
                self.play_transient(flash, DeviceSelector::Both).await;
            }
        }
    }

    /// Ambient follows the leader (white when tied), then the scorer's
    /// strobe plays after a short gap and reverts to that ambient.
    fn on_goal(&mut self, scorer: Team) {
        let score = self.score.snapshot();
        let scene = match score.leader() {
            None => Scene::White,
            Some(Team::Blue) => Scene::Blue,
            Some(Team::Orange) => Scene::Orange,
        };
        info!(
            blue = score.team_a_score,
            orange = score.team_b_score,
            scene = %scene,
            "score ambient"
        );

        let (ambient, strobe) = goal_commands(scene, scorer, self.config.timings.strobe);
        self.enqueue(Dispatch::Command(ambient));
        self.schedule(Dispatch::Command(strobe), self.config.timings.strobe_delay);
    }

    async fn reset_for_match(&mut self, phase: MatchPhase) {
        info!(phase = %phase, "match lifecycle, lights to white");
        for &device in DeviceSelector::Both.devices() {
            if self.sequencer.cancel_transient(device) {
                debug!(device = %device, "transient cancelled by match lifecycle");
            }
        }
        let now = Stamp {
            issued_at: Instant::now(),
            priority: SourcePriority::Game,
        };
        self.set_ambient(Scene::White.ambient(), DeviceSelector::Strip, now).await;
        let _ = self
            .sequencer
            .set_ambient(Device::Panel, AmbientState::default())
            .await;
    }

    // ── Prize pool ───────────────────────────────────────────────────

    fn on_donation(&mut self, update: PrizeUpdate) {
        info!(from = %update.from, slot = %update.slot, amount = update.amount, "prize donation");
        self.publish(DashboardEvent::Donation(update.clone()));

        if let Some(ledger) = &self.ledger {
            if ledger.send(update).is_err() {
                warn!("prize ledger writer has stopped");
            }
        }
    }

    // ── Plumbing ─────────────────────────────────────────────────────

    /// Handle `dispatch` on a later loop turn, behind queued expiries.
    fn enqueue(&mut self, dispatch: Dispatch) {
        self.pending += 1;
        let _ = self.deferred_tx.send(dispatch);
    }

    /// Handle `dispatch` after `delay`, unless the router stops first.
    fn schedule(&mut self, dispatch: Dispatch, delay: Duration) {
        self.pending += 1;
        let tx = self.deferred_tx.clone();
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(delay) => {
                    let _ = tx.send(dispatch);
                }
            }
        });
    }

    fn publish(&self, event: DashboardEvent) {
        let _ = self.dashboard.send(Arc::new(event));
    }

    fn publish_ambient(&self, device: Device, state: AmbientState) {
        self.publish(DashboardEvent::Ambient {
            device,
            state,
            at: chrono::Utc::now(),
        });
    }

    fn wake_idle_waiters(&mut self) {
        if self.idle_waiters.is_empty() || self.pending > 0 || !self.sequencer.is_idle() {
            return;
        }
        for waiter in self.idle_waiters.drain(..) {
            let _ = waiter.send(());
        }
    }
}

/// Ledger writes are read-modify-write on the remote pool, so they run
/// one at a time on their own task. The router only enqueues. The writer
/// drains what is queued and exits once the router task drops the sender.
fn spawn_ledger_writer(ledger: Arc<dyn PrizeLedger>) -> mpsc::UnboundedSender<PrizeUpdate> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PrizeUpdate>();
    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            if let Err(e) = ledger.record(&update).await {
                warn!(error = %e, slot = %update.slot, "prize ledger update failed");
            }
        }
        debug!("prize ledger writer stopped");
    });
    tx
}

/// The ambient a goal sets and the strobe that follows it. The ambient
/// is stamped first so the fallback's chained white is never stale
/// against it.
fn goal_commands(scene: Scene, scorer: Team, strobe_time: Duration) -> (Command, Command) {
    let ambient = Command::ambient(scene.ambient(), DeviceSelector::Strip, SourcePriority::Game);

    let white = Scene::White.ambient();
    let fallback = TransientEffect::new(Effect::Pattern(PatternId::WhiteStrobe), strobe_time)
        .revert_to(white)
        .then(Command::ambient(white, DeviceSelector::Strip, SourcePriority::Game));
    let strobe = TransientEffect::new(Effect::Pattern(scorer_strobe(scorer)), strobe_time)
        .or_else(fallback);

    (
        ambient,
        Command::transient(strobe, DeviceSelector::Both, SourcePriority::Game),
    )
}

fn scorer_strobe(team: Team) -> PatternId {
    match team {
        Team::Blue => PatternId::BlueStrobe,
        Team::Orange => PatternId::OrangeStrobe,
    }
}
