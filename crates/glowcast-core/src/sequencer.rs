// ── Effect sequencer ──
//
// Owns the ambient state and the single transient-effect slot of each
// device. Lives inside the router task, so every method runs serialized.
//
// A transient effect arms one expiry timer. The timer does not touch
// device state itself: it posts an `Expiry` back to the router, which
// calls `expire`. Each effect carries a generation number; an expiry
// whose generation no longer matches the slot is ignored, so a
// preempted effect can never revert a newer one.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::device::DeviceFacade;
use crate::error::CoreError;
use crate::model::{AmbientState, Command, Device, Effect, PatternId, Revert, TransientEffect};

/// Posted by an expiry timer when its effect's duration is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Expiry {
    pub device: Device,
    pub generation: u64,
}

/// What `set_ambient` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AmbientOutcome {
    Applied,
    /// Same state already showing; no device call.
    Unchanged,
    /// A transient is running; the state becomes its revert target.
    Deferred,
    Failed,
}

/// Result of a transient expiring.
#[derive(Debug)]
pub(crate) struct Reverted {
    pub ambient: AmbientState,
    pub chained: Option<Command>,
}

struct ActiveTransient {
    generation: u64,
    revert_target: AmbientState,
    chained: Option<Command>,
    timer: JoinHandle<()>,
}

impl Drop for ActiveTransient {
    fn drop(&mut self) {
        self.timer.abort();
    }
}

#[derive(Default)]
struct Slot {
    ambient: AmbientState,
    /// The device currently shows `ambient`.
    showing: bool,
    active: Option<ActiveTransient>,
}

pub(crate) struct EffectSequencer {
    facade: DeviceFacade,
    power_settle: Duration,
    expiry_tx: mpsc::UnboundedSender<Expiry>,
    strip: Slot,
    panel: Slot,
    generation: u64,
}

impl EffectSequencer {
    pub(crate) fn new(
        facade: DeviceFacade,
        power_settle: Duration,
        expiry_tx: mpsc::UnboundedSender<Expiry>,
    ) -> Self {
        Self {
            facade,
            power_settle,
            expiry_tx,
            strip: Slot::default(),
            panel: Slot::default(),
            generation: 0,
        }
    }

    pub(crate) fn facade(&self) -> &DeviceFacade {
        &self.facade
    }

    fn slot(&self, device: Device) -> &Slot {
        match device {
            Device::Strip => &self.strip,
            Device::Panel => &self.panel,
        }
    }

    fn slot_mut(&mut self, device: Device) -> &mut Slot {
        match device {
            Device::Strip => &mut self.strip,
            Device::Panel => &mut self.panel,
        }
    }

    pub(crate) fn ambient(&self, device: Device) -> AmbientState {
        self.slot(device).ambient
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.strip.active.is_none() && self.panel.active.is_none()
    }

    // ── Ambient ──────────────────────────────────────────────────────

    /// Set the resting state of `device`.
    ///
    /// While a transient runs nothing is sent: the new state replaces
    /// the transient's revert target and shows when it expires.
    pub(crate) async fn set_ambient(&mut self, device: Device, state: AmbientState) -> AmbientOutcome {
        let slot = self.slot_mut(device);

        if let Some(active) = slot.active.as_mut() {
            active.revert_target = state;
            slot.ambient = state;
            slot.showing = false;
            debug!(device = %device, ?state, "Ambient deferred behind transient");
            return AmbientOutcome::Deferred;
        }

        if slot.showing && slot.ambient == state {
            debug!(device = %device, ?state, "Ambient unchanged");
            return AmbientOutcome::Unchanged;
        }

        slot.ambient = state;
        let ok = self.apply_ambient(device, state).await.is_ok();
        self.slot_mut(device).showing = ok;

        if ok {
            AmbientOutcome::Applied
        } else {
            AmbientOutcome::Failed
        }
    }

    async fn apply_ambient(&self, device: Device, state: AmbientState) -> Result<(), CoreError> {
        match device {
            Device::Strip => match state.pattern {
                Some(pattern) => self.facade.set_pattern(device, pattern).await,
                None => self.facade.set_color(device, state.color).await,
            },
            // The panel has no color; resting means lit.
            Device::Panel => self.facade.set_power(device, true).await,
        }
    }

    /// Switch `device` on or off outside any effect, then wait out the
    /// compensating delay before the next command may touch it.
    pub(crate) async fn set_power(&mut self, device: Device, on: bool) -> Result<(), CoreError> {
        self.slot_mut(device).showing = false;
        let result = self.facade.set_power(device, on).await;
        tokio::time::sleep(self.power_settle).await;
        result
    }

    // ── Transients ───────────────────────────────────────────────────

    /// Start `effect` on `device`, preempting whatever was playing.
    ///
    /// Returns `false` if neither the effect nor its fallback could be
    /// shown. The expiry timer is armed either way so the device still
    /// returns to its ambient.
    pub(crate) async fn play_transient(&mut self, device: Device, effect: TransientEffect) -> bool {
        if let Some(previous) = self.slot_mut(device).active.take() {
            debug!(device = %device, generation = previous.generation, "Transient preempted");
        }
        self.slot_mut(device).showing = false;

        let mut effect = effect;
        let mut ok = self.perform(device, effect.effect).await.is_ok();
        if !ok {
            if let Some(fallback) = effect.fallback.take() {
                warn!(device = %device, failed = ?effect.effect, fallback = ?fallback.effect, "Effect failed, playing fallback");
                effect = *fallback;
                ok = self.perform(device, effect.effect).await.is_ok();
            }
        }

        let revert_target = match effect.revert {
            Revert::CurrentAmbient => self.slot(device).ambient,
            Revert::To(target) => target,
        };

        self.generation += 1;
        let generation = self.generation;
        let duration = effect.duration;
        let tx = self.expiry_tx.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(Expiry { device, generation });
        });

        info!(device = %device, effect = ?effect.effect, ?duration, generation, "Transient started");
        self.slot_mut(device).active = Some(ActiveTransient {
            generation,
            revert_target,
            chained: effect.chained.map(|c| *c),
            timer,
        });
        ok
    }

    async fn perform(&self, device: Device, effect: Effect) -> Result<(), CoreError> {
        match effect {
            Effect::Pattern(pattern) if device == Device::Strip => {
                self.strip_pattern(pattern).await
            }
            Effect::Pattern(pattern) => self.facade.set_pattern(device, pattern).await,
            Effect::Solid(color) => self.facade.set_color(device, color).await,
            Effect::Blackout => self.facade.set_power(device, false).await,
        }
    }

    /// The strip only takes a custom pattern reliably from the off state.
    async fn strip_pattern(&self, pattern: PatternId) -> Result<(), CoreError> {
        self.facade.set_power(Device::Strip, false).await?;
        tokio::time::sleep(self.power_settle).await;
        self.facade.set_pattern(Device::Strip, pattern).await
    }

    /// Apply the revert target of an expired transient.
    ///
    /// Returns `None` for an expiry that lost a race with a newer effect.
    pub(crate) async fn expire(&mut self, expiry: Expiry) -> Option<Reverted> {
        let slot = self.slot_mut(expiry.device);
        let current = slot.active.as_ref().map(|a| a.generation);
        if current != Some(expiry.generation) {
            debug!(device = %expiry.device, generation = expiry.generation, ?current, "Stale expiry ignored");
            return None;
        }

        let mut active = slot.active.take()?;
        let ambient = active.revert_target;
        let chained = active.chained.take();
        slot.ambient = ambient;
        drop(active);

        let ok = self.apply_ambient(expiry.device, ambient).await.is_ok();
        self.slot_mut(expiry.device).showing = ok;
        info!(device = %expiry.device, ?ambient, generation = expiry.generation, "Transient expired");

        Some(Reverted { ambient, chained })
    }

    /// Drop the running transient without reverting. The caller applies
    /// whatever should show next.
    pub(crate) fn cancel_transient(&mut self, device: Device) -> bool {
        let slot = self.slot_mut(device);
        slot.showing = false;
        slot.active.take().is_some()
    }

    /// Stop every expiry timer.
    pub(crate) fn shutdown(&mut self) {
        self.strip.active = None;
        self.panel.active = None;
    }
}
