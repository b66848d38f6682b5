// Recording lights and ledger shared by the router and adapter tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use glowcast_core::{
    Brightness, CoreError, DeviceFacade, Light, PatternId, PrizeLedger, PrizeUpdate, Rgba,
    Router, RouterConfig, Temperature,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Color(Rgba),
    Pattern(PatternId),
    Power(bool),
    Brightness(u8),
    Temperature(u16),
}

/// A light that records every call with the time it arrived.
pub struct MockLight {
    kind: &'static str,
    epoch: Instant,
    calls: Mutex<Vec<(Duration, Call)>>,
    failing: Mutex<Vec<PatternId>>,
}

impl MockLight {
    pub fn new(kind: &'static str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            epoch: Instant::now(),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(Vec::new()),
        })
    }

    /// Make every later `set_pattern(pattern)` fail.
    pub fn fail_pattern(&self, pattern: PatternId) {
        self.failing.lock().unwrap().push(pattern);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().iter().map(|(_, c)| *c).collect()
    }

    pub fn timed(&self) -> Vec<(Duration, Call)> {
        self.calls.lock().unwrap().clone()
    }

    /// When `call` was last seen, relative to creation.
    pub fn last_at(&self, call: Call) -> Option<Duration> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(_, c)| *c == call)
            .map(|(at, _)| *at)
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls
            .lock()
            .unwrap()
            .push((self.epoch.elapsed(), call));
    }
}

#[async_trait]
impl Light for MockLight {
    fn kind(&self) -> &'static str {
        self.kind
    }

    async fn set_color(&self, color: Rgba) -> Result<(), CoreError> {
        self.record(Call::Color(color));
        Ok(())
    }

    async fn set_pattern(&self, pattern: PatternId, _speed: u8) -> Result<(), CoreError> {
        self.record(Call::Pattern(pattern));
        if self.failing.lock().unwrap().contains(&pattern) {
            return Err(CoreError::DeviceRejected {
                message: format!("{pattern:?} refused"),
            });
        }
        Ok(())
    }

    async fn set_power(&self, on: bool) -> Result<(), CoreError> {
        self.record(Call::Power(on));
        Ok(())
    }

    async fn set_brightness(&self, level: Brightness) -> Result<(), CoreError> {
        self.record(Call::Brightness(level.get()));
        Ok(())
    }

    async fn set_temperature(&self, value: Temperature) -> Result<(), CoreError> {
        self.record(Call::Temperature(value.get()));
        Ok(())
    }
}

/// A ledger that keeps what it was given, or refuses everything.
#[derive(Default)]
pub struct MockLedger {
    pub recorded: Mutex<Vec<PrizeUpdate>>,
    pub refuse: bool,
}

#[async_trait]
impl PrizeLedger for MockLedger {
    async fn record(&self, update: &PrizeUpdate) -> Result<(), CoreError> {
        if self.refuse {
            return Err(CoreError::Ledger {
                message: "ledger offline".into(),
            });
        }
        self.recorded.lock().unwrap().push(update.clone());
        Ok(())
    }
}

/// A ledger that reads its total, waits like a network round trip, then
/// writes the sum back.
#[derive(Default)]
pub struct PoolLedger {
    pub total: Mutex<f64>,
}

#[async_trait]
impl PrizeLedger for PoolLedger {
    async fn record(&self, update: &PrizeUpdate) -> Result<(), CoreError> {
        let read = *self.total.lock().unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        *self.total.lock().unwrap() = read + update.amount;
        Ok(())
    }
}

pub struct Rig {
    pub router: Router,
    pub strip: Arc<MockLight>,
    pub panel: Arc<MockLight>,
}

impl Rig {
    pub fn start(config: RouterConfig, ledger: Option<Arc<dyn PrizeLedger>>) -> Self {
        let strip = MockLight::new("strip");
        let panel = MockLight::new("panel");
        let facade = DeviceFacade::new(strip.clone(), panel.clone());
        let router = Router::spawn(config, facade, ledger);
        Self {
            router,
            strip,
            panel,
        }
    }

    /// Router with default timings, startup lighting applied and the
    /// recorded startup calls cleared.
    pub async fn ready() -> Self {
        let rig = Self::start(RouterConfig::default(), None);
        rig.router.flush().await.unwrap();
        rig.strip.clear();
        rig.panel.clear();
        rig
    }
}
