// ── Device facade ──
//
// The orchestrator talks to lights only through the `Light` capability
// trait. `DeviceFacade` owns one light per `Device`, logs every call and
// its failure, and never retries.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use glowcast_api::strip::Transition as WireTransition;
use glowcast_api::{PanelClient, StripClient};

use crate::error::CoreError;
use crate::model::{Brightness, Device, PatternId, Rgba, Temperature, Transition};

// ── Capability contract ──────────────────────────────────────────────

/// What a light can be asked to do. Capabilities a device lacks keep the
/// default body and report [`CoreError::Unsupported`].
#[async_trait]
pub trait Light: Send + Sync {
    /// Short device name used in errors.
    fn kind(&self) -> &'static str;

    async fn set_color(&self, color: Rgba) -> Result<(), CoreError> {
        let _ = color;
        Err(self.unsupported("set_color"))
    }

    async fn set_pattern(&self, pattern: PatternId, speed: u8) -> Result<(), CoreError> {
        let _ = (pattern, speed);
        Err(self.unsupported("set_pattern"))
    }

    async fn set_power(&self, on: bool) -> Result<(), CoreError>;

    async fn set_brightness(&self, level: Brightness) -> Result<(), CoreError> {
        let _ = level;
        Err(self.unsupported("set_brightness"))
    }

    async fn set_temperature(&self, value: Temperature) -> Result<(), CoreError> {
        let _ = value;
        Err(self.unsupported("set_temperature"))
    }

    fn unsupported(&self, operation: &'static str) -> CoreError {
        CoreError::Unsupported {
            device: self.kind(),
            operation,
        }
    }
}

// ── Facade ───────────────────────────────────────────────────────────

/// The two lights behind one logging front.
///
/// Every method returns the call's outcome so the sequencer can react,
/// but the failure has already been logged here; callers that do not
/// care simply drop the result.
#[derive(Clone)]
pub struct DeviceFacade {
    strip: Arc<dyn Light>,
    panel: Arc<dyn Light>,
}

impl DeviceFacade {
    pub fn new(strip: Arc<dyn Light>, panel: Arc<dyn Light>) -> Self {
        Self { strip, panel }
    }

    fn light(&self, device: Device) -> &dyn Light {
        match device {
            Device::Strip => self.strip.as_ref(),
            Device::Panel => self.panel.as_ref(),
        }
    }

    pub async fn set_color(&self, device: Device, color: Rgba) -> Result<(), CoreError> {
        logged(device, "set_color", self.light(device).set_color(color)).await
    }

    pub async fn set_pattern(&self, device: Device, pattern: PatternId) -> Result<(), CoreError> {
        logged(
            device,
            "set_pattern",
            self.light(device).set_pattern(pattern, pattern.speed()),
        )
        .await
    }

    pub async fn set_power(&self, device: Device, on: bool) -> Result<(), CoreError> {
        logged(device, "set_power", self.light(device).set_power(on)).await
    }

    pub async fn set_brightness(
        &self,
        device: Device,
        level: Brightness,
    ) -> Result<(), CoreError> {
        logged(device, "set_brightness", self.light(device).set_brightness(level)).await
    }

    pub async fn set_temperature(
        &self,
        device: Device,
        value: Temperature,
    ) -> Result<(), CoreError> {
        logged(
            device,
            "set_temperature",
            self.light(device).set_temperature(value),
        )
        .await
    }
}

async fn logged(
    device: Device,
    operation: &'static str,
    call: impl Future<Output = Result<(), CoreError>>,
) -> Result<(), CoreError> {
    match call.await {
        Ok(()) => {
            debug!(device = %device, operation, "Device call ok");
            Ok(())
        }
        Err(e) => {
            warn!(device = %device, operation, error = %e, "Device call failed");
            Err(e)
        }
    }
}

// ── Strip backend ────────────────────────────────────────────────────

/// The LAN color strip.
pub struct StripLight {
    client: StripClient,
}

impl StripLight {
    pub fn new(client: StripClient) -> Self {
        Self { client }
    }
}

fn wire_transition(transition: Transition) -> WireTransition {
    match transition {
        Transition::Fade => WireTransition::Fade,
        Transition::Jump => WireTransition::Jump,
        Transition::Strobe => WireTransition::Strobe,
    }
}

#[async_trait]
impl Light for StripLight {
    fn kind(&self) -> &'static str {
        "strip"
    }

    async fn set_color(&self, color: Rgba) -> Result<(), CoreError> {
        Ok(self
            .client
            .set_color(color.rgb(), color.brightness_percent())
            .await?)
    }

    async fn set_pattern(&self, pattern: PatternId, speed: u8) -> Result<(), CoreError> {
        let def = pattern.pattern();
        let colors: Vec<[u8; 3]> = def.colors.iter().map(|c| c.rgb()).collect();
        Ok(self
            .client
            .set_custom_pattern(&colors, wire_transition(def.transition), speed)
            .await?)
    }

    async fn set_power(&self, on: bool) -> Result<(), CoreError> {
        Ok(self.client.set_power(on).await?)
    }
}

// ── Panel backend ────────────────────────────────────────────────────

/// The single-zone HTTP panel.
pub struct PanelLight {
    client: PanelClient,
}

impl PanelLight {
    pub fn new(client: PanelClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Light for PanelLight {
    fn kind(&self) -> &'static str {
        "panel"
    }

    async fn set_power(&self, on: bool) -> Result<(), CoreError> {
        Ok(self.client.set_power(on).await?)
    }

    async fn set_brightness(&self, level: Brightness) -> Result<(), CoreError> {
        Ok(self.client.set_brightness(level.get()).await?)
    }

    async fn set_temperature(&self, value: Temperature) -> Result<(), CoreError> {
        Ok(self.client.set_temperature(value.get()).await?)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    struct PowerOnly;

    #[async_trait]
    impl Light for PowerOnly {
        fn kind(&self) -> &'static str {
            "test"
        }

        async fn set_power(&self, _on: bool) -> Result<(), CoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn missing_capabilities_are_unsupported() {
        let facade = DeviceFacade::new(Arc::new(PowerOnly), Arc::new(PowerOnly));
        assert!(facade.set_power(Device::Panel, true).await.is_ok());

        let err = facade
            .set_pattern(Device::Strip, PatternId::WhiteStrobe)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Unsupported {
                device: "test",
                operation: "set_pattern"
            }
        ));
    }

    #[tokio::test]
    async fn strip_rejects_panel_only_calls() {
        let strip = StripLight::new(StripClient::new("127.0.0.1:1"));
        assert!(matches!(
            strip.set_temperature(Temperature::new(200).unwrap()).await,
            Err(CoreError::Unsupported { device: "strip", .. })
        ));
    }
}
