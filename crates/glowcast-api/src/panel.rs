//! HTTP/JSON driver for the single-zone panel light.
//!
//! The panel exposes `/elgato/lights` on port 9123. Reads and writes use
//! the same envelope, `{"numberOfLights": 1, "lights": [{...}]}`, and a
//! write only carries the fields it changes.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const LIGHTS_PATH: &str = "/elgato/lights";

/// Current panel state as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelState {
    pub on: u8,
    pub brightness: u8,
    pub temperature: u16,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<T> {
    number_of_lights: u8,
    lights: Vec<T>,
}

#[derive(Debug, Default, Serialize)]
struct LightUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    on: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<u16>,
}

/// Panel light client.
#[derive(Debug, Clone)]
pub struct PanelClient {
    http: reqwest::Client,
    lights_url: Url,
}

impl PanelClient {
    pub fn new(base_url: &Url, transport: &TransportConfig) -> Result<Self, Error> {
        Self::from_reqwest(base_url, transport.build_client()?)
    }

    pub fn from_reqwest(base_url: &Url, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self {
            http,
            lights_url: base_url.join(LIGHTS_PATH)?,
        })
    }

    pub async fn set_power(&self, on: bool) -> Result<(), Error> {
        self.put(LightUpdate {
            on: Some(u8::from(on)),
            ..LightUpdate::default()
        })
        .await
    }

    /// Brightness in percent, 0-100.
    pub async fn set_brightness(&self, brightness: u8) -> Result<(), Error> {
        self.put(LightUpdate {
            brightness: Some(brightness),
            ..LightUpdate::default()
        })
        .await
    }

    /// Temperature in device units (143-344).
    pub async fn set_temperature(&self, temperature: u16) -> Result<(), Error> {
        self.put(LightUpdate {
            temperature: Some(temperature),
            ..LightUpdate::default()
        })
        .await
    }

    pub async fn state(&self) -> Result<PanelState, Error> {
        let body = self
            .http
            .get(self.lights_url.clone())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let envelope: Envelope<PanelState> =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body: body.clone(),
            })?;

        envelope.lights.into_iter().next().ok_or(Error::Deserialization {
            message: "panel reported no lights".into(),
            body,
        })
    }

    async fn put(&self, update: LightUpdate) -> Result<(), Error> {
        tracing::debug!(url = %self.lights_url, update = ?update, "Panel update");
        self.http
            .put(self.lights_url.clone())
            .json(&Envelope {
                number_of_lights: 1,
                lights: vec![update],
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
