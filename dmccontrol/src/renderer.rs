//! Renderer handles.
//!
//! A [`RendererHandle`] is the controller's durable view of one renderer. It
//! merges two sources of truth: the configured entry from `config.json` and
//! whatever discovery last reported. Configured values win; detected values
//! fill the gaps. Discovery mutates handles in place, so every other
//! component holds them as `Arc` and sees updates immediately.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local};
use dmcconfig::PlayerConfig;
use serde::Serialize;
use tracing::warn;

use crate::capabilities::MediaKind;
use crate::errors::ControllerError;
use crate::player::Player;

/// Meta-information about a renderer, either configured or detected.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RendererMeta {
    pub name: Option<String>,
    pub id: Option<String>,
    pub aliases: Vec<String>,
    pub url: Option<String>,
    pub mac: Option<String>,
    pub capabilities: Vec<MediaKind>,
    pub send_metadata: Option<bool>,
}

impl RendererMeta {
    pub fn from_config(config: &PlayerConfig) -> Self {
        let capabilities = config
            .capabilities
            .iter()
            .filter_map(|raw| match MediaKind::from_str(raw) {
                Ok(kind) => Some(kind),
                Err(_) => {
                    warn!(player = %config.name, capability = %raw, "ignoring unknown capability");
                    None
                }
            })
            .collect();

        Self {
            name: Some(config.name.clone()),
            id: None,
            aliases: config.aliases.clone(),
            url: Some(config.url.clone()),
            mac: config.mac.clone(),
            capabilities,
            send_metadata: Some(config.send_metadata),
        }
    }
}

/// Serializable snapshot of a handle, exposed through `/info`.
#[derive(Debug, Clone, Serialize)]
pub struct RendererView {
    pub configured_meta: Option<RendererMeta>,
    pub detected_meta: Option<RendererMeta>,
    pub last_seen: Option<String>,
}

#[derive(Default)]
struct DetectedState {
    meta: Option<RendererMeta>,
    last_seen: Option<DateTime<Local>>,
    player: Option<Arc<Player>>,
}

pub struct RendererHandle {
    configured: Option<RendererMeta>,
    detected: Mutex<DetectedState>,
}

impl RendererHandle {
    pub fn configured(meta: RendererMeta) -> Arc<Self> {
        Arc::new(Self {
            configured: Some(meta),
            detected: Mutex::new(DetectedState::default()),
        })
    }

    pub fn from_config(config: &PlayerConfig) -> Arc<Self> {
        Self::configured(RendererMeta::from_config(config))
    }

    /// A handle for a freshly discovered, unconfigured device.
    pub fn discovered(meta: RendererMeta, player: Arc<Player>) -> Arc<Self> {
        Arc::new(Self {
            configured: None,
            detected: Mutex::new(DetectedState {
                meta: Some(meta),
                last_seen: Some(Local::now()),
                player: Some(player),
            }),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.configured.is_some()
    }

    fn preferred<T, F>(&self, get: F) -> Option<T>
    where
        F: Fn(&RendererMeta) -> Option<T>,
    {
        if let Some(meta) = &self.configured {
            if let Some(value) = get(meta) {
                return Some(value);
            }
        }
        let detected = self.lock_detected();
        detected.meta.as_ref().and_then(|meta| get(meta))
    }

    pub fn name(&self) -> Option<String> {
        self.preferred(|meta| meta.name.clone())
    }

    pub fn url(&self) -> Option<String> {
        self.preferred(|meta| meta.url.clone())
    }

    pub fn mac(&self) -> Option<String> {
        self.preferred(|meta| meta.mac.clone())
    }

    pub fn id(&self) -> Option<String> {
        self.preferred(|meta| meta.id.clone())
    }

    pub fn send_metadata(&self) -> bool {
        self.preferred(|meta| meta.send_metadata).unwrap_or(true)
    }

    /// Union of configured and detected names and aliases, in that order.
    pub fn known_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(meta) = &self.configured {
            names.extend(meta.name.clone());
            names.extend(meta.aliases.iter().cloned());
        }
        let detected = self.lock_detected();
        if let Some(meta) = &detected.meta {
            names.extend(meta.name.clone());
            names.extend(meta.aliases.iter().cloned());
        }
        names
    }

    /// True when either side declares the capability.
    pub fn can_play(&self, kind: MediaKind) -> bool {
        if let Some(meta) = &self.configured {
            if meta.capabilities.contains(&kind) {
                return true;
            }
        }
        let detected = self.lock_detected();
        detected
            .meta
            .as_ref()
            .is_some_and(|meta| meta.capabilities.contains(&kind))
    }

    /// The protocol client for this renderer, created lazily from the
    /// preferred control URL.
    pub fn player(&self) -> Result<Arc<Player>, ControllerError> {
        let url = self.url().ok_or_else(|| {
            ControllerError::cannot_be_handled("renderer has no control URL")
        })?;
        let send_metadata = self.send_metadata();
        let name = self.name().unwrap_or_else(|| url.clone());

        let mut detected = self.lock_detected();
        let player = detected
            .player
            .get_or_insert_with(|| Arc::new(Player::new(name, url, send_metadata)));
        Ok(Arc::clone(player))
    }

    /// Merges a discovery result into this handle: detected meta and
    /// last_seen are replaced, an existing protocol client is kept.
    pub fn update_from_discovery(&self, discovered: &RendererHandle) {
        let other = discovered.lock_detected();
        let mut mine = self.lock_detected();

        mine.meta = other.meta.clone();
        mine.last_seen = other.last_seen;
        if mine.player.is_none() {
            mine.player = other.player.clone();
        }
    }

    pub fn last_seen(&self) -> Option<DateTime<Local>> {
        self.lock_detected().last_seen
    }

    pub fn to_view(&self) -> RendererView {
        let detected = self.lock_detected();
        RendererView {
            configured_meta: self.configured.clone(),
            detected_meta: detected.meta.clone(),
            last_seen: detected.last_seen.map(|t| t.to_rfc3339()),
        }
    }

    fn lock_detected(&self) -> std::sync::MutexGuard<'_, DetectedState> {
        self.detected.lock().expect("Renderer Mutex Poisoned")
    }
}
