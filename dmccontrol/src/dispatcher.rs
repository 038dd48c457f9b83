//! Command routing.
//!
//! The dispatcher picks the renderer (and thereby the integrator) for each
//! command: an explicit target wins, then the first renderer that can play
//! the requested type and answers a probe, then nothing. Integrators are
//! materialized lazily, one per renderer, and reused for the life of the
//! process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::capabilities::{MediaKind, MediaLibrary};
use crate::command::{Command, PlayCommand};
use crate::errors::ControllerError;
use crate::integrator::Integrator;
use crate::manager::PlayerManager;
use crate::renderer::RendererHandle;
use crate::scheduler::Scheduler;
use crate::state::StateView;
use crate::wakeup;

/// One renderer's state, as reported by `/state`.
#[derive(Debug, Clone, Serialize)]
pub struct StatePerPlayer {
    pub player_name: String,
    pub state: StateView,
}

type OnlineCheck = dyn Fn(&RendererHandle) -> bool + Send + Sync;

pub struct PlayerDispatcher {
    manager: Arc<PlayerManager>,
    library: Arc<dyn MediaLibrary>,
    scheduler: Arc<Scheduler>,
    // renderer control URL -> integrator
    integrators: Mutex<HashMap<String, Arc<Integrator>>>,
    online_check: Box<OnlineCheck>,
}

impl PlayerDispatcher {
    pub fn new(
        manager: Arc<PlayerManager>,
        library: Arc<dyn MediaLibrary>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self::with_online_check(manager, library, scheduler, |handle| {
            wakeup::ensure_online(handle)
        })
    }

    /// Constructor with an injectable liveness probe.
    pub fn with_online_check<F>(
        manager: Arc<PlayerManager>,
        library: Arc<dyn MediaLibrary>,
        scheduler: Arc<Scheduler>,
        online_check: F,
    ) -> Self
    where
        F: Fn(&RendererHandle) -> bool + Send + Sync + 'static,
    {
        Self {
            manager,
            library,
            scheduler,
            integrators: Mutex::new(HashMap::new()),
            online_check: Box::new(online_check),
        }
    }

    pub fn play(&self, command: PlayCommand) -> Result<StateView, ControllerError> {
        let integrator = self.decide_integrator(command.target.as_deref(), command.kind)?;
        integrator.play(command)
    }

    pub fn pause(&self, command: &Command) -> Result<StateView, ControllerError> {
        let integrator = self.decide_integrator(command.target.as_deref(), None)?;
        integrator.pause()
    }

    pub fn stop(&self, command: &Command) -> Result<StateView, ControllerError> {
        let integrator = self.decide_integrator(command.target.as_deref(), None)?;
        integrator.stop()
    }

    /// One entry per materialized integrator; narrowed to the targeted
    /// renderer when the command names one.
    pub fn state(&self, command: Option<&Command>) -> Vec<StatePerPlayer> {
        let players = self.manager.players();

        let target_url = command
            .and_then(|c| c.target.as_deref())
            .and_then(|target| Self::handle_by_name(&players, target))
            .and_then(|handle| handle.url());

        let integrators = self.lock_integrators();
        players
            .iter()
            .filter_map(|handle| {
                let url = handle.url()?;
                if let Some(target) = &target_url {
                    if *target != url {
                        return None;
                    }
                }
                let integrator = integrators.get(&url)?;
                Some(StatePerPlayer {
                    player_name: handle.name().unwrap_or_else(|| url.clone()),
                    state: integrator.get_state(),
                })
            })
            .collect()
    }

    fn handle_by_name<'a>(
        players: &'a [Arc<RendererHandle>],
        target: &str,
    ) -> Option<&'a Arc<RendererHandle>> {
        players
            .iter()
            .find(|handle| handle.known_names().iter().any(|name| name == target))
    }

    /// Resolution order: explicit target (must be online), then declaration
    /// order skipping renderers that cannot play the requested type, first
    /// online wins.
    fn decide_integrator(
        &self,
        target: Option<&str>,
        kind: Option<MediaKind>,
    ) -> Result<Arc<Integrator>, ControllerError> {
        let players = self.manager.players();

        if let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) {
            if let Some(handle) = Self::handle_by_name(&players, target) {
                debug!(target = %target, "found renderer from target");
                if (self.online_check)(handle) {
                    return self.integrator_for(handle);
                }
                return Err(ControllerError::cannot_be_handled(format!(
                    "The requested renderer {} is not available",
                    target
                )));
            }
        }

        for handle in &players {
            if let Some(kind) = kind {
                if !handle.can_play(kind) {
                    continue;
                }
            }
            if (self.online_check)(handle) {
                debug!(
                    renderer = handle.name().as_deref().unwrap_or("<unnamed>"),
                    "using first matching online renderer"
                );
                return self.integrator_for(handle);
            }
        }

        Err(ControllerError::cannot_be_handled(match kind {
            Some(kind) => format!("No online renderer can play type {}", kind),
            None => "No renderer available".to_string(),
        }))
    }

    fn integrator_for(
        &self,
        handle: &Arc<RendererHandle>,
    ) -> Result<Arc<Integrator>, ControllerError> {
        let url = handle
            .url()
            .ok_or_else(|| ControllerError::cannot_be_handled("renderer has no control URL"))?;

        let mut integrators = self.lock_integrators();
        if let Some(integrator) = integrators.get(&url) {
            return Ok(Arc::clone(integrator));
        }

        let player = handle.player()?;
        let name = handle.name().unwrap_or_else(|| url.clone());
        let integrator = Integrator::new(
            name,
            player,
            Arc::clone(&self.library),
            Arc::clone(&self.scheduler),
        );
        integrators.insert(url, Arc::clone(&integrator));
        Ok(integrator)
    }

    fn lock_integrators(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<Integrator>>> {
        self.integrators.lock().expect("Dispatcher Mutex Poisoned")
    }
}
