//! Canonical renderer list.
//!
//! The manager owns every [`RendererHandle`]: the configured ones from
//! startup plus whatever discovery turns up. Discovery runs as a scheduler
//! job and merges results by control URL — known handles are updated in
//! place (so integrators and the dispatcher see fresh metadata through their
//! existing `Arc`s), unknown devices are appended.

use std::sync::{Arc, RwLock};

use dmcconfig::PlayerConfig;
use tracing::debug;

use crate::discovery;
use crate::renderer::{RendererHandle, RendererView};
use crate::scheduler::Scheduler;

/// Discovery reconciliation interval: every 5 minutes.
pub const DEFAULT_DISCOVERY_INTERVAL: u64 = 60 * 5;

pub const DISCOVERY_JOB_NAME: &str = "PLAYER_DISCOVERY";

pub struct PlayerManager {
    players: RwLock<Vec<Arc<RendererHandle>>>,
}

impl PlayerManager {
    pub fn new(configs: &[PlayerConfig]) -> Arc<Self> {
        let players = configs.iter().map(RendererHandle::from_config).collect();
        Arc::new(Self {
            players: RwLock::new(players),
        })
    }

    /// Registers the periodic discovery job.
    pub fn start_discovery(self: &Arc<Self>, scheduler: &Scheduler) {
        let manager = Arc::clone(self);
        scheduler.start_job_immediate(DISCOVERY_JOB_NAME, DEFAULT_DISCOVERY_INTERVAL, move || {
            manager.run_discovery();
        });
    }

    pub fn run_discovery(&self) {
        self.merge_discovered(discovery::discover());
    }

    /// Snapshot of the current handle list, in declaration order.
    pub fn players(&self) -> Vec<Arc<RendererHandle>> {
        self.players.read().expect("Manager Lock Poisoned").clone()
    }

    pub fn player_views(&self) -> Vec<RendererView> {
        self.players().iter().map(|p| p.to_view()).collect()
    }

    /// Merges one discovery cycle into the handle list, keyed by control URL.
    pub fn merge_discovered(&self, discovered: Vec<Arc<RendererHandle>>) {
        for handle in discovered {
            let Some(url) = handle.url() else {
                continue;
            };

            let existing = self
                .players()
                .into_iter()
                .find(|p| p.url().as_deref() == Some(url.as_str()));

            match existing {
                Some(existing) => {
                    debug!(url = %url, "discovered an already known device");
                    existing.update_from_discovery(&handle);
                }
                None => {
                    debug!(url = %url, "discovered a new device");
                    self.players
                        .write()
                        .expect("Manager Lock Poisoned")
                        .push(handle);
                }
            }
        }
    }
}
