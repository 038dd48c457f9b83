//! Per-renderer playback supervisor.
//!
//! An [`Integrator`] owns the playback [`State`] for one renderer and the
//! observation job that polls it. API calls and the poll callback are
//! serialized by a single mutex, so all effects on one renderer are
//! linearizable; callers only ever receive [`StateView`] snapshots.

use std::sync::{Arc, Mutex, MutexGuard};

use dmcdidl::DidlItem;
use tracing::{debug, info, warn};

use crate::capabilities::{ItemPicker, MediaLibrary, RandomPicker, TransportDriver, TransportState};
use crate::command::PlayCommand;
use crate::errors::ControllerError;
use crate::media_server::{SearchQuery, SearchResponse};
use crate::scheduler::Scheduler;
use crate::state::{State, StateView};

/// Poll interval of the observation loop, in seconds.
pub const DEFAULT_CHECK_INTERVAL: u64 = 10;

/// What the renderer is doing relative to the tracks we gave it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunningState {
    RunningCurrent,
    RunningNext,
    Stopped,
    Interrupted,
    Unknown,
}

/// Whether a next track is announced on the renderer. `None` means the
/// observation could not tell (e.g. during a transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextMediaState {
    Set,
    Unset,
}

pub struct Integrator {
    name: String,
    player: Arc<dyn TransportDriver>,
    library: Arc<dyn MediaLibrary>,
    scheduler: Arc<Scheduler>,
    picker: Box<dyn ItemPicker>,
    check_interval: u64,
    state: Mutex<State>,
}

impl std::fmt::Debug for Integrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integrator")
            .field("name", &self.name)
            .field("check_interval", &self.check_interval)
            .finish_non_exhaustive()
    }
}

impl Integrator {
    pub fn new(
        name: String,
        player: Arc<dyn TransportDriver>,
        library: Arc<dyn MediaLibrary>,
        scheduler: Arc<Scheduler>,
    ) -> Arc<Self> {
        Self::new_with(
            name,
            player,
            library,
            scheduler,
            Box::new(RandomPicker),
            DEFAULT_CHECK_INTERVAL,
        )
    }

    pub fn new_with(
        name: String,
        player: Arc<dyn TransportDriver>,
        library: Arc<dyn MediaLibrary>,
        scheduler: Arc<Scheduler>,
        picker: Box<dyn ItemPicker>,
        check_interval: u64,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            player,
            library,
            scheduler,
            picker,
            check_interval,
            state: Mutex::new(State::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scheduler_name(&self) -> String {
        format!("Media_Observer_{}", self.name)
    }

    // external methods

    pub fn play(self: &Arc<Self>, command: PlayCommand) -> Result<StateView, ControllerError> {
        debug!(renderer = %self.name, "play called");
        command.validate()?;

        let mut state = self.lock_state();

        // whatever ran before is over now
        self.end(&mut state, "initiate new track");
        *state = State::new();
        state.command(command);

        if let Err(e) = self.play_next_track(&mut state) {
            info!(renderer = %self.name, error = %e, "error while playing");
            self.end(&mut state, &format!("exception in play: {e}"));
            return Err(e);
        }

        debug!(
            renderer = %self.name,
            running = state.running(),
            played_count = state.played_count(),
            "initial track started"
        );

        // the item search may have come up empty; only a running playback
        // needs an observer
        if state.running() {
            let integrator = Arc::clone(self);
            self.scheduler
                .start_job(&self.scheduler_name(), self.check_interval, move || {
                    integrator.loop_process()
                });
        }

        Ok(state.view())
    }

    pub fn pause(&self) -> Result<StateView, ControllerError> {
        debug!(renderer = %self.name, "pause called");
        let mut state = self.lock_state();

        self.end(&mut state, "pause invoked");
        if let Err(e) = self.player.pause() {
            self.end(&mut state, &format!("exception in pause: {e}"));
            return Err(e);
        }
        Ok(state.view())
    }

    pub fn stop(&self) -> Result<StateView, ControllerError> {
        debug!(renderer = %self.name, "stop called");
        let mut state = self.lock_state();

        self.end(&mut state, "stop invoked");
        if let Err(e) = self.player.stop() {
            self.end(&mut state, &format!("exception in stop: {e}"));
            return Err(e);
        }
        Ok(state.view())
    }

    pub fn get_state(&self) -> StateView {
        self.lock_state().view()
    }

    // observation loop

    pub(crate) fn loop_process(&self) {
        let mut state = self.lock_state();
        if let Err(e) = self.observe(&mut state) {
            info!(renderer = %self.name, error = %e, "error in loop process");
            self.end(&mut state, &format!("exception in looping: {e}"));
        }
    }

    fn observe(&self, state: &mut State) -> Result<(), ControllerError> {
        let (run_state, next_state) = self.check_running(state)?;

        match run_state {
            RunningState::Interrupted => {
                self.end(state, "interrupted");
            }
            RunningState::RunningCurrent => {
                debug!(renderer = %self.name, "running current url");
                if state.looping() && next_state == Some(NextMediaState::Unset) {
                    debug!(renderer = %self.name, "next media to play is unset, setting next media");
                    self.set_next_track(state)?;
                }
            }
            RunningState::RunningNext => {
                debug!(renderer = %self.name, "running the next media");
                if state.looping() {
                    // next became current; find a new next and announce it
                    state.next_track_is_playing();
                    self.set_next_track(state)?;
                } else {
                    return Err(ControllerError::internal(
                        "next track detected while not looping",
                    ));
                }
            }
            RunningState::Stopped => {
                if state.looping() {
                    self.play_next_track(state)?;
                } else {
                    self.end(state, "not looping");
                }
            }
            RunningState::Unknown => {
                info!(renderer = %self.name, "unable to determine running state");
            }
        }

        Ok(())
    }

    fn check_running(
        &self,
        state: &State,
    ) -> Result<(RunningState, Option<NextMediaState>), ControllerError> {
        let player_state = self.player.get_state()?;
        let transport = player_state.transport;
        let current_url = player_state.current_url.as_deref();

        if transport == TransportState::Transitioning {
            // happens between nothing and the current URI, or between the
            // current and next URI; either way the next-media state is
            // unknowable right now
            debug!(renderer = %self.name, "reads a resource to be presented");
            return Ok((RunningState::RunningCurrent, None));
        }

        if transport == TransportState::NoMediaPresent {
            debug!(renderer = %self.name, "found shutdown of renderer");
            return Ok((RunningState::Interrupted, None));
        }

        let is_last_played_url = current_url == state.last_played_url();
        let is_next_play_url = current_url == state.next_play_url();
        if !is_last_played_url && !is_next_play_url {
            debug!(renderer = %self.name, "found renderer playing an unknown track");
            return Ok((RunningState::Interrupted, None));
        }

        if transport == TransportState::Stopped {
            return if player_state.progress_count == 0 {
                debug!(renderer = %self.name, "found renderer stopped naturally (played until end)");
                Ok((RunningState::Stopped, None))
            } else {
                debug!(renderer = %self.name, "found renderer stopped in the middle of a track");
                Ok((RunningState::Interrupted, None))
            };
        }

        if transport == TransportState::Playing {
            debug!(renderer = %self.name, "found renderer still running a track");

            if is_last_played_url {
                let next_state = if player_state.next_url.is_some() {
                    NextMediaState::Set
                } else {
                    NextMediaState::Unset
                };
                return Ok((RunningState::RunningCurrent, Some(next_state)));
            }
            // a next media may be announced, but not by this process
            return Ok((RunningState::RunningNext, Some(NextMediaState::Unset)));
        }

        // PAUSED_PLAYBACK, RECORDING, PAUSED_RECORDING
        Ok((RunningState::Unknown, None))
    }

    // track handling

    fn perform_media_search(&self, state: &State) -> Result<SearchResponse, ControllerError> {
        let command = state
            .current_command()
            .ok_or_else(|| ControllerError::internal("no active command for a media search"))?;

        let query = SearchQuery {
            title: command.title.clone(),
            artist: command.artist.clone(),
            kind: command.kind,
        };
        debug!(renderer = %self.name, ?query, "searching media server");

        let response = self.library.search(&query)?;
        debug!(renderer = %self.name, "found {} items", response.matches());
        Ok(response)
    }

    fn ensure_search_response(&self, state: &mut State) -> Result<(), ControllerError> {
        if state.search_response().is_none() {
            let response = self.perform_media_search(state)?;
            state.set_search_response(response);
        }
        Ok(())
    }

    fn pick_item(&self, state: &State) -> Result<(String, DidlItem), ControllerError> {
        let response = state
            .search_response()
            .ok_or_else(|| ControllerError::internal("no search response to pick from"))?;

        let item = response
            .random_item_with(self.picker.as_ref())
            .cloned()
            .ok_or_else(|| ControllerError::media_server("search returned no playable items"))?;

        let url = item
            .url()
            .ok_or_else(|| ControllerError::media_server("search item has no resource URL"))?;

        Ok((url, item))
    }

    fn command_url(&self, state: &State) -> Result<String, ControllerError> {
        state
            .current_command()
            .and_then(|command| command.url.clone())
            .ok_or_else(|| ControllerError::internal("url mode without a url"))
    }

    fn play_next_track(&self, state: &mut State) -> Result<(), ControllerError> {
        if state.is_url_mode() {
            // this mode always plays the same url
            debug!(renderer = %self.name, "playing without item");
            let url = self.command_url(state)?;
            self.player.play(&url, None)?;
            state.now_playing(url, None);
            if state.looping() {
                self.set_next_track(state)?;
            }
            return Ok(());
        }

        self.ensure_search_response(state)?;

        if state.search_response().is_some_and(|r| r.matches() > 0) {
            let (url, item) = self.pick_item(state)?;
            self.player.play(&url, Some(&item))?;
            state.now_playing(url, Some(item));
            if state.looping() {
                self.set_next_track(state)?;
            }
        } else {
            self.end(state, "nothing found in media server");
        }
        Ok(())
    }

    fn set_next_track(&self, state: &mut State) -> Result<(), ControllerError> {
        if state.is_url_mode() {
            debug!(renderer = %self.name, "next playing without item");
            let url = self.command_url(state)?;
            self.player.set_next(&url, None)?;
            state.next_play(url, None);
            return Ok(());
        }

        if state.search_response().is_none() {
            // unlikely: something already played, so a response was cached
            warn!(renderer = %self.name, "no cached search response when setting next track");
            self.ensure_search_response(state)?;
        }

        if state.search_response().is_some_and(|r| r.matches() > 0) {
            let (url, item) = self.pick_item(state)?;
            debug!(renderer = %self.name, url = %url, "next with item");
            self.player.set_next(&url, Some(&item))?;
            state.next_play(url, Some(item));
        } else {
            warn!(renderer = %self.name, "empty search response when setting next track");
            self.end(state, "nothing found in media server");
        }
        Ok(())
    }

    /// Ends supervision: removes the observation job and resets state.
    fn end(&self, state: &mut State, reason: &str) {
        debug!(renderer = %self.name, reason = %reason, "ending integrator");
        self.scheduler.stop_job(&self.scheduler_name());
        state.stop(reason);
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("Integrator Mutex Poisoned")
    }
}
