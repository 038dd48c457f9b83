//! Playback state owned by an integrator.
//!
//! [`State`] is mutable and lives behind the integrator's mutex; callers
//! only ever see the immutable [`StateView`] snapshot.

use chrono::Local;
use dmcdidl::DidlItem;
use serde::Serialize;

use crate::capabilities::MediaKind;
use crate::command::PlayCommand;
use crate::media_server::SearchResponse;

const DESCRIPTION_IDLE: &str = "Aus";

/// Immutable snapshot of an integrator's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateView {
    pub looping: bool,
    pub last_played_url: Option<String>,
    pub last_played_artist: Option<String>,
    pub last_played_title: Option<String>,
    pub running: bool,
    pub running_start: Option<String>,
    pub played_count: u32,
    pub description: String,
    pub stop_reason: Option<String>,
}

pub struct State {
    // the command being executed
    current_command: Option<PlayCommand>,

    // current state for that command
    running: bool,
    looping: bool,
    running_start: Option<String>,
    search_response: Option<SearchResponse>,
    played_count: u32,
    description: String,
    stop_reason: Option<String>,

    // track planned after the current one
    next_play_url: Option<String>,
    next_play_item: Option<DidlItem>,

    // historical info, survives until the next play command
    last_played_url: Option<String>,
    last_played_item: Option<DidlItem>,
}

impl Default for State {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    pub fn new() -> Self {
        Self {
            current_command: None,
            running: false,
            looping: false,
            running_start: None,
            search_response: None,
            played_count: 0,
            description: DESCRIPTION_IDLE.to_string(),
            stop_reason: None,
            next_play_url: None,
            next_play_item: None,
            last_played_url: None,
            last_played_item: None,
        }
    }

    /// Binds the command this state executes.
    pub fn command(&mut self, command: PlayCommand) {
        self.current_command = Some(command);
    }

    pub fn current_command(&self) -> Option<&PlayCommand> {
        self.current_command.as_ref()
    }

    /// URL-mode plays the same url over and over; item-mode searches the
    /// media server.
    pub fn is_url_mode(&self) -> bool {
        self.current_command
            .as_ref()
            .is_some_and(PlayCommand::is_url_based)
    }

    pub fn is_item_mode(&self) -> bool {
        self.current_command.is_some() && !self.is_url_mode()
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn played_count(&self) -> u32 {
        self.played_count
    }

    pub fn last_played_url(&self) -> Option<&str> {
        self.last_played_url.as_deref()
    }

    pub fn next_play_url(&self) -> Option<&str> {
        self.next_play_url.as_deref()
    }

    pub fn search_response(&self) -> Option<&SearchResponse> {
        self.search_response.as_ref()
    }

    pub fn set_search_response(&mut self, response: SearchResponse) {
        self.search_response = Some(response);
    }

    /// A track started playing now.
    pub fn now_playing(&mut self, url: String, item: Option<DidlItem>) {
        self.running = true;
        self.looping = self
            .current_command
            .as_ref()
            .is_some_and(|command| command.looping);

        if self.running_start.is_none() {
            self.running_start = Some(Local::now().to_rfc3339());
        }
        self.played_count += 1;
        self.last_played_url = Some(url);
        self.last_played_item = item;
        self.description = self.calculate_description();
    }

    /// Remembers the track planned after the current one.
    pub fn next_play(&mut self, url: String, item: Option<DidlItem>) {
        self.next_play_url = Some(url);
        self.next_play_item = item;
    }

    /// The planned next track took over; the previous one is done.
    pub fn next_track_is_playing(&mut self) {
        self.last_played_url = self.next_play_url.take();
        self.last_played_item = self.next_play_item.take();
        self.played_count += 1;
    }

    /// Playback ends NOW. Everything except the historical fields resets.
    pub fn stop(&mut self, reason: &str) {
        let last_played_url = self.last_played_url.take();
        let last_played_item = self.last_played_item.take();

        *self = State::new();
        self.stop_reason = Some(reason.to_string());
        self.last_played_url = last_played_url;
        self.last_played_item = last_played_item;
    }

    pub fn view(&self) -> StateView {
        let (title, artist) = self.title_and_artist();
        StateView {
            looping: self.looping,
            last_played_url: self.last_played_url.clone(),
            last_played_artist: artist,
            last_played_title: title,
            running: self.running,
            running_start: self.running_start.clone(),
            played_count: self.played_count,
            description: self.description.clone(),
            stop_reason: self.stop_reason.clone(),
        }
    }

    fn title_and_artist(&self) -> (Option<String>, Option<String>) {
        match &self.last_played_item {
            Some(item) => (item.title(), item.actor()),
            None => (None, None),
        }
    }

    fn calculate_description(&self) -> String {
        let Some(command) = &self.current_command else {
            return DESCRIPTION_IDLE.to_string();
        };

        if command.looping {
            if let Some(url) = non_blank(&command.url) {
                return format!("Wiederholt {}", url);
            }

            let mut msg = format!("Spielt {}", type_text(command.kind));
            if let Some(artist) = non_blank(&command.artist) {
                msg.push_str(&format!(" von {}", artist));
            }
            if let Some(title) = non_blank(&command.title) {
                msg.push_str(&format!(" mit '{}'", title));
            }
            msg
        } else {
            if let Some(url) = non_blank(&command.url) {
                return format!("Spielt {}", url);
            }

            let mut msg = String::from("Spielt");
            let (title, artist) = self.title_and_artist();
            if let Some(title) = title {
                // only plays once, so write the full name
                msg.push_str(&format!(" {}", title));
                if let Some(artist) = artist {
                    msg.push_str(&format!(" von {}", artist));
                }
                return msg;
            }
            if let Some(artist) = artist {
                msg.push_str(&format!(" etwas von {}", artist));
            }
            msg
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn type_text(kind: Option<MediaKind>) -> &'static str {
    match kind {
        Some(MediaKind::Audio) => "Lieder",
        Some(MediaKind::Video) => "Videos",
        Some(MediaKind::Image) => "Bilder",
        None => "Medien",
    }
}
