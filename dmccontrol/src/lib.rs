//! # dmccontrol - playback control plane
//!
//! Drives UPnP/DLNA media renderers: protocol clients for AVTransport,
//! ConnectionManager and ContentDirectory, renderer handles with
//! Wake-on-LAN recovery, a periodic discovery loop, and the per-renderer
//! playback supervision (integrator + dispatcher) on top of a named-job
//! scheduler.
//!
//! The whole control plane is synchronous; HTTP calls carry explicit
//! timeouts and per-renderer effects are serialized by the integrator's
//! mutex.

pub mod avtransport_client;
pub mod capabilities;
pub mod command;
pub mod connection_manager_client;
pub mod discovery;
pub mod dispatcher;
pub mod errors;
pub mod integrator;
pub mod manager;
pub mod media_server;
pub mod player;
pub mod provider;
pub mod renderer;
pub mod scheduler;
pub mod soap_client;
pub mod state;
pub mod wakeup;

pub use avtransport_client::{
    AVTRANSPORT_SERVICE, AvTransportClient, MediaInfo, PositionInfo, TransportInfo,
};
pub use capabilities::{
    ItemPicker, MediaKind, MediaLibrary, PlayerState, RandomPicker, TransportDriver,
    TransportState,
};
pub use command::{Command, PlayCommand};
pub use connection_manager_client::{ConnectionManagerClient, ProtocolInfo};
pub use dispatcher::{PlayerDispatcher, StatePerPlayer};
pub use errors::ControllerError;
pub use integrator::{DEFAULT_CHECK_INTERVAL, Integrator};
pub use manager::{DEFAULT_DISCOVERY_INTERVAL, PlayerManager};
pub use media_server::{MediaServer, SearchQuery, SearchResponse};
pub use player::Player;
pub use renderer::{RendererHandle, RendererMeta, RendererView};
pub use scheduler::Scheduler;
pub use state::StateView;
pub use wakeup::ensure_online;

pub use soap_client::{invoke_upnp_action, invoke_upnp_action_with_timeout};
