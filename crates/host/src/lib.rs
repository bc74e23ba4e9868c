//! Conform Host Adapter
//!
//! The boundary to the external NLE application:
//! - [`api`]: the backend trait, item/media handles, capabilities
//! - [`bridge`]: the production transport over the host's script shell
//! - [`session`]: connect/launch/retry handshake and template open
//! - [`settings`]: the one typed-to-stringly translation for render settings
//!
//! Nothing above this crate talks to the host directly; the engine only
//! sees [`api::HostBackend`] and [`session::HostSession`].

pub mod api;
pub mod bridge;
pub mod session;
pub mod settings;

pub use api::{
    HostBackend, HostCapabilities, HostSettingsMap, ItemId, MediaId, RenderJobStatus,
    TimelineItemSnapshot,
};
pub use session::HostSession;
