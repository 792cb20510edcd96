//! HTTP clients for the external services the pipeline talks to.
//!
//! - `fms`: the FIRST field-management schedule API
//! - `twitch`: VOD listing and credentials for the streaming platform
//! - `youtube`: resumable uploads, thumbnails and playlists
//! - `tba`: The Blue Alliance trusted write API

pub mod error;
pub mod fms;
pub mod tba;
pub mod twitch;
pub mod youtube;

pub use error::{ServiceError, ServiceResult};
pub use fms::{FmsClient, FmsConfig};
pub use tba::{TbaClient, TbaConfig};
pub use twitch::{TwitchClient, TwitchConfig};
pub use youtube::{UploadRequest, YouTubeClient, YouTubeConfig};
