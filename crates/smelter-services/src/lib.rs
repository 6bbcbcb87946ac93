//! smelter-services: sound host seam, live voice pool and the playback scheduler

pub mod host;
pub mod player;
pub mod voice_pool;

pub use host::{HostError, HostLog, RecordingHost, SoundHost, VoiceHandle};
pub use player::{
    entropy_seed, FastRand, Player, PlayerConfig, PlayerError, PlayerEvent, PlayerStatus,
};
pub use voice_pool::{Admission, VoiceLimits, VoicePool, RECLAIM_GRACE};
