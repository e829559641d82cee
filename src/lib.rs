pub mod assets;
pub mod clipping;
pub mod config;
pub mod context;
pub mod curve;
pub mod events;
pub mod math;
pub mod model;
pub mod motion;
pub mod physics;
pub mod puppet;
pub mod renderer;

pub use config::EngineConfig;
pub use context::{EngineContext, NameId};
pub use events::AnimationEvent;
pub use model::Model;
pub use motion::{LoopBehavior, Motion, PlaybackOutcome};
pub use puppet::Puppet;
