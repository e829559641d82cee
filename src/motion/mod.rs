pub mod curve_motion;
pub mod expression;
pub mod manager;
pub mod queue;

pub use curve_motion::{CurveMotionData, CurveTarget, ModelChannel, MotionCurve, MotionEventData};
pub use expression::{ExpressionBlendType, ExpressionData, ExpressionParameter};
pub use manager::{ExpressionManager, MotionManager};
pub use queue::{MotionHandle, MotionQueueEntry, MotionQueueManager, MotionUpdate};

use serde::Deserialize;
use std::sync::Arc;

/// Loop restart policy. Content authored against either behavior must play
/// back unchanged, so both are kept selectable per motion.
///
/// `V1` is the legacy policy: the playable window is exactly the authored
/// duration, the seam is not corrected, and fade-in re-arms on every
/// restart. `V2` extends the window by one frame (1/fps); the extra frame
/// carries the seam correction back to the first keyframe value, and start
/// times rebase without re-arming fades. `V2` is the default for new
/// content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopBehavior {
    V1,
    V2,
}

/// What one update did to a playback entry. Returned instead of flag-plus-
/// callback so callers observe explicit transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    StillPlaying,
    Looped,
    Finished,
}

/// One playable animation unit. A tagged variant rather than a class
/// hierarchy: the queue machinery stays agnostic of which kind it advances.
#[derive(Clone)]
pub enum Motion {
    Curve(Arc<CurveMotionData>),
    Expression(Arc<ExpressionData>),
}

impl Motion {
    pub fn fade_in_seconds(&self) -> f32 {
        match self {
            Motion::Curve(data) => data.fade_in_seconds,
            Motion::Expression(data) => data.fade_in_seconds,
        }
    }

    pub fn fade_out_seconds(&self) -> f32 {
        match self {
            Motion::Curve(data) => data.fade_out_seconds,
            Motion::Expression(data) => data.fade_out_seconds,
        }
    }

    /// Natural playback length. `None` means the unit plays until stopped
    /// (looping motions and expressions).
    pub fn duration(&self) -> Option<f32> {
        match self {
            Motion::Curve(data) => {
                if data.looped {
                    None
                } else {
                    Some(data.duration)
                }
            }
            Motion::Expression(_) => None,
        }
    }
}
