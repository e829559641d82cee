use crate::motion::queue::MotionHandle;
use std::fmt;

/// Everything the animation tick can report back to the embedder. Drained
/// once per update instead of delivered through callbacks, so callers get an
/// inspectable, ordered record of what happened.
#[derive(Debug, Clone)]
pub enum AnimationEvent {
    /// A user-data event authored on a motion timeline was crossed.
    MotionEvent { handle: MotionHandle, value: String, fire_time: f32 },
    MotionFinished { handle: MotionHandle },
    MotionLooped { handle: MotionHandle },
}

impl fmt::Display for AnimationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnimationEvent::MotionEvent { handle, value, fire_time } => {
                write!(f, "MotionEvent handle={} value={} t={:.3}", handle.index(), value, fire_time)
            }
            AnimationEvent::MotionFinished { handle } => {
                write!(f, "MotionFinished handle={}", handle.index())
            }
            AnimationEvent::MotionLooped { handle } => {
                write!(f, "MotionLooped handle={}", handle.index())
            }
        }
    }
}

#[derive(Default)]
pub struct TickEvents {
    events: Vec<AnimationEvent>,
}

impl TickEvents {
    pub fn push(&mut self, event: AnimationEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<AnimationEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
