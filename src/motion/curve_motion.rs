use super::queue::MotionQueueEntry;
use super::{LoopBehavior, PlaybackOutcome};
use crate::context::NameId;
use crate::curve::{BezierSolver, CurveTrack};
use crate::events::{AnimationEvent, TickEvents};
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveTarget {
    Model,
    Parameter,
    PartOpacity,
}

/// Reserved channels a Model-target curve can drive. Parameter curves whose
/// ids are registered as eye-blink or lip-sync targets pick these values up
/// during the same update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChannel {
    Opacity,
    EyeBlink,
    LipSync,
    None,
}

#[derive(Debug, Clone)]
pub struct MotionCurve {
    pub target: CurveTarget,
    pub id: NameId,
    pub channel: ModelChannel,
    pub track: CurveTrack,
    /// Per-curve fade override; negative means use the motion-wide value.
    pub fade_in_override: f32,
    pub fade_out_override: f32,
}

#[derive(Debug, Clone)]
pub struct MotionEventData {
    pub fire_time: f32,
    pub value: String,
}

/// A parsed curve motion. Immutable once built; playback state lives on the
/// queue entry.
#[derive(Debug)]
pub struct CurveMotionData {
    pub curves: Vec<MotionCurve>,
    pub events: Vec<MotionEventData>,
    pub duration: f32,
    pub looped: bool,
    pub fps: f32,
    pub fade_in_seconds: f32,
    pub fade_out_seconds: f32,
    pub loop_behavior: LoopBehavior,
    pub bezier_solver: BezierSolver,
    /// Parameter ids whose curve values get multiplied by the eye-blink
    /// channel. Registered by the embedder after load.
    pub eye_blink_ids: Vec<NameId>,
    /// Parameter ids whose curve values get the lip-sync channel added.
    pub lip_sync_ids: Vec<NameId>,
}

impl CurveMotionData {
    /// Length of one playable pass. `V2` looping extends the window by one
    /// frame to make room for the seam correction.
    pub fn playable_window(&self) -> f32 {
        if self.looped && self.loop_behavior == LoopBehavior::V2 && self.fps > 0.0 {
            self.duration + 1.0 / self.fps
        } else {
            self.duration
        }
    }

    fn seam_corrected(&self) -> bool {
        self.looped && self.loop_behavior == LoopBehavior::V2
    }

    fn evaluate_track(&self, track: &CurveTrack, local_time: f32) -> f32 {
        if self.seam_corrected() {
            track.evaluate_looped(local_time, self.playable_window(), self.bezier_solver)
        } else {
            track.evaluate(local_time, self.bezier_solver)
        }
    }
}

/// Advances one queue entry of a curve motion to `now`, writing evaluated
/// parameter values into the model and firing crossed events.
///
/// Write rule for parameter curves: `source + (value - source) * weight`
/// against the model's pre-motion value, so several simultaneous motions and
/// expressions compose instead of overwriting each other.
pub(crate) fn update_entry(
    data: &CurveMotionData,
    model: &mut Model,
    entry: &mut MotionQueueEntry,
    now: f32,
    events: &mut TickEvents,
) -> PlaybackOutcome {
    if !entry.started {
        entry.started = true;
        entry.start_time = now - entry.offset_seconds;
        entry.fade_in_start_time = now;
        entry.last_event_check = 0.0;
        if !data.looped && entry.end_time.is_none() {
            entry.end_time = Some(entry.start_time + data.duration);
        }
    }
    entry.apply_fade_out_request(now);

    let mut outcome = PlaybackOutcome::StillPlaying;
    let mut local_time = (now - entry.start_time).max(0.0);
    let window = data.playable_window();

    if data.looped && window > 0.0 && local_time >= window {
        let wraps = (local_time / window).floor();
        entry.start_time += wraps * window;
        if data.loop_behavior == LoopBehavior::V1 {
            // Legacy restarts ramp the fade in again from the seam.
            entry.fade_in_start_time = entry.start_time;
        }
        local_time -= wraps * window;
        fire_events(data, entry, window, events);
        entry.last_event_check = 0.0;
        outcome = PlaybackOutcome::Looped;
    }

    let fade_weight = entry.fade_weight(data.fade_in_seconds, data.fade_out_seconds, now);

    let mut eye_blink_value = None;
    let mut lip_sync_value = None;

    for curve in &data.curves {
        if curve.target != CurveTarget::Model {
            continue;
        }
        let value = data.evaluate_track(&curve.track, local_time);
        match curve.channel {
            ModelChannel::Opacity => model.set_model_opacity(value),
            ModelChannel::EyeBlink => eye_blink_value = Some(value),
            ModelChannel::LipSync => lip_sync_value = Some(value),
            ModelChannel::None => {}
        }
    }

    for curve in &data.curves {
        if curve.target != CurveTarget::Parameter {
            continue;
        }
        let index = model.parameter_index(curve.id);
        let source = model.parameter_value(index);
        let mut value = data.evaluate_track(&curve.track, local_time);
        if let Some(blink) = eye_blink_value {
            if data.eye_blink_ids.contains(&curve.id) {
                value *= blink;
            }
        }
        if let Some(lip_sync) = lip_sync_value {
            if data.lip_sync_ids.contains(&curve.id) {
                value += lip_sync;
            }
        }
        let weight = curve_fade_weight(data, curve, entry, fade_weight, now);
        model.set_parameter_value(index, source + (value - source) * weight, 1.0);
    }

    for curve in &data.curves {
        if curve.target != CurveTarget::PartOpacity {
            continue;
        }
        let index = model.part_index(curve.id);
        let value = data.evaluate_track(&curve.track, local_time);
        model.set_part_opacity(index, value);
    }

    fire_events(data, entry, local_time, events);
    entry.last_event_check = local_time;

    match entry.end_time {
        Some(end) if now >= end => PlaybackOutcome::Finished,
        _ if !data.looped && local_time >= data.duration => PlaybackOutcome::Finished,
        _ => outcome,
    }
}

/// Per-curve fade override: a non-negative override replaces the motion-wide
/// ramp for that axis; zero disables the ramp entirely.
fn curve_fade_weight(
    data: &CurveMotionData,
    curve: &MotionCurve,
    entry: &MotionQueueEntry,
    motion_fade_weight: f32,
    now: f32,
) -> f32 {
    if curve.fade_in_override < 0.0 && curve.fade_out_override < 0.0 {
        return motion_fade_weight;
    }
    let fade_in = if curve.fade_in_override < 0.0 {
        data.fade_in_seconds
    } else {
        curve.fade_in_override
    };
    let fade_out = if curve.fade_out_override < 0.0 {
        data.fade_out_seconds
    } else {
        curve.fade_out_override
    };
    entry.fade_weight(fade_in, fade_out, now)
}

/// Reports every event in `(last_event_check, up_to]` exactly once, in fire
/// order. The event table is sorted at parse time.
fn fire_events(data: &CurveMotionData, entry: &MotionQueueEntry, up_to: f32, events: &mut TickEvents) {
    for event in &data.events {
        if event.fire_time > entry.last_event_check && event.fire_time <= up_to {
            events.push(AnimationEvent::MotionEvent {
                handle: entry.handle(),
                value: event.value.clone(),
                fire_time: event.fire_time,
            });
        }
    }
}
