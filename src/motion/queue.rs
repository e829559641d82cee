use super::{Motion, PlaybackOutcome};
use crate::events::{AnimationEvent, TickEvents};
use crate::math::ease_sine;
use crate::model::Model;

/// Identifies one playback instance within its queue manager. Handles are
/// never reused while the manager lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MotionHandle(u32);

impl MotionHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Mutable per-playback state. Created by `start_motion`, advanced every
/// tick, removed once finished. Timing fields stay unset until the first
/// update stamps them, so a freshly queued entry contributes nothing to the
/// tick that enqueued it.
pub struct MotionQueueEntry {
    handle: MotionHandle,
    motion: Motion,
    pub(crate) started: bool,
    pub(crate) finished: bool,
    pub(crate) start_time: f32,
    pub(crate) fade_in_start_time: f32,
    /// Absolute time at which playback ends. Set on first update for
    /// non-looping motions, or when a fade-out is triggered.
    pub(crate) end_time: Option<f32>,
    /// Fade-out duration requested for this entry, pending until the next
    /// update applies it.
    pub(crate) fade_out_request: Option<f32>,
    pub(crate) fade_out_seconds: Option<f32>,
    /// Motion-local timestamp up to which events have already fired.
    pub(crate) last_event_check: f32,
    pub(crate) weight: f32,
    /// Starts playback this far into the timeline.
    pub(crate) offset_seconds: f32,
}

impl MotionQueueEntry {
    fn new(handle: MotionHandle, motion: Motion) -> Self {
        Self {
            handle,
            motion,
            started: false,
            finished: false,
            start_time: 0.0,
            fade_in_start_time: 0.0,
            end_time: None,
            fade_out_request: None,
            fade_out_seconds: None,
            last_event_check: 0.0,
            weight: 1.0,
            offset_seconds: 0.0,
        }
    }

    pub fn handle(&self) -> MotionHandle {
        self.handle
    }

    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn end_time(&self) -> Option<f32> {
        self.end_time
    }

    pub fn fade_out_seconds(&self) -> Option<f32> {
        self.fade_out_seconds.or(self.fade_out_request)
    }

    pub fn set_weight(&mut self, weight: f32) {
        self.weight = weight.clamp(0.0, 1.0);
    }

    pub fn set_offset_seconds(&mut self, offset: f32) {
        self.offset_seconds = offset.max(0.0);
    }

    /// Requests a fade-out over `seconds`. Applied on the entry's next
    /// update; an already-earlier end time wins.
    pub fn trigger_fade_out(&mut self, seconds: f32) {
        self.fade_out_request = Some(seconds.max(0.0));
    }

    /// Resolves a pending fade-out request into a concrete end time.
    pub(crate) fn apply_fade_out_request(&mut self, now: f32) {
        if let Some(seconds) = self.fade_out_request.take() {
            let requested_end = now + seconds;
            let end = match self.end_time {
                Some(existing) => existing.min(requested_end),
                None => requested_end,
            };
            self.end_time = Some(end);
            self.fade_out_seconds = Some(seconds);
        }
    }

    /// Combined fade weight at `now`: entry weight shaped by the sine fade-in
    /// ramp and, once an end time exists, the sine fade-out ramp.
    pub(crate) fn fade_weight(&self, fade_in_seconds: f32, fade_out_seconds: f32, now: f32) -> f32 {
        let fade_in = if fade_in_seconds <= 0.0 {
            1.0
        } else {
            ease_sine((now - self.fade_in_start_time) / fade_in_seconds)
        };
        // A zero fade-out is a hard cut: full weight until the end time.
        let fade_out = match self.end_time {
            Some(end) if fade_out_seconds > 0.0 => ease_sine((end - now) / fade_out_seconds),
            _ => 1.0,
        };
        self.weight * fade_in * fade_out
    }
}

/// What one queue update produced: whether any parameter changed, plus the
/// tick's drained events in fire order.
#[derive(Default)]
pub struct MotionUpdate {
    pub updated: bool,
    pub events: Vec<AnimationEvent>,
}

/// Owns the list of active playback entries. Entries advance in insertion
/// order; starting a new motion cross-fades everything already playing.
pub struct MotionQueueManager {
    entries: Vec<MotionQueueEntry>,
    next_handle: u32,
    events: TickEvents,
}

impl MotionQueueManager {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_handle: 0, events: TickEvents::default() }
    }

    /// Enqueues `motion`. Every live entry first receives a fade-out request
    /// using its own motion's fade-out time, so several entries may overlap
    /// while the new one fades in.
    pub fn start_motion(&mut self, motion: Motion) -> MotionHandle {
        for entry in &mut self.entries {
            if !entry.finished {
                let seconds = entry.motion.fade_out_seconds();
                entry.trigger_fade_out(seconds);
            }
        }
        let handle = MotionHandle(self.next_handle);
        self.next_handle += 1;
        self.entries.push(MotionQueueEntry::new(handle, motion));
        handle
    }

    /// Advances every entry to `now` and drains fired events. Entries that
    /// finished on a previous update are evicted first, so a finished entry
    /// stays observable for exactly one tick.
    pub fn update(&mut self, model: &mut Model, now: f32) -> MotionUpdate {
        self.remove_finished();
        let mut updated = false;
        for entry in &mut self.entries {
            if entry.finished {
                continue;
            }
            let motion = entry.motion.clone();
            let outcome = match &motion {
                Motion::Curve(data) => {
                    super::curve_motion::update_entry(data, model, entry, now, &mut self.events)
                }
                Motion::Expression(data) => {
                    super::expression::update_entry(data, model, entry, now)
                }
            };
            updated = true;
            match outcome {
                PlaybackOutcome::StillPlaying => {}
                PlaybackOutcome::Looped => {
                    self.events.push(AnimationEvent::MotionLooped { handle: entry.handle });
                }
                PlaybackOutcome::Finished => {
                    self.events.push(AnimationEvent::MotionFinished { handle: entry.handle });
                    entry.finished = true;
                }
            }
        }
        MotionUpdate { updated, events: self.events.drain() }
    }

    pub(crate) fn remove_finished(&mut self) {
        self.entries.retain(|entry| !entry.finished);
    }

    /// Fades out one entry using its own motion's fade-out time.
    pub fn stop_motion(&mut self, handle: MotionHandle) {
        if let Some(entry) = self.entry_mut(handle) {
            let seconds = entry.motion.fade_out_seconds();
            entry.trigger_fade_out(seconds);
        }
    }

    /// Releases every entry immediately, without fading.
    pub fn stop_all_motions(&mut self) {
        self.entries.clear();
    }

    pub fn is_finished(&self) -> bool {
        self.entries.iter().all(|entry| entry.finished)
    }

    pub fn is_finished_handle(&self, handle: MotionHandle) -> bool {
        self.entry(handle).map(|entry| entry.finished).unwrap_or(true)
    }

    pub fn entry(&self, handle: MotionHandle) -> Option<&MotionQueueEntry> {
        self.entries.iter().find(|entry| entry.handle == handle)
    }

    pub fn entry_mut(&mut self, handle: MotionHandle) -> Option<&mut MotionQueueEntry> {
        self.entries.iter_mut().find(|entry| entry.handle == handle)
    }

    pub fn entries(&self) -> &[MotionQueueEntry] {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [MotionQueueEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MotionQueueManager {
    fn default() -> Self {
        Self::new()
    }
}
