use super::expression::{ExpressionData, ExpressionParameterValue};
use super::queue::{MotionHandle, MotionQueueManager, MotionUpdate};
use super::Motion;
use crate::model::Model;
use std::sync::Arc;

/// Queue manager with priority and reservation semantics layered on top,
/// used for body motions. A reservation lets a caller claim the queue for a
/// motion it has not started yet (e.g. one still loading) without a
/// lower-priority idle motion sneaking in first.
pub struct MotionManager {
    queue: MotionQueueManager,
    current_priority: i32,
    reserve_priority: i32,
}

impl MotionManager {
    pub fn new() -> Self {
        Self { queue: MotionQueueManager::new(), current_priority: 0, reserve_priority: 0 }
    }

    pub fn current_priority(&self) -> i32 {
        self.current_priority
    }

    pub fn reserve_priority(&self) -> i32 {
        self.reserve_priority
    }

    /// Claims the queue for an upcoming motion. Succeeds only above both the
    /// currently playing and any previously reserved priority.
    pub fn reserve_motion(&mut self, priority: i32) -> bool {
        if priority <= self.reserve_priority || priority <= self.current_priority {
            return false;
        }
        self.reserve_priority = priority;
        true
    }

    /// Starts `motion` at `priority`, cross-fading whatever is playing. A
    /// matching reservation is consumed.
    pub fn start_motion_priority(&mut self, motion: Motion, priority: i32) -> MotionHandle {
        if priority == self.reserve_priority {
            self.reserve_priority = 0;
        }
        self.current_priority = priority;
        self.queue.start_motion(motion)
    }

    pub fn start_motion(&mut self, motion: Motion) -> MotionHandle {
        self.queue.start_motion(motion)
    }

    pub fn update(&mut self, model: &mut Model, now: f32) -> MotionUpdate {
        let update = self.queue.update(model, now);
        if self.queue.is_finished() {
            self.current_priority = 0;
        }
        update
    }

    pub fn stop_motion(&mut self, handle: MotionHandle) {
        self.queue.stop_motion(handle);
    }

    pub fn stop_all_motions(&mut self) {
        self.queue.stop_all_motions();
        self.current_priority = 0;
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_finished()
    }

    pub fn queue(&self) -> &MotionQueueManager {
        &self.queue
    }
}

impl Default for MotionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the facial-expression queue. Expressions blend through shared
/// per-parameter accumulators in slot order (oldest first), commit after the
/// body motions each tick, and expose their fade weights for diagnostics.
pub struct ExpressionManager {
    queue: MotionQueueManager,
    parameter_values: Vec<ExpressionParameterValue>,
    fade_weights: Vec<(MotionHandle, f32)>,
}

impl ExpressionManager {
    pub fn new() -> Self {
        Self { queue: MotionQueueManager::new(), parameter_values: Vec::new(), fade_weights: Vec::new() }
    }

    /// Enqueues an expression, fading out whichever ones are live. Every
    /// parameter the expression touches gets an accumulator slot.
    pub fn start_expression(&mut self, data: Arc<ExpressionData>) -> MotionHandle {
        for parameter in &data.parameters {
            if !self.parameter_values.iter().any(|value| value.id == parameter.id) {
                self.parameter_values.push(ExpressionParameterValue::new(parameter.id));
            }
        }
        self.queue.start_motion(Motion::Expression(data))
    }

    /// Advances every expression slot and commits the blended result into
    /// the model. Returns whether any parameter was written.
    pub fn update(&mut self, model: &mut Model, now: f32) -> bool {
        if self.queue.is_empty() {
            return false;
        }
        self.fade_weights.clear();

        let mut first_slot = true;
        let mut newest_full_weight = None;
        for entry in self.queue.entries_mut() {
            if entry.is_finished() {
                continue;
            }
            let Motion::Expression(data) = entry.motion().clone() else {
                continue;
            };
            if !entry.started {
                entry.started = true;
                entry.start_time = now;
                entry.fade_in_start_time = now;
            }
            entry.apply_fade_out_request(now);

            let weight = entry.fade_weight(data.fade_in_seconds, data.fade_out_seconds, now);
            self.fade_weights.push((entry.handle(), weight));
            data.accumulate(model, &mut self.parameter_values, first_slot, weight);
            first_slot = false;

            if weight >= 1.0 && entry.end_time().is_none() {
                newest_full_weight = Some(entry.handle());
            }
            if let Some(end) = entry.end_time() {
                if now >= end {
                    entry.finished = true;
                }
            }
        }

        if first_slot {
            // Nothing live this tick.
            return false;
        }

        // A slot at full weight owns every parameter it touches; slots older
        // than it are already fading out, so release them early.
        if let Some(newest) = newest_full_weight {
            let mut before_newest = true;
            for entry in self.queue.entries_mut() {
                if entry.handle() == newest {
                    before_newest = false;
                } else if before_newest {
                    entry.finished = true;
                }
            }
        }

        for value in &self.parameter_values {
            let index = model.parameter_index(value.id);
            let committed = if value.overwritten {
                value.overwrite
            } else {
                (value.overwrite + value.additive) * value.multiply
            };
            model.set_parameter_value(index, committed, 1.0);
        }

        self.queue.remove_finished();
        true
    }

    /// Current fade weight of one slot, for diagnostics overlays.
    pub fn fade_weight(&self, handle: MotionHandle) -> Option<f32> {
        self.fade_weights
            .iter()
            .find(|(entry_handle, _)| *entry_handle == handle)
            .map(|(_, weight)| *weight)
    }

    pub fn stop_expression(&mut self, handle: MotionHandle) {
        self.queue.stop_motion(handle);
    }

    pub fn stop_all_expressions(&mut self) {
        self.queue.stop_all_motions();
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_finished()
    }

    pub fn queue(&self) -> &MotionQueueManager {
        &self.queue
    }
}

impl Default for ExpressionManager {
    fn default() -> Self {
        Self::new()
    }
}
