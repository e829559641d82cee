use super::queue::MotionQueueEntry;
use super::PlaybackOutcome;
use crate::context::NameId;
use crate::math::lerp;
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpressionBlendType {
    Additive,
    Multiply,
    Overwrite,
}

#[derive(Debug, Clone)]
pub struct ExpressionParameter {
    pub id: NameId,
    pub blend: ExpressionBlendType,
    pub value: f32,
}

/// A parameter overlay layered on top of whatever motion is playing.
/// Expressions have no timeline; they hold their values until replaced and
/// live entirely off their fade ramps.
pub struct ExpressionData {
    pub parameters: Vec<ExpressionParameter>,
    pub fade_in_seconds: f32,
    pub fade_out_seconds: f32,
}

/// Neutral accumulator values: contribute nothing until an expression
/// actually writes.
pub const DEFAULT_ADDITIVE: f32 = 0.0;
pub const DEFAULT_MULTIPLY: f32 = 1.0;

/// Running per-parameter blend state shared by every expression slot in one
/// update pass. Slot 0 initializes it; later slots fold their contribution
/// in with their own fade weight.
#[derive(Debug, Clone)]
pub struct ExpressionParameterValue {
    pub id: NameId,
    pub additive: f32,
    pub multiply: f32,
    pub overwrite: f32,
    /// Set when any slot with Overwrite blend touched this parameter.
    pub overwritten: bool,
}

impl ExpressionParameterValue {
    pub fn new(id: NameId) -> Self {
        Self {
            id,
            additive: DEFAULT_ADDITIVE,
            multiply: DEFAULT_MULTIPLY,
            overwrite: 0.0,
            overwritten: false,
        }
    }
}

impl ExpressionData {
    /// Standalone application path used when an expression plays through a
    /// plain motion queue: each parameter is blended directly by the fade
    /// weight, without cross-slot accumulation.
    pub fn apply_direct(&self, model: &mut Model, weight: f32) {
        for parameter in &self.parameters {
            let index = model.parameter_index(parameter.id);
            match parameter.blend {
                ExpressionBlendType::Additive => {
                    model.add_parameter_value(index, parameter.value, weight);
                }
                ExpressionBlendType::Multiply => {
                    model.multiply_parameter_value(index, parameter.value, weight);
                }
                ExpressionBlendType::Overwrite => {
                    model.set_parameter_value(index, parameter.value, weight);
                }
            }
        }
    }

    /// Accumulator path used by the expression manager. `first_slot` resets
    /// the accumulators; every slot then pulls them toward its own values by
    /// `fade_weight`, so a slot at weight 0 leaves the pass untouched and a
    /// slot at weight 1 fully owns its parameters.
    pub fn accumulate(
        &self,
        model: &mut Model,
        values: &mut [ExpressionParameterValue],
        first_slot: bool,
        fade_weight: f32,
    ) {
        if first_slot {
            for value in values.iter_mut() {
                value.additive = DEFAULT_ADDITIVE;
                value.multiply = DEFAULT_MULTIPLY;
                let index = model.parameter_index(value.id);
                value.overwrite = model.parameter_value(index);
                value.overwritten = false;
            }
        }
        for parameter in &self.parameters {
            let Some(value) = values.iter_mut().find(|value| value.id == parameter.id) else {
                continue;
            };
            match parameter.blend {
                ExpressionBlendType::Additive => {
                    value.additive = lerp(value.additive, parameter.value, fade_weight);
                }
                ExpressionBlendType::Multiply => {
                    value.multiply = lerp(value.multiply, parameter.value, fade_weight);
                }
                ExpressionBlendType::Overwrite => {
                    value.overwrite = lerp(value.overwrite, parameter.value, fade_weight);
                    value.overwritten = true;
                }
            }
        }
    }
}

/// Queue-entry update for a standalone expression: stamp start times, run
/// the fade ramps, apply directly. Finishes once a triggered fade-out runs
/// dry.
pub(crate) fn update_entry(
    data: &ExpressionData,
    model: &mut Model,
    entry: &mut MotionQueueEntry,
    now: f32,
) -> PlaybackOutcome {
    if !entry.started {
        entry.started = true;
        entry.start_time = now;
        entry.fade_in_start_time = now;
    }
    entry.apply_fade_out_request(now);

    let weight = entry.fade_weight(data.fade_in_seconds, data.fade_out_seconds, now);
    data.apply_direct(model, weight);

    match entry.end_time {
        Some(end) if now >= end => PlaybackOutcome::Finished,
        _ => PlaybackOutcome::StillPlaying,
    }
}
