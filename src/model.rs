use crate::context::NameId;
use crate::math::{lerp, wrap_into_range, Rect};
use bitflags::bitflags;
use glam::Vec2;
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};

/// Index into the model's parameter array. `NOT_FOUND` is a sentinel slot:
/// reads return the default value and writes are absorbed, so a motion or
/// physics output targeting an id absent from the model degrades to a no-op
/// instead of failing the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterIndex(usize);

impl ParameterIndex {
    pub const NOT_FOUND: ParameterIndex = ParameterIndex(usize::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::NOT_FOUND
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartIndex(usize);

impl PartIndex {
    pub const NOT_FOUND: PartIndex = PartIndex(usize::MAX);

    pub fn is_valid(self) -> bool {
        self != Self::NOT_FOUND
    }
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub id: NameId,
    pub minimum: f32,
    pub maximum: f32,
    pub default_value: f32,
    pub value: f32,
    /// Wrap the value modulo [minimum, maximum) instead of clamping.
    pub repeat: bool,
}

#[derive(Debug, Clone)]
pub struct Part {
    pub id: NameId,
    pub opacity: f32,
    pub drawables: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    Normal,
    Additive,
    Multiplicative,
}

impl BlendMode {
    pub fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "additive" | "add" => Self::Additive,
            "multiplicative" | "multiply" => Self::Multiplicative,
            _ => Self::Normal,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Additive => "additive",
            Self::Multiplicative => "multiplicative",
        }
    }
}

bitflags! {
    /// Per-frame hints about what changed on a drawable. Consumers may use
    /// them to skip recomputation but must stay correct without them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DynamicFlags: u8 {
        const VISIBLE                  = 1 << 0;
        const VISIBILITY_CHANGED       = 1 << 1;
        const OPACITY_CHANGED          = 1 << 2;
        const RENDER_ORDER_CHANGED     = 1 << 3;
        const VERTEX_POSITIONS_CHANGED = 1 << 4;
        const BLEND_COLOR_CHANGED      = 1 << 5;
    }
}

/// One renderable mesh region. Vertex positions are produced by the external
/// deform kernel and pushed in through [`Model::write_drawable_vertices`];
/// this crate only reads them.
#[derive(Debug, Clone)]
pub struct Drawable {
    pub id: NameId,
    pub vertex_positions: Vec<Vec2>,
    pub vertex_uvs: Vec<Vec2>,
    pub indices: Vec<u16>,
    pub opacity: f32,
    pub blend_mode: BlendMode,
    pub is_culling: bool,
    /// Indices of the drawables whose union silhouette masks this one.
    /// Empty means unclipped.
    pub masks: SmallVec<[usize; 4]>,
    pub render_order: i32,
    pub parent_part: PartIndex,
    pub dynamic_flags: DynamicFlags,
}

impl Drawable {
    /// Bounding rect of the current (deformed) vertex positions.
    pub fn vertex_bounds(&self) -> Rect {
        let mut positions = self.vertex_positions.iter();
        let Some(first) = positions.next() else {
            return Rect::default();
        };
        let mut min = *first;
        let mut max = *first;
        for position in positions {
            min = min.min(*position);
            max = max.max(*position);
        }
        Rect::from_min_max(min, max)
    }
}

/// The shared mutable state every phase of the tick writes into: parameter
/// values and part opacities, plus the read-only drawable surface. All
/// motion, expression, and physics code goes through the narrow accessor
/// contract here and never touches storage layout.
pub struct Model {
    parameters: Vec<Parameter>,
    parts: Vec<Part>,
    drawables: Vec<Drawable>,
    parameter_lookup: HashMap<NameId, usize>,
    part_lookup: HashMap<NameId, usize>,
    saved_values: Vec<f32>,
    missing_logged: HashSet<NameId>,
    model_opacity: f32,
}

impl Model {
    pub fn new() -> Self {
        Self {
            parameters: Vec::new(),
            parts: Vec::new(),
            drawables: Vec::new(),
            parameter_lookup: HashMap::new(),
            part_lookup: HashMap::new(),
            saved_values: Vec::new(),
            missing_logged: HashSet::new(),
            model_opacity: 1.0,
        }
    }

    pub fn add_parameter(&mut self, id: NameId, minimum: f32, maximum: f32, default_value: f32) -> ParameterIndex {
        self.add_parameter_spec(id, minimum, maximum, default_value, false)
    }

    pub fn add_parameter_spec(
        &mut self,
        id: NameId,
        minimum: f32,
        maximum: f32,
        default_value: f32,
        repeat: bool,
    ) -> ParameterIndex {
        let index = self.parameters.len();
        self.parameters.push(Parameter {
            id,
            minimum,
            maximum,
            default_value,
            value: default_value,
            repeat,
        });
        self.parameter_lookup.insert(id, index);
        ParameterIndex(index)
    }

    pub fn add_part(&mut self, id: NameId, opacity: f32) -> PartIndex {
        let index = self.parts.len();
        self.parts.push(Part { id, opacity, drawables: Vec::new() });
        self.part_lookup.insert(id, index);
        PartIndex(index)
    }

    pub fn add_drawable(&mut self, drawable: Drawable) -> usize {
        let index = self.drawables.len();
        if drawable.parent_part.is_valid() {
            if let Some(part) = self.parts.get_mut(drawable.parent_part.0) {
                part.drawables.push(index);
            }
        }
        self.drawables.push(drawable);
        index
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn parameter_index(&mut self, id: NameId) -> ParameterIndex {
        match self.parameter_lookup.get(&id) {
            Some(&index) => ParameterIndex(index),
            None => {
                if self.missing_logged.insert(id) {
                    log::warn!("parameter id {:?} is not present in this model; writes will be dropped", id);
                }
                ParameterIndex::NOT_FOUND
            }
        }
    }

    pub fn parameter(&self, index: ParameterIndex) -> Option<&Parameter> {
        self.parameters.get(index.0)
    }

    pub fn parameter_value(&self, index: ParameterIndex) -> f32 {
        self.parameters.get(index.0).map(|p| p.value).unwrap_or(0.0)
    }

    pub fn parameter_minimum(&self, index: ParameterIndex) -> f32 {
        self.parameters.get(index.0).map(|p| p.minimum).unwrap_or(0.0)
    }

    pub fn parameter_maximum(&self, index: ParameterIndex) -> f32 {
        self.parameters.get(index.0).map(|p| p.maximum).unwrap_or(0.0)
    }

    pub fn parameter_default(&self, index: ParameterIndex) -> f32 {
        self.parameters.get(index.0).map(|p| p.default_value).unwrap_or(0.0)
    }

    pub fn is_repeat(&self, index: ParameterIndex) -> bool {
        self.parameters.get(index.0).map(|p| p.repeat).unwrap_or(false)
    }

    /// Blends `value` over the current value by `weight`, then clamps to the
    /// parameter range, or wraps instead when the parameter repeats. Writes
    /// to the sentinel index are absorbed.
    pub fn set_parameter_value(&mut self, index: ParameterIndex, value: f32, weight: f32) {
        let Some(parameter) = self.parameters.get_mut(index.0) else {
            return;
        };
        if !value.is_finite() {
            return;
        }
        let blended = if weight >= 1.0 { value } else { lerp(parameter.value, value, weight) };
        parameter.value = if parameter.repeat {
            wrap_into_range(blended, parameter.minimum, parameter.maximum)
        } else {
            blended.clamp(parameter.minimum, parameter.maximum)
        };
    }

    pub fn add_parameter_value(&mut self, index: ParameterIndex, value: f32, weight: f32) {
        let current = self.parameter_value(index);
        self.set_parameter_value(index, current + value * weight, 1.0);
    }

    pub fn multiply_parameter_value(&mut self, index: ParameterIndex, value: f32, weight: f32) {
        let current = self.parameter_value(index);
        self.set_parameter_value(index, current * (1.0 + (value - 1.0) * weight), 1.0);
    }

    pub fn reset_parameters_to_default(&mut self) {
        for parameter in &mut self.parameters {
            parameter.value = parameter.default_value;
        }
    }

    /// Snapshots the current parameter values. The motion pass runs against
    /// this saved base so that repeated evaluation at the same timestamp is
    /// idempotent and later phases compose against a stable source.
    pub fn save_parameters(&mut self) {
        self.saved_values.clear();
        self.saved_values.extend(self.parameters.iter().map(|p| p.value));
    }

    pub fn load_saved_parameters(&mut self) {
        for (parameter, saved) in self.parameters.iter_mut().zip(self.saved_values.iter()) {
            parameter.value = *saved;
        }
    }

    pub fn has_saved_parameters(&self) -> bool {
        !self.saved_values.is_empty()
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    pub fn part_index(&mut self, id: NameId) -> PartIndex {
        match self.part_lookup.get(&id) {
            Some(&index) => PartIndex(index),
            None => {
                if self.missing_logged.insert(id) {
                    log::warn!("part id {:?} is not present in this model; writes will be dropped", id);
                }
                PartIndex::NOT_FOUND
            }
        }
    }

    pub fn part_opacity(&self, index: PartIndex) -> f32 {
        self.parts.get(index.0).map(|p| p.opacity).unwrap_or(1.0)
    }

    pub fn set_part_opacity(&mut self, index: PartIndex, opacity: f32) {
        if let Some(part) = self.parts.get_mut(index.0) {
            part.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    /// Motion-driven whole-model opacity channel.
    pub fn model_opacity(&self) -> f32 {
        self.model_opacity
    }

    pub fn set_model_opacity(&mut self, opacity: f32) {
        self.model_opacity = opacity.clamp(0.0, 1.0);
    }

    pub fn drawable_count(&self) -> usize {
        self.drawables.len()
    }

    pub fn drawable(&self, index: usize) -> Option<&Drawable> {
        self.drawables.get(index)
    }

    pub fn drawables(&self) -> &[Drawable] {
        &self.drawables
    }

    /// Drawable opacity with its parent part and the model channel folded in.
    pub fn drawable_effective_opacity(&self, index: usize) -> f32 {
        let Some(drawable) = self.drawables.get(index) else {
            return 0.0;
        };
        let part = if drawable.parent_part.is_valid() {
            self.part_opacity(drawable.parent_part)
        } else {
            1.0
        };
        drawable.opacity * part * self.model_opacity
    }

    /// Called by the embedding deform kernel after it re-evaluates the mesh.
    /// Marks the vertex-changed hint; consumers may not rely on it.
    pub fn write_drawable_vertices(&mut self, index: usize, positions: &[Vec2]) {
        if let Some(drawable) = self.drawables.get_mut(index) {
            drawable.vertex_positions.clear();
            drawable.vertex_positions.extend_from_slice(positions);
            drawable.dynamic_flags |= DynamicFlags::VERTEX_POSITIONS_CHANGED;
        }
    }

    pub fn set_drawable_opacity(&mut self, index: usize, opacity: f32) {
        if let Some(drawable) = self.drawables.get_mut(index) {
            drawable.opacity = opacity.clamp(0.0, 1.0);
            drawable.dynamic_flags |= DynamicFlags::OPACITY_CHANGED;
        }
    }

    pub fn set_drawable_render_order(&mut self, index: usize, order: i32) {
        if let Some(drawable) = self.drawables.get_mut(index) {
            drawable.render_order = order;
            drawable.dynamic_flags |= DynamicFlags::RENDER_ORDER_CHANGED;
        }
    }

    /// Clears the per-frame change hints. Run once at the end of a tick.
    pub fn reset_dynamic_flags(&mut self) {
        for drawable in &mut self.drawables {
            drawable.dynamic_flags &= DynamicFlags::VISIBLE;
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
