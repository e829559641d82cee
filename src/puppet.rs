use crate::clipping::ClippingMaskManager;
use crate::context::EngineContext;
use crate::model::Model;
use crate::motion::{ExpressionData, ExpressionManager, Motion, MotionHandle, MotionManager, MotionUpdate};
use crate::physics::{PhysicsRig, PhysicsSimulator};
use std::sync::Arc;

/// One animated character instance: the model, its motion and expression
/// queues, optional secondary physics, and the clipping-mask layout.
///
/// `update` runs the frame pipeline in a fixed order (restore the saved
/// parameter base, body motions, save, expressions layered on top, physics)
/// so every writer composes against a stable source.
pub struct Puppet {
    model: Model,
    motions: MotionManager,
    expressions: ExpressionManager,
    physics: Option<PhysicsSimulator>,
    masks: ClippingMaskManager,
    time: f32,
}

impl Puppet {
    pub fn new(model: Model, context: &EngineContext) -> Self {
        let masks = ClippingMaskManager::new(&model, context.config.masks.clone());
        Self {
            model,
            motions: MotionManager::new(),
            expressions: ExpressionManager::new(),
            physics: None,
            masks,
            time: 0.0,
        }
    }

    pub fn attach_physics(&mut self, rig: PhysicsRig, context: &EngineContext) {
        self.physics = Some(PhysicsSimulator::new(rig, context.config.physics.clone()));
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    pub fn motions(&self) -> &MotionManager {
        &self.motions
    }

    pub fn motions_mut(&mut self) -> &mut MotionManager {
        &mut self.motions
    }

    pub fn expressions(&self) -> &ExpressionManager {
        &self.expressions
    }

    pub fn expressions_mut(&mut self) -> &mut ExpressionManager {
        &mut self.expressions
    }

    pub fn physics(&self) -> Option<&PhysicsSimulator> {
        self.physics.as_ref()
    }

    pub fn masks(&self) -> &ClippingMaskManager {
        &self.masks
    }

    pub fn masks_mut(&mut self) -> &mut ClippingMaskManager {
        &mut self.masks
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn start_motion(&mut self, motion: Motion, priority: i32) -> MotionHandle {
        self.motions.start_motion_priority(motion, priority)
    }

    pub fn reserve_motion(&mut self, priority: i32) -> bool {
        self.motions.reserve_motion(priority)
    }

    pub fn start_expression(&mut self, expression: Arc<ExpressionData>) -> MotionHandle {
        self.expressions.start_expression(expression)
    }

    pub fn stop_all(&mut self) {
        self.motions.stop_all_motions();
        self.expressions.stop_all_expressions();
    }

    /// Advances the puppet by `dt` seconds and returns the tick's drained
    /// events. Mask layout itself is refreshed by the renderer at draw time;
    /// everything here is parameter work.
    pub fn update(&mut self, dt: f32) -> MotionUpdate {
        self.time += dt.max(0.0);

        if self.model.has_saved_parameters() {
            self.model.load_saved_parameters();
        }
        let update = self.motions.update(&mut self.model, self.time);
        self.model.save_parameters();

        self.expressions.update(&mut self.model, self.time);

        if let Some(physics) = &mut self.physics {
            physics.update(&mut self.model, dt);
        }

        self.model.reset_dynamic_flags();
        update
    }
}
