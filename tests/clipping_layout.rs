use glam::Vec2;
use smallvec::SmallVec;
use waxwing_engine::clipping::{ClippingContext, ClippingMaskManager};
use waxwing_engine::config::MaskConfig;
use waxwing_engine::context::EngineContext;
use waxwing_engine::model::{BlendMode, Drawable, DynamicFlags, Model, PartIndex};
use waxwing_engine::renderer::{GpuDriver, Renderer};

fn quad(center: Vec2, half: f32) -> Vec<Vec2> {
    vec![
        center + Vec2::new(-half, -half),
        center + Vec2::new(half, -half),
        center + Vec2::new(half, half),
        center + Vec2::new(-half, half),
    ]
}

fn add_drawable(
    context: &mut EngineContext,
    model: &mut Model,
    name: &str,
    center: Vec2,
    masks: &[usize],
    render_order: i32,
) -> usize {
    let id = context.ids_mut().intern(name);
    model.add_drawable(Drawable {
        id,
        vertex_positions: quad(center, 1.0),
        vertex_uvs: quad(Vec2::new(0.5, 0.5), 0.5),
        indices: vec![0, 1, 2, 0, 2, 3],
        opacity: 1.0,
        blend_mode: BlendMode::Normal,
        is_culling: false,
        masks: SmallVec::from_slice(masks),
        render_order,
        parent_part: PartIndex::NOT_FOUND,
        dynamic_flags: DynamicFlags::VISIBLE,
    })
}

/// `mask_count` mask drawables, then `clipped` clipped drawables with the
/// given mask sets.
fn masked_model(context: &mut EngineContext, clipped: &[&[usize]]) -> Model {
    let mut model = Model::new();
    let mask_count = clipped.iter().flat_map(|set| set.iter()).max().map(|&m| m + 1).unwrap_or(0);
    for mask in 0..mask_count {
        add_drawable(context, &mut model, &format!("Mask{mask}"), Vec2::new(mask as f32 * 3.0, 0.0), &[], 0);
    }
    for (index, masks) in clipped.iter().enumerate() {
        add_drawable(
            context,
            &mut model,
            &format!("Clipped{index}"),
            Vec2::new(index as f32 * 2.0, 4.0),
            masks,
            (index + 1) as i32,
        );
    }
    model
}

fn slot(context: &ClippingContext) -> (u32, u32, String) {
    (context.page_index, context.layout_channel, format!("{:?}", context.layout_bounds))
}

#[test]
fn five_contexts_get_unique_slots_deterministically() {
    let mut context = EngineContext::default();
    let model = masked_model(&mut context, &[&[0], &[1], &[2], &[3], &[4]]);
    let mut masks = ClippingMaskManager::new(&model, MaskConfig::default());
    assert_eq!(masks.contexts().len(), 5);

    assert!(masks.setup_layout(&model), "masks are in use this frame");
    let first: Vec<_> = masks.contexts().iter().map(slot).collect();
    let mut unique = first.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), 5, "every context needs a distinct (page, channel, cell) slot");

    // Re-running the same frame's layout must reproduce the assignment.
    assert!(masks.setup_layout(&model));
    let second: Vec<_> = masks.contexts().iter().map(slot).collect();
    assert_eq!(first, second, "layout must be deterministic for unchanged inputs");
}

#[test]
fn order_independent_mask_sets_share_a_context() {
    let mut context = EngineContext::default();
    let model = masked_model(&mut context, &[&[0, 1], &[1, 0], &[1, 1, 0]]);
    let masks = ClippingMaskManager::new(&model, MaskConfig::default());
    assert_eq!(masks.contexts().len(), 1, "mask-set equality ignores order and duplicates");
    assert_eq!(masks.contexts()[0].clipped_drawables.len(), 3);
}

#[test]
fn unmasked_drawables_stay_out_of_the_manager() {
    let mut context = EngineContext::default();
    let model = masked_model(&mut context, &[&[0]]);
    let masks = ClippingMaskManager::new(&model, MaskConfig::default());
    // Drawable 0 is the mask itself and carries no mask list.
    assert!(masks.context_for_drawable(0).is_none());
    assert!(masks.context_for_drawable(1).is_some());
}

#[test]
fn clipped_rect_unions_every_member() {
    let mut context = EngineContext::default();
    let model = masked_model(&mut context, &[&[0], &[0]]);
    let mut masks = ClippingMaskManager::new(&model, MaskConfig::default());
    assert!(masks.setup_layout(&model));
    let rect = masks.contexts()[0].clipped_draw_rect;
    // Clipped quads sit at x = 0 and x = 2 with half-extent 1.
    assert!(rect.x <= -1.0 + 1e-5);
    assert!(rect.right() >= 3.0 - 1e-5);
}

#[test]
fn contexts_spill_onto_additional_pages() {
    let mut context = EngineContext::default();
    let sets: Vec<Vec<usize>> = (0..40).map(|mask| vec![mask]).collect();
    let set_refs: Vec<&[usize]> = sets.iter().map(|set| set.as_slice()).collect();
    let model = masked_model(&mut context, &set_refs);

    let config = MaskConfig { page_count: 2, max_contexts: 72, ..MaskConfig::default() };
    let mut masks = ClippingMaskManager::new(&model, config);
    assert!(masks.setup_layout(&model));

    let max_page = masks.contexts().iter().map(|c| c.page_index).max().unwrap();
    assert_eq!(max_page, 1, "40 contexts must spill past the 36-slot first page");
    assert!(masks.contexts().iter().all(|c| !c.degraded));
}

#[test]
fn contexts_past_the_cap_degrade_to_unclipped() {
    let mut context = EngineContext::default();
    let model = masked_model(&mut context, &[&[0], &[1], &[2], &[3], &[4]]);
    let config = MaskConfig { max_contexts: 3, ..MaskConfig::default() };
    let mut masks = ClippingMaskManager::new(&model, config);
    assert!(masks.setup_layout(&model));

    let degraded: Vec<bool> = masks.contexts().iter().map(|c| c.degraded).collect();
    assert_eq!(degraded, vec![false, false, false, true, true], "the lowest-priority contexts degrade");
}

#[derive(Default)]
struct RecordingDriver {
    ops: Vec<String>,
    generating: bool,
}

impl GpuDriver for RecordingDriver {
    fn bind_mask_page(&mut self, page: u32) {
        self.generating = true;
        self.ops.push(format!("bind:{page}"));
    }

    fn restore_framebuffer(&mut self) {
        self.generating = false;
        self.ops.push("restore".to_string());
    }

    fn is_generating_mask(&self) -> bool {
        self.generating
    }

    fn set_clipping_for_mask(&mut self, context: Option<&ClippingContext>) {
        self.ops.push(format!("mask_ctx:{}", context.is_some()));
    }

    fn set_clipping_for_draw(&mut self, context: Option<&ClippingContext>) {
        self.ops.push(format!("draw_ctx:{}", context.is_some()));
    }

    fn draw_mesh(&mut self, _model: &Model, drawable_index: usize) {
        let phase = if self.generating { "mask" } else { "draw" };
        self.ops.push(format!("{phase}:{drawable_index}"));
    }
}

#[test]
fn batched_mode_generates_masks_in_one_up_front_pass() {
    let mut context = EngineContext::default();
    let model = masked_model(&mut context, &[&[0], &[0]]);
    let mut masks = ClippingMaskManager::new(&model, MaskConfig::default());
    let mut renderer = Renderer::new(false);
    let mut driver = RecordingDriver::default();

    renderer.draw_model(&model, &mut masks, &mut driver);

    let binds = driver.ops.iter().filter(|op| op.starts_with("bind:")).count();
    assert_eq!(binds, 1, "one shared context means one page bind");

    let restore_at = driver.ops.iter().position(|op| op == "restore").expect("mask pass restores");
    let first_draw = driver
        .ops
        .iter()
        .position(|op| op.starts_with("draw:"))
        .expect("draw pass draws something");
    assert!(restore_at < first_draw, "all masks generate before the draw pass starts");
}

#[test]
fn high_precision_mode_regenerates_per_clipped_drawable() {
    let mut context = EngineContext::default();
    let model = masked_model(&mut context, &[&[0], &[0]]);
    let mut masks = ClippingMaskManager::new(&model, MaskConfig::default());
    let mut renderer = Renderer::new(true);
    let mut driver = RecordingDriver::default();

    renderer.draw_model(&model, &mut masks, &mut driver);

    let binds = driver.ops.iter().filter(|op| op.starts_with("bind:")).count();
    assert_eq!(binds, 2, "each clipped drawable regenerates its context's mask");
}

#[test]
fn draw_pass_follows_render_order() {
    let mut context = EngineContext::default();
    let mut model = Model::new();
    add_drawable(&mut context, &mut model, "Back", Vec2::ZERO, &[], 5);
    add_drawable(&mut context, &mut model, "Front", Vec2::ZERO, &[], 1);
    let mut masks = ClippingMaskManager::new(&model, MaskConfig::default());
    let mut renderer = Renderer::new(false);
    let mut driver = RecordingDriver::default();

    renderer.draw_model(&model, &mut masks, &mut driver);

    let draws: Vec<&String> = driver.ops.iter().filter(|op| op.starts_with("draw:")).collect();
    assert_eq!(draws, ["draw:1", "draw:0"], "lower render order draws first");
}
