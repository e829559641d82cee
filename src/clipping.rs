use crate::config::MaskConfig;
use crate::math::Rect;
use crate::model::{DynamicFlags, Model};
use glam::{Mat4, Vec3};
use smallvec::SmallVec;

/// Color channels available per mask page.
pub const MASK_CHANNEL_COUNT: usize = 4;
/// Most layout cells one channel subdivides into before spilling.
pub const CELLS_PER_CHANNEL: usize = 9;

/// One group of drawables that share an identical mask set, plus the layout
/// slot and transforms assigned to it this frame. Created once per model
/// load; the rect and matrices are refreshed every frame the group is in
/// use.
#[derive(Debug, Clone)]
pub struct ClippingContext {
    /// Drawables whose union silhouette forms the mask. Sorted and deduped;
    /// two drawables listing the same set in different orders share a
    /// context.
    pub mask_drawables: SmallVec<[usize; 4]>,
    /// Drawables clipped by this context.
    pub clipped_drawables: Vec<usize>,
    /// Union of the clipped drawables' current vertex bounds.
    pub clipped_draw_rect: Rect,
    pub page_index: u32,
    /// 0..=3 selecting R/G/B/A within the page.
    pub layout_channel: u32,
    /// Sub-rectangle of the unit square this context renders into.
    pub layout_bounds: Rect,
    /// Model space → the context's cell, in mask-page clip space.
    pub matrix_for_mask: Mat4,
    /// Model space → the context's cell, in mask-texture UV space, used when
    /// sampling the mask while drawing the clipped drawable.
    pub matrix_for_draw: Mat4,
    /// At least one clipped drawable wants to render this frame.
    pub in_use: bool,
    /// Over the context cap; renders unclipped this frame.
    pub degraded: bool,
}

impl ClippingContext {
    fn new(mask_drawables: SmallVec<[usize; 4]>) -> Self {
        Self {
            mask_drawables,
            clipped_drawables: Vec::new(),
            clipped_draw_rect: Rect::default(),
            page_index: 0,
            layout_channel: 0,
            layout_bounds: Rect::new(0.0, 0.0, 1.0, 1.0),
            matrix_for_mask: Mat4::IDENTITY,
            matrix_for_draw: Mat4::IDENTITY,
            in_use: false,
            degraded: false,
        }
    }

    /// One-hot R/G/B/A selector for the assigned channel.
    pub fn channel_flag(&self) -> [f32; 4] {
        let mut flag = [0.0; 4];
        flag[(self.layout_channel as usize).min(MASK_CHANNEL_COUNT - 1)] = 1.0;
        flag
    }
}

/// Groups masked drawables into clipping contexts and assigns each in-use
/// context a (page, channel, cell) slot plus the transforms into it.
pub struct ClippingMaskManager {
    contexts: Vec<ClippingContext>,
    /// Drawable index → owning context, for the draw pass.
    drawable_context: Vec<Option<usize>>,
    config: MaskConfig,
    cap_warned: bool,
}

impl ClippingMaskManager {
    /// Partitions the model's drawables by mask set. Drawables without a
    /// mask list stay unclipped and never touch the manager again.
    pub fn new(model: &Model, config: MaskConfig) -> Self {
        let mut contexts: Vec<ClippingContext> = Vec::new();
        let mut drawable_context = vec![None; model.drawable_count()];

        for (drawable_index, drawable) in model.drawables().iter().enumerate() {
            if drawable.masks.is_empty() {
                continue;
            }
            let mut key: SmallVec<[usize; 4]> = drawable.masks.clone();
            key.sort_unstable();
            key.dedup();

            let context_index = match contexts.iter().position(|context| context.mask_drawables == key)
            {
                Some(index) => index,
                None => {
                    contexts.push(ClippingContext::new(key));
                    contexts.len() - 1
                }
            };
            contexts[context_index].clipped_drawables.push(drawable_index);
            drawable_context[drawable_index] = Some(context_index);
        }

        Self { contexts, drawable_context, config, cap_warned: false }
    }

    pub fn contexts(&self) -> &[ClippingContext] {
        &self.contexts
    }

    pub fn context_for_drawable(&self, drawable_index: usize) -> Option<&ClippingContext> {
        let context_index = *self.drawable_context.get(drawable_index)?;
        context_index.map(|index| &self.contexts[index])
    }

    pub fn page_count(&self) -> u32 {
        self.config.page_count.max(1)
    }

    /// Refreshes rects, slot assignments, and matrices for every context in
    /// use this frame. Returns whether any mask needs generating. Assignment
    /// order is the stable context creation order, so unchanged inputs
    /// reproduce the identical layout.
    pub fn setup_layout(&mut self, model: &Model) -> bool {
        let mut any_in_use = false;
        for context in &mut self.contexts {
            context.in_use = context.clipped_drawables.iter().any(|&index| {
                model
                    .drawable(index)
                    .map(|drawable| drawable.dynamic_flags.contains(DynamicFlags::VISIBLE))
                    .unwrap_or(false)
            });
            context.degraded = false;
            any_in_use |= context.in_use;
        }
        if !any_in_use {
            return false;
        }

        for context in &mut self.contexts {
            if !context.in_use {
                continue;
            }
            let mut rect: Option<Rect> = None;
            for &drawable_index in &context.clipped_drawables {
                let Some(drawable) = model.drawable(drawable_index) else {
                    continue;
                };
                let bounds = drawable.vertex_bounds();
                rect = Some(match rect {
                    Some(acc) => acc.union(&bounds),
                    None => bounds,
                });
            }
            context.clipped_draw_rect = rect.unwrap_or_default();
        }

        let in_use: Vec<usize> = (0..self.contexts.len())
            .filter(|&index| self.contexts[index].in_use)
            .collect();

        let capacity = self.page_count() as usize * MASK_CHANNEL_COUNT * CELLS_PER_CHANNEL;
        let cap = self.config.max_contexts.min(capacity);
        let (laid_out, overflow) = if in_use.len() > cap {
            in_use.split_at(cap)
        } else {
            (&in_use[..], &[][..])
        };
        if !overflow.is_empty() {
            if !self.cap_warned {
                log::warn!(
                    "{} clipping contexts exceed the mask capacity of {}; the rest render unclipped",
                    in_use.len(),
                    cap
                );
                self.cap_warned = true;
            }
            for &index in overflow {
                self.contexts[index].degraded = true;
            }
        }

        self.assign_slots(laid_out);

        let margin = self.config.margin;
        for &index in laid_out {
            let context = &mut self.contexts[index];
            let rect = context.clipped_draw_rect.expanded(margin);
            let cell = context.layout_bounds;
            if rect.is_empty() {
                context.matrix_for_mask = Mat4::IDENTITY;
                context.matrix_for_draw = Mat4::IDENTITY;
                continue;
            }
            let scale = Vec3::new(cell.width / rect.width, cell.height / rect.height, 1.0);
            let into_cell = Mat4::from_translation(Vec3::new(cell.x, cell.y, 0.0))
                * Mat4::from_scale(scale)
                * Mat4::from_translation(Vec3::new(-rect.x, -rect.y, 0.0));
            // Mask generation rasterizes in the page's clip space; drawing
            // samples the page as a texture, so it stays in UV space.
            context.matrix_for_mask = Mat4::from_translation(Vec3::new(-1.0, -1.0, 0.0))
                * Mat4::from_scale(Vec3::new(2.0, 2.0, 1.0))
                * into_cell;
            context.matrix_for_draw = into_cell;
        }

        true
    }

    /// Deterministic (page, channel, cell) assignment: contexts fill pages
    /// of 4 channels in creation order, channels inside a page splitting the
    /// page's contexts as evenly as possible, cells subdividing 1 → 2 → 2×2
    /// → 3×3.
    fn assign_slots(&mut self, laid_out: &[usize]) {
        let per_page = MASK_CHANNEL_COUNT * CELLS_PER_CHANNEL;
        for (page_number, page_contexts) in laid_out.chunks(per_page).enumerate() {
            let count = page_contexts.len();
            let base = count / MASK_CHANNEL_COUNT;
            let extra = count % MASK_CHANNEL_COUNT;
            let mut cursor = 0;
            for channel in 0..MASK_CHANNEL_COUNT {
                let channel_count = base + usize::from(channel < extra);
                for cell in 0..channel_count {
                    let context = &mut self.contexts[page_contexts[cursor]];
                    context.page_index = page_number as u32;
                    context.layout_channel = channel as u32;
                    context.layout_bounds = cell_bounds(channel_count, cell);
                    cursor += 1;
                }
            }
        }
    }
}

/// Splits the unit square into `count` equal cells and returns cell `index`.
fn cell_bounds(count: usize, index: usize) -> Rect {
    match count {
        0 | 1 => Rect::new(0.0, 0.0, 1.0, 1.0),
        2 => {
            let x = (index % 2) as f32 * 0.5;
            Rect::new(x, 0.0, 0.5, 1.0)
        }
        3 | 4 => {
            let x = (index % 2) as f32 * 0.5;
            let y = (index / 2) as f32 * 0.5;
            Rect::new(x, y, 0.5, 0.5)
        }
        _ => {
            let third = 1.0 / 3.0;
            let clamped = index.min(CELLS_PER_CHANNEL - 1);
            let x = (clamped % 3) as f32 * third;
            let y = (clamped / 3) as f32 * third;
            Rect::new(x, y, third, third)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_bounds_cover_the_unit_square() {
        for count in 1..=CELLS_PER_CHANNEL {
            let mut area = 0.0;
            for index in 0..count {
                let cell = cell_bounds(count, index);
                assert!(cell.x >= 0.0 && cell.right() <= 1.0 + 1e-6);
                assert!(cell.y >= 0.0 && cell.bottom() <= 1.0 + 1e-6);
                area += cell.width * cell.height;
            }
            assert!(area <= 1.0 + 1e-6, "cells for count {count} overflow the square");
        }
    }

    #[test]
    fn cells_within_a_count_do_not_collide() {
        for count in 1..=CELLS_PER_CHANNEL {
            for a in 0..count {
                for b in (a + 1)..count {
                    assert_ne!(
                        cell_bounds(count, a),
                        cell_bounds(count, b),
                        "cells {a} and {b} collide at count {count}"
                    );
                }
            }
        }
    }
}
