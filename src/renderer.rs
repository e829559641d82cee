use crate::clipping::{ClippingContext, ClippingMaskManager};
use crate::model::{DynamicFlags, Model};

/// Uniform block handed to the driver for one masked draw. Mask pages are
/// cleared to 1.0, meaning fully hidden, so the mask shader carves
/// visibility out rather than painting it in.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaskUniform {
    pub matrix: [[f32; 4]; 4],
    pub channel_flag: [f32; 4],
}

impl MaskUniform {
    /// Uniforms for rasterizing the context's mask drawables into its cell.
    pub fn for_mask(context: &ClippingContext) -> Self {
        Self {
            matrix: context.matrix_for_mask.to_cols_array_2d(),
            channel_flag: context.channel_flag(),
        }
    }

    /// Uniforms for sampling the mask while drawing a clipped drawable.
    pub fn for_draw(context: &ClippingContext) -> Self {
        Self {
            matrix: context.matrix_for_draw.to_cols_array_2d(),
            channel_flag: context.channel_flag(),
        }
    }
}

/// Everything this core asks of the GPU layer. The engine never issues raw
/// GPU calls; it sequences these and hands over matrices, channel flags, and
/// drawable indices.
pub trait GpuDriver {
    /// Binds mask page `page` as the render target and clears every channel
    /// to 1.0 (fully hidden).
    fn bind_mask_page(&mut self, page: u32);
    /// Restores the main framebuffer and viewport.
    fn restore_framebuffer(&mut self);
    /// True between `bind_mask_page` and `restore_framebuffer`.
    fn is_generating_mask(&self) -> bool;
    /// Selects the context whose mask is being rasterized, or `None` when
    /// mask generation ends.
    fn set_clipping_for_mask(&mut self, context: Option<&ClippingContext>);
    /// Selects the context whose mask the next draws sample, or `None` for
    /// unclipped drawing.
    fn set_clipping_for_draw(&mut self, context: Option<&ClippingContext>);
    fn draw_mesh(&mut self, model: &Model, drawable_index: usize);
}

/// Frame orchestration over a [`GpuDriver`]: refresh the mask layout, then
/// either batch-generate every mask up front (pass 1) and draw the model
/// (pass 2), or regenerate each context's mask immediately before its
/// drawables in high-precision mode.
pub struct Renderer {
    high_precision: bool,
    draw_order: Vec<usize>,
}

impl Renderer {
    pub fn new(high_precision: bool) -> Self {
        Self { high_precision, draw_order: Vec::new() }
    }

    pub fn high_precision(&self) -> bool {
        self.high_precision
    }

    pub fn set_high_precision(&mut self, high_precision: bool) {
        self.high_precision = high_precision;
    }

    pub fn draw_model(
        &mut self,
        model: &Model,
        masks: &mut ClippingMaskManager,
        driver: &mut impl GpuDriver,
    ) {
        let masks_in_use = masks.setup_layout(model);

        if masks_in_use && !self.high_precision {
            self.generate_all_masks(model, masks, driver);
        }

        self.sort_draw_order(model);
        debug_assert!(!driver.is_generating_mask());

        for &drawable_index in &self.draw_order {
            let context = masks
                .context_for_drawable(drawable_index)
                .filter(|context| context.in_use && !context.degraded);
            if let Some(context) = context {
                if self.high_precision {
                    generate_one_mask(model, context, driver);
                }
                driver.set_clipping_for_draw(Some(context));
            } else {
                driver.set_clipping_for_draw(None);
            }
            driver.draw_mesh(model, drawable_index);
        }
        driver.set_clipping_for_draw(None);
    }

    /// Pass 1 of the batched flow: every used page is bound once and all of
    /// its contexts' masks rasterized into their cells.
    fn generate_all_masks(
        &self,
        model: &Model,
        masks: &ClippingMaskManager,
        driver: &mut impl GpuDriver,
    ) {
        for page in 0..masks.page_count() {
            let page_used = masks
                .contexts()
                .iter()
                .any(|context| context.in_use && !context.degraded && context.page_index == page);
            if !page_used {
                continue;
            }
            driver.bind_mask_page(page);
            for context in masks.contexts() {
                if !context.in_use || context.degraded || context.page_index != page {
                    continue;
                }
                driver.set_clipping_for_mask(Some(context));
                for &mask_drawable in &context.mask_drawables {
                    driver.draw_mesh(model, mask_drawable);
                }
            }
            driver.set_clipping_for_mask(None);
            driver.restore_framebuffer();
        }
    }

    fn sort_draw_order(&mut self, model: &Model) {
        self.draw_order.clear();
        self.draw_order.extend((0..model.drawable_count()).filter(|&index| {
            model
                .drawable(index)
                .map(|drawable| drawable.dynamic_flags.contains(DynamicFlags::VISIBLE))
                .unwrap_or(false)
        }));
        self.draw_order.sort_by_key(|&index| {
            model.drawable(index).map(|drawable| drawable.render_order).unwrap_or(0)
        });
    }
}

/// High-precision flow: rebuild exactly one context's mask, restoring the
/// main framebuffer before the caller's draw.
fn generate_one_mask(model: &Model, context: &ClippingContext, driver: &mut impl GpuDriver) {
    driver.bind_mask_page(context.page_index);
    driver.set_clipping_for_mask(Some(context));
    for &mask_drawable in &context.mask_drawables {
        driver.draw_mesh(model, mask_drawable);
    }
    driver.set_clipping_for_mask(None);
    driver.restore_framebuffer();
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::SmallVec;

    #[test]
    fn mask_uniform_selects_the_layout_channel() {
        let mut context = ClippingContext {
            mask_drawables: SmallVec::new(),
            clipped_drawables: Vec::new(),
            clipped_draw_rect: crate::math::Rect::default(),
            page_index: 0,
            layout_channel: 2,
            layout_bounds: crate::math::Rect::new(0.0, 0.0, 1.0, 1.0),
            matrix_for_mask: glam::Mat4::IDENTITY,
            matrix_for_draw: glam::Mat4::IDENTITY,
            in_use: true,
            degraded: false,
        };
        let uniform = MaskUniform::for_mask(&context);
        assert_eq!(uniform.channel_flag, [0.0, 0.0, 1.0, 0.0]);
        context.layout_channel = 0;
        let uniform = MaskUniform::for_draw(&context);
        assert_eq!(uniform.channel_flag, [1.0, 0.0, 0.0, 0.0]);
        assert_eq!(uniform.matrix[0][0], 1.0);
    }
}
