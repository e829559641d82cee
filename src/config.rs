use crate::motion::LoopBehavior;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct MotionConfig {
    /// Loop behavior applied to motions whose definition does not pick one.
    #[serde(default = "MotionConfig::default_loop_behavior")]
    pub default_loop_behavior: LoopBehavior,
}

impl MotionConfig {
    fn default_loop_behavior() -> LoopBehavior {
        LoopBehavior::V2
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self { default_loop_behavior: Self::default_loop_behavior() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhysicsConfig {
    /// Largest step the integrator accepts before splitting the frame delta
    /// into sub-steps. Keeps the chain stable at low frame rates.
    #[serde(default = "PhysicsConfig::default_max_step_seconds")]
    pub max_step_seconds: f32,
    #[serde(default = "PhysicsConfig::default_max_substeps")]
    pub max_substeps: u32,
}

impl PhysicsConfig {
    fn default_max_step_seconds() -> f32 {
        1.0 / 30.0
    }

    const fn default_max_substeps() -> u32 {
        8
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            max_step_seconds: Self::default_max_step_seconds(),
            max_substeps: Self::default_max_substeps(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaskConfig {
    /// Render-texture pages available to the mask layout before degradation.
    #[serde(default = "MaskConfig::default_page_count")]
    pub page_count: u32,
    /// Hard cap on clipping contexts laid out in one frame. Contexts past the
    /// cap render unclipped and a warning is emitted.
    #[serde(default = "MaskConfig::default_max_contexts")]
    pub max_contexts: usize,
    /// Margin added around each clipped rect so antialiased edges do not
    /// bleed into neighbouring layout cells.
    #[serde(default = "MaskConfig::default_margin")]
    pub margin: f32,
    /// Regenerate masks immediately before each clipped drawable instead of
    /// batching them all up front. Slower, but correct when unrelated clip
    /// groups interleave in draw order.
    #[serde(default)]
    pub high_precision: bool,
}

impl MaskConfig {
    const fn default_page_count() -> u32 {
        1
    }

    const fn default_max_contexts() -> usize {
        36
    }

    fn default_margin() -> f32 {
        0.05
    }
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            page_count: Self::default_page_count(),
            max_contexts: Self::default_max_contexts(),
            margin: Self::default_margin(),
            high_precision: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub masks: MaskConfig,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                log::warn!("config load error: {err:?}; falling back to defaults");
                Self::default()
            }
        }
    }
}
