use crate::context::{EngineContext, IdTable};
use crate::curve::{BezierSolver, ControlPoint, CurveTrack, Segment, SegmentKind};
use crate::motion::{
    CurveMotionData, CurveTarget, ExpressionBlendType, ExpressionData, ExpressionParameter,
    LoopBehavior, ModelChannel, MotionCurve, MotionEventData,
};
use crate::physics::{
    PhysicsInput, PhysicsNormalization, PhysicsOutput, PhysicsParticle, PhysicsRig, PhysicsSourceType,
    PhysicsSubRig,
};
use anyhow::{bail, Context, Result};
use glam::Vec2;
use serde::Deserialize;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;

// ---------------------------------------------------------------------------
// Motion definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct MotionFile {
    meta: MotionMetaFile,
    #[serde(default)]
    curves: Vec<MotionCurveFile>,
    #[serde(default)]
    events: Vec<MotionEventFile>,
}

#[derive(Debug, Deserialize)]
struct MotionMetaFile {
    duration: f32,
    fps: f32,
    #[serde(default)]
    r#loop: bool,
    #[serde(default)]
    fade_in_time: f32,
    #[serde(default)]
    fade_out_time: f32,
    curve_count: usize,
    total_segment_count: usize,
    total_point_count: usize,
    #[serde(default)]
    restricted_beziers: bool,
    #[serde(default)]
    loop_behavior: Option<LoopBehavior>,
}

#[derive(Debug, Deserialize)]
struct MotionCurveFile {
    target: String,
    id: String,
    #[serde(default = "default_fade_override")]
    fade_in_time: f32,
    #[serde(default = "default_fade_override")]
    fade_out_time: f32,
    segments: Vec<f32>,
}

fn default_fade_override() -> f32 {
    -1.0
}

#[derive(Debug, Deserialize)]
struct MotionEventFile {
    time: f32,
    value: String,
}

/// Parses a motion definition. Count mismatches against the declared meta
/// and unknown segment types are hard failures; the flat segment stream
/// cannot be resynchronized past either.
pub fn parse_motion(json: &str, context: &mut EngineContext) -> Result<CurveMotionData> {
    let file: MotionFile = serde_json::from_str(json).context("Failed to parse motion definition")?;
    let default_loop_behavior = context.config.motion.default_loop_behavior;
    build_motion(file, context.ids_mut(), default_loop_behavior)
}

pub fn load_motion_from_path(path: impl AsRef<Path>, context: &mut EngineContext) -> Result<CurveMotionData> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read motion file {}", path.display()))?;
    parse_motion(&json, context).with_context(|| format!("in motion file {}", path.display()))
}

fn build_motion(
    file: MotionFile,
    ids: &mut IdTable,
    default_loop_behavior: LoopBehavior,
) -> Result<CurveMotionData> {
    if file.meta.duration <= 0.0 {
        bail!("Motion duration must be positive, got {}", file.meta.duration);
    }
    if file.curves.len() != file.meta.curve_count {
        bail!(
            "Motion declares {} curves but contains {}",
            file.meta.curve_count,
            file.curves.len()
        );
    }

    let mut total_segments = 0;
    let mut total_points = 0;
    let mut curves = Vec::with_capacity(file.curves.len());
    for raw_curve in file.curves {
        let target = match raw_curve.target.to_ascii_lowercase().as_str() {
            "model" => CurveTarget::Model,
            "parameter" => CurveTarget::Parameter,
            "part_opacity" | "partopacity" => CurveTarget::PartOpacity,
            other => bail!("Motion curve '{}' has unknown target '{}'", raw_curve.id, other),
        };
        let channel = if target == CurveTarget::Model {
            match raw_curve.id.as_str() {
                "Opacity" => ModelChannel::Opacity,
                "EyeBlink" => ModelChannel::EyeBlink,
                "LipSync" => ModelChannel::LipSync,
                _ => ModelChannel::None,
            }
        } else {
            ModelChannel::None
        };

        let track = build_track(&raw_curve.segments)
            .with_context(|| format!("in curve '{}'", raw_curve.id))?;
        total_segments += track.segments.len();
        total_points += track.points.len();

        curves.push(MotionCurve {
            target,
            id: ids.intern(&raw_curve.id),
            channel,
            track,
            fade_in_override: raw_curve.fade_in_time,
            fade_out_override: raw_curve.fade_out_time,
        });
    }

    if total_segments != file.meta.total_segment_count {
        bail!(
            "Motion declares {} segments but contains {}",
            file.meta.total_segment_count,
            total_segments
        );
    }
    if total_points != file.meta.total_point_count {
        bail!(
            "Motion declares {} control points but contains {}",
            file.meta.total_point_count,
            total_points
        );
    }

    let mut events: Vec<MotionEventData> = file
        .events
        .into_iter()
        .map(|event| MotionEventData { fire_time: event.time, value: event.value })
        .collect();
    events.sort_by(|a, b| a.fire_time.partial_cmp(&b.fire_time).unwrap_or(Ordering::Equal));

    Ok(CurveMotionData {
        curves,
        events,
        duration: file.meta.duration,
        looped: file.meta.r#loop,
        fps: file.meta.fps,
        fade_in_seconds: file.meta.fade_in_time,
        fade_out_seconds: file.meta.fade_out_time,
        loop_behavior: file.meta.loop_behavior.unwrap_or(default_loop_behavior),
        bezier_solver: if file.meta.restricted_beziers {
            BezierSolver::TimeRatio
        } else {
            BezierSolver::Cardano
        },
        eye_blink_ids: Vec::new(),
        lip_sync_ids: Vec::new(),
    })
}

/// Decodes the flat segment stream: the first point's time and value, then
/// per segment a type id (0 linear, 1 bezier, 2 stepped, 3 inverse stepped)
/// followed by one point, or three for beziers.
fn build_track(stream: &[f32]) -> Result<CurveTrack> {
    if stream.len() < 2 {
        bail!("Curve segment stream must start with an initial control point");
    }
    let mut points = vec![ControlPoint::new(stream[0], stream[1])];
    let mut segments = Vec::new();
    let mut cursor = 2;
    let mut last_anchor_time = stream[0];
    while cursor < stream.len() {
        let kind = match stream[cursor] as i32 {
            0 => SegmentKind::Linear,
            1 => SegmentKind::Bezier,
            2 => SegmentKind::Stepped,
            3 => SegmentKind::InverseStepped,
            other => bail!("Unknown segment type {other}"),
        };
        cursor += 1;
        let new_points = kind.point_span() - 1;
        if cursor + new_points * 2 > stream.len() {
            bail!("Curve segment stream is truncated");
        }
        let base_point = points.len() - 1;
        for _ in 0..new_points {
            let point = ControlPoint::new(stream[cursor], stream[cursor + 1]);
            if !point.time.is_finite() || !point.value.is_finite() {
                bail!("Curve control point contains a non-finite component");
            }
            points.push(point);
            cursor += 2;
        }
        // Only the segment anchors must advance in time; bezier handles may
        // sit anywhere inside their span.
        let anchor_time = points[points.len() - 1].time;
        if anchor_time < last_anchor_time {
            bail!("Curve keyframes must be ordered by time");
        }
        last_anchor_time = anchor_time;
        segments.push(Segment { kind, base_point });
    }
    if segments.is_empty() {
        bail!("Curve must contain at least one segment");
    }
    Ok(CurveTrack::new(segments, points))
}

// ---------------------------------------------------------------------------
// Expression definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ExpressionFile {
    #[serde(default)]
    fade_in_time: f32,
    #[serde(default)]
    fade_out_time: f32,
    #[serde(default)]
    parameters: Vec<ExpressionParameterFile>,
}

#[derive(Debug, Deserialize)]
struct ExpressionParameterFile {
    id: String,
    value: f32,
    #[serde(default)]
    blend: Option<String>,
}

/// Parses an expression definition. An unknown or missing blend type falls
/// back to Additive with a warning instead of rejecting the asset.
pub fn parse_expression(json: &str, context: &mut EngineContext) -> Result<ExpressionData> {
    let file: ExpressionFile =
        serde_json::from_str(json).context("Failed to parse expression definition")?;
    let ids = context.ids_mut();
    let parameters = file
        .parameters
        .into_iter()
        .map(|parameter| {
            let blend = match parameter.blend.as_deref() {
                None => ExpressionBlendType::Additive,
                Some(raw) => match raw.to_ascii_lowercase().as_str() {
                    "add" | "additive" => ExpressionBlendType::Additive,
                    "multiply" | "multiplicative" => ExpressionBlendType::Multiply,
                    "overwrite" => ExpressionBlendType::Overwrite,
                    other => {
                        log::warn!(
                            "expression parameter '{}' has unknown blend type '{other}'; using additive",
                            parameter.id
                        );
                        ExpressionBlendType::Additive
                    }
                },
            };
            ExpressionParameter { id: ids.intern(&parameter.id), blend, value: parameter.value }
        })
        .collect();
    Ok(ExpressionData {
        parameters,
        fade_in_seconds: file.fade_in_time,
        fade_out_seconds: file.fade_out_time,
    })
}

pub fn load_expression_from_path(
    path: impl AsRef<Path>,
    context: &mut EngineContext,
) -> Result<ExpressionData> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read expression file {}", path.display()))?;
    parse_expression(&json, context).with_context(|| format!("in expression file {}", path.display()))
}

// ---------------------------------------------------------------------------
// Physics definitions
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PhysicsFile {
    meta: PhysicsMetaFile,
    #[serde(default)]
    sub_rigs: Vec<PhysicsSubRigFile>,
}

#[derive(Debug, Deserialize)]
struct PhysicsMetaFile {
    sub_rig_count: usize,
    total_input_count: usize,
    total_output_count: usize,
    vertex_count: usize,
    #[serde(default)]
    fps: f32,
    gravity: [f32; 2],
    #[serde(default)]
    wind: [f32; 2],
}

#[derive(Debug, Deserialize)]
struct PhysicsSubRigFile {
    id: String,
    #[serde(default)]
    inputs: Vec<PhysicsInputFile>,
    #[serde(default)]
    outputs: Vec<PhysicsOutputFile>,
    #[serde(default)]
    vertices: Vec<PhysicsVertexFile>,
    normalization: PhysicsNormalizationFile,
}

#[derive(Debug, Deserialize)]
struct PhysicsInputFile {
    source: String,
    r#type: String,
    weight: f32,
    #[serde(default)]
    reflect: bool,
}

#[derive(Debug, Deserialize)]
struct PhysicsOutputFile {
    destination: String,
    vertex_index: usize,
    r#type: String,
    scale: f32,
    weight: f32,
    #[serde(default)]
    reflect: bool,
    #[serde(default)]
    value_below_minimum: Option<f32>,
    #[serde(default)]
    value_exceeded_maximum: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct PhysicsVertexFile {
    mobility: f32,
    delay: f32,
    acceleration: f32,
    radius: f32,
}

#[derive(Debug, Deserialize)]
struct PhysicsNormalizationFile {
    position: PhysicsRangeFile,
    angle: PhysicsRangeFile,
}

#[derive(Debug, Deserialize)]
struct PhysicsRangeFile {
    minimum: f32,
    default: f32,
    maximum: f32,
}

impl PhysicsRangeFile {
    fn build(&self) -> PhysicsNormalization {
        PhysicsNormalization { minimum: self.minimum, maximum: self.maximum, default: self.default }
    }
}

fn parse_source_type(raw: &str) -> Option<PhysicsSourceType> {
    match raw.to_ascii_lowercase().as_str() {
        "x" => Some(PhysicsSourceType::X),
        "y" => Some(PhysicsSourceType::Y),
        "angle" => Some(PhysicsSourceType::Angle),
        _ => None,
    }
}

/// Parses a physics definition. Counts are validated against the meta block;
/// an input or output with an unknown type is dropped with a warning, since
/// the rest of the rig remains usable without it.
pub fn parse_physics(json: &str, context: &mut EngineContext) -> Result<PhysicsRig> {
    let file: PhysicsFile = serde_json::from_str(json).context("Failed to parse physics definition")?;
    if file.sub_rigs.len() != file.meta.sub_rig_count {
        bail!(
            "Physics declares {} sub-rigs but contains {}",
            file.meta.sub_rig_count,
            file.sub_rigs.len()
        );
    }
    let total_inputs: usize = file.sub_rigs.iter().map(|rig| rig.inputs.len()).sum();
    let total_outputs: usize = file.sub_rigs.iter().map(|rig| rig.outputs.len()).sum();
    let total_vertices: usize = file.sub_rigs.iter().map(|rig| rig.vertices.len()).sum();
    if total_inputs != file.meta.total_input_count {
        bail!("Physics declares {} inputs but contains {total_inputs}", file.meta.total_input_count);
    }
    if total_outputs != file.meta.total_output_count {
        bail!("Physics declares {} outputs but contains {total_outputs}", file.meta.total_output_count);
    }
    if total_vertices != file.meta.vertex_count {
        bail!("Physics declares {} vertices but contains {total_vertices}", file.meta.vertex_count);
    }

    let ids = context.ids_mut();
    let mut sub_rigs = Vec::with_capacity(file.sub_rigs.len());
    for raw_rig in file.sub_rigs {
        let mut inputs = Vec::with_capacity(raw_rig.inputs.len());
        for input in raw_rig.inputs {
            let Some(kind) = parse_source_type(&input.r#type) else {
                log::warn!(
                    "physics sub-rig '{}' input '{}' has unknown type '{}'; dropping it",
                    raw_rig.id,
                    input.source,
                    input.r#type
                );
                continue;
            };
            inputs.push(PhysicsInput {
                source: ids.intern(&input.source),
                kind,
                weight: input.weight / 100.0,
                reflect: input.reflect,
            });
        }

        let mut outputs = Vec::with_capacity(raw_rig.outputs.len());
        for output in raw_rig.outputs {
            let Some(kind) = parse_source_type(&output.r#type) else {
                log::warn!(
                    "physics sub-rig '{}' output '{}' has unknown type '{}'; dropping it",
                    raw_rig.id,
                    output.destination,
                    output.r#type
                );
                continue;
            };
            if output.vertex_index == 0 || output.vertex_index >= raw_rig.vertices.len() {
                log::warn!(
                    "physics sub-rig '{}' output '{}' references vertex {} outside the chain; dropping it",
                    raw_rig.id,
                    output.destination,
                    output.vertex_index
                );
                continue;
            }
            outputs.push(PhysicsOutput {
                destination: ids.intern(&output.destination),
                particle_index: output.vertex_index,
                kind,
                scale: output.scale,
                weight: output.weight / 100.0,
                reflect: output.reflect,
                value_below_minimum: output.value_below_minimum,
                value_exceeded_maximum: output.value_exceeded_maximum,
            });
        }

        let particles = raw_rig
            .vertices
            .iter()
            .map(|vertex| {
                PhysicsParticle::new(vertex.mobility, vertex.delay, vertex.acceleration, vertex.radius)
            })
            .collect();

        sub_rigs.push(PhysicsSubRig {
            id: ids.intern(&raw_rig.id),
            inputs,
            outputs,
            particles,
            normalization_position: raw_rig.normalization.position.build(),
            normalization_angle: raw_rig.normalization.angle.build(),
        });
    }

    Ok(PhysicsRig {
        sub_rigs,
        gravity: Vec2::from_array(file.meta.gravity),
        wind: Vec2::from_array(file.meta.wind),
        fps: file.meta.fps,
    })
}

pub fn load_physics_from_path(path: impl AsRef<Path>, context: &mut EngineContext) -> Result<PhysicsRig> {
    let path = path.as_ref();
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read physics file {}", path.display()))?;
    parse_physics(&json, context).with_context(|| format!("in physics file {}", path.display()))
}
