use waxwing_engine::assets;
use waxwing_engine::config::EngineConfig;
use waxwing_engine::context::EngineContext;
use waxwing_engine::curve::SegmentKind;
use waxwing_engine::motion::{CurveTarget, ExpressionBlendType, LoopBehavior, ModelChannel};

fn motion_json(curve_count: usize, segment_count: usize, point_count: usize, segments: &str) -> String {
    format!(
        r#"{{
  "meta": {{
    "duration": 2.0, "fps": 30.0, "loop": true,
    "fade_in_time": 0.5, "fade_out_time": 0.25,
    "curve_count": {curve_count},
    "total_segment_count": {segment_count},
    "total_point_count": {point_count}
  }},
  "curves": [
    {{ "target": "parameter", "id": "ParamAngleX", "segments": [{segments}] }}
  ]
}}"#
    )
}

#[test]
fn motion_parses_with_mixed_segment_kinds() {
    let mut context = EngineContext::default();
    // Linear, bezier, stepped: 1 + 1 + 3 + 1 points.
    let json = motion_json(
        1,
        3,
        6,
        "0.0, 0.0, 0, 0.5, 1.0, 1, 0.7, 1.5, 0.9, 2.0, 1.1, 2.5, 2, 2.0, 0.0",
    );
    let data = assets::parse_motion(&json, &mut context).expect("motion should parse");
    assert_eq!(data.curves.len(), 1);
    assert_eq!(data.duration, 2.0);
    assert!(data.looped);
    assert_eq!(data.fade_in_seconds, 0.5);
    assert_eq!(data.loop_behavior, LoopBehavior::V2, "config default applies when unspecified");

    let track = &data.curves[0].track;
    assert_eq!(track.segments.len(), 3);
    assert_eq!(track.points.len(), 6);
    assert_eq!(track.segments[0].kind, SegmentKind::Linear);
    assert_eq!(track.segments[1].kind, SegmentKind::Bezier);
    assert_eq!(track.segments[2].kind, SegmentKind::Stepped);
    assert_eq!(data.curves[0].target, CurveTarget::Parameter);
}

#[test]
fn model_channel_curves_are_recognized() {
    let mut context = EngineContext::default();
    let json = r#"{
  "meta": {
    "duration": 1.0, "fps": 30.0, "loop": false,
    "fade_in_time": 0.0, "fade_out_time": 0.0,
    "curve_count": 2, "total_segment_count": 2, "total_point_count": 4
  },
  "curves": [
    { "target": "model", "id": "EyeBlink", "segments": [0.0, 1.0, 0, 1.0, 0.0] },
    { "target": "model", "id": "LipSync", "segments": [0.0, 0.0, 0, 1.0, 1.0] }
  ]
}"#;
    let data = assets::parse_motion(json, &mut context).expect("motion should parse");
    assert_eq!(data.curves[0].channel, ModelChannel::EyeBlink);
    assert_eq!(data.curves[1].channel, ModelChannel::LipSync);
}

#[test]
fn curve_count_mismatch_is_a_hard_failure() {
    let mut context = EngineContext::default();
    let json = motion_json(2, 1, 2, "0.0, 0.0, 0, 1.0, 1.0");
    let err = assets::parse_motion(&json, &mut context).expect_err("mismatch must fail");
    assert!(err.to_string().contains("declares 2 curves"), "unexpected error: {err:#}");
}

#[test]
fn segment_count_mismatch_is_a_hard_failure() {
    let mut context = EngineContext::default();
    let json = motion_json(1, 5, 2, "0.0, 0.0, 0, 1.0, 1.0");
    let err = assets::parse_motion(&json, &mut context).expect_err("mismatch must fail");
    assert!(err.to_string().contains("declares 5 segments"), "unexpected error: {err:#}");
}

#[test]
fn point_count_mismatch_is_a_hard_failure() {
    let mut context = EngineContext::default();
    let json = motion_json(1, 1, 7, "0.0, 0.0, 0, 1.0, 1.0");
    let err = assets::parse_motion(&json, &mut context).expect_err("mismatch must fail");
    assert!(err.to_string().contains("declares 7 control points"), "unexpected error: {err:#}");
}

#[test]
fn unknown_segment_type_is_a_hard_failure() {
    let mut context = EngineContext::default();
    let json = motion_json(1, 1, 2, "0.0, 0.0, 9, 1.0, 1.0");
    let err = assets::parse_motion(&json, &mut context).expect_err("unknown type must fail");
    assert!(format!("{err:#}").contains("Unknown segment type"), "unexpected error: {err:#}");
}

#[test]
fn unordered_keyframes_are_rejected() {
    let mut context = EngineContext::default();
    let json = motion_json(1, 2, 3, "0.0, 0.0, 0, 1.5, 1.0, 0, 1.0, 2.0");
    let err = assets::parse_motion(&json, &mut context).expect_err("unordered keyframes must fail");
    assert!(format!("{err:#}").contains("ordered by time"), "unexpected error: {err:#}");
}

#[test]
fn expression_blend_strings_map_to_types() {
    let mut context = EngineContext::default();
    let json = r#"{
  "fade_in_time": 0.5,
  "fade_out_time": 0.5,
  "parameters": [
    { "id": "A", "value": 1.0, "blend": "add" },
    { "id": "B", "value": 2.0, "blend": "multiply" },
    { "id": "C", "value": 3.0, "blend": "overwrite" },
    { "id": "D", "value": 4.0 },
    { "id": "E", "value": 5.0, "blend": "glow" }
  ]
}"#;
    let data = assets::parse_expression(json, &mut context).expect("expression should parse");
    let blends: Vec<ExpressionBlendType> = data.parameters.iter().map(|p| p.blend).collect();
    assert_eq!(
        blends,
        vec![
            ExpressionBlendType::Additive,
            ExpressionBlendType::Multiply,
            ExpressionBlendType::Overwrite,
            ExpressionBlendType::Additive,
            ExpressionBlendType::Additive,
        ],
        "missing and unknown blend strings fall back to additive"
    );
}

#[test]
fn physics_count_mismatch_is_a_hard_failure() {
    let mut context = EngineContext::default();
    let json = r#"{
  "meta": {
    "sub_rig_count": 2,
    "total_input_count": 0,
    "total_output_count": 0,
    "vertex_count": 0,
    "gravity": [0.0, -1.0]
  },
  "sub_rigs": []
}"#;
    let err = assets::parse_physics(json, &mut context).expect_err("mismatch must fail");
    assert!(err.to_string().contains("declares 2 sub-rigs"), "unexpected error: {err:#}");
}

#[test]
fn physics_outputs_outside_the_chain_are_dropped() {
    let mut context = EngineContext::default();
    let json = r#"{
  "meta": {
    "sub_rig_count": 1,
    "total_input_count": 0,
    "total_output_count": 2,
    "vertex_count": 2,
    "gravity": [0.0, -1.0]
  },
  "sub_rigs": [
    {
      "id": "Tail",
      "outputs": [
        { "destination": "ParamGood", "vertex_index": 1, "type": "angle", "scale": 1.0, "weight": 100.0 },
        { "destination": "ParamBad", "vertex_index": 7, "type": "angle", "scale": 1.0, "weight": 100.0 }
      ],
      "vertices": [
        { "mobility": 1.0, "delay": 1.0, "acceleration": 1.0, "radius": 0.0 },
        { "mobility": 0.9, "delay": 1.0, "acceleration": 1.0, "radius": 3.0 }
      ],
      "normalization": {
        "position": { "minimum": -10.0, "default": 0.0, "maximum": 10.0 },
        "angle": { "minimum": -10.0, "default": 0.0, "maximum": 10.0 }
      }
    }
  ]
}"#;
    let rig = assets::parse_physics(json, &mut context).expect("rig should parse");
    assert_eq!(rig.sub_rigs[0].outputs.len(), 1, "the out-of-range output is dropped");
    assert_eq!(rig.sub_rigs[0].particles.len(), 2);
    assert_eq!(rig.fps, 0.0, "unspecified fps falls back to frame-driven stepping");
}

#[test]
fn definitions_load_from_disk() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("wave.motion.json");
    std::fs::write(&path, motion_json(1, 1, 2, "0.0, 0.0, 0, 1.0, 1.0")).expect("write motion");

    let mut context = EngineContext::default();
    let data = assets::load_motion_from_path(&path, &mut context).expect("motion should load");
    assert_eq!(data.curves.len(), 1);

    let missing = assets::load_motion_from_path(dir.path().join("absent.json"), &mut context);
    assert!(missing.is_err(), "missing files surface as errors");
}

#[test]
fn config_falls_back_to_defaults() {
    let config = EngineConfig::load_or_default("/definitely/not/here.json");
    assert_eq!(config.masks.page_count, 1);
    assert_eq!(config.motion.default_loop_behavior, LoopBehavior::V2);
    assert!(!config.masks.high_precision);

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("engine.json");
    std::fs::write(&path, r#"{ "masks": { "page_count": 3, "high_precision": true } }"#)
        .expect("write config");
    let config = EngineConfig::load(&path).expect("config should parse");
    assert_eq!(config.masks.page_count, 3);
    assert!(config.masks.high_precision);
    assert_eq!(config.masks.max_contexts, 36, "unspecified fields keep their defaults");
}
