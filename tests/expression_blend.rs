use std::sync::Arc;
use waxwing_engine::assets;
use waxwing_engine::context::EngineContext;
use waxwing_engine::model::Model;
use waxwing_engine::motion::ExpressionManager;

fn expression(context: &mut EngineContext, fade_in: f32, fade_out: f32, entries: &str) -> Arc<waxwing_engine::motion::ExpressionData> {
    let json = format!(
        r#"{{ "fade_in_time": {fade_in}, "fade_out_time": {fade_out}, "parameters": [{entries}] }}"#
    );
    Arc::new(assets::parse_expression(&json, context).expect("expression should parse"))
}

fn model_with(context: &mut EngineContext, name: &str, value: f32) -> Model {
    let id = context.ids_mut().intern(name);
    let mut model = Model::new();
    model.add_parameter(id, -20.0, 20.0, 0.0);
    let index = model.parameter_index(id);
    model.set_parameter_value(index, value, 1.0);
    model
}

fn value_of(context: &mut EngineContext, model: &mut Model, name: &str) -> f32 {
    let id = context.ids_mut().intern(name);
    let index = model.parameter_index(id);
    model.parameter_value(index)
}

#[test]
fn additive_layers_on_top_of_the_base() {
    let mut context = EngineContext::default();
    let mut model = model_with(&mut context, "ParamMouth", 3.0);
    let mut manager = ExpressionManager::new();

    let smile = expression(&mut context, 0.0, 0.0, r#"{"id": "ParamMouth", "value": 5.0, "blend": "add"}"#);
    manager.start_expression(smile);
    assert!(manager.update(&mut model, 0.1));
    assert_eq!(value_of(&mut context, &mut model, "ParamMouth"), 8.0);
}

#[test]
fn multiply_scales_the_base() {
    let mut context = EngineContext::default();
    let mut model = model_with(&mut context, "ParamBrow", 3.0);
    let mut manager = ExpressionManager::new();

    let raise = expression(&mut context, 0.0, 0.0, r#"{"id": "ParamBrow", "value": 2.0, "blend": "multiply"}"#);
    manager.start_expression(raise);
    manager.update(&mut model, 0.1);
    assert_eq!(value_of(&mut context, &mut model, "ParamBrow"), 6.0);
}

#[test]
fn overwrite_replaces_the_blend_entirely() {
    let mut context = EngineContext::default();
    let mut model = model_with(&mut context, "ParamEye", 3.0);
    let mut manager = ExpressionManager::new();

    let wink = expression(&mut context, 0.0, 0.0, r#"{"id": "ParamEye", "value": 9.0, "blend": "overwrite"}"#);
    manager.start_expression(wink);
    manager.update(&mut model, 0.1);
    assert_eq!(value_of(&mut context, &mut model, "ParamEye"), 9.0);
}

#[test]
fn mid_fade_contribution_is_partial() {
    let mut context = EngineContext::default();
    let mut model = model_with(&mut context, "ParamMouth", 0.0);
    let mut manager = ExpressionManager::new();

    let smile = expression(&mut context, 1.0, 0.0, r#"{"id": "ParamMouth", "value": 5.0, "blend": "add"}"#);
    manager.start_expression(smile);
    manager.update(&mut model, 0.0);
    // Sine ramp at half the fade-in window contributes half the value.
    manager.update(&mut model, 0.5);
    let value = value_of(&mut context, &mut model, "ParamMouth");
    assert!((value - 2.5).abs() < 1e-4, "expected 2.5 mid-fade, got {value}");
}

#[test]
fn newer_expression_takes_over_as_it_fades_in() {
    let mut context = EngineContext::default();
    let mut model = model_with(&mut context, "ParamMouth", 0.0);
    let mut manager = ExpressionManager::new();

    // Mirror the frame pipeline: the expression pass always layers on the
    // same saved base, not on its own previous commit.
    model.save_parameters();
    let tick = |model: &mut Model, manager: &mut ExpressionManager, now: f32| {
        model.load_saved_parameters();
        manager.update(model, now);
    };

    let calm = expression(&mut context, 0.0, 1.0, r#"{"id": "ParamMouth", "value": 4.0, "blend": "add"}"#);
    let grin = expression(&mut context, 1.0, 0.0, r#"{"id": "ParamMouth", "value": 8.0, "blend": "add"}"#);

    let calm_handle = manager.start_expression(calm);
    tick(&mut model, &mut manager, 0.0);
    assert_eq!(value_of(&mut context, &mut model, "ParamMouth"), 4.0);

    // Starting grin asks calm to fade out over calm's own 1.0s window,
    // beginning at the next update.
    let grin_handle = manager.start_expression(grin);
    tick(&mut model, &mut manager, 0.0);

    // Half a second in: calm is halfway out, grin halfway in. The slots fold
    // in order: calm pulls the accumulator to 2.0, grin lerps it toward 8.0.
    tick(&mut model, &mut manager, 0.5);
    let value = value_of(&mut context, &mut model, "ParamMouth");
    assert!((value - 5.0).abs() < 1e-4, "expected 5.0 during the handover, got {value}");

    let calm_weight = manager.fade_weight(calm_handle).expect("calm still tracked");
    let grin_weight = manager.fade_weight(grin_handle).expect("grin tracked");
    assert!((calm_weight - 0.5).abs() < 1e-4);
    assert!((grin_weight - 0.5).abs() < 1e-4);

    // Once grin holds full weight the stale slot is released.
    tick(&mut model, &mut manager, 1.1);
    assert_eq!(manager.queue().len(), 1, "the superseded expression is evicted");
    let value = value_of(&mut context, &mut model, "ParamMouth");
    assert!((value - 8.0).abs() < 1e-4, "grin fully owns the parameter, got {value}");
}

#[test]
fn unknown_blend_type_falls_back_to_additive() {
    let mut context = EngineContext::default();
    let mut model = model_with(&mut context, "ParamJaw", 1.0);
    let mut manager = ExpressionManager::new();

    let odd = expression(&mut context, 0.0, 0.0, r#"{"id": "ParamJaw", "value": 2.0, "blend": "screen"}"#);
    manager.start_expression(odd);
    manager.update(&mut model, 0.1);
    assert_eq!(value_of(&mut context, &mut model, "ParamJaw"), 3.0, "unknown blend behaves as additive");
}
