#![allow(clippy::float_cmp)]

use super::*;
use crate::camera::local_to_world;
use crate::test_support::{RecordingSurface, catalog};

type Core = EngineCore<AssetTable<String>>;

// =============================================================
// Helpers
// =============================================================

/// A 100x50 "card" sprite.
fn card(id: &str, x: f64, y: f64, z: f64) -> Sprite {
    Sprite::new(SpriteId::new(id), AssetRef::new("card"), x, y).with_z(z)
}

fn core_with(sprites: &[Sprite]) -> Core {
    let mut core = EngineCore::new(catalog(&[("card", 100.0, 50.0)]));
    for s in sprites {
        core.scene.sprites.add(s.clone());
    }
    core
}

fn sid(raw: &str) -> SpriteId {
    SpriteId::new(raw)
}

fn pt(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn no_modifiers() -> Modifiers {
    Modifiers::default()
}

fn ctrl_modifier() -> Modifiers {
    Modifiers { ctrl: true, ..Default::default() }
}

fn shift_modifier() -> Modifiers {
    Modifiers { shift: true, ..Default::default() }
}

fn wheel(dx: f64, dy: f64) -> WheelDelta {
    WheelDelta { dx, dy }
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * (1.0 + a.abs().max(b.abs()))
}

fn has_action<F>(actions: &[Action], pred: F) -> bool
where
    F: Fn(&Action) -> bool,
{
    actions.iter().any(pred)
}

fn has_render_needed(actions: &[Action]) -> bool {
    has_action(actions, |a| matches!(a, Action::RenderNeeded))
}

fn has_history_changed(actions: &[Action]) -> bool {
    has_action(actions, |a| matches!(a, Action::HistoryChanged { .. }))
}

/// Press and release the primary button at `from`, moving through `path`.
fn drag(core: &mut Core, from: Point, path: &[Point]) {
    core.on_pointer_down(from, Button::Primary, no_modifiers());
    for &p in path {
        core.on_pointer_move(p, no_modifiers());
    }
    let end = path.last().copied().unwrap_or(from);
    core.on_pointer_up(end, Button::Primary, no_modifiers());
}

// =============================================================
// Defaults
// =============================================================

#[test]
fn core_new_is_idle_with_no_selection() {
    let core = core_with(&[]);
    assert!(core.selection().is_none());
    assert!(core.hover().is_none());
    assert!(core.input.is_idle());
    assert_eq!(core.ui.tool, Tool::Select);
    assert_eq!(core.cursor(), "default");
    assert!(!core.history.can_undo());
}

#[test]
fn core_default_camera_is_identity() {
    let core = core_with(&[]);
    assert_eq!(core.camera(), Camera::default());
}

// =============================================================
// Selection
// =============================================================

#[test]
fn pointer_down_on_sprite_selects_it() {
    let mut core = core_with(&[card("a", 100.0, 100.0, 1.0)]);
    let actions = core.on_pointer_down(pt(150.0, 125.0), Button::Primary, no_modifiers());
    assert_eq!(core.selection(), Some(&sid("a")));
    assert!(has_action(&actions, |a| *a == Action::SelectionChanged(Some(sid("a")))));
    assert!(matches!(core.input, InputState::Dragging { .. }));
}

#[test]
fn pointer_down_on_empty_space_clears_selection() {
    let mut core = core_with(&[card("a", 100.0, 100.0, 1.0)]);
    core.select(Some(sid("a")));
    let actions = core.on_pointer_down(pt(500.0, 500.0), Button::Primary, no_modifiers());
    assert!(core.selection().is_none());
    assert!(has_action(&actions, |a| *a == Action::SelectionChanged(None)));
    assert!(core.input.is_idle());
}

#[test]
fn pointer_down_picks_topmost() {
    let mut core = core_with(&[card("low", 0.0, 0.0, 1.0), card("high", 50.0, 0.0, 2.0)]);
    core.on_pointer_down(pt(75.0, 25.0), Button::Primary, no_modifiers());
    assert_eq!(core.selection(), Some(&sid("high")));
}

#[test]
fn locked_sprite_cannot_be_grabbed_but_is_hovered() {
    let mut locked = card("a", 0.0, 0.0, 1.0);
    locked.locked = true;
    let mut core = core_with(&[locked]);

    let actions = core.on_pointer_move(pt(10.0, 10.0), no_modifiers());
    assert_eq!(core.hover(), Some(&sid("a")));
    assert!(has_action(&actions, |a| *a == Action::SetCursor("pointer".into())));

    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    assert!(core.selection().is_none());
    assert!(core.input.is_idle());
}

#[test]
fn unloaded_sprite_is_not_picked() {
    let mut core = core_with(&[Sprite::new(sid("a"), AssetRef::new("pending"), 0.0, 0.0)]);
    core.on_pointer_down(pt(1.0, 1.0), Button::Primary, no_modifiers());
    assert!(core.selection().is_none());
}

#[test]
fn select_unknown_id_clears_selection() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.select(Some(sid("a")));
    core.select(Some(sid("missing")));
    assert!(core.selection().is_none());
}

// =============================================================
// Dragging
// =============================================================

#[test]
fn drag_keeps_grabbed_point_under_cursor() {
    let mut s = card("a", 200.0, 100.0, 1.0);
    s.rotation = 30.0;
    s.scale = 1.5;
    let mut core = core_with(&[s.clone()]);
    core.scene.camera = Camera { pan_x: 10.0, pan_y: 20.0, zoom: 2.0 };

    let grabbed_local = pt(40.0, 20.0);
    let grabbed_world = local_to_world(grabbed_local, &s);
    let start = core.scene.camera.world_to_screen(grabbed_world);

    core.on_pointer_down(start, Button::Primary, no_modifiers());
    core.on_pointer_move(pt(start.x + 30.0, start.y - 12.0), no_modifiers());

    // 30 / -12 screen pixels at zoom 2 is 15 / -6 world units.
    let moved = core.sprite(&sid("a")).unwrap();
    let now = local_to_world(grabbed_local, moved);
    assert!(approx_eq(now.x, grabbed_world.x + 15.0));
    assert!(approx_eq(now.y, grabbed_world.y - 6.0));
    assert_eq!(moved.rotation, 30.0);
    assert_eq!(moved.scale, 1.5);
}

#[test]
fn drag_of_fifty_moves_is_one_history_entry() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    let before = core.scene.sprites.clone();
    let path: Vec<Point> = (1..=50).map(|i| pt(10.0 + f64::from(i), 10.0)).collect();

    drag(&mut core, pt(10.0, 10.0), &path);
    let after = core.scene.sprites.clone();
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 50.0);
    assert_eq!(core.history.undo_len(), 1);

    core.undo();
    assert_eq!(core.scene.sprites, before);
    core.redo();
    assert_eq!(core.scene.sprites, after);
}

#[test]
fn click_without_moving_records_nothing() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    let actions_up = {
        core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
        core.on_pointer_up(pt(10.0, 10.0), Button::Primary, no_modifiers())
    };
    assert!(!has_history_changed(&actions_up));
    assert_eq!(core.history.undo_len(), 0);
    assert!(core.input.is_idle());
}

#[test]
fn drag_snaps_to_grid() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_grid(GridSettings { enabled: false, size: 64.0, snap: true });
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(75.0, 80.0), no_modifiers());
    let s = core.sprite(&sid("a")).unwrap();
    assert_eq!((s.x, s.y), (64.0, 64.0));
}

#[test]
fn drag_emits_sprite_updated() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    let actions = core.on_pointer_move(pt(20.0, 15.0), no_modifiers());
    assert!(has_action(&actions, |a| {
        *a == Action::SpriteUpdated { id: sid("a"), fields: SpritePatch::position(10.0, 5.0) }
    }));
    assert!(has_render_needed(&actions));
}

#[test]
fn drag_survives_leaving_the_canvas() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(20.0, 10.0), no_modifiers());

    let actions = core.on_pointer_leave();
    assert!(matches!(core.input, InputState::Dragging { .. }));
    assert!(!has_history_changed(&actions));

    core.on_pointer_move(pt(60.0, 10.0), no_modifiers());
    let actions = core.on_pointer_up(pt(60.0, 10.0), Button::Primary, no_modifiers());
    assert!(has_history_changed(&actions));
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 50.0);
    assert_eq!(core.history.undo_len(), 1);
}

#[test]
fn rotate_survives_leaving_the_canvas() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Rotate);
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(20.0, 10.0), no_modifiers());
    core.on_pointer_leave();
    core.on_pointer_move(pt(110.0, 10.0), no_modifiers());
    core.on_pointer_up(pt(110.0, 10.0), Button::Primary, no_modifiers());
    assert!(approx_eq(core.sprite(&sid("a")).unwrap().rotation, 30.0));
    assert_eq!(core.history.undo_len(), 1);
}

#[test]
fn pointer_leave_drops_hover() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_move(pt(10.0, 10.0), no_modifiers());
    let actions = core.on_pointer_leave();
    assert!(core.hover().is_none());
    assert!(has_render_needed(&actions));
    assert_eq!(core.cursor(), "default");
}

// =============================================================
// Rotate / scale gestures
// =============================================================

#[test]
fn rotate_tool_rotates_with_horizontal_travel() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Rotate);
    drag(&mut core, pt(10.0, 10.0), &[pt(60.0, 40.0), pt(110.0, 90.0)]);
    let s = core.sprite(&sid("a")).unwrap();
    assert!(approx_eq(s.rotation, 30.0));
    assert_eq!((s.x, s.y), (0.0, 0.0));
    assert_eq!(core.history.undo_len(), 1);
}

#[test]
fn alt_rotates_with_select_tool() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, Modifiers { alt: true, ..Default::default() });
    assert!(matches!(core.input, InputState::Rotating { .. }));
    core.on_pointer_move(pt(0.0, 10.0), no_modifiers());
    assert!(approx_eq(core.sprite(&sid("a")).unwrap().rotation, -3.0));
}

#[test]
fn scale_tool_scales_with_horizontal_travel() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Scale);
    drag(&mut core, pt(10.0, 10.0), &[pt(110.0, 10.0)]);
    assert!(approx_eq(core.sprite(&sid("a")).unwrap().scale, 1.5));
}

#[test]
fn scale_gesture_never_reaches_zero() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Scale);
    drag(&mut core, pt(10.0, 10.0), &[pt(-2000.0, 10.0)]);
    assert_eq!(core.sprite(&sid("a")).unwrap().scale, crate::consts::MIN_SCALE);
}

// =============================================================
// Panning
// =============================================================

#[test]
fn middle_button_pans_without_history() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_down(pt(10.0, 10.0), Button::Middle, no_modifiers());
    assert_eq!(core.cursor(), "grabbing");
    core.on_pointer_move(pt(25.0, 5.0), no_modifiers());
    core.on_pointer_move(pt(30.0, 0.0), no_modifiers());
    core.on_pointer_up(pt(30.0, 0.0), Button::Middle, no_modifiers());

    assert_eq!(core.camera().pan_x, 20.0);
    assert_eq!(core.camera().pan_y, -10.0);
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 0.0);
    assert!(!core.history.can_undo());
}

#[test]
fn shift_primary_pans() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, shift_modifier());
    assert!(matches!(core.input, InputState::Panning { .. }));
    assert!(core.selection().is_none());
}

#[test]
fn pan_tool_pans_with_primary() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Pan);
    drag(&mut core, pt(10.0, 10.0), &[pt(15.0, 12.0)]);
    assert_eq!((core.camera().pan_x, core.camera().pan_y), (5.0, 2.0));
}

#[test]
fn secondary_button_is_ignored() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    let actions = core.on_pointer_down(pt(10.0, 10.0), Button::Secondary, no_modifiers());
    assert!(actions.is_empty());
    assert!(core.selection().is_none());
}

// =============================================================
// Delete tool
// =============================================================

#[test]
fn delete_tool_requests_deletion_without_removing() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Delete);
    let actions = core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    assert!(has_action(&actions, |a| *a == Action::DeleteRequested { id: sid("a"), confirm: true }));
    assert!(core.sprite(&sid("a")).is_some());
    assert!(core.input.is_idle());
    assert!(!core.history.is_open());
}

#[test]
fn delete_request_honors_skip_confirm_preference() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.prefs.skip_delete_confirm = true;
    core.select(Some(sid("a")));
    let actions = core.on_key_down(Key::new("Delete"), no_modifiers());
    assert_eq!(actions, vec![Action::DeleteRequested { id: sid("a"), confirm: false }]);
}

// =============================================================
// Wheel
// =============================================================

#[test]
fn wheel_pans_by_negated_delta() {
    let mut core = core_with(&[]);
    core.on_wheel(pt(0.0, 0.0), wheel(5.0, 7.0), no_modifiers(), 0.0);
    assert_eq!((core.camera().pan_x, core.camera().pan_y), (-5.0, -7.0));
}

#[test]
fn shift_wheel_pans_horizontally() {
    let mut core = core_with(&[]);
    core.on_wheel(pt(0.0, 0.0), wheel(0.0, 30.0), shift_modifier(), 0.0);
    assert_eq!((core.camera().pan_x, core.camera().pan_y), (-30.0, 0.0));
}

#[test]
fn ctrl_wheel_zooms_about_cursor() {
    let mut core = core_with(&[]);
    core.scene.camera = Camera { pan_x: 13.0, pan_y: -7.0, zoom: 1.3 };
    let cursor = pt(200.0, 150.0);
    let before = core.screen_to_world(cursor);

    core.on_wheel(cursor, wheel(0.0, -100.0), ctrl_modifier(), 0.0);
    assert!(approx_eq(core.camera().zoom, 1.3 * 1.1));
    let after = core.screen_to_world(cursor);
    assert!(approx_eq(before.x, after.x));
    assert!(approx_eq(before.y, after.y));

    core.on_wheel(cursor, wheel(0.0, 100.0), ctrl_modifier(), 0.0);
    assert!(approx_eq(core.camera().zoom, 1.3 * 1.1 * 0.9));
}

#[test]
fn ctrl_wheel_zoom_respects_canvas_origin() {
    let mut core = core_with(&[]);
    core.set_origin(pt(100.0, 50.0));
    let cursor = pt(300.0, 250.0);
    let before = core.screen_to_world(cursor);
    core.on_wheel(cursor, wheel(0.0, -1.0), ctrl_modifier(), 0.0);
    let after = core.screen_to_world(cursor);
    assert!(approx_eq(before.x, after.x));
    assert!(approx_eq(before.y, after.y));
}

#[test]
fn zoom_is_clamped() {
    let mut core = core_with(&[]);
    for _ in 0..100 {
        core.on_wheel(pt(0.0, 0.0), wheel(0.0, -1.0), ctrl_modifier(), 0.0);
    }
    assert_eq!(core.camera().zoom, crate::consts::MAX_ZOOM);
}

#[test]
fn wheel_burst_on_rotate_tool_is_one_entry_after_idle() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Rotate);
    core.select(Some(sid("a")));

    for t in [0.0, 100.0, 200.0] {
        core.on_wheel(pt(0.0, 0.0), wheel(0.0, 100.0), no_modifiers(), t);
    }
    assert!(approx_eq(core.sprite(&sid("a")).unwrap().rotation, 9.0));
    assert!(core.wheel_batch_open());
    assert!(!core.history.can_undo());
    assert_eq!(core.camera(), Camera::default());

    // The window restarts on every tick: 200 + 180.
    assert!(core.poll_timers(379.0).is_empty());
    let actions = core.poll_timers(380.0);
    assert!(has_history_changed(&actions));
    assert!(!core.wheel_batch_open());
    assert_eq!(core.history.undo_len(), 1);

    core.undo();
    assert_eq!(core.sprite(&sid("a")).unwrap().rotation, 0.0);
}

#[test]
fn wheel_on_scale_tool_steps_scale() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Scale);
    core.select(Some(sid("a")));
    core.on_wheel(pt(0.0, 0.0), wheel(0.0, -1.0), no_modifiers(), 0.0);
    assert!(approx_eq(core.sprite(&sid("a")).unwrap().scale, 1.05));
    core.on_wheel(pt(0.0, 0.0), wheel(0.0, 1.0), no_modifiers(), 10.0);
    assert!(approx_eq(core.sprite(&sid("a")).unwrap().scale, 1.0));
}

#[test]
fn wheel_on_transform_tool_without_selection_pans() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Rotate);
    core.on_wheel(pt(0.0, 0.0), wheel(0.0, 10.0), no_modifiers(), 0.0);
    assert_eq!(core.camera().pan_y, -10.0);
    assert!(!core.wheel_batch_open());
}

#[test]
fn pointer_down_closes_wheel_batch() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Rotate);
    core.select(Some(sid("a")));
    core.on_wheel(pt(0.0, 0.0), wheel(0.0, 1.0), no_modifiers(), 0.0);
    let actions = core.on_pointer_down(pt(500.0, 500.0), Button::Primary, no_modifiers());
    assert!(has_history_changed(&actions));
    assert!(!core.wheel_batch_open());
    assert_eq!(core.history.undo_len(), 1);
}

#[test]
fn wheel_after_deadline_starts_new_batch() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Rotate);
    core.select(Some(sid("a")));
    core.on_wheel(pt(0.0, 0.0), wheel(0.0, 1.0), no_modifiers(), 0.0);
    // No frame polled in between; the late tick still closes the first burst.
    core.on_wheel(pt(0.0, 0.0), wheel(0.0, 1.0), no_modifiers(), 1000.0);
    core.poll_timers(2000.0);
    assert_eq!(core.history.undo_len(), 2);
}

// =============================================================
// Keyboard
// =============================================================

#[test]
fn arrow_burst_is_one_entry() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.select(Some(sid("a")));
    for _ in 0..3 {
        core.on_key_down(Key::new("ArrowRight"), no_modifiers());
    }
    core.on_key_down(Key::new("ArrowDown"), shift_modifier());
    assert!(!core.history.can_undo());
    let actions = core.on_key_up(Key::new("ArrowDown"), no_modifiers());
    assert!(has_history_changed(&actions));

    let s = core.sprite(&sid("a")).unwrap();
    assert_eq!((s.x, s.y), (3.0, 10.0));
    assert_eq!(core.history.undo_len(), 1);
}

#[test]
fn arrow_step_comes_from_preferences() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.prefs.nudge_step = 4.0;
    core.select(Some(sid("a")));
    core.on_key_down(Key::new("ArrowLeft"), no_modifiers());
    assert_eq!(core.sprite(&sid("a")).unwrap().x, -4.0);
}

#[test]
fn arrows_without_selection_do_nothing() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    let actions = core.on_key_down(Key::new("ArrowRight"), no_modifiers());
    assert!(actions.is_empty());
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 0.0);
}

#[test]
fn brackets_rotate_selection() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.select(Some(sid("a")));
    core.on_key_down(Key::new("]"), no_modifiers());
    core.on_key_down(Key::new("]"), no_modifiers());
    core.on_key_down(Key::new("["), no_modifiers());
    core.on_key_up(Key::new("["), no_modifiers());
    assert!(approx_eq(core.sprite(&sid("a")).unwrap().rotation, 3.0));
    assert_eq!(core.history.undo_len(), 1);
}

#[test]
fn pointer_down_closes_key_batch() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.select(Some(sid("a")));
    core.on_key_down(Key::new("ArrowRight"), no_modifiers());
    core.on_pointer_down(pt(500.0, 500.0), Button::Primary, no_modifiers());
    assert_eq!(core.history.undo_len(), 1);
}

#[test]
fn plus_and_minus_zoom_about_viewport_center() {
    let mut core = core_with(&[]);
    core.set_viewport(800.0, 600.0, 2.0);
    core.scene.camera = Camera { pan_x: 30.0, pan_y: 40.0, zoom: 1.0 };
    let center = pt(400.0, 300.0);
    let before = core.screen_to_world(center);

    core.on_key_down(Key::new("+"), no_modifiers());
    assert!(approx_eq(core.camera().zoom, 1.1));
    let after = core.screen_to_world(center);
    assert!(approx_eq(before.x, after.x));
    assert!(approx_eq(before.y, after.y));

    core.on_key_down(Key::new("-"), no_modifiers());
    assert!(approx_eq(core.camera().zoom, 1.0));
}

#[test]
fn ctrl_z_undoes_and_ctrl_shift_z_redoes() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    drag(&mut core, pt(10.0, 10.0), &[pt(40.0, 10.0)]);

    core.on_key_down(Key::new("z"), ctrl_modifier());
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 0.0);

    core.on_key_down(Key::new("Z"), Modifiers { ctrl: true, shift: true, ..Default::default() });
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 30.0);

    core.on_key_down(Key::new("z"), Modifiers { meta: true, ..Default::default() });
    core.on_key_down(Key::new("y"), ctrl_modifier());
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 30.0);
}

#[test]
fn undo_during_drag_resets_cursor() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(40.0, 10.0), no_modifiers());
    assert_eq!(core.cursor(), "grabbing");

    let actions = core.on_key_down(Key::new("z"), ctrl_modifier());
    assert!(core.input.is_idle());
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 0.0);
    assert_eq!(core.cursor(), "default");
    assert!(has_action(&actions, |a| *a == Action::SetCursor("default".into())));
}

#[test]
fn undo_with_open_key_batch_reverts_it() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.select(Some(sid("a")));
    core.on_key_down(Key::new("ArrowRight"), no_modifiers());
    core.on_key_down(Key::new("z"), ctrl_modifier());
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 0.0);
    assert!(core.history.can_redo());
}

// =============================================================
// Commands
// =============================================================

#[test]
fn place_sprite_is_topmost_selected_and_undoable() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0), card("b", 0.0, 0.0, 4.0)]);
    core.scene.camera.zoom = 2.0;
    let actions = core.place_sprite(AssetRef::new("card"), pt(100.0, 50.0));

    let placed = actions
        .iter()
        .find_map(|a| match a {
            Action::SpritePlaced(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!((placed.x, placed.y, placed.z), (50.0, 25.0, 5.0));
    assert_eq!(core.selection(), Some(&placed.id));
    assert_eq!(core.history.undo_len(), 1);

    let actions = core.undo();
    assert!(core.sprite(&placed.id).is_none());
    assert!(core.selection().is_none());
    assert!(has_action(&actions, |a| *a == Action::SelectionChanged(None)));
}

#[test]
fn place_into_empty_scene_gets_z_one() {
    let mut core = core_with(&[]);
    core.place_sprite(AssetRef::new("card"), pt(0.0, 0.0));
    assert_eq!(core.scene.sprites.max_z(), Some(1.0));
}

#[test]
fn edit_sprite_clamps_and_records_one_entry() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.edit_sprite(&sid("a"), SpritePatch { scale: Some(0.0), opacity: Some(0.4), ..Default::default() });
    let s = core.sprite(&sid("a")).unwrap();
    assert_eq!(s.scale, crate::consts::MIN_SCALE);
    assert_eq!(s.opacity, 0.4);
    assert_eq!(core.history.undo_len(), 1);
}

#[test]
fn edit_without_change_records_nothing() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    let actions = core.edit_sprite(&sid("a"), SpritePatch::position(0.0, 0.0));
    assert!(actions.is_empty());
    assert_eq!(core.history.undo_len(), 0);
}

#[test]
fn deleting_selected_sprite_clears_selection() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0), card("b", 200.0, 0.0, 2.0)]);
    core.select(Some(sid("a")));
    let actions = core.delete_sprite(&sid("a"));
    assert!(core.selection().is_none());
    assert!(has_action(&actions, |a| *a == Action::SelectionChanged(None)));
    assert!(has_action(&actions, |a| *a == Action::SpriteDeleted { id: sid("a") }));
}

#[test]
fn deleting_other_sprite_keeps_selection() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0), card("b", 200.0, 0.0, 2.0)]);
    core.select(Some(sid("a")));
    core.delete_sprite(&sid("b"));
    assert_eq!(core.selection(), Some(&sid("a")));
}

#[test]
fn deleting_hovered_sprite_clears_hover() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_move(pt(10.0, 10.0), no_modifiers());
    assert_eq!(core.hover(), Some(&sid("a")));
    core.delete_sprite(&sid("a"));
    assert!(core.hover().is_none());
    assert_eq!(core.cursor(), "default");
}

#[test]
fn delete_is_undoable() {
    let mut core = core_with(&[card("a", 5.0, 6.0, 1.0)]);
    core.delete_sprite(&sid("a"));
    core.undo();
    assert_eq!(core.sprite(&sid("a")).unwrap().x, 5.0);
}

#[test]
fn deleting_missing_sprite_is_noop() {
    let mut core = core_with(&[]);
    assert!(core.delete_sprite(&sid("nope")).is_empty());
    assert!(!core.history.can_undo());
}

#[test]
fn delete_during_drag_ends_the_gesture() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.on_pointer_down(pt(10.0, 10.0), Button::Primary, no_modifiers());
    core.on_pointer_move(pt(20.0, 10.0), no_modifiers());
    core.delete_sprite(&sid("a"));
    assert!(core.input.is_idle());
    // The drag and the delete are separate entries.
    assert_eq!(core.history.undo_len(), 2);
}

#[test]
fn z_order_commands_are_one_entry_each() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0), card("b", 0.0, 0.0, 2.0), card("c", 0.0, 0.0, 3.0)]);
    core.bring_to_front(&sid("a"));
    assert_eq!(core.scene.sprites.ordered().next_back().map(|s| &s.id), Some(&sid("a")));
    core.send_to_back(&sid("a"));
    assert_eq!(core.scene.sprites.ordered().next().map(|s| &s.id), Some(&sid("a")));
    core.raise_one_step(&sid("a"));
    core.lower_one_step(&sid("a"));
    assert_eq!(core.history.undo_len(), 4);
}

#[test]
fn raising_topmost_records_nothing() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0), card("b", 0.0, 0.0, 2.0)]);
    assert!(core.bring_to_front(&sid("b")).is_empty());
    assert!(core.raise_one_step(&sid("b")).is_empty());
    assert_eq!(core.history.undo_len(), 0);
}

// =============================================================
// Scene lifecycle
// =============================================================

#[test]
fn load_document_resets_history_and_selection() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    drag(&mut core, pt(10.0, 10.0), &[pt(20.0, 10.0)]);
    assert!(core.selection().is_some());

    let mut other = Scene::new();
    other.sprites.add(card("z", 1.0, 2.0, 3.0));
    let actions = core.load_document(SceneDocument::from_scene(&other)).unwrap();

    assert!(core.selection().is_none());
    assert!(!core.history.can_undo());
    assert!(core.sprite(&sid("z")).is_some());
    assert!(has_action(&actions, |a| *a == Action::HistoryChanged { can_undo: false, can_redo: false }));
}

#[test]
fn failed_load_keeps_current_scene() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    let mut doc = core.to_document();
    doc.sprites.push(doc.sprites[0].clone());
    assert!(core.load_document(doc).is_err());
    assert!(core.sprite(&sid("a")).is_some());
}

#[test]
fn to_document_reflects_scene() {
    let mut core = core_with(&[card("a", 3.0, 4.0, 1.0)]);
    core.set_background(Some(AssetRef::new("bg")));
    let doc = core.to_document();
    assert_eq!(doc.background_ref, Some(AssetRef::new("bg")));
    assert_eq!(doc.sprites.len(), 1);
    assert_eq!(doc.sprites[0].x, 3.0);
}

#[test]
fn invalid_map_size_is_ignored() {
    let mut core = core_with(&[]);
    assert!(core.set_map_size(MapSize { w: 0.0, h: 100.0 }).is_empty());
    assert_eq!(core.scene.map_size, MapSize::default());
    core.set_map_size(MapSize { w: 640.0, h: 480.0 });
    assert_eq!(core.scene.map_size, MapSize { w: 640.0, h: 480.0 });
}

// =============================================================
// Cursor
// =============================================================

#[test]
fn cursor_follows_tool() {
    let mut core = core_with(&[]);
    assert_eq!(core.set_tool(Tool::Pan), vec![Action::SetCursor("grab".into())]);
    assert_eq!(core.set_tool(Tool::Delete), vec![Action::SetCursor("not-allowed".into())]);
    assert_eq!(core.set_tool(Tool::Select), vec![Action::SetCursor("default".into())]);
}

#[test]
fn cursor_reflects_hover_per_tool() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_tool(Tool::Scale);
    core.on_pointer_move(pt(10.0, 10.0), no_modifiers());
    assert_eq!(core.cursor(), "nwse-resize");
    core.set_tool(Tool::Rotate);
    assert_eq!(core.cursor(), "crosshair");
    core.on_pointer_move(pt(500.0, 500.0), no_modifiers());
    assert_eq!(core.cursor(), "default");
}

// =============================================================
// Viewport / rendering
// =============================================================

#[test]
fn set_viewport_stores_dimensions() {
    let mut core = core_with(&[]);
    core.set_viewport(1024.0, 768.0, 1.5);
    assert_eq!(core.viewport, Viewport { width: 1024.0, height: 768.0, dpr: 1.5 });
    core.set_viewport(10.0, 10.0, f64::NAN);
    assert_eq!(core.viewport.dpr, 1.0);
}

#[test]
fn render_draws_loaded_sprites() {
    let mut core = core_with(&[card("a", 0.0, 0.0, 1.0)]);
    core.set_viewport(800.0, 600.0, 1.0);
    let mut surface = RecordingSurface::new();
    core.render(&mut surface).unwrap();
    assert_eq!(surface.images(), vec!["card"]);
    assert!(surface.balanced());
}

#[test]
fn export_request_uses_export_preferences() {
    let mut core = core_with(&[]);
    core.prefs.export_scale = 0.5;
    core.prefs.export_transparent = true;
    let req = core.export_request();
    assert_eq!(req.scale, 0.5);
    assert!(req.transparent);
    assert_eq!(req.size().unwrap(), crate::export::ExportSize { width: 512, height: 384 });
}
