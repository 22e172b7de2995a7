//! Tests for Dispatcher module

use super::*;
use crate::config::InteractionMode;
use crate::projection::Quaternion;
use crate::protocol::flags;
use crate::sink::{PointerButton, RecordingSink, SinkCommand};

const MID_HEIGHT: f32 = 1.465;

fn make_dispatcher(config: AppConfig) -> (Dispatcher, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::new());
    let dispatcher = Dispatcher::new(config, sink.clone()).unwrap();
    (dispatcher, sink)
}

fn names(sink: &RecordingSink) -> Vec<&'static str> {
    sink.take().iter().map(|c| c.name()).collect()
}

fn count(commands: &[SinkCommand], name: &str) -> usize {
    commands.iter().filter(|c| c.name() == name).count()
}

fn wand_packet(flags: u32, timestamp: u32) -> Vec<u8> {
    RawEvent::new(ServiceType::Wand, EventType::Update)
        .with_source(1)
        .with_timestamp(timestamp)
        .with_flags(flags)
        .with_position(0.0, MID_HEIGHT, 0.0)
        .with_orientation(1.0, 0.0, 0.0, 0.0)
        .encode()
}

fn wand_off_wall_packet(flags: u32) -> Vec<u8> {
    RawEvent::new(ServiceType::Wand, EventType::Update)
        .with_source(1)
        .with_flags(flags)
        .with_position(0.0, 10.0, 0.0)
        .with_orientation(1.0, 0.0, 0.0, 0.0)
        .encode()
}

fn wand_yaw_packet(flags: u32, yaw: f64) -> Vec<u8> {
    let q = Quaternion::from_yaw(yaw);
    RawEvent::new(ServiceType::Wand, EventType::Update)
        .with_source(1)
        .with_flags(flags)
        .with_position(0.0, MID_HEIGHT, 0.0)
        .with_orientation(q.w as f32, q.x as f32, q.y as f32, q.z as f32)
        .encode()
}

/// Unsmoothed pixel position the dispatcher computes for a wand packet
fn wand_pixels(dispatcher: &Dispatcher, packet: &[u8]) -> (f64, f64) {
    let event = RawEvent::decode(packet);
    let projected = dispatcher
        .calculator
        .project(event.position().unwrap(), event.orientation().unwrap());
    assert!(projected.is_valid());
    let wall = &dispatcher.config().wall;
    (projected.x * wall.total_width, projected.y * wall.total_height)
}

fn assert_near(actual: (f64, f64), expected: (f64, f64)) {
    assert!(
        (actual.0 - expected.0).abs() < 1e-6 && (actual.1 - expected.1).abs() < 1e-6,
        "{:?} != {:?}",
        actual,
        expected
    );
}

fn touch(event_type: EventType, source: u32, x: f32, y: f32) -> RawEvent {
    RawEvent::new(ServiceType::Pointer, event_type)
        .with_source(source)
        .with_position(x, y, 0.0)
}

fn zoom(source: u32, x: f32, y: f32, delta: f32, sub: EventType) -> RawEvent {
    touch(EventType::Zoom, source, x, y)
        .with_extra(ExtraData::Floats(vec![delta, sub.code() as f32]))
}

#[test]
fn test_wand_click_drag_is_edge_triggered() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    for (i, f) in [0, flags::BUTTON1, flags::BUTTON1, 0].into_iter().enumerate() {
        dispatcher.handle_packet(&wand_packet(f, i as u32 * 16));
    }

    let commands = sink.take();
    assert_eq!(count(&commands, "pointerPress"), 1);
    assert_eq!(count(&commands, "pointerMove"), 1);
    assert_eq!(count(&commands, "pointerRelease"), 1);
    assert_eq!(
        commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
        vec![
            "createSagePointer",
            "showPointer",
            "pointerPosition",
            "pointerPress",
            "pointerMove",
            "pointerRelease",
        ]
    );
    assert_eq!(dispatcher.wands[&1].state(), WandState::Idle);
    assert_eq!(dispatcher.wands[&1].last_flags(), 0);
}

#[test]
fn test_wand_second_button_cannot_double_press() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    let sequence = [
        flags::BUTTON1,
        flags::BUTTON1 | flags::BUTTON2,
        flags::BUTTON2,
        0,
    ];
    for f in sequence {
        dispatcher.handle_packet(&wand_packet(f, 0));
    }

    let commands = sink.take();
    assert_eq!(count(&commands, "pointerPress"), 1);
    assert_eq!(count(&commands, "pointerRelease"), 1);
}

#[test]
fn test_wand_menu_uses_right_button() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_packet(&wand_packet(flags::BUTTON2, 0));
    dispatcher.handle_packet(&wand_packet(0, 16));

    let buttons: Vec<PointerButton> = sink
        .take()
        .into_iter()
        .filter_map(|c| match c {
            SinkCommand::PointerPress { button, .. } | SinkCommand::PointerRelease { button, .. } => {
                Some(button)
            }
            _ => None,
        })
        .collect();
    assert_eq!(buttons, vec![PointerButton::Right, PointerButton::Right]);
}

#[test]
fn test_wand_scale_buttons_scroll() {
    let mut config = AppConfig::default();
    config.wand.scale_delta = 25;
    let (mut dispatcher, sink) = make_dispatcher(config);

    for f in [flags::BUTTON_UP, flags::BUTTON_UP, 0, flags::BUTTON_DOWN, flags::BUTTON_DOWN, 0] {
        dispatcher.handle_packet(&wand_packet(f, 0));
    }

    let deltas: Vec<i32> = sink
        .take()
        .into_iter()
        .filter_map(|c| match c {
            SinkCommand::PointerScroll { wheel_delta, .. } => Some(wheel_delta),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, vec![-25, 25]);
}

#[test]
fn test_wand_discrete_buttons() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_packet(&wand_packet(0, 0));
    sink.take();

    dispatcher.handle_packet(&wand_packet(flags::BUTTON_RIGHT, 0));
    dispatcher.handle_packet(&wand_packet(flags::BUTTON_RIGHT, 0));
    dispatcher.handle_packet(&wand_packet(0, 0));
    dispatcher.handle_packet(&wand_packet(flags::BUTTON4, 0));
    dispatcher.handle_packet(&wand_packet(flags::BUTTON5, 0));

    let codes: Vec<(&'static str, u32)> = sink
        .take()
        .iter()
        .filter_map(|c| match c {
            SinkCommand::KeyDown { code, .. }
            | SinkCommand::KeyUp { code, .. }
            | SinkCommand::KeyPress { code, .. } => Some((c.name(), *code)),
            _ => None,
        })
        .collect();
    assert_eq!(codes, vec![("keyDown", 39), ("keyUp", 39), ("keyPress", 32)]);
    // Maximize
    dispatcher.handle_packet(&wand_packet(0, 0));
    dispatcher.handle_packet(&wand_packet(flags::BUTTON5, 0));
    assert!(names(&sink).contains(&"pointerDblClick"));
}

#[test]
fn test_wand_show_hide_toggle() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_packet(&wand_packet(0, 0));
    sink.take();

    dispatcher.handle_packet(&wand_packet(flags::BUTTON3, 0));
    dispatcher.handle_packet(&wand_packet(0, 0));
    dispatcher.handle_packet(&wand_packet(flags::BUTTON3, 0));

    assert_eq!(
        names(&sink),
        vec!["hidePointer", "pointerPosition", "showPointer"]
    );
}

#[test]
fn test_wand_off_wall_hides_once_and_returns() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    dispatcher.handle_packet(&wand_packet(0, 0));
    dispatcher.handle_packet(&wand_off_wall_packet(0));
    dispatcher.handle_packet(&wand_off_wall_packet(0));
    dispatcher.handle_packet(&wand_packet(0, 16));

    assert_eq!(
        names(&sink),
        vec![
            "createSagePointer",
            "showPointer",
            "pointerPosition",
            "hidePointer",
            "showPointer",
            "pointerPosition",
        ]
    );
}

#[test]
fn test_wand_release_off_wall_uses_last_position() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    dispatcher.handle_packet(&wand_packet(flags::BUTTON1, 0));
    dispatcher.handle_packet(&wand_off_wall_packet(0));

    let commands = sink.take();
    let press = commands.iter().find(|c| c.name() == "pointerPress").cloned();
    let release = commands.iter().find(|c| c.name() == "pointerRelease").cloned();
    match (press, release) {
        (
            Some(SinkCommand::PointerPress { x: px, y: py, .. }),
            Some(SinkCommand::PointerRelease { x: rx, y: ry, .. }),
        ) => {
            assert_eq!((px, py), (rx, ry));
        }
        other => panic!("expected press and release, got {:?}", other),
    }
}

#[test]
fn test_wand_never_on_wall_is_silent() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    dispatcher.handle_packet(&wand_off_wall_packet(flags::BUTTON1));
    assert!(sink.is_empty());

    // The held button becomes a press once the wand reaches the wall
    dispatcher.handle_packet(&wand_packet(flags::BUTTON1, 0));
    assert_eq!(
        names(&sink),
        vec!["createSagePointer", "showPointer", "pointerPress"]
    );
}

#[test]
fn test_wand_edges_table() {
    let buttons = crate::config::WandButtonMap::default();
    let edges = WandAction::edges(&buttons, flags::BUTTON1 | flags::BUTTON2, flags::BUTTON1 | flags::BUTTON3);
    assert_eq!(
        edges,
        vec![
            WandEdge { action: WandAction::ClickDrag, kind: EdgeKind::Held },
            WandEdge { action: WandAction::Menu, kind: EdgeKind::Released },
            WandEdge { action: WandAction::ShowHide, kind: EdgeKind::Pressed },
        ]
    );
    assert!(WandAction::edges(&buttons, flags::CTRL, 0).is_empty());
}

#[test]
fn test_touch_lifecycle() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    dispatcher.handle_event(&touch(EventType::Down, 3, 0.5, 0.5));
    dispatcher.handle_event(&touch(EventType::Move, 3, 0.6, 0.5));
    dispatcher.handle_event(&touch(EventType::Up, 3, 0.6, 0.5));

    let commands = sink.take();
    assert_eq!(
        commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
        vec![
            "createSagePointer",
            "showPointer",
            "pointerPosition",
            "pointerPress",
            "pointerPosition",
            "pointerMove",
            "pointerRelease",
            "hidePointer",
        ]
    );
    assert_eq!(
        commands[3],
        SinkCommand::PointerPress {
            id: "touch3".into(),
            x: 960.0,
            y: 540.0,
            button: PointerButton::Left,
        }
    );
    assert!(dispatcher.touches.is_empty());
}

#[test]
fn test_touch_offset_is_applied() {
    let mut config = AppConfig::default();
    config.omicron.touch_offset = [10.0, -20.0];
    let (mut dispatcher, sink) = make_dispatcher(config);

    dispatcher.handle_event(&touch(EventType::Down, 1, 0.25, 0.5));
    let press = sink.take().into_iter().find(|c| c.name() == "pointerPress");
    assert_eq!(
        press,
        Some(SinkCommand::PointerPress {
            id: "touch1".into(),
            x: 490.0,
            y: 520.0,
            button: PointerButton::Left,
        })
    );
}

#[test]
fn test_three_finger_right_click() {
    let mut config = AppConfig::default();
    config.omicron.enable_three_finger_right_click = true;
    let (mut dispatcher, sink) = make_dispatcher(config);

    dispatcher.handle_event(
        &touch(EventType::Down, 1, 0.5, 0.5).with_flags(flags::THREE_FINGER_HOLD),
    );
    dispatcher.handle_event(&touch(EventType::Up, 1, 0.5, 0.5));

    let commands = sink.take();
    assert!(commands.iter().any(|c| matches!(
        c,
        SinkCommand::PointerPress { button: PointerButton::Right, .. }
    )));
    assert!(commands.iter().any(|c| matches!(
        c,
        SinkCommand::PointerRelease { button: PointerButton::Right, .. }
    )));
}

#[test]
fn test_app_interaction_mode_changes_pointer_mode() {
    let mut config = AppConfig::default();
    config.omicron.interaction_mode = InteractionMode::App;
    let (mut dispatcher, sink) = make_dispatcher(config);

    dispatcher.handle_event(&touch(EventType::Down, 1, 0.5, 0.5));
    assert_eq!(
        names(&sink),
        vec![
            "createSagePointer",
            "showPointer",
            "pointerChangeMode",
            "pointerPosition",
            "pointerPress",
        ]
    );
}

#[test]
fn test_repeated_down_releases_first() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_event(&touch(EventType::Down, 1, 0.5, 0.5));
    sink.take();

    dispatcher.handle_event(&touch(EventType::Down, 1, 0.4, 0.4));
    let commands = sink.take();
    assert_eq!(commands[0].name(), "pointerRelease");
    assert_eq!(commands[1].name(), "hidePointer");
    assert_eq!(count(&commands, "pointerPress"), 1);
}

#[test]
fn test_accelerated_touch_drag_toggle() {
    let mut config = AppConfig::default();
    config.omicron.accelerated_drag_scale = 1.0;
    let (mut dispatcher, sink) = make_dispatcher(config.clone());

    dispatcher.handle_event(&touch(EventType::Down, 1, 0.5, 0.5));
    dispatcher.handle_event(&touch(EventType::Move, 1, 0.625, 0.5));
    let moved = sink.take().into_iter().find(|c| c.name() == "pointerMove");
    assert!(matches!(moved, Some(SinkCommand::PointerMove { x, .. }) if x == 1200.0));

    config.omicron.accelerated_touch_drag = true;
    let (mut dispatcher, sink) = make_dispatcher(config);
    dispatcher.handle_event(&touch(EventType::Down, 1, 0.5, 0.5));
    dispatcher.handle_event(&touch(EventType::Move, 1, 0.625, 0.5));
    let moved = sink.take().into_iter().find(|c| c.name() == "pointerMove");
    assert!(matches!(moved, Some(SinkCommand::PointerMove { x, .. }) if x == 1440.0));
}

#[test]
fn test_double_click_requires_option() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_event(&touch(EventType::DoubleClick, 1, 0.5, 0.5));
    assert!(sink.is_empty());
    assert_eq!(dispatcher.stats().ignored, 1);

    let mut config = AppConfig::default();
    config.omicron.enable_double_click_maximize = true;
    let (mut dispatcher, sink) = make_dispatcher(config);
    dispatcher.handle_event(&touch(EventType::DoubleClick, 1, 0.5, 0.5));
    assert_eq!(names(&sink), vec!["pointerDblClick"]);
}

#[test]
fn test_five_finger_hold_closes_once() {
    let mut config = AppConfig::default();
    config.omicron.enable_five_finger_close_app = true;
    let (mut dispatcher, sink) = make_dispatcher(config);

    dispatcher.handle_event(&touch(EventType::Down, 1, 0.5, 0.5));
    for _ in 0..3 {
        dispatcher.handle_event(
            &touch(EventType::Move, 1, 0.5, 0.5).with_flags(flags::FIVE_FINGER_HOLD),
        );
    }
    dispatcher.handle_event(&touch(EventType::Up, 1, 0.5, 0.5));

    let commands = sink.take();
    assert_eq!(count(&commands, "closeApplication"), 1);
    // The press is released before closing, not again on up
    assert_eq!(count(&commands, "pointerRelease"), 1);
    assert_eq!(count(&commands, "pointerMove"), 0);
}

#[test]
fn test_zoom_scrolls_with_scaled_delta() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    dispatcher.handle_event(&zoom(2, 0.5, 0.5, 0.0, EventType::Down));
    dispatcher.handle_event(&zoom(2, 0.5, 0.5, 0.01, EventType::Move));
    dispatcher.handle_event(&zoom(2, 0.5, 0.5, 0.0, EventType::Up));

    let commands = sink.take();
    assert_eq!(
        commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
        vec![
            "createSagePointer",
            "showPointer",
            "pointerScrollStart",
            "pointerScroll",
            "pointerScrollEnd",
            "hidePointer",
        ]
    );
    assert!(matches!(
        commands[3],
        SinkCommand::PointerScroll { wheel_delta: -20, .. }
    ));
}

#[test]
fn test_zoom_reclassified_as_move() {
    let mut config = AppConfig::default();
    config.omicron.enable_two_finger_window_drag = true;
    let (mut dispatcher, sink) = make_dispatcher(config);

    dispatcher.handle_event(&zoom(2, 0.5, 0.5, 0.0, EventType::Down));
    // 19px: still a zoom
    dispatcher.handle_event(&zoom(2, 0.51, 0.5, 0.01, EventType::Move));
    // 192px: becomes a drag
    dispatcher.handle_event(&zoom(2, 0.6, 0.5, 0.01, EventType::Move));
    dispatcher.handle_event(&zoom(2, 0.65, 0.5, 0.01, EventType::Move));
    dispatcher.handle_event(&zoom(2, 0.7, 0.5, 0.01, EventType::Move));

    let commands = sink.take();
    assert_eq!(
        commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
        vec![
            "createSagePointer",
            "showPointer",
            "pointerScrollStart",
            "pointerScroll",
            "pointerScrollEnd",
            "pointerRelease",
            "pointerPress",
            "pointerMove",
            "pointerMove",
        ]
    );

    dispatcher.handle_event(&zoom(2, 0.7, 0.5, 0.0, EventType::Up));
    assert_eq!(names(&sink), vec!["pointerRelease", "hidePointer"]);
    assert!(dispatcher.touches.is_empty());
}

#[test]
fn test_zoom_stays_zoom_without_window_drag() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    dispatcher.handle_event(&zoom(2, 0.5, 0.5, 0.0, EventType::Down));
    dispatcher.handle_event(&zoom(2, 0.9, 0.5, 0.01, EventType::Move));

    let commands = sink.take();
    assert_eq!(count(&commands, "pointerScroll"), 1);
    assert_eq!(count(&commands, "pointerPress"), 0);
}

#[test]
fn test_zoom_without_sub_type_is_ignored() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_event(&touch(EventType::Zoom, 2, 0.5, 0.5).with_extra(ExtraData::Floats(vec![0.1])));
    assert!(sink.is_empty());
    assert_eq!(dispatcher.stats().ignored, 1);
}

#[test]
fn test_truncated_packet_is_a_no_op() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    let full = touch(EventType::Down, 1, 0.5, 0.5).encode();
    // timestamp, sourceId, serviceId, serviceType
    dispatcher.handle_packet(&full[..16]);
    dispatcher.handle_packet(&[]);
    dispatcher.handle_packet(&full[..30]);

    assert!(sink.is_empty());
    assert_eq!(
        dispatcher.stats(),
        DispatchStats { packets: 3, dispatched: 0, ignored: 3 }
    );
}

#[test]
fn test_touch_without_position_is_ignored() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    let full = touch(EventType::Down, 1, 0.5, 0.5).encode();
    // Through flags, before posx
    dispatcher.handle_packet(&full[..24]);
    assert!(sink.is_empty());
}

#[test]
fn test_skeleton_forwarded() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    let joints = vec![[0.0f32, 1.0, 2.0]; 29];
    dispatcher.handle_event(
        &RawEvent::new(ServiceType::Mocap, EventType::Update)
            .with_source(5)
            .with_extra(ExtraData::Vectors3(joints)),
    );
    // Single marker
    dispatcher.handle_event(
        &RawEvent::new(ServiceType::Mocap, EventType::Update)
            .with_source(6)
            .with_position(1.0, 2.0, 3.0),
    );

    let commands = sink.take();
    assert_eq!(commands.len(), 1);
    match &commands[0] {
        SinkCommand::KinectInput { source_id, skeleton } => {
            assert_eq!(*source_id, 5);
            assert_eq!(skeleton.joints.len(), 29);
        }
        other => panic!("unexpected command {:?}", other),
    }
}

#[test]
fn test_keyboard_targets_last_pointer() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    let key = |event_type| RawEvent::new(ServiceType::Keyboard, event_type).with_source(65);
    dispatcher.handle_event(&key(EventType::Down));
    assert!(sink.is_empty());

    dispatcher.handle_event(&touch(EventType::Down, 4, 0.5, 0.5));
    sink.take();
    dispatcher.handle_event(&key(EventType::Down));
    dispatcher.handle_event(&key(EventType::Up));

    assert_eq!(
        sink.take(),
        vec![
            SinkCommand::KeyDown { id: "touch4".into(), x: 960.0, y: 540.0, code: 65 },
            SinkCommand::KeyUp { id: "touch4".into(), x: 960.0, y: 540.0, code: 65 },
        ]
    );
}

#[test]
fn test_unknown_service_is_dropped() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_event(&RawEvent::new(ServiceType::Unknown(42), EventType::Down));
    dispatcher.handle_event(&RawEvent::new(ServiceType::Brain, EventType::Update));
    assert!(sink.is_empty());
    assert_eq!(dispatcher.stats().ignored, 2);
}

#[test]
fn test_speech_is_logged_only() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_event(
        &RawEvent::new(ServiceType::Speech, EventType::Update)
            .with_extra(ExtraData::KinectSpeech("next slide".into())),
    );
    assert!(sink.is_empty());
    assert_eq!(dispatcher.stats().dispatched, 1);
}

#[test]
fn test_update_config_keeps_state_and_rejects_invalid() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_packet(&wand_packet(flags::BUTTON1, 0));
    sink.take();

    let mut config = AppConfig::default();
    config.wand.smoothing = false;
    config.omicron.enable_two_finger_window_drag = true;
    dispatcher.update_config(config).unwrap();
    assert!(dispatcher.config().omicron.enable_two_finger_window_drag);

    // Drag still in progress after reload
    dispatcher.handle_packet(&wand_packet(0, 16));
    assert_eq!(names(&sink), vec!["pointerRelease"]);

    let mut bad = AppConfig::default();
    bad.geometry.radius = -1.0;
    assert!(dispatcher.update_config(bad).is_err());
    assert!(dispatcher.config().omicron.enable_two_finger_window_drag);
}

#[test]
fn test_wand_drag_is_accelerated() {
    let mut config = AppConfig::default();
    config.wand.smoothing = false;
    config.omicron.accelerated_drag_scale = 0.5;
    let (mut dispatcher, sink) = make_dispatcher(config);

    let press = wand_yaw_packet(flags::BUTTON1, 0.0);
    let held = wand_yaw_packet(flags::BUTTON1, -0.1);
    let released = wand_yaw_packet(0, -0.2);
    let origin = wand_pixels(&dispatcher, &press);
    let held_pos = wand_pixels(&dispatcher, &held);
    let released_pos = wand_pixels(&dispatcher, &released);
    assert!((held_pos.0 - origin.0).abs() > 1.0);

    for packet in [&press, &held, &released] {
        dispatcher.handle_packet(packet);
    }

    let expected = |pos: (f64, f64)| {
        (
            origin.0 + (pos.0 - origin.0) * 1.5,
            origin.1 + (pos.1 - origin.1) * 1.5,
        )
    };
    let commands = sink.take();
    let moved = commands.iter().find_map(|c| match c {
        SinkCommand::PointerMove { x, y, .. } => Some((*x, *y)),
        _ => None,
    });
    let release = commands.iter().find_map(|c| match c {
        SinkCommand::PointerRelease { x, y, .. } => Some((*x, *y)),
        _ => None,
    });
    assert_near(moved.unwrap(), expected(held_pos));
    assert_near(release.unwrap(), expected(released_pos));
}

#[test]
fn test_zoom_drag_is_accelerated() {
    let mut config = AppConfig::default();
    config.omicron.enable_two_finger_window_drag = true;
    config.omicron.accelerated_drag_scale = 1.0;
    let (mut dispatcher, sink) = make_dispatcher(config);

    // Starts at (960, 540); 192px away turns it into a drag
    dispatcher.handle_event(&zoom(2, 0.5, 0.5, 0.0, EventType::Down));
    dispatcher.handle_event(&zoom(2, 0.6, 0.5, 0.01, EventType::Move));
    dispatcher.handle_event(&zoom(2, 0.625, 0.5, 0.01, EventType::Move));
    dispatcher.handle_event(&zoom(2, 0.625, 0.5, 0.0, EventType::Up));

    let commands = sink.take();
    // 960 + (1200 - 960) * 2
    assert!(commands.iter().any(|c| matches!(
        c,
        SinkCommand::PointerMove { x, y, .. } if *x == 1440.0 && *y == 540.0
    )));
    assert!(matches!(
        commands.iter().rev().nth(1),
        Some(SinkCommand::PointerRelease { x, button: PointerButton::Left, .. }) if *x == 1440.0
    ));
}

#[test]
fn test_touch_up_ends_zoom() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());

    dispatcher.handle_event(&zoom(2, 0.5, 0.5, 0.0, EventType::Down));
    sink.take();
    dispatcher.handle_event(&touch(EventType::Up, 2, 0.5, 0.5));

    assert_eq!(names(&sink), vec!["pointerScrollEnd", "hidePointer"]);
    assert!(dispatcher.touches.is_empty());
}

#[test]
fn test_touch_up_ends_window_drag() {
    let mut config = AppConfig::default();
    config.omicron.enable_two_finger_window_drag = true;
    let (mut dispatcher, sink) = make_dispatcher(config);

    dispatcher.handle_event(&zoom(2, 0.5, 0.5, 0.0, EventType::Down));
    dispatcher.handle_event(&zoom(2, 0.6, 0.5, 0.01, EventType::Move));
    sink.take();
    dispatcher.handle_event(&touch(EventType::Up, 2, 0.6, 0.5));

    let commands = sink.take();
    assert_eq!(
        commands.iter().map(|c| c.name()).collect::<Vec<_>>(),
        vec!["pointerRelease", "hidePointer"]
    );
    assert!(matches!(
        commands[0],
        SinkCommand::PointerRelease { button: PointerButton::Left, .. }
    ));
    assert!(dispatcher.touches.is_empty());
}

#[test]
fn test_update_config_restyles_visible_wands() {
    let (mut dispatcher, sink) = make_dispatcher(AppConfig::default());
    dispatcher.handle_packet(&wand_packet(0, 0));
    sink.take();

    // Unchanged style: nothing re-sent
    dispatcher.update_config(AppConfig::default()).unwrap();
    assert!(sink.is_empty());

    let mut config = AppConfig::default();
    config.omicron.wand_color = "rgba(0, 0, 255, 1.0)".to_string();
    dispatcher.update_config(config).unwrap();

    let commands = sink.take();
    assert_eq!(commands.len(), 1);
    assert!(matches!(
        &commands[0],
        SinkCommand::ShowPointer { id, style } if id == "wand1" && style.color == "rgba(0, 0, 255, 1.0)"
    ));
}
