//! Touch pointers and two-finger gestures

use super::{accelerate, Dispatcher};
use crate::config::InteractionMode;
use crate::protocol::{flags, EventType, RawEvent};
use crate::sink::{PointerButton, PointerStyle, SourceType};
use tracing::debug;

/// What a tracked touch is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TouchMode {
    /// Single touch, pressed on down
    Press,
    /// Two-finger gesture scrolling
    Zoom,
    /// Two-finger gesture reclassified as a window drag
    Move,
}

#[derive(Debug, Clone)]
pub(crate) struct TouchPointer {
    pub id: String,
    pub init_pos: (f64, f64),
    pub last_pos: (f64, f64),
    pub button: Option<PointerButton>,
    pub mode: TouchMode,
    pub close_sent: bool,
}

impl TouchPointer {
    fn new(source_id: u32, pos: (f64, f64), mode: TouchMode) -> Self {
        Self {
            id: touch_id(source_id),
            init_pos: pos,
            last_pos: pos,
            button: None,
            mode,
            close_sent: false,
        }
    }
}

pub(crate) fn touch_id(source_id: u32) -> String {
    format!("touch{}", source_id)
}

impl Dispatcher {
    /// Handle a Pointer service event; false when it was not usable
    pub(super) fn handle_touch(
        &mut self,
        source_id: u32,
        event_type: EventType,
        event: &RawEvent,
    ) -> bool {
        let (Some(x), Some(y)) = (event.posx, event.posy) else {
            debug!("Touch event {} without position", source_id);
            return false;
        };
        let pos = self.touch_pixels(x as f64, y as f64);
        let event_flags = event.flags.unwrap_or_default();

        match event_type {
            EventType::Down => self.touch_down(source_id, pos, event_flags),
            EventType::Move => self.touch_move(source_id, pos, event_flags),
            EventType::Up => self.touch_up(source_id, pos),
            EventType::DoubleClick => self.touch_double_click(source_id, pos),
            EventType::Zoom => self.touch_zoom(source_id, pos, event),
            _ => false,
        }
    }

    /// Normalized wall position to pixels, plus the configured offset
    fn touch_pixels(&self, x: f64, y: f64) -> (f64, f64) {
        let offset = self.config.omicron.touch_offset;
        (
            x * self.config.wall.total_width + offset[0],
            y * self.config.wall.total_height + offset[1],
        )
    }

    fn touch_style(&self, source_id: u32) -> PointerStyle {
        PointerStyle {
            label: format!("Touch: {}", source_id),
            color: self.config.omicron.touch_color.clone(),
            source_type: SourceType::Touch,
            style: self.config.omicron.style.clone(),
        }
    }

    /// Create and show the pointer for a new touch
    fn open_touch(&mut self, source_id: u32, pos: (f64, f64), mode: TouchMode) -> TouchPointer {
        // A down for a source still pressed means its up was lost
        if let Some(stale) = self.touches.remove(&source_id) {
            debug!("Touch {} pressed again before release", source_id);
            self.close_touch(&stale, stale.last_pos);
        }

        let pointer = TouchPointer::new(source_id, pos, mode);
        self.sink.create_sage_pointer(&pointer.id);
        self.sink.show_pointer(&pointer.id, self.touch_style(source_id));
        if self.config.omicron.interaction_mode == InteractionMode::App {
            self.sink.pointer_change_mode(&pointer.id);
        }
        pointer
    }

    /// End whatever the touch was doing and hide it
    fn close_touch(&mut self, pointer: &TouchPointer, pos: (f64, f64)) {
        match pointer.mode {
            TouchMode::Zoom => self.sink.pointer_scroll_end(&pointer.id, pos.0, pos.1),
            TouchMode::Press | TouchMode::Move => {
                if let Some(button) = pointer.button {
                    self.sink.pointer_release(&pointer.id, pos.0, pos.1, button);
                }
            }
        }
        self.sink.hide_pointer(&pointer.id);
    }

    fn touch_down(&mut self, source_id: u32, pos: (f64, f64), event_flags: u32) -> bool {
        let mut pointer = self.open_touch(source_id, pos, TouchMode::Press);

        self.sink.pointer_position(&pointer.id, pos.0, pos.1);
        if !self.check_close_gesture(&mut pointer, pos, event_flags) {
            let button = if self.config.omicron.enable_three_finger_right_click
                && event_flags & flags::THREE_FINGER_HOLD != 0
            {
                PointerButton::Right
            } else {
                PointerButton::Left
            };
            self.sink.pointer_press(&pointer.id, pos.0, pos.1, button);
            pointer.button = Some(button);
        }
        gesture_log!(self, "👆 Touch {} down at ({:.0}, {:.0})", source_id, pos.0, pos.1);

        self.remember_pointer(&pointer.id, pos.0, pos.1);
        self.touches.insert(source_id, pointer);
        true
    }

    fn touch_move(&mut self, source_id: u32, pos: (f64, f64), event_flags: u32) -> bool {
        let Some(mut pointer) = self.touches.remove(&source_id) else {
            debug!("Touch {} moved without a down", source_id);
            return false;
        };
        if pointer.mode != TouchMode::Press {
            // Gesture pointers only follow Zoom events
            self.touches.insert(source_id, pointer);
            return false;
        }

        let single = event_flags == 0 || event_flags & flags::SINGLE_TOUCH != 0;
        let pos = if self.config.omicron.accelerated_touch_drag && single {
            accelerate(pointer.init_pos, pos, self.config.omicron.accelerated_drag_scale)
        } else {
            pos
        };

        self.sink.pointer_position(&pointer.id, pos.0, pos.1);
        if !self.check_close_gesture(&mut pointer, pos, event_flags) {
            if let Some(button) = pointer.button {
                self.sink.pointer_move(&pointer.id, pos.0, pos.1, button);
            }
        }

        pointer.last_pos = pos;
        self.remember_pointer(&pointer.id, pos.0, pos.1);
        self.touches.insert(source_id, pointer);
        true
    }

    fn touch_up(&mut self, source_id: u32, pos: (f64, f64)) -> bool {
        let Some(pointer) = self.touches.remove(&source_id) else {
            debug!("Touch {} released without a down", source_id);
            return false;
        };

        // Lifting the fingers also ends a zoom or a two-finger drag
        let pos = match pointer.mode {
            TouchMode::Move => {
                accelerate(pointer.init_pos, pos, self.config.omicron.accelerated_drag_scale)
            }
            TouchMode::Press | TouchMode::Zoom => pos,
        };
        self.close_touch(&pointer, pos);
        gesture_log!(
            self,
            "👆 Touch {} up at ({:.0}, {:.0}) after {:?}",
            source_id,
            pos.0,
            pos.1,
            pointer.mode
        );
        true
    }

    fn touch_double_click(&mut self, source_id: u32, pos: (f64, f64)) -> bool {
        if !self.config.omicron.enable_double_click_maximize {
            return false;
        }
        let id = touch_id(source_id);
        self.sink.pointer_dbl_click(&id, pos.0, pos.1);
        gesture_log!(self, "👆 Touch {} double click", source_id);
        true
    }

    /// Five-finger hold closes the application under the touch, once per touch
    ///
    /// Returns true when the hold suppressed normal handling.
    fn check_close_gesture(
        &mut self,
        pointer: &mut TouchPointer,
        pos: (f64, f64),
        event_flags: u32,
    ) -> bool {
        if !self.config.omicron.enable_five_finger_close_app
            || event_flags & flags::FIVE_FINGER_HOLD == 0
        {
            return false;
        }
        if !pointer.close_sent {
            if let Some(button) = pointer.button.take() {
                self.sink.pointer_release(&pointer.id, pos.0, pos.1, button);
            }
            self.sink.close_application(&pointer.id, pos.0, pos.1);
            pointer.close_sent = true;
            gesture_log!(self, "🖐️  Five-finger hold on {}", pointer.id);
        }
        true
    }

    /// Two-finger gesture; extra floats carry `[zoom delta, sub-event type]`
    fn touch_zoom(&mut self, source_id: u32, pos: (f64, f64), event: &RawEvent) -> bool {
        let Some(&[delta, sub_type, ..]) = event.extra.floats() else {
            debug!("Zoom event {} without delta/sub-type", source_id);
            return false;
        };

        match EventType::from(sub_type as u32) {
            EventType::Down => {
                let pointer = self.open_touch(source_id, pos, TouchMode::Zoom);
                self.sink.pointer_scroll_start(&pointer.id, pos.0, pos.1);
                gesture_log!(self, "🤏 Zoom {} start", source_id);
                self.remember_pointer(&pointer.id, pos.0, pos.1);
                self.touches.insert(source_id, pointer);
                true
            }
            EventType::Move => self.zoom_move(source_id, pos, delta as f64),
            EventType::Up => {
                let Some(pointer) = self.touches.remove(&source_id) else {
                    debug!("Zoom {} ended without a start", source_id);
                    return false;
                };
                self.close_touch(&pointer, pointer.last_pos);
                gesture_log!(self, "🤏 Zoom {} end", source_id);
                true
            }
            other => {
                debug!("Zoom {} with unexpected sub-event {:?}", source_id, other);
                false
            }
        }
    }

    fn zoom_move(&mut self, source_id: u32, pos: (f64, f64), delta: f64) -> bool {
        let Some(mut pointer) = self.touches.remove(&source_id) else {
            debug!("Zoom {} moved without a start", source_id);
            return false;
        };
        let options = &self.config.omicron;

        // Where the pointer ends up; drags release where they last moved
        let reached = match pointer.mode {
            TouchMode::Zoom => {
                let distance =
                    (pos.0 - pointer.init_pos.0).hypot(pos.1 - pointer.init_pos.1);

                if options.enable_two_finger_window_drag
                    && distance > options.zoom_to_move_gesture_minimum_distance
                {
                    let last = pointer.last_pos;
                    self.sink.pointer_scroll_end(&pointer.id, last.0, last.1);
                    self.sink.pointer_release(&pointer.id, last.0, last.1, PointerButton::Left);
                    self.sink.pointer_press(&pointer.id, pos.0, pos.1, PointerButton::Left);
                    pointer.mode = TouchMode::Move;
                    pointer.button = Some(PointerButton::Left);
                    gesture_log!(
                        self,
                        "🤏 Zoom {} became a window drag after {:.0}px",
                        source_id,
                        distance
                    );
                } else if options.enable_two_finger_zoom {
                    let wheel_delta = (-delta * options.zoom_gesture_scale).round() as i32;
                    self.sink.pointer_scroll(&pointer.id, pos.0, pos.1, wheel_delta);
                }
                pos
            }
            TouchMode::Move => {
                let dragged = accelerate(pointer.init_pos, pos, options.accelerated_drag_scale);
                self.sink.pointer_move(&pointer.id, dragged.0, dragged.1, PointerButton::Left);
                dragged
            }
            TouchMode::Press => {
                self.touches.insert(source_id, pointer);
                return false;
            }
        };

        pointer.last_pos = reached;
        self.remember_pointer(&pointer.id, reached.0, reached.1);
        self.touches.insert(source_id, pointer);
        true
    }
}
