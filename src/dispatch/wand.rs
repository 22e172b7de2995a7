//! Wand button state machine and pointer tracking
//!
//! Wands report their whole button state on every packet. [`WandAction::edges`]
//! diffs two consecutive flag words into per-action edges and
//! [`WandTracker::transition`] turns those edges into sink commands.

use super::{accelerate, Dispatcher};
use crate::config::{OmicronConfig, WandButtonMap, WandConfig};
use crate::filter::PointFilter;
use crate::protocol::RawEvent;
use crate::sink::{deliver, PointerButton, PointerStyle, SinkCommand, SourceType};
use tracing::{debug, trace, warn};

const KEY_LEFT_ARROW: u32 = 37;
const KEY_RIGHT_ARROW: u32 = 39;
const KEY_SPACE: u32 = 32;

/// Actions a wand button can be mapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WandAction {
    ClickDrag,
    Menu,
    ShowHide,
    ScaleUp,
    ScaleDown,
    Maximize,
    Previous,
    Next,
    Play,
}

/// Change of one action between two packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Pressed,
    Held,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WandEdge {
    pub action: WandAction,
    pub kind: EdgeKind,
}

impl WandAction {
    pub const ALL: [WandAction; 9] = [
        WandAction::ClickDrag,
        WandAction::Menu,
        WandAction::ShowHide,
        WandAction::ScaleUp,
        WandAction::ScaleDown,
        WandAction::Maximize,
        WandAction::Previous,
        WandAction::Next,
        WandAction::Play,
    ];

    pub fn mask(self, buttons: &WandButtonMap) -> u32 {
        match self {
            WandAction::ClickDrag => buttons.click_drag,
            WandAction::Menu => buttons.menu,
            WandAction::ShowHide => buttons.show_hide,
            WandAction::ScaleUp => buttons.scale_up,
            WandAction::ScaleDown => buttons.scale_down,
            WandAction::Maximize => buttons.maximize,
            WandAction::Previous => buttons.previous,
            WandAction::Next => buttons.next,
            WandAction::Play => buttons.play,
        }
    }

    /// Edges between two flag words, in `ALL` order; unmapped actions never fire
    pub fn edges(buttons: &WandButtonMap, prev: u32, next: u32) -> Vec<WandEdge> {
        Self::ALL
            .iter()
            .filter_map(|&action| {
                let mask = action.mask(buttons);
                if mask == 0 {
                    return None;
                }
                let kind = match (prev & mask != 0, next & mask != 0) {
                    (false, true) => EdgeKind::Pressed,
                    (true, true) => EdgeKind::Held,
                    (true, false) => EdgeKind::Released,
                    (false, false) => return None,
                };
                Some(WandEdge { action, kind })
            })
            .collect()
    }
}

/// Exclusive interaction a wand is engaged in
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WandState {
    Idle,
    /// Click-drag held since `origin`
    Dragging { origin: (f64, f64) },
    /// Menu button held
    Menu,
    /// A scale button held
    Scrolling { action: WandAction },
}

/// Per-source wand tracking
pub struct WandTracker {
    id: String,
    style: PointerStyle,
    state: WandState,
    last_flags: u32,
    /// Last on-screen position in pixels
    last_pos: Option<(f64, f64)>,
    /// Projection currently hits the wall
    on_screen: bool,
    /// Toggled by the show/hide button
    visible: bool,
    filter: Option<PointFilter>,
}

impl WandTracker {
    pub fn new(source_id: u32, style: PointerStyle, config: &WandConfig) -> Self {
        let mut tracker = Self {
            id: format!("wand{}", source_id),
            style,
            state: WandState::Idle,
            last_flags: 0,
            last_pos: None,
            on_screen: false,
            visible: true,
            filter: None,
        };
        tracker.configure_filter(config);
        tracker
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> WandState {
        self.state
    }

    pub fn last_flags(&self) -> u32 {
        self.last_flags
    }

    pub fn last_position(&self) -> Option<(f64, f64)> {
        self.last_pos
    }

    pub(crate) fn configure_filter(&mut self, config: &WandConfig) {
        self.filter = if config.smoothing {
            match PointFilter::new(config.filter) {
                Ok(filter) => Some(filter),
                Err(e) => {
                    warn!("Wand smoothing disabled for {}: {}", self.id, e);
                    None
                }
            }
        } else {
            None
        };
    }

    /// Switch to a new appearance; re-shows the pointer if it is on screen
    pub fn restyle(&mut self, style: PointerStyle) -> Vec<SinkCommand> {
        if style == self.style {
            return Vec::new();
        }
        self.style = style;
        if self.on_screen && self.visible {
            vec![SinkCommand::ShowPointer { id: self.id.clone(), style: self.style.clone() }]
        } else {
            Vec::new()
        }
    }

    /// Smooth a normalized position; `timestamp` in seconds
    pub fn smooth(&mut self, pos: (f64, f64), timestamp: Option<f64>) -> (f64, f64) {
        match &mut self.filter {
            Some(filter) => filter.filter(pos, timestamp),
            None => pos,
        }
    }

    /// Record a valid projection; returns the commands that bring the pointer on screen
    pub fn enter_screen(&mut self, pos: (f64, f64)) -> Vec<SinkCommand> {
        let mut commands = Vec::new();
        if self.last_pos.is_none() {
            commands.push(SinkCommand::CreateSagePointer { id: self.id.clone() });
        }
        if !self.on_screen && self.visible {
            commands.push(SinkCommand::ShowPointer {
                id: self.id.clone(),
                style: self.style.clone(),
            });
        }
        self.on_screen = true;
        self.last_pos = Some(pos);
        commands
    }

    /// Projection missed the wall; hides the pointer once
    pub fn leave_screen(&mut self) -> Vec<SinkCommand> {
        if !self.on_screen {
            return Vec::new();
        }
        self.on_screen = false;
        if let Some(filter) = &mut self.filter {
            filter.reset();
        }
        if self.visible {
            vec![SinkCommand::HidePointer { id: self.id.clone() }]
        } else {
            Vec::new()
        }
    }

    /// Feed the packet's button flags at `pos`, returning the resulting commands
    ///
    /// Without any edge the wand just hovers and reports its position.
    pub fn transition(
        &mut self,
        flags: u32,
        pos: (f64, f64),
        config: &WandConfig,
        drag_scale: f64,
    ) -> Vec<SinkCommand> {
        let edges = WandAction::edges(&config.buttons, self.last_flags, flags);
        self.last_flags = flags;

        let mut commands = Vec::new();
        for edge in edges {
            self.apply_edge(edge, pos, config, drag_scale, &mut commands);
        }

        if commands.is_empty() {
            commands.push(SinkCommand::PointerPosition {
                id: self.id.clone(),
                x: pos.0,
                y: pos.1,
            });
        }
        commands
    }

    fn apply_edge(
        &mut self,
        edge: WandEdge,
        pos: (f64, f64),
        config: &WandConfig,
        drag_scale: f64,
        out: &mut Vec<SinkCommand>,
    ) {
        let id = self.id.clone();
        let (x, y) = pos;

        match (edge.action, edge.kind, self.state) {
            (WandAction::ClickDrag, EdgeKind::Pressed, WandState::Idle) => {
                self.state = WandState::Dragging { origin: pos };
                out.push(SinkCommand::PointerPress { id, x, y, button: PointerButton::Left });
            }
            (WandAction::ClickDrag, EdgeKind::Held, WandState::Dragging { origin }) => {
                let (x, y) = accelerate(origin, pos, drag_scale);
                out.push(SinkCommand::PointerMove { id, x, y, button: PointerButton::Left });
            }
            (WandAction::ClickDrag, EdgeKind::Released, WandState::Dragging { origin }) => {
                let (x, y) = accelerate(origin, pos, drag_scale);
                self.state = WandState::Idle;
                out.push(SinkCommand::PointerRelease { id, x, y, button: PointerButton::Left });
            }

            (WandAction::Menu, EdgeKind::Pressed, WandState::Idle) => {
                self.state = WandState::Menu;
                out.push(SinkCommand::PointerPress { id, x, y, button: PointerButton::Right });
            }
            (WandAction::Menu, EdgeKind::Released, WandState::Menu) => {
                self.state = WandState::Idle;
                out.push(SinkCommand::PointerRelease { id, x, y, button: PointerButton::Right });
            }

            (WandAction::ScaleUp | WandAction::ScaleDown, EdgeKind::Pressed, WandState::Idle) => {
                self.state = WandState::Scrolling { action: edge.action };
                out.push(SinkCommand::PointerScrollStart { id, x, y });
            }
            (action, EdgeKind::Held, WandState::Scrolling { action: active })
                if action == active =>
            {
                let wheel_delta = if action == WandAction::ScaleUp {
                    -config.scale_delta
                } else {
                    config.scale_delta
                };
                out.push(SinkCommand::PointerScroll { id, x, y, wheel_delta });
            }
            (action, EdgeKind::Released, WandState::Scrolling { action: active })
                if action == active =>
            {
                self.state = WandState::Idle;
                out.push(SinkCommand::PointerScrollEnd { id, x, y });
            }

            (WandAction::ShowHide, EdgeKind::Pressed, _) => {
                self.visible = !self.visible;
                if self.on_screen {
                    if self.visible {
                        out.push(SinkCommand::ShowPointer { id, style: self.style.clone() });
                    } else {
                        out.push(SinkCommand::HidePointer { id });
                    }
                }
            }
            (WandAction::Maximize, EdgeKind::Pressed, _) => {
                out.push(SinkCommand::PointerDblClick { id, x, y });
            }
            (WandAction::Previous, EdgeKind::Pressed, _) => {
                out.push(SinkCommand::KeyDown { id, x, y, code: KEY_LEFT_ARROW });
            }
            (WandAction::Previous, EdgeKind::Released, _) => {
                out.push(SinkCommand::KeyUp { id, x, y, code: KEY_LEFT_ARROW });
            }
            (WandAction::Next, EdgeKind::Pressed, _) => {
                out.push(SinkCommand::KeyDown { id, x, y, code: KEY_RIGHT_ARROW });
            }
            (WandAction::Next, EdgeKind::Released, _) => {
                out.push(SinkCommand::KeyUp { id, x, y, code: KEY_RIGHT_ARROW });
            }
            (WandAction::Play, EdgeKind::Pressed, _) => {
                out.push(SinkCommand::KeyPress { id, x, y, code: KEY_SPACE });
            }

            // Held discrete buttons and presses while another interaction owns the wand
            (action, kind, state) => {
                trace!("Wand {} {:?} {:?} ignored in {:?}", self.id, action, kind, state);
            }
        }
    }
}

pub(crate) fn wand_style(options: &OmicronConfig, source_id: u32) -> PointerStyle {
    PointerStyle {
        label: format!("Wand: {}", source_id),
        color: options.wand_color.clone(),
        source_type: SourceType::Wand,
        style: options.style.clone(),
    }
}

impl Dispatcher {
    /// Handle a Wand service event; false when it was not usable
    pub(super) fn handle_wand(&mut self, source_id: u32, event: &RawEvent) -> bool {
        let (Some(position), Some(orientation)) = (event.position(), event.orientation()) else {
            debug!("Wand event {} without position/orientation", source_id);
            return false;
        };
        let event_flags = event.flags.unwrap_or_default();

        let projected = self.calculator.project(position, orientation);

        let style = wand_style(&self.config.omicron, source_id);
        let wand_config = &self.config.wand;
        let tracker = self
            .wands
            .entry(source_id)
            .or_insert_with(|| WandTracker::new(source_id, style, wand_config));

        let (mut commands, pos) = if projected.is_valid() {
            let timestamp = event.timestamp.map(|t| t as f64 / 1000.0);
            let (nx, ny) = tracker.smooth((projected.x, projected.y), timestamp);
            let pos = (
                nx * self.config.wall.total_width,
                ny * self.config.wall.total_height,
            );
            (tracker.enter_screen(pos), pos)
        } else {
            trace!("Wand {} points off the wall", source_id);
            let commands = tracker.leave_screen();
            let Some(pos) = tracker.last_position() else {
                // Never on screen: nothing to press at, keep flags for the next packet
                return true;
            };
            (commands, pos)
        };

        let transitions = tracker.transition(
            event_flags,
            pos,
            wand_config,
            self.config.omicron.accelerated_drag_scale,
        );
        // Hover position is meaningless while off the wall
        let off_screen = !projected.is_valid();
        commands.extend(transitions.into_iter().filter(|c| {
            !(off_screen && matches!(c, SinkCommand::PointerPosition { .. }))
        }));

        let id = tracker.id().to_string();
        for command in commands {
            if !matches!(command, SinkCommand::PointerPosition { .. }) {
                gesture_log!(self, "🪄 Wand {} {}", source_id, command.name());
            }
            deliver(self.sink.as_ref(), command);
        }
        if projected.is_valid() {
            self.remember_pointer(&id, pos.0, pos.1);
        }
        true
    }
}
