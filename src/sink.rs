//! Output side of the gateway: the pointer/keyboard operations understood by
//! the display server
//!
//! The dispatcher never talks to the display server directly. It calls an
//! [`InputSink`], one method per operation. Every method has a default that
//! packs its arguments into a [`SinkCommand`] and hands it to
//! [`InputSink::send`], so a sink only has to decide what to do with
//! commands; it can still override individual operations.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Mouse button carried by press/release operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    Left,
    Right,
}

/// Kind of device behind a pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Touch,
    Wand,
}

/// Appearance of a pointer when it is shown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerStyle {
    pub label: String,
    pub color: String,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

/// One named body joint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    pub name: String,
    pub position: [f32; 3],
}

/// Tracked body skeleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skeleton {
    pub source_id: u32,
    pub joints: Vec<Joint>,
}

impl Skeleton {
    pub fn joint(&self, name: &str) -> Option<[f32; 3]> {
        self.joints.iter().find(|j| j.name == name).map(|j| j.position)
    }
}

/// A single operation for the display server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum SinkCommand {
    CreateSagePointer { id: String },
    ShowPointer { id: String, style: PointerStyle },
    HidePointer { id: String },
    PointerPress { id: String, x: f64, y: f64, button: PointerButton },
    PointerMove { id: String, x: f64, y: f64, button: PointerButton },
    PointerRelease { id: String, x: f64, y: f64, button: PointerButton },
    PointerPosition { id: String, x: f64, y: f64 },
    PointerScrollStart { id: String, x: f64, y: f64 },
    #[serde(rename_all = "camelCase")]
    PointerScroll { id: String, x: f64, y: f64, wheel_delta: i32 },
    PointerScrollEnd { id: String, x: f64, y: f64 },
    PointerDblClick { id: String, x: f64, y: f64 },
    KeyDown { id: String, x: f64, y: f64, code: u32 },
    KeyUp { id: String, x: f64, y: f64, code: u32 },
    KeyPress { id: String, x: f64, y: f64, code: u32 },
    #[serde(rename_all = "camelCase")]
    KinectInput { source_id: u32, skeleton: Skeleton },
    PointerChangeMode { id: String },
    CloseApplication { id: String, x: f64, y: f64 },
}

impl SinkCommand {
    /// Operation name as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            SinkCommand::CreateSagePointer { .. } => "createSagePointer",
            SinkCommand::ShowPointer { .. } => "showPointer",
            SinkCommand::HidePointer { .. } => "hidePointer",
            SinkCommand::PointerPress { .. } => "pointerPress",
            SinkCommand::PointerMove { .. } => "pointerMove",
            SinkCommand::PointerRelease { .. } => "pointerRelease",
            SinkCommand::PointerPosition { .. } => "pointerPosition",
            SinkCommand::PointerScrollStart { .. } => "pointerScrollStart",
            SinkCommand::PointerScroll { .. } => "pointerScroll",
            SinkCommand::PointerScrollEnd { .. } => "pointerScrollEnd",
            SinkCommand::PointerDblClick { .. } => "pointerDblClick",
            SinkCommand::KeyDown { .. } => "keyDown",
            SinkCommand::KeyUp { .. } => "keyUp",
            SinkCommand::KeyPress { .. } => "keyPress",
            SinkCommand::KinectInput { .. } => "kinectInput",
            SinkCommand::PointerChangeMode { .. } => "pointerChangeMode",
            SinkCommand::CloseApplication { .. } => "closeApplication",
        }
    }
}

/// Receiver of dispatched pointer operations
pub trait InputSink: Send + Sync {
    /// Deliver a packed command
    fn send(&self, command: SinkCommand);

    fn create_sage_pointer(&self, id: &str) {
        self.send(SinkCommand::CreateSagePointer { id: id.to_string() });
    }

    fn show_pointer(&self, id: &str, style: PointerStyle) {
        self.send(SinkCommand::ShowPointer { id: id.to_string(), style });
    }

    fn hide_pointer(&self, id: &str) {
        self.send(SinkCommand::HidePointer { id: id.to_string() });
    }

    fn pointer_press(&self, id: &str, x: f64, y: f64, button: PointerButton) {
        self.send(SinkCommand::PointerPress { id: id.to_string(), x, y, button });
    }

    fn pointer_move(&self, id: &str, x: f64, y: f64, button: PointerButton) {
        self.send(SinkCommand::PointerMove { id: id.to_string(), x, y, button });
    }

    fn pointer_release(&self, id: &str, x: f64, y: f64, button: PointerButton) {
        self.send(SinkCommand::PointerRelease { id: id.to_string(), x, y, button });
    }

    fn pointer_position(&self, id: &str, x: f64, y: f64) {
        self.send(SinkCommand::PointerPosition { id: id.to_string(), x, y });
    }

    fn pointer_scroll_start(&self, id: &str, x: f64, y: f64) {
        self.send(SinkCommand::PointerScrollStart { id: id.to_string(), x, y });
    }

    fn pointer_scroll(&self, id: &str, x: f64, y: f64, wheel_delta: i32) {
        self.send(SinkCommand::PointerScroll { id: id.to_string(), x, y, wheel_delta });
    }

    fn pointer_scroll_end(&self, id: &str, x: f64, y: f64) {
        self.send(SinkCommand::PointerScrollEnd { id: id.to_string(), x, y });
    }

    fn pointer_dbl_click(&self, id: &str, x: f64, y: f64) {
        self.send(SinkCommand::PointerDblClick { id: id.to_string(), x, y });
    }

    fn key_down(&self, id: &str, x: f64, y: f64, code: u32) {
        self.send(SinkCommand::KeyDown { id: id.to_string(), x, y, code });
    }

    fn key_up(&self, id: &str, x: f64, y: f64, code: u32) {
        self.send(SinkCommand::KeyUp { id: id.to_string(), x, y, code });
    }

    fn key_press(&self, id: &str, x: f64, y: f64, code: u32) {
        self.send(SinkCommand::KeyPress { id: id.to_string(), x, y, code });
    }

    fn kinect_input(&self, source_id: u32, skeleton: Skeleton) {
        self.send(SinkCommand::KinectInput { source_id, skeleton });
    }

    fn pointer_change_mode(&self, id: &str) {
        self.send(SinkCommand::PointerChangeMode { id: id.to_string() });
    }

    /// Five-finger hold over an application
    fn close_application(&self, id: &str, x: f64, y: f64) {
        self.send(SinkCommand::CloseApplication { id: id.to_string(), x, y });
    }
}

/// Route a packed command through the matching sink method
///
/// Keeps per-operation overrides working for code that builds commands as data.
pub fn deliver(sink: &dyn InputSink, command: SinkCommand) {
    match command {
        SinkCommand::CreateSagePointer { id } => sink.create_sage_pointer(&id),
        SinkCommand::ShowPointer { id, style } => sink.show_pointer(&id, style),
        SinkCommand::HidePointer { id } => sink.hide_pointer(&id),
        SinkCommand::PointerPress { id, x, y, button } => sink.pointer_press(&id, x, y, button),
        SinkCommand::PointerMove { id, x, y, button } => sink.pointer_move(&id, x, y, button),
        SinkCommand::PointerRelease { id, x, y, button } => sink.pointer_release(&id, x, y, button),
        SinkCommand::PointerPosition { id, x, y } => sink.pointer_position(&id, x, y),
        SinkCommand::PointerScrollStart { id, x, y } => sink.pointer_scroll_start(&id, x, y),
        SinkCommand::PointerScroll { id, x, y, wheel_delta } => {
            sink.pointer_scroll(&id, x, y, wheel_delta)
        }
        SinkCommand::PointerScrollEnd { id, x, y } => sink.pointer_scroll_end(&id, x, y),
        SinkCommand::PointerDblClick { id, x, y } => sink.pointer_dbl_click(&id, x, y),
        SinkCommand::KeyDown { id, x, y, code } => sink.key_down(&id, x, y, code),
        SinkCommand::KeyUp { id, x, y, code } => sink.key_up(&id, x, y, code),
        SinkCommand::KeyPress { id, x, y, code } => sink.key_press(&id, x, y, code),
        SinkCommand::KinectInput { source_id, skeleton } => sink.kinect_input(source_id, skeleton),
        SinkCommand::PointerChangeMode { id } => sink.pointer_change_mode(&id),
        SinkCommand::CloseApplication { id, x, y } => sink.close_application(&id, x, y),
    }
}

/// Forwards commands into a channel read by the main loop
pub struct CommandSink {
    tx: mpsc::UnboundedSender<SinkCommand>,
}

impl CommandSink {
    pub fn new(tx: mpsc::UnboundedSender<SinkCommand>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SinkCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl InputSink for CommandSink {
    fn send(&self, command: SinkCommand) {
        if let Err(e) = self.tx.send(command) {
            warn!("Failed to forward {} command: receiver closed", e.0.name());
        }
    }
}

/// Logs every command; useful without a display server attached
pub struct ConsoleSink {
    count: AtomicU64,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self { count: AtomicU64::new(0) }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl InputSink for ConsoleSink {
    fn send(&self, command: SinkCommand) {
        let n = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        match &command {
            // High-rate operations stay at debug level
            SinkCommand::PointerPosition { id, x, y } | SinkCommand::PointerMove { id, x, y, .. } => {
                debug!(
                    "🖱️  [{}] {} {} ({:.1}, {:.1}) [#{}]",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    command.name(),
                    id,
                    x,
                    y,
                    n
                );
            }
            _ => {
                info!(
                    "🖱️  [{}] {:?} [#{}]",
                    chrono::Local::now().format("%H:%M:%S%.3f"),
                    command,
                    n
                );
            }
        }
    }
}

/// Keeps every command in memory
#[derive(Default)]
pub struct RecordingSink {
    commands: Mutex<Vec<SinkCommand>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain the recorded commands
    pub fn take(&self) -> Vec<SinkCommand> {
        std::mem::take(&mut *self.commands.lock())
    }

    pub fn len(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.lock().is_empty()
    }
}

impl InputSink for RecordingSink {
    fn send(&self, command: SinkCommand) {
        self.commands.lock().push(command);
    }
}
