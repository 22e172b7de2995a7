//! Configuration management for Omicron GW
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.
//! The `omicron` section uses the same option names as the display server's
//! `experimental.omicron` block so the two can share a file fragment.

pub mod watcher;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::filter::FilterParams;
use crate::projection::WallGeometry;
use crate::protocol::flags;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub omicron: OmicronConfig,
    #[serde(default)]
    pub wall: WallConfig,
    #[serde(default)]
    pub geometry: WallGeometry,
    #[serde(default)]
    pub wand: WandConfig,
}

/// Input stream and gesture options
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OmicronConfig {
    #[serde(default)]
    pub enable: bool,
    /// UDP port receiving event datagrams
    #[serde(default = "default_data_port")]
    pub data_port: u16,
    /// Local address the UDP socket binds to
    #[serde(default = "default_host")]
    pub host: String,
    /// Input server to ask for the stream; none = trackers push on their own
    #[serde(rename = "inputServerIP", skip_serializing_if = "Option::is_none")]
    pub input_server_ip: Option<String>,
    #[serde(default = "default_msg_port")]
    pub msg_port: u16,
    #[serde(default = "default_reconnect_interval")]
    pub reconnect_interval_secs: u64,
    /// Pixel offset added to touch positions
    #[serde(default)]
    pub touch_offset: [f64; 2],
    #[serde(default = "default_zoom_gesture_scale")]
    pub zoom_gesture_scale: f64,
    /// Pixels a two-finger gesture must travel before it becomes a window drag
    #[serde(default = "default_zoom_to_move_distance")]
    pub zoom_to_move_gesture_minimum_distance: f64,
    #[serde(default)]
    pub accelerated_drag_scale: f64,
    /// Apply accelerated drag to single-touch moves as well
    #[serde(default)]
    pub accelerated_touch_drag: bool,
    #[serde(default)]
    pub event_debug: bool,
    #[serde(default)]
    pub gesture_debug: bool,
    #[serde(default)]
    pub enable_double_click_maximize: bool,
    #[serde(default)]
    pub enable_three_finger_right_click: bool,
    #[serde(default)]
    pub enable_two_finger_window_drag: bool,
    #[serde(default = "default_true")]
    pub enable_two_finger_zoom: bool,
    #[serde(default)]
    pub enable_five_finger_close_app: bool,
    /// Pointer style name forwarded with `showPointer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub interaction_mode: InteractionMode,
    #[serde(default = "default_touch_color")]
    pub touch_color: String,
    #[serde(default = "default_wand_color")]
    pub wand_color: String,
}

impl Default for OmicronConfig {
    fn default() -> Self {
        Self {
            enable: false,
            data_port: default_data_port(),
            host: default_host(),
            input_server_ip: None,
            msg_port: default_msg_port(),
            reconnect_interval_secs: default_reconnect_interval(),
            touch_offset: [0.0, 0.0],
            zoom_gesture_scale: default_zoom_gesture_scale(),
            zoom_to_move_gesture_minimum_distance: default_zoom_to_move_distance(),
            accelerated_drag_scale: 0.0,
            accelerated_touch_drag: false,
            event_debug: false,
            gesture_debug: false,
            enable_double_click_maximize: false,
            enable_three_finger_right_click: false,
            enable_two_finger_window_drag: false,
            enable_two_finger_zoom: true,
            enable_five_finger_close_app: false,
            style: None,
            interaction_mode: InteractionMode::default(),
            touch_color: default_touch_color(),
            wand_color: default_wand_color(),
        }
    }
}

/// Pointer interaction mode requested for new pointers
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    /// Pointers move and resize windows
    #[default]
    Window,
    /// Pointers interact with application content
    App,
}

/// Wall resolution in pixels
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WallConfig {
    #[serde(default = "default_total_width")]
    pub total_width: f64,
    #[serde(default = "default_total_height")]
    pub total_height: f64,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            total_width: default_total_width(),
            total_height: default_total_height(),
        }
    }
}

/// Wand pointer options
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WandConfig {
    #[serde(default)]
    pub buttons: WandButtonMap,
    /// Wheel delta sent per packet while a scale button is held
    #[serde(default = "default_wand_scale_delta")]
    pub scale_delta: i32,
    #[serde(default = "default_true")]
    pub smoothing: bool,
    #[serde(default = "default_wand_filter")]
    pub filter: FilterParams,
}

impl Default for WandConfig {
    fn default() -> Self {
        Self {
            buttons: WandButtonMap::default(),
            scale_delta: default_wand_scale_delta(),
            smoothing: true,
            filter: default_wand_filter(),
        }
    }
}

/// Wand flag bit assigned to each action
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct WandButtonMap {
    pub click_drag: u32,
    pub menu: u32,
    pub show_hide: u32,
    pub scale_up: u32,
    pub scale_down: u32,
    pub maximize: u32,
    pub previous: u32,
    pub next: u32,
    pub play: u32,
}

impl Default for WandButtonMap {
    fn default() -> Self {
        Self {
            click_drag: flags::BUTTON1,
            menu: flags::BUTTON2,
            show_hide: flags::BUTTON3,
            scale_up: flags::BUTTON_UP,
            scale_down: flags::BUTTON_DOWN,
            maximize: flags::BUTTON5,
            previous: flags::BUTTON_LEFT,
            next: flags::BUTTON_RIGHT,
            play: flags::BUTTON4,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_yaml(&contents).with_context(|| format!("Invalid config file: {}", path))
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self, path: &str) -> Result<()> {
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config to YAML")?;

        fs::write(path, yaml)
            .await
            .with_context(|| format!("Failed to write config file: {}", path))?;

        Ok(())
    }

    /// Reject values the dispatcher cannot work with
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate().context("Invalid wall geometry")?;
        self.wand.filter.validate().context("Invalid wand filter")?;

        if !(self.wall.total_width > 0.0 && self.wall.total_height > 0.0) {
            bail!(
                "Wall size must be positive, got {}x{}",
                self.wall.total_width,
                self.wall.total_height
            );
        }
        let scalars = [
            ("zoomGestureScale", self.omicron.zoom_gesture_scale),
            ("acceleratedDragScale", self.omicron.accelerated_drag_scale),
            (
                "zoomToMoveGestureMinimumDistance",
                self.omicron.zoom_to_move_gesture_minimum_distance,
            ),
        ];
        for (name, value) in scalars {
            if !value.is_finite() || value < 0.0 {
                bail!("{} must be a non-negative number, got {}", name, value);
            }
        }
        if self.omicron.touch_offset.iter().any(|v| !v.is_finite()) {
            bail!("touchOffset must be finite, got {:?}", self.omicron.touch_offset);
        }
        Ok(())
    }

    /// Whether `other` binds or connects differently; those changes need a restart
    pub fn network_changed(&self, other: &AppConfig) -> bool {
        self.omicron.host != other.omicron.host
            || self.omicron.data_port != other.omicron.data_port
            || self.input_server_addr() != other.input_server_addr()
    }

    /// Address of the input server control port, if one is configured
    pub fn input_server_addr(&self) -> Option<String> {
        self.omicron
            .input_server_ip
            .as_ref()
            .map(|ip| format!("{}:{}", ip, self.omicron.msg_port))
    }
}

// Default value functions
fn default_data_port() -> u16 { 9123 }
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_msg_port() -> u16 { 28000 }
fn default_reconnect_interval() -> u64 { 15 }
fn default_zoom_gesture_scale() -> f64 { 2000.0 }
fn default_zoom_to_move_distance() -> f64 { 100.0 }
fn default_true() -> bool { true }
fn default_touch_color() -> String { "rgba(255, 255, 255, 1.0)".to_string() }
fn default_wand_color() -> String { "rgba(250, 5, 5, 1.0)".to_string() }
fn default_total_width() -> f64 { 1920.0 }
fn default_total_height() -> f64 { 1080.0 }
fn default_wand_scale_delta() -> i32 { 32 }
fn default_wand_filter() -> FilterParams {
    FilterParams {
        freq: 60.0,
        mincutoff: 1.0,
        beta: 0.5,
        dcutoff: 1.0,
    }
}
