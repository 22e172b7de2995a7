//! Omicron wire format
//!
//! Every datagram carries one event: a little-endian header of sixteen 4-byte
//! fields followed by an extra-data payload whose layout is selected by the
//! `extraDataType` tag.
//!
//! ```text
//! offset  field            type
//!      0  timestamp        u32 (ms)
//!      4  sourceId         u32
//!      8  serviceId        i32
//!     12  serviceType      u32
//!     16  type             u32
//!     20  flags            u32
//!     24  posx/posy/posz   f32 ×3
//!     36  orw/orx/ory/orz  f32 ×4
//!     52  extraDataType    u32
//!     56  extraDataItems   u32
//!     60  extraDataMask    u32
//!     64  extra data       items × item size
//! ```
//!
//! Older trackers send shorter packets, so decoding never fails: fields that
//! do not fit are left as `None`.

use bytes::{Buf, BufMut, BytesMut};
use std::fmt;

use crate::projection::{Quaternion, Vec3};

/// Size of a full event header
pub const HEADER_LEN: usize = 64;

/// Omicron input service classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceType {
    Pointer,
    Mocap,
    Keyboard,
    Controller,
    Ui,
    Generic,
    Brain,
    Wand,
    Speech,
    Image,
    Audio,
    Unknown(u32),
}

impl From<u32> for ServiceType {
    fn from(code: u32) -> Self {
        match code {
            0 => ServiceType::Pointer,
            1 => ServiceType::Mocap,
            2 => ServiceType::Keyboard,
            3 => ServiceType::Controller,
            4 => ServiceType::Ui,
            5 => ServiceType::Generic,
            6 => ServiceType::Brain,
            7 => ServiceType::Wand,
            8 => ServiceType::Speech,
            9 => ServiceType::Image,
            10 => ServiceType::Audio,
            other => ServiceType::Unknown(other),
        }
    }
}

impl ServiceType {
    pub fn code(&self) -> u32 {
        match self {
            ServiceType::Pointer => 0,
            ServiceType::Mocap => 1,
            ServiceType::Keyboard => 2,
            ServiceType::Controller => 3,
            ServiceType::Ui => 4,
            ServiceType::Generic => 5,
            ServiceType::Brain => 6,
            ServiceType::Wand => 7,
            ServiceType::Speech => 8,
            ServiceType::Image => 9,
            ServiceType::Audio => 10,
            ServiceType::Unknown(code) => *code,
        }
    }
}

/// Omicron event types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Select,
    Toggle,
    ChangeValue,
    Update,
    Move,
    Down,
    Up,
    Trace,
    Untrace,
    Click,
    DoubleClick,
    MoveLeft,
    MoveRight,
    MoveUp,
    MoveDown,
    Zoom,
    SplitStart,
    SplitEnd,
    Split,
    RotateStart,
    RotateEnd,
    Rotate,
    Null,
    Unknown(u32),
}

const EVENT_TYPES: [EventType; 23] = [
    EventType::Select,
    EventType::Toggle,
    EventType::ChangeValue,
    EventType::Update,
    EventType::Move,
    EventType::Down,
    EventType::Up,
    EventType::Trace,
    EventType::Untrace,
    EventType::Click,
    EventType::DoubleClick,
    EventType::MoveLeft,
    EventType::MoveRight,
    EventType::MoveUp,
    EventType::MoveDown,
    EventType::Zoom,
    EventType::SplitStart,
    EventType::SplitEnd,
    EventType::Split,
    EventType::RotateStart,
    EventType::RotateEnd,
    EventType::Rotate,
    EventType::Null,
];

impl From<u32> for EventType {
    fn from(code: u32) -> Self {
        EVENT_TYPES
            .get(code as usize)
            .copied()
            .unwrap_or(EventType::Unknown(code))
    }
}

impl EventType {
    pub fn code(&self) -> u32 {
        match self {
            EventType::Unknown(code) => *code,
            known => EVENT_TYPES
                .iter()
                .position(|t| t == known)
                .map(|i| i as u32)
                .unwrap_or(u32::MAX),
        }
    }
}

/// Event flag bits
pub mod flags {
    pub const BUTTON1: u32 = 1 << 0;
    pub const BUTTON2: u32 = 1 << 1;
    pub const BUTTON3: u32 = 1 << 2;
    pub const CTRL: u32 = 1 << 3;
    pub const ALT: u32 = 1 << 4;
    pub const SHIFT: u32 = 1 << 5;
    pub const BUTTON4: u32 = 1 << 6;
    pub const BUTTON5: u32 = 1 << 7;
    pub const BUTTON6: u32 = 1 << 8;
    pub const BUTTON7: u32 = 1 << 9;
    pub const BUTTON_UP: u32 = 1 << 10;
    pub const BUTTON_DOWN: u32 = 1 << 11;
    pub const BUTTON_LEFT: u32 = 1 << 12;
    pub const BUTTON_RIGHT: u32 = 1 << 13;

    // Touch gesture flags set by the tracker's gesture manager
    pub const SINGLE_TOUCH: u32 = 1 << 18;
    pub const BIG_TOUCH: u32 = 1 << 19;
    pub const FIVE_FINGER_HOLD: u32 = 1 << 20;
    pub const FIVE_FINGER_SWIPE: u32 = 1 << 21;
    pub const THREE_FINGER_HOLD: u32 = 1 << 22;
    pub const SINGLE_CLICK: u32 = 1 << 23;
    pub const DOUBLE_CLICK: u32 = 1 << 24;
    pub const MULTI_TOUCH: u32 = 1 << 25;
}

/// Extra-data layout tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraDataType {
    Null,
    FloatArray,
    IntArray,
    Vector3Array,
    String,
    KinectSpeech,
    Unknown(u32),
}

impl From<u32> for ExtraDataType {
    fn from(code: u32) -> Self {
        match code {
            0 => ExtraDataType::Null,
            1 => ExtraDataType::FloatArray,
            2 => ExtraDataType::IntArray,
            3 => ExtraDataType::Vector3Array,
            4 => ExtraDataType::String,
            5 => ExtraDataType::KinectSpeech,
            other => ExtraDataType::Unknown(other),
        }
    }
}

impl ExtraDataType {
    pub fn code(&self) -> u32 {
        match self {
            ExtraDataType::Null => 0,
            ExtraDataType::FloatArray => 1,
            ExtraDataType::IntArray => 2,
            ExtraDataType::Vector3Array => 3,
            ExtraDataType::String => 4,
            ExtraDataType::KinectSpeech => 5,
            ExtraDataType::Unknown(code) => *code,
        }
    }

    /// Bytes per item, `None` when the tag is not understood
    pub fn item_size(&self) -> Option<usize> {
        match self {
            ExtraDataType::Null => Some(0),
            ExtraDataType::FloatArray | ExtraDataType::IntArray => Some(4),
            ExtraDataType::Vector3Array => Some(12),
            ExtraDataType::String | ExtraDataType::KinectSpeech => Some(1),
            ExtraDataType::Unknown(_) => None,
        }
    }
}

/// Decoded extra-data payload
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtraData {
    #[default]
    None,
    Floats(Vec<f32>),
    Ints(Vec<i32>),
    Vectors3(Vec<[f32; 3]>),
    Text(String),
    KinectSpeech(String),
}

impl ExtraData {
    pub fn data_type(&self) -> ExtraDataType {
        match self {
            ExtraData::None => ExtraDataType::Null,
            ExtraData::Floats(_) => ExtraDataType::FloatArray,
            ExtraData::Ints(_) => ExtraDataType::IntArray,
            ExtraData::Vectors3(_) => ExtraDataType::Vector3Array,
            ExtraData::Text(_) => ExtraDataType::String,
            ExtraData::KinectSpeech(_) => ExtraDataType::KinectSpeech,
        }
    }

    pub fn items(&self) -> usize {
        match self {
            ExtraData::None => 0,
            ExtraData::Floats(v) => v.len(),
            ExtraData::Ints(v) => v.len(),
            ExtraData::Vectors3(v) => v.len(),
            ExtraData::Text(s) | ExtraData::KinectSpeech(s) => s.len(),
        }
    }

    pub fn floats(&self) -> Option<&[f32]> {
        match self {
            ExtraData::Floats(v) => Some(v),
            _ => None,
        }
    }

    fn decode(tag: ExtraDataType, items: usize, buf: &mut &[u8]) -> ExtraData {
        let Some(size) = tag.item_size() else {
            return ExtraData::None;
        };
        // Only complete items; a short payload must not allocate `items` slots
        let available = if size == 0 { 0 } else { (buf.remaining() / size).min(items) };

        match tag {
            ExtraDataType::FloatArray => {
                ExtraData::Floats((0..available).map(|_| buf.get_f32_le()).collect())
            }
            ExtraDataType::IntArray => {
                ExtraData::Ints((0..available).map(|_| buf.get_i32_le()).collect())
            }
            ExtraDataType::Vector3Array => ExtraData::Vectors3(
                (0..available)
                    .map(|_| [buf.get_f32_le(), buf.get_f32_le(), buf.get_f32_le()])
                    .collect(),
            ),
            ExtraDataType::String | ExtraDataType::KinectSpeech => {
                let text = String::from_utf8_lossy(&(*buf)[..available])
                    .trim_end_matches('\0')
                    .to_string();
                buf.advance(available);
                if tag == ExtraDataType::String {
                    ExtraData::Text(text)
                } else {
                    ExtraData::KinectSpeech(text)
                }
            }
            ExtraDataType::Null | ExtraDataType::Unknown(_) => ExtraData::None,
        }
    }

    fn encode(&self, out: &mut BytesMut) {
        match self {
            ExtraData::None => {}
            ExtraData::Floats(v) => v.iter().for_each(|f| out.put_f32_le(*f)),
            ExtraData::Ints(v) => v.iter().for_each(|i| out.put_i32_le(*i)),
            ExtraData::Vectors3(v) => v.iter().flatten().for_each(|f| out.put_f32_le(*f)),
            ExtraData::Text(s) | ExtraData::KinectSpeech(s) => out.put_slice(s.as_bytes()),
        }
    }
}

/// One decoded Omicron event
///
/// Header fields missing from a truncated packet stay `None`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawEvent {
    pub timestamp: Option<u32>,
    pub source_id: Option<u32>,
    pub service_id: Option<i32>,
    pub service_type: Option<ServiceType>,
    pub event_type: Option<EventType>,
    pub flags: Option<u32>,
    pub posx: Option<f32>,
    pub posy: Option<f32>,
    pub posz: Option<f32>,
    pub orw: Option<f32>,
    pub orx: Option<f32>,
    pub ory: Option<f32>,
    pub orz: Option<f32>,
    pub extra_data_type: Option<ExtraDataType>,
    pub extra_data_items: Option<u32>,
    pub extra_data_mask: Option<u32>,
    pub extra: ExtraData,
}

impl RawEvent {
    /// Start a complete event with zeroed fields
    pub fn new(service_type: ServiceType, event_type: EventType) -> Self {
        Self {
            timestamp: Some(0),
            source_id: Some(0),
            service_id: Some(0),
            service_type: Some(service_type),
            event_type: Some(event_type),
            flags: Some(0),
            posx: Some(0.0),
            posy: Some(0.0),
            posz: Some(0.0),
            orw: Some(1.0),
            orx: Some(0.0),
            ory: Some(0.0),
            orz: Some(0.0),
            extra_data_type: Some(ExtraDataType::Null),
            extra_data_items: Some(0),
            extra_data_mask: Some(0),
            extra: ExtraData::None,
        }
    }

    pub fn with_source(mut self, source_id: u32) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn with_timestamp(mut self, timestamp: u32) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = Some(flags);
        self
    }

    pub fn with_position(mut self, x: f32, y: f32, z: f32) -> Self {
        self.posx = Some(x);
        self.posy = Some(y);
        self.posz = Some(z);
        self
    }

    pub fn with_orientation(mut self, w: f32, x: f32, y: f32, z: f32) -> Self {
        self.orw = Some(w);
        self.orx = Some(x);
        self.ory = Some(y);
        self.orz = Some(z);
        self
    }

    pub fn with_extra(mut self, extra: ExtraData) -> Self {
        self.extra_data_type = Some(extra.data_type());
        self.extra_data_items = Some(extra.items() as u32);
        self.extra = extra;
        self
    }

    /// Decode one datagram; never fails
    pub fn decode(data: &[u8]) -> RawEvent {
        let mut buf = data;
        let mut event = RawEvent::default();

        macro_rules! read {
            ($field:ident, $get:ident) => {
                if buf.remaining() < 4 {
                    return event;
                }
                event.$field = Some(buf.$get().into());
            };
        }

        read!(timestamp, get_u32_le);
        read!(source_id, get_u32_le);
        read!(service_id, get_i32_le);
        read!(service_type, get_u32_le);
        read!(event_type, get_u32_le);
        read!(flags, get_u32_le);
        read!(posx, get_f32_le);
        read!(posy, get_f32_le);
        read!(posz, get_f32_le);
        read!(orw, get_f32_le);
        read!(orx, get_f32_le);
        read!(ory, get_f32_le);
        read!(orz, get_f32_le);
        read!(extra_data_type, get_u32_le);
        read!(extra_data_items, get_u32_le);
        read!(extra_data_mask, get_u32_le);

        if let (Some(tag), Some(items)) = (event.extra_data_type, event.extra_data_items) {
            event.extra = ExtraData::decode(tag, items as usize, &mut buf);
        }
        event
    }

    /// Encode back to wire format, stopping at the first absent field
    pub fn encode(&self) -> Vec<u8> {
        let mut out = BytesMut::with_capacity(HEADER_LEN);

        macro_rules! put {
            ($value:expr, $put:ident) => {
                match $value {
                    Some(v) => out.$put(v),
                    None => return out.to_vec(),
                }
            };
        }

        put!(self.timestamp, put_u32_le);
        put!(self.source_id, put_u32_le);
        put!(self.service_id, put_i32_le);
        put!(self.service_type.map(|s| s.code()), put_u32_le);
        put!(self.event_type.map(|t| t.code()), put_u32_le);
        put!(self.flags, put_u32_le);
        put!(self.posx, put_f32_le);
        put!(self.posy, put_f32_le);
        put!(self.posz, put_f32_le);
        put!(self.orw, put_f32_le);
        put!(self.orx, put_f32_le);
        put!(self.ory, put_f32_le);
        put!(self.orz, put_f32_le);
        put!(self.extra_data_type.map(|t| t.code()), put_u32_le);
        put!(self.extra_data_items, put_u32_le);
        put!(self.extra_data_mask, put_u32_le);

        self.extra.encode(&mut out);
        out.to_vec()
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags.is_some_and(|f| f & flag != 0)
    }

    /// Position, if all three components arrived
    pub fn position(&self) -> Option<Vec3> {
        Some(Vec3::new(self.posx? as f64, self.posy? as f64, self.posz? as f64))
    }

    /// Orientation, if all four components arrived
    pub fn orientation(&self) -> Option<Quaternion> {
        Some(Quaternion::new(
            self.orw? as f64,
            self.orx? as f64,
            self.ory? as f64,
            self.orz? as f64,
        ))
    }
}

impl fmt::Display for RawEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.service_type, self.event_type) {
            (Some(service), Some(kind)) => write!(f, "{:?}/{:?}", service, kind)?,
            (Some(service), None) => write!(f, "{:?}/?", service)?,
            _ => return write!(f, "truncated event ({} fields)", self.field_count()),
        }
        if let Some(source) = self.source_id {
            write!(f, " src={}", source)?;
        }
        if let Some(flags) = self.flags {
            write!(f, " flags=0x{:08X}", flags)?;
        }
        if let Some(p) = self.position() {
            write!(f, " pos=({:.3}, {:.3}, {:.3})", p.x, p.y, p.z)?;
        }
        match &self.extra {
            ExtraData::None => Ok(()),
            ExtraData::Text(s) | ExtraData::KinectSpeech(s) => write!(f, " extra={:?}", s),
            other => write!(f, " extra={:?}x{}", other.data_type(), other.items()),
        }
    }
}

impl RawEvent {
    fn field_count(&self) -> usize {
        [
            self.timestamp.is_some(),
            self.source_id.is_some(),
            self.service_id.is_some(),
            self.service_type.is_some(),
            self.event_type.is_some(),
            self.flags.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }
}

/// Format bytes as space-separated uppercase hex
pub fn format_hex(data: &[u8]) -> String {
    data.chunks(4)
        .map(hex::encode_upper)
        .collect::<Vec<_>>()
        .join(" ")
}
