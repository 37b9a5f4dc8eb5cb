//! TDMS container reader
//!
//! Reads the segment/object/property/raw-data structure of NI TDMS files
//! into groups of channels. Only what acquisition recorders produce for
//! audio is decoded: numeric channels, interleaved or contiguous, either
//! byte order. String and other opaque channel data is skipped over.
//!
//! Segment layout:
//! ```text
//! lead-in (28 bytes) | metadata | raw data
//! "TDSm" | ToC u32 | version u32 | next segment offset u64 | raw data offset u64
//! ```
//! Both offsets are relative to the end of the lead-in.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

const LEAD_IN_LEN: usize = 28;
const SEGMENT_TAG: &[u8; 4] = b"TDSm";
const NO_RAW_DATA: u32 = 0xFFFF_FFFF;
const SAME_RAW_INDEX: u32 = 0x0000_0000;
const INCOMPLETE_SEGMENT: u64 = u64::MAX;

const TOC_META_DATA: u32 = 1 << 1;
const TOC_NEW_OBJ_LIST: u32 = 1 << 2;
const TOC_RAW_DATA: u32 = 1 << 3;
const TOC_INTERLEAVED: u32 = 1 << 5;
const TOC_BIG_ENDIAN: u32 = 1 << 6;
const TOC_DAQMX_RAW_DATA: u32 = 1 << 7;

#[derive(Debug, Error)]
pub enum TdmsError {
    #[error("failed to read TDMS file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of data at byte {offset}")]
    Truncated { offset: usize },

    #[error("missing TDSm segment tag at byte {offset}")]
    BadTag { offset: usize },

    #[error("unsupported TDMS data type 0x{0:X}")]
    UnsupportedDataType(u32),

    #[error("unsupported TDMS layout: {0}")]
    UnsupportedLayout(String),

    #[error("malformed object path {0:?}")]
    InvalidPath(String),

    #[error("corrupt TDMS file: {0}")]
    Corrupt(String),
}

/// TDMS data type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    F32WithUnit,
    F64WithUnit,
    String,
    Bool,
    Timestamp,
}

impl DataType {
    pub fn from_code(code: u32) -> Result<Self, TdmsError> {
        Ok(match code {
            0x01 => DataType::I8,
            0x02 => DataType::I16,
            0x03 => DataType::I32,
            0x04 => DataType::I64,
            0x05 => DataType::U8,
            0x06 => DataType::U16,
            0x07 => DataType::U32,
            0x08 => DataType::U64,
            0x09 => DataType::F32,
            0x0A => DataType::F64,
            0x19 => DataType::F32WithUnit,
            0x1A => DataType::F64WithUnit,
            0x20 => DataType::String,
            0x21 => DataType::Bool,
            0x44 => DataType::Timestamp,
            other => return Err(TdmsError::UnsupportedDataType(other)),
        })
    }

    /// Bytes per value; `None` for variable-length strings
    pub fn size(&self) -> Option<usize> {
        match self {
            DataType::I8 | DataType::U8 | DataType::Bool => Some(1),
            DataType::I16 | DataType::U16 => Some(2),
            DataType::I32 | DataType::U32 | DataType::F32 | DataType::F32WithUnit => Some(4),
            DataType::I64 | DataType::U64 | DataType::F64 | DataType::F64WithUnit => Some(8),
            DataType::Timestamp => Some(16),
            DataType::String => None,
        }
    }
}

/// Decoded property value
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    Bool(bool),
    /// Seconds since 1904-01-01 UTC plus 2^-64 second fractions
    Timestamp { seconds: i64, fractions: u64 },
}

impl PropertyValue {
    /// Numeric view; numeric strings are accepted since some writers store rates as text
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(v) => Some(*v as f64),
            PropertyValue::UInt(v) => Some(*v as f64),
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::String(s) => s.trim().parse().ok(),
            PropertyValue::Bool(_) | PropertyValue::Timestamp { .. } => None,
        }
    }
}

/// Channel samples in their stored representation
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl RawSamples {
    fn empty(data_type: DataType) -> Result<Self, TdmsError> {
        Ok(match data_type {
            DataType::I8 => RawSamples::I8(Vec::new()),
            DataType::I16 => RawSamples::I16(Vec::new()),
            DataType::I32 => RawSamples::I32(Vec::new()),
            DataType::I64 => RawSamples::I64(Vec::new()),
            DataType::U8 => RawSamples::U8(Vec::new()),
            DataType::U16 => RawSamples::U16(Vec::new()),
            DataType::U32 => RawSamples::U32(Vec::new()),
            DataType::U64 => RawSamples::U64(Vec::new()),
            DataType::F32 | DataType::F32WithUnit => RawSamples::F32(Vec::new()),
            DataType::F64 | DataType::F64WithUnit => RawSamples::F64(Vec::new()),
            other => {
                return Err(TdmsError::UnsupportedLayout(format!(
                    "{:?} channel data",
                    other
                )))
            }
        })
    }

    fn matches(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (RawSamples::I8(_), DataType::I8)
                | (RawSamples::I16(_), DataType::I16)
                | (RawSamples::I32(_), DataType::I32)
                | (RawSamples::I64(_), DataType::I64)
                | (RawSamples::U8(_), DataType::U8)
                | (RawSamples::U16(_), DataType::U16)
                | (RawSamples::U32(_), DataType::U32)
                | (RawSamples::U64(_), DataType::U64)
                | (RawSamples::F32(_), DataType::F32 | DataType::F32WithUnit)
                | (RawSamples::F64(_), DataType::F64 | DataType::F64WithUnit)
        )
    }

    fn extend_from(&mut self, cur: &mut Cursor<'_>, n: usize) -> Result<(), TdmsError> {
        macro_rules! fill {
            ($values:expr, $read:ident) => {{
                $values.reserve(n);
                for _ in 0..n {
                    $values.push(cur.$read()?);
                }
            }};
        }
        match self {
            RawSamples::I8(v) => fill!(v, i8),
            RawSamples::I16(v) => fill!(v, i16),
            RawSamples::I32(v) => fill!(v, i32),
            RawSamples::I64(v) => fill!(v, i64),
            RawSamples::U8(v) => fill!(v, u8),
            RawSamples::U16(v) => fill!(v, u16),
            RawSamples::U32(v) => fill!(v, u32),
            RawSamples::U64(v) => fill!(v, u64),
            RawSamples::F32(v) => fill!(v, f32),
            RawSamples::F64(v) => fill!(v, f64),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        match self {
            RawSamples::I8(v) => v.len(),
            RawSamples::I16(v) => v.len(),
            RawSamples::I32(v) => v.len(),
            RawSamples::I64(v) => v.len(),
            RawSamples::U8(v) => v.len(),
            RawSamples::U16(v) => v.len(),
            RawSamples::U32(v) => v.len(),
            RawSamples::U64(v) => v.len(),
            RawSamples::F32(v) => v.len(),
            RawSamples::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full-scale magnitude of an integer type, `None` for floats
    pub fn integer_full_scale(&self) -> Option<f64> {
        match self {
            RawSamples::I8(_) => Some(2f64.powi(7)),
            RawSamples::I16(_) => Some(2f64.powi(15)),
            RawSamples::I32(_) => Some(2f64.powi(31)),
            RawSamples::I64(_) => Some(2f64.powi(63)),
            RawSamples::U8(_) => Some(2f64.powi(8) - 1.0),
            RawSamples::U16(_) => Some(2f64.powi(16) - 1.0),
            RawSamples::U32(_) => Some(2f64.powi(32) - 1.0),
            RawSamples::U64(_) => Some(2f64.powi(64) - 1.0),
            RawSamples::F32(_) | RawSamples::F64(_) => None,
        }
    }

    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            RawSamples::I8(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::I16(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::I32(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::I64(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::U8(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::U16(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::U32(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::U64(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::F32(v) => v.iter().map(|&x| x as f64).collect(),
            RawSamples::F64(v) => v.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TdmsChannel {
    pub name: String,
    pub properties: Vec<(String, PropertyValue)>,
    data: Option<RawSamples>,
}

impl TdmsChannel {
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        lookup(&self.properties, name)
    }

    /// Samples, or `None` when the channel never carried numeric raw data
    pub fn data(&self) -> Option<&RawSamples> {
        self.data.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TdmsGroup {
    pub name: String,
    pub properties: Vec<(String, PropertyValue)>,
    pub channels: Vec<TdmsChannel>,
}

/// Parsed TDMS file; groups and channels keep first-appearance order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TdmsFile {
    pub properties: Vec<(String, PropertyValue)>,
    pub groups: Vec<TdmsGroup>,
}

impl TdmsFile {
    pub fn read(path: &Path) -> Result<Self, TdmsError> {
        let bytes = std::fs::read(path)?;
        Self::parse(&bytes)
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, TdmsError> {
        let mut state = ParseState::default();
        let mut pos = 0;
        while pos < bytes.len() {
            pos = state.read_segment(bytes, pos)?;
        }
        state.assemble()
    }

    fn group_mut(&mut self, name: &str) -> &mut TdmsGroup {
        let idx = match self.groups.iter().position(|g| g.name == name) {
            Some(idx) => idx,
            None => {
                self.groups.push(TdmsGroup {
                    name: name.to_string(),
                    ..Default::default()
                });
                self.groups.len() - 1
            }
        };
        &mut self.groups[idx]
    }
}

fn lookup<'a>(props: &'a [(String, PropertyValue)], name: &str) -> Option<&'a PropertyValue> {
    props.iter().find(|(n, _)| n == name).map(|(_, v)| v)
}

#[derive(Debug, Clone, Copy)]
enum RawIndex {
    Numeric { data_type: DataType, count: usize },
    /// Data we skip (strings, bools, timestamps)
    Opaque { bytes: usize },
}

impl RawIndex {
    fn byte_len(&self) -> Option<usize> {
        match *self {
            RawIndex::Numeric { data_type, count } => data_type.size()?.checked_mul(count),
            RawIndex::Opaque { bytes } => Some(bytes),
        }
    }
}

#[derive(Debug, Default)]
struct ObjectState {
    properties: Vec<(String, PropertyValue)>,
    index: Option<RawIndex>,
    data: Option<RawSamples>,
}

#[derive(Debug, Default)]
struct ParseState {
    order: Vec<String>,
    objects: HashMap<String, ObjectState>,
    /// Objects carrying raw data in the current segment, in storage order
    active: Vec<String>,
}

impl ParseState {
    /// Read one segment starting at `pos`; returns the offset of the next
    fn read_segment(&mut self, bytes: &[u8], pos: usize) -> Result<usize, TdmsError> {
        if bytes.len() - pos < LEAD_IN_LEN {
            return Err(TdmsError::Truncated { offset: pos });
        }
        if &bytes[pos..pos + 4] != SEGMENT_TAG {
            return Err(TdmsError::BadTag { offset: pos });
        }

        let mut lead = Cursor::new(bytes, pos + 4, false);
        let toc = lead.u32()?;
        lead.big_endian = toc & TOC_BIG_ENDIAN != 0;
        let _version = lead.u32()?;
        let next_offset = lead.u64()?;
        let raw_offset = lead.u64()?;

        if toc & TOC_DAQMX_RAW_DATA != 0 {
            return Err(TdmsError::UnsupportedLayout("DAQmx raw data".to_string()));
        }

        let seg_start = pos + LEAD_IN_LEN;
        let seg_end = if next_offset == INCOMPLETE_SEGMENT {
            bytes.len()
        } else {
            let declared = to_usize(next_offset)?
                .checked_add(seg_start)
                .ok_or_else(|| TdmsError::Corrupt("segment offset overflow".to_string()))?;
            if declared > bytes.len() {
                warn!(
                    "TDMS segment at byte {} declares {} bytes past end of file; reading what is present",
                    pos,
                    declared - bytes.len()
                );
            }
            declared.min(bytes.len())
        };
        let data_start = seg_start
            .checked_add(to_usize(raw_offset)?)
            .filter(|&start| start <= seg_end)
            .ok_or_else(|| {
                TdmsError::Corrupt(format!("raw data offset past segment end at byte {}", pos))
            })?;

        let segment = &bytes[..seg_end];
        let big_endian = toc & TOC_BIG_ENDIAN != 0;

        if toc & TOC_NEW_OBJ_LIST != 0 {
            self.active.clear();
        }
        if toc & TOC_META_DATA != 0 {
            let mut cur = Cursor::new(segment, seg_start, big_endian);
            self.read_metadata(&mut cur)?;
        }
        if toc & TOC_RAW_DATA != 0 {
            let mut cur = Cursor::new(segment, data_start, big_endian);
            self.read_raw_data(&mut cur, toc & TOC_INTERLEAVED != 0)?;
        }

        Ok(seg_end)
    }

    fn read_metadata(&mut self, cur: &mut Cursor<'_>) -> Result<(), TdmsError> {
        let object_count = cur.u32()?;
        for _ in 0..object_count {
            let path = cur.string()?;
            let raw_header = cur.u32()?;

            let order = &mut self.order;
            let state = self.objects.entry(path.clone()).or_insert_with(|| {
                order.push(path.clone());
                ObjectState::default()
            });

            match raw_header {
                NO_RAW_DATA => self.active.retain(|p| p != &path),
                SAME_RAW_INDEX => {
                    if state.index.is_none() {
                        return Err(TdmsError::Corrupt(format!(
                            "{} reuses a raw data index it never declared",
                            path
                        )));
                    }
                    activate(&mut self.active, &path);
                }
                _ => {
                    let data_type = DataType::from_code(cur.u32()?)?;
                    let dimension = cur.u32()?;
                    if dimension != 1 {
                        return Err(TdmsError::Corrupt(format!(
                            "{} has array dimension {}",
                            path, dimension
                        )));
                    }
                    let count = to_usize(cur.u64()?)?;
                    let index = match data_type {
                        DataType::String => RawIndex::Opaque {
                            bytes: to_usize(cur.u64()?)?,
                        },
                        DataType::Bool | DataType::Timestamp => RawIndex::Opaque {
                            bytes: data_type.size().unwrap_or(0).saturating_mul(count),
                        },
                        _ => RawIndex::Numeric { data_type, count },
                    };
                    state.index = Some(index);
                    activate(&mut self.active, &path);
                }
            }

            let property_count = cur.u32()?;
            for _ in 0..property_count {
                let name = cur.string()?;
                let data_type = DataType::from_code(cur.u32()?)?;
                let value = cur.property(data_type)?;
                match state.properties.iter_mut().find(|(n, _)| *n == name) {
                    Some(slot) => slot.1 = value,
                    None => state.properties.push((name, value)),
                }
            }
        }
        Ok(())
    }

    fn read_raw_data(&mut self, cur: &mut Cursor<'_>, interleaved: bool) -> Result<(), TdmsError> {
        let layout: Vec<(String, RawIndex)> = self
            .active
            .iter()
            .filter_map(|p| {
                self.objects
                    .get(p)
                    .and_then(|s| s.index)
                    .map(|i| (p.clone(), i))
            })
            .collect();

        let mut chunk_size = 0usize;
        for (path, index) in &layout {
            let len = index
                .byte_len()
                .ok_or_else(|| TdmsError::Corrupt(format!("{} raw size overflows", path)))?;
            chunk_size = chunk_size
                .checked_add(len)
                .ok_or_else(|| TdmsError::Corrupt("chunk size overflows".to_string()))?;
        }
        if chunk_size == 0 {
            return Ok(());
        }

        let available = cur.remaining();
        let chunks = available / chunk_size;
        if available % chunk_size != 0 {
            debug!(
                "Ignoring {} trailing bytes of a partial TDMS chunk",
                available % chunk_size
            );
        }

        for _ in 0..chunks {
            if interleaved {
                self.read_interleaved_chunk(cur, &layout)?;
            } else {
                for (path, index) in &layout {
                    match *index {
                        RawIndex::Numeric { data_type, count } => {
                            self.samples_for(path, data_type)?.extend_from(cur, count)?;
                        }
                        RawIndex::Opaque { bytes } => cur.skip(bytes)?,
                    }
                }
            }
        }
        Ok(())
    }

    fn read_interleaved_chunk(
        &mut self,
        cur: &mut Cursor<'_>,
        layout: &[(String, RawIndex)],
    ) -> Result<(), TdmsError> {
        let mut count = None;
        for (path, index) in layout {
            match *index {
                RawIndex::Numeric { count: c, .. } => {
                    if count.is_some_and(|prev| prev != c) {
                        return Err(TdmsError::Corrupt(
                            "interleaved channels with different value counts".to_string(),
                        ));
                    }
                    count = Some(c);
                }
                RawIndex::Opaque { .. } => {
                    return Err(TdmsError::UnsupportedLayout(format!(
                        "interleaved non-numeric channel {}",
                        path
                    )))
                }
            }
        }

        for _ in 0..count.unwrap_or(0) {
            for (path, index) in layout {
                if let RawIndex::Numeric { data_type, .. } = *index {
                    self.samples_for(path, data_type)?.extend_from(cur, 1)?;
                }
            }
        }
        Ok(())
    }

    fn samples_for(&mut self, path: &str, data_type: DataType) -> Result<&mut RawSamples, TdmsError> {
        let state = self
            .objects
            .get_mut(path)
            .ok_or_else(|| TdmsError::Corrupt(format!("raw data for unknown object {}", path)))?;
        match &state.data {
            Some(existing) if !existing.matches(data_type) => {
                return Err(TdmsError::Corrupt(format!(
                    "{} changes data type between segments",
                    path
                )))
            }
            Some(_) => {}
            None => state.data = Some(RawSamples::empty(data_type)?),
        }
        state
            .data
            .as_mut()
            .ok_or_else(|| TdmsError::Corrupt(format!("{} has no sample buffer", path)))
    }

    fn assemble(mut self) -> Result<TdmsFile, TdmsError> {
        let mut file = TdmsFile::default();
        for path in std::mem::take(&mut self.order) {
            let Some(state) = self.objects.remove(&path) else {
                continue;
            };
            match parse_object_path(&path)?.as_slice() {
                [] => file.properties = state.properties,
                [group] => file.group_mut(group).properties = state.properties,
                [group, channel] => file.group_mut(group).channels.push(TdmsChannel {
                    name: channel.clone(),
                    properties: state.properties,
                    data: state.data,
                }),
                _ => return Err(TdmsError::InvalidPath(path)),
            }
        }
        Ok(file)
    }
}

fn activate(active: &mut Vec<String>, path: &str) {
    if !active.iter().any(|p| p == path) {
        active.push(path.to_string());
    }
}

fn to_usize(v: u64) -> Result<usize, TdmsError> {
    usize::try_from(v).map_err(|_| TdmsError::Corrupt(format!("length {} exceeds address space", v)))
}

/// Split `/'Group'/'Channel'` into components; `''` escapes a quote
fn parse_object_path(path: &str) -> Result<Vec<String>, TdmsError> {
    if path == "/" {
        return Ok(Vec::new());
    }
    let invalid = || TdmsError::InvalidPath(path.to_string());

    let mut components = Vec::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '/' || chars.next() != Some('\'') {
            return Err(invalid());
        }
        let mut name = String::new();
        loop {
            match chars.next() {
                Some('\'') if chars.peek() == Some(&'\'') => {
                    chars.next();
                    name.push('\'');
                }
                Some('\'') => break,
                Some(ch) => name.push(ch),
                None => return Err(invalid()),
            }
        }
        components.push(name);
    }
    Ok(components)
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    big_endian: bool,
}

macro_rules! read_number {
    ($($name:ident: $ty:ty),* $(,)?) => {
        $(
            fn $name(&mut self) -> Result<$ty, TdmsError> {
                let raw = self.array::<{ std::mem::size_of::<$ty>() }>()?;
                Ok(if self.big_endian {
                    <$ty>::from_be_bytes(raw)
                } else {
                    <$ty>::from_le_bytes(raw)
                })
            }
        )*
    };
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize, big_endian: bool) -> Self {
        Self {
            bytes,
            pos,
            big_endian,
        }
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], TdmsError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(TdmsError::Truncated { offset: self.pos })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize) -> Result<(), TdmsError> {
        self.take(n).map(|_| ())
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], TdmsError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    read_number!(
        u8: u8,
        i8: i8,
        u16: u16,
        i16: i16,
        u32: u32,
        i32: i32,
        u64: u64,
        i64: i64,
        f32: f32,
        f64: f64,
    );

    fn string(&mut self) -> Result<String, TdmsError> {
        let offset = self.pos;
        let len = self.u32()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec())
            .map_err(|_| TdmsError::Corrupt(format!("invalid UTF-8 string at byte {}", offset)))
    }

    fn property(&mut self, data_type: DataType) -> Result<PropertyValue, TdmsError> {
        Ok(match data_type {
            DataType::I8 => PropertyValue::Int(self.i8()? as i64),
            DataType::I16 => PropertyValue::Int(self.i16()? as i64),
            DataType::I32 => PropertyValue::Int(self.i32()? as i64),
            DataType::I64 => PropertyValue::Int(self.i64()?),
            DataType::U8 => PropertyValue::UInt(self.u8()? as u64),
            DataType::U16 => PropertyValue::UInt(self.u16()? as u64),
            DataType::U32 => PropertyValue::UInt(self.u32()? as u64),
            DataType::U64 => PropertyValue::UInt(self.u64()?),
            DataType::F32 | DataType::F32WithUnit => PropertyValue::Float(self.f32()? as f64),
            DataType::F64 | DataType::F64WithUnit => PropertyValue::Float(self.f64()?),
            DataType::String => PropertyValue::String(self.string()?),
            DataType::Bool => PropertyValue::Bool(self.u8()? != 0),
            DataType::Timestamp => {
                if self.big_endian {
                    let seconds = self.i64()?;
                    let fractions = self.u64()?;
                    PropertyValue::Timestamp { seconds, fractions }
                } else {
                    let fractions = self.u64()?;
                    let seconds = self.i64()?;
                    PropertyValue::Timestamp { seconds, fractions }
                }
            }
        })
    }
}
