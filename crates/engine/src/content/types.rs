use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Flicker {
    pub speed: f32,
    pub amplitude: f32,
    #[serde(default)]
    pub offset: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LightAttachment {
    pub offset: [f32; 2],
    pub color: [u8; 3],
    pub radius: f32,
    pub intensity: f32,
    #[serde(default)]
    pub flicker: Option<Flicker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ParticleAttachment {
    pub offset: [f32; 2],
    pub color: [u8; 3],
    pub rate: f32,
    pub lifetime: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SheetDims {
    pub width: u32,
    pub height: u32,
}

/// One drawable layer of an item type, with every variant-shaped source
/// field already normalized: `frames` is always a list of per-slot
/// animation sequences and `z` always has one entry per slot.
#[derive(Debug, Clone, PartialEq)]
pub struct TileDef {
    pub sheet: String,
    pub frames: Vec<Vec<u16>>,
    pub z: Vec<f32>,
    pub frame_duration: Option<f32>,
    pub walkable: bool,
    pub sway: bool,
    pub lights: Vec<LightAttachment>,
    pub particles: Vec<ParticleAttachment>,
}

impl TileDef {
    /// Animation sequence for the given tile slot of a placed item; slots
    /// past the end wrap, so a one-slot def tiles across any rectangle.
    pub fn sequence_for_slot(&self, slot: usize) -> &[u16] {
        let index = slot % self.frames.len().max(1);
        self.frames
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn z_for_slot(&self, slot: usize) -> f32 {
        let index = slot % self.z.len().max(1);
        self.z.get(index).copied().unwrap_or(0.0)
    }

    pub fn is_animated(&self) -> bool {
        self.frame_duration.is_some() && self.frames.iter().any(|sequence| sequence.len() > 1)
    }
}

#[derive(Debug, Error)]
pub enum DefError {
    #[error("failed to read definition table {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse definition table: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
    },
    #[error("definition table declares tile_size 0")]
    ZeroTileSize,
    #[error("duplicate item type {item_type} in definition table")]
    DuplicateItemType { item_type: u32 },
    #[error("item type {item_type} references unknown sheet '{sheet}'")]
    UnknownSheet { item_type: u32, sheet: String },
    #[error("item type {item_type} has a tile definition with no frames")]
    EmptyFrames { item_type: u32 },
    #[error("invalid frame range '{raw}' in item type {item_type}")]
    BadFrameRange { item_type: u32, raw: String },
    #[error(
        "frame {frame} of item type {item_type} is outside sheet '{sheet}' \
({columns}x{rows} cells)"
    )]
    FrameOutOfSheet {
        item_type: u32,
        sheet: String,
        frame: u16,
        columns: u32,
        rows: u32,
    },
    #[error(
        "item type {item_type} declares {z_len} z entries for {slot_len} frame slots"
    )]
    ZLengthMismatch {
        item_type: u32,
        z_len: usize,
        slot_len: usize,
    },
}
