use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::info;

use super::database::DefDatabase;
use super::types::{DefError, LightAttachment, ParticleAttachment, SheetDims, TileDef};

#[derive(Debug, Deserialize)]
struct RawDefDocument {
    tile_size: u32,
    sheets: HashMap<String, SheetDims>,
    items: Vec<RawItemEntry>,
}

#[derive(Debug, Deserialize)]
struct RawItemEntry {
    id: u32,
    tiles: Vec<RawTileDef>,
}

#[derive(Debug, Deserialize)]
struct RawTileDef {
    sheet: String,
    frames: RawFrames,
    #[serde(default)]
    z: RawZ,
    #[serde(default)]
    frame_duration: Option<f32>,
    #[serde(default = "default_walkable")]
    walkable: bool,
    #[serde(default)]
    sway: bool,
    #[serde(default)]
    lights: Vec<LightAttachment>,
    #[serde(default)]
    particles: Vec<ParticleAttachment>,
}

fn default_walkable() -> bool {
    true
}

/// The externally authored table encodes frames in several shapes: a single
/// index, a compact `"a-b"` range (one static frame per covered slot), a
/// flat list, or nested lists where an inner list is an animation sequence.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFrames {
    Single(u16),
    Range(String),
    List(Vec<RawFrameEntry>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawFrameEntry {
    Single(u16),
    Range(String),
    Sequence(Vec<RawSequenceToken>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSequenceToken {
    Frame(u16),
    Range(String),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawZ {
    Scalar(f32),
    PerSlot(Vec<f32>),
}

impl Default for RawZ {
    fn default() -> Self {
        RawZ::Scalar(1.0)
    }
}

pub fn load_def_database(path: &Path) -> Result<DefDatabase, DefError> {
    let text = fs::read_to_string(path).map_err(|source| DefError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    load_def_database_from_str(&text)
}

pub fn load_def_database_from_str(text: &str) -> Result<DefDatabase, DefError> {
    let raw: RawDefDocument =
        serde_json::from_str(text).map_err(|source| DefError::Parse { source })?;
    if raw.tile_size == 0 {
        return Err(DefError::ZeroTileSize);
    }

    let source_hash_hex = hash_source(text.as_bytes());
    let mut defs_by_type: HashMap<u32, Vec<TileDef>> = HashMap::new();
    for entry in &raw.items {
        if defs_by_type.contains_key(&entry.id) {
            return Err(DefError::DuplicateItemType { item_type: entry.id });
        }
        let mut defs = Vec::with_capacity(entry.tiles.len());
        for raw_def in &entry.tiles {
            defs.push(normalize_tile_def(
                entry.id,
                raw_def,
                raw.tile_size,
                &raw.sheets,
            )?);
        }
        defs_by_type.insert(entry.id, defs);
    }

    info!(
        item_count = defs_by_type.len(),
        sheet_count = raw.sheets.len(),
        input_hash = %source_hash_hex,
        "defs_loaded"
    );

    Ok(DefDatabase::new(
        raw.tile_size,
        raw.sheets,
        defs_by_type,
        source_hash_hex,
    ))
}

fn normalize_tile_def(
    item_type: u32,
    raw: &RawTileDef,
    tile_size: u32,
    sheets: &HashMap<String, SheetDims>,
) -> Result<TileDef, DefError> {
    let dims = sheets
        .get(&raw.sheet)
        .copied()
        .ok_or_else(|| DefError::UnknownSheet {
            item_type,
            sheet: raw.sheet.clone(),
        })?;
    let columns = (dims.width / tile_size).max(1);
    let rows = (dims.height / tile_size).max(1);

    let frames = normalize_frames(item_type, &raw.frames)?;
    if frames.is_empty() || frames.iter().any(Vec::is_empty) {
        return Err(DefError::EmptyFrames { item_type });
    }
    for frame in frames.iter().flatten().copied() {
        if u32::from(frame) >= columns * rows {
            return Err(DefError::FrameOutOfSheet {
                item_type,
                sheet: raw.sheet.clone(),
                frame,
                columns,
                rows,
            });
        }
    }

    let z = match &raw.z {
        RawZ::Scalar(value) => vec![*value; frames.len()],
        RawZ::PerSlot(values) => {
            if values.len() != frames.len() {
                return Err(DefError::ZLengthMismatch {
                    item_type,
                    z_len: values.len(),
                    slot_len: frames.len(),
                });
            }
            values.clone()
        }
    };

    Ok(TileDef {
        sheet: raw.sheet.clone(),
        frames,
        z,
        frame_duration: raw.frame_duration.filter(|duration| *duration > 0.0),
        walkable: raw.walkable,
        sway: raw.sway,
        lights: raw.lights.clone(),
        particles: raw.particles.clone(),
    })
}

fn normalize_frames(item_type: u32, raw: &RawFrames) -> Result<Vec<Vec<u16>>, DefError> {
    match raw {
        RawFrames::Single(frame) => Ok(vec![vec![*frame]]),
        RawFrames::Range(range) => {
            let expanded = expand_range(item_type, range)?;
            Ok(expanded.into_iter().map(|frame| vec![frame]).collect())
        }
        RawFrames::List(entries) => {
            let mut slots = Vec::with_capacity(entries.len());
            for entry in entries {
                match entry {
                    RawFrameEntry::Single(frame) => slots.push(vec![*frame]),
                    RawFrameEntry::Range(range) => slots.push(expand_range(item_type, range)?),
                    RawFrameEntry::Sequence(tokens) => {
                        let mut sequence = Vec::with_capacity(tokens.len());
                        for token in tokens {
                            match token {
                                RawSequenceToken::Frame(frame) => sequence.push(*frame),
                                RawSequenceToken::Range(range) => {
                                    sequence.extend(expand_range(item_type, range)?)
                                }
                            }
                        }
                        slots.push(sequence);
                    }
                }
            }
            Ok(slots)
        }
    }
}

fn expand_range(item_type: u32, raw: &str) -> Result<Vec<u16>, DefError> {
    let bad_range = || DefError::BadFrameRange {
        item_type,
        raw: raw.to_string(),
    };
    let (start_text, end_text) = raw.split_once('-').ok_or_else(bad_range)?;
    let start: u16 = start_text.trim().parse().map_err(|_| bad_range())?;
    let end: u16 = end_text.trim().parse().map_err(|_| bad_range())?;
    if end < start {
        return Err(bad_range());
    }
    Ok((start..=end).collect())
}

fn hash_source(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    to_hex_lower(&hasher.finalize())
}

fn to_hex_lower(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_frames(frames_json: &str) -> String {
        format!(
            r#"{{
                "tile_size": 32,
                "sheets": {{ "terrain": {{ "width": 256, "height": 128 }} }},
                "items": [
                    {{ "id": 10, "tiles": [ {{ "sheet": "terrain", "frames": {frames_json} }} ] }}
                ]
            }}"#
        )
    }

    #[test]
    fn scalar_array_and_nested_shapes_normalize_to_the_same_canonical_form() {
        let scalar = load_def_database_from_str(&doc_with_frames("4")).expect("scalar");
        let list = load_def_database_from_str(&doc_with_frames("[4]")).expect("list");
        let nested = load_def_database_from_str(&doc_with_frames("[[4]]")).expect("nested");

        let expected = vec![vec![4u16]];
        assert_eq!(scalar.defs_for(10)[0].frames, expected);
        assert_eq!(list.defs_for(10)[0].frames, expected);
        assert_eq!(nested.defs_for(10)[0].frames, expected);
    }

    #[test]
    fn top_level_range_expands_to_one_static_frame_per_slot() {
        let db = load_def_database_from_str(&doc_with_frames("\"4-7\"")).expect("range");
        assert_eq!(
            db.defs_for(10)[0].frames,
            vec![vec![4], vec![5], vec![6], vec![7]]
        );
    }

    #[test]
    fn inner_range_expands_to_an_animation_sequence() {
        let db = load_def_database_from_str(&doc_with_frames("[\"4-7\"]")).expect("range");
        assert_eq!(db.defs_for(10)[0].frames, vec![vec![4, 5, 6, 7]]);
    }

    #[test]
    fn nested_sequences_accept_mixed_frames_and_ranges() {
        let db = load_def_database_from_str(&doc_with_frames("[[0, \"2-3\"], 7]")).expect("mixed");
        assert_eq!(db.defs_for(10)[0].frames, vec![vec![0, 2, 3], vec![7]]);
    }

    #[test]
    fn reversed_range_is_an_error() {
        let err = load_def_database_from_str(&doc_with_frames("\"7-4\"")).expect_err("error");
        assert!(matches!(err, DefError::BadFrameRange { .. }));
    }

    #[test]
    fn frame_outside_sheet_grid_is_a_load_error() {
        // 256x128 at 32px = 8x4 cells = 32 frames, so index 32 is out.
        let err = load_def_database_from_str(&doc_with_frames("32")).expect_err("error");
        assert!(matches!(err, DefError::FrameOutOfSheet { frame: 32, .. }));
    }

    #[test]
    fn unknown_sheet_is_a_load_error() {
        let text = r#"{
            "tile_size": 32,
            "sheets": {},
            "items": [ { "id": 1, "tiles": [ { "sheet": "missing", "frames": 0 } ] } ]
        }"#;
        let err = load_def_database_from_str(text).expect_err("error");
        assert!(matches!(err, DefError::UnknownSheet { .. }));
    }

    #[test]
    fn scalar_z_broadcasts_and_mismatched_array_errors() {
        let ok = load_def_database_from_str(&doc_with_frames("\"0-2\"")).expect("db");
        assert_eq!(ok.defs_for(10)[0].z, vec![1.0, 1.0, 1.0]);

        let text = r#"{
            "tile_size": 32,
            "sheets": { "terrain": { "width": 256, "height": 128 } },
            "items": [
                { "id": 10, "tiles": [
                    { "sheet": "terrain", "frames": "0-2", "z": [5.0, 6.0] }
                ] }
            ]
        }"#;
        let err = load_def_database_from_str(text).expect_err("error");
        assert!(matches!(
            err,
            DefError::ZLengthMismatch {
                z_len: 2,
                slot_len: 3,
                ..
            }
        ));
    }

    #[test]
    fn duplicate_item_type_is_rejected() {
        let text = r#"{
            "tile_size": 32,
            "sheets": { "terrain": { "width": 64, "height": 64 } },
            "items": [
                { "id": 3, "tiles": [ { "sheet": "terrain", "frames": 0 } ] },
                { "id": 3, "tiles": [ { "sheet": "terrain", "frames": 1 } ] }
            ]
        }"#;
        let err = load_def_database_from_str(text).expect_err("error");
        assert!(matches!(err, DefError::DuplicateItemType { item_type: 3 }));
    }

    #[test]
    fn walkable_defaults_true_and_can_be_disabled() {
        let text = r#"{
            "tile_size": 32,
            "sheets": { "terrain": { "width": 64, "height": 64 } },
            "items": [
                { "id": 1, "tiles": [ { "sheet": "terrain", "frames": 0 } ] },
                { "id": 2, "tiles": [ { "sheet": "terrain", "frames": 1, "walkable": false } ] }
            ]
        }"#;
        let db = load_def_database_from_str(text).expect("db");
        assert!(db.defs_for(1)[0].walkable);
        assert!(!db.defs_for(2)[0].walkable);
    }

    #[test]
    fn identical_sources_share_a_fingerprint_and_edits_change_it() {
        let first = load_def_database_from_str(&doc_with_frames("4")).expect("first");
        let second = load_def_database_from_str(&doc_with_frames("4")).expect("second");
        let edited = load_def_database_from_str(&doc_with_frames("5")).expect("edited");

        assert_eq!(first.source_hash_hex(), second.source_hash_hex());
        assert_ne!(first.source_hash_hex(), edited.source_hash_hex());
    }

    #[test]
    fn light_and_particle_attachments_parse() {
        let text = r#"{
            "tile_size": 32,
            "sheets": { "props": { "width": 64, "height": 64 } },
            "items": [
                { "id": 40, "tiles": [
                    {
                        "sheet": "props",
                        "frames": 2,
                        "lights": [
                            {
                                "offset": [16.0, 8.0],
                                "color": [255, 190, 110],
                                "radius": 96.0,
                                "intensity": 0.8,
                                "flicker": { "speed": 7.0, "amplitude": 0.15 }
                            }
                        ],
                        "particles": [
                            { "offset": [16.0, 0.0], "color": [200, 255, 140], "rate": 2.0, "lifetime": 3.0 }
                        ]
                    }
                ] }
            ]
        }"#;
        let db = load_def_database_from_str(text).expect("db");
        let def = &db.defs_for(40)[0];
        assert_eq!(def.lights.len(), 1);
        assert_eq!(def.lights[0].color, [255, 190, 110]);
        let flicker = def.lights[0].flicker.expect("flicker");
        assert!((flicker.speed - 7.0).abs() < 0.0001);
        assert_eq!(def.particles.len(), 1);
    }
}
