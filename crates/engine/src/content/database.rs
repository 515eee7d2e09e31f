use std::collections::HashMap;

use super::types::{SheetDims, TileDef};

/// Immutable lookup table from item type id to its tile definitions, built
/// once at startup from the externally authored JSON table.
#[derive(Debug, Clone, Default)]
pub struct DefDatabase {
    tile_size: u32,
    sheets: HashMap<String, SheetDims>,
    defs_by_type: HashMap<u32, Vec<TileDef>>,
    source_hash_hex: String,
}

impl DefDatabase {
    pub(crate) fn new(
        tile_size: u32,
        sheets: HashMap<String, SheetDims>,
        defs_by_type: HashMap<u32, Vec<TileDef>>,
        source_hash_hex: String,
    ) -> Self {
        Self {
            tile_size,
            sheets,
            defs_by_type,
            source_hash_hex,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn defs_for(&self, item_type: u32) -> &[TileDef] {
        self.defs_by_type
            .get(&item_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_item_type(&self, item_type: u32) -> bool {
        self.defs_by_type.contains_key(&item_type)
    }

    pub fn sheet_dims(&self, sheet: &str) -> Option<SheetDims> {
        self.sheets.get(sheet).copied()
    }

    pub fn sheet_columns(&self, sheet: &str) -> Option<u32> {
        let dims = self.sheet_dims(sheet)?;
        Some((dims.width / self.tile_size.max(1)).max(1))
    }

    pub fn item_type_count(&self) -> usize {
        self.defs_by_type.len()
    }

    pub fn source_hash_hex(&self) -> &str {
        &self.source_hash_hex
    }
}

#[cfg(test)]
mod tests {
    use super::super::loader::load_def_database_from_str;

    #[test]
    fn unknown_item_type_yields_empty_defs_not_error() {
        let db = load_def_database_from_str(
            r#"{
                "tile_size": 32,
                "sheets": { "terrain": { "width": 64, "height": 64 } },
                "items": [ { "id": 1, "tiles": [ { "sheet": "terrain", "frames": 0 } ] } ]
            }"#,
        )
        .expect("db");

        assert!(db.defs_for(999).is_empty());
        assert!(!db.has_item_type(999));
        assert!(db.has_item_type(1));
    }

    #[test]
    fn sheet_columns_derive_from_tile_size() {
        let db = load_def_database_from_str(
            r#"{
                "tile_size": 32,
                "sheets": { "terrain": { "width": 256, "height": 64 } },
                "items": []
            }"#,
        )
        .expect("db");

        assert_eq!(db.sheet_columns("terrain"), Some(8));
        assert_eq!(db.sheet_columns("missing"), None);
    }
}
