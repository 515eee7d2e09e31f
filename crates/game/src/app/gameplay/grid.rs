#[derive(Debug, Clone, Default, PartialEq)]
struct WalkableGrid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl WalkableGrid {
    /// A tile is walkable unless some placed item covering it carries a
    /// non-walkable tile definition. The grid is sized to the world, and
    /// rebuilding it from unchanged room data is bitwise identical.
    fn build(items: &[RoomItem], defs: &DefDatabase, world_tiles: (u32, u32)) -> Self {
        let (width, height) = world_tiles;
        let mut cells = vec![true; width as usize * height as usize];

        for item in items {
            let blocks = defs
                .defs_for(item.item_type)
                .iter()
                .any(|def| !def.walkable);
            if !blocks {
                continue;
            }
            for tile_y in item.tiles_y.iter().copied() {
                for tile_x in item.tiles_x.iter().copied() {
                    if tile_x < width && tile_y < height {
                        cells[tile_y as usize * width as usize + tile_x as usize] = false;
                    }
                }
            }
        }

        Self {
            width,
            height,
            cells,
        }
    }

    fn index_of(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    /// Out-of-bounds coordinates read as not walkable.
    fn is_walkable(&self, x: i64, y: i64) -> bool {
        self.index_of(x, y)
            .and_then(|index| self.cells.get(index))
            .copied()
            .unwrap_or(false)
    }

    fn is_tile_walkable(&self, tile: TileCoord) -> bool {
        self.is_walkable(i64::from(tile.x), i64::from(tile.y))
    }
}

/// Scene-keyed cache: the grid is rebuilt only when the scene generation
/// changes, which happens exactly once per scene swap.
#[derive(Debug, Default)]
struct WalkableGridCache {
    generation: Option<u64>,
    grid: WalkableGrid,
}

impl WalkableGridCache {
    fn refresh(&mut self, world: &WorldState, defs: &DefDatabase) {
        if self.generation == Some(world.scene_generation()) {
            return;
        }
        self.grid = WalkableGrid::build(world.room_items(), defs, world.world_size_tiles());
        self.generation = Some(world.scene_generation());
    }

    fn grid(&self) -> &WalkableGrid {
        &self.grid
    }

    fn invalidate(&mut self) {
        self.generation = None;
    }
}
