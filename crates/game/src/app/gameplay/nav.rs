/// 8-directional A* over the walkable grid with uniform move cost and a
/// Chebyshev heuristic, which is admissible for that move set. Infeasible
/// requests (unwalkable endpoints, no route) return an empty sequence;
/// callers treat that as "cannot move". Ties in the open set break on a
/// fixed key so the same request always yields the same path.
fn find_path(grid: &WalkableGrid, start: TileCoord, end: TileCoord) -> Vec<TileCoord> {
    if !grid.is_tile_walkable(start) || !grid.is_tile_walkable(end) {
        return Vec::new();
    }
    if start == end {
        return vec![start];
    }
    let Some(start_index) = grid.index_of(i64::from(start.x), i64::from(start.y)) else {
        return Vec::new();
    };
    let Some(end_index) = grid.index_of(i64::from(end.x), i64::from(end.y)) else {
        return Vec::new();
    };

    let node_count = grid.width as usize * grid.height as usize;
    let mut closed = vec![false; node_count];
    let mut best_g = vec![u32::MAX; node_count];
    let mut parent = vec![None::<usize>; node_count];
    let mut open = Vec::new();
    let mut next_insertion = 0u64;

    let start_h = chebyshev_distance(start, end);
    open.push(OpenNode {
        coord: start,
        h_cost: start_h,
        f_cost: start_h,
        insertion_order: next_insertion,
    });
    next_insertion = next_insertion.saturating_add(1);
    best_g[start_index] = 0;

    while !open.is_empty() {
        let best_index = pick_best_open_node_index(&open);
        let current = open.swap_remove(best_index);
        let Some(current_index) = grid.index_of(i64::from(current.coord.x), i64::from(current.coord.y))
        else {
            continue;
        };
        if closed[current_index] {
            continue;
        }
        closed[current_index] = true;

        if current.coord == end {
            return reconstruct_tile_path(&parent, grid.width, start_index, end_index);
        }

        let current_g = best_g[current_index];
        for neighbor in neighbors_8(grid, current.coord) {
            let Some(neighbor) = neighbor else {
                continue;
            };
            let Some(neighbor_index) =
                grid.index_of(i64::from(neighbor.x), i64::from(neighbor.y))
            else {
                continue;
            };
            if closed[neighbor_index] || !grid.is_tile_walkable(neighbor) {
                continue;
            }

            let tentative_g = current_g.saturating_add(1);
            if tentative_g >= best_g[neighbor_index] {
                continue;
            }

            best_g[neighbor_index] = tentative_g;
            parent[neighbor_index] = Some(current_index);
            let h_cost = chebyshev_distance(neighbor, end);
            open.push(OpenNode {
                coord: neighbor,
                h_cost,
                f_cost: tentative_g.saturating_add(h_cost),
                insertion_order: next_insertion,
            });
            next_insertion = next_insertion.saturating_add(1);
        }
    }

    Vec::new()
}

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    coord: TileCoord,
    h_cost: u32,
    f_cost: u32,
    insertion_order: u64,
}

fn pick_best_open_node_index(open: &[OpenNode]) -> usize {
    let mut best_index = 0usize;
    for index in 1..open.len() {
        if open_node_order_key(open[index]) < open_node_order_key(open[best_index]) {
            best_index = index;
        }
    }
    best_index
}

fn open_node_order_key(node: OpenNode) -> (u32, u32, u32, u32, u64) {
    (
        node.f_cost,
        node.h_cost,
        node.coord.y,
        node.coord.x,
        node.insertion_order,
    )
}

fn neighbors_8(grid: &WalkableGrid, coord: TileCoord) -> [Option<TileCoord>; 8] {
    let mut out = [None; 8];
    let offsets: [(i64, i64); 8] = [
        (0, -1),
        (1, -1),
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
    ];
    for (slot, (dx, dy)) in offsets.into_iter().enumerate() {
        let x = i64::from(coord.x) + dx;
        let y = i64::from(coord.y) + dy;
        if x < 0 || y < 0 || x >= i64::from(grid.width) || y >= i64::from(grid.height) {
            continue;
        }
        out[slot] = Some(TileCoord {
            x: x as u32,
            y: y as u32,
        });
    }
    out
}

fn reconstruct_tile_path(
    parent: &[Option<usize>],
    width: u32,
    start_index: usize,
    end_index: usize,
) -> Vec<TileCoord> {
    let mut cursor = end_index;
    let mut indices = vec![cursor];

    while cursor != start_index {
        let Some(next) = parent.get(cursor).and_then(|value| *value) else {
            return Vec::new();
        };
        cursor = next;
        indices.push(cursor);
    }
    indices.reverse();
    indices
        .into_iter()
        .map(|index| TileCoord {
            x: (index as u32) % width,
            y: (index as u32) / width,
        })
        .collect()
}

fn chebyshev_distance(a: TileCoord, b: TileCoord) -> u32 {
    a.x.abs_diff(b.x).max(a.y.abs_diff(b.y))
}
