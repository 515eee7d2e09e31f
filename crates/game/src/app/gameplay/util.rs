fn step_toward(
    current: Vec2,
    target: Vec2,
    speed: f32,
    fixed_dt_seconds: f32,
) -> (Vec2, bool) {
    let dx = target.x - current.x;
    let dy = target.y - current.y;
    let distance_sq = dx * dx + dy * dy;
    let max_step = speed * fixed_dt_seconds;
    if distance_sq <= max_step * max_step {
        return (target, true);
    }

    let distance = distance_sq.sqrt();
    let inv_distance = distance.recip();
    let next = Vec2 {
        x: current.x + dx * inv_distance * max_step,
        y: current.y + dy * inv_distance * max_step,
    };
    if !next.x.is_finite() || !next.y.is_finite() {
        return (current, false);
    }
    (next, false)
}

fn lerp_vec2(current: Vec2, target: Vec2, factor: f32) -> Vec2 {
    let next = Vec2 {
        x: current.x + (target.x - current.x) * factor,
        y: current.y + (target.y - current.y) * factor,
    };
    if !next.x.is_finite() || !next.y.is_finite() {
        return current;
    }
    next
}

fn sprite_center(sprite: &Sprite) -> Vec2 {
    Vec2 {
        x: sprite.position.x + sprite.size.x * 0.5,
        y: sprite.position.y + sprite.size.y * 0.5,
    }
}

fn tile_of_point(point: Vec2, tile_size: u32) -> (i64, i64) {
    let tile = tile_size.max(1) as f32;
    (
        (point.x / tile).floor() as i64,
        (point.y / tile).floor() as i64,
    )
}

fn clamp_to_world(position: Vec2, size: Vec2, world_px: Vec2) -> Vec2 {
    let max_x = (world_px.x - size.x).max(0.0);
    let max_y = (world_px.y - size.y).max(0.0);
    Vec2 {
        x: position.x.clamp(0.0, max_x),
        y: position.y.clamp(0.0, max_y),
    }
}
