/// Combines active directional flags into an 8-way facing. Diagonal
/// combinations win over single-axis flags; with no flags (or with both
/// axes cancelled out) the current facing is kept.
fn resolve_free_direction(flags: DirFlags, current: Direction8) -> Direction8 {
    let up = flags.up && !flags.down;
    let down = flags.down && !flags.up;
    let left = flags.left && !flags.right;
    let right = flags.right && !flags.left;

    if up && left {
        Direction8::NorthWest
    } else if up && right {
        Direction8::NorthEast
    } else if down && left {
        Direction8::SouthWest
    } else if down && right {
        Direction8::SouthEast
    } else if up {
        Direction8::North
    } else if down {
        Direction8::South
    } else if left {
        Direction8::West
    } else if right {
        Direction8::East
    } else {
        current
    }
}

/// Facing while following a path comes from the per-axis delta signs to the
/// next waypoint, with the diagonal winning when both axes are live.
fn resolve_path_direction(dx: f32, dy: f32, current: Direction8) -> Direction8 {
    const AXIS_EPSILON: f32 = 0.25;
    let horizontal = dx.abs() > AXIS_EPSILON;
    let vertical = dy.abs() > AXIS_EPSILON;

    match (vertical, horizontal) {
        (true, true) => match (dy < 0.0, dx < 0.0) {
            (true, true) => Direction8::NorthWest,
            (true, false) => Direction8::NorthEast,
            (false, true) => Direction8::SouthWest,
            (false, false) => Direction8::SouthEast,
        },
        (true, false) => {
            if dy < 0.0 {
                Direction8::North
            } else {
                Direction8::South
            }
        }
        (false, true) => {
            if dx < 0.0 {
                Direction8::West
            } else {
                Direction8::East
            }
        }
        (false, false) => current,
    }
}

/// Normalized so held diagonals move at the same speed as a single axis.
fn free_movement_delta(flags: DirFlags, speed: f32, fixed_dt_seconds: f32) -> Vec2 {
    let mut x = 0.0f32;
    let mut y = 0.0f32;

    if flags.right {
        x += 1.0;
    }
    if flags.left {
        x -= 1.0;
    }
    if flags.down {
        y += 1.0;
    }
    if flags.up {
        y -= 1.0;
    }

    let len_sq = x * x + y * y;
    if len_sq > 0.0 {
        let inv_len = len_sq.sqrt().recip();
        x *= inv_len;
        y *= inv_len;
    }

    Vec2 {
        x: x * speed * fixed_dt_seconds,
        y: y * speed * fixed_dt_seconds,
    }
}

fn foot_tile(position: Vec2, size: Vec2, tile_size: u32) -> (i64, i64) {
    tile_of_point(
        Vec2 {
            x: position.x + size.x * 0.5,
            y: position.y + size.y - 1.0,
        },
        tile_size,
    )
}

/// Per-axis integration: each axis is tested independently against the
/// walkable grid so a blocked axis still lets the other slide. Non-finite
/// candidates are dropped, keeping the last known-good position.
fn integrate_free_movement(
    sprite: &mut Sprite,
    grid: Option<&WalkableGrid>,
    tile_size: u32,
    fixed_dt_seconds: f32,
) {
    let delta = free_movement_delta(sprite.input_flags, sprite.speed_px_per_sec, fixed_dt_seconds);

    let candidate_x = sprite.position.x + delta.x;
    if candidate_x.is_finite() {
        let candidate = Vec2 {
            x: candidate_x,
            y: sprite.position.y,
        };
        if can_occupy(grid, candidate, sprite.size, tile_size) {
            sprite.position.x = candidate_x;
        }
    }

    let candidate_y = sprite.position.y + delta.y;
    if candidate_y.is_finite() {
        let candidate = Vec2 {
            x: sprite.position.x,
            y: candidate_y,
        };
        if can_occupy(grid, candidate, sprite.size, tile_size) {
            sprite.position.y = candidate_y;
        }
    }
}

fn can_occupy(grid: Option<&WalkableGrid>, position: Vec2, size: Vec2, tile_size: u32) -> bool {
    let Some(grid) = grid else {
        return true;
    };
    let (tile_x, tile_y) = foot_tile(position, size, tile_size);
    grid.is_walkable(tile_x, tile_y)
}

/// Pixel target that puts the sprite's foot center on the waypoint's tile
/// center.
fn waypoint_target_px(waypoint: TileCoord, tile_size: u32, size: Vec2) -> Vec2 {
    let tile = tile_size as f32;
    Vec2 {
        x: waypoint.x as f32 * tile + tile * 0.5 - size.x * 0.5,
        y: waypoint.y as f32 * tile + tile * 0.5 - (size.y - 1.0),
    }
}

/// Advances along the assigned path: step toward the next waypoint's pixel
/// center, snap onto it once within one tick's travel, advance the cursor,
/// and trim what was consumed.
fn follow_path_movement(sprite: &mut Sprite, tile_size: u32, fixed_dt_seconds: f32) {
    let Some(waypoint) = sprite.next_waypoint() else {
        return;
    };
    let target = waypoint_target_px(waypoint, tile_size, sprite.size);
    let dx = target.x - sprite.position.x;
    let dy = target.y - sprite.position.y;
    sprite.direction = resolve_path_direction(dx, dy, sprite.direction);

    let (next, arrived) = step_toward(
        sprite.position,
        target,
        sprite.speed_px_per_sec,
        fixed_dt_seconds,
    );
    sprite.position = next;
    if arrived {
        sprite.path_cursor = sprite.path_cursor.saturating_add(1);
        sprite.trim_consumed_waypoints();
    }
}

/// Advances the frame accumulator by the state's rate and steps frames on
/// each 1.0 crossing. Returns true when a one-shot band stepped past its
/// last frame.
fn advance_animation(sprite: &mut Sprite) -> bool {
    let profile = animation_profile(sprite.kind, sprite.state);
    if profile.advance_per_tick <= 0.0 {
        sprite.frame = profile.band.start;
        sprite.frame_accumulator = 0.0;
        return false;
    }

    if !profile.band.contains(sprite.frame) {
        sprite.frame = profile.band.start;
        sprite.frame_accumulator = 0.0;
    }

    sprite.frame_accumulator += profile.advance_per_tick;
    let mut finished_once = false;
    while sprite.frame_accumulator >= 1.0 {
        sprite.frame_accumulator -= 1.0;
        if sprite.frame < profile.band.end {
            sprite.frame += 1;
        } else if profile.looped {
            sprite.frame = profile.band.start;
        } else {
            finished_once = true;
        }
    }
    finished_once
}

fn update_blink(blink: &mut BlinkState, rng: &mut fastrand::Rng, fixed_dt_seconds: f32) {
    blink.seconds_until_next -= fixed_dt_seconds;
    if blink.seconds_until_next > 0.0 {
        return;
    }
    match blink.phase {
        BlinkPhase::Open => {
            blink.phase = BlinkPhase::Closed;
            blink.seconds_until_next = BLINK_CLOSED_SECONDS;
        }
        BlinkPhase::Closed => {
            blink.phase = BlinkPhase::HalfOpen;
            blink.seconds_until_next = BLINK_HALF_OPEN_SECONDS;
        }
        BlinkPhase::HalfOpen => {
            blink.phase = BlinkPhase::Open;
            blink.seconds_until_next = BLINK_INTERVAL_MIN_SECONDS
                + rng.f32() * (BLINK_INTERVAL_MAX_SECONDS - BLINK_INTERVAL_MIN_SECONDS);
        }
    }
}

fn enter_stopping(sprite: &mut Sprite) {
    match sprite.kind {
        SpriteKind::Humanoid => {
            sprite.state = MovementState::Stopping;
            sprite.frame = HUMANOID_STOP_BAND.start;
            sprite.frame_accumulator = 0.0;
        }
        SpriteKind::Animal => {
            sprite.state = MovementState::Idle;
            sprite.frame = ANIMAL_IDLE_BAND.start;
            sprite.frame_accumulator = 0.0;
        }
    }
}

/// Assigning a path puts the sprite on rails and clears directional input,
/// per the click-to-move contract.
fn order_move_on_path(sprite: &mut Sprite, path: Vec<TileCoord>) {
    if path.is_empty() {
        return;
    }
    sprite.assign_path(path);
    sprite.input_flags.clear();
    sprite.state = MovementState::MovingOnPath;
}

fn cancel_path(sprite: &mut Sprite) {
    let was_on_path = sprite.state == MovementState::MovingOnPath;
    sprite.clear_path();
    if was_on_path {
        enter_stopping(sprite);
    }
}

/// One fixed tick for one sprite: state transitions, position integration,
/// animation, blink.
fn update_sprite(
    sprite: &mut Sprite,
    grid: Option<&WalkableGrid>,
    world_px: Vec2,
    tile_size: u32,
    fixed_dt_seconds: f32,
    rng: &mut fastrand::Rng,
) {
    match sprite.state {
        MovementState::Idle => {
            if sprite.has_active_path() {
                sprite.state = MovementState::MovingOnPath;
            } else if sprite.input_flags.any() {
                sprite.state = MovementState::MovingFree;
            }
        }
        MovementState::MovingFree => {
            if sprite.has_active_path() {
                sprite.state = MovementState::MovingOnPath;
                sprite.input_flags.clear();
            } else if !sprite.input_flags.any() {
                enter_stopping(sprite);
            }
        }
        MovementState::MovingOnPath => {
            if !sprite.has_active_path() {
                enter_stopping(sprite);
            }
        }
        MovementState::Stopping => {
            if sprite.input_flags.any() {
                sprite.state = MovementState::MovingFree;
            } else if sprite.has_active_path() {
                sprite.state = MovementState::MovingOnPath;
            }
        }
    }

    match sprite.state {
        MovementState::MovingFree => {
            sprite.direction = resolve_free_direction(sprite.input_flags, sprite.direction);
            integrate_free_movement(sprite, grid, tile_size, fixed_dt_seconds);
        }
        MovementState::MovingOnPath => {
            follow_path_movement(sprite, tile_size, fixed_dt_seconds);
            if !sprite.has_active_path() {
                enter_stopping(sprite);
            }
        }
        MovementState::Idle | MovementState::Stopping => {}
    }

    // World-bounds clamping applies no matter what collision decided.
    sprite.position = clamp_to_world(sprite.position, sprite.size, world_px);

    let finished_one_shot = advance_animation(sprite);
    if finished_one_shot && sprite.state == MovementState::Stopping {
        sprite.state = MovementState::Idle;
        sprite.frame = 0;
        sprite.frame_accumulator = 0.0;
    }

    if sprite.kind == SpriteKind::Humanoid {
        update_blink(&mut sprite.blink, rng, fixed_dt_seconds);
        if sprite.state == MovementState::Idle {
            match sprite.blink.phase {
                BlinkPhase::Closed => sprite.frame = BLINK_CLOSED_FRAME,
                BlinkPhase::HalfOpen => sprite.frame = BLINK_HALF_OPEN_FRAME,
                BlinkPhase::Open => {}
            }
        }
    }
}
