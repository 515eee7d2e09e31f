#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GameSystemId {
    SceneSwap,
    InputIntent,
    Entities,
    Camera,
    AnimatedTiles,
    DayNight,
    Cleanup,
}

/// Fixed-step order. SceneSwap runs first so a tick never mixes old and new
/// scene data; Cleanup runs last so removals and event rollover see the
/// whole tick.
const GAME_SYSTEM_ORDER: [GameSystemId; 7] = [
    GameSystemId::SceneSwap,
    GameSystemId::InputIntent,
    GameSystemId::Entities,
    GameSystemId::Camera,
    GameSystemId::AnimatedTiles,
    GameSystemId::DayNight,
    GameSystemId::Cleanup,
];

impl WorldScene {
    fn run_systems(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut WorldState,
    ) {
        for system_id in GAME_SYSTEM_ORDER {
            match system_id {
                GameSystemId::SceneSwap => self.system_scene_swap(world),
                GameSystemId::InputIntent => self.system_input_intent(input, world),
                GameSystemId::Entities => self.system_entities(fixed_dt_seconds, input, world),
                GameSystemId::Camera => self.system_camera(fixed_dt_seconds, input, world),
                GameSystemId::AnimatedTiles => {
                    self.system_animated_tiles(fixed_dt_seconds, input, world)
                }
                GameSystemId::DayNight => self.system_day_night(fixed_dt_seconds, world),
                GameSystemId::Cleanup => self.system_cleanup(world),
            }
        }
    }

    fn system_scene_swap(&mut self, world: &mut WorldState) {
        let Some((id, result)) = self.scene_service.poll() else {
            return;
        };
        match result {
            Ok(document) => self.apply_scene_document(world, document),
            Err(error) => {
                // The current scene stays untouched; the failure is handed
                // to the error-display collaborator through the event bus.
                warn!(scene = id.as_str(), error = %error, "scene_load_failed");
                world.events_mut().emit(WorldEvent::SceneLoadFailed {
                    id,
                    message: error.to_string(),
                });
            }
        }
    }

    fn system_input_intent(&mut self, input: &InputSnapshot, world: &mut WorldState) {
        let zoom_steps = input.zoom_delta_steps();
        if zoom_steps != 0 {
            world.camera_mut().apply_zoom_steps(zoom_steps);
            let zoom = world.camera().zoom;
            self.prefs.set_zoom(zoom);
        }

        let Some(player_id) = self.player_id else {
            return;
        };
        let flags = DirFlags {
            up: input.is_down(InputAction::MoveUp),
            down: input.is_down(InputAction::MoveDown),
            left: input.is_down(InputAction::MoveLeft),
            right: input.is_down(InputAction::MoveRight),
        };

        let mut ordered_path: Option<Vec<TileCoord>> = None;
        if input.right_click_pressed() {
            if let Some(cursor) = input.cursor_position_px() {
                ordered_path = self.plan_click_to_move(world, player_id, cursor);
            }
        }

        if let Some(player) = world.find_sprite_mut(player_id) {
            if let Some(path) = ordered_path {
                order_move_on_path(player, path);
            } else {
                if flags.any() && player.is_moving_to_target() {
                    cancel_path(player);
                }
                player.input_flags = flags;
            }
        }
    }

    fn plan_click_to_move(
        &mut self,
        world: &WorldState,
        player_id: SpriteId,
        cursor_px: Vec2,
    ) -> Option<Vec<TileCoord>> {
        let player = world.find_sprite(player_id)?;
        let tile_size = world.tile_size();
        let target_world = screen_to_world_px(world.camera(), cursor_px);

        let (start_x, start_y) = foot_tile(player.position, player.size, tile_size);
        let (end_x, end_y) = tile_of_point(target_world, tile_size);
        if start_x < 0 || start_y < 0 || end_x < 0 || end_y < 0 {
            return None;
        }
        let start = TileCoord {
            x: start_x as u32,
            y: start_y as u32,
        };
        let end = TileCoord {
            x: end_x as u32,
            y: end_y as u32,
        };

        self.grid_cache.refresh(world, &self.def_db);
        let path = find_path(self.grid_cache.grid(), start, end);
        if path.is_empty() {
            // Infeasible destination: the sprite simply stays put.
            debug!(
                start_x = start.x,
                start_y = start.y,
                end_x = end.x,
                end_y = end.y,
                "path_infeasible"
            );
            return None;
        }
        Some(path)
    }

    fn system_entities(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut WorldState,
    ) {
        self.grid_cache.refresh(world, &self.def_db);
        let grid = self.grid_cache.grid();
        let world_px = world.world_size_px();
        let tile_size = world.tile_size();
        let (window_w, window_h) = input.window_size();
        let view = visible_world_rect(
            world.camera(),
            Viewport {
                width: window_w,
                height: window_h,
            },
        )
        .expanded(ENTITY_UPDATE_PADDING_PX);

        let rng = &mut self.rng;
        for sprite in world.sprites_mut() {
            let in_view = sprite.position.x + sprite.size.x >= view.min.x
                && sprite.position.x <= view.max.x
                && sprite.position.y + sprite.size.y >= view.min.y
                && sprite.position.y <= view.max.y;
            if !in_view && !sprite.is_player {
                continue;
            }
            update_sprite(sprite, Some(grid), world_px, tile_size, fixed_dt_seconds, rng);
        }
    }

    fn system_camera(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut WorldState,
    ) {
        let pan = camera_pan_delta(input, CAMERA_PAN_SPEED_PX_PER_SEC, fixed_dt_seconds);
        if pan.x != 0.0 || pan.y != 0.0 {
            self.camera_rig.hold_fixed();
            let world_px = world.world_size_px();
            let (window_w, window_h) = input.window_size();
            let camera = world.camera_mut();
            let zoom = camera.effective_zoom();
            let view_dims = (window_w as f32 / zoom, window_h as f32 / zoom);
            camera.position = clamp_camera_position(
                Vec2 {
                    x: camera.position.x + pan.x,
                    y: camera.position.y + pan.y,
                },
                world_px,
                view_dims,
            );
        }

        let center = self.player_center(world);
        self.camera_rig.update(
            world,
            input.window_size(),
            center,
            fixed_dt_seconds,
            &mut self.rng,
        );
    }

    fn system_animated_tiles(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut WorldState,
    ) {
        let (window_w, window_h) = input.window_size();
        let view = visible_world_rect(
            world.camera(),
            Viewport {
                width: window_w,
                height: window_h,
            },
        );
        let visible = visible_tile_rect(&view, world.tile_size(), world.world_size_tiles());

        if let Some(visible) = visible {
            for item in world.room_items_mut() {
                let item_rect = TileRect {
                    x_min: item.min_tile_x(),
                    x_max: item.max_tile_x(),
                    y_min: item.min_tile_y(),
                    y_max: item.max_tile_y(),
                };
                if item_rect.intersects(&visible) {
                    item.anim_elapsed_seconds += fixed_dt_seconds;
                }
            }
        }

        update_particles(world, &mut self.rng, fixed_dt_seconds);
    }

    fn system_day_night(&mut self, fixed_dt_seconds: f32, world: &mut WorldState) {
        world
            .clock_mut()
            .advance(fixed_dt_seconds, GAME_HOURS_PER_REAL_SECOND);

        if let Some(center) = self.player_center(world) {
            world.upsert_light(
                LightKey::Player,
                Light {
                    position: center,
                    radius_px: PLAYER_LIGHT_RADIUS_PX,
                    color: PLAYER_LIGHT_COLOR,
                    max_intensity: PLAYER_LIGHT_INTENSITY,
                    current_intensity: 0.0,
                    flicker: None,
                },
            );
        }

        update_world_lighting(world);
        let hour = world.clock().hour;
        self.night_watcher.observe(hour, world.events_mut());
    }

    fn system_cleanup(&mut self, world: &mut WorldState) {
        let dead: Vec<SpriteId> = world
            .sprites()
            .iter()
            .filter(|sprite| sprite.marked_dead)
            .map(|sprite| sprite.id)
            .collect();
        for id in dead {
            world.mark_removed(id);
        }
        world.events_mut().finish_tick_rollover();
    }
}

fn update_particles(world: &mut WorldState, rng: &mut fastrand::Rng, fixed_dt_seconds: f32) {
    for effect in world.particles_mut().values_mut() {
        effect.spawn_accumulator += effect.spawn_per_second * fixed_dt_seconds;
        while effect.spawn_accumulator >= 1.0 {
            effect.spawn_accumulator -= 1.0;
            effect.particles.push(Particle {
                position: Vec2 {
                    x: effect.position.x + (rng.f32() - 0.5) * 24.0,
                    y: effect.position.y + (rng.f32() - 0.5) * 12.0,
                },
                velocity: Vec2 {
                    x: (rng.f32() - 0.5) * 6.0,
                    y: -PARTICLE_DRIFT_PX_PER_SEC * (0.5 + rng.f32()),
                },
                age_seconds: 0.0,
                lifetime_seconds: effect.particle_lifetime_seconds.max(0.5),
            });
        }
        for particle in &mut effect.particles {
            particle.age_seconds += fixed_dt_seconds;
            particle.position.x += particle.velocity.x * fixed_dt_seconds;
            particle.position.y += particle.velocity.y * fixed_dt_seconds;
        }
        effect
            .particles
            .retain(|particle| particle.age_seconds < particle.lifetime_seconds);
    }
}
