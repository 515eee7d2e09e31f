fn scene_data_from_document(document: &SceneDocument, tile_size: u32) -> SceneData {
    let items = document
        .items
        .iter()
        .filter(|item| item.visible && !item.x.is_empty() && !item.y.is_empty())
        .enumerate()
        .map(|(index, item)| RoomItem {
            id: index as u64,
            item_type: item.item_type,
            tiles_x: item.x.clone(),
            tiles_y: item.y.clone(),
            rotation_radians: item.rotation,
            sway: item.sway,
            anim_elapsed_seconds: 0.0,
        })
        .collect();

    SceneData {
        id: SceneId(document.scene.clone()),
        world_width_px: document.world_width.max(0.0),
        world_height_px: document.world_height.max(0.0),
        tile_size,
        background_item_type: Some(document.background),
        start_position: Vec2 {
            x: document.start_x,
            y: document.start_y,
        },
        items,
    }
}

pub(crate) struct WorldScene {
    def_db: DefDatabase,
    prefs: PrefsStore,
    scene_service: SceneService,
    initial_scene: SceneId,
    player_id: Option<SpriteId>,
    camera_rig: CameraRig,
    grid_cache: WalkableGridCache,
    night_watcher: NightWatcher,
    rng: fastrand::Rng,
    last_window_size: (u32, u32),
}

impl WorldScene {
    pub(crate) fn new(
        def_db: DefDatabase,
        prefs: PrefsStore,
        scene_service: SceneService,
        initial_scene: SceneId,
    ) -> Self {
        let camera_rig = CameraRig::new(prefs.current().camera_lerp);
        Self {
            def_db,
            prefs,
            scene_service,
            initial_scene,
            player_id: None,
            camera_rig,
            grid_cache: WalkableGridCache::default(),
            night_watcher: NightWatcher::default(),
            rng: fastrand::Rng::with_seed(0x6c61_6e74_6572_6e01),
            last_window_size: (1280, 720),
        }
    }

    fn player_center(&self, world: &WorldState) -> Option<Vec2> {
        self.player_id
            .and_then(|id| world.find_sprite(id))
            .map(sprite_center)
    }

    /// Starts a scene transition. The fetch resolves asynchronously; until
    /// then the simulation keeps running on the current scene.
    fn request_scene(&mut self, world: &mut WorldState, id: SceneId) {
        if self.scene_service.request(id.clone()) {
            world
                .events_mut()
                .emit(WorldEvent::SceneChangeStarted { id });
        }
    }

    /// The whole swap happens here in one tick: room data, bounds, grid
    /// cache, and camera/player placement change together so no frame ever
    /// observes a half-swapped scene.
    fn apply_scene_document(&mut self, world: &mut WorldState, document: SceneDocument) {
        let data = scene_data_from_document(&document, self.def_db.tile_size());
        let scene_id = data.id.clone();
        let start = data.start_position;
        world.apply_scene(data);
        self.grid_cache.invalidate();

        let doomed: Vec<SpriteId> = world
            .sprites()
            .iter()
            .filter(|sprite| !sprite.is_player)
            .map(|sprite| sprite.id)
            .collect();
        for id in doomed {
            world.mark_removed(id);
        }

        if let Some(player_id) = self.player_id {
            if let Some(player) = world.find_sprite_mut(player_id) {
                player.position = start;
                player.clear_path();
                player.input_flags.clear();
                player.state = MovementState::Idle;
                player.frame = 0;
                player.frame_accumulator = 0.0;
            }
        }

        let center = self.player_center(world).unwrap_or(start);
        let zoom = world.camera().effective_zoom();
        let snapped = follow_target(center, zoom, self.last_window_size, world.world_size_px());
        world.camera_mut().position = snapped;

        world
            .events_mut()
            .emit(WorldEvent::SceneChangeFinished {
                id: scene_id.clone(),
            });
        info!(
            scene = scene_id.as_str(),
            item_count = world.room_items().len(),
            "scene_swapped"
        );
    }
}

impl Scene for WorldScene {
    fn load(&mut self, world: &mut WorldState) {
        world.set_def_database(self.def_db.clone());
        world
            .camera_mut()
            .set_zoom_clamped(self.prefs.current().zoom);

        let tile = self.def_db.tile_size() as f32;
        let player_id = world.spawn_sprite(
            SpriteKind::Humanoid,
            Vec2 { x: 0.0, y: 0.0 },
            Vec2 {
                x: tile,
                y: tile * 1.5,
            },
            PLAYER_SHEET_KEY,
            PLAYER_SPEED_PX_PER_SEC,
        );
        world.apply_pending();
        if let Some(player) = world.find_sprite_mut(player_id) {
            player.is_player = true;
        }
        self.player_id = Some(player_id);

        let initial = self.initial_scene.clone();
        self.request_scene(world, initial);
        info!(
            scene = self.initial_scene.as_str(),
            zoom = self.prefs.current().zoom,
            "gameplay_loaded"
        );
    }

    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut WorldState,
    ) -> SceneCommand {
        self.last_window_size = input.window_size();
        self.run_systems(fixed_dt_seconds, input, world);
        SceneCommand::None
    }

    fn unload(&mut self, world: &mut WorldState) {
        info!(sprite_count = world.sprite_count(), "gameplay_unloaded");
        self.player_id = None;
    }
}
