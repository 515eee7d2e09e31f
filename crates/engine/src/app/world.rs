use std::collections::HashMap;

use crate::content::{DefDatabase, Flicker};

use super::input::{ActionStates, InputAction};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SceneId(pub String);

impl SceneId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InputSnapshot {
    quit_requested: bool,
    actions: ActionStates,
    cursor_position_px: Option<Vec2>,
    left_click_pressed: bool,
    right_click_pressed: bool,
    zoom_delta_steps: i32,
    window_width: u32,
    window_height: u32,
}

impl InputSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        quit_requested: bool,
        actions: ActionStates,
        cursor_position_px: Option<Vec2>,
        left_click_pressed: bool,
        right_click_pressed: bool,
        zoom_delta_steps: i32,
        window_width: u32,
        window_height: u32,
    ) -> Self {
        Self {
            quit_requested,
            actions,
            cursor_position_px,
            left_click_pressed,
            right_click_pressed,
            zoom_delta_steps,
            window_width,
            window_height,
        }
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested
    }

    pub fn is_down(&self, action: InputAction) -> bool {
        self.actions.is_down(action)
    }

    pub fn with_action_down(mut self, action: InputAction, is_down: bool) -> Self {
        self.actions.set(action, is_down);
        self
    }

    pub fn with_cursor_position_px(mut self, cursor_position_px: Option<Vec2>) -> Self {
        self.cursor_position_px = cursor_position_px;
        self
    }

    pub fn with_left_click_pressed(mut self, left_click_pressed: bool) -> Self {
        self.left_click_pressed = left_click_pressed;
        self
    }

    pub fn with_right_click_pressed(mut self, right_click_pressed: bool) -> Self {
        self.right_click_pressed = right_click_pressed;
        self
    }

    pub fn with_zoom_delta_steps(mut self, zoom_delta_steps: i32) -> Self {
        self.zoom_delta_steps = zoom_delta_steps;
        self
    }

    pub fn with_window_size(mut self, window_size: (u32, u32)) -> Self {
        self.window_width = window_size.0;
        self.window_height = window_size.1;
        self
    }

    pub fn cursor_position_px(&self) -> Option<Vec2> {
        self.cursor_position_px
    }

    pub fn left_click_pressed(&self) -> bool {
        self.left_click_pressed
    }

    pub fn right_click_pressed(&self) -> bool {
        self.right_click_pressed
    }

    pub fn zoom_delta_steps(&self) -> i32 {
        self.zoom_delta_steps
    }

    pub fn window_size(&self) -> (u32, u32) {
        (self.window_width, self.window_height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpriteKind {
    Humanoid,
    Animal,
}

/// Eight-way facing. `sheet_row` is the row of the sprite sheet holding the
/// frames for that facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction8 {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
}

impl Direction8 {
    pub const fn sheet_row(self) -> u32 {
        match self {
            Direction8::South => 0,
            Direction8::SouthWest => 1,
            Direction8::West => 2,
            Direction8::NorthWest => 3,
            Direction8::North => 4,
            Direction8::NorthEast => 5,
            Direction8::East => 6,
            Direction8::SouthEast => 7,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirFlags {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl DirFlags {
    pub fn any(self) -> bool {
        self.up || self.down || self.left || self.right
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MovementState {
    #[default]
    Idle,
    MovingFree,
    MovingOnPath,
    Stopping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkPhase {
    Open,
    Closed,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlinkState {
    pub phase: BlinkPhase,
    pub seconds_until_next: f32,
}

impl Default for BlinkState {
    fn default() -> Self {
        Self {
            phase: BlinkPhase::Open,
            seconds_until_next: 3.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sprite {
    pub id: SpriteId,
    pub kind: SpriteKind,
    pub position: Vec2,
    pub size: Vec2,
    pub direction: Direction8,
    pub input_flags: DirFlags,
    pub state: MovementState,
    pub frame: u16,
    pub frame_accumulator: f32,
    pub speed_px_per_sec: f32,
    pub health: f32,
    pub max_health: f32,
    pub energy: f32,
    pub max_energy: f32,
    pub path: Vec<TileCoord>,
    pub path_cursor: usize,
    pub sheet: String,
    pub is_player: bool,
    pub is_enemy: bool,
    pub blink: BlinkState,
    pub marked_dead: bool,
}

impl Sprite {
    pub fn is_moving_to_target(&self) -> bool {
        self.state == MovementState::MovingOnPath
    }

    pub fn has_active_path(&self) -> bool {
        self.path_cursor < self.path.len()
    }

    pub fn next_waypoint(&self) -> Option<TileCoord> {
        self.path.get(self.path_cursor).copied()
    }

    pub fn clear_path(&mut self) {
        self.path.clear();
        self.path_cursor = 0;
    }

    pub fn assign_path(&mut self, path: Vec<TileCoord>) {
        self.path = path;
        self.path_cursor = 0;
    }

    /// Drops waypoints already consumed so a long walk does not accumulate
    /// its whole history.
    pub fn trim_consumed_waypoints(&mut self) {
        if self.path_cursor == 0 {
            return;
        }
        self.path.drain(..self.path_cursor);
        self.path_cursor = 0;
    }

    pub fn apply_health_delta(&mut self, amount: f32) {
        let next = (self.health + amount).clamp(0.0, self.max_health);
        self.health = next;
        if self.health <= 0.0 {
            self.marked_dead = true;
        }
    }

    pub fn apply_energy_delta(&mut self, amount: f32) {
        self.energy = (self.energy + amount).clamp(0.0, self.max_energy);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomItem {
    pub id: u64,
    pub item_type: u32,
    pub tiles_x: Vec<u32>,
    pub tiles_y: Vec<u32>,
    pub rotation_radians: f32,
    pub sway: bool,
    pub anim_elapsed_seconds: f32,
}

impl RoomItem {
    pub fn min_tile_x(&self) -> u32 {
        self.tiles_x.iter().copied().min().unwrap_or(0)
    }

    pub fn max_tile_x(&self) -> u32 {
        self.tiles_x.iter().copied().max().unwrap_or(0)
    }

    pub fn min_tile_y(&self) -> u32 {
        self.tiles_y.iter().copied().min().unwrap_or(0)
    }

    pub fn max_tile_y(&self) -> u32 {
        self.tiles_y.iter().copied().max().unwrap_or(0)
    }
}

pub const CAMERA_ZOOM_DEFAULT: f32 = 1.0;
pub const CAMERA_ZOOM_MIN: f32 = 0.5;
pub const CAMERA_ZOOM_MAX: f32 = 2.0;
pub const CAMERA_ZOOM_STEP: f32 = 0.1;

/// `position` is the world pixel under the top-left corner of the viewport.
#[derive(Debug, Clone, Copy)]
pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            position: Vec2::default(),
            zoom: CAMERA_ZOOM_DEFAULT,
        }
    }
}

impl Camera2D {
    pub fn effective_zoom(&self) -> f32 {
        clamp_camera_zoom(self.zoom)
    }

    pub fn set_zoom_clamped(&mut self, zoom: f32) {
        self.zoom = clamp_camera_zoom(zoom);
    }

    pub fn apply_zoom_steps(&mut self, steps: i32) {
        if steps == 0 {
            return;
        }
        let target_zoom = self.zoom + steps as f32 * CAMERA_ZOOM_STEP;
        self.set_zoom_clamped(target_zoom);
    }
}

fn clamp_camera_zoom(zoom: f32) -> f32 {
    if !zoom.is_finite() {
        return CAMERA_ZOOM_DEFAULT;
    }
    zoom.clamp(CAMERA_ZOOM_MIN, CAMERA_ZOOM_MAX)
}

#[derive(Debug, Clone, Copy)]
pub struct GameClock {
    pub hour: f32,
    pub elapsed_real_seconds: f64,
}

impl Default for GameClock {
    fn default() -> Self {
        Self {
            hour: 12.0,
            elapsed_real_seconds: 0.0,
        }
    }
}

impl GameClock {
    pub fn advance(&mut self, fixed_dt_seconds: f32, game_hours_per_real_second: f32) {
        self.elapsed_real_seconds += fixed_dt_seconds as f64;
        let mut hour = self.hour + fixed_dt_seconds * game_hours_per_real_second;
        if !hour.is_finite() {
            return;
        }
        hour %= 24.0;
        if hour < 0.0 {
            hour += 24.0;
        }
        self.hour = hour;
    }
}

/// Snapshot of the day/night model consumed by the lighting compositor.
/// `night_factor` is 0 in full day and 1 in full night.
#[derive(Debug, Clone, Copy)]
pub struct LightingState {
    pub night_factor: f32,
    pub overlay_color: [u8; 3],
}

impl Default for LightingState {
    fn default() -> Self {
        Self {
            night_factor: 0.0,
            overlay_color: [255, 255, 255],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AttachmentKey {
    pub item_id: u64,
    pub tile: TileCoord,
    pub index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKey {
    Player,
    Attachment(AttachmentKey),
}

#[derive(Debug, Clone)]
pub struct Light {
    pub position: Vec2,
    pub radius_px: f32,
    pub color: [u8; 3],
    pub max_intensity: f32,
    pub current_intensity: f32,
    pub flicker: Option<Flicker>,
}

#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub age_seconds: f32,
    pub lifetime_seconds: f32,
}

#[derive(Debug, Clone)]
pub struct ParticleEffect {
    pub position: Vec2,
    pub color: [u8; 3],
    pub spawn_per_second: f32,
    pub particle_lifetime_seconds: f32,
    pub spawn_accumulator: f32,
    pub particles: Vec<Particle>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    SpriteRemoved { id: SpriteId },
    SceneChangeStarted { id: SceneId },
    SceneChangeFinished { id: SceneId },
    SceneLoadFailed { id: SceneId, message: String },
    LightAdded { key: LightKey },
    LightRemoved { key: LightKey },
    NightStarted,
    NightEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEventKind {
    SpriteRemoved,
    SceneChangeStarted,
    SceneChangeFinished,
    SceneLoadFailed,
    LightAdded,
    LightRemoved,
    NightStarted,
    NightEnded,
}

impl WorldEvent {
    pub fn kind(&self) -> WorldEventKind {
        match self {
            Self::SpriteRemoved { .. } => WorldEventKind::SpriteRemoved,
            Self::SceneChangeStarted { .. } => WorldEventKind::SceneChangeStarted,
            Self::SceneChangeFinished { .. } => WorldEventKind::SceneChangeFinished,
            Self::SceneLoadFailed { .. } => WorldEventKind::SceneLoadFailed,
            Self::LightAdded { .. } => WorldEventKind::LightAdded,
            Self::LightRemoved { .. } => WorldEventKind::LightRemoved,
            Self::NightStarted => WorldEventKind::NightStarted,
            Self::NightEnded => WorldEventKind::NightEnded,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorldEventCounts {
    pub total: u32,
    pub sprite_removed: u32,
    pub scene_change_started: u32,
    pub scene_change_finished: u32,
    pub scene_load_failed: u32,
    pub light_added: u32,
    pub light_removed: u32,
    pub night_started: u32,
    pub night_ended: u32,
}

impl WorldEventCounts {
    fn record(&mut self, kind: WorldEventKind) {
        self.total = self.total.saturating_add(1);
        match kind {
            WorldEventKind::SpriteRemoved => {
                self.sprite_removed = self.sprite_removed.saturating_add(1)
            }
            WorldEventKind::SceneChangeStarted => {
                self.scene_change_started = self.scene_change_started.saturating_add(1)
            }
            WorldEventKind::SceneChangeFinished => {
                self.scene_change_finished = self.scene_change_finished.saturating_add(1)
            }
            WorldEventKind::SceneLoadFailed => {
                self.scene_load_failed = self.scene_load_failed.saturating_add(1)
            }
            WorldEventKind::LightAdded => self.light_added = self.light_added.saturating_add(1),
            WorldEventKind::LightRemoved => {
                self.light_removed = self.light_removed.saturating_add(1)
            }
            WorldEventKind::NightStarted => {
                self.night_started = self.night_started.saturating_add(1)
            }
            WorldEventKind::NightEnded => self.night_ended = self.night_ended.saturating_add(1),
        }
    }
}

#[derive(Default)]
pub struct WorldEventBus {
    current_tick_events: Vec<WorldEvent>,
    last_tick_counts: WorldEventCounts,
}

impl WorldEventBus {
    pub fn emit(&mut self, event: WorldEvent) {
        self.current_tick_events.push(event);
    }

    pub fn iter_emitted_so_far(&self) -> impl Iterator<Item = &WorldEvent> {
        self.current_tick_events.iter()
    }

    pub fn drain_current_tick(&mut self) -> Vec<WorldEvent> {
        std::mem::take(&mut self.current_tick_events)
    }

    pub fn finish_tick_rollover(&mut self) {
        let mut counts = WorldEventCounts::default();
        for event in &self.current_tick_events {
            counts.record(event.kind());
        }
        self.last_tick_counts = counts;
        self.current_tick_events.clear();
    }

    pub fn last_tick_counts(&self) -> WorldEventCounts {
        self.last_tick_counts
    }
}

/// Everything a scene swap replaces, applied in one step so a half-swapped
/// world is never observable.
#[derive(Debug, Clone)]
pub struct SceneData {
    pub id: SceneId,
    pub world_width_px: f32,
    pub world_height_px: f32,
    pub tile_size: u32,
    pub background_item_type: Option<u32>,
    pub start_position: Vec2,
    pub items: Vec<RoomItem>,
}

#[derive(Debug, Default)]
pub struct SpriteIdAllocator {
    next: u64,
}

impl SpriteIdAllocator {
    pub fn allocate(&mut self) -> SpriteId {
        let id = SpriteId(self.next);
        self.next = self.next.saturating_add(1);
        id
    }
}

pub struct WorldState {
    allocator: SpriteIdAllocator,
    sprites: Vec<Sprite>,
    pending_spawns: Vec<Sprite>,
    pending_removals: Vec<SpriteId>,
    scene_id: Option<SceneId>,
    scene_generation: u64,
    world_width_px: f32,
    world_height_px: f32,
    tile_size: u32,
    background_item_type: Option<u32>,
    room_items: Vec<RoomItem>,
    camera: Camera2D,
    clock: GameClock,
    lighting: LightingState,
    lights: HashMap<LightKey, Light>,
    particles: HashMap<AttachmentKey, ParticleEffect>,
    events: WorldEventBus,
    def_database: Option<DefDatabase>,
}

impl Default for WorldState {
    fn default() -> Self {
        Self {
            allocator: SpriteIdAllocator::default(),
            sprites: Vec::new(),
            pending_spawns: Vec::new(),
            pending_removals: Vec::new(),
            scene_id: None,
            scene_generation: 0,
            world_width_px: 0.0,
            world_height_px: 0.0,
            tile_size: 32,
            background_item_type: None,
            room_items: Vec::new(),
            camera: Camera2D::default(),
            clock: GameClock::default(),
            lighting: LightingState::default(),
            lights: HashMap::new(),
            particles: HashMap::new(),
            events: WorldEventBus::default(),
            def_database: None,
        }
    }
}

impl WorldState {
    pub fn spawn_sprite(
        &mut self,
        kind: SpriteKind,
        position: Vec2,
        size: Vec2,
        sheet: impl Into<String>,
        speed_px_per_sec: f32,
    ) -> SpriteId {
        let id = self.allocator.allocate();
        self.pending_spawns.push(Sprite {
            id,
            kind,
            position,
            size,
            direction: Direction8::South,
            input_flags: DirFlags::default(),
            state: MovementState::Idle,
            frame: 0,
            frame_accumulator: 0.0,
            speed_px_per_sec,
            health: 100.0,
            max_health: 100.0,
            energy: 100.0,
            max_energy: 100.0,
            path: Vec::new(),
            path_cursor: 0,
            sheet: sheet.into(),
            is_player: false,
            is_enemy: false,
            blink: BlinkState::default(),
            marked_dead: false,
        });
        id
    }

    pub fn mark_removed(&mut self, id: SpriteId) -> bool {
        let exists_now = self.sprites.iter().any(|sprite| sprite.id == id);
        let pending_spawn = self.pending_spawns.iter().any(|sprite| sprite.id == id);
        if !exists_now && !pending_spawn {
            return false;
        }
        self.pending_removals.push(id);
        true
    }

    pub fn apply_pending(&mut self) {
        if !self.pending_removals.is_empty() {
            self.pending_removals.sort_by_key(|id| id.0);
            self.pending_removals.dedup();
            let pending = std::mem::take(&mut self.pending_removals);
            self.sprites.retain(|sprite| {
                pending
                    .binary_search_by_key(&sprite.id.0, |id| id.0)
                    .is_err()
            });
            for id in pending {
                self.events.emit(WorldEvent::SpriteRemoved { id });
            }
        }

        if !self.pending_spawns.is_empty() {
            self.sprites.append(&mut self.pending_spawns);
        }
    }

    /// Atomic scene swap: room data, bounds, background, and scene identity
    /// change together. Attachment lights and particles from the previous
    /// scene are dropped; the player light persists.
    pub fn apply_scene(&mut self, data: SceneData) {
        self.scene_id = Some(data.id);
        self.world_width_px = data.world_width_px;
        self.world_height_px = data.world_height_px;
        self.tile_size = data.tile_size.max(1);
        self.background_item_type = data.background_item_type;
        self.room_items = data.items;
        self.scene_generation = self.scene_generation.saturating_add(1);

        let removed: Vec<LightKey> = self
            .lights
            .keys()
            .copied()
            .filter(|key| matches!(key, LightKey::Attachment(_)))
            .collect();
        for key in removed {
            self.lights.remove(&key);
            self.events.emit(WorldEvent::LightRemoved { key });
        }
        self.particles.clear();
    }

    pub fn scene_id(&self) -> Option<&SceneId> {
        self.scene_id.as_ref()
    }

    pub fn scene_generation(&self) -> u64 {
        self.scene_generation
    }

    pub fn world_size_px(&self) -> Vec2 {
        Vec2 {
            x: self.world_width_px,
            y: self.world_height_px,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn world_size_tiles(&self) -> (u32, u32) {
        let tile = self.tile_size.max(1) as f32;
        (
            (self.world_width_px / tile).floor().max(0.0) as u32,
            (self.world_height_px / tile).floor().max(0.0) as u32,
        )
    }

    pub fn background_item_type(&self) -> Option<u32> {
        self.background_item_type
    }

    pub fn tile_origin_px(&self, tile: TileCoord) -> Vec2 {
        let size = self.tile_size as f32;
        Vec2 {
            x: tile.x as f32 * size,
            y: tile.y as f32 * size,
        }
    }

    pub fn sprite_count(&self) -> usize {
        self.sprites.len()
    }

    pub fn sprites(&self) -> &[Sprite] {
        &self.sprites
    }

    pub fn sprites_mut(&mut self) -> &mut [Sprite] {
        &mut self.sprites
    }

    pub fn find_sprite(&self, id: SpriteId) -> Option<&Sprite> {
        self.sprites.iter().find(|sprite| sprite.id == id)
    }

    pub fn find_sprite_mut(&mut self, id: SpriteId) -> Option<&mut Sprite> {
        self.sprites.iter_mut().find(|sprite| sprite.id == id)
    }

    pub fn room_items(&self) -> &[RoomItem] {
        &self.room_items
    }

    pub fn room_items_mut(&mut self) -> &mut [RoomItem] {
        &mut self.room_items
    }

    pub fn camera(&self) -> &Camera2D {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera2D {
        &mut self.camera
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut GameClock {
        &mut self.clock
    }

    pub fn lighting(&self) -> &LightingState {
        &self.lighting
    }

    pub fn set_lighting(&mut self, lighting: LightingState) {
        self.lighting = lighting;
    }

    pub fn lights(&self) -> &HashMap<LightKey, Light> {
        &self.lights
    }

    pub fn lights_mut(&mut self) -> &mut HashMap<LightKey, Light> {
        &mut self.lights
    }

    /// Creates the light if absent (emitting `LightAdded`), otherwise only
    /// refreshes its position. Repeated calls per frame are idempotent.
    pub fn upsert_light(&mut self, key: LightKey, light: Light) {
        match self.lights.get_mut(&key) {
            Some(existing) => existing.position = light.position,
            None => {
                self.lights.insert(key, light);
                self.events.emit(WorldEvent::LightAdded { key });
            }
        }
    }

    pub fn remove_light(&mut self, key: LightKey) -> bool {
        if self.lights.remove(&key).is_some() {
            self.events.emit(WorldEvent::LightRemoved { key });
            true
        } else {
            false
        }
    }

    /// Drops attachment lights whose key is not in `desired`. The player
    /// light is never touched here.
    pub fn retain_attachment_lights(&mut self, desired: &std::collections::HashSet<AttachmentKey>) {
        let stale: Vec<LightKey> = self
            .lights
            .keys()
            .copied()
            .filter(|key| match key {
                LightKey::Attachment(attachment) => !desired.contains(attachment),
                LightKey::Player => false,
            })
            .collect();
        for key in stale {
            self.lights.remove(&key);
            self.events.emit(WorldEvent::LightRemoved { key });
        }
    }

    pub fn particles(&self) -> &HashMap<AttachmentKey, ParticleEffect> {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut HashMap<AttachmentKey, ParticleEffect> {
        &mut self.particles
    }

    pub fn retain_particles(&mut self, desired: &std::collections::HashSet<AttachmentKey>) {
        self.particles.retain(|key, _| desired.contains(key));
    }

    pub fn events(&self) -> &WorldEventBus {
        &self.events
    }

    pub fn events_mut(&mut self) -> &mut WorldEventBus {
        &mut self.events
    }

    pub fn set_def_database(&mut self, def_database: DefDatabase) {
        self.def_database = Some(def_database);
    }

    pub fn def_database(&self) -> Option<&DefDatabase> {
        self.def_database.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneCommand {
    None,
    Quit,
}

pub trait Scene {
    fn load(&mut self, world: &mut WorldState);
    fn update(
        &mut self,
        fixed_dt_seconds: f32,
        input: &InputSnapshot,
        world: &mut WorldState,
    ) -> SceneCommand;
    fn unload(&mut self, world: &mut WorldState);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_default(world: &mut WorldState) -> SpriteId {
        world.spawn_sprite(
            SpriteKind::Humanoid,
            Vec2 { x: 0.0, y: 0.0 },
            Vec2 { x: 32.0, y: 32.0 },
            "characters/villager",
            96.0,
        )
    }

    fn test_scene_data(id: &str) -> SceneData {
        SceneData {
            id: SceneId(id.to_string()),
            world_width_px: 320.0,
            world_height_px: 320.0,
            tile_size: 32,
            background_item_type: Some(1),
            start_position: Vec2 { x: 48.0, y: 48.0 },
            items: Vec::new(),
        }
    }

    fn test_light(position: Vec2) -> Light {
        Light {
            position,
            radius_px: 64.0,
            color: [255, 200, 120],
            max_intensity: 0.8,
            current_intensity: 0.8,
            flicker: None,
        }
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut allocator = SpriteIdAllocator::default();
        assert_eq!(allocator.allocate().0, 0);
        assert_eq!(allocator.allocate().0, 1);
        assert_eq!(allocator.allocate().0, 2);
    }

    #[test]
    fn spawn_and_remove_updates_count_and_emits_event() {
        let mut world = WorldState::default();
        let id = spawn_default(&mut world);
        world.apply_pending();
        assert_eq!(world.sprite_count(), 1);

        world.mark_removed(id);
        world.apply_pending();
        assert_eq!(world.sprite_count(), 0);
        let events: Vec<_> = world.events_mut().drain_current_tick();
        assert!(events.contains(&WorldEvent::SpriteRemoved { id }));
    }

    #[test]
    fn duplicate_pending_removals_are_safe_and_emit_once() {
        let mut world = WorldState::default();
        let doomed = spawn_default(&mut world);
        let survivor = spawn_default(&mut world);
        world.apply_pending();

        assert!(world.mark_removed(doomed));
        assert!(world.mark_removed(doomed));
        world.apply_pending();

        assert_eq!(world.sprite_count(), 1);
        assert!(world.find_sprite(doomed).is_none());
        assert!(world.find_sprite(survivor).is_some());
        let removed_events = world
            .events_mut()
            .drain_current_tick()
            .into_iter()
            .filter(|event| matches!(event, WorldEvent::SpriteRemoved { .. }))
            .count();
        assert_eq!(removed_events, 1);
    }

    #[test]
    fn health_delta_clamps_and_marks_dead_at_zero() {
        let mut world = WorldState::default();
        let id = spawn_default(&mut world);
        world.apply_pending();
        let sprite = world.find_sprite_mut(id).expect("sprite");

        sprite.apply_health_delta(-150.0);
        assert_eq!(sprite.health, 0.0);
        assert!(sprite.marked_dead);

        sprite.apply_health_delta(500.0);
        assert_eq!(sprite.health, sprite.max_health);
    }

    #[test]
    fn energy_delta_clamps_without_removal_side_effect() {
        let mut world = WorldState::default();
        let id = spawn_default(&mut world);
        world.apply_pending();
        let sprite = world.find_sprite_mut(id).expect("sprite");

        sprite.apply_energy_delta(-500.0);
        assert_eq!(sprite.energy, 0.0);
        assert!(!sprite.marked_dead);
    }

    #[test]
    fn trim_consumed_waypoints_keeps_remaining_path() {
        let mut world = WorldState::default();
        let id = spawn_default(&mut world);
        world.apply_pending();
        let sprite = world.find_sprite_mut(id).expect("sprite");
        sprite.assign_path(vec![
            TileCoord { x: 0, y: 0 },
            TileCoord { x: 1, y: 0 },
            TileCoord { x: 2, y: 0 },
        ]);
        sprite.path_cursor = 2;

        sprite.trim_consumed_waypoints();
        assert_eq!(sprite.path, vec![TileCoord { x: 2, y: 0 }]);
        assert_eq!(sprite.path_cursor, 0);
    }

    #[test]
    fn apply_scene_swaps_room_and_bounds_together() {
        let mut world = WorldState::default();
        world.apply_scene(test_scene_data("village"));
        assert_eq!(world.scene_id().map(SceneId::as_str), Some("village"));
        assert_eq!(world.world_size_tiles(), (10, 10));
        let generation = world.scene_generation();

        world.apply_scene(test_scene_data("forest"));
        assert_eq!(world.scene_id().map(SceneId::as_str), Some("forest"));
        assert_eq!(world.scene_generation(), generation + 1);
    }

    #[test]
    fn apply_scene_drops_attachment_lights_but_keeps_player_light() {
        let mut world = WorldState::default();
        let attachment = LightKey::Attachment(AttachmentKey {
            item_id: 7,
            tile: TileCoord { x: 1, y: 2 },
            index: 0,
        });
        world.upsert_light(attachment, test_light(Vec2 { x: 10.0, y: 10.0 }));
        world.upsert_light(LightKey::Player, test_light(Vec2 { x: 0.0, y: 0.0 }));
        world.events_mut().drain_current_tick();

        world.apply_scene(test_scene_data("village"));

        assert!(world.lights().contains_key(&LightKey::Player));
        assert!(!world.lights().contains_key(&attachment));
        let events = world.events_mut().drain_current_tick();
        assert!(events.contains(&WorldEvent::LightRemoved { key: attachment }));
    }

    #[test]
    fn upsert_light_is_idempotent_across_frames() {
        let mut world = WorldState::default();
        let key = LightKey::Attachment(AttachmentKey {
            item_id: 1,
            tile: TileCoord { x: 0, y: 0 },
            index: 0,
        });

        world.upsert_light(key, test_light(Vec2 { x: 5.0, y: 5.0 }));
        world.upsert_light(key, test_light(Vec2 { x: 6.0, y: 5.0 }));

        assert_eq!(world.lights().len(), 1);
        let added = world
            .events_mut()
            .drain_current_tick()
            .into_iter()
            .filter(|event| matches!(event, WorldEvent::LightAdded { .. }))
            .count();
        assert_eq!(added, 1);
        let light = world.lights().get(&key).expect("light");
        assert_eq!(light.position, Vec2 { x: 6.0, y: 5.0 });
    }

    #[test]
    fn retain_attachment_lights_never_touches_player_light() {
        let mut world = WorldState::default();
        let key = AttachmentKey {
            item_id: 3,
            tile: TileCoord { x: 4, y: 4 },
            index: 1,
        };
        world.upsert_light(
            LightKey::Attachment(key),
            test_light(Vec2 { x: 1.0, y: 1.0 }),
        );
        world.upsert_light(LightKey::Player, test_light(Vec2 { x: 0.0, y: 0.0 }));

        world.retain_attachment_lights(&std::collections::HashSet::new());

        assert!(world.lights().contains_key(&LightKey::Player));
        assert!(!world.lights().contains_key(&LightKey::Attachment(key)));
    }

    #[test]
    fn event_counts_roll_over_per_tick() {
        let mut bus = WorldEventBus::default();
        bus.emit(WorldEvent::NightStarted);
        bus.emit(WorldEvent::SpriteRemoved { id: SpriteId(4) });
        bus.finish_tick_rollover();

        let counts = bus.last_tick_counts();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.night_started, 1);
        assert_eq!(counts.sprite_removed, 1);
        assert_eq!(bus.iter_emitted_so_far().count(), 0);
    }

    #[test]
    fn clock_advance_wraps_hour_into_range() {
        let mut clock = GameClock {
            hour: 23.5,
            elapsed_real_seconds: 0.0,
        };
        clock.advance(1.0, 1.0);
        assert!(clock.hour >= 0.0 && clock.hour < 24.0);
        assert!((clock.hour - 0.5).abs() < 0.0001);
    }
}
