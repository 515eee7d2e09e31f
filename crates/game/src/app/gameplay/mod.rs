use lanternvale_engine::{
    screen_to_world_px, visible_tile_rect, visible_world_rect, BlinkPhase, BlinkState,
    DefDatabase, DirFlags, Direction8, InputAction, InputSnapshot, Light, LightKey, LightingState,
    MovementState, Particle, RoomItem, Scene, SceneCommand, SceneData, SceneId, Sprite, SpriteId,
    SpriteKind, TileCoord, TileRect, Vec2, Viewport, WorldEvent, WorldEventBus, WorldState,
};
use tracing::{debug, info, warn};

use super::net::{SceneDocument, SceneService};
use super::prefs::PrefsStore;

const PLAYER_SHEET_KEY: &str = "characters/player";
const PLAYER_SPEED_PX_PER_SEC: f32 = 140.0;

const WALK_FRAME_ADVANCE_PER_TICK: f32 = 0.18;
const STOP_FRAME_ADVANCE_PER_TICK: f32 = 0.3;
const ANIMAL_IDLE_FRAME_ADVANCE_PER_TICK: f32 = 0.04;
const ANIMAL_MOVE_FRAME_ADVANCE_PER_TICK: f32 = 0.16;
const HUMANOID_WALK_BAND: FrameBand = FrameBand { start: 1, end: 6 };
const HUMANOID_STOP_BAND: FrameBand = FrameBand { start: 7, end: 8 };
const ANIMAL_IDLE_BAND: FrameBand = FrameBand { start: 0, end: 2 };
const ANIMAL_MOVE_BAND: FrameBand = FrameBand { start: 3, end: 5 };

const BLINK_CLOSED_FRAME: u16 = 9;
const BLINK_HALF_OPEN_FRAME: u16 = 10;
const BLINK_CLOSED_SECONDS: f32 = 0.09;
const BLINK_HALF_OPEN_SECONDS: f32 = 0.06;
const BLINK_INTERVAL_MIN_SECONDS: f32 = 2.0;
const BLINK_INTERVAL_MAX_SECONDS: f32 = 7.0;

const CAMERA_PAN_SPEED_PX_PER_SEC: f32 = 240.0;
const ENTITY_UPDATE_PADDING_PX: f32 = 96.0;

// One in-game day lasts 20 real minutes.
const GAME_HOURS_PER_REAL_SECOND: f32 = 0.02;
const SUNRISE_START_HOUR: f32 = 5.0;
const SUNRISE_END_HOUR: f32 = 8.0;
const SUNSET_START_HOUR: f32 = 19.0;
const SUNSET_END_HOUR: f32 = 22.0;
const DAY_OVERLAY_COLOR: [u8; 3] = [255, 255, 255];
const NIGHT_OVERLAY_COLOR: [u8; 3] = [52, 70, 138];

const PLAYER_LIGHT_RADIUS_PX: f32 = 96.0;
const PLAYER_LIGHT_COLOR: [u8; 3] = [255, 214, 150];
const PLAYER_LIGHT_INTENSITY: f32 = 0.55;
const PARTICLE_DRIFT_PX_PER_SEC: f32 = 9.0;

include!("types.rs");
include!("util.rs");
include!("grid.rs");
include!("nav.rs");
include!("movement.rs");
include!("camera.rs");
include!("daynight.rs");
include!("scene_state.rs");
include!("systems.rs");

pub(crate) fn build_world_scene(
    def_db: DefDatabase,
    prefs: PrefsStore,
    scene_service: SceneService,
    initial_scene: SceneId,
) -> Box<dyn Scene> {
    Box::new(WorldScene::new(def_db, prefs, scene_service, initial_scene))
}
