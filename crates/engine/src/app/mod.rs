mod input;
mod loop_runner;
mod metrics;
mod rendering;
mod world;

pub use input::InputAction;
pub use loop_runner::{run_app, run_app_with_metrics, AppError, LoopConfig, SLOW_FRAME_ENV_VAR};
pub use metrics::{LoopMetricsSnapshot, MetricsHandle};
pub use rendering::{
    build_render_queue, resolve_scene_attachments, screen_to_world_px, visible_tile_rect,
    visible_world_rect, world_to_screen_px, RenderItem, RenderPayload, Renderer, TileRect,
    Viewport, WorldRect,
};
pub use world::{
    AttachmentKey, BlinkPhase, BlinkState, Camera2D, DirFlags, Direction8, GameClock, InputSnapshot,
    Light, LightKey, LightingState, MovementState, Particle, ParticleEffect, RoomItem, Scene,
    SceneCommand, SceneData, SceneId, Sprite, SpriteId, SpriteIdAllocator, SpriteKind, TileCoord,
    Vec2, WorldEvent, WorldEventBus, WorldEventCounts, WorldEventKind, WorldState,
    CAMERA_ZOOM_DEFAULT, CAMERA_ZOOM_MAX, CAMERA_ZOOM_MIN, CAMERA_ZOOM_STEP,
};
