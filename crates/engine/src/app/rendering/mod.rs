mod lighting;
mod renderer;
mod transform;

pub use renderer::{
    build_render_queue, resolve_scene_attachments, RenderItem, RenderPayload, Renderer,
};
pub use transform::{
    screen_to_world_px, visible_tile_rect, visible_world_rect, world_to_screen_px, TileRect,
    Viewport, WorldRect,
};
