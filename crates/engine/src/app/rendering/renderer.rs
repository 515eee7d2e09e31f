use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::warn;
use winit::window::Window;

use crate::app::{
    AttachmentKey, Light, ParticleEffect, RoomItem, SpriteId, TileCoord, Vec2, WorldState,
};
use crate::content::{DefDatabase, TileDef};

use super::lighting::{composite_lighting, LightMask};
use super::transform::{
    visible_tile_rect, visible_world_rect, world_to_screen_px, TileRect, Viewport, WorldRect,
};

const CLEAR_COLOR: [u8; 4] = [18, 20, 26, 255];
const VIEW_CULL_PADDING_PX: f32 = 16.0;
const SWAY_AMPLITUDE_RADIANS: f32 = 0.035;
const SWAY_SPEED_RADIANS_PER_SEC: f32 = 1.6;
const ROTATION_BUCKET_RADIANS: f32 = 0.01;
const PARTICLE_HALF_SIZE_PX: i32 = 1;

struct LoadedSheet {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct RasterKey {
    item_id: u64,
    def_index: usize,
    anim_step: u32,
    rotation_bucket: i32,
}

struct CachedRaster {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct SwayState {
    phase: f32,
    elapsed_seconds: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderPayload {
    Tile {
        item_index: usize,
        def_index: usize,
    },
    Sprite {
        sprite_index: usize,
        sprite_id: SpriteId,
    },
}

/// One deferred draw. Entries are plain data so queue ordering is testable
/// without touching a framebuffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    pub z: f32,
    pub payload: RenderPayload,
}

pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    asset_root: PathBuf,
    sheet_cache: HashMap<String, Option<LoadedSheet>>,
    warned_missing_sheets: HashSet<String>,
    warned_missing_item_types: HashSet<u32>,
    raster_cache: HashMap<RasterKey, CachedRaster>,
    sway_states: HashMap<u64, SwayState>,
    light_mask: LightMask,
    queue: Vec<RenderItem>,
    last_scene_generation: u64,
}

impl Renderer {
    pub fn new(window: Arc<Window>, asset_root: PathBuf) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            asset_root,
            sheet_cache: HashMap::new(),
            warned_missing_sheets: HashSet::new(),
            warned_missing_item_types: HashSet::new(),
            raster_cache: HashMap::new(),
            sway_states: HashMap::new(),
            light_mask: LightMask::new(),
            queue: Vec::new(),
            last_scene_generation: u64::MAX,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    /// One full render pass: viewport compute, attachment resolution,
    /// background, queue build/sort/draw, lighting composite, particles.
    pub fn render_world(
        &mut self,
        world: &mut WorldState,
        frame_dt_seconds: f32,
    ) -> Result<(), Error> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Ok(());
        }

        if world.scene_generation() != self.last_scene_generation {
            self.raster_cache.clear();
            self.sway_states.clear();
            self.last_scene_generation = world.scene_generation();
        }

        let view = visible_world_rect(world.camera(), self.viewport);
        resolve_scene_attachments(world, &view);
        advance_sway_states(&mut self.sway_states, world, &view, frame_dt_seconds);

        let sheet_cache = &mut self.sheet_cache;
        let warned_missing_sheets = &mut self.warned_missing_sheets;
        let warned_missing_item_types = &mut self.warned_missing_item_types;
        let raster_cache = &mut self.raster_cache;
        let sway_states = &self.sway_states;
        let light_mask = &mut self.light_mask;
        let queue = &mut self.queue;
        let asset_root = self.asset_root.as_path();
        let width = self.viewport.width;
        let height = self.viewport.height;
        let frame = self.pixels.frame_mut();

        for chunk in frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&CLEAR_COLOR);
        }

        draw_background(
            frame,
            width,
            height,
            world,
            &view,
            sheet_cache,
            warned_missing_sheets,
            asset_root,
        );

        build_render_queue(world, &view, queue);
        for entry in queue.iter().copied() {
            match entry.payload {
                RenderPayload::Tile {
                    item_index,
                    def_index,
                } => {
                    draw_room_item(
                        frame,
                        width,
                        height,
                        world,
                        item_index,
                        def_index,
                        sway_states,
                        raster_cache,
                        sheet_cache,
                        warned_missing_sheets,
                        warned_missing_item_types,
                        asset_root,
                    );
                }
                RenderPayload::Sprite { sprite_index, .. } => {
                    draw_sprite(
                        frame,
                        width,
                        height,
                        world,
                        sprite_index,
                        sheet_cache,
                        warned_missing_sheets,
                        asset_root,
                    );
                }
            }
        }

        composite_lighting(
            frame,
            light_mask,
            width,
            height,
            world.camera(),
            world.lighting(),
            world.lights().values(),
        );

        draw_particles(frame, width, height, world);

        self.pixels.render()
    }
}

/// Ensures a light/particle instance exists for every lit item attachment
/// inside the radius-expanded viewport while the night gate is open, and
/// removes the rest. Keys are derived from item id, tile, and attachment
/// index, so repeated frames neither duplicate nor lose attachments.
pub fn resolve_scene_attachments(world: &mut WorldState, view: &WorldRect) {
    let night_factor = world.lighting().night_factor;
    let night = night_factor > f32::EPSILON;

    let mut desired_lights: Vec<(AttachmentKey, Light)> = Vec::new();
    let mut desired_particles: Vec<(AttachmentKey, Vec2, [u8; 3], f32, f32)> = Vec::new();
    {
        let Some(defs) = world.def_database() else {
            return;
        };
        for item in world.room_items() {
            let origin_tile = TileCoord {
                x: item.min_tile_x(),
                y: item.min_tile_y(),
            };
            let origin = world.tile_origin_px(origin_tile);
            let mut attachment_index = 0u8;
            for def in defs.defs_for(item.item_type) {
                for light in &def.lights {
                    let position = Vec2 {
                        x: origin.x + light.offset[0],
                        y: origin.y + light.offset[1],
                    };
                    let key = AttachmentKey {
                        item_id: item.id,
                        tile: origin_tile,
                        index: attachment_index,
                    };
                    attachment_index = attachment_index.saturating_add(1);
                    if night && view.expanded(light.radius).contains_point(position) {
                        desired_lights.push((
                            key,
                            Light {
                                position,
                                radius_px: light.radius,
                                color: light.color,
                                max_intensity: light.intensity,
                                current_intensity: light.intensity * night_factor,
                                flicker: light.flicker,
                            },
                        ));
                    }
                }
                for particle in &def.particles {
                    let position = Vec2 {
                        x: origin.x + particle.offset[0],
                        y: origin.y + particle.offset[1],
                    };
                    let key = AttachmentKey {
                        item_id: item.id,
                        tile: origin_tile,
                        index: attachment_index,
                    };
                    attachment_index = attachment_index.saturating_add(1);
                    if night && view.expanded(VIEW_CULL_PADDING_PX).contains_point(position) {
                        desired_particles.push((
                            key,
                            position,
                            particle.color,
                            particle.rate,
                            particle.lifetime,
                        ));
                    }
                }
            }
        }
    }

    let mut light_keys = HashSet::with_capacity(desired_lights.len());
    for (key, light) in desired_lights {
        light_keys.insert(key);
        world.upsert_light(crate::app::LightKey::Attachment(key), light);
    }
    world.retain_attachment_lights(&light_keys);

    let mut particle_keys = HashSet::with_capacity(desired_particles.len());
    for (key, position, color, rate, lifetime) in desired_particles {
        particle_keys.insert(key);
        match world.particles_mut().get_mut(&key) {
            Some(effect) => effect.position = position,
            None => {
                world.particles_mut().insert(
                    key,
                    ParticleEffect {
                        position,
                        color,
                        spawn_per_second: rate,
                        particle_lifetime_seconds: lifetime,
                        spawn_accumulator: 0.0,
                        particles: Vec::new(),
                    },
                );
            }
        }
    }
    world.retain_particles(&particle_keys);
}

/// Collects visible room items and sprites into one z-keyed list. Sprites
/// sort by their bottom edge so lower-on-screen entities draw in front;
/// items take the z of their lowest tile unless their definition pins them
/// to the back with z = 0.
pub fn build_render_queue(world: &WorldState, view: &WorldRect, out: &mut Vec<RenderItem>) {
    out.clear();
    let tile_size = world.tile_size() as f32;
    let padded = view.expanded(VIEW_CULL_PADDING_PX);

    if let Some(defs) = world.def_database() {
        let Some(visible) = visible_tile_rect(view, world.tile_size(), world.world_size_tiles())
        else {
            queue_sprites(world, &padded, out);
            sort_queue(out);
            return;
        };
        for (item_index, item) in world.room_items().iter().enumerate() {
            let item_rect = TileRect {
                x_min: item.min_tile_x(),
                x_max: item.max_tile_x(),
                y_min: item.min_tile_y(),
                y_max: item.max_tile_y(),
            };
            if !item_rect.intersects(&visible) {
                continue;
            }
            for (def_index, def) in defs.defs_for(item.item_type).iter().enumerate() {
                out.push(RenderItem {
                    z: room_item_z(item, def, tile_size),
                    payload: RenderPayload::Tile {
                        item_index,
                        def_index,
                    },
                });
            }
        }
    }

    queue_sprites(world, &padded, out);
    sort_queue(out);
}

fn queue_sprites(world: &WorldState, padded: &WorldRect, out: &mut Vec<RenderItem>) {
    for (sprite_index, sprite) in world.sprites().iter().enumerate() {
        let intersects = sprite.position.x + sprite.size.x >= padded.min.x
            && sprite.position.x <= padded.max.x
            && sprite.position.y + sprite.size.y >= padded.min.y
            && sprite.position.y <= padded.max.y;
        if !intersects {
            continue;
        }
        out.push(RenderItem {
            z: sprite.position.y + sprite.size.y,
            payload: RenderPayload::Sprite {
                sprite_index,
                sprite_id: sprite.id,
            },
        });
    }
}

fn sort_queue(out: &mut [RenderItem]) {
    out.sort_by(|left, right| left.z.total_cmp(&right.z));
}

fn room_item_z(item: &RoomItem, def: &TileDef, tile_size: f32) -> f32 {
    if def.z_for_slot(0) == 0.0 {
        return 0.0;
    }
    (item.max_tile_y() + 1) as f32 * tile_size
}

fn advance_sway_states(
    sway_states: &mut HashMap<u64, SwayState>,
    world: &WorldState,
    view: &WorldRect,
    frame_dt_seconds: f32,
) {
    let Some(defs) = world.def_database() else {
        return;
    };
    let Some(visible) = visible_tile_rect(view, world.tile_size(), world.world_size_tiles()) else {
        return;
    };
    for item in world.room_items() {
        let sways = item.sway
            || defs
                .defs_for(item.item_type)
                .iter()
                .any(|def| def.sway);
        if !sways {
            continue;
        }
        let item_rect = TileRect {
            x_min: item.min_tile_x(),
            x_max: item.max_tile_x(),
            y_min: item.min_tile_y(),
            y_max: item.max_tile_y(),
        };
        if !item_rect.intersects(&visible) {
            continue;
        }
        // Phase is assigned on first sight and time only advances while the
        // item stays in view, so the oscillation never jumps.
        let state = sway_states.entry(item.id).or_insert_with(|| SwayState {
            phase: fastrand::f32() * std::f32::consts::TAU,
            elapsed_seconds: 0.0,
        });
        state.elapsed_seconds += frame_dt_seconds;
    }
}

fn item_rotation(item: &RoomItem, def: &TileDef, sway_states: &HashMap<u64, SwayState>) -> f32 {
    let mut rotation = item.rotation_radians;
    if item.sway || def.sway {
        if let Some(state) = sway_states.get(&item.id) {
            rotation += SWAY_AMPLITUDE_RADIANS
                * (state.elapsed_seconds * SWAY_SPEED_RADIANS_PER_SEC + state.phase).sin();
        }
    }
    rotation
}

fn rotation_bucket(rotation: f32) -> i32 {
    (rotation / ROTATION_BUCKET_RADIANS).round() as i32
}

fn current_anim_step(item: &RoomItem, def: &TileDef) -> u32 {
    match def.frame_duration {
        Some(duration) if duration > 0.0 => (item.anim_elapsed_seconds / duration) as u32,
        _ => 0,
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_background(
    frame: &mut [u8],
    width: u32,
    height: u32,
    world: &WorldState,
    view: &WorldRect,
    sheet_cache: &mut HashMap<String, Option<LoadedSheet>>,
    warned_missing_sheets: &mut HashSet<String>,
    asset_root: &Path,
) {
    let Some(defs) = world.def_database() else {
        return;
    };
    let Some(background_type) = world.background_item_type() else {
        return;
    };
    let Some(def) = defs.defs_for(background_type).first() else {
        return;
    };
    let Some(visible) = visible_tile_rect(view, world.tile_size(), world.world_size_tiles()) else {
        return;
    };
    let Some(columns) = defs.sheet_columns(&def.sheet) else {
        return;
    };
    let frame_index = def.sequence_for_slot(0).first().copied().unwrap_or(0);
    let tile_size = world.tile_size();

    for tile_y in visible.y_min..=visible.y_max {
        for tile_x in visible.x_min..=visible.x_max {
            let origin = world.tile_origin_px(TileCoord {
                x: tile_x,
                y: tile_y,
            });
            let (sx, sy) = world_to_screen_px(world.camera(), origin);
            blit_sheet_cell(
                frame,
                width,
                height,
                &def.sheet,
                frame_index,
                columns,
                tile_size,
                sx,
                sy,
                world.camera().effective_zoom(),
                sheet_cache,
                warned_missing_sheets,
                asset_root,
            );
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_room_item(
    frame: &mut [u8],
    width: u32,
    height: u32,
    world: &WorldState,
    item_index: usize,
    def_index: usize,
    sway_states: &HashMap<u64, SwayState>,
    raster_cache: &mut HashMap<RasterKey, CachedRaster>,
    sheet_cache: &mut HashMap<String, Option<LoadedSheet>>,
    warned_missing_sheets: &mut HashSet<String>,
    warned_missing_item_types: &mut HashSet<u32>,
    asset_root: &Path,
) {
    let Some(defs) = world.def_database() else {
        return;
    };
    let Some(item) = world.room_items().get(item_index) else {
        return;
    };
    let item_defs = defs.defs_for(item.item_type);
    if item_defs.is_empty() {
        if warned_missing_item_types.insert(item.item_type) {
            warn!(item_type = item.item_type, "item_type_missing_definition");
        }
        return;
    }
    let Some(def) = item_defs.get(def_index) else {
        return;
    };

    let rotation = item_rotation(item, def, sway_states);
    let key = RasterKey {
        item_id: item.id,
        def_index,
        anim_step: current_anim_step(item, def),
        rotation_bucket: rotation_bucket(rotation),
    };
    if !raster_cache.contains_key(&key) {
        let Some(raster) = compose_item_raster(
            item,
            def,
            defs,
            world.tile_size(),
            rotation,
            sheet_cache,
            warned_missing_sheets,
            asset_root,
        ) else {
            return;
        };
        raster_cache.insert(key, raster);
    }
    let Some(raster) = raster_cache.get(&key) else {
        return;
    };

    let origin = world.tile_origin_px(TileCoord {
        x: item.min_tile_x(),
        y: item.min_tile_y(),
    });
    let (sx, sy) = world_to_screen_px(world.camera(), origin);
    blit_rgba_scaled(
        frame,
        width,
        height,
        &raster.rgba,
        raster.width,
        raster.height,
        (0, 0, raster.width, raster.height),
        sx,
        sy,
        world.camera().effective_zoom(),
    );
}

#[allow(clippy::too_many_arguments)]
fn compose_item_raster(
    item: &RoomItem,
    def: &TileDef,
    defs: &DefDatabase,
    tile_size: u32,
    rotation: f32,
    sheet_cache: &mut HashMap<String, Option<LoadedSheet>>,
    warned_missing_sheets: &mut HashSet<String>,
    asset_root: &Path,
) -> Option<CachedRaster> {
    let columns = defs.sheet_columns(&def.sheet)?;
    let sheet = load_sheet(sheet_cache, warned_missing_sheets, asset_root, &def.sheet)?;

    let min_x = item.min_tile_x();
    let min_y = item.min_tile_y();
    let width = (item.max_tile_x() - min_x + 1) * tile_size;
    let height = (item.max_tile_y() - min_y + 1) * tile_size;
    let mut rgba = vec![0u8; width as usize * height as usize * 4];

    let step = current_anim_step(item, def);
    for (row, tile_y) in item.tiles_y.iter().copied().enumerate() {
        for (col, tile_x) in item.tiles_x.iter().copied().enumerate() {
            let slot = row * item.tiles_x.len() + col;
            let sequence = def.sequence_for_slot(slot);
            if sequence.is_empty() {
                continue;
            }
            let frame_index = sequence[step as usize % sequence.len()];
            let src_col = u32::from(frame_index) % columns;
            let src_row = u32::from(frame_index) / columns;
            copy_cell_into_raster(
                &mut rgba,
                width,
                sheet,
                src_col * tile_size,
                src_row * tile_size,
                tile_size,
                (tile_x - min_x) * tile_size,
                (tile_y - min_y) * tile_size,
            );
        }
    }

    if rotation.abs() > f32::EPSILON {
        rgba = rotate_rgba(&rgba, width, height, rotation);
    }
    Some(CachedRaster {
        width,
        height,
        rgba,
    })
}

fn copy_cell_into_raster(
    raster: &mut [u8],
    raster_width: u32,
    sheet: &LoadedSheet,
    src_x: u32,
    src_y: u32,
    cell: u32,
    dest_x: u32,
    dest_y: u32,
) {
    for row in 0..cell {
        let sy = src_y + row;
        if sy >= sheet.height {
            break;
        }
        for col in 0..cell {
            let sx = src_x + col;
            if sx >= sheet.width {
                break;
            }
            let src_index = ((sy * sheet.width + sx) * 4) as usize;
            let dest_index = (((dest_y + row) * raster_width + dest_x + col) * 4) as usize;
            raster[dest_index..dest_index + 4]
                .copy_from_slice(&sheet.rgba[src_index..src_index + 4]);
        }
    }
}

/// Nearest-neighbor rotation about the raster center; corners that leave
/// the bounding box clip away.
fn rotate_rgba(rgba: &[u8], width: u32, height: u32, rotation: f32) -> Vec<u8> {
    let mut out = vec![0u8; rgba.len()];
    let cx = width as f32 * 0.5;
    let cy = height as f32 * 0.5;
    let (sin, cos) = (-rotation).sin_cos();

    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let sx = cx + dx * cos - dy * sin;
            let sy = cy + dx * sin + dy * cos;
            if sx < 0.0 || sy < 0.0 {
                continue;
            }
            let (sx, sy) = (sx as u32, sy as u32);
            if sx >= width || sy >= height {
                continue;
            }
            let src_index = ((sy * width + sx) * 4) as usize;
            let dest_index = ((y * width + x) * 4) as usize;
            out[dest_index..dest_index + 4].copy_from_slice(&rgba[src_index..src_index + 4]);
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
fn draw_sprite(
    frame: &mut [u8],
    width: u32,
    height: u32,
    world: &WorldState,
    sprite_index: usize,
    sheet_cache: &mut HashMap<String, Option<LoadedSheet>>,
    warned_missing_sheets: &mut HashSet<String>,
    asset_root: &Path,
) {
    let Some(sprite) = world.sprites().get(sprite_index) else {
        return;
    };
    let cell_w = sprite.size.x.round().max(1.0) as u32;
    let cell_h = sprite.size.y.round().max(1.0) as u32;
    let Some(sheet) = load_sheet(sheet_cache, warned_missing_sheets, asset_root, &sprite.sheet)
    else {
        return;
    };

    let columns = (sheet.width / cell_w).max(1);
    let rows = (sheet.height / cell_h).max(1);
    let col = u32::from(sprite.frame) % columns;
    let row = sprite.direction.sheet_row() % rows;

    let (sx, sy) = world_to_screen_px(world.camera(), sprite.position);
    blit_rgba_scaled(
        frame,
        width,
        height,
        &sheet.rgba,
        sheet.width,
        sheet.height,
        (col * cell_w, row * cell_h, cell_w, cell_h),
        sx,
        sy,
        world.camera().effective_zoom(),
    );
}

#[allow(clippy::too_many_arguments)]
fn blit_sheet_cell(
    frame: &mut [u8],
    width: u32,
    height: u32,
    sheet_key: &str,
    frame_index: u16,
    columns: u32,
    cell: u32,
    dest_x: i32,
    dest_y: i32,
    scale: f32,
    sheet_cache: &mut HashMap<String, Option<LoadedSheet>>,
    warned_missing_sheets: &mut HashSet<String>,
    asset_root: &Path,
) {
    let Some(sheet) = load_sheet(sheet_cache, warned_missing_sheets, asset_root, sheet_key) else {
        return;
    };
    let src_col = u32::from(frame_index) % columns;
    let src_row = u32::from(frame_index) / columns;
    blit_rgba_scaled(
        frame,
        width,
        height,
        &sheet.rgba,
        sheet.width,
        sheet.height,
        (src_col * cell, src_row * cell, cell, cell),
        dest_x,
        dest_y,
        scale,
    );
}

fn draw_particles(frame: &mut [u8], width: u32, height: u32, world: &WorldState) {
    for effect in world.particles().values() {
        for particle in &effect.particles {
            let (cx, cy) = world_to_screen_px(world.camera(), particle.position);
            let fade =
                (1.0 - particle.age_seconds / particle.lifetime_seconds.max(0.001)).clamp(0.0, 1.0);
            for dy in -PARTICLE_HALF_SIZE_PX..=PARTICLE_HALF_SIZE_PX {
                for dx in -PARTICLE_HALF_SIZE_PX..=PARTICLE_HALF_SIZE_PX {
                    blend_add_px(frame, width, height, cx + dx, cy + dy, effect.color, fade);
                }
            }
        }
    }
}

fn blend_add_px(
    frame: &mut [u8],
    width: u32,
    height: u32,
    x: i32,
    y: i32,
    color: [u8; 3],
    strength: f32,
) {
    if x < 0 || y < 0 || x >= width as i32 || y >= height as i32 {
        return;
    }
    let index = ((y as u32 * width + x as u32) * 4) as usize;
    for channel in 0..3 {
        let added = frame[index + channel] as f32 + color[channel] as f32 * strength;
        frame[index + channel] = added.min(255.0) as u8;
    }
}

#[allow(clippy::too_many_arguments)]
fn blit_rgba_scaled(
    frame: &mut [u8],
    frame_width: u32,
    frame_height: u32,
    src: &[u8],
    src_width: u32,
    src_height: u32,
    src_rect: (u32, u32, u32, u32),
    dest_x: i32,
    dest_y: i32,
    scale: f32,
) {
    let (rect_x, rect_y, rect_w, rect_h) = src_rect;
    if rect_w == 0 || rect_h == 0 || scale <= 0.0 {
        return;
    }
    let out_w = (rect_w as f32 * scale).round().max(1.0) as i32;
    let out_h = (rect_h as f32 * scale).round().max(1.0) as i32;

    for oy in 0..out_h {
        let fy = dest_y + oy;
        if fy < 0 {
            continue;
        }
        if fy >= frame_height as i32 {
            break;
        }
        let sy = rect_y + ((oy as f32 / scale) as u32).min(rect_h - 1);
        if sy >= src_height {
            continue;
        }
        for ox in 0..out_w {
            let fx = dest_x + ox;
            if fx < 0 {
                continue;
            }
            if fx >= frame_width as i32 {
                break;
            }
            let sx = rect_x + ((ox as f32 / scale) as u32).min(rect_w - 1);
            if sx >= src_width {
                continue;
            }

            let src_index = ((sy * src_width + sx) * 4) as usize;
            let alpha = src[src_index + 3] as u16;
            if alpha == 0 {
                continue;
            }
            let dest_index = ((fy as u32 * frame_width + fx as u32) * 4) as usize;
            if alpha == 255 {
                frame[dest_index..dest_index + 4].copy_from_slice(&src[src_index..src_index + 4]);
                continue;
            }
            for channel in 0..3 {
                let src_value = src[src_index + channel] as u16;
                let dst_value = frame[dest_index + channel] as u16;
                frame[dest_index + channel] =
                    ((src_value * alpha + dst_value * (255 - alpha)) / 255) as u8;
            }
            frame[dest_index + 3] = 255;
        }
    }
}

fn load_sheet<'a>(
    sheet_cache: &'a mut HashMap<String, Option<LoadedSheet>>,
    warned_missing_sheets: &mut HashSet<String>,
    asset_root: &Path,
    sheet_key: &str,
) -> Option<&'a LoadedSheet> {
    if !sheet_cache.contains_key(sheet_key) {
        let loaded = read_sheet_png(asset_root, sheet_key);
        if loaded.is_none() && warned_missing_sheets.insert(sheet_key.to_string()) {
            warn!(sheet = sheet_key, "sheet_missing");
        }
        sheet_cache.insert(sheet_key.to_string(), loaded);
    }
    sheet_cache.get(sheet_key).and_then(Option::as_ref)
}

fn read_sheet_png(asset_root: &Path, sheet_key: &str) -> Option<LoadedSheet> {
    let path = asset_root.join("sheets").join(format!("{sheet_key}.png"));
    let reader = ImageReader::open(&path).ok()?;
    let decoded = reader.decode().ok()?;
    let rgba = decoded.into_rgba8();
    let (width, height) = rgba.dimensions();
    Some(LoadedSheet {
        width,
        height,
        rgba: rgba.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::{SceneData, SceneId, SpriteKind};
    use crate::content::load_def_database_from_str;

    const TEST_DEFS: &str = r#"{
        "tile_size": 32,
        "sheets": {
            "terrain": { "width": 256, "height": 256 },
            "props": { "width": 256, "height": 256 }
        },
        "items": [
            { "id": 1, "tiles": [ { "sheet": "terrain", "frames": 0, "z": 0.0 } ] },
            { "id": 2, "tiles": [ { "sheet": "props", "frames": 3 } ] },
            { "id": 3, "tiles": [
                { "sheet": "props", "frames": [["4-6"]], "frame_duration": 0.2,
                  "lights": [ { "offset": [16.0, 16.0], "color": [255, 200, 120],
                                "radius": 64.0, "intensity": 0.8 } ] }
            ] }
        ]
    }"#;

    fn world_with_defs() -> WorldState {
        let mut world = WorldState::default();
        world.set_def_database(load_def_database_from_str(TEST_DEFS).expect("defs"));
        world.apply_scene(SceneData {
            id: SceneId("test".to_string()),
            world_width_px: 640.0,
            world_height_px: 640.0,
            tile_size: 32,
            background_item_type: Some(1),
            start_position: Vec2 { x: 64.0, y: 64.0 },
            items: Vec::new(),
        });
        world
    }

    fn place_item(world: &mut WorldState, id: u64, item_type: u32, tile_x: u32, tile_y: u32) {
        let mut items = world.room_items().to_vec();
        items.push(RoomItem {
            id,
            item_type,
            tiles_x: vec![tile_x],
            tiles_y: vec![tile_y],
            rotation_radians: 0.0,
            sway: false,
            anim_elapsed_seconds: 0.0,
        });
        let scene_id = world.scene_id().cloned().expect("scene");
        // Rebuild the scene with the extra item; tests only care about the
        // resulting queue, not swap event noise.
        world.apply_scene(SceneData {
            id: scene_id,
            world_width_px: 640.0,
            world_height_px: 640.0,
            tile_size: 32,
            background_item_type: Some(1),
            start_position: Vec2 { x: 64.0, y: 64.0 },
            items,
        });
    }

    fn full_view() -> WorldRect {
        WorldRect {
            min: Vec2 { x: 0.0, y: 0.0 },
            max: Vec2 { x: 640.0, y: 640.0 },
        }
    }

    fn queue_for(world: &WorldState) -> Vec<RenderItem> {
        let mut queue = Vec::new();
        build_render_queue(world, &full_view(), &mut queue);
        queue
    }

    #[test]
    fn lower_z_draws_strictly_before_higher_z() {
        let mut world = world_with_defs();
        place_item(&mut world, 10, 2, 2, 1); // bottom edge y = 64
        place_item(&mut world, 11, 2, 2, 4); // bottom edge y = 160

        let queue = queue_for(&world);
        let tile_entries: Vec<&RenderItem> = queue
            .iter()
            .filter(|entry| matches!(entry.payload, RenderPayload::Tile { .. }))
            .collect();
        assert_eq!(tile_entries.len(), 2);
        assert!(tile_entries[0].z < tile_entries[1].z);
        assert!((tile_entries[0].z - 64.0).abs() < 0.001);
        assert!((tile_entries[1].z - 160.0).abs() < 0.001);
    }

    #[test]
    fn z_zero_definition_is_forced_to_the_back() {
        let mut world = world_with_defs();
        place_item(&mut world, 20, 1, 5, 5); // z = 0 def
        place_item(&mut world, 21, 2, 0, 0); // derived z = 32

        let queue = queue_for(&world);
        let first_tile = queue
            .iter()
            .find(|entry| matches!(entry.payload, RenderPayload::Tile { .. }))
            .expect("tile entry");
        assert_eq!(first_tile.z, 0.0);
    }

    #[test]
    fn sprite_z_is_bottom_edge_so_lower_sprites_draw_in_front() {
        let mut world = world_with_defs();
        let upper = world.spawn_sprite(
            SpriteKind::Humanoid,
            Vec2 { x: 100.0, y: 50.0 },
            Vec2 { x: 32.0, y: 32.0 },
            "characters/a",
            96.0,
        );
        let lower = world.spawn_sprite(
            SpriteKind::Humanoid,
            Vec2 { x: 100.0, y: 200.0 },
            Vec2 { x: 32.0, y: 32.0 },
            "characters/b",
            96.0,
        );
        world.apply_pending();

        let queue = queue_for(&world);
        let sprite_order: Vec<SpriteId> = queue
            .iter()
            .filter_map(|entry| match entry.payload {
                RenderPayload::Sprite { sprite_id, .. } => Some(sprite_id),
                _ => None,
            })
            .collect();
        assert_eq!(sprite_order, vec![upper, lower]);
    }

    #[test]
    fn sprite_between_two_items_interleaves_by_z() {
        let mut world = world_with_defs();
        place_item(&mut world, 30, 2, 1, 0); // bottom edge 32
        place_item(&mut world, 31, 2, 1, 6); // bottom edge 224
        world.spawn_sprite(
            SpriteKind::Humanoid,
            Vec2 { x: 40.0, y: 68.0 }, // bottom edge 100
            Vec2 { x: 32.0, y: 32.0 },
            "characters/mid",
            96.0,
        );
        world.apply_pending();

        let queue = queue_for(&world);
        let kinds: Vec<&'static str> = queue
            .iter()
            .map(|entry| match entry.payload {
                RenderPayload::Tile { .. } => "tile",
                RenderPayload::Sprite { .. } => "sprite",
            })
            .collect();
        assert_eq!(kinds, vec!["tile", "sprite", "tile"]);
    }

    #[test]
    fn out_of_view_items_and_sprites_are_culled() {
        let mut world = world_with_defs();
        place_item(&mut world, 40, 2, 19, 19); // tile (19,19) = px 608, inside world but...
        world.spawn_sprite(
            SpriteKind::Humanoid,
            Vec2 {
                x: 5000.0,
                y: 5000.0,
            },
            Vec2 { x: 32.0, y: 32.0 },
            "characters/far",
            96.0,
        );
        world.apply_pending();

        let small_view = WorldRect {
            min: Vec2 { x: 0.0, y: 0.0 },
            max: Vec2 { x: 128.0, y: 128.0 },
        };
        let mut queue = Vec::new();
        build_render_queue(&world, &small_view, &mut queue);
        assert!(queue.is_empty());
    }

    #[test]
    fn attachment_resolution_is_idempotent_across_frames() {
        let mut world = world_with_defs();
        place_item(&mut world, 50, 3, 2, 2);
        world.set_lighting(crate::app::LightingState {
            night_factor: 1.0,
            overlay_color: [40, 60, 120],
        });

        resolve_scene_attachments(&mut world, &full_view());
        resolve_scene_attachments(&mut world, &full_view());

        assert_eq!(world.lights().len(), 1);
        let added = world
            .events_mut()
            .drain_current_tick()
            .into_iter()
            .filter(|event| matches!(event, crate::app::WorldEvent::LightAdded { .. }))
            .count();
        assert_eq!(added, 1);
    }

    #[test]
    fn attachment_light_is_removed_when_view_moves_away() {
        let mut world = world_with_defs();
        place_item(&mut world, 51, 3, 2, 2);
        world.set_lighting(crate::app::LightingState {
            night_factor: 1.0,
            overlay_color: [40, 60, 120],
        });

        resolve_scene_attachments(&mut world, &full_view());
        assert_eq!(world.lights().len(), 1);

        let far_view = WorldRect {
            min: Vec2 {
                x: 10_000.0,
                y: 10_000.0,
            },
            max: Vec2 {
                x: 10_640.0,
                y: 10_640.0,
            },
        };
        resolve_scene_attachments(&mut world, &far_view);
        assert!(world.lights().is_empty());
    }

    #[test]
    fn attachment_light_is_removed_during_day() {
        let mut world = world_with_defs();
        place_item(&mut world, 52, 3, 2, 2);
        world.set_lighting(crate::app::LightingState {
            night_factor: 1.0,
            overlay_color: [40, 60, 120],
        });
        resolve_scene_attachments(&mut world, &full_view());
        assert_eq!(world.lights().len(), 1);

        world.set_lighting(crate::app::LightingState {
            night_factor: 0.0,
            overlay_color: [255, 255, 255],
        });
        resolve_scene_attachments(&mut world, &full_view());
        assert!(world.lights().is_empty());
    }

    #[test]
    fn rotate_rgba_by_zero_is_identity() {
        let mut rgba = vec![0u8; 4 * 4 * 4];
        rgba[0..4].copy_from_slice(&[1, 2, 3, 255]);
        let rotated = rotate_rgba(&rgba, 4, 4, 0.0);
        assert_eq!(rotated, rgba);
    }

    #[test]
    fn rotation_bucket_quantizes_nearby_angles_together() {
        assert_eq!(rotation_bucket(0.0501), rotation_bucket(0.0502));
        assert_ne!(rotation_bucket(0.0), rotation_bucket(0.1));
    }

    #[test]
    fn anim_step_advances_with_elapsed_time() {
        let db = load_def_database_from_str(TEST_DEFS).expect("defs");
        let def = &db.defs_for(3)[0];
        let mut item = RoomItem {
            id: 1,
            item_type: 3,
            tiles_x: vec![0],
            tiles_y: vec![0],
            rotation_radians: 0.0,
            sway: false,
            anim_elapsed_seconds: 0.0,
        };
        assert_eq!(current_anim_step(&item, def), 0);
        item.anim_elapsed_seconds = 0.5;
        assert_eq!(current_anim_step(&item, def), 2);
    }

    #[test]
    fn blend_add_clamps_at_pixel_max() {
        let mut frame = vec![250u8; 4 * 4];
        blend_add_px(&mut frame, 2, 2, 0, 0, [255, 255, 255], 1.0);
        assert_eq!(frame[0], 255);
    }
}
