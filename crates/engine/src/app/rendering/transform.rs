use crate::app::{Camera2D, Vec2};

#[derive(Debug, Clone, Copy)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Inclusive tile-coordinate rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    pub fn intersects(&self, other: &TileRect) -> bool {
        self.x_min <= other.x_max
            && self.x_max >= other.x_min
            && self.y_min <= other.y_max
            && self.y_max >= other.y_min
    }
}

/// World pixel rectangle, max-exclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldRect {
    pub min: Vec2,
    pub max: Vec2,
}

impl WorldRect {
    pub fn expanded(&self, margin: f32) -> WorldRect {
        WorldRect {
            min: Vec2 {
                x: self.min.x - margin,
                y: self.min.y - margin,
            },
            max: Vec2 {
                x: self.max.x + margin,
                y: self.max.y + margin,
            },
        }
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }
}

/// The camera position is the world pixel under the viewport's top-left
/// corner; zoom scales world pixels onto screen pixels.
pub fn world_to_screen_px(camera: &Camera2D, world: Vec2) -> (i32, i32) {
    let zoom = camera.effective_zoom();
    (
        ((world.x - camera.position.x) * zoom).round() as i32,
        ((world.y - camera.position.y) * zoom).round() as i32,
    )
}

pub fn screen_to_world_px(camera: &Camera2D, screen: Vec2) -> Vec2 {
    let zoom = camera.effective_zoom();
    Vec2 {
        x: camera.position.x + screen.x / zoom,
        y: camera.position.y + screen.y / zoom,
    }
}

pub fn visible_world_rect(camera: &Camera2D, viewport: Viewport) -> WorldRect {
    let zoom = camera.effective_zoom();
    WorldRect {
        min: camera.position,
        max: Vec2 {
            x: camera.position.x + viewport.width as f32 / zoom,
            y: camera.position.y + viewport.height as f32 / zoom,
        },
    }
}

/// Visible tile rectangle clamped to the world; `None` when the world is
/// empty or the view lies fully outside it.
pub fn visible_tile_rect(
    view: &WorldRect,
    tile_size: u32,
    world_tiles: (u32, u32),
) -> Option<TileRect> {
    let (world_w, world_h) = world_tiles;
    if world_w == 0 || world_h == 0 {
        return None;
    }
    let tile = tile_size.max(1) as f32;

    let x_min = (view.min.x / tile).floor().max(0.0) as u32;
    let y_min = (view.min.y / tile).floor().max(0.0) as u32;
    let x_max_raw = ((view.max.x / tile).ceil() as i64 - 1).max(0) as u32;
    let y_max_raw = ((view.max.y / tile).ceil() as i64 - 1).max(0) as u32;

    if x_min >= world_w || y_min >= world_h {
        return None;
    }
    Some(TileRect {
        x_min,
        x_max: x_max_raw.min(world_w - 1),
        y_min,
        y_max: y_max_raw.min(world_h - 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_at(x: f32, y: f32, zoom: f32) -> Camera2D {
        Camera2D {
            position: Vec2 { x, y },
            zoom,
        }
    }

    #[test]
    fn camera_top_left_maps_to_screen_origin() {
        let camera = camera_at(100.0, 50.0, 1.0);
        let (x, y) = world_to_screen_px(&camera, Vec2 { x: 100.0, y: 50.0 });
        assert_eq!((x, y), (0, 0));
    }

    #[test]
    fn zoom_scales_world_offsets() {
        let camera = camera_at(0.0, 0.0, 2.0);
        let (x, y) = world_to_screen_px(&camera, Vec2 { x: 10.0, y: 4.0 });
        assert_eq!((x, y), (20, 8));
    }

    #[test]
    fn screen_to_world_round_trips() {
        let camera = camera_at(33.0, -12.0, 1.5);
        let world = Vec2 { x: 80.0, y: 40.0 };
        let (sx, sy) = world_to_screen_px(&camera, world);
        let back = screen_to_world_px(
            &camera,
            Vec2 {
                x: sx as f32,
                y: sy as f32,
            },
        );
        assert!((back.x - world.x).abs() < 1.0);
        assert!((back.y - world.y).abs() < 1.0);
    }

    #[test]
    fn visible_world_rect_shrinks_as_zoom_grows() {
        let viewport = Viewport {
            width: 640,
            height: 360,
        };
        let wide = visible_world_rect(&camera_at(0.0, 0.0, 1.0), viewport);
        let tight = visible_world_rect(&camera_at(0.0, 0.0, 2.0), viewport);
        assert!((wide.max.x - 640.0).abs() < 0.001);
        assert!((tight.max.x - 320.0).abs() < 0.001);
    }

    #[test]
    fn visible_tile_rect_clamps_to_world_bounds() {
        let view = WorldRect {
            min: Vec2 { x: -64.0, y: -64.0 },
            max: Vec2 {
                x: 4000.0,
                y: 4000.0,
            },
        };
        let rect = visible_tile_rect(&view, 32, (10, 8)).expect("rect");
        assert_eq!(
            rect,
            TileRect {
                x_min: 0,
                x_max: 9,
                y_min: 0,
                y_max: 7
            }
        );
    }

    #[test]
    fn visible_tile_rect_is_none_outside_world() {
        let view = WorldRect {
            min: Vec2 {
                x: 1000.0,
                y: 1000.0,
            },
            max: Vec2 {
                x: 1100.0,
                y: 1100.0,
            },
        };
        assert!(visible_tile_rect(&view, 32, (10, 8)).is_none());
        assert!(visible_tile_rect(&view, 32, (0, 0)).is_none());
    }

    #[test]
    fn tile_rect_intersection_is_inclusive() {
        let a = TileRect {
            x_min: 0,
            x_max: 4,
            y_min: 0,
            y_max: 4,
        };
        let b = TileRect {
            x_min: 4,
            x_max: 8,
            y_min: 4,
            y_max: 8,
        };
        let c = TileRect {
            x_min: 5,
            x_max: 8,
            y_min: 0,
            y_max: 4,
        };
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
