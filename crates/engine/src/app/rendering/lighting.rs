use crate::app::{Camera2D, Light, LightingState};

use super::transform::world_to_screen_px;

/// Full darkness still leaves a sliver of scene visible.
const MAX_DARKNESS: f32 = 0.85;

/// Screen-sized RGB multiplier mask: 255 = unchanged scene pixel, lower
/// values darken. Lights are added into the mask before it is multiplied
/// onto the frame, so overlapping lights brighten instead of saturating
/// each other out.
pub(crate) struct LightMask {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

impl LightMask {
    pub(crate) fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            rgb: Vec::new(),
        }
    }

    pub(crate) fn begin(&mut self, width: u32, height: u32, lighting: &LightingState) {
        self.width = width;
        self.height = height;
        self.rgb.resize(width as usize * height as usize * 3, 0);

        let base = base_mask_color(lighting);
        for pixel in self.rgb.chunks_exact_mut(3) {
            pixel.copy_from_slice(&base);
        }
    }

    pub(crate) fn add_light(&mut self, center_px: (i32, i32), radius_px: f32, light: &Light) {
        if radius_px <= 0.0 || light.current_intensity <= 0.0 {
            return;
        }
        let radius_i = radius_px.ceil() as i32;
        let (cx, cy) = center_px;
        let x_lo = (cx - radius_i).max(0);
        let x_hi = (cx + radius_i).min(self.width as i32 - 1);
        let y_lo = (cy - radius_i).max(0);
        let y_hi = (cy + radius_i).min(self.height as i32 - 1);
        if x_lo > x_hi || y_lo > y_hi {
            return;
        }

        for y in y_lo..=y_hi {
            for x in x_lo..=x_hi {
                let dx = (x - cx) as f32;
                let dy = (y - cy) as f32;
                let distance = (dx * dx + dy * dy).sqrt();
                if distance >= radius_px {
                    continue;
                }
                let falloff = (1.0 - distance / radius_px) * light.current_intensity;
                let index = (y as usize * self.width as usize + x as usize) * 3;
                for channel in 0..3 {
                    let added =
                        self.rgb[index + channel] as f32 + light.color[channel] as f32 * falloff;
                    self.rgb[index + channel] = added.min(255.0) as u8;
                }
            }
        }
    }

    /// Darken-compatible composite: multiplies the scene by the mask so
    /// unlit areas stay dark and lit areas show through.
    pub(crate) fn composite_onto(&self, frame: &mut [u8]) {
        for (pixel_index, mask) in self.rgb.chunks_exact(3).enumerate() {
            let frame_index = pixel_index * 4;
            let Some(pixel) = frame.get_mut(frame_index..frame_index + 3) else {
                return;
            };
            for channel in 0..3 {
                pixel[channel] =
                    ((pixel[channel] as u16 * mask[channel] as u16) / 255) as u8;
            }
        }
    }

    #[cfg(test)]
    fn mask_at(&self, x: u32, y: u32) -> [u8; 3] {
        let index = (y as usize * self.width as usize + x as usize) * 3;
        [self.rgb[index], self.rgb[index + 1], self.rgb[index + 2]]
    }
}

fn base_mask_color(lighting: &LightingState) -> [u8; 3] {
    let darkness = (lighting.night_factor.clamp(0.0, 1.0) * MAX_DARKNESS).clamp(0.0, 1.0);
    let mut base = [0u8; 3];
    for channel in 0..3 {
        let lit = 255.0;
        let dark = lighting.overlay_color[channel] as f32 * (1.0 - MAX_DARKNESS);
        base[channel] = (lit + (dark - lit) * darkness).round().clamp(0.0, 255.0) as u8;
    }
    base
}

/// Renders the darkness-and-lights pass onto the frame. Lights whose
/// radius-expanded bounds miss the viewport are skipped for this frame but
/// left alive in the registry.
pub(crate) fn composite_lighting<I, L>(
    frame: &mut [u8],
    mask: &mut LightMask,
    width: u32,
    height: u32,
    camera: &Camera2D,
    lighting: &LightingState,
    lights: I,
) where
    I: Iterator<Item = L>,
    L: std::borrow::Borrow<Light>,
{
    if lighting.night_factor <= f32::EPSILON {
        return;
    }
    mask.begin(width, height, lighting);

    let zoom = camera.effective_zoom();
    for light in lights {
        let light = light.borrow();
        if offscreen_light(camera, (width, height), light) {
            continue;
        }
        let (cx, cy) = world_to_screen_px(camera, light.position);
        mask.add_light((cx, cy), light.radius_px * zoom, light);
    }

    mask.composite_onto(frame);
}

pub(crate) fn offscreen_light(camera: &Camera2D, viewport: (u32, u32), light: &Light) -> bool {
    let (cx, cy) = world_to_screen_px(camera, light.position);
    let radius_i = (light.radius_px * camera.effective_zoom()).ceil() as i32;
    cx + radius_i < 0
        || cy + radius_i < 0
        || cx - radius_i >= viewport.0 as i32
        || cy - radius_i >= viewport.1 as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Vec2;

    fn night() -> LightingState {
        LightingState {
            night_factor: 1.0,
            overlay_color: [40, 60, 120],
        }
    }

    fn lantern(position: Vec2) -> Light {
        Light {
            position,
            radius_px: 8.0,
            color: [255, 200, 120],
            max_intensity: 1.0,
            current_intensity: 1.0,
            flicker: None,
        }
    }

    #[test]
    fn day_mask_leaves_frame_unchanged() {
        let mut frame = vec![100u8; 4 * 4 * 4];
        let mut mask = LightMask::new();
        let day = LightingState {
            night_factor: 0.0,
            overlay_color: [40, 60, 120],
        };
        composite_lighting(
            &mut frame,
            &mut mask,
            4,
            4,
            &Camera2D::default(),
            &day,
            std::iter::empty::<Light>(),
        );
        assert!(frame.chunks_exact(4).all(|px| px[0] == 100));
    }

    #[test]
    fn night_without_lights_darkens_everything() {
        let mut frame = vec![200u8; 4 * 4 * 4];
        let mut mask = LightMask::new();
        composite_lighting(
            &mut frame,
            &mut mask,
            4,
            4,
            &Camera2D::default(),
            &night(),
            std::iter::empty::<Light>(),
        );
        assert!(frame.chunks_exact(4).all(|px| px[0] < 200 && px[1] < 200));
    }

    #[test]
    fn light_center_is_brighter_than_unlit_corner() {
        let mut frame = vec![200u8; 16 * 16 * 4];
        let mut mask = LightMask::new();
        let light = lantern(Vec2 { x: 8.0, y: 8.0 });
        composite_lighting(
            &mut frame,
            &mut mask,
            16,
            16,
            &Camera2D::default(),
            &night(),
            std::iter::once(&light),
        );

        let center = frame[(8 * 16 + 8) * 4] as u16;
        let corner = frame[0] as u16;
        assert!(center > corner);
    }

    #[test]
    fn overlapping_lights_add_instead_of_replacing() {
        let mut mask_single = LightMask::new();
        let mut mask_double = LightMask::new();
        let light = lantern(Vec2 { x: 4.0, y: 4.0 });
        let mut dim = light.clone();
        dim.current_intensity = 0.3;

        mask_single.begin(8, 8, &night());
        mask_single.add_light((4, 4), 8.0, &dim);
        mask_double.begin(8, 8, &night());
        mask_double.add_light((4, 4), 8.0, &dim);
        mask_double.add_light((4, 4), 8.0, &dim);

        assert!(mask_double.mask_at(4, 4)[0] > mask_single.mask_at(4, 4)[0]);
    }

    #[test]
    fn mask_addition_saturates_at_white() {
        let mut mask = LightMask::new();
        mask.begin(8, 8, &night());
        let light = lantern(Vec2 { x: 4.0, y: 4.0 });
        for _ in 0..32 {
            mask.add_light((4, 4), 16.0, &light);
        }
        assert_eq!(mask.mask_at(4, 4), [255, 255, 255]);
    }

    #[test]
    fn offscreen_light_accounts_for_radius_expansion() {
        let camera = Camera2D::default();
        let nearby = lantern(Vec2 { x: -4.0, y: 10.0 });
        let distant = lantern(Vec2 { x: -64.0, y: 10.0 });
        assert!(!offscreen_light(&camera, (64, 64), &nearby));
        assert!(offscreen_light(&camera, (64, 64), &distant));
    }

    #[test]
    fn zero_intensity_light_changes_nothing() {
        let mut mask = LightMask::new();
        mask.begin(8, 8, &night());
        let before = mask.mask_at(4, 4);
        let mut light = lantern(Vec2 { x: 4.0, y: 4.0 });
        light.current_intensity = 0.0;
        mask.add_light((4, 4), 8.0, &light);
        assert_eq!(mask.mask_at(4, 4), before);
    }
}
