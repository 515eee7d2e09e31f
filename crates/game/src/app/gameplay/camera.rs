#[derive(Debug, Clone, Copy, PartialEq)]
enum CameraMode {
    FollowPlayer,
    ManualFixed,
    Panning { target: Vec2, wander: bool },
    Cutscene,
}

#[derive(Debug)]
struct CameraRig {
    mode: CameraMode,
    lerp_factor: Option<f32>,
    pan_speed_px_per_sec: f32,
}

impl CameraRig {
    fn new(lerp_factor: Option<f32>) -> Self {
        Self {
            mode: CameraMode::FollowPlayer,
            lerp_factor: lerp_factor.filter(|factor| *factor > 0.0 && *factor <= 1.0),
            pan_speed_px_per_sec: CAMERA_PAN_SPEED_PX_PER_SEC,
        }
    }

    #[allow(dead_code)]
    fn mode(&self) -> CameraMode {
        self.mode
    }

    /// Direct placement; the camera stays put until told otherwise.
    fn hold_fixed(&mut self) {
        self.mode = CameraMode::ManualFixed;
    }

    /// Constant-speed pan; with `wander` the rig keeps picking new random
    /// targets after each arrival (idle attract-mode drift).
    #[allow(dead_code)]
    fn pan_to(&mut self, target: Vec2, wander: bool) {
        self.mode = CameraMode::Panning { target, wander };
    }

    /// External control (scripted sequences) suppresses automatic follow.
    #[allow(dead_code)]
    fn begin_cutscene(&mut self) {
        self.mode = CameraMode::Cutscene;
    }

    #[allow(dead_code)]
    fn end_cutscene(&mut self) {
        self.mode = CameraMode::FollowPlayer;
    }

    fn update(
        &mut self,
        world: &mut WorldState,
        viewport: (u32, u32),
        tracked_center: Option<Vec2>,
        fixed_dt_seconds: f32,
        rng: &mut fastrand::Rng,
    ) {
        let world_px = world.world_size_px();
        match self.mode {
            CameraMode::FollowPlayer => {
                let Some(center) = tracked_center else {
                    return;
                };
                let camera = world.camera_mut();
                let target = follow_target(center, camera.effective_zoom(), viewport, world_px);
                camera.position = match self.lerp_factor {
                    Some(factor) => lerp_vec2(camera.position, target, factor),
                    None => target,
                };
            }
            CameraMode::ManualFixed | CameraMode::Cutscene => {}
            CameraMode::Panning { target, wander } => {
                let camera = world.camera_mut();
                let (next, arrived) = step_toward(
                    camera.position,
                    target,
                    self.pan_speed_px_per_sec,
                    fixed_dt_seconds,
                );
                camera.position = next;
                if arrived {
                    if wander {
                        let next_target = random_wander_target(world_px, rng);
                        self.mode = CameraMode::Panning {
                            target: next_target,
                            wander: true,
                        };
                    } else {
                        self.mode = CameraMode::ManualFixed;
                    }
                }
            }
        }
    }
}

/// Camera position that centers `center` in the viewport, clamped so the
/// view never leaves the world.
fn follow_target(center: Vec2, zoom: f32, viewport: (u32, u32), world_px: Vec2) -> Vec2 {
    let view_w = viewport.0 as f32 / zoom;
    let view_h = viewport.1 as f32 / zoom;
    clamp_camera_position(
        Vec2 {
            x: center.x - view_w * 0.5,
            y: center.y - view_h * 0.5,
        },
        world_px,
        (view_w, view_h),
    )
}

fn clamp_camera_position(position: Vec2, world_px: Vec2, view_dims: (f32, f32)) -> Vec2 {
    let max_x = (world_px.x - view_dims.0).max(0.0);
    let max_y = (world_px.y - view_dims.1).max(0.0);
    let clamped = Vec2 {
        x: position.x.clamp(0.0, max_x),
        y: position.y.clamp(0.0, max_y),
    };
    if !clamped.x.is_finite() || !clamped.y.is_finite() {
        return Vec2 { x: 0.0, y: 0.0 };
    }
    clamped
}

fn random_wander_target(world_px: Vec2, rng: &mut fastrand::Rng) -> Vec2 {
    Vec2 {
        x: rng.f32() * world_px.x.max(1.0),
        y: rng.f32() * world_px.y.max(1.0),
    }
}

/// Manual camera pan from the held camera actions, normalized so diagonal
/// pans match the axial speed.
fn camera_pan_delta(input: &InputSnapshot, speed: f32, fixed_dt_seconds: f32) -> Vec2 {
    let mut x = 0.0f32;
    let mut y = 0.0f32;

    if input.is_down(InputAction::CameraRight) {
        x += 1.0;
    }
    if input.is_down(InputAction::CameraLeft) {
        x -= 1.0;
    }
    if input.is_down(InputAction::CameraDown) {
        y += 1.0;
    }
    if input.is_down(InputAction::CameraUp) {
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
