/// Canonical day/night policy. `night_factor` is 0 through the day, 1
/// through the night, and linear across the two fixed transition windows;
/// it hits exactly 0 and 1 at the window endpoints.
fn night_factor(hour: f32) -> f32 {
    let hour = wrap_hour(hour);
    if (SUNRISE_END_HOUR..SUNSET_START_HOUR).contains(&hour) {
        0.0
    } else if !(SUNRISE_START_HOUR..SUNSET_END_HOUR).contains(&hour) {
        1.0
    } else if hour < SUNRISE_END_HOUR {
        1.0 - (hour - SUNRISE_START_HOUR) / (SUNRISE_END_HOUR - SUNRISE_START_HOUR)
    } else {
        (hour - SUNSET_START_HOUR) / (SUNSET_END_HOUR - SUNSET_START_HOUR)
    }
}

fn wrap_hour(hour: f32) -> f32 {
    if !hour.is_finite() {
        return 12.0;
    }
    let wrapped = hour % 24.0;
    if wrapped < 0.0 {
        wrapped + 24.0
    } else {
        wrapped
    }
}

fn overlay_color(night: f32) -> [u8; 3] {
    let night = night.clamp(0.0, 1.0);
    let mut color = [0u8; 3];
    for channel in 0..3 {
        let day = DAY_OVERLAY_COLOR[channel] as f32;
        let dark = NIGHT_OVERLAY_COLOR[channel] as f32;
        color[channel] = (day + (dark - day) * night).round().clamp(0.0, 255.0) as u8;
    }
    color
}

fn is_night(hour: f32) -> bool {
    night_factor(hour) >= 1.0
}

/// Edge-triggered night observer: ambient collaborators (fireflies, night
/// audio) get exactly one event per transition, never a flutter across the
/// boundary.
#[derive(Debug, Default)]
struct NightWatcher {
    was_night: Option<bool>,
}

impl NightWatcher {
    fn observe(&mut self, hour: f32, events: &mut WorldEventBus) {
        let night = is_night(hour);
        match self.was_night {
            None => self.was_night = Some(night),
            Some(previous) if previous != night => {
                self.was_night = Some(night);
                if night {
                    events.emit(WorldEvent::NightStarted);
                } else {
                    events.emit(WorldEvent::NightEnded);
                }
            }
            Some(_) => {}
        }
    }
}

/// Flicker rides a sine on top of the light's base intensity, clamped into
/// `[0, max]`, and the day/night factor scales the result, so the working
/// intensity can never leave `[0, initial max]`.
fn update_light_intensity(light: &mut Light, elapsed_real_seconds: f64, night: f32) {
    let working = match light.flicker {
        Some(flicker) => {
            let wave = (elapsed_real_seconds as f32 * flicker.speed + flicker.offset).sin();
            (light.max_intensity + wave * flicker.amplitude).clamp(0.0, light.max_intensity)
        }
        None => light.max_intensity,
    };
    light.current_intensity = (working * night.clamp(0.0, 1.0)).clamp(0.0, light.max_intensity);
}

fn update_world_lighting(world: &mut WorldState) {
    let hour = world.clock().hour;
    let elapsed = world.clock().elapsed_real_seconds;
    let night = night_factor(hour);
    world.set_lighting(LightingState {
        night_factor: night,
        overlay_color: overlay_color(night),
    });
    for light in world.lights_mut().values_mut() {
        update_light_intensity(light, elapsed, night);
    }
}
