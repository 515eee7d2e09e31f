#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameBand {
    start: u16,
    end: u16,
}

impl FrameBand {
    fn contains(self, frame: u16) -> bool {
        frame >= self.start && frame <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct AnimationProfile {
    band: FrameBand,
    advance_per_tick: f32,
    looped: bool,
}

/// Frame band and cycle rate for a sprite kind in a movement state.
/// Humanoids hold frame 0 when idle and play a short one-shot band while
/// stopping; animals run a two-band idle/moving cycle at a different rate
/// ratio and have no stopping transition.
fn animation_profile(kind: SpriteKind, state: MovementState) -> AnimationProfile {
    match (kind, state) {
        (SpriteKind::Humanoid, MovementState::Idle) => AnimationProfile {
            band: FrameBand { start: 0, end: 0 },
            advance_per_tick: 0.0,
            looped: true,
        },
        (SpriteKind::Humanoid, MovementState::MovingFree)
        | (SpriteKind::Humanoid, MovementState::MovingOnPath) => AnimationProfile {
            band: HUMANOID_WALK_BAND,
            advance_per_tick: WALK_FRAME_ADVANCE_PER_TICK,
            looped: true,
        },
        (SpriteKind::Humanoid, MovementState::Stopping) => AnimationProfile {
            band: HUMANOID_STOP_BAND,
            advance_per_tick: STOP_FRAME_ADVANCE_PER_TICK,
            looped: false,
        },
        (SpriteKind::Animal, MovementState::Idle) | (SpriteKind::Animal, MovementState::Stopping) => {
            AnimationProfile {
                band: ANIMAL_IDLE_BAND,
                advance_per_tick: ANIMAL_IDLE_FRAME_ADVANCE_PER_TICK,
                looped: true,
            }
        }
        (SpriteKind::Animal, MovementState::MovingFree)
        | (SpriteKind::Animal, MovementState::MovingOnPath) => AnimationProfile {
            band: ANIMAL_MOVE_BAND,
            advance_per_tick: ANIMAL_MOVE_FRAME_ADVANCE_PER_TICK,
            looped: true,
        },
    }
}
