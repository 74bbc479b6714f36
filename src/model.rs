use crate::effects::Effects;
use crate::events::GameEvent;
use crate::geometry::Vec3;
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

pub(crate) const LANE_COUNT: usize = 3;
pub(crate) const CAMERA_Y: f32 = 5.0;
pub(crate) const CAMERA_Z: f32 = 10.0;
pub(crate) const PLAYER_Z: f32 = 0.0;
pub(crate) const POWERUP_Y: f32 = 1.0;
pub(crate) const OBSTACLE_Y: f32 = 1.0;
pub(crate) const TICK_MS: f32 = 1000.0 / 60.0;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Tuning {
    pub(crate) base_speed: f32,      // units per tick
    pub(crate) speed_per_level: f32, // added per level
    pub(crate) road_length: f32,
    pub(crate) road_half_width: f32,
    pub(crate) lane_width: f32,
    pub(crate) jump_power: f32,
    pub(crate) high_jump_power: f32,
    pub(crate) gravity: f32,
    pub(crate) ground_y: f32,
    pub(crate) lane_lerp: f32,
    pub(crate) lane_snap: f32,
    pub(crate) landing_offset: f32,

    pub(crate) invincibility_ms: f32,
    pub(crate) shield_blink_ms: f32,
    pub(crate) score_boost_ms: f32,
    pub(crate) speed_boost_ms: f32,
    pub(crate) glide_ms: f32,
    pub(crate) slide_ms: f32,
    pub(crate) notice_ms: f32,
    pub(crate) level_up_ms: f32,

    pub(crate) danfo_pool: usize,
    pub(crate) truck_pool: usize,
    pub(crate) spawn_z: f32,
    pub(crate) spawn_gap: f32,
    pub(crate) truck_chance: f32,
    pub(crate) drift_chance_per_level: f32,
    pub(crate) drift_max: f32,
    pub(crate) powerup_chance: f32,
    pub(crate) powerup_lead: f32,

    pub(crate) building_pool: usize,
    pub(crate) building_width: f32,
    pub(crate) building_depth: f32,
    pub(crate) building_spacing: f32,
    pub(crate) building_min_height: u32,
    pub(crate) building_max_height: u32,

    pub(crate) double_tap_ms: u64,
    pub(crate) fall_tilt_step: f32,
    pub(crate) fall_sink_step: f32,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            base_speed: 0.15,
            speed_per_level: 0.05,
            road_length: 200.0,
            road_half_width: 15.0,
            lane_width: 5.0,
            jump_power: 0.4,
            high_jump_power: 0.55,
            gravity: -0.02,
            ground_y: 0.5,
            lane_lerp: 0.1,
            lane_snap: 0.01,
            landing_offset: 3.5,

            invincibility_ms: 1500.0,
            shield_blink_ms: 1000.0,
            score_boost_ms: 10_000.0,
            speed_boost_ms: 10_000.0,
            glide_ms: 2000.0,
            slide_ms: 1000.0,
            notice_ms: 1000.0,
            level_up_ms: 120_000.0,

            danfo_pool: 20,
            truck_pool: 10,
            spawn_z: -150.0,
            spawn_gap: 80.0,
            truck_chance: 0.2,
            drift_chance_per_level: 0.2,
            drift_max: 0.05,
            powerup_chance: 0.35,
            powerup_lead: 30.0,

            building_pool: 30,
            building_width: 15.0,
            building_depth: 15.0,
            building_spacing: 5.0,
            building_min_height: 10,
            building_max_height: 50,

            double_tap_ms: 300,
            fall_tilt_step: 0.1,
            fall_sink_step: 0.05,
        }
    }
}

impl Tuning {
    pub(crate) fn lane_x(&self, lane: usize) -> f32 {
        (lane.min(LANE_COUNT - 1) as f32 - 1.0) * self.lane_width
    }

    /// Height band over which the legs untuck during a jump.
    pub(crate) fn tuck_span(&self) -> f32 {
        (self.jump_power / -self.gravity).max(1e-3)
    }

    pub(crate) fn building_x(&self, side: f32) -> f32 {
        side * (self.lane_width + self.building_width / 2.0 + self.building_spacing)
    }

    pub(crate) fn building_stride(&self) -> f32 {
        self.building_depth + self.building_spacing
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    Title,
    Running,
    Paused,
    Falling,
    GameOver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ObstacleKind {
    Danfo,
    Truck,
}

impl ObstacleKind {
    /// Local-space bounds relative to the obstacle origin.
    pub(crate) fn local_bounds(self) -> (Vec3, Vec3) {
        match self {
            // body 3x3x8 lifted 1.5, wheels poke out to x ±2
            ObstacleKind::Danfo => (Vec3::new(-2.0, 0.0, -4.0), Vec3::new(2.0, 3.0, 4.0)),
            // chassis 4x4x12 lifted 3, wheels at ±2.5 with radius 0.8
            ObstacleKind::Truck => (Vec3::new(-3.0, 0.2, -6.0), Vec3::new(3.0, 5.0, 6.0)),
        }
    }

    pub(crate) fn half_length(self) -> f32 {
        match self {
            ObstacleKind::Danfo => 4.0,
            ObstacleKind::Truck => 6.0,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            ObstacleKind::Danfo => "danfo",
            ObstacleKind::Truck => "truck",
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Obstacle {
    pub(crate) kind: ObstacleKind,
    pub(crate) pos: Vec3,
    pub(crate) z_speed: f32,
    pub(crate) active: bool,
}

impl Obstacle {
    fn parked(kind: ObstacleKind, spawn_z: f32) -> Self {
        Self {
            kind,
            pos: Vec3::new(0.0, OBSTACLE_Y, spawn_z),
            z_speed: 0.0,
            active: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PowerUpKind {
    Shawarma,
    SachetWater,
    EnergyDrink,
    SpeedBoost2x,
    SpeedBoost5x,
}

impl PowerUpKind {
    pub(crate) const ALL: [PowerUpKind; 5] = [
        PowerUpKind::Shawarma,
        PowerUpKind::SachetWater,
        PowerUpKind::EnergyDrink,
        PowerUpKind::SpeedBoost2x,
        PowerUpKind::SpeedBoost5x,
    ];

    pub(crate) fn local_bounds(self) -> (Vec3, Vec3) {
        match self {
            // torus r0.8 tube 0.3, standing upright
            PowerUpKind::Shawarma => (Vec3::new(-1.1, -1.1, -0.3), Vec3::new(1.1, 1.1, 0.3)),
            PowerUpKind::SachetWater => (Vec3::new(-0.5, -0.5, -0.5), Vec3::new(0.5, 0.5, 0.5)),
            // cans: cylinder r0.5 h1.5
            PowerUpKind::EnergyDrink | PowerUpKind::SpeedBoost2x | PowerUpKind::SpeedBoost5x => {
                (Vec3::new(-0.5, -0.75, -0.5), Vec3::new(0.5, 0.75, 0.5))
            }
        }
    }

    /// Relative spawn weight.
    pub(crate) fn weight(self) -> u32 {
        match self {
            PowerUpKind::Shawarma => 5,
            PowerUpKind::SachetWater => 3,
            PowerUpKind::EnergyDrink => 3,
            PowerUpKind::SpeedBoost2x => 2,
            PowerUpKind::SpeedBoost5x => 1,
        }
    }

    pub(crate) fn notice(self) -> &'static str {
        match self {
            PowerUpKind::Shawarma => "Shawarma Shield!",
            PowerUpKind::SachetWater => "Sachet Water!",
            PowerUpKind::EnergyDrink => "Energy Drink! 2x Score!",
            PowerUpKind::SpeedBoost2x => "2x Speed Boost!",
            PowerUpKind::SpeedBoost5x => "5x Speed Boost!",
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct PowerUp {
    pub(crate) kind: PowerUpKind,
    pub(crate) pos: Vec3,
    pub(crate) active: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct Building {
    pub(crate) side: f32, // -1 left, 1 right
    pub(crate) z: f32,
    pub(crate) height: u32,
    pub(crate) color: usize,
}

pub(crate) const BUILDING_COLORS: usize = 5;

#[derive(Clone, Debug)]
pub(crate) struct Player {
    pub(crate) lane: usize,
    pub(crate) pos: Vec3,
    pub(crate) target_x: f32,
    pub(crate) switching: bool,
    pub(crate) jumping: bool,
    pub(crate) gliding: bool,
    pub(crate) sliding: bool,
    pub(crate) y_velocity: f32,
    pub(crate) riding: Option<usize>,
    pub(crate) leg_scale: f32,
    pub(crate) tilt: f32,
}

impl Player {
    pub(crate) fn new(tuning: &Tuning) -> Self {
        let x = tuning.lane_x(1);
        Self {
            lane: 1,
            pos: Vec3::new(x, tuning.ground_y, PLAYER_Z),
            target_x: x,
            switching: false,
            jumping: false,
            gliding: false,
            sliding: false,
            y_velocity: 0.0,
            riding: None,
            leg_scale: 1.0,
            tilt: 0.0,
        }
    }
}

pub(crate) struct GameState {
    pub(crate) tuning: Tuning,
    pub(crate) phase: Phase,
    pub(crate) player: Player,
    pub(crate) effects: Effects,
    pub(crate) score: f64,
    pub(crate) level: u32,
    pub(crate) level_clock_ms: f32,
    pub(crate) run_clock_ms: f32,
    pub(crate) shields: u32,
    pub(crate) game_speed: f32,
    pub(crate) final_score: u64,
    pub(crate) obstacles: Vec<Obstacle>,
    pub(crate) powerups: Vec<PowerUp>,
    pub(crate) buildings: Vec<Building>,
    pub(crate) road_offsets: [f32; 2],
    pub(crate) rng: StdRng,
    pub(crate) events: Vec<GameEvent>,
}

impl GameState {
    pub(crate) fn new(seed: u64, tuning: Tuning) -> Self {
        let mut obstacles = Vec::with_capacity(tuning.danfo_pool + tuning.truck_pool);
        for _ in 0..tuning.danfo_pool {
            obstacles.push(Obstacle::parked(ObstacleKind::Danfo, tuning.spawn_z));
        }
        for _ in 0..tuning.truck_pool {
            obstacles.push(Obstacle::parked(ObstacleKind::Truck, tuning.spawn_z));
        }

        let powerups = PowerUpKind::ALL
            .iter()
            .map(|&kind| PowerUp {
                kind,
                pos: Vec3::new(0.0, POWERUP_Y, tuning.spawn_z),
                active: false,
            })
            .collect();

        let mut st = Self {
            player: Player::new(&tuning),
            phase: Phase::Title,
            effects: Effects::default(),
            score: 0.0,
            level: 1,
            level_clock_ms: 0.0,
            run_clock_ms: 0.0,
            shields: 0,
            game_speed: tuning.base_speed,
            final_score: 0,
            obstacles,
            powerups,
            buildings: Vec::new(),
            road_offsets: [-tuning.road_length / 2.0, -tuning.road_length * 1.5],
            rng: StdRng::seed_from_u64(seed),
            events: Vec::new(),
            tuning,
        };
        st.lay_out_buildings();
        st
    }

    pub(crate) fn display_score(&self) -> u64 {
        self.score.floor().max(0.0) as u64
    }

    pub(crate) fn score_multiplier(&self) -> f64 {
        if self.effects.score_boost.active() {
            2.0
        } else {
            1.0
        }
    }

    pub(crate) fn speed_multiplier(&self) -> f32 {
        if self.effects.speed_boost.active() {
            self.effects.speed_factor
        } else {
            1.0
        }
    }

    pub(crate) fn is_alive(&self) -> bool {
        !matches!(self.phase, Phase::Falling | Phase::GameOver)
    }

    pub(crate) fn active_obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.obstacles.iter().filter(|o| o.active)
    }

    pub(crate) fn active_powerups(&self) -> impl Iterator<Item = &PowerUp> {
        self.powerups.iter().filter(|p| p.active)
    }
}
