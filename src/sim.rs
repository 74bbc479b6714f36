use crate::events::GameEvent;
use crate::geometry::{lerp, Aabb, Vec3};
use crate::model::{
    Building, GameState, ObstacleKind, Phase, Player, PowerUpKind, BUILDING_COLORS, CAMERA_Z,
    LANE_COUNT, OBSTACLE_Y, POWERUP_Y,
};
use crate::effects::Effects;
use rand::Rng;
use std::f32::consts::FRAC_PI_2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PlayerAction {
    MoveLeft,
    MoveRight,
    Jump,
    HighJump,
    Slide,
    TogglePause,
    Start,
    Restart,
}

impl GameState {
    pub(crate) fn apply(&mut self, action: PlayerAction) {
        match action {
            PlayerAction::MoveLeft => self.switch_lane(-1),
            PlayerAction::MoveRight => self.switch_lane(1),
            PlayerAction::Jump => self.jump(false),
            PlayerAction::HighJump => self.jump(true),
            PlayerAction::Slide => self.slide(),
            PlayerAction::TogglePause => match self.phase {
                Phase::Running => {
                    self.phase = Phase::Paused;
                    self.events.push(GameEvent::Paused);
                }
                Phase::Paused => {
                    self.phase = Phase::Running;
                    self.events.push(GameEvent::Resumed);
                }
                _ => {}
            },
            PlayerAction::Start => {
                if self.phase == Phase::Title {
                    self.begin_run();
                }
            }
            PlayerAction::Restart => {
                if self.phase == Phase::GameOver {
                    self.reset_run();
                    self.begin_run();
                }
            }
        }
    }

    pub(crate) fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    fn begin_run(&mut self) {
        self.phase = Phase::Running;
        self.events.push(GameEvent::Started);
        self.spawn_obstacle();
    }

    fn reset_run(&mut self) {
        self.player = Player::new(&self.tuning);
        self.effects = Effects::default();
        self.score = 0.0;
        self.level = 1;
        self.level_clock_ms = 0.0;
        self.run_clock_ms = 0.0;
        self.shields = 0;
        self.game_speed = self.tuning.base_speed;
        self.final_score = 0;
        let spawn_z = self.tuning.spawn_z;
        for o in &mut self.obstacles {
            o.active = false;
            o.z_speed = 0.0;
            o.pos.z = spawn_z;
        }
        for p in &mut self.powerups {
            p.active = false;
        }
    }

    fn switch_lane(&mut self, dir: i32) {
        if self.phase != Phase::Running || self.player.switching {
            return;
        }
        let target = (self.player.lane as i32 + dir).clamp(0, LANE_COUNT as i32 - 1) as usize;
        if target == self.player.lane {
            return;
        }
        self.player.lane = target;
        self.player.target_x = self.tuning.lane_x(target);
        self.player.switching = true;
        self.events.push(GameEvent::LaneSwitch { lane: target });
    }

    fn jump(&mut self, high: bool) {
        if self.phase != Phase::Running || self.player.jumping {
            return;
        }
        let p = &mut self.player;
        p.jumping = true;
        p.riding = None;
        if high {
            p.y_velocity = self.tuning.high_jump_power;
            p.gliding = true;
            self.effects.glide.start(self.tuning.glide_ms);
        } else {
            p.y_velocity = self.tuning.jump_power;
        }
        self.events.push(GameEvent::Jump { high });
    }

    fn slide(&mut self) {
        if self.phase != Phase::Running || self.player.jumping || self.player.sliding {
            return;
        }
        self.player.sliding = true;
        self.effects.slide.start(self.tuning.slide_ms);
        self.events.push(GameEvent::Slide);
    }

    pub(crate) fn tick(&mut self, dt_ms: f32) {
        match self.phase {
            Phase::Falling => {
                self.step_fall();
                return;
            }
            Phase::Running => {}
            Phase::Title | Phase::Paused | Phase::GameOver => return,
        }

        self.run_clock_ms += dt_ms;

        let expired = self.effects.tick(dt_ms);
        if expired.glide {
            self.player.gliding = false;
        }
        if expired.slide {
            self.player.sliding = false;
        }

        self.level_clock_ms += dt_ms;
        if self.level_clock_ms > self.tuning.level_up_ms {
            self.level += 1;
            self.level_clock_ms = 0.0;
            self.events.push(GameEvent::LevelUp(self.level));
        }

        self.game_speed = self.current_speed();
        self.score += self.score_multiplier();

        self.scroll_scenery();
        if self.advance_pools() {
            self.spawn_obstacle();
        }

        self.step_lane();
        self.step_riding();
        self.step_jump();
        self.check_collisions();
    }

    pub(crate) fn current_speed(&self) -> f32 {
        let t = &self.tuning;
        let auto = t.base_speed + self.level as f32 * t.speed_per_level;
        let speed = auto * self.speed_multiplier();
        if self.effects.surge.active() {
            speed.max(t.base_speed * 2.0)
        } else {
            speed
        }
    }

    fn height_range(&self) -> (u32, u32) {
        let lo = self.tuning.building_min_height;
        (lo, self.tuning.building_max_height.max(lo))
    }

    pub(crate) fn lay_out_buildings(&mut self) {
        let stride = self.tuning.building_stride();
        let first = -self.tuning.road_length / 2.0;
        let (lo, hi) = self.height_range();
        self.buildings.clear();
        for i in 0..self.tuning.building_pool {
            let z = first - i as f32 * stride;
            for side in [-1.0, 1.0] {
                let height = self.rng.gen_range(lo..=hi);
                let color = self.rng.gen_range(0..BUILDING_COLORS);
                self.buildings.push(Building {
                    side,
                    z,
                    height,
                    color,
                });
            }
        }
    }

    fn scroll_scenery(&mut self) {
        let speed = self.game_speed;
        let len = self.tuning.road_length;
        for z in &mut self.road_offsets {
            *z += speed;
            if *z > len / 2.0 {
                *z -= len * 2.0;
            }
        }

        let wrap = self.tuning.building_stride() * self.tuning.building_pool as f32;
        let (lo, hi) = self.height_range();
        for b in &mut self.buildings {
            b.z += speed;
            if b.z > CAMERA_Z {
                b.z -= wrap;
                b.height = self.rng.gen_range(lo..=hi);
            }
        }
    }

    /// Moves pooled objects toward the camera. Returns whether the spawn line is clear.
    fn advance_pools(&mut self) -> bool {
        let speed = self.game_speed;
        let gate = self.tuning.spawn_z + self.tuning.spawn_gap;
        let mut clear = true;
        for o in self.obstacles.iter_mut().filter(|o| o.active) {
            o.pos.z += speed + o.z_speed;
            if o.pos.z > CAMERA_Z {
                o.active = false;
            } else if o.pos.z < gate {
                clear = false;
            }
        }
        for p in self.powerups.iter_mut().filter(|p| p.active) {
            p.pos.z += speed;
            if p.pos.z > CAMERA_Z {
                p.active = false;
            }
        }
        clear
    }

    fn activate_obstacle(&mut self, idx: usize, lane: usize, z_speed: f32) {
        let x = self.tuning.lane_x(lane);
        let o = &mut self.obstacles[idx];
        o.pos = Vec3::new(x, OBSTACLE_Y, self.tuning.spawn_z);
        o.z_speed = z_speed;
        o.active = true;
    }

    fn inactive_of(&self, kind: ObstacleKind) -> impl Iterator<Item = usize> + '_ {
        self.obstacles
            .iter()
            .enumerate()
            .filter(move |(_, o)| o.kind == kind && !o.active)
            .map(|(i, _)| i)
    }

    /// One spawn wave: a truck on later levels, otherwise one or two danfos.
    pub(crate) fn spawn_obstacle(&mut self) {
        let truck_p = self.tuning.truck_chance.clamp(0.0, 1.0) as f64;
        if self.level > 1 && self.rng.gen_bool(truck_p) {
            let truck = self.inactive_of(ObstacleKind::Truck).next();
            if let Some(idx) = truck {
                let lane = self.rng.gen_range(0..LANE_COUNT);
                self.activate_obstacle(idx, lane, 0.0);
                self.maybe_spawn_powerup();
                return;
            }
        }

        let wanted = if self.level == 1 { 1 } else { 2 };
        let free: Vec<usize> = self.inactive_of(ObstacleKind::Danfo).take(wanted).collect();
        if free.len() < wanted {
            return;
        }

        let first_lane = self.rng.gen_range(0..LANE_COUNT);
        self.activate_obstacle(free[0], first_lane, 0.0);

        if wanted == 2 {
            let second_lane = (first_lane + self.rng.gen_range(1..LANE_COUNT)) % LANE_COUNT;
            let drift_p =
                (self.level as f32 * self.tuning.drift_chance_per_level).clamp(0.0, 1.0) as f64;
            let drift = if self.rng.gen_bool(drift_p) {
                let m = self.tuning.drift_max;
                self.rng.gen::<f32>() * 2.0 * m - m
            } else {
                0.0
            };
            self.activate_obstacle(free[1], second_lane, drift);
        }

        self.maybe_spawn_powerup();
    }

    fn maybe_spawn_powerup(&mut self) {
        let p = self.tuning.powerup_chance.clamp(0.0, 1.0) as f64;
        if !self.rng.gen_bool(p) {
            return;
        }
        let total: u32 = self
            .powerups
            .iter()
            .filter(|p| !p.active)
            .map(|p| p.kind.weight())
            .sum();
        if total == 0 {
            return;
        }

        let mut pick = self.rng.gen_range(0..total);
        let mut chosen = None;
        for (i, p) in self.powerups.iter().enumerate().filter(|(_, p)| !p.active) {
            let w = p.kind.weight();
            if pick < w {
                chosen = Some(i);
                break;
            }
            pick -= w;
        }
        let Some(idx) = chosen else {
            return;
        };

        let lane = self.rng.gen_range(0..LANE_COUNT);
        let x = self.tuning.lane_x(lane);
        let z = self.tuning.spawn_z - self.tuning.powerup_lead;
        let p = &mut self.powerups[idx];
        p.pos = Vec3::new(x, POWERUP_Y, z);
        p.active = true;
    }

    fn step_lane(&mut self) {
        let p = &mut self.player;
        p.pos.x = lerp(p.pos.x, p.target_x, self.tuning.lane_lerp);
        if (p.pos.x - p.target_x).abs() < self.tuning.lane_snap {
            p.pos.x = p.target_x;
            p.switching = false;
        }
    }

    fn step_riding(&mut self) {
        let Some(idx) = self.player.riding else {
            return;
        };
        let pos = self.player.pos;
        let stays = match self.obstacles.get(idx) {
            Some(o) if o.active => {
                let half = o.kind.half_length();
                let (lo, hi) = o.kind.local_bounds();
                pos.z <= o.pos.z + half
                    && pos.z >= o.pos.z - half
                    && pos.x >= o.pos.x + lo.x
                    && pos.x <= o.pos.x + hi.x
            }
            _ => false,
        };
        if !stays {
            self.player.riding = None;
            self.player.jumping = true;
        }
    }

    fn step_jump(&mut self) {
        if !self.player.jumping {
            return;
        }
        let t = &self.tuning;
        let p = &mut self.player;
        p.pos.y += p.y_velocity;
        p.y_velocity += if p.gliding { t.gravity / 4.0 } else { t.gravity };

        let tuck = (1.0 - (p.pos.y - t.ground_y) / t.tuck_span()).clamp(0.0, 1.0);
        p.leg_scale = 1.0 - tuck * 0.5;

        if p.pos.y <= t.ground_y {
            p.pos.y = t.ground_y;
            p.jumping = false;
            p.gliding = false;
            p.y_velocity = 0.0;
            p.leg_scale = 1.0;
            self.effects.glide.cancel();
        }
    }

    /// World-space box around the runner in its current pose.
    pub(crate) fn player_bounds(&self) -> Aabb {
        let p = &self.player;
        let squash = if p.sliding { 0.5 } else { 1.0 };
        let bottom = -0.75 * p.leg_scale * squash;
        let top = 2.9 * squash;
        Aabb::from_local(
            p.pos,
            (Vec3::new(-0.85, bottom, -0.4), Vec3::new(0.85, top, 0.4)),
        )
    }

    pub(crate) fn check_collisions(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        let me = self.player_bounds();

        for idx in 0..self.obstacles.len() {
            let o = &self.obstacles[idx];
            if !o.active || self.player.riding == Some(idx) {
                continue;
            }
            let kind = o.kind;
            let base_y = o.pos.y;
            if !me.intersects(&Aabb::from_local(o.pos, kind.local_bounds())) {
                continue;
            }
            if kind == ObstacleKind::Truck && self.player.sliding {
                continue;
            }

            let landing = self.player.y_velocity < 0.0 && self.player.pos.y > base_y;
            if landing {
                let p = &mut self.player;
                p.pos.y = base_y + self.tuning.landing_offset;
                p.jumping = false;
                p.gliding = false;
                p.y_velocity = 0.0;
                p.leg_scale = 1.0;
                p.riding = Some(idx);
                self.effects.glide.cancel();
                self.events.push(GameEvent::Landed { on: kind });
            } else if self.effects.invincible.active() {
                self.obstacles[idx].active = false;
                self.events.push(GameEvent::Smashed(kind));
            } else if self.shields > 0 {
                self.shields -= 1;
                self.obstacles[idx].active = false;
                self.effects.invincible.start(self.tuning.shield_blink_ms);
                self.events.push(GameEvent::ShieldHit { left: self.shields });
            } else {
                self.phase = Phase::Falling;
                self.events.push(GameEvent::Crash(kind));
                return;
            }
        }

        for idx in 0..self.powerups.len() {
            let p = &self.powerups[idx];
            if !p.active || !me.intersects(&Aabb::from_local(p.pos, p.kind.local_bounds())) {
                continue;
            }
            let kind = p.kind;
            self.powerups[idx].active = false;
            self.collect(kind);
        }
    }

    fn collect(&mut self, kind: PowerUpKind) {
        let t = &self.tuning;
        let fx = &mut self.effects;
        match kind {
            PowerUpKind::Shawarma => self.shields += 1,
            PowerUpKind::SachetWater => {
                fx.invincible.start(t.invincibility_ms);
                fx.surge.start(t.invincibility_ms);
            }
            PowerUpKind::EnergyDrink => fx.score_boost.start(t.score_boost_ms),
            PowerUpKind::SpeedBoost2x => {
                fx.speed_factor = 2.0;
                fx.speed_boost.start(t.speed_boost_ms);
            }
            PowerUpKind::SpeedBoost5x => {
                fx.speed_factor = 5.0;
                fx.speed_boost.start(t.speed_boost_ms);
            }
        }
        fx.notify(kind.notice(), t.notice_ms);
        self.events.push(GameEvent::PowerUp(kind));
    }

    fn step_fall(&mut self) {
        let p = &mut self.player;
        if p.tilt < FRAC_PI_2 {
            p.tilt += self.tuning.fall_tilt_step;
            p.pos.y -= self.tuning.fall_sink_step;
            return;
        }
        self.phase = Phase::GameOver;
        self.final_score = self.display_score();
        self.events.push(GameEvent::GameOver {
            score: self.final_score,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Tuning, PLAYER_Z, TICK_MS};
    use proptest::prelude::*;

    fn quiet_tuning() -> Tuning {
        Tuning {
            powerup_chance: 0.0,
            ..Tuning::default()
        }
    }

    fn empty_road() -> Tuning {
        Tuning {
            danfo_pool: 0,
            truck_pool: 0,
            ..quiet_tuning()
        }
    }

    fn running(seed: u64, tuning: Tuning) -> GameState {
        let mut st = GameState::new(seed, tuning);
        st.apply(PlayerAction::Start);
        for o in &mut st.obstacles {
            o.active = false;
        }
        st.drain_events();
        st
    }

    fn place(st: &mut GameState, kind: ObstacleKind, lane: usize, z: f32) -> usize {
        let idx = st
            .obstacles
            .iter()
            .position(|o| o.kind == kind && !o.active)
            .unwrap();
        let x = st.tuning.lane_x(lane);
        let o = &mut st.obstacles[idx];
        o.pos = Vec3::new(x, OBSTACLE_Y, z);
        o.z_speed = 0.0;
        o.active = true;
        idx
    }

    fn place_powerup(st: &mut GameState, kind: PowerUpKind, lane: usize) {
        let x = st.tuning.lane_x(lane);
        let p = st.powerups.iter_mut().find(|p| p.kind == kind).unwrap();
        p.pos = Vec3::new(x, POWERUP_Y, PLAYER_Z);
        p.active = true;
    }

    fn run_ticks(st: &mut GameState, n: usize) {
        for _ in 0..n {
            st.tick(TICK_MS);
        }
    }

    #[test]
    fn new_game_waits_on_title() {
        let mut st = GameState::new(1, Tuning::default());
        assert_eq!(st.phase, Phase::Title);
        assert_eq!(st.buildings.len(), 60);
        assert!(st.active_obstacles().next().is_none());
        run_ticks(&mut st, 10);
        assert_eq!(st.score, 0.0);
    }

    #[test]
    fn start_spawns_first_wave() {
        let mut st = GameState::new(1, quiet_tuning());
        st.apply(PlayerAction::Start);
        assert_eq!(st.phase, Phase::Running);
        assert_eq!(st.active_obstacles().count(), 1);
        assert_eq!(st.drain_events(), vec![GameEvent::Started]);
    }

    #[test]
    fn lane_switch_lerps_then_snaps() {
        let mut st = running(3, quiet_tuning());
        st.apply(PlayerAction::MoveRight);
        assert_eq!(st.player.lane, 2);
        assert!(st.player.switching);
        assert_eq!(st.drain_events(), vec![GameEvent::LaneSwitch { lane: 2 }]);

        // ignored mid-switch
        st.apply(PlayerAction::MoveLeft);
        assert_eq!(st.player.lane, 2);

        run_ticks(&mut st, 1);
        assert!((st.player.pos.x - 0.5).abs() < 1e-5);

        run_ticks(&mut st, 120);
        assert_eq!(st.player.pos.x, 5.0);
        assert!(!st.player.switching);
    }

    #[test]
    fn edge_lane_ignores_further_moves() {
        let mut st = running(3, quiet_tuning());
        st.apply(PlayerAction::MoveLeft);
        run_ticks(&mut st, 120);
        st.drain_events();
        st.apply(PlayerAction::MoveLeft);
        assert_eq!(st.player.lane, 0);
        assert!(!st.player.switching);
        assert!(st.drain_events().is_empty());
    }

    #[test]
    fn jump_arcs_and_returns_to_ground() {
        let mut st = running(5, quiet_tuning());
        st.apply(PlayerAction::Jump);
        assert!(st.player.jumping);

        let ground = st.tuning.ground_y;
        let t = &st.tuning;
        let apex = t.jump_power * t.jump_power / (2.0 * -t.gravity);
        let mut peak = ground;
        for _ in 0..80 {
            st.tick(TICK_MS);
            peak = peak.max(st.player.pos.y);
        }
        assert!(peak >= ground + apex);
        assert!(peak < ground + apex + 1.0);
        assert!(!st.player.jumping);
        assert_eq!(st.player.pos.y, ground);
        assert_eq!(st.player.leg_scale, 1.0);
    }

    #[test]
    fn cannot_double_jump() {
        let mut st = running(5, quiet_tuning());
        st.apply(PlayerAction::Jump);
        run_ticks(&mut st, 3);
        let v = st.player.y_velocity;
        st.apply(PlayerAction::Jump);
        assert_eq!(st.player.y_velocity, v);
    }

    #[test]
    fn high_jump_stays_up_longer() {
        fn airtime(action: PlayerAction) -> usize {
            let mut st = running(5, quiet_tuning());
            st.apply(action);
            let mut n = 0;
            while st.player.jumping && n < 1000 {
                st.tick(TICK_MS);
                n += 1;
            }
            n
        }
        assert!(airtime(PlayerAction::HighJump) > airtime(PlayerAction::Jump));
    }

    #[test]
    fn slide_lasts_its_duration() {
        let mut st = running(5, quiet_tuning());
        st.apply(PlayerAction::Slide);
        assert!(st.player.sliding);
        run_ticks(&mut st, 30);
        assert!(st.player.sliding);
        run_ticks(&mut st, 40);
        assert!(!st.player.sliding);
    }

    #[test]
    fn no_slide_mid_air() {
        let mut st = running(5, quiet_tuning());
        st.apply(PlayerAction::Jump);
        st.apply(PlayerAction::Slide);
        assert!(!st.player.sliding);
    }

    #[test]
    fn score_accrues_per_tick_and_freezes_when_paused() {
        let mut st = running(9, quiet_tuning());
        run_ticks(&mut st, 10);
        assert_eq!(st.display_score(), 10);

        st.apply(PlayerAction::TogglePause);
        assert_eq!(st.phase, Phase::Paused);
        run_ticks(&mut st, 10);
        assert_eq!(st.display_score(), 10);

        st.apply(PlayerAction::TogglePause);
        run_ticks(&mut st, 5);
        assert_eq!(st.display_score(), 15);
    }

    #[test]
    fn level_up_after_running_time() {
        let tuning = Tuning {
            level_up_ms: 1000.0,
            ..quiet_tuning()
        };
        let mut st = running(9, tuning);
        let slow = st.current_speed();
        run_ticks(&mut st, 70);
        assert_eq!(st.level, 2);
        assert!(st.drain_events().contains(&GameEvent::LevelUp(2)));
        assert!(st.current_speed() > slow);
    }

    #[test]
    fn crash_falls_then_game_over() {
        let mut st = running(11, quiet_tuning());
        place(&mut st, ObstacleKind::Danfo, 1, 0.0);
        st.tick(TICK_MS);
        assert_eq!(st.phase, Phase::Falling);
        assert!(!st.is_alive());
        assert!(st
            .drain_events()
            .contains(&GameEvent::Crash(ObstacleKind::Danfo)));

        run_ticks(&mut st, 30);
        assert_eq!(st.phase, Phase::GameOver);
        assert_eq!(st.final_score, 1);
        assert!(st.player.tilt >= FRAC_PI_2);
        assert_eq!(st.drain_events(), vec![GameEvent::GameOver { score: 1 }]);
    }

    #[test]
    fn neighbouring_lane_is_safe() {
        let mut st = running(11, quiet_tuning());
        place(&mut st, ObstacleKind::Danfo, 0, 0.0);
        place(&mut st, ObstacleKind::Truck, 2, 0.0);
        run_ticks(&mut st, 5);
        assert_eq!(st.phase, Phase::Running);
    }

    #[test]
    fn shield_absorbs_exactly_one_hit() {
        let mut st = running(13, quiet_tuning());
        st.shields = 1;
        let idx = place(&mut st, ObstacleKind::Danfo, 1, 0.0);
        st.tick(TICK_MS);
        assert_eq!(st.phase, Phase::Running);
        assert_eq!(st.shields, 0);
        assert!(!st.obstacles[idx].active);
        assert!(st.effects.invincible.active());

        // blink window runs out before the next hit
        run_ticks(&mut st, 70);
        for o in &mut st.obstacles {
            o.active = false;
        }
        place(&mut st, ObstacleKind::Danfo, 1, 0.0);
        st.tick(TICK_MS);
        assert_eq!(st.phase, Phase::Falling);
    }

    #[test]
    fn invincible_runner_smashes_obstacles() {
        let mut st = running(13, quiet_tuning());
        st.effects.invincible.start(1500.0);
        let idx = place(&mut st, ObstacleKind::Truck, 1, 0.0);
        st.tick(TICK_MS);
        assert_eq!(st.phase, Phase::Running);
        assert!(!st.obstacles[idx].active);
        assert!(st
            .drain_events()
            .contains(&GameEvent::Smashed(ObstacleKind::Truck)));
    }

    #[test]
    fn sliding_passes_under_trucks_only() {
        let mut st = running(17, quiet_tuning());
        st.apply(PlayerAction::Slide);
        place(&mut st, ObstacleKind::Truck, 1, 0.0);
        run_ticks(&mut st, 3);
        assert_eq!(st.phase, Phase::Running);

        let mut st = running(17, quiet_tuning());
        st.apply(PlayerAction::Slide);
        place(&mut st, ObstacleKind::Danfo, 1, 0.0);
        st.tick(TICK_MS);
        assert_eq!(st.phase, Phase::Falling);
    }

    #[test]
    fn descending_runner_lands_and_rides() {
        let mut st = running(19, quiet_tuning());
        st.player.jumping = true;
        st.player.y_velocity = -0.1;
        st.player.pos.y = 3.0;
        let idx = place(&mut st, ObstacleKind::Danfo, 1, 0.0);
        st.tick(TICK_MS);
        assert_eq!(st.player.riding, Some(idx));
        assert_eq!(st.player.pos.y, OBSTACLE_Y + st.tuning.landing_offset);
        assert!(!st.player.jumping);

        run_ticks(&mut st, 5);
        assert_eq!(st.player.riding, Some(idx));
        assert_eq!(st.phase, Phase::Running);

        // the danfo rolls out from under the runner
        run_ticks(&mut st, 150);
        assert_eq!(st.player.riding, None);
        assert_eq!(st.player.pos.y, st.tuning.ground_y);
        assert_eq!(st.phase, Phase::Running);
    }

    #[test]
    fn changing_lane_off_a_roof_drops_the_runner() {
        let mut st = running(19, quiet_tuning());
        st.player.jumping = true;
        st.player.y_velocity = -0.1;
        st.player.pos.y = 3.0;
        place(&mut st, ObstacleKind::Truck, 1, 0.0);
        st.tick(TICK_MS);
        assert!(st.player.riding.is_some());

        st.apply(PlayerAction::MoveLeft);
        run_ticks(&mut st, 30);
        assert!(st.player.riding.is_none());
    }

    #[test]
    fn level_one_spawns_single_danfo() {
        let mut st = running(23, quiet_tuning());
        st.spawn_obstacle();
        let active: Vec<_> = st.active_obstacles().collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].kind, ObstacleKind::Danfo);
        assert_eq!(active[0].pos.z, st.tuning.spawn_z);
    }

    #[test]
    fn later_levels_spawn_pairs_in_distinct_lanes() {
        let tuning = Tuning {
            truck_chance: 0.0,
            ..quiet_tuning()
        };
        for seed in 0..20 {
            let mut st = running(seed, tuning.clone());
            st.level = 3;
            st.spawn_obstacle();
            let xs: Vec<f32> = st.active_obstacles().map(|o| o.pos.x).collect();
            assert_eq!(xs.len(), 2);
            assert_ne!(xs[0], xs[1]);
            for o in st.active_obstacles() {
                assert!(o.z_speed.abs() <= st.tuning.drift_max);
            }
        }
    }

    #[test]
    fn trucks_appear_after_level_one() {
        let tuning = Tuning {
            truck_chance: 1.0,
            ..quiet_tuning()
        };
        let mut st = running(29, tuning);
        st.level = 2;
        st.spawn_obstacle();
        let kinds: Vec<_> = st.active_obstacles().map(|o| o.kind).collect();
        assert_eq!(kinds, vec![ObstacleKind::Truck]);
    }

    #[test]
    fn exhausted_pool_spawns_nothing() {
        let mut st = running(31, quiet_tuning());
        st.level = 2;
        st.tuning.truck_chance = 0.0;
        let danfos: Vec<usize> = st.inactive_of(ObstacleKind::Danfo).collect();
        for &i in &danfos[1..] {
            st.obstacles[i].active = true;
        }
        let before = st.active_obstacles().count();
        st.spawn_obstacle();
        assert_eq!(st.active_obstacles().count(), before);
    }

    #[test]
    fn waves_wait_for_spawn_gap() {
        let mut st = running(37, quiet_tuning());
        st.tick(TICK_MS);
        assert_eq!(st.active_obstacles().count(), 1);
        run_ticks(&mut st, 10);
        assert_eq!(st.active_obstacles().count(), 1);
    }

    #[test]
    fn next_wave_spawns_once_the_gap_clears() {
        let mut st = running(38, quiet_tuning());
        st.spawn_obstacle();
        let first = st.obstacles.iter().position(|o| o.active).unwrap();
        let gate = st.tuning.spawn_z + st.tuning.spawn_gap;

        let mut ticks = 0;
        while st.obstacles[first].pos.z < gate {
            assert_eq!(st.active_obstacles().count(), 1);
            st.tick(TICK_MS);
            ticks += 1;
            assert!(ticks < 1000);
        }

        assert_eq!(st.phase, Phase::Running);
        assert_eq!(st.active_obstacles().count(), 2);
        assert!(st
            .active_obstacles()
            .any(|o| o.pos.z == st.tuning.spawn_z));
    }

    fn eager_powerups() -> Tuning {
        Tuning {
            powerup_chance: 1.0,
            ..Tuning::default()
        }
    }

    fn shelved_powerups(seed: u64) -> GameState {
        let mut st = running(seed, eager_powerups());
        for p in &mut st.powerups {
            p.active = false;
        }
        st
    }

    #[test]
    fn powerup_trails_the_wave_in_a_lane() {
        let mut st = shelved_powerups(71);
        st.maybe_spawn_powerup();
        let active: Vec<_> = st.active_powerups().collect();
        assert_eq!(active.len(), 1);
        let p = active[0];
        assert_eq!(p.pos.z, st.tuning.spawn_z - st.tuning.powerup_lead);
        assert_eq!(p.pos.y, POWERUP_Y);
        assert!((0..LANE_COUNT).any(|lane| st.tuning.lane_x(lane) == p.pos.x));
    }

    #[test]
    fn powerup_pick_skips_kinds_already_on_the_road() {
        let mut st = shelved_powerups(73);
        for p in &mut st.powerups {
            if p.kind != PowerUpKind::SpeedBoost5x {
                p.active = true;
                p.pos.z = PLAYER_Z;
            }
        }
        st.maybe_spawn_powerup();
        let rare = st
            .powerups
            .iter()
            .find(|p| p.kind == PowerUpKind::SpeedBoost5x)
            .unwrap();
        assert!(rare.active);
        assert_eq!(rare.pos.z, st.tuning.spawn_z - st.tuning.powerup_lead);
        assert!(st
            .powerups
            .iter()
            .filter(|p| p.kind != PowerUpKind::SpeedBoost5x)
            .all(|p| p.pos.z == PLAYER_Z));
    }

    #[test]
    fn no_powerup_when_all_are_out() {
        let mut st = shelved_powerups(79);
        for p in &mut st.powerups {
            p.active = true;
            p.pos.z = PLAYER_Z;
        }
        st.maybe_spawn_powerup();
        assert_eq!(st.active_powerups().count(), PowerUpKind::ALL.len());
        assert!(st.powerups.iter().all(|p| p.pos.z == PLAYER_Z));
    }

    #[test]
    fn every_powerup_kind_can_be_drawn() {
        let mut seen = Vec::new();
        for seed in 0..300 {
            let mut st = shelved_powerups(seed);
            st.maybe_spawn_powerup();
            let kind = st.active_powerups().next().unwrap().kind;
            if !seen.contains(&kind) {
                seen.push(kind);
            }
        }
        for kind in PowerUpKind::ALL {
            assert!(seen.contains(&kind), "{kind:?} never drawn");
        }
    }

    #[test]
    fn shawarma_adds_a_shield() {
        let mut st = running(41, quiet_tuning());
        place_powerup(&mut st, PowerUpKind::Shawarma, 1);
        st.tick(TICK_MS);
        assert_eq!(st.shields, 1);
        assert!(st.effects.notice.active());
        assert_eq!(st.effects.notice_text, "Shawarma Shield!");
        assert!(st.active_powerups().next().is_none());
    }

    #[test]
    fn energy_drink_doubles_score_for_a_while() {
        let mut st = running(43, quiet_tuning());
        place_powerup(&mut st, PowerUpKind::EnergyDrink, 1);
        st.tick(TICK_MS);
        let before = st.score;
        run_ticks(&mut st, 10);
        assert_eq!(st.score - before, 20.0);

        st.effects.score_boost.cancel();
        let before = st.score;
        run_ticks(&mut st, 10);
        assert_eq!(st.score - before, 10.0);
    }

    #[test]
    fn speed_boost_multiplies_and_expires() {
        let mut st = running(47, empty_road());
        let normal = st.current_speed();
        place_powerup(&mut st, PowerUpKind::SpeedBoost5x, 1);
        st.tick(TICK_MS);
        assert!((st.current_speed() - normal * 5.0).abs() < 1e-5);

        let ticks = (st.tuning.speed_boost_ms / TICK_MS) as usize + 2;
        run_ticks(&mut st, ticks);
        assert!((st.current_speed() - normal).abs() < 1e-5);
    }

    #[test]
    fn sachet_water_protects_and_surges() {
        let mut st = running(53, quiet_tuning());
        place_powerup(&mut st, PowerUpKind::SachetWater, 1);
        st.tick(TICK_MS);
        assert!(st.effects.invincible.active());
        assert!(st.current_speed() >= st.tuning.base_speed * 2.0);
        place(&mut st, ObstacleKind::Danfo, 1, 0.0);
        st.tick(TICK_MS);
        assert_eq!(st.phase, Phase::Running);
    }

    #[test]
    fn restart_resets_the_run() {
        let mut st = running(59, quiet_tuning());
        st.apply(PlayerAction::MoveLeft);
        run_ticks(&mut st, 20);
        st.level = 4;
        st.effects.score_boost.start(st.tuning.score_boost_ms);
        st.effects.speed_factor = 5.0;
        st.effects.speed_boost.start(st.tuning.speed_boost_ms);
        place(&mut st, ObstacleKind::Danfo, 0, 0.0);
        run_ticks(&mut st, 40);
        assert_eq!(st.phase, Phase::GameOver);

        // effects freeze while falling, so they are still armed here
        st.shields = 2;
        st.effects.invincible.start(st.tuning.invincibility_ms);
        assert_eq!(st.score_multiplier(), 2.0);
        assert_eq!(st.speed_multiplier(), 5.0);

        st.apply(PlayerAction::Restart);
        assert_eq!(st.shields, 0);
        assert_eq!(st.score_multiplier(), 1.0);
        assert_eq!(st.speed_multiplier(), 1.0);
        assert!(!st.effects.invincible.active());
        assert_eq!(st.phase, Phase::Running);
        assert_eq!(st.score, 0.0);
        assert_eq!(st.level, 1);
        assert_eq!(st.player.lane, 1);
        assert_eq!(st.player.pos.x, 0.0);
        assert_eq!(st.player.tilt, 0.0);
        assert_eq!(st.final_score, 0);
        assert_eq!(st.active_obstacles().count(), 1);
    }

    #[test]
    fn restart_only_from_game_over() {
        let mut st = running(61, quiet_tuning());
        run_ticks(&mut st, 5);
        st.apply(PlayerAction::Restart);
        assert_eq!(st.display_score(), 5);
    }

    #[test]
    fn scenery_recycles_behind_camera() {
        let mut st = running(67, empty_road());
        run_ticks(&mut st, 2000);
        assert_eq!(st.phase, Phase::Running);
        assert!(st.buildings.iter().all(|b| b.z <= CAMERA_Z));
        let len = st.tuning.road_length;
        assert!(st.road_offsets.iter().all(|&z| z <= len / 2.0));
    }

    fn action_strategy() -> impl Strategy<Value = PlayerAction> {
        prop_oneof![
            Just(PlayerAction::MoveLeft),
            Just(PlayerAction::MoveRight),
            Just(PlayerAction::Jump),
            Just(PlayerAction::HighJump),
            Just(PlayerAction::Slide),
            Just(PlayerAction::TogglePause),
        ]
    }

    proptest! {
        #[test]
        fn runner_invariants_hold(
            seed in any::<u64>(),
            script in prop::collection::vec((action_strategy(), 0usize..20), 1..40),
        ) {
            let mut st = GameState::new(seed, Tuning::default());
            st.apply(PlayerAction::Start);
            let pool = st.tuning.danfo_pool + st.tuning.truck_pool;
            let mut last_score = st.score;
            for (action, ticks) in script {
                st.apply(action);
                for _ in 0..ticks {
                    st.tick(TICK_MS);
                    prop_assert!(st.player.lane < LANE_COUNT);
                    prop_assert!(st.score >= last_score);
                    prop_assert!(st.active_obstacles().count() <= pool);
                    prop_assert!(st.player.pos.y >= st.tuning.ground_y - 2.0);
                    last_score = st.score;
                }
            }
        }
    }
}
