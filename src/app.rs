use crate::config::{load_settings, project_paths, save_settings_atomic, Cli, Paths, Settings};
use crate::events::GameEvent;
use crate::input::{collect_input_nonblocking, map_event, Command, TapTracker};
use crate::logging;
use crate::model::{GameState, TICK_MS};
use crate::render::{draw_frame, Hud, Terminal};
use crate::storage::{load_high_score, save_high_score_atomic, HighScore};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// a long stall (suspend, debugger) must not replay seconds of simulation
const MAX_CATCH_UP: Duration = Duration::from_millis(250);

pub(crate) struct App {
    stored: Settings,
    settings: Settings,
    paths: Paths,
    state: GameState,
    high: HighScore,
    new_record: bool,
    taps: TapTracker,
    term: Terminal,
    should_quit: bool,
}

impl App {
    fn init(cli: &Cli) -> anyhow::Result<Self> {
        let paths = project_paths()?;
        let stored = load_settings(&paths.settings_path);
        let settings = stored.merged(cli);
        logging::init(&paths.log_path, &settings.log_level)?;
        info!(dir = %paths.dir.display(), "danfo-dash starting");

        let high = if cli.reset_high_score {
            info!("high score reset requested");
            let fresh = HighScore::default();
            save_high_score_atomic(&paths.high_score_path, &fresh)?;
            fresh
        } else {
            load_high_score_or_default(&paths.high_score_path)
        };

        let seed = settings.resolve_seed();
        info!(seed, fps = settings.fps_cap, best = high.best, "new session");
        let state = GameState::new(seed, settings.tuning.clone());
        let taps = TapTracker::new(settings.tuning.double_tap_ms);

        let term = Terminal::begin()?;

        Ok(Self {
            stored,
            settings,
            paths,
            state,
            high,
            new_record: false,
            taps,
            term,
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let frame_dt = Duration::from_secs_f32(1.0 / self.settings.fps_cap as f32);
        let sim_step = Duration::from_secs_f32(TICK_MS / 1000.0);

        let mut last_frame = Instant::now();
        let mut sim_accum = Duration::ZERO;

        while !self.should_quit {
            let frame_start = Instant::now();
            self.term.resize_if_needed()?;

            for ev in collect_input_nonblocking(frame_dt)? {
                match map_event(self.state.phase, &ev, &mut self.taps) {
                    Some(Command::Quit) => {
                        self.should_quit = true;
                        break;
                    }
                    Some(Command::ToggleColor) => {
                        self.settings.enable_color = !self.settings.enable_color;
                        self.stored.enable_color = self.settings.enable_color;
                    }
                    Some(Command::Play(action)) => self.state.apply(action),
                    None => {}
                }
            }

            // fixed-step simulation
            let now = Instant::now();
            let real_dt = now.saturating_duration_since(last_frame);
            last_frame = now;
            sim_accum = sim_accum.saturating_add(real_dt).min(MAX_CATCH_UP);

            while sim_accum >= sim_step {
                self.state.tick(TICK_MS);
                sim_accum = sim_accum.saturating_sub(sim_step);
            }

            self.handle_events()?;

            let hud = Hud {
                high_score: self.high.best,
                new_record: self.new_record,
                color: self.settings.enable_color,
            };
            draw_frame(&mut self.term.cur, &self.state, &hud);
            self.term.present(true)?;

            spin_sleep(frame_dt, frame_start);
        }

        info!(best = self.high.best, "quitting");
        save_settings_atomic(&self.paths.settings_path, &self.stored)?;
        Ok(())
    }

    fn handle_events(&mut self) -> anyhow::Result<()> {
        for ev in self.state.drain_events() {
            if ev.is_milestone() {
                info!(event = ?ev, level = self.state.level, "game");
            } else {
                debug!(event = ?ev, "game");
            }
            match ev {
                GameEvent::Started => self.new_record = false,
                GameEvent::Crash(kind) => {
                    info!(obstacle = kind.label(), score = self.state.display_score(), "crashed");
                }
                GameEvent::GameOver { score } => {
                    self.new_record = self.high.record(score, chrono::Utc::now());
                    if self.new_record {
                        save_high_score_atomic(&self.paths.high_score_path, &self.high)?;
                        info!(score, "new high score saved");
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// A damaged high-score file should not stop the game from starting.
fn load_high_score_or_default(path: &Path) -> HighScore {
    load_high_score(path).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring unreadable high score");
        HighScore::default()
    })
}

pub(crate) fn run(cli: Cli) -> anyhow::Result<()> {
    let mut app = App::init(&cli)?;
    let res = app.run();
    // leave the alternate screen even when the loop failed
    let restored = app.term.end();
    if let Err(e) = &res {
        tracing::error!(error = %e, "game loop failed");
    }
    res.and(restored)
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn damaged_high_score_starts_from_zero() {
        let dir = std::env::temp_dir().join(format!("danfo-dash-app-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("highscore.json");

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_high_score_or_default(&path), HighScore::default());

        fs::write(&path, r#"{"version":1,"best":42,"achieved_utc":null}"#).unwrap();
        assert_eq!(load_high_score_or_default(&path).best, 42);
    }
}
