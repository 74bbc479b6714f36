use crate::model::Phase;
use crate::sim::PlayerAction;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub(crate) struct InputEvent {
    pub(crate) key: KeyCode,
    pub(crate) mods: KeyModifiers,
    pub(crate) at: Instant,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Command {
    Play(PlayerAction),
    ToggleColor,
    Quit,
}

pub(crate) fn collect_input_nonblocking(max_frame_time: Duration) -> anyhow::Result<Vec<InputEvent>> {
    let mut out = Vec::new();

    let timeout = std::cmp::min(Duration::from_millis(1), max_frame_time);
    while event::poll(timeout)? {
        if let Event::Key(k) = event::read()? {
            // held keys would re-trigger jumps, so repeats are dropped
            if k.kind == KeyEventKind::Press {
                out.push(InputEvent {
                    key: k.code,
                    mods: k.modifiers,
                    at: Instant::now(),
                });
                if out.len() >= 32 {
                    break;
                }
            }
        }
    }
    Ok(out)
}

/// Turns a quick second jump press into a high jump.
#[derive(Clone, Debug)]
pub(crate) struct TapTracker {
    window: Duration,
    last_jump: Option<Instant>,
}

impl TapTracker {
    pub(crate) fn new(window_ms: u64) -> Self {
        Self {
            window: Duration::from_millis(window_ms),
            last_jump: None,
        }
    }

    pub(crate) fn jump_at(&mut self, at: Instant) -> PlayerAction {
        if let Some(prev) = self.last_jump {
            let gap = at.saturating_duration_since(prev);
            if gap > Duration::ZERO && gap < self.window {
                self.last_jump = None;
                return PlayerAction::HighJump;
            }
        }
        self.last_jump = Some(at);
        PlayerAction::Jump
    }
}

pub(crate) fn map_event(phase: Phase, ev: &InputEvent, taps: &mut TapTracker) -> Option<Command> {
    if ev.mods.contains(KeyModifiers::CONTROL) && matches!(ev.key, KeyCode::Char('c')) {
        return Some(Command::Quit);
    }
    match ev.key {
        KeyCode::Char('q') | KeyCode::Char('Q') => return Some(Command::Quit),
        KeyCode::Char('c') | KeyCode::Char('C') => return Some(Command::ToggleColor),
        _ => {}
    }

    let action = match phase {
        Phase::Title => match ev.key {
            KeyCode::Enter | KeyCode::Char(' ') => Some(PlayerAction::Start),
            _ => None,
        },
        Phase::Running => match ev.key {
            KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('A') => Some(PlayerAction::MoveLeft),
            KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('D') => {
                Some(PlayerAction::MoveRight)
            }
            KeyCode::Up | KeyCode::Char(' ') | KeyCode::Char('w') | KeyCode::Char('W') => {
                Some(taps.jump_at(ev.at))
            }
            KeyCode::Char('e') | KeyCode::Char('E') => Some(PlayerAction::HighJump),
            KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('S') => Some(PlayerAction::Slide),
            KeyCode::Esc | KeyCode::Char('p') | KeyCode::Char('P') => {
                Some(PlayerAction::TogglePause)
            }
            _ => None,
        },
        Phase::Paused => match ev.key {
            KeyCode::Esc | KeyCode::Char('p') | KeyCode::Char('P') | KeyCode::Char(' ') => {
                Some(PlayerAction::TogglePause)
            }
            _ => None,
        },
        Phase::Falling => None,
        Phase::GameOver => match ev.key {
            KeyCode::Enter | KeyCode::Char('r') | KeyCode::Char('R') => {
                Some(PlayerAction::Restart)
            }
            _ => None,
        },
    };
    action.map(Command::Play)
}
