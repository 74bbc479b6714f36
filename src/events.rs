use crate::model::{ObstacleKind, PowerUpKind};

/// Things that happened during a step. The app logs them and reacts to
/// `GameOver`; they are the hook a sound layer would listen on.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum GameEvent {
    Started,
    LaneSwitch { lane: usize },
    Jump { high: bool },
    Slide,
    Landed { on: ObstacleKind },
    PowerUp(PowerUpKind),
    ShieldHit { left: u32 },
    Smashed(ObstacleKind),
    Crash(ObstacleKind),
    LevelUp(u32),
    GameOver { score: u64 },
    Paused,
    Resumed,
}

impl GameEvent {
    /// Events worth an info line rather than debug noise.
    pub(crate) fn is_milestone(&self) -> bool {
        matches!(
            self,
            GameEvent::Started
                | GameEvent::LevelUp(_)
                | GameEvent::Crash(_)
                | GameEvent::GameOver { .. }
        )
    }
}
