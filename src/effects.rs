//! Timed effects measured in simulation time.

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Countdown {
    remaining_ms: f32,
}

impl Countdown {
    /// (Re)arms the countdown; a running one is restarted, not extended.
    pub(crate) fn start(&mut self, ms: f32) {
        self.remaining_ms = ms.max(0.0);
    }

    pub(crate) fn cancel(&mut self) {
        self.remaining_ms = 0.0;
    }

    pub(crate) fn active(&self) -> bool {
        self.remaining_ms > 0.0
    }

    pub(crate) fn remaining_ms(&self) -> f32 {
        self.remaining_ms
    }

    /// Returns true on the tick the countdown reaches zero.
    pub(crate) fn tick(&mut self, dt_ms: f32) -> bool {
        if !self.active() {
            return false;
        }
        self.remaining_ms = (self.remaining_ms - dt_ms).max(0.0);
        !self.active()
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Effects {
    pub(crate) invincible: Countdown,
    pub(crate) glide: Countdown,
    pub(crate) slide: Countdown,
    pub(crate) score_boost: Countdown,
    pub(crate) speed_boost: Countdown,
    pub(crate) speed_factor: f32,
    pub(crate) surge: Countdown,
    pub(crate) notice: Countdown,
    pub(crate) notice_text: &'static str,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            invincible: Countdown::default(),
            glide: Countdown::default(),
            slide: Countdown::default(),
            score_boost: Countdown::default(),
            speed_boost: Countdown::default(),
            speed_factor: 1.0,
            surge: Countdown::default(),
            notice: Countdown::default(),
            notice_text: "",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Expired {
    pub(crate) glide: bool,
    pub(crate) slide: bool,
    pub(crate) speed_boost: bool,
}

impl Effects {
    pub(crate) fn tick(&mut self, dt_ms: f32) -> Expired {
        self.invincible.tick(dt_ms);
        self.score_boost.tick(dt_ms);
        self.surge.tick(dt_ms);
        self.notice.tick(dt_ms);
        let expired = Expired {
            glide: self.glide.tick(dt_ms),
            slide: self.slide.tick(dt_ms),
            speed_boost: self.speed_boost.tick(dt_ms),
        };
        if expired.speed_boost {
            self.speed_factor = 1.0;
        }
        expired
    }

    pub(crate) fn notify(&mut self, text: &'static str, ms: f32) {
        self.notice_text = text;
        self.notice.start(ms);
    }

    /// Player sprite is hidden on alternating 100ms slices while invincible.
    pub(crate) fn blink_hidden(&self) -> bool {
        self.invincible.active() && ((self.invincible.remaining_ms() / 100.0) as u32) % 2 == 1
    }
}
