use core::fmt;

#[cfg(not(target_os = "none"))]
use std::thread;
#[cfg(not(target_os = "none"))]
use std::time::{Duration, Instant};

impl fmt::Display for Button {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Button::Increment => write!(f, "Increment"),
      Button::Decrement => write!(f, "Decrement"),
    }
  }
}

// Init-time knobs. Not reconfigurable at runtime.
pub const INITIAL_BLINK_FREQ: i32 = 2;
pub const FREQ_STEP: i32 = 5;
pub const FREQ_FLOOR: i32 = 1;
pub const SHORT_PRESS_MS: u64 = 1000;

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Button {
  Increment,
  Decrement,
}

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Level {
  High,
  Low,
}

/// Output and input pins of the board, however they are wired up.
pub trait Gpio {
  fn set_led(&mut self);
  fn clear_led(&mut self);
  fn read_button(&mut self, b: Button) -> Level;
}

/// Monotonic time source and cooperative sleep.
pub trait Clock {
  fn now_ms(&self) -> u64;
  fn delay_ms(&self, ms: u64);
}

/// Last observed level and press-start timestamp for one button.
pub struct EdgeTracker {
  pub last_level: Level,
  pub press_started_ms: u64,
}

impl EdgeTracker {
  pub const fn new() -> Self {
    EdgeTracker {
      // Pull-up rest state: released buttons read high.
      last_level: Level::High,
      press_started_ms: 0,
    }
  }

  /// Feed one sample. Returns how long the button was held when a release
  /// edge is observed; any other sample returns None.
  pub fn observe(&mut self, curr: Level, now_ms: u64) -> Option<u64> {
    if curr == self.last_level {
      return None;
    }

    let mut released_after = None;
    if curr == Level::Low {
      self.press_started_ms = now_ms;
    } else {
      released_after = Some(now_ms - self.press_started_ms);
    }

    self.last_level = curr;
    released_after
  }
}

// For running the loop on a plain OS target without real pins:
pub struct HasOSGpio;

impl Gpio for HasOSGpio {
  fn set_led(&mut self) {}
  fn clear_led(&mut self) {}
  fn read_button(&mut self, _: Button) -> Level {
    Level::High
  }
}

#[cfg(not(target_os = "none"))]
pub struct HasOSClock {
  started: Instant,
}

#[cfg(not(target_os = "none"))]
impl HasOSClock {
  pub fn new() -> Self {
    HasOSClock {
      started: Instant::now(),
    }
  }
}

#[cfg(not(target_os = "none"))]
impl Clock for HasOSClock {
  fn now_ms(&self) -> u64 {
    self.started.elapsed().as_millis() as u64
  }

  fn delay_ms(&self, ms: u64) {
    thread::sleep(Duration::from_millis(ms));
  }
}
