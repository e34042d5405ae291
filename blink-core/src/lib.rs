#![cfg_attr(target_os = "none", no_std)]

pub mod message_log;
pub mod structs;

#[cfg(not(target_os = "none"))]
pub mod controller;

use crate::message_log::MessageLog;
use crate::structs::{
  Button, Clock, EdgeTracker, Gpio, FREQ_FLOOR, FREQ_STEP, INITIAL_BLINK_FREQ, SHORT_PRESS_MS,
};

#[cfg(not(target_os = "none"))]
use crate::structs::{HasOSClock, HasOSGpio};

// All mutable loop state lives here; exactly one instance runs at a time and
// nothing outside the loop writes to it.
pub struct Blinker<G: Gpio, C: Clock> {
  pub freq: i32,
  pub led_on: bool,
  pub running: bool,
  pub inc: EdgeTracker,
  pub dec: EdgeTracker,
  pub gpio: G,
  pub clock: C,
  pub messages: MessageLog<32>,
}

#[cfg(not(target_os = "none"))]
impl Default for Blinker<HasOSGpio, HasOSClock> {
  fn default() -> Self {
    Blinker::new(HasOSGpio, HasOSClock::new())
  }
}

impl<G: Gpio, C: Clock> Blinker<G, C> {
  pub fn new(gpio: G, clock: C) -> Self {
    Blinker {
      freq: INITIAL_BLINK_FREQ,
      led_on: false,
      running: true,
      inc: EdgeTracker::new(),
      dec: EdgeTracker::new(),
      gpio,
      clock,
      messages: MessageLog::new(),
    }
  }

  // BUTTONS
  pub fn service_button(&mut self, which: Button) {
    let curr = self.gpio.read_button(which);
    let now = self.clock.now_ms();

    let tracker = match which {
      Button::Increment => &mut self.inc,
      Button::Decrement => &mut self.dec,
    };

    if let Some(held) = tracker.observe(curr, now) {
      // A hold of SHORT_PRESS_MS or longer is dropped without effect.
      if held < SHORT_PRESS_MS {
        self.apply_short_press(which);
      }
    }
  }

  fn apply_short_press(&mut self, which: Button) {
    match which {
      Button::Increment => {
        self.freq += FREQ_STEP;
      }
      Button::Decrement => {
        self.freq -= FREQ_STEP;
        if self.freq < FREQ_FLOOR {
          self.freq = FREQ_FLOOR;
        }
      }
    }

    crate::log_line!(self.messages, "{} button pressed: freq => {}", which, self.freq);
  }

  // LED
  pub fn toggle_led(&mut self) {
    if self.led_on {
      self.gpio.clear_led();
    } else {
      self.gpio.set_led();
    }
    self.led_on = !self.led_on;
  }

  /// Milliseconds the LED stays in one state at the current frequency.
  pub fn half_period_ms(&mut self) -> u64 {
    // Re-clamp so the division below can never fault.
    if self.freq < FREQ_FLOOR {
      self.freq = FREQ_FLOOR;
    }
    ((1000 / self.freq) / 2) as u64
  }

  /// One loop iteration: sample both buttons, toggle the LED once, and
  /// return how long to hold before the next iteration.
  pub fn poll_once(&mut self) -> u64 {
    self.service_button(Button::Increment);
    self.service_button(Button::Decrement);
    self.toggle_led();
    self.half_period_ms()
  }

  /// Cleanup on the loop's single exit path.
  pub fn shutdown(&mut self) {
    self.gpio.clear_led();
    self.led_on = false;
    self.running = false;
    crate::log_line!(self.messages, "Polling loop stopped");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::structs::Level;
  use core::cell::Cell;

  struct TestClock {
    now: Cell<u64>,
  }

  impl TestClock {
    fn new() -> Self {
      TestClock { now: Cell::new(0) }
    }
  }

  impl Clock for TestClock {
    fn now_ms(&self) -> u64 {
      self.now.get()
    }

    fn delay_ms(&self, _ms: u64) {}
  }

  #[derive(Copy, Clone, PartialEq, Debug)]
  enum LedCall {
    Set,
    Clear,
  }

  struct TestGpio {
    inc: Level,
    dec: Level,
    led_calls: Vec<LedCall>,
  }

  impl TestGpio {
    fn new() -> Self {
      TestGpio {
        inc: Level::High,
        dec: Level::High,
        led_calls: Vec::new(),
      }
    }
  }

  impl Gpio for TestGpio {
    fn set_led(&mut self) {
      self.led_calls.push(LedCall::Set);
    }

    fn clear_led(&mut self) {
      self.led_calls.push(LedCall::Clear);
    }

    fn read_button(&mut self, b: Button) -> Level {
      match b {
        Button::Increment => self.inc,
        Button::Decrement => self.dec,
      }
    }
  }

  fn test_blinker() -> Blinker<TestGpio, TestClock> {
    Blinker::new(TestGpio::new(), TestClock::new())
  }

  fn set_level(b: &mut Blinker<TestGpio, TestClock>, which: Button, level: Level) {
    match which {
      Button::Increment => b.gpio.inc = level,
      Button::Decrement => b.gpio.dec = level,
    }
  }

  /// Press at `at_ms`, release after `held_ms`, servicing the button once
  /// per transition the way the loop would.
  fn press(b: &mut Blinker<TestGpio, TestClock>, which: Button, at_ms: u64, held_ms: u64) {
    set_level(b, which, Level::Low);
    b.clock.now.set(at_ms);
    b.service_button(which);

    set_level(b, which, Level::High);
    b.clock.now.set(at_ms + held_ms);
    b.service_button(which);
  }

  #[test]
  fn initial_state_matches_rest_conditions() {
    let b = Blinker::<HasOSGpio, HasOSClock>::default();
    assert_eq!(b.freq, 2);
    assert!(!b.led_on);
    assert!(b.running);
    assert_eq!(b.inc.last_level, Level::High);
    assert_eq!(b.dec.last_level, Level::High);
  }

  #[test]
  fn tracker_mirrors_sampled_level() {
    let mut t = EdgeTracker::new();
    let samples = [
      (Level::High, 0),
      (Level::Low, 10),
      (Level::Low, 20),
      (Level::High, 30),
      (Level::Low, 40),
    ];
    for (level, at) in samples {
      t.observe(level, at);
      assert_eq!(t.last_level, level);
    }
  }

  #[test]
  fn tracker_reports_held_duration_on_release() {
    let mut t = EdgeTracker::new();
    assert_eq!(t.observe(Level::Low, 100), None);
    assert_eq!(t.observe(Level::High, 350), Some(250));
  }

  #[test]
  fn short_press_increments_frequency() {
    let mut b = test_blinker();
    press(&mut b, Button::Increment, 0, 200);
    assert_eq!(b.freq, 7);

    let msg = b.messages.pop().unwrap();
    assert_eq!(msg.get_str(), "Increment button pressed: freq => 7");
  }

  #[test]
  fn short_press_decrement_clamps_at_floor() {
    let mut b = test_blinker();
    press(&mut b, Button::Decrement, 0, 100);
    assert_eq!(b.freq, 1); // would be -3

    press(&mut b, Button::Decrement, 500, 100);
    assert_eq!(b.freq, 1);
  }

  #[test]
  fn increment_has_no_ceiling() {
    let mut b = test_blinker();
    for i in 0u64..10 {
      press(&mut b, Button::Increment, i * 1000, 50);
    }
    assert_eq!(b.freq, 52);
  }

  #[test]
  fn long_press_is_ignored() {
    let mut b = test_blinker();
    press(&mut b, Button::Increment, 0, 1500);
    assert_eq!(b.freq, 2);
    assert!(b.messages.is_empty());
  }

  #[test]
  fn one_second_hold_is_ignored() {
    let mut b = test_blinker();
    press(&mut b, Button::Increment, 0, 1000);
    assert_eq!(b.freq, 2);
  }

  #[test]
  fn held_button_does_not_retrigger() {
    let mut b = test_blinker();
    set_level(&mut b, Button::Increment, Level::Low);

    for at in [50, 100, 200] {
      b.clock.now.set(at);
      b.service_button(Button::Increment);
    }
    assert_eq!(b.freq, 2);
    assert_eq!(b.inc.press_started_ms, 50);

    // Held duration counts from the first low sample.
    set_level(&mut b, Button::Increment, Level::High);
    b.clock.now.set(350);
    b.service_button(Button::Increment);
    assert_eq!(b.freq, 7);
  }

  #[test]
  fn buttons_are_tracked_independently() {
    let mut b = test_blinker();

    // Press both; release the decrement button first.
    set_level(&mut b, Button::Increment, Level::Low);
    set_level(&mut b, Button::Decrement, Level::Low);
    b.clock.now.set(0);
    b.service_button(Button::Increment);
    b.service_button(Button::Decrement);

    set_level(&mut b, Button::Decrement, Level::High);
    b.clock.now.set(100);
    b.service_button(Button::Decrement);
    assert_eq!(b.freq, 1);

    set_level(&mut b, Button::Increment, Level::High);
    b.clock.now.set(400);
    b.service_button(Button::Increment);
    assert_eq!(b.freq, 6);
  }

  #[test]
  fn half_period_follows_frequency() {
    let mut b = test_blinker();
    assert_eq!(b.half_period_ms(), 250); // freq 2

    b.freq = 7;
    assert_eq!(b.half_period_ms(), 71);

    b.freq = 1;
    assert_eq!(b.half_period_ms(), 500);
  }

  #[test]
  fn half_period_reclamps_invalid_frequency() {
    let mut b = test_blinker();

    b.freq = 0;
    assert_eq!(b.half_period_ms(), 500);
    assert_eq!(b.freq, 1);

    b.freq = -3;
    assert_eq!(b.half_period_ms(), 500);
    assert_eq!(b.freq, 1);
  }

  #[test]
  fn led_strictly_alternates() {
    let mut b = test_blinker();
    for _ in 0..4 {
      b.poll_once();
    }
    assert_eq!(
      b.gpio.led_calls,
      [LedCall::Set, LedCall::Clear, LedCall::Set, LedCall::Clear]
    );
    assert!(!b.led_on);
  }

  #[test]
  fn frequency_change_applies_to_the_same_iteration() {
    let mut b = test_blinker();

    set_level(&mut b, Button::Increment, Level::Low);
    b.clock.now.set(0);
    assert_eq!(b.poll_once(), 250);

    // The release is picked up by this iteration, so its delay already
    // reflects the new frequency.
    set_level(&mut b, Button::Increment, Level::High);
    b.clock.now.set(200);
    assert_eq!(b.poll_once(), 71);
    assert_eq!(b.freq, 7);
  }

  #[test]
  fn shutdown_forces_led_off() {
    let mut b = test_blinker();
    b.toggle_led();
    assert!(b.led_on);

    b.shutdown();
    assert!(!b.led_on);
    assert!(!b.running);
    assert_eq!(b.gpio.led_calls.last(), Some(&LedCall::Clear));
    assert_eq!(b.messages.pop().unwrap().get_str(), "Polling loop stopped");
  }
}
