use blink_core::structs::{Button, Gpio, Level};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Pin levels of the simulated board. true = electrically high.
pub struct SimBoard {
  pub led: AtomicBool,
  pub inc: AtomicBool,
  pub dec: AtomicBool,
}

impl SimBoard {
  pub fn new() -> Arc<Self> {
    Arc::new(SimBoard {
      led: AtomicBool::new(false),
      // Pull-up rest state
      inc: AtomicBool::new(true),
      dec: AtomicBool::new(true),
    })
  }

  pub fn press(&self, b: Button) {
    self.button(b).store(false, Ordering::Relaxed);
  }

  pub fn release(&self, b: Button) {
    self.button(b).store(true, Ordering::Relaxed);
  }

  pub fn led_lit(&self) -> bool {
    self.led.load(Ordering::Relaxed)
  }

  fn button(&self, b: Button) -> &AtomicBool {
    match b {
      Button::Increment => &self.inc,
      Button::Decrement => &self.dec,
    }
  }
}

/// The handle the polling loop owns; levels are shared with the UI thread.
pub struct SimGpio(pub Arc<SimBoard>);

impl Gpio for SimGpio {
  fn set_led(&mut self) {
    self.0.led.store(true, Ordering::Relaxed);
  }

  fn clear_led(&mut self) {
    self.0.led.store(false, Ordering::Relaxed);
  }

  fn read_button(&mut self, b: Button) -> Level {
    if self.0.button(b).load(Ordering::Relaxed) {
      Level::High
    } else {
      Level::Low
    }
  }
}
