// Lifecycle around the polling loop: a dedicated worker thread owns the
// Blinker, and a one-shot stop flag is the only state written from outside
// it. Stopping blocks until the worker has returned, so the gpio port (and
// any hardware mapping inside it) is released strictly after the last
// register access.
use crate::message_log::LogLine;
use crate::structs::{Clock, Gpio, HasOSClock};
use crate::Blinker;
use core::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug)]
pub enum StartError {
  Spawn(io::Error),
}

impl fmt::Display for StartError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      StartError::Spawn(e) => write!(f, "failed to spawn polling thread: {}", e),
    }
  }
}

impl std::error::Error for StartError {}

pub struct Controller {
  stop: Arc<AtomicBool>,
  handle: Option<JoinHandle<()>>,
  pub messages: Receiver<LogLine>,
}

/// Launch the polling loop on its own thread. The gpio port moves into the
/// loop and is dropped only after the loop exits.
pub fn start<G>(gpio: G) -> Result<Controller, StartError>
where
  G: Gpio + Send + 'static,
{
  let stop = Arc::new(AtomicBool::new(false));
  let flag = Arc::clone(&stop);
  let (tx, rx) = mpsc::channel();

  let handle = thread::Builder::new()
    .name("blink-poll".to_string())
    .spawn(move || poll_thread(gpio, flag, tx))
    .map_err(StartError::Spawn)?;

  Ok(Controller {
    stop,
    handle: Some(handle),
    messages: rx,
  })
}

fn poll_thread<G: Gpio>(gpio: G, stop: Arc<AtomicBool>, tx: Sender<LogLine>) {
  let mut blinker = Blinker::new(gpio, HasOSClock::new());
  crate::log_line!(blinker.messages, "Polling loop started (freq={})", blinker.freq);

  while !stop.load(Ordering::Relaxed) && blinker.running {
    let delay = blinker.poll_once();
    drain(&mut blinker, &tx);
    blinker.clock.delay_ms(delay);
  }

  blinker.shutdown();
  drain(&mut blinker, &tx);
}

fn drain<G: Gpio, C: Clock>(blinker: &mut Blinker<G, C>, tx: &Sender<LogLine>) {
  while let Some(line) = blinker.messages.pop() {
    // The receiver may already be gone during teardown.
    let _ = tx.send(line);
  }
}

impl Controller {
  /// Ask the loop to exit and block until it has. Idempotent.
  pub fn stop(&mut self) {
    self.stop.store(true, Ordering::Relaxed);
    if let Some(handle) = self.handle.take() {
      let _ = handle.join();
    }
  }
}

impl Drop for Controller {
  fn drop(&mut self) {
    self.stop();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::structs::{Button, Level};
  use std::time::Duration;

  struct SharedLed(Arc<AtomicBool>);

  impl Gpio for SharedLed {
    fn set_led(&mut self) {
      self.0.store(true, Ordering::Relaxed);
    }

    fn clear_led(&mut self) {
      self.0.store(false, Ordering::Relaxed);
    }

    fn read_button(&mut self, _: Button) -> Level {
      Level::High
    }
  }

  #[test]
  fn startup_message_reports_initial_frequency() {
    let led = Arc::new(AtomicBool::new(false));
    let mut controller = start(SharedLed(Arc::clone(&led))).unwrap();

    let first = controller
      .messages
      .recv_timeout(Duration::from_secs(5))
      .unwrap();
    assert_eq!(first.get_str(), "Polling loop started (freq=2)");

    controller.stop();
  }

  #[test]
  fn stop_joins_and_leaves_led_off() {
    let led = Arc::new(AtomicBool::new(false));
    let mut controller = start(SharedLed(Arc::clone(&led))).unwrap();

    // Let it run at least one iteration (the first toggle lights the LED).
    thread::sleep(Duration::from_millis(20));
    controller.stop();

    assert!(controller.handle.is_none());
    assert!(!led.load(Ordering::Relaxed));

    // The shutdown line is the last thing the worker sends.
    let mut last = None;
    while let Ok(line) = controller.messages.try_recv() {
      last = Some(line);
    }
    assert_eq!(last.unwrap().get_str(), "Polling loop stopped");

    // Second stop is a no-op.
    controller.stop();
  }
}
