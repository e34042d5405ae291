mod gpio;

use blink_core::controller;
use gpio::{GpioMem, GPIO_BTN_DEC, GPIO_BTN_INC};
use std::error::Error;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

static STOP: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sigint(_sig: libc::c_int) {
  STOP.store(true, Ordering::Relaxed);
}

fn main() {
  if let Err(e) = run() {
    eprintln!("rpi-fw: {}", e);
    process::exit(1);
  }
}

fn run() -> Result<(), Box<dyn Error>> {
  println!("rpi-fw: loading...");

  let mut board = GpioMem::map()?;
  board.configure();

  unsafe {
    libc::signal(libc::SIGINT, on_sigint as libc::sighandler_t);
  }

  let mut controller = controller::start(board)?;
  println!(
    "rpi-fw: loaded. Press buttons on GPIO{}/{}; Ctrl-C to exit.",
    GPIO_BTN_INC, GPIO_BTN_DEC
  );

  while !STOP.load(Ordering::Relaxed) {
    while let Ok(line) = controller.messages.try_recv() {
      println!("{}", line);
    }
    thread::sleep(Duration::from_millis(50));
  }

  controller.stop();
  while let Ok(line) = controller.messages.try_recv() {
    println!("{}", line);
  }

  println!("rpi-fw: unloaded.");
  Ok(())
}
