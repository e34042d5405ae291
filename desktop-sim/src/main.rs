mod board;

use blink_core::controller;
use blink_core::structs::Button;
use board::{SimBoard, SimGpio};
use std::io::{self, Write};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};
use termion::input::TermRead;
use termion::raw::IntoRawMode;
use termion::{clear, cursor};

const SHORT_PRESS: Duration = Duration::from_millis(200);
const LONG_PRESS: Duration = Duration::from_millis(1200);

fn main() {
  let board = SimBoard::new();
  let mut controller = match controller::start(SimGpio(board.clone())) {
    Ok(c) => c,
    Err(e) => {
      eprintln!("desktop-sim: {}", e);
      return;
    }
  };

  let mut stdout = io::stdout().into_raw_mode().unwrap();

  // Channel to send key presses from thread to main loop
  let (tx, rx) = mpsc::channel();

  // Thread to capture keyboard input
  thread::spawn(move || {
    let stdin = io::stdin();
    for key in stdin.keys() {
      if let Ok(k) = key {
        tx.send(k).ok();
      }
    }
  });

  let clear_all = |stdout: &mut dyn Write| {
    write!(stdout, "{}{}", clear::All, cursor::Goto(1, 1)).unwrap();
    writeln!(stdout, "=== Two-Button Blink Sim ===\r").unwrap();
    writeln!(stdout, "Controls:\r").unwrap();
    writeln!(stdout, "  i - Short press on the increment button\r").unwrap();
    writeln!(stdout, "  I - Long press on the increment button (no effect)\r").unwrap();
    writeln!(stdout, "  d - Short press on the decrement button\r").unwrap();
    writeln!(stdout, "  D - Long press on the decrement button (no effect)\r").unwrap();
    writeln!(stdout, "  l - Clear messages\r").unwrap();
    writeln!(stdout, "  q - Quit\r").unwrap();
    writeln!(stdout, "\r").unwrap();
    writeln!(stdout, "LED:\r").unwrap();
    writeln!(stdout, "\r").unwrap();
    writeln!(stdout, "=== Messages ===\r").unwrap();
    stdout.flush().unwrap();
  };

  clear_all(&mut stdout);

  let led_line = 10;
  let message_start_line = 13;
  let mut message_lines: Vec<String> = Vec::new();
  let max_messages = 40;

  // Pending release deadline per button.
  let mut releases: [Option<(Button, Instant)>; 2] = [None, None];
  let mut last_led = None;

  loop {
    if let Ok(key) = rx.try_recv() {
      use termion::event::Key;

      match key {
        Key::Char('i') => {
          push_button(&board, Button::Increment, SHORT_PRESS, &mut releases[0]);
        }
        Key::Char('I') => {
          push_button(&board, Button::Increment, LONG_PRESS, &mut releases[0]);
        }
        Key::Char('d') => {
          push_button(&board, Button::Decrement, SHORT_PRESS, &mut releases[1]);
        }
        Key::Char('D') => {
          push_button(&board, Button::Decrement, LONG_PRESS, &mut releases[1]);
        }
        Key::Char('l') | Key::Char('L') => {
          message_lines.clear();
          clear_all(&mut stdout);
          last_led = None;
        }
        Key::Char('q') | Key::Char('Q') => {
          write!(stdout, "{}{}", clear::All, cursor::Goto(1, 1)).unwrap();
          writeln!(stdout, "Quitting...\r").unwrap();
          stdout.flush().unwrap();
          break;
        }
        _ => {}
      }
    }

    // Release any button whose hold time has elapsed.
    for slot in releases.iter_mut() {
      if let Some((button, deadline)) = *slot {
        if Instant::now() >= deadline {
          board.release(button);
          *slot = None;
        }
      }
    }

    let lit = board.led_lit();
    if last_led != Some(lit) {
      let marker = if lit { "(*) on" } else { "( ) off" };
      write!(
        stdout,
        "{}{}LED: {}",
        cursor::Goto(1, led_line),
        clear::CurrentLine,
        marker
      )
      .unwrap();
      last_led = Some(lit);
    }

    let mut has_new_messages = false;

    while let Ok(msg) = controller.messages.try_recv() {
      message_lines.push(msg.to_string());
      has_new_messages = true;

      if message_lines.len() > max_messages {
        message_lines.remove(0);
      }
    }

    if has_new_messages {
      // Redraw message area
      for (i, line) in message_lines.iter().enumerate() {
        write!(
          stdout,
          "{}{}{}",
          cursor::Goto(1, message_start_line + i as u16),
          clear::CurrentLine,
          line
        )
        .unwrap();
        writeln!(stdout, "\r").unwrap();
      }
    }

    stdout.flush().unwrap();

    thread::sleep(Duration::from_millis(50));
  }

  controller.stop();
}

fn push_button(board: &SimBoard, button: Button, hold: Duration, slot: &mut Option<(Button, Instant)>) {
  board.press(button);
  *slot = Some((button, Instant::now() + hold));
}
