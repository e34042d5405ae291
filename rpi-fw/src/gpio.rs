// Userspace mapping of the BCM283x GPIO register block through /dev/gpiomem.
// The kernel exposes the block at file offset 0 whatever the SoC's physical
// base address is (0x3F200000 on a Pi 3, 0xFE200000 on a Pi 4), so no
// per-model address is needed here.
use blink_core::structs::{Button, Gpio, Level};
use core::ptr::{read_volatile, write_volatile};
use std::io;
use std::thread;
use std::time::Duration;

// Wiring: LED on GPIO18, buttons on GPIO23 (up) and GPIO24 (down).
pub const GPIO_LED: u32 = 18;
pub const GPIO_BTN_INC: u32 = 23;
pub const GPIO_BTN_DEC: u32 = 24;

// Register offsets within the GPIO block, in bytes. GPFSEL0 sits at 0x00
// with one 32-bit register per ten pins.
const GPSET0: usize = 0x1C;
const GPCLR0: usize = 0x28;
const GPLEV0: usize = 0x34;
const GPPUD: usize = 0x94;
const GPPUDCLK0: usize = 0x98;

const FSEL_INPUT: u32 = 0b000;
const FSEL_OUTPUT: u32 = 0b001;

const PUD_OFF: u32 = 0x0;
const PUD_UP: u32 = 0x2;

// One page covers the whole 0xB4-byte block.
const MAP_LEN: usize = 4096;

pub struct GpioMem {
  base: *mut u8,
  fd: libc::c_int,
}

// Once the loop starts, the polling thread is the mapping's only user, and
// individual register reads and writes are atomic at the hardware level.
unsafe impl Send for GpioMem {}

impl GpioMem {
  /// Open and map the GPIO block. Fails if the device node is missing or
  /// the mapping is refused; nothing is left open on failure.
  pub fn map() -> io::Result<Self> {
    let fd = unsafe {
      libc::open(
        b"/dev/gpiomem\0".as_ptr() as *const libc::c_char,
        libc::O_RDWR | libc::O_SYNC,
      )
    };
    if fd < 0 {
      return Err(io::Error::last_os_error());
    }

    let base = unsafe {
      libc::mmap(
        core::ptr::null_mut(),
        MAP_LEN,
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_SHARED,
        fd,
        0,
      )
    };
    if base == libc::MAP_FAILED {
      let err = io::Error::last_os_error();
      unsafe { libc::close(fd) };
      return Err(err);
    }

    Ok(GpioMem {
      base: base as *mut u8,
      fd,
    })
  }

  /// One-time pin setup: LED as output, buttons as pulled-up inputs.
  pub fn configure(&mut self) {
    self.set_function(GPIO_LED, FSEL_OUTPUT);
    self.set_function(GPIO_BTN_INC, FSEL_INPUT);
    self.set_function(GPIO_BTN_DEC, FSEL_INPUT);
    self.enable_pull_ups((1 << GPIO_BTN_INC) | (1 << GPIO_BTN_DEC));
  }

  fn read_reg(&self, offset: usize) -> u32 {
    unsafe { read_volatile(self.base.add(offset) as *const u32) }
  }

  fn write_reg(&mut self, offset: usize, val: u32) {
    unsafe { write_volatile(self.base.add(offset) as *mut u32, val) }
  }

  /// Program the 3-bit function-select field for one pin.
  fn set_function(&mut self, pin: u32, bits: u32) {
    let offset = (pin as usize / 10) * 4;
    let shift = (pin % 10) * 3;

    let mut val = self.read_reg(offset);
    val &= !(0x7 << shift);
    val |= bits << shift;
    self.write_reg(offset, val);
  }

  /// Latch the internal pull-up onto the given pins, then clear the
  /// control registers again as the GPPUD sequence requires.
  fn enable_pull_ups(&mut self, pins: u32) {
    self.write_reg(GPPUD, PUD_UP);
    settle();
    self.write_reg(GPPUDCLK0, pins);
    settle();
    self.write_reg(GPPUD, PUD_OFF);
    self.write_reg(GPPUDCLK0, 0);
  }

  fn set_pin(&mut self, pin: u32) {
    self.write_reg(GPSET0, 1 << pin);
  }

  fn clear_pin(&mut self, pin: u32) {
    self.write_reg(GPCLR0, 1 << pin);
  }

  fn read_pin(&self, pin: u32) -> Level {
    if self.read_reg(GPLEV0) & (1 << pin) != 0 {
      Level::High
    } else {
      Level::Low
    }
  }
}

// The datasheet asks for a 150-cycle hold around the pull-up clock pulse.
fn settle() {
  thread::sleep(Duration::from_micros(5));
}

impl Gpio for GpioMem {
  fn set_led(&mut self) {
    self.set_pin(GPIO_LED);
  }

  fn clear_led(&mut self) {
    self.clear_pin(GPIO_LED);
  }

  fn read_button(&mut self, b: Button) -> Level {
    match b {
      Button::Increment => self.read_pin(GPIO_BTN_INC),
      Button::Decrement => self.read_pin(GPIO_BTN_DEC),
    }
  }
}

impl Drop for GpioMem {
  fn drop(&mut self) {
    unsafe {
      libc::munmap(self.base as *mut libc::c_void, MAP_LEN);
      libc::close(self.fd);
    }
  }
}
