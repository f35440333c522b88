//! A switch pin for host tests. Clones share one level.

extern crate std;

use core::cell::Cell;
use std::rc::Rc;

use embedded_hal::digital::{Error, ErrorKind, ErrorType, InputPin};

#[derive(Debug)]
pub struct TestError;

impl Error for TestError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Pulled up: reads high until [`Switch::down`].
#[derive(Clone, Default)]
pub struct Switch(Rc<Cell<bool>>);

impl Switch {
    pub fn down(&self) {
        self.0.set(true);
    }

    pub fn up(&self) {
        self.0.set(false);
    }
}

impl ErrorType for Switch {
    type Error = TestError;
}

impl InputPin for Switch {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.get())
    }
}
