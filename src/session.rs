use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::config::FullScale;
use crate::driver::{Driver, DriverError, SampleFrame};

/// Owns the started device and guarantees teardown on every exit path.
pub struct Session<D: Driver> {
    driver: D,
    released: bool,
}

impl<D: Driver> Session<D> {
    /// Starts the device. A failure here is fatal.
    pub fn acquire(mut driver: D) -> Result<Session<D>, DriverError> {
        driver.start()?;
        Ok(Session {
            driver,
            released: false,
        })
    }

    pub fn check_connected(&mut self) -> Result<bool, DriverError> {
        self.driver.is_connected()
    }

    /// Programs the per-channel gain codes. Failures are reported and the
    /// run proceeds with whatever gain was actually applied.
    pub fn apply_gains(&mut self, scales: &[FullScale; 4]) {
        let _ = self.driver.led_on();
        thread::sleep(Duration::from_secs(1));
        for (i, scale) in scales.iter().enumerate() {
            let channel = (i + 1) as u8;
            if let Err(err) = self.driver.set_gain(channel, scale.gain_code()) {
                warn!("failed to set gain on channel {}: {}", channel, err);
            }
        }
        let _ = self.driver.led_off();
    }

    /// Reads one sample frame. A failed read is logged and the frame is
    /// used as returned.
    pub fn poll(&mut self, frame: &mut SampleFrame) {
        let _ = self.driver.led_on();
        if let Err(err) = self.driver.read_frame(frame) {
            debug!("frame read reported failure: {}", err);
        }
        let _ = self.driver.led_off();
    }

    /// Stops the device. Safe to call from both the normal-exit and the
    /// interrupt path; only the first call reaches the driver.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let _ = self.driver.led_off();
        if let Err(err) = self.driver.stop() {
            warn!("failed to stop device: {}", err);
        }
    }
}

impl<D: Driver> Drop for Session<D> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::driver::{Driver, DriverError, SampleFrame};

    #[derive(Debug, Default)]
    pub struct Calls {
        pub starts: u32,
        pub stops: u32,
        pub led_ons: u32,
        pub led_offs: u32,
        pub gains: Vec<(u8, u8)>,
        pub reads: u32,
    }

    #[derive(Default)]
    pub struct MockDriver {
        pub calls: Rc<RefCell<Calls>>,
        pub connected: bool,
        pub frame: [u8; 8],
        pub fail_reads: bool,
    }

    impl Driver for MockDriver {
        fn start(&mut self) -> Result<(), DriverError> {
            self.calls.borrow_mut().starts += 1;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), DriverError> {
            self.calls.borrow_mut().stops += 1;
            Ok(())
        }

        fn is_connected(&mut self) -> Result<bool, DriverError> {
            Ok(self.connected)
        }

        fn led_on(&mut self) -> Result<(), DriverError> {
            self.calls.borrow_mut().led_ons += 1;
            Ok(())
        }

        fn led_off(&mut self) -> Result<(), DriverError> {
            self.calls.borrow_mut().led_offs += 1;
            Ok(())
        }

        fn set_gain(&mut self, channel: u8, gain_code: u8) -> Result<(), DriverError> {
            self.calls.borrow_mut().gains.push((channel, gain_code));
            Ok(())
        }

        fn read_frame(&mut self, frame: &mut SampleFrame) -> Result<(), DriverError> {
            self.calls.borrow_mut().reads += 1;
            frame.fill_from(&self.frame);
            if self.fail_reads {
                Err(DriverError::InvalidResponse)
            } else {
                Ok(())
            }
        }
    }
}
