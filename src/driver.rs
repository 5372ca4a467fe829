use std::io;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("no K8047 device found")]
    NoDevice,

    #[error("invalid response")]
    InvalidResponse,

    #[error("io error: {0}")]
    IoError(io::Error),

    #[error("usb transfer error: {0}")]
    UsbTransferError(nusb::transfer::TransferError),
}

/// One raw read from the device, all channels plus reserved fields.
/// Overwritten on every poll; never persisted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SampleFrame {
    pub timer_low: u16,
    pub timer_high: u16,
    pub ch: [u16; 4],
    pub reserved1: u16,
    pub reserved2: u16,
}

impl SampleFrame {
    /// Decodes a raw 8-byte packet, zero-padding a short one.
    pub fn fill_from(&mut self, bytes: &[u8]) {
        let mut raw = [0u8; 8];
        let len = bytes.len().min(raw.len());
        raw[..len].copy_from_slice(&bytes[..len]);
        self.timer_low = raw[0] as u16;
        self.timer_high = raw[1] as u16;
        for (i, count) in self.ch.iter_mut().enumerate() {
            *count = raw[2 + i] as u16;
        }
        self.reserved1 = raw[6] as u16;
        self.reserved2 = raw[7] as u16;
    }
}

/// The fixed capability set of the recorder. Statuses from `set_gain` and
/// `read_frame` are reported by the session but never escalate.
pub trait Driver {
    fn start(&mut self) -> Result<(), DriverError>;
    fn stop(&mut self) -> Result<(), DriverError>;
    fn is_connected(&mut self) -> Result<bool, DriverError>;
    fn led_on(&mut self) -> Result<(), DriverError>;
    fn led_off(&mut self) -> Result<(), DriverError>;
    fn set_gain(&mut self, channel: u8, gain_code: u8) -> Result<(), DriverError>;
    fn read_frame(&mut self, frame: &mut SampleFrame) -> Result<(), DriverError>;
}
