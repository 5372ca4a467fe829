use std::time::Duration;

use futures_lite::future::block_on;
use nusb::{
    Device, Interface,
    transfer::{Control, ControlType, Recipient, RequestBuffer},
};

use crate::driver::{Driver, DriverError, SampleFrame};

const VENDOR_ID: u16 = 0x10cf;
const PRODUCT_ID: u16 = 0x8047;

const FRAME_ENDPOINT: u8 = 0x81;
const FRAME_LEN: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Command {
    Start = 0xa1,
    Stop = 0xa2,
    LedOn = 0xa3,
    LedOff = 0xa4,
    SetGain = 0xa5,
    GetStatus = 0xa6,
}

fn find_device() -> Option<nusb::DeviceInfo> {
    nusb::list_devices()
        .ok()?
        .find(|dev| dev.vendor_id() == VENDOR_ID && dev.product_id() == PRODUCT_ID)
}

/// USB binding for the K8047 recorder. Commands go out as vendor control
/// requests; sample frames arrive as 8-byte interrupt transfers.
pub struct K8047 {
    device: Device,
    interface: Interface,
}

impl K8047 {
    /// Binds the recorder. A failure here is a misconfiguration of the
    /// host environment and fatal before any driver call is attempted.
    pub fn open() -> Result<K8047, DriverError> {
        let descriptor = find_device().ok_or(DriverError::NoDevice)?;
        eprintln!(
            "Found K8047 device {:04X}:{:04X}",
            descriptor.vendor_id(),
            descriptor.product_id()
        );
        let device = descriptor.open().map_err(DriverError::IoError)?;
        device.set_configuration(1).map_err(DriverError::IoError)?;
        let interface = device.claim_interface(0).map_err(DriverError::IoError)?;
        Ok(K8047 { device, interface })
    }

    fn command(&self, request: Command, value: u16, index: u16) -> Result<(), DriverError> {
        self.device
            .control_out_blocking(
                Control {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: request as u8,
                    value,
                    index,
                },
                &[],
                Duration::from_secs(1),
            )
            .map_err(DriverError::UsbTransferError)?;
        Ok(())
    }
}

impl Driver for K8047 {
    fn start(&mut self) -> Result<(), DriverError> {
        self.command(Command::Start, 0, 0)
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.command(Command::Stop, 0, 0)
    }

    fn is_connected(&mut self) -> Result<bool, DriverError> {
        let mut buffer = [0u8; 1];
        let bytes_read = self
            .device
            .control_in_blocking(
                Control {
                    control_type: ControlType::Vendor,
                    recipient: Recipient::Device,
                    request: Command::GetStatus as u8,
                    value: 0,
                    index: 0,
                },
                &mut buffer,
                Duration::from_secs(1),
            )
            .map_err(DriverError::UsbTransferError)?;

        if bytes_read != buffer.len() {
            return Err(DriverError::InvalidResponse);
        }

        Ok(buffer[0] != 0)
    }

    fn led_on(&mut self) -> Result<(), DriverError> {
        self.command(Command::LedOn, 0, 0)
    }

    fn led_off(&mut self) -> Result<(), DriverError> {
        self.command(Command::LedOff, 0, 0)
    }

    fn set_gain(&mut self, channel: u8, gain_code: u8) -> Result<(), DriverError> {
        self.command(Command::SetGain, gain_code as u16, channel as u16)
    }

    fn read_frame(&mut self, frame: &mut SampleFrame) -> Result<(), DriverError> {
        let mut queue = self.interface.interrupt_in_queue(FRAME_ENDPOINT);
        queue.submit(RequestBuffer::new(FRAME_LEN));
        let completion = block_on(queue.next_complete());
        // a failed read still decodes whatever bytes arrived
        frame.fill_from(&completion.data);
        completion.status.map_err(DriverError::UsbTransferError)
    }
}
