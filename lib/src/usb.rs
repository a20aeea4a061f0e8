/*
    Copyright 2021, Andrew C. Young <andrew@vaelen.org>

    This file is part of the Trinity library.

    The Trinity library is free software: you can redistribute it and/or modify
    it under the terms of the GNU General Public License as published by
    the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    The Trinity library is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU General Public License for more details.

    You should have received a copy of the GNU General Public License
    along with the Trinity library.  If not, see <https://www.gnu.org/licenses/>.
 */

use crate::error::TrinityError;
use log::{debug, info, warn};
use rusb::{Context, Device, DeviceHandle, LogLevel, UsbContext};
use std::time::Duration;

pub const TRINITY_VENDOR_ID: u16 = 0x05ac;
pub const TRINITY_PRODUCT_ID: u16 = 0x1101;

/// The audio function's kernel driver sits on this interface.
pub const KERNEL_DRIVER_INTERFACE: u8 = 3;
pub const CONTROL_INTERFACE: u8 = 0;

/** The subset of a USB device handle needed to configure the device. */
pub trait ControlPipe {
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool>;
    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()>;
    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()>;
    fn release_interface(&mut self, interface: u8) -> rusb::Result<()>;
    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize>;
}

impl<T: UsbContext> ControlPipe for DeviceHandle<T> {
    fn kernel_driver_active(&self, interface: u8) -> rusb::Result<bool> {
        DeviceHandle::kernel_driver_active(self, interface)
    }

    fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::detach_kernel_driver(self, interface)
    }

    fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::claim_interface(self, interface)
    }

    fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
        DeviceHandle::release_interface(self, interface)
    }

    fn write_control(
        &self,
        request_type: u8,
        request: u8,
        value: u16,
        index: u16,
        data: &[u8],
        timeout: Duration,
    ) -> rusb::Result<usize> {
        DeviceHandle::write_control(self, request_type, request, value, index, data, timeout)
    }
}

/** A way of reaching USB devices. One implementation per backend. */
pub trait Transport {
    type Device;
    type Handle: ControlPipe;

    /// Every device currently attached to the bus.
    fn devices(&self) -> rusb::Result<Vec<Self::Device>>;

    /// Vendor and product ID of a device.
    fn device_ids(&self, device: &Self::Device) -> rusb::Result<(u16, u16)>;

    fn open(&self, device: &Self::Device) -> rusb::Result<Self::Handle>;

    /// Human readable description, for logging.
    fn describe(&self, device: &Self::Device) -> String;
}

/** libusb backend with its own context */
pub struct LibusbTransport {
    context: Context,
}

impl LibusbTransport {
    /** Initialise libusb. Fails when the USB subsystem can't be reached. */
    pub fn new() -> Result<LibusbTransport, TrinityError> {
        let mut context = Context::new().map_err(TrinityError::UsbUnavailable)?;
        context.set_log_level(LogLevel::Info);
        Ok(LibusbTransport { context })
    }
}

impl Transport for LibusbTransport {
    type Device = Device<Context>;
    type Handle = DeviceHandle<Context>;

    fn devices(&self) -> rusb::Result<Vec<Device<Context>>> {
        Ok(self.context.devices()?.iter().collect())
    }

    fn device_ids(&self, device: &Device<Context>) -> rusb::Result<(u16, u16)> {
        let desc = device.device_descriptor()?;
        Ok((desc.vendor_id(), desc.product_id()))
    }

    fn open(&self, device: &Device<Context>) -> rusb::Result<DeviceHandle<Context>> {
        let handle = device.open()?;
        if let Ok(desc) = device.device_descriptor() {
            match handle.read_product_string_ascii(&desc) {
                Ok(product) => debug!("Product: '{}'", product),
                Err(e) => debug!("Couldn't read product string: {}", e),
            }
        }
        Ok(handle)
    }

    fn describe(&self, device: &Device<Context>) -> String {
        describe_device(device)
    }
}

/** Bus position and IDs of a device, read from its descriptor only */
pub fn describe_device<C: UsbContext>(device: &Device<C>) -> String {
    let id = match device.device_descriptor() {
        Ok(desc) => format!("{:04x}:{:04x}", desc.vendor_id(), desc.product_id()),
        Err(_) => "unknown".to_string(),
    };
    format!("Bus: {:03} Device: {:03} ID: {}", device.bus_number(), device.address(), id)
}

/** Find the single attached device with the given IDs. */
pub fn locate<T: Transport>(transport: &T, vendor_id: u16, product_id: u16)
    -> Result<T::Device, TrinityError> {
    let devices = transport.devices().map_err(TrinityError::UsbUnavailable)?;
    let mut matching: Vec<T::Device> = devices
        .into_iter()
        .filter(|d| match transport.device_ids(d) {
            Ok(ids) => ids == (vendor_id, product_id),
            Err(e) => {
                warn!("Failed to get device descriptor: {}", e);
                false
            }
        })
        .collect();

    match matching.len() {
        0 => Err(TrinityError::DeviceNotFound),
        1 => matching.pop().ok_or(TrinityError::DeviceNotFound),
        count => Err(TrinityError::AmbiguousDevice { count }),
    }
}

/** Open a located device and claim its control interface */
pub fn open<T: Transport>(transport: &T, device: &T::Device) -> Result<T::Handle, TrinityError> {
    info!("Opening {}", transport.describe(device));
    let mut handle = transport.open(device).map_err(TrinityError::DeviceOpenFailed)?;
    check_for_kernel_driver(&mut handle, KERNEL_DRIVER_INTERFACE);
    claim_interface(&mut handle, CONTROL_INTERFACE)?;
    Ok(handle)
}

/** Locate and open the device in one go */
pub fn open_device<T: Transport>(transport: &T, vendor_id: u16, product_id: u16)
    -> Result<T::Handle, TrinityError> {
    let device = locate(transport, vendor_id, product_id)?;
    open(transport, &device)
}

// Detach a kernel driver if one is bound. Failing to do so is not fatal: some
// platforms share the device with the system driver instead.
pub fn check_for_kernel_driver<P: ControlPipe>(handle: &mut P, interface: u8) {
    match handle.kernel_driver_active(interface) {
        Ok(true) => match handle.detach_kernel_driver(interface) {
            Ok(_) => debug!("Detached kernel driver from interface {}", interface),
            Err(e) => warn!(
                "Couldn't detach kernel driver from interface {}: {}. Let's try anyway.",
                interface, e
            ),
        },
        Ok(false) => {}
        // Kernel drivers are not supported on this platform
        Err(rusb::Error::NotSupported) => {
            debug!("Kernel driver detach not supported, sharing the device")
        }
        Err(e) => warn!("Couldn't check kernel driver status: {}. Let's try anyway.", e),
    }
}

// Claim an interface
pub fn claim_interface<P: ControlPipe>(handle: &mut P, interface: u8) -> Result<(), TrinityError> {
    match handle.claim_interface(interface) {
        Ok(_) => Ok(()),
        Err(source) => Err(TrinityError::InterfaceClaimFailed { interface, source }),
    }
}

/// In-memory transport that records every call. Used by the tests.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ControlWrite {
        pub request_type: u8,
        pub request: u8,
        pub value: u16,
        pub index: u16,
        pub data: Vec<u8>,
    }

    #[derive(Debug, Default)]
    pub struct MockLog {
        pub enumerations: usize,
        pub opened: usize,
        pub detached: Vec<u8>,
        pub claimed: Vec<u8>,
        pub released: Vec<u8>,
        /// Every attempted write, including a failing one.
        pub writes: Vec<ControlWrite>,
        pub closed: usize,
    }

    impl MockLog {
        pub fn writes_to(&self, index: u16) -> Vec<&ControlWrite> {
            self.writes.iter().filter(|w| w.index == index).collect()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MockDevice {
        pub vendor_id: u16,
        pub product_id: u16,
        pub readable: bool,
    }

    impl MockDevice {
        pub fn new(vendor_id: u16, product_id: u16) -> MockDevice {
            MockDevice { vendor_id, product_id, readable: true }
        }

        pub fn trinity() -> MockDevice {
            MockDevice::new(TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID)
        }
    }

    pub struct MockTransport {
        pub devices: Vec<MockDevice>,
        pub enumeration_error: Option<rusb::Error>,
        pub open_error: Option<rusb::Error>,
        pub kernel_driver: rusb::Result<bool>,
        pub detach_error: Option<rusb::Error>,
        pub claim_error: Option<rusb::Error>,
        /// Fail the write with this position in the overall write sequence.
        pub fail_write: Option<(usize, rusb::Error)>,
        /// Report one byte short for the write with this position.
        pub short_write: Option<usize>,
        pub log: Rc<RefCell<MockLog>>,
    }

    impl MockTransport {
        pub fn with_devices(devices: Vec<MockDevice>) -> MockTransport {
            MockTransport {
                devices,
                enumeration_error: None,
                open_error: None,
                kernel_driver: Ok(false),
                detach_error: None,
                claim_error: None,
                fail_write: None,
                short_write: None,
                log: Rc::new(RefCell::new(MockLog::default())),
            }
        }

        /// A bus with exactly one Trinity device on it.
        pub fn single() -> MockTransport {
            MockTransport::with_devices(vec![MockDevice::trinity()])
        }

        /// A handle that bypasses lookup, for exercising writers directly.
        pub fn handle(&self) -> MockHandle {
            MockHandle {
                log: self.log.clone(),
                kernel_driver: self.kernel_driver,
                detach_error: self.detach_error,
                claim_error: self.claim_error,
                fail_write: self.fail_write,
                short_write: self.short_write,
            }
        }
    }

    impl Transport for MockTransport {
        type Device = MockDevice;
        type Handle = MockHandle;

        fn devices(&self) -> rusb::Result<Vec<MockDevice>> {
            self.log.borrow_mut().enumerations += 1;
            match self.enumeration_error {
                Some(e) => Err(e),
                None => Ok(self.devices.clone()),
            }
        }

        fn device_ids(&self, device: &MockDevice) -> rusb::Result<(u16, u16)> {
            if device.readable {
                Ok((device.vendor_id, device.product_id))
            } else {
                Err(rusb::Error::Io)
            }
        }

        fn open(&self, _device: &MockDevice) -> rusb::Result<MockHandle> {
            if let Some(e) = self.open_error {
                return Err(e);
            }
            self.log.borrow_mut().opened += 1;
            Ok(self.handle())
        }

        fn describe(&self, device: &MockDevice) -> String {
            format!("mock {:04x}:{:04x}", device.vendor_id, device.product_id)
        }
    }

    pub struct MockHandle {
        log: Rc<RefCell<MockLog>>,
        kernel_driver: rusb::Result<bool>,
        detach_error: Option<rusb::Error>,
        claim_error: Option<rusb::Error>,
        fail_write: Option<(usize, rusb::Error)>,
        short_write: Option<usize>,
    }

    impl ControlPipe for MockHandle {
        fn kernel_driver_active(&self, _interface: u8) -> rusb::Result<bool> {
            self.kernel_driver
        }

        fn detach_kernel_driver(&mut self, interface: u8) -> rusb::Result<()> {
            if let Some(e) = self.detach_error {
                return Err(e);
            }
            self.log.borrow_mut().detached.push(interface);
            Ok(())
        }

        fn claim_interface(&mut self, interface: u8) -> rusb::Result<()> {
            if let Some(e) = self.claim_error {
                return Err(e);
            }
            self.log.borrow_mut().claimed.push(interface);
            Ok(())
        }

        fn release_interface(&mut self, interface: u8) -> rusb::Result<()> {
            self.log.borrow_mut().released.push(interface);
            Ok(())
        }

        fn write_control(
            &self,
            request_type: u8,
            request: u8,
            value: u16,
            index: u16,
            data: &[u8],
            _timeout: Duration,
        ) -> rusb::Result<usize> {
            let mut log = self.log.borrow_mut();
            let position = log.writes.len();
            log.writes.push(ControlWrite {
                request_type,
                request,
                value,
                index,
                data: data.to_vec(),
            });
            match self.fail_write {
                Some((at, e)) if at == position => return Err(e),
                _ => {}
            }
            if self.short_write == Some(position) {
                return Ok(data.len().saturating_sub(1));
            }
            Ok(data.len())
        }
    }

    impl Drop for MockHandle {
        fn drop(&mut self) {
            self.log.borrow_mut().closed += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;

    #[test]
    fn no_matching_device_is_not_found() {
        let transport = MockTransport::with_devices(vec![MockDevice::new(0x046d, 0xc52b)]);
        let result = locate(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID);
        assert!(matches!(result, Err(TrinityError::DeviceNotFound)));
    }

    #[test]
    fn empty_bus_is_not_found() {
        let transport = MockTransport::with_devices(vec![]);
        let result = open_device(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID);
        assert!(matches!(result, Err(TrinityError::DeviceNotFound)));
        assert_eq!(transport.log.borrow().opened, 0);
    }

    #[test]
    fn two_matching_devices_are_ambiguous() {
        let transport = MockTransport::with_devices(vec![
            MockDevice::trinity(),
            MockDevice::new(0x046d, 0xc52b),
            MockDevice::trinity(),
        ]);
        let result = open_device(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID);
        assert!(matches!(result, Err(TrinityError::AmbiguousDevice { count: 2 })));
        assert_eq!(transport.log.borrow().opened, 0);
    }

    #[test]
    fn single_device_is_opened_and_claimed() {
        let transport = MockTransport::with_devices(vec![
            MockDevice::new(0x05ac, 0x8242),
            MockDevice::trinity(),
        ]);
        let handle = open_device(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID);
        assert!(handle.is_ok());
        let log = transport.log.borrow();
        assert_eq!(log.enumerations, 1);
        assert_eq!(log.opened, 1);
        assert_eq!(log.claimed, vec![CONTROL_INTERFACE]);
    }

    #[test]
    fn unreadable_descriptors_are_skipped() {
        let mut broken = MockDevice::trinity();
        broken.readable = false;
        let transport = MockTransport::with_devices(vec![broken, MockDevice::trinity()]);
        assert!(locate(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID).is_ok());
    }

    #[test]
    fn locating_opens_nothing() {
        let transport = MockTransport::single();
        assert!(locate(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID).is_ok());
        assert_eq!(transport.log.borrow().opened, 0);
        assert_eq!(transport.log.borrow().closed, 0);
    }

    #[test]
    fn enumeration_failure_is_reported() {
        let mut transport = MockTransport::single();
        transport.enumeration_error = Some(rusb::Error::NoMem);
        let result = locate(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID);
        assert!(matches!(result, Err(TrinityError::UsbUnavailable(rusb::Error::NoMem))));
    }

    #[test]
    fn refused_open_fails() {
        let mut transport = MockTransport::single();
        transport.open_error = Some(rusb::Error::Access);
        let result = open_device(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID);
        assert!(matches!(result, Err(TrinityError::DeviceOpenFailed(rusb::Error::Access))));
    }

    #[test]
    fn claim_failure_fails_and_closes() {
        let mut transport = MockTransport::single();
        transport.claim_error = Some(rusb::Error::Busy);
        let result = open_device(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID);
        match result {
            Err(TrinityError::InterfaceClaimFailed { interface, source }) => {
                assert_eq!(interface, CONTROL_INTERFACE);
                assert_eq!(source, rusb::Error::Busy);
            }
            _ => panic!("expected a claim failure"),
        }
        assert_eq!(transport.log.borrow().closed, 1);
    }

    #[test]
    fn active_kernel_driver_is_detached() {
        let mut transport = MockTransport::single();
        transport.kernel_driver = Ok(true);
        assert!(open_device(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID).is_ok());
        assert_eq!(transport.log.borrow().detached, vec![KERNEL_DRIVER_INTERFACE]);
    }

    #[test]
    fn kernel_driver_problems_are_not_fatal() {
        let mut transport = MockTransport::single();
        transport.kernel_driver = Ok(true);
        transport.detach_error = Some(rusb::Error::Access);
        assert!(open_device(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID).is_ok());

        let mut transport = MockTransport::single();
        transport.kernel_driver = Err(rusb::Error::NotSupported);
        assert!(open_device(&transport, TRINITY_VENDOR_ID, TRINITY_PRODUCT_ID).is_ok());
        assert!(transport.log.borrow().detached.is_empty());
        assert_eq!(transport.log.borrow().claimed, vec![CONTROL_INTERFACE]);
    }
}
