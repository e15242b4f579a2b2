use anyhow::Error;

use crate::adapters::{DriveSlot, ElementAddr, MediaChanger};

/// No-op changer for families without a physical library
///
/// Directory devices permanently hold their medium (a dir device and
/// its medium share the same name), so the dummy changer reports
/// every drive as loaded with a medium labeled like the drive serial,
/// and every move trivially succeeds.
#[derive(Default)]
pub struct DummyChanger;

impl DummyChanger {
    pub fn new() -> Self {
        DummyChanger
    }
}

impl MediaChanger for DummyChanger {
    fn drive_status(&mut self, serial: &str) -> Result<DriveSlot, Error> {
        Ok(DriveSlot {
            addr: ElementAddr(0),
            loaded_label: Some(serial.to_string()),
        })
    }

    fn locate_media(&mut self, _label: &str) -> Result<ElementAddr, Error> {
        Ok(ElementAddr(0))
    }

    fn free_slot(&mut self) -> Result<ElementAddr, Error> {
        Ok(ElementAddr(0))
    }

    fn transfer(&mut self, _src: ElementAddr, _dst: ElementAddr) -> Result<(), Error> {
        Ok(())
    }
}
