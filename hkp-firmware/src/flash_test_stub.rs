//! In-memory NOR flash for host tests.

use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

extern crate std;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashStubError {
    Failed,
}

impl NorFlashError for FlashStubError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

/// Starts erased. Writes can only clear bits, like the real thing.
pub struct NorFlashStub<const FLASH_SIZE: usize> {
    pub buf: [u8; FLASH_SIZE],
    /// Every erase as `(from, to)`.
    pub erases: std::vec::Vec<(u32, u32)>,
    /// Makes every erase and write fail without touching `buf`.
    pub fail: bool,
}

impl<const FLASH_SIZE: usize> Default for NorFlashStub<FLASH_SIZE> {
    fn default() -> Self {
        Self {
            buf: [0xff; FLASH_SIZE],
            erases: std::vec::Vec::new(),
            fail: false,
        }
    }
}

impl<const FLASH_SIZE: usize> ErrorType for NorFlashStub<FLASH_SIZE> {
    type Error = FlashStubError;
}

impl<const FLASH_SIZE: usize> ReadNorFlash for NorFlashStub<FLASH_SIZE> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let offset = offset as usize;
        let src = self
            .buf
            .get(offset..offset + bytes.len())
            .ok_or(FlashStubError::Failed)?;
        bytes.copy_from_slice(src);
        Ok(())
    }

    fn capacity(&self) -> usize {
        FLASH_SIZE
    }
}

impl<const FLASH_SIZE: usize> NorFlash for NorFlashStub<FLASH_SIZE> {
    const WRITE_SIZE: usize = 4;

    const ERASE_SIZE: usize = 64;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if self.fail || from as usize % Self::ERASE_SIZE != 0 || to as usize % Self::ERASE_SIZE != 0
        {
            return Err(FlashStubError::Failed);
        }
        self.erases.push((from, to));
        self.buf
            .get_mut(from as usize..to as usize)
            .ok_or(FlashStubError::Failed)?
            .fill(0xff);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail
            || offset as usize % Self::WRITE_SIZE != 0
            || bytes.len() % Self::WRITE_SIZE != 0
        {
            return Err(FlashStubError::Failed);
        }
        let offset = offset as usize;
        let dst = self
            .buf
            .get_mut(offset..offset + bytes.len())
            .ok_or(FlashStubError::Failed)?;
        for (t, f) in dst.iter_mut().zip(bytes) {
            *t &= *f;
        }
        Ok(())
    }
}
