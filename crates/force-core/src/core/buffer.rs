//! Host/device mirrored arrays with scoped, access-mode-checked borrows.
//!
//! Every per-particle quantity that an accelerated kernel may touch lives in a
//! [`DualArray`]. The array keeps one copy on the host and one on the device and
//! remembers which of the two is current. Borrowing goes through guard objects:
//!
//! - [`DualArray::read`] returns an [`ArrayView`]. It copies from the other side
//!   only when the requested side is stale, and any number of views may coexist.
//! - [`DualArray::write`] returns an exclusive [`ArrayHandle`]. After the write the
//!   requested side is the only current one.
//!
//! Guards release their borrow on drop, so early returns and `?` never leave an
//! array locked.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessLocation {
    Host,
    Device,
}

/// How an exclusive borrow treats the existing contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Contents are brought up to date on the requested side before the borrow.
    ReadWrite,
    /// Contents will be fully overwritten; no copy is made.
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataLocation {
    Host,
    Device,
    HostDevice,
}

impl DataLocation {
    fn is_current(self, location: AccessLocation) -> bool {
        matches!(
            (self, location),
            (DataLocation::HostDevice, _)
                | (DataLocation::Host, AccessLocation::Host)
                | (DataLocation::Device, AccessLocation::Device)
        )
    }
}

impl From<AccessLocation> for DataLocation {
    fn from(location: AccessLocation) -> Self {
        match location {
            AccessLocation::Host => DataLocation::Host,
            AccessLocation::Device => DataLocation::Device,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Buffer '{name}' is already borrowed and cannot be acquired for {requested}")]
    Busy {
        name: &'static str,
        requested: &'static str,
    },
}

/// Number of copies performed in each direction since construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferStats {
    pub host_to_device: u64,
    pub device_to_host: u64,
}

pub struct DualArray<T> {
    name: &'static str,
    len: usize,
    host: RefCell<Vec<T>>,
    device: RefCell<Vec<T>>,
    location: Cell<DataLocation>,
    transfers: Cell<TransferStats>,
}

impl<T: Copy> DualArray<T> {
    /// Allocates `len` elements on both sides, all set to `fill`. The host copy starts current.
    pub fn new(name: &'static str, len: usize, fill: T) -> Self {
        Self::from_vec(name, vec![fill; len])
    }

    pub fn from_vec(name: &'static str, data: Vec<T>) -> Self {
        let device = data.clone();
        Self {
            name,
            len: data.len(),
            host: RefCell::new(data),
            device: RefCell::new(device),
            location: Cell::new(DataLocation::Host),
            transfers: Cell::new(TransferStats::default()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn transfers(&self) -> TransferStats {
        self.transfers.get()
    }

    fn side(&self, location: AccessLocation) -> &RefCell<Vec<T>> {
        match location {
            AccessLocation::Host => &self.host,
            AccessLocation::Device => &self.device,
        }
    }

    fn other_side(&self, location: AccessLocation) -> &RefCell<Vec<T>> {
        match location {
            AccessLocation::Host => &self.device,
            AccessLocation::Device => &self.host,
        }
    }

    /// Borrows the array read-only at `location`, copying from the other side only if needed.
    ///
    /// Readers of the current side do not block a read of the stale side.
    pub fn read(&self, location: AccessLocation) -> Result<ArrayView<'_, T>, BufferError> {
        if !self.location.get().is_current(location) {
            let source = self
                .other_side(location)
                .try_borrow()
                .map_err(|_| self.busy("reading"))?;
            let mut target = self
                .side(location)
                .try_borrow_mut()
                .map_err(|_| self.busy("reading"))?;
            target.copy_from_slice(&source);
            self.count_transfer(location);
            self.location.set(DataLocation::HostDevice);
        }

        let view = self
            .side(location)
            .try_borrow()
            .map_err(|_| self.busy("reading"))?;
        Ok(ArrayView {
            inner: Ref::map(view, |v| v.as_slice()),
        })
    }

    /// Borrows the array exclusively at `location`. Only `location` is current afterwards.
    ///
    /// Fails while any view or handle of either side is alive.
    pub fn write(
        &self,
        location: AccessLocation,
        mode: WriteMode,
    ) -> Result<ArrayHandle<'_, T>, BufferError> {
        let mut target = self
            .side(location)
            .try_borrow_mut()
            .map_err(|_| self.busy("writing"))?;
        {
            let other = self
                .other_side(location)
                .try_borrow_mut()
                .map_err(|_| self.busy("writing"))?;
            if mode == WriteMode::ReadWrite && !self.location.get().is_current(location) {
                target.copy_from_slice(&other);
                self.count_transfer(location);
            }
        }
        self.location.set(location.into());
        Ok(ArrayHandle {
            inner: RefMut::map(target, |v| v.as_mut_slice()),
        })
    }

    /// Changes the element count. Existing contents are kept; the host side becomes current.
    pub fn resize(&mut self, len: usize, fill: T) {
        let host = self.host.get_mut();
        let device = self.device.get_mut();
        if self.location.get() == DataLocation::Device {
            host.copy_from_slice(&device[..]);
        }
        host.resize(len, fill);
        device.clear();
        device.extend_from_slice(&host[..]);
        self.location.set(DataLocation::Host);
        self.len = len;
    }

    fn count_transfer(&self, destination: AccessLocation) {
        let mut stats = self.transfers.get();
        match destination {
            AccessLocation::Host => stats.device_to_host += 1,
            AccessLocation::Device => stats.host_to_device += 1,
        }
        self.transfers.set(stats);
    }

    fn busy(&self, requested: &'static str) -> BufferError {
        BufferError::Busy {
            name: self.name,
            requested,
        }
    }
}

impl<T> fmt::Debug for DualArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DualArray")
            .field("name", &self.name)
            .field("transfers", &self.transfers.get())
            .finish_non_exhaustive()
    }
}

/// Shared, read-only borrow of one side of a [`DualArray`].
pub struct ArrayView<'a, T> {
    inner: Ref<'a, [T]>,
}

impl<T> Deref for ArrayView<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.inner
    }
}

/// Exclusive, writable borrow of one side of a [`DualArray`].
pub struct ArrayHandle<'a, T> {
    inner: RefMut<'a, [T]>,
}

impl<T> Deref for ArrayHandle<'_, T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.inner
    }
}

impl<T> DerefMut for ArrayHandle<'_, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_array_is_current_on_host_only() {
        let array = DualArray::new("test", 4, 1.0f64);
        assert_eq!(&*array.read(AccessLocation::Host).unwrap(), &[1.0; 4]);
        assert_eq!(array.transfers(), TransferStats::default());
    }

    #[test]
    fn reading_stale_device_side_copies_once() {
        let array = DualArray::new("test", 3, 0u32);
        {
            let mut h = array
                .write(AccessLocation::Host, WriteMode::Overwrite)
                .unwrap();
            h.copy_from_slice(&[1, 2, 3]);
        }
        assert_eq!(&*array.read(AccessLocation::Device).unwrap(), &[1, 2, 3]);
        assert_eq!(&*array.read(AccessLocation::Device).unwrap(), &[1, 2, 3]);
        assert_eq!(&*array.read(AccessLocation::Host).unwrap(), &[1, 2, 3]);
        assert_eq!(
            array.transfers(),
            TransferStats {
                host_to_device: 1,
                device_to_host: 0
            }
        );
    }

    #[test]
    fn device_write_invalidates_host_until_next_read() {
        let array = DualArray::new("test", 2, 0i64);
        {
            let mut d = array
                .write(AccessLocation::Device, WriteMode::Overwrite)
                .unwrap();
            d[0] = 7;
            d[1] = 9;
        }
        assert_eq!(array.transfers().host_to_device, 0);
        assert_eq!(&*array.read(AccessLocation::Host).unwrap(), &[7, 9]);
        assert_eq!(array.transfers().device_to_host, 1);
    }

    #[test]
    fn read_write_mode_brings_stale_side_up_to_date() {
        let array = DualArray::new("test", 2, 5i32);
        {
            let mut d = array
                .write(AccessLocation::Device, WriteMode::ReadWrite)
                .unwrap();
            d[1] += 1;
        }
        assert_eq!(array.transfers().host_to_device, 1);
        assert_eq!(&*array.read(AccessLocation::Host).unwrap(), &[5, 6]);
    }

    #[test]
    fn overwrite_mode_never_copies() {
        let array = DualArray::new("test", 2, 5i32);
        {
            let mut d = array
                .write(AccessLocation::Device, WriteMode::Overwrite)
                .unwrap();
            d.fill(0);
        }
        assert_eq!(array.transfers(), TransferStats::default());
    }

    #[test]
    fn many_concurrent_readers_are_allowed() {
        let array = DualArray::new("test", 2, 1u8);
        let a = array.read(AccessLocation::Host).unwrap();
        let b = array.read(AccessLocation::Host).unwrap();
        assert_eq!(a.len() + b.len(), 4);
    }

    #[test]
    fn write_while_reading_is_rejected() {
        let array = DualArray::new("positions", 2, 1u8);
        let _view = array.read(AccessLocation::Host).unwrap();
        let result = array.write(AccessLocation::Host, WriteMode::ReadWrite);
        assert!(matches!(
            result,
            Err(BufferError::Busy {
                name: "positions",
                requested: "writing"
            })
        ));
    }

    #[test]
    fn read_while_writing_is_rejected() {
        let array = DualArray::new("forces", 2, 1u8);
        let _handle = array
            .write(AccessLocation::Host, WriteMode::Overwrite)
            .unwrap();
        assert!(array.read(AccessLocation::Host).is_err());
    }

    #[test]
    fn borrow_is_released_when_guard_is_dropped_on_error_path() {
        fn failing(array: &DualArray<u8>) -> Result<(), BufferError> {
            let _handle = array.write(AccessLocation::Host, WriteMode::Overwrite)?;
            Err(BufferError::Busy {
                name: "synthetic",
                requested: "writing",
            })
        }
        let array = DualArray::new("test", 1, 0u8);
        assert!(failing(&array).is_err());
        assert!(array.write(AccessLocation::Host, WriteMode::Overwrite).is_ok());
    }

    #[test]
    fn stale_side_can_be_read_while_the_current_side_is_viewed() {
        let array = DualArray::new("test", 2, 4u8);
        let host = array.read(AccessLocation::Host).unwrap();
        let device = array.read(AccessLocation::Device).unwrap();
        assert_eq!(&*host, &*device);
        assert_eq!(array.transfers().host_to_device, 1);
    }

    #[test]
    fn write_is_rejected_while_the_other_side_is_viewed() {
        let array = DualArray::new("test", 2, 4u8);
        let _device = array.read(AccessLocation::Device).unwrap();
        assert!(array.write(AccessLocation::Host, WriteMode::Overwrite).is_err());
    }

    #[test]
    fn stale_side_cannot_be_read_while_the_current_side_is_written() {
        let array = DualArray::new("test", 1, 0u8);
        let _handle = array.write(AccessLocation::Host, WriteMode::Overwrite).unwrap();
        assert!(array.read(AccessLocation::Device).is_err());
    }

    #[test]
    fn resize_keeps_latest_contents() {
        let mut array = DualArray::new("test", 2, 0u16);
        {
            let mut d = array
                .write(AccessLocation::Device, WriteMode::Overwrite)
                .unwrap();
            d.copy_from_slice(&[3, 4]);
        }
        array.resize(3, 9);
        assert_eq!(&*array.read(AccessLocation::Host).unwrap(), &[3, 4, 9]);
        assert_eq!(&*array.read(AccessLocation::Device).unwrap(), &[3, 4, 9]);
    }
}
