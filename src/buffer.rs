//! Shared element storage.
//!
//! An [`ElementBuffer`] is a reference-counted byte region. Its storage is
//! either owned by this layer (a [`TypedVec`], freed when the last holder is
//! dropped) or foreign: memory owned by the caller or a device allocator,
//! which this layer never frees except through a caller-supplied deleter.
//!
//! Foreign memory may be accelerator memory with pending device work; such a
//! buffer carries a [`ReadinessToken`] that is consumed by the first host
//! access.

use std::fmt;
use std::ops::Range;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::event::ReadinessToken;
use crate::{DataType, Result, TableError, TypedVec};

/// Where the bytes of a buffer live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllocationKind {
    /// Plain host heap memory.
    #[default]
    Heap,
    /// Accelerator-runtime host allocation (pinned host memory).
    Host,
    /// Memory shared between host and device.
    Shared,
    /// Device-only memory.
    Device,
}

impl AllocationKind {
    /// Whether host code may dereference memory of this kind.
    #[inline]
    pub fn is_host_accessible(self) -> bool {
        !matches!(self, AllocationKind::Device)
    }
}

type Deleter = Box<dyn FnOnce(NonNull<u8>, usize) + Send + Sync>;

enum Storage {
    Owned(TypedVec),
    Foreign {
        ptr: NonNull<u8>,
        len: usize,
        writable: bool,
        deleter: Option<Deleter>,
    },
}

struct BufferInner {
    storage: Storage,
    kind: AllocationKind,
    readiness: Mutex<Option<ReadinessToken>>,
}

// Foreign storage is a raw pointer; the `ForeignBuffer::new` contract makes
// the memory valid for the lifetime of the buffer and safe to access from any
// thread.
unsafe impl Send for BufferInner {}
unsafe impl Sync for BufferInner {}

impl BufferInner {
    fn full_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Owned(v) => v.as_bytes(),
            Storage::Foreign { ptr, len, .. } => unsafe {
                std::slice::from_raw_parts(ptr.as_ptr(), *len)
            },
        }
    }

    fn base_ptr(&self) -> *const u8 {
        match &self.storage {
            Storage::Owned(v) => v.as_bytes().as_ptr(),
            Storage::Foreign { ptr, .. } => ptr.as_ptr(),
        }
    }
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        if let Storage::Foreign {
            ptr, len, deleter, ..
        } = &mut self.storage
        {
            if let Some(deleter) = deleter.take() {
                deleter(*ptr, *len);
            }
        }
    }
}

/// Reference-counted byte storage shared by tables.
///
/// Cloning is cheap and shares the bytes. A buffer may also be a window into
/// a larger allocation (see [`Table::outer_block`](crate::Table::outer_block)).
#[derive(Clone)]
pub struct ElementBuffer {
    inner: Arc<BufferInner>,
    offset: usize,
    len: usize,
}

impl ElementBuffer {
    /// Take ownership of typed storage.
    pub fn from_typed_vec(values: TypedVec) -> Self {
        let len = values.as_bytes().len();
        Self::from_inner(
            BufferInner {
                storage: Storage::Owned(values),
                kind: AllocationKind::Heap,
                readiness: Mutex::new(None),
            },
            len,
        )
    }

    /// Allocate zero-initialized owned storage for `count` elements.
    pub fn zeros(data_type: DataType, count: usize) -> Result<Self> {
        let bytes = count
            .checked_mul(data_type.size_in_bytes())
            .ok_or(TableError::Overflow)?;
        let values =
            TypedVec::zeros(data_type, count).ok_or(TableError::AllocationFailed { bytes })?;
        Ok(Self::from_typed_vec(values))
    }

    fn from_inner(inner: BufferInner, len: usize) -> Self {
        Self {
            inner: Arc::new(inner),
            offset: 0,
            len,
        }
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn kind(&self) -> AllocationKind {
        self.inner.kind
    }

    /// Whether the bytes are owned (and will be freed) by this layer.
    pub fn is_owned(&self) -> bool {
        matches!(self.inner.storage, Storage::Owned(_))
    }

    /// Whether writes through this buffer are permitted.
    pub fn is_writable(&self) -> bool {
        match &self.inner.storage {
            Storage::Owned(_) => true,
            Storage::Foreign { writable, .. } => *writable,
        }
    }

    /// Fail the way [`bytes_mut`](Self::bytes_mut) would, without writing
    /// or detaching anything.
    pub fn check_writable(&self) -> Result<()> {
        match &self.inner.storage {
            Storage::Owned(_) => Ok(()),
            Storage::Foreign { writable: false, .. } => Err(TableError::ReadOnly),
            Storage::Foreign { .. } if Arc::strong_count(&self.inner) > 1 => {
                Err(TableError::SharedForeignBuffer)
            }
            Storage::Foreign { .. } => Ok(()),
        }
    }

    /// Whether no prerequisite events are pending.
    pub fn is_ready(&self) -> bool {
        self.inner
            .readiness
            .lock()
            .as_ref()
            .map_or(true, ReadinessToken::is_ready)
    }

    /// Number of holders sharing the underlying allocation.
    pub fn holder_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Address of the first byte. Never dereferenced here.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.inner.base_ptr().wrapping_add(self.offset)
    }

    /// Whether `self` and `other` share one allocation.
    pub fn shares_allocation(&self, other: &ElementBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Consume the readiness token (if any) and check host accessibility.
    ///
    /// Every host access goes through here, so pending device work is always
    /// waited on before the first read or write.
    pub fn wait_ready(&self) -> Result<()> {
        if !self.inner.kind.is_host_accessible() {
            return Err(TableError::HostInaccessible(self.inner.kind));
        }
        let mut slot = self.inner.readiness.lock();
        if let Some(token) = slot.take() {
            tracing::trace!(events = token.len(), "waiting on buffer readiness token");
            token.wait();
        }
        Ok(())
    }

    /// The bytes, after waiting for readiness.
    pub fn bytes(&self) -> Result<&[u8]> {
        self.wait_ready()?;
        Ok(&self.inner.full_bytes()[self.offset..self.offset + self.len])
    }

    /// The bytes for writing.
    ///
    /// Owned storage shared with other holders is detached first (the
    /// selected bytes are copied into a fresh allocation), so writes never
    /// become visible through another table. Foreign storage must be
    /// writable and not shared.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        self.wait_ready()?;
        if Arc::strong_count(&self.inner) > 1 {
            self.detach()?;
        }
        let (offset, len) = (self.offset, self.len);
        let inner = Arc::get_mut(&mut self.inner).ok_or(TableError::SharedForeignBuffer)?;
        match &mut inner.storage {
            Storage::Owned(v) => Ok(&mut v.as_bytes_mut()[offset..offset + len]),
            Storage::Foreign { writable: false, .. } => Err(TableError::ReadOnly),
            Storage::Foreign { ptr, .. } => Ok(unsafe {
                std::slice::from_raw_parts_mut(ptr.as_ptr().add(offset), len)
            }),
        }
    }

    fn detach(&mut self) -> Result<()> {
        let copy = match &self.inner.storage {
            Storage::Owned(v) => v
                .copy_byte_range(self.offset..self.offset + self.len)
                .ok_or(TableError::Misaligned(v.data_type()))?,
            Storage::Foreign { writable: false, .. } => return Err(TableError::ReadOnly),
            Storage::Foreign { .. } => return Err(TableError::SharedForeignBuffer),
        };
        tracing::warn!(
            bytes = self.len,
            holders = Arc::strong_count(&self.inner),
            "detaching shared owned buffer before write"
        );
        *self = Self::from_typed_vec(copy);
        Ok(())
    }

    /// A window of `len` bytes starting at byte `offset`, sharing the
    /// allocation. The caller guarantees the window lies within `self`.
    pub(crate) fn window(&self, range: Range<usize>) -> Self {
        debug_assert!(range.start <= range.end && range.end <= self.len);
        Self {
            inner: Arc::clone(&self.inner),
            offset: self.offset + range.start,
            len: range.end - range.start,
        }
    }
}

impl fmt::Debug for ElementBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementBuffer")
            .field("kind", &self.inner.kind)
            .field("owned", &self.is_owned())
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

/// Builder for an [`ElementBuffer`] over memory this layer does not own.
///
/// # Example
/// ```rust
/// use std::ptr::NonNull;
/// use homogen_table::buffer::ForeignBuffer;
/// use homogen_table::{AllocationKind, HostEvent};
///
/// let data = Box::leak(vec![1.0f32, 2.0, 3.0, 4.0].into_boxed_slice());
/// let ptr = NonNull::new(data.as_mut_ptr() as *mut u8).unwrap();
/// let event = HostEvent::completed();
/// let buffer = unsafe { ForeignBuffer::new(ptr, 16) }
///     .kind(AllocationKind::Shared)
///     .events(std::iter::once(event).collect())
///     .build();
/// assert_eq!(buffer.len(), 16);
/// assert!(!buffer.is_owned());
/// ```
pub struct ForeignBuffer {
    ptr: NonNull<u8>,
    len: usize,
    kind: AllocationKind,
    writable: bool,
    deleter: Option<Deleter>,
    readiness: Option<ReadinessToken>,
}

impl ForeignBuffer {
    /// Describe `len` bytes at `ptr`, read-only, in host memory.
    ///
    /// # Safety
    /// Unless the buffer is marked [`AllocationKind::Device`], the caller
    /// must ensure that `ptr..ptr + len` stays valid for reads for as long as
    /// any holder of the built buffer exists (once the attached readiness
    /// events complete), and that the memory is not mutated elsewhere while
    /// tables over it are read. If [`ForeignBuffer::writable`] is used, the
    /// memory must also be valid for writes and not read or written by anyone
    /// else while this layer writes to it.
    pub unsafe fn new(ptr: NonNull<u8>, len: usize) -> Self {
        Self {
            ptr,
            len,
            kind: AllocationKind::Host,
            writable: false,
            deleter: None,
            readiness: None,
        }
    }

    pub fn kind(mut self, kind: AllocationKind) -> Self {
        self.kind = kind;
        self
    }

    /// Allow writes through the buffer.
    pub fn writable(mut self) -> Self {
        self.writable = true;
        self
    }

    /// Called with the pointer and byte length when the last holder drops.
    pub fn deleter<F>(mut self, deleter: F) -> Self
    where
        F: FnOnce(NonNull<u8>, usize) + Send + Sync + 'static,
    {
        self.deleter = Some(Box::new(deleter));
        self
    }

    /// Events that must complete before the first host access.
    pub fn events(mut self, token: ReadinessToken) -> Self {
        self.readiness = if token.is_empty() { None } else { Some(token) };
        self
    }

    pub fn build(self) -> ElementBuffer {
        let len = self.len;
        ElementBuffer::from_inner(
            BufferInner {
                storage: Storage::Foreign {
                    ptr: self.ptr,
                    len: self.len,
                    writable: self.writable,
                    deleter: self.deleter,
                },
                kind: self.kind,
                readiness: Mutex::new(self.readiness),
            },
            len,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::HostEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn leak_f32(values: Vec<f32>) -> (NonNull<u8>, usize) {
        let data = Box::leak(values.into_boxed_slice());
        let len = std::mem::size_of_val(data);
        (NonNull::new(data.as_mut_ptr() as *mut u8).unwrap(), len)
    }

    #[test]
    fn test_zeros_owned() {
        let buf = ElementBuffer::zeros(DataType::Int32, 5).unwrap();
        assert_eq!(buf.len(), 20);
        assert!(buf.is_owned());
        assert!(buf.is_writable());
        assert_eq!(buf.kind(), AllocationKind::Heap);
        assert!(buf.bytes().unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zeros_overflow() {
        let err = ElementBuffer::zeros(DataType::Float64, usize::MAX).unwrap_err();
        assert!(matches!(err, TableError::Overflow));
    }

    #[test]
    fn test_bytes_mut_detaches_shared_owned() {
        let mut a = ElementBuffer::from_typed_vec(TypedVec::I32(vec![1, 2]));
        let b = a.clone();
        assert_eq!(a.holder_count(), 2);
        a.bytes_mut().unwrap()[0] = 9;
        assert!(!a.shares_allocation(&b));
        assert_eq!(b.bytes().unwrap()[0], 1);
        assert_eq!(a.bytes().unwrap()[0], 9);
    }

    #[test]
    fn test_window_shares_allocation() {
        let buf = ElementBuffer::from_typed_vec(TypedVec::I32(vec![1, 2, 3, 4]));
        let win = buf.window(4..12);
        assert!(win.shares_allocation(&buf));
        assert_eq!(win.len(), 8);
        assert_eq!(bytemuck::cast_slice::<u8, i32>(win.bytes().unwrap()), &[2, 3]);
    }

    #[test]
    fn test_foreign_read_only() {
        let (ptr, len) = leak_f32(vec![1.0, 2.0]);
        let mut buf = unsafe { ForeignBuffer::new(ptr, len) }.build();
        assert!(!buf.is_owned());
        assert!(!buf.is_writable());
        assert!(matches!(buf.bytes_mut(), Err(TableError::ReadOnly)));
    }

    #[test]
    fn test_foreign_shared_write_rejected() {
        let (ptr, len) = leak_f32(vec![1.0, 2.0]);
        let mut buf = unsafe { ForeignBuffer::new(ptr, len) }.writable().build();
        let _other = buf.clone();
        assert!(matches!(
            buf.bytes_mut(),
            Err(TableError::SharedForeignBuffer)
        ));
    }

    #[test]
    fn test_check_writable() {
        let owned = ElementBuffer::zeros(DataType::Float32, 2).unwrap();
        let _owned_clone = owned.clone();
        assert!(owned.check_writable().is_ok());

        let (ptr, len) = leak_f32(vec![1.0, 2.0]);
        let read_only = unsafe { ForeignBuffer::new(ptr, len) }.build();
        assert!(matches!(read_only.check_writable(), Err(TableError::ReadOnly)));

        let (ptr, len) = leak_f32(vec![1.0, 2.0]);
        let writable = unsafe { ForeignBuffer::new(ptr, len) }.writable().build();
        assert!(writable.check_writable().is_ok());
        let window = writable.window(0..4);
        assert!(matches!(
            writable.check_writable(),
            Err(TableError::SharedForeignBuffer)
        ));
        drop(window);
        assert!(writable.check_writable().is_ok());
    }

    #[test]
    fn test_deleter_runs_on_last_drop() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let (ptr, len) = leak_f32(vec![0.0; 4]);
        let buf = unsafe { ForeignBuffer::new(ptr, len) }
            .deleter(|p, n| {
                assert_eq!(n, 16);
                unsafe {
                    drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                        p.as_ptr() as *mut f32,
                        4,
                    )));
                }
                CALLS.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let clone = buf.clone();
        drop(buf);
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
        drop(clone);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_device_memory_not_host_accessible() {
        let (ptr, len) = leak_f32(vec![0.0; 2]);
        let buf = unsafe { ForeignBuffer::new(ptr, len) }
            .kind(AllocationKind::Device)
            .build();
        assert!(matches!(
            buf.bytes(),
            Err(TableError::HostInaccessible(AllocationKind::Device))
        ));
    }

    #[test]
    fn test_readiness_consumed_on_access() {
        let (ptr, len) = leak_f32(vec![3.0; 2]);
        let event = HostEvent::new();
        let buf = unsafe { ForeignBuffer::new(ptr, len) }
            .kind(AllocationKind::Shared)
            .events(std::iter::once(event.clone()).collect())
            .build();
        assert!(!buf.is_ready());
        event.signal();
        assert!(buf.is_ready());
        assert_eq!(buf.bytes().unwrap().len(), 8);
        assert!(buf.is_ready());
    }
}
