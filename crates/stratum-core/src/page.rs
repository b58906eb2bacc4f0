//! Page-granular virtual memory
//!
//! Every request is satisfied by a private, anonymous, zero-initialized
//! mapping rounded up to the system page size; there is no sub-page
//! allocation. On non-Unix targets the mapping falls back to the standard
//! allocator with page alignment, preserving the same contract.

use std::ptr::NonNull;

use crate::error::Error;

/// System page size in bytes.
#[cfg(unix)]
pub fn page_size() -> usize {
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        4096
    }
}

/// System page size in bytes.
#[cfg(not(unix))]
pub fn page_size() -> usize {
    4096
}

/// Round a request up to a whole number of pages.
///
/// Returns `None` on arithmetic overflow; zero rounds to zero and is
/// rejected by [`map_anonymous`].
pub fn round_up_to_page(bytes: usize) -> Option<usize> {
    let page = page_size();
    let rounded = bytes.checked_add(page - 1)? / page * page;
    Some(rounded)
}

/// Map a private anonymous read/write region of `len` bytes.
pub(crate) fn map_anonymous(len: usize) -> Result<NonNull<u8>, Error> {
    if len == 0 {
        return Err(Error::MapFailed { bytes: len });
    }

    map_impl(len).ok_or(Error::MapFailed { bytes: len })
}

/// Unmap a region previously returned by [`map_anonymous`].
///
/// # Safety
///
/// `ptr` must come from a successful `map_anonymous(len)` with the same
/// `len`, and must not be used afterwards.
pub(crate) unsafe fn unmap(ptr: NonNull<u8>, len: usize) {
    unmap_impl(ptr, len)
}

#[cfg(unix)]
fn map_impl(len: usize) -> Option<NonNull<u8>> {
    let ptr = unsafe {
        libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        )
    };

    if ptr == libc::MAP_FAILED {
        return None;
    }

    NonNull::new(ptr as *mut u8)
}

#[cfg(unix)]
unsafe fn unmap_impl(ptr: NonNull<u8>, len: usize) {
    libc::munmap(ptr.as_ptr() as *mut libc::c_void, len);
}

#[cfg(not(unix))]
fn map_impl(len: usize) -> Option<NonNull<u8>> {
    let layout = std::alloc::Layout::from_size_align(len, page_size()).ok()?;
    NonNull::new(unsafe { std::alloc::alloc_zeroed(layout) })
}

#[cfg(not(unix))]
unsafe fn unmap_impl(ptr: NonNull<u8>, len: usize) {
    if let Ok(layout) = std::alloc::Layout::from_size_align(len, page_size()) {
        std::alloc::dealloc(ptr.as_ptr(), layout);
    }
}
