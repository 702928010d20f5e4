//! Platform backends. Each function maps to exactly one OS call sequence;
//! bookkeeping is done by the caller.

#![allow(unsafe_code)]

pub(crate) use imp::*;

fn last_os_error() -> Option<i32> {
    std::io::Error::last_os_error().raw_os_error()
}

#[cfg(unix)]
mod imp {
    use std::ptr::{self, NonNull};

    use super::last_os_error;

    pub(crate) fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGE_SIZE) };
        if page_size < 1 {
            panic!("unsupported page size {page_size}");
        }
        page_size as usize
    }

    /// Map `len` bytes of inaccessible address space.
    pub(crate) fn reserve(len: usize) -> Result<NonNull<u8>, Option<i32>> {
        // SAFETY: anonymous private mapping at a kernel-chosen address.
        let ptr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(last_os_error());
        }
        NonNull::new(ptr.cast()).ok_or(None)
    }

    /// Make `[ptr, ptr + len)` readable and writable.
    ///
    /// # Safety
    ///
    /// The range must lie inside a live mapping returned by [`reserve`].
    pub(crate) unsafe fn commit(ptr: *mut u8, len: usize) -> Result<(), Option<i32>> {
        // SAFETY: caller guarantees the range is inside our mapping.
        let rc = unsafe { libc::mprotect(ptr.cast(), len, libc::PROT_READ | libc::PROT_WRITE) };
        if rc != 0 {
            return Err(last_os_error());
        }
        Ok(())
    }

    /// Make `[ptr, ptr + len)` inaccessible and let the kernel drop its pages.
    ///
    /// # Safety
    ///
    /// The range must lie inside a live mapping returned by [`reserve`] and
    /// must not be referenced afterwards.
    pub(crate) unsafe fn decommit(ptr: *mut u8, len: usize) -> Result<(), Option<i32>> {
        // SAFETY: caller guarantees the range is inside our mapping and unused.
        let rc = unsafe { libc::mprotect(ptr.cast(), len, libc::PROT_NONE) };
        if rc != 0 {
            return Err(last_os_error());
        }
        // Advisory only; a failure here leaves the pages resident but
        // inaccessible, which is still correct.
        // SAFETY: same range as above.
        unsafe { libc::madvise(ptr.cast(), len, libc::MADV_DONTNEED) };
        Ok(())
    }

    /// Unmap the whole mapping.
    ///
    /// # Safety
    ///
    /// `ptr`/`len` must describe a mapping returned by [`reserve`] that is
    /// not referenced afterwards.
    pub(crate) unsafe fn release(ptr: *mut u8, len: usize) -> Result<(), Option<i32>> {
        // SAFETY: caller guarantees exclusive ownership of the mapping.
        let rc = unsafe { libc::munmap(ptr.cast(), len) };
        if rc != 0 {
            return Err(last_os_error());
        }
        Ok(())
    }
}

#[cfg(windows)]
mod imp {
    use std::mem;
    use std::ptr::{self, NonNull};

    use windows_sys::Win32::System::Memory::{
        VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE, MEM_RESERVE,
        PAGE_NOACCESS, PAGE_READWRITE,
    };
    use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};

    use super::last_os_error;

    pub(crate) fn page_size() -> usize {
        // SAFETY: SYSTEM_INFO is plain data, valid when zeroed, and
        // GetSystemInfo only writes through the pointer it is given.
        let info = unsafe {
            let mut info: SYSTEM_INFO = mem::zeroed();
            GetSystemInfo(&mut info);
            info
        };
        info.dwPageSize as usize
    }

    pub(crate) fn reserve(len: usize) -> Result<NonNull<u8>, Option<i32>> {
        // SAFETY: reserving at a system-chosen address.
        let ptr = unsafe { VirtualAlloc(ptr::null(), len, MEM_RESERVE, PAGE_NOACCESS) };
        NonNull::new(ptr.cast()).ok_or_else(last_os_error)
    }

    pub(crate) unsafe fn commit(ptr: *mut u8, len: usize) -> Result<(), Option<i32>> {
        // SAFETY: caller guarantees the range is inside our reservation.
        let p = unsafe { VirtualAlloc(ptr.cast(), len, MEM_COMMIT, PAGE_READWRITE) };
        if p.is_null() {
            return Err(last_os_error());
        }
        Ok(())
    }

    pub(crate) unsafe fn decommit(ptr: *mut u8, len: usize) -> Result<(), Option<i32>> {
        // SAFETY: caller guarantees the range is inside our reservation and unused.
        let ok = unsafe { VirtualFree(ptr.cast(), len, MEM_DECOMMIT) };
        if ok == 0 {
            return Err(last_os_error());
        }
        Ok(())
    }

    pub(crate) unsafe fn release(ptr: *mut u8, _len: usize) -> Result<(), Option<i32>> {
        // Size must be 0 for MEM_RELEASE.
        // SAFETY: caller guarantees exclusive ownership of the reservation.
        let ok = unsafe { VirtualFree(ptr.cast(), 0, MEM_RELEASE) };
        if ok == 0 {
            return Err(last_os_error());
        }
        Ok(())
    }
}
