//! Cross-platform helpers to query cache line size, page size, and total RAM.
//! Falls back to conservative defaults when unavailable.

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy)]
pub struct HostMemory {
    pub cache_line: usize, // bytes
    pub page_size: usize,  // bytes
    pub total_ram: u64,    // bytes
}

impl HostMemory {
    pub fn detect() -> Self {
        static INSTANCE: OnceLock<HostMemory> = OnceLock::new();
        *INSTANCE.get_or_init(Self::detect_impl)
    }

    fn detect_impl() -> Self {
        Self {
            cache_line: cache_line_size().unwrap_or(64),
            page_size: page_size().unwrap_or(4096),
            total_ram: total_ram_bytes().unwrap_or(1024 * 1024 * 1024),
        }
    }
}

/* -------------------------- Linux -------------------------- */

#[cfg(target_os = "linux")]
fn cache_line_size() -> Option<usize> {
    let text =
        std::fs::read_to_string("/sys/devices/system/cpu/cpu0/cache/index0/coherency_line_size")
            .ok()?;
    text.trim().parse::<usize>().ok().filter(|&n| n > 0)
}

#[cfg(target_os = "linux")]
fn page_size() -> Option<usize> {
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    (n > 0).then(|| n as usize)
}

#[cfg(target_os = "linux")]
fn total_ram_bytes() -> Option<u64> {
    let pages = unsafe { libc::sysconf(libc::_SC_PHYS_PAGES) };
    let page = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if pages > 0 && page > 0 {
        Some(pages as u64 * page as u64)
    } else {
        None
    }
}

/* -------------------------- macOS / iOS -------------------------- */

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn sysctl_u64(name: &str) -> Option<u64> {
    use std::ffi::CString;
    let cname = CString::new(name).ok()?;
    let mut value: u64 = 0;
    let mut len = std::mem::size_of::<u64>();
    let rc = unsafe {
        libc::sysctlbyname(
            cname.as_ptr(),
            &mut value as *mut u64 as *mut libc::c_void,
            &mut len,
            std::ptr::null_mut(),
            0,
        )
    };
    (rc == 0).then_some(value)
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn cache_line_size() -> Option<usize> {
    sysctl_u64("hw.cachelinesize").map(|v| v as usize)
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn page_size() -> Option<usize> {
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    (n > 0).then(|| n as usize)
}

#[cfg(any(target_os = "macos", target_os = "ios"))]
fn total_ram_bytes() -> Option<u64> {
    sysctl_u64("hw.memsize")
}

/* -------------------------- Windows -------------------------- */

#[cfg(target_os = "windows")]
fn cache_line_size() -> Option<usize> {
    // A deeper probe needs GetLogicalProcessorInformation; 64 covers every
    // x86_64/aarch64 desktop target we ship on.
    None
}

#[cfg(target_os = "windows")]
fn page_size() -> Option<usize> {
    use windows_sys::Win32::System::SystemInformation::{GetSystemInfo, SYSTEM_INFO};
    unsafe {
        let mut info: SYSTEM_INFO = std::mem::zeroed();
        GetSystemInfo(&mut info);
        (info.dwPageSize > 0).then(|| info.dwPageSize as usize)
    }
}

#[cfg(target_os = "windows")]
fn total_ram_bytes() -> Option<u64> {
    use windows_sys::Win32::System::SystemInformation::{GlobalMemoryStatusEx, MEMORYSTATUSEX};
    unsafe {
        let mut status: MEMORYSTATUSEX = std::mem::zeroed();
        status.dwLength = std::mem::size_of::<MEMORYSTATUSEX>() as u32;
        if GlobalMemoryStatusEx(&mut status) != 0 {
            Some(status.ullTotalPhys)
        } else {
            None
        }
    }
}

/* -------------------------- Fallback -------------------------- */

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows"
)))]
fn cache_line_size() -> Option<usize> {
    None
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows"
)))]
fn page_size() -> Option<usize> {
    None
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "windows"
)))]
fn total_ram_bytes() -> Option<u64> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_returns_sane_values() {
        let mem = HostMemory::detect();
        assert!(mem.cache_line >= 16);
        assert!(mem.page_size >= 512);
        assert!(mem.total_ram >= 64 * 1024 * 1024);
    }

    #[test]
    fn detect_is_cached() {
        let a = HostMemory::detect();
        let b = HostMemory::detect();
        assert_eq!(a.page_size, b.page_size);
        assert_eq!(a.total_ram, b.total_ram);
    }
}
