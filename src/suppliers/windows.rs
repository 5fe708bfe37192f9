//! Native Windows memory counters via the process-status API.
//!
//! The probe opens the target with the minimal query rights, reads one
//! `PROCESS_MEMORY_COUNTERS_EX` structure, and releases the handle on every
//! path through the RAII guard.

use super::{HardwareSupplier, Probe, SourceSample, SupplyError};
use crate::catalog::HostOs;
use windows_sys::Win32::Foundation::{CloseHandle, HANDLE};
use windows_sys::Win32::System::ProcessStatus::{
    K32GetProcessMemoryInfo, PROCESS_MEMORY_COUNTERS, PROCESS_MEMORY_COUNTERS_EX,
};
use windows_sys::Win32::System::Threading::{
    OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
};

struct ProcessHandle(HANDLE);

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // Unconditional release, success or failure.
        unsafe {
            CloseHandle(self.0);
        }
    }
}

struct CountersProbe {
    pid: u32,
}

impl Probe for CountersProbe {
    fn measure(&self) -> Result<SourceSample, SupplyError> {
        let raw = unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, 0, self.pid) };
        if raw.is_null() {
            return Err(SupplyError::Platform(format!(
                "OpenProcess failed for pid {}",
                self.pid
            )));
        }
        let handle = ProcessHandle(raw);

        let mut counters: PROCESS_MEMORY_COUNTERS_EX = unsafe { std::mem::zeroed() };
        counters.cb = std::mem::size_of::<PROCESS_MEMORY_COUNTERS_EX>() as u32;
        let ok = unsafe {
            K32GetProcessMemoryInfo(
                handle.0,
                &mut counters as *mut PROCESS_MEMORY_COUNTERS_EX as *mut PROCESS_MEMORY_COUNTERS,
                counters.cb,
            )
        };
        if ok == 0 {
            return Err(SupplyError::Platform(format!(
                "GetProcessMemoryInfo failed for pid {}",
                self.pid
            )));
        }

        Ok(SourceSample::Windows {
            working_set: counters.WorkingSetSize as u64,
            private_bytes: counters.PrivateUsage as u64,
        })
    }
}

pub fn counters_supplier(pid: u32, host: HostOs) -> HardwareSupplier {
    if host != HostOs::Windows {
        return HardwareSupplier::unusable(pid, "windows counters need a windows host");
    }
    HardwareSupplier::new(pid, Box::new(CountersProbe { pid }))
}
