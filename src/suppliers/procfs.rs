//! File-scraping backends for the Linux /proc pseudo-filesystem.
//!
//! Two probes: `/proc/<pid>/status` for VmRSS, and `/proc/<pid>/smaps_rollup`
//! for Pss and the private pages that make up USS. Values are reported by
//! the kernel in kilobytes and converted to bytes here. A vanished file or
//! missing field means the process exited mid-poll and is a soft failure.

use super::{HardwareSupplier, Probe, SourceSample, SupplyError};
use crate::catalog::HostOs;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

const VMRSS_PREFIX: &str = "VmRSS:";
const PSS_PREFIX: &str = "Pss:";
const PRIVATE_CLEAN_PREFIX: &str = "Private_Clean:";
const PRIVATE_DIRTY_PREFIX: &str = "Private_Dirty:";

/// Parses the kilobyte count out of a `Field:   1234 kB` value.
pub fn parse_kb_value(v: &str) -> Option<u64> {
    v.split_whitespace().next()?.parse().ok()
}

fn open(path: &Path) -> Result<BufReader<fs::File>, SupplyError> {
    let file = fs::File::open(path).map_err(|source| SupplyError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(BufReader::new(file))
}

/// Reads VmRSS from `/proc/<pid>/status`, stopping at the first match.
pub struct StatusProbe {
    path: PathBuf,
}

impl Probe for StatusProbe {
    fn measure(&self) -> Result<SourceSample, SupplyError> {
        let reader = open(&self.path)?;
        for line in reader.lines() {
            let line = line.map_err(|source| SupplyError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
            if let Some(v) = line.strip_prefix(VMRSS_PREFIX) {
                if let Some(kb) = parse_kb_value(v) {
                    return Ok(SourceSample::Resident { rss: kb * 1024 });
                }
            }
        }
        Err(SupplyError::IncompleteData {
            path: self.path.display().to_string(),
        })
    }
}

/// Sums Pss and private pages across `/proc/<pid>/smaps_rollup`.
pub struct SmapsProbe {
    path: PathBuf,
}

impl Probe for SmapsProbe {
    fn measure(&self) -> Result<SourceSample, SupplyError> {
        let reader = open(&self.path)?;
        let mut pss_kb: Option<u64> = None;
        let mut private_clean_kb = 0u64;
        let mut private_dirty_kb = 0u64;
        let mut saw_private = false;

        for line in reader.lines() {
            let line = line.map_err(|source| SupplyError::Io {
                path: self.path.display().to_string(),
                source,
            })?;
            if let Some(v) = line.strip_prefix(PSS_PREFIX) {
                *pss_kb.get_or_insert(0) += parse_kb_value(v).unwrap_or(0);
            } else if let Some(v) = line.strip_prefix(PRIVATE_CLEAN_PREFIX) {
                private_clean_kb += parse_kb_value(v).unwrap_or(0);
                saw_private = true;
            } else if let Some(v) = line.strip_prefix(PRIVATE_DIRTY_PREFIX) {
                private_dirty_kb += parse_kb_value(v).unwrap_or(0);
                saw_private = true;
            }
        }

        match (pss_kb, saw_private) {
            (Some(pss), true) => Ok(SourceSample::Smaps {
                pss: pss * 1024,
                uss: (private_clean_kb + private_dirty_kb) * 1024,
            }),
            _ => Err(SupplyError::IncompleteData {
                path: self.path.display().to_string(),
            }),
        }
    }
}

fn proc_file(pid: u32, file: &str) -> PathBuf {
    Path::new("/proc").join(pid.to_string()).join(file)
}

fn file_supplier(pid: u32, host: HostOs, path: PathBuf, probe: fn(PathBuf) -> Box<dyn Probe>) -> HardwareSupplier {
    if host != HostOs::Linux {
        return HardwareSupplier::unusable(pid, "procfs source needs a linux host");
    }
    if !path.exists() {
        // The process most likely exited between discovery and follow.
        return HardwareSupplier::unusable(pid, "procfs source file does not exist");
    }
    HardwareSupplier::new(pid, probe(path))
}

pub fn status_supplier(pid: u32, host: HostOs) -> HardwareSupplier {
    file_supplier(pid, host, proc_file(pid, "status"), |path| {
        Box::new(StatusProbe { path })
    })
}

pub fn smaps_supplier(pid: u32, host: HostOs) -> HardwareSupplier {
    file_supplier(pid, host, proc_file(pid, "smaps_rollup"), |path| {
        Box::new(SmapsProbe { path })
    })
}
