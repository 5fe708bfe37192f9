//! Runtime-introspection backends for JVM processes.
//!
//! Heap usage comes from `jstat -gc` and native-memory tracking totals from
//! `jcmd VM.native_memory`; the JDK serviceability tools are resolved once at
//! supplier construction and a missing JDK marks the supplier permanently
//! unusable. Per-poll failures (target exited, NMT disabled, attach refused)
//! are transient and yield no data for that poll only.
//!
//! The module also hosts [`RuntimeService`], the fire-and-forget GC and
//! heap-dump operations exposed through the monitor handle.

use super::{HardwareSupplier, Probe, SourceSample, SupplyError};
use ahash::AHashMap as HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

fn run_tool(tool: &Path, args: &[&str]) -> Result<String, SupplyError> {
    let output = Command::new(tool)
        .args(args)
        .output()
        .map_err(|e| SupplyError::Tool {
            tool: tool.display().to_string(),
            reason: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(SupplyError::Tool {
            tool: tool.display().to_string(),
            reason: format!(
                "exit {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parses `jstat -gc` output into (heap used, heap committed) in bytes.
///
/// The output is a header row of column names and one row of values; used
/// space is the sum of the survivor/eden/old `*U` columns and committed the
/// matching `*C` capacities. Values are kilobytes with a fractional part.
pub fn parse_jstat_gc(output: &str) -> Option<(u64, u64)> {
    let mut lines = output.lines();
    let header: Vec<&str> = lines.next()?.split_whitespace().collect();
    let values: Vec<f64> = lines
        .next()?
        .split_whitespace()
        .map(|v| v.parse().unwrap_or(0.0))
        .collect();
    if header.len() != values.len() {
        return None;
    }
    let columns: HashMap<&str, f64> = header.into_iter().zip(values).collect();

    let sum = |names: [&str; 4]| -> Option<f64> {
        names
            .iter()
            .map(|n| columns.get(n).copied())
            .sum::<Option<f64>>()
    };
    let used_kb = sum(["S0U", "S1U", "EU", "OU"])?;
    let committed_kb = sum(["S0C", "S1C", "EC", "OC"])?;
    Some(((used_kb * 1024.0) as u64, (committed_kb * 1024.0) as u64))
}

/// Parses the `Total:` line of `jcmd VM.native_memory summary scale=KB`
/// into (committed, reserved) in bytes.
pub fn parse_nmt_total(output: &str) -> Option<(u64, u64)> {
    let total = output.lines().map(str::trim).find(|l| l.starts_with("Total:"))?;
    let field = |name: &str| -> Option<u64> {
        let start = total.find(name)? + name.len();
        let rest = &total[start..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    };
    let reserved_kb = field("reserved=")?;
    let committed_kb = field("committed=")?;
    Some((committed_kb * 1024, reserved_kb * 1024))
}

struct JstatProbe {
    pid: u32,
    jstat: PathBuf,
}

impl Probe for JstatProbe {
    fn measure(&self) -> Result<SourceSample, SupplyError> {
        let out = run_tool(&self.jstat, &["-gc", &self.pid.to_string()])?;
        let (used, committed) = parse_jstat_gc(&out).ok_or_else(|| SupplyError::Tool {
            tool: self.jstat.display().to_string(),
            reason: "unrecognized jstat -gc output".into(),
        })?;
        Ok(SourceSample::RuntimeHeap { used, committed })
    }
}

struct NmtProbe {
    pid: u32,
    jcmd: PathBuf,
}

impl Probe for NmtProbe {
    fn measure(&self) -> Result<SourceSample, SupplyError> {
        let out = run_tool(
            &self.jcmd,
            &[
                &self.pid.to_string(),
                "VM.native_memory",
                "summary",
                "scale=KB",
            ],
        )?;
        let (committed, reserved) = parse_nmt_total(&out).ok_or_else(|| SupplyError::Tool {
            tool: self.jcmd.display().to_string(),
            // NMT off in the target is the usual cause here.
            reason: "no NMT total in jcmd output".into(),
        })?;
        Ok(SourceSample::RuntimeNative {
            committed,
            reserved,
        })
    }
}

pub fn heap_supplier(pid: u32) -> HardwareSupplier {
    match which::which("jstat") {
        Ok(jstat) => HardwareSupplier::new(pid, Box::new(JstatProbe { pid, jstat })),
        Err(_) => HardwareSupplier::unusable(pid, "jstat not found on PATH"),
    }
}

pub fn native_supplier(pid: u32) -> HardwareSupplier {
    match which::which("jcmd") {
        Ok(jcmd) => HardwareSupplier::new(pid, Box::new(NmtProbe { pid, jcmd })),
        Err(_) => HardwareSupplier::unusable(pid, "jcmd not found on PATH"),
    }
}

/// Runtime maintenance operations on followed JVMs.
///
/// Both operations are best-effort: a missing JDK or an exited target is
/// logged and swallowed, matching the fire-and-forget control contract.
pub struct RuntimeService {
    jcmd: Option<PathBuf>,
}

impl RuntimeService {
    pub fn new() -> Self {
        let jcmd = which::which("jcmd").ok();
        if jcmd.is_none() {
            info!("jcmd not found on PATH; GC and heap-dump requests will be ignored");
        }
        Self { jcmd }
    }

    /// Asks the target JVM to run a full garbage collection.
    pub fn trigger_gc(&self, pid: u32) {
        self.run(pid, &["GC.run"]);
    }

    /// Asks the target JVM to dump its heap to the given path.
    pub fn heap_dump(&self, pid: u32, path: &Path) {
        self.run(pid, &["GC.heap_dump", &path.display().to_string()]);
    }

    fn run(&self, pid: u32, args: &[&str]) {
        let Some(jcmd) = &self.jcmd else {
            return;
        };
        let mut full: Vec<String> = vec![pid.to_string()];
        full.extend(args.iter().map(|s| s.to_string()));
        match run_tool(jcmd, &full.iter().map(String::as_str).collect::<Vec<_>>()) {
            Ok(_) => debug!(pid, command = args[0], "runtime command completed"),
            Err(e) => info!(pid, command = args[0], error = %e, "runtime command failed"),
        }
    }
}

impl Default for RuntimeService {
    fn default() -> Self {
        Self::new()
    }
}
