//! Process group supervision
//!
//! Every judged program leads its own process group, so anything it starts
//! (a compiled binary under `go run`, an interpreter called from a script)
//! is measured and killed together with it.

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use procfs::process::all_processes;
use tracing::debug;

/// Memory of one live group member, in kilobytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberMemory {
    pub resident_kb: u64,
    /// The member's own high-water mark since its last exec
    pub peak_resident_kb: u64,
}

/// A process group led by a spawned child.
///
/// Dropping it sends SIGKILL to every remaining member.
#[derive(Debug)]
pub struct ProcessGroup {
    pgid: i32,
}

impl ProcessGroup {
    /// Adopt the group led by `leader`, which must have been spawned with
    /// `process_group(0)`
    pub fn new(leader: u32) -> Option<Self> {
        i32::try_from(leader).ok().map(|pgid| Self { pgid })
    }

    pub fn id(&self) -> i32 {
        self.pgid
    }

    /// Kill every member. A group that is already gone is not an error.
    pub fn kill(&self) {
        match killpg(Pid::from_raw(self.pgid), Signal::SIGKILL) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => debug!(pgid = self.pgid, error = %e, "failed to kill process group"),
        }
    }

    /// Memory of every live member, scanned off the async workers
    pub async fn sample(&self) -> Vec<MemberMemory> {
        let pgid = self.pgid;
        tokio::task::spawn_blocking(move || group_members(pgid))
            .await
            .unwrap_or_default()
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Zombies and processes that exit mid-scan are skipped.
fn group_members(pgid: i32) -> Vec<MemberMemory> {
    let processes = match all_processes() {
        Ok(processes) => processes,
        Err(e) => {
            debug!(error = %e, "procfs unavailable");
            return Vec::new();
        }
    };

    processes
        .filter_map(Result::ok)
        .filter_map(|process| {
            let stat = process.stat().ok()?;
            if stat.pgrp != pgid {
                return None;
            }
            let status = process.status().ok()?;
            let resident_kb = status.vmrss?;
            Some(MemberMemory {
                resident_kb,
                peak_resident_kb: status.vmhwm.unwrap_or(resident_kb).max(resident_kb),
            })
        })
        .collect()
}

/// Running peak of a group's memory use across samples.
///
/// The peak is the larger of the biggest combined resident size seen at one
/// sample and the biggest single-member high-water mark, which also covers
/// spikes a member had between samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryPeak {
    combined_kb: u64,
    single_kb: u64,
}

impl MemoryPeak {
    pub fn observe(&mut self, members: &[MemberMemory]) {
        let combined: u64 = members.iter().map(|member| member.resident_kb).sum();
        self.combined_kb = self.combined_kb.max(combined);
        for member in members {
            self.single_kb = self.single_kb.max(member.peak_resident_kb);
        }
    }

    pub fn kb(&self) -> u64 {
        self.combined_kb.max(self.single_kb)
    }
}
