//! Real-time scheduling helpers (Linux SCHED_FIFO / affinity / mlockall;
//! other platforms are a logged no-op).

use crate::cli::RtLock;

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>, lock: RtLock, rt_cpu: Option<usize>) {
    use libc::{
        mlockall, sched_get_priority_max, sched_get_priority_min, sched_param,
        sched_setscheduler, CPU_SET, CPU_ZERO, MCL_CURRENT, MCL_FUTURE, SCHED_FIFO,
    };
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }

    fn apply_mem_lock(lock: RtLock) -> std::io::Result<()> {
        let flags = match lock {
            RtLock::None => return Ok(()),
            RtLock::Current => MCL_CURRENT,
            RtLock::All => MCL_CURRENT | MCL_FUTURE,
        };
        if unsafe { mlockall(flags) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    fn apply_fifo_priority(prio: Option<i32>) -> std::io::Result<()> {
        let (min, max) = unsafe {
            let min = sched_get_priority_min(SCHED_FIFO);
            let max = sched_get_priority_max(SCHED_FIFO);
            if min < 0 || max < 0 {
                (1, 99)
            } else {
                (min, max)
            }
        };
        let param = sched_param {
            sched_priority: prio.unwrap_or(max).clamp(min, max),
        };
        if unsafe { sched_setscheduler(0, SCHED_FIFO, &param) } != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    fn apply_affinity(rt_cpu: Option<usize>) -> std::io::Result<()> {
        let target = rt_cpu.unwrap_or(0);
        let max_bits = std::mem::size_of::<libc::cpu_set_t>() * 8;
        if target >= max_bits {
            return Err(std::io::Error::other("cpu index out of cpu_set_t range"));
        }
        let mut desired: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe {
            CPU_ZERO(&mut desired);
            CPU_SET(target, &mut desired);
        }
        let rc = unsafe {
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &desired)
        };
        if rc != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    RT_ONCE.get_or_init(|| {
        match apply_mem_lock(lock) {
            Ok(()) => tracing::info!(?lock, "rt: memory lock applied"),
            Err(err) => {
                tracing::warn!(%err, "rt: mlockall failed (needs CAP_IPC_LOCK or 'ulimit -l')");
            }
        }
        if let Err(err) = apply_fifo_priority(prio) {
            tracing::warn!(%err, "rt: SCHED_FIFO not applied (needs CAP_SYS_NICE or root)");
        }
        if let Err(err) = apply_affinity(rt_cpu) {
            tracing::warn!(%err, "rt: affinity not applied");
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>, _lock: RtLock, _rt_cpu: Option<usize>) {
    if rt {
        tracing::warn!("rt: real-time scheduling is only supported on Linux; continuing without it");
    }
}
