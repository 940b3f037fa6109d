//! Real-time setup for the control thread (Linux SCHED_FIFO + mlockall).
//!
//! Everything here is best effort: failures are logged and the loop runs
//! with normal scheduling.

#[cfg(target_os = "linux")]
pub fn setup_rt_once(prio: Option<i32>) {
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    fn lock_memory() -> eyre::Result<&'static str> {
        use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};
        let rc = unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) };
        if rc == 0 {
            return Ok("current|future");
        }
        let all_err = std::io::Error::last_os_error();
        let rc = unsafe { mlockall(MCL_CURRENT) };
        if rc == 0 {
            return Ok("current");
        }
        let cur_err = std::io::Error::last_os_error();
        eyre::bail!(
            "mlockall(current|future) failed: {all_err}; mlockall(current) failed: {cur_err}; \
             hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'"
        )
    }

    fn fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        use libc::{
            SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param,
            sched_setscheduler,
        };
        let (min, max) = unsafe {
            let min = sched_get_priority_min(SCHED_FIFO);
            let max = sched_get_priority_max(SCHED_FIFO);
            if min < 0 || max < 0 { (1, 99) } else { (min, max) }
        };
        let prio = prio.unwrap_or(max).clamp(min, max);
        let param = sched_param {
            sched_priority: prio,
        };
        let rc = unsafe { sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            eyre::bail!("sched_setscheduler(SCHED_FIFO, {prio}) failed: {err}; needs CAP_SYS_NICE or root");
        }
        Ok(prio)
    }

    RT_ONCE.get_or_init(|| {
        match lock_memory() {
            Ok(mode) => tracing::info!(mode, "rt: memory locked"),
            Err(err) => tracing::warn!(error = %err, "rt: memory lock not applied"),
        }
        match fifo_priority(prio) {
            Ok(p) => tracing::info!(priority = p, "rt: SCHED_FIFO applied"),
            Err(err) => tracing::warn!(error = %err, "rt: SCHED_FIFO not applied"),
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(_prio: Option<i32>) {
    tracing::warn!("rt: real-time mode is only supported on Linux; ignoring --rt");
}
