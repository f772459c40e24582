// CardioMon — Tick Scheduler
//
// One recurring 1 kHz hardware timer interrupt drives every periodic job in
// the firmware.  The interrupt body does exactly one thing: feed the tick
// into this scheduler, which walks a fixed, ordered table of
// `{divisor, task}` entries and reports the tasks due on this tick.
//
// The scheduler never performs the work itself — dispatch is a callback so
// the interrupt context can reduce each task to a flag/counter store and
// leave bus transactions to the main loop.

use crate::config::*;

/// Identity of a periodic job.  The set is fixed at build time; there is no
/// dynamic registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskId {
    /// 200 Hz — take one ECG sample.
    EcgSample,
    /// 50 Hz — run one PPG pipeline step.
    PpgStep,
    /// 10 Hz — refresh the display.
    UiRefresh,
    /// 1 Hz — epoch boundary: seconds counter + transmit cadence.
    Epoch,
}

/// One row of the dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct TaskEntry {
    pub divisor: u32,
    pub task: TaskId,
}

/// The firmware's task table, in dispatch order.  Ordering within a tick is
/// deterministic and follows this table top to bottom.
pub const TASK_TABLE: [TaskEntry; 3] = [
    TaskEntry { divisor: DIV_ECG, task: TaskId::EcgSample },
    TaskEntry { divisor: DIV_PPG, task: TaskId::PpgStep },
    TaskEntry { divisor: DIV_UI, task: TaskId::UiRefresh },
];

pub struct TickScheduler<const N: usize> {
    table: [TaskEntry; N],
    epoch_ticks: u32,
    tick: u32,
    seconds: u32,
}

impl<const N: usize> TickScheduler<N> {
    pub const fn new(table: [TaskEntry; N], epoch_ticks: u32) -> Self {
        Self {
            table,
            epoch_ticks,
            tick: 0,
            seconds: 0,
        }
    }

    /// Advance one tick and dispatch every task whose divisor divides the new
    /// tick count.  The epoch task fires when the counter reaches the epoch
    /// length, before the counter resets to zero.
    pub fn on_tick(&mut self, mut dispatch: impl FnMut(TaskId)) {
        self.tick += 1;

        for entry in &self.table {
            if self.tick % entry.divisor == 0 {
                dispatch(entry.task);
            }
        }

        if self.tick >= self.epoch_ticks {
            self.seconds = self.seconds.wrapping_add(1);
            dispatch(TaskId::Epoch);
            self.tick = 0;
        }
    }

    /// Whole seconds elapsed since start (number of completed epochs).
    pub fn elapsed_seconds(&self) -> u32 {
        self.seconds
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
#[cfg(test)]
mod tests {
    use super::*;

    fn run_ticks(n: u32) -> Vec<(u32, TaskId)> {
        let mut sched = TickScheduler::new(TASK_TABLE, EPOCH_TICKS);
        let mut fired = Vec::new();
        for tick in 1..=n {
            sched.on_tick(|task| fired.push((tick, task)));
        }
        fired
    }

    #[test]
    fn tasks_fire_only_on_divisor_multiples() {
        let fired = run_ticks(EPOCH_TICKS);
        for entry in &TASK_TABLE {
            let ticks: Vec<u32> = fired
                .iter()
                .filter(|(_, t)| *t == entry.task)
                .map(|(tick, _)| *tick)
                .collect();
            let expected: Vec<u32> = (1..=EPOCH_TICKS)
                .filter(|t| t % entry.divisor == 0)
                .collect();
            assert_eq!(ticks, expected, "divisor {}", entry.divisor);
        }
    }

    #[test]
    fn dispatch_order_matches_table_order() {
        // Tick 100 is a multiple of 5, 20 and 100 — all three table entries
        // must fire, in table order.
        let fired = run_ticks(100);
        let at_100: Vec<TaskId> = fired
            .iter()
            .filter(|(tick, _)| *tick == 100)
            .map(|(_, t)| *t)
            .collect();
        assert_eq!(
            at_100,
            vec![TaskId::EcgSample, TaskId::PpgStep, TaskId::UiRefresh]
        );
    }

    #[test]
    fn epoch_fires_once_per_second_after_table_tasks() {
        let fired = run_ticks(3 * EPOCH_TICKS);
        let epochs: Vec<u32> = fired
            .iter()
            .filter(|(_, t)| *t == TaskId::Epoch)
            .map(|(tick, _)| *tick)
            .collect();
        assert_eq!(epochs, vec![EPOCH_TICKS, 2 * EPOCH_TICKS, 3 * EPOCH_TICKS]);

        // On the epoch tick itself the table tasks still run first.
        let at_epoch: Vec<TaskId> = fired
            .iter()
            .filter(|(tick, _)| *tick == EPOCH_TICKS)
            .map(|(_, t)| *t)
            .collect();
        assert_eq!(at_epoch.last(), Some(&TaskId::Epoch));
        assert_eq!(at_epoch.len(), 4);
    }

    #[test]
    fn counter_resets_and_rates_stay_periodic_across_epochs() {
        let fired = run_ticks(2 * EPOCH_TICKS);
        let ecg_count = fired
            .iter()
            .filter(|(_, t)| *t == TaskId::EcgSample)
            .count();
        // 200 Hz for two seconds.
        assert_eq!(ecg_count, 2 * (EPOCH_TICKS / DIV_ECG) as usize);
    }

    #[test]
    fn elapsed_seconds_counts_epochs() {
        let mut sched = TickScheduler::new(TASK_TABLE, EPOCH_TICKS);
        for _ in 0..(5 * EPOCH_TICKS + 17) {
            sched.on_tick(|_| {});
        }
        assert_eq!(sched.elapsed_seconds(), 5);
    }
}
