// src/scheduler.rs
//! Once-a-day job runner polled from the main task.

use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// Work run when a scheduled job fires. Gets the local calendar day it fired on.
#[async_trait::async_trait]
pub trait JobAction: Send + Sync {
    async fn run(&self, today: NaiveDate);
}

pub struct ScheduledJob {
    pub name: &'static str,
    pub at: NaiveTime,
    pub next_run: NaiveDateTime,
    action: Box<dyn JobAction>,
}

/// First time at or after `now` when a job set for `at` should fire.
///
/// A time-of-day already reached today rolls over to tomorrow.
pub fn next_fire(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if now < today {
        today
    } else {
        day_after(at, now.date())
    }
}

/// The slot on the calendar day following `fired_on`.
///
/// A late tick (suspend, clock step) that fires on day D must not fire again on D.
pub fn day_after(at: NaiveTime, fired_on: NaiveDate) -> NaiveDateTime {
    // succ_opt is None only at NaiveDate::MAX.
    fired_on.succ_opt().unwrap_or(fired_on).and_time(at)
}

/// Daily jobs kept sorted by their next fire time.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` to run every day at local time `at`, first after `now`.
    pub fn every_day_at<A>(&mut self, name: &'static str, at: NaiveTime, action: A, now: NaiveDateTime)
    where
        A: JobAction + 'static,
    {
        let next_run = next_fire(at, now);
        tracing::info!(target: "scheduler", job = name, %at, %next_run, "job registered");
        self.jobs.push(ScheduledJob {
            name,
            at,
            next_run,
            action: Box::new(action),
        });
        self.jobs.sort_by_key(|j| j.next_run);
    }

    pub fn jobs(&self) -> &[ScheduledJob] {
        &self.jobs
    }

    /// Run every job whose fire time has come. Each fires at most once per call
    /// and is rescheduled for the day after the one it fired on. Returns how many ran.
    pub async fn run_pending(&mut self, now: NaiveDateTime) -> usize {
        let mut ran = 0;
        for job in self.jobs.iter_mut().filter(|j| j.next_run <= now) {
            tracing::info!(target: "scheduler", job = job.name, "running job");
            job.action.run(now.date()).await;
            job.next_run = day_after(job.at, now.date());
            ran += 1;
        }
        if ran > 0 {
            self.jobs.sort_by_key(|j| j.next_run);
        }
        ran
    }

    /// Poll against the local clock forever.
    pub async fn run_forever(mut self, tick: Duration) {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_pending(Local::now().naive_local()).await;
        }
    }
}

/// Parse `HH:MM` (or `HH:MM:SS`) into a time of day.
pub fn parse_time_of_day(s: &str) -> anyhow::Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|e| anyhow::anyhow!("invalid time of day {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn dt(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    struct Count(Arc<Mutex<Vec<NaiveDate>>>);

    #[async_trait::async_trait]
    impl JobAction for Count {
        async fn run(&self, today: NaiveDate) {
            self.0.lock().unwrap().push(today);
        }
    }

    #[test]
    fn next_fire_today_or_tomorrow() {
        let at = NaiveTime::from_hms_opt(16, 55, 0).unwrap();
        assert_eq!(next_fire(at, dt(1, 9, 0)), dt(1, 16, 55));
        assert_eq!(next_fire(at, dt(1, 16, 55)), dt(2, 16, 55));
        assert_eq!(next_fire(at, dt(1, 23, 0)), dt(2, 16, 55));
    }

    #[test]
    fn parses_clock_strings() {
        assert_eq!(
            parse_time_of_day("16:55").unwrap(),
            NaiveTime::from_hms_opt(16, 55, 0).unwrap()
        );
        assert!(parse_time_of_day("25:00").is_err());
    }

    #[tokio::test]
    async fn fires_once_per_day() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let at = NaiveTime::from_hms_opt(16, 55, 0).unwrap();
        let mut s = Scheduler::new();
        s.every_day_at("daily", at, Count(seen.clone()), dt(1, 9, 0));

        assert_eq!(s.run_pending(dt(1, 16, 54)).await, 0);
        assert_eq!(s.run_pending(dt(1, 16, 55)).await, 1);
        // Later ticks the same day do nothing.
        assert_eq!(s.run_pending(dt(1, 16, 56)).await, 0);
        assert_eq!(s.run_pending(dt(1, 23, 59)).await, 0);
        assert_eq!(s.run_pending(dt(2, 16, 55)).await, 1);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![dt(1, 0, 0).date(), dt(2, 0, 0).date()]
        );
    }

    #[tokio::test]
    async fn late_tick_after_midnight_still_fires_once_that_day() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let at = NaiveTime::from_hms_opt(16, 55, 0).unwrap();
        let mut s = Scheduler::new();
        s.every_day_at("daily", at, Count(seen.clone()), dt(1, 9, 0));

        // Host slept through day 1's slot and woke on day 2.
        assert_eq!(s.run_pending(dt(2, 0, 10)).await, 1);
        assert_eq!(s.jobs()[0].next_run, dt(3, 16, 55));
        assert_eq!(s.run_pending(dt(2, 16, 55)).await, 0);
        assert_eq!(s.run_pending(dt(3, 16, 55)).await, 1);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![dt(2, 0, 0).date(), dt(3, 0, 0).date()]
        );
    }

    #[tokio::test]
    async fn registered_after_time_waits_for_tomorrow() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let at = NaiveTime::from_hms_opt(16, 55, 0).unwrap();
        let mut s = Scheduler::new();
        s.every_day_at("daily", at, Count(seen.clone()), dt(1, 18, 0));
        assert_eq!(s.run_pending(dt(1, 18, 1)).await, 0);
        assert_eq!(s.jobs()[0].next_run, dt(2, 16, 55));
    }
}
