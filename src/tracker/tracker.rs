use std::time::Duration;

use super::clock::{Clock, SystemClock};
use crate::passes::{PassSchedule, PositionSample};
use crate::rotctld::{normalize_azimuth, normalize_elevation, Rotator, RotctldError};
use crate::shutdown::ShutdownToken;

/// Longest uninterrupted sleep, bounds how long a Ctrl-C goes unnoticed.
const MAX_SLEEP_SLICE: Duration = Duration::from_secs(1);
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How far past the last position tracking may run after a stall.
const LATE_LIMIT: chrono::Duration = chrono::Duration::seconds(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum TrackOutcome {
    /// The last scheduled position was sent to the rotator.
    Completed,
    Cancelled,
    /// The schedule ended before its last position could be sent.
    Missed,
}

/// Drives a rotator along a [`PassSchedule`] and records where the antenna
/// actually pointed on the way.
pub struct Tracker<C: Clock = SystemClock> {
    clock: C,
    poll_interval: Duration,
    shutdown: ShutdownToken,
    actual: Vec<PositionSample>,
}

impl Tracker<SystemClock> {
    pub fn new(poll_interval: Duration, shutdown: ShutdownToken) -> Self {
        Self::with_clock(SystemClock, poll_interval, shutdown)
    }
}

impl<C: Clock> Tracker<C> {
    pub fn with_clock(clock: C, poll_interval: Duration, shutdown: ShutdownToken) -> Self {
        Self {
            clock,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            shutdown,
            actual: Vec::new(),
        }
    }

    /// Positions reported by the rotator during the last [`Tracker::track`]
    /// call, kept even when tracking ended with an error.
    pub fn actual_positions(&self) -> &[PositionSample] {
        &self.actual
    }

    /// Follows `schedule` until its last position has been commanded.
    ///
    /// Positions whose successor is already due are skipped, so a schedule
    /// that started in the past joins the pass where the satellite is now.
    /// Between commands the rotator is polled every `poll_interval`.
    /// Rejected commands are logged and tracking goes on; transport errors
    /// end tracking. Nothing is sent for a schedule that is already over.
    pub async fn track<R: Rotator>(
        &mut self,
        schedule: &PassSchedule,
        rotator: &mut R,
    ) -> Result<TrackOutcome, RotctldError> {
        let samples = schedule.samples();
        let deadline = schedule.last().timestamp;
        let mut late_limit = chrono::Duration::zero();
        let mut pending = 0;
        self.actual.clear();

        log::info!(
            "Tracking {} positions from {} to {}",
            samples.len(),
            schedule.first().timestamp,
            schedule.last().timestamp
        );

        loop {
            if self.shutdown.is_triggered() {
                log::info!("Tracking cancelled");
                return Ok(TrackOutcome::Cancelled);
            }

            let now = self.clock.now();
            if now - deadline > late_limit {
                log::warn!("Schedule ended at {}, it is {} already", deadline, now);
                return Ok(TrackOutcome::Missed);
            }
            late_limit = LATE_LIMIT;

            if pending + 1 < samples.len() && samples[pending + 1].timestamp <= now {
                log::debug!("Skipping position {} scheduled at {}", pending, samples[pending].timestamp);
                pending += 1;
                continue;
            }

            match rotator.get_pos().await? {
                Some((az, el)) => {
                    log::debug!("Rotator at az={:.1} el={:.1}", az, el);
                    self.actual.push(PositionSample::new(now, az, el));
                }
                None => log::warn!("Unable to read rotator position"),
            }

            let target = &samples[pending];
            if target.timestamp <= now {
                let az = normalize_azimuth(target.azimuth_deg);
                let el = normalize_elevation(target.elevation_deg);
                log::info!(
                    "Moving to az={:.1} el={:.1} ({}/{})",
                    az,
                    el,
                    pending + 1,
                    samples.len()
                );
                let reply = rotator.set_pos(az, el).await?;
                if !reply.success {
                    log::warn!("Rotator did not accept az={:.1} el={:.1}: {}", az, el, reply.response);
                }
                pending += 1;
                if pending == samples.len() {
                    log::info!("Tracking completed");
                    return Ok(TrackOutcome::Completed);
                }
            }

            let now = self.clock.now();
            let due = samples[pending].timestamp;
            if due > now {
                let remaining = (due - now).to_std().unwrap_or(Duration::ZERO);
                let secs = remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0);
                let wait = Duration::from_secs(secs).min(self.poll_interval);
                if self.pause(wait).await {
                    log::info!("Tracking cancelled");
                    return Ok(TrackOutcome::Cancelled);
                }
            }
        }
    }

    /// Returns true when interrupted by the shutdown token.
    async fn pause(&self, total: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            let slice = remaining.min(MAX_SLEEP_SLICE);
            self.clock.sleep(slice).await;
            remaining -= slice;
            if self.shutdown.is_triggered() {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotctld::CommandReply;
    use chrono::{DateTime, TimeZone, Utc};
    use std::cell::Cell;

    struct ManualClock {
        now: Cell<DateTime<Utc>>,
        sleeps: Cell<usize>,
        cancel: Option<(usize, ShutdownToken)>,
    }

    impl ManualClock {
        fn at(now: DateTime<Utc>) -> Self {
            Self {
                now: Cell::new(now),
                sleeps: Cell::new(0),
                cancel: None,
            }
        }

        fn cancelling_after(mut self, sleeps: usize, token: ShutdownToken) -> Self {
            self.cancel = Some((sleeps, token));
            self
        }
    }

    impl Clock for &ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.now.get()
        }

        async fn sleep(&self, duration: Duration) {
            self.now
                .set(self.now.get() + chrono::Duration::from_std(duration).unwrap());
            self.sleeps.set(self.sleeps.get() + 1);
            if let Some((after, token)) = &self.cancel {
                if self.sleeps.get() >= *after {
                    token.trigger();
                }
            }
        }
    }

    #[derive(Default)]
    struct RecordingRotator {
        position: Option<(f64, f64)>,
        reject: bool,
        fail_polls: bool,
        commands: Vec<(f64, f64)>,
        polls: usize,
    }

    impl Rotator for RecordingRotator {
        async fn get_pos(&mut self) -> Result<Option<(f64, f64)>, RotctldError> {
            self.polls += 1;
            if self.fail_polls {
                return Err(RotctldError::ConnectionClosed);
            }
            Ok(self.position)
        }

        async fn set_pos(&mut self, azimuth: f64, elevation: f64) -> Result<CommandReply, RotctldError> {
            self.commands.push((azimuth, elevation));
            if self.reject {
                return Ok(CommandReply {
                    success: false,
                    response: "RPRT -1".to_string(),
                });
            }
            if self.position.is_some() {
                self.position = Some((azimuth, elevation));
            }
            Ok(CommandReply {
                success: true,
                response: "RPRT 0".to_string(),
            })
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 7, 14, 18, 50, 0).unwrap()
    }

    fn schedule(points: &[(i64, f64, f64)]) -> PassSchedule {
        let samples = points
            .iter()
            .map(|&(offset, az, el)| PositionSample::new(base() + chrono::Duration::seconds(offset), az, el))
            .collect();
        PassSchedule::new(samples).unwrap()
    }

    #[tokio::test]
    async fn skips_past_positions_and_completes() {
        let clock = ManualClock::at(base());
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(1), ShutdownToken::new());
        let mut rotator = RecordingRotator {
            position: Some((0.0, 0.0)),
            ..Default::default()
        };
        let plan = schedule(&[(-20, 10.0, 5.0), (-10, 20.0, 10.0), (0, 30.0, 15.0), (2, 200.0, 95.0)]);

        let outcome = tracker.track(&plan, &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Completed);
        assert_eq!(rotator.commands, vec![(30.0, 15.0), (-160.0, 90.0)]);
        assert_eq!(clock.sleeps.get(), 2);
        assert_eq!(clock.now.get(), base() + chrono::Duration::seconds(2));

        let actual = tracker.actual_positions();
        assert_eq!(actual.len(), 3);
        assert_eq!(actual[0], PositionSample::new(base(), 0.0, 0.0));
        assert_eq!(actual[1].timestamp, base() + chrono::Duration::seconds(1));
        assert_eq!((actual[1].azimuth_deg, actual[1].elevation_deg), (30.0, 15.0));
        assert_eq!(actual[2].timestamp, base() + chrono::Duration::seconds(2));
    }

    #[tokio::test]
    async fn waits_for_a_future_schedule() {
        let clock = ManualClock::at(base() - chrono::Duration::seconds(3));
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(10), ShutdownToken::new());
        let mut rotator = RecordingRotator::default();
        let plan = schedule(&[(0, 90.0, 10.0)]);

        let outcome = tracker.track(&plan, &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Completed);
        assert_eq!(rotator.commands, vec![(90.0, 10.0)]);
        // one 3 s wait split into 1 s slices
        assert_eq!(clock.sleeps.get(), 3);
        assert_eq!(rotator.polls, 2);
    }

    #[tokio::test]
    async fn cancellation_interrupts_sleep() {
        let token = ShutdownToken::new();
        let clock = ManualClock::at(base()).cancelling_after(1, token.clone());
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(5), token);
        let mut rotator = RecordingRotator::default();
        let plan = schedule(&[(0, 10.0, 10.0), (10, 20.0, 20.0)]);

        let outcome = tracker.track(&plan, &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Cancelled);
        assert_eq!(rotator.commands, vec![(10.0, 10.0)]);
        assert_eq!(clock.now.get(), base() + chrono::Duration::seconds(1));
    }

    #[tokio::test]
    async fn cancelled_before_start_does_nothing() {
        let token = ShutdownToken::new();
        token.trigger();
        let clock = ManualClock::at(base());
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(1), token);
        let mut rotator = RecordingRotator::default();

        let outcome = tracker.track(&schedule(&[(0, 1.0, 1.0)]), &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Cancelled);
        assert_eq!(rotator.polls, 0);
        assert!(rotator.commands.is_empty());
    }

    #[tokio::test]
    async fn rejected_commands_do_not_stop_tracking() {
        let clock = ManualClock::at(base());
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(1), ShutdownToken::new());
        let mut rotator = RecordingRotator {
            reject: true,
            ..Default::default()
        };
        let plan = schedule(&[(0, 10.0, 10.0), (1, 20.0, 20.0)]);

        let outcome = tracker.track(&plan, &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Completed);
        assert_eq!(rotator.commands, vec![(10.0, 10.0), (20.0, 20.0)]);
    }

    #[tokio::test]
    async fn unreadable_positions_are_not_logged() {
        let clock = ManualClock::at(base());
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(1), ShutdownToken::new());
        let mut rotator = RecordingRotator::default();
        let plan = schedule(&[(0, 10.0, 10.0), (2, 20.0, 20.0)]);

        let outcome = tracker.track(&plan, &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Completed);
        assert_eq!(rotator.polls, 3);
        assert!(tracker.actual_positions().is_empty());
    }

    #[tokio::test]
    async fn schedule_in_the_past_is_not_sent() {
        let clock = ManualClock::at(base() + chrono::Duration::seconds(60));
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(1), ShutdownToken::new());
        let mut rotator = RecordingRotator::default();
        let plan = schedule(&[(0, 1.0, 1.0), (30, 2.0, 2.0)]);

        let outcome = tracker.track(&plan, &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Missed);
        assert_eq!(rotator.polls, 0);
        assert!(rotator.commands.is_empty());
    }

    #[tokio::test]
    async fn last_position_due_now_is_still_sent() {
        let clock = ManualClock::at(base() + chrono::Duration::seconds(30));
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(1), ShutdownToken::new());
        let mut rotator = RecordingRotator::default();
        let plan = schedule(&[(0, 1.0, 1.0), (30, 2.0, 2.0)]);

        let outcome = tracker.track(&plan, &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Completed);
        assert_eq!(rotator.commands, vec![(2.0, 2.0)]);
    }

    #[tokio::test]
    async fn sub_millisecond_wait_sleeps_instead_of_polling() {
        let clock = ManualClock::at(base() - chrono::Duration::microseconds(900));
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(1), ShutdownToken::new());
        let mut rotator = RecordingRotator::default();
        let plan = schedule(&[(0, 5.0, 5.0)]);

        let outcome = tracker.track(&plan, &mut rotator).await.unwrap();

        assert_eq!(outcome, TrackOutcome::Completed);
        assert_eq!(clock.sleeps.get(), 1);
        assert_eq!(rotator.polls, 2);
        assert_eq!(rotator.commands, vec![(5.0, 5.0)]);
    }

    #[tokio::test]
    async fn transport_errors_propagate() {
        let clock = ManualClock::at(base());
        let mut tracker = Tracker::with_clock(&clock, Duration::from_secs(1), ShutdownToken::new());
        let mut rotator = RecordingRotator {
            fail_polls: true,
            ..Default::default()
        };

        let err = tracker
            .track(&schedule(&[(0, 10.0, 10.0)]), &mut rotator)
            .await
            .unwrap_err();

        assert!(matches!(err, RotctldError::ConnectionClosed));
        assert!(rotator.commands.is_empty());
    }
}
