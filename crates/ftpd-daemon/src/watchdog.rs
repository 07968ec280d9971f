//! Idle-timeout watchdog for one session.
//!
//! A session has exactly one alarm. It is armed either for the control
//! channel (waiting for the next command) or for a data transfer, and the
//! tagged [`WatchdogArmed`] state says which, so firing is a plain match:
//!
//! - `Control`: the client went quiet; the session is kicked.
//! - `Data(channel)`: a transfer stalled; the data channel is force-closed
//!   so the blocked I/O fails, then the session is kicked as well.
//!
//! The alarm lives in a `tokio::sync::watch` cell. The session loop owns
//! the [`Watchdog`] and races [`Watchdog::expired`] against its work; the
//! dispatcher gets a cloneable [`WatchdogHandle`] to arm the data class
//! around transfers. Re-arming replaces the pending alarm, so two timeout
//! classes can never be pending at once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Stand-in deadline for timeouts past what `Instant` can hold (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Close handle for a data connection under watchdog supervision.
///
/// Transfer code keeps a clone and selects on [`closed`](Self::closed)
/// while moving data; when the watchdog fires it drops its socket and
/// returns an error.
#[derive(Debug, Clone, Default)]
pub struct DataChannel {
    token: CancellationToken,
}

impl DataChannel {
    /// Creates an open data channel handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Force-closes the channel.
    pub fn close(&self) {
        self.token.cancel();
    }

    /// Returns true once the channel was force-closed.
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when the channel is force-closed.
    pub async fn closed(&self) {
        self.token.cancelled().await;
    }
}

/// What the pending alarm guards.
#[derive(Debug, Clone)]
pub enum WatchdogArmed {
    /// Waiting for the next command line
    Control,
    /// Waiting on a data transfer; the channel is closed on fire
    Data(DataChannel),
}

/// Timeout class reported after the watchdog fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Control,
    Data,
}

impl TimeoutKind {
    /// Which connection timed out.
    pub fn channel(self) -> &'static str {
        match self {
            Self::Control => "control",
            Self::Data => "data",
        }
    }

    /// Text of the 421 reply and of the log line.
    pub fn message(self) -> &'static str {
        match self {
            Self::Control => "Kicked from the server due to control connection timeout.",
            Self::Data => "Kicked from the server due to data connection timeout.",
        }
    }
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} connection timeout", self.channel())
    }
}

/// Applies the side effect of a fired alarm and reports its class.
///
/// For a data alarm this closes the data channel; the stalled transfer
/// observes the close and fails.
pub fn trip(armed: WatchdogArmed) -> TimeoutKind {
    match armed {
        WatchdogArmed::Control => TimeoutKind::Control,
        WatchdogArmed::Data(channel) => {
            channel.close();
            TimeoutKind::Data
        }
    }
}

#[derive(Debug, Clone)]
struct Alarm {
    armed: WatchdogArmed,
    deadline: Instant,
}

/// Cloneable arming interface.
#[derive(Clone)]
pub struct WatchdogHandle {
    alarm: Arc<watch::Sender<Option<Alarm>>>,
    control_timeout: Duration,
    data_timeout: Duration,
}

impl WatchdogHandle {
    /// Arms (or re-arms) the control-channel alarm.
    pub fn arm_control(&self) {
        self.arm(WatchdogArmed::Control, self.control_timeout);
    }

    /// Arms the data-channel alarm for `channel`.
    pub fn arm_data(&self, channel: &DataChannel) {
        self.arm(WatchdogArmed::Data(channel.clone()), self.data_timeout);
    }

    /// Ends data supervision: a pending data alarm is replaced by a fresh
    /// control alarm. Anything else is left alone.
    pub fn end_data(&self) {
        let was_data = matches!(
            self.alarm.borrow().as_ref().map(|alarm| &alarm.armed),
            Some(WatchdogArmed::Data(_))
        );
        if was_data {
            self.arm_control();
        }
    }

    /// Cancels the pending alarm.
    pub fn disarm(&self) {
        trace!("Watchdog disarmed");
        self.alarm.send_replace(None);
    }

    /// Returns the pending alarm class, if any.
    pub fn armed(&self) -> Option<WatchdogArmed> {
        self.alarm.borrow().as_ref().map(|alarm| alarm.armed.clone())
    }

    fn arm(&self, armed: WatchdogArmed, after: Duration) {
        trace!(armed = ?armed, after_secs = after.as_secs(), "Watchdog armed");
        self.alarm.send_replace(Some(Alarm {
            armed,
            deadline: deadline_after(after),
        }));
    }
}

/// Deadline `after` from now. Timeouts too large to represent never fire.
fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

impl fmt::Debug for WatchdogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchdogHandle")
            .field("armed", &self.armed())
            .field("control_timeout", &self.control_timeout)
            .field("data_timeout", &self.data_timeout)
            .finish()
    }
}

/// The firing side of the alarm, owned by the session loop.
pub struct Watchdog {
    receiver: watch::Receiver<Option<Alarm>>,
    handle: WatchdogHandle,
}

impl Watchdog {
    /// Creates a disarmed watchdog.
    pub fn new(control_timeout: Duration, data_timeout: Duration) -> Self {
        let (sender, receiver) = watch::channel(None);
        Self {
            receiver,
            handle: WatchdogHandle {
                alarm: Arc::new(sender),
                control_timeout,
                data_timeout,
            },
        }
    }

    /// Returns an arming handle.
    pub fn handle(&self) -> WatchdogHandle {
        self.handle.clone()
    }

    /// Completes when the pending alarm fires and returns what it guarded.
    ///
    /// Waits indefinitely while disarmed. Re-arming while waiting moves the
    /// deadline. The alarm is single-shot: it is cleared when it fires.
    /// Cancel-safe, so it can sit in a `select!` loop.
    pub async fn expired(&mut self) -> WatchdogArmed {
        loop {
            let current = self.receiver.borrow_and_update().clone();

            match current {
                Some(alarm) => {
                    tokio::select! {
                        () = sleep_until(alarm.deadline) => {
                            self.handle.alarm.send_replace(None);
                            return alarm.armed;
                        }
                        changed = self.receiver.changed() => {
                            if changed.is_err() {
                                std::future::pending::<()>().await;
                            }
                        }
                    }
                }
                None => {
                    if self.receiver.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    const CONTROL: Duration = Duration::from_secs(300);
    const DATA: Duration = Duration::from_secs(120);

    #[tokio::test(start_paused = true)]
    async fn test_control_alarm_fires_after_timeout() {
        let mut watchdog = Watchdog::new(CONTROL, DATA);
        let handle = watchdog.handle();
        let start = Instant::now();

        handle.arm_control();
        let armed = watchdog.expired().await;

        assert!(matches!(armed, WatchdogArmed::Control));
        assert!(start.elapsed() >= CONTROL);
        assert!(handle.armed().is_none(), "alarm is single-shot");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_moves_deadline() {
        let mut watchdog = Watchdog::new(CONTROL, DATA);
        let handle = watchdog.handle();

        handle.arm_control();
        advance(Duration::from_secs(200)).await;
        handle.arm_control();

        // The original deadline (100s away) must not fire
        let early = timeout(Duration::from_secs(250), watchdog.expired()).await;
        assert!(early.is_err());

        let armed = timeout(Duration::from_secs(100), watchdog.expired()).await;
        assert!(matches!(armed, Ok(WatchdogArmed::Control)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_never_fires() {
        let mut watchdog = Watchdog::new(CONTROL, DATA);
        let handle = watchdog.handle();

        handle.arm_control();
        handle.disarm();

        let result = timeout(Duration::from_secs(3600), watchdog.expired()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_data_alarm_uses_data_timeout() {
        let mut watchdog = Watchdog::new(CONTROL, DATA);
        let handle = watchdog.handle();
        let channel = DataChannel::new();
        let start = Instant::now();

        handle.arm_data(&channel);
        let armed = watchdog.expired().await;

        assert!(start.elapsed() >= DATA);
        assert!(start.elapsed() < CONTROL);
        assert!(!channel.is_closed(), "firing alone does not close the channel");

        let kind = trip(armed);
        assert_eq!(kind, TimeoutKind::Data);
        assert!(channel.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_data_rearms_control() {
        let watchdog = Watchdog::new(CONTROL, DATA);
        let handle = watchdog.handle();
        let channel = DataChannel::new();

        handle.arm_data(&channel);
        assert!(matches!(handle.armed(), Some(WatchdogArmed::Data(_))));

        handle.end_data();
        assert!(matches!(handle.armed(), Some(WatchdogArmed::Control)));
        assert!(!channel.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_data_leaves_disarmed_alone() {
        let watchdog = Watchdog::new(CONTROL, DATA);
        let handle = watchdog.handle();

        handle.end_data();
        assert!(handle.armed().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_arm_while_waiting() {
        let mut watchdog = Watchdog::new(CONTROL, DATA);
        let handle = watchdog.handle();

        let arm_later = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(10)).await;
            arm_later.arm_control();
        });

        let start = Instant::now();
        let armed = watchdog.expired().await;
        assert!(matches!(armed, WatchdogArmed::Control));
        assert!(start.elapsed() >= Duration::from_secs(310));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_timeout_arms_without_overflow() {
        let mut watchdog = Watchdog::new(Duration::MAX, Duration::from_secs(u64::MAX));
        let handle = watchdog.handle();
        let channel = DataChannel::new();

        handle.arm_control();
        assert!(matches!(handle.armed(), Some(WatchdogArmed::Control)));
        handle.arm_data(&channel);
        assert!(matches!(handle.armed(), Some(WatchdogArmed::Data(_))));

        let result = timeout(Duration::from_secs(86_400 * 365), watchdog.expired()).await;
        assert!(result.is_err());
        assert!(!channel.is_closed());
    }

    #[test]
    fn test_trip_control() {
        assert_eq!(trip(WatchdogArmed::Control), TimeoutKind::Control);
    }

    #[test]
    fn test_timeout_messages() {
        assert_eq!(
            TimeoutKind::Control.message(),
            "Kicked from the server due to control connection timeout."
        );
        assert_eq!(TimeoutKind::Data.to_string(), "data connection timeout");
    }

    #[tokio::test]
    async fn test_data_channel_closed_future() {
        let channel = DataChannel::new();
        let observer = channel.clone();
        let waiter = tokio::spawn(async move { observer.closed().await });

        channel.close();
        waiter.await.unwrap();
        assert!(channel.is_closed());
    }
}
