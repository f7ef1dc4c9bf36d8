use std::fmt;
use std::future::pending;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{sleep_until, Instant};

use crate::utils::{format_elapsed_time, get_elapsed_time};

/// Tracks inbound liveness of an established connection
///
/// Outbound keepalives are driven by the bridge, this only decides
/// when the peer has been silent for longer than the negotiated hold time.
#[derive(Debug)]
pub struct HoldTimer {
    pub(crate) hold_timer: u16,
    deadline: Option<Instant>,
    pub(crate) last_received: DateTime<Utc>,
}

impl HoldTimer {
    /// A hold timer of 0 never expires
    pub fn new(hold_timer: u16) -> HoldTimer {
        let mut timer = HoldTimer {
            hold_timer,
            deadline: None,
            last_received: Utc::now(),
        };
        timer.received();
        timer
    }

    /// Bump the last received to now
    pub fn received(&mut self) {
        self.last_received = Utc::now();
        if self.hold_timer > 0 {
            self.deadline = Some(Instant::now() + Duration::from_secs(self.hold_timer.into()));
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    // Remaining hold time, never less than 0
    fn get_hold_time(&self) -> chrono::Duration {
        let hold_time = chrono::Duration::seconds(self.hold_timer.into());
        let elapsed = get_elapsed_time(self.last_received);
        if elapsed > hold_time {
            chrono::Duration::seconds(0)
        } else {
            hold_time - elapsed
        }
    }
}

/// Resolves once the given deadline passes, or never without one
pub async fn expired(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

impl fmt::Display for HoldTimer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format_elapsed_time(self.get_hold_time()))
    }
}
