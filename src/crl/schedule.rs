use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use super::ports::{RefreshTimer, RevocationListStore};

/// Delay before the next refresh when the installed CRL does not name a
/// usable next-update date.
pub const FALLBACK_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// When the next automatic update should fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextRefresh {
    At(DateTime<Utc>),
    After(Duration),
}

impl NextRefresh {
    /// Picks the CRL's next-update date when it lies in the future, the
    /// fallback interval otherwise.
    pub fn from_next_update(next_update: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match next_update {
            Some(at) if at > now => NextRefresh::At(at),
            _ => NextRefresh::After(FALLBACK_REFRESH_INTERVAL),
        }
    }

    pub fn apply(self, timer: &dyn RefreshTimer) {
        match self {
            NextRefresh::At(at) => {
                info!("Next CRL update scheduled at {}", at);
                timer.schedule_at(at);
            }
            NextRefresh::After(after) => {
                info!("Next CRL update scheduled in {:?}", after);
                timer.schedule_after(after);
            }
        }
    }
}

/// Re-arms `timer` from the store's advertised next-update date.
pub fn reschedule(store: &dyn RevocationListStore, timer: &dyn RefreshTimer) -> NextRefresh {
    let next_update = if store.has_next_update() {
        store.next_update()
    } else {
        None
    };
    let next = NextRefresh::from_next_update(next_update, Utc::now());
    next.apply(timer);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn test_fallback_is_ten_minutes() {
        assert_eq!(FALLBACK_REFRESH_INTERVAL, Duration::from_secs(600));
    }

    #[test]
    fn test_no_next_update_uses_fallback() {
        let next = NextRefresh::from_next_update(None, Utc::now());
        assert_eq!(next, NextRefresh::After(FALLBACK_REFRESH_INTERVAL));
    }

    #[test]
    fn test_past_next_update_uses_fallback() {
        let now = Utc::now();
        let next = NextRefresh::from_next_update(Some(now - TimeDelta::hours(1)), now);
        assert_eq!(next, NextRefresh::After(FALLBACK_REFRESH_INTERVAL));
    }

    #[test]
    fn test_next_update_equal_to_now_uses_fallback() {
        let now = Utc::now();
        let next = NextRefresh::from_next_update(Some(now), now);
        assert_eq!(next, NextRefresh::After(FALLBACK_REFRESH_INTERVAL));
    }

    #[test]
    fn test_future_next_update_is_used_as_is() {
        let now = Utc::now();
        let at = now + TimeDelta::days(3);
        let next = NextRefresh::from_next_update(Some(at), now);
        assert_eq!(next, NextRefresh::At(at));
    }
}
