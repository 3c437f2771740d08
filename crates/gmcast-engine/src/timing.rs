//! Protocol timing constants.

use std::time::Duration;

/// How long a response send to a client observer may block before the
/// observer is dropped anyway.
pub const OBSERVER_NOTIFY: Duration = Duration::from_millis(150);

/// Cadence at which messages stuck in a pre-final state are re-fed to
/// the protocol loop.
pub const REPROCESS_DELAY: Duration = Duration::from_millis(100);

/// Deadline for the cross-partition timestamp exchange. Exchanges idle
/// longer than this fail with a timeout instead of waiting forever.
pub const GATHER_DEADLINE: Duration = Duration::from_secs(5);

/// How often the memo is swept for expired exchanges.
pub const MEMO_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Pause between unicast retries after a transport error.
pub const UNICAST_RETRY_BACKOFF: Duration = Duration::from_millis(10);
