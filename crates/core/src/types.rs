/// Game player ids (targets and claimers alike) are positive integers.
pub type PlayerId = i64;

/// Unix timestamp in whole seconds (UTC).
pub type EpochSecs = i64;

/// Unix timestamp in milliseconds (UTC).
pub type EpochMillis = i64;
