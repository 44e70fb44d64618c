/// Caller-chosen job identifier, unique across the store's lifetime.
pub type JobId = String;

/// Dispatcher-generated claim identifier (`c-<n>`).
pub type ClaimId = String;

/// Worker identity as asserted by the caller.
pub type WorkerId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Opaque string-keyed metadata. The core never interprets the values.
pub type Metadata = serde_json::Map<String, serde_json::Value>;
