use super::FailureContext;
use crate::progress::ProgressSample;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Throttled progress events for a single download, gated by
/// [`crate::ProgressThrottle`] (1s minimum interval, emit-on-percent-change).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// Progress tracking started for an id (a download's URL).
    Started { id: String, total: Option<u64> },

    /// A throttled progress sample.
    Updated {
        id: String,
        current: u64,
        total: Option<u64>,
        percent: Option<u8>,
        #[serde(with = "duration_secs_opt")]
        eta: Option<Duration>,
    },

    /// Progress completed successfully.
    Completed { id: String, total_processed: u64 },

    /// Progress failed.
    Failed {
        id: String,
        failure: FailureContext,
        completed_items: u64,
    },
}

impl ProgressEvent {
    #[must_use]
    pub fn started(id: impl Into<String>, total: Option<u64>) -> Self {
        Self::Started { id: id.into(), total }
    }

    #[must_use]
    pub fn from_sample(id: impl Into<String>, sample: ProgressSample) -> Self {
        Self::Updated {
            id: id.into(),
            current: sample.current,
            total: sample.total,
            percent: sample.percent,
            eta: sample.eta,
        }
    }

    #[must_use]
    pub fn completed(id: impl Into<String>, total_processed: u64) -> Self {
        Self::Completed {
            id: id.into(),
            total_processed,
        }
    }

    #[must_use]
    pub fn failed(id: impl Into<String>, failure: FailureContext, completed_items: u64) -> Self {
        Self::Failed {
            id: id.into(),
            failure,
            completed_items,
        }
    }
}

mod duration_secs_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(d) => s.serialize_some(&d.as_secs_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<f64>::deserialize(deserializer)?;
        Ok(opt.map(Duration::from_secs_f64))
    }
}
