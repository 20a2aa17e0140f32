//! Per-host and aggregate dispatch results.

use serde::Serialize;

use sendcmd_common::protocol::{ConnectionError, SessionResult, Target};

/// What happened on one target: the session result, or why there is none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostReport {
    pub target: Target,
    pub outcome: Result<SessionResult, ConnectionError>,
}

impl HostReport {
    /// Connected, and every command that ran succeeded.
    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(result) if result.is_clean())
    }

    pub fn connection_error(&self) -> Option<&ConnectionError> {
        self.outcome.as_ref().err()
    }

    pub fn session(&self) -> Option<&SessionResult> {
        self.outcome.as_ref().ok()
    }
}

/// One report per submitted target, in submission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DispatchReport {
    pub hosts: Vec<HostReport>,
}

impl DispatchReport {
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HostReport> {
        self.hosts.iter()
    }

    pub fn all_succeeded(&self) -> bool {
        self.hosts.iter().all(HostReport::is_success)
    }

    /// Hosts that could not be reached or whose batch had failures.
    pub fn failures(&self) -> impl Iterator<Item = &HostReport> {
        self.hosts.iter().filter(|h| !h.is_success())
    }

    pub fn unreachable_count(&self) -> usize {
        self.hosts.iter().filter(|h| h.outcome.is_err()).count()
    }
}

impl<'a> IntoIterator for &'a DispatchReport {
    type Item = &'a HostReport;
    type IntoIter = std::slice::Iter<'a, HostReport>;

    fn into_iter(self) -> Self::IntoIter {
        self.hosts.iter()
    }
}
