use std::fmt;

/// Lifecycle state of a crawl job
///
/// A job is created `Planned`, moves to `Running` when workers start and reaches exactly one
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Planned,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    /// Returns true for `Completed`, `Failed` and `Cancelled`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Returns true if the job may move to `next`
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match self {
            Self::Planned => matches!(next, Self::Running) || next.is_terminal(),
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }

    /// Converts the job state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a job state from a database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(Self::Planned),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// What started a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Crawl from the configured seeds
    Index,
    /// Re-crawl every active stored page plus the configured seeds
    Refresh,
}

impl JobKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Refresh => "refresh",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "index" => Some(Self::Index),
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Why a job stopped dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    /// No queued URLs and no worker left that could discover more
    FrontierExhausted,
    /// `max-pages` fetches were dispatched
    PageBudgetReached,
    /// The cancellation token fired
    Cancelled,
    /// A storage write failed
    StorageFailure,
    /// A worker task died outside per-URL processing
    WorkerFailure,
}

impl StopReason {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::FrontierExhausted => "frontier_exhausted",
            Self::PageBudgetReached => "page_budget_reached",
            Self::Cancelled => "cancelled",
            Self::StorageFailure => "storage_failure",
            Self::WorkerFailure => "worker_failure",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "frontier_exhausted" => Some(Self::FrontierExhausted),
            "page_budget_reached" => Some(Self::PageBudgetReached),
            "cancelled" => Some(Self::Cancelled),
            "storage_failure" => Some(Self::StorageFailure),
            "worker_failure" => Some(Self::WorkerFailure),
            _ => None,
        }
    }

    /// The terminal job state this stop reason leads to
    pub fn final_state(&self) -> JobState {
        match self {
            Self::FrontierExhausted | Self::PageBudgetReached => JobState::Completed,
            Self::Cancelled => JobState::Cancelled,
            Self::StorageFailure | Self::WorkerFailure => JobState::Failed,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::FrontierExhausted => "frontier exhausted",
            Self::PageBudgetReached => "page budget reached",
            Self::Cancelled => "cancelled",
            Self::StorageFailure => "storage failure",
            Self::WorkerFailure => "worker failure",
        };
        write!(f, "{}", text)
    }
}
