/// Per-URL crawl state definitions
///
/// Every URL a job touches has exactly one of these states for the lifetime of the job.
use std::fmt;

/// Represents the state of one canonical URL within a crawl job
///
/// Transitions: `Discovered → Fetching → {Indexed, SkippedUnchanged, Failed, Excluded}`.
/// URLs rejected by the scope rule go straight from discovery to `Excluded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlState {
    // ===== Active States =====
    /// URL was accepted by the frontier and waits for a worker
    Discovered,

    /// URL is being fetched or processed by a worker
    Fetching,

    // ===== Terminal States =====
    /// Page content was new or changed and has been written to storage
    Indexed,

    /// Page content hash matched the stored page; only the crawl timestamp was touched
    SkippedUnchanged,

    /// Fetch or extraction failed after retries
    Failed,

    /// URL is out of scope or disallowed by robots.txt
    Excluded,
}

impl CrawlState {
    /// Returns true if this is a terminal state (no further processing in this job)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Discovered | Self::Fetching)
    }

    /// Returns true if the state may move to `next`
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        match self {
            Self::Discovered => matches!(next, Self::Fetching | Self::Excluded),
            Self::Fetching => next.is_terminal(),
            _ => false,
        }
    }

    /// Converts the state to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Fetching => "fetching",
            Self::Indexed => "indexed",
            Self::SkippedUnchanged => "skipped_unchanged",
            Self::Failed => "failed",
            Self::Excluded => "excluded",
        }
    }

    /// Parses a state from its string representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "fetching" => Some(Self::Fetching),
            "indexed" => Some(Self::Indexed),
            "skipped_unchanged" => Some(Self::SkippedUnchanged),
            "failed" => Some(Self::Failed),
            "excluded" => Some(Self::Excluded),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
