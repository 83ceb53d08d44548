//! Records produced by the extractor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Branch names treated as protected.
pub const PROTECTED_BRANCHES: &[&str] = &[
    "main",
    "master",
    "develop",
    "development",
    "production",
    "release",
    "staging",
];

pub fn is_protected_branch(name: &str) -> bool {
    PROTECTED_BRANCHES.contains(&name)
}

/// A branch head observed in the clone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    /// Short branch name, unique within a repository
    pub name: String,
    pub is_default: bool,
    pub is_protected: bool,
    /// Number of commits reachable from the head
    pub commit_count: u64,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub last_commit_hash: String,
}

/// How a commit touched a file, derived from its line counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl ChangeType {
    /// `Added` when only insertions, `Deleted` when only deletions, otherwise `Modified`.
    pub fn classify(additions: u64, deletions: u64) -> Self {
        match (additions, deletions) {
            (a, 0) if a > 0 => ChangeType::Added,
            (0, d) if d > 0 => ChangeType::Deleted,
            _ => ChangeType::Modified,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Modified => "modified",
            ChangeType::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "added" => Ok(ChangeType::Added),
            "modified" => Ok(ChangeType::Modified),
            "deleted" => Ok(ChangeType::Deleted),
            other => Err(format!("unknown change type: {other}")),
        }
    }
}

/// Per-file line counts for one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
    pub change_type: ChangeType,
}

impl FileChange {
    pub fn new(path: impl Into<String>, additions: u64, deletions: u64) -> Self {
        Self {
            path: path.into(),
            additions,
            deletions,
            change_type: ChangeType::classify(additions, deletions),
        }
    }
}

/// Information about a git commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Full commit SHA
    pub hash: String,
    pub short_hash: String,
    /// Subject line
    pub message: String,
    /// Body beyond the subject line, if any
    pub description: Option<String>,
    pub author_name: String,
    pub author_email: String,
    pub committed_at: DateTime<Utc>,
    /// Branch the commit was fetched under
    pub branch: String,
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
    pub file_changes: Vec<FileChange>,
}

/// Authorship totals for one email address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorStats {
    pub name: String,
    pub email: String,
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
    /// Share of all commits, rounded to two decimals
    pub percentage: f64,
    pub first_commit: DateTime<Utc>,
    pub last_commit: DateTime<Utc>,
}

/// A tracked file at analysis time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the repository root
    pub path: String,
    pub name: String,
    /// Lowercased extension without the dot
    pub extension: Option<String>,
    pub size: u64,
    /// Text line count, or `size / 80` for binary content
    pub lines: u64,
    pub language: Option<String>,
}

/// Byte and line totals for one language
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageStat {
    pub name: String,
    pub bytes: u64,
    pub lines: u64,
    pub percentage: f64,
}

/// A percentage held exactly in hundredths of a percent: `Hundredths(5790)` is 57.90%.
///
/// Serialized as a two-decimal string so sums taken by consumers stay exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Hundredths(pub u32);

impl Hundredths {
    pub const ZERO: Hundredths = Hundredths(0);
    pub const WHOLE: Hundredths = Hundredths(10_000);

    /// Lossy view for display or charting; do not sum these.
    pub fn as_percent(self) -> f64 {
        f64::from(self.0) / 100.0
    }
}

impl fmt::Display for Hundredths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl FromStr for Hundredths {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("invalid percentage: {s}");
        let (whole, fraction) = s.split_once('.').unwrap_or((s, ""));
        let digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if whole.is_empty() || fraction.len() > 2 || !digits(whole) || !digits(fraction) {
            return Err(invalid());
        }
        let whole: u32 = whole.parse().map_err(|_| invalid())?;
        let fraction: u32 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u32>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(fraction))
            .map(Hundredths)
            .ok_or_else(invalid)
    }
}

impl std::iter::Sum for Hundredths {
    fn sum<I: Iterator<Item = Hundredths>>(iter: I) -> Self {
        Hundredths(iter.map(|h| h.0).sum())
    }
}

impl Serialize for Hundredths {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hundredths {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// A language's share of the code in a repository, as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageShare {
    pub name: String,
    pub bytes: u64,
    pub lines: u64,
    pub percentage: Hundredths,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_type_classification() {
        assert_eq!(ChangeType::classify(10, 0), ChangeType::Added);
        assert_eq!(ChangeType::classify(0, 4), ChangeType::Deleted);
        assert_eq!(ChangeType::classify(2, 3), ChangeType::Modified);
        assert_eq!(ChangeType::classify(0, 0), ChangeType::Modified);
    }

    #[test]
    fn test_change_type_round_trips_through_str() {
        for kind in [ChangeType::Added, ChangeType::Modified, ChangeType::Deleted] {
            assert_eq!(kind.as_str().parse::<ChangeType>().unwrap(), kind);
        }
        assert!("renamed".parse::<ChangeType>().is_err());
    }

    #[test]
    fn test_hundredths_display_and_parse() {
        assert_eq!(Hundredths(5790).to_string(), "57.90");
        assert_eq!(Hundredths(526).to_string(), "5.26");
        assert_eq!(Hundredths(7).to_string(), "0.07");
        assert_eq!(Hundredths::WHOLE.to_string(), "100.00");

        assert_eq!("57.9".parse::<Hundredths>().unwrap(), Hundredths(5790));
        assert_eq!("36.84".parse::<Hundredths>().unwrap(), Hundredths(3684));
        assert_eq!("100".parse::<Hundredths>().unwrap(), Hundredths::WHOLE);
        assert!("1.234".parse::<Hundredths>().is_err());
        assert!(".5".parse::<Hundredths>().is_err());
        assert!("-1.00".parse::<Hundredths>().is_err());
    }

    #[test]
    fn test_hundredths_serialize_as_decimal_strings() {
        let json = serde_json::to_string(&Hundredths(3684)).unwrap();
        assert_eq!(json, "\"36.84\"");
        let back: Hundredths = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Hundredths(3684));
    }

    #[test]
    fn test_protected_branch_names() {
        assert!(is_protected_branch("main"));
        assert!(is_protected_branch("release"));
        assert!(!is_protected_branch("feature/login"));
        assert!(!is_protected_branch("Main"));
    }
}
