//! Streaming parsers for `git log` and `git diff-tree --numstat` output
//!
//! Commit records and their header fields are framed with ASCII control characters,
//! so free-form text (subjects, bodies, author names) can contain `|` or newlines
//! without being mis-split. `<GS>` below is the group separator `\x1d`:
//!
//! ```text
//! \x1e<hash><GS><short><GS><author><GS><email><GS><iso date><GS><subject>
//! <body line>
//! <body line>\x1f
//!
//!  3 files changed, 10 insertions(+), 2 deletions(-)
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::types::{CommitInfo, ContributorStats, FileChange};

pub const RECORD_SEPARATOR: char = '\x1e';
pub const BODY_TERMINATOR: char = '\x1f';
pub const FIELD_SEPARATOR: char = '\x1d';

/// `--format` for commit logs consumed by [`parse_commit_log`].
pub const COMMIT_LOG_FORMAT: &str = "%x1e%H%x1d%h%x1d%an%x1d%ae%x1d%aI%x1d%s%n%b%x1f";

/// `--format` for author logs consumed by [`parse_author_log`].
pub const AUTHOR_LOG_FORMAT: &str = "%x1e%an%x1d%ae%x1d%aI";

const HEADER_FIELDS: usize = 6;
const BINARY_MARKER: &str = "-";

static SHORTSTAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(\d+) files? changed(?:, (\d+) insertions?\(\+\))?(?:, (\d+) deletions?\(-\))?\s*$",
    )
    .expect("shortstat pattern is valid")
});

/// A record that was skipped during parsing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseDiagnostic {
    /// 1-based line number within the parsed output
    pub line: usize,
    pub reason: String,
    pub excerpt: String,
}

impl ParseDiagnostic {
    fn new(line: usize, reason: impl Into<String>, raw: &str) -> Self {
        Self {
            line,
            reason: reason.into(),
            excerpt: raw.chars().take(120).collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct CommitLog {
    pub commits: Vec<CommitInfo>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Totals from a `--shortstat` summary line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShortStat {
    pub files_changed: u64,
    pub insertions: u64,
    pub deletions: u64,
}

pub fn parse_shortstat(line: &str) -> Option<ShortStat> {
    let caps = SHORTSTAT.captures(line)?;
    let number = |idx: usize| {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    Some(ShortStat {
        files_changed: number(1),
        insertions: number(2),
        deletions: number(3),
    })
}

struct CommitHeader {
    hash: String,
    short_hash: String,
    author_name: String,
    author_email: String,
    committed_at: DateTime<Utc>,
    subject: String,
}

struct PendingCommit {
    header: CommitHeader,
    body: String,
    stat: Option<ShortStat>,
}

impl PendingCommit {
    fn finish(self, branch: &str) -> CommitInfo {
        let body = self.body.trim();
        let stat = self.stat.unwrap_or_default();
        CommitInfo {
            hash: self.header.hash,
            short_hash: self.header.short_hash,
            message: self.header.subject,
            description: (!body.is_empty()).then(|| body.to_string()),
            author_name: self.header.author_name,
            author_email: self.header.author_email,
            committed_at: self.header.committed_at,
            branch: branch.to_string(),
            additions: stat.insertions,
            deletions: stat.deletions,
            files_changed: stat.files_changed,
            file_changes: Vec::new(),
        }
    }
}

enum State {
    AwaitingHeader,
    ReadingBody(PendingCommit),
    ReadingStat(PendingCommit),
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_commit_header(raw: &str) -> Result<CommitHeader, String> {
    let fields: Vec<&str> = raw.splitn(HEADER_FIELDS, FIELD_SEPARATOR).collect();
    if fields.len() < HEADER_FIELDS {
        return Err(format!(
            "expected {HEADER_FIELDS} header fields, found {}",
            fields.len()
        ));
    }

    let [hash, short_hash, name, email, date, subject] = [
        fields[0].trim(),
        fields[1].trim(),
        fields[2].trim(),
        fields[3].trim(),
        fields[4].trim(),
        fields[5].trim(),
    ];

    for (label, value) in [
        ("hash", hash),
        ("author name", name),
        ("author email", email),
        ("date", date),
        ("subject", subject),
    ] {
        if value.is_empty() {
            return Err(format!("empty {label}"));
        }
    }

    let committed_at = parse_timestamp(date).ok_or_else(|| format!("invalid date {date:?}"))?;

    Ok(CommitHeader {
        hash: hash.to_string(),
        short_hash: if short_hash.is_empty() {
            hash.chars().take(7).collect()
        } else {
            short_hash.to_string()
        },
        author_name: name.to_string(),
        author_email: email.to_string(),
        committed_at,
        subject: subject.to_string(),
    })
}

/// Parse `git log --format=COMMIT_LOG_FORMAT --shortstat` output.
///
/// Malformed headers are dropped with a diagnostic; everything up to the next record
/// separator belongs to the dropped record and is skipped with it.
pub fn parse_commit_log(output: &str, branch: &str) -> CommitLog {
    let mut log = CommitLog::default();
    let mut state = State::AwaitingHeader;

    for (idx, raw_line) in output.split('\n').enumerate() {
        let line = raw_line.strip_suffix('\r').unwrap_or(raw_line);

        if let Some(header) = line.strip_prefix(RECORD_SEPARATOR) {
            if let State::ReadingBody(pending) | State::ReadingStat(pending) = state {
                log.commits.push(pending.finish(branch));
            }
            state = match parse_commit_header(header) {
                Ok(header) => State::ReadingBody(PendingCommit {
                    header,
                    body: String::new(),
                    stat: None,
                }),
                Err(reason) => {
                    log.diagnostics
                        .push(ParseDiagnostic::new(idx + 1, reason, header));
                    State::AwaitingHeader
                }
            };
            continue;
        }

        state = match state {
            State::AwaitingHeader => State::AwaitingHeader,
            State::ReadingBody(mut pending) => match line.find(BODY_TERMINATOR) {
                Some(end) => {
                    pending.body.push_str(&line[..end]);
                    State::ReadingStat(pending)
                }
                None => {
                    pending.body.push_str(line);
                    pending.body.push('\n');
                    State::ReadingBody(pending)
                }
            },
            State::ReadingStat(mut pending) => {
                if let Some(stat) = parse_shortstat(line) {
                    pending.stat = Some(stat);
                }
                State::ReadingStat(pending)
            }
        };
    }

    if let State::ReadingBody(pending) | State::ReadingStat(pending) = state {
        log.commits.push(pending.finish(branch));
    }

    log
}

/// Rewrite git's rename notation to the destination path.
///
/// `old => new` becomes `new`; `src/{old => new}/lib.rs` becomes `src/new/lib.rs`.
pub fn normalize_rename_path(raw: &str) -> String {
    if let (Some(open), Some(close)) = (raw.find('{'), raw.rfind('}')) {
        if open < close {
            let inner = &raw[open + 1..close];
            if let Some((_, to)) = inner.split_once(" => ") {
                let joined = format!("{}{}{}", &raw[..open], to, &raw[close + 1..]);
                return joined.replace("//", "/");
            }
        }
    }
    match raw.split_once(" => ") {
        Some((_, to)) => to.to_string(),
        None => raw.to_string(),
    }
}

/// Undo git's C-style quoting of a path (`"dir/tab\there.rs"`, `"caf\303\251.rs"`).
///
/// Unquoted input is returned as is. Octal escapes are raw bytes and are reassembled
/// before UTF-8 decoding.
pub fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next() {
            Some('n') => bytes.push(b'\n'),
            Some('t') => bytes.push(b'\t'),
            Some('r') => bytes.push(b'\r'),
            Some('a') => bytes.push(0x07),
            Some('b') => bytes.push(0x08),
            Some('f') => bytes.push(0x0c),
            Some('v') => bytes.push(0x0b),
            Some(d @ '0'..='7') => {
                let mut value = d.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|next| next.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            }
            Some(other) => {
                let mut buf = [0u8; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
            None => bytes.push(b'\\'),
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn parse_count(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    if raw == BINARY_MARKER {
        Some(0)
    } else {
        raw.parse().ok()
    }
}

/// Parse one `additions\tdeletions\tpath` line. Binary markers count as zero.
pub fn parse_numstat_line(line: &str) -> Option<FileChange> {
    let mut parts = line.splitn(3, '\t');
    let additions = parse_count(parts.next()?)?;
    let deletions = parse_count(parts.next()?)?;
    let path = parts.next()?.trim();
    if path.is_empty() {
        return None;
    }
    Some(FileChange::new(
        unquote_path(&normalize_rename_path(path)),
        additions,
        deletions,
    ))
}

pub fn parse_numstat(output: &str) -> Vec<FileChange> {
    output.lines().filter_map(parse_numstat_line).collect()
}

/// One commit as seen by the author log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorCommit {
    pub name: String,
    pub email: String,
    pub committed_at: DateTime<Utc>,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Default)]
pub struct AuthorLog {
    pub commits: Vec<AuthorCommit>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

fn parse_author_header(raw: &str) -> Result<AuthorCommit, String> {
    let mut fields = raw.rsplitn(3, FIELD_SEPARATOR);
    let date = fields.next().unwrap_or_default().trim();
    let email = fields.next().unwrap_or_default().trim();
    let name = fields.next().ok_or("expected 3 header fields")?.trim();

    if email.is_empty() {
        return Err("empty author email".to_string());
    }
    let committed_at = parse_timestamp(date).ok_or_else(|| format!("invalid date {date:?}"))?;

    Ok(AuthorCommit {
        name: name.to_string(),
        email: email.to_string(),
        committed_at,
        additions: 0,
        deletions: 0,
    })
}

/// Parse `git log --format=AUTHOR_LOG_FORMAT --numstat` output.
pub fn parse_author_log(output: &str) -> AuthorLog {
    let mut log = AuthorLog::default();
    let mut current: Option<AuthorCommit> = None;

    for (idx, line) in output.lines().enumerate() {
        if let Some(header) = line.strip_prefix(RECORD_SEPARATOR) {
            log.commits.extend(current.take());
            match parse_author_header(header) {
                Ok(commit) => current = Some(commit),
                Err(reason) => log
                    .diagnostics
                    .push(ParseDiagnostic::new(idx + 1, reason, header)),
            }
            continue;
        }

        if let (Some(commit), Some(change)) = (current.as_mut(), parse_numstat_line(line)) {
            commit.additions += change.additions;
            commit.deletions += change.deletions;
        }
    }
    log.commits.extend(current);

    log
}

/// Round `part / total` to a percentage with two decimals.
pub fn share_percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let hundredths = (u128::from(part) * 10_000 + u128::from(total) / 2) / u128::from(total);
    hundredths as f64 / 100.0
}

/// Fold author commits into per-email totals, most active first.
///
/// Emails are compared case-insensitively. The reported name and email are the ones
/// seen first, which for a newest-first log is the most recent spelling.
pub fn aggregate_contributors(commits: &[AuthorCommit]) -> Vec<ContributorStats> {
    let mut by_email: HashMap<String, ContributorStats> = HashMap::new();

    for commit in commits {
        by_email
            .entry(commit.email.to_lowercase())
            .and_modify(|stats| {
                stats.commits += 1;
                stats.additions += commit.additions;
                stats.deletions += commit.deletions;
                stats.first_commit = stats.first_commit.min(commit.committed_at);
                stats.last_commit = stats.last_commit.max(commit.committed_at);
            })
            .or_insert_with(|| ContributorStats {
                name: commit.name.clone(),
                email: commit.email.clone(),
                commits: 1,
                additions: commit.additions,
                deletions: commit.deletions,
                percentage: 0.0,
                first_commit: commit.committed_at,
                last_commit: commit.committed_at,
            });
    }

    let total: u64 = by_email.values().map(|stats| stats.commits).sum();
    let mut contributors: Vec<ContributorStats> = by_email
        .into_values()
        .map(|mut stats| {
            stats.percentage = share_percentage(stats.commits, total);
            stats
        })
        .collect();
    contributors.sort_by(|a, b| {
        b.commits
            .cmp(&a.commits)
            .then_with(|| a.email.to_lowercase().cmp(&b.email.to_lowercase()))
    });
    contributors
}
