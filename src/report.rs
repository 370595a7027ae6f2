//! Run summary
//!
//! Every episode that entered the pipeline ends up here, either as a
//! downloaded file or as a typed failure.

use crate::media::ResolvedMedia;
use crate::series::SeriesRef;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Category of an episode-local failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// An episode, watch or alternate page could not be fetched
    PageFetch,
    /// The episode page carries no watch link
    WatchLinkNotFound,
    /// Neither a primary source nor an alternate host link was found
    AlternateLinkNotFound,
    /// The alternate host page has no download token
    TokenNotFound,
    /// The alternate host page has no hidden link fragment
    LinkFragmentNotFound,
    /// The alternate host page has no usable title
    TitleNotFound,
    /// The media URL has no path segment to name the file after
    MissingFilename,
    /// The media request failed or broke off
    Transport,
    /// The destination file could not be written
    Write,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::PageFetch => "page fetch failed",
            FailureKind::WatchLinkNotFound => "no watch link",
            FailureKind::AlternateLinkNotFound => "no media source",
            FailureKind::TokenNotFound => "alternate host token missing",
            FailureKind::LinkFragmentNotFound => "alternate host link missing",
            FailureKind::TitleNotFound => "alternate host title missing",
            FailureKind::MissingFilename => "no file name in media URL",
            FailureKind::Transport => "download failed",
            FailureKind::Write => "write failed",
        };
        f.write_str(label)
    }
}

/// An episode page that produced no watch URL
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    /// URL the failure is attributed to
    pub url: String,
    pub kind: FailureKind,
    /// Human readable cause
    pub message: String,
}

/// How a single episode ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EpisodeOutcome {
    Downloaded {
        media: ResolvedMedia,
        path: PathBuf,
        bytes: u64,
    },
    Failed {
        kind: FailureKind,
        message: String,
    },
}

/// Result of one episode that entered the download stage
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeReport {
    /// Position assigned when the download stage started (zero based)
    pub index: usize,
    pub watch_url: String,
    #[serde(flatten)]
    pub outcome: EpisodeOutcome,
}

impl EpisodeReport {
    /// Failure category, if the episode failed
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            EpisodeOutcome::Failed { kind, .. } => Some(*kind),
            EpisodeOutcome::Downloaded { .. } => None,
        }
    }
}

/// Summary of a whole series run
#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub series: SeriesRef,
    /// Directory the episodes were written to
    pub directory: PathBuf,
    /// Number of episode pages found on the series page
    pub episode_pages: usize,
    /// Episode pages that yielded no watch URL
    pub lookup_failures: Vec<FailureRecord>,
    /// Episodes that entered the download stage, in completion order
    pub episodes: Vec<EpisodeReport>,
}

impl SeriesReport {
    /// Episodes that were written to disk
    pub fn downloaded(&self) -> usize {
        self.episodes
            .iter()
            .filter(|episode| matches!(episode.outcome, EpisodeOutcome::Downloaded { .. }))
            .count()
    }

    /// Episodes that failed at any stage, including lookups
    pub fn failed(&self) -> usize {
        self.lookup_failures.len() + self.episodes.len() - self.downloaded()
    }

    /// Number of failures per category, across all stages
    pub fn failure_counts(&self) -> BTreeMap<FailureKind, usize> {
        let mut counts = BTreeMap::new();

        let kinds = self
            .lookup_failures
            .iter()
            .map(|failure| failure.kind)
            .chain(self.episodes.iter().filter_map(EpisodeReport::failure_kind));

        for kind in kinds {
            *counts.entry(kind).or_insert(0) += 1;
        }

        counts
    }

    /// Bytes written across all downloaded episodes
    pub fn total_bytes(&self) -> u64 {
        self.episodes
            .iter()
            .map(|episode| match episode.outcome {
                EpisodeOutcome::Downloaded { bytes, .. } => bytes,
                EpisodeOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn downloaded(index: usize, bytes: u64) -> EpisodeReport {
        EpisodeReport {
            index,
            watch_url: format!("https://example.org/watch?file=ep{}", index),
            outcome: EpisodeOutcome::Downloaded {
                media: ResolvedMedia {
                    url: format!("https://cdn.example.org/ep{}.mp4", index),
                    filename: format!("ep{}.mp4", index),
                    is_primary_host: true,
                },
                path: PathBuf::from(format!("Downloads/My Show/ep{}.mp4", index)),
                bytes,
            },
        }
    }

    fn failed(index: usize, kind: FailureKind) -> EpisodeReport {
        EpisodeReport {
            index,
            watch_url: format!("https://example.org/watch?file=ep{}", index),
            outcome: EpisodeOutcome::Failed {
                kind,
                message: "boom".to_string(),
            },
        }
    }

    fn report() -> SeriesReport {
        SeriesReport {
            series: SeriesRef {
                id: "my-show".to_string(),
                display_name: "My Show".to_string(),
            },
            directory: PathBuf::from("Downloads/My Show"),
            episode_pages: 6,
            lookup_failures: vec![FailureRecord {
                url: "https://example.org/episode/6".to_string(),
                kind: FailureKind::WatchLinkNotFound,
                message: "No watch link".to_string(),
            }],
            episodes: vec![
                downloaded(0, 1000),
                failed(1, FailureKind::Transport),
                downloaded(2, 2500),
                failed(3, FailureKind::TokenNotFound),
                failed(4, FailureKind::Transport),
            ],
        }
    }

    #[test]
    fn test_counts() {
        let report = report();
        assert_eq!(report.downloaded(), 2);
        assert_eq!(report.failed(), 4);
        assert_eq!(report.total_bytes(), 3500);

        let counts = report.failure_counts();
        assert_eq!(counts.get(&FailureKind::Transport), Some(&2));
        assert_eq!(counts.get(&FailureKind::TokenNotFound), Some(&1));
        assert_eq!(counts.get(&FailureKind::WatchLinkNotFound), Some(&1));
        assert_eq!(counts.get(&FailureKind::Write), None);
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(report()).unwrap();

        assert_eq!(value["series"]["display_name"], "My Show");
        assert_eq!(value["lookup_failures"][0]["kind"], "watch_link_not_found");
        assert_eq!(value["episodes"][0]["status"], "downloaded");
        assert_eq!(value["episodes"][0]["bytes"], 1000);
        assert_eq!(value["episodes"][1]["status"], "failed");
        assert_eq!(value["episodes"][1]["kind"], "transport");
    }
}
