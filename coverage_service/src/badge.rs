//! Coverage Badge
//!
//! The badge shows the coverage of a project's most recent commit, optionally
//! on one branch. When several jobs reported on that commit the lowest value
//! wins: the badge reports the weakest job, not an average.
//!
//! The color comes from a piecewise-linear gradient (0 red, 70 orange,
//! 100 green) and the badge itself is rendered by an external badge service.

use tracing::debug;

use crate::error::{CoverageError, Result};
use crate::models::Entity;
use crate::repository::{CommitRepository, ReportRepository, Repositories};
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const GREEN: Rgb = Rgb(0x00, 0x80, 0x00);
    pub const ORANGE: Rgb = Rgb(0xff, 0xa5, 0x00);
    pub const RED: Rgb = Rgb(0xff, 0x00, 0x00);

    /// Lowercase `rrggbb`, without a leading `#`.
    pub fn to_hex(&self) -> String {
        format!("{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Color stops sorted by position. Values between two stops interpolate
/// each channel independently; values outside clamp to the nearest stop.
#[derive(Debug, Clone)]
pub struct Gradient {
    stops: Vec<(f64, Rgb)>,
}

impl Gradient {
    /// Returns `None` without stops or with a non-finite position.
    pub fn new(stops: impl IntoIterator<Item = (f64, Rgb)>) -> Option<Self> {
        let mut stops: Vec<_> = stops.into_iter().collect();
        if stops.is_empty() || stops.iter().any(|(position, _)| !position.is_finite()) {
            return None;
        }
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Some(Self { stops })
    }

    pub fn coverage() -> Self {
        Self {
            stops: vec![(0.0, Rgb::RED), (70.0, Rgb::ORANGE), (100.0, Rgb::GREEN)],
        }
    }

    pub fn color_at(&self, value: f64) -> Rgb {
        let (first, last) = (self.stops[0], self.stops[self.stops.len() - 1]);
        if value <= first.0 {
            return first.1;
        }
        if value >= last.0 {
            return last.1;
        }

        for pair in self.stops.windows(2) {
            let ((low, low_color), (high, high_color)) = (pair[0], pair[1]);
            if value == high {
                return high_color;
            }
            if value < high {
                let t = (value - low) / (high - low);
                return Rgb(
                    lerp(low_color.0, high_color.0, t),
                    lerp(low_color.1, high_color.1, t),
                    lerp(low_color.2, high_color.2, t),
                );
            }
        }

        last.1
    }
}

fn lerp(from: u8, to: u8, t: f64) -> u8 {
    let value = f64::from(from) + (f64::from(to) - f64::from(from)) * t;
    value.round_ties_even().clamp(0.0, 255.0) as u8
}

/// Two decimals, ties to even, keeping one for whole numbers (`40.0`, `85.12`).
fn format_percentage(coverage: f64) -> String {
    let rounded = (coverage * 100.0).round_ties_even() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{:.1}", rounded)
    } else {
        format!("{}", rounded)
    }
}

pub fn badge_url(base_url: &str, coverage: f64) -> String {
    let color = Gradient::coverage().color_at(coverage);
    format!(
        "{}coverage-{}%25-0?color={}",
        base_url,
        format_percentage(coverage),
        color.to_hex()
    )
}

#[derive(Clone)]
pub struct BadgeService<S> {
    commits: CommitRepository<S>,
    reports: ReportRepository<S>,
    base_url: String,
}

impl<S: DocumentStore> BadgeService<S> {
    pub fn new(repositories: &Repositories<S>, base_url: impl Into<String>) -> Self {
        Self {
            commits: repositories.commits.clone(),
            reports: repositories.reports.clone(),
            base_url: base_url.into(),
        }
    }

    /// Lowest coverage reported for the project's most recent commit.
    pub async fn coverage(&self, project_id: &str, branch: Option<&str>) -> Result<f64> {
        let commit = self.commits.get_last_commit(project_id, branch).await?;

        let mut lowest: Option<f64> = None;
        for report in self.reports.get_reports(commit.id().as_str()).await? {
            let value = report?.coverage_value();
            lowest = Some(lowest.map_or(value, |current| current.min(value)));
        }

        let coverage = lowest.ok_or_else(|| {
            CoverageError::NotFound(format!("No reports for commit {}", commit.id()))
        })?;
        debug!(project_id, commit_id = %commit.id(), coverage, "Badge coverage computed");
        Ok(coverage)
    }

    pub async fn badge_url(&self, project_id: &str, branch: Option<&str>) -> Result<String> {
        let coverage = self.coverage(project_id, branch).await?;
        Ok(badge_url(&self.base_url, coverage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://img.shields.io/badge/";

    #[test]
    fn test_anchor_colors_are_exact() {
        let gradient = Gradient::coverage();
        assert_eq!(gradient.color_at(100.0), Rgb::GREEN);
        assert_eq!(gradient.color_at(70.0), Rgb::ORANGE);
        assert_eq!(gradient.color_at(0.0), Rgb::RED);
    }

    #[test]
    fn test_between_anchors_interpolates() {
        let gradient = Gradient::coverage();

        let color = gradient.color_at(85.0);
        assert_eq!(color, Rgb(128, 146, 0));
        assert!(color.0 > Rgb::GREEN.0 && color.0 < Rgb::ORANGE.0);
        assert!(color.1 > Rgb::GREEN.1 && color.1 < Rgb::ORANGE.1);

        assert_eq!(gradient.color_at(40.0), Rgb(255, 94, 0));
    }

    #[test]
    fn test_out_of_range_clamps() {
        let gradient = Gradient::coverage();
        assert_eq!(gradient.color_at(120.0), Rgb::GREEN);
        assert_eq!(gradient.color_at(-3.0), Rgb::RED);
    }

    #[test]
    fn test_custom_gradient_is_sorted() {
        let gradient = Gradient::new([(10.0, Rgb(0, 0, 0)), (0.0, Rgb(200, 100, 50))]).unwrap();
        assert_eq!(gradient.color_at(5.0), Rgb(100, 50, 25));
        assert!(Gradient::new([]).is_none());
        assert!(Gradient::new([(f64::NAN, Rgb::RED)]).is_none());
    }

    #[test]
    fn test_badge_url_format() {
        assert_eq!(
            badge_url(BASE, 40.0),
            "https://img.shields.io/badge/coverage-40.0%25-0?color=ff5e00"
        );
        assert_eq!(
            badge_url(BASE, 100.0),
            "https://img.shields.io/badge/coverage-100.0%25-0?color=008000"
        );
        assert_eq!(
            badge_url(BASE, 85.1234),
            "https://img.shields.io/badge/coverage-85.12%25-0?color=7e9200"
        );
        assert_eq!(
            badge_url(BASE, 0.125),
            "https://img.shields.io/badge/coverage-0.12%25-0?color=ff0000"
        );
    }
}
