use crate::model::ContributionTotals;
use crate::pipeline::RepoReport;
use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TallyOutput {
    pub generated_at: DateTime<Utc>,
    pub user: String,
    pub totals: ContributionTotals,
    pub repositories: Vec<RepoReport>,
}

pub fn aggregate(reports: &[RepoReport]) -> ContributionTotals {
    reports.iter().fold(ContributionTotals::default(), |mut acc, r| {
        acc.add(&r.totals);
        acc
    })
}

pub fn output_json(output: &TallyOutput) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(output)?);
    Ok(())
}

pub fn output_summary(output: &TallyOutput) -> anyhow::Result<()> {
    println!(
        "{:<40} {:>10} {:>10} {:>7} {:>8} {:>7}",
        style("Repository").bold(),
        style("Added").bold(),
        style("Deleted").bold(),
        style("Images").bold(),
        style("Commits").bold(),
        style("Hits").bold()
    );
    println!("{}", "─".repeat(87));
    for r in &output.repositories {
        let line = format!(
            "{:<40} {:>10} {:>10} {:>7} {:>8} {:>6.0}%",
            r.repository,
            r.totals.total_additions,
            r.totals.total_deletions,
            r.totals.total_images,
            r.commits,
            r.hit_rate()
        );
        if r.totals.is_zero() {
            println!("{}", style(line).dim());
        } else {
            println!("{line}");
        }
    }
    println!("{}", "─".repeat(87));
    println!("Total lines added: {}", style(output.totals.total_additions).green());
    println!("Total lines deleted: {}", style(output.totals.total_deletions).red());
    println!("Total images added: {}", style(output.totals.total_images).cyan());
    let failed: usize = output.repositories.iter().map(|r| r.failed).sum();
    if failed > 0 {
        println!(
            "{}",
            style(format!("{failed} commit(s) could not be fetched; retried next run")).yellow()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str, add: u64, del: u64, img: u64) -> RepoReport {
        RepoReport {
            repository: name.to_string(),
            totals: ContributionTotals {
                total_additions: add,
                total_deletions: del,
                total_images: img,
            },
            ..RepoReport::default()
        }
    }

    #[test]
    fn sums_repository_totals() {
        let reports = vec![report("o/a", 10, 2, 1), report("o/b", 0, 0, 0), report("o/c", 5, 5, 2)];
        assert_eq!(
            aggregate(&reports),
            ContributionTotals { total_additions: 15, total_deletions: 7, total_images: 3 }
        );
        assert!(aggregate(&[]).is_zero());
    }
}
