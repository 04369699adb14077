//! Markdown rendering of plans, job summaries and site listings
//!
//! The CLI prints these to stdout and can also write a job summary to a report file.

use crate::planner::CrawlPlan;
use crate::storage::{ColumnInfo, CrawlJobSummary, SiteSummary, TableSummary};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes a rendered report to a file
///
/// # Arguments
///
/// * `markdown` - The rendered markdown
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(std::io::Error)` - Failed to write the report
pub fn write_report(markdown: &str, output_path: &Path) -> std::io::Result<()> {
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;
    Ok(())
}

/// Formats a crawl plan as markdown
pub fn format_plan(plan: &CrawlPlan) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Crawl Plan: {}\n\n", plan.site_name));

    md.push_str("## Seeds\n\n");
    for seed in &plan.seeds {
        md.push_str(&format!("- {}\n", seed));
    }
    if plan.seed_from_sitemap {
        md.push_str("- plus URLs listed in the site's sitemaps\n");
    }
    md.push('\n');

    md.push_str("## Scope\n\n");
    md.push_str(&format!("- **Base URL**: {}\n", plan.base_url));
    md.push_str(&format!(
        "- **Allowed Prefixes**: {}\n",
        plan.scope.allowed_prefixes.join(", ")
    ));
    md.push_str(&format!("- **Max Depth**: {}\n", plan.scope.max_depth));
    md.push_str(&format!("- **Page Ceiling**: {}\n", plan.max_pages));
    md.push_str(&format!(
        "- **External Links**: {}\n",
        if plan.scope.follow_external {
            "followed"
        } else {
            "ignored"
        }
    ));
    if !plan.scope.include.is_empty() {
        md.push_str(&format!("- **Include**: {}\n", plan.scope.include.join(", ")));
    }
    if !plan.scope.exclude.is_empty() {
        md.push_str(&format!("- **Exclude**: {}\n", plan.scope.exclude.join(", ")));
    }
    md.push('\n');

    md.push_str("## Politeness\n\n");
    md.push_str(&format!("- **Workers**: {}\n", plan.politeness.max_workers));
    md.push_str(&format!(
        "- **Per-Host Concurrency**: {}\n",
        plan.politeness.per_host_concurrency
    ));
    md.push_str(&format!(
        "- **Delay**: {} ms\n",
        plan.politeness.delay.as_millis()
    ));
    md.push_str(&format!(
        "- **Robots.txt**: {}\n",
        if plan.politeness.respect_robots {
            "respected"
        } else {
            "ignored"
        }
    ));
    md.push_str(&format!("- **User Agent**: {}\n", plan.politeness.user_agent));
    md.push_str(&format!(
        "- **Minimum Duration (single host)**: {:.1} s\n",
        plan.politeness.min_single_host_duration.as_secs_f64()
    ));

    if !plan.warnings.is_empty() {
        md.push_str("\n## Warnings\n\n");
        for warning in &plan.warnings {
            md.push_str(&format!("- {}\n", warning));
        }
    }

    md
}

/// Formats a crawl job summary as markdown
pub fn format_summary(summary: &CrawlJobSummary) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Crawl Job {} ({})\n\n", summary.job_id, summary.kind));

    md.push_str("## Job Information\n\n");
    md.push_str(&format!("- **Site**: {}\n", summary.site));
    md.push_str(&format!("- **State**: {}\n", summary.state));
    if let Some(reason) = summary.stop_reason {
        md.push_str(&format!("- **Stop Reason**: {}\n", reason));
    }
    if let Some(started) = summary.started_at {
        md.push_str(&format!("- **Started**: {}\n", started.to_rfc3339()));
    }
    if let Some(finished) = summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = summary.duration() {
        md.push_str(&format!(
            "- **Duration**: {:.2} seconds\n",
            duration.num_milliseconds() as f64 / 1000.0
        ));
    }
    if let Some(error) = &summary.error {
        md.push_str(&format!("- **Error**: {}\n", error));
    }
    md.push('\n');

    let c = &summary.counters;
    md.push_str("## Pages\n\n");
    md.push_str("| State | Count |\n");
    md.push_str("|-------|-------|\n");
    md.push_str(&format!("| Discovered | {} |\n", c.discovered));
    md.push_str(&format!("| Fetched | {} |\n", c.fetched));
    md.push_str(&format!("| Indexed | {} |\n", c.indexed));
    md.push_str(&format!("| Unchanged | {} |\n", c.skipped));
    md.push_str(&format!("| Failed | {} |\n", c.failed));
    md.push_str(&format!("| Excluded | {} |\n", c.excluded));
    md.push_str(&format!("| Tombstoned | {} |\n", c.tombstoned));

    md
}

/// Formats the list of stored sites as a markdown table
pub fn format_sites(sites: &[SiteSummary]) -> String {
    if sites.is_empty() {
        return "No sites indexed yet.\n".to_string();
    }

    let mut md = String::new();
    md.push_str("| Site | Base URL | Pages | Tombstoned | Chunks | Last Crawled |\n");
    md.push_str("|------|----------|-------|------------|--------|--------------|\n");
    for site in sites {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            site.name,
            site.base_url,
            site.active_pages,
            site.tombstoned_pages,
            site.chunks,
            site.last_crawled_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string())
        ));
    }
    md
}

/// Renders the database tables with their row counts
pub fn format_tables(tables: &[TableSummary]) -> String {
    let mut md = String::new();
    md.push_str("| Table | Rows |\n");
    md.push_str("|-------|------|\n");
    for table in tables {
        md.push_str(&format!("| {} | {} |\n", table.name, table.rows));
    }
    md
}

/// Renders the column layout of one table
pub fn format_columns(table: &str, columns: &[ColumnInfo]) -> String {
    let mut md = format!("# Table: {}\n\n", table);
    md.push_str("| Column | Type | Not Null | Default | Primary Key |\n");
    md.push_str("|--------|------|----------|---------|-------------|\n");
    for column in columns {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            column.name,
            column.decl_type,
            if column.not_null { "yes" } else { "" },
            column.default_value.as_deref().unwrap_or(""),
            if column.primary_key { "yes" } else { "" },
        ));
    }
    md
}
