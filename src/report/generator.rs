//! Markdown report generation.
//!
//! This module renders an [`AnalysisResult`] as a Markdown visibility report
//! or as pretty-printed JSON.

use crate::analysis::aggregator::leaders_by_position;
use crate::analysis::UNRANKED_POSITION;
use crate::models::{AnalysisResult, CompetitorRanking, ProviderBreakdown, ResponseAnalysis};
use anyhow::Result;
use std::path::Path;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(result: &AnalysisResult) -> String {
    let mut output = String::new();

    // Title
    match result.own_brand() {
        Some(own) => output.push_str(&format!("# Brand Visibility Report: {}\n\n", own.name)),
        None => output.push_str("# Brand Visibility Report\n\n"),
    }

    output.push_str(&generate_metadata_section(result));
    output.push_str(&generate_table_of_contents(result));
    output.push_str(&generate_summary_section(result));
    output.push_str(&generate_rankings_section(&result.competitors));
    output.push_str(&generate_breakdown_section(&result.provider_breakdown));
    output.push_str(&generate_responses_section(&result.responses));
    output.push_str(&generate_problems_section(result));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Run ID:** `{}`\n", result.run_id));
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        result.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!(
        "- **Sources:** {}\n",
        result
            .provider_breakdown
            .iter()
            .map(|p| format!("`{}`", p.source_id))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    section.push_str(&format!("- **Responses Analyzed:** {}\n", result.responses.len()));
    if !result.errors.is_empty() {
        section.push_str(&format!("- **Failed Tasks:** {}\n", result.errors.len()));
    }
    if result.cancelled {
        section.push_str("- **Status:** cancelled (partial results)\n");
    }
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n",
        result.duration_seconds()
    ));
    section.push('\n');

    section
}

/// Generate the table of contents.
fn generate_table_of_contents(result: &AnalysisResult) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");
    toc.push_str("- [Summary](#summary)\n");
    toc.push_str("- [Competitor Rankings](#competitor-rankings)\n");

    if !result.provider_breakdown.is_empty() {
        toc.push_str("- [Source Breakdown](#source-breakdown)\n");
    }
    if !result.responses.is_empty() {
        toc.push_str("- [Responses](#responses)\n");
    }
    if !result.errors.is_empty() || !result.skipped_sources.is_empty() {
        toc.push_str("- [Errors and Skipped Sources](#errors-and-skipped-sources)\n");
    }

    toc.push('\n');

    toc
}

/// Generate the summary section.
fn generate_summary_section(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Summary\n\n");

    if result.responses.is_empty() {
        section.push_str("No responses were analyzed, so every brand scores zero.\n\n");
        return section;
    }

    if let Some(own) = result.own_brand() {
        section.push_str("| Visibility | Share of Voice | Avg. Position | Sentiment |\n");
        section.push_str("|:---:|:---:|:---:|:---:|\n");
        section.push_str(&format!(
            "| {:.1}% | {:.1}% | {} | {} {} ({:.1}) |\n\n",
            own.visibility_score,
            own.share_of_voice,
            format_position(own.average_position),
            own.sentiment.emoji(),
            own.sentiment,
            own.sentiment_score
        ));

        let rank = result
            .competitors
            .iter()
            .position(|c| c.is_own)
            .map(|i| i + 1)
            .unwrap_or(0);
        section.push_str(&format!(
            "**{}** is mentioned in {} of {} responses and ranks #{} of {} tracked brands by visibility.\n\n",
            own.name,
            own.mentions,
            result.responses.len(),
            rank,
            result.competitors.len()
        ));
    }

    let leaders: Vec<&CompetitorRanking> = leaders_by_position(&result.competitors)
        .into_iter()
        .filter(|c| c.average_position < UNRANKED_POSITION)
        .take(3)
        .collect();
    if !leaders.is_empty() {
        section.push_str("### Top Listed Brands\n\n");
        for (i, leader) in leaders.iter().enumerate() {
            section.push_str(&format!(
                "{}. {} (avg. position {:.1})\n",
                i + 1,
                leader.name,
                leader.average_position
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the competitor rankings table.
fn generate_rankings_section(competitors: &[CompetitorRanking]) -> String {
    let mut section = String::new();

    section.push_str("## Competitor Rankings\n\n");
    section.push_str(&rankings_table(competitors));

    section
}

fn rankings_table(competitors: &[CompetitorRanking]) -> String {
    let mut table = String::new();

    table.push_str("| Brand | Mentions | Visibility | Share of Voice | Avg. Position | Sentiment |\n");
    table.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");

    for c in competitors {
        let name = if c.is_own {
            format!("**{}** (you)", c.name)
        } else {
            c.name.clone()
        };
        table.push_str(&format!(
            "| {} | {} | {:.1}% | {:.1}% | {} | {} {:.1} |\n",
            name,
            c.mentions,
            c.visibility_score,
            c.share_of_voice,
            format_position(c.average_position),
            c.sentiment.emoji(),
            c.sentiment_score
        ));
    }
    table.push('\n');

    table
}

/// Generate the per-source breakdown.
fn generate_breakdown_section(breakdown: &[ProviderBreakdown]) -> String {
    if breakdown.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Source Breakdown\n\n");

    // Visibility matrix: brands as rows, sources as columns.
    if let Some(first) = breakdown.first() {
        section.push_str("### Visibility by Source\n\n");
        section.push_str("| Brand |");
        for source in breakdown {
            section.push_str(&format!(" {} |", source.source_id));
        }
        section.push_str("\n|:---|");
        section.push_str(&":---:|".repeat(breakdown.len()));
        section.push('\n');

        for brand in &first.competitors {
            section.push_str(&format!("| {} |", brand.name));
            for source in breakdown {
                let visibility = source
                    .competitors
                    .iter()
                    .find(|c| c.name == brand.name)
                    .map_or(0.0, |c| c.visibility_score);
                section.push_str(&format!(" {:.1}% |", visibility));
            }
            section.push('\n');
        }
        section.push('\n');
    }

    for source in breakdown {
        section.push_str(&format!(
            "### {} ({} responses)\n\n",
            source.source_id, source.responses
        ));
        if source.responses == 0 {
            section.push_str("*No responses from this source.*\n\n");
            continue;
        }
        section.push_str(&rankings_table(&source.competitors));
    }

    section
}

/// Generate the responses section.
fn generate_responses_section(responses: &[ResponseAnalysis]) -> String {
    if responses.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Responses\n\n");

    for response in responses {
        section.push_str(&generate_response_block(response));
    }

    section
}

/// Generate a single response block.
fn generate_response_block(response: &ResponseAnalysis) -> String {
    let mut block = String::new();

    block.push_str(&format!(
        "#### `{}`: {}\n\n",
        response.source_id, response.prompt
    ));

    let mentioned = if response.brand_mentioned {
        "✅ mentioned"
    } else {
        "❌ not mentioned"
    };
    let position = response
        .brand_position
        .map(|p| format!("#{}", p))
        .unwrap_or_else(|| "unranked".to_string());
    block.push_str(&format!(
        "*Brand: {} | Position: {} | Sentiment: {} | Confidence: {:.2}*\n\n",
        mentioned, position, response.sentiment, response.confidence
    ));

    if !response.competitors.is_empty() {
        block.push_str(&format!(
            "**Competitors mentioned:** {}\n\n",
            response.competitors.join(", ")
        ));
    }

    if !response.rankings.is_empty() {
        let ranked: Vec<String> = response
            .rankings
            .iter()
            .map(|r| format!("{}. {}", r.position, r.company))
            .collect();
        block.push_str(&format!("**Ranking:** {}\n\n", ranked.join(" · ")));
    }

    if !response.cited_sources.is_empty() {
        block.push_str("**Cited sources:**\n\n");
        for url in &response.cited_sources {
            block.push_str(&format!("- <{}>\n", url));
        }
        block.push('\n');
    }

    block.push_str("<details>\n<summary>View Response</summary>\n\n");
    block.push_str(&response.text);
    block.push_str("\n\n</details>\n\n");

    block.push_str("---\n\n");

    block
}

/// Generate the errors and skipped sources section.
fn generate_problems_section(result: &AnalysisResult) -> String {
    if result.errors.is_empty() && result.skipped_sources.is_empty() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("## Errors and Skipped Sources\n\n");

    if !result.skipped_sources.is_empty() {
        section.push_str(&format!(
            "Skipped after an authentication or configuration failure: {}\n\n",
            result
                .skipped_sources
                .iter()
                .map(|s| format!("`{}`", s))
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }

    if !result.errors.is_empty() {
        section.push_str("| Source | Prompt | Error |\n");
        section.push_str("|:---|:---|:---|\n");
        for error in &result.errors {
            section.push_str(&format!(
                "| `{}` | {} | {} |\n",
                error.source_id,
                error.prompt.replace('|', "\\|"),
                error.message.replace('|', "\\|").replace('\n', " ")
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by MentionScope v{}*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

fn format_position(position: f64) -> String {
    if position >= UNRANKED_POSITION {
        "unranked".to_string()
    } else {
        format!("{:.1}", position)
    }
}

/// Generate a JSON report.
pub fn generate_json_report(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

/// Write the rendered report to a file.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    use anyhow::Context;

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}
