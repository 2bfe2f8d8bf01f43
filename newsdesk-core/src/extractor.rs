//! Section extraction from engine markdown.
//!
//! A line-oriented scanner in three layers: locate a `## ` section by exact
//! title, split its body on `### ` sub-headers, then read `- **Field**: value`
//! lines into a lowercase-keyed map. Malformed or missing input degrades to
//! defaults; nothing here returns an error.

use crate::prompts::{AUDIT_HEADING, DEEP_DIVES_HEADING, EVENTS_HEADING, TLDR_HEADING};
use crate::types::{
    CompletenessAudit, ConfidenceLevel, DeepDive, EventCategory, ExtractedSections, ViralEvent,
};
use std::collections::HashMap;

/// Impact rating used when the field is missing or not an integer.
pub const DEFAULT_IMPACT_RATING: u8 = 5;
/// Deep-dive priority used when the field is missing.
pub const DEFAULT_PRIORITY: &str = "MEDIUM";
/// Event source used when the field is missing.
pub const DEFAULT_SOURCE: &str = "Unknown";

const KEY_FINDINGS_MARKER: &str = "- **Key Findings**";

/// Run all four section parsers over `markdown`.
///
/// An empty TL;DR body is reported as `None`.
pub fn extract_sections(markdown: &str) -> ExtractedSections {
    let tldr = parse_tldr(markdown);
    ExtractedSections {
        tldr: (!tldr.is_empty()).then_some(tldr),
        viral_events: parse_viral_events(markdown),
        deep_dives: parse_deep_dives(markdown),
        completeness_audit: parse_completeness_audit(markdown),
    }
}

/// The trimmed body of the `## TL;DR` section, or `""` when absent.
pub fn parse_tldr(markdown: &str) -> String {
    section_body(markdown, TLDR_HEADING)
        .map(|body| body.join("\n").trim().to_string())
        .unwrap_or_default()
}

pub fn parse_viral_events(markdown: &str) -> Vec<ViralEvent> {
    let Some(body) = section_body(markdown, EVENTS_HEADING) else {
        return Vec::new();
    };
    split_blocks(&body)
        .into_iter()
        .filter_map(|block| parse_event_block(&block))
        .collect()
}

pub fn parse_deep_dives(markdown: &str) -> Vec<DeepDive> {
    let Some(body) = section_body(markdown, DEEP_DIVES_HEADING) else {
        return Vec::new();
    };
    split_blocks(&body)
        .into_iter()
        .filter_map(|block| parse_dive_block(&block))
        .collect()
}

/// Parse the audit section.
///
/// Missing numeric fields default to zero. A numeric field that is present
/// but unparsable discards the whole audit.
pub fn parse_completeness_audit(markdown: &str) -> Option<CompletenessAudit> {
    let body = section_body(markdown, AUDIT_HEADING)?;
    let fields = collect_fields(body.iter().copied());

    let verified_signals = count_or_zero(&fields, "verified signals")?;
    let sources_checked = count_or_zero(&fields, "sources checked")?;
    let confidence_score = parse_or_default::<f64>(&fields, "confidence score")?;
    if !confidence_score.is_finite() {
        return None;
    }

    let gaps = fields
        .get("gaps")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|gap| !gap.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    Some(CompletenessAudit {
        verified_signals,
        sources_checked,
        confidence_score: confidence_score.clamp(0.0, 1.0),
        gaps,
    })
}

/// `None` when present and malformed, the default when absent.
fn count_or_zero(fields: &HashMap<String, String>, key: &str) -> Option<i64> {
    match fields.get(key) {
        Some(raw) => parse_integer(raw),
        None => Some(0),
    }
}

/// Parse a decimal integer with an optional sign. Values beyond the `i64`
/// range saturate instead of failing.
fn parse_integer(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let (negative, digits) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(if negative { i64::MIN } else { i64::MAX })
}

fn parse_or_default<T>(fields: &HashMap<String, String>, key: &str) -> Option<T>
where
    T: std::str::FromStr + Default,
{
    match fields.get(key) {
        Some(raw) => raw.trim().parse().ok(),
        None => Some(T::default()),
    }
}

/// A level-2 header is `##` not followed by a third `#`.
fn is_level_two_header(line: &str) -> bool {
    line.starts_with("##") && !line.starts_with("###")
}

/// Lines between the header matching `heading` and the next level-2 header.
fn section_body<'a>(markdown: &'a str, heading: &str) -> Option<Vec<&'a str>> {
    let title = heading.trim_start_matches('#').trim();
    let mut lines = markdown.lines();

    lines
        .by_ref()
        .find(|line| is_level_two_header(line) && line[2..].trim() == title)?;

    Some(
        lines
            .take_while(|line| !is_level_two_header(line))
            .collect(),
    )
}

/// Split a section body into `### ` blocks. Text before the first
/// sub-header is not part of any block.
fn split_blocks<'a>(body: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut blocks: Vec<Vec<&'a str>> = Vec::new();
    for &line in body {
        if line.trim_start().starts_with("###") {
            blocks.push(vec![line]);
        } else if let Some(current) = blocks.last_mut() {
            current.push(line);
        }
    }
    blocks
}

/// Header text with leading `#` and whitespace removed.
fn block_title(header: &str) -> String {
    header.trim().trim_start_matches('#').trim().to_string()
}

/// Parse `- **Field**: value` into a lowercase key and trimmed value.
/// Empty keys or values do not count as fields.
fn parse_field_line(line: &str) -> Option<(String, String)> {
    let rest = line.trim().strip_prefix('-')?.trim_start();
    let rest = rest.strip_prefix("**")?;
    let (key, rest) = rest.split_once("**")?;
    let value = rest.strip_prefix(':')?.trim();
    let key = key.trim();
    if key.is_empty() || value.is_empty() {
        return None;
    }
    Some((key.to_lowercase(), value.to_string()))
}

fn collect_fields<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
    lines.filter_map(parse_field_line).collect()
}

fn parse_event_block(block: &[&str]) -> Option<ViralEvent> {
    let (header, rest) = block.split_first()?;
    let headline = block_title(header);
    if headline.is_empty() {
        return None;
    }
    let fields = collect_fields(rest.iter().copied());

    let impact_rating = fields
        .get("impact rating")
        .and_then(|raw| parse_integer(raw))
        .map(|rating| rating.clamp(1, 10) as u8)
        .unwrap_or(DEFAULT_IMPACT_RATING);

    Some(ViralEvent {
        headline,
        category: fields
            .get("category")
            .map(|c| EventCategory::from_label(c))
            .unwrap_or(EventCategory::Research),
        impact_rating,
        confidence: fields
            .get("confidence")
            .map(|c| ConfidenceLevel::from_label(c))
            .unwrap_or(ConfidenceLevel::Medium),
        source: fields
            .get("source")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
        summary: fields.get("summary").cloned().unwrap_or_default(),
    })
}

fn parse_dive_block(block: &[&str]) -> Option<DeepDive> {
    let (header, rest) = block.split_first()?;
    let title = block_title(header);
    if title.is_empty() {
        return None;
    }

    let mut fields = HashMap::new();
    let mut key_findings = Vec::new();
    let mut in_findings = false;

    for line in rest {
        let stripped = line.trim();
        if stripped.starts_with(KEY_FINDINGS_MARKER) {
            in_findings = true;
            continue;
        }
        if in_findings {
            if let Some(finding) = stripped.strip_prefix("- ").map(str::trim)
                && !finding.is_empty()
            {
                key_findings.push(finding.to_string());
            }
            continue;
        }
        if let Some((key, value)) = parse_field_line(stripped) {
            fields.insert(key, value);
        }
    }

    Some(DeepDive {
        title,
        priority: fields
            .remove("priority")
            .unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
        summary: fields.remove("summary").unwrap_or_default(),
        key_findings,
    })
}
