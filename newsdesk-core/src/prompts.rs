//! Prompt templates.
//!
//! The daily briefing prompt handed to both engines, plus the system
//! preambles that split the graph engine's generation into three branches.
//! The field layout described here is the one [`crate::extractor`] parses.

use chrono::NaiveDate;

pub const TLDR_HEADING: &str = "## TL;DR";
pub const EVENTS_HEADING: &str = "## Global Viral Events";
pub const DEEP_DIVES_HEADING: &str = "## Strategic Deep Dives";
pub const AUDIT_HEADING: &str = "## Completeness Audit";

pub const TLDR_PREAMBLE: &str = "You are a Deep Research Analyst providing comprehensive \
intelligence analysis. Produce ONLY the ## TL;DR section with a 3-5 bullet executive \
summary. Do not produce any other sections.";

pub const EVENTS_PREAMBLE: &str = "You are a Deep Research Analyst providing comprehensive \
intelligence analysis. Produce ONLY the ## Global Viral Events section. \
For each event use this format:
### <Headline>
- **Category**: <product_launch|funding|partnership|regulation|research|open_source>
- **Impact Rating**: <1-10>
- **Confidence**: <high|medium|low>
- **Source**: <source URL or name>
- **Summary**: <2-3 sentence description>
Do not produce any other sections.";

pub const DIVES_AUDIT_PREAMBLE: &str = "You are a Deep Research Analyst providing comprehensive \
intelligence analysis. Produce ONLY the ## Strategic Deep Dives and ## Completeness Audit \
sections. For deep dives use:
### <Title>
- **Priority**: HIGH|MEDIUM|LOW
- **Summary**: <paragraph>
- **Key Findings**:
  - <finding>
For the completeness audit use:
- **Verified Signals**: <int>
- **Sources Checked**: <int>
- **Confidence Score**: <0.0-1.0>
- **Gaps**: <comma-separated list>
Do not produce any other sections.";

const DAILY_BRIEFING: &str = "You are a Global AI Viral Intelligence Tracker v4.0.

Today's date: {date}

Your mission: Produce a comprehensive daily intelligence report covering the most
significant and viral developments in the AI industry from the past 24 hours.

Structure your report with these sections:

## TL;DR
A 3-5 bullet executive summary of the most impactful developments.

## Global Viral Events
For each event, start a `### <Headline>` block followed by:
- **Category**: product_launch, funding, partnership, regulation, research or open_source
- **Impact Rating**: 1-10
- **Confidence**: high, medium or low
- **Source**: URL or publication
- **Summary**: 2-3 sentences

## Strategic Deep Dives
Pick 2-3 events for deeper analysis. For each, start a `### <Title>` block followed by:
- **Priority**: HIGH, MEDIUM or LOW
- **Summary**: one paragraph
- **Key Findings**: followed by one indented bullet per finding

## Completeness Audit
- **Verified Signals**: number of verified signals
- **Sources Checked**: number of sources checked
- **Confidence Score**: overall confidence from 0.0 to 1.0
- **Gaps**: comma-separated coverage gaps, if any

Be thorough, cite sources, and rate your confidence honestly.";

/// Builds the research prompt for a run date.
pub trait PromptTemplate: Send + Sync {
    fn build(&self, date: NaiveDate) -> String;
}

/// The AI-industry daily tracker prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct DailyBriefingTemplate;

impl PromptTemplate for DailyBriefingTemplate {
    fn build(&self, date: NaiveDate) -> String {
        DAILY_BRIEFING.replace("{date}", &date.format("%Y-%m-%d").to_string())
    }
}
