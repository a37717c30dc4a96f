use crate::rag::profile::generate_profile_context;
use crate::rag::types::{ConfidenceResult, EmploymentType, ResponseStrategy, SearchResult, UserProfile};
use crate::schema::{ConfidenceLevel, Province};

const HIGH_CONFIDENCE_CONTEXT_SCORE: f64 = 0.45;
const DEFAULT_CONTEXT_SCORE: f64 = 0.35;
const MAX_CONTEXT_RESULTS: usize = 6;

const ROLE_STATEMENT: &str = "You are a friendly Canadian personal tax assistant. \
You explain Canada Revenue Agency (CRA) rules in plain language for individuals filing their own returns.";

pub struct PromptContext<'a> {
    pub query: &'a str,
    pub results: &'a [SearchResult],
    pub profile: Option<&'a UserProfile>,
    pub confidence: &'a ConfidenceResult,
    pub strategy: &'a ResponseStrategy,
}

/// Minimum retrieval score for a passage to be quoted in the prompt.
pub fn context_score_threshold(level: ConfidenceLevel) -> f64 {
    match level {
        ConfidenceLevel::High => HIGH_CONFIDENCE_CONTEXT_SCORE,
        ConfidenceLevel::Medium | ConfidenceLevel::Low => DEFAULT_CONTEXT_SCORE,
    }
}

pub fn select_context_results<'r>(
    results: &'r [SearchResult],
    level: ConfidenceLevel,
) -> Vec<&'r SearchResult> {
    let threshold = context_score_threshold(level);
    results
        .iter()
        .filter(|r| r.score > threshold)
        .take(MAX_CONTEXT_RESULTS)
        .collect()
}

pub fn build_system_prompt(ctx: &PromptContext<'_>) -> String {
    let mut sections: Vec<String> = vec![ROLE_STATEMENT.to_string()];

    if let Some(profile) = ctx.profile {
        let profile_context = generate_profile_context(profile);
        if !profile_context.is_empty() {
            sections.push(format!("## USER PROFILE\n{}", profile_context.trim_end()));
        }
    }

    sections.push(response_rules(ctx.strategy));

    if ctx.strategy.use_rag_context {
        let selected = select_context_results(ctx.results, ctx.confidence.level);
        if !selected.is_empty() {
            sections.push(context_block(&selected));
        }
    }

    sections.push(task_block(ctx));

    sections.join("\n\n")
}

fn response_rules(strategy: &ResponseStrategy) -> String {
    let mut rules = String::from("## RESPONSE RULES\n");
    if strategy.requires_disclaimer {
        rules.push_str(
            "- The official sources below may not fully cover this question. Say so clearly.\n\
             - Separate what the sources state from general tax knowledge.\n\
             - End with a short disclaimer that this is general information, not tax advice.\n",
        );
    } else {
        rules.push_str(
            "- Answer directly from the official sources below.\n\
             - Cite the source title for each rule or amount you mention.\n",
        );
    }
    rules.push_str(
        "- Use exact dollar amounts, percentages and deadlines when the sources give them.\n\
         - Never invent form numbers, line numbers or limits.",
    );
    rules
}

fn context_block(results: &[&SearchResult]) -> String {
    let mut block = String::from("## OFFICIAL CRA CONTEXT\n");
    for (i, result) in results.iter().enumerate() {
        block.push_str(&format!("\n[{}] {}", i + 1, result.title));
        if let Some(url) = &result.url {
            block.push_str(&format!(" ({})", url));
        }
        block.push('\n');
        block.push_str(result.content.trim());
        block.push('\n');
    }
    block.trim_end().to_string()
}

fn task_block(ctx: &PromptContext<'_>) -> String {
    let mut lines: Vec<String> = vec![
        "## YOUR TASK".to_string(),
        format!("Answer the user's question: \"{}\"", ctx.query.trim()),
    ];

    if ctx.strategy.personalize {
        if let Some(profile) = ctx.profile {
            lines.extend(profile_instructions(profile));
        }
    }

    if ctx.strategy.use_general_knowledge {
        lines.push("- You may supplement the sources with well-established general tax knowledge.".to_string());
    } else {
        lines.push("- Stay within what the official context supports.".to_string());
    }
    if ctx.strategy.recommend_professional {
        lines.push("- Recommend confirming with a tax professional or the CRA before acting.".to_string());
    }
    if ctx.confidence.level != ConfidenceLevel::High {
        lines.push("- Point the user to canada.ca for the authoritative rules.".to_string());
    }

    lines.join("\n")
}

fn profile_instructions(profile: &UserProfile) -> Vec<String> {
    let mut lines = Vec::new();
    match profile.employment_type {
        Some(EmploymentType::SelfEmployed) => lines.push(
            "- Remember they are SELF-EMPLOYED: mention business deductions and CPP on self-employment income where relevant."
                .to_string(),
        ),
        Some(EmploymentType::Retired) => lines.push(
            "- Remember they are RETIRED: consider pension income, OAS clawback and pension splitting."
                .to_string(),
        ),
        Some(EmploymentType::Student) => lines.push(
            "- Remember they are a STUDENT: consider tuition credits and student loan interest."
                .to_string(),
        ),
        _ => {}
    }
    if let Some(province) = profile.province {
        lines.push(format!(
            "- Give the {} provincial treatment where it differs from the federal rules.",
            province.name()
        ));
        if province == Province::Quebec {
            lines.push("- Mention the separate Revenu Québec return where relevant.".to_string());
        }
    }
    if profile.has_spouse() {
        lines.push("- Consider spousal transfers and household-level optimizations.".to_string());
    }
    if profile.has_children {
        lines.push("- Mention child-related benefits and deductions if they apply.".to_string());
    }
    lines
}
