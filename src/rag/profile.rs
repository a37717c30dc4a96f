use crate::rag::types::{EmploymentType, MaritalStatus, UserProfile};
use crate::schema::Province;

const TOPIC_MATCH_WEIGHT: f64 = 0.4;
const PERSONAL_PRONOUN_BOOST: f64 = 0.2;

const FIRST_PERSON: &[&str] = &["i", "i'm", "i've", "me", "my", "mine", "myself", "we", "our", "ours"];

struct Topic {
    keywords: &'static [&'static str],
    applies: fn(&UserProfile) -> bool,
}

const TOPICS: &[Topic] = &[
    Topic {
        keywords: &["rrsp", "retirement savings", "spousal plan"],
        applies: |p| p.has_rrsp,
    },
    Topic {
        keywords: &["tfsa", "tax-free savings"],
        applies: |p| p.has_tfsa,
    },
    Topic {
        keywords: &["fhsa", "first home", "home buyer", "homebuyer"],
        applies: |p| p.is_first_time_home_buyer,
    },
    Topic {
        keywords: &["self-employed", "self employed", "business", "t2125", "freelanc", "contractor", "gst", "hst"],
        applies: |p| p.is_self_employed(),
    },
    Topic {
        keywords: &["child", "kid", "daycare", "ccb", "dependant"],
        applies: |p| p.has_children,
    },
    Topic {
        keywords: &["spouse", "partner", "married", "common-law", "common law", "pension splitting"],
        applies: |p| p.has_spouse(),
    },
    Topic {
        keywords: &["rent", "landlord", "tenant"],
        applies: |p| p.has_rental_income,
    },
    Topic {
        keywords: &["capital gain", "dividend", "investment", "stock", "etf"],
        applies: |p| p.has_investments,
    },
    Topic {
        keywords: &["disability", "dtc", "t2201"],
        applies: |p| p.has_disability,
    },
    Topic {
        keywords: &["pension", "retire", "oas", "cpp"],
        applies: |p| p.employment_type == Some(EmploymentType::Retired),
    },
    Topic {
        keywords: &["tuition", "student", "t2202", "school"],
        applies: |p| p.employment_type == Some(EmploymentType::Student),
    },
    Topic {
        keywords: &["newcomer", "immigra", "resident", "moved to canada"],
        applies: |p| p.is_newcomer,
    },
    Topic {
        keywords: &["provinc", "quebec", "ontario", "alberta"],
        applies: |p| p.province.is_some(),
    },
];

/// True when `term` occurs in `haystack` at the start of a word. Both must be
/// lowercase. Prefix matches are intended (`credit` matches `credits`).
fn mentions(haystack: &str, term: &str) -> bool {
    haystack.match_indices(term).any(|(idx, _)| {
        haystack[..idx]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric())
    })
}

fn mentions_any(haystack: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| mentions(haystack, term))
}

fn has_first_person(query: &str) -> bool {
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .any(|word| FIRST_PERSON.contains(&word))
}

/// How strongly the query is about the user's own situation, in `[0, 1]`.
///
/// Each dictionary topic the query mentions and the profile covers adds 0.4;
/// a first-person pronoun adds 0.2. Zero without a profile.
pub fn calculate_profile_relevance(query: &str, profile: Option<&UserProfile>) -> f64 {
    let Some(profile) = profile else {
        return 0.0;
    };

    let query = query.to_lowercase();

    let topic_matches = TOPICS
        .iter()
        .filter(|topic| (topic.applies)(profile) && mentions_any(&query, topic.keywords))
        .count();

    let mut score = topic_matches as f64 * TOPIC_MATCH_WEIGHT;
    if has_first_person(&query) {
        score += PERSONAL_PRONOUN_BOOST;
    }

    score.min(1.0)
}

fn employment_label(employment: EmploymentType) -> &'static str {
    match employment {
        EmploymentType::Employed => "Employed",
        EmploymentType::SelfEmployed => "Self-employed",
        EmploymentType::Retired => "Retired",
        EmploymentType::Student => "Student",
        EmploymentType::Unemployed => "Not currently employed",
    }
}

fn marital_label(status: MaritalStatus) -> &'static str {
    match status {
        MaritalStatus::Single => "Single",
        MaritalStatus::Married => "Married",
        MaritalStatus::CommonLaw => "Common-law",
        MaritalStatus::Separated => "Separated",
        MaritalStatus::Divorced => "Divorced",
        MaritalStatus::Widowed => "Widowed",
    }
}

/// Renders the profile as bullet lines, followed by hints the model should
/// keep in mind for this kind of taxpayer.
pub fn generate_profile_context(profile: &UserProfile) -> String {
    let mut facts: Vec<String> = Vec::new();
    let mut hints: Vec<&str> = Vec::new();

    if let Some(province) = profile.province {
        facts.push(format!("Province: {} ({})", province.name(), province.code()));
        if province == Province::Quebec {
            hints.push("Files a separate Quebec provincial return (TP-1) with Revenu Québec");
        }
    }

    if let Some(employment) = profile.employment_type {
        facts.push(format!("Employment: {}", employment_label(employment)));
        match employment {
            EmploymentType::SelfEmployed => hints.push(
                "Reports business income on form T2125 and can deduct reasonable business expenses",
            ),
            EmploymentType::Retired => {
                hints.push("May benefit from pension income splitting and the pension income amount")
            }
            EmploymentType::Student => {
                hints.push("Can claim tuition from form T2202 and carry forward unused amounts")
            }
            EmploymentType::Employed | EmploymentType::Unemployed => {}
        }
    }

    if let Some(status) = profile.marital_status {
        facts.push(format!("Marital status: {}", marital_label(status)));
        if status.has_spouse() {
            hints.push("Spousal RRSP contributions and transfers of unused credits may apply");
        }
    }

    if profile.has_children {
        facts.push("Has children".to_string());
        hints.push("May qualify for the Canada Child Benefit and the childcare expense deduction");
    }
    if profile.has_rrsp {
        facts.push("Contributes to an RRSP".to_string());
    }
    if profile.has_tfsa {
        facts.push("Has a TFSA".to_string());
    }
    if profile.is_first_time_home_buyer {
        facts.push("First-time home buyer".to_string());
        hints.push("The FHSA, Home Buyers' Plan and home buyers' amount may apply");
    }
    if profile.has_rental_income {
        facts.push("Earns rental income".to_string());
        hints.push("Reports rental income and expenses on form T776");
    }
    if profile.has_investments {
        facts.push("Has non-registered investments".to_string());
        hints.push("Capital gains are reported on Schedule 3");
    }
    if profile.has_disability {
        facts.push("Has a disability".to_string());
        hints.push("May be eligible for the disability tax credit (form T2201)");
    }
    if profile.is_newcomer {
        facts.push("Newcomer to Canada".to_string());
        hints.push("Residency start date affects which income and credits apply in the first year");
    }

    let mut context = String::new();
    for fact in &facts {
        context.push_str(&format!("- {}\n", fact));
    }
    for hint in &hints {
        context.push_str(&format!("- Note: {}\n", hint));
    }
    context
}

const PROVINCIAL_TRIGGERS: &[&str] = &["provinc", "credit", "rate", "bracket"];
const BUSINESS_TRIGGERS: &[&str] = &["business", "expense", "deduct", "income", "gst", "hst", "self"];
const SPOUSE_TRIGGERS: &[&str] = &["spouse", "partner", "split", "transfer", "married", "family"];
const CHILD_TRIGGERS: &[&str] = &["child", "kid", "benefit", "family", "care", "ccb", "dependant"];

/// Appends profile terms to a retrieval query when the query touches a topic
/// where the profile changes the answer. Never shown to the user.
pub fn enrich_query_with_profile(query: &str, profile: Option<&UserProfile>) -> String {
    let Some(profile) = profile else {
        return query.to_string();
    };

    let lower = query.to_lowercase();
    let mut terms: Vec<String> = Vec::new();

    if let Some(province) = profile.province {
        if mentions_any(&lower, PROVINCIAL_TRIGGERS) {
            terms.push(format!("{} {}", province.name(), province.code()));
        }
    }
    if profile.is_self_employed() && mentions_any(&lower, BUSINESS_TRIGGERS) {
        terms.push("self-employed business".to_string());
    }
    if profile.has_spouse() && mentions_any(&lower, SPOUSE_TRIGGERS) {
        terms.push("spouse".to_string());
    }
    if profile.has_children && mentions_any(&lower, CHILD_TRIGGERS) {
        terms.push("children".to_string());
    }

    if terms.is_empty() {
        query.to_string()
    } else {
        format!("{} {}", query.trim_end(), terms.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ontario() -> UserProfile {
        UserProfile {
            province: Some(Province::Ontario),
            ..Default::default()
        }
    }

    #[test]
    fn test_relevance_without_profile_is_zero() {
        assert_eq!(calculate_profile_relevance("my RRSP room", None), 0.0);
    }

    #[test]
    fn test_relevance_topic_and_pronoun() {
        let profile = UserProfile {
            has_rrsp: true,
            ..Default::default()
        };
        let score = calculate_profile_relevance("my RRSP room", Some(&profile));
        assert!((score - 0.6).abs() < 1e-9);

        let impersonal = calculate_profile_relevance("RRSP contribution limits", Some(&profile));
        assert!((impersonal - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_relevance_ignores_uncovered_topics() {
        let profile = UserProfile::default();
        let score = calculate_profile_relevance("How does the RRSP work?", Some(&profile));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_relevance_capped() {
        let profile = UserProfile {
            has_rrsp: true,
            has_tfsa: true,
            has_children: true,
            employment_type: Some(EmploymentType::SelfEmployed),
            ..Default::default()
        };
        let score = calculate_profile_relevance(
            "Should I put my business income in my RRSP or TFSA for my kids?",
            Some(&profile),
        );
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_word_start_matching() {
        assert!(mentions("rental income", "rent"));
        assert!(!mentions("current year", "rent"));
        assert!(mentions("tax credits", "credit"));
    }

    #[test]
    fn test_enrich_province_requires_trigger() {
        let profile = ontario();
        let untouched = enrich_query_with_profile("What is my RRSP deadline?", Some(&profile));
        assert_eq!(untouched, "What is my RRSP deadline?");
        assert!(!untouched.contains("ON"));

        let enriched = enrich_query_with_profile("What credit rate applies?", Some(&profile));
        assert!(enriched.contains("ON"));
        assert!(enriched.contains("Ontario"));
    }

    #[test]
    fn test_enrich_adds_household_terms() {
        let profile = UserProfile {
            employment_type: Some(EmploymentType::SelfEmployed),
            marital_status: Some(MaritalStatus::CommonLaw),
            has_children: true,
            ..Default::default()
        };
        let enriched =
            enrich_query_with_profile("Can I deduct family expenses?", Some(&profile));
        assert!(enriched.ends_with("self-employed business spouse children"));
    }

    #[test]
    fn test_profile_context_hints() {
        let profile = UserProfile {
            employment_type: Some(EmploymentType::SelfEmployed),
            province: Some(Province::Quebec),
            ..Default::default()
        };
        let context = generate_profile_context(&profile);
        assert!(context.contains("Province: Quebec (QC)"));
        assert!(context.contains("Employment: Self-employed"));
        assert!(context.contains("T2125"));
        assert!(context.contains("TP-1"));
    }

    #[test]
    fn test_empty_profile_context() {
        assert!(generate_profile_context(&UserProfile::default()).is_empty());
    }
}
