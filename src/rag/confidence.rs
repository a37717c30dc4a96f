use crate::rag::profile::calculate_profile_relevance;
use crate::rag::types::{ConfidenceResult, ResponseStrategy, SearchResult, UserProfile};
use crate::schema::ConfidenceLevel;
use log::debug;

pub const STRONG_MATCH_SCORE: f64 = 0.50;
const PROFILE_BOOST_WEIGHT: f64 = 0.08;

const HIGH_TOP_SCORE: f64 = 0.58;
const HIGH_AVG_SCORE: f64 = 0.50;
const HIGH_MIN_STRONG_MATCHES: usize = 3;
const MEDIUM_TOP_SCORE: f64 = 0.50;
const MEDIUM_AVG_SCORE: f64 = 0.45;
const RESCUE_TOP_SCORE: f64 = 0.35;
const RESCUE_PROFILE_RELEVANCE: f64 = 0.4;
const EMPTY_RESULTS_PROFILE_RELEVANCE: f64 = 0.5;

/// Grades how well the retrieved passages can answer `query`.
///
/// Profile relevance nudges the scores by at most 0.08 and can rescue a
/// weak retrieval to `medium`, but never lifts it to `high` on its own.
pub fn calculate_confidence(
    results: &[SearchResult],
    query: &str,
    profile: Option<&UserProfile>,
) -> ConfidenceResult {
    let profile_relevance = calculate_profile_relevance(query, profile);

    if results.is_empty() {
        let level = if profile_relevance > EMPTY_RESULTS_PROFILE_RELEVANCE {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        };
        return ConfidenceResult {
            level,
            rag_score: 0.0,
            average_score: 0.0,
            profile_relevance,
            strong_matches: 0,
            reasoning: format!(
                "No matching documents; profile relevance {:.2}",
                profile_relevance
            ),
        };
    }

    let top_score = results.iter().map(|r| r.score).fold(f64::MIN, f64::max);
    let average_score = results.iter().map(|r| r.score).sum::<f64>() / results.len() as f64;
    let strong_matches = results
        .iter()
        .filter(|r| r.score > STRONG_MATCH_SCORE)
        .count();

    let profile_boost = profile_relevance * PROFILE_BOOST_WEIGHT;
    let boosted_top = top_score + profile_boost;
    let boosted_avg = average_score + profile_boost;

    let (level, reason) = if boosted_top > HIGH_TOP_SCORE
        && boosted_avg > HIGH_AVG_SCORE
        && strong_matches >= HIGH_MIN_STRONG_MATCHES
    {
        (ConfidenceLevel::High, "strong retrieval agreement")
    } else if boosted_top > MEDIUM_TOP_SCORE && boosted_avg > MEDIUM_AVG_SCORE {
        (ConfidenceLevel::Medium, "moderate retrieval match")
    } else if top_score > RESCUE_TOP_SCORE && profile_relevance > RESCUE_PROFILE_RELEVANCE {
        (ConfidenceLevel::Medium, "weak retrieval rescued by profile relevance")
    } else {
        (ConfidenceLevel::Low, "weak retrieval match")
    };

    let reasoning = format!(
        "{}: top {:.2}, avg {:.2}, {} strong match(es), profile relevance {:.2}",
        reason, top_score, average_score, strong_matches, profile_relevance
    );
    debug!("Confidence {}: {}", level, reasoning);

    ConfidenceResult {
        level,
        rag_score: top_score,
        average_score,
        profile_relevance,
        strong_matches,
        reasoning,
    }
}

pub fn get_response_strategy(confidence: &ConfidenceResult) -> ResponseStrategy {
    let score = confidence.rag_score;
    match confidence.level {
        ConfidenceLevel::High => ResponseStrategy {
            use_rag_context: true,
            use_general_knowledge: false,
            requires_disclaimer: false,
            personalize: true,
            recommend_professional: false,
        },
        ConfidenceLevel::Medium => ResponseStrategy {
            use_rag_context: true,
            use_general_knowledge: true,
            requires_disclaimer: score < 0.5,
            personalize: true,
            recommend_professional: score < 0.45,
        },
        ConfidenceLevel::Low => ResponseStrategy {
            use_rag_context: score >= 0.4,
            use_general_knowledge: true,
            requires_disclaimer: true,
            personalize: false,
            recommend_professional: true,
        },
    }
}

/// User-facing caveat attached to an answer of the given tier.
pub fn disclaimer_for(level: ConfidenceLevel) -> &'static str {
    match level {
        ConfidenceLevel::High => {
            "This answer is based on official CRA guidance. Confirm the details for your situation on canada.ca."
        }
        ConfidenceLevel::Medium => {
            "This answer combines CRA guidance with general tax knowledge. Verify it on canada.ca before filing."
        }
        ConfidenceLevel::Low => {
            "We could not find strong official guidance for this question. Please confirm with a tax professional or the CRA."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(scores: &[f64]) -> Vec<SearchResult> {
        scores
            .iter()
            .enumerate()
            .map(|(i, &score)| SearchResult::new(format!("doc-{}", i), "Title", "Body", score))
            .collect()
    }

    #[test]
    fn test_no_results_no_profile_is_low() {
        let confidence = calculate_confidence(&[], "anything", None);
        assert_eq!(confidence.level, ConfidenceLevel::Low);
        assert_eq!(confidence.rag_score, 0.0);
    }

    #[test]
    fn test_no_results_profile_rescue() {
        let profile = UserProfile {
            has_rrsp: true,
            ..Default::default()
        };
        let confidence = calculate_confidence(&[], "my RRSP room", Some(&profile));
        assert_eq!(confidence.level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_three_strong_matches_is_high() {
        let confidence = calculate_confidence(&results(&[0.6, 0.55, 0.52]), "RRSP deadline", None);
        assert_eq!(confidence.level, ConfidenceLevel::High);
        assert_eq!(confidence.strong_matches, 3);
        assert!((confidence.average_score - 0.5566).abs() < 1e-3);
    }

    #[test]
    fn test_two_strong_matches_is_medium() {
        let confidence = calculate_confidence(&results(&[0.65, 0.6]), "RRSP deadline", None);
        assert_eq!(confidence.level, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_profile_boost_crosses_high_threshold() {
        // top 0.57 alone misses 0.58; a 0.6 relevance adds 0.048
        let profile = UserProfile {
            has_rrsp: true,
            ..Default::default()
        };
        let hits = results(&[0.57, 0.53, 0.51]);
        assert_eq!(
            calculate_confidence(&hits, "RRSP rules", None).level,
            ConfidenceLevel::Medium
        );
        assert_eq!(
            calculate_confidence(&hits, "my RRSP rules", Some(&profile)).level,
            ConfidenceLevel::High
        );
    }

    #[test]
    fn test_weak_retrieval_rescued_by_profile() {
        let profile = UserProfile {
            has_rrsp: true,
            ..Default::default()
        };
        let hits = results(&[0.4, 0.2]);
        assert_eq!(
            calculate_confidence(&hits, "my RRSP", None).level,
            ConfidenceLevel::Low
        );
        assert_eq!(
            calculate_confidence(&hits, "my RRSP", Some(&profile)).level,
            ConfidenceLevel::Medium
        );
    }

    #[test]
    fn test_strategy_table() {
        let mut confidence = calculate_confidence(&results(&[0.6, 0.55, 0.52]), "q", None);
        let high = get_response_strategy(&confidence);
        assert!(high.use_rag_context && high.personalize);
        assert!(!high.requires_disclaimer && !high.recommend_professional && !high.use_general_knowledge);

        confidence.level = ConfidenceLevel::Medium;
        confidence.rag_score = 0.52;
        let strong_medium = get_response_strategy(&confidence);
        assert!(!strong_medium.requires_disclaimer);
        assert!(!strong_medium.recommend_professional);

        confidence.rag_score = 0.47;
        let mid_medium = get_response_strategy(&confidence);
        assert!(mid_medium.requires_disclaimer);
        assert!(!mid_medium.recommend_professional);

        confidence.rag_score = 0.40;
        assert!(get_response_strategy(&confidence).recommend_professional);

        confidence.level = ConfidenceLevel::Low;
        confidence.rag_score = 0.39;
        let low = get_response_strategy(&confidence);
        assert!(!low.use_rag_context && !low.personalize);
        assert!(low.requires_disclaimer && low.recommend_professional);

        confidence.rag_score = 0.4;
        assert!(get_response_strategy(&confidence).use_rag_context);
    }
}
