use dotenv::dotenv;
use std::error::Error;
use std::io::{self, Write};
use tax_time_machine::llm::{AnswerRequest, ChatMessage, OpenRouterClient, TaxAssistant};
use tax_time_machine::*;

/// A handful of canned passages standing in for the vector search.
fn search(query: &str) -> Vec<SearchResult> {
    let passages = [
        (
            "rrsp-deadline",
            "RRSP contribution deadline",
            "Contributions made in the first 60 days of the year can be deducted on the previous year's return.",
            "https://www.canada.ca/en/revenue-agency/services/tax/individuals/topics/rrsps-related-plans.html",
            &["rrsp", "deadline", "contribution"][..],
        ),
        (
            "home-office",
            "Work-space-in-the-home expenses",
            "Employees who worked from home may claim eligible home office expenses using Form T777S.",
            "https://www.canada.ca/en/revenue-agency/services/tax/individuals/topics/about-your-tax-return/tax-return/completing-a-tax-return/deductions-credits-expenses/line-22900-other-employment-expenses/work-space-home-expenses.html",
            &["home", "office", "remote", "t777s"][..],
        ),
        (
            "ccb",
            "Canada child benefit",
            "The CCB is a tax-free monthly payment to eligible families to help with the cost of raising children under 18.",
            "https://www.canada.ca/en/revenue-agency/services/child-family-benefits/canada-child-benefit-overview.html",
            &["child", "ccb", "benefit", "kids"][..],
        ),
    ];

    let query = query.to_lowercase();
    passages
        .iter()
        .filter_map(|(id, title, content, url, keywords)| {
            let hits = keywords.iter().filter(|k| query.contains(*k)).count();
            (hits > 0).then(|| {
                let score = (0.40 + 0.12 * hits as f64).min(0.75);
                SearchResult::new(*id, *title, *content, score).with_url(*url)
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn Error>> {
    dotenv().ok();

    let config = LlmConfig::from_env()?;
    println!("💬 Starting tax chat with {}...\n", config.model);

    let assistant = TaxAssistant::new(OpenRouterClient::new(config)?);
    let profile = UserProfile {
        employment_type: Some(EmploymentType::Employed),
        marital_status: Some(MaritalStatus::Married),
        province: Some(Province::Ontario),
        has_children: true,
        has_rrsp: true,
        ..Default::default()
    };
    let mut history: Vec<ChatMessage> = Vec::new();

    println!("🤖 Ask a Canadian tax question (type 'quit' to exit).");
    println!("------------------------------------------------------------------");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let query = input.trim();

        if query.eq_ignore_ascii_case("quit") || query.eq_ignore_ascii_case("exit") {
            break;
        }
        if query.is_empty() {
            continue;
        }

        let search_query = enrich_query_with_profile(query, Some(&profile));
        let request = AnswerRequest {
            query: query.to_string(),
            results: search(&search_query),
            profile: Some(profile.clone()),
            history: history.clone(),
        };

        let mut events = assistant.generate_stream(request);
        let mut answer = String::new();

        while let Some(event) = events.recv().await {
            match event {
                StreamEvent::Status { message, .. } => println!("\n🔎 {}", message),
                StreamEvent::Citations { citations } => {
                    for citation in &citations {
                        println!("   📄 {}", citation.title);
                    }
                    println!();
                }
                StreamEvent::Chunk { content } => {
                    print!("{}", content);
                    io::stdout().flush()?;
                    answer.push_str(&content);
                }
                StreamEvent::Metadata {
                    confidence,
                    disclaimer,
                    usage,
                } => {
                    println!("\n\n⚖️  {} confidence: {}", confidence, disclaimer);
                    println!(
                        "   {} tokens, ~${:.5}",
                        usage.total_tokens(),
                        usage.cost_usd
                    );
                }
                StreamEvent::Done => {
                    println!("------------------------------------------------------------------");
                }
            }
        }

        history.push(ChatMessage::user(query));
        history.push(ChatMessage::assistant(answer));
    }

    Ok(())
}
