use tax_time_machine::rules::lines;
use tax_time_machine::*;

fn main() -> Result<()> {
    let input = TimeMachineInput::new([2021, 2022, 2023])
        .with_profile(
            2023,
            TaxpayerYearProfile {
                worked_from_home: Some(true),
                work_from_home_days: Some(160),
                made_donations: Some(true),
                donation_amount: Some(900.0),
                paid_childcare: Some(true),
                childcare_expenses: Some(7_200.0),
                number_of_children: Some(1),
                net_income: Some(82_000.0),
                province: Some(Province::Ontario),
                ..Default::default()
            },
        )
        .with_profile(
            2022,
            TaxpayerYearProfile {
                had_medical_expenses: Some(true),
                medical_expenses: Some(4_300.0),
                moved_for_work: Some(true),
                moving_distance_km: Some(210.0),
                moving_expenses: Some(5_800.0),
                net_income: Some(76_000.0),
                province: Some(Province::Ontario),
                ..Default::default()
            },
        )
        .with_noa(
            2022,
            NoaData {
                rrsp_deduction_limit: Some(24_500.0),
                net_income: Some(76_000.0),
                ..Default::default()
            }
            .with_line(lines::RRSP_DEDUCTION, 3_000.0),
        )
        .with_profile(
            2021,
            TaxpayerYearProfile {
                paid_student_loan_interest: Some(true),
                student_loan_interest: Some(540.0),
                is_caregiver: Some(true),
                province: Some(Province::Ontario),
                ..Default::default()
            },
        );

    println!("🕰️  Scanning {} prior tax years...\n", input.years.len());

    let analysis = TimeMachineAnalyzer::default().analyze(&input)?;

    for year in &analysis.year_breakdown {
        println!(
            "📅 {}: {} finding(s), ${:.0} - ${:.0}{}",
            year.tax_year,
            year.findings_count,
            year.recovery_min,
            year.recovery_max,
            if year.has_noa { " (NOA on file)" } else { "" }
        );

        for finding in analysis.findings_for_year(year.tax_year) {
            println!(
                "   • [{:?}] {} (${:.0} - ${:.0}, {} confidence)",
                finding.priority,
                finding.title,
                finding.potential_recovery_min,
                finding.potential_recovery_max,
                finding.confidence
            );
            println!("     {}", finding.evidence.calculation);
        }
    }

    println!(
        "\n💰 Total potential recovery: ${:.0} - ${:.0} across {} finding(s)",
        analysis.total_recovery_min, analysis.total_recovery_max, analysis.total_findings
    );

    let records = analysis.to_records("demo-user")?;
    println!("\n📦 First stored record:");
    if let Some(record) = records.first() {
        println!("{}", serde_json::to_string_pretty(record)?);
    }

    Ok(())
}
