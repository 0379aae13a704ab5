/// periodicity - due dates produced by different repetition rules
use chrono::NaiveDate;
use loan_lifecycle_rs::{generate_due_dates, AmortizationCalculator, AmortizationMethod, Money, Periodicity, Rate};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();

    let rules = vec![
        Periodicity::daily(),
        Periodicity::business_days(),
        Periodicity::weekly().with_weekdays(vec![1, 4]).named("mondays and thursdays"),
        Periodicity::biweekly(),
        Periodicity::monthly(),
        Periodicity::monthly().with_month_days(vec![10, 25]).named("10th and 25th"),
        Periodicity::yearly(),
    ];

    for rule in &rules {
        let dates = generate_due_dates(rule, start, 6)?;
        let listed: Vec<String> = dates.iter().map(|d| d.format("%a %Y-%m-%d").to_string()).collect();
        println!("{:<22} {}", rule.name, listed.join(", "));
    }

    // a rule that can never fire fails instead of looping
    let impossible = Periodicity::yearly().with_month_days(vec![20]);
    match generate_due_dates(&impossible, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap(), 3) {
        Ok(dates) => println!("unexpected dates: {:?}", dates),
        Err(err) => println!("\nrejected: {}", err),
    }

    println!("\n{:<28} {:>10} {:>10} {:>10}", "method", "first", "last", "interest");
    for method in AmortizationMethod::ALL {
        let simulation = AmortizationCalculator::new(method).simulate_with_periodicity(
            Money::from_major(1_200),
            Rate::from_percentage(2),
            12,
            &Periodicity::monthly(),
            start,
        )?;
        let first = simulation.installments.first().map(|i| i.total).unwrap_or_default();
        let last = simulation.installments.last().map(|i| i.total).unwrap_or_default();
        println!(
            "{:<28} {:>10} {:>10} {:>10}",
            format!("{:?}", method),
            first,
            last,
            simulation.total_interest
        );
    }

    Ok(())
}
