/// quick start - simulate and originate a loan, then pay the first installment
use chrono::{NaiveDate, TimeZone, Utc};
use loan_lifecycle_rs::{
    AmortizationMethod, EngineConfig, EntryCategory, LoanBook, LoanRequest, Money, PaymentRequest,
    Periodicity, Rate, SafeTimeProvider, TimeSource,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 5, 9, 0, 0).unwrap()
    ));
    let mut book = LoanBook::new(EngineConfig::default())?;

    // fund a creditor and register a monthly schedule
    let monthly = book.register_periodicity(Periodicity::monthly())?;
    let creditor = book.register_creditor("house capital", &time)?;
    book.post_entry(creditor.id, EntryCategory::Deposit, Money::from_major(5_000), "funding", &time)?;

    // $1,200 at 2% a month over 12 installments
    let request = LoanRequest::new(
        "customer-001",
        monthly,
        Money::from_major(1_200),
        AmortizationMethod::Price,
        Rate::from_percentage(2),
        12,
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 5).unwrap(),
    )
    .with_creditor(creditor.id);

    let simulation = book.simulate(&request)?;
    println!(
        "installment {} | total {} | interest {} | effective {}%",
        simulation.reference_installment_value(),
        simulation.total_amount,
        simulation.total_interest,
        simulation.effective_rate
    );

    let loan = book.create_loan(request, &time)?;
    let first = book.installments_of(loan.id)?[0].id;
    book.pay_installment(PaymentRequest::new(first, loan.installment_value, NaiveDate::from_ymd_opt(2024, 2, 5).unwrap()))?;

    println!("creditor balance: {}", book.creditor_balance(creditor.id)?);
    println!("{}", book.loan_view(loan.id, &time)?.to_json_pretty()?);

    Ok(())
}
