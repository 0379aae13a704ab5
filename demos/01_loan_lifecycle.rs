/// loan lifecycle - fines, reversal, settlement, renewal and commissions
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use loan_lifecycle_rs::{
    AmortizationMethod, CommissionRates, EngineConfig, EntryCategory, Event, LoanBook, LoanRequest,
    Money, PaymentRequest, Periodicity, Rate, SafeTimeProvider, TimeSource,
};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    println!("=== loan lifecycle ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let mut book = LoanBook::new(EngineConfig::default())?;
    let manager = book.register_creditor("capital manager", &time)?;
    book = LoanBook::from_state(
        book.state().clone(),
        EngineConfig::default().with_manager_account(manager.id),
    )?;

    let weekly = book.register_periodicity(Periodicity::weekly())?;
    let creditor = book.register_creditor("investor a", &time)?;
    let broker = book.register_creditor("broker account", &time)?;
    let route = book.register_route("street broker", Some(broker.id))?;
    book.post_entry(creditor.id, EntryCategory::Deposit, Money::from_major(2_000), "funding", &time)?;

    let request = LoanRequest::new(
        "customer-002",
        weekly,
        Money::from_major(1_000),
        AmortizationMethod::SimpleInterest,
        Rate::from_percentage(5),
        4,
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 3, 8).unwrap(),
    )
    .with_creditor(creditor.id)
    .with_route(route.id)
    .with_commission(CommissionRates::new(Some(dec!(1)), Some(dec!(2))))
    .posting_commissions();

    let loan = book.create_loan(request, &time)?;
    println!("loan {} total {} in installments of {}", loan.id, loan.total_amount, loan.installment_value);

    // two weeks later the first installment is late
    controller.advance(Duration::days(14));
    for overdue in book.overdue_installments(&time) {
        println!("installment {} overdue by {} days", overdue.number, overdue.days_overdue(time.now().date_naive()));
    }
    let first = book.installments_of(loan.id)?[0].id;
    let suggestion = book.suggest_fine(first, &time)?;
    book.apply_fine(first, suggestion.fine_amount, "late fee and interest", &time)?;

    let paid = book.pay_installment(
        PaymentRequest::new(first, loan.installment_value, time.now().date_naive())
            .with_fine(suggestion.fine_amount),
    )?;
    println!("paid installment {} with fine {}", paid.number, paid.fine_amount);

    // payment bounced
    let reversed = book.reverse_payment(first, &time)?;
    println!("reversed, fine kept at {}", reversed.fine_amount);

    // borrower pays everything at once
    let settlement = book.settle_all(loan.id, &time)?;
    println!("loan status: {:?}", settlement.loan.status);
    book.record_loan_return(loan.id, settlement.loan.total_amount, "settlement received", &time)?;

    for party in [&creditor, &broker, &manager] {
        println!("{:<16} balance {}", party.name, book.creditor_balance(party.id)?);
    }

    let renewal = settlement.renewal.into_request(
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 4, 8).unwrap(),
    );
    let renewed = book.create_loan(renewal, &time)?;
    println!("\nrenewed as loan {}", renewed.id);

    let events = book.take_events();
    let settled = events.iter().filter(|e| matches!(e, Event::LoanSettled { .. })).count();
    println!("{} events recorded, {} settlement", events.len(), settled);

    Ok(())
}
