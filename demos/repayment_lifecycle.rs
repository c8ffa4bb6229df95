/// repayment lifecycle - disbursement to early payoff with controlled time
use chrono::{Duration, TimeZone, Utc};
use repayment_ledger::{
    init_tracing, Actor, Decimal, Disbursement, DisbursementStatus, EventStore,
    InMemoryLoanDirectory, InMemoryScheduleRepository, LedgerConfig, LoanApplication, Money,
    SafeTimeProvider, ScheduleLedger, ScheduleView, TimeSource, Uuid,
};
use std::sync::Arc;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("repayment_ledger=info");
    println!("=== repayment lifecycle ===\n");

    let time = Arc::new(SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
    )));
    let controller = time.test_control().unwrap();

    // loan and disbursement as the origination side would record them
    let directory = Arc::new(InMemoryLoanDirectory::new());
    let loan_id = Uuid::new_v4();
    let disbursement_id = Uuid::new_v4();
    directory
        .insert_loan(LoanApplication {
            id: loan_id,
            principal_amount: Money::from_major(120_000),
            interest_rate_percent: Decimal::from(12),
            term_months: 12,
        })
        .await;
    directory
        .insert_disbursement(Disbursement {
            id: disbursement_id,
            loan_application_id: loan_id,
            amount: Money::from_major(120_000),
            disbursed_at: time.now(),
            status: DisbursementStatus::Completed,
        })
        .await;

    let events = Arc::new(EventStore::new());
    let ledger = ScheduleLedger::builder()
        .repository(Arc::new(InMemoryScheduleRepository::new()))
        .directory(directory)
        .events(events.clone())
        .set_time(time.clone())
        .config(LedgerConfig::default())
        .build()?;

    let schedule = ledger
        .generate_from_disbursement(disbursement_id, Actor::System)
        .await?;
    println!("schedule {} created", schedule.id);
    for installment in &schedule.installments {
        println!(
            "  #{:>2} due {}  principal {:>10}  interest {:>8}  total {:>10}",
            installment.installment_number,
            installment.due_date.format("%Y-%m-%d"),
            installment.principal_amount,
            installment.interest_amount,
            installment.total_amount,
        );
    }
    println!("total repayable: {}", schedule.summary.total_amount);

    // first two installments on time
    let payment = schedule.installments[0].total_amount;
    for month in 1..=2 {
        controller.advance(Duration::days(30));
        let updated = ledger
            .record_payment(schedule.id, payment, &format!("pmt-{:03}", month), Actor::System)
            .await?;
        println!(
            "\n{}: paid {}, outstanding {}",
            time.now().format("%Y-%m-%d"),
            payment,
            updated.summary.outstanding_amount
        );
    }

    // miss a payment
    controller.advance(Duration::days(45));
    let current = ledger.get_schedule(schedule.id).await?;
    println!(
        "\n{}: {} installment(s) overdue",
        time.now().format("%Y-%m-%d"),
        current.summary.overdue_installments
    );

    // pay everything off
    let quote = ledger.payoff_quote(schedule.id).await?;
    println!(
        "payoff quote: balance {} + penalty {} = {}",
        quote.outstanding_amount, quote.penalty_amount, quote.total_required
    );
    let closed = ledger
        .process_early_repayment(schedule.id, quote.total_required, Actor::System)
        .await?;

    println!("\nfinal state:");
    println!("{}", ScheduleView::from_schedule(&closed, time.now()).to_json_pretty()?);

    println!("\nevents:");
    for event_type in events.event_types() {
        println!("  {}", event_type);
    }

    Ok(())
}
