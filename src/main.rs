use clap::{Parser, Subcommand};
use lodgepay::application::coordinator::{
    CoordinatorConfig, ReconciliationCoordinator, RetryPolicy, VerificationOutcome,
};
use lodgepay::application::state_machine::PaymentStateMachine;
use lodgepay::domain::booking::{self, Booking};
use lodgepay::domain::listing::Listing;
use lodgepay::domain::payment::{Amount, PaymentReference};
use lodgepay::domain::ports::{BookingStore, CustomerInfo, PaymentGateway};
use lodgepay::infrastructure::http_gateway::{GatewayConfig, HttpGateway};
use lodgepay::infrastructure::in_memory::{InMemoryBookingStore, InMemoryPaymentStore};
use lodgepay::infrastructure::notify::LogNotifier;
use lodgepay::infrastructure::simulated::SimulatedGateway;
use miette::{IntoDiagnostic, Result};
use rust_decimal_macros::dec;
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the gateway for the current status of a payment reference
    Verify {
        /// Payment reference (tx_ref) to look up
        reference: Uuid,

        /// Gateway API base URL
        #[arg(long)]
        gateway_url: String,

        /// Gateway secret key
        #[arg(long)]
        secret_key: String,
    },

    /// Run the booking-payment flow end to end against the simulated gateway
    Smoke,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lodgepay=info")),
        )
        .init();

    match Cli::parse().command {
        Command::Verify {
            reference,
            gateway_url,
            secret_key,
        } => verify(reference.into(), gateway_url, secret_key).await,
        Command::Smoke => smoke().await,
    }
}

async fn verify(
    reference: PaymentReference,
    gateway_url: String,
    secret_key: String,
) -> Result<()> {
    let gateway = HttpGateway::new(GatewayConfig::new(gateway_url, secret_key));
    let status = gateway.verify(&reference).await.into_diagnostic()?;

    println!("reference: {reference}");
    println!("status:    {}", status.kind.as_str());
    if let Some(tx) = &status.transaction_id {
        println!("gateway tx: {tx}");
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&status.raw).into_diagnostic()?
    );
    Ok(())
}

async fn smoke() -> Result<()> {
    let bookings = InMemoryBookingStore::new();
    let payments = InMemoryPaymentStore::new();

    let listing = Listing::new(Uuid::new_v4(), 4);
    let guest = Uuid::new_v4();
    let check_in = chrono::Utc::now().date_naive() + chrono::Duration::days(7);
    let check_out = check_in + chrono::Duration::days(3);
    let booking = Booking::new(
        listing.id,
        guest,
        check_in,
        check_out,
        2,
        Amount::new(dec!(3000.00)).into_diagnostic()?,
    );
    booking::validate(&booking, &listing).into_diagnostic()?;
    bookings.insert(booking.clone()).await.into_diagnostic()?;

    let machine = PaymentStateMachine::new(
        Box::new(bookings.clone()),
        Box::new(payments.clone()),
        Box::new(LogNotifier::new()),
    );
    // the simulated gateway answers "pending" once, then "success"
    let coordinator = ReconciliationCoordinator::new(
        machine,
        Box::new(SimulatedGateway::new(2)),
        CoordinatorConfig::default(),
    );

    let customer = CustomerInfo {
        email: "guest@example.com".to_owned(),
        first_name: "Smoke".to_owned(),
        last_name: "Guest".to_owned(),
        phone: None,
    };
    let checkout = coordinator
        .request_initiate(booking.id, &customer, "http://localhost/payment/success")
        .await
        .into_diagnostic()?;
    println!(
        "checkout issued: {} ({} {})",
        checkout.checkout_handle, checkout.amount, checkout.currency
    );

    let policy = RetryPolicy {
        max_attempts: 5,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(100),
    };
    let outcome = coordinator
        .verify_until_settled(&checkout.reference, &policy)
        .await
        .into_diagnostic()?;

    match outcome {
        VerificationOutcome::Completed | VerificationOutcome::AlreadyCompleted => {
            let booking = bookings
                .get(booking.id)
                .await
                .into_diagnostic()?
                .ok_or_else(|| miette::miette!("booking disappeared from the store"))?;
            println!("payment completed; booking {} is {}", booking.id, booking.status);
        }
        other => println!("payment did not settle: {other:?}"),
    }
    Ok(())
}
