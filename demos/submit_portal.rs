//! # Portal Submission
//!
//! Submits a solver input file to a real OnScale portal using a stored profile.
//!
//! ## Requirements
//!
//! A profile in `~/.onscale/config` (see the `profiles` example), or set:
//! - `ONSCALE_DEFAULT_PROFILE`: the alias of the profile to use.
//!
//! Optional:
//! - `ONSCALE_PORTAL`: `test`, `dev` or `prod`.
//! - `ONSCALE_MAX_SPEND`: the most core hours the job may cost (default 5).
//!
//! ## Usage
//!
//! ```sh
//! cargo run --example submit_portal --features "sdk client" -- model.flxinp part.step
//! ```

use onscale::prelude::*;
use std::env;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut args = env::args().skip(1);
    let input = args
        .next()
        .ok_or_else(|| anyhow::anyhow!("usage: submit_portal <input file> [aux files...]"))?;
    let aux: Vec<String> = args.collect();

    let portal = env::var("ONSCALE_PORTAL")
        .ok()
        .map(|p| p.parse::<PortalTarget>())
        .transpose()?;
    let max_spend = env::var("ONSCALE_MAX_SPEND")
        .ok()
        .map(|s| s.parse::<f64>())
        .transpose()?
        .unwrap_or(5.0);

    let session = onscale::connect(portal, None).await?;
    println!(
        "Account {} ({:.1} core hours left)",
        session.current_account().account_name,
        session.account_balance().await?.core_hours_available
    );

    let payload = PayloadBuilder::from_input_file(&input).with_files(aux);
    let mut job = session
        .submit(payload, SubmitOptions::default().with_max_spend(max_spend))
        .await?;
    println!("Submitted {} as {:?}", job.id(), job.name());

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    match job.wait_for_terminal(&PollPolicy::default(), &cancel).await {
        Ok(status) => println!("Job ended: {status}"),
        Err(OnscaleError::Cancelled) => {
            println!("Stopping {}", job.id());
            job.stop().await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let report = job
        .download_results(format!("results/{}", job.id()), &ResultFilter::All)
        .await?;
    println!(
        "{} files downloaded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    Ok(())
}
