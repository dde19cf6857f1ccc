//! `agekit` runs an age verification from the terminal.
//!
//! It mounts the embedded widget on a terminal page, prints the QR code links and every state
//! change, and exits once the holder approved, declined or let the QR code expire.

mod terminal;

use std::time::Duration;

use agekit_core::{embed, embed::EmbedParams, VerificationOptions, View};
use clap::Parser;
use eyre::{bail, eyre};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use crate::terminal::{PageEvent, TerminalPage};

#[derive(Parser)]
#[command(name = "agekit", version, about = "Runs an age verification in the terminal")]
struct Args {
    /// API key of the verification service.
    #[arg(long, env = "AGEKIT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the verification service.
    #[arg(long, env = "AGEKIT_API_BASE_URL")]
    api_base_url: Option<String>,

    /// Where to continue after an approval.
    #[arg(long)]
    success_url: Option<String>,

    /// Where to continue after a rejection.
    #[arg(long)]
    failure_url: Option<String>,

    /// Embedding URL (`...?apiKey=...&successURL=...`) filling the values not passed as flags.
    #[arg(long)]
    embed_url: Option<String>,

    /// Seconds between two status checks.
    #[arg(long, default_value_t = 10)]
    poll_interval_secs: u64,

    /// Seconds between an approval or a rejection and the redirect to its URL.
    #[arg(long, default_value_t = 10)]
    redirect_delay_secs: u64,

    /// How many times to request a new QR code after one expired.
    #[arg(long, default_value_t = 0)]
    auto_retry: u32,

    /// Print the service responses.
    #[arg(long)]
    show_logs: bool,
}

/// How the flow ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    Approved,
    Denied,
    Expired,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let params = embed_params(&args)?;
    if params.api_key.is_none() {
        bail!("an API key is required: pass --api-key, set AGEKIT_API_KEY or use an --embed-url with apiKey");
    }

    let mut options = VerificationOptions::new()
        .with_poll_interval(Duration::from_secs(args.poll_interval_secs));
    if let Some(api_base_url) = &args.api_base_url {
        options = options.with_api_base_url(api_base_url.as_str());
    }

    let redirects = Redirects {
        on_approval: params.success_url.is_some(),
        on_denial: params.failure_url.is_some(),
    };
    let (page, events) = TerminalPage::new(args.show_logs);
    let widget = embed::mount(
        params,
        page,
        options,
        Some(Duration::from_secs(args.redirect_delay_secs)),
    )?;
    tracing::info!(configured = widget.client().is_configured(), "widget mounted");

    match follow(events, args.auto_retry, redirects).await? {
        Outcome::Approved => Ok(()),
        Outcome::Denied => Err(eyre!("age verification denied")),
        Outcome::Expired => Err(eyre!("the QR code expired")),
    }
}

/// Reads the embedding URL, if any, then lets explicit flags override it.
fn embed_params(args: &Args) -> eyre::Result<EmbedParams> {
    let from_url = match &args.embed_url {
        Some(url) => EmbedParams::from_script_src(url)?,
        None => EmbedParams::default(),
    };

    Ok(EmbedParams {
        api_key: args.api_key.clone().or(from_url.api_key),
        success_url: args.success_url.clone().or(from_url.success_url),
        failure_url: args.failure_url.clone().or(from_url.failure_url),
        notification_url: from_url.notification_url,
    })
}

/// Which outcomes are followed by a navigation.
#[derive(Debug, Clone, Copy, Default)]
struct Redirects {
    on_approval: bool,
    on_denial: bool,
}

/// Prints page events until the flow ends. An expired QR code is renewed while `auto_retry`
/// allows it; an outcome with a redirect ends at the navigation.
async fn follow(
    mut events: mpsc::UnboundedReceiver<PageEvent>,
    mut auto_retry: u32,
    redirects: Redirects,
) -> eyre::Result<Outcome> {
    let mut pending = None;

    while let Some(event) = events.recv().await {
        match event {
            PageEvent::View(view) => {
                println!("{view}\n");
                let outcome = match view {
                    View::Approved => Outcome::Approved,
                    View::Denied => Outcome::Denied,
                    View::Expired { retry: Some(retry) } if auto_retry > 0 => {
                        auto_retry -= 1;
                        tracing::info!(retries_left = auto_retry, "requesting a new QR code");
                        retry.trigger();
                        continue;
                    }
                    View::Expired { .. } => Outcome::Expired,
                    View::QrCode { .. } | View::Scanning | View::Unknown(_) => continue,
                };

                let redirected = match outcome {
                    Outcome::Approved => redirects.on_approval,
                    Outcome::Denied => redirects.on_denial,
                    Outcome::Expired => false,
                };
                if !redirected {
                    return Ok(outcome);
                }
                pending = Some(outcome);
            }
            PageEvent::Log(entry) => {
                if !entry.is_empty() {
                    println!("{entry}\n");
                }
            }
            PageEvent::Navigate(url) => {
                println!("Continue at {url}");
                if let Some(outcome) = pending.take() {
                    return Ok(outcome);
                }
            }
        }
    }

    bail!("the page closed before the verification ended")
}
