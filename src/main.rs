//! Volley CLI - bulk JSON submitter.
//!
//! Run `volley --help` for usage information.

use anyhow::Result;
use clap::CommandFactory;
use clap::error::ErrorKind;
use console::style;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{Level, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use volley::{Args, CredentialSource, MAX_IN_FLIGHT, Processor, Reporter, RunConfig};

/// Exit code for missing or invalid arguments.
const USAGE_ERROR: i32 = 1;

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse_args() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(USAGE_ERROR);
        }
    };

    setup_logging(&args);

    let config = match RunConfig::from_args(&args) {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("{} {}", style("Error:").red().bold(), e);
            eprintln!("\n{}", Args::command().render_usage());
            std::process::exit(USAGE_ERROR);
        }
    };

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let processor = Processor::new(config)?.with_cancellation(cancel);

    // Dry run mode
    if args.dry_run {
        println!("\n{}", style("DRY RUN MODE").yellow().bold());
        print_config_summary(processor.config());
        match processor.scan().await {
            Ok(scan) => scan.print_summary(),
            Err(e) => report_fatal(&e),
        }
        return Ok(());
    }

    if args.verbose && !args.json_logs {
        print_config_summary(processor.config());
    }

    let reporter = Reporter::new(!args.no_progress && !args.json_logs);

    // Failures before dispatch are reported but do not change the exit code.
    match processor.process(reporter).await {
        Ok(result) if args.json_logs => {
            println!("{}", serde_json::to_string(&result)?);
        }
        Ok(result) => result.print_summary(),
        Err(e) => report_fatal(&e),
    }

    Ok(())
}

fn setup_logging(args: &Args) {
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("volley={level}")));

    if args.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .init();
    }
}

fn report_fatal(e: &volley::VolleyError) {
    error!(error = %e, "Run aborted before dispatch");
    eprintln!("{} {}", style("Error:").red().bold(), e);
}

async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C signal"),
        () = terminate => info!("Received SIGTERM signal"),
    }

    warn!("Stopping: no new requests will be sent, in-flight requests are abandoned");
    cancel.cancel();
}

fn print_config_summary(config: &RunConfig) {
    println!("{}", style("Configuration:").bold());
    println!("  Target:      {}", config.target);
    println!("  Input:       {}", config.input.display());
    match &config.credentials {
        CredentialSource::Login { email, .. } => {
            println!("  Login:       {} as {}", config.target.login_url(), email);
        }
        CredentialSource::TokenFile { path } => {
            println!("  Token file:  {}", path.display());
        }
    }
    println!("  In flight:   {MAX_IN_FLIGHT}");
    match config.request.timeout {
        Some(timeout) => println!("  Timeout:     {timeout:?}"),
        None => println!("  Timeout:     client default"),
    }
    match config.request.rate_limit {
        Some(rate) => println!("  Rate Limit:  {rate} req/sec"),
        None => println!("  Rate Limit:  unlimited"),
    }
    println!();
}
