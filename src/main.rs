//! # Email Prober CLI
//!
//! Command-line interface for the `email_prober_core` library. Verifies single
//! addresses, finds addresses for a person, or runs a bulk job over a JSON
//! file of rows and writes the filtered results.

use email_prober_core::{
    check_smtp_connectivity, initialize_sleuth, ConfigBuilder, EmailSleuth, InputRow, JobKind,
    JobStatus, PersonQuery, ResultFilter,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Verifies email deliverability and discovers likely addresses.",
    long_about = "Email Prober checks addresses with policy rules, MX lookups and SMTP RCPT probes, and finds addresses for people from common patterns and a web search fallback."
)]
struct AppArgs {
    #[command(subcommand)]
    command: Command,

    /// Path to a configuration file (TOML format). CLI args override file settings.
    #[arg(long, global = true, env = "EMAIL_PROBER_CONFIG")]
    config_file: Option<String>,

    /// Sender email address used in MAIL FROM.
    #[arg(long, global = true, env = "EMAIL_PROBER_SMTP_SENDER")]
    smtp_sender: Option<String>,

    /// SMTP connection timeout in seconds.
    #[arg(long, global = true, env = "EMAIL_PROBER_SMTP_TIMEOUT")]
    smtp_timeout: Option<u64>,

    /// HTTP request timeout in seconds.
    #[arg(long, global = true, env = "EMAIL_PROBER_REQUEST_TIMEOUT")]
    request_timeout: Option<u64>,

    /// DNS resolution timeout in seconds.
    #[arg(long, global = true, env = "EMAIL_PROBER_DNS_TIMEOUT")]
    dns_timeout: Option<u64>,

    /// Comma-separated list of DNS servers to use for lookups.
    #[arg(long, global = true, value_delimiter = ',', env = "EMAIL_PROBER_DNS_SERVERS")]
    dns_servers: Option<Vec<String>>,

    /// Check outbound port 25 connectivity before doing any work.
    #[arg(long, global = true, default_value = "false")]
    check_smtp: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a single address.
    Verify {
        #[arg(long)]
        email: String,
        /// Proxy URL (accepted, not used for SMTP).
        #[arg(long)]
        proxy: Option<String>,
    },
    /// Find an address for one person.
    Find {
        #[arg(long)]
        firstname: String,
        #[arg(long)]
        lastname: String,
        #[arg(long)]
        domain: String,
        /// Proxy URL for the web search fallback.
        #[arg(long)]
        proxy: Option<String>,
    },
    /// Run a bulk job over a JSON array of row objects.
    Bulk {
        /// `verify` or `find`.
        #[arg(long)]
        kind: JobKind,
        /// Input JSON file: an array of string-to-string objects.
        #[arg(short, long)]
        input: String,
        /// Output JSON file; results go to stdout when omitted.
        #[arg(short, long)]
        output: Option<String>,
        /// all, valid, risky, invalid, found or not_found.
        #[arg(long, default_value = "all")]
        filter: ResultFilter,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Setting up tracing subscriber failed")?;

    tracing::info!(
        "Email Prober CLI v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let args = AppArgs::parse();
    tracing::debug!("Parsed CLI arguments: {:?}", args);

    let mut config_builder = ConfigBuilder::new();
    if let Some(ref path) = args.config_file {
        config_builder = config_builder.config_file(path);
    }
    if let Some(ref s) = args.smtp_sender {
        config_builder = config_builder.smtp_sender_email(s);
    }
    if let Some(t) = args.smtp_timeout {
        config_builder = config_builder.smtp_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.request_timeout {
        config_builder = config_builder.request_timeout(Duration::from_secs(t));
    }
    if let Some(t) = args.dns_timeout {
        config_builder = config_builder.dns_timeout(Duration::from_secs(t));
    }
    if let Some(ref servers) = args.dns_servers {
        if !servers.is_empty() {
            config_builder = config_builder.dns_servers(servers.clone());
        }
    }

    let config = match config_builder.build() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Err(anyhow::anyhow!("Failed to build configuration: {}", e));
        }
    };
    tracing::debug!("Effective configuration loaded: {:?}", config);

    if args.check_smtp {
        if let Err(e) = check_smtp_connectivity(&config).await {
            tracing::error!("SMTP connectivity check failed: {}", e);
            tracing::warn!("Outbound port {} appears blocked; SMTP probes will report timeouts.", config.smtp_port);
        }
    }

    let sleuth = initialize_sleuth(&config)
        .await
        .context("Failed to initialize the email prober")?;

    match args.command {
        Command::Verify { email, proxy } => {
            let outcome = sleuth.verify_email(&email, proxy.as_deref()).await;
            let record = serde_json::json!({
                "email": email,
                "status": outcome.status,
                "reason": outcome.reason,
            });
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Find {
            firstname,
            lastname,
            domain,
            proxy,
        } => {
            let query = PersonQuery::new(firstname, lastname, domain);
            let outcome = sleuth.find_email(&query, proxy.as_deref()).await;
            let record = serde_json::json!({
                "firstname": query.firstname,
                "lastname": query.lastname,
                "domain": query.domain,
                "found_email": outcome.found_email,
                "reason": outcome.reason,
            });
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Bulk {
            kind,
            input,
            output,
            filter,
        } => run_bulk(&sleuth, kind, &input, output.as_deref(), filter).await?,
    }

    Ok(())
}

async fn run_bulk(
    sleuth: &EmailSleuth,
    kind: JobKind,
    input: &str,
    output: Option<&str>,
    filter: ResultFilter,
) -> Result<()> {
    let start_time = Instant::now();
    let file = File::open(input).with_context(|| format!("Failed to open input file '{}'", input))?;
    let rows: Vec<InputRow> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse rows from '{}'", input))?;

    let source_filename = Path::new(input)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());
    let receipt = sleuth.jobs().submit(kind, rows, source_filename)?;
    tracing::info!("Submitted {} job {} ({} rows)", kind, receipt.job_id, receipt.total_rows);

    let progress_bar = ProgressBar::new(receipt.total_rows as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=> "),
    );

    let final_progress = loop {
        let progress = sleuth.jobs().progress(&receipt.job_id)?;
        progress_bar.set_position(progress.current_row as u64);
        progress_bar.set_message(progress.log.clone());
        if progress.status.is_terminal() {
            break progress;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };
    progress_bar.finish_with_message(final_progress.log.clone());

    if final_progress.status == JobStatus::Error {
        anyhow::bail!("Job {} failed: {}", receipt.job_id, final_progress.log);
    }

    let results = sleuth.jobs().results(&receipt.job_id, filter)?;
    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file '{}'", path))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &results)?;
            writer.flush()?;
            tracing::info!("Wrote {} row(s) to {}", results.len(), path);
        }
        None => println!("{}", serde_json::to_string_pretty(&results)?),
    }

    tracing::info!("Bulk job finished in {:.2?}", start_time.elapsed());
    Ok(())
}
