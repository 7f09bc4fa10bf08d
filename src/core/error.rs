//! Defines the custom error types for the email-prober application.

use std::io;
use thiserror::Error;
use url::ParseError as UrlParseError;

/// The primary error type for verification, discovery and job handling.
#[derive(Error, Debug)]
pub enum AppError {
    /// Error occurring during configuration loading or validation.
    #[error("Configuration Error: {0}")]
    Config(String),

    /// Error initializing necessary components (e.g., clients, resolvers).
    #[error("Initialization Error: {0}")]
    Initialization(String),

    /// Error related to file input/output operations.
    #[error("IO Error: {0}")]
    Io(#[from] io::Error),

    /// Error during JSON serialization or deserialization.
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error parsing a URL.
    #[error("URL Parsing Error: {0}")]
    UrlParse(#[from] UrlParseError),

    /// Error making HTTP requests via reqwest.
    #[error("HTTP Request Error: {0}")]
    Request(#[from] reqwest::Error),

    /// Error during DNS resolution.
    #[error("DNS Resolution Error: {0}")]
    Dns(#[from] trust_dns_resolver::error::ResolveError),

    /// Specific DNS error indicating the domain does not exist.
    #[error("Domain Not Found (NXDOMAIN): {0}")]
    NxDomain(String),

    /// Specific DNS error indicating no MX records were found.
    #[error("No MX Records Found: {0}")]
    NoDnsRecords(String),

    /// DNS operation timed out.
    #[error("DNS Timeout for domain: {0}")]
    DnsTimeout(String),

    /// Error during SMTP communication setup or command execution.
    #[error("SMTP Error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    /// Connectivity preflight found the SMTP port unusable.
    #[error("SMTP Inconclusive: {0}")]
    SmtpInconclusive(String),

    /// Error related to concurrency or task execution.
    #[error("Task Execution Error: {0}")]
    Task(String),

    /// An underlying error that doesn't fit other categories, using anyhow.
    #[error("Generic Error: {0}")]
    Generic(#[from] anyhow::Error),

    /// A bulk submission carried more rows than allowed.
    #[error("Too many rows: {count} submitted, maximum {max} allowed")]
    TooManyRows { count: usize, max: usize },

    /// A bulk submission lacked one or more required columns.
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A bulk submission carried no rows at all.
    #[error("Submission contains no rows")]
    EmptySubmission,

    /// No job is registered under this id.
    #[error("Job not found: {0}")]
    JobNotFound(String),

    /// Results were requested before the job completed.
    #[error("Job not completed: {0}")]
    JobNotCompleted(String),

    /// The export filter matched no rows.
    #[error("No results found for the specified filter")]
    NoMatchingRows,
}

pub type Result<T> = std::result::Result<T, AppError>;
