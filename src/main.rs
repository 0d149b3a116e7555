//! cert-tools CLI application.
//!
//! Command-line front end for a small P-256 certificate authority: key and
//! random-data generation, root CA creation, signing requests, leaf
//! issuance, revocation lists and certificate store queries.
//!
//! Every command writes exactly one artifact to stdout, and only once it has
//! been fully built. Diagnostics go to stderr.

use cert_tools::cert::builder::cert_to_pem;
use cert_tools::cert::ca::{create_ca_certificate, CaIntent};
use cert_tools::cert::crl::{create_crl, crl_to_output, parse_revocation_list};
use cert_tools::cert::leaf::{create_leaf_certificate, LeafIntent, UsageFlags};
use cert_tools::cert::loader::{load_certificate, load_keypair, load_request, read_input};
use cert_tools::cert::request::{create_certificate_request, RequestIntent};
use cert_tools::cert::subject::{AttributeList, Subject, SubjectBuilder};
use cert_tools::config::{DistributionPoints, OutputFormat, DEFAULT_VALIDITY_DAYS};
use cert_tools::crypto::ecdsa::generate_p256_keypair;
use cert_tools::crypto::random::random_blocks;
use cert_tools::error::{CertToolError, Result};
use cert_tools::storage::index::LatestFilter;
use cert_tools::storage::scanner::{find_certificates, OutputStyle, ScanQuery};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cert-tools")]
#[command(about = "P-256 certificate authority toolkit", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Key operations
    #[command(subcommand)]
    Key(KeyCommands),

    /// Write blocks of random bytes
    Rand {
        /// Number of blocks to output
        #[arg(short, long, default_value = "1")]
        count: usize,

        /// Number of bytes in a block
        #[arg(short = 'b', long = "bs")]
        block_size: usize,
    },

    /// Root CA operations
    #[command(subcommand)]
    Ca(CaCommands),

    /// Certificate signing request operations
    #[command(subcommand)]
    Csr(CsrCommands),

    /// Certificate issuance
    #[command(subcommand)]
    Cert(CertCommands),

    /// Certificate revocation lists
    #[command(subcommand)]
    Crl(CrlCommands),

    /// Certificate store queries
    #[command(subcommand)]
    Store(StoreCommands),
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate a new P-256 private key (EC PRIVATE KEY PEM)
    Generate,
}

/// Subject and name options given as comma-separated lists.
#[derive(Args)]
struct CommaSubjectArgs {
    /// Comma separated DNS name or IP address list
    #[arg(long, default_value = "")]
    hosts: String,

    /// Comma separated email address list
    #[arg(short = 'E', long)]
    email: String,

    /// Comma separated country list
    #[arg(short = 'C', long, default_value = "")]
    country: String,

    /// Comma separated province list
    #[arg(short = 'P', long, default_value = "")]
    province: String,

    /// Comma separated locality list
    #[arg(short = 'L', long, default_value = "")]
    locality: String,

    /// Comma separated street address list
    #[arg(long, default_value = "")]
    street: String,

    /// Comma separated postal code list
    #[arg(long, default_value = "")]
    postal_code: String,

    /// Comma separated organizational unit list
    #[arg(short = 'U', long = "organisational-unit", default_value = "")]
    organizational_unit: String,

    /// Comma separated organization list
    #[arg(short = 'O', long = "organisation", default_value = "")]
    organization: String,

    /// Common name
    #[arg(short = 'N', long)]
    common_name: String,
}

impl CommaSubjectArgs {
    fn subject(&self) -> Subject {
        SubjectBuilder::new()
            .country(AttributeList::from_comma_separated(&self.country))
            .province(AttributeList::from_comma_separated(&self.province))
            .locality(AttributeList::from_comma_separated(&self.locality))
            .street_address(AttributeList::from_comma_separated(&self.street))
            .postal_code(AttributeList::from_comma_separated(&self.postal_code))
            .organization(AttributeList::from_comma_separated(&self.organization))
            .organizational_unit(AttributeList::from_comma_separated(
                &self.organizational_unit,
            ))
            .common_name(self.common_name.clone())
            .build()
    }

    fn hosts(&self) -> Vec<String> {
        split_list(&self.hosts)
    }

    fn emails(&self) -> Vec<String> {
        split_list(&self.email)
    }
}

/// Subject and name options given as repeated flags, one value each.
#[derive(Args)]
struct RepeatedSubjectArgs {
    /// DNS name or IP address (repeatable)
    #[arg(long = "host", action = ArgAction::Append)]
    hosts: Vec<String>,

    /// Email address (repeatable)
    #[arg(short = 'E', long = "email", action = ArgAction::Append, required = true)]
    emails: Vec<String>,

    /// Country (repeatable)
    #[arg(short = 'C', long, action = ArgAction::Append)]
    country: Vec<String>,

    /// Province (repeatable)
    #[arg(short = 'P', long, action = ArgAction::Append)]
    province: Vec<String>,

    /// Locality (repeatable)
    #[arg(short = 'L', long, action = ArgAction::Append)]
    locality: Vec<String>,

    /// Street address (repeatable)
    #[arg(long, action = ArgAction::Append)]
    street: Vec<String>,

    /// Postal code (repeatable)
    #[arg(long, action = ArgAction::Append)]
    postal_code: Vec<String>,

    /// Organizational unit (repeatable)
    #[arg(short = 'U', long = "organisational-unit", action = ArgAction::Append)]
    organizational_unit: Vec<String>,

    /// Organization (repeatable)
    #[arg(short = 'O', long = "organisation", action = ArgAction::Append)]
    organization: Vec<String>,

    /// Common name
    #[arg(short = 'N', long)]
    common_name: String,
}

impl RepeatedSubjectArgs {
    fn subject(&self) -> Subject {
        SubjectBuilder::new()
            .country(AttributeList::from_values(&self.country))
            .province(AttributeList::from_values(&self.province))
            .locality(AttributeList::from_values(&self.locality))
            .street_address(AttributeList::from_values(&self.street))
            .postal_code(AttributeList::from_values(&self.postal_code))
            .organization(AttributeList::from_values(&self.organization))
            .organizational_unit(AttributeList::from_values(&self.organizational_unit))
            .common_name(self.common_name.clone())
            .build()
    }
}

/// CRL distribution and CA issuer URIs.
#[derive(Args)]
struct DistributionArgs {
    /// Comma separated CRL distribution URI list
    #[arg(short = 'd', long = "crl-distribution", default_value = "")]
    crl_uris: String,

    /// Comma separated CA issuer (p7c) URI list
    #[arg(short = 'i', long = "ca-issuers-distribution", default_value = "")]
    ca_issuer_uris: String,
}

impl DistributionArgs {
    fn points(&self) -> DistributionPoints {
        DistributionPoints::new(split_list(&self.crl_uris), split_list(&self.ca_issuer_uris))
    }
}

#[derive(Subcommand)]
enum CaCommands {
    /// Create a self-signed root CA certificate
    Create {
        /// CA private key, PEM format
        #[arg(short, long)]
        key: PathBuf,

        /// Certificate validity period (days)
        #[arg(long, default_value_t = DEFAULT_VALIDITY_DAYS)]
        validity: u32,

        #[command(flatten)]
        subject: CommaSubjectArgs,

        #[command(flatten)]
        distribution: DistributionArgs,
    },
}

#[derive(Subcommand)]
enum CsrCommands {
    /// Create a signing request from comma-separated lists
    Create {
        /// Requester private key, PEM format
        #[arg(short, long)]
        key: PathBuf,

        #[command(flatten)]
        subject: CommaSubjectArgs,
    },

    /// Create a signing request from repeated single-value flags
    CreateRepeated {
        /// Requester private key, PEM format
        #[arg(short, long)]
        key: PathBuf,

        #[command(flatten)]
        subject: RepeatedSubjectArgs,
    },
}

#[derive(Subcommand)]
enum CertCommands {
    /// Issue a certificate from a signing request
    Sign {
        /// CA private key, PEM format
        #[arg(short, long)]
        key: PathBuf,

        /// CA certificate, PEM or DER
        #[arg(short = 'c', long = "ca-certificate")]
        ca_certificate: PathBuf,

        /// Signing request, PEM format
        #[arg(short = 'r', long = "certificate-request")]
        request: PathBuf,

        /// Certificate validity period (days)
        #[arg(long, default_value_t = DEFAULT_VALIDITY_DAYS)]
        validity: u32,

        /// Issue a server certificate
        #[arg(short = 'S', long = "server-usage")]
        server: bool,

        /// Issue a client certificate
        #[arg(short = 'C', long = "client-usage")]
        client: bool,

        /// Issue a code signing certificate
        #[arg(long = "code-signing-usage")]
        code_signing: bool,

        /// Issue a subordinate CA certificate
        #[arg(short = 'A', long = "ca-usage")]
        sub_ca: bool,

        /// Issue a CRL issuer certificate
        #[arg(short = 'R', long = "crl-usage")]
        crl_issuer: bool,

        #[command(flatten)]
        distribution: DistributionArgs,
    },
}

#[derive(Subcommand)]
enum CrlCommands {
    /// Create a CRL from a revocation file (HEXSERIAL,RFC3339 per line)
    Create {
        /// CA private key, PEM format
        #[arg(short, long)]
        key: PathBuf,

        /// CA certificate, PEM or DER
        #[arg(short = 'c', long = "ca-certificate")]
        ca_certificate: PathBuf,

        /// Revocation file
        #[arg(short = 'r', long = "revoked")]
        revoked: PathBuf,

        /// Output the CRL as DER instead of PEM
        #[arg(short, long)]
        binary: bool,
    },
}

#[derive(Subcommand)]
enum StoreCommands {
    /// Find issued certificates by email and subject
    Find {
        /// Email to locate in a certificate
        #[arg(short, long, default_value = "")]
        email: String,

        /// Subject substring to match
        #[arg(short, long, default_value = "")]
        subject: String,

        /// Certificate file name prefix
        #[arg(short, long)]
        prefix: String,

        /// Directory to search
        #[arg(short, long)]
        directory: PathBuf,

        /// Extended output
        #[arg(short = 'x', long)]
        extended: bool,

        /// Show all but the latest certificate per email
        #[arg(short = 'l', long = "exceptlatest")]
        except_latest: bool,

        /// Show only the latest certificate per email
        #[arg(short = 'L', long = "onlylatest")]
        only_latest: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli.command, cli.verbose) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(command: Commands, verbose: u8) -> Result<()> {
    match command {
        Commands::Key(KeyCommands::Generate) => {
            let keypair = generate_p256_keypair()?;
            emit(keypair.to_sec1_pem()?.as_bytes())
        }
        Commands::Rand { count, block_size } => handle_rand(count, block_size, verbose),
        Commands::Ca(cmd) => handle_ca_command(cmd),
        Commands::Csr(cmd) => handle_csr_command(cmd),
        Commands::Cert(cmd) => handle_cert_command(cmd),
        Commands::Crl(cmd) => handle_crl_command(cmd),
        Commands::Store(cmd) => handle_store_command(cmd),
    }
}

fn handle_rand(count: usize, block_size: usize, verbose: u8) -> Result<()> {
    let blocks = random_blocks(count, block_size)?;

    if verbose > 0 {
        let mut stderr = std::io::stderr().lock();
        for block in &blocks {
            let dump: Vec<String> = block.iter().map(|b| format!("{:02x}", b)).collect();
            writeln!(stderr, "{}", dump.join(" "))?;
        }
    }

    emit(&blocks.concat())
}

fn handle_ca_command(cmd: CaCommands) -> Result<()> {
    match cmd {
        CaCommands::Create {
            key,
            validity,
            subject,
            distribution,
        } => {
            let keypair = load_keypair(&key)?;
            let intent = CaIntent {
                subject: subject.subject(),
                hosts: subject.hosts(),
                emails: subject.emails(),
                validity_days: validity,
                distribution: distribution.points(),
            };

            let cert = create_ca_certificate(&intent, &keypair)?;
            emit(cert_to_pem(&cert)?.as_bytes())
        }
    }
}

fn handle_csr_command(cmd: CsrCommands) -> Result<()> {
    let (key, intent) = match cmd {
        CsrCommands::Create { key, subject } => (
            key,
            RequestIntent {
                subject: subject.subject(),
                hosts: subject.hosts(),
                emails: subject.emails(),
            },
        ),
        CsrCommands::CreateRepeated { key, subject } => (
            key,
            RequestIntent {
                subject: subject.subject(),
                hosts: subject.hosts.clone(),
                emails: subject.emails.clone(),
            },
        ),
    };

    let keypair = load_keypair(&key)?;
    let request = create_certificate_request(&intent, &keypair)?;
    emit(request.to_pem()?.as_bytes())
}

fn handle_cert_command(cmd: CertCommands) -> Result<()> {
    match cmd {
        CertCommands::Sign {
            key,
            ca_certificate,
            request,
            validity,
            server,
            client,
            code_signing,
            sub_ca,
            crl_issuer,
            distribution,
        } => {
            let ca_keypair = load_keypair(&key)?;
            let request = load_request(&request)?;
            let ca_cert = load_certificate(&ca_certificate)?;

            let intent = LeafIntent {
                usage: UsageFlags {
                    server,
                    client,
                    code_signing,
                    sub_ca,
                    crl_issuer,
                },
                validity_days: validity,
                distribution: distribution.points(),
            };

            let cert = create_leaf_certificate(&request, &ca_cert, &ca_keypair, &intent)?;
            emit(cert_to_pem(&cert)?.as_bytes())
        }
    }
}

fn handle_crl_command(cmd: CrlCommands) -> Result<()> {
    match cmd {
        CrlCommands::Create {
            key,
            ca_certificate,
            revoked,
            binary,
        } => {
            let ca_keypair = load_keypair(&key)?;
            let ca_cert = load_certificate(&ca_certificate)?;

            let text = String::from_utf8(read_input(&revoked)?).map_err(|_| {
                CertToolError::InputError(format!("{} is not text", revoked.display()))
            })?;
            let entries = parse_revocation_list(&text)?;

            let crl = create_crl(&ca_cert, &ca_keypair, &entries)?;
            emit(&crl_to_output(&crl, OutputFormat::from_binary_flag(binary))?)
        }
    }
}

fn handle_store_command(cmd: StoreCommands) -> Result<()> {
    match cmd {
        StoreCommands::Find {
            email,
            subject,
            prefix,
            directory,
            extended,
            except_latest,
            only_latest,
        } => {
            let query = ScanQuery {
                directory,
                prefix,
                email,
                subject,
            };
            let filter = LatestFilter {
                only_latest,
                except_latest,
            };
            let style = if extended {
                OutputStyle::Extended
            } else {
                OutputStyle::Short
            };

            let lines = find_certificates(&query, filter, style)?;
            let mut output = String::new();
            for line in lines {
                output.push_str(&line);
                output.push('\n');
            }
            emit(output.as_bytes())
        }
    }
}

/// Split a comma-separated option, dropping empty items.
fn split_list(input: &str) -> Vec<String> {
    AttributeList::from_comma_separated(input).as_slice().to_vec()
}

/// Write the finished artifact to stdout.
fn emit(bytes: &[u8]) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(bytes)?;
    stdout.flush()?;
    Ok(())
}
