//! Operator CLI: mint and inspect access tokens, check config files.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use secrecy::SecretString;

use vitals_gateway::auth::TokenCodec;
use vitals_gateway::config::{self, ConfigError, ExecutionMode};
use vitals_gateway::{GatewayError, Normalizer};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Operator tooling for vitals-gateway", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a 7-day access token
    IssueToken {
        #[arg(long)]
        subject: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Verify a token and print its principal
    VerifyToken {
        token: String,
        #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
        secret: String,
    },
    /// Validate a config file and list every problem found
    CheckConfig { path: PathBuf },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::IssueToken {
            subject,
            email,
            secret,
        } => {
            let codec = TokenCodec::new(Some(&SecretString::from(secret)));
            match codec.issue(&subject, &email) {
                Ok(token) => {
                    println!("{token}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("error: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::VerifyToken { token, secret } => {
            let codec = TokenCodec::new(Some(&SecretString::from(secret)));
            match codec.verify(&token) {
                Ok(principal) => {
                    println!("subject: {}", principal.subject_id);
                    println!("email:   {}", principal.email);
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    let failure = GatewayError::from(e);
                    let normalized = Normalizer::new(ExecutionMode::Production).classify(&failure);
                    eprintln!(
                        "{} {} ({}): {}",
                        normalized.status.as_u16(),
                        normalized.error,
                        failure.kind(),
                        normalized.message
                    );
                    ExitCode::FAILURE
                }
            }
        }
        Commands::CheckConfig { path } => match config::load_config(&path) {
            Ok(_) => {
                println!("{}: ok", path.display());
                ExitCode::SUCCESS
            }
            Err(ConfigError::Validation(errors)) => {
                for error in &errors {
                    eprintln!("{}: {error}", path.display());
                }
                eprintln!("{} problem(s) found", errors.len());
                ExitCode::FAILURE
            }
            Err(e) => {
                eprintln!("{}: {e}", path.display());
                ExitCode::FAILURE
            }
        },
    }
}
