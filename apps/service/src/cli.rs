use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use urlcheck::SmtpSecurity;

use crate::config::Config;

/// Periodically probe HTTP endpoints and mail alerts on unexpected status codes.
#[derive(Debug, Parser)]
#[command(name = "urlcheck", version, about)]
pub struct Cli {
    /// Checks file (YAML, or TOML with a .toml extension)
    #[arg(short = 'c', long = "check", value_name = "CHECKS FILE")]
    pub checks_file: PathBuf,

    /// Settings file [default: $XDG_CONFIG_HOME/urlcheck/config.toml]
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, value_name = "PORT")]
    pub smtp_port: Option<u16>,

    /// none, starttls or tls
    #[arg(long, value_name = "MODE")]
    pub smtp_security: Option<SmtpSecurity>,

    #[arg(long, value_name = "LOGIN")]
    pub smtp_login: Option<String>,

    /// Literal password, or $NAME to read it from the environment
    #[arg(long, value_name = "PASSWORD")]
    pub smtp_password: Option<String>,

    /// Sender address of alert emails
    #[arg(long, value_name = "ADDRESS")]
    pub mail_from: Option<String>,

    /// Do not send alert emails
    #[arg(long)]
    pub no_mail: bool,

    /// Probes allowed to run at once
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// How long shutdown waits for running probes, e.g. "10s"
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub grace_period: Option<Duration>,

    /// Print the effective settings before starting
    #[arg(long)]
    pub show_config: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Override settings file values with the flags given on the command line.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.smtp_host {
            config.smtp.host = host.clone();
        }
        if let Some(port) = self.smtp_port {
            config.smtp.port = port;
        }
        if let Some(security) = self.smtp_security {
            config.smtp.security = security;
        }
        if let Some(login) = &self.smtp_login {
            config.smtp.login = Some(login.clone());
        }
        if let Some(password) = &self.smtp_password {
            config.smtp.password = Some(password.clone());
        }
        if let Some(from) = &self.mail_from {
            config.smtp.from = from.clone();
        }
        if self.no_mail {
            config.mail.enabled = false;
        }
        if let Some(workers) = self.workers {
            config.dispatcher.workers = workers;
        }
        if let Some(grace_period) = self.grace_period {
            config.dispatcher.grace_period = grace_period;
        }
    }
}
