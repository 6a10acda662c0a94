//! Doctor command - verify credentials, binaries and configuration.

use super::providers::credentials_ready;
use crate::cli::preflight::is_known_launcher;
use crate::cli::{AppContext, Output};
use crate::provider::ProviderDescriptor;
use console::style;
use std::collections::BTreeSet;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(ctx: &AppContext) -> anyhow::Result<()> {
    Output::header("Gymmando Doctor");
    println!();

    let mut checks = Vec::new();
    let mut section = |title: &str, results: Vec<CheckResult>| {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    };

    section("Chat Model", vec![check_chat_credential(ctx)]);

    let launchers: BTreeSet<&str> = ctx
        .catalogue
        .list()
        .flat_map(|d| {
            std::iter::once(d.command.as_str()).chain(d.local_entry.iter().map(|l| l.runner.as_str()))
        })
        .filter(|command| is_known_launcher(command))
        .collect();
    section(
        "Launchers",
        launchers.into_iter().map(check_program).collect(),
    );

    section(
        "Providers",
        ctx.catalogue.list().map(|d| check_provider(d, ctx)).collect(),
    );

    section("Configuration", vec![check_config_file(ctx)]);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using Gymmando.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Gymmando is ready to use.");
    }

    Ok(())
}

fn check_chat_credential(ctx: &AppContext) -> CheckResult {
    let backend = ctx.settings.chat.backend;
    let var = backend.credential_var();
    let name = format!("{} ({})", var, backend);

    match ctx.env().var(var) {
        Some(key) => CheckResult::ok(&name, &format!("configured ({})", mask(&key))),
        None => CheckResult::error(
            &name,
            "not set",
            &format!("Set with: export {}='...' (or add it to .env)", var),
        ),
    }
}

/// Check that a program can be started.
fn check_program(name: &str) -> CheckResult {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();
            CheckResult::ok(name, &version)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", install_hint(name)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", install_hint(name))
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), install_hint(name)),
    }
}

fn check_provider(descriptor: &ProviderDescriptor, ctx: &AppContext) -> CheckResult {
    if !credentials_ready(descriptor, ctx) {
        let missing: Vec<&str> = descriptor
            .required_env
            .iter()
            .filter(|var| ctx.env().var(var).is_none())
            .map(String::as_str)
            .collect();
        return CheckResult::warning(
            &descriptor.name,
            &format!("missing {}", missing.join(", ")),
            &format!("Needed only for 'gymmando ask {}'", descriptor.name),
        );
    }

    match descriptor.launch_spec(ctx.env()) {
        Ok(spec) => CheckResult::ok(
            &descriptor.name,
            &format!("{} {}", spec.command, spec.args.join(" ")),
        ),
        Err(e) => CheckResult::warning(&descriptor.name, "cannot be launched", &e.to_string()),
    }
}

fn check_config_file(ctx: &AppContext) -> CheckResult {
    if ctx.config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", ctx.config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            &format!("Create {} to add providers", ctx.config_path.display()),
        )
    }
}

/// Show only the ends of a secret.
fn mask(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 12 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..7].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

fn install_hint(program: &str) -> &'static str {
    match program {
        "npx" | "node" => {
            if cfg!(target_os = "macos") {
                "Install Node.js with: brew install node"
            } else if cfg!(target_os = "linux") {
                "Install Node.js with your package manager (e.g. sudo apt install nodejs npm)"
            } else {
                "Install Node.js from: https://nodejs.org"
            }
        }
        _ => "Make sure it is installed and on your PATH",
    }
}
