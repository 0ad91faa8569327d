//! Network Throughput Tester - Main CLI Application
//!
//! Measures download and upload bandwidth against a throughput server and
//! renders live rates while the test runs.

use clap::Parser;
use network_throughput_tester::{
    build_info,
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, EnvManager, ValidationLevel},
    error::{AppError, ErrorReporter, Result},
    logging::LoggerFactory,
    output::{format_run_report, OutputSinkFactory},
    runner::TestRunner,
    VERSION,
};
use std::process;

#[tokio::main]
async fn main() {
    // Set up better panic handling
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue with the command line you used.");
        process::exit(1);
    }));

    let cli = Cli::parse();

    if cli.env_help {
        match EnvManager::env_help_report() {
            Ok(report) => println!("{}", report),
            Err(e) => {
                eprintln!("{}", e);
                process::exit(e.exit_code());
            }
        }
        return;
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        print_error_suggestions(&e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    if cli.debug {
        eprintln!("{}", build_info::describe());
        eprintln!("{}", cli.get_config_summary());
    }

    let json = cli.json;
    let config = load_config(cli)?;
    let warnings = validate_config(&config)?;

    if config.debug {
        eprintln!("Configuration Summary:");
        eprintln!("{}", display_config_summary(&config));
        eprintln!();
    }

    for warning in &warnings {
        if warning.level != ValidationLevel::Info || config.verbose {
            eprintln!("{}", warning.format(config.enable_color));
        }
    }

    let logger_factory = LoggerFactory::new(config.clone());
    let transfer_logger = logger_factory.create_transfer_logger().await;

    let sink = if json {
        OutputSinkFactory::create_null_sink()
    } else {
        OutputSinkFactory::create_sink(config.enable_color, config.verbose)
    };

    let runner = TestRunner::from_config(&config, sink)?.with_logger(transfer_logger);

    if !json {
        println!(
            "Network Throughput Tester v{} - testing against {}",
            VERSION, config.server_address
        );
        println!();
    }

    let report = runner.run(config.test_plan).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!();
        println!("{}", format_run_report(&report, config.enable_color)?);
    }

    let failed = report.failed_phases();
    if let Some(first) = failed.first() {
        return Err(AppError::test_execution(format!(
            "{} phase ended with a transfer error: {}",
            first.direction,
            first.outcome.describe()
        )));
    }

    Ok(())
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Check your .env file format (see --env-help)");
            eprintln!("  - Server addresses take the form host or host:port");
            eprintln!("  - The sample interval must not exceed the test duration");
        }
        AppError::Network(_) | AppError::Timeout(_) => {
            eprintln!();
            eprintln!("Network troubleshooting:");
            eprintln!("  - Check that the throughput server is running");
            eprintln!("  - Verify the port (default 7121) and firewall settings");
            eprintln!("  - Increase the timeout with --connect-timeout");
        }
        AppError::Protocol(_) => {
            eprintln!();
            eprintln!("Protocol help:");
            eprintln!("  - The server closed the connection before accepting the test request");
            eprintln!("  - Make sure the address points at a throughput test server");
        }
        AppError::TestExecution(_) => {
            eprintln!();
            eprintln!("Execution troubleshooting:");
            eprintln!("  - Run again with --verbose to see transfer errors as they happen");
            eprintln!("  - Try a smaller block size with --block-size");
        }
        _ => {}
    }
}
