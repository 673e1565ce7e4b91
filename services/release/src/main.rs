use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use release_service::config::{Config, ServiceConfig};
use release_service::gateway::{S3Gateway, StorageGateway};
use release_service::index::{collect_sections, write_index};
use release_service::pipeline::{copy_latest, current_update, promote_release, PromotionRequest};
use release_service::promotion::EligibilityWindow;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Release pipeline tooling for the S3 release bucket
#[derive(Parser, Debug)]
#[command(name = "release", version, about)]
struct Cli {
    /// Bucket name (overrides s3.bucket)
    #[arg(long, global = true)]
    bucket: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the HTML index of recent releases
    IndexHtml {
        /// Comma-separated listing prefixes
        #[arg(long)]
        prefixes: Option<String>,
        /// Artifact suffix filter
        #[arg(long)]
        suffix: Option<String>,
        /// Output path
        #[arg(long)]
        dest: Option<String>,
        /// Releases per section (0 = all)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Copy each platform's newest release to its latest name
    Latest,
    /// Promote the newest eligible release to the update manifest
    PromoteReleases {
        /// Platform name (darwin, deb, rpm, windows)
        #[arg(long)]
        platform: String,
        /// Environment name
        #[arg(long)]
        env: Option<String>,
        /// Update channel
        #[arg(long)]
        channel: Option<String>,
        /// Minimum release age in hours
        #[arg(long)]
        delay_hours: Option<u64>,
        /// Releases must be built before this hour (US Eastern)
        #[arg(long)]
        cutoff_hour: Option<u32>,
        /// Decide without writing the manifest
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the current update manifest
    CurrentUpdate {
        #[arg(long)]
        platform: String,
        #[arg(long)]
        env: Option<String>,
        #[arg(long)]
        channel: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load().context("Failed to load configuration")?;
    apply_overrides(&mut config, &cli);

    init_logging(&config.service)?;
    config.validate().context("Invalid configuration")?;

    info!(
        service = "release",
        version = env!("CARGO_PKG_VERSION"),
        bucket = %config.s3.bucket,
        "Starting release command"
    );

    let gateway = S3Gateway::new(&config.s3).await;

    match cli.command {
        Command::IndexHtml { .. } => {
            let prefixes = config.index.prefix_list();
            let sections = collect_sections(
                &gateway,
                &prefixes,
                &config.index.suffix,
                config.index.max_releases,
            )
            .await
            .context("Failed to list releases")?;

            write_index(
                &config.index.output_path,
                &config.s3.bucket,
                &sections,
                &config.index.commit_url_prefix,
            )
            .context("Failed to write release index")?;
        }
        Command::Latest => {
            let copies = copy_latest(&gateway)
                .await
                .context("Failed to copy latest releases")?;
            info!(count = copies.len(), "Latest releases copied");
        }
        Command::PromoteReleases {
            platform, dry_run, ..
        } => {
            let conditional_write =
                config.promotion.conditional_write && gateway.supports_conditional_write();
            if config.promotion.conditional_write && !conditional_write {
                warn!("Storage backend has no conditional copy, writing unconditionally");
            }

            let request = PromotionRequest {
                platform,
                env: config.promotion.env.clone(),
                channel: config.promotion.channel.clone(),
                window: EligibilityWindow::new(
                    config.promotion_delay(),
                    config.promotion.cutoff_hour,
                ),
                conditional_write,
                dry_run,
            };

            let outcome = promote_release(&gateway, &request, Utc::now())
                .await
                .context("Failed to promote release")?;

            match outcome.promoted() {
                Some(release) => info!(
                    release = %release.name,
                    version = %release.version,
                    manifest = %outcome.manifest_key,
                    written = outcome.written,
                    "Promoted release"
                ),
                None => info!(decision = ?outcome.decision, "No release promoted"),
            }
        }
        Command::CurrentUpdate { platform, .. } => {
            let current = current_update(
                &gateway,
                &platform,
                &config.promotion.env,
                config.promotion.channel.as_deref(),
            )
            .await
            .context("Failed to read current update")?;

            match current {
                Some(current) => {
                    let json = serde_json::to_string_pretty(&current.manifest)
                        .context("Failed to encode update manifest")?;
                    println!("{}", json);
                }
                None => info!(platform = %platform, "No current update"),
            }
        }
    }

    Ok(())
}

/// Fold command-line flags into the loaded configuration
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref bucket) = cli.bucket {
        config.s3.bucket = bucket.clone();
    }

    match &cli.command {
        Command::IndexHtml {
            prefixes,
            suffix,
            dest,
            limit,
        } => {
            if let Some(prefixes) = prefixes {
                config.index.prefixes = prefixes.clone();
            }
            if let Some(suffix) = suffix {
                config.index.suffix = suffix.clone();
            }
            if let Some(dest) = dest {
                config.index.output_path = dest.clone();
            }
            if let Some(limit) = limit {
                config.index.max_releases = *limit;
            }
        }
        Command::PromoteReleases {
            env,
            channel,
            delay_hours,
            cutoff_hour,
            ..
        } => {
            override_target(config, env, channel);
            if let Some(delay_hours) = delay_hours {
                config.promotion.delay_hours = *delay_hours;
            }
            if let Some(cutoff_hour) = cutoff_hour {
                config.promotion.cutoff_hour = *cutoff_hour;
            }
        }
        Command::CurrentUpdate { env, channel, .. } => override_target(config, env, channel),
        Command::Latest => {}
    }
}

fn override_target(config: &mut Config, env: &Option<String>, channel: &Option<String>) {
    if let Some(env) = env {
        config.promotion.env = env.clone();
    }
    if let Some(channel) = channel {
        config.promotion.channel = Some(channel.clone());
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(config: &ServiceConfig) -> Result<()> {
    let level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("release_service={}", level).parse()?)
        .add_directive(format!("release={}", level).parse()?)
        .add_directive("aws_config=warn".parse()?)
        .add_directive("aws_smithy_runtime=warn".parse()?);

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.log_format == "json" {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use release_service::config::split_prefixes;
    use std::time::Duration;

    fn config() -> Config {
        let mut config: Config = ::config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        config.s3.bucket = "prerelease".to_string();
        config
    }

    #[test]
    fn test_promote_flags_override_config() {
        let cli = Cli::parse_from([
            "release",
            "promote-releases",
            "--platform",
            "darwin",
            "--env",
            "staging",
            "--channel",
            "beta",
            "--delay-hours",
            "48",
            "--cutoff-hour",
            "10",
            "--dry-run",
        ]);
        let mut config = config();

        apply_overrides(&mut config, &cli);

        assert_eq!(config.promotion.env, "staging");
        assert_eq!(config.promotion.channel.as_deref(), Some("beta"));
        assert_eq!(config.promotion_delay(), Duration::from_secs(48 * 3600));
        assert_eq!(config.promotion.cutoff_hour, 10);
        assert!(matches!(
            cli.command,
            Command::PromoteReleases { dry_run: true, .. }
        ));
    }

    #[test]
    fn test_index_flags_override_config() {
        let cli = Cli::parse_from([
            "release",
            "--bucket",
            "other",
            "index-html",
            "--prefixes",
            "darwin/,windows/",
            "--dest",
            "out/index.html",
            "--limit",
            "5",
        ]);
        let mut config = config();

        apply_overrides(&mut config, &cli);

        assert_eq!(config.s3.bucket, "other");
        assert_eq!(split_prefixes(&config.index.prefixes), vec!["darwin/", "windows/"]);
        assert_eq!(config.index.output_path, "out/index.html");
        assert_eq!(config.index.max_releases, 5);
    }
}
