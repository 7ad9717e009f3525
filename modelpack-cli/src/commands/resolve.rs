//! Resolve command - list the archive parts of a release.

use std::sync::Arc;

use modelpack::config::format_size;
use modelpack::manager::{AssetResolver, ReqwestSend, RunContext, Transport};
use tokio_util::sync::CancellationToken;

use super::common::{apply_overrides, require_identifier, InstallOverrides};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the resolve command.
pub fn run(overrides: InstallOverrides) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("resolve");

    let config = apply_overrides(runner.config(), &overrides)?;
    let id = require_identifier(&config)?;
    let manager = config.to_manager_config();

    let sender = ReqwestSend::new(manager.timeout, manager.connect_timeout, manager.read_timeout)?;
    let transport = Transport::new(Arc::new(sender), manager.max_redirects);
    let resolver = AssetResolver::new(transport)
        .with_api_base(manager.api_base.clone())
        .with_download_base(manager.download_base.clone())
        .with_max_probe_parts(manager.max_probe_parts);

    let ctx = RunContext::new(CancellationToken::new());
    let parts = runner.block_on(resolver.resolve(&id, &ctx))?;

    println!("Release {}", id);
    println!();
    let mut total: Option<u64> = Some(0);
    for part in &parts {
        let size = match part.known_size() {
            Some(size) => format_size(size),
            None => "unknown size".to_string(),
        };
        println!("  {:<24} {:>12}  {}", part.name, size, part.source_url);
        total = total.zip(part.known_size()).map(|(a, b)| a + b);
    }
    println!();
    match total {
        Some(total) => println!("{} part(s), {}", parts.len(), format_size(total)),
        None => println!("{} part(s)", parts.len()),
    }

    Ok(())
}
