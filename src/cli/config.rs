//! gt config show

use std::path::PathBuf;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};

use super::context::{Context, GlobalOptions};

#[derive(Serialize)]
struct ConfigReport<'a> {
    config_path: PathBuf,
    config_exists: bool,
    data_dir: PathBuf,
    remote_dir: Option<PathBuf>,
    user: Option<String>,
    config: &'a Config,
}

pub fn run_show(globals: &GlobalOptions) -> Result<()> {
    let ctx = Context::load(globals)?;
    let report = ConfigReport {
        config_path: ctx.config_path.clone(),
        config_exists: ctx.config_path.exists(),
        data_dir: ctx.store.dir().to_path_buf(),
        remote_dir: ctx.remote_dir.clone(),
        user: ctx.user.as_ref().map(|user| user.to_string()),
        config: &ctx.config,
    };

    let mut human = HumanOutput::new("glasstask configuration");
    let source = if report.config_exists { "" } else { " (not found, defaults)" };
    human.push_summary("config", format!("{}{source}", report.config_path.display()));
    human.push_summary("data dir", report.data_dir.display().to_string());
    human.push_summary(
        "remote dir",
        report
            .remote_dir
            .as_ref()
            .map(|dir| dir.display().to_string())
            .unwrap_or_else(|| "(sync disabled)".to_string()),
    );
    human.push_summary(
        "user",
        report.user.clone().unwrap_or_else(|| "(signed out)".to_string()),
    );
    human.push_summary("auto push", ctx.config.sync.auto_push.to_string());
    human.push_summary(
        "debounce",
        format!(
            "persist {}ms, search {}ms",
            ctx.config.debounce.persist_ms, ctx.config.debounce.search_ms
        ),
    );
    human.push_summary(
        "list order",
        format!("{} {}", ctx.config.list.sort, ctx.config.list.direction),
    );

    emit_success(ctx.output, "config show", &report, Some(&human))
}
