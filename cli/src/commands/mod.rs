//! Command handlers

pub mod admission;
pub mod staff;

use crate::config::DataFile;
use crate::output::OutputFormat;
use crate::Commands;
use anyhow::Context as _;
use chrono::{DateTime, Utc};
use fit_common::{Clock, FixedClock, SystemClock};
use fit_entitlements::{
    EntitlementConfig, EntitlementService, ImportReport, InMemoryCatalog, InMemoryMemberDirectory,
};
use std::sync::Arc;

/// Loaded service plus what was imported into it
pub struct Context {
    pub service: EntitlementService,
    pub report: ImportReport,
    pub now: DateTime<Utc>,
}

impl Context {
    pub fn build(
        data: DataFile,
        config: EntitlementConfig,
        at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<Self> {
        let catalog = Arc::new(InMemoryCatalog::from_entities(
            data.branches,
            data.class_types,
            data.tiers,
        ));
        let members = Arc::new(InMemoryMemberDirectory::from_records(data.members));
        let clock: Arc<dyn Clock> = match at {
            Some(at) => Arc::new(FixedClock::new(at)),
            None => Arc::new(SystemClock),
        };
        let now = clock.now();

        let service = EntitlementService::new(catalog, members, clock, config);
        let report = data
            .store
            .import_into(service.policies(), service.overrides())
            .context("data file rejected")?;

        Ok(Self {
            service,
            report,
            now,
        })
    }
}

pub fn handle(command: Commands, ctx: &Context, format: OutputFormat) -> anyhow::Result<i32> {
    match command {
        Commands::CheckIn { member, branch } => admission::check_in(ctx, format, member, branch),
        Commands::Book {
            member,
            branch,
            class,
        } => admission::book(ctx, format, member, branch, class),
        Commands::Summary { member } => staff::summary(ctx, format, member),
        Commands::Explain {
            member,
            branch,
            class,
        } => staff::explain(ctx, format, member, branch, class),
        Commands::Validate => staff::validate(ctx, format),
        Commands::Export => staff::export(ctx, format),
    }
}
