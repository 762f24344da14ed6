//! Staff commands

use super::Context;
use crate::output::OutputFormat;
use fit_common::{BranchId, ClassTypeId, MemberId};
use fit_entitlements::{BranchSummary, StoreDocument};
use serde::Serialize;

pub fn summary(ctx: &Context, format: OutputFormat, member: u64) -> anyhow::Result<i32> {
    let summary = ctx.service.entitlement_summary_at(MemberId::new(member), ctx.now);
    if format.print(&summary)? {
        return Ok(0);
    }

    let tier = summary
        .tier
        .as_ref()
        .map(|t| t.name.as_str())
        .unwrap_or("(none)");
    println!("{}  tier: {}  at: {}", summary.member_id, tier, summary.evaluated_at.to_rfc3339());
    if summary.fail_closed {
        println!("  access denied: tier missing, inactive or without policy");
        return Ok(0);
    }

    print_section("unrestricted", &summary.unrestricted, false);
    print_section("allowlist enabled", &summary.allowlisted, true);
    Ok(0)
}

fn print_section(title: &str, branches: &[BranchSummary], list_classes: bool) {
    println!("  {} ({})", title, branches.len());
    for branch in branches {
        if list_classes {
            let names: Vec<&str> = branch.class_types.iter().map(|c| c.name.as_str()).collect();
            let classes = if names.is_empty() { "-".to_string() } else { names.join(", ") };
            println!("    {:<24} {}", branch.name, classes);
        } else {
            println!("    {:<24} all {} class types", branch.name, branch.class_types.len());
        }
    }
}

pub fn explain(
    ctx: &Context,
    format: OutputFormat,
    member: u64,
    branch: u64,
    class: u64,
) -> anyhow::Result<i32> {
    let decision = ctx.service.explain_class_access_at(
        MemberId::new(member),
        BranchId::new(branch),
        ClassTypeId::new(class),
        ctx.now,
    );
    if !format.print(&decision)? {
        let verdict = if decision.allowed { "ALLOWED" } else { "DENIED" };
        println!("{} (decided by {:?})", verdict, decision.source);
    }
    Ok(0)
}

#[derive(Serialize)]
struct Validation {
    tier_policies: usize,
    branch_override_sets: usize,
    class_override_sets: usize,
    valid: bool,
}

pub fn validate(ctx: &Context, format: OutputFormat) -> anyhow::Result<i32> {
    // Context::build already rejected invalid documents
    let report = Validation {
        tier_policies: ctx.report.tier_policies,
        branch_override_sets: ctx.report.branch_override_sets,
        class_override_sets: ctx.report.class_override_sets,
        valid: true,
    };
    if !format.print(&report)? {
        println!(
            "data file valid: {} tier policies, {} branch override sets, {} class override sets",
            report.tier_policies, report.branch_override_sets, report.class_override_sets
        );
    }
    Ok(0)
}

pub fn export(ctx: &Context, format: OutputFormat) -> anyhow::Result<i32> {
    let doc = StoreDocument::export(ctx.service.policies(), ctx.service.overrides());
    if !format.print(&doc)? {
        println!("{}", doc.to_json()?);
    }
    Ok(0)
}
