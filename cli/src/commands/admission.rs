//! Admission commands
//!
//! Exit code 0 when admitted, 2 when denied.

use super::Context;
use crate::output::OutputFormat;
use fit_common::{BranchId, ClassTypeId, MemberId};
use serde::Serialize;

const DENIED: i32 = 2;

#[derive(Serialize)]
struct Admission {
    member_id: MemberId,
    branch_id: BranchId,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_type_id: Option<ClassTypeId>,
    allowed: bool,
}

impl Admission {
    fn render(&self, format: OutputFormat) -> anyhow::Result<i32> {
        if !format.print(self)? {
            let verdict = if self.allowed { "ALLOWED" } else { "DENIED" };
            match self.class_type_id {
                Some(class) => println!("{} {} {} at {}", verdict, self.member_id, class, self.branch_id),
                None => println!("{} {} at {}", verdict, self.member_id, self.branch_id),
            }
        }
        Ok(if self.allowed { 0 } else { DENIED })
    }
}

pub fn check_in(ctx: &Context, format: OutputFormat, member: u64, branch: u64) -> anyhow::Result<i32> {
    let (member_id, branch_id) = (MemberId::new(member), BranchId::new(branch));
    Admission {
        member_id,
        branch_id,
        class_type_id: None,
        allowed: ctx.service.is_allowed_at_branch_at(member_id, branch_id, ctx.now),
    }
    .render(format)
}

pub fn book(
    ctx: &Context,
    format: OutputFormat,
    member: u64,
    branch: u64,
    class: u64,
) -> anyhow::Result<i32> {
    let (member_id, branch_id, class_type_id) =
        (MemberId::new(member), BranchId::new(branch), ClassTypeId::new(class));
    Admission {
        member_id,
        branch_id,
        class_type_id: Some(class_type_id),
        allowed: ctx
            .service
            .is_allowed_for_class_at(member_id, branch_id, class_type_id, ctx.now),
    }
    .render(format)
}
