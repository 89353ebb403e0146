use crate::catalog::{Layout, Role, Step, Tour};

/// Steps of `tour` visible to `role` at `layout`, ordered by `order`.
///
/// `sort_by_key` is stable, so steps sharing an `order` keep their
/// declaration order.
pub fn select_steps(tour: &Tour, role: Role, layout: Layout) -> Vec<Step> {
    let mut steps: Vec<Step> = tour
        .steps
        .iter()
        .filter(|step| step.is_eligible(role, layout))
        .cloned()
        .collect();
    steps.sort_by_key(|step| step.order);
    steps
}
