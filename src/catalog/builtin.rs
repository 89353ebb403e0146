//! Tours shipped with the form builder.

use super::{LayoutApplicability, Placement, Role, Step, Tour, TourCatalog, TourCategory};

use LayoutApplicability::{Both, DesktopOnly, MobileOnly};
use Placement::{Bottom, Center, Left, Right, Top};

const STAFF: &[Role] = &[Role::Admin, Role::Editor];
const ADMIN: &[Role] = &[Role::Admin];
const EVERYONE: &[Role] = &[Role::Admin, Role::Editor, Role::Reviewer, Role::Viewer];
const REVIEWERS: &[Role] = &[Role::Admin, Role::Reviewer];

#[allow(clippy::too_many_arguments)]
fn step(
    id: &str,
    target: &str,
    title: &str,
    content: &str,
    route: Option<&str>,
    placement: Placement,
    roles: &[Role],
    layout: LayoutApplicability,
    order: i32,
) -> Step {
    Step {
        id: id.into(),
        target: target.into(),
        title: title.into(),
        content: content.into(),
        route: route.map(Into::into),
        placement,
        roles: roles.to_vec(),
        layout,
        order,
    }
}

#[rustfmt::skip]
fn welcome_tour() -> Tour {
    Tour {
        id: "welcome-tour".into(),
        name: "Welcome".into(),
        description: "A first look around the workspace".into(),
        roles: EVERYONE.to_vec(),
        category: TourCategory::GettingStarted,
        steps: vec![
            step("intro", "#app-root", "Welcome aboard", "Let's take a quick look around.", Some("dashboard"), Center, EVERYONE, Both, 0),
            step("sidebar", "#sidebar-nav", "Navigation", "Every area of the workspace lives here.", Some("dashboard"), Right, EVERYONE, DesktopOnly, 1),
            step("menu-button", "#mobile-menu", "Menu", "Tap here to reach every area of the workspace.", Some("dashboard"), Bottom, EVERYONE, MobileOnly, 1),
            step("stats", "#dashboard-stats", "At a glance", "Response counts and completion rates for your forms.", Some("dashboard"), Bottom, STAFF, DesktopOnly, 2),
            step("new-form", "#create-form-button", "Create a form", "Start a new form from scratch or a template.", Some("dashboard"), Left, STAFF, Both, 3),
            step("recent", "#recent-forms", "Recent forms", "Pick up where you left off.", Some("dashboard"), Top, EVERYONE, DesktopOnly, 4),
            step("submissions", "#nav-submissions", "Submissions", "Review what respondents sent in.", Some("submissions"), Right, EVERYONE, DesktopOnly, 5),
            step("branding", "#nav-branding", "Branding", "Make forms look like your organisation.", Some("branding"), Right, ADMIN, DesktopOnly, 6),
            step("help", "#help-button", "Need a refresher?", "Restart any tour from the help menu.", None, Left, EVERYONE, MobileOnly, 7),
        ],
    }
}

#[rustfmt::skip]
fn form_builder_tour() -> Tour {
    Tour {
        id: "form-builder-tour".into(),
        name: "Building forms".into(),
        description: "Add fields, configure logic and publish".into(),
        roles: STAFF.to_vec(),
        category: TourCategory::FormBuilding,
        steps: vec![
            step("palette", "#field-palette", "Field palette", "Drag fields onto the canvas.", Some("builder"), Right, STAFF, DesktopOnly, 0),
            step("add-field", "#add-field-button", "Add a field", "Tap to add a field to your form.", Some("builder"), Top, STAFF, MobileOnly, 0),
            step("canvas", "#form-canvas", "Canvas", "Reorder fields by dragging them.", Some("builder"), Left, STAFF, Both, 1),
            step("properties", "#field-properties", "Field settings", "Labels, validation and scoring live here.", Some("builder"), Left, STAFF, DesktopOnly, 2),
            step("preview", "#preview-button", "Preview", "See the form the way respondents will.", Some("builder"), Bottom, STAFF, Both, 3),
            step("publish", "#publish-button", "Publish", "Share the form once it is ready.", Some("builder"), Bottom, STAFF, Both, 4),
        ],
    }
}

#[rustfmt::skip]
fn submissions_tour() -> Tour {
    Tour {
        id: "submissions-tour".into(),
        name: "Reviewing submissions".into(),
        description: "Filter, inspect and export responses".into(),
        roles: REVIEWERS.to_vec(),
        category: TourCategory::Submissions,
        steps: vec![
            step("list", "#submissions-table", "Responses", "Every response to the selected form.", Some("submissions"), Top, REVIEWERS, Both, 0),
            step("filters", "#submission-filters", "Filters", "Narrow responses by date or status.", Some("submissions"), Bottom, REVIEWERS, DesktopOnly, 1),
            step("detail", "#submission-detail", "Detail view", "Open a response to see every answer.", Some("submissions"), Left, REVIEWERS, Both, 2),
            step("export", "#export-button", "Export", "Download responses as CSV.", Some("submissions"), Bottom, ADMIN, DesktopOnly, 3),
        ],
    }
}

#[rustfmt::skip]
fn reports_tour() -> Tour {
    Tour {
        id: "reports-tour".into(),
        name: "Reports".into(),
        description: "Understand trends across submissions".into(),
        roles: vec![Role::Admin, Role::Reviewer, Role::Viewer],
        category: TourCategory::Reporting,
        steps: vec![
            step("charts", "#report-charts", "Charts", "Answer distributions per question.", Some("reports"), Bottom, EVERYONE, Both, 0),
            step("range", "#report-range", "Date range", "Compare periods side by side.", Some("reports"), Bottom, EVERYONE, DesktopOnly, 1),
            step("share", "#share-report", "Share", "Send a read-only link to stakeholders.", Some("reports"), Left, ADMIN, Both, 2),
        ],
    }
}

#[rustfmt::skip]
fn branding_tour() -> Tour {
    Tour {
        id: "branding-tour".into(),
        name: "Branding".into(),
        description: "Logos, colours and custom domains".into(),
        roles: ADMIN.to_vec(),
        category: TourCategory::Administration,
        steps: vec![
            step("logo", "#logo-upload", "Logo", "Upload the logo shown on every form.", Some("branding"), Right, ADMIN, DesktopOnly, 0),
            step("colours", "#theme-colours", "Colours", "Pick primary and accent colours.", Some("branding"), Left, ADMIN, DesktopOnly, 1),
        ],
    }
}

pub fn tours() -> Vec<Tour> {
    vec![
        welcome_tour(),
        form_builder_tour(),
        submissions_tour(),
        reports_tour(),
        branding_tour(),
    ]
}

pub fn catalog() -> TourCatalog {
    // Ids above are unique, so construction never fails.
    TourCatalog::new(tours()).unwrap_or_default()
}
