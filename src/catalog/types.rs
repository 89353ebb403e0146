//! Tour catalog data model.
//!
//! Tours and steps are immutable once loaded; the engine only ever reads them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    Editor,
    Reviewer,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Reviewer => "reviewer",
            Role::Viewer => "viewer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "editor" => Ok(Role::Editor),
            "reviewer" => Ok(Role::Reviewer),
            "viewer" => Ok(Role::Viewer),
            other => Err(anyhow!("unknown role '{other}'")),
        }
    }
}

/// Coarse viewport class pushed in by the host on every resize.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Layout {
    Desktop,
    Mobile,
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Desktop
    }
}

impl Layout {
    /// Widths strictly below the breakpoint are mobile.
    pub fn from_viewport_width(width: f64, breakpoint: f64) -> Self {
        if width < breakpoint {
            Layout::Mobile
        } else {
            Layout::Desktop
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layout::Desktop => "desktop",
            Layout::Mobile => "mobile",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "desktop" => Ok(Layout::Desktop),
            "mobile" => Ok(Layout::Mobile),
            other => Err(anyhow!("unknown layout '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum LayoutApplicability {
    DesktopOnly,
    MobileOnly,
    Both,
}

impl LayoutApplicability {
    pub fn applies_to(&self, layout: Layout) -> bool {
        matches!(
            (self, layout),
            (LayoutApplicability::Both, _)
                | (LayoutApplicability::DesktopOnly, Layout::Desktop)
                | (LayoutApplicability::MobileOnly, Layout::Mobile)
        )
    }
}

impl Default for LayoutApplicability {
    fn default() -> Self {
        LayoutApplicability::Both
    }
}

/// Side of the highlighted element the instruction card prefers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Placement {
    Top,
    Bottom,
    Left,
    Right,
    Center,
}

impl Default for Placement {
    fn default() -> Self {
        Placement::Bottom
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TourCategory {
    GettingStarted,
    FormBuilding,
    Submissions,
    Reporting,
    Administration,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    /// Opaque to the engine; resolved by the geometry host.
    pub target: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub placement: Placement,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub layout: LayoutApplicability,
    pub order: i32,
}

impl Step {
    pub fn is_eligible(&self, role: Role, layout: Layout) -> bool {
        self.roles.contains(&role) && self.layout.applies_to(layout)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: String,
    pub name: String,
    pub description: String,
    pub roles: Vec<Role>,
    pub category: TourCategory,
    pub steps: Vec<Step>,
}

impl Tour {
    pub fn allows(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
