//! Line-oriented host that drives a [`TourController`] over a headless
//! document. Commands are read from stdin; routes, toasts and overlay
//! placement are printed as they happen.

use std::{io::Write, str::FromStr, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::{
    analytics::Feedback,
    catalog::{Layout, Role, TourCatalog},
    geometry::Rect,
    spotlight::HeadlessDocument,
    tour::{TourController, TourSnapshot, TourStatus},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Role(Role),
    Layout(Layout),
    Viewport { width: f64, height: f64 },
    Start(String),
    Restart(String),
    Next,
    Prev,
    Skip,
    Pause,
    Resume,
    /// Dismiss without completing.
    End,
    /// End and mark complete.
    Finish,
    Feedback { tour_id: String, feedback: Feedback },
    Tours,
    Progress(String),
    Status,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            bail!("empty command");
        };
        let args: Vec<&str> = words.collect();

        let command = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("role", [role]) => Command::Role(role.parse()?),
            ("layout", [layout]) => Command::Layout(layout.parse()?),
            ("viewport", [width, height]) => Command::Viewport {
                width: parse_px(width)?,
                height: parse_px(height)?,
            },
            ("start", [tour_id]) => Command::Start(tour_id.to_string()),
            ("restart", [tour_id]) => Command::Restart(tour_id.to_string()),
            ("next", []) => Command::Next,
            ("prev" | "back", []) => Command::Prev,
            ("skip", []) => Command::Skip,
            ("pause", []) => Command::Pause,
            ("resume", []) => Command::Resume,
            ("end", []) => Command::End,
            ("finish", []) => Command::Finish,
            ("feedback", [tour_id, verdict]) => Command::Feedback {
                tour_id: tour_id.to_string(),
                feedback: parse_feedback(verdict)?,
            },
            ("tours", []) => Command::Tours,
            ("progress", [tour_id]) => Command::Progress(tour_id.to_string()),
            ("status", []) => Command::Status,
            ("help" | "?", []) => Command::Help,
            ("quit" | "exit", []) => Command::Quit,
            (other, _) => bail!("unrecognised command '{other}' (try 'help')"),
        };
        Ok(command)
    }
}

fn parse_px(value: &str) -> Result<f64> {
    let px: f64 = value
        .parse()
        .with_context(|| format!("'{value}' is not a number"))?;
    if !px.is_finite() || px <= 0.0 {
        bail!("viewport sizes must be positive");
    }
    Ok(px)
}

fn parse_feedback(value: &str) -> Result<Feedback> {
    match value.to_ascii_lowercase().as_str() {
        "up" | "yes" | "positive" | "+" => Ok(Feedback::Positive),
        "down" | "no" | "negative" | "-" => Ok(Feedback::Negative),
        other => Err(anyhow!("feedback must be 'up' or 'down', got '{other}'")),
    }
}

const HELP: &str = "\
commands:
  role <admin|editor|reviewer|viewer>   set the signed-in role
  layout <desktop|mobile>               force a layout
  viewport <width> <height>             resize the document
  start <tour> | restart <tour>         begin a tour
  next | prev | skip                    move through steps
  pause | resume                        suspend the active tour
  end | finish                          dismiss or complete the tour
  feedback <tour> <up|down>             rate the latest run
  tours | progress <tour> | status      inspect
  quit";

pub struct Repl {
    controller: TourController,
    document: Arc<HeadlessDocument>,
}

impl Repl {
    pub fn new(controller: TourController, document: Arc<HeadlessDocument>) -> Self {
        controller.set_navigation_callback(Some(Arc::new(|route: &str| {
            println!("-> navigate to /{route}");
        })));
        controller.set_notifier(Some(Arc::new(|message: &str| {
            println!("!! {message}");
        })));
        Self {
            controller,
            document,
        }
    }

    /// Lays every target in `catalog` out down the page so selectors resolve.
    pub fn seed_targets(document: &HeadlessDocument, catalog: &TourCatalog) {
        let mut top = 80.0;
        for tour in catalog.tours() {
            for step in &tour.steps {
                if document.element(&step.target).is_none() {
                    document.set_element(&step.target, Rect::new(top, 240.0, 320.0, 56.0));
                    top += 96.0;
                }
            }
        }
    }

    pub async fn run<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        println!("{HELP}");
        let mut lines = input.lines();
        loop {
            prompt();
            let Some(line) = lines.next_line().await.context("failed to read input")? else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(err) => {
                    println!("error: {err:#}");
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }
            println!("{}", self.execute(command).await);
        }
        info!("Interactive host finished");
        Ok(())
    }

    pub async fn execute(&self, command: Command) -> String {
        let controller = &self.controller;
        match command {
            Command::Role(role) => describe(&controller.set_user_role(role).await),
            Command::Layout(layout) => describe(&controller.set_layout(layout).await),
            Command::Viewport { width, height } => {
                self.document.resize(width, height);
                describe(&controller.set_viewport_width(width).await)
            }
            Command::Start(tour_id) => match controller.start_tour(&tour_id).await {
                Ok(snapshot) => describe(&snapshot),
                Err(err) => format!("error: {err}"),
            },
            Command::Restart(tour_id) => match controller.restart_tour(&tour_id).await {
                Ok(snapshot) => describe(&snapshot),
                Err(err) => format!("error: {err}"),
            },
            Command::Next => describe(&controller.next_step().await),
            Command::Prev => describe(&controller.prev_step().await),
            Command::Skip => describe(&controller.skip_step().await),
            Command::Pause => describe(&controller.pause_tour().await),
            Command::Resume => describe(&controller.resume_tour().await),
            Command::End => describe(&controller.end_tour(false).await),
            Command::Finish => describe(&controller.end_tour(true).await),
            Command::Feedback { tour_id, feedback } => {
                if controller.submit_feedback(&tour_id, feedback).await {
                    "thanks for the feedback".to_string()
                } else {
                    format!("no runs of '{tour_id}' to rate")
                }
            }
            Command::Tours => {
                let tours = controller.get_available_tours().await;
                if tours.is_empty() {
                    return "no tours available (set a role first)".to_string();
                }
                let mut out = Vec::with_capacity(tours.len());
                for tour in tours {
                    let done = controller
                        .get_tour_progress(&tour.id)
                        .await
                        .is_some_and(|progress| progress.completed);
                    out.push(format!(
                        "{} {:<20} {}",
                        if done { "[x]" } else { "[ ]" },
                        tour.id,
                        tour.name
                    ));
                }
                out.join("\n")
            }
            Command::Progress(tour_id) => match controller.get_tour_progress(&tour_id).await {
                Some(progress) => to_json(&progress),
                None => format!("unknown tour '{tour_id}'"),
            },
            Command::Status => {
                let mut out = describe(&controller.snapshot().await);
                if let Some(overlay) = controller.overlay().await {
                    out.push('\n');
                    out.push_str(&to_json(&overlay));
                }
                out
            }
            Command::Help => HELP.to_string(),
            Command::Quit => String::new(),
        }
    }
}

fn describe(snapshot: &TourSnapshot) -> String {
    let role = snapshot.role.map(|role| role.as_str()).unwrap_or("none");
    let head = format!("role={role} layout={}", snapshot.layout);

    match (&snapshot.tour, &snapshot.step) {
        (Some(tour), Some(step)) => format!(
            "{head} | {} {}/{} '{}'{}",
            tour.id,
            snapshot.state.current_step_index + 1,
            snapshot.total_steps,
            step.title,
            if snapshot.status == TourStatus::Paused {
                " (paused)"
            } else {
                ""
            }
        ),
        _ => format!(
            "{head} | idle, completed: [{}]",
            snapshot
                .state
                .completed_tours
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|err| format!("<unprintable: {err}>"))
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}
