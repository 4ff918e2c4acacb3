use campus_tnp::config::PlacementConfig;
use campus_tnp::error::AppError;
use campus_tnp::workflows::placement::{
    Actor, Application, ApplicationStatus, BranchId, DriveDraft, DriveId, NoticeDraft,
    PlacementError, PlacementService, ReportRenderer, Role, SeedFile, TransitionMode,
};
use chrono::{Duration, Utc};
use clap::Args;
use std::path::PathBuf;

use crate::infra::PlacementStack;

const BUNDLED_SEED: &str = include_str!("../seed/demo-seed.json");

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Seed file to use instead of the bundled sample campus.
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
    /// Enforce the APPLIED -> SHORTLISTED -> SELECTED|REJECTED transition table.
    #[arg(long)]
    pub(crate) strict: bool,
    /// Minimum average marks for the demo drive.
    #[arg(long, default_value_t = 60.0)]
    pub(crate) min_marks: f64,
    /// Restrict the demo drive to these branch ids (comma separated).
    #[arg(long, value_delimiter = ',')]
    pub(crate) branches: Vec<String>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let seed = match &args.seed {
        Some(path) => SeedFile::from_path(path)?,
        None => SeedFile::from_json(BUNDLED_SEED)?,
    };

    let config = PlacementConfig {
        transitions: if args.strict {
            TransitionMode::Strict
        } else {
            TransitionMode::Permissive
        },
        ..PlacementConfig::default()
    };
    let stack = PlacementStack::in_memory(&config, Some(&seed))?;
    let placement = stack.state.placement.clone();
    let officer = Actor::new("tpo-1", Role::Admin);

    println!("== Campus TnP demo ({:?} transitions) ==", config.transitions);

    let notice = stack.state.notices.create(
        &officer,
        NoticeDraft {
            title: "Pre-placement talk".to_string(),
            description: "Northwind engineers present at 10:00 in the seminar hall".to_string(),
            deadline: None,
        },
    );
    report_outcome("Notice posted", notice.map(|notice| notice.title));

    let draft = DriveDraft {
        title: "Northwind graduate hiring".to_string(),
        description: "Online test followed by two interviews".to_string(),
        deadline: Some(Utc::now() + Duration::days(14)),
        company_name: "Northwind".to_string(),
        job_role: "Associate Engineer".to_string(),
        eligible_branches: args
            .branches
            .iter()
            .map(|branch| BranchId(branch.trim().to_string()))
            .collect(),
        min_marks: Some(args.min_marks),
        ..DriveDraft::default()
    };
    let drive = match placement.create_drive(&officer, draft, None) {
        Ok(drive) => drive,
        Err(err) => {
            println!("Drive could not be created: {err}");
            return Ok(());
        }
    };
    println!(
        "Drive {} posted: {} ({}), min marks {:.2}",
        drive.id.0, drive.company_name, drive.job_role, args.min_marks
    );

    println!("\n-- Applications --");
    let mut accepted = Vec::new();
    for student in &seed.students {
        let actor = Actor::new(student.id.0.clone(), Role::Student);
        match placement.apply(&actor, &drive.id, None) {
            Ok(application) => {
                println!(
                    "  {:<12} applied with average {:.2}",
                    student.name, application.marks
                );
                accepted.push(application);
            }
            Err(err) => println!("  {:<12} rejected: {err}", student.name),
        }
    }

    println!("\n-- Shortlisting --");
    report_outcome(
        "Applications shortlisted",
        placement.shortlist(&officer, &drive.id),
    );

    if let Some(first) = accepted.first() {
        select(&placement, &officer, &drive.id, first);
    }

    println!("\n-- Export (SELECTED) --");
    let rows = placement.export_applications(&officer, &drive.id, "selected");
    match rows.and_then(|rows| Ok(stack.state.csv.render(&rows)?)) {
        Ok(bytes) => print!("{}", String::from_utf8_lossy(&bytes)),
        Err(err) => println!("Export failed: {err}"),
    }

    Ok(())
}

fn select(
    placement: &PlacementService,
    officer: &Actor,
    drive_id: &DriveId,
    application: &Application,
) {
    let outcome = placement.update_application_status(
        officer,
        drive_id,
        &application.id,
        ApplicationStatus::Selected,
    );
    report_outcome(
        &format!("Selected {}", application.student_id.0),
        outcome.map(|updated| updated.status.label()),
    );
}

fn report_outcome<T: std::fmt::Debug>(label: &str, outcome: Result<T, PlacementError>) {
    match outcome {
        Ok(value) => println!("{label}: {value:?}"),
        Err(err) => println!("{label} failed: {err}"),
    }
}
