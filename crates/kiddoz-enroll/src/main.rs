//! `kiddoz-enroll` - CLI for the KiddoZ enrollment workflow
//!
//! This binary lists care plans, runs a scripted enrollment through the
//! workflow state machine, and inspects stored student records.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;

use kiddoz_enroll::cli::{
    Cli, Command, ConfigCommand, EnrollCommand, PlansCommand, ShowCommand, StudentsCommand,
};
use kiddoz_enroll::workflow::StepId;
use kiddoz_enroll::{
    init_logging, CaptureSlot, CommitOutcome, CommitService, Config, EnrollmentRecord,
    EnrollmentWorkflow, FileDevice, Identity, LogNotifier, Session, SqliteSink, Storage,
    ValidationResult,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Command::Plans(cmd) => handle_plans(&config, &cmd),
        Command::Enroll(cmd) => handle_enroll(&config, &cmd).await,
        Command::Students(cmd) => handle_students(&config, &cmd),
        Command::Show(cmd) => handle_show(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn handle_plans(config: &Config, cmd: &PlansCommand) -> anyhow::Result<()> {
    let catalog = config.catalog()?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(catalog.list_plans())?);
        return Ok(());
    }

    let fallback = &catalog.fallback().id;
    for plan in catalog.list_plans() {
        let marker = if &plan.id == fallback { " (default)" } else { "" };
        println!("{:<10} {}{marker}", plan.id, plan.name);
        println!("           {}", plan.display_price());
        for feature in &plan.features {
            println!("           - {feature}");
        }
    }
    Ok(())
}

async fn handle_enroll(config: &Config, cmd: &EnrollCommand) -> anyhow::Result<()> {
    let catalog = config.catalog()?;
    let storage = Storage::open(config.database_path())?;
    let commit = CommitService::new(Arc::new(SqliteSink::new(storage)), catalog.clone())
        .with_timeout(config.commit_timeout())
        .with_id_generator(config.student_ids());

    let mut identity = Identity::new(cmd.user.clone());
    if let Some(name) = &cmd.display_name {
        identity = identity.with_display_name(name.clone());
    }
    let session = Arc::new(Session::signed_in_as(identity));
    let workflow = EnrollmentWorkflow::new(catalog, commit, session, Arc::new(LogNotifier));

    match &cmd.plan {
        Some(plan_id) => workflow.select_plan(plan_id)?,
        None => {
            workflow.enter_step(StepId::Profile)?;
        }
    }

    let fields = cmd.profile_fields(workflow.profile_prefill());
    if let ValidationResult::Invalid(errors) = workflow.submit_profile(fields)? {
        for (field, reason) in errors.iter() {
            eprintln!("  {field}: {reason}");
        }
        bail!("profile has {} invalid field(s)", errors.len());
    }

    let device = FileDevice::new()
        .with_file(CaptureSlot::Face, &cmd.face)
        .with_file(CaptureSlot::Body, &cmd.body);
    for _ in CaptureSlot::ALL {
        workflow.capture_from(&device).await?;
    }

    let student_id = match workflow.complete_enrollment().await? {
        CommitOutcome::Committed(student_id) => student_id,
        outcome => bail!("enrollment was not submitted: {outcome:?}"),
    };

    if cmd.json {
        let receipt = serde_json::json!({
            "student_id": student_id,
            "guardian_id": cmd.user,
            "state": workflow.state(),
        });
        println!("{}", serde_json::to_string_pretty(&receipt)?);
    } else {
        println!("Enrolled as {student_id}");
    }
    Ok(())
}

fn handle_students(config: &Config, cmd: &StudentsCommand) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    let records = storage.list(cmd.guardian.as_deref(), cmd.limit)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No students enrolled.");
        return Ok(());
    }
    for record in &records {
        println!(
            "{:<8} {:<24} {:<16} {}",
            record.student_id,
            record.profile.name,
            record.plan_name,
            record.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn handle_show(config: &Config, cmd: &ShowCommand) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    let Some(record) = storage.get_by_student_id(&cmd.student_id)? else {
        bail!("no student with id {}", cmd.student_id);
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

fn print_record(record: &EnrollmentRecord) {
    let profile = &record.profile;
    let optional = |value: Option<&str>| value.unwrap_or("-").to_string();

    println!("Student {}", record.student_id);
    println!("---------------");
    println!("Name:          {}", profile.name);
    println!("Age:           {}", profile.age);
    println!("Gender:        {}", profile.gender.as_str());
    println!("Plan:          {} ({})", record.plan_name, record.plan_id);
    println!("Guardian:      {} {}", profile.guardian_name, profile.guardian_phone);
    println!("Account:       {}", record.guardian_id);
    println!("Allergies:     {}", optional(profile.allergies.as_deref()));
    println!(
        "Dietary:       {}",
        optional(profile.dietary_restrictions.as_deref())
    );
    println!("Medical:       {}", optional(profile.medical_conditions.as_deref()));
    println!(
        "Doctor:        {} {}",
        optional(profile.doctor_name.as_deref()),
        optional(profile.doctor_phone.as_deref())
    );
    println!(
        "Emergency:     {} {}",
        optional(profile.emergency_name.as_deref()),
        optional(profile.emergency_phone.as_deref())
    );
    println!();
    println!("[Status]");
    println!("  Temperature:  {}", record.status.temperature);
    println!("  Mood:         {}", record.status.mood);
    println!("  Meal:         {}", record.status.meal);
    println!("  Attendance:   {}", record.status.attendance);
    println!();
    println!("Face scan:     {}", record.face_digest);
    println!("Body scan:     {}", record.body_digest);
    println!("Enrolled:      {}", record.created_at.to_rfc3339());
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Enrollment]");
                println!(
                    "  Student id prefix:  {}",
                    config.enrollment.student_id_prefix
                );
                println!(
                    "  Commit timeout:     {} ms",
                    config.enrollment.commit_timeout_ms
                );
                println!();
                println!("[Catalog]");
                for plan in &config.catalog.plans {
                    println!("  {:<18}  {}", plan.id, plan.display_price());
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("validating configuration")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
