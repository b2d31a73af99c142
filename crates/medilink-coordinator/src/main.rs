//! CLI entry point for the Medilink coordinator.

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};

use chrono::NaiveDate;
use medilink_coordinator::{ClinicConfig, ConsultationRequest, Coordinator};
use medilink_core::types::{EntityPatch, NewAdmin, NewDoctor, NewPatient, Specialty};
use medilink_core::{ConsultationStatus, EntityId, NewRecord, RecordKind};
use medilink_entity::JsonEntityStore;
use medilink_graph::{GraphClient, GraphConfig};

#[derive(Parser)]
#[command(name = "medilink")]
#[command(about = "Dual-store medical records and consultation scheduling")]
struct Cli {
    /// Config file prefix (default: medilink).
    #[arg(short, long, default_value = "medilink")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a patient.
    CreatePatient {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        /// Credential hash produced by the auth front end.
        #[arg(long)]
        password_hash: String,
        /// Birth date, YYYY-MM-DD.
        #[arg(long)]
        birth_date: String,
        #[arg(long)]
        condition: Option<String>,
        #[arg(long)]
        condition_notes: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Register a doctor.
    CreateDoctor {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password_hash: String,
        /// One of the closed specialty set, e.g. cardiology.
        #[arg(long)]
        specialty: String,
    },
    /// Register an admin.
    CreateAdmin {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password_hash: String,
    },
    /// Assign a doctor to a patient (last writer wins).
    Assign { patient: String, doctor: String },
    /// Schedule a consultation.
    Schedule {
        patient: String,
        doctor: String,
        /// Start time, "YYYY-MM-DD HH:MM", server-local.
        #[arg(long)]
        start: String,
        #[arg(long)]
        duration_minutes: Option<i64>,
        #[arg(long)]
        description: Option<String>,
        /// Initial status: requested (default) or scheduled.
        #[arg(long)]
        status: Option<String>,
    },
    /// Move a consultation to a new status.
    Transition { consultation: String, status: String },
    /// List consultations for one participant, ordered by start.
    Consultations {
        #[arg(long)]
        patient: Option<String>,
        #[arg(long)]
        doctor: Option<String>,
    },
    /// Show one record with its graph relationships.
    Show { kind: String, id: String },
    /// List records of one kind.
    List { kind: String },
    /// Update fields of a record.
    Update {
        kind: String,
        id: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password_hash: Option<String>,
        #[arg(long)]
        specialty: Option<String>,
        #[arg(long)]
        birth_date: Option<String>,
        #[arg(long)]
        condition: Option<String>,
        #[arg(long)]
        condition_notes: Option<String>,
        #[arg(long)]
        phone: Option<String>,
    },
    /// Delete a record, if nothing depends on it.
    Delete { kind: String, id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();

    let cli = Cli::parse();
    let clinic = load_clinic_config(&cli.config)?;
    let graph_config = load_graph_config(&cli.config);

    let graph = GraphClient::connect(&graph_config).await?;
    let entities = JsonEntityStore::new(&clinic.records_dir)?;
    let coordinator = Coordinator::new(entities, graph, &clinic);

    match cli.command {
        Command::CreatePatient {
            first_name,
            last_name,
            email,
            password_hash,
            birth_date,
            condition,
            condition_notes,
            phone,
        } => {
            let draft = NewRecord::Patient(NewPatient {
                first_name,
                last_name,
                email,
                password_hash,
                birth_date: parse_birth_date(&birth_date)?,
                condition,
                condition_notes,
                phone,
            });
            print_json(&coordinator.create_entity(draft).await?)
        }
        Command::CreateDoctor {
            first_name,
            last_name,
            email,
            password_hash,
            specialty,
        } => {
            let draft = NewRecord::Doctor(NewDoctor {
                first_name,
                last_name,
                email,
                password_hash,
                specialty: parse_specialty(&specialty)?,
            });
            print_json(&coordinator.create_entity(draft).await?)
        }
        Command::CreateAdmin {
            first_name,
            last_name,
            email,
            password_hash,
        } => {
            let draft = NewRecord::Admin(NewAdmin {
                first_name,
                last_name,
                email,
                password_hash,
            });
            print_json(&coordinator.create_entity(draft).await?)
        }
        Command::Assign { patient, doctor } => {
            let patient = EntityId::from(patient.as_str());
            let doctor = EntityId::from(doctor.as_str());
            coordinator.assign_doctor(&patient, &doctor).await?;
            print_json(&serde_json::json!({ "patient": patient, "assigned_to": doctor }))
        }
        Command::Schedule {
            patient,
            doctor,
            start,
            duration_minutes,
            description,
            status,
        } => {
            let initial_status = status.as_deref().map(parse_status).transpose()?;
            let request = ConsultationRequest {
                patient_id: EntityId::from(patient.as_str()),
                doctor_id: EntityId::from(doctor.as_str()),
                start,
                duration_minutes,
                description,
                initial_status,
            };
            print_json(&coordinator.create_consultation(request).await?)
        }
        Command::Transition {
            consultation,
            status,
        } => {
            let id = EntityId::from(consultation.as_str());
            let status = parse_status(&status)?;
            print_json(&coordinator.transition_consultation(&id, status).await?)
        }
        Command::Consultations { patient, doctor } => {
            let (kind, id) = match (patient, doctor) {
                (Some(id), None) => (RecordKind::Patient, id),
                (None, Some(id)) => (RecordKind::Doctor, id),
                _ => anyhow::bail!("specify exactly one of --patient or --doctor"),
            };
            let id = EntityId::from(id.as_str());
            print_json(&coordinator.list_consultations_for(kind, &id).await?)
        }
        Command::Show { kind, id } => {
            let kind = parse_kind(&kind)?;
            let id = EntityId::from(id.as_str());
            print_json(&coordinator.get_entity(kind, &id).await?)
        }
        Command::List { kind } => {
            let kind = parse_kind(&kind)?;
            print_json(&coordinator.list_entities(kind)?)
        }
        Command::Update {
            kind,
            id,
            first_name,
            last_name,
            email,
            password_hash,
            specialty,
            birth_date,
            condition,
            condition_notes,
            phone,
        } => {
            let kind = parse_kind(&kind)?;
            let id = EntityId::from(id.as_str());
            let patch = EntityPatch {
                first_name,
                last_name,
                email,
                password_hash,
                specialty: specialty.as_deref().map(parse_specialty).transpose()?,
                birth_date: birth_date.as_deref().map(parse_birth_date).transpose()?,
                condition,
                condition_notes,
                phone,
            };
            print_json(&coordinator.update_entity(kind, &id, patch).await?)
        }
        Command::Delete { kind, id } => {
            let kind = parse_kind(&kind)?;
            let id = EntityId::from(id.as_str());
            coordinator.delete_entity(kind, &id).await?;
            print_json(&serde_json::json!({ "deleted": id }))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_kind(s: &str) -> anyhow::Result<RecordKind> {
    match s {
        "patient" => Ok(RecordKind::Patient),
        "doctor" => Ok(RecordKind::Doctor),
        "admin" => Ok(RecordKind::Admin),
        "consultation" => Ok(RecordKind::Consultation),
        _ => anyhow::bail!("Invalid kind: {s}. Choose: patient, doctor, admin, consultation"),
    }
}

fn parse_specialty(s: &str) -> anyhow::Result<Specialty> {
    Specialty::parse(s).ok_or_else(|| {
        let options: Vec<&str> = Specialty::ALL.iter().map(|sp| sp.as_str()).collect();
        anyhow::anyhow!("Invalid specialty: {s}. Choose one of: {}", options.join(", "))
    })
}

fn parse_status(s: &str) -> anyhow::Result<ConsultationStatus> {
    ConsultationStatus::parse(s).ok_or_else(|| {
        let options: Vec<&str> = ConsultationStatus::ALL.iter().map(|st| st.as_str()).collect();
        anyhow::anyhow!("Invalid status: {s}. Choose one of: {}", options.join(", "))
    })
}

fn parse_birth_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| anyhow::anyhow!("Invalid birth date: {s}. Expected YYYY-MM-DD"))
}

fn load_clinic_config(file_prefix: &str) -> anyhow::Result<ClinicConfig> {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("MEDILINK")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    match cfg.get::<ClinicConfig>("clinic") {
        Ok(c) => Ok(c),
        Err(_) => Ok(ClinicConfig::default()),
    }
}

fn load_graph_config(file_prefix: &str) -> GraphConfig {
    let cfg = config::Config::builder()
        .add_source(config::File::with_name(file_prefix).required(false))
        .add_source(
            config::Environment::with_prefix("MEDILINK")
                .separator("__")
                .try_parsing(true),
        )
        .build();

    match cfg {
        Ok(c) => GraphConfig {
            uri: c
                .get_string("neo4j.uri")
                .unwrap_or_else(|_| "bolt://localhost:7687".to_string()),
            user: c
                .get_string("neo4j.user")
                .unwrap_or_else(|_| "neo4j".to_string()),
            password: c
                .get_string("neo4j.password")
                .unwrap_or_else(|_| "medilink-dev".to_string()),
            ..Default::default()
        },
        Err(_) => GraphConfig::default(),
    }
}
