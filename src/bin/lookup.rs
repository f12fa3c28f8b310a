use anyhow::Result;
use clap::{Parser, ValueEnum};
use relreg::db::Db;
use relreg::registry::{lookup_relationships, Associativity, FilterSpec, LookupRequest, SubjectId};
use relreg::Config;
use std::time::Instant;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Role {
    Source,
    Destination,
    Either,
}

#[derive(Parser, Debug)]
#[command(name = "lookup")]
#[command(about = "Print the relationships of one registry entity as JSON")]
struct Args {
    /// Subject entity id
    entity_id: i64,

    /// Restrict to a relationship type (repeatable)
    #[arg(short = 't', long = "type")]
    relationship_types: Vec<String>,

    /// Restrict the counter-party's entity type, e.g. HOSPITAL or EMS (repeatable)
    #[arg(short, long = "entity-type")]
    entity_types: Vec<String>,

    /// Role the subject must play
    #[arg(short, long, value_enum, default_value = "either")]
    associativity: Role,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default()
            .filter_or("RUST_LOG", "warn")
    ).init();

    let args = Args::parse();
    let config = Config::load()?;
    let db = Db::new(config.db_path());

    let associativity = match args.associativity {
        Role::Source => Associativity::Source,
        Role::Destination => Associativity::Destination,
        Role::Either => Associativity::Either,
    };

    let filter = FilterSpec::default()
        .with_relationship_types(args.relationship_types)?
        .with_entity_type_tags(&args.entity_types)?
        .with_associativity(associativity);
    let request = LookupRequest::new(SubjectId::new(args.entity_id)?, filter);

    let start = Instant::now();
    let output = lookup_relationships(&db, request).await?;
    log::info!("Lookup took {:?}", start.elapsed());

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
