//! CLI smoke entry point.
//!
//! # Responsibility
//! - Wire registry, collaborators and both managers from environment config.
//! - Print the template catalogue as JSON for quick local sanity checks.

use log::info;
use nodetree_core::db::{open_db, open_db_in_memory};
use nodetree_core::logging::init_from_config;
use nodetree_core::{
    Collaborators, CoreConfig, InMemoryAttributes, InMemoryProjects, InMemoryUsers,
    NodeTreeManager, RegistryFactory, RegistryPermission, SqliteRegistryFactory, TemplateManager,
    TreeError, NODES_COLLECTION, TEMPLATES_COLLECTION,
};
use std::error::Error;
use std::process::ExitCode;
use std::sync::Arc;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("nodetree: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env();
    init_from_config(&config)?;

    let conn = match &config.db_path {
        Some(path) => open_db(path)?,
        None => open_db_in_memory()?,
    };
    let factory = SqliteRegistryFactory::try_new(conn)?;

    // Users, projects and attribute data live outside this crate; the CLI
    // only needs the holder type the default template uses.
    let collaborators = Collaborators::new(
        Arc::new(InMemoryUsers::new()),
        Arc::new(InMemoryProjects::new()),
        Arc::new(InMemoryAttributes::new()),
    );
    let nodes = Arc::new(NodeTreeManager::new(
        factory.get(NODES_COLLECTION, RegistryPermission::ReadWrite),
        collaborators,
    ));
    let templates = TemplateManager::try_new(
        factory.get(TEMPLATES_COLLECTION, RegistryPermission::ReadWrite),
        nodes,
    )?;

    let template_ids = templates.get_all()?;
    info!(
        "event=cli_start module=cli status=ok templates={}",
        template_ids.len()
    );

    println!("nodetree_core version={}", nodetree_core::core_version());
    println!("default_template={}", templates.default_template_id());
    for template_id in template_ids {
        match templates.get(template_id) {
            Ok(view) => println!("{}", serde_json::to_string(&view)?),
            // Attribute data is not persisted by the in-memory store, so
            // trees from an earlier run have structure but no attributes.
            Err(TreeError::AttributeNotFound(node_id)) => {
                println!("template={template_id} attributes_unavailable node_id={node_id}")
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
