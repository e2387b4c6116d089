//! Exam Form Filler
//!
//! Fills one template from a template directory with applicant data and
//! writes the result under `output/filled-pdfs`.
//!
//! Usage:
//!   cargo run -p form-fill --example fill_form -- \
//!     <templates-dir> <font.ttf> <template-id> <input.json> [options.json]
//!
//! Examples:
//!   cargo run -p form-fill --example fill_form -- \
//!     public/pdfs fonts/Amiri-Regular.ttf car-public input/applicant.json
//!   RUST_LOG=debug cargo run -p form-fill --example fill_form -- \
//!     public/pdfs fonts/Amiri-Regular.ttf motorcycle-exam input/applicant.json

use anyhow::{bail, Context};
use form_fill::{
    suggested_filename, ArtifactSink, DataRecord, DirectoryStore, FillEngine, FillOptions,
    FilledArtifact, OutputDirectory, TemplateStore,
};
use std::fs;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 5 {
        eprintln!(
            "Usage: {} <templates-dir> <font.ttf> <template-id> <input.json> [options.json]",
            args[0]
        );
        std::process::exit(1);
    }
    let (root, font, template_id, input) = (&args[1], &args[2], &args[3], &args[4]);

    let store = DirectoryStore::new(root, font);
    let available = store
        .template_ids()
        .with_context(|| format!("reading template directory {root}"))?;
    if !available.iter().any(|id| id == template_id) {
        bail!("unknown template {template_id:?}; available: {}", available.join(", "));
    }

    let options = match args.get(5) {
        Some(path) => FillOptions::from_json(&fs::read_to_string(path)?)?,
        None => FillOptions::default(),
    };

    let mut data = DataRecord::from_json(&fs::read_to_string(input)?)?;
    // The schema is optional; without it the input is used as given
    let form_type = match store.schema(template_id) {
        Ok(schema) => {
            data.coerce(&schema);
            let missing: Vec<&str> = schema
                .required_ids()
                .filter(|id| data.value(id).is_none())
                .collect();
            if !missing.is_empty() {
                log::warn!("required fields without a value: {}", missing.join(", "));
            }
            schema.form_type
        }
        Err(e) => {
            log::warn!("no schema for {template_id}: {e}");
            None
        }
    };

    let engine = FillEngine::new(options);
    let filled = match engine.fill_from_store(&store, template_id, &data) {
        Ok(filled) => filled,
        Err(e) => bail!("{}: {e}", e.localized_message()),
    };
    for (id, reason) in &filled.report.skipped {
        println!("  skipped {id}: {reason}");
    }

    let today = chrono::Local::now().date_naive();
    let filename = suggested_filename(form_type.as_deref(), template_id, today, &data);
    let path = OutputDirectory::default().deliver(&FilledArtifact::new(filled.bytes, filename))?;

    println!(
        "Filled {} field(s) of {template_id} -> {}",
        filled.report.drawn,
        path.display()
    );
    Ok(())
}
