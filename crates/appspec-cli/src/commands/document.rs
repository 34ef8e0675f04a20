use std::io::Read;
use std::path::Path;

use anyhow::Context;
use appspec_core::{AppSpecification, canonicalize, parse_document};
use appspec_form::{FieldLocks, to_client_model};

pub fn parse(path: &Path, format: &str) -> anyhow::Result<()> {
    let spec = AppSpecification::from_file(path)?;

    match format {
        "yaml" => {
            print!("{}", serde_norway::to_string(&spec)?);
        }
        "json" => {
            println!("{}", serde_json::to_string_pretty(&spec)?);
        }
        other => anyhow::bail!("unknown format `{other}` (expected json or yaml)"),
    }

    Ok(())
}

pub fn form(path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let raw = parse_document(&bytes)?;
    let spec = canonicalize(&raw)?;
    let model = to_client_model(&spec, &FieldLocks::declared_in(&raw), None);
    println!("{}", serde_json::to_string_pretty(&model)?);
    Ok(())
}

pub fn encode(path: &Path) -> anyhow::Result<()> {
    let spec = AppSpecification::from_file(path)?;
    println!("{}", appspec_wire::encode_text(&spec));
    eprintln!("fingerprint: {}", appspec_wire::fingerprint(&spec));
    Ok(())
}

pub fn decode(payload: &str) -> anyhow::Result<()> {
    let text = if payload == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read payload from stdin")?;
        buf
    } else {
        payload.to_string()
    };
    let spec = appspec_wire::decode_text(&text)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}
