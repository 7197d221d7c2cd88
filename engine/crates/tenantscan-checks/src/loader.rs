//! Checklist loader - semicolon-delimited table of scan entries
//!
//! ```text
//! id;name;type;command;check;applies_if_empty
//! 1.1;Audit log enabled;ps;Get-AdminAuditLogConfig;UnifiedAuditLogIngestionEnabled\s*:\s*True;True
//! 2.4;Secure transfer;az;storage account list --query [*].enableHttpsTrafficOnly;True;False
//! ```

use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tenantscan_core::{parse_flag, Error, Result, ScanKind, ScanSpec};
use tracing::{debug, info, warn};

/// Columns every checklist must carry
pub const REQUIRED_COLUMNS: [&str; 5] = ["id", "name", "type", "command", "check"];

const APPLIES_IF_EMPTY: &str = "applies_if_empty";

/// Load a checklist file
pub fn load_checklist(path: impl AsRef<Path>) -> Result<Vec<ScanSpec>> {
    let path = path.as_ref();
    info!("Reading checklist from: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Checklist(format!("cannot read {}: {}", path.display(), e))
    })?;
    let specs = parse_checklist(&content)?;

    info!("Loaded {} checklist entries", specs.len());
    Ok(specs)
}

/// Parse checklist content: header row, then one entry per row
pub fn parse_checklist(content: &str) -> Result<Vec<ScanSpec>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| Error::Checklist(e.to_string()))?
        .clone();
    let header_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_lowercase(), i))
        .collect();

    let missing: Vec<_> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !header_map.contains_key(**column))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(Error::Checklist(format!(
            "missing column(s): {}",
            missing.join(", ")
        )));
    }

    let mut specs = Vec::new();
    let mut seen = HashSet::new();

    for (index, result) in reader.records().enumerate() {
        // Header is line 1
        let line = index + 2;
        let record = result.map_err(|e| Error::Checklist(format!("line {}: {}", line, e)))?;

        if record.iter().all(str::is_empty) {
            continue;
        }

        let spec = build_spec(&record, &headers, &header_map);
        if !seen.insert(spec.id.clone()) {
            warn!(
                "Duplicate checklist id {} on line {}: the later entry replaces the earlier one in the report",
                spec.id, line
            );
        }
        if let ScanKind::Unknown(kind) = &spec.kind {
            warn!("Entry {} has an unsupported type {:?}", spec.id, kind);
        }
        debug!("Loaded entry {} ({})", spec.id, spec.kind);
        specs.push(spec);
    }

    Ok(specs)
}

fn build_spec(
    record: &StringRecord,
    headers: &StringRecord,
    header_map: &HashMap<String, usize>,
) -> ScanSpec {
    let field = |name: &str| get_field(record, header_map, name);

    let mut spec = ScanSpec::new(
        field("id"),
        field("name"),
        ScanKind::parse(&field("type")),
        field("command"),
        &field("check"),
    );

    if header_map.contains_key(APPLIES_IF_EMPTY) {
        spec = spec.with_applies_if_empty(parse_flag(&field(APPLIES_IF_EMPTY)));
    }

    for (i, header) in headers.iter().enumerate() {
        let key = header.to_lowercase();
        if REQUIRED_COLUMNS.contains(&key.as_str()) || key == APPLIES_IF_EMPTY {
            continue;
        }
        spec = spec.with_extra(header, record.get(i).unwrap_or(""));
    }

    spec
}

fn get_field(record: &StringRecord, header_map: &HashMap<String, usize>, name: &str) -> String {
    header_map
        .get(name)
        .and_then(|&i| record.get(i))
        .unwrap_or("")
        .to_string()
}
