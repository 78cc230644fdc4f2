//! Column mapping from a raw table to a [`RawRecording`].
//!
//! Header matching is case-insensitive and ignores a trailing unit suffix,
//! so `Acc_X [g]` and `acc_x (m/s2)` both normalize to `acc_x`.

use crate::config::{MachineProfile, ReferenceConvention};
use crate::error::{AnalysisError, AnalysisResult};
use crate::types::{RawRecording, RawSample, RawTable, ReferenceKind};

const TIME_ALIASES: &[&str] = &["time", "timestamp", "t", "time_s", "seconds"];
const RPM_ALIASES: &[&str] = &["rpm", "speed", "speed_rpm", "shaft_rpm"];
const PULSE_ALIASES: &[&str] = &["tach", "tacho", "pulse", "pulses", "encoder", "keyphasor"];

/// Lowercased header with any `[unit]` / `(unit)` suffix removed.
pub fn normalize_header(header: &str) -> String {
    let trimmed = header.trim();
    let cut = trimmed
        .find(['[', '('])
        .map_or(trimmed, |idx| &trimmed[..idx]);
    cut.trim().to_lowercase()
}

fn find_column(normalized: &[String], wanted: &str) -> Option<usize> {
    let wanted = normalize_header(wanted);
    normalized.iter().position(|h| *h == wanted)
}

fn find_alias(normalized: &[String], aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|a| find_column(normalized, a))
}

fn aliases_for(convention: ReferenceConvention) -> &'static [&'static str] {
    match convention {
        ReferenceConvention::Rpm => RPM_ALIASES,
        ReferenceConvention::Pulses => PULSE_ALIASES,
    }
}

/// Reference column and the convention it is read with. A named column is
/// read with the profile's convention; otherwise the profile's aliases are
/// tried first, then the other convention's.
fn find_reference(
    normalized: &[String],
    profile: &MachineProfile,
) -> Option<(usize, ReferenceConvention)> {
    if let Some(name) = &profile.reference_column {
        return find_column(normalized, name).map(|idx| (idx, profile.reference));
    }
    let other = match profile.reference {
        ReferenceConvention::Rpm => ReferenceConvention::Pulses,
        ReferenceConvention::Pulses => ReferenceConvention::Rpm,
    };
    [profile.reference, other]
        .into_iter()
        .find_map(|c| find_alias(normalized, aliases_for(c)).map(|idx| (idx, c)))
}

/// Map `table` onto a recording using the column conventions of `profile`.
pub fn map_columns(
    table: &RawTable,
    machine_id: &str,
    profile: &MachineProfile,
) -> AnalysisResult<RawRecording> {
    let normalized: Vec<String> = table.headers.iter().map(|h| normalize_header(h)).collect();

    let time_idx = match &profile.time_column {
        Some(name) => find_column(&normalized, name),
        None => find_alias(&normalized, TIME_ALIASES),
    }
    .ok_or_else(|| AnalysisError::malformed("missing time column"))?;

    let (ref_idx, convention) = find_reference(&normalized, profile)
        .ok_or_else(|| AnalysisError::malformed("missing rotational reference column"))?;

    let accel_idx: Vec<usize> = if profile.acceleration_columns.is_empty() {
        let prefixes: Vec<String> = profile
            .acceleration_prefixes
            .iter()
            .map(|p| p.to_lowercase())
            .collect();
        normalized
            .iter()
            .enumerate()
            .filter(|(idx, h)| {
                *idx != time_idx && *idx != ref_idx && prefixes.iter().any(|p| h.starts_with(p.as_str()))
            })
            .map(|(idx, _)| idx)
            .collect()
    } else {
        profile
            .acceleration_columns
            .iter()
            .map(|name| {
                find_column(&normalized, name).ok_or_else(|| {
                    AnalysisError::malformed(format!("missing acceleration column '{name}'"))
                })
            })
            .collect::<AnalysisResult<_>>()?
    };
    if accel_idx.is_empty() {
        return Err(AnalysisError::malformed("no acceleration columns found"));
    }

    let reference = match convention {
        ReferenceConvention::Rpm => ReferenceKind::Rpm,
        ReferenceConvention::Pulses => ReferenceKind::Pulses {
            per_revolution: profile.pulses_per_revolution,
        },
    };

    let samples = (0..table.row_count())
        .map(|row| RawSample {
            timestamp: table.columns[time_idx][row] * profile.time_scale,
            accelerations: accel_idx
                .iter()
                .map(|&c| table.columns[c][row] * profile.acceleration_scale)
                .collect(),
            reference: table.columns[ref_idx][row],
        })
        .collect();

    Ok(RawRecording {
        machine_id: machine_id.to_string(),
        channel_names: accel_idx.iter().map(|&c| normalized[c].clone()).collect(),
        reference,
        samples,
    })
}
