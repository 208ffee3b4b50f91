//! Fiber implant extraction from procedures documents.
//!
//! Both database generations are handled: v1 records carry fiber implants
//! as `Fiber implant` procedures with stereotactic coordinate fields on
//! each probe, v2 records as `Probe implant` procedures whose coordinates
//! live in the device config's transform list.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiberImplant {
    pub name: String,
    /// Anterior-posterior offset from the reference point, mm.
    pub ap: f64,
    /// Medial-lateral offset, mm.
    pub ml: f64,
    /// Dorsal-ventral depth, mm.
    pub dv: f64,
    /// Insertion angle, degrees.
    pub angle: f64,
    pub unit: String,
    pub reference: String,
    pub targeted_structure: String,
}

/// Walk a procedures document and collect every fiber implant.
pub fn extract_fiber_implants(procedures: &Value) -> Vec<FiberImplant> {
    let mut fibers = Vec::new();

    let surgeries = procedures
        .get("subject_procedures")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for surgery in surgeries {
        if type_of(surgery) != Some("Surgery") {
            continue;
        }
        let steps = surgery
            .get("procedures")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        for step in steps {
            match type_of(step) {
                Some("Fiber implant") => extract_v1_probes(step, &mut fibers),
                Some("Probe implant") => extract_v2_probe(step, &mut fibers),
                _ => {}
            }
        }
    }

    debug!(count = fibers.len(), "extracted fiber implants");
    fibers
}

/// v1 and v2 spell the discriminator differently.
fn type_of(value: &Value) -> Option<&str> {
    value
        .get("procedure_type")
        .or_else(|| value.get("object_type"))
        .and_then(Value::as_str)
}

fn extract_v1_probes(procedure: &Value, fibers: &mut Vec<FiberImplant>) {
    let probes = procedure
        .get("probes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for probe in probes {
        fibers.push(FiberImplant {
            name: probe
                .get("ophys_probe")
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
                .unwrap_or("Unknown")
                .to_string(),
            ap: number_at(probe, "stereotactic_coordinate_ap"),
            ml: number_at(probe, "stereotactic_coordinate_ml"),
            dv: number_at(probe, "stereotactic_coordinate_dv"),
            angle: number_at(probe, "angle"),
            unit: string_at(probe, "stereotactic_coordinate_unit", "millimeter"),
            reference: string_at(probe, "stereotactic_coordinate_reference", "Bregma"),
            targeted_structure: string_at(probe, "targeted_structure", "Unknown"),
        });
    }
}

fn extract_v2_probe(procedure: &Value, fibers: &mut Vec<FiberImplant>) {
    let device_type = procedure
        .get("implanted_device")
        .and_then(|d| d.get("object_type"))
        .and_then(Value::as_str);
    if device_type != Some("Fiber probe") {
        return;
    }

    let config = &procedure["device_config"];
    let (mut ap, mut ml, mut dv, mut angle) = (0.0, 0.0, 0.0, 0.0);

    let transforms = config
        .get("transform")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    for transform in transforms {
        match transform.get("object_type").and_then(Value::as_str) {
            // translation holds [AP, ML, DV]
            Some("Translation") => {
                if let Some(t) = transform.get("translation").and_then(Value::as_array) {
                    if t.len() >= 3 {
                        ap = as_number(&t[0]);
                        ml = as_number(&t[1]);
                        dv = as_number(&t[2]);
                    }
                }
            }
            // first non-zero rotation angle is the insertion angle
            Some("Rotation") => {
                if let Some(angles) = transform.get("angles").and_then(Value::as_array) {
                    if let Some(a) = angles.iter().map(as_number).find(|a| *a != 0.0) {
                        angle = a;
                    }
                }
            }
            _ => {}
        }
    }

    fibers.push(FiberImplant {
        name: string_at(config, "device_name", "Unknown"),
        ap,
        ml,
        dv,
        angle,
        unit: "millimeter".to_string(),
        reference: config
            .get("coordinate_system")
            .and_then(|cs| cs.get("origin"))
            .and_then(Value::as_str)
            .unwrap_or("Bregma")
            .to_string(),
        targeted_structure: config
            .get("primary_targeted_structure")
            .and_then(|s| s.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
    });
}

/// Coordinates arrive as numbers or numeric strings depending on the
/// record's age.
fn as_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn number_at(value: &Value, key: &str) -> f64 {
    value.get(key).map(as_number).unwrap_or(0.0)
}

fn string_at(value: &Value, key: &str, default: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}
