//! Defect class taxonomy for solar-panel thermal inspection.
//!
//! The inference service emits short lowercase class identifiers
//! (e.g., "single-cell", "substring") that come straight from the model's
//! training labels. This module maps them onto the finite set of defect
//! classes the rest of the system reasons about, and carries the per-class
//! reference data (severity, expected power loss, remediation guidance)
//! used when the service response does not include it.
//!
//! Unknown identifiers are never dropped: they pass through a cosmetic
//! fallback transform so a newly-trained class still renders sensibly.

/// A recognised defect class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefectClass {
    /// Isolated hot spot confined to one cell.
    SingleCell,
    /// Low-resistance electrical fault across a string.
    ShortCircuit,
    /// Broken conduction path leaving cells electrically dead.
    OpenCircuit,
    /// Whole substring overheating through a failed bypass diode.
    BypassDiodeFailure,
    /// Shadow cast across part of the module.
    PartialShading,
}

/// Reference data for one defect class.
///
/// Mirrors the enrichment fields the inference service may attach to a
/// detection; used as the local fallback when it does not.
#[derive(Debug, Clone, Copy)]
pub struct ClassInfo {
    pub priority: &'static str,
    pub power_loss: &'static str,
    pub category: &'static str,
    pub description: &'static str,
    pub stress_factors: &'static [&'static str],
    pub recommendations: &'static [&'static str],
}

impl DefectClass {
    pub const ALL: [DefectClass; 5] = [
        DefectClass::SingleCell,
        DefectClass::ShortCircuit,
        DefectClass::OpenCircuit,
        DefectClass::BypassDiodeFailure,
        DefectClass::PartialShading,
    ];

    /// Resolve a raw model identifier to a known class.
    ///
    /// Matching is case-insensitive; returns `None` for identifiers outside
    /// the known taxonomy.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "single-cell" => Some(DefectClass::SingleCell),
            "short-circuit" => Some(DefectClass::ShortCircuit),
            "open-circuit" => Some(DefectClass::OpenCircuit),
            "substring" => Some(DefectClass::BypassDiodeFailure),
            "partial-shading" => Some(DefectClass::PartialShading),
            _ => None,
        }
    }

    /// Human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            DefectClass::SingleCell => "Single Cell",
            DefectClass::ShortCircuit => "Short Circuit",
            DefectClass::OpenCircuit => "Open Circuit",
            DefectClass::BypassDiodeFailure => "Bypass Diode Failure",
            DefectClass::PartialShading => "Partial Shading",
        }
    }

    /// Reference data for this class.
    pub fn info(&self) -> &'static ClassInfo {
        match self {
            DefectClass::SingleCell => &SINGLE_CELL,
            DefectClass::ShortCircuit => &SHORT_CIRCUIT,
            DefectClass::OpenCircuit => &OPEN_CIRCUIT,
            DefectClass::BypassDiodeFailure => &BYPASS_DIODE_FAILURE,
            DefectClass::PartialShading => &PARTIAL_SHADING,
        }
    }
}

/// Map a raw model class identifier to its display name.
///
/// Known identifiers resolve through [`DefectClass`]; unknown ones fall back
/// to uppercasing with hyphens replaced by spaces, so "corrosion-spot"
/// renders as "CORROSION SPOT" rather than disappearing.
pub fn display_class(raw: &str) -> String {
    match DefectClass::from_raw(raw) {
        Some(class) => class.display_name().to_string(),
        None => raw.trim().to_ascii_uppercase().replace('-', " "),
    }
}

// ── Per-class reference data ──

static SINGLE_CELL: ClassInfo = ClassInfo {
    priority: "Medium",
    power_loss: "3-8%",
    category: "Thermal",
    description: "Isolated hot spot confined to a single cell, typically caused \
                  by micro-cracks, solder joint fatigue, or localised soiling.",
    stress_factors: &[
        "Localised overheating of the affected cell",
        "Accelerated encapsulant degradation",
    ],
    recommendations: &[
        "Clean the affected area and re-image",
        "Inspect for micro-cracks at the next maintenance window",
    ],
};

static SHORT_CIRCUIT: ClassInfo = ClassInfo {
    priority: "Critical",
    power_loss: "20-35%",
    category: "Electrical",
    description: "Low-resistance fault across a cell string producing a broad, \
                  pronounced thermal signature.",
    stress_factors: &[
        "Sustained high current through the faulted path",
        "Fire risk under peak irradiance",
    ],
    recommendations: &[
        "Isolate the affected string immediately",
        "Schedule an electrical inspection of the junction box and wiring",
    ],
};

static OPEN_CIRCUIT: ClassInfo = ClassInfo {
    priority: "Critical",
    power_loss: "25-40%",
    category: "Electrical",
    description: "Broken conduction path leaving part of the module electrically \
                  dead while neighbouring cells run hot.",
    stress_factors: &[
        "Reverse bias on cells adjacent to the break",
        "Arcing risk at the failed connection",
    ],
    recommendations: &[
        "Take the module out of service until repaired",
        "Check interconnect ribbons and connectors for breaks",
    ],
};

static BYPASS_DIODE_FAILURE: ClassInfo = ClassInfo {
    priority: "High",
    power_loss: "10-25%",
    category: "Electrical",
    description: "A full substring overheating because its bypass diode has \
                  failed short or open, visible as a heated cell row.",
    stress_factors: &[
        "Chronic overheating of the whole substring",
        "Progressive cell damage along the row",
    ],
    recommendations: &[
        "Replace the failed bypass diode",
        "Verify the junction box seals after replacement",
    ],
};

static PARTIAL_SHADING: ClassInfo = ClassInfo {
    priority: "Low",
    power_loss: "5-15%",
    category: "Environmental",
    description: "Shadow cast across part of the module by vegetation, \
                  structures, or soiling, depressing output while it persists.",
    stress_factors: &[
        "Hot spots where shaded cells are driven into reverse bias",
        "Mismatch losses across the string",
    ],
    recommendations: &[
        "Remove or trim the shading source where possible",
        "Re-evaluate row spacing or panel placement if shading is structural",
    ],
};
