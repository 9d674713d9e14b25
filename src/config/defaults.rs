//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

pub const CONFIG_FILE: &str = "jrender.toml";

// ============================================================================
// [tools] Section Defaults
// ============================================================================

pub mod tools {
    pub fn evaluator() -> String {
        "jsonnet".into()
    }

    pub fn converter() -> String {
        "yq".into()
    }

    pub fn converter_args() -> Vec<String> {
        vec!["-P".into()]
    }

    pub fn git() -> String {
        "git".into()
    }
}

// ============================================================================
// [render] Section Defaults
// ============================================================================

pub mod render {
    pub fn extensions() -> Vec<String> {
        vec!["jsonnet".into(), "libsonnet".into()]
    }
}

// ============================================================================
// [live] Section Defaults
// ============================================================================

pub mod live {
    pub fn debounce_ms() -> u64 {
        300
    }
}
