// lockjar-core/src/rules.rs
// Declarative import rules, one block per resolved artifact.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use lockjar_common::dependency::DependencyInfo;
use lockjar_common::model::Coordinates;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSettings {
    /// External repository the generated targets live in, e.g. `maven`.
    pub repository_name: String,
    pub settings_label: Option<String>,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            repository_name: "maven".to_string(),
            settings_label: None,
        }
    }
}

impl RuleSettings {
    pub fn target(&self, coords: &Coordinates) -> String {
        format!("@{}//:{}", self.repository_name, target_name(coords))
    }
}

pub fn rule_type(coords: &Coordinates) -> &'static str {
    match coords.packaging() {
        "aar" => "aar_import",
        _ => "jvm_import",
    }
}

/// `com.example:my-lib` becomes `com_example_my_lib`.
pub fn target_name(coords: &Coordinates) -> String {
    coords
        .key()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Renders every resolved artifact, sorted by coordinate. Dependencies that
/// map to no resolved artifact are kept as `# <missing>` comments so the full
/// edge set stays visible.
pub fn render_rules(infos: &[DependencyInfo], settings: &RuleSettings) -> String {
    let resolved: BTreeMap<String, &DependencyInfo> = infos
        .iter()
        .filter(|i| !i.missing)
        .map(|i| (i.coordinates.key(), i))
        .collect();

    let mut out = String::new();
    for (n, info) in resolved.values().enumerate() {
        if n > 0 {
            out.push('\n');
        }
        let coords = &info.coordinates;
        let _ = writeln!(out, "{}(", rule_type(coords));
        let _ = writeln!(out, "    name = \"{}\",", target_name(coords));
        let _ = writeln!(out, "    artifact = \"{coords}\",");
        if let Some(label) = &settings.settings_label {
            let _ = writeln!(out, "    settings = \"{label}\",");
        }
        if info.dependencies.is_empty() {
            out.push_str("    deps = [],\n");
        } else {
            out.push_str("    deps = [\n");
            for dep in &info.dependencies {
                if resolved.contains_key(&dep.key()) {
                    let _ = writeln!(out, "        \"{}\",", settings.target(dep));
                } else {
                    let _ = writeln!(out, "        # <missing> {dep}");
                }
            }
            out.push_str("    ],\n");
        }
        out.push_str(")\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    fn info(coords: &str, deps: &[&str], missing: bool) -> DependencyInfo {
        DependencyInfo {
            coordinates: Coordinates::parse(coords).unwrap(),
            repositories: BTreeSet::new(),
            sha256: None,
            dependencies: deps.iter().map(|d| Coordinates::parse(d).unwrap()).collect(),
            missing,
        }
    }

    #[test]
    fn blocks_with_missing_dependencies() {
        let infos = vec![
            info("com.example:ui:aar:1.0", &["com.example:core-lib:2.0", "com.example:gone:1"], false),
            info("com.example:core-lib:2.0", &[], false),
            info("com.example:gone:1", &[], true),
        ];
        let settings = RuleSettings {
            repository_name: "maven".into(),
            settings_label: Some("//:settings".into()),
        };

        let expected = "\
jvm_import(
    name = \"com_example_core_lib\",
    artifact = \"com.example:core-lib:2.0\",
    settings = \"//:settings\",
    deps = [],
)

aar_import(
    name = \"com_example_ui\",
    artifact = \"com.example:ui:aar:1.0\",
    settings = \"//:settings\",
    deps = [
        \"@maven//:com_example_core_lib\",
        # <missing> com.example:gone:1
    ],
)
";
        assert_eq!(render_rules(&infos, &settings), expected);
    }

    #[test]
    fn names_are_sanitized() {
        let c = Coordinates::parse("org.scala-lang:scala.library:2.13").unwrap();
        assert_eq!(target_name(&c), "org_scala_lang_scala_library");
        assert_eq!(rule_type(&c), "jvm_import");
    }
}
