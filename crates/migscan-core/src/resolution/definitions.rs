//! Variable definitions gathered from properties files, embedded
//! `configuration` blocks and Maven `properties`, merged by source
//! precedence.

use indexmap::IndexMap;
use roxmltree::Document;
use tracing::debug;

use crate::extract::xml;
use crate::models::{FileKind, SourceKind, VariableDefinition};
use crate::scanner::ScannedFile;

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// `key=value` / `key:value` pairs. Comment lines (`#`, `!`, `;`) and
/// `[section]` headers are skipped; `=` takes priority over `:` so values
/// such as `jdbc:hive2://...` survive intact.
pub fn parse_properties(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty()
            || line.starts_with(['#', '!', ';'])
            || (line.starts_with('[') && line.ends_with(']'))
        {
            continue;
        }
        let split = line.split_once('=').or_else(|| line.split_once(':'));
        let Some((key, value)) = split else { continue };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        pairs.push((key.to_string(), value.trim().to_string()));
    }
    pairs
}

/// Every `configuration/property` pair anywhere in the document.
pub fn parse_embedded_configuration(text: &str) -> Vec<(String, String)> {
    let doc = match Document::parse(text) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(error = %e, "embedded configuration not parsed");
            return Vec::new();
        }
    };
    xml::descendants(doc.root(), "configuration")
        .flat_map(xml::configuration_properties)
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Children of the top-level `properties` element of a POM. Blank values
/// are skipped.
pub fn parse_maven_properties(text: &str) -> Vec<(String, String)> {
    let doc = match Document::parse(text) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(error = %e, "pom not parsed");
            return Vec::new();
        }
    };
    let Some(properties) = xml::child(doc.root_element(), "properties") else {
        return Vec::new();
    };
    properties
        .children()
        .filter(|n| n.is_element())
        .filter_map(|n| {
            let value = xml::text_of(n)?;
            Some((n.tag_name().name().to_string(), xml::collapse_whitespace(&value)))
        })
        .collect()
}

fn source_kind_for(file: &ScannedFile) -> Option<SourceKind> {
    match file.kind() {
        FileKind::Properties | FileKind::IniConf => Some(SourceKind::RuntimeProperties),
        kind if kind.is_orchestration() || kind == FileKind::XmlGeneric => {
            Some(SourceKind::EmbeddedConfig)
        }
        FileKind::BuildMaven => Some(SourceKind::BuildProperties),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Definition table
// ---------------------------------------------------------------------------

/// Every candidate definition per name, in scan order, plus the index of
/// the winning candidate.
#[derive(Clone, Debug, Default)]
pub struct DefinitionTable {
    all: IndexMap<String, Vec<VariableDefinition>>,
    winners: IndexMap<String, usize>,
}

impl DefinitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a candidate. It becomes the winner only when its source kind
    /// strictly outranks the current winner's.
    pub fn insert(&mut self, definition: VariableDefinition) {
        let candidates = self.all.entry(definition.name.clone()).or_default();
        let idx = candidates.len();
        let rank = definition.source.rank();
        let name = definition.name.clone();
        candidates.push(definition);
        match self.winners.get(&name) {
            Some(&current) if candidates[current].source.rank() >= rank => {}
            _ => {
                self.winners.insert(name, idx);
            }
        }
    }

    pub fn winner(&self, name: &str) -> Option<&VariableDefinition> {
        let idx = *self.winners.get(name)?;
        self.all.get(name).and_then(|defs| defs.get(idx))
    }

    pub fn candidates(&self, name: &str) -> &[VariableDefinition] {
        self.all.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn winners(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.winners
            .iter()
            .filter_map(|(name, &idx)| self.all.get(name).and_then(|defs| defs.get(idx)))
    }

    pub fn all_definitions(&self) -> impl Iterator<Item = &VariableDefinition> {
        self.all.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Scan the inventory for definitions. Files are visited in inventory
/// order, which is path-sorted.
pub fn collect_definitions(files: &[ScannedFile]) -> DefinitionTable {
    let mut table = DefinitionTable::new();
    for file in files {
        let Some(source) = source_kind_for(file) else { continue };
        let Some(text) = file.text() else { continue };
        let pairs = match source {
            SourceKind::RuntimeProperties => parse_properties(text),
            SourceKind::EmbeddedConfig => parse_embedded_configuration(text),
            SourceKind::BuildProperties => parse_maven_properties(text),
        };
        debug!(path = file.path(), count = pairs.len(), source = ?source, "definitions");
        for (name, value) in pairs {
            table.insert(VariableDefinition {
                name,
                value,
                defined_in: file.path().to_string(),
                source,
            });
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(name: &str, value: &str, source: SourceKind, file: &str) -> VariableDefinition {
        VariableDefinition {
            name: name.to_string(),
            value: value.to_string(),
            defined_in: file.to_string(),
            source,
        }
    }

    #[test]
    fn test_parse_properties() {
        let text = "# comment\n! bang\n; semi\n[section]\n\
                    nameNode=hdfs://nn:8020\n\
                    jdbc.url = jdbc:hive2://h:10000/db\n\
                    queue: default\n\
                    =orphan\n\
                    no separator\n";
        assert_eq!(
            parse_properties(text),
            vec![
                ("nameNode".to_string(), "hdfs://nn:8020".to_string()),
                ("jdbc.url".to_string(), "jdbc:hive2://h:10000/db".to_string()),
                ("queue".to_string(), "default".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_embedded_configuration() {
        let xml = r#"<workflow-app xmlns="uri:oozie:workflow:0.5" name="w">
  <global><configuration>
    <property><name>queue</name><value>  etl
       batch </value></property>
  </configuration></global>
  <action name="a"><hive><configuration>
    <property><name>raw_db</name><value>sales</value></property>
  </configuration></hive></action>
</workflow-app>"#;
        assert_eq!(
            parse_embedded_configuration(xml),
            vec![
                ("queue".to_string(), "etl batch".to_string()),
                ("raw_db".to_string(), "sales".to_string()),
            ]
        );
        assert!(parse_embedded_configuration("<broken").is_empty());
    }

    #[test]
    fn test_parse_maven_properties() {
        let pom = r#"<project xmlns="http://maven.apache.org/POM/4.0.0">
  <properties>
    <spark.version>3.3.1</spark.version>
    <empty></empty>
  </properties>
  <profiles><profile><properties><env>dev</env></properties></profile></profiles>
</project>"#;
        assert_eq!(
            parse_maven_properties(pom),
            vec![("spark.version".to_string(), "3.3.1".to_string())]
        );
    }

    #[test]
    fn test_runtime_properties_beat_embedded_regardless_of_order() {
        let mut table = DefinitionTable::new();
        table.insert(def("db", "props", SourceKind::RuntimeProperties, "a/job.properties"));
        table.insert(def("db", "xml", SourceKind::EmbeddedConfig, "b/workflow.xml"));
        assert_eq!(table.winner("db").unwrap().value, "props");

        let mut table = DefinitionTable::new();
        table.insert(def("db", "xml", SourceKind::EmbeddedConfig, "a/workflow.xml"));
        table.insert(def("db", "props", SourceKind::RuntimeProperties, "b/job.properties"));
        assert_eq!(table.winner("db").unwrap().value, "props");
        assert_eq!(table.candidates("db").len(), 2);
    }

    #[test]
    fn test_first_seen_wins_within_kind() {
        let mut table = DefinitionTable::new();
        table.insert(def("q", "first", SourceKind::BuildProperties, "a/pom.xml"));
        table.insert(def("q", "second", SourceKind::BuildProperties, "b/pom.xml"));
        assert_eq!(table.winner("q").unwrap().value, "first");
        assert_eq!(table.winners().count(), 1);
        assert_eq!(table.all_definitions().count(), 2);
    }
}
