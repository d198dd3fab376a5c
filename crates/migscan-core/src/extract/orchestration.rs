//! Workflow, coordinator, and bundle document parsers.
//!
//! Each parser always returns an [`OrchestrationDoc`]. Malformed XML yields
//! a doc with `status = failed` and empty collections.

use roxmltree::{Document, Node};
use tracing::warn;

use crate::extract::xml::{
    child, child_text, children, configuration_properties, descendants, text_of,
};
use crate::models::{ControlFlow, Dataset, DocKind, FileKind, OrchestrationDoc, Schedule, Step};
use crate::scanner::ScannedFile;

const MAIN_ARTIFACT_TAGS: &[&str] = &["script", "exec", "class", "main-class", "jar"];
const TERMINAL_TRANSITIONS: &[&str] = &["ok", "error"];

fn parse_or_fail<'i>(
    kind: DocKind,
    text: &'i str,
    source_file: &str,
) -> Result<Document<'i>, OrchestrationDoc> {
    Document::parse(text).map_err(|e| {
        warn!(file = source_file, kind = kind.as_str(), error = %e, "malformed document");
        OrchestrationDoc::failed(kind, source_file, e.to_string())
    })
}

/// Add every `configuration/property` under `scope` (and `scope` itself if
/// it is a configuration block). First value seen for a name wins.
fn merge_configuration(doc: &mut OrchestrationDoc, scope: Node<'_, '_>) {
    let blocks = std::iter::once(scope)
        .filter(|n| n.tag_name().name() == "configuration")
        .chain(descendants(scope, "configuration"));
    for block in blocks {
        for (name, value) in configuration_properties(block) {
            doc.configuration.entry(name).or_insert(value);
        }
    }
}

fn texts_of<'a, 'i: 'a>(scope: Node<'a, 'i>, name: &'a str) -> Vec<String> {
    descendants(scope, name).filter_map(text_of).collect()
}

fn parse_step(action: Node<'_, '_>) -> Step {
    let name = action.attribute("name").unwrap_or_default().to_string();
    let body = action
        .children()
        .find(|n| n.is_element() && !TERMINAL_TRANSITIONS.contains(&n.tag_name().name()));
    let kind = body
        .map(|n| n.tag_name().name().to_string())
        .unwrap_or_default();
    let scope = body.unwrap_or(action);

    let main = MAIN_ARTIFACT_TAGS
        .iter()
        .find_map(|tag| descendants(scope, tag).find_map(text_of));

    let mut args = texts_of(scope, "arg");
    args.extend(texts_of(scope, "argument"));

    let subworkflow_app_path = std::iter::once(scope)
        .filter(|n| n.tag_name().name() == "sub-workflow")
        .chain(descendants(scope, "sub-workflow"))
        .find_map(|sw| child_text(sw, "app-path"));

    Step {
        name,
        kind,
        main,
        args,
        files: texts_of(scope, "file"),
        archives: texts_of(scope, "archive"),
        job_xmls: texts_of(scope, "job-xml"),
        subworkflow_app_path,
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

pub fn parse_workflow(text: &str, source_file: &str) -> OrchestrationDoc {
    let document = match parse_or_fail(DocKind::Workflow, text, source_file) {
        Ok(d) => d,
        Err(failed) => return failed,
    };
    let root = document.root_element();
    let mut doc = OrchestrationDoc::new(DocKind::Workflow, source_file);
    doc.name = root.attribute("name").map(str::to_string);

    if let Some(global) = child(root, "global") {
        merge_configuration(&mut doc, global);
    }
    merge_configuration(&mut doc, root);

    doc.control_flow = ControlFlow {
        has_fork_join: descendants(root, "fork").next().is_some()
            || descendants(root, "join").next().is_some(),
        has_decision: descendants(root, "decision").next().is_some(),
    };

    for action in descendants(root, "action") {
        let step = parse_step(action);
        if let Some(path) = &step.subworkflow_app_path {
            if !doc.nested_refs.contains(path) {
                doc.nested_refs.push(path.clone());
            }
        }
        doc.steps.push(step);
    }
    doc
}

pub fn parse_coordinator(text: &str, source_file: &str) -> OrchestrationDoc {
    let document = match parse_or_fail(DocKind::Coordinator, text, source_file) {
        Ok(d) => d,
        Err(failed) => return failed,
    };
    let root = document.root_element();
    let mut doc = OrchestrationDoc::new(DocKind::Coordinator, source_file);
    doc.name = root.attribute("name").map(str::to_string);
    doc.schedule = Some(Schedule {
        frequency: root.attribute("frequency").map(str::to_string),
        start: root.attribute("start").map(str::to_string),
        end: root.attribute("end").map(str::to_string),
        timezone: root.attribute("timezone").map(str::to_string),
    });
    merge_configuration(&mut doc, root);

    for dataset in descendants(root, "dataset") {
        doc.datasets.push(Dataset {
            name: dataset.attribute("name").unwrap_or_default().to_string(),
            uri_template: child_text(dataset, "uri-template").unwrap_or_default(),
        });
    }

    for action in children(root, "action") {
        for workflow in children(action, "workflow") {
            if let Some(path) = child_text(workflow, "app-path") {
                if !doc.nested_refs.contains(&path) {
                    doc.nested_refs.push(path);
                }
            }
        }
    }
    doc
}

pub fn parse_bundle(text: &str, source_file: &str) -> OrchestrationDoc {
    let document = match parse_or_fail(DocKind::Bundle, text, source_file) {
        Ok(d) => d,
        Err(failed) => return failed,
    };
    let root = document.root_element();
    let mut doc = OrchestrationDoc::new(DocKind::Bundle, source_file);
    doc.name = root.attribute("name").map(str::to_string);
    merge_configuration(&mut doc, root);

    for coordinator in descendants(root, "coordinator") {
        if let Some(path) = child_text(coordinator, "app-path") {
            if !doc.nested_refs.contains(&path) {
                doc.nested_refs.push(path);
            }
        }
    }
    doc
}

/// Parse every readable orchestration file in the inventory.
pub fn parse_orchestration_files(files: &[ScannedFile]) -> Vec<OrchestrationDoc> {
    files
        .iter()
        .filter_map(|file| {
            let text = file.text()?;
            let doc = match file.kind() {
                FileKind::OozieWorkflowXml => parse_workflow(text, file.path()),
                FileKind::OozieCoordinatorXml => parse_coordinator(text, file.path()),
                FileKind::OozieBundleXml => parse_bundle(text, file.path()),
                _ => return None,
            };
            Some(doc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocStatus;

    const WORKFLOW: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<workflow-app xmlns="uri:oozie:workflow:0.5" name="daily-${env}">
  <global>
    <configuration>
      <property><name>mapred.job.queue.name</name><value>${queue}</value></property>
    </configuration>
  </global>
  <start to="split"/>
  <fork name="split"><path start="load"/><path start="report"/></fork>
  <action name="load">
    <hive xmlns="uri:oozie:hive-action:0.5">
      <job-xml>hive-site.xml</job-xml>
      <configuration>
        <property><name>mapred.job.queue.name</name><value>other</value></property>
        <property><name>hive.exec.parallel</name><value>true</value></property>
      </configuration>
      <script>sql/load.hql</script>
      <param>DB=${raw_db}</param>
      <file>lib/udf.jar#udf.jar</file>
    </hive>
    <ok to="join"/>
    <error to="fail"/>
  </action>
  <action name="report">
    <shell xmlns="uri:oozie:shell-action:0.3">
      <exec>bin/report.sh</exec>
      <argument>--db</argument>
      <argument>${raw_db}</argument>
      <archive>deps.tgz</archive>
    </shell>
    <ok to="join"/>
    <error to="fail"/>
  </action>
  <join name="join" to="child"/>
  <action name="child">
    <sub-workflow>
      <app-path>${nameNode}/apps/child</app-path>
      <propagate-configuration/>
    </sub-workflow>
    <ok to="end"/>
    <error to="fail"/>
  </action>
  <kill name="fail"><message>failed</message></kill>
  <end name="end"/>
</workflow-app>"#;

    #[test]
    fn test_parse_workflow_steps() {
        let doc = parse_workflow(WORKFLOW, "apps/daily/workflow.xml");
        assert!(doc.is_ok());
        assert_eq!(doc.name.as_deref(), Some("daily-${env}"));
        assert_eq!(doc.steps.len(), 3);

        let load = &doc.steps[0];
        assert_eq!(load.kind, "hive");
        assert_eq!(load.main.as_deref(), Some("sql/load.hql"));
        assert_eq!(load.job_xmls, vec!["hive-site.xml".to_string()]);
        assert_eq!(load.files, vec!["lib/udf.jar#udf.jar".to_string()]);

        let report = &doc.steps[1];
        assert_eq!(report.kind, "shell");
        assert_eq!(report.main.as_deref(), Some("bin/report.sh"));
        assert_eq!(report.args, vec!["--db".to_string(), "${raw_db}".to_string()]);
        assert_eq!(report.archives, vec!["deps.tgz".to_string()]);

        let child = &doc.steps[2];
        assert_eq!(child.kind, "sub-workflow");
        assert_eq!(
            child.subworkflow_app_path.as_deref(),
            Some("${nameNode}/apps/child")
        );
        assert_eq!(doc.nested_refs, vec!["${nameNode}/apps/child".to_string()]);
        assert_eq!(doc.subworkflow_count(), 1);
    }

    #[test]
    fn test_parse_workflow_configuration_and_control_flow() {
        let doc = parse_workflow(WORKFLOW, "workflow.xml");
        assert_eq!(
            doc.configuration.get("mapred.job.queue.name").map(String::as_str),
            Some("${queue}")
        );
        assert_eq!(
            doc.configuration.get("hive.exec.parallel").map(String::as_str),
            Some("true")
        );
        assert!(doc.control_flow.has_fork_join);
        assert!(!doc.control_flow.has_decision);
    }

    #[test]
    fn test_malformed_workflow_is_failed_record() {
        let doc = parse_workflow("<workflow-app name='x'><action>", "bad/workflow.xml");
        assert!(matches!(doc.status, DocStatus::Failed { .. }));
        assert!(doc.steps.is_empty());
        assert!(doc.configuration.is_empty());
        assert_eq!(doc.display_name(), "bad/workflow.xml");
    }

    #[test]
    fn test_parse_coordinator() {
        let xml = r#"<coordinator-app name="hourly" frequency="${coord:minutes(15)}"
            start="${start}" end="2030-01-01T00:00Z" timezone="UTC"
            xmlns="uri:oozie:coordinator:0.4">
  <datasets>
    <dataset name="input" frequency="${coord:hours(1)}" initial-instance="2020-01-01T00:00Z" timezone="UTC">
      <uri-template>${nameNode}/data/${YEAR}/${MONTH}</uri-template>
    </dataset>
  </datasets>
  <action>
    <workflow>
      <app-path>${appRoot}/daily</app-path>
      <configuration>
        <property><name>queue</name><value>etl</value></property>
      </configuration>
    </workflow>
  </action>
</coordinator-app>"#;
        let doc = parse_coordinator(xml, "coord/coordinator.xml");
        assert!(doc.is_ok());
        let schedule = doc.schedule.as_ref().unwrap();
        assert_eq!(schedule.frequency.as_deref(), Some("${coord:minutes(15)}"));
        assert_eq!(schedule.timezone.as_deref(), Some("UTC"));
        assert_eq!(doc.datasets.len(), 1);
        assert_eq!(doc.datasets[0].uri_template, "${nameNode}/data/${YEAR}/${MONTH}");
        assert_eq!(doc.nested_refs, vec!["${appRoot}/daily".to_string()]);
        assert_eq!(doc.configuration.get("queue").map(String::as_str), Some("etl"));
    }

    #[test]
    fn test_parse_bundle() {
        let xml = r#"<bundle-app name="b" xmlns="uri:oozie:bundle:0.2">
  <coordinator name="c1"><app-path>/apps/c1</app-path></coordinator>
  <coordinator name="c2"><app-path>/apps/c2</app-path></coordinator>
</bundle-app>"#;
        let doc = parse_bundle(xml, "bundle.xml");
        assert_eq!(doc.kind, DocKind::Bundle);
        assert_eq!(
            doc.nested_refs,
            vec!["/apps/c1".to_string(), "/apps/c2".to_string()]
        );
    }
}
