//! Document checks.
//!
//! Reports structural issues without modifying the document. Results feed
//! `vd check`.

use crate::error::CoreError;
use crate::id::NodeId;
use crate::model::{NodeKind, SceneGraph, WalkControl};
use crate::parser::parse_svg;
use std::collections::HashSet;

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LintSeverity {
    /// The document is damaged.
    Error,
    /// Should be fixed, likely a mistake.
    Warning,
    /// Informational.
    Info,
}

/// A single lint diagnostic for a scene node.
#[derive(Debug, Clone)]
pub struct LintDiagnostic {
    pub node_id: NodeId,
    pub message: String,
    pub severity: LintSeverity,
    /// Short rule identifier (e.g. "dangling-ref", "nested-layer").
    pub rule: &'static str,
}

// ─── Public API ──────────────────────────────────────────────────────────

/// Check SVG text. Duplicate ids are only visible here, since the loader
/// renames them.
pub fn lint_svg(text: &str) -> Result<Vec<LintDiagnostic>, CoreError> {
    let xml = roxmltree::Document::parse(text).map_err(|e| CoreError::LoadFailed(e.to_string()))?;
    let mut diags = Vec::new();
    let mut seen = HashSet::new();
    for el in xml.descendants().filter(roxmltree::Node::is_element) {
        if let Some(id) = el.attribute("id")
            && !seen.insert(id)
        {
            diags.push(LintDiagnostic {
                node_id: NodeId::intern(id),
                message: format!("id `{id}` is used more than once"),
                severity: LintSeverity::Warning,
                rule: "duplicate-id",
            });
        }
    }
    let (graph, _) = parse_svg(text)?;
    diags.extend(lint_document(&graph));
    Ok(diags)
}

/// Run all graph rules and return diagnostics.
#[must_use]
pub fn lint_document(graph: &SceneGraph) -> Vec<LintDiagnostic> {
    let mut diags = Vec::new();
    lint_nested_layers(graph, &mut diags);
    lint_paths(graph, &mut diags);
    lint_dangling_refs(graph, &mut diags);
    lint_empty_groups(graph, &mut diags);
    diags
}

// ─── Rules ───────────────────────────────────────────────────────────────

fn lint_nested_layers(graph: &SceneGraph, diags: &mut Vec<LintDiagnostic>) {
    graph.walk(graph.root, |idx, node| {
        if node.is_layer() && graph.parent(idx) != Some(graph.root) {
            diags.push(LintDiagnostic {
                node_id: node.id,
                message: format!("layer `{}` is not a direct child of the root", node.id),
                severity: LintSeverity::Warning,
                rule: "nested-layer",
            });
        }
        WalkControl::Continue
    });
}

fn lint_paths(graph: &SceneGraph, diags: &mut Vec<LintDiagnostic>) {
    for idx in graph.graph.node_indices() {
        let node = &graph.graph[idx];
        if let NodeKind::Path { data } = &node.kind
            && let Err(e) = data.validate()
        {
            diags.push(LintDiagnostic {
                node_id: node.id,
                message: e.to_string(),
                severity: LintSeverity::Error,
                rule: "invalid-path",
            });
        }
    }
}

fn lint_dangling_refs(graph: &SceneGraph, diags: &mut Vec<LintDiagnostic>) {
    for idx in graph.graph.node_indices() {
        let node = &graph.graph[idx];
        for target in node.paint_refs() {
            if graph.index_of(target).is_none() {
                diags.push(LintDiagnostic {
                    node_id: node.id,
                    message: format!("`{}` refers to missing `#{target}`", node.id),
                    severity: LintSeverity::Warning,
                    rule: "dangling-ref",
                });
            }
        }
    }
}

fn lint_empty_groups(graph: &SceneGraph, diags: &mut Vec<LintDiagnostic>) {
    for idx in graph.graph.node_indices() {
        let node = &graph.graph[idx];
        if node.is_group() && !node.is_layer() && graph.children(idx).is_empty() {
            diags.push(LintDiagnostic {
                node_id: node.id,
                message: format!("group `{}` is empty", node.id),
                severity: LintSeverity::Info,
                rule: "empty-group",
            });
        }
    }
}
