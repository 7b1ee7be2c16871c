use crate::language::{create_parser, is_builtin};
use blastradius_core::{BlastRadiusError, QualifiedName, Result, SymbolKind, SymbolNode};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use tree_sitter::Node;

/// Parse one file's text into a flat table of qualified symbols.
///
/// Qualification walks nested scopes (module -> class -> function -> nested
/// function/variable). Every name a symbol reads, calls, or assigns is
/// recorded as an outgoing dependency, resolved to the nearest enclosing
/// scope that defines it, falling back to module scope; references that
/// never resolve are recorded under module scope but never become nodes.
pub fn extract_symbols(module_name: &str, source: &str) -> Result<Vec<SymbolNode>> {
    let mut parser = create_parser()?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| BlastRadiusError::Parse("parser produced no tree".to_string()))?;

    let root = tree.root_node();
    if root.has_error() {
        return Err(BlastRadiusError::Parse(format!(
            "syntax error at line {}",
            first_error_line(root)
        )));
    }

    let mut scopes = ScopeTable::default();
    let mut stack = vec![module_name.to_string()];
    scopes.defined.entry(stack.clone()).or_default();
    collect_scopes(root, source, &mut stack, &mut scopes);
    debug_assert_eq!(stack.len(), 1);

    let mut emitter = Emitter {
        source,
        scopes: &scopes,
        nodes: Vec::new(),
        param_links: BTreeMap::new(),
    };
    emitter.emit(root, &mut stack);

    let symbols = emitter.finish();
    debug!(
        module = module_name,
        symbols = symbols.len(),
        "extraction complete"
    );
    Ok(symbols)
}

fn first_error_line(root: Node) -> u32 {
    let mut cursor = root.walk();
    let mut line = root.start_position().row as u32 + 1;
    'outer: loop {
        let node = cursor.node();
        if node.is_error() || node.is_missing() {
            line = node.start_position().row as u32 + 1;
            break;
        }
        if cursor.goto_first_child() {
            continue;
        }
        while !cursor.goto_next_sibling() {
            if !cursor.goto_parent() {
                break 'outer;
            }
        }
    }
    line
}

fn text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

fn end_line_of(node: Node) -> u32 {
    node.end_position().row as u32 + 1
}

/// Names each scope defines directly, plus per-function parameter lists.
/// Built in a first pass so reference resolution in the second pass can see
/// definitions that appear later in the file (nearest enclosing definition,
/// regardless of line order).
#[derive(Default)]
struct ScopeTable {
    defined: BTreeMap<Vec<String>, BTreeSet<String>>,
    functions: BTreeMap<QualifiedName, FunctionInfo>,
}

struct FunctionInfo {
    params: Vec<String>,
    line: u32,
}

impl ScopeTable {
    fn define(&mut self, stack: &[String], name: &str) {
        self.defined
            .entry(stack.to_vec())
            .or_default()
            .insert(name.to_string());
    }

    /// Nearest enclosing scope that defines `name`, falling back to module
    /// scope for unresolved (external) references.
    fn resolve(&self, stack: &[String], name: &str) -> QualifiedName {
        for depth in (1..=stack.len()).rev() {
            let scope = &stack[..depth];
            if self
                .defined
                .get(scope)
                .is_some_and(|names| names.contains(name))
            {
                return QualifiedName::from_parts(
                    scope.iter().map(String::as_str).chain([name]),
                );
            }
        }
        QualifiedName::from_parts([stack[0].as_str(), name])
    }
}

fn name_field<'t, 's>(node: Node<'t>, source: &'s str) -> Option<(Node<'t>, &'s str)> {
    let name_node = node.child_by_field_name("name")?;
    let name = name_node.utf8_text(source.as_bytes()).ok()?;
    Some((name_node, name))
}

fn parameter_names(func: Node, source: &str) -> Vec<String> {
    let mut params = Vec::new();
    let Some(plist) = func.child_by_field_name("parameters") else {
        return params;
    };
    let mut cursor = plist.walk();
    for child in plist.named_children(&mut cursor) {
        let ident = match child.kind() {
            "identifier" => Some(child),
            "default_parameter" | "typed_default_parameter" => child.child_by_field_name("name"),
            "typed_parameter" | "list_splat_pattern" | "dictionary_splat_pattern" => {
                first_identifier(child)
            }
            _ => None,
        };
        if let Some(ident) = ident {
            params.push(text(ident, source).to_string());
        }
    }
    params
}

fn first_identifier(node: Node) -> Option<Node> {
    if node.kind() == "identifier" {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if let Some(found) = first_identifier(child) {
            return Some(found);
        }
    }
    None
}

/// First pass: record which names every scope defines.
fn collect_scopes(node: Node, source: &str, stack: &mut Vec<String>, scopes: &mut ScopeTable) {
    match node.kind() {
        "class_definition" => {
            if let Some((_, name)) = name_field(node, source) {
                scopes.define(stack, name);
                stack.push(name.to_string());
                scopes.defined.entry(stack.clone()).or_default();
                if let Some(body) = node.child_by_field_name("body") {
                    collect_scopes(body, source, stack, scopes);
                }
                stack.pop();
            }
        }
        "function_definition" => {
            if let Some((_, name)) = name_field(node, source) {
                scopes.define(stack, name);
                stack.push(name.to_string());
                scopes.defined.entry(stack.clone()).or_default();
                let params = parameter_names(node, source);
                for param in &params {
                    scopes.define(stack, param);
                }
                scopes.functions.insert(
                    QualifiedName::from_parts(stack.iter().map(String::as_str)),
                    FunctionInfo {
                        params,
                        line: line_of(node),
                    },
                );
                if let Some(body) = node.child_by_field_name("body") {
                    collect_scopes(body, source, stack, scopes);
                }
                stack.pop();
            }
        }
        "assignment" => {
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "identifier" {
                    scopes.define(stack, text(left, source));
                }
            }
            // Chained assignments nest on the right.
            if let Some(right) = node.child_by_field_name("right") {
                collect_scopes(right, source, stack, scopes);
            }
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect_scopes(child, source, stack, scopes);
            }
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum RefMode {
    /// Count assignment targets as references (function body walks; matches
    /// treating a local write as a use of that binding).
    IncludeTargets,
    /// Skip assignment targets (walking the right-hand side of an
    /// assignment for the variable node's own dependencies).
    SkipTargets,
}

/// Second pass: emit symbol nodes with resolved dependency sets.
struct Emitter<'a> {
    source: &'a str,
    scopes: &'a ScopeTable,
    nodes: Vec<SymbolNode>,
    /// Call-site argument flow into callee parameters: parameter
    /// QualifiedName -> argument names it receives.
    param_links: BTreeMap<QualifiedName, BTreeSet<QualifiedName>>,
}

impl<'a> Emitter<'a> {
    fn emit(&mut self, node: Node, stack: &mut Vec<String>) {
        match node.kind() {
            "class_definition" => {
                if let Some((_, name)) = name_field(node, self.source) {
                    stack.push(name.to_string());
                    if let Some(body) = node.child_by_field_name("body") {
                        self.emit(body, stack);
                    }
                    stack.pop();
                }
            }
            "function_definition" => self.emit_function(node, stack, BTreeSet::new()),
            "decorated_definition" => self.emit_decorated(node, stack),
            "assignment" => self.emit_assignment(node, stack),
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.emit(child, stack);
                }
            }
        }
    }

    fn emit_function(
        &mut self,
        node: Node,
        stack: &mut Vec<String>,
        extra_deps: BTreeSet<QualifiedName>,
    ) {
        let Some((_, name)) = name_field(node, self.source) else {
            return;
        };
        let mut deps = extra_deps;
        self.collect_refs(node, &mut stack.clone(), RefMode::IncludeTargets, &mut deps);

        stack.push(name.to_string());
        let qname = QualifiedName::from_parts(stack.iter().map(String::as_str));
        // Parameters count as internal dependencies of the function,
        // qualified under its own scope.
        if let Some(info) = self.scopes.functions.get(&qname) {
            for param in &info.params {
                deps.insert(qname.child(param));
            }
        }

        self.nodes.push(
            SymbolNode::new(
                qname,
                SymbolKind::Function,
                line_of(node),
                end_line_of(node),
            )
            .with_dependencies(deps),
        );

        if let Some(body) = node.child_by_field_name("body") {
            self.emit(body, stack);
        }
        stack.pop();
    }

    /// Names a decorator reads are dependencies of the decorated function:
    /// `@cache` reads `cache` at definition time.
    fn emit_decorated(&mut self, node: Node, stack: &mut Vec<String>) {
        let mut decorator_deps = BTreeSet::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            if child.kind() == "decorator" {
                self.collect_refs(
                    child,
                    &mut stack.clone(),
                    RefMode::IncludeTargets,
                    &mut decorator_deps,
                );
            }
        }

        let Some(definition) = node.child_by_field_name("definition") else {
            return;
        };
        if definition.kind() == "function_definition" {
            self.emit_function(definition, stack, decorator_deps);
        } else {
            self.emit(definition, stack);
        }
    }

    fn emit_assignment(&mut self, node: Node, stack: &mut Vec<String>) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };

        // Only plain-identifier targets become variable nodes; attribute and
        // tuple targets are skipped.
        if left.kind() == "identifier" {
            let name = text(left, self.source);
            let qname = QualifiedName::from_parts(
                stack.iter().map(String::as_str).chain([name]),
            );

            let mut deps = BTreeSet::new();
            self.collect_refs(right, &mut stack.clone(), RefMode::SkipTargets, &mut deps);

            self.nodes.push(
                SymbolNode::new(qname, SymbolKind::Variable, line_of(node), line_of(node))
                    .with_dependencies(deps),
            );

            if right.kind() == "call" {
                self.link_call_arguments(right, stack);
            }
        }

        // Chained assignment: `a = b = expr` nests the next target on the
        // right.
        if right.kind() == "assignment" {
            self.emit_assignment(right, stack);
        }
    }

    /// When a variable is assigned from a direct call to a known function,
    /// connect the call-site argument names into the callee's parameters so
    /// argument edits propagate into the callee's variable nodes.
    fn link_call_arguments(&mut self, call: Node, stack: &[String]) {
        let Some(func) = call.child_by_field_name("function") else {
            return;
        };
        if func.kind() != "identifier" {
            return;
        }
        let callee = self.scopes.resolve(stack, text(func, self.source));
        let Some(info) = self.scopes.functions.get(&callee) else {
            return;
        };

        let mut arg_names = BTreeSet::new();
        if let Some(args) = call.child_by_field_name("arguments") {
            let mut cursor = args.walk();
            for arg in args.named_children(&mut cursor) {
                if arg.kind() == "identifier" {
                    let name = text(arg, self.source);
                    if !is_builtin(name) {
                        arg_names.insert(self.scopes.resolve(stack, name));
                    }
                }
            }
        }
        if arg_names.is_empty() {
            return;
        }

        for param in &info.params {
            self.param_links
                .entry(callee.child(param))
                .or_default()
                .extend(arg_names.iter().cloned());
        }
    }

    /// Walk a subtree collecting resolved name references. Maintains its own
    /// scope stack so references inside nested definitions resolve against
    /// their true nearest enclosing scope.
    fn collect_refs(
        &self,
        node: Node,
        stack: &mut Vec<String>,
        mode: RefMode,
        out: &mut BTreeSet<QualifiedName>,
    ) {
        match node.kind() {
            // Declaration-only subtrees: nothing here is a reference.
            "parameters" | "lambda_parameters" | "import_statement" | "import_from_statement"
            | "global_statement" | "nonlocal_statement" | "comment" => {}
            "identifier" => {
                let name = text(node, self.source);
                if !is_builtin(name) {
                    out.insert(self.scopes.resolve(stack, name));
                }
            }
            "attribute" => {
                // `obj.attr` reads `obj`; the attribute segment is not a
                // name in any scope we track.
                if let Some(object) = node.child_by_field_name("object") {
                    self.collect_refs(object, stack, mode, out);
                }
            }
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.collect_refs(value, stack, mode, out);
                }
            }
            "assignment" if mode == RefMode::SkipTargets => {
                if let Some(right) = node.child_by_field_name("right") {
                    self.collect_refs(right, stack, mode, out);
                }
            }
            "function_definition" | "class_definition" => {
                if let Some((_, name)) = name_field(node, self.source) {
                    if node.kind() == "function_definition" {
                        // Defaults evaluate at definition time, in the
                        // enclosing scope.
                        self.collect_parameter_defaults(node, stack, mode, out);
                    }
                    stack.push(name.to_string());
                    if let Some(body) = node.child_by_field_name("body") {
                        self.collect_refs(body, stack, mode, out);
                    }
                    stack.pop();
                }
            }
            _ => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    self.collect_refs(child, stack, mode, out);
                }
            }
        }
    }

    fn collect_parameter_defaults(
        &self,
        func: Node,
        stack: &mut Vec<String>,
        mode: RefMode,
        out: &mut BTreeSet<QualifiedName>,
    ) {
        let Some(params) = func.child_by_field_name("parameters") else {
            return;
        };
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if let Some(value) = param.child_by_field_name("value") {
                self.collect_refs(value, stack, mode, out);
            }
        }
    }

    /// Merge call-site parameter links into the emitted table. A parameter
    /// already present as a real variable node keeps its line and gains the
    /// argument dependencies; otherwise a variable node is synthesized at
    /// the callee's defining line.
    fn finish(mut self) -> Vec<SymbolNode> {
        for (param, args) in self.param_links {
            if let Some(existing) = self.nodes.iter_mut().find(|n| n.name == param) {
                existing.depends_on.extend(args);
                continue;
            }
            let line = self
                .scopes
                .functions
                .iter()
                .find(|(fname, _)| {
                    param
                        .as_str()
                        .strip_prefix(fname.as_str())
                        .is_some_and(|rest| rest.starts_with('.'))
                })
                .map(|(_, info)| info.line)
                .unwrap_or(1);
            self.nodes.push(
                SymbolNode::new(param, SymbolKind::Variable, line, line)
                    .with_dependencies(args),
            );
        }
        self.nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(symbols: &[SymbolNode]) -> Vec<&str> {
        symbols.iter().map(|s| s.name.as_str()).collect()
    }

    fn find<'a>(symbols: &'a [SymbolNode], name: &str) -> &'a SymbolNode {
        symbols
            .iter()
            .find(|s| s.name.as_str() == name)
            .unwrap_or_else(|| panic!("missing symbol {name}, have {:?}", names(symbols)))
    }

    #[test]
    fn extracts_functions_and_module_variables() {
        let src = "\
limit = 10

def check(value):
    return value < limit
";
        let symbols = extract_symbols("app", src).unwrap();

        let limit = find(&symbols, "app.limit");
        assert_eq!(limit.kind, SymbolKind::Variable);
        assert_eq!(limit.line, 1);

        let check = find(&symbols, "app.check");
        assert_eq!(check.kind, SymbolKind::Function);
        assert_eq!(check.line, 3);
        assert!(check.depends_on.contains(&QualifiedName::new("app.limit")));
        assert!(check
            .depends_on
            .contains(&QualifiedName::new("app.check.value")));
    }

    #[test]
    fn qualifies_methods_under_class_scope() {
        let src = "\
class Service:
    def run(self):
        return self.helper()

    def helper(self):
        return 1
";
        let symbols = extract_symbols("app", src).unwrap();
        let run = find(&symbols, "app.Service.run");
        assert!(run
            .depends_on
            .contains(&QualifiedName::new("app.Service.run.self")));
        find(&symbols, "app.Service.helper");
    }

    #[test]
    fn nested_function_references_resolve_to_nearest_scope() {
        let src = "\
x = 1

def outer():
    x = 2
    def inner():
        return x
    return inner
";
        let symbols = extract_symbols("app", src).unwrap();
        // inner's `x` resolves to outer's local, not the module variable.
        let inner = find(&symbols, "app.outer.inner");
        assert!(inner
            .depends_on
            .contains(&QualifiedName::new("app.outer.x")));
        assert!(!inner.depends_on.contains(&QualifiedName::new("app.x")));
    }

    #[test]
    fn unresolved_references_fall_back_to_module_scope_without_nodes() {
        let src = "\
def f():
    return undefined_helper()
";
        let symbols = extract_symbols("app", src).unwrap();
        let f = find(&symbols, "app.f");
        assert!(f
            .depends_on
            .contains(&QualifiedName::new("app.undefined_helper")));
        assert!(!names(&symbols).contains(&"app.undefined_helper"));
    }

    #[test]
    fn builtins_are_not_dependencies() {
        let src = "\
def f(items):
    return len(items)
";
        let symbols = extract_symbols("app", src).unwrap();
        let f = find(&symbols, "app.f");
        assert!(!f.depends_on.iter().any(|d| d.leaf() == "len"));
    }

    #[test]
    fn call_assignment_links_arguments_to_parameters() {
        let src = "\
def scale(factor):
    return factor * 2

base = 3
result = scale(base)
";
        let symbols = extract_symbols("app", src).unwrap();

        let result = find(&symbols, "app.result");
        assert!(result.depends_on.contains(&QualifiedName::new("app.scale")));
        assert!(result.depends_on.contains(&QualifiedName::new("app.base")));

        // Argument flowed into the callee parameter's variable node.
        let param = find(&symbols, "app.scale.factor");
        assert_eq!(param.kind, SymbolKind::Variable);
        assert!(param.depends_on.contains(&QualifiedName::new("app.base")));
    }

    #[test]
    fn decorator_names_are_dependencies_of_the_decorated_function() {
        let src = "\
def cache(fn):
    return fn

@cache
def f():
    return 1
";
        let symbols = extract_symbols("app", src).unwrap();
        let f = find(&symbols, "app.f");
        assert!(f.depends_on.contains(&QualifiedName::new("app.cache")));
        // The node's defining line is the `def` line, not the decorator's.
        assert_eq!(f.line, 5);
    }

    #[test]
    fn default_parameter_values_resolve_in_the_enclosing_scope() {
        let src = "\
limit = 10

def clamp(value, cap=limit):
    return min(value, cap)
";
        let symbols = extract_symbols("app", src).unwrap();
        let clamp = find(&symbols, "app.clamp");
        assert!(clamp.depends_on.contains(&QualifiedName::new("app.limit")));
        assert!(clamp
            .depends_on
            .contains(&QualifiedName::new("app.clamp.cap")));
        assert!(!clamp
            .depends_on
            .contains(&QualifiedName::new("app.clamp.limit")));
    }

    #[test]
    fn nested_function_defaults_resolve_to_the_outer_scope() {
        let src = "\
def outer():
    y = 1
    def inner(z=y):
        return z
    return inner
";
        let symbols = extract_symbols("app", src).unwrap();
        let inner = find(&symbols, "app.outer.inner");
        assert!(inner
            .depends_on
            .contains(&QualifiedName::new("app.outer.y")));
        assert!(!inner.depends_on.contains(&QualifiedName::new("app.y")));
    }

    #[test]
    fn attribute_access_reads_the_object_only() {
        let src = "\
config = {}

def f():
    return config.copy
";
        let symbols = extract_symbols("app", src).unwrap();
        let f = find(&symbols, "app.f");
        assert!(f.depends_on.contains(&QualifiedName::new("app.config")));
        assert!(!f.depends_on.iter().any(|d| d.leaf() == "copy"));
    }

    #[test]
    fn extraction_is_deterministic() {
        let src = "\
a = 1
b = a

def f():
    return a + b

def g():
    return f()
";
        let first = extract_symbols("app", src).unwrap();
        let second = extract_symbols("app", src).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_syntax_is_a_parse_error() {
        let err = extract_symbols("app", "def broken(:\n").unwrap_err();
        assert!(matches!(err, BlastRadiusError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn function_span_covers_its_body() {
        let src = "\
def f():
    a = 1
    b = 2
    return a + b
";
        let symbols = extract_symbols("app", src).unwrap();
        let f = find(&symbols, "app.f");
        assert_eq!(f.line, 1);
        assert_eq!(f.end_line, 4);
        assert!(f.spans_line(3));
        assert!(!f.spans_line(5));
    }
}
