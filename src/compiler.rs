use crate::ast::*;
use crate::emitter;
use crate::types::CompileOptions;

/// A rewrite of one node kind into emitted fragments. Every other kind is
/// returned unchanged.
type Pass = fn(Node) -> Node;

const PASSES: [(&str, Pass); 8] = [
    ("numbers", format_numbers),
    ("variables", format_variables),
    ("expressions", format_expressions),
    ("conditions", format_conditions),
    ("events", format_events),
    ("responses", format_responses),
    ("options", format_options),
    ("dialogs", format_dialogs),
];

const CHECK_OPEN: &str = "\n\n      this.check = function () {\n        return ";
const CHECK_CLOSE: &str = ";\n      };";

const RESPONSE_OPEN: &str = "\n    this.responses.push(new function () {\n      this.text = ";
const RESPONSE_MEMBERS: &str = ";\n      this.options = [];\n\n      this.getOptions = function () { return getOptions.call(this); };\n      this.choose = function (optionText) { return chooseOption.call(this, context, optionText); };";
const RESPONSE_CLOSE: &str = "\n    });";

const OPTION_OPEN: &str = "\n\n      this.options.push(new function () {\n        this.text = ";
const OPTION_MEMBERS: &str = ";\n        this.events = [];\n        this.responses = [];\n\n        this.getResponse = function () { return getResponse.call(this, context); };";
const OPTION_CLOSE: &str = "\n      });";

const EVENT_OPEN: &str = "\n        this.events.push([";
const EVENT_CLOSE: &str = "]);";

const DIALOG_OPEN: &str = "\n  dialogs[";
const DIALOG_NAME: &str = "] = function (context) {\n    this.name = ";
const DIALOG_BASE: &str = ";\n    this.base = ";
const DIALOG_MEMBERS: &str = ";\n    this.responses = [];\n\n    this.getResponse = function () { return getResponse.call(this, context); };\n";
const DIALOG_CLOSE: &str = "\n  };\n";

pub struct Compiler {
    options: CompileOptions,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_options(CompileOptions::default())
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    pub fn compile(&self, dialogs: Vec<Dialog>) -> String {
        tracing::debug!(dialogs = dialogs.len(), "compiling dialogs");
        let body = flatten(&lower(dialogs));
        let output = emitter::emit(&body, &self.options);
        tracing::debug!(bytes = output.len(), "compiled module");
        output
    }
}

/// Runs every pass, in order, over the whole forest.
pub fn lower(dialogs: Vec<Dialog>) -> Vec<Node> {
    let mut nodes: Vec<Node> = dialogs.into_iter().map(Node::Dialog).collect();
    for (name, pass) in PASSES {
        tracing::trace!(pass = name, nodes = nodes.len(), "running lowering pass");
        nodes = nodes.into_iter().map(|node| descend(node, pass)).collect();
    }
    nodes
}

/// Concatenates the text of a lowered forest, depth first.
pub fn flatten(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        flatten_into(node, &mut out);
    }
    out
}

fn flatten_into(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::Fragment(nodes) => {
            for node in nodes {
                flatten_into(node, out);
            }
        }
        other => unreachable!("{} node survived lowering", other.kind()),
    }
}

// ---- traversal ----

/// Pre-order: the pass sees a node first, then the children of whatever it
/// returned.
fn descend(node: Node, pass: Pass) -> Node {
    map_children(pass(node), &mut |child: Node| descend(child, pass))
}

fn map_children(node: Node, f: &mut dyn FnMut(Node) -> Node) -> Node {
    match node {
        Node::Dialog(mut dialog) => {
            dialog.children = map_all(dialog.children, f);
            Node::Dialog(dialog)
        }
        Node::Response(mut response) => {
            if let Some(condition) = response.condition.take() {
                response.condition = Some(Box::new(f(*condition)));
            }
            response.children = map_all(response.children, f);
            Node::Response(response)
        }
        Node::Option(mut option) => {
            option.events = map_all(option.events, f);
            option.children = map_all(option.children, f);
            Node::Option(option)
        }
        Node::IfStatement(statement) => Node::IfStatement(IfStatement {
            condition: map_conditional(statement.condition, f),
        }),
        Node::Expression(expression) => Node::Expression(map_expression(expression, f)),
        Node::Fragment(nodes) => Node::Fragment(map_all(nodes, f)),
        leaf @ (Node::Event(_) | Node::Variable(_) | Node::Number(_) | Node::Text(_)) => leaf,
    }
}

fn map_all(nodes: Vec<Node>, f: &mut dyn FnMut(Node) -> Node) -> Vec<Node> {
    let mut mapped = Vec::with_capacity(nodes.len());
    for node in nodes {
        mapped.push(f(node));
    }
    mapped
}

fn map_conditional(conditional: Conditional, f: &mut dyn FnMut(Node) -> Node) -> Conditional {
    let first = map_condition(*conditional.first, f);
    let mut rest = Vec::with_capacity(conditional.rest.len());
    for (logic, condition) in conditional.rest {
        rest.push((logic, map_condition(condition, f)));
    }
    Conditional {
        negated: conditional.negated,
        first: Box::new(first),
        rest,
    }
}

fn map_condition(condition: Condition, f: &mut dyn FnMut(Node) -> Node) -> Condition {
    match condition {
        Condition::Compare { lhs, op, rhs } => Condition::Compare {
            lhs: map_operand(lhs, f),
            op,
            rhs: map_operand(rhs, f),
        },
        Condition::Group(inner) => Condition::Group(map_conditional(inner, f)),
    }
}

fn map_operand(operand: Operand, f: &mut dyn FnMut(Node) -> Node) -> Operand {
    match operand {
        Operand::Expression(node) => Operand::Expression(f(node)),
        literal => literal,
    }
}

fn map_expression(expression: Expression, f: &mut dyn FnMut(Node) -> Node) -> Expression {
    match expression {
        Expression::Term(node) => Expression::term(f(*node)),
        Expression::Negate(inner) => Expression::negate(map_expression(*inner, f)),
        Expression::Binary { op, lhs, rhs } => {
            let lhs = map_expression(*lhs, f);
            let rhs = map_expression(*rhs, f);
            Expression::binary(op, lhs, rhs)
        }
    }
}

// ---- passes ----

fn format_numbers(node: Node) -> Node {
    match node {
        Node::Number(Number::Integer(value)) => Node::Text(value.to_string()),
        Node::Number(Number::Real(value)) => Node::Text(format_real(value)),
        other => other,
    }
}

/// Shortest round-trip form, always with a decimal point: `2.0`, `1.0e20`.
pub(crate) fn format_real(value: f64) -> String {
    let text = format!("{:?}", value);
    match text.find('e') {
        Some(at) if !text[..at].contains('.') => format!("{}.0{}", &text[..at], &text[at..]),
        _ => text,
    }
}

fn format_variables(node: Node) -> Node {
    match node {
        Node::Variable(variable) => Node::Text(format!(
            "(context[{}] || {{}}).{}",
            js_string(&variable.object),
            variable.field
        )),
        other => other,
    }
}

fn format_expressions(node: Node) -> Node {
    match node {
        Node::Expression(expression) => Node::Text(render_expression(&expression)),
        other => other,
    }
}

fn render_expression(expression: &Expression) -> String {
    match expression {
        Expression::Term(node) => leaf_text(node),
        Expression::Negate(inner) => format!("(-{})", render_expression(inner)),
        Expression::Binary { op, lhs, rhs } => format!(
            "({} {} {})",
            render_expression(lhs),
            op.symbol(),
            render_expression(rhs)
        ),
    }
}

fn leaf_text(node: &Node) -> String {
    match node {
        Node::Text(text) => text.clone(),
        Node::Fragment(nodes) => flatten(nodes),
        other => unreachable!("{} node left inside a formatted expression", other.kind()),
    }
}

fn format_conditions(node: Node) -> Node {
    match node {
        Node::IfStatement(statement) => Node::Fragment(vec![
            Node::Text(CHECK_OPEN.to_string()),
            Node::Text(render_conditional(&statement.condition)),
            Node::Text(CHECK_CLOSE.to_string()),
        ]),
        other => other,
    }
}

fn render_conditional(conditional: &Conditional) -> String {
    let mut chain = render_condition(&conditional.first);
    for (logic, condition) in &conditional.rest {
        let op = match logic {
            Logic::And => "&&",
            Logic::Or => "||",
        };
        chain = format!("({} {} {})", chain, op, render_condition(condition));
    }
    if conditional.negated {
        format!("!({})", chain)
    } else {
        chain
    }
}

fn render_condition(condition: &Condition) -> String {
    match condition {
        Condition::Compare { lhs, op, rhs } => format!(
            "({} {} {})",
            render_operand(lhs),
            comparator_symbol(*op),
            render_operand(rhs)
        ),
        Condition::Group(inner) => render_conditional(inner),
    }
}

fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Expression(node) => leaf_text(node),
        Operand::Atom(text) | Operand::Quoted(text) => js_string(text),
    }
}

fn comparator_symbol(op: Comparator) -> &'static str {
    match op {
        Comparator::Less => "<",
        Comparator::LessEqual => "<=",
        Comparator::Greater => ">",
        Comparator::GreaterEqual => ">=",
        Comparator::Equal => "===",
        Comparator::NotEqual => "!==",
    }
}

fn format_events(node: Node) -> Node {
    match node {
        Node::Event(event) => Node::Text(format!(
            "{}{}, {}{}",
            EVENT_OPEN,
            js_string(&event.target),
            js_string(event.message.text()),
            EVENT_CLOSE
        )),
        other => other,
    }
}

fn format_responses(node: Node) -> Node {
    let Node::Response(response) = node else {
        return node;
    };

    let mut parts = vec![
        Node::Text(RESPONSE_OPEN.to_string()),
        Node::Text(js_string(&response.text)),
        Node::Text(RESPONSE_MEMBERS.to_string()),
    ];
    if let Some(check) = response.condition {
        parts.push(*check);
    }
    parts.extend(response.children);
    parts.push(Node::Text(RESPONSE_CLOSE.to_string()));
    Node::Fragment(parts)
}

fn format_options(node: Node) -> Node {
    let Node::Option(option) = node else {
        return node;
    };

    let mut parts = vec![
        Node::Text(OPTION_OPEN.to_string()),
        Node::Text(js_string(&option.text)),
        Node::Text(OPTION_MEMBERS.to_string()),
    ];
    parts.extend(option.events);
    parts.extend(option.children);
    parts.push(Node::Text(OPTION_CLOSE.to_string()));
    Node::Fragment(parts)
}

fn format_dialogs(node: Node) -> Node {
    let Node::Dialog(dialog) = node else {
        return node;
    };

    let name = js_string(&dialog.name);
    let mut head = format!("{}{}{}{}", DIALOG_OPEN, name, DIALOG_NAME, name);
    if let Some(base) = &dialog.extends {
        head.push_str(DIALOG_BASE);
        head.push_str(&js_string(base));
    }
    head.push_str(DIALOG_MEMBERS);

    let mut parts = vec![Node::Text(head)];
    parts.extend(dialog.children);
    parts.push(Node::Text(DIALOG_CLOSE.to_string()));
    Node::Fragment(parts)
}

/// A JavaScript string literal for `text`.
pub(crate) fn js_string(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}
