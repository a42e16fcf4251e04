use serde::Serialize;

/// Every position in the tree holds a `Node`. The parser only produces the
/// AST kinds; lowering passes replace them with `Text` and `Fragment`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "node", rename_all = "snake_case")]
pub enum Node {
    Dialog(Dialog),
    Response(Response),
    Option(DialogOption),
    Event(Event),
    IfStatement(IfStatement),
    Expression(Expression),
    Variable(Variable),
    Number(Number),
    Text(String),
    Fragment(Vec<Node>),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Dialog(_) => "dialog",
            Node::Response(_) => "response",
            Node::Option(_) => "option",
            Node::Event(_) => "event",
            Node::IfStatement(_) => "if statement",
            Node::Expression(_) => "expression",
            Node::Variable(_) => "variable",
            Node::Number(_) => "number",
            Node::Text(_) => "text",
            Node::Fragment(_) => "fragment",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dialog {
    pub name: String,
    pub extends: Option<String>, // "base" in "begin name extends base"
    pub line_no: usize,
    pub children: Vec<Node>,
}

impl Dialog {
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        responses(&self.children)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub text: String,
    pub condition: Option<Box<Node>>,
    pub line_no: usize,
    pub children: Vec<Node>,
}

impl Response {
    pub fn options(&self) -> impl Iterator<Item = &DialogOption> {
        self.children.iter().filter_map(|node| match node {
            Node::Option(option) => Some(option),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialogOption {
    pub text: String,
    pub events: Vec<Node>,
    pub line_no: usize,
    pub children: Vec<Node>,
}

impl DialogOption {
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        responses(&self.children)
    }

    pub fn events(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter_map(|node| match node {
            Node::Event(event) => Some(event),
            _ => None,
        })
    }
}

fn responses(nodes: &[Node]) -> impl Iterator<Item = &Response> {
    nodes.iter().filter_map(|node| match node {
        Node::Response(response) => Some(response),
        _ => None,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub target: String,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Message {
    Quoted(String), // -> door!"open sesame"
    Atom(String),   // -> door!open
}

impl Message {
    pub fn text(&self) -> &str {
        match self {
            Message::Quoted(text) | Message::Atom(text) => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IfStatement {
    pub condition: Conditional,
}

/// `[not] condition (and|or condition)*`, combined strictly left to right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conditional {
    pub negated: bool,
    pub first: Box<Condition>,
    pub rest: Vec<(Logic, Condition)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    Compare {
        lhs: Operand,
        op: Comparator,
        rhs: Operand,
    },
    Group(Conditional),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operand {
    Expression(Node),
    Atom(String),
    Quoted(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparator {
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Logic {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expression {
    Term(Box<Node>), // Number or Variable until formatted
    Negate(Box<Expression>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
}

impl Expression {
    pub fn term(node: Node) -> Self {
        Expression::Term(Box::new(node))
    }

    pub fn negate(inner: Expression) -> Self {
        Expression::Negate(Box::new(inner))
    }

    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub object: String, // "player" in player:health
    pub field: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Number {
    Integer(i64),
    Real(f64),
}
