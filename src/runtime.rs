//! Reference evaluator for parsed dialogs.
//!
//! Mirrors the selection rules of the generated JavaScript module so dialog
//! trees can be previewed and tested without a JavaScript engine: first
//! matching response, first option with the exact text, events dispatched in
//! order to the context objects that exist.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value as Json;

use crate::ast::*;

/// A value produced while evaluating a condition, with JavaScript-like
/// coercions.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// Any array or object read from the context.
    Object,
}

impl From<&Json> for Value {
    fn from(json: &Json) -> Self {
        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(*b),
            Json::Number(n) => n.as_f64().map_or(Value::Undefined, Value::Number),
            Json::String(s) => Value::Str(s.clone()),
            Json::Array(_) | Json::Object(_) => Value::Object,
        }
    }
}

impl Value {
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined | Value::Object => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }

    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) if n.is_nan() => "NaN".to_string(),
            Value::Number(n) if n.is_infinite() => {
                (if *n > 0.0 { "Infinity" } else { "-Infinity" }).to_string()
            }
            Value::Number(n) => js_number_string(*n),
            Value::Str(s) => s.clone(),
            Value::Object => "[object Object]".to_string(),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object, _) | (_, Value::Object) => false,
            (a, b) => a == b,
        }
    }

    fn add(self, other: Value) -> Value {
        match (self, other) {
            (Value::Str(a), b) => Value::Str(a + &b.to_js_string()),
            (a, Value::Str(b)) => Value::Str(a.to_js_string() + &b),
            (a, b) => Value::Number(a.to_number() + b.to_number()),
        }
    }

    fn compare(&self, op: Comparator, other: &Value) -> bool {
        let ordering = || match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (a, b) => a.to_number().partial_cmp(&b.to_number()),
        };
        match op {
            Comparator::Equal => self.strict_equals(other),
            Comparator::NotEqual => !self.strict_equals(other),
            Comparator::Less => ordering().is_some_and(Ordering::is_lt),
            Comparator::LessEqual => ordering().is_some_and(Ordering::is_le),
            Comparator::Greater => ordering().is_some_and(Ordering::is_gt),
            Comparator::GreaterEqual => ordering().is_some_and(Ordering::is_ge),
        }
    }
}

/// `String(n)` for a finite number: plain digits while the decimal exponent
/// is in `-7..21`, exponent form (`1e+21`, `1.5e-7`) outside it.
fn js_number_string(n: f64) -> String {
    if n == 0.0 {
        return "0".to_string();
    }
    if n < 0.0 {
        return format!("-{}", js_number_string(-n));
    }

    // Shortest round-trip digits, e.g. "1.23e2".
    let scientific = format!("{:e}", n);
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let point = exponent.parse::<i32>().unwrap_or(0) + 1;

    if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (whole, fraction) = digits.split_at(point as usize);
        format!("{}.{}", whole, fraction)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let (first, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() {
            String::new()
        } else {
            format!(".{}", rest)
        };
        let sign = if point > 0 { "+" } else { "-" };
        format!("{}{}e{}{}", first, fraction, sign, (point - 1).abs())
    }
}

/// An event sent when an option was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub target: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Choice<'a> {
    pub option: &'a DialogOption,
    pub dispatched: Vec<Dispatch>,
}

pub struct Runtime<'a> {
    dialogs: HashMap<&'a str, &'a Dialog>,
    context: &'a Json,
}

impl<'a> Runtime<'a> {
    /// A later dialog with the same name replaces an earlier one, as the
    /// registry assignments in the generated module do.
    pub fn new(dialogs: &'a [Dialog], context: &'a Json) -> Self {
        let dialogs = dialogs
            .iter()
            .map(|dialog| (dialog.name.as_str(), dialog))
            .collect();
        Self { dialogs, context }
    }

    /// The first response of `name` whose condition holds, falling back to the
    /// dialogs it extends. `None` for unknown dialogs and for `extends` cycles.
    pub fn get_response(&self, name: &str) -> Option<&'a Response> {
        let mut current = *self.dialogs.get(name)?;
        let mut visited = vec![current.name.as_str()];
        loop {
            if let Some(response) = self.first_response(current.responses()) {
                return Some(response);
            }
            let base = current.extends.as_deref()?;
            current = *self.dialogs.get(base)?;
            if visited.contains(&base) {
                return None;
            }
            visited.push(base);
        }
    }

    /// The response an option leads to, if any.
    pub fn option_response(&self, option: &'a DialogOption) -> Option<&'a Response> {
        self.first_response(option.responses())
    }

    pub fn options(&self, response: &'a Response) -> Vec<&'a str> {
        response.options().map(|option| option.text.as_str()).collect()
    }

    /// Picks the first option with exactly `text` and dispatches its events
    /// to the context objects that exist.
    pub fn choose(&self, response: &'a Response, text: &str) -> Option<Choice<'a>> {
        let option = response.options().find(|option| option.text == text)?;

        let mut dispatched = Vec::new();
        for event in option.events() {
            if self.context.get(&event.target).is_none() {
                tracing::debug!(
                    target_object = %event.target,
                    message = event.message.text(),
                    line = option.line_no,
                    "skipping event for a missing context object"
                );
                continue;
            }
            dispatched.push(Dispatch {
                target: event.target.clone(),
                message: event.message.text().to_string(),
            });
        }

        Some(Choice { option, dispatched })
    }

    fn first_response(
        &self,
        mut responses: impl Iterator<Item = &'a Response>,
    ) -> Option<&'a Response> {
        responses.find(|response| self.passes(response))
    }

    fn passes(&self, response: &Response) -> bool {
        match response.condition.as_deref() {
            None => true,
            Some(Node::IfStatement(statement)) => self.conditional(&statement.condition),
            // Lowered conditions carry no semantics to evaluate.
            Some(_) => false,
        }
    }

    fn conditional(&self, conditional: &Conditional) -> bool {
        let mut result = self.condition(&conditional.first);
        for (logic, condition) in &conditional.rest {
            result = match logic {
                Logic::And => result && self.condition(condition),
                Logic::Or => result || self.condition(condition),
            };
        }
        result != conditional.negated
    }

    fn condition(&self, condition: &Condition) -> bool {
        match condition {
            Condition::Compare { lhs, op, rhs } => {
                self.operand(lhs).compare(*op, &self.operand(rhs))
            }
            Condition::Group(inner) => self.conditional(inner),
        }
    }

    fn operand(&self, operand: &Operand) -> Value {
        match operand {
            Operand::Expression(node) => self.node(node),
            Operand::Atom(text) | Operand::Quoted(text) => Value::Str(text.clone()),
        }
    }

    fn node(&self, node: &Node) -> Value {
        match node {
            Node::Expression(expression) => self.expression(expression),
            Node::Number(Number::Integer(value)) => Value::Number(*value as f64),
            Node::Number(Number::Real(value)) => Value::Number(*value),
            Node::Variable(variable) => self.lookup(variable),
            _ => Value::Undefined,
        }
    }

    fn expression(&self, expression: &Expression) -> Value {
        match expression {
            Expression::Term(node) => self.node(node),
            Expression::Negate(inner) => Value::Number(-self.expression(inner).to_number()),
            Expression::Binary { op, lhs, rhs } => {
                let lhs = self.expression(lhs);
                let rhs = self.expression(rhs);
                match op {
                    BinaryOp::Add => lhs.add(rhs),
                    BinaryOp::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
                    BinaryOp::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
                    BinaryOp::Div => Value::Number(lhs.to_number() / rhs.to_number()),
                }
            }
        }
    }

    fn lookup(&self, variable: &Variable) -> Value {
        self.context
            .get(&variable.object)
            .and_then(|object| object.get(&variable.field))
            .map_or(Value::Undefined, Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use serde_json::json;

    #[test]
    fn test_first_true_response_wins() {
        let dialogs = parse(
            "begin d\n  Rich.\n    if player:gold > 100 then\n  Poor.\n  Unreachable.\nend\n",
        )
        .unwrap();
        let context = json!({"player": {"gold": 5}});
        let runtime = Runtime::new(&dialogs, &context);
        assert_eq!(runtime.get_response("d").unwrap().text, "Poor.");

        let context = json!({"player": {"gold": 500}});
        let runtime = Runtime::new(&dialogs, &context);
        assert_eq!(runtime.get_response("d").unwrap().text, "Rich.");
    }

    #[test]
    fn test_identical_option_text_picks_the_first() {
        let dialogs = parse("begin d\n  Hi.\n    ~ Go\n      First.\n    ~ Go\n      Second.\nend\n")
            .unwrap();
        let context = json!({});
        let runtime = Runtime::new(&dialogs, &context);
        let response = runtime.get_response("d").unwrap();
        assert_eq!(runtime.options(response), vec!["Go", "Go"]);

        let choice = runtime.choose(response, "Go").unwrap();
        assert_eq!(choice.option.line_no, 3);
        assert_eq!(runtime.option_response(choice.option).unwrap().text, "First.");
        assert!(runtime.choose(response, "go").is_none());
    }

    #[test]
    fn test_events_dispatch_in_order_to_existing_targets() {
        let dialogs =
            parse("begin d\n  Hi.\n    ~ Go -> A!\"x\", -> ghost!boo,\n      -> B!\"y\"\nend\n")
                .unwrap();
        let context = json!({"A": {}, "B": {}});
        let runtime = Runtime::new(&dialogs, &context);
        let response = runtime.get_response("d").unwrap();
        let choice = runtime.choose(response, "Go").unwrap();
        assert_eq!(
            choice.dispatched,
            vec![
                Dispatch {
                    target: "A".to_string(),
                    message: "x".to_string(),
                },
                Dispatch {
                    target: "B".to_string(),
                    message: "y".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_extends_delegates_to_base() {
        let src = "\
begin base
  From the base.
end
begin child extends base
  Only for friends.
    if npc:mood = friendly then
end
begin loopA extends loopB
end
begin loopB extends loopA
end
";
        let dialogs = parse(src).unwrap();
        let context = json!({"npc": {"mood": "grumpy"}});
        let runtime = Runtime::new(&dialogs, &context);
        assert_eq!(runtime.get_response("child").unwrap().text, "From the base.");
        assert!(runtime.get_response("loopA").is_none());
        assert!(runtime.get_response("missing").is_none());

        let context = json!({"npc": {"mood": "friendly"}});
        let runtime = Runtime::new(&dialogs, &context);
        assert_eq!(runtime.get_response("child").unwrap().text, "Only for friends.");
    }

    #[test]
    fn test_javascript_like_comparisons() {
        let check = |condition: &str, context: Json| {
            let src = format!("begin d\n  Yes.\n    {}\n  No.\nend\n", condition);
            let dialogs = parse(&src).unwrap();
            let runtime = Runtime::new(&dialogs, &context);
            let chosen = runtime.get_response("d").unwrap();
            chosen.text == "Yes."
        };

        let player = json!({"player": {"name": "Bob", "level": 3}});
        assert!(check("if player:name + 1 = \"Bob1\" then", player.clone()));
        assert!(check("if player:name + 1e21 = \"Bob1e+21\" then", player.clone()));
        assert!(check("if player:name = Bob then", player.clone()));
        assert!(check("if player:name < \"Carl\" then", player.clone()));
        assert!(check("if player:level * 2 >= 6.0 then", player.clone()));
        assert!(check("if not (player:level = \"3\") then", player.clone()));
        assert!(!check("if ghost:hp > 0 then", player.clone()));
        assert!(check("if ghost:hp != 0 then", player.clone()));
        assert!(check(
            "if player:level > 5 or player:level < 4 and player:name = Bob then",
            player
        ));
    }

    #[test]
    fn test_number_strings_match_javascript() {
        assert_eq!(Value::Number(3.0).to_js_string(), "3");
        assert_eq!(Value::Number(0.5).to_js_string(), "0.5");
        assert_eq!(Value::Number(f64::NAN).to_js_string(), "NaN");
        assert_eq!(Value::Number(-0.0).to_js_string(), "0");
        assert_eq!(Value::Number(-2.5).to_js_string(), "-2.5");
        assert_eq!(Value::Number(123.0).to_js_string(), "123");
        assert_eq!(Value::Number(1e20).to_js_string(), "100000000000000000000");
        assert_eq!(Value::Number(1e21).to_js_string(), "1e+21");
        assert_eq!(Value::Number(1.5e22).to_js_string(), "1.5e+22");
        assert_eq!(Value::Number(0.0000015).to_js_string(), "0.0000015");
        assert_eq!(Value::Number(1e-7).to_js_string(), "1e-7");
        assert_eq!(Value::Number(1.25e-7).to_js_string(), "1.25e-7");
        assert_eq!(Value::Str(" 12 ".to_string()).to_number(), 12.0);
        assert!(Value::Str("twelve".to_string()).to_number().is_nan());
    }
}
