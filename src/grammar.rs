//! Single-line grammar: dialog headers, `if ... then` conditions, arithmetic
//! expressions and event clauses.
//!
//! Block structure is handled by [`crate::parser`]; everything here works on
//! one line (or the tail of one line) at a time.

use winnow::ascii::{digit0, digit1, space0, space1};
use winnow::combinator::{
    alt, cut_err, delimited, eof, fail, not, opt, preceded, separated, terminated,
};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::token::{any, one_of, take_while};
use winnow::{ModalResult, Parser};

use crate::ast::{
    BinaryOp, Comparator, Condition, Conditional, Event, Expression, IfStatement, Logic, Message,
    Node, Number, Operand, Variable,
};

type Error = ErrMode<ContextError>;

/// Words that can never be a bare comparison operand.
const RESERVED: &[&str] = &["if", "then", "and", "or", "not"];

/// Failure of a single-line parse, relative to the start of the parsed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrammarError {
    pub offset: usize,
    pub expected: String,
    pub found: String,
}

/// Runs `parser` over the whole of `input`.
pub fn run<'s, O>(
    mut parser: impl Parser<&'s str, O, Error>,
    input: &'s str,
) -> Result<O, GrammarError> {
    parser.parse(input).map_err(|err| {
        let offset = err.offset();
        GrammarError {
            offset,
            expected: describe_expected(err.inner()),
            found: describe_found(input.get(offset..).unwrap_or_default()),
        }
    })
}

fn describe_expected(error: &ContextError) -> String {
    let mut label = None;
    for context in error.context() {
        match context {
            StrContext::Expected(value) => return value.to_string(),
            StrContext::Label(name) if label.is_none() => label = Some(*name),
            _ => {}
        }
    }
    label.map_or_else(|| "valid syntax".to_string(), |name| format!("a valid {name}"))
}

pub fn describe_found(rest: &str) -> String {
    let rest = rest.trim_start();
    match rest.split_whitespace().next() {
        Some(word) => format!("`{}`", word.chars().take(16).collect::<String>()),
        None => "end of line".to_string(),
    }
}

fn expected(description: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(description))
}

fn ws<'s, O>(parser: impl Parser<&'s str, O, Error>) -> impl Parser<&'s str, O, Error> {
    preceded(space0, parser)
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keyword<'s>(word: &'static str) -> impl Parser<&'s str, &'s str, Error> {
    terminated(word, not(one_of(is_word_char)))
        .context(StrContext::Expected(StrContextValue::StringLiteral(word)))
}

fn identifier<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic()),
        take_while(0.., is_word_char),
    )
        .take()
        .context(StrContext::Label("identifier"))
        .parse_next(input)
}

fn atom<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    identifier
        .verify(|word: &str| !RESERVED.contains(&word))
        .parse_next(input)
}

/// `"..."` or `'...'` with backslash escapes; yields the unescaped text.
fn quoted(input: &mut &str) -> ModalResult<String> {
    let quote = one_of(['"', '\'']).parse_next(input)?;
    let mut text = String::new();
    loop {
        let c = cut_err(any)
            .context(expected("a closing quote"))
            .parse_next(input)?;
        if c == quote {
            return Ok(text);
        }
        if c != '\\' {
            text.push(c);
            continue;
        }
        let escaped = cut_err(any)
            .context(expected("an escaped character"))
            .parse_next(input)?;
        text.push(match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            other => other,
        });
    }
}

// ---- numbers ----

fn exponent<'s>(input: &mut &'s str) -> ModalResult<&'s str> {
    (one_of(['e', 'E']), opt(one_of(['+', '-'])), digit1)
        .take()
        .parse_next(input)
}

fn real(input: &mut &str) -> ModalResult<f64> {
    let literal = alt((
        (digit1, '.', digit0, opt(exponent)).take(),
        (digit1, exponent).take(),
    ))
    .parse_next(input)?;
    match literal.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => cut_err(fail)
            .context(expected("a finite real literal"))
            .parse_next(input),
    }
}

fn integer(input: &mut &str) -> ModalResult<i64> {
    let digits = digit1.parse_next(input)?;
    match digits.parse::<i64>() {
        Ok(value) => Ok(value),
        Err(_) => cut_err(fail)
            .context(expected("an integer literal within 64-bit range"))
            .parse_next(input),
    }
}

// ---- expressions ----

fn variable(input: &mut &str) -> ModalResult<Variable> {
    (
        identifier,
        ws(':'),
        cut_err(ws(identifier)).context(expected("a field name after `:`")),
    )
        .map(|(object, _, field)| Variable {
            object: object.to_string(),
            field: field.to_string(),
        })
        .parse_next(input)
}

fn term(input: &mut &str) -> ModalResult<Expression> {
    ws(alt((
        real.map(|value| Expression::term(Node::Number(Number::Real(value)))),
        integer.map(|value| Expression::term(Node::Number(Number::Integer(value)))),
        variable.map(|variable| Expression::term(Node::Variable(variable))),
        delimited('(', expression, ws(')')),
    )))
    .parse_next(input)
}

fn unary(input: &mut &str) -> ModalResult<Expression> {
    if opt(ws('-')).parse_next(input)?.is_some() {
        let operand = cut_err(unary)
            .context(expected("an operand after `-`"))
            .parse_next(input)?;
        return Ok(Expression::negate(operand));
    }
    term(input)
}

fn product(input: &mut &str) -> ModalResult<Expression> {
    let mut lhs = unary(input)?;
    while let Some(op) =
        opt(ws(alt(('*'.value(BinaryOp::Mul), '/'.value(BinaryOp::Div))))).parse_next(input)?
    {
        let rhs = cut_err(unary)
            .context(expected("an operand"))
            .parse_next(input)?;
        lhs = Expression::binary(op, lhs, rhs);
    }
    Ok(lhs)
}

/// Arithmetic by precedence climbing: unary `-`, then `*` `/`, then `+` `-`,
/// binary levels left-associative.
pub fn expression(input: &mut &str) -> ModalResult<Expression> {
    let mut lhs = product(input)?;
    while let Some(op) =
        opt(ws(alt(('+'.value(BinaryOp::Add), '-'.value(BinaryOp::Sub))))).parse_next(input)?
    {
        let rhs = cut_err(product)
            .context(expected("an operand"))
            .parse_next(input)?;
        lhs = Expression::binary(op, lhs, rhs);
    }
    Ok(lhs)
}

// ---- conditionals ----

fn operand(input: &mut &str) -> ModalResult<Operand> {
    ws(alt((
        expression.map(|expression| Operand::Expression(Node::Expression(expression))),
        quoted.map(Operand::Quoted),
        atom.map(|word: &str| Operand::Atom(word.to_string())),
    )))
    .context(expected("a value to compare"))
    .parse_next(input)
}

fn comparator(input: &mut &str) -> ModalResult<Comparator> {
    ws(alt((
        "<=".value(Comparator::LessEqual),
        ">=".value(Comparator::GreaterEqual),
        "!=".value(Comparator::NotEqual),
        '<'.value(Comparator::Less),
        '>'.value(Comparator::Greater),
        '='.value(Comparator::Equal),
    )))
    .context(expected("a comparison operator"))
    .parse_next(input)
}

fn comparison(input: &mut &str) -> ModalResult<Condition> {
    let lhs = operand(input)?;
    let op = comparator(input)?;
    let rhs = cut_err(operand).parse_next(input)?;
    Ok(Condition::Compare { lhs, op, rhs })
}

fn condition(input: &mut &str) -> ModalResult<Condition> {
    alt((
        comparison,
        delimited(
            ws('('),
            conditional,
            cut_err(ws(')')).context(expected("`)` closing the group")),
        )
        .map(Condition::Group),
    ))
    .context(expected("a comparison or `(`"))
    .parse_next(input)
}

/// `[not] condition ((and | or) condition)*`
pub fn conditional(input: &mut &str) -> ModalResult<Conditional> {
    let negated = opt(ws(keyword("not"))).parse_next(input)?.is_some();
    let first = condition(input)?;
    let mut rest = Vec::new();
    while let Some(logic) = opt(ws(alt((
        keyword("and").value(Logic::And),
        keyword("or").value(Logic::Or),
    ))))
    .parse_next(input)?
    {
        let next = cut_err(condition).parse_next(input)?;
        rest.push((logic, next));
    }
    Ok(Conditional {
        negated,
        first: Box::new(first),
        rest,
    })
}

/// `if <conditional> then`
pub fn if_statement(input: &mut &str) -> ModalResult<IfStatement> {
    preceded(
        keyword("if"),
        cut_err(terminated(conditional, (ws(keyword("then")), space0, eof))),
    )
    .map(|condition| IfStatement { condition })
    .parse_next(input)
}

/// Whether a line should be read as the condition of the response above it.
pub fn is_condition_line(text: &str) -> bool {
    let opens = text
        .strip_prefix("if")
        .is_some_and(|rest| rest.starts_with(|c: char| c.is_whitespace() || c == '('));
    let closes = text.strip_suffix("then").is_some_and(|rest| {
        rest.ends_with(|c: char| c.is_whitespace() || matches!(c, ')' | '"' | '\''))
    });
    opens && closes
}

// ---- headers and events ----

/// `begin <name> [extends <name>]`
pub fn dialog_header(input: &mut &str) -> ModalResult<(String, Option<String>)> {
    preceded(
        keyword("begin"),
        cut_err((
            preceded(space1, identifier).context(expected("a dialog name")),
            opt(preceded(
                (space1, keyword("extends")),
                cut_err(preceded(space1, identifier))
                    .context(expected("the name of the dialog to extend")),
            )),
            space0,
            eof.context(expected("end of line")),
        )),
    )
    .map(|(name, extends, _, _)| (name.to_string(), extends.map(str::to_string)))
    .parse_next(input)
}

fn event(input: &mut &str) -> ModalResult<Event> {
    preceded(
        ws("->"),
        cut_err((
            ws(identifier).context(expected("an event target")),
            ws('!').context(StrContext::Expected(StrContextValue::CharLiteral('!'))),
            ws(alt((
                quoted.map(Message::Quoted),
                identifier.map(|word: &str| Message::Atom(word.to_string())),
            )))
            .context(expected("an event message")),
        )),
    )
    .map(|(target, _, message)| Event {
        target: target.to_string(),
        message,
    })
    .parse_next(input)
}

/// One line of `-> target!message` clauses separated by `,`. The flag tells
/// whether the line ends with a `,`, i.e. the clause list continues below.
pub fn event_line(input: &mut &str) -> ModalResult<(Vec<Event>, bool)> {
    let events: Vec<Event> = separated(1.., event, ws(',')).parse_next(input)?;
    let continues = opt(ws(',')).parse_next(input)?.is_some();
    (space0, eof)
        .context(expected("`,` or end of line"))
        .parse_next(input)?;
    Ok((events, continues))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(value: i64) -> Expression {
        Expression::term(Node::Number(Number::Integer(value)))
    }

    fn var(object: &str, field: &str) -> Expression {
        Expression::term(Node::Variable(Variable {
            object: object.to_string(),
            field: field.to_string(),
        }))
    }

    fn parse_expression(text: &str) -> Expression {
        run(terminated(expression, space0), text).unwrap()
    }

    fn compare(lhs: Operand, op: Comparator, rhs: Operand) -> Condition {
        Condition::Compare { lhs, op, rhs }
    }

    fn expr(expression: Expression) -> Operand {
        Operand::Expression(Node::Expression(expression))
    }

    #[test]
    fn test_multiplication_binds_tighter_than_addition() {
        assert_eq!(
            parse_expression("1 + 2 * 3"),
            Expression::binary(
                BinaryOp::Add,
                int(1),
                Expression::binary(BinaryOp::Mul, int(2), int(3))
            )
        );
    }

    #[test]
    fn test_unary_minus_binds_tightest() {
        assert_eq!(
            parse_expression("-2 * 3"),
            Expression::binary(BinaryOp::Mul, Expression::negate(int(2)), int(3))
        );
        assert_eq!(
            parse_expression("- -7"),
            Expression::negate(Expression::negate(int(7)))
        );
    }

    #[test]
    fn test_binary_operators_are_left_associative() {
        assert_eq!(
            parse_expression("8 - 3 - 1"),
            Expression::binary(
                BinaryOp::Sub,
                Expression::binary(BinaryOp::Sub, int(8), int(3)),
                int(1)
            )
        );
        assert_eq!(
            parse_expression("8 / 4 * 2"),
            Expression::binary(
                BinaryOp::Mul,
                Expression::binary(BinaryOp::Div, int(8), int(4)),
                int(2)
            )
        );
    }

    #[test]
    fn test_parentheses_override_precedence() {
        assert_eq!(
            parse_expression("(1 + 2) * player:level"),
            Expression::binary(
                BinaryOp::Mul,
                Expression::binary(BinaryOp::Add, int(1), int(2)),
                var("player", "level")
            )
        );
    }

    #[test]
    fn test_integer_and_real_literals_stay_distinct() {
        assert_eq!(parse_expression("2"), int(2));
        assert_eq!(
            parse_expression("2.0"),
            Expression::term(Node::Number(Number::Real(2.0)))
        );
        assert_eq!(
            parse_expression("1e3"),
            Expression::term(Node::Number(Number::Real(1000.0)))
        );
        assert_eq!(
            parse_expression("2.5E-1"),
            Expression::term(Node::Number(Number::Real(0.25)))
        );
    }

    #[test]
    fn test_out_of_range_literals_are_rejected() {
        let err = run(expression, "99999999999999999999").unwrap_err();
        assert_eq!(err.expected, "an integer literal within 64-bit range");

        let err = run(expression, "1e999").unwrap_err();
        assert_eq!(err.expected, "a finite real literal");
    }

    #[test]
    fn test_conditions_chain_left_to_right() {
        let stmt = run(
            if_statement,
            "if player:health > 10 and player:gold <= 5 or npc:mood = happy then",
        )
        .unwrap();
        let cond = stmt.condition;
        assert!(!cond.negated);
        assert_eq!(
            *cond.first,
            compare(
                expr(var("player", "health")),
                Comparator::Greater,
                expr(int(10))
            )
        );
        assert_eq!(cond.rest.len(), 2);
        assert_eq!(cond.rest[0].0, Logic::And);
        assert_eq!(cond.rest[1].0, Logic::Or);
        assert_eq!(
            cond.rest[1].1,
            compare(
                expr(var("npc", "mood")),
                Comparator::Equal,
                Operand::Atom("happy".to_string())
            )
        );
    }

    #[test]
    fn test_negated_nested_groups() {
        let stmt = run(
            if_statement,
            "if not (player:gold >= 10 or (npc:name != 'Bob' and 1 < 2)) then",
        )
        .unwrap();
        let cond = stmt.condition;
        assert!(cond.negated);
        let Condition::Group(outer) = *cond.first else {
            panic!("expected a group");
        };
        assert_eq!(outer.rest.len(), 1);
        let Condition::Group(inner) = &outer.rest[0].1 else {
            panic!("expected a nested group");
        };
        assert_eq!(
            *inner.first,
            compare(
                expr(var("npc", "name")),
                Comparator::NotEqual,
                Operand::Quoted("Bob".to_string())
            )
        );
    }

    #[test]
    fn test_arithmetic_group_is_not_a_condition_group() {
        let stmt = run(if_statement, "if (player:gold + 1) * 2 > 10 then").unwrap();
        let Condition::Compare { lhs, .. } = *stmt.condition.first else {
            panic!("expected a comparison");
        };
        assert_eq!(
            lhs,
            expr(Expression::binary(
                BinaryOp::Mul,
                Expression::binary(BinaryOp::Add, var("player", "gold"), int(1)),
                int(2)
            ))
        );
    }

    #[test]
    fn test_missing_then_is_reported() {
        let err = run(if_statement, "if player:health > 10").unwrap_err();
        assert_eq!(err.expected, "`then`");
        assert_eq!(err.found, "end of line");
    }

    #[test]
    fn test_missing_operand_is_reported() {
        let err = run(if_statement, "if player:health > then").unwrap_err();
        assert_eq!(err.expected, "a value to compare");
        assert_eq!(err.found, "`then`");
        assert_eq!(err.offset, "if player:health > ".len());
    }

    #[test]
    fn test_quoted_strings_unescape() {
        let stmt = run(if_statement, r#"if npc:line = "say \"hi\"\n" then"#).unwrap();
        let Condition::Compare { rhs, .. } = *stmt.condition.first else {
            panic!("expected a comparison");
        };
        assert_eq!(rhs, Operand::Quoted("say \"hi\"\n".to_string()));

        let err = run(if_statement, "if npc:line = \"open then").unwrap_err();
        assert_eq!(err.expected, "a closing quote");
    }

    #[test]
    fn test_condition_line_detection() {
        assert!(is_condition_line("if player:health > 10 then"));
        assert!(is_condition_line("if (a:b = 1) then"));
        assert!(is_condition_line("if(a:b = 1)then"));
        assert!(!is_condition_line("iffy weather then"));
        assert!(!is_condition_line("if only I knew"));
    }

    #[test]
    fn test_dialog_header_with_and_without_extends() {
        assert_eq!(
            run(dialog_header, "begin greet").unwrap(),
            ("greet".to_string(), None)
        );
        assert_eq!(
            run(dialog_header, "begin testDialog2 extends testDialog").unwrap(),
            ("testDialog2".to_string(), Some("testDialog".to_string()))
        );

        let err = run(dialog_header, "begin greet extends").unwrap_err();
        assert_eq!(err.expected, "the name of the dialog to extend");

        let err = run(dialog_header, "start greet").unwrap_err();
        assert_eq!(err.expected, "`begin`");
    }

    #[test]
    fn test_event_lines() {
        let (events, continues) =
            run(event_line, r#"-> player!test, -> self!"go home""#).unwrap();
        assert!(!continues);
        assert_eq!(
            events,
            vec![
                Event {
                    target: "player".to_string(),
                    message: Message::Atom("test".to_string()),
                },
                Event {
                    target: "self".to_string(),
                    message: Message::Quoted("go home".to_string()),
                },
            ]
        );

        let (events, continues) = run(event_line, "->player!test,").unwrap();
        assert!(continues);
        assert_eq!(events.len(), 1);

        let err = run(event_line, "-> player test").unwrap_err();
        assert_eq!(err.expected, "`!`");
        assert_eq!(err.found, "`test`");

        let err = run(event_line, "-> a!x -> b!y").unwrap_err();
        assert_eq!(err.expected, "`,` or end of line");
    }
}
