use std::collections::BTreeSet;

use crate::error::SyntaxError;
use crate::expression::{Expression, Operator};
use crate::FloatExt;

use once_cell::sync::Lazy;
use pest::error::LineColLocation;
use pest::iterators::{Pair, Pairs};
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "grammar.pest"] // relative to project `src`
struct ExpressionParser;

impl From<pest::error::Error<Rule>> for SyntaxError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let position = match err.line_col {
            LineColLocation::Pos(pos) => Some(pos),
            LineColLocation::Span(start, _) => Some(start),
        };
        Self {
            message: err.variant.message().into_owned(),
            position,
        }
    }
}

/// Deepest nesting of parentheses and prefix operators [`Expression::parse`]
/// accepts. Both are parsed recursively, so deeper input is reported as a
/// [`SyntaxError`] instead. Long chains of binary operators are not limited.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Rejects input nested deeper than [`MAX_NESTING_DEPTH`] before the
/// recursive parser sees it.
///
/// The depth at a point is the number of open parentheses plus the prefix
/// operators still waiting for their operand at every enclosing level.
/// Anything the grammar rejects anyway is left for pest to report.
fn check_nesting(input: &str) -> Result<(), SyntaxError> {
    // Prefix operators pending at each enclosing parenthesis level.
    let mut enclosing: Vec<usize> = vec![];
    let mut outer_depth = 0;
    let mut pending = 0;
    let mut expect_operand = true;
    let (mut line, mut column) = (1, 0);

    for c in input.chars() {
        if c == '\n' {
            line += 1;
            column = 0;
            continue;
        }
        column += 1;
        match c {
            c if c.is_whitespace() => continue,
            '(' => {
                enclosing.push(pending);
                outer_depth += pending + 1;
                pending = 0;
                expect_operand = true;
            }
            ')' => {
                if let Some(prefixes) = enclosing.pop() {
                    outer_depth -= prefixes + 1;
                }
                pending = 0;
                expect_operand = false;
            }
            '-' | '!' if expect_operand => pending += 1,
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                pending = 0;
                expect_operand = false;
            }
            _ => expect_operand = true,
        }
        if outer_depth + pending > MAX_NESTING_DEPTH {
            return Err(SyntaxError {
                message: format!("expression nested deeper than {MAX_NESTING_DEPTH} levels"),
                position: Some((line, column)),
            });
        }
    }
    Ok(())
}

impl<Real: FloatExt> Expression<Real> {
    /// Collects the variable names of `input` without building a tree.
    pub fn parse_variable_names(input: &str) -> Result<BTreeSet<String>, SyntaxError> {
        check_nesting(input)?;
        Ok(ExpressionParser::parse(Rule::calculation, input)?
            .flatten()
            .filter(|p| p.as_rule() == Rule::variable)
            .map(|p| p.as_str().to_string())
            .collect())
    }

    /// Parse the expression from `input`.
    ///
    /// Variables stay symbolic in the returned tree; they are bound to
    /// diagrams only when the tree is compiled.
    pub fn parse(input: &str) -> Result<Self, SyntaxError> {
        check_nesting(input)?;
        let mut pairs = ExpressionParser::parse(Rule::calculation, input)?;
        match pairs.next() {
            Some(expr) => climb_recursive(expr.into_inner()),
            None => Err(SyntaxError {
                message: "empty expression".to_string(),
                position: None,
            }),
        }
    }
}

static PRATT_PARSER: Lazy<PrattParser<Rule>> = Lazy::new(|| {
    use Assoc::*;
    use Rule::*;

    PrattParser::new()
        .op(Op::infix(or, Left))
        .op(Op::infix(and, Left))
        .op(Op::infix(add, Left) | Op::infix(subtract, Left))
        .op(Op::infix(multiply, Left) | Op::infix(divide, Left))
        .op(Op::prefix(neg) | Op::prefix(not))
});

type Climbed<Real> = Result<Expression<Real>, SyntaxError>;

fn climb_recursive<Real: FloatExt>(input: Pairs<Rule>) -> Climbed<Real> {
    PRATT_PARSER
        .map_primary(|pair: Pair<Rule>| match pair.as_rule() {
            Rule::expr => climb_recursive(pair.into_inner()),
            Rule::literal => {
                let literal_str = pair.as_str();
                literal_str
                    .parse::<Real>()
                    .map(Expression::Literal)
                    .map_err(|_| SyntaxError {
                        message: format!("unexpected literal: {literal_str}"),
                        position: Some(pair.line_col()),
                    })
            }
            Rule::variable => Ok(Expression::variable(pair.as_str())),
            x => unreachable!("Unexpected primary rule {x:?}"),
        })
        .map_prefix(|op: Pair<Rule>, only: Climbed<Real>| {
            let op = match op.as_rule() {
                Rule::neg => Operator::Negate,
                Rule::not => Operator::Not,
                x => unreachable!("Unexpected prefix operator {x:?}"),
            };
            Ok(Expression::unary(op, only?))
        })
        .map_infix(|lhs: Climbed<Real>, op: Pair<Rule>, rhs: Climbed<Real>| {
            let op = match op.as_rule() {
                Rule::add => Operator::Add,
                Rule::subtract => Operator::Subtract,
                Rule::multiply => Operator::Multiply,
                Rule::divide => Operator::Divide,
                Rule::and => Operator::And,
                Rule::or => Operator::Or,
                x => unreachable!("Unexpected operator {x:?}"),
            };
            Ok(Expression::binary(op, lhs?, rhs?))
        })
        .parse(input)
}
